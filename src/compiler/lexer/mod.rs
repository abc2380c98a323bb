//! The Unicode-aware tokenizer.
//!
//! A push-back character buffer with position tracking threaded through
//! every character read, and a `TokenFlags` bitset riding alongside each
//! token. Unicode tables live in [`unicode`]; the keyword table in
//! [`keywords`].

pub mod keywords;
pub mod unicode;

use bitflags::bitflags;

use crate::compiler::ast::node::Payload;
use crate::compiler::ast::SyntaxKind;
use crate::diagnostics::{Diagnostic, DiagnosticSink, Severity};
use crate::literal::{FloatingPoint, Integer};
use crate::position::Position;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TokenFlags: u32 {
        const NONE              = 0;
        const UNTERMINATED      = 1 << 0;
        const CONTAINS_SEPARATOR = 1 << 1;
        const EXTENDED_ESCAPE   = 1 << 2;
        const OCTAL             = 1 << 3;
        const BIG_INT           = 1 << 4;
        const SCIENTIFIC        = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CharClass: u32 {
        const NONE            = 0;
        const LETTER          = 1 << 0;
        const DIGIT           = 1 << 1;
        const HEX_DIGIT       = 1 << 2;
        const PUNCTUATION     = 1 << 3;
        const WHITE_SPACE     = 1 << 4;
        const LINE_TERMINATOR = 1 << 5;
        const INVALID         = 1 << 6;
    }
}

/// Lexer inputs recognized
#[derive(Debug, Clone, Copy)]
pub struct LexerOptions {
    pub extended_escape_sequences: bool,
    /// Bit 0: allow `<>`/`:=`. Bit 1: disable plain `=`.
    pub extended_operators: u8,
    pub octal: bool,
}

impl Default for LexerOptions {
    fn default() -> Self {
        LexerOptions { extended_escape_sequences: false, extended_operators: 0, octal: false }
    }
}

/// A lexed token: everything a caller needs to materialize an AST node.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: SyntaxKind,
    pub position: Position,
    pub payload: Payload,
    pub flags: TokenFlags,
}

/// Classifies a single character ASCII is a direct match;
/// non-ASCII defers to the Unicode range tables.
pub fn classify(ch: char) -> CharClass {
    if ch.is_ascii() {
        return match ch {
            'a'..='z' | 'A'..='Z' | '_' | '$' => CharClass::LETTER,
            '0'..='9' => {
                let mut c = CharClass::DIGIT;
                if ch.is_ascii_hexdigit() {
                    c |= CharClass::HEX_DIGIT;
                }
                c
            }
            ' ' | '\t' | '\u{000B}' | '\u{000C}' => CharClass::WHITE_SPACE,
            '\n' | '\r' => CharClass::LINE_TERMINATOR,
            c if c.is_ascii_hexdigit() => CharClass::HEX_DIGIT | CharClass::LETTER,
            c if c.is_ascii_punctuation() => CharClass::PUNCTUATION,
            _ => CharClass::INVALID,
        };
    }
    let cp = ch as u32;
    if unicode::is_invalid_code_point(cp) {
        return CharClass::INVALID;
    }
    if ch == unicode::LINE_SEPARATOR || ch == unicode::PARAGRAPH_SEPARATOR {
        return CharClass::LINE_TERMINATOR;
    }
    if unicode::is_unicode_whitespace(ch) {
        return CharClass::WHITE_SPACE;
    }
    if unicode::is_unicode_identifier_start(ch) || unicode::is_unicode_identifier_part(ch) {
        return CharClass::LETTER;
    }
    CharClass::PUNCTUATION
}

const REGEX_LOOKAHEAD_CAP: usize = 1024;

pub struct Lexer<'a> {
    chars: Vec<char>,
    index: usize,
    pushback: Vec<char>,
    position: Position,
    options: LexerOptions,
    sink: &'a DiagnosticSink,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &str, filename: impl Into<String>, options: LexerOptions, sink: &'a DiagnosticSink) -> Self {
        Lexer {
            chars: source.chars().collect(),
            index: 0,
            pushback: Vec::new(),
            position: Position::new(filename),
            options,
            sink,
        }
    }

    fn report(&self, message: impl Into<String>) {
        self.sink.report(Diagnostic::at(Severity::Error, self.position.clone(), message));
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = if let Some(c) = self.pushback.pop() {
            Some(c)
        } else if self.index < self.chars.len() {
            let c = self.chars[self.index];
            self.index += 1;
            Some(c)
        } else {
            None
        };
        if let Some(c) = ch {
            self.advance_position(c);
        }
        ch
    }

    fn advance_position(&mut self, c: char) {
        match c {
            '\r' => {
                if self.peek_char() == Some('\n') {
                    // consumed as part of the same logical newline by caller
                }
                self.position.new_line();
            }
            '\n' => self.position.new_line(),
            '\u{000C}' => self.position.new_page(),
            c if c == unicode::LINE_SEPARATOR || c == unicode::PARAGRAPH_SEPARATOR => self.position.new_line(),
            _ => self.position.new_column(),
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        if let Some(c) = self.pushback.last() {
            return Some(*c);
        }
        self.chars.get(self.index).copied()
    }

    fn push_back(&mut self, c: char) {
        self.pushback.push(c);
    }

    /// Skips whitespace, line terminators, and `//`/`/* */` comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if classify(c).intersects(CharClass::WHITE_SPACE | CharClass::LINE_TERMINATOR) => {
                    self.next_char();
                }
                Some('/') => {
                    let first = self.next_char().unwrap();
                    match self.peek_char() {
                        Some('/') => {
                            self.next_char();
                            while let Some(c) = self.peek_char() {
                                if classify(c).contains(CharClass::LINE_TERMINATOR) {
                                    break;
                                }
                                self.next_char();
                            }
                        }
                        Some('*') => {
                            self.next_char();
                            loop {
                                match self.next_char() {
                                    None => {
                                        self.report("unterminated comment");
                                        break;
                                    }
                                    Some('*') if self.peek_char() == Some('/') => {
                                        self.next_char();
                                        break;
                                    }
                                    _ => {}
                                }
                            }
                        }
                        _ => {
                            self.push_back(first);
                            return;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    /// Reads the next token. `regexp_allowed` mirrors the parser's context:
    /// when true, a leading `/` is speculatively scanned as a regex body.
    pub fn get_next_token(&mut self, regexp_allowed: bool) -> Token {
        self.skip_trivia();
        let position = self.position.clone();
        let Some(c) = self.next_char() else {
            return Token { kind: SyntaxKind::Eof, position, payload: Payload::None, flags: TokenFlags::NONE };
        };

        let class = classify(c);
        if class.contains(CharClass::INVALID) {
            self.report(format!("invalid character U+{:04X}", c as u32));
            return Token { kind: SyntaxKind::Unknown, position, payload: Payload::None, flags: TokenFlags::NONE };
        }

        if c.is_ascii_digit() {
            return self.scan_number(c, position);
        }
        if class.contains(CharClass::LETTER) {
            return self.scan_identifier(c, position);
        }
        match c {
            '\'' | '"' => self.scan_string(c, position),
            '`' => self.scan_template_start(position),
            '/' if regexp_allowed => self.scan_regex_or_divide(position),
            _ => self.scan_operator(c, position),
        }
    }

    /// Continuation token inside a template literal, after the parser has
    /// consumed `${ expr }`.
    pub fn get_next_template_token(&mut self) -> Token {
        let position = self.position.clone();
        self.scan_template_body(position, false)
    }

    fn scan_identifier(&mut self, first: char, position: Position) -> Token {
        let mut text = String::new();
        text.push(first);
        while let Some(c) = self.peek_char() {
            if classify(c).intersects(CharClass::LETTER | CharClass::DIGIT) {
                text.push(c);
                self.next_char();
            } else {
                break;
            }
        }

        if text == "__FILE__" {
            return Token {
                kind: SyntaxKind::String,
                position,
                payload: Payload::String(self.position.filename.clone()),
                flags: TokenFlags::NONE,
            };
        }
        if text == "__LINE__" {
            return Token {
                kind: SyntaxKind::Integer,
                position,
                payload: Payload::Integer(Integer::new(self.position.line as i64)),
                flags: TokenFlags::NONE,
            };
        }
        if let Some(kind) = keywords::lookup_keyword(&text) {
            return Token { kind, position, payload: Payload::None, flags: TokenFlags::NONE };
        }
        match keywords::lookup_special_identifier(&text) {
            Some(keywords::SpecialIdentifier::Infinity) => {
                return Token {
                    kind: SyntaxKind::FloatingPoint,
                    position,
                    payload: Payload::Float(FloatingPoint::new(f64::INFINITY)),
                    flags: TokenFlags::NONE,
                }
            }
            Some(keywords::SpecialIdentifier::NaN) => {
                return Token {
                    kind: SyntaxKind::FloatingPoint,
                    position,
                    payload: Payload::Float(FloatingPoint::new(f64::NAN)),
                    flags: TokenFlags::NONE,
                }
            }
            None => {}
        }
        Token { kind: SyntaxKind::Identifier, position, payload: Payload::String(text), flags: TokenFlags::NONE }
    }

    fn scan_number(&mut self, first: char, position: Position) -> Token {
        let mut flags = TokenFlags::NONE;
        if first == '0' {
            match self.peek_char() {
                Some('x') | Some('X') => return self.scan_radix_integer(16, position, flags),
                Some('o') | Some('O') => return self.scan_radix_integer(8, position, flags),
                Some('b') | Some('B') => return self.scan_radix_integer(2, position, flags),
                Some(d) if self.options.octal && ('0'..='9').contains(&d) => {
                    return self.scan_legacy_octal(position);
                }
                _ => {}
            }
        }

        let mut digits = String::new();
        digits.push(first);
        self.scan_digit_run(&mut digits, &mut flags, |c| c.is_ascii_digit());

        let mut is_float = false;
        if self.peek_char() == Some('.') {
            is_float = true;
            digits.push(self.next_char().unwrap());
            self.scan_digit_run(&mut digits, &mut flags, |c| c.is_ascii_digit());
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            is_float = true;
            flags |= TokenFlags::SCIENTIFIC;
            digits.push(self.next_char().unwrap());
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                digits.push(self.next_char().unwrap());
            }
            self.scan_digit_run(&mut digits, &mut flags, |c| c.is_ascii_digit());
        }

        if !is_float && self.peek_char() == Some('n') {
            self.next_char();
            flags |= TokenFlags::BIG_INT;
        }

        self.check_trailing_letter();

        if is_float {
            let value: f64 = digits.parse().unwrap_or(f64::NAN);
            Token { kind: SyntaxKind::FloatingPoint, position, payload: Payload::Float(FloatingPoint::new(value)), flags }
        } else {
            let value: i64 = digits.parse().unwrap_or(0);
            Token { kind: SyntaxKind::Integer, position, payload: Payload::Integer(Integer::new(value)), flags }
        }
    }

    fn scan_digit_run(&mut self, out: &mut String, flags: &mut TokenFlags, is_digit: impl Fn(char) -> bool) {
        let mut last_was_separator = false;
        let mut last_was_digit = false;
        while let Some(c) = self.peek_char() {
            if is_digit(c) {
                out.push(c);
                self.next_char();
                last_was_digit = true;
                last_was_separator = false;
            } else if c == '_' {
                if !last_was_digit {
                    self.report("misplaced numeric separator");
                }
                self.next_char();
                *flags |= TokenFlags::CONTAINS_SEPARATOR;
                last_was_separator = true;
                last_was_digit = false;
            } else {
                break;
            }
        }
        if last_was_separator {
            self.report("trailing numeric separator");
        }
    }

    fn scan_radix_integer(&mut self, radix: u32, position: Position, mut flags: TokenFlags) -> Token {
        self.next_char(); // consume x/o/b
        let mut digits = String::new();
        let mut saw_bad = false;
        loop {
            match self.peek_char() {
                Some(c) if c.is_digit(radix) => {
                    digits.push(c);
                    self.next_char();
                }
                Some('_') => {
                    flags |= TokenFlags::CONTAINS_SEPARATOR;
                    self.next_char();
                }
                _ => break,
            }
        }
        if digits.is_empty() {
            saw_bad = true;
        }
        self.check_trailing_letter();
        if saw_bad {
            self.report("malformed radix-prefixed integer literal");
            return Token { kind: SyntaxKind::Integer, position, payload: Payload::Integer(Integer::new(-1)), flags };
        }
        let value = i64::from_str_radix(&digits, radix).unwrap_or(-1);
        Token { kind: SyntaxKind::Integer, position, payload: Payload::Integer(Integer::new(value)), flags }
    }

    /// Legacy leading-zero octal: silently promotes to decimal
    /// if an 8/9 digit appears.
    fn scan_legacy_octal(&mut self, position: Position) -> Token {
        let mut digits = String::new();
        let mut promoted = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                if c == '8' || c == '9' {
                    promoted = true;
                }
                digits.push(c);
                self.next_char();
            } else {
                break;
            }
        }
        self.check_trailing_letter();
        let value = if promoted {
            digits.parse::<i64>().unwrap_or(0)
        } else {
            i64::from_str_radix(&digits, 8).unwrap_or(0)
        };
        Token {
            kind: SyntaxKind::Integer,
            position,
            payload: Payload::Integer(Integer::new(value)),
            flags: TokenFlags::OCTAL,
        }
    }

    fn check_trailing_letter(&mut self) {
        if let Some(c) = self.peek_char() {
            if classify(c).contains(CharClass::LETTER) {
                self.report("unexpected letter");
            }
        }
    }

    fn scan_string(&mut self, quote: char, position: Position) -> Token {
        let mut text = String::new();
        let mut flags = TokenFlags::NONE;
        loop {
            match self.next_char() {
                None => {
                    self.report("unterminated string literal");
                    flags |= TokenFlags::UNTERMINATED;
                    break;
                }
                Some(c) if c == quote => break,
                Some(c) if classify(c).contains(CharClass::LINE_TERMINATOR) => {
                    self.report("unterminated string literal: raw line terminator");
                    flags |= TokenFlags::UNTERMINATED;
                    self.push_back(c);
                    break;
                }
                Some('\\') => {
                    if let Some(decoded) = self.scan_escape(&mut flags) {
                        text.push(decoded);
                    }
                }
                Some(c) => text.push(c),
            }
        }
        Token { kind: SyntaxKind::String, position, payload: Payload::String(text), flags }
    }

    /// Decodes one escape sequence after the backslash has been consumed.
    /// Returns `None` for a dropped line-continuation.
    fn scan_escape(&mut self, flags: &mut TokenFlags) -> Option<char> {
        let Some(c) = self.next_char() else {
            self.report("unterminated escape sequence");
            return None;
        };
        match c {
            '\\' => Some('\\'),
            '\'' => Some('\''),
            '"' => Some('"'),
            '`' => Some('`'),
            'b' => Some('\u{0008}'),
            'f' => Some('\u{000C}'),
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            'v' => Some('\u{000B}'),
            '0' => Some('\u{0000}'),
            'e' if self.options.extended_escape_sequences => {
                *flags |= TokenFlags::EXTENDED_ESCAPE;
                Some('\u{001B}')
            }
            'x' => self.scan_hex_escape(2, flags),
            'u' => self.scan_hex_escape(4, flags),
            'U' if self.options.extended_escape_sequences => {
                *flags |= TokenFlags::EXTENDED_ESCAPE;
                self.scan_hex_escape(6, flags)
            }
            '1'..='7' if self.options.extended_escape_sequences => {
                *flags |= TokenFlags::EXTENDED_ESCAPE;
                let mut digits = String::new();
                digits.push(c);
                for _ in 0..2 {
                    match self.peek_char() {
                        Some(d) if ('0'..='7').contains(&d) => {
                            digits.push(d);
                            self.next_char();
                        }
                        _ => break,
                    }
                }
                let value = u32::from_str_radix(&digits, 8).unwrap_or(0);
                char::from_u32(value)
            }
            c if classify(c).contains(CharClass::LINE_TERMINATOR) => None,
            c if c == unicode::LINE_SEPARATOR || c == unicode::PARAGRAPH_SEPARATOR => None,
            other => {
                self.report(format!("unknown escape sequence \\{other}"));
                Some(other)
            }
        }
    }

    fn scan_hex_escape(&mut self, digit_count: usize, _flags: &mut TokenFlags) -> Option<char> {
        let mut digits = String::new();
        for _ in 0..digit_count {
            match self.next_char() {
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                _ => {
                    self.report("malformed hex escape sequence");
                    return None;
                }
            }
        }
        u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)
    }

    fn scan_template_start(&mut self, position: Position) -> Token {
        self.scan_template_body(position, true)
    }

    fn scan_template_body(&mut self, position: Position, is_head: bool) -> Token {
        let mut text = String::new();
        let mut flags = TokenFlags::NONE;
        loop {
            match self.next_char() {
                None => {
                    self.report("unterminated template literal");
                    flags |= TokenFlags::UNTERMINATED;
                    let kind = if is_head { SyntaxKind::Template } else { SyntaxKind::TemplateTail };
                    return Token { kind, position, payload: Payload::String(text), flags };
                }
                Some('`') => {
                    let kind = if is_head { SyntaxKind::Template } else { SyntaxKind::TemplateTail };
                    return Token { kind, position, payload: Payload::String(text), flags };
                }
                Some('$') if self.peek_char() == Some('{') => {
                    self.next_char();
                    let kind = if is_head { SyntaxKind::TemplateHead } else { SyntaxKind::TemplateMiddle };
                    return Token { kind, position, payload: Payload::String(text), flags };
                }
                Some('\\') => {
                    if let Some(decoded) = self.scan_escape(&mut flags) {
                        text.push(decoded);
                    }
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn scan_regex_or_divide(&mut self, position: Position) -> Token {
        let mut body = String::new();
        let mut consumed = Vec::new();
        let mut found_close = false;
        while consumed.len() < REGEX_LOOKAHEAD_CAP {
            match self.next_char() {
                Some(c) => {
                    consumed.push(c);
                    if c == '/' {
                        found_close = true;
                        break;
                    }
                    if classify(c).contains(CharClass::LINE_TERMINATOR) {
                        break;
                    }
                    body.push(c);
                }
                None => break,
            }
        }
        if !found_close {
            for c in consumed.into_iter().rev() {
                self.push_back(c);
            }
            return self.scan_operator('/', position);
        }
        let mut flags_text = String::new();
        while let Some(c) = self.peek_char() {
            if classify(c).contains(CharClass::LETTER) {
                flags_text.push(c);
                self.next_char();
            } else {
                break;
            }
        }
        let mut full = String::from("/");
        full.push_str(&body);
        full.push('/');
        full.push_str(&flags_text);
        Token { kind: SyntaxKind::RegularExpression, position, payload: Payload::String(full), flags: TokenFlags::NONE }
    }

    fn scan_operator(&mut self, first: char, position: Position) -> Token {
        let kind = match first {
            '\u{2208}' => SyntaxKind::In,
            '\u{2227}' => SyntaxKind::LogicalAnd,
            '\u{2248}' => SyntaxKind::AlmostEqual,
            '\u{2254}' => SyntaxKind::Assignment,
            '\u{00D7}' => SyntaxKind::Multiply,
            '\u{221E}' => {
                return Token {
                    kind: SyntaxKind::FloatingPoint,
                    position,
                    payload: Payload::Float(FloatingPoint::new(f64::INFINITY)),
                    flags: TokenFlags::NONE,
                };
            }
            '\u{FFFD}' => {
                return Token {
                    kind: SyntaxKind::FloatingPoint,
                    position,
                    payload: Payload::Float(FloatingPoint::new(f64::NAN)),
                    flags: TokenFlags::NONE,
                };
            }
            '+' => self.two_char('+', SyntaxKind::Increment, '=', SyntaxKind::AssignmentAdd, SyntaxKind::Add),
            '-' => self.two_char('-', SyntaxKind::Decrement, '=', SyntaxKind::AssignmentSubtract, SyntaxKind::Subtract),
            '*' => {
                if self.peek_char() == Some('*') {
                    self.next_char();
                    if self.peek_char() == Some('=') {
                        self.next_char();
                        SyntaxKind::AssignmentPower
                    } else {
                        SyntaxKind::Power
                    }
                } else {
                    self.eq_variant(SyntaxKind::AssignmentMultiply, SyntaxKind::Multiply)
                }
            }
            '/' => self.eq_variant(SyntaxKind::AssignmentDivide, SyntaxKind::Divide),
            '%' => self.eq_variant(SyntaxKind::AssignmentModulo, SyntaxKind::Modulo),
            '&' => {
                if self.peek_char() == Some('&') {
                    self.next_char();
                    self.eq_variant(SyntaxKind::AssignmentLogicalAnd, SyntaxKind::LogicalAnd)
                } else {
                    self.eq_variant(SyntaxKind::AssignmentBitwiseAnd, SyntaxKind::BitwiseAnd)
                }
            }
            '|' => {
                if self.peek_char() == Some('|') {
                    self.next_char();
                    self.eq_variant(SyntaxKind::AssignmentLogicalOr, SyntaxKind::LogicalOr)
                } else {
                    self.eq_variant(SyntaxKind::AssignmentBitwiseOr, SyntaxKind::BitwiseOr)
                }
            }
            '^' => self.eq_variant(SyntaxKind::AssignmentBitwiseXor, SyntaxKind::BitwiseXor),
            '~' => SyntaxKind::BitwiseNot,
            '!' => {
                if self.peek_char() == Some('=') {
                    self.next_char();
                    if self.peek_char() == Some('=') {
                        self.next_char();
                        SyntaxKind::StrictlyNotEqual
                    } else {
                        SyntaxKind::NotEqual
                    }
                } else {
                    SyntaxKind::LogicalNot
                }
            }
            '=' => {
                if self.options.extended_operators & 0b10 != 0 {
                    self.report("plain '=' disabled by extended_operators");
                }
                if self.peek_char() == Some('=') {
                    self.next_char();
                    if self.peek_char() == Some('=') {
                        self.next_char();
                        SyntaxKind::StrictlyEqual
                    } else {
                        SyntaxKind::Equal
                    }
                } else {
                    SyntaxKind::Assignment
                }
            }
            '<' => {
                if self.peek_char() == Some('<') {
                    self.next_char();
                    self.eq_variant(SyntaxKind::AssignmentShiftLeft, SyntaxKind::ShiftLeft)
                } else if self.peek_char() == Some('=') {
                    self.next_char();
                    SyntaxKind::LessEqual
                } else if self.peek_char() == Some('>') && self.options.extended_operators & 0b01 != 0 {
                    self.next_char();
                    SyntaxKind::NotEqual
                } else if self.peek_char() == Some('>') {
                    self.report("'<>' requires extended_operators");
                    self.next_char();
                    SyntaxKind::NotEqual
                } else {
                    SyntaxKind::Less
                }
            }
            '>' => {
                if self.peek_char() == Some('>') {
                    self.next_char();
                    if self.peek_char() == Some('>') {
                        self.next_char();
                        self.eq_variant(SyntaxKind::AssignmentShiftRightUnsigned, SyntaxKind::ShiftRightUnsigned)
                    } else {
                        self.eq_variant(SyntaxKind::AssignmentShiftRight, SyntaxKind::ShiftRight)
                    }
                } else if self.peek_char() == Some('=') {
                    self.next_char();
                    SyntaxKind::GreaterEqual
                } else {
                    SyntaxKind::Greater
                }
            }
            ':' => {
                if self.peek_char() == Some('=') && self.options.extended_operators & 0b01 != 0 {
                    self.next_char();
                    SyntaxKind::Assignment
                } else if self.peek_char() == Some('=') {
                    self.report("':=' requires extended_operators");
                    self.next_char();
                    SyntaxKind::Assignment
                } else {
                    SyntaxKind::Colon
                }
            }
            '(' => SyntaxKind::LeftParen,
            ')' => SyntaxKind::RightParen,
            '{' => SyntaxKind::LeftBrace,
            '}' => SyntaxKind::RightBrace,
            '[' => SyntaxKind::LeftBracket,
            ']' => SyntaxKind::RightBracket,
            ',' => SyntaxKind::Comma,
            ';' => SyntaxKind::Semicolon,
            '.' => SyntaxKind::Dot,
            '?' => SyntaxKind::QuestionMark,
            _ => {
                self.report(format!("unknown punctuation '{first}'"));
                SyntaxKind::Unknown
            }
        };
        Token { kind, position, payload: Payload::None, flags: TokenFlags::NONE }
    }

    fn eq_variant(&mut self, with_eq: SyntaxKind, without: SyntaxKind) -> SyntaxKind {
        if self.peek_char() == Some('=') {
            self.next_char();
            with_eq
        } else {
            without
        }
    }

    fn two_char(&mut self, doubled: char, doubled_kind: SyntaxKind, eq: char, eq_kind: SyntaxKind, plain: SyntaxKind) -> SyntaxKind {
        if self.peek_char() == Some(doubled) {
            self.next_char();
            doubled_kind
        } else if self.peek_char() == Some(eq) {
            self.next_char();
            eq_kind
        } else {
            plain
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str, options: LexerOptions) -> (Vec<Token>, DiagnosticSink) {
        let sink = DiagnosticSink::new();
        let mut tokens = Vec::new();
        {
            let mut lexer = Lexer::new(source, "test.js", options, &sink);
            loop {
                let token = lexer.get_next_token(true);
                let is_eof = token.kind == SyntaxKind::Eof;
                tokens.push(token);
                if is_eof {
                    break;
                }
            }
        }
        (tokens, sink)
    }

    #[test]
    fn comment_then_escaped_string() {
        let (tokens, _) = lex_all("/* comment */ 'he\\tllo'", LexerOptions::default());
        assert_eq!(tokens[0].kind, SyntaxKind::String);
        assert_eq!(tokens[0].payload, Payload::String("he\tllo".to_string()));
    }

    #[test]
    fn template_head_and_tail() {
        let (tokens, _) = lex_all("`Hi ${", LexerOptions::default());
        assert_eq!(tokens[0].kind, SyntaxKind::TemplateHead);
        assert_eq!(tokens[0].payload, Payload::String("Hi ".to_string()));

        let sink = DiagnosticSink::new();
        let mut lexer = Lexer::new("name}!`", "test.js", LexerOptions::default(), &sink);
        let ident = lexer.get_next_token(false);
        assert_eq!(ident.kind, SyntaxKind::Identifier);
        // consume the closing '}' of the substitution manually, as the parser would
        assert_eq!(lexer.next_char(), Some('}'));
        let tail = lexer.get_next_template_token();
        assert_eq!(tail.kind, SyntaxKind::TemplateTail);
        assert_eq!(tail.payload, Payload::String("!".to_string()));
    }

    #[test]
    fn binary_literal_with_separators() {
        let (tokens, sink) = lex_all("0b1010_0101", LexerOptions::default());
        assert_eq!(tokens[0].kind, SyntaxKind::Integer);
        assert_eq!(tokens[0].payload, Payload::Integer(Integer::new(165)));
        assert_eq!(sink.error_count(), 0);
    }

    #[test]
    fn malformed_binary_literal_reports_and_returns_negative_one() {
        let (tokens, sink) = lex_all("0b__", LexerOptions::default());
        assert_eq!(tokens[0].kind, SyntaxKind::Integer);
        assert_eq!(tokens[0].payload, Payload::Integer(Integer::new(-1)));
        assert!(sink.error_count() >= 1);
    }

    #[test]
    fn number_followed_by_letter_reports_and_still_yields_number() {
        let (tokens, sink) = lex_all("123abc", LexerOptions::default());
        assert_eq!(tokens[0].kind, SyntaxKind::Integer);
        assert_eq!(tokens[0].payload, Payload::Integer(Integer::new(123)));
        assert!(sink.error_count() >= 1);
        assert_eq!(tokens[1].kind, SyntaxKind::Identifier);
    }

    #[test]
    fn regex_lexed_when_allowed_divide_otherwise() {
        let sink = DiagnosticSink::new();
        let mut lexer = Lexer::new("/abc/g", "test.js", LexerOptions::default(), &sink);
        let token = lexer.get_next_token(true);
        assert_eq!(token.kind, SyntaxKind::RegularExpression);

        let sink2 = DiagnosticSink::new();
        let mut lexer2 = Lexer::new("/ 2", "test.js", LexerOptions::default(), &sink2);
        let token2 = lexer2.get_next_token(false);
        assert_eq!(token2.kind, SyntaxKind::Divide);
    }
}
