//! Keyword and special-identifier lookup.
//!
//! Match the assembled identifier string against the reserved-word table,
//! falling back to a plain `Identifier` kind.

use crate::compiler::ast::SyntaxKind;

/// Looks up `text` against the reserved-word table. Returns `None` for
/// ordinary identifiers.
pub fn lookup_keyword(text: &str) -> Option<SyntaxKind> {
    Some(match text {
        "var" => SyntaxKind::Var,
        "let" => SyntaxKind::Let,
        "const" => SyntaxKind::Const,
        "function" => SyntaxKind::Function,
        "class" => SyntaxKind::Class,
        "interface" => SyntaxKind::Interface,
        "enum" => SyntaxKind::Enum,
        "namespace" => SyntaxKind::Namespace,
        "import" => SyntaxKind::Import,
        "export" => SyntaxKind::Export,
        "if" => SyntaxKind::If,
        "while" => SyntaxKind::While,
        "do" => SyntaxKind::DoWhile,
        "for" => SyntaxKind::For,
        "break" => SyntaxKind::Break,
        "continue" => SyntaxKind::Continue,
        "return" => SyntaxKind::Return,
        "throw" => SyntaxKind::Throw,
        "try" => SyntaxKind::Try,
        "catch" => SyntaxKind::Catch,
        "finally" => SyntaxKind::Finally,
        "switch" => SyntaxKind::Switch,
        "case" => SyntaxKind::Case,
        "default" => SyntaxKind::Default,
        "new" => SyntaxKind::New,
        "delete" => SyntaxKind::Delete,
        "typeof" => SyntaxKind::TypeOf,
        "instanceof" => SyntaxKind::InstanceOf,
        "in" => SyntaxKind::In,
        "void" => SyntaxKind::Void,
        "as" => SyntaxKind::As,
        "yield" => SyntaxKind::Yield,
        "await" => SyntaxKind::Await,
        "true" => SyntaxKind::True,
        "false" => SyntaxKind::False,
        "null" => SyntaxKind::Null,
        "undefined" => SyntaxKind::Undefined,
        "abstract" => SyntaxKind::Abstract,
        "static" => SyntaxKind::Static,
        "virtual" => SyntaxKind::Virtual,
        "constructor" => SyntaxKind::Constructor,
        "inline" => SyntaxKind::Inline,
        "native" => SyntaxKind::Native,
        "public" => SyntaxKind::Public,
        "private" => SyntaxKind::Private,
        "protected" => SyntaxKind::Protected,
        "extends" => SyntaxKind::Extends,
        "implements" => SyntaxKind::Implements,
        "super" => SyntaxKind::Super,
        "this" => SyntaxKind::This,
        "get" => SyntaxKind::Get,
        "set" => SyntaxKind::Set,
        "async" => SyntaxKind::Async,
        "require" => SyntaxKind::Require,
        "ensure" => SyntaxKind::Ensure,
        "require_else" => SyntaxKind::RequireElse,
        "ensure_then" => SyntaxKind::EnsureThen,
        "foreach" => SyntaxKind::Foreach,
        "nobreak" => SyntaxKind::Nobreak,
        "autobreak" => SyntaxKind::Autobreak,
        _ => return None,
    })
}

/// Special identifiers that are not reserved words but are given dedicated
/// literal kinds.
pub enum SpecialIdentifier {
    Infinity,
    NaN,
}

pub fn lookup_special_identifier(text: &str) -> Option<SpecialIdentifier> {
    match text {
        "Infinity" => Some(SpecialIdentifier::Infinity),
        "NaN" => Some(SpecialIdentifier::NaN),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_reserved_words() {
        assert_eq!(lookup_keyword("function"), Some(SyntaxKind::Function));
        assert_eq!(lookup_keyword("totallyARegularName"), None);
    }

    #[test]
    fn recognizes_infinity_and_nan() {
        assert!(matches!(lookup_special_identifier("Infinity"), Some(SpecialIdentifier::Infinity)));
        assert!(lookup_special_identifier("regular").is_none());
    }
}
