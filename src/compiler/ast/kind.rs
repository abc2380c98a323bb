//! Every tag a [`Node`](super::node::Node) can carry.
//!
//! A single flat enum (see DESIGN.md for how this superseded an earlier
//! split draft). Grouped by category; order within a group is alphabetical
//! except where a sentinel needs a fixed position.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    // Sentinels
    Unknown,
    Eof,

    // Operators (binary arithmetic / bitwise / logical)
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    ShiftLeft,
    ShiftRight,
    ShiftRightUnsigned,
    RotateLeft,
    RotateRight,
    LogicalAnd,
    LogicalOr,
    LogicalNot,
    LogicalXor,
    Negate,
    Identity,
    Increment,
    Decrement,
    Assignment,
    AssignmentAdd,
    AssignmentSubtract,
    AssignmentMultiply,
    AssignmentDivide,
    AssignmentModulo,
    AssignmentPower,
    AssignmentBitwiseAnd,
    AssignmentBitwiseOr,
    AssignmentBitwiseXor,
    AssignmentShiftLeft,
    AssignmentShiftRight,
    AssignmentShiftRightUnsigned,
    AssignmentLogicalAnd,
    AssignmentLogicalOr,

    // Comparison / three-way compare
    Compare,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AlmostEqual,
    StrictlyEqual,
    StrictlyNotEqual,
    Minimum,
    Maximum,
    AbsoluteValue,

    // Control-flow IR/primitives (also used as node kinds for statements)
    If,
    IfTrue,
    IfFalse,
    Goto,
    Label,
    While,
    DoWhile,
    For,
    ForIn,
    ForOf,
    Break,
    Continue,
    Return,
    Throw,
    Try,
    Catch,
    Finally,
    Switch,
    Case,
    Default,
    Block,
    Directive,
    DirectiveList,
    Package,
    Program,
    Root,
    Empty,

    // Declarations
    Var,
    Let,
    Const,
    Function,
    Parameter,
    ParamMatch,
    Class,
    Interface,
    Enum,
    EnumMember,
    Namespace,
    Import,
    Export,
    VariableList,

    // Expressions
    Call,
    New,
    Array,
    ArrayLiteral,
    ObjectLiteral,
    Property,
    Member,
    Index,
    Conditional,
    Comma,
    Colon,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Semicolon,
    Dot,
    QuestionMark,
    Sequence,
    Spread,
    TemplateHead,
    TemplateMiddle,
    TemplateTail,
    Template,
    TaggedTemplate,
    RegularExpression,
    Yield,
    Await,
    Delete,
    TypeOf,
    InstanceOf,
    In,
    Void,
    As,
    VarAttributes,

    // Literals / identifiers
    Integer,
    FloatingPoint,
    String,
    Boolean,
    True,
    False,
    Null,
    Undefined,
    NaNLiteral,
    InfinityLiteral,
    Identifier,
    VIdentifier,
    PrivateIdentifier,

    // Keywords used as modifiers/reserved words
    Abstract,
    Static,
    Virtual,
    Constructor,
    Inline,
    Native,
    Public,
    Private,
    Protected,
    Extends,
    Implements,
    Super,
    This,
    Get,
    Set,
    Async,
    Require,
    Ensure,
    RequireElse,
    EnsureThen,
    Foreach,
    Nobreak,
    Autobreak,
    ConditionalCompilationTrue,
    ConditionalCompilationFalse,

    Count,
}

impl SyntaxKind {
    /// Whether this kind may carry an [`crate::literal::Integer`] payload.
    pub fn accepts_integer_payload(self) -> bool {
        matches!(self, SyntaxKind::Integer)
    }

    /// Whether this kind may carry a [`crate::literal::FloatingPoint`] payload.
    pub fn accepts_float_payload(self) -> bool {
        matches!(self, SyntaxKind::FloatingPoint)
    }

    /// Whether this kind may carry a string payload (literal text,
    /// identifier name, or label name).
    pub fn accepts_string_payload(self) -> bool {
        matches!(
            self,
            SyntaxKind::String
                | SyntaxKind::Identifier
                | SyntaxKind::VIdentifier
                | SyntaxKind::PrivateIdentifier
                | SyntaxKind::Label
                | SyntaxKind::Template
                | SyntaxKind::TemplateHead
                | SyntaxKind::TemplateMiddle
                | SyntaxKind::TemplateTail
                | SyntaxKind::RegularExpression
        )
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            SyntaxKind::Integer
                | SyntaxKind::FloatingPoint
                | SyntaxKind::String
                | SyntaxKind::True
                | SyntaxKind::False
                | SyntaxKind::Null
                | SyntaxKind::Undefined
        )
    }

    pub fn is_boolean_literal(self) -> bool {
        matches!(self, SyntaxKind::True | SyntaxKind::False)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_acceptance_is_exclusive_per_kind() {
        assert!(SyntaxKind::Integer.accepts_integer_payload());
        assert!(!SyntaxKind::Integer.accepts_string_payload());
        assert!(SyntaxKind::Identifier.accepts_string_payload());
        assert!(!SyntaxKind::Identifier.accepts_integer_payload());
    }

    #[test]
    fn literal_classification() {
        assert!(SyntaxKind::True.is_literal());
        assert!(SyntaxKind::True.is_boolean_literal());
        assert!(!SyntaxKind::Identifier.is_literal());
    }
}
