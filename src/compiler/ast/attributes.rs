//! Node attributes and their five mutual-exclusion groups.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    // conditional-compilation
    True,
    False,

    // function-type
    Abstract,
    Static,
    Virtual,
    Constructor,
    Inline,
    Native,

    // function-contract
    RequireElse,
    EnsureThen,

    // switch-type
    Foreach,
    Nobreak,
    Autobreak,

    // member-visibility
    Public,
    Private,
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    ConditionalCompilation,
    FunctionType,
    FunctionContract,
    SwitchType,
    MemberVisibility,
}

impl Attribute {
    pub fn group(self) -> Group {
        match self {
            Attribute::True | Attribute::False => Group::ConditionalCompilation,
            Attribute::Abstract
            | Attribute::Static
            | Attribute::Virtual
            | Attribute::Constructor
            | Attribute::Inline
            | Attribute::Native => Group::FunctionType,
            Attribute::RequireElse | Attribute::EnsureThen => Group::FunctionContract,
            Attribute::Foreach | Attribute::Nobreak | Attribute::Autobreak => Group::SwitchType,
            Attribute::Public | Attribute::Private | Attribute::Protected => {
                Group::MemberVisibility
            }
        }
    }

    /// Documented exceptions within function-type: `Native` may coexist with
    /// `Constructor`, `Virtual`, or `Static`; `Static` may coexist with
    /// `Inline`.
    pub fn compatible_with(self, other: Attribute) -> bool {
        if self == other {
            return true;
        }
        if self.group() != other.group() {
            return true;
        }
        matches!(
            (self, other),
            (Attribute::Native, Attribute::Constructor)
                | (Attribute::Constructor, Attribute::Native)
                | (Attribute::Native, Attribute::Virtual)
                | (Attribute::Virtual, Attribute::Native)
                | (Attribute::Native, Attribute::Static)
                | (Attribute::Static, Attribute::Native)
                | (Attribute::Static, Attribute::Inline)
                | (Attribute::Inline, Attribute::Static)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_group_conflicts_unless_documented_exception() {
        assert!(!Attribute::Public.compatible_with(Attribute::Private));
        assert!(Attribute::Native.compatible_with(Attribute::Constructor));
        assert!(Attribute::Static.compatible_with(Attribute::Inline));
        assert!(!Attribute::Abstract.compatible_with(Attribute::Virtual));
    }

    #[test]
    fn different_groups_never_conflict() {
        assert!(Attribute::Public.compatible_with(Attribute::Static));
        assert!(Attribute::True.compatible_with(Attribute::Foreach));
    }
}
