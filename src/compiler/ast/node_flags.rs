//! Per-kind node flags.
//!
//! The flag catalogue this toolchain's node kinds actually need, grounded in
//! as2js `node.h`'s `flag_t`, kept as a `bitflags!` struct.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u32 {
        const NONE                    = 0;

        // Catch
        const CATCH_TYPED             = 1 << 0;

        // Function
        const FUNCTION_GETTER         = 1 << 1;
        const FUNCTION_SETTER         = 1 << 2;
        const FUNCTION_OUT            = 1 << 3;
        const FUNCTION_NEVER          = 1 << 4;

        // Variable / Var / Let / Const
        const VARIABLE_CONST          = 1 << 5;
        const VARIABLE_DEFINED        = 1 << 6;
        const VARIABLE_DEFINING       = 1 << 7;
        const VARIABLE_TOADD          = 1 << 8;

        // Identifier / Class / String / VIdentifier
        const IDENTIFIER_WITH         = 1 << 9;
        const IDENTIFIER_TYPED        = 1 << 10;

        // For
        const FOR_IN                  = 1 << 11;

        // Switch
        const SWITCH_DEFAULT          = 1 << 12;

        // Param (function parameters)
        const PARAM_CONST             = 1 << 13;
        const PARAM_IN                = 1 << 14;
        const PARAM_OUT               = 1 << 15;
        const PARAM_UNCHECKED         = 1 << 16;
        const PARAM_UNPROTOTYPED      = 1 << 17;
        const PARAM_REST              = 1 << 18;

        // Enum
        const ENUM_CLASS              = 1 << 19;

        // Import
        const IMPORT_IMPLEMENTS       = 1 << 20;

        // Package / Directive list
        const DIRECTIVE_LIST_NEW_VARIABLES = 1 << 21;

        // Node bookkeeping, available on any kind
        const EXECUTED                = 1 << 22;
        const MODIFIED                = 1 << 23;
    }
}

/// Which kinds a given flag is legal on. Catalogued per-flag; falls through
/// to "any kind" for bookkeeping flags.
pub fn flag_allowed_on(flag: NodeFlags, kind: super::kind::SyntaxKind) -> bool {
    use super::kind::SyntaxKind as K;
    match flag {
        NodeFlags::CATCH_TYPED => kind == K::Catch,
        NodeFlags::FUNCTION_GETTER
        | NodeFlags::FUNCTION_SETTER
        | NodeFlags::FUNCTION_OUT
        | NodeFlags::FUNCTION_NEVER => kind == K::Function,
        NodeFlags::VARIABLE_CONST
        | NodeFlags::VARIABLE_DEFINED
        | NodeFlags::VARIABLE_DEFINING
        | NodeFlags::VARIABLE_TOADD => matches!(kind, K::Var | K::Let | K::Const),
        NodeFlags::IDENTIFIER_WITH | NodeFlags::IDENTIFIER_TYPED => {
            matches!(kind, K::Identifier | K::Class | K::String | K::VIdentifier)
        }
        NodeFlags::FOR_IN => kind == K::For,
        NodeFlags::SWITCH_DEFAULT => kind == K::Switch,
        NodeFlags::PARAM_CONST
        | NodeFlags::PARAM_IN
        | NodeFlags::PARAM_OUT
        | NodeFlags::PARAM_UNCHECKED
        | NodeFlags::PARAM_UNPROTOTYPED
        | NodeFlags::PARAM_REST => kind == K::Parameter,
        NodeFlags::ENUM_CLASS => kind == K::Enum,
        NodeFlags::IMPORT_IMPLEMENTS => kind == K::Import,
        NodeFlags::DIRECTIVE_LIST_NEW_VARIABLES => kind == K::DirectiveList,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::kind::SyntaxKind as K;

    #[test]
    fn catch_typed_only_on_catch() {
        assert!(flag_allowed_on(NodeFlags::CATCH_TYPED, K::Catch));
        assert!(!flag_allowed_on(NodeFlags::CATCH_TYPED, K::Function));
    }

    #[test]
    fn identifier_with_spans_documented_kinds() {
        for k in [K::Identifier, K::Class, K::String, K::VIdentifier] {
            assert!(flag_allowed_on(NodeFlags::IDENTIFIER_WITH, k));
        }
        assert!(!flag_allowed_on(NodeFlags::IDENTIFIER_WITH, K::Function));
    }
}
