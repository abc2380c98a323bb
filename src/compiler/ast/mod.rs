//! The AST node model: kinds, flags, attributes, and the arena that owns nodes.

pub mod attributes;
pub mod ids;
pub mod kind;
pub mod node;
pub mod node_flags;

pub use attributes::{Attribute, Group};
pub use ids::NodeId;
pub use kind::SyntaxKind;
pub use node::{Arena, CompareMode, CompareResult2, Node, NodeLock, Payload};
pub use node_flags::{flag_allowed_on, NodeFlags};
