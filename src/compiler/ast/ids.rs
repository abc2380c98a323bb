/// Stable index into an [`Arena`](super::node::Arena). Used instead of
/// pointers for every non-owning cross-link (parent, type-node, instance,
/// goto, variables, labels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}
