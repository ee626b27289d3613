use std::num::NonZero;
use std::sync::atomic::{AtomicU32, Ordering};

/// ID of a node.
///
/// IDs are allocated from a process-wide counter when a node is created, so
/// nodes in different graphs, including the bodies of control-flow
/// operators, never share an ID.
#[derive(Copy, Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(NonZero<u32>);

impl NodeId {
    /// Allocate a new ID.
    pub(crate) fn next() -> NodeId {
        static NEXT_ID: AtomicU32 = AtomicU32::new(1);

        // Wrapping past `u32::MAX` skips zero, which is reserved as a niche
        // so that `Option<NodeId>` is the same size as `NodeId`.
        loop {
            let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
            if let Some(id) = NonZero::new(id) {
                return NodeId(id);
            }
        }
    }

    /// Return the underlying u32 value of the ID.
    pub fn as_u32(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_u32().fmt(f)
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.as_u32())
    }
}
