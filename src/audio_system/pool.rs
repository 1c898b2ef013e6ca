/// Gain node pool
///
/// Bounded free-list of idle per-sound gain nodes. Acquiring hands out an
/// owned node; releasing puts it back unless the list is already full, in
/// which case the node is dropped.
use super::backend::GainNode;

pub struct GainNodePool {
    free: Vec<Box<dyn GainNode>>,
    capacity: usize,
}

impl GainNodePool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Take an idle node, if any
    pub fn acquire(&mut self) -> Option<Box<dyn GainNode>> {
        self.free.pop()
    }

    /// Return a node for reuse
    pub fn release(&mut self, node: Box<dyn GainNode>) {
        if self.free.len() < self.capacity {
            self.free.push(node);
        }
    }

    /// Number of idle nodes
    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every idle node
    pub fn clear(&mut self) {
        self.free.clear();
    }
}

impl std::fmt::Debug for GainNodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GainNodePool")
            .field("idle", &self.free.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
