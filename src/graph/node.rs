use std::any::Any;
use std::rc::Rc;

use crate::graph::context::RenderNodeContext;
use crate::graph::op::RenderNodeOperation;

/// Shared lifecycle state embedded in every render node: the disposed flag,
/// the dirty flag set by `update`, and the operations cached by the last
/// `process` call.
#[derive(Debug, Default)]
pub struct NodeState {
    pub(crate) disposed: bool,
    pub(crate) dirty: bool,
    pub(crate) cache: Option<Vec<Rc<RenderNodeOperation>>>,
}

impl NodeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Invalidate cached operations; the next processing pass re-runs
    /// `process` for this node.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn cached_ops(&self) -> Option<&[Rc<RenderNodeOperation>]> {
        self.cache.as_deref()
    }
}

/// Dispose helper shared by node implementations: drops the cached
/// operations (disposing them when the node owns them) and sets the
/// disposed flag. Idempotent.
pub(crate) fn dispose_state(state: &mut NodeState, owns_operations: bool) {
    if state.disposed {
        return;
    }
    state.disposed = true;
    if let Some(ops) = state.cache.take()
        && owns_operations
    {
        for op in &ops {
            op.dispose();
        }
    }
}

/// A node in the retained render graph.
///
/// `process` must be a deterministic function of the node's construction
/// parameters and `context.input`, and must not panic for well-formed
/// input: allocation failures degrade to an empty operation list with a
/// logged error. Per-type `equals`/`update` inherent methods carry the
/// reuse contract; they are not part of this trait because their argument
/// lists differ per node.
pub trait RenderNode: 'static {
    fn state(&self) -> &NodeState;

    fn state_mut(&mut self) -> &mut NodeState;

    /// Produce this node's operations from its parameters and the upstream
    /// operations in `context`.
    fn process(&mut self, context: &mut RenderNodeContext<'_>) -> Vec<Rc<RenderNodeOperation>>;

    /// Release operations and cascade to children. Idempotent.
    fn dispose(&mut self);

    /// Stable node-kind tag used for reconciliation matching and logging.
    fn kind(&self) -> &'static str;

    /// False for pass-through nodes whose cached operations are created
    /// (and therefore disposed) by other nodes.
    fn owns_operations(&self) -> bool {
        true
    }

    /// Child list, for nodes that reconcile and process a subtree.
    fn as_container(&self) -> Option<&ContainerRenderNode> {
        None
    }

    fn as_container_mut(&mut self) -> Option<&mut ContainerRenderNode> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn is_disposed(&self) -> bool {
        self.state().is_disposed()
    }
}

/// Composite node owning an ordered child list. Produces no drawing itself:
/// `process` passes the upstream operations through unchanged. The
/// container exists so the reconciler can match subtrees positionally and
/// so disposal cascades depth-first.
#[derive(Default)]
pub struct ContainerRenderNode {
    state: NodeState,
    children: Vec<Box<dyn RenderNode>>,
}

impl ContainerRenderNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> &[Box<dyn RenderNode>] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [Box<dyn RenderNode>] {
        &mut self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn add_child(&mut self, node: Box<dyn RenderNode>) {
        self.children.push(node);
    }

    /// Replace the child at `index`, returning the previous occupant so the
    /// caller can untrack and dispose it. Sibling indices are unaffected.
    pub fn set_child(&mut self, index: usize, node: Box<dyn RenderNode>) -> Box<dyn RenderNode> {
        std::mem::replace(&mut self.children[index], node)
    }

    /// Remove `count` children starting at `start`, returning them for
    /// untracking. Out-of-range tails are clamped.
    pub fn remove_range(&mut self, start: usize, count: usize) -> Vec<Box<dyn RenderNode>> {
        let start = start.min(self.children.len());
        let end = start.saturating_add(count).min(self.children.len());
        self.children.drain(start..end).collect()
    }

    /// Move all children out, leaving this container empty.
    pub fn take_children(&mut self) -> Vec<Box<dyn RenderNode>> {
        std::mem::take(&mut self.children)
    }

    /// Adopt `old`'s children, preserving the subtree when the reconciler
    /// swaps one wrapper node for another.
    pub fn bring_from(&mut self, old: &mut ContainerRenderNode) {
        self.children = old.take_children();
    }

    /// Dispose every child depth-first, then clear the child list.
    pub(crate) fn dispose_children(&mut self) {
        for child in &mut self.children {
            child.dispose();
        }
        self.children.clear();
    }
}

impl RenderNode for ContainerRenderNode {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    fn process(&mut self, context: &mut RenderNodeContext<'_>) -> Vec<Rc<RenderNodeOperation>> {
        context.take_input()
    }

    fn dispose(&mut self) {
        if self.state.disposed {
            return;
        }
        self.dispose_children();
        dispose_state(&mut self.state, false);
    }

    fn kind(&self) -> &'static str {
        "container"
    }

    fn owns_operations(&self) -> bool {
        false
    }

    fn as_container(&self) -> Option<&ContainerRenderNode> {
        Some(self)
    }

    fn as_container_mut(&mut self) -> Option<&mut ContainerRenderNode> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
