use std::rc::Rc;

use crate::canvas::SurfaceFactory;
use crate::graph::op::RenderNodeOperation;

/// Per-process input: the operations produced by the previous stage plus a
/// borrowed surface factory. Created fresh for every
/// [`RenderNode::process`](crate::graph::node::RenderNode::process) call and
/// never persisted.
pub struct RenderNodeContext<'a> {
    factory: &'a dyn SurfaceFactory,
    input: Vec<Rc<RenderNodeOperation>>,
}

impl<'a> RenderNodeContext<'a> {
    pub fn new(factory: &'a dyn SurfaceFactory, input: Vec<Rc<RenderNodeOperation>>) -> Self {
        Self { factory, input }
    }

    pub fn factory(&self) -> &'a dyn SurfaceFactory {
        self.factory
    }

    /// Ordered upstream operations.
    pub fn input(&self) -> &[Rc<RenderNodeOperation>] {
        &self.input
    }

    /// Consume the upstream operations (pass-through and wrapper nodes).
    pub fn take_input(&mut self) -> Vec<Rc<RenderNodeOperation>> {
        std::mem::take(&mut self.input)
    }
}
