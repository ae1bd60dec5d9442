//! Processing pass: walks the node tree depth-first, reuses cached
//! operations for clean nodes and re-runs [`RenderNode::process`] where a
//! node is dirty or its subtree produced fresh operations.

use std::rc::Rc;

use crate::canvas::{Canvas, SurfaceFactory};
use crate::foundation::core::Point;
use crate::graph::context::RenderNodeContext;
use crate::graph::node::RenderNode;
use crate::graph::op::RenderNodeOperation;

/// Runs processing passes over a node tree with a borrowed surface factory.
pub struct RenderNodeProcessor<'a> {
    factory: &'a dyn SurfaceFactory,
}

impl<'a> RenderNodeProcessor<'a> {
    pub fn new(factory: &'a dyn SurfaceFactory) -> Self {
        Self { factory }
    }

    /// Produce the flattened operation list for `root`. Clean nodes with a
    /// cache are skipped entirely; a second pass over an unchanged tree
    /// returns the same `Rc` operations without calling `process` once.
    #[tracing::instrument(skip_all)]
    pub fn process(&self, root: &mut dyn RenderNode) -> Vec<Rc<RenderNodeOperation>> {
        self.process_node(root).0
    }

    /// Returns the node's operations plus whether they were rebuilt this
    /// pass (fresh operations force ancestors to reprocess).
    fn process_node(&self, node: &mut dyn RenderNode) -> (Vec<Rc<RenderNodeOperation>>, bool) {
        if node.is_disposed() {
            tracing::error!(kind = node.kind(), "processed a disposed node");
            return (Vec::new(), false);
        }

        let mut input = Vec::new();
        let mut subtree_fresh = false;
        if let Some(container) = node.as_container_mut() {
            for child in container.children_mut() {
                let (ops, fresh) = self.process_node(child.as_mut());
                subtree_fresh |= fresh;
                input.extend(ops);
            }
        }

        let reuse = !node.state().is_dirty()
            && !subtree_fresh
            && node.state().cached_ops().is_some();
        if reuse {
            let cached = node
                .state()
                .cached_ops()
                .map(<[_]>::to_vec)
                .unwrap_or_default();
            return (cached, false);
        }

        let owns = node.owns_operations();
        if let Some(old) = node.state_mut().cache.take()
            && owns
        {
            for op in &old {
                op.dispose();
            }
        }

        let mut context = RenderNodeContext::new(self.factory, input);
        let ops = node.process(&mut context);
        let state = node.state_mut();
        state.cache = Some(ops.clone());
        state.dirty = false;
        (ops, true)
    }
}

/// Render `ops` in order onto `canvas`. A failing operation is logged and
/// skipped; later operations still render.
pub fn render_ops(
    ops: &[Rc<RenderNodeOperation>],
    canvas: &mut dyn Canvas,
    factory: &dyn SurfaceFactory,
) {
    for op in ops {
        if let Err(error) = op.render(canvas, factory) {
            tracing::error!(%error, bounds = ?op.bounds(), "operation failed to render");
        }
    }
}

/// True when `point` hits any operation, testing topmost (last-rendered)
/// first.
pub fn hit_test_ops(ops: &[Rc<RenderNodeOperation>], point: Point) -> bool {
    ops.iter().rev().any(|op| op.hit_test(point))
}
