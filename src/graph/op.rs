use std::cell::{Cell, RefCell};
use std::fmt;

use crate::canvas::{Canvas, SurfaceFactory};
use crate::foundation::{
    core::{Point, Rect, rect_is_empty},
    error::LimnResult,
};

/// Drawing callback of an operation. Receives the destination canvas plus
/// the borrowed surface factory for offscreen work (filter compositing).
pub type RenderFn = Box<dyn Fn(&mut dyn Canvas, &dyn SurfaceFactory) -> LimnResult<()>>;

/// Hit-test predicate of an operation.
pub type HitTestFn = Box<dyn Fn(Point) -> bool>;

/// Disposer for resources captured by an operation. Runs exactly once.
pub type DisposeFn = Box<dyn FnOnce()>;

/// An immutable drawing instruction produced by [`RenderNode::process`].
///
/// `bounds` is a conservative, non-shrinking superset of everything the
/// render callback draws. The callback is idempotent and may run any number
/// of times until the operation is disposed; rendering after dispose is a
/// programming error (asserted in debug builds).
///
/// [`RenderNode::process`]: crate::graph::node::RenderNode::process
pub struct RenderNodeOperation {
    bounds: Rect,
    render: RenderFn,
    hit_test: Option<HitTestFn>,
    on_dispose: RefCell<Option<DisposeFn>>,
    disposed: Cell<bool>,
}

impl fmt::Debug for RenderNodeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderNodeOperation")
            .field("bounds", &self.bounds)
            .field("disposed", &self.disposed.get())
            .finish_non_exhaustive()
    }
}

impl RenderNodeOperation {
    /// Build an operation from a bounds rect and a render callback, with
    /// bounds-containment hit testing.
    pub fn new(bounds: Rect, render: RenderFn) -> Self {
        Self::from_parts(bounds, render, None)
    }

    /// Build an ad hoc operation: bounds, render callback and an optional
    /// hit-test predicate. Used for clears, pass-throughs and custom effect
    /// items.
    pub fn from_parts(bounds: Rect, render: RenderFn, hit_test: Option<HitTestFn>) -> Self {
        Self {
            bounds,
            render,
            hit_test,
            on_dispose: RefCell::new(None),
            disposed: Cell::new(false),
        }
    }

    /// Attach a disposer for resources captured by the callbacks.
    pub fn with_disposer(mut self, on_dispose: DisposeFn) -> Self {
        self.on_dispose = RefCell::new(Some(on_dispose));
        self
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Replay this operation onto `canvas`.
    pub fn render(
        &self,
        canvas: &mut dyn Canvas,
        factory: &dyn SurfaceFactory,
    ) -> LimnResult<()> {
        debug_assert!(
            !self.disposed.get(),
            "rendered a disposed RenderNodeOperation"
        );
        (self.render)(canvas, factory)
    }

    /// True when `point` hits this operation. Defaults to bounds
    /// containment; empty bounds never hit.
    pub fn hit_test(&self, point: Point) -> bool {
        match &self.hit_test {
            Some(predicate) => predicate(point),
            None => !rect_is_empty(self.bounds) && self.bounds.contains(point),
        }
    }

    /// Release captured resources. Idempotent; only the first call runs the
    /// disposer.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        if let Some(disposer) = self.on_dispose.borrow_mut().take() {
            disposer();
        }
    }
}

impl Drop for RenderNodeOperation {
    fn drop(&mut self) {
        self.dispose();
    }
}
