//! Immediate-mode drawing surface over the retained node tree.
//!
//! A [`GraphicsContext2D`] replays a frame's draw calls against the existing
//! tree positionally: the Nth call at a nesting depth is matched against the
//! Nth child of the open container. Matching kind and equal parameters reuse
//! the node untouched; matching kind with changed parameters updates it in
//! place (marking it dirty); a kind mismatch replaces the node. Children the
//! frame no longer emits are trimmed when the container closes, firing the
//! untracked hook once per removed node before disposal.

use crate::effects::filter::FilterEffect;
use crate::foundation::{
    core::{Affine, Color, Rect},
    error::{LimnError, LimnResult},
};
use crate::geometry::Geometry;
use crate::graph::draw::{
    ClearRenderNode, EllipseRenderNode, GeometryRenderNode, ImageSourceRenderNode,
    RectangleRenderNode,
};
use crate::graph::layer::{
    FilterEffectRenderNode, OpacityRenderNode, RectClipRenderNode, TransformRenderNode,
};
use crate::graph::node::{ContainerRenderNode, RenderNode};
use crate::image_source::ImageSource;
use crate::paint::{Brush, Pen};

/// Hook invoked once for each node removed from the tree, before the node
/// is disposed. Used by callers that key external resources off nodes.
pub type UntrackedFn<'a> = Box<dyn FnMut(&dyn RenderNode) + 'a>;

pub struct GraphicsContext2D<'a> {
    root: &'a mut ContainerRenderNode,
    /// Child indices of the open wrapper nodes, outermost first.
    path: Vec<usize>,
    /// Per-depth position of the next child to reconcile; one entry deeper
    /// than `path` for the currently open container.
    cursor: Vec<usize>,
    on_untracked: Option<UntrackedFn<'a>>,
}

fn container_at<'t>(
    root: &'t mut ContainerRenderNode,
    path: &[usize],
) -> LimnResult<&'t mut ContainerRenderNode> {
    let mut current = root;
    for &index in path {
        let child = current
            .children_mut()
            .get_mut(index)
            .ok_or_else(|| LimnError::construction("drawing context path points past children"))?;
        current = child
            .as_container_mut()
            .ok_or_else(|| LimnError::construction("drawing context descended into a leaf"))?;
    }
    Ok(current)
}

impl<'a> GraphicsContext2D<'a> {
    pub fn new(root: &'a mut ContainerRenderNode) -> Self {
        Self {
            root,
            path: Vec::new(),
            cursor: vec![0],
            on_untracked: None,
        }
    }

    pub fn with_untracked_hook(root: &'a mut ContainerRenderNode, hook: UntrackedFn<'a>) -> Self {
        let mut ctx = Self::new(root);
        ctx.on_untracked = Some(hook);
        ctx
    }

    fn notify_untracked(&mut self, node: &dyn RenderNode) {
        if let Some(hook) = &mut self.on_untracked {
            hook(node);
        }
    }

    /// Match the node at the current position against kind `N`, reusing,
    /// updating or replacing it, and advance the cursor. Returns the index
    /// the node sits at.
    fn reconcile<N: RenderNode>(
        &mut self,
        equals: impl FnOnce(&N) -> bool,
        update: impl FnOnce(&mut N) -> bool,
        create: impl FnOnce() -> LimnResult<N>,
    ) -> LimnResult<usize> {
        let depth = self.path.len();
        let index = *self
            .cursor
            .get(depth)
            .ok_or_else(|| LimnError::construction("drawing context cursor underflow"))?;

        let path = self.path.clone();
        let container = container_at(self.root, &path)?;

        if index < container.child_count() {
            let same_kind = container.children()[index].as_any().is::<N>();
            if same_kind {
                let existing = container.children_mut()[index]
                    .as_any_mut()
                    .downcast_mut::<N>()
                    .ok_or_else(|| LimnError::construction("node kind changed mid-reconcile"))?;
                if !equals(existing) {
                    update(existing);
                }
            } else {
                let node: Box<dyn RenderNode> = Box::new(create()?);
                let mut old = container.set_child(index, node);
                // A wrapper swapped for another wrapper adopts the old
                // subtree so the children keep their caches.
                if let Some(old_children) = old.as_container_mut()
                    && let Some(new_children) = container.children_mut()[index].as_container_mut()
                {
                    new_children.bring_from(old_children);
                }
                self.notify_untracked(old.as_ref());
                old.dispose();
            }
        } else {
            container.add_child(Box::new(create()?));
        }

        self.cursor[depth] = index + 1;
        Ok(index)
    }

    pub fn clear(&mut self, color: Color) -> LimnResult<()> {
        self.reconcile::<ClearRenderNode>(
            |n| n.equals(color),
            |n| n.update(color),
            || Ok(ClearRenderNode::new(color)),
        )?;
        Ok(())
    }

    pub fn draw_rectangle(
        &mut self,
        rect: Rect,
        fill: Option<Brush>,
        pen: Option<Pen>,
    ) -> LimnResult<()> {
        self.reconcile::<RectangleRenderNode>(
            |n| n.equals(rect, fill.as_ref(), pen.as_ref()),
            |n| n.update(rect, fill.clone(), pen.clone()),
            || RectangleRenderNode::new(rect, fill.clone(), pen.clone()),
        )?;
        Ok(())
    }

    pub fn draw_ellipse(
        &mut self,
        rect: Rect,
        fill: Option<Brush>,
        pen: Option<Pen>,
    ) -> LimnResult<()> {
        self.reconcile::<EllipseRenderNode>(
            |n| n.equals(rect, fill.as_ref(), pen.as_ref()),
            |n| n.update(rect, fill.clone(), pen.clone()),
            || EllipseRenderNode::new(rect, fill.clone(), pen.clone()),
        )?;
        Ok(())
    }

    pub fn draw_geometry(
        &mut self,
        geometry: Geometry,
        fill: Option<Brush>,
        pen: Option<Pen>,
    ) -> LimnResult<()> {
        self.reconcile::<GeometryRenderNode>(
            |n| n.equals(&geometry, fill.as_ref(), pen.as_ref()),
            |n| n.update(geometry.clone(), fill.clone(), pen.clone()),
            || Ok(GeometryRenderNode::new(geometry.clone(), fill.clone(), pen.clone())),
        )?;
        Ok(())
    }

    pub fn draw_image(
        &mut self,
        image: &ImageSource,
        fill: Option<Brush>,
        pen: Option<Pen>,
    ) -> LimnResult<()> {
        self.reconcile::<ImageSourceRenderNode>(
            |n| n.equals(image, fill.as_ref(), pen.as_ref()),
            |n| n.update(image.clone(), fill.clone(), pen.clone()),
            || Ok(ImageSourceRenderNode::new(image.clone(), fill.clone(), pen.clone())),
        )?;
        Ok(())
    }

    /// Open a rectangular clip scope. Balanced by [`GraphicsContext2D::pop`].
    pub fn push_clip(&mut self, rect: Rect) -> LimnResult<()> {
        let index = self.reconcile::<RectClipRenderNode>(
            |n| n.equals(rect),
            |n| n.update(rect),
            || RectClipRenderNode::new(rect),
        )?;
        self.descend(index);
        Ok(())
    }

    /// Open a transform scope.
    pub fn push_transform(&mut self, transform: Affine) -> LimnResult<()> {
        let index = self.reconcile::<TransformRenderNode>(
            |n| n.equals(transform),
            |n| n.update(transform),
            || Ok(TransformRenderNode::new(transform)),
        )?;
        self.descend(index);
        Ok(())
    }

    /// Open a group-opacity scope.
    pub fn push_opacity(&mut self, opacity: f32) -> LimnResult<()> {
        let index = self.reconcile::<OpacityRenderNode>(
            |n| n.equals(opacity),
            |n| n.update(opacity),
            || Ok(OpacityRenderNode::new(opacity)),
        )?;
        self.descend(index);
        Ok(())
    }

    /// Open a filter-effect scope over the children drawn inside it.
    pub fn push_filter_effect(&mut self, effect: &dyn FilterEffect) -> LimnResult<()> {
        let index = self.reconcile::<FilterEffectRenderNode>(
            |n| n.equals(effect),
            |n| n.update(effect.clone_boxed()),
            || Ok(FilterEffectRenderNode::new(effect.clone_boxed())),
        )?;
        self.descend(index);
        Ok(())
    }

    fn descend(&mut self, index: usize) {
        self.path.push(index);
        self.cursor.push(0);
    }

    /// Close the innermost open scope, trimming children the frame did not
    /// re-emit.
    pub fn pop(&mut self) -> LimnResult<()> {
        if self.path.is_empty() {
            return Err(LimnError::construction("pop without a matching push"));
        }
        self.trim_open_container()?;
        self.cursor.pop();
        self.path.pop();
        Ok(())
    }

    /// End the frame: every push must have been popped. Trims stale
    /// children at the root.
    pub fn finish(mut self) -> LimnResult<()> {
        if !self.path.is_empty() {
            return Err(LimnError::construction("finish with an unclosed push scope"));
        }
        self.trim_open_container()
    }

    fn trim_open_container(&mut self) -> LimnResult<()> {
        let depth = self.path.len();
        let keep = *self
            .cursor
            .get(depth)
            .ok_or_else(|| LimnError::construction("drawing context cursor underflow"))?;
        let path = self.path.clone();
        let container = container_at(self.root, &path)?;
        let count = container.child_count().saturating_sub(keep);
        let removed = container.remove_range(keep, count);
        if !removed.is_empty() {
            // The owning node's cached operations still include output from
            // the removed children.
            self.mark_scope_owner_dirty(&path)?;
        }
        for mut node in removed {
            self.notify_untracked(node.as_ref());
            node.dispose();
        }
        Ok(())
    }

    /// Invalidate the node whose child list the open scope reconciles: the
    /// wrapper at `path`, or the root container at the top level.
    fn mark_scope_owner_dirty(&mut self, path: &[usize]) -> LimnResult<()> {
        match path.split_last() {
            None => self.root.state_mut().mark_dirty(),
            Some((&last, prefix)) => {
                let parent = container_at(self.root, prefix)?;
                let owner = parent.children_mut().get_mut(last).ok_or_else(|| {
                    LimnError::construction("drawing context path points past children")
                })?;
                owner.state_mut().mark_dirty();
            }
        }
        Ok(())
    }
}
