//! Wrapper nodes: each owns a child subtree (via an embedded container),
//! consumes the subtree's operations as input and emits a single operation
//! that replays them under a clip, transform, opacity layer or filter
//! effect.

use std::any::Any;
use std::rc::Rc;

use crate::effects::context::{self, EffectTarget, FilterEffectContext};
use crate::effects::filter::FilterEffect;
use crate::foundation::{
    core::{Affine, Point, Rect, ensure_valid_rect, rect_is_empty, union_rects},
    error::LimnResult,
};
use crate::graph::context::RenderNodeContext;
use crate::graph::node::{ContainerRenderNode, NodeState, RenderNode, dispose_state};
use crate::graph::op::RenderNodeOperation;

fn union_ops_bounds(ops: &[Rc<RenderNodeOperation>]) -> Option<Rect> {
    ops.iter()
        .fold(None, |acc, op| union_rects(acc, op.bounds()))
}

/// Clips child operations to an axis-aligned rectangle.
pub struct RectClipRenderNode {
    state: NodeState,
    children: ContainerRenderNode,
    rect: Rect,
}

impl RectClipRenderNode {
    pub fn new(rect: Rect) -> LimnResult<Self> {
        ensure_valid_rect(rect, "clip rect")?;
        Ok(Self {
            state: NodeState::new(),
            children: ContainerRenderNode::new(),
            rect,
        })
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn equals(&self, rect: Rect) -> bool {
        self.rect == rect
    }

    pub fn update(&mut self, rect: Rect) -> bool {
        if self.rect == rect {
            return false;
        }
        self.rect = rect;
        self.state.mark_dirty();
        true
    }
}

impl RenderNode for RectClipRenderNode {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    fn process(&mut self, context: &mut RenderNodeContext<'_>) -> Vec<Rc<RenderNodeOperation>> {
        let input = context.take_input();
        let Some(input_bounds) = union_ops_bounds(&input) else {
            return Vec::new();
        };
        let bounds = self.rect.intersect(input_bounds);
        if rect_is_empty(bounds) {
            return Vec::new();
        }

        let ops = Rc::new(input);
        let rect = self.rect;
        let render_ops = ops.clone();
        let hit_ops = ops.clone();
        vec![Rc::new(RenderNodeOperation::from_parts(
            bounds,
            Box::new(move |canvas, factory| {
                canvas.push_clip(rect);
                for op in render_ops.iter() {
                    op.render(canvas, factory)?;
                }
                canvas.pop();
                Ok(())
            }),
            Some(Box::new(move |point| {
                rect.contains(point) && hit_ops.iter().any(|op| op.hit_test(point))
            })),
        ))]
    }

    fn dispose(&mut self) {
        self.children.dispose();
        dispose_state(&mut self.state, true);
    }

    fn kind(&self) -> &'static str {
        "rect_clip"
    }

    fn as_container(&self) -> Option<&ContainerRenderNode> {
        Some(&self.children)
    }

    fn as_container_mut(&mut self) -> Option<&mut ContainerRenderNode> {
        Some(&mut self.children)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Applies an affine transform to child operations. Bounds are the
/// transformed bounding box of the child union; hit testing maps the query
/// point through the inverse transform.
pub struct TransformRenderNode {
    state: NodeState,
    children: ContainerRenderNode,
    transform: Affine,
}

impl TransformRenderNode {
    pub fn new(transform: Affine) -> Self {
        Self {
            state: NodeState::new(),
            children: ContainerRenderNode::new(),
            transform,
        }
    }

    pub fn transform(&self) -> Affine {
        self.transform
    }

    pub fn equals(&self, transform: Affine) -> bool {
        self.transform == transform
    }

    pub fn update(&mut self, transform: Affine) -> bool {
        if self.transform == transform {
            return false;
        }
        self.transform = transform;
        self.state.mark_dirty();
        true
    }
}

impl RenderNode for TransformRenderNode {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    fn process(&mut self, context: &mut RenderNodeContext<'_>) -> Vec<Rc<RenderNodeOperation>> {
        let input = context.take_input();
        let Some(input_bounds) = union_ops_bounds(&input) else {
            return Vec::new();
        };
        let bounds = self.transform.transform_rect_bbox(input_bounds);

        let ops = Rc::new(input);
        let transform = self.transform;
        let render_ops = ops.clone();
        let hit_ops = ops.clone();
        vec![Rc::new(RenderNodeOperation::from_parts(
            bounds,
            Box::new(move |canvas, factory| {
                canvas.push_transform(transform);
                for op in render_ops.iter() {
                    op.render(canvas, factory)?;
                }
                canvas.pop();
                Ok(())
            }),
            Some(Box::new(move |point| {
                // Non-invertible transforms collapse to zero area and
                // cannot be hit.
                if transform.determinant().abs() < 1e-12 {
                    return false;
                }
                let local = transform.inverse() * point;
                hit_ops.iter().any(|op| op.hit_test(local))
            })),
        ))]
    }

    fn dispose(&mut self) {
        self.children.dispose();
        dispose_state(&mut self.state, true);
    }

    fn kind(&self) -> &'static str {
        "transform"
    }

    fn as_container(&self) -> Option<&ContainerRenderNode> {
        Some(&self.children)
    }

    fn as_container_mut(&mut self) -> Option<&mut ContainerRenderNode> {
        Some(&mut self.children)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Renders child operations through a group-opacity layer. Opacity does not
/// affect hit testing.
pub struct OpacityRenderNode {
    state: NodeState,
    children: ContainerRenderNode,
    opacity: f32,
}

impl OpacityRenderNode {
    pub fn new(opacity: f32) -> Self {
        Self {
            state: NodeState::new(),
            children: ContainerRenderNode::new(),
            opacity: opacity.clamp(0.0, 1.0),
        }
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn equals(&self, opacity: f32) -> bool {
        self.opacity == opacity.clamp(0.0, 1.0)
    }

    pub fn update(&mut self, opacity: f32) -> bool {
        let opacity = opacity.clamp(0.0, 1.0);
        if self.opacity == opacity {
            return false;
        }
        self.opacity = opacity;
        self.state.mark_dirty();
        true
    }
}

impl RenderNode for OpacityRenderNode {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    fn process(&mut self, context: &mut RenderNodeContext<'_>) -> Vec<Rc<RenderNodeOperation>> {
        let input = context.take_input();
        let Some(bounds) = union_ops_bounds(&input) else {
            return Vec::new();
        };

        let ops = Rc::new(input);
        let opacity = self.opacity;
        let render_ops = ops.clone();
        let hit_ops = ops.clone();
        vec![Rc::new(RenderNodeOperation::from_parts(
            bounds,
            Box::new(move |canvas, factory| {
                canvas.push_opacity(opacity);
                for op in render_ops.iter() {
                    op.render(canvas, factory)?;
                }
                canvas.pop();
                Ok(())
            }),
            Some(Box::new(move |point| {
                hit_ops.iter().any(|op| op.hit_test(point))
            })),
        ))]
    }

    fn dispose(&mut self) {
        self.children.dispose();
        dispose_state(&mut self.state, true);
    }

    fn kind(&self) -> &'static str {
        "opacity"
    }

    fn as_container(&self) -> Option<&ContainerRenderNode> {
        Some(&self.children)
    }

    fn as_container_mut(&mut self) -> Option<&mut ContainerRenderNode> {
        Some(&mut self.children)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Runs a filter-effect chain over the child subtree: renders the children
/// into an offscreen target, applies the effect items in order and
/// composites the result back at the shifted bounds.
pub struct FilterEffectRenderNode {
    state: NodeState,
    children: ContainerRenderNode,
    effect: Box<dyn FilterEffect>,
}

impl FilterEffectRenderNode {
    pub fn new(effect: Box<dyn FilterEffect>) -> Self {
        Self {
            state: NodeState::new(),
            children: ContainerRenderNode::new(),
            effect,
        }
    }

    pub fn effect(&self) -> &dyn FilterEffect {
        self.effect.as_ref()
    }

    pub fn equals(&self, effect: &dyn FilterEffect) -> bool {
        self.effect.eq_dyn(effect)
    }

    pub fn update(&mut self, effect: Box<dyn FilterEffect>) -> bool {
        if self.effect.eq_dyn(effect.as_ref()) {
            return false;
        }
        self.effect = effect;
        self.state.mark_dirty();
        true
    }
}

impl RenderNode for FilterEffectRenderNode {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    fn process(&mut self, context: &mut RenderNodeContext<'_>) -> Vec<Rc<RenderNodeOperation>> {
        let input = context.take_input();
        let Some(input_bounds) = union_ops_bounds(&input) else {
            return Vec::new();
        };

        let mut fe = FilterEffectContext::new(input_bounds);
        fe.apply(self.effect.as_ref());
        let bounds = fe.bounds();
        if rect_is_empty(bounds) {
            return Vec::new();
        }
        if fe.item_count() == 0 {
            // Identity effect, replay the input directly.
            let ops = Rc::new(input);
            let render_ops = ops.clone();
            let hit_ops = ops.clone();
            return vec![Rc::new(RenderNodeOperation::from_parts(
                bounds,
                Box::new(move |canvas, factory| {
                    for op in render_ops.iter() {
                        op.render(canvas, factory)?;
                    }
                    Ok(())
                }),
                Some(Box::new(move |point| {
                    hit_ops.iter().any(|op| op.hit_test(point))
                })),
            ))];
        }

        let source_bounds = input_bounds.expand();
        let items = Rc::new(fe.items().to_vec());
        let ops = Rc::new(input);
        vec![Rc::new(RenderNodeOperation::new(
            bounds,
            Box::new(move |canvas, factory| {
                let (width, height) = context::rect_pixel_size(source_bounds)?;
                let mut target = context::acquire_target(factory, width, height)?;
                {
                    let mut offscreen = factory.create_canvas(&mut target, false)?;
                    offscreen
                        .push_transform(Affine::translate((-source_bounds.x0, -source_bounds.y0)));
                    for op in ops.iter() {
                        op.render(offscreen.as_mut(), factory)?;
                    }
                    offscreen.pop();
                    offscreen.flush()?;
                }

                let out = context::apply_items(
                    &items,
                    EffectTarget {
                        bounds: source_bounds,
                        target,
                    },
                    factory,
                )?;
                canvas.draw_surface(&out.target, Point::new(out.bounds.x0, out.bounds.y0));
                context::release_target(factory, out.target);
                Ok(())
            }),
        ))]
    }

    fn dispose(&mut self) {
        self.children.dispose();
        dispose_state(&mut self.state, true);
    }

    fn kind(&self) -> &'static str {
        "filter_effect"
    }

    fn as_container(&self) -> Option<&ContainerRenderNode> {
        Some(&self.children)
    }

    fn as_container_mut(&mut self) -> Option<&mut ContainerRenderNode> {
        Some(&mut self.children)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, RenderTarget, SurfaceFactory};
    use crate::effects::filter::Blur;

    struct NoFactory;
    impl SurfaceFactory for NoFactory {
        fn create_canvas<'t>(
            &self,
            _target: &'t mut RenderTarget,
            _is_root: bool,
        ) -> LimnResult<Box<dyn Canvas + 't>> {
            unreachable!("processing allocates no canvas")
        }

        fn create_render_target(&self, w: u32, h: u32) -> LimnResult<RenderTarget> {
            RenderTarget::new(w, h)
        }
    }

    fn op_with_bounds(bounds: Rect) -> Rc<RenderNodeOperation> {
        Rc::new(RenderNodeOperation::new(bounds, Box::new(|_, _| Ok(()))))
    }

    #[test]
    fn wrappers_emit_nothing_for_empty_input() {
        let factory = NoFactory;
        let mut clip = RectClipRenderNode::new(Rect::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        let mut ctx = RenderNodeContext::new(&factory, Vec::new());
        assert!(clip.process(&mut ctx).is_empty());

        let mut fx = FilterEffectRenderNode::new(Box::new(Blur::new(2.0, 2.0)));
        let mut ctx = RenderNodeContext::new(&factory, Vec::new());
        assert!(fx.process(&mut ctx).is_empty());
    }

    #[test]
    fn clip_bounds_intersect_input_union() {
        let factory = NoFactory;
        let mut clip = RectClipRenderNode::new(Rect::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        let mut ctx = RenderNodeContext::new(&factory, vec![op_with_bounds(Rect::new(
            5.0, 5.0, 50.0, 50.0,
        ))]);
        let ops = clip.process(&mut ctx);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].bounds(), Rect::new(5.0, 5.0, 10.0, 10.0));

        // Disjoint input clips away entirely.
        let mut ctx = RenderNodeContext::new(&factory, vec![op_with_bounds(Rect::new(
            20.0, 20.0, 30.0, 30.0,
        ))]);
        assert!(clip.process(&mut ctx).is_empty());
    }

    #[test]
    fn clip_hit_requires_point_inside_rect_and_child() {
        let factory = NoFactory;
        let mut clip = RectClipRenderNode::new(Rect::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        let mut ctx = RenderNodeContext::new(&factory, vec![op_with_bounds(Rect::new(
            5.0, 5.0, 50.0, 50.0,
        ))]);
        let ops = clip.process(&mut ctx);
        assert!(ops[0].hit_test(Point::new(7.0, 7.0)));
        // Inside the child but clipped away.
        assert!(!ops[0].hit_test(Point::new(20.0, 20.0)));
        // Inside the clip but outside the child.
        assert!(!ops[0].hit_test(Point::new(1.0, 1.0)));
    }

    #[test]
    fn transform_maps_bounds_and_hit_points() {
        let factory = NoFactory;
        let mut node = TransformRenderNode::new(Affine::translate((100.0, 0.0)));
        let mut ctx = RenderNodeContext::new(&factory, vec![op_with_bounds(Rect::new(
            0.0, 0.0, 10.0, 10.0,
        ))]);
        let ops = node.process(&mut ctx);
        assert_eq!(ops[0].bounds(), Rect::new(100.0, 0.0, 110.0, 10.0));
        assert!(ops[0].hit_test(Point::new(105.0, 5.0)));
        assert!(!ops[0].hit_test(Point::new(5.0, 5.0)));
    }

    #[test]
    fn singular_transform_never_hits() {
        let factory = NoFactory;
        let mut node = TransformRenderNode::new(Affine::scale(0.0));
        let mut ctx = RenderNodeContext::new(&factory, vec![op_with_bounds(Rect::new(
            0.0, 0.0, 10.0, 10.0,
        ))]);
        let ops = node.process(&mut ctx);
        assert!(!ops[0].hit_test(Point::new(0.0, 0.0)));
    }

    #[test]
    fn opacity_does_not_affect_hit_testing() {
        let factory = NoFactory;
        let mut node = OpacityRenderNode::new(0.0);
        let mut ctx = RenderNodeContext::new(&factory, vec![op_with_bounds(Rect::new(
            0.0, 0.0, 10.0, 10.0,
        ))]);
        let ops = node.process(&mut ctx);
        assert!(ops[0].hit_test(Point::new(5.0, 5.0)));
    }

    #[test]
    fn filter_effect_bounds_follow_the_effect_chain() {
        let factory = NoFactory;
        let mut node = FilterEffectRenderNode::new(Box::new(Blur::new(
            2.0, 2.0,
        )));
        let mut ctx = RenderNodeContext::new(&factory, vec![op_with_bounds(Rect::new(
            0.0, 0.0, 10.0, 10.0,
        ))]);
        let ops = node.process(&mut ctx);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].bounds(), Rect::new(-6.0, -6.0, 16.0, 16.0));
    }

    #[test]
    fn effect_update_marks_dirty_only_on_change() {
        let mut node = FilterEffectRenderNode::new(Box::new(Blur::new(2.0, 2.0)));
        assert!(node.equals(&Blur::new(2.0, 2.0)));
        assert!(!node.update(Box::new(Blur::new(2.0, 2.0))));
        assert!(!node.state().is_dirty());
        assert!(node.update(Box::new(Blur::new(3.0, 3.0))));
        assert!(node.state().is_dirty());
    }
}
