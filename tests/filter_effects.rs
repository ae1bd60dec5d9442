//! Filter-effect pipeline: bounds propagation through effect chains and
//! pixel-level behavior of the offscreen replay.

use limn2d::{
    Blur, Brush, Color, ContainerRenderNode, CpuSurfaceFactory, DropShadow, FilterEffect,
    FilterEffectGroup, GraphicsContext2D, Rect, RenderNodeProcessor, RenderTarget, SurfaceFactory,
    Vec2, hit_test_ops, render_ops,
};

fn white() -> Option<Brush> {
    Some(Brush::solid(Color::WHITE))
}

#[test]
fn blur_operation_bounds_strictly_contain_the_input() {
    let factory = CpuSurfaceFactory::new();
    let mut root = ContainerRenderNode::new();
    let rect = Rect::new(10.0, 10.0, 60.0, 60.0);

    let mut ctx = GraphicsContext2D::new(&mut root);
    ctx.push_filter_effect(&Blur::new(5.0, 5.0)).unwrap();
    ctx.draw_rectangle(rect, white(), None).unwrap();
    ctx.pop().unwrap();
    ctx.finish().unwrap();

    let processor = RenderNodeProcessor::new(&factory);
    let ops = processor.process(&mut root);
    assert_eq!(ops.len(), 1);
    // 3 sigma per side on each axis.
    assert_eq!(ops[0].bounds(), rect.inflate(15.0, 15.0));
}

#[test]
fn group_applies_children_in_declaration_order() {
    let group = FilterEffectGroup::new(vec![
        Box::new(Blur::new(1.0, 1.0)),
        Box::new(DropShadow::new(
            Vec2::new(10.0, 0.0),
            Vec2::ZERO,
            Color::BLACK,
        )),
    ]);
    let input = Rect::new(0.0, 0.0, 10.0, 10.0);
    // Blur first, then the shadow offsets the blurred bounds.
    let blurred = input.inflate(3.0, 3.0);
    assert_eq!(
        group.transform_bounds(input),
        blurred.union(blurred + Vec2::new(10.0, 0.0))
    );
}

#[test]
fn shadow_only_bounds_replace_the_input() {
    let shadow = DropShadow::new(Vec2::new(100.0, 0.0), Vec2::new(1.0, 1.0), Color::BLACK)
        .shadow_only();
    let input = Rect::new(0.0, 0.0, 10.0, 10.0);
    let out = shadow.transform_bounds(input);
    // The input region is not part of the output.
    assert!(out.x0 > input.x1);
}

#[test]
fn blurred_rectangle_spreads_pixels_past_its_edge() {
    let factory = CpuSurfaceFactory::new();
    let mut root = ContainerRenderNode::new();

    let mut ctx = GraphicsContext2D::new(&mut root);
    ctx.push_filter_effect(&Blur::new(2.0, 2.0)).unwrap();
    ctx.draw_rectangle(Rect::new(20.0, 20.0, 44.0, 44.0), white(), None)
        .unwrap();
    ctx.pop().unwrap();
    ctx.finish().unwrap();

    let processor = RenderNodeProcessor::new(&factory);
    let ops = processor.process(&mut root);

    let mut target = RenderTarget::new(64, 64).unwrap();
    let mut canvas = factory.create_canvas(&mut target, true).unwrap();
    render_ops(&ops, canvas.as_mut(), &factory);
    canvas.flush().unwrap();
    drop(canvas);

    let alpha_at = |x: usize, y: usize| target.data()[(y * 64 + x) * 4 + 3];
    // Center stays essentially opaque, and energy leaked past the
    // original rectangle edge.
    assert!(alpha_at(32, 32) > 200);
    assert!(alpha_at(18, 32) > 0);
    // Far corner stays empty.
    assert_eq!(alpha_at(1, 1), 0);
}

#[test]
fn drop_shadow_renders_shadow_under_the_input() {
    let factory = CpuSurfaceFactory::new();
    let mut root = ContainerRenderNode::new();

    let shadow = DropShadow::new(Vec2::new(16.0, 0.0), Vec2::ZERO, Color::BLACK);
    let mut ctx = GraphicsContext2D::new(&mut root);
    ctx.push_filter_effect(&shadow).unwrap();
    ctx.draw_rectangle(
        Rect::new(8.0, 8.0, 16.0, 16.0),
        Some(Brush::solid(Color::from_rgba8(0, 255, 0, 255))),
        None,
    )
    .unwrap();
    ctx.pop().unwrap();
    ctx.finish().unwrap();

    let processor = RenderNodeProcessor::new(&factory);
    let ops = processor.process(&mut root);

    let mut target = RenderTarget::new(48, 24).unwrap();
    let mut canvas = factory.create_canvas(&mut target, true).unwrap();
    render_ops(&ops, canvas.as_mut(), &factory);
    canvas.flush().unwrap();
    drop(canvas);

    let px_at = |x: usize, y: usize| {
        let i = (y * 48 + x) * 4;
        [
            target.data()[i],
            target.data()[i + 1],
            target.data()[i + 2],
            target.data()[i + 3],
        ]
    };
    // The input stays green; the offset copy is black.
    assert_eq!(px_at(12, 12), [0, 255, 0, 255]);
    assert_eq!(px_at(28, 12), [0, 0, 0, 255]);
}

#[test]
fn effect_swap_reprocesses_the_wrapper() {
    let factory = CpuSurfaceFactory::new();
    let mut root = ContainerRenderNode::new();
    let rect = Rect::new(0.0, 0.0, 10.0, 10.0);

    let mut ctx = GraphicsContext2D::new(&mut root);
    ctx.push_filter_effect(&Blur::new(1.0, 1.0)).unwrap();
    ctx.draw_rectangle(rect, white(), None).unwrap();
    ctx.pop().unwrap();
    ctx.finish().unwrap();

    let processor = RenderNodeProcessor::new(&factory);
    let first = processor.process(&mut root);
    assert_eq!(first[0].bounds(), rect.inflate(3.0, 3.0));

    let mut ctx = GraphicsContext2D::new(&mut root);
    ctx.push_filter_effect(&Blur::new(4.0, 4.0)).unwrap();
    ctx.draw_rectangle(rect, white(), None).unwrap();
    ctx.pop().unwrap();
    ctx.finish().unwrap();

    let second = processor.process(&mut root);
    assert_eq!(second[0].bounds(), rect.inflate(12.0, 12.0));
    assert!(first[0].is_disposed());
}

#[test]
fn effect_output_hit_tests_by_transformed_bounds() {
    let factory = CpuSurfaceFactory::new();
    let mut root = ContainerRenderNode::new();
    let rect = Rect::new(10.0, 10.0, 20.0, 20.0);

    let mut ctx = GraphicsContext2D::new(&mut root);
    ctx.push_filter_effect(&Blur::new(2.0, 2.0)).unwrap();
    ctx.draw_rectangle(rect, white(), None).unwrap();
    ctx.pop().unwrap();
    ctx.finish().unwrap();

    let processor = RenderNodeProcessor::new(&factory);
    let ops = processor.process(&mut root);

    // The blurred halo is pickable even outside the source rectangle.
    assert!(hit_test_ops(&ops, limn2d::Point::new(6.0, 15.0)));
    assert!(!hit_test_ops(&ops, limn2d::Point::new(50.0, 50.0)));
}
