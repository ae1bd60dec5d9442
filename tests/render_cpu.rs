//! CPU backend determinism: the same frame renders to bit-identical bytes
//! across runs, including through the retained-tree cache path.

use limn2d::{
    Affine, Brush, Color, ContainerRenderNode, CpuSurfaceFactory, GraphicsContext2D, Pen, Rect,
    RenderNodeProcessor, RenderTarget, SurfaceFactory, render_ops,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn digest_u64(bytes: &[u8]) -> u64 {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    for chunk in bytes.chunks(8) {
        let mut v = 0u64;
        for (i, &b) in chunk.iter().enumerate() {
            v |= (b as u64) << (i * 8);
        }
        state = mix64(state ^ v);
    }
    state
}

fn draw_scene(ctx: &mut GraphicsContext2D<'_>) {
    ctx.clear(Color::from_rgba8(16, 16, 24, 255)).unwrap();
    ctx.draw_rectangle(
        Rect::new(8.0, 8.0, 56.0, 40.0),
        Some(Brush::solid(Color::from_rgba8(200, 40, 40, 255))),
        Some(Pen::new(Brush::solid(Color::WHITE), 2.0).unwrap()),
    )
    .unwrap();
    ctx.push_transform(Affine::translate((10.0, 20.0))).unwrap();
    ctx.draw_ellipse(
        Rect::new(0.0, 0.0, 30.0, 30.0),
        Some(Brush::solid(Color::from_rgba8(40, 200, 90, 255)).with_opacity(0.8)),
        None,
    )
    .unwrap();
    ctx.pop().unwrap();
    ctx.push_opacity(0.5).unwrap();
    ctx.draw_rectangle(
        Rect::new(30.0, 30.0, 60.0, 60.0),
        Some(Brush::solid(Color::from_rgba8(60, 90, 220, 255))),
        None,
    )
    .unwrap();
    ctx.pop().unwrap();
}

fn render_frame(root: &mut ContainerRenderNode, factory: &CpuSurfaceFactory) -> Vec<u8> {
    let processor = RenderNodeProcessor::new(factory);
    let ops = processor.process(root);

    let mut target = RenderTarget::new(64, 64).unwrap();
    let mut canvas = factory.create_canvas(&mut target, true).unwrap();
    render_ops(&ops, canvas.as_mut(), factory);
    canvas.flush().unwrap();
    drop(canvas);
    target.data().to_vec()
}

#[test]
fn identical_scenes_render_identical_bytes() {
    init_tracing();
    let factory = CpuSurfaceFactory::new();

    let mut root_a = ContainerRenderNode::new();
    let mut ctx = GraphicsContext2D::new(&mut root_a);
    draw_scene(&mut ctx);
    ctx.finish().unwrap();
    let frame_a = render_frame(&mut root_a, &factory);

    let mut root_b = ContainerRenderNode::new();
    let mut ctx = GraphicsContext2D::new(&mut root_b);
    draw_scene(&mut ctx);
    ctx.finish().unwrap();
    let frame_b = render_frame(&mut root_b, &factory);

    assert!(frame_a.iter().any(|&b| b != 0));
    assert_eq!(digest_u64(&frame_a), digest_u64(&frame_b));
}

#[test]
fn cached_replay_matches_a_fresh_render() {
    let factory = CpuSurfaceFactory::new();
    let mut root = ContainerRenderNode::new();

    let mut ctx = GraphicsContext2D::new(&mut root);
    draw_scene(&mut ctx);
    ctx.finish().unwrap();
    let fresh = render_frame(&mut root, &factory);

    // Second frame replays the identical scene; everything comes from the
    // node caches.
    let mut ctx = GraphicsContext2D::new(&mut root);
    draw_scene(&mut ctx);
    ctx.finish().unwrap();
    let cached = render_frame(&mut root, &factory);

    assert_eq!(digest_u64(&fresh), digest_u64(&cached));
}

#[test]
fn clear_applies_under_earlier_draws_in_call_order() {
    let factory = CpuSurfaceFactory::new();
    let mut root = ContainerRenderNode::new();

    let mut ctx = GraphicsContext2D::new(&mut root);
    ctx.draw_rectangle(
        Rect::new(0.0, 0.0, 4.0, 4.0),
        Some(Brush::solid(Color::WHITE)),
        None,
    )
    .unwrap();
    ctx.clear(Color::from_rgba8(255, 0, 0, 255)).unwrap();
    ctx.finish().unwrap();

    let processor = RenderNodeProcessor::new(&factory);
    let ops = processor.process(&mut root);

    let mut target = RenderTarget::new(4, 4).unwrap();
    let mut canvas = factory.create_canvas(&mut target, true).unwrap();
    render_ops(&ops, canvas.as_mut(), &factory);
    canvas.flush().unwrap();
    drop(canvas);

    // The clear ran after the rectangle and overwrote it.
    assert_eq!(&target.data()[0..4], &[255, 0, 0, 255]);
}

#[test]
fn clear_inside_a_clip_scope_renders_without_aborting() {
    init_tracing();
    let factory = CpuSurfaceFactory::new();
    let mut root = ContainerRenderNode::new();

    let mut ctx = GraphicsContext2D::new(&mut root);
    ctx.push_clip(Rect::new(0.0, 0.0, 2.0, 2.0)).unwrap();
    ctx.draw_rectangle(
        Rect::new(0.0, 0.0, 4.0, 4.0),
        Some(Brush::solid(Color::WHITE)),
        None,
    )
    .unwrap();
    ctx.clear(Color::from_rgba8(255, 0, 0, 255)).unwrap();
    ctx.pop().unwrap();
    ctx.finish().unwrap();

    let processor = RenderNodeProcessor::new(&factory);
    let ops = processor.process(&mut root);

    let mut target = RenderTarget::new(4, 4).unwrap();
    let mut canvas = factory.create_canvas(&mut target, true).unwrap();
    render_ops(&ops, canvas.as_mut(), &factory);
    canvas.flush().unwrap();
    drop(canvas);

    // The clear is confined to the clip; pixels outside stay untouched.
    assert_eq!(&target.data()[0..4], &[255, 0, 0, 255]);
    let corner = (3 * 4 + 3) * 4;
    assert_eq!(&target.data()[corner..corner + 4], &[0, 0, 0, 0]);
}
