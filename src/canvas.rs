use std::cell::RefCell;
use std::collections::HashMap;

use crate::foundation::{
    core::{Affine, Color, Point, Rect},
    error::LimnResult,
};
use crate::geometry::Geometry;
use crate::image_source::ImageSource;
use crate::paint::{Brush, Pen};
use crate::pixels;

/// Opaque drawing sink. Implementations rasterize (CPU backend) or record
/// (tests); the graph layer never inspects what a canvas does with a call.
///
/// `push_*` calls nest; every push is balanced by one [`Canvas::pop`].
pub trait Canvas {
    fn clear(&mut self, color: Color);

    fn draw_rect(&mut self, rect: Rect, fill: Option<&Brush>, pen: Option<&Pen>);

    fn draw_ellipse(&mut self, rect: Rect, fill: Option<&Brush>, pen: Option<&Pen>);

    fn draw_geometry(&mut self, geometry: &Geometry, fill: Option<&Brush>, pen: Option<&Pen>);

    fn draw_image(&mut self, image: &ImageSource, rect: Rect, fill: Option<&Brush>,
        pen: Option<&Pen>);

    /// Composite an offscreen target with its top-left corner at `origin`.
    fn draw_surface(&mut self, target: &RenderTarget, origin: Point);

    fn push_clip(&mut self, rect: Rect);

    fn push_transform(&mut self, transform: Affine);

    fn push_opacity(&mut self, opacity: f32);

    fn pop(&mut self);

    /// Flush pending drawing into the backing target. Recording canvases
    /// may ignore this.
    fn flush(&mut self) -> LimnResult<()> {
        Ok(())
    }
}

/// Offscreen premultiplied-RGBA8 pixel target.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderTarget {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RenderTarget {
    /// Allocate a zeroed (fully transparent) target.
    pub fn new(width: u32, height: u32) -> LimnResult<Self> {
        let len = pixels::buffer_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0u8; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn clear_transparent(&mut self) {
        self.data.fill(0);
    }
}

/// Borrowed capability for allocating canvases and offscreen targets.
///
/// A factory may hand out pooled targets through its [`SurfaceCache`];
/// pooled targets are not re-zeroed, so callers clear before drawing unless
/// the concrete factory documents otherwise.
pub trait SurfaceFactory {
    fn create_canvas<'t>(
        &self,
        target: &'t mut RenderTarget,
        is_root: bool,
    ) -> LimnResult<Box<dyn Canvas + 't>>;

    fn create_render_target(&self, width: u32, height: u32) -> LimnResult<RenderTarget>;

    /// Pooling context, when this factory pools surfaces.
    fn cache_context(&self) -> Option<&SurfaceCache> {
        None
    }
}

/// Size-keyed pool of offscreen targets, reused across filter applications
/// within a render context. A pass runs on one thread, hence the plain
/// `RefCell`.
#[derive(Debug, Default)]
pub struct SurfaceCache {
    pool: RefCell<HashMap<(u32, u32), Vec<RenderTarget>>>,
}

impl SurfaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a pooled target of the exact size, if any. The returned target
    /// keeps whatever pixels it last held.
    pub fn acquire(&self, width: u32, height: u32) -> Option<RenderTarget> {
        self.pool
            .borrow_mut()
            .get_mut(&(width, height))
            .and_then(Vec::pop)
    }

    /// Return a target to the pool for later reuse.
    pub fn release(&self, target: RenderTarget) {
        self.pool
            .borrow_mut()
            .entry((target.width(), target.height()))
            .or_default()
            .push(target);
    }

    pub fn pooled_count(&self) -> usize {
        self.pool.borrow().values().map(Vec::len).sum()
    }
}
