//! CPU rasterization backend on `vello_cpu`. Deterministic: the same
//! operation list over the same target produces identical bytes on every
//! platform.

use crate::canvas::{Canvas, RenderTarget, SurfaceCache, SurfaceFactory};
use crate::foundation::{
    core::{Affine, Color, Point, Rect},
    error::{LimnError, LimnResult},
};
use crate::geometry::{FillRule, Geometry};
use crate::image_source::ImageSource;
use crate::paint::{Brush, Pen};

/// Creates [`CpuCanvas`] instances and pools offscreen targets.
pub struct CpuSurfaceFactory {
    cache: Option<SurfaceCache>,
}

impl CpuSurfaceFactory {
    pub fn new() -> Self {
        Self {
            cache: Some(SurfaceCache::new()),
        }
    }

    /// Factory without target pooling; every offscreen allocation is fresh.
    pub fn without_cache() -> Self {
        Self { cache: None }
    }
}

impl Default for CpuSurfaceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceFactory for CpuSurfaceFactory {
    fn create_canvas<'t>(
        &self,
        target: &'t mut RenderTarget,
        _is_root: bool,
    ) -> LimnResult<Box<dyn Canvas + 't>> {
        Ok(Box::new(CpuCanvas::new(target)?))
    }

    fn create_render_target(&self, width: u32, height: u32) -> LimnResult<RenderTarget> {
        RenderTarget::new(width, height)
    }

    fn cache_context(&self) -> Option<&SurfaceCache> {
        self.cache.as_ref()
    }
}

enum StackEntry {
    /// A clip or opacity layer pushed on the render context.
    Layer,
    /// Saved cumulative transform to restore on pop.
    Transform(Affine),
}

/// Canvas over a `vello_cpu::RenderContext`. Drawing is recorded on the
/// context and rasterized once per [`Canvas::flush`], compositing over the
/// target's current pixels.
pub struct CpuCanvas<'t> {
    target: &'t mut RenderTarget,
    ctx: vello_cpu::RenderContext,
    width: u16,
    height: u16,
    transform: Affine,
    stack: Vec<StackEntry>,
}

impl<'t> CpuCanvas<'t> {
    pub fn new(target: &'t mut RenderTarget) -> LimnResult<Self> {
        let width: u16 = target
            .width()
            .try_into()
            .map_err(|_| LimnError::resource("render target width exceeds u16"))?;
        let height: u16 = target
            .height()
            .try_into()
            .map_err(|_| LimnError::resource("render target height exceeds u16"))?;
        Ok(Self {
            target,
            ctx: vello_cpu::RenderContext::new(width, height),
            width,
            height,
            transform: Affine::IDENTITY,
            stack: Vec::new(),
        })
    }

    fn apply_transform(&mut self) {
        self.ctx.set_transform(affine_to_cpu(self.transform));
    }

    fn fill_shape(&mut self, path: &vello_cpu::kurbo::BezPath, brush: &Brush) {
        let color = brush.effective_color();
        self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
        self.ctx.fill_path(path);
    }

    fn stroke_shape(&mut self, path: &vello_cpu::kurbo::BezPath, pen: &Pen) {
        let color = pen.brush.effective_color();
        self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
        self.ctx
            .set_stroke(vello_cpu::kurbo::Stroke::new(pen.thickness));
        self.ctx.stroke_path(path);
    }

    fn draw_path(
        &mut self,
        path: &vello_cpu::kurbo::BezPath,
        fill: Option<&Brush>,
        pen: Option<&Pen>,
    ) {
        self.apply_transform();
        if let Some(brush) = fill {
            self.fill_shape(path, brush);
        }
        if let Some(pen) = pen {
            self.stroke_shape(path, pen);
        }
    }

    fn draw_pixels(&mut self, data: &[u8], width: u32, height: u32, rect: Rect) -> LimnResult<()> {
        if width == 0 || height == 0 || rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Ok(());
        }
        let pixmap = premul_bytes_to_pixmap(
            data,
            width
                .try_into()
                .map_err(|_| LimnError::resource("image width exceeds u16"))?,
            height
                .try_into()
                .map_err(|_| LimnError::resource("image height exceeds u16"))?,
        )?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };

        // Map the image's pixel grid onto `rect` in canvas space.
        let placement = Affine::translate((rect.x0, rect.y0))
            * Affine::scale_non_uniform(
                rect.width() / f64::from(width),
                rect.height() / f64::from(height),
            );
        self.ctx
            .set_transform(affine_to_cpu(self.transform * placement));
        self.ctx.set_paint(paint);
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(width),
            f64::from(height),
        ));
        Ok(())
    }
}

impl Canvas for CpuCanvas<'_> {
    fn clear(&mut self, color: Color) {
        // Recorded as a full-surface fill so any open layer scopes stay
        // balanced. Earlier recorded drawing ends up underneath it, which
        // for an opaque color is a replacement.
        self.ctx.set_transform(affine_to_cpu(Affine::IDENTITY));
        self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.width),
            f64::from(self.height),
        ));
    }

    fn draw_rect(&mut self, rect: Rect, fill: Option<&Brush>, pen: Option<&Pen>) {
        use vello_cpu::kurbo::Shape;
        let path = rect_to_cpu(rect).to_path(0.1);
        self.draw_path(&path, fill, pen);
    }

    fn draw_ellipse(&mut self, rect: Rect, fill: Option<&Brush>, pen: Option<&Pen>) {
        use vello_cpu::kurbo::Shape;
        let ellipse = vello_cpu::kurbo::Ellipse::new(
            point_to_cpu(rect.center()),
            (rect.width() / 2.0, rect.height() / 2.0),
            0.0,
        );
        let path = ellipse.to_path(0.1);
        self.draw_path(&path, fill, pen);
    }

    fn draw_geometry(&mut self, geometry: &Geometry, fill: Option<&Brush>, pen: Option<&Pen>) {
        let path = bezpath_to_cpu(geometry.path());
        self.ctx.set_fill_rule(match geometry.fill_rule() {
            FillRule::NonZero => vello_cpu::peniko::Fill::NonZero,
            FillRule::EvenOdd => vello_cpu::peniko::Fill::EvenOdd,
        });
        self.draw_path(&path, fill, pen);
        self.ctx.set_fill_rule(vello_cpu::peniko::Fill::NonZero);
    }

    fn draw_image(&mut self, image: &ImageSource, rect: Rect, fill: Option<&Brush>,
        pen: Option<&Pen>) {
        // The fill brush is ignored for images; the pixels are the paint.
        let _ = fill;
        if let Err(error) = self.draw_pixels(image.pixels(), image.width(), image.height(), rect) {
            tracing::error!(%error, "image draw was skipped");
        }
        if let Some(pen) = pen {
            use vello_cpu::kurbo::Shape;
            let path = rect_to_cpu(rect).to_path(0.1);
            self.apply_transform();
            self.stroke_shape(&path, pen);
        }
    }

    fn draw_surface(&mut self, target: &RenderTarget, origin: Point) {
        let rect = Rect::new(
            origin.x,
            origin.y,
            origin.x + f64::from(target.width()),
            origin.y + f64::from(target.height()),
        );
        if let Err(error) = self.draw_pixels(target.data(), target.width(), target.height(), rect)
        {
            tracing::error!(%error, "surface draw was skipped");
        }
    }

    fn push_clip(&mut self, rect: Rect) {
        use vello_cpu::kurbo::Shape;
        self.apply_transform();
        let path = rect_to_cpu(rect).to_path(0.1);
        self.ctx.push_clip_layer(&path);
        self.stack.push(StackEntry::Layer);
    }

    fn push_transform(&mut self, transform: Affine) {
        self.stack.push(StackEntry::Transform(self.transform));
        self.transform *= transform;
    }

    fn push_opacity(&mut self, opacity: f32) {
        self.ctx.push_opacity_layer(opacity.clamp(0.0, 1.0));
        self.stack.push(StackEntry::Layer);
    }

    fn pop(&mut self) {
        match self.stack.pop() {
            Some(StackEntry::Layer) => self.ctx.pop_layer(),
            Some(StackEntry::Transform(saved)) => self.transform = saved,
            None => tracing::error!("pop without a matching push"),
        }
    }

    fn flush(&mut self) -> LimnResult<()> {
        if self
            .stack
            .iter()
            .any(|entry| matches!(entry, StackEntry::Layer))
        {
            return Err(LimnError::construction("flush with an open layer scope"));
        }

        // `render_to_pixmap` overwrites the pixmap with the recorded scene,
        // so rasterize into a scratch pixmap and composite that over the
        // target. A fresh context makes a second flush a no-op.
        self.ctx.flush();
        let blank = vec![0u8; self.target.data().len()];
        let mut pixmap = premul_bytes_to_pixmap(&blank, self.width, self.height)?;
        self.ctx.render_to_pixmap(&mut pixmap);
        crate::pixels::blit_premul(
            self.target.data_mut(),
            u32::from(self.width),
            u32::from(self.height),
            pixmap.data_as_u8_slice(),
            u32::from(self.width),
            u32::from(self.height),
            0,
            0,
        )?;
        self.ctx = vello_cpu::RenderContext::new(self.width, self.height);
        Ok(())
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u16,
    height: u16,
) -> LimnResult<vello_cpu::Pixmap> {
    if rgba8_premul.len() != usize::from(width) * usize::from(height) * 4 {
        return Err(LimnError::resource("pixel byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(usize::from(width) * usize::from(height));
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        width,
        height,
        may_have_opacities,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_overwrites_target_bytes() {
        let mut target = RenderTarget::new(2, 2).unwrap();
        let factory = CpuSurfaceFactory::new();
        let mut canvas = factory.create_canvas(&mut target, true).unwrap();
        canvas.clear(Color::from_rgba8(255, 0, 0, 255));
        canvas.flush().unwrap();
        drop(canvas);
        assert_eq!(&target.data()[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn filled_rect_covers_its_pixels() {
        let mut target = RenderTarget::new(4, 4).unwrap();
        let factory = CpuSurfaceFactory::new();
        let mut canvas = factory.create_canvas(&mut target, true).unwrap();
        canvas.draw_rect(
            Rect::new(0.0, 0.0, 4.0, 4.0),
            Some(&Brush::solid(Color::WHITE)),
            None,
        );
        canvas.flush().unwrap();
        drop(canvas);
        assert!(target.data().chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn transform_offsets_drawing() {
        let mut target = RenderTarget::new(4, 1).unwrap();
        let factory = CpuSurfaceFactory::new();
        let mut canvas = factory.create_canvas(&mut target, true).unwrap();
        canvas.push_transform(Affine::translate((2.0, 0.0)));
        canvas.draw_rect(
            Rect::new(0.0, 0.0, 2.0, 1.0),
            Some(&Brush::solid(Color::WHITE)),
            None,
        );
        canvas.pop();
        canvas.flush().unwrap();
        drop(canvas);
        assert_eq!(target.data()[3], 0);
        assert_eq!(target.data()[2 * 4 + 3], 255);
    }

    #[test]
    fn clip_discards_outside_pixels() {
        let mut target = RenderTarget::new(4, 1).unwrap();
        let factory = CpuSurfaceFactory::new();
        let mut canvas = factory.create_canvas(&mut target, true).unwrap();
        canvas.push_clip(Rect::new(0.0, 0.0, 2.0, 1.0));
        canvas.draw_rect(
            Rect::new(0.0, 0.0, 4.0, 1.0),
            Some(&Brush::solid(Color::WHITE)),
            None,
        );
        canvas.pop();
        canvas.flush().unwrap();
        drop(canvas);
        assert_eq!(target.data()[3], 255);
        assert_eq!(target.data()[3 * 4 + 3], 0);
    }

    #[test]
    fn clear_inside_a_clip_stays_inside_the_clip() {
        let mut target = RenderTarget::new(4, 1).unwrap();
        let factory = CpuSurfaceFactory::new();
        let mut canvas = factory.create_canvas(&mut target, true).unwrap();
        canvas.push_clip(Rect::new(0.0, 0.0, 2.0, 1.0));
        canvas.clear(Color::from_rgba8(255, 0, 0, 255));
        canvas.pop();
        canvas.flush().unwrap();
        drop(canvas);
        assert_eq!(&target.data()[0..4], &[255, 0, 0, 255]);
        assert_eq!(&target.data()[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn flush_with_an_open_layer_is_an_error() {
        let mut target = RenderTarget::new(2, 2).unwrap();
        let factory = CpuSurfaceFactory::new();
        let mut canvas = factory.create_canvas(&mut target, true).unwrap();
        canvas.push_opacity(0.5);
        assert!(canvas.flush().is_err());
        canvas.pop();
        assert!(canvas.flush().is_ok());
    }

    #[test]
    fn repeated_flushes_keep_earlier_content() {
        let mut target = RenderTarget::new(2, 1).unwrap();
        let factory = CpuSurfaceFactory::new();
        let mut canvas = factory.create_canvas(&mut target, true).unwrap();
        canvas.draw_rect(
            Rect::new(0.0, 0.0, 2.0, 1.0),
            Some(&Brush::solid(Color::WHITE)),
            None,
        );
        canvas.flush().unwrap();
        // An empty second flush must not erase the first one's pixels.
        canvas.flush().unwrap();
        drop(canvas);
        assert_eq!(&target.data()[0..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn draw_surface_places_pixels_at_origin() {
        let mut offscreen = RenderTarget::new(1, 1).unwrap();
        offscreen.data_mut().copy_from_slice(&[0, 255, 0, 255]);

        let mut target = RenderTarget::new(3, 1).unwrap();
        let factory = CpuSurfaceFactory::new();
        let mut canvas = factory.create_canvas(&mut target, true).unwrap();
        canvas.draw_surface(&offscreen, Point::new(2.0, 0.0));
        canvas.flush().unwrap();
        drop(canvas);
        assert_eq!(target.data()[3], 0);
        assert_eq!(&target.data()[8..12], &[0, 255, 0, 255]);
    }
}
