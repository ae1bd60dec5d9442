use std::any::Any;
use std::rc::Rc;

use crate::foundation::{
    core::{Color, Point, Rect, ensure_valid_rect},
    error::LimnResult,
};
use crate::geometry::Geometry;
use crate::graph::context::RenderNodeContext;
use crate::graph::node::{NodeState, RenderNode, dispose_state};
use crate::graph::op::RenderNodeOperation;
use crate::image_source::ImageSource;
use crate::paint::{Brush, Pen};

fn pen_half_thickness(pen: Option<&Pen>) -> f64 {
    pen.map(|p| p.thickness / 2.0).unwrap_or(0.0)
}

fn point_in_ellipse(rect: Rect, point: Point) -> bool {
    let rx = rect.width() / 2.0;
    let ry = rect.height() / 2.0;
    if rx <= 0.0 || ry <= 0.0 {
        return false;
    }
    let center = rect.center();
    let nx = (point.x - center.x) / rx;
    let ny = (point.y - center.y) / ry;
    nx * nx + ny * ny <= 1.0
}

/// Stroke ring straddling the rect outline: half a thickness inward and
/// outward.
fn rect_stroke_ring_contains(rect: Rect, thickness: f64, point: Point) -> bool {
    if thickness <= 0.0 {
        return false;
    }
    let half = thickness / 2.0;
    let outer = rect.inflate(half, half);
    let inner = rect.inflate(-half, -half);
    outer.contains(point) && !(inner.width() > 0.0 && inner.height() > 0.0 && inner.contains(point))
}

fn ellipse_stroke_ring_contains(rect: Rect, thickness: f64, point: Point) -> bool {
    if thickness <= 0.0 {
        return false;
    }
    let half = thickness / 2.0;
    let outer = rect.inflate(half, half);
    let inner = rect.inflate(-half, -half);
    point_in_ellipse(outer, point) && !point_in_ellipse(inner, point)
}

/// Draws an axis-aligned rectangle with resolved fill and pen snapshots.
pub struct RectangleRenderNode {
    state: NodeState,
    rect: Rect,
    fill: Option<Brush>,
    pen: Option<Pen>,
}

impl RectangleRenderNode {
    pub fn new(rect: Rect, fill: Option<Brush>, pen: Option<Pen>) -> LimnResult<Self> {
        ensure_valid_rect(rect, "rectangle")?;
        Ok(Self {
            state: NodeState::new(),
            rect,
            fill,
            pen,
        })
    }

    pub fn equals(&self, rect: Rect, fill: Option<&Brush>, pen: Option<&Pen>) -> bool {
        self.rect == rect && self.fill.as_ref() == fill && self.pen.as_ref() == pen
    }

    pub fn update(&mut self, rect: Rect, fill: Option<Brush>, pen: Option<Pen>) -> bool {
        if self.equals(rect, fill.as_ref(), pen.as_ref()) {
            return false;
        }
        self.rect = rect;
        self.fill = fill;
        self.pen = pen;
        self.state.mark_dirty();
        true
    }
}

impl RenderNode for RectangleRenderNode {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    fn process(&mut self, _context: &mut RenderNodeContext<'_>) -> Vec<Rc<RenderNodeOperation>> {
        let rect = self.rect;
        let fill = self.fill.clone();
        let pen = self.pen.clone();
        let half = pen_half_thickness(pen.as_ref());
        let bounds = rect.inflate(half, half);

        let has_fill = fill.is_some();
        let thickness = pen.as_ref().map(|p| p.thickness).unwrap_or(0.0);
        let hit = move |point: Point| {
            (has_fill && rect.contains(point)) || rect_stroke_ring_contains(rect, thickness, point)
        };

        vec![Rc::new(RenderNodeOperation::from_parts(
            bounds,
            Box::new(move |canvas, _factory| {
                canvas.draw_rect(rect, fill.as_ref(), pen.as_ref());
                Ok(())
            }),
            Some(Box::new(hit)),
        ))]
    }

    fn dispose(&mut self) {
        dispose_state(&mut self.state, true);
    }

    fn kind(&self) -> &'static str {
        "rectangle"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Draws the ellipse inscribed in a rect.
pub struct EllipseRenderNode {
    state: NodeState,
    rect: Rect,
    fill: Option<Brush>,
    pen: Option<Pen>,
}

impl EllipseRenderNode {
    pub fn new(rect: Rect, fill: Option<Brush>, pen: Option<Pen>) -> LimnResult<Self> {
        ensure_valid_rect(rect, "ellipse")?;
        Ok(Self {
            state: NodeState::new(),
            rect,
            fill,
            pen,
        })
    }

    pub fn equals(&self, rect: Rect, fill: Option<&Brush>, pen: Option<&Pen>) -> bool {
        self.rect == rect && self.fill.as_ref() == fill && self.pen.as_ref() == pen
    }

    pub fn update(&mut self, rect: Rect, fill: Option<Brush>, pen: Option<Pen>) -> bool {
        if self.equals(rect, fill.as_ref(), pen.as_ref()) {
            return false;
        }
        self.rect = rect;
        self.fill = fill;
        self.pen = pen;
        self.state.mark_dirty();
        true
    }
}

impl RenderNode for EllipseRenderNode {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    fn process(&mut self, _context: &mut RenderNodeContext<'_>) -> Vec<Rc<RenderNodeOperation>> {
        let rect = self.rect;
        let fill = self.fill.clone();
        let pen = self.pen.clone();
        let half = pen_half_thickness(pen.as_ref());
        let bounds = rect.inflate(half, half);

        let has_fill = fill.is_some();
        let thickness = pen.as_ref().map(|p| p.thickness).unwrap_or(0.0);
        let hit = move |point: Point| {
            (has_fill && point_in_ellipse(rect, point))
                || ellipse_stroke_ring_contains(rect, thickness, point)
        };

        vec![Rc::new(RenderNodeOperation::from_parts(
            bounds,
            Box::new(move |canvas, _factory| {
                canvas.draw_ellipse(rect, fill.as_ref(), pen.as_ref());
                Ok(())
            }),
            Some(Box::new(hit)),
        ))]
    }

    fn dispose(&mut self) {
        dispose_state(&mut self.state, true);
    }

    fn kind(&self) -> &'static str {
        "ellipse"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Draws an arbitrary bezier geometry; hit testing delegates to the
/// geometry's native fill/stroke containment.
pub struct GeometryRenderNode {
    state: NodeState,
    geometry: Geometry,
    fill: Option<Brush>,
    pen: Option<Pen>,
}

impl GeometryRenderNode {
    pub fn new(geometry: Geometry, fill: Option<Brush>, pen: Option<Pen>) -> Self {
        Self {
            state: NodeState::new(),
            geometry,
            fill,
            pen,
        }
    }

    pub fn equals(&self, geometry: &Geometry, fill: Option<&Brush>, pen: Option<&Pen>) -> bool {
        self.geometry == *geometry && self.fill.as_ref() == fill && self.pen.as_ref() == pen
    }

    pub fn update(&mut self, geometry: Geometry, fill: Option<Brush>, pen: Option<Pen>) -> bool {
        if self.equals(&geometry, fill.as_ref(), pen.as_ref()) {
            return false;
        }
        self.geometry = geometry;
        self.fill = fill;
        self.pen = pen;
        self.state.mark_dirty();
        true
    }
}

impl RenderNode for GeometryRenderNode {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    fn process(&mut self, _context: &mut RenderNodeContext<'_>) -> Vec<Rc<RenderNodeOperation>> {
        let geometry = Rc::new(self.geometry.clone());
        let fill = self.fill.clone();
        let pen = self.pen.clone();
        let half = pen_half_thickness(pen.as_ref());
        let bounds = geometry.bounds().inflate(half, half);

        let has_fill = fill.is_some();
        let thickness = pen.as_ref().map(|p| p.thickness).unwrap_or(0.0);
        let hit_geometry = geometry.clone();
        let hit = move |point: Point| {
            (has_fill && hit_geometry.fill_contains(point))
                || hit_geometry.stroke_contains(point, thickness)
        };

        vec![Rc::new(RenderNodeOperation::from_parts(
            bounds,
            Box::new(move |canvas, _factory| {
                canvas.draw_geometry(&geometry, fill.as_ref(), pen.as_ref());
                Ok(())
            }),
            Some(Box::new(hit)),
        ))]
    }

    fn dispose(&mut self) {
        dispose_state(&mut self.state, true);
    }

    fn kind(&self) -> &'static str {
        "geometry"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Draws an image snapshot at its natural size.
pub struct ImageSourceRenderNode {
    state: NodeState,
    image: ImageSource,
    fill: Option<Brush>,
    pen: Option<Pen>,
}

impl ImageSourceRenderNode {
    pub fn new(image: ImageSource, fill: Option<Brush>, pen: Option<Pen>) -> Self {
        Self {
            state: NodeState::new(),
            image,
            fill,
            pen,
        }
    }

    pub fn equals(&self, image: &ImageSource, fill: Option<&Brush>, pen: Option<&Pen>) -> bool {
        self.image == *image && self.fill.as_ref() == fill && self.pen.as_ref() == pen
    }

    pub fn update(&mut self, image: ImageSource, fill: Option<Brush>, pen: Option<Pen>) -> bool {
        if self.equals(&image, fill.as_ref(), pen.as_ref()) {
            return false;
        }
        self.image = image;
        self.fill = fill;
        self.pen = pen;
        self.state.mark_dirty();
        true
    }
}

impl RenderNode for ImageSourceRenderNode {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    fn process(&mut self, _context: &mut RenderNodeContext<'_>) -> Vec<Rc<RenderNodeOperation>> {
        let image = self.image.clone();
        let rect = image.rect();
        let fill = self.fill.clone();
        let pen = self.pen.clone();
        let half = pen_half_thickness(pen.as_ref());
        let bounds = rect.inflate(half, half);

        let thickness = pen.as_ref().map(|p| p.thickness).unwrap_or(0.0);
        let hit = move |point: Point| {
            rect.contains(point) || rect_stroke_ring_contains(rect, thickness, point)
        };

        vec![Rc::new(RenderNodeOperation::from_parts(
            bounds,
            Box::new(move |canvas, _factory| {
                canvas.draw_image(&image, rect, fill.as_ref(), pen.as_ref());
                Ok(())
            }),
            Some(Box::new(hit)),
        ))]
    }

    fn dispose(&mut self) {
        dispose_state(&mut self.state, true);
    }

    fn kind(&self) -> &'static str {
        "image_source"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Whole-surface clear. Bounds are always empty: a clear is a side effect
/// on the surface, not a boundable draw, and it never hit-tests.
pub struct ClearRenderNode {
    state: NodeState,
    color: Color,
}

impl ClearRenderNode {
    pub fn new(color: Color) -> Self {
        Self {
            state: NodeState::new(),
            color,
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn equals(&self, color: Color) -> bool {
        self.color == color
    }

    pub fn update(&mut self, color: Color) -> bool {
        if self.color == color {
            return false;
        }
        self.color = color;
        self.state.mark_dirty();
        true
    }
}

impl RenderNode for ClearRenderNode {
    fn state(&self) -> &NodeState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut NodeState {
        &mut self.state
    }

    fn process(&mut self, _context: &mut RenderNodeContext<'_>) -> Vec<Rc<RenderNodeOperation>> {
        let color = self.color;
        vec![Rc::new(RenderNodeOperation::from_parts(
            Rect::ZERO,
            Box::new(move |canvas, _factory| {
                canvas.clear(color);
                Ok(())
            }),
            Some(Box::new(|_point| false)),
        ))]
    }

    fn dispose(&mut self) {
        dispose_state(&mut self.state, true);
    }

    fn kind(&self) -> &'static str {
        "clear"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
