use std::fmt;
use std::rc::Rc;

use crate::canvas::{RenderTarget, SurfaceFactory};
use crate::effects::filter::FilterEffect;
use crate::foundation::{
    core::{Color, Rect, Vec2},
    error::{LimnError, LimnResult},
};
use crate::pixels;

/// Callback signature for opaque user-defined effect items.
pub type CustomEffectFn = dyn Fn(&mut CustomEffectContext<'_>) -> LimnResult<()>;

/// Bounds transform attached to a custom item, used for dirty-region
/// accounting without running the effect.
pub type BoundsTransformFn = dyn Fn(Rect) -> Rect;

/// User-defined effect item: an action over offscreen targets plus an
/// optional bounds transform. Without a transform the item is assumed to
/// preserve bounds.
#[derive(Clone)]
pub struct CustomFeItem {
    pub(crate) action: Rc<CustomEffectFn>,
    pub(crate) transform_bounds: Option<Rc<BoundsTransformFn>>,
}

impl fmt::Debug for CustomFeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFeItem")
            .field("has_bounds_transform", &self.transform_bounds.is_some())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub enum FeItemKind {
    Blur {
        sigma: Vec2,
    },
    DropShadow {
        offset: Vec2,
        sigma: Vec2,
        color: Color,
        shadow_only: bool,
    },
    Custom(CustomFeItem),
}

/// One stage of an effect chain, captured with the bounds its input covers.
#[derive(Clone, Debug)]
pub struct FeItem {
    pub(crate) kind: FeItemKind,
    pub(crate) source_bounds: Rect,
}

impl FeItem {
    pub fn source_bounds(&self) -> Rect {
        self.source_bounds
    }
}

/// Accumulates effect items in declaration order while folding the bounds
/// each stage produces. Seeded with the union of the input operations'
/// bounds; after the last item, [`FilterEffectContext::bounds`] is the
/// region the effect output covers.
#[derive(Clone, Debug)]
pub struct FilterEffectContext {
    original_bounds: Rect,
    bounds: Rect,
    items: Vec<FeItem>,
}

impl FilterEffectContext {
    pub fn new(bounds: Rect) -> Self {
        Self {
            original_bounds: bounds,
            bounds,
            items: Vec::new(),
        }
    }

    /// Bounds of the input, before any item.
    pub fn original_bounds(&self) -> Rect {
        self.original_bounds
    }

    /// Bounds after every item appended so far.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn items(&self) -> &[FeItem] {
        &self.items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Append a gaussian blur. Inflates the bounds by `3 * sigma` per side
    /// on each axis; negative sigmas clamp to zero.
    pub fn blur(&mut self, sigma: Vec2) {
        let sigma = clamp_sigma(sigma);
        let source = self.bounds;
        self.bounds = inflate_by_sigma(self.bounds, sigma);
        self.items.push(FeItem {
            kind: FeItemKind::Blur { sigma },
            source_bounds: source,
        });
    }

    /// Append a drop shadow under the input. The bounds grow to the union
    /// of the input and the offset, blur-inflated shadow.
    pub fn drop_shadow(&mut self, offset: Vec2, sigma: Vec2, color: Color) {
        let sigma = clamp_sigma(sigma);
        let source = self.bounds;
        self.bounds = source.union(inflate_by_sigma(source + offset, sigma));
        self.items.push(FeItem {
            kind: FeItemKind::DropShadow {
                offset,
                sigma,
                color,
                shadow_only: false,
            },
            source_bounds: source,
        });
    }

    /// Append a shadow that discards the input: the bounds are replaced by
    /// the shadow's own, not unioned with the input's.
    pub fn drop_shadow_only(&mut self, offset: Vec2, sigma: Vec2, color: Color) {
        let sigma = clamp_sigma(sigma);
        let source = self.bounds;
        self.bounds = inflate_by_sigma(source + offset, sigma);
        self.items.push(FeItem {
            kind: FeItemKind::DropShadow {
                offset,
                sigma,
                color,
                shadow_only: true,
            },
            source_bounds: source,
        });
    }

    /// Append an opaque user-defined item. `transform_bounds`, when given,
    /// advances the bounds; otherwise bounds are assumed preserved.
    pub fn custom_effect(
        &mut self,
        action: Rc<CustomEffectFn>,
        transform_bounds: Option<Rc<BoundsTransformFn>>,
    ) {
        let source = self.bounds;
        if let Some(tb) = &transform_bounds {
            self.bounds = tb(source);
        }
        self.items.push(FeItem {
            kind: FeItemKind::Custom(CustomFeItem {
                action,
                transform_bounds,
            }),
            source_bounds: source,
        });
    }

    /// Let `effect` append its items to this context.
    pub fn apply(&mut self, effect: &dyn FilterEffect) {
        effect.apply(self);
    }
}

fn clamp_sigma(sigma: Vec2) -> Vec2 {
    Vec2::new(sigma.x.max(0.0), sigma.y.max(0.0))
}

fn inflate_by_sigma(rect: Rect, sigma: Vec2) -> Rect {
    rect.inflate(sigma.x * 3.0, sigma.y * 3.0)
}

/// An offscreen target together with the scene-space rectangle its pixels
/// cover. Bounds are always pixel-aligned (integer coordinates).
pub struct EffectTarget {
    pub bounds: Rect,
    pub target: RenderTarget,
}

/// Handed to custom effect items: the current target chain plus the factory
/// for allocating scratch targets. An item may replace, resize or add
/// targets; the first remaining target becomes the stage output.
pub struct CustomEffectContext<'a> {
    targets: Vec<EffectTarget>,
    factory: &'a dyn SurfaceFactory,
}

impl<'a> CustomEffectContext<'a> {
    pub fn targets(&self) -> &[EffectTarget] {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut Vec<EffectTarget> {
        &mut self.targets
    }

    pub fn factory(&self) -> &'a dyn SurfaceFactory {
        self.factory
    }

    /// Allocate a transparent target covering `bounds` (aligned outward to
    /// pixel edges).
    pub fn create_target(&self, bounds: Rect) -> LimnResult<EffectTarget> {
        let bounds = bounds.expand();
        let (width, height) = rect_pixel_size(bounds)?;
        Ok(EffectTarget {
            bounds,
            target: acquire_target(self.factory, width, height)?,
        })
    }
}

/// Run `items` over `input` in order, producing the final effect output.
pub(crate) fn apply_items(
    items: &[FeItem],
    input: EffectTarget,
    factory: &dyn SurfaceFactory,
) -> LimnResult<EffectTarget> {
    let mut current = input;
    for item in items {
        current = apply_item(item, current, factory)?;
    }
    Ok(current)
}

fn apply_item(
    item: &FeItem,
    input: EffectTarget,
    factory: &dyn SurfaceFactory,
) -> LimnResult<EffectTarget> {
    match &item.kind {
        FeItemKind::Blur { sigma } => apply_blur(input, *sigma, factory),
        FeItemKind::DropShadow {
            offset,
            sigma,
            color,
            shadow_only,
        } => apply_drop_shadow(input, *offset, *sigma, *color, *shadow_only, factory),
        FeItemKind::Custom(custom) => apply_custom(input, custom, factory),
    }
}

fn apply_blur(
    input: EffectTarget,
    sigma: Vec2,
    factory: &dyn SurfaceFactory,
) -> LimnResult<EffectTarget> {
    if sigma.x <= 0.0 && sigma.y <= 0.0 {
        return Ok(input);
    }

    let out_bounds = inflate_by_sigma(input.bounds, sigma).expand();
    let (width, height) = rect_pixel_size(out_bounds)?;
    let mut padded = acquire_target(factory, width, height)?;
    pixels::blit_premul(
        padded.data_mut(),
        width,
        height,
        input.target.data(),
        input.target.width(),
        input.target.height(),
        (input.bounds.x0 - out_bounds.x0) as i64,
        (input.bounds.y0 - out_bounds.y0) as i64,
    )?;
    release_target(factory, input.target);

    let blurred = pixels::blur_rgba8_premul_xy(padded.data(), width, height, sigma.x, sigma.y)?;
    padded.data_mut().copy_from_slice(&blurred);
    Ok(EffectTarget {
        bounds: out_bounds,
        target: padded,
    })
}

fn apply_drop_shadow(
    input: EffectTarget,
    offset: Vec2,
    sigma: Vec2,
    color: Color,
    shadow_only: bool,
    factory: &dyn SurfaceFactory,
) -> LimnResult<EffectTarget> {
    // Shadow plate: the input silhouette, tinted and blurred, at an offset.
    let plate_bounds = inflate_by_sigma(input.bounds + offset, sigma).expand();
    let (plate_w, plate_h) = rect_pixel_size(plate_bounds)?;
    let mut plate = vec![0u8; pixels::buffer_len(plate_w, plate_h)?];
    pixels::blit_premul(
        &mut plate,
        plate_w,
        plate_h,
        input.target.data(),
        input.target.width(),
        input.target.height(),
        (input.bounds.x0 + offset.x - plate_bounds.x0) as i64,
        (input.bounds.y0 + offset.y - plate_bounds.y0) as i64,
    )?;
    pixels::tint_premul(&mut plate, color);
    let plate = pixels::blur_rgba8_premul_xy(&plate, plate_w, plate_h, sigma.x, sigma.y)?;

    let out_bounds = if shadow_only {
        plate_bounds
    } else {
        input.bounds.union(plate_bounds).expand()
    };
    let (width, height) = rect_pixel_size(out_bounds)?;
    let mut out = acquire_target(factory, width, height)?;
    pixels::blit_premul(
        out.data_mut(),
        width,
        height,
        &plate,
        plate_w,
        plate_h,
        (plate_bounds.x0 - out_bounds.x0) as i64,
        (plate_bounds.y0 - out_bounds.y0) as i64,
    )?;
    if !shadow_only {
        pixels::blit_premul(
            out.data_mut(),
            width,
            height,
            input.target.data(),
            input.target.width(),
            input.target.height(),
            (input.bounds.x0 - out_bounds.x0) as i64,
            (input.bounds.y0 - out_bounds.y0) as i64,
        )?;
    }
    release_target(factory, input.target);

    Ok(EffectTarget {
        bounds: out_bounds,
        target: out,
    })
}

fn apply_custom(
    input: EffectTarget,
    custom: &CustomFeItem,
    factory: &dyn SurfaceFactory,
) -> LimnResult<EffectTarget> {
    let mut context = CustomEffectContext {
        targets: vec![input],
        factory,
    };
    (custom.action)(&mut context)?;

    let mut targets = context.targets.into_iter();
    let out = targets
        .next()
        .ok_or_else(|| LimnError::effect("custom effect removed every target"))?;
    for extra in targets {
        release_target(factory, extra.target);
    }
    Ok(out)
}

/// Pixel dimensions of an aligned, non-empty rectangle.
pub(crate) fn rect_pixel_size(rect: Rect) -> LimnResult<(u32, u32)> {
    let (w, h) = (rect.width(), rect.height());
    if !w.is_finite() || !h.is_finite() || w <= 0.0 || h <= 0.0 {
        return Err(LimnError::effect("offscreen target bounds are empty"));
    }
    if w > f64::from(u32::MAX) || h > f64::from(u32::MAX) {
        return Err(LimnError::effect("offscreen target bounds too large"));
    }
    Ok((w as u32, h as u32))
}

/// Get a target from the factory's pool when it has one, else allocate.
/// Pooled targets are cleared here; fresh allocations come zeroed.
pub(crate) fn acquire_target(
    factory: &dyn SurfaceFactory,
    width: u32,
    height: u32,
) -> LimnResult<RenderTarget> {
    if let Some(cache) = factory.cache_context()
        && let Some(mut target) = cache.acquire(width, height)
    {
        target.clear_transparent();
        return Ok(target);
    }
    factory.create_render_target(width, height)
}

pub(crate) fn release_target(factory: &dyn SurfaceFactory, target: RenderTarget) {
    if let Some(cache) = factory.cache_context() {
        cache.release(target);
    }
}
