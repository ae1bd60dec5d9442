use std::any::Any;

use crate::effects::context::FilterEffectContext;
use crate::foundation::core::{Color, Rect, Vec2};

/// A pixel- and bounds-transforming stage applied to upstream operations.
///
/// Effects are plain value snapshots: the reconciler captures a clone at
/// node construction and compares it field-wise against the effect passed
/// on the next pass, so mutating an effect between frames always
/// reprocesses the node. `apply` appends this effect's items to a context
/// in declaration order.
pub trait FilterEffect: std::fmt::Debug {
    /// Append this effect's items to `context`, advancing its bounds.
    fn apply(&self, context: &mut FilterEffectContext);

    /// Bounds this effect produces from `bounds`, without touching pixels.
    fn transform_bounds(&self, bounds: Rect) -> Rect {
        let mut context = FilterEffectContext::new(bounds);
        self.apply(&mut context);
        context.bounds()
    }

    fn clone_boxed(&self) -> Box<dyn FilterEffect>;

    fn eq_dyn(&self, other: &dyn FilterEffect) -> bool;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn FilterEffect> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

impl PartialEq for Box<dyn FilterEffect> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_dyn(other.as_ref())
    }
}

/// Gaussian blur. Bounds inflate by `3 * sigma` per side on each axis;
/// negative sigmas clamp to zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blur {
    pub sigma: Vec2,
}

impl Blur {
    pub fn new(sigma_x: f64, sigma_y: f64) -> Self {
        Self {
            sigma: Vec2::new(sigma_x.max(0.0), sigma_y.max(0.0)),
        }
    }
}

impl FilterEffect for Blur {
    fn apply(&self, context: &mut FilterEffectContext) {
        context.blur(self.sigma);
    }

    fn clone_boxed(&self) -> Box<dyn FilterEffect> {
        Box::new(*self)
    }

    fn eq_dyn(&self, other: &dyn FilterEffect) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Drop shadow: a blurred, tinted copy of the input offset underneath it.
/// With `shadow_only` the input itself is discarded and the bounds are
/// replaced rather than unioned ("replacement" group semantics).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DropShadow {
    pub offset: Vec2,
    pub sigma: Vec2,
    pub color: Color,
    pub shadow_only: bool,
}

impl DropShadow {
    pub fn new(offset: Vec2, sigma: Vec2, color: Color) -> Self {
        Self {
            offset,
            sigma: Vec2::new(sigma.x.max(0.0), sigma.y.max(0.0)),
            color,
            shadow_only: false,
        }
    }

    pub fn shadow_only(mut self) -> Self {
        self.shadow_only = true;
        self
    }
}

impl FilterEffect for DropShadow {
    fn apply(&self, context: &mut FilterEffectContext) {
        if self.shadow_only {
            context.drop_shadow_only(self.offset, self.sigma, self.color);
        } else {
            context.drop_shadow(self.offset, self.sigma, self.color);
        }
    }

    fn clone_boxed(&self) -> Box<dyn FilterEffect> {
        Box::new(*self)
    }

    fn eq_dyn(&self, other: &dyn FilterEffect) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Ordered chain of effects applied input-to-output in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterEffectGroup {
    pub children: Vec<Box<dyn FilterEffect>>,
}

impl FilterEffectGroup {
    pub fn new(children: Vec<Box<dyn FilterEffect>>) -> Self {
        Self { children }
    }
}

impl FilterEffect for FilterEffectGroup {
    fn apply(&self, context: &mut FilterEffectContext) {
        for child in &self.children {
            context.apply(child.as_ref());
        }
    }

    fn clone_boxed(&self) -> Box<dyn FilterEffect> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn FilterEffect) -> bool {
        other.as_any().downcast_ref::<Self>() == Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
