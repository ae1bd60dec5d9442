pub use kurbo::{Affine, BezPath, Point, Rect, Size, Vec2};

/// Straight (non-premultiplied) RGBA8 color snapshot.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::from_rgba8(0, 0, 0, 0);
    pub const BLACK: Self = Self::from_rgba8(0, 0, 0, 255);
    pub const WHITE: Self = Self::from_rgba8(255, 255, 255, 255);

    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Premultiplied RGBA8 representation, rounding to nearest.
    pub fn premul(self) -> [u8; 4] {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        [
            premul(self.r, self.a),
            premul(self.g, self.a),
            premul(self.b, self.a),
            self.a,
        ]
    }
}

/// Integer canvas dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// True when `rect` covers no area.
pub fn rect_is_empty(rect: Rect) -> bool {
    rect.width() <= 0.0 || rect.height() <= 0.0
}

/// Accumulate a bounds union, ignoring empty rects.
pub fn union_rects(acc: Option<Rect>, rect: Rect) -> Option<Rect> {
    if rect_is_empty(rect) {
        return acc;
    }
    Some(match acc {
        Some(a) => a.union(rect),
        None => rect,
    })
}

/// Validate that a rect has finite coordinates and non-negative extent.
pub fn ensure_valid_rect(rect: Rect, what: &str) -> crate::foundation::error::LimnResult<()> {
    if !(rect.x0.is_finite() && rect.y0.is_finite() && rect.x1.is_finite() && rect.y1.is_finite()) {
        return Err(crate::foundation::error::LimnError::construction(format!(
            "{what} rect must have finite coordinates"
        )));
    }
    if rect.width() < 0.0 || rect.height() < 0.0 {
        return Err(crate::foundation::error::LimnError::construction(format!(
            "{what} rect must not have negative extent"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premul_rounds_to_nearest() {
        let c = Color::from_rgba8(255, 128, 0, 128);
        assert_eq!(c.premul(), [128, 64, 0, 128]);
    }

    #[test]
    fn union_skips_empty_rects() {
        let acc = union_rects(None, Rect::new(0.0, 0.0, 0.0, 10.0));
        assert_eq!(acc, None);

        let acc = union_rects(acc, Rect::new(0.0, 0.0, 10.0, 10.0));
        let acc = union_rects(acc, Rect::new(20.0, 20.0, 30.0, 30.0));
        assert_eq!(acc, Some(Rect::new(0.0, 0.0, 30.0, 30.0)));
    }

    #[test]
    fn valid_rect_rejects_nan_and_negative() {
        assert!(ensure_valid_rect(Rect::new(0.0, 0.0, 10.0, 10.0), "test").is_ok());
        assert!(ensure_valid_rect(Rect::new(0.0, 0.0, f64::NAN, 10.0), "test").is_err());
        assert!(ensure_valid_rect(Rect::new(10.0, 0.0, 0.0, 10.0), "test").is_err());
    }
}
