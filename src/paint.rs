use crate::foundation::{
    core::Color,
    error::{LimnError, LimnResult},
};

/// Resolved fill snapshot. Brushes are plain values sampled from the
/// property system before node construction; they never reference live,
/// mutable paint objects.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Brush {
    Solid { color: Color, opacity: f32 },
}

impl Brush {
    pub fn solid(color: Color) -> Self {
        Self::Solid {
            color,
            opacity: 1.0,
        }
    }

    pub fn with_opacity(self, opacity: f32) -> Self {
        match self {
            Self::Solid { color, .. } => Self::Solid {
                color,
                opacity: opacity.clamp(0.0, 1.0),
            },
        }
    }

    /// Effective solid color with brush opacity folded into alpha.
    pub fn effective_color(&self) -> Color {
        match *self {
            Self::Solid { color, opacity } => {
                let a = (f32::from(color.a) * opacity.clamp(0.0, 1.0)).round() as u8;
                Color::from_rgba8(color.r, color.g, color.b, a)
            }
        }
    }
}

/// Resolved stroke snapshot: a brush plus a stroke thickness.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pen {
    pub brush: Brush,
    pub thickness: f64,
}

impl Pen {
    pub fn new(brush: Brush, thickness: f64) -> LimnResult<Self> {
        if !thickness.is_finite() || thickness < 0.0 {
            return Err(LimnError::construction(
                "pen thickness must be finite and >= 0",
            ));
        }
        Ok(Self { brush, thickness })
    }
}
