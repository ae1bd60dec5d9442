use std::sync::Arc;

use crate::foundation::{
    core::Rect,
    error::{LimnError, LimnResult},
};

/// Immutable premultiplied-RGBA8 image snapshot shared between nodes.
///
/// Equality compares the shared pixel allocation by pointer plus the
/// dimensions: two handles to the same decoded frame are equal, a re-decoded
/// frame is not. That keeps node comparison O(1) while staying conservative.
#[derive(Clone, Debug)]
pub struct ImageSource {
    width: u32,
    height: u32,
    pixels: Arc<Vec<u8>>,
}

impl PartialEq for ImageSource {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl ImageSource {
    /// Wrap an existing premultiplied RGBA8 buffer.
    pub fn from_rgba8_premul(width: u32, height: u32, pixels: Vec<u8>) -> LimnResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| LimnError::construction("image buffer size overflow"))?;
        if pixels.len() != expected {
            return Err(LimnError::construction(
                "image pixels must match width*height*4",
            ));
        }
        Ok(Self {
            width,
            height,
            pixels: Arc::new(pixels),
        })
    }

    /// Decode encoded bytes (PNG, JPEG, ...) into a premultiplied snapshot.
    pub fn decode(bytes: &[u8]) -> LimnResult<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| LimnError::construction(format!("image decode failed: {e}")))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();

        let mut pixels = decoded.into_raw();
        for px in pixels.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            for c in &mut px[..3] {
                *c = (((u16::from(*c) * a) + 127) / 255) as u8;
            }
        }
        Self::from_rgba8_premul(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Natural placement rect at the origin.
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
