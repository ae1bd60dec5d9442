//! Premultiplied-RGBA8 pixel helpers used by the filter-effect pipeline and
//! the CPU backend: gaussian blur, source-over compositing, offset blits and
//! alpha tinting. Fixed-point Q16 kernels keep results deterministic across
//! platforms.

use crate::foundation::{
    core::Color,
    error::{LimnError, LimnResult},
};

/// Gaussian blur with independent horizontal and vertical sigmas. Radii
/// are derived as `ceil(3 * sigma)` per axis; zero sigmas are identity.
pub fn blur_rgba8_premul_xy(
    src: &[u8],
    width: u32,
    height: u32,
    sigma_x: f64,
    sigma_y: f64,
) -> LimnResult<Vec<u8>> {
    let expected_len = buffer_len(width, height)?;
    if src.len() != expected_len {
        return Err(LimnError::effect(
            "blur_rgba8_premul_xy expects src matching width*height*4",
        ));
    }

    let radius_x = sigma_to_radius(sigma_x);
    let radius_y = sigma_to_radius(sigma_y);
    if radius_x == 0 && radius_y == 0 {
        return Ok(src.to_vec());
    }

    let kernel_x = gaussian_kernel_q16(radius_x, sigma_x.max(f64::MIN_POSITIVE))?;
    let kernel_y = gaussian_kernel_q16(radius_y, sigma_y.max(f64::MIN_POSITIVE))?;
    let mut tmp = vec![0u8; expected_len];
    let mut out = vec![0u8; expected_len];

    horizontal_pass(src, &mut tmp, width, height, &kernel_x);
    vertical_pass(&tmp, &mut out, width, height, &kernel_y);
    Ok(out)
}

/// Kernel radius for a sigma, matching the 3-sigma bounds inflation used by
/// blur bounds transforms.
pub fn sigma_to_radius(sigma: f64) -> u32 {
    if !sigma.is_finite() || sigma <= 0.0 {
        return 0;
    }
    (sigma * 3.0).ceil() as u32
}

/// Copy `src` into `dst` at integer offset `(dx, dy)`, clipping to the
/// destination. Destination pixels outside the blit are left untouched.
pub fn blit_premul(
    dst: &mut [u8],
    dst_width: u32,
    dst_height: u32,
    src: &[u8],
    src_width: u32,
    src_height: u32,
    dx: i64,
    dy: i64,
) -> LimnResult<()> {
    if dst.len() != buffer_len(dst_width, dst_height)?
        || src.len() != buffer_len(src_width, src_height)?
    {
        return Err(LimnError::effect("blit_premul buffer length mismatch"));
    }

    for sy in 0..i64::from(src_height) {
        let ty = sy + dy;
        if ty < 0 || ty >= i64::from(dst_height) {
            continue;
        }
        for sx in 0..i64::from(src_width) {
            let tx = sx + dx;
            if tx < 0 || tx >= i64::from(dst_width) {
                continue;
            }
            let si = ((sy * i64::from(src_width) + sx) as usize) * 4;
            let di = ((ty * i64::from(dst_width) + tx) as usize) * 4;
            let s = [src[si], src[si + 1], src[si + 2], src[si + 3]];
            let d = [dst[di], dst[di + 1], dst[di + 2], dst[di + 3]];
            dst[di..di + 4].copy_from_slice(&over(d, s));
        }
    }
    Ok(())
}

/// Replace every pixel's color with `color`, scaled by the pixel's alpha.
/// Used to turn a silhouette into a shadow plate.
pub fn tint_premul(buf: &mut [u8], color: Color) {
    let tint = color.premul();
    for px in buf.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        for c in 0..4 {
            px[c] = ((u16::from(tint[c]) * a + 127) / 255) as u8;
        }
    }
}

pub(crate) fn buffer_len(width: u32, height: u32) -> LimnResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| LimnError::effect("pixel buffer size overflow"))
}

fn over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    if src[3] == 0 && src[0] == 0 && src[1] == 0 && src[2] == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(src[3]);

    let mut out = [0u8; 4];
    for i in 0..4 {
        let dc = (((u32::from(dst[i]) * u32::from(inv)) + 127) / 255) as u8;
        out[i] = src[i].saturating_add(dc);
    }
    out
}

fn gaussian_kernel_q16(radius: u32, sigma: f64) -> LimnResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(LimnError::effect("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(LimnError::effect("gaussian kernel sum is zero"));
    }

    // Normalize to a fixed-point kernel summing exactly to 1<<16 so constant
    // regions survive the blur bit-exactly.
    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let new_mid = (i64::from(weights[mid]) + delta).clamp(0, 65536);
        weights[mid] = new_mid as u32;
    }

    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let dx = ki as i32 - radius;
                let sx = (x + dx).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let dy = ki as i32 - radius;
                let sy = (y + dy).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    (v.min(255)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_zero_sigma_is_identity() {
        let src = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let out = blur_rgba8_premul_xy(&src, 1, 2, 0.0, 0.0).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn blur_constant_image_is_identity() {
        let (w, h) = (4u32, 3u32);
        let px = [10u8, 20u8, 30u8, 40u8];
        let src = px.repeat((w * h) as usize);
        let out = blur_rgba8_premul_xy(&src, w, h, 1.0, 1.0).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn blur_spreads_energy_from_single_pixel() {
        let (w, h) = (9u32, 9u32);
        let mut src = vec![0u8; (w * h * 4) as usize];
        let center = ((4 * w + 4) * 4) as usize;
        src[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

        let out = blur_rgba8_premul_xy(&src, w, h, 1.2, 1.2).unwrap();

        let nonzero = out.chunks_exact(4).filter(|px| px[3] != 0).count();
        assert!(nonzero > 1);

        let sum_a: u32 = out.chunks_exact(4).map(|px| u32::from(px[3])).sum();
        assert!((sum_a as i32 - 255).abs() <= 4);
    }

    #[test]
    fn blit_composites_over() {
        let mut dst = vec![0u8, 0, 0, 255];
        blit_premul(&mut dst, 1, 1, &[255, 0, 0, 255], 1, 1, 0, 0).unwrap();
        assert_eq!(dst, vec![255, 0, 0, 255]);
    }

    #[test]
    fn blit_clips_to_destination() {
        let mut dst = vec![0u8; 2 * 2 * 4];
        let src = vec![255u8; 2 * 2 * 4];
        blit_premul(&mut dst, 2, 2, &src, 2, 2, 1, 1).unwrap();
        assert_eq!(&dst[0..4], &[0, 0, 0, 0]);
        assert_eq!(&dst[12..16], &[255, 255, 255, 255]);
    }

    #[test]
    fn tint_scales_by_alpha() {
        let mut buf = vec![255u8, 255, 255, 255, 0, 0, 0, 0];
        tint_premul(&mut buf, Color::from_rgba8(255, 0, 0, 255));
        assert_eq!(&buf[0..4], &[255, 0, 0, 255]);
        assert_eq!(&buf[4..8], &[0, 0, 0, 0]);
    }
}
