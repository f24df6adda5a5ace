//! Grayscale image primitives shared by the detector preprocess and the
//! descriptor extractor: clamped crop and bilinear resize.

/// Crop a rectangular region out of a grayscale frame, clamping the region
/// to the frame bounds. Returns the cropped pixels and their dimensions.
///
/// Returns `None` when the clamped region is empty (box entirely outside
/// the frame, or a degenerate frame).
pub fn crop_clamped(
    gray: &[u8],
    width: u32,
    height: u32,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
) -> Option<(Vec<u8>, u32, u32)> {
    if width == 0 || height == 0 || gray.len() < (width * height) as usize {
        return None;
    }

    let x0 = (x.max(0.0) as u32).min(width.saturating_sub(1));
    let y0 = (y.max(0.0) as u32).min(height.saturating_sub(1));
    let x1 = ((x + w).max(0.0) as u32).min(width);
    let y1 = ((y + h).max(0.0) as u32).min(height);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let cw = x1 - x0;
    let ch = y1 - y0;
    let mut out = Vec::with_capacity((cw * ch) as usize);
    for row in y0..y1 {
        let start = (row * width + x0) as usize;
        out.extend_from_slice(&gray[start..start + cw as usize]);
    }
    Some((out, cw, ch))
}

/// Resize a grayscale image with bilinear interpolation.
///
/// Uses pixel-center sampling so that upscale and downscale stay aligned
/// with the source grid.
pub fn resize_bilinear(src: &[u8], sw: u32, sh: u32, dw: u32, dh: u32) -> Vec<u8> {
    let sw = sw as usize;
    let sh = sh as usize;
    let dw_us = dw as usize;
    let dh_us = dh as usize;
    if sw == 0 || sh == 0 || dw_us == 0 || dh_us == 0 || src.len() < sw * sh {
        return vec![0; dw_us * dh_us];
    }

    let scale_x = sw as f32 / dw_us as f32;
    let scale_y = sh as f32 / dh_us as f32;

    let mut dst = vec![0u8; dw_us * dh_us];
    for dy in 0..dh_us {
        let src_y = (dy as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i64).clamp(0, sh as i64 - 1) as usize;
        let y1 = (y0 + 1).min(sh - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for dx in 0..dw_us {
            let src_x = (dx as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i64).clamp(0, sw as i64 - 1) as usize;
            let x1 = (x0 + 1).min(sw - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let tl = src[y0 * sw + x0] as f32;
            let tr = src[y0 * sw + x1] as f32;
            let bl = src[y1 * sw + x0] as f32;
            let br = src[y1 * sw + x1] as f32;

            let top = tl + (tr - tl) * fx;
            let bottom = bl + (br - bl) * fx;
            let val = top + (bottom - top) * fy;

            dst[dy * dw_us + dx] = val.round().clamp(0.0, 255.0) as u8;
        }
    }
    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_interior() {
        // 4x4 frame with row-major values 0..16
        let frame: Vec<u8> = (0..16).collect();
        let (out, w, h) = crop_clamped(&frame, 4, 4, 1.0, 1.0, 2.0, 2.0).unwrap();
        assert_eq!((w, h), (2, 2));
        assert_eq!(out, vec![5, 6, 9, 10]);
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame: Vec<u8> = (0..16).collect();
        // Box extends past the right/bottom edge
        let (out, w, h) = crop_clamped(&frame, 4, 4, 2.0, 2.0, 10.0, 10.0).unwrap();
        assert_eq!((w, h), (2, 2));
        assert_eq!(out, vec![10, 11, 14, 15]);
    }

    #[test]
    fn test_crop_negative_origin() {
        let frame: Vec<u8> = (0..16).collect();
        let (out, w, h) = crop_clamped(&frame, 4, 4, -3.0, -3.0, 5.0, 5.0).unwrap();
        assert_eq!((w, h), (2, 2));
        assert_eq!(out, vec![0, 1, 4, 5]);
    }

    #[test]
    fn test_crop_outside_frame() {
        let frame: Vec<u8> = (0..16).collect();
        assert!(crop_clamped(&frame, 4, 4, 100.0, 100.0, 5.0, 5.0).is_none());
    }

    #[test]
    fn test_resize_uniform_stays_uniform() {
        let src = vec![128u8; 10 * 10];
        let dst = resize_bilinear(&src, 10, 10, 25, 25);
        assert_eq!(dst.len(), 25 * 25);
        assert!(dst.iter().all(|&p| p == 128));
    }

    #[test]
    fn test_resize_identity() {
        let src: Vec<u8> = (0..64).map(|v| (v * 4) as u8).collect();
        let dst = resize_bilinear(&src, 8, 8, 8, 8);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_resize_horizontal_gradient_monotonic() {
        // A left-to-right ramp must stay non-decreasing after resize.
        let sw = 16u32;
        let src: Vec<u8> = (0..16 * 16).map(|i| ((i % 16) * 17) as u8).collect();
        let dst = resize_bilinear(&src, sw, 16, 7, 7);
        for row in dst.chunks(7) {
            for pair in row.windows(2) {
                assert!(pair[1] >= pair[0], "row not monotonic: {row:?}");
            }
        }
    }

    #[test]
    fn test_resize_degenerate_source() {
        let dst = resize_bilinear(&[], 0, 0, 4, 4);
        assert_eq!(dst, vec![0u8; 16]);
    }
}
