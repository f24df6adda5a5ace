//! Image transport: base64 payloads (optionally data-URL wrapped) into
//! grayscale pixel grids.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;

/// A decoded single-channel frame.
#[derive(Debug, Clone)]
pub struct GrayFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode a base64 image payload into a grayscale frame.
///
/// Accepts both bare base64 and `data:image/...;base64,<data>` payloads
/// (browsers send the latter). Color images are collapsed to luma. Any
/// decode failure returns `None`; downstream this is indistinguishable
/// from "no face detected", by design.
pub fn decode_image(payload: &str) -> Option<GrayFrame> {
    let b64 = match payload.split_once(',') {
        Some((_, rest)) => rest,
        None => payload,
    };

    let bytes = match B64.decode(b64.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "image payload is not valid base64");
            return None;
        }
    };

    let img = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(error = %e, "image payload did not decode");
            return None;
        }
    };

    let gray = img.to_luma8();
    Some(GrayFrame {
        width: gray.width(),
        height: gray.height(),
        data: gray.into_raw(),
    })
}

/// Base64-encode raw image file bytes into a transport payload.
pub fn encode_payload(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    fn png_payload(width: u32, height: u32, fill: u8) -> String {
        let img = GrayImage::from_pixel(width, height, Luma([fill]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        encode_payload(buf.get_ref())
    }

    #[test]
    fn test_decode_bare_base64() {
        let frame = decode_image(&png_payload(6, 4, 200)).unwrap();
        assert_eq!((frame.width, frame.height), (6, 4));
        assert_eq!(frame.data.len(), 24);
        assert!(frame.data.iter().all(|&p| p == 200));
    }

    #[test]
    fn test_decode_data_url() {
        let payload = format!("data:image/png;base64,{}", png_payload(3, 3, 10));
        let frame = decode_image(&payload).unwrap();
        assert_eq!((frame.width, frame.height), (3, 3));
    }

    #[test]
    fn test_garbage_base64_is_none() {
        assert!(decode_image("!!not-base64!!").is_none());
    }

    #[test]
    fn test_valid_base64_invalid_image_is_none() {
        let payload = encode_payload(b"plainly not an image");
        assert!(decode_image(&payload).is_none());
    }
}
