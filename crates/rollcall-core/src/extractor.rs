//! Descriptor extraction: grayscale frame → fixed-length descriptor.

use crate::detector::FaceDetector;
use crate::imgproc;
use crate::types::{Descriptor, FaceBox};

pub const DEFAULT_CROP_SIZE: u32 = 100;

/// A successful extraction: the descriptor plus the face box it came from
/// (the box feeds the liveness gate downstream).
#[derive(Debug, Clone)]
pub struct ExtractedFace {
    pub descriptor: Descriptor,
    pub face: FaceBox,
}

/// Turns a grayscale frame into a fixed-length descriptor.
///
/// The crop is resized to `crop_size × crop_size`, flattened row-major, and
/// scaled into [0, 1], so the descriptor length is always `crop_size²`.
pub struct DescriptorExtractor {
    crop_size: u32,
}

impl DescriptorExtractor {
    pub fn new(crop_size: u32) -> Self {
        Self {
            crop_size: crop_size.max(1),
        }
    }

    /// Descriptor length this extractor produces.
    pub fn descriptor_len(&self) -> usize {
        (self.crop_size * self.crop_size) as usize
    }

    /// Extract a descriptor from the strongest detected face.
    ///
    /// Returns `None` when no face is detected. Detector and processing
    /// failures are logged and collapse into the same `None`; callers never
    /// see a distinction between "bad image" and "no face".
    pub fn extract(
        &self,
        detector: &mut dyn FaceDetector,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Option<ExtractedFace> {
        let faces = match detector.detect(gray, width, height) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(error = %e, "face detection failed; treating as no face");
                return None;
            }
        };

        // Detector output is confidence-sorted, so the first box is the
        // strongest detection. Multi-face frames are not disambiguated
        // beyond that.
        let face = match faces.into_iter().next() {
            Some(face) => face,
            None => {
                tracing::debug!(width, height, "no face detected in frame");
                return None;
            }
        };

        let (crop, cw, ch) =
            match imgproc::crop_clamped(gray, width, height, face.x, face.y, face.width, face.height)
            {
                Some(cropped) => cropped,
                None => {
                    tracing::warn!(
                        x = face.x,
                        y = face.y,
                        "detected face box lies outside the frame; treating as no face"
                    );
                    return None;
                }
            };

        let resized = imgproc::resize_bilinear(&crop, cw, ch, self.crop_size, self.crop_size);
        let values: Vec<f32> = resized.iter().map(|&p| p as f32 / 255.0).collect();

        Some(ExtractedFace {
            descriptor: Descriptor::new(values),
            face,
        })
    }
}

impl Default for DescriptorExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_CROP_SIZE)
    }
}
