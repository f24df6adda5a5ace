//! Face detection behind a trait seam.
//!
//! The pipeline only depends on [`FaceDetector`]; the shipped implementation
//! is SCRFD over ONNX Runtime. Any cascade or landmark detector that yields
//! bounding boxes can stand in (tests use stubs).

use crate::imgproc;
use crate::types::FaceBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const DET_INPUT_SIZE: usize = 640;
const DET_MEAN: f32 = 127.5;
const DET_STD: f32 = 128.0;
const DET_NMS_THRESHOLD: f32 = 0.4;
const DET_STRIDES: [usize; 3] = [8, 16, 32];
const DET_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Face-region detector boundary.
///
/// Implementations return boxes sorted by descending confidence, so the
/// first entry is always the strongest detection.
pub trait FaceDetector {
    fn detect(&mut self, gray: &[u8], width: u32, height: u32) -> Result<Vec<FaceBox>, DetectError>;
}

/// Geometry of a letterbox resize, kept for mapping detections back into
/// source-frame coordinates.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Output tensor indices for one stride level: (score, bbox, keypoints).
type StrideSlots = (usize, usize, usize);

/// SCRFD face detector with 3-stride anchor-free decoding and NMS.
pub struct ScrfdDetector {
    session: Session,
    score_threshold: f32,
    /// Tensor slots per stride, discovered by output name at load time with
    /// a positional fallback.
    slots: [StrideSlots; 3],
}

impl ScrfdDetector {
    /// Load the SCRFD ONNX model, failing fast on a missing file.
    pub fn load(model_path: &str, score_threshold: f32) -> Result<Self, DetectError> {
        if !Path::new(model_path).exists() {
            return Err(DetectError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()
            .map_err(ort::Error::from)?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        if output_names.len() < 9 {
            return Err(DetectError::InferenceFailed(format!(
                "SCRFD model must expose 9 outputs (3 strides x score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let slots = map_output_slots(&output_names);
        tracing::info!(path = model_path, outputs = ?output_names, ?slots, "loaded SCRFD model");

        Ok(Self {
            session,
            score_threshold,
            slots,
        })
    }
}

impl FaceDetector for ScrfdDetector {
    fn detect(&mut self, gray: &[u8], width: u32, height: u32) -> Result<Vec<FaceBox>, DetectError> {
        let (input, letterbox) = preprocess(gray, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();
        for (level, &stride) in DET_STRIDES.iter().enumerate() {
            let (score_slot, bbox_slot, kps_slot) = self.slots[level];
            let (_, scores) = outputs[score_slot]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_slot]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            let (_, kps) = outputs[kps_slot]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            decode_stride(
                scores,
                bboxes,
                kps,
                stride,
                &letterbox,
                self.score_threshold,
                &mut detections,
            );
        }

        let mut kept = nms(detections, DET_NMS_THRESHOLD);
        kept.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(kept)
    }
}

/// Letterbox a grayscale frame into the square SCRFD input tensor.
///
/// The padding value equals the model mean, so padded pixels normalize
/// to exactly zero.
fn preprocess(gray: &[u8], width: usize, height: usize) -> (Array4<f32>, Letterbox) {
    let side = DET_INPUT_SIZE;
    let scale = (side as f32 / width.max(1) as f32).min(side as f32 / height.max(1) as f32);
    let new_w = ((width as f32 * scale).round() as usize).max(1);
    let new_h = ((height as f32 * scale).round() as usize).max(1);
    let pad_x = (side - new_w) as f32 / 2.0;
    let pad_y = (side - new_h) as f32 / 2.0;

    let resized = imgproc::resize_bilinear(gray, width as u32, height as u32, new_w as u32, new_h as u32);

    let x_off = pad_x.floor() as usize;
    let y_off = pad_y.floor() as usize;

    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for y in 0..side {
        for x in 0..side {
            let in_content =
                y >= y_off && y < y_off + new_h && x >= x_off && x < x_off + new_w;
            let pixel = if in_content {
                resized[(y - y_off) * new_w + (x - x_off)] as f32
            } else {
                DET_MEAN
            };
            let normalized = (pixel - DET_MEAN) / DET_STD;
            // Grayscale replicated across the three input channels.
            for c in 0..3 {
                tensor[[0, c, y, x]] = normalized;
            }
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

/// Map output tensor names to per-stride slots.
///
/// Exported SCRFD graphs either carry descriptive names ("score_8",
/// "bbox_16", "kps_32") or opaque numeric ones. With descriptive names the
/// slots are looked up; otherwise the conventional positional layout is
/// assumed: scores first, then bboxes, then keypoints, stride-major.
fn map_output_slots(names: &[String]) -> [StrideSlots; 3] {
    let lookup = |kind: &str, stride: usize| {
        let wanted = format!("{kind}_{stride}");
        names.iter().position(|n| *n == wanted)
    };

    let mut slots = [(0usize, 0usize, 0usize); 3];
    let mut all_named = true;
    for (level, &stride) in DET_STRIDES.iter().enumerate() {
        match (lookup("score", stride), lookup("bbox", stride), lookup("kps", stride)) {
            (Some(s), Some(b), Some(k)) => slots[level] = (s, b, k),
            _ => {
                all_named = false;
                break;
            }
        }
    }

    if all_named {
        slots
    } else {
        tracing::info!(?names, "SCRFD output names not recognized; assuming positional layout");
        [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
    }
}

/// Decode one stride level into face boxes in source-frame coordinates.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    score_threshold: f32,
    out: &mut Vec<FaceBox>,
) {
    let grid = DET_INPUT_SIZE / stride;
    let anchors = grid * grid * DET_ANCHORS_PER_CELL;

    for idx in 0..anchors {
        let score = match scores.get(idx) {
            Some(&s) if s > score_threshold => s,
            _ => continue,
        };

        let cell = idx / DET_ANCHORS_PER_CELL;
        let anchor_x = ((cell % grid) * stride) as f32;
        let anchor_y = ((cell / grid) * stride) as f32;

        let b = idx * 4;
        if b + 3 >= bboxes.len() {
            continue;
        }
        let (x1, y1) = letterbox.to_source(
            anchor_x - bboxes[b] * stride as f32,
            anchor_y - bboxes[b + 1] * stride as f32,
        );
        let (x2, y2) = letterbox.to_source(
            anchor_x + bboxes[b + 2] * stride as f32,
            anchor_y + bboxes[b + 3] * stride as f32,
        );

        let k = idx * 10;
        let landmarks = if k + 9 < kps.len() {
            let mut points = [(0.0f32, 0.0f32); 5];
            for (i, point) in points.iter_mut().enumerate() {
                *point = letterbox.to_source(
                    anchor_x + kps[k + i * 2] * stride as f32,
                    anchor_y + kps[k + i * 2 + 1] * stride as f32,
                );
            }
            Some(points)
        } else {
            None
        };

        out.push(FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }
}

/// Non-maximum suppression over IoU.
fn nms(mut detections: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| iou(k, &det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
