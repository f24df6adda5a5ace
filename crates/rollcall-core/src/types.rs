//! Shared types: detected face regions and face descriptors.

use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceBox {
    /// Whether a point lies inside the box (inclusive edges).
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    /// Eye landmarks (the first two of the five points), if present.
    pub fn eyes(&self) -> Option<[(f32, f32); 2]> {
        self.landmarks.map(|lms| [lms[0], lms[1]])
    }
}

/// Fixed-length face descriptor: a flattened grayscale crop with each
/// intensity scaled into [0, 1]. Length is the crop dimension squared
/// (10,000 for the default 100×100 crop).
///
/// Serializes as a bare JSON array of floats; the storage layer treats
/// it as opaque text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Euclidean distance to another descriptor of the same length.
    ///
    /// Lengths are the caller's responsibility; mismatched inputs are
    /// rejected in [`MatchPolicy`](crate::matcher::MatchPolicy), not here.
    pub fn distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Serialize to the persistence format (JSON array of floats).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from the persistence format.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identical() {
        let a = Descriptor::new(vec![0.1, 0.5, 0.9]);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_distance_unit_axes() {
        let a = Descriptor::new(vec![1.0, 0.0]);
        let b = Descriptor::new(vec![0.0, 1.0]);
        assert!((a.distance(&b) - std::f32::consts::SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_json_roundtrip_is_bare_array() {
        let d = Descriptor::new(vec![0.0, 0.25, 1.0]);
        let json = d.to_json().unwrap();
        assert_eq!(json, "[0.0,0.25,1.0]");
        let back = Descriptor::from_json(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_facebox_contains_edges() {
        let b = FaceBox {
            x: 10.0,
            y: 10.0,
            width: 20.0,
            height: 20.0,
            confidence: 0.9,
            landmarks: None,
        };
        assert!(b.contains(10.0, 10.0));
        assert!(b.contains(30.0, 30.0));
        assert!(!b.contains(30.1, 15.0));
        assert!(!b.contains(9.9, 15.0));
    }

    #[test]
    fn test_facebox_eyes() {
        let b = FaceBox {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            confidence: 1.0,
            landmarks: Some([(2.0, 3.0), (7.0, 3.0), (5.0, 5.0), (3.0, 8.0), (7.0, 8.0)]),
        };
        assert_eq!(b.eyes(), Some([(2.0, 3.0), (7.0, 3.0)]));
    }
}
