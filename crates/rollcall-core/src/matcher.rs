//! Descriptor matching: 1:1 verification by Euclidean distance threshold.

use crate::types::Descriptor;

/// Distance threshold tuned against raw 10,000-dimension [0,1]-scaled
/// descriptors (not normalized per dimension). Deployment-specific; expose
/// through configuration rather than relying on this default.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 30.0;

/// Match decision policy for a stored descriptor against a fresh capture.
#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    pub threshold: f32,
}

impl MatchPolicy {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Euclidean distance between the two descriptors, or `None` on a
    /// length mismatch.
    pub fn distance(&self, stored: &Descriptor, candidate: &Descriptor) -> Option<f32> {
        if stored.len() != candidate.len() {
            return None;
        }
        Some(stored.distance(candidate))
    }

    /// True iff the descriptors match: distance strictly below the
    /// threshold. A distance equal to the threshold is a non-match.
    ///
    /// Fails closed: mismatched lengths and NaN distances both return
    /// false rather than erroring.
    pub fn is_match(&self, stored: &Descriptor, candidate: &Descriptor) -> bool {
        let Some(distance) = self.distance(stored, candidate) else {
            tracing::warn!(
                stored_len = stored.len(),
                candidate_len = candidate.len(),
                "descriptor length mismatch; treating as non-match"
            );
            return false;
        };
        tracing::debug!(distance, threshold = self.threshold, "descriptor comparison");
        distance < self.threshold
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_identical_all_zero_10k_matches() {
        let stored = Descriptor::new(vec![0.0; 10_000]);
        let candidate = Descriptor::new(vec![0.0; 10_000]);
        let policy = MatchPolicy::default();
        assert_eq!(policy.distance(&stored, &candidate), Some(0.0));
        assert!(policy.is_match(&stored, &candidate));
    }

    #[test]
    fn test_exact_threshold_is_non_match() {
        // 900 dimensions each differing by 1.0: distance = sqrt(900) = 30.0
        let stored = Descriptor::new(vec![0.0; 900]);
        let candidate = Descriptor::new(vec![1.0; 900]);
        let policy = MatchPolicy::default();
        assert_eq!(policy.distance(&stored, &candidate), Some(30.0));
        assert!(!policy.is_match(&stored, &candidate));
    }

    #[test]
    fn test_just_below_threshold_matches() {
        let stored = Descriptor::new(vec![0.0; 899]);
        let candidate = Descriptor::new(vec![1.0; 899]);
        let policy = MatchPolicy::default();
        assert!(policy.is_match(&stored, &candidate));
    }

    #[test]
    fn test_random_unrelated_vector_rejected() {
        // Two independent uniform [0,1] 10,000-dim vectors sit at distance
        // ~sqrt(10000/6) ≈ 40.8, far above the 30.0 threshold.
        let mut rng = StdRng::seed_from_u64(0x0a11_ca11);
        let stored = Descriptor::new((0..10_000).map(|_| rng.gen::<f32>()).collect());
        let candidate = Descriptor::new((0..10_000).map(|_| rng.gen::<f32>()).collect());
        let policy = MatchPolicy::default();

        let distance = policy.distance(&stored, &candidate).unwrap();
        assert!(distance > policy.threshold, "distance {distance} unexpectedly small");
        assert!(!policy.is_match(&stored, &candidate));
    }

    #[test]
    fn test_length_mismatch_fails_closed() {
        let stored = Descriptor::new(vec![0.0; 10_000]);
        let candidate = Descriptor::new(vec![0.0; 2_500]);
        let policy = MatchPolicy::default();
        assert_eq!(policy.distance(&stored, &candidate), None);
        assert!(!policy.is_match(&stored, &candidate));
    }

    #[test]
    fn test_nan_fails_closed() {
        let stored = Descriptor::new(vec![f32::NAN, 0.0]);
        let candidate = Descriptor::new(vec![0.0, 0.0]);
        assert!(!MatchPolicy::default().is_match(&stored, &candidate));
    }
}
