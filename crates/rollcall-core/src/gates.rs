//! Ancillary attendance gates: time window, geofence, liveness.
//!
//! Each gate is an independent boolean predicate. [`GateSet`] composes the
//! configured gates with logical AND ahead of the face-match decision; the
//! first failing gate is reported.

use crate::types::FaceBox;
use chrono::NaiveTime;
use thiserror::Error;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Which gate rejected an attendance attempt.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDenied {
    #[error("current time is outside the configured attendance windows")]
    OutsideWindow,
    #[error("claimed location is outside the campus geofence")]
    OutsideGeofence,
    #[error("liveness check failed")]
    LivenessFailed,
}

/// One wall-clock attendance window with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn contains(&self, t: NaiveTime) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Rejects attendance outside the configured windows
/// (e.g. 08:00–09:00 and 13:00–14:00).
#[derive(Debug, Clone)]
pub struct TimeWindowGate {
    windows: Vec<TimeWindow>,
}

impl TimeWindowGate {
    pub fn new(windows: Vec<TimeWindow>) -> Self {
        Self { windows }
    }

    pub fn allows(&self, now: NaiveTime) -> bool {
        self.windows.iter().any(|w| w.contains(now))
    }
}

/// Circular allowed region around a campus coordinate.
#[derive(Debug, Clone, Copy)]
pub struct GeofenceGate {
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_km: f64,
}

impl GeofenceGate {
    pub fn new(center_lat: f64, center_lon: f64, radius_km: f64) -> Self {
        Self {
            center_lat,
            center_lon,
            radius_km,
        }
    }

    pub fn allows(&self, lat: f64, lon: f64) -> bool {
        haversine_km(self.center_lat, self.center_lon, lat, lon) <= self.radius_km
    }
}

/// Great-circle distance between two coordinates, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Weak anti-spoofing heuristic: require at least `min_eyes` eye landmarks
/// inside the detected face box.
///
/// This is a coarse signal with high false rates in both directions, not a
/// security control. Faces detected without landmarks fail the gate.
#[derive(Debug, Clone, Copy)]
pub struct LivenessGate {
    pub min_eyes: usize,
}

impl LivenessGate {
    pub fn new(min_eyes: usize) -> Self {
        Self { min_eyes }
    }

    pub fn allows(&self, face: &FaceBox) -> bool {
        let Some(eyes) = face.eyes() else {
            return false;
        };
        let visible = eyes.iter().filter(|(x, y)| face.contains(*x, *y)).count();
        visible >= self.min_eyes
    }
}

impl Default for LivenessGate {
    fn default() -> Self {
        Self { min_eyes: 2 }
    }
}

/// The configured gates for a deployment. Unset gates always pass.
#[derive(Debug, Clone, Default)]
pub struct GateSet {
    pub window: Option<TimeWindowGate>,
    pub geofence: Option<GeofenceGate>,
    pub liveness: Option<LivenessGate>,
}

impl GateSet {
    /// Evaluate every configured gate; AND composition, first failure wins.
    ///
    /// A configured geofence with no claimed location fails closed.
    pub fn evaluate(
        &self,
        now: NaiveTime,
        location: Option<(f64, f64)>,
        face: &FaceBox,
    ) -> Result<(), GateDenied> {
        if let Some(gate) = &self.window {
            if !gate.allows(now) {
                return Err(GateDenied::OutsideWindow);
            }
        }
        if let Some(gate) = &self.geofence {
            match location {
                Some((lat, lon)) if gate.allows(lat, lon) => {}
                _ => return Err(GateDenied::OutsideGeofence),
            }
        }
        if let Some(gate) = &self.liveness {
            if !gate.allows(face) {
                return Err(GateDenied::LivenessFailed);
            }
        }
        Ok(())
    }
}
