//! Service configuration, loaded from `ROLLCALL_*` environment variables.

use rollcall_core::{GateSet, GeofenceGate, LivenessGate, TimeWindow, TimeWindowGate};
use chrono::NaiveTime;
use std::path::PathBuf;

pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Detector confidence threshold for a face box.
    pub detector_score_threshold: f32,
    /// Square crop dimension; descriptor length is its square.
    pub crop_size: u32,
    /// Euclidean distance threshold for a positive match.
    pub match_threshold: f32,
    /// Attendance windows spec, e.g. "08:00-09:00,13:00-14:00". Empty
    /// disables the time gate.
    pub windows: Vec<TimeWindow>,
    /// Campus coordinate; geofence gate is enabled only when both
    /// ROLLCALL_CAMPUS_LAT and ROLLCALL_CAMPUS_LON are set.
    pub campus: Option<(f64, f64)>,
    /// Geofence radius in kilometres.
    pub geofence_radius_km: f64,
    /// Whether the eye-count liveness heuristic gates marking.
    pub require_liveness: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendance.db"));

        let model_dir = std::env::var("ROLLCALL_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models"));

        let campus = match (env_f64("ROLLCALL_CAMPUS_LAT"), env_f64("ROLLCALL_CAMPUS_LON")) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        };

        Self {
            db_path,
            model_dir,
            detector_score_threshold: env_f32("ROLLCALL_DETECTOR_CONFIDENCE", 0.5),
            crop_size: env_u32("ROLLCALL_CROP_SIZE", rollcall_core::DEFAULT_CROP_SIZE),
            match_threshold: env_f32(
                "ROLLCALL_MATCH_THRESHOLD",
                rollcall_core::DEFAULT_MATCH_THRESHOLD,
            ),
            windows: parse_windows(
                &std::env::var("ROLLCALL_WINDOWS").unwrap_or_default(),
            ),
            campus,
            geofence_radius_km: env_f64("ROLLCALL_GEOFENCE_RADIUS_KM").unwrap_or(0.5),
            require_liveness: std::env::var("ROLLCALL_REQUIRE_LIVENESS")
                .map(|v| v != "0")
                .unwrap_or(false),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Build the gate set this deployment runs with.
    pub fn gates(&self) -> GateSet {
        GateSet {
            window: if self.windows.is_empty() {
                None
            } else {
                Some(TimeWindowGate::new(self.windows.clone()))
            },
            geofence: self
                .campus
                .map(|(lat, lon)| GeofenceGate::new(lat, lon, self.geofence_radius_km)),
            liveness: self.require_liveness.then(LivenessGate::default),
        }
    }
}

/// Parse a comma-separated list of "HH:MM-HH:MM" ranges. Malformed entries
/// are skipped with a warning rather than failing startup.
pub fn parse_windows(spec: &str) -> Vec<TimeWindow> {
    spec.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            let parsed = part.split_once('-').and_then(|(start, end)| {
                let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").ok()?;
                let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").ok()?;
                (start <= end).then_some(TimeWindow { start, end })
            });
            if parsed.is_none() {
                tracing::warn!(window = part, "skipping malformed attendance window");
            }
            parsed
        })
        .collect()
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_windows_two_sessions() {
        let windows = parse_windows("08:00-09:00, 13:00-14:00");
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start, t(8, 0));
        assert_eq!(windows[0].end, t(9, 0));
        assert_eq!(windows[1].start, t(13, 0));
        assert_eq!(windows[1].end, t(14, 0));
    }

    #[test]
    fn test_parse_windows_skips_malformed() {
        let windows = parse_windows("junk,09:00-08:00,10:00-11:00,");
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, t(10, 0));
    }

    #[test]
    fn test_parse_windows_empty() {
        assert!(parse_windows("").is_empty());
    }
}
