//! rollcall-core — face descriptor pipeline for attendance verification.
//!
//! Covers the algorithmic heart of the system: SCRFD face detection (via
//! ONNX Runtime), descriptor extraction (fixed-size grayscale crop,
//! flattened and scaled into [0,1]), Euclidean-threshold matching, and the
//! ancillary attendance gates (time window, geofence, liveness heuristic).
//!
//! Persistence and presentation live elsewhere; nothing in this crate
//! touches a database or a socket.

pub mod detector;
pub mod extractor;
pub mod gates;
pub mod imgproc;
pub mod matcher;
pub mod types;

pub use detector::{DetectError, FaceDetector, ScrfdDetector};
pub use extractor::{DescriptorExtractor, ExtractedFace, DEFAULT_CROP_SIZE};
pub use gates::{GateDenied, GateSet, GeofenceGate, LivenessGate, TimeWindow, TimeWindowGate};
pub use matcher::{MatchPolicy, DEFAULT_MATCH_THRESHOLD};
pub use types::{Descriptor, FaceBox};
