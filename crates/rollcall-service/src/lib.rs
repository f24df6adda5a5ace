//! rollcall-service — wires the descriptor pipeline to the store.
//!
//! Holds configuration, the base64 image transport, the
//! [`AttendanceService`] pipeline, and the serialized engine thread that
//! the (out-of-scope) web layer is expected to embed.

pub mod config;
pub mod engine;
pub mod service;
pub mod transport;

pub use config::Config;
pub use engine::{spawn_engine, EngineError, EngineHandle};
pub use service::{AttendanceError, AttendanceService, NewEnrollment, VerifyReport};
pub use transport::GrayFrame;
