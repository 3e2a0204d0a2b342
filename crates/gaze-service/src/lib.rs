//! gaze-service — Enrollment and recognition facade.
//!
//! Wires the core pipeline, the engine thread and a gallery store into the
//! four operations the transport layer calls: enroll, unenroll,
//! list_enrolled, recognize.

pub mod config;
pub mod engine;
pub mod service;

pub use config::Config;
pub use engine::{spawn_engine, EngineError, EngineHandle};
pub use service::{EnrollOutcome, FaceService, ServiceError};
