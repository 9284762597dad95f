//! camwatch - Multi-Camera Detection and Alert Pipeline
//!
//! ## Architecture
//!
//! 1. FrameBuffer - one latest-wins frame slot per camera
//! 2. CameraFrameSource - per-camera capture worker feeding its slot
//! 3. DetectorWorker - one worker per (camera, detection kind) over a
//!    pluggable capability
//! 4. EventQueues - bounded drop-oldest transport into the coordinator
//! 5. AlertCoordinator - validation, rate limiting, coalescing,
//!    persistence, notification fan-out
//! 6. ProcessSupervisor - launch, monitoring, ordered teardown
//!
//! ## Design Principles
//!
//! - Workers never block each other: capture overwrites, detectors
//!   poll-and-copy, the coordinator drains non-blocking
//! - Failures degrade silently: a broken stage, store or sink is logged
//!   and isolated, never fatal past startup

pub mod alert;
pub mod alert_store;
pub mod audit_log;
pub mod capture;
pub mod config_store;
pub mod detector;
pub mod error;
pub mod event_queue;
pub mod evidence;
pub mod frame_buffer;
pub mod notifier;
pub mod stats;
pub mod supervisor;

pub use error::{Error, Result};
