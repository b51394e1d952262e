// src/pipeline/mod.rs

mod session;
mod worker;

pub use session::{SessionSummary, SessionUpdate, ShotSession};
pub use worker::{spawn_capture_worker, CaptureStats};
