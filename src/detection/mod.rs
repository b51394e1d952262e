// src/detection/mod.rs

mod adapter;
mod persistence;

// Re-export public APIs
pub use adapter::extract_signals;
pub use persistence::{DetectionPersistence, PersistenceCounter, StableStates};
