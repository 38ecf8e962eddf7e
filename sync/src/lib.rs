//! Playlog sync runner library.
//!
//! The binary in `main.rs` is a thin shell around this: configuration,
//! the source and destination clients, retry, and the per-unit
//! orchestrator all live here so integration tests can drive the full
//! pipeline against in-memory fakes.

pub mod config;
pub mod dest;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod source;
