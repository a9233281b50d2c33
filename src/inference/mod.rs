//! Inference module for model artifact verification
//!
//! This module provides:
//! - Loading saved model weights from disk
//! - A random-probe forward pass checking shape and output range
//!
//! ## Verification
//!
//! A verified artifact deserializes cleanly, accepts a single
//! `[1, 3, 14, 14]` weather grid and returns one non-negative energy
//! prediction. This is the minimal smoke test run before a saved model
//! is shipped anywhere.

pub mod verifier;

// Re-export main types for convenience
pub use verifier::{verify_model, VerifyReport};

/// Number of grids in the verification probe batch
pub const PROBE_BATCH: usize = 1;
