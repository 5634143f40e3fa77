//! Error types for the ENGAGE-HF measurement decoder
//!
//! The public decode API never surfaces these: a failed decode is reported as
//! `None`. They exist so the reason can be logged and tested.

use thiserror::Error;

/// Reasons a characteristic payload could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Payload truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Characteristic is not handled by this decoder")]
    UnrecognizedCharacteristic,
}

/// Errors raised while turning measurements into observation records
#[derive(Debug, Error)]
pub enum ObservationError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid UTC offset: {0} seconds")]
    InvalidOffset(i32),
}
