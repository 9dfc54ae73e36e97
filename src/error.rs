//! ==============================================================================
//! error.rs - kiosk error taxonomy
//! ==============================================================================
//!
//! purpose:
//!     one error type for everything a refresh cycle can run into.
//!     every variant ends up as a visible status message on the kiosk;
//!     nothing is thrown past the cycle.
//!
//! kinds:
//!     - Configuration: missing/invalid session identifier (fatal at startup)
//!     - HttpStatus / Network: directory fetch failed (retried next cycle)
//!     - Lookup: device not listed in the directory (retried next cycle)
//!     - Render: embedded frame failed to load (retried next cycle)
//!     - Identity / Storage: serial read or store write failed (logged, the
//!       resolver falls back)
//!
//! ==============================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KioskError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("HTTP error! status: {0}")]
    HttpStatus(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("No presentation URL found for device ID \"{0}\"")]
    Lookup(String),

    #[error("Error loading presentation: {0}")]
    Render(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KioskError {
    /// errors that stop the kiosk at startup instead of waiting for the next cycle
    pub fn is_fatal(&self) -> bool {
        matches!(self, KioskError::Configuration(_))
    }
}

impl From<reqwest::Error> for KioskError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => KioskError::HttpStatus(status.as_u16()),
            None => KioskError::Network(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, KioskError>;
