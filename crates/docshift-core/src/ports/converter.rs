//! Converter port - the remote rendering service.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from one remote conversion call.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The request never produced a response (connect, timeout, body read).
    #[error("conversion service unreachable: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("conversion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("conversion service returned an empty document")]
    EmptyOutput,
}

/// Synchronous (from the worker's point of view) remote conversion.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    async fn convert(&self, input: &[u8]) -> Result<Vec<u8>, ConversionError>;
}
