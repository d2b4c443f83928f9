use thiserror::Error;

/// Errors surfaced by host bridge implementations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Network-level failure (connection, TLS, timeout, non-2xx status).
    #[error("Network error: {0}")]
    Network(String),

    /// The platform audio engine refused or lost the operation.
    #[error("Audio engine unavailable: {0}")]
    AudioUnavailable(String),

    /// Any other bridge-level failure.
    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
