//! Engine error taxonomy.
//!
//! Most failure modes are absorbed internally: transient stalls feed the
//! watchdog, pipeline faults trigger rebuilds, and a denied role is a normal
//! deferred state rather than an error. Only an exhausted cache→network
//! fallback and an exhausted recovery ladder ever reach observers.

use crate::session::SessionRole;
use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors produced by the playback engine and its gateway.
#[derive(Error, Debug)]
pub enum EngineError {
    // ========================================================================
    // Source Resolution
    // ========================================================================
    /// Fetching media bytes from the network failed.
    #[error("Fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// Cache gateway storage operation failed.
    #[error("Cache error: {0}")]
    Cache(String),

    // ========================================================================
    // Arbitration
    // ========================================================================
    /// The requested audio role lost to the current holder.
    #[error("Audio role denied, held by {held_by:?}")]
    RoleDenied { held_by: SessionRole },

    // ========================================================================
    // Pipeline
    // ========================================================================
    /// The render pipeline reported an unrecoverable fault.
    #[error("Pipeline fault: {0}")]
    PipelineFault(String),

    /// The recovery ladder hit its consecutive-failure ceiling.
    #[error("Auto-recovery abandoned after {failures} consecutive failures")]
    RecoveryExhausted { failures: u32 },

    // ========================================================================
    // Plumbing
    // ========================================================================
    /// Engine configuration failed validation.
    #[error(transparent)]
    Config(#[from] core_runtime::Error),

    /// The engine actor is gone; no further commands will be processed.
    #[error("Engine is shut down")]
    EngineShutDown,

    /// Error from a host bridge implementation.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Filesystem error from the cache gateway.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Returns `true` for failures worth retrying quietly.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::FetchFailed { .. }
                | EngineError::PipelineFault(_)
                | EngineError::Bridge(BridgeError::Network(_))
        )
    }

    /// Returns `true` when the failure is another producer holding the
    /// session: a deferred state, not a fault.
    pub fn is_preemption(&self) -> bool {
        matches!(self, EngineError::RoleDenied { .. })
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
