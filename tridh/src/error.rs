// TriDH error types

use thiserror::Error;
use tridhstream::StreamError;

/// Top-level error type for the TriDH crate.
#[derive(Debug, Error)]
pub enum TriDhError {
    // ── Argument / configuration errors ─────────────────────────────────
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // ── Handshake errors ────────────────────────────────────────────────
    #[error("protocol aborted: {0}")]
    ProtocolAbort(String),

    #[error("invalid handshake state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // ── Cipher errors ───────────────────────────────────────────────────
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    // ── Transport ───────────────────────────────────────────────────────
    #[error("transport error: {0}")]
    Transport(#[from] StreamError),
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, TriDhError>;
