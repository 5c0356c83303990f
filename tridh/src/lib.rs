// TriDH: triple Diffie-Hellman key agreement with an AES-CBC message envelope
//
// Crate root: module declarations and public re-exports.
//
// Known limitations: no transcript authentication, no identity binding, no
// replay protection and no integrity tag on the envelope. Key sizes are used
// exactly as configured.

pub mod config;
pub mod crypto;
pub mod error;
pub mod handshake;

// Re-export key types at crate root for convenience.
pub use config::SessionConfig;
pub use crypto::keys::{DhParameterSet, Keyring, SymmetricKey};
pub use error::{Result, TriDhError};
pub use handshake::{HandshakeOutcome, Initiator, Responder};
