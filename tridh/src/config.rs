//! Session configuration.

use crate::error::{Result, TriDhError};

/// Default prime size in bits. Deliberately tiny: demonstration runs only.
pub const DEFAULT_PRIME_BITS: u64 = 8;
/// Default private-key entropy in bits.
pub const DEFAULT_KEY_BITS: u64 = 8;
/// Default application message.
pub const DEFAULT_MESSAGE: &str = "Hello world";

/// Parameters for one handshake session.
///
/// Sizes are used as given; nothing here raises a weak configuration to a
/// stronger one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bit length of the generated prime modulus.
    pub prime_bits: u64,
    /// Bits of entropy in each private key.
    pub key_bits: u64,
    /// Message the initiator encrypts and sends.
    pub message: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prime_bits: DEFAULT_PRIME_BITS,
            key_bits: DEFAULT_KEY_BITS,
            message: DEFAULT_MESSAGE.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn prime_bits(mut self, bits: u64) -> Self {
        self.prime_bits = bits;
        self
    }

    pub fn key_bits(mut self, bits: u64) -> Self {
        self.key_bits = bits;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Reject sizes no run could satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.prime_bits < 2 {
            return Err(TriDhError::InvalidArgument(format!(
                "prime_bits must be at least 2, got {}",
                self.prime_bits
            )));
        }
        if self.key_bits == 0 {
            return Err(TriDhError::InvalidArgument(
                "key_bits must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
