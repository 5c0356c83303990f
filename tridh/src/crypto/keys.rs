// Key material: per-exchange DH parameter sets, the keyring, and the
// derived symmetric key.

use std::fmt;

use num_bigint::BigUint;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// One party's view of one DH exchange.
///
/// A local record carries both keys until [`destroy_keys`](Self::destroy_keys);
/// a record describing the peer carries only its public key.
#[derive(Clone, PartialEq, Eq)]
pub struct DhParameterSet {
    p: BigUint,
    g: BigUint,
    private_key: Option<BigUint>,
    public_key: Option<BigUint>,
}

impl DhParameterSet {
    /// Record for our own side of an exchange.
    pub fn local(p: BigUint, g: BigUint, private_key: BigUint, public_key: BigUint) -> Self {
        Self {
            p,
            g,
            private_key: Some(private_key),
            public_key: Some(public_key),
        }
    }

    /// Record for the peer's side: public key only.
    pub fn remote(p: BigUint, g: BigUint, public_key: BigUint) -> Self {
        Self {
            p,
            g,
            private_key: None,
            public_key: Some(public_key),
        }
    }

    /// The prime modulus.
    pub fn p(&self) -> &BigUint {
        &self.p
    }

    /// The generator.
    pub fn g(&self) -> &BigUint {
        &self.g
    }

    pub fn private_key(&self) -> Option<&BigUint> {
        self.private_key.as_ref()
    }

    pub fn public_key(&self) -> Option<&BigUint> {
        self.public_key.as_ref()
    }

    /// Clear both keys. Irreversible: both accessors return `None` afterwards.
    pub fn destroy_keys(&mut self) {
        self.private_key = None;
        self.public_key = None;
    }

    /// True once neither key is present.
    pub fn is_destroyed(&self) -> bool {
        self.private_key.is_none() && self.public_key.is_none()
    }
}

impl fmt::Debug for DhParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhParameterSet")
            .field("p", &self.p)
            .field("g", &self.g)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// The three shared values produced by pairing the LDH and EDH exchanges.
/// Built once from already computed values; never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyring {
    k1: BigUint,
    k2: BigUint,
    k3: BigUint,
}

impl Keyring {
    pub fn new(k1: BigUint, k2: BigUint, k3: BigUint) -> Self {
        Self { k1, k2, k3 }
    }

    pub fn k1(&self) -> &BigUint {
        &self.k1
    }

    pub fn k2(&self) -> &BigUint {
        &self.k2
    }

    pub fn k3(&self) -> &BigUint {
        &self.k3
    }
}

/// Length of the derived symmetric key in bytes.
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// 256-bit key derived from a [`Keyring`]. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_LEN]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; SYMMETRIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}
