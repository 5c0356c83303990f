// Keyring -> symmetric key.
//
//   key = SHA-256( dec(K1) || dec(K2) || dec(K3) )
//
// Single pass, no salt. Deterministic for a given keyring.

use sha2::{Digest, Sha256};

use crate::crypto::keys::{Keyring, SymmetricKey};

/// Derive the session key from a keyring.
pub fn derive(keyring: &Keyring) -> SymmetricKey {
    let combined = format!("{}{}{}", keyring.k1(), keyring.k2(), keyring.k3());
    SymmetricKey::from_bytes(Sha256::digest(combined.as_bytes()).into())
}
