// AES-256-CBC message envelope.
//
//   envelope = base64( IV(16) || AES-256-CBC(key, IV, PKCS7(plaintext)) )
//
// No integrity tag: a modified ciphertext that still unpads cleanly is not
// detected.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{CryptoRng, RngCore};

use crate::crypto::keys::SymmetricKey;
use crate::error::{Result, TriDhError};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size, and therefore the IV length.
pub const BLOCK_SIZE: usize = 16;

/// Encrypts and decrypts single application messages under a derived key.
pub struct MessageCipher {
    key: SymmetricKey,
}

impl MessageCipher {
    /// Create a cipher from a derived 32-byte key.
    pub fn new(key: SymmetricKey) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext` under a fresh random IV and return the base64 envelope.
    pub fn encrypt<R: RngCore + CryptoRng>(&self, plaintext: &str, rng: &mut R) -> Result<String> {
        let mut iv = [0u8; BLOCK_SIZE];
        rng.fill_bytes(&mut iv);

        let cipher = Aes256CbcEnc::new_from_slices(self.key.as_bytes(), &iv)
            .map_err(|e| TriDhError::Encryption(format!("cipher init: {e}")))?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut envelope = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
        envelope.extend_from_slice(&iv);
        envelope.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(envelope))
    }

    /// Decode an envelope produced by [`encrypt`](Self::encrypt) and recover the text.
    pub fn decrypt(&self, envelope: &str) -> Result<String> {
        let raw = BASE64
            .decode(envelope)
            .map_err(|e| TriDhError::Decryption(format!("envelope encoding: {e}")))?;
        if raw.len() < 2 * BLOCK_SIZE {
            return Err(TriDhError::Decryption(format!(
                "envelope too short: {} bytes",
                raw.len()
            )));
        }
        let (iv, ciphertext) = raw.split_at(BLOCK_SIZE);
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(TriDhError::Decryption(format!(
                "ciphertext length {} is not a multiple of {BLOCK_SIZE}",
                ciphertext.len()
            )));
        }

        let cipher = Aes256CbcDec::new_from_slices(self.key.as_bytes(), iv)
            .map_err(|e| TriDhError::Decryption(format!("cipher init: {e}")))?;
        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| TriDhError::Decryption("invalid padding".into()))?;
        String::from_utf8(plaintext)
            .map_err(|_| TriDhError::Decryption("plaintext is not valid utf-8".into()))
    }
}
