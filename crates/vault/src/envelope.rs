//! The `iv:payload` envelope that stores one encrypted value.
//!
//! Wire format: `"<ivHex>:<payload>"` with exactly one colon. `ivHex` is the
//! lowercase hex of a fresh 16-byte IV; `payload` is standard base64 of
//! `ciphertext || tag`.

use std::{fmt, str::FromStr};

use {base64::Engine, rand::RngCore};

use crate::{
    error::VaultError,
    traits::{Cipher, IV_LEN},
};

const SEPARATOR: char = ':';

/// One encrypted value: IV plus authenticated ciphertext.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    iv: [u8; IV_LEN],
    payload: Vec<u8>,
}

impl Envelope {
    pub fn new(iv: [u8; IV_LEN], payload: Vec<u8>) -> Self {
        Self { iv, payload }
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}",
            hex::encode(self.iv),
            base64::engine::general_purpose::STANDARD.encode(&self.payload)
        )
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("iv", &hex::encode(self.iv))
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl FromStr for Envelope {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(SEPARATOR);
        let (Some(iv_hex), Some(payload_b64), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(VaultError::MalformedEnvelope(format!(
                "expected exactly one '{SEPARATOR}' separator, found {}",
                s.matches(SEPARATOR).count()
            )));
        };

        if iv_hex.len() != IV_LEN * 2 {
            return Err(VaultError::MalformedEnvelope(format!(
                "iv must be {} hex characters, got {}",
                IV_LEN * 2,
                iv_hex.len()
            )));
        }
        if payload_b64.is_empty() {
            return Err(VaultError::MalformedEnvelope("empty payload".into()));
        }

        let mut iv = [0u8; IV_LEN];
        hex::decode_to_slice(iv_hex, &mut iv)
            .map_err(|e| VaultError::MalformedInput(format!("iv: {e}")))?;
        let payload = base64::engine::general_purpose::STANDARD
            .decode(payload_b64)
            .map_err(|e| VaultError::MalformedInput(format!("payload: {e}")))?;

        Ok(Self { iv, payload })
    }
}

/// Generate a fresh random IV. Never reused across calls.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext` under `key` with a fresh IV.
pub fn seal<C: Cipher + ?Sized>(
    cipher: &C,
    key: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Envelope, VaultError> {
    let iv = generate_iv();
    let payload = cipher.encrypt(key, &iv, plaintext, aad)?;
    Ok(Envelope { iv, payload })
}

/// Decrypt an envelope previously produced by [`seal`].
pub fn open<C: Cipher + ?Sized>(
    cipher: &C,
    key: &[u8],
    envelope: &Envelope,
    aad: &[u8],
) -> Result<Vec<u8>, VaultError> {
    cipher.decrypt(key, &envelope.iv, &envelope.payload, aad)
}
