//! Pure-Rust AES-256-GCM implementation of the [`Cipher`] trait.

use aes_gcm::{
    AesGcm, Nonce,
    aead::{Aead, KeyInit, Payload, consts::U16},
    aes::Aes256,
};

use crate::{
    error::VaultError,
    traits::{Cipher, IV_LEN, check_ciphertext, check_key},
};

/// AES-256-GCM with a 128-bit nonce, matching the envelope IV width.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// RustCrypto AES-256-GCM backend. Portable, no system libraries.
///
/// Output layout: `[ciphertext: N bytes][GCM tag: 16 bytes]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmCipher;

impl Cipher for AesGcmCipher {
    fn name(&self) -> &'static str {
        "rustcrypto-aes256gcm"
    }

    fn encrypt(
        &self,
        key: &[u8],
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        check_key(key)?;
        let cipher = Aes256Gcm16::new_from_slice(key)
            .map_err(|e| VaultError::MalformedInput(e.to_string()))?;

        cipher
            .encrypt(Nonce::<U16>::from_slice(iv), Payload {
                msg: plaintext,
                aad,
            })
            .map_err(|e| VaultError::CipherFailure(e.to_string()))
    }

    fn decrypt(
        &self,
        key: &[u8],
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        check_key(key)?;
        check_ciphertext(ciphertext)?;
        let cipher = Aes256Gcm16::new_from_slice(key)
            .map_err(|e| VaultError::MalformedInput(e.to_string()))?;

        cipher
            .decrypt(Nonce::<U16>::from_slice(iv), Payload {
                msg: ciphertext,
                aad,
            })
            .map_err(|e| VaultError::CipherFailure(e.to_string()))
    }
}
