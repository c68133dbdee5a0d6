//! OpenSSL-backed AES-256-GCM implementation of the [`Cipher`] trait.
//!
//! Produces byte-identical output to [`AesGcmCipher`](crate::rustcrypto::AesGcmCipher)
//! and is selected where the platform crypto library is preferred.

use openssl::symm::{self, Cipher as SymmCipher};

use crate::{
    error::VaultError,
    traits::{Cipher, IV_LEN, TAG_LEN, check_ciphertext, check_key},
};

/// Native OpenSSL AES-256-GCM backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSslGcmCipher;

impl Cipher for OpenSslGcmCipher {
    fn name(&self) -> &'static str {
        "openssl-aes256gcm"
    }

    fn encrypt(
        &self,
        key: &[u8],
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        check_key(key)?;
        let mut tag = [0u8; TAG_LEN];
        let mut out = symm::encrypt_aead(
            SymmCipher::aes_256_gcm(),
            key,
            Some(iv.as_slice()),
            aad,
            plaintext,
            &mut tag,
        )
        .map_err(|e| VaultError::CipherFailure(e.to_string()))?;
        out.extend_from_slice(&tag);
        Ok(out)
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
        let (body, tag) = ciphertext.split_at(ciphertext.len() - TAG_LEN);
        symm::decrypt_aead(SymmCipher::aes_256_gcm(), key, Some(iv.as_slice()), aad, body, tag)
            .map_err(|e| VaultError::CipherFailure(e.to_string()))
    }
}
