//! Cipher trait for swappable encryption backends.

use crate::error::VaultError;

/// IV length in bytes. Every envelope carries exactly this many IV bytes.
pub const IV_LEN: usize = 16;

/// Master key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Authentication tag length appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Stateless AES-256-GCM primitive with a caller-supplied 16-byte IV.
///
/// Implementations must be interchangeable: identical `(key, iv, plaintext, aad)`
/// inputs produce identical `ciphertext || tag` output on every backend, so an
/// envelope written by one backend opens on any other.
pub trait Cipher: Send + Sync {
    /// Short backend identifier used in logs.
    fn name(&self) -> &'static str;

    /// Encrypt `plaintext`, returning `ciphertext || tag`.
    ///
    /// A `key` that is not [`KEY_LEN`] bytes is [`VaultError::MalformedInput`].
    fn encrypt(
        &self,
        key: &[u8],
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError>;

    /// Decrypt `ciphertext || tag` produced by [`encrypt`](Self::encrypt).
    ///
    /// A tag mismatch (wrong key, wrong AAD, tampering) is
    /// [`VaultError::CipherFailure`].
    fn decrypt(
        &self,
        key: &[u8],
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError>;
}

/// Reject keys of the wrong length before they reach a backend.
pub(crate) fn check_key(key: &[u8]) -> Result<(), VaultError> {
    if key.len() != KEY_LEN {
        return Err(VaultError::MalformedInput(format!(
            "key must be {KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    Ok(())
}

/// Reject ciphertexts too short to carry a tag.
pub(crate) fn check_ciphertext(ciphertext: &[u8]) -> Result<(), VaultError> {
    if ciphertext.len() < TAG_LEN {
        return Err(VaultError::MalformedInput(format!(
            "ciphertext shorter than the {TAG_LEN}-byte tag"
        )));
    }
    Ok(())
}
