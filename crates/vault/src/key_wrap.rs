//! Passphrase wrapping of the master key for distribution to other devices.
//!
//! The master key is sealed into an [`Envelope`] under an Argon2id-derived
//! KEK. The AAD is fixed to [`KEY_WRAP_AAD`], so a wrapped key never opens as
//! a field value and a field envelope never opens as a wrapped key.

use {
    serde::{Deserialize, Serialize},
    zeroize::Zeroizing,
};

use crate::{
    envelope::{self, Envelope},
    error::VaultError,
    kdf::{self, KdfParams},
    key_manager::fingerprint,
    traits::{Cipher, KEY_LEN},
};

/// AAD bound to wrapped master keys.
pub const KEY_WRAP_AAD: &[u8] = b"kinvault:key-wrap:v1";

/// Current [`WrappedKey`] format version.
pub const WRAP_FORMAT_VERSION: u8 = 1;

/// A master key sealed under a passphrase. Safe to place in shared storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    pub version: u8,
    pub kdf: KdfParams,
    /// Base64 salt for the KDF.
    pub salt: String,
    /// `iv:payload` envelope holding the 32 key bytes.
    pub envelope: String,
    /// Fingerprint of the wrapped key, for display and verification.
    pub fingerprint: String,
}

/// Wrap `key` under a KEK derived from `passphrase`.
pub fn wrap_key<C: Cipher + ?Sized>(
    cipher: &C,
    key: &[u8; KEY_LEN],
    passphrase: &str,
    params: KdfParams,
) -> Result<WrappedKey, VaultError> {
    if passphrase.is_empty() {
        return Err(VaultError::MalformedInput("passphrase must not be empty".into()));
    }

    let salt_b64 = kdf::generate_salt();
    let salt = kdf::decode_salt(&salt_b64)?;
    let kek = kdf::derive_key(passphrase.as_bytes(), &salt, &params)?;
    let sealed = envelope::seal(cipher, kek.as_slice(), key, KEY_WRAP_AAD)?;

    Ok(WrappedKey {
        version: WRAP_FORMAT_VERSION,
        kdf: params,
        salt: salt_b64,
        envelope: sealed.to_string(),
        fingerprint: fingerprint(key),
    })
}

/// Recover the master key from a [`WrappedKey`].
///
/// A wrong passphrase surfaces as [`VaultError::BadCredential`].
pub fn unwrap_key<C: Cipher + ?Sized>(
    cipher: &C,
    wrapped: &WrappedKey,
    passphrase: &str,
) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    if wrapped.version != WRAP_FORMAT_VERSION {
        return Err(VaultError::MalformedInput(format!(
            "unsupported wrapped key version: {}",
            wrapped.version
        )));
    }

    let salt = kdf::decode_salt(&wrapped.salt)?;
    let kek = kdf::derive_key(passphrase.as_bytes(), &salt, &wrapped.kdf)?;
    let sealed: Envelope = wrapped.envelope.parse()?;

    let plaintext = Zeroizing::new(
        envelope::open(cipher, kek.as_slice(), &sealed, KEY_WRAP_AAD).map_err(|e| match e {
            VaultError::CipherFailure(_) => VaultError::BadCredential,
            other => other,
        })?,
    );

    if plaintext.len() != KEY_LEN {
        return Err(VaultError::MalformedInput(format!(
            "unwrapped key has wrong length: {} (expected {KEY_LEN})",
            plaintext.len()
        )));
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&plaintext);

    if fingerprint(key.as_slice()) != wrapped.fingerprint {
        return Err(VaultError::MalformedInput(
            "unwrapped key does not match its fingerprint".into(),
        ));
    }
    Ok(key)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::rustcrypto::AesGcmCipher};

    const KEY: [u8; KEY_LEN] = [0xBB; KEY_LEN];

    #[test]
    fn round_trip() {
        let wrapped =
            wrap_key(&AesGcmCipher, &KEY, "kitchen-table", KdfParams::insecure_for_tests())
                .unwrap();
        let unwrapped = unwrap_key(&AesGcmCipher, &wrapped, "kitchen-table").unwrap();
        assert_eq!(*unwrapped, KEY);
    }

    #[test]
    fn wrong_passphrase_is_bad_credential() {
        let wrapped =
            wrap_key(&AesGcmCipher, &KEY, "kitchen-table", KdfParams::insecure_for_tests())
                .unwrap();
        let result = unwrap_key(&AesGcmCipher, &wrapped, "garden-shed");
        assert!(matches!(result, Err(VaultError::BadCredential)));
    }

    #[test]
    fn serializes_to_json() {
        let wrapped =
            wrap_key(&AesGcmCipher, &KEY, "kitchen-table", KdfParams::insecure_for_tests())
                .unwrap();
        let json = serde_json::to_string(&wrapped).unwrap();
        let parsed: WrappedKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, wrapped);
        assert!(!json.contains(&hex::encode(KEY)));
    }

    #[test]
    fn wrapped_key_does_not_open_as_field_value() {
        let wrapped =
            wrap_key(&AesGcmCipher, &KEY, "kitchen-table", KdfParams::insecure_for_tests())
                .unwrap();
        let salt = kdf::decode_salt(&wrapped.salt).unwrap();
        let kek = kdf::derive_key(b"kitchen-table", &salt, &wrapped.kdf).unwrap();
        let sealed: Envelope = wrapped.envelope.parse().unwrap();
        let result = envelope::open(&AesGcmCipher, kek.as_slice(), &sealed, b"kinvault:field:v1");
        assert!(matches!(result, Err(VaultError::CipherFailure(_))));
    }

    #[test]
    fn empty_passphrase_rejected() {
        let result = wrap_key(&AesGcmCipher, &KEY, "", KdfParams::insecure_for_tests());
        assert!(matches!(result, Err(VaultError::MalformedInput(_))));
    }

    #[test]
    fn unknown_version_rejected() {
        let mut wrapped =
            wrap_key(&AesGcmCipher, &KEY, "kitchen-table", KdfParams::insecure_for_tests())
                .unwrap();
        wrapped.version = 9;
        let result = unwrap_key(&AesGcmCipher, &wrapped, "kitchen-table");
        assert!(matches!(result, Err(VaultError::MalformedInput(_))));
    }
}
