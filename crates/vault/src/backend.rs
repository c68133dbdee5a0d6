//! Runtime selection between the compiled-in [`Cipher`] backends.

use std::{fmt, str::FromStr};

#[cfg(feature = "openssl")]
use crate::native::OpenSslGcmCipher;
use crate::{
    error::VaultError,
    rustcrypto::AesGcmCipher,
    traits::{Cipher, IV_LEN},
};

/// A cipher backend chosen from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherBackend {
    #[default]
    RustCrypto,
    #[cfg(feature = "openssl")]
    OpenSsl,
}

impl CipherBackend {
    /// Names accepted by [`FromStr`], for diagnostics.
    pub const NAMES: &'static [&'static str] = &["rustcrypto", "openssl"];

    fn inner(&self) -> &dyn Cipher {
        match self {
            Self::RustCrypto => &AesGcmCipher,
            #[cfg(feature = "openssl")]
            Self::OpenSsl => &OpenSslGcmCipher,
        }
    }
}

impl FromStr for CipherBackend {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rustcrypto" | "rust" | "portable" => Ok(Self::RustCrypto),
            #[cfg(feature = "openssl")]
            "openssl" | "native" => Ok(Self::OpenSsl),
            #[cfg(not(feature = "openssl"))]
            "openssl" | "native" => Err(VaultError::MalformedInput(
                "cipher backend \"openssl\" requires the `openssl` feature".into(),
            )),
            other => Err(VaultError::MalformedInput(format!(
                "unknown cipher backend: {other}"
            ))),
        }
    }
}

impl fmt::Display for CipherBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.inner().name())
    }
}

impl Cipher for CipherBackend {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn encrypt(
        &self,
        key: &[u8],
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        self.inner().encrypt(key, iv, plaintext, aad)
    }

    fn decrypt(
        &self,
        key: &[u8],
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        self.inner().decrypt(key, iv, ciphertext, aad)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("rustcrypto")]
    #[case("RustCrypto")]
    #[case(" portable ")]
    fn parses_portable_names(#[case] input: &str) {
        assert_eq!(input.parse::<CipherBackend>().unwrap(), CipherBackend::RustCrypto);
    }

    #[test]
    fn rejects_unknown_backend() {
        let err = "des".parse::<CipherBackend>().unwrap_err();
        assert!(err.to_string().contains("unknown cipher backend"));
    }

    #[cfg(not(feature = "openssl"))]
    #[test]
    fn openssl_requires_feature() {
        let err = "openssl".parse::<CipherBackend>().unwrap_err();
        assert!(err.to_string().contains("feature"));
    }

    #[test]
    fn default_backend_round_trips() {
        let backend = CipherBackend::default();
        let iv = [3u8; IV_LEN];
        let sealed = backend.encrypt(&[9u8; 32], &iv, b"x", b"").unwrap();
        assert_eq!(backend.decrypt(&[9u8; 32], &iv, &sealed, b"").unwrap(), b"x");
        assert_eq!(backend.to_string(), "rustcrypto-aes256gcm");
    }
}
