//! Argon2id derivation of a key-encryption key from a household passphrase.

use {
    argon2::Argon2,
    base64::Engine,
    rand::RngCore,
    serde::{Deserialize, Serialize},
    zeroize::Zeroizing,
};

use crate::{error::VaultError, traits::KEY_LEN};

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Argon2id cost parameters, stored next to every wrapped key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Iterations.
    pub t_cost: u32,
    /// Lanes.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536, // 64 MiB
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl KdfParams {
    /// Cheapest parameters Argon2 accepts. Only for tests.
    #[cfg(test)]
    pub(crate) fn insecure_for_tests() -> Self {
        Self {
            m_cost: 256,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

/// Derive a 256-bit key-encryption key from `passphrase` and `salt`.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    let argon2_params =
        argon2::Params::new(params.m_cost, params.t_cost, params.p_cost, Some(KEY_LEN))
            .map_err(|e| VaultError::MalformedInput(format!("invalid KDF params: {e}")))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase, salt, output.as_mut())
        .map_err(|e| VaultError::MalformedInput(format!("KDF failed: {e}")))?;

    Ok(output)
}

/// Generate a random salt, base64-encoded.
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    base64::engine::general_purpose::STANDARD.encode(salt)
}

/// Decode a base64 salt, rejecting anything shorter than [`SALT_LEN`].
pub fn decode_salt(b64: &str) -> Result<Vec<u8>, VaultError> {
    let salt = base64::engine::general_purpose::STANDARD.decode(b64)?;
    if salt.len() < SALT_LEN {
        return Err(VaultError::MalformedInput(format!(
            "salt must be at least {SALT_LEN} bytes"
        )));
    }
    Ok(salt)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_key() {
        let params = KdfParams::insecure_for_tests();
        let key1 = derive_key(b"household", b"salt-0123456789a", &params).unwrap();
        let key2 = derive_key(b"household", b"salt-0123456789a", &params).unwrap();
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn passphrase_and_salt_both_matter() {
        let params = KdfParams::insecure_for_tests();
        let base = derive_key(b"household", b"salt-aaaaaaaaaaaa", &params).unwrap();
        let other_pass = derive_key(b"household!", b"salt-aaaaaaaaaaaa", &params).unwrap();
        let other_salt = derive_key(b"household", b"salt-bbbbbbbbbbbb", &params).unwrap();
        assert_ne!(*base, *other_pass);
        assert_ne!(*base, *other_salt);
    }

    #[test]
    fn zero_memory_cost_is_rejected() {
        let params = KdfParams {
            m_cost: 0,
            t_cost: 1,
            p_cost: 1,
        };
        let result = derive_key(b"x", b"salt-aaaaaaaaaaaa", &params);
        assert!(matches!(result, Err(VaultError::MalformedInput(_))));
    }

    #[test]
    fn salt_round_trip_and_length_check() {
        let salt = decode_salt(&generate_salt()).unwrap();
        assert_eq!(salt.len(), SALT_LEN);
        assert!(decode_salt("AAAA").is_err());
    }
}
