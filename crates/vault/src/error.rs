//! Vault error types.

use crate::fields::RecordKind;

/// Errors produced by the field encryption engine.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The master key could not be loaded, generated or persisted.
    #[error("master key unavailable: {0}")]
    KeyUnavailable(String),

    /// Input bytes are not usable as-is (wrong key length, bad hex or base64).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// An envelope string does not have the `iv:payload` shape.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Authentication failed or the cipher rejected its input (wrong key, tampered data).
    #[error("cipher failure: {0}")]
    CipherFailure(String),

    /// Encrypting a value for storage failed. Fatal to the surrounding write.
    #[error("encryption failed: {0}")]
    EncryptionFailed(#[source] Box<VaultError>),

    /// Passphrase for a wrapped key is incorrect.
    #[error("incorrect passphrase")]
    BadCredential,

    /// A record update failed during a migration pass.
    #[error("migration of {kind} record {record_id} failed: {source}")]
    MigrationRecordFailure {
        kind: RecordKind,
        record_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// Reading or writing a tenant's completion marker failed.
    #[error("completion marker for tenant {tenant_id}: {source}")]
    Marker {
        tenant_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic error wrapper.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl VaultError {
    /// Wrap an internal failure as a fatal encryption error.
    ///
    /// Already-wrapped errors are passed through unchanged.
    #[must_use]
    pub fn encryption_failed(source: VaultError) -> Self {
        match source {
            Self::EncryptionFailed(_) => source,
            other => Self::EncryptionFailed(Box::new(other)),
        }
    }

    /// Whether a decrypt-side failure should degrade to an absent value.
    #[must_use]
    pub fn is_recoverable_on_read(&self) -> bool {
        matches!(
            self,
            Self::MalformedEnvelope(_)
                | Self::MalformedInput(_)
                | Self::CipherFailure(_)
                | Self::Base64(_)
                | Self::Hex(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encryption_failed_does_not_double_wrap() {
        let inner = VaultError::KeyUnavailable("store offline".into());
        let once = VaultError::encryption_failed(inner);
        let twice = VaultError::encryption_failed(once);
        match twice {
            VaultError::EncryptionFailed(source) => {
                assert!(matches!(*source, VaultError::KeyUnavailable(_)));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn read_side_recoverability() {
        assert!(VaultError::MalformedEnvelope("x".into()).is_recoverable_on_read());
        assert!(VaultError::CipherFailure("tag".into()).is_recoverable_on_read());
        assert!(!VaultError::KeyUnavailable("x".into()).is_recoverable_on_read());
        assert!(!VaultError::BadCredential.is_recoverable_on_read());
    }

    #[test]
    fn migration_failure_message_names_record() {
        let err = VaultError::MigrationRecordFailure {
            kind: RecordKind::Children,
            record_id: "c-7".into(),
            source: anyhow::anyhow!("connection reset"),
        };
        let msg = err.to_string();
        assert!(msg.contains("children"));
        assert!(msg.contains("c-7"));
        assert!(msg.contains("connection reset"));
    }
}
