//! Public encrypt/decrypt facade used by read and write paths.
//!
//! Encryption failures are fatal and surface as [`VaultError::EncryptionFailed`]:
//! a write must never fall back to storing plaintext. Decryption failures are
//! logged and degrade to `None` so a read path only loses the affected field.

use std::sync::Arc;

use serde_json::Value;

#[cfg(feature = "metrics")]
use kinvault_metrics::{counter, labels, vault as vault_metrics};

use crate::{
    attribute::{Attribute, Columns, Record},
    envelope::{self, Envelope},
    error::VaultError,
    fields::{RecordKind, encrypted_column_name_for},
    key_manager::KeyManager,
    rustcrypto::AesGcmCipher,
    traits::Cipher,
};

/// AAD bound to every field envelope.
pub const FIELD_AAD: &[u8] = b"kinvault:field:v1";

/// Field-level encryption service.
///
/// Generic over [`Cipher`] but defaults to [`AesGcmCipher`].
pub struct EncryptionService<C: Cipher = AesGcmCipher> {
    keys: Arc<KeyManager>,
    cipher: C,
}

impl<C: Cipher> EncryptionService<C> {
    pub fn new(keys: Arc<KeyManager>, cipher: C) -> Self {
        Self { keys, cipher }
    }

    pub fn key_manager(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn cipher(&self) -> &C {
        &self.cipher
    }

    /// Encrypt one value. `None` and blank input produce no envelope.
    pub async fn encrypt(&self, plaintext: Option<&str>) -> Result<Option<Envelope>, VaultError> {
        let Some(plaintext) = plaintext.filter(|value| !value.trim().is_empty()) else {
            return Ok(None);
        };

        let result = async {
            let key = self.keys.get_or_create_master_key().await?;
            envelope::seal(&self.cipher, key.as_bytes(), plaintext.as_bytes(), FIELD_AAD)
        }
        .await;

        match result {
            Ok(sealed) => {
                #[cfg(feature = "metrics")]
                counter!(vault_metrics::ENCRYPT_TOTAL).increment(1);
                Ok(Some(sealed))
            },
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(vault_metrics::ENCRYPT_ERRORS_TOTAL).increment(1);
                #[cfg(feature = "tracing")]
                tracing::error!(error = %e, cipher = self.cipher.name(), "field encryption failed");
                Err(VaultError::encryption_failed(e))
            },
        }
    }

    /// Decrypt one envelope, reporting why it failed.
    pub async fn try_decrypt(&self, envelope: &str) -> Result<String, VaultError> {
        let sealed: Envelope = envelope.parse()?;
        self.open(&sealed).await
    }

    /// Decrypt one envelope. `None`, blank, malformed or undecryptable input yields `None`.
    pub async fn decrypt(&self, envelope: Option<&str>) -> Option<String> {
        let envelope = envelope.filter(|value| !value.is_empty())?;
        let result = self.try_decrypt(envelope).await;
        self.settle(result)
    }

    /// Encrypt `fields` of a row about to be written. Returns a new row.
    ///
    /// A string value moves into `<field>_enc` (null when blank) and the legacy
    /// column is cleared to null. An explicit null clears `<field>_enc`. Other
    /// value types and absent fields are left untouched.
    pub async fn encrypt_fields(
        &self,
        columns: &Columns,
        fields: &[&str],
    ) -> Result<Columns, VaultError> {
        let mut out = columns.clone();
        for field in fields {
            let encrypted_column = encrypted_column_name_for(field);
            match columns.get(*field) {
                Some(Value::String(plaintext)) => {
                    let sealed = self.encrypt(Some(plaintext.as_str())).await?;
                    out.insert(
                        encrypted_column,
                        sealed.map_or(Value::Null, |e| Value::String(e.to_string())),
                    );
                    out.insert((*field).to_string(), Value::Null);
                },
                Some(Value::Null) => {
                    out.insert(encrypted_column, Value::Null);
                },
                _ => {},
            }
        }
        Ok(out)
    }

    /// Resolve `fields` of a row just read into their logical plaintext values.
    ///
    /// Each field holding a string in either column is written back under its
    /// plain name (null when unavailable) and `<field>_enc` is dropped from the
    /// returned row. Fields with no string in either column are left as they are.
    pub async fn decrypt_fields(&self, columns: &Columns, fields: &[&str]) -> Columns {
        let mut out = columns.clone();
        for field in fields {
            let encrypted_column = encrypted_column_name_for(field);
            let holds_text = |column: &str| matches!(columns.get(column), Some(Value::String(_)));
            if !holds_text(*field) && !holds_text(encrypted_column.as_str()) {
                continue;
            }

            let value = match Attribute::resolve(columns, field) {
                Some(attribute) => self.decrypt_attribute(attribute).await,
                None => None,
            };
            out.remove(&encrypted_column);
            out.insert((*field).to_string(), value.map_or(Value::Null, Value::String));
        }
        out
    }

    /// [`encrypt_fields`](Self::encrypt_fields) driven by the kind's sensitive fields.
    pub async fn encrypt_record(
        &self,
        kind: RecordKind,
        record: &Record,
    ) -> Result<Record, VaultError> {
        let columns = self
            .encrypt_fields(&record.columns, kind.sensitive_fields())
            .await?;
        Ok(Record::new(record.id.clone(), columns))
    }

    /// [`decrypt_fields`](Self::decrypt_fields) driven by the kind's sensitive fields.
    pub async fn decrypt_record(&self, kind: RecordKind, record: &Record) -> Record {
        let columns = self
            .decrypt_fields(&record.columns, kind.sensitive_fields())
            .await;
        Record::new(record.id.clone(), columns)
    }

    async fn decrypt_attribute(&self, attribute: Attribute) -> Option<String> {
        match attribute {
            Attribute::Plaintext(value) => Some(value),
            Attribute::Encrypted(sealed) => {
                let result = self.open(&sealed).await;
                self.settle(result)
            },
            Attribute::Malformed(raw) => {
                let error = raw.parse::<Envelope>().err().unwrap_or_else(|| {
                    VaultError::MalformedEnvelope("unparseable ciphertext column".into())
                });
                self.settle(Err(error))
            },
        }
    }

    async fn open(&self, sealed: &Envelope) -> Result<String, VaultError> {
        // Reads never create a key; a device without one imports it first.
        let key = self
            .keys
            .get_master_key()
            .await?
            .ok_or_else(|| VaultError::KeyUnavailable("no master key on this device".into()))?;
        let plaintext = envelope::open(&self.cipher, key.as_bytes(), sealed, FIELD_AAD)?;
        String::from_utf8(plaintext).map_err(|e| VaultError::CipherFailure(e.to_string()))
    }

    /// Log and swallow a read-side failure.
    fn settle(&self, result: Result<String, VaultError>) -> Option<String> {
        match result {
            Ok(plaintext) => {
                #[cfg(feature = "metrics")]
                counter!(vault_metrics::DECRYPT_TOTAL).increment(1);
                Some(plaintext)
            },
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(vault_metrics::DECRYPT_FAILURES_TOTAL, labels::REASON => failure_reason(&e))
                    .increment(1);
                #[cfg(feature = "tracing")]
                {
                    if e.is_recoverable_on_read() {
                        tracing::warn!(error = %e, "field could not be decrypted");
                    } else {
                        tracing::error!(error = %e, "field decryption unavailable");
                    }
                }
                #[cfg(not(feature = "tracing"))]
                drop(e);
                None
            },
        }
    }
}

#[cfg(feature = "metrics")]
fn failure_reason(error: &VaultError) -> &'static str {
    match error {
        VaultError::MalformedEnvelope(_) => "malformed_envelope",
        VaultError::MalformedInput(_) | VaultError::Base64(_) | VaultError::Hex(_) => {
            "malformed_input"
        },
        VaultError::CipherFailure(_) => "cipher",
        VaultError::KeyUnavailable(_) => "key_unavailable",
        _ => "other",
    }
}
