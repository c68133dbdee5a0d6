//! Field-level encryption for sensitive household records.
//!
//! Sensitive attributes are sealed with AES-256-GCM under a single device
//! master key and stored as `hex(iv):base64(ciphertext||tag)` envelopes in a
//! `<field>_enc` column next to the legacy plaintext column. Reads prefer the
//! ciphertext column; a one-shot [`MigrationOrchestrator`] fills it for
//! existing data without touching the plaintext.
//!
//! Trait-based [`Cipher`] design allows swapping the encryption backend.

pub mod attribute;
pub mod backend;
pub mod envelope;
pub mod error;
pub mod fields;
pub mod kdf;
pub mod key_manager;
pub mod key_store;
pub mod key_store_file;
pub mod key_store_memory;
pub mod key_wrap;
pub mod marker;
pub mod migration;
#[cfg(feature = "openssl")]
pub mod native;
pub mod record_store;
pub mod record_store_memory;
pub mod record_store_sqlite;
pub mod rustcrypto;
pub mod service;
pub mod traits;

pub use {
    attribute::{Attribute, Columns, Record},
    backend::CipherBackend,
    envelope::Envelope,
    error::VaultError,
    fields::{RecordKind, encrypted_column_name_for},
    kdf::KdfParams,
    key_manager::{KeyManager, KeyStatus, MasterKey},
    key_store::{KeyStore, MASTER_KEY_ID},
    key_store_file::FileKeyStore,
    key_store_memory::MemoryKeyStore,
    key_wrap::WrappedKey,
    marker::{FileMarkerStore, InMemoryMarkerStore, MarkerStore, MigrationMarker},
    migration::{MigrationOrchestrator, MigrationReport, PassReport, RecordOutcome},
    record_store::RecordStore,
    record_store_memory::InMemoryRecordStore,
    record_store_sqlite::SqliteRecordStore,
    rustcrypto::AesGcmCipher,
    service::EncryptionService,
    traits::Cipher,
};

#[cfg(feature = "openssl")]
pub use native::OpenSslGcmCipher;

/// Run database migrations for the vault crate.
///
/// Creates the `children`, `emergency_contacts` and `contacts` tables with
/// their `_enc` columns.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
