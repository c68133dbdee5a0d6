//! Builds engine components from the loaded configuration.

use std::sync::Arc;

use {
    anyhow::{Context as _, Result},
    kinvault_config::{KeyStoreBackend, KinvaultConfig},
    kinvault_vault::{
        CipherBackend, EncryptionService, FileKeyStore, KdfParams, KeyManager, KeyStore,
        MemoryKeyStore,
    },
    secrecy::Secret,
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
};

pub struct Context {
    pub config: KinvaultConfig,
    keys: Arc<KeyManager>,
}

impl Context {
    pub fn new(config: KinvaultConfig) -> Self {
        let store: Arc<dyn KeyStore> = match config.keystore.backend {
            KeyStoreBackend::File => {
                Arc::new(FileKeyStore::new(kinvault_config::keystore_dir(&config)))
            },
            KeyStoreBackend::Memory => Arc::new(MemoryKeyStore::new()),
        };
        Self {
            config,
            keys: Arc::new(KeyManager::new(store)),
        }
    }

    pub fn key_manager(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn cipher(&self) -> Result<CipherBackend> {
        Ok(self.config.cipher.backend.parse()?)
    }

    pub fn kdf_params(&self) -> KdfParams {
        let kdf = self.config.kdf;
        KdfParams {
            m_cost: kdf.m_cost,
            t_cost: kdf.t_cost,
            p_cost: kdf.p_cost,
        }
    }

    pub fn service(&self) -> Result<EncryptionService<CipherBackend>> {
        Ok(EncryptionService::new(Arc::clone(&self.keys), self.cipher()?))
    }

    /// Passphrase for key export/import, from `keystore.passphrase` or `KINVAULT_PASSPHRASE`.
    pub fn passphrase(&self) -> Result<&Secret<String>> {
        self.config
            .keystore
            .passphrase
            .as_ref()
            .context("no passphrase configured; set KINVAULT_PASSPHRASE")
    }

    /// Connect to the record database and apply pending migrations.
    pub async fn pool(&self) -> Result<SqlitePool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(self.config.database.max_connections)
            .connect(&self.config.database.url)
            .await
            .with_context(|| format!("failed to connect to {}", self.config.database.url))?;
        kinvault_vault::run_migrations(&pool).await?;
        Ok(pool)
    }
}


#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, kinvault_vault::KeyStatus};

    #[tokio::test]
    async fn file_backend_persists_between_contexts() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_support::config_in(tmp.path());

        let first = Context::new(config.clone());
        let key = first.key_manager().get_or_create_master_key().await.unwrap();

        let second = Context::new(config);
        assert_eq!(second.key_manager().status().await.unwrap(), KeyStatus::Persisted);
        let reloaded = second.key_manager().get_or_create_master_key().await.unwrap();
        assert_eq!(reloaded, key);
    }

    #[test]
    fn unknown_cipher_is_an_error() {
        let mut config = KinvaultConfig::default();
        config.cipher.backend = "rot13".into();
        assert!(Context::new(config).cipher().is_err());
    }

    #[test]
    fn missing_passphrase_is_an_error() {
        let mut config = KinvaultConfig::default();
        config.keystore.backend = KeyStoreBackend::Memory;
        assert!(Context::new(config).passphrase().is_err());
    }
}
