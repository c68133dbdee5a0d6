//! Master key lifecycle: lazy generation, load-or-create, caching, rotation.
//!
//! State machine:
//! - `Absent` → first [`KeyManager::get_or_create_master_key`] → `Cached`
//! - `Cached` → [`KeyManager::clear_cached_key`] → `Persisted` (same key reloads)
//! - any → [`KeyManager::rotate_master_key`] → `Cached` with a new key

use std::{fmt, sync::Arc};

use {
    rand::{TryRngCore, rngs::OsRng},
    sha2::{Digest, Sha256},
    tokio::sync::RwLock,
    zeroize::Zeroizing,
};

#[cfg(feature = "metrics")]
use kinvault_metrics::{counter, vault as vault_metrics};

use crate::{
    error::VaultError,
    kdf::KdfParams,
    key_store::{KeyStore, MASTER_KEY_ID},
    key_wrap::{self, WrappedKey},
    traits::{Cipher, KEY_LEN},
};

/// Short SHA-256 fingerprint of key bytes. Safe to log.
pub fn fingerprint(key: &[u8]) -> String {
    let digest = Sha256::digest(key);
    hex::encode(&digest[..8])
}

/// The device's 256-bit symmetric key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey(Zeroizing<[u8; KEY_LEN]>);

impl MasterKey {
    /// Generate a key from the operating system CSPRNG.
    pub fn generate() -> Result<Self, VaultError> {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng
            .try_fill_bytes(bytes.as_mut_slice())
            .map_err(|e| VaultError::KeyUnavailable(format!("random source failed: {e}")))?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Parse the persisted hex form.
    pub fn from_hex(value: &str) -> Result<Self, VaultError> {
        let value = value.trim();
        if value.len() != KEY_LEN * 2 {
            return Err(VaultError::MalformedInput(format!(
                "master key must be {} hex characters, got {}",
                KEY_LEN * 2,
                value.len()
            )));
        }
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        hex::decode_to_slice(value, bytes.as_mut_slice())?;
        Ok(Self(bytes))
    }

    /// Lowercase hex form used for storage.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0.as_slice()))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self.0.as_slice())
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MasterKey").field(&self.fingerprint()).finish()
    }
}

/// Where the master key currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    /// Nothing persisted yet; the next encryption generates a key.
    Absent,
    /// Persisted but not loaded into memory (fresh process or after sign-out).
    Persisted,
    /// Loaded and cached in memory.
    Cached,
}

/// Owns the master key for one install.
///
/// The cache sits behind a `RwLock`; first use takes the write lock and
/// re-checks before loading or generating, so concurrent callers never
/// generate two keys.
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
    cached: RwLock<Option<MasterKey>>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
        }
    }

    /// Return the cached key, else load it, else generate and persist a new one.
    pub async fn get_or_create_master_key(&self) -> Result<MasterKey, VaultError> {
        if let Some(key) = self.cached.read().await.as_ref() {
            return Ok(key.clone());
        }

        let mut guard = self.cached.write().await;
        if let Some(key) = guard.as_ref() {
            return Ok(key.clone());
        }

        let key = match self.load_persisted().await? {
            Some(key) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(fingerprint = %key.fingerprint(), "master key loaded");
                key
            },
            None => self.generate_and_persist().await?,
        };

        *guard = Some(key.clone());
        Ok(key)
    }

    /// Return the cached key, else load and cache the persisted one. Never generates.
    pub async fn get_master_key(&self) -> Result<Option<MasterKey>, VaultError> {
        if let Some(key) = self.cached.read().await.as_ref() {
            return Ok(Some(key.clone()));
        }

        let mut guard = self.cached.write().await;
        if let Some(key) = guard.as_ref() {
            return Ok(Some(key.clone()));
        }

        let loaded = self.load_persisted().await?;
        if let Some(ref key) = loaded {
            #[cfg(feature = "tracing")]
            tracing::debug!(fingerprint = %key.fingerprint(), "master key loaded");
            *guard = Some(key.clone());
        }
        Ok(loaded)
    }

    /// Drop the in-memory key (sign-out). The persisted key is untouched.
    pub async fn clear_cached_key(&self) {
        *self.cached.write().await = None;

        #[cfg(feature = "tracing")]
        tracing::info!("master key evicted from memory");
    }

    /// Destroy the persisted key and replace it with a fresh one.
    ///
    /// Every envelope sealed under the old key becomes undecryptable.
    pub async fn rotate_master_key(&self) -> Result<MasterKey, VaultError> {
        let mut guard = self.cached.write().await;
        let previous = guard.take();

        self.store
            .delete(MASTER_KEY_ID)
            .await
            .map_err(|e| VaultError::KeyUnavailable(format!("failed to delete master key: {e}")))?;

        let key = self.generate_and_persist().await?;
        *guard = Some(key.clone());

        #[cfg(feature = "metrics")]
        counter!(vault_metrics::KEY_ROTATIONS_TOTAL).increment(1);

        #[cfg(feature = "tracing")]
        {
            let previous = previous
                .map(|old| old.fingerprint())
                .unwrap_or_else(|| "none".to_string());
            tracing::warn!(
                %previous,
                fingerprint = %key.fingerprint(),
                "master key rotated, data sealed under the previous key is orphaned"
            );
        }
        #[cfg(not(feature = "tracing"))]
        drop(previous);

        Ok(key)
    }

    pub async fn is_cached(&self) -> bool {
        self.cached.read().await.is_some()
    }

    pub async fn status(&self) -> Result<KeyStatus, VaultError> {
        if self.is_cached().await {
            return Ok(KeyStatus::Cached);
        }
        let persisted = self
            .store
            .load(MASTER_KEY_ID)
            .await
            .map_err(|e| VaultError::KeyUnavailable(e.to_string()))?;
        Ok(match persisted {
            Some(_) => KeyStatus::Persisted,
            None => KeyStatus::Absent,
        })
    }

    /// Wrap the master key under `passphrase` so another device can import it.
    pub async fn export_wrapped<C: Cipher + ?Sized>(
        &self,
        cipher: &C,
        passphrase: &str,
        params: KdfParams,
    ) -> Result<WrappedKey, VaultError> {
        let key = self.get_or_create_master_key().await?;
        key_wrap::wrap_key(cipher, key.as_bytes(), passphrase, params)
    }

    /// Install a master key exported by another device, replacing the local one.
    pub async fn import_wrapped<C: Cipher + ?Sized>(
        &self,
        cipher: &C,
        wrapped: &WrappedKey,
        passphrase: &str,
    ) -> Result<MasterKey, VaultError> {
        let bytes = key_wrap::unwrap_key(cipher, wrapped, passphrase)?;
        let key = MasterKey(bytes);

        let mut guard = self.cached.write().await;
        let previous = match guard.as_ref() {
            Some(cached) => Some(cached.clone()),
            None => self.load_persisted().await?,
        };

        self.store
            .store(MASTER_KEY_ID, &key.to_hex())
            .await
            .map_err(|e| VaultError::KeyUnavailable(format!("failed to persist master key: {e}")))?;
        *guard = Some(key.clone());

        #[cfg(feature = "tracing")]
        {
            match previous {
                Some(prev) if prev != key => tracing::warn!(
                    previous = %prev.fingerprint(),
                    fingerprint = %key.fingerprint(),
                    "imported master key replaces a different local key"
                ),
                _ => tracing::info!(fingerprint = %key.fingerprint(), "master key imported"),
            }
        }
        #[cfg(not(feature = "tracing"))]
        drop(previous);

        Ok(key)
    }

    async fn load_persisted(&self) -> Result<Option<MasterKey>, VaultError> {
        let stored = self
            .store
            .load(MASTER_KEY_ID)
            .await
            .map_err(|e| VaultError::KeyUnavailable(format!("failed to load master key: {e}")))?;

        stored
            .map(|value| {
                MasterKey::from_hex(&Zeroizing::new(value)).map_err(|e| {
                    VaultError::KeyUnavailable(format!("persisted master key is unreadable: {e}"))
                })
            })
            .transpose()
    }

    async fn generate_and_persist(&self) -> Result<MasterKey, VaultError> {
        let key = MasterKey::generate()?;
        self.store
            .store(MASTER_KEY_ID, &key.to_hex())
            .await
            .map_err(|e| VaultError::KeyUnavailable(format!("failed to persist master key: {e}")))?;

        #[cfg(feature = "metrics")]
        counter!(vault_metrics::KEYS_GENERATED_TOTAL).increment(1);

        #[cfg(feature = "tracing")]
        tracing::info!(fingerprint = %key.fingerprint(), "generated new master key");

        Ok(key)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{key_store_memory::MemoryKeyStore, rustcrypto::AesGcmCipher},
        async_trait::async_trait,
    };

    fn manager() -> (Arc<MemoryKeyStore>, KeyManager) {
        let store = Arc::new(MemoryKeyStore::new());
        let manager = KeyManager::new(store.clone());
        (store, manager)
    }

    struct BrokenKeyStore;

    #[async_trait]
    impl KeyStore for BrokenKeyStore {
        async fn load(&self, _id: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("keychain locked")
        }

        async fn store(&self, _id: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("keychain locked")
        }

        async fn delete(&self, _id: &str) -> anyhow::Result<()> {
            anyhow::bail!("keychain locked")
        }
    }

    #[tokio::test]
    async fn first_use_generates_and_persists() {
        let (store, manager) = manager();
        assert_eq!(manager.status().await.unwrap(), KeyStatus::Absent);

        let key = manager.get_or_create_master_key().await.unwrap();
        let persisted = store.load(MASTER_KEY_ID).await.unwrap().unwrap();
        assert_eq!(persisted, *key.to_hex());
        assert_eq!(persisted.len(), 64);
        assert_eq!(manager.status().await.unwrap(), KeyStatus::Cached);
    }

    #[tokio::test]
    async fn loading_never_generates() {
        let (store, manager) = manager();
        assert_eq!(manager.get_master_key().await.unwrap(), None);
        assert!(store.load(MASTER_KEY_ID).await.unwrap().is_none());
        assert!(!manager.is_cached().await);

        let created = manager.get_or_create_master_key().await.unwrap();
        manager.clear_cached_key().await;
        assert_eq!(manager.get_master_key().await.unwrap(), Some(created));
        assert!(manager.is_cached().await);
    }

    #[tokio::test]
    async fn repeated_calls_return_same_key() {
        let (_, manager) = manager();
        let a = manager.get_or_create_master_key().await.unwrap();
        let b = manager.get_or_create_master_key().await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn clear_then_reload_returns_persisted_key() {
        let (_, manager) = manager();
        let before = manager.get_or_create_master_key().await.unwrap();

        manager.clear_cached_key().await;
        assert!(!manager.is_cached().await);
        assert_eq!(manager.status().await.unwrap(), KeyStatus::Persisted);

        let after = manager.get_or_create_master_key().await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn fresh_manager_on_same_storage_loads_same_key() {
        let store: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
        let first = KeyManager::new(store.clone())
            .get_or_create_master_key()
            .await
            .unwrap();
        let second = KeyManager::new(store)
            .get_or_create_master_key()
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn rotation_replaces_persisted_key() {
        let (store, manager) = manager();
        let old = manager.get_or_create_master_key().await.unwrap();
        let new = manager.rotate_master_key().await.unwrap();
        assert_ne!(old, new);

        let persisted = store.load(MASTER_KEY_ID).await.unwrap().unwrap();
        assert_eq!(persisted, *new.to_hex());

        manager.clear_cached_key().await;
        assert_eq!(manager.get_or_create_master_key().await.unwrap(), new);
    }

    #[tokio::test]
    async fn concurrent_first_use_generates_once() {
        let (_, manager) = manager();
        let manager = Arc::new(manager);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_or_create_master_key().await.unwrap() })
            })
            .collect();

        let mut keys = Vec::new();
        for handle in handles {
            keys.push(handle.await.unwrap());
        }
        assert!(keys.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn corrupt_persisted_key_is_unavailable_not_replaced() {
        let (store, manager) = manager();
        store.store(MASTER_KEY_ID, "not-hex").await.unwrap();

        let result = manager.get_or_create_master_key().await;
        assert!(matches!(result, Err(VaultError::KeyUnavailable(_))));
        assert_eq!(
            store.load(MASTER_KEY_ID).await.unwrap().as_deref(),
            Some("not-hex")
        );
    }

    #[tokio::test]
    async fn broken_store_is_key_unavailable() {
        let manager = KeyManager::new(Arc::new(BrokenKeyStore));
        let result = manager.get_or_create_master_key().await;
        assert!(matches!(result, Err(VaultError::KeyUnavailable(_))));
        assert!(matches!(
            manager.rotate_master_key().await,
            Err(VaultError::KeyUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn export_import_shares_key_between_devices() {
        let (_, phone) = manager();
        let (_, tablet) = manager();

        let wrapped = phone
            .export_wrapped(&AesGcmCipher, "kitchen-table", KdfParams::insecure_for_tests())
            .await
            .unwrap();
        let imported = tablet
            .import_wrapped(&AesGcmCipher, &wrapped, "kitchen-table")
            .await
            .unwrap();

        assert_eq!(imported, phone.get_or_create_master_key().await.unwrap());
        tablet.clear_cached_key().await;
        assert_eq!(tablet.get_or_create_master_key().await.unwrap(), imported);
    }

    #[tokio::test]
    async fn import_with_wrong_passphrase_keeps_local_key() {
        let (_, phone) = manager();
        let (_, tablet) = manager();
        let local = tablet.get_or_create_master_key().await.unwrap();

        let wrapped = phone
            .export_wrapped(&AesGcmCipher, "kitchen-table", KdfParams::insecure_for_tests())
            .await
            .unwrap();
        let result = tablet
            .import_wrapped(&AesGcmCipher, &wrapped, "wrong")
            .await;
        assert!(matches!(result, Err(VaultError::BadCredential)));
        assert_eq!(tablet.get_or_create_master_key().await.unwrap(), local);
    }

    #[test]
    fn hex_round_trip_and_redacted_debug() {
        let key = MasterKey::from_bytes([0xAB; KEY_LEN]);
        assert_eq!(MasterKey::from_hex(&key.to_hex()).unwrap(), key);
        assert!(!format!("{key:?}").contains("abab"));
        assert_eq!(key.fingerprint().len(), 16);
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(MasterKey::generate().unwrap(), MasterKey::generate().unwrap());
    }
}
