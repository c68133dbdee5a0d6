//! Secure key-value persistence for the master key.

use async_trait::async_trait;

/// Well-known identifier of the master key slot. Never tenant- or user-scoped.
pub const MASTER_KEY_ID: &str = "kinvault.master_key";

/// Platform secure storage with string values. Knows nothing about cryptography.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Load the value stored under `id`, or `None` if the slot is empty.
    async fn load(&self, id: &str) -> anyhow::Result<Option<String>>;
    /// Store `value` under `id`, replacing any previous value.
    async fn store(&self, id: &str, value: &str) -> anyhow::Result<()>;
    /// Delete the value under `id`. Deleting an empty slot is not an error.
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
}
