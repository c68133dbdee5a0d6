//! File-backed key store: one owner-only file per slot.

use std::path::{Path, PathBuf};

use {
    anyhow::{Context, bail},
    async_trait::async_trait,
    tokio::fs,
};

use crate::key_store::KeyStore;

/// Stores each slot as `<dir>/<id>.key`, written atomically with mode `0600`.
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, id: &str) -> anyhow::Result<PathBuf> {
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            bail!("invalid key slot id: {id:?}");
        }
        Ok(self.dir.join(format!("{id}.key")))
    }

    async fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700)).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn load(&self, id: &str) -> anyhow::Result<Option<String>> {
        let path = self.slot_path(id)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    async fn store(&self, id: &str, value: &str) -> anyhow::Result<()> {
        let path = self.slot_path(id)?;
        self.ensure_dir().await?;

        let tmp = path.with_extension("key.tmp");
        fs::write(&tmp, value.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let path = self.slot_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to delete {}", path.display())),
        }
    }
}
