use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    secrecy::Secret,
    tracing::debug,
};

use crate::{env_subst::substitute_env, schema::KinvaultConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "kinvault.toml",
    "kinvault.yaml",
    "kinvault.yml",
    "kinvault.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<KinvaultConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./kinvault.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/kinvault/kinvault.{toml,yaml,yml,json}` (user-global)
///
/// Returns `KinvaultConfig::default()` if no config file is found. A file that
/// is found but fails to load is an error, never a silent fallback to defaults.
pub fn discover_and_load() -> anyhow::Result<KinvaultConfig> {
    load_discovered(find_config_file())
}

fn load_discovered(found: Option<PathBuf>) -> anyhow::Result<KinvaultConfig> {
    match found {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
                .with_context(|| format!("invalid config file {}", path.display()))
        },
        None => {
            debug!("no config file found, using defaults");
            Ok(KinvaultConfig::default())
        },
    }
}

/// Load `explicit` if given, otherwise discover, then apply `KINVAULT_*`
/// environment overrides. Any config file that exists but fails to load is fatal.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<KinvaultConfig> {
    let config = match explicit {
        Some(path) => load_config(path)?,
        None => discover_and_load()?,
    };
    Ok(apply_env_overrides(config))
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/kinvault/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "kinvault").map(|d| d.config_dir().to_path_buf())
}

/// Returns the user data directory (`~/.local/share/kinvault/`), or `./.kinvault`.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "kinvault")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".kinvault"))
}

/// Directory of the file key store.
pub fn keystore_dir(config: &KinvaultConfig) -> PathBuf {
    config
        .keystore
        .dir
        .clone()
        .unwrap_or_else(|| data_dir().join("keys"))
}

/// Path of the migration marker file.
pub fn markers_path(config: &KinvaultConfig) -> PathBuf {
    config
        .migration
        .markers_path
        .clone()
        .unwrap_or_else(|| data_dir().join("migration_markers.json"))
}

/// Apply `KINVAULT_*` environment variable overrides.
///
/// - `KINVAULT_DATABASE_URL` → `database.url`
/// - `KINVAULT_KEYSTORE_DIR` → `keystore.dir`
/// - `KINVAULT_CIPHER` → `cipher.backend`
/// - `KINVAULT_PASSPHRASE` → `keystore.passphrase`
pub fn apply_env_overrides(config: KinvaultConfig) -> KinvaultConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: KinvaultConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> KinvaultConfig {
    let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(url) = var("KINVAULT_DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(dir) = var("KINVAULT_KEYSTORE_DIR") {
        config.keystore.dir = Some(PathBuf::from(dir));
    }
    if let Some(backend) = var("KINVAULT_CIPHER") {
        config.cipher.backend = backend;
    }
    if let Some(passphrase) = var("KINVAULT_PASSPHRASE") {
        config.keystore.passphrase = Some(Secret::new(passphrase));
    }
    config
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<KinvaultConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::schema::KeyStoreBackend, secrecy::ExposeSecret};

    #[test]
    fn loads_each_format() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("kinvault.toml");
        std::fs::write(&toml_path, "[database]\nurl = \"sqlite://a.db\"\n").unwrap();
        assert_eq!(load_config(&toml_path).unwrap().database.url, "sqlite://a.db");

        let yaml_path = dir.path().join("kinvault.yaml");
        std::fs::write(&yaml_path, "keystore:\n  backend: memory\n").unwrap();
        assert_eq!(
            load_config(&yaml_path).unwrap().keystore.backend,
            KeyStoreBackend::Memory
        );

        let json_path = dir.path().join("kinvault.json");
        std::fs::write(&json_path, r#"{"kdf": {"m_cost": 19456}}"#).unwrap();
        assert_eq!(load_config(&json_path).unwrap().kdf.m_cost, 19456);
    }

    #[test]
    fn unsupported_extension_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ini = dir.path().join("kinvault.ini");
        std::fs::write(&ini, "").unwrap();
        assert!(load_config(&ini).is_err());
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
        assert!(load(Some(dir.path().join("missing.toml").as_path())).is_err());
    }

    #[test]
    fn broken_discovered_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kinvault.toml");
        std::fs::write(&path, "[keystore]\ndir = [\"not\", \"a path\"]\n").unwrap();

        let err = load_discovered(Some(path)).unwrap_err();
        assert!(format!("{err:#}").contains("invalid config file"));

        let defaults = load_discovered(None).unwrap();
        assert_eq!(defaults.database.url, KinvaultConfig::default().database.url);
    }

    #[test]
    fn default_substitution_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kinvault.toml");
        std::fs::write(
            &path,
            "[database]\nurl = \"${KINVAULT_UNSET_TEST_URL_9F2:-sqlite://fallback.db}\"\n",
        )
        .unwrap();
        assert_eq!(load_config(&path).unwrap().database.url, "sqlite://fallback.db");
    }

    #[test]
    fn env_overrides_apply() {
        let lookup = |name: &str| match name {
            "KINVAULT_DATABASE_URL" => Some("sqlite://override.db".to_string()),
            "KINVAULT_KEYSTORE_DIR" => Some("/tmp/keys".to_string()),
            "KINVAULT_PASSPHRASE" => Some("s3cret".to_string()),
            "KINVAULT_CIPHER" => Some(String::new()),
            _ => None,
        };
        let cfg = apply_env_overrides_with(KinvaultConfig::default(), lookup);
        assert_eq!(cfg.database.url, "sqlite://override.db");
        assert_eq!(cfg.keystore.dir, Some(PathBuf::from("/tmp/keys")));
        assert_eq!(cfg.keystore.passphrase.unwrap().expose_secret(), "s3cret");
        assert_eq!(cfg.cipher.backend, "rustcrypto");
    }

    #[test]
    fn resolved_paths_prefer_config() {
        let mut cfg = KinvaultConfig::default();
        assert!(keystore_dir(&cfg).ends_with("keys"));
        cfg.keystore.dir = Some(PathBuf::from("/srv/keys"));
        cfg.migration.markers_path = Some(PathBuf::from("/srv/markers.json"));
        assert_eq!(keystore_dir(&cfg), PathBuf::from("/srv/keys"));
        assert_eq!(markers_path(&cfg), PathBuf::from("/srv/markers.json"));
    }
}
