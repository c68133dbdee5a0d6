//! Configuration loading, env substitution and validation.
//!
//! Config files: `kinvault.toml`, `kinvault.yaml`, or `kinvault.json`
//! Searched in `./` then `~/.config/kinvault/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, keystore_dir, load,
        load_config, markers_path,
    },
    schema::{
        CipherConfig, DatabaseConfig, KdfConfig, KeyStoreBackend, KeyStoreConfig, KinvaultConfig,
        MetricsConfig, MigrationConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_config},
};
