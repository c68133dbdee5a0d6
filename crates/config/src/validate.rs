//! Configuration validation.
//!
//! Flags unknown or misspelled fields, type errors and settings that would
//! make the engine unusable or weaker than intended.

use std::path::{Path, PathBuf};

use crate::schema::{KeyStoreBackend, KinvaultConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "cipher", "kdf",
    /// "database", "keystore", "security", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "kdf.m_cost"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Sections and their fields. `metrics.labels` is a free-form map.
const SCHEMA: &[(&str, &[&str])] = &[
    ("keystore", &["backend", "dir", "passphrase"]),
    ("cipher", &["backend"]),
    ("kdf", &["m_cost", "t_cost", "p_cost"]),
    ("database", &["url", "max_connections"]),
    ("migration", &["markers_path"]),
    ("metrics", &["enabled", "labels"]),
];

/// Names accepted by the cipher backend parser.
const KNOWN_CIPHER_BACKENDS: &[&str] = &["rustcrypto", "rust", "portable", "openssl", "native"];

/// Argon2id memory floor (KiB) below which a warning is raised.
const RECOMMENDED_MIN_M_COST: u32 = 19 * 1024;

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered config file
/// when `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(ref actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");

    let mut result = if is_toml {
        match std::fs::read_to_string(actual_path) {
            Ok(content) => validate_toml_str(&crate::env_subst::substitute_env(&content)),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic::new(
                    Severity::Error,
                    "syntax",
                    "",
                    format!("failed to read config file: {e}"),
                )],
                config_path: None,
            },
        }
    } else {
        match crate::loader::load_config(actual_path) {
            Ok(config) => ValidationResult {
                diagnostics: validate_config(&config),
                config_path: None,
            },
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic::new(
                    Severity::Error,
                    "type-error",
                    "",
                    e.to_string(),
                )],
                config_path: None,
            },
        }
    };
    result.config_path = Some(actual_path.clone());
    result
}

/// Validate a TOML string without touching the file system.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("TOML syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&toml_value, &mut diagnostics);

    if toml_value
        .get("keystore")
        .and_then(|k| k.get("passphrase"))
        .is_some()
    {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "security",
            "keystore.passphrase",
            "passphrase stored in the config file; prefer ${KINVAULT_PASSPHRASE}",
        ));
    }

    match toml::from_str::<KinvaultConfig>(toml_str) {
        Ok(config) => diagnostics.extend(validate_config(&config)),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Semantic checks on a parsed config.
#[must_use]
pub fn validate_config(config: &KinvaultConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let backend = config.cipher.backend.to_ascii_lowercase();
    if !KNOWN_CIPHER_BACKENDS.contains(&backend.as_str()) {
        let message = match suggest(&backend, KNOWN_CIPHER_BACKENDS, 3) {
            Some(s) => format!("unknown cipher backend \"{backend}\" (did you mean \"{s}\"?)"),
            None => format!(
                "unknown cipher backend \"{backend}\" (expected one of: {})",
                KNOWN_CIPHER_BACKENDS.join(", ")
            ),
        };
        diagnostics.push(Diagnostic::new(Severity::Error, "cipher", "cipher.backend", message));
    }

    let kdf = &config.kdf;
    if kdf.t_cost == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "kdf",
            "kdf.t_cost",
            "t_cost must be at least 1",
        ));
    }
    if kdf.p_cost == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "kdf",
            "kdf.p_cost",
            "p_cost must be at least 1",
        ));
    }
    if kdf.m_cost < 8 * kdf.p_cost.max(1) {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "kdf",
            "kdf.m_cost",
            format!("m_cost must be at least 8 * p_cost ({})", 8 * kdf.p_cost.max(1)),
        ));
    } else if kdf.m_cost < RECOMMENDED_MIN_M_COST {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "kdf",
            "kdf.m_cost",
            format!(
                "m_cost {} KiB is weak for passphrase wrapping (recommended >= {RECOMMENDED_MIN_M_COST})",
                kdf.m_cost
            ),
        ));
    }

    if !config.database.url.starts_with("sqlite:") {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "database",
            "database.url",
            "only sqlite: database URLs are supported",
        ));
    }
    if config.database.max_connections == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "database",
            "database.max_connections",
            "max_connections must be at least 1",
        ));
    }

    if config.keystore.backend == KeyStoreBackend::Memory {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "keystore",
            "keystore.backend",
            "memory key store loses the master key on exit; anything encrypted becomes unreadable",
        ));
    }

    diagnostics
}

fn check_unknown_fields(value: &toml::Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(table) = value.as_table() else {
        return;
    };
    let sections: Vec<&str> = SCHEMA.iter().map(|(name, _)| *name).collect();

    for (key, child) in table {
        let Some((_, fields)) = SCHEMA.iter().find(|(name, _)| *name == key.as_str()) else {
            diagnostics.push(unknown_field(key.clone(), key, &sections, "at top level "));
            continue;
        };
        let Some(child) = child.as_table() else {
            continue;
        };
        for field in child.keys() {
            if !fields.contains(&field.as_str()) {
                diagnostics.push(unknown_field(format!("{key}.{field}"), field, fields, ""));
            }
        }
    }
}

fn unknown_field(path: String, key: &str, known: &[&str], level: &str) -> Diagnostic {
    let message = match suggest(key, known, 3) {
        Some(s) => format!("unknown field {level}(did you mean \"{s}\"?)"),
        None => format!("unknown field {level}"),
    };
    Diagnostic::new(Severity::Error, "unknown-field", path, message.trim())
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_len]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&candidate| (candidate, levenshtein(needle, candidate)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(candidate, _)| candidate)
}
