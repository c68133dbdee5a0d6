//! Metric name and label definitions.
//!
//! Every metric kinvault records is named here.

/// Field encryption and key lifecycle metrics
pub mod vault {
    /// Values sealed into envelopes
    pub const ENCRYPT_TOTAL: &str = "kinvault_vault_encrypt_total";
    /// Encryption attempts that failed (fatal to the write)
    pub const ENCRYPT_ERRORS_TOTAL: &str = "kinvault_vault_encrypt_errors_total";
    /// Envelopes opened successfully
    pub const DECRYPT_TOTAL: &str = "kinvault_vault_decrypt_total";
    /// Envelopes that degraded to an absent value, by reason
    pub const DECRYPT_FAILURES_TOTAL: &str = "kinvault_vault_decrypt_failures_total";
    /// Master keys generated
    pub const KEYS_GENERATED_TOTAL: &str = "kinvault_vault_keys_generated_total";
    /// Master key rotations
    pub const KEY_ROTATIONS_TOTAL: &str = "kinvault_vault_key_rotations_total";
}

/// Plaintext-to-ciphertext migration metrics
pub mod migration {
    /// Attributes encrypted into their `_enc` column, by record kind
    pub const ATTRIBUTES_MIGRATED_TOTAL: &str = "kinvault_migration_attributes_migrated_total";
    /// Attributes already encrypted or without a legacy value, by record kind
    pub const ATTRIBUTES_SKIPPED_TOTAL: &str = "kinvault_migration_attributes_skipped_total";
    /// Duration of one pass over one record kind in seconds
    pub const PASS_DURATION_SECONDS: &str = "kinvault_migration_pass_duration_seconds";
    /// Tenant migrations that completed and wrote their marker
    pub const RUNS_COMPLETED_TOTAL: &str = "kinvault_migration_runs_completed_total";
    /// Tenant migrations aborted by a failed record
    pub const RUNS_FAILED_TOTAL: &str = "kinvault_migration_runs_failed_total";
}

/// Common label keys used across metrics
pub mod labels {
    pub const KIND: &str = "kind";
    pub const REASON: &str = "reason";
}

/// Standard histogram buckets for different metric types
pub mod buckets {
    use once_cell::sync::Lazy;

    /// Migration pass duration buckets (in seconds)
    /// Covers 1ms to 5 minutes
    pub static PASS_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0,
        ]
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_prefixed_and_unique() {
        let names = [
            vault::ENCRYPT_TOTAL,
            vault::ENCRYPT_ERRORS_TOTAL,
            vault::DECRYPT_TOTAL,
            vault::DECRYPT_FAILURES_TOTAL,
            vault::KEYS_GENERATED_TOTAL,
            vault::KEY_ROTATIONS_TOTAL,
            migration::ATTRIBUTES_MIGRATED_TOTAL,
            migration::ATTRIBUTES_SKIPPED_TOTAL,
            migration::PASS_DURATION_SECONDS,
            migration::RUNS_COMPLETED_TOTAL,
            migration::RUNS_FAILED_TOTAL,
        ];
        for (i, name) in names.iter().enumerate() {
            assert!(name.starts_with("kinvault_"), "{name}");
            assert!(!names[i + 1..].contains(name), "{name}");
        }
    }

    #[test]
    fn buckets_are_sorted() {
        assert!(buckets::PASS_DURATION.windows(2).all(|w| w[0] < w[1]));
    }
}
