//! One-shot migration of legacy plaintext columns into their `_enc` columns.
//!
//! A tenant is migrated one [`RecordKind`] at a time, one record at a time.
//! Each record yields a [`RecordOutcome`]; a pass folds the outcomes into a
//! [`PassReport`] and stops at the first failure. Per-attribute checks make
//! every step idempotent, so an interrupted run is resumed by running again.
//! Plaintext columns are never written.

use std::{pin::pin, sync::Arc, time::Instant};

use {
    chrono::Utc,
    futures::{Stream, StreamExt, stream},
    serde::Serialize,
    serde_json::Value,
};

#[cfg(feature = "metrics")]
use kinvault_metrics::{counter, histogram, labels, migration as migration_metrics};

use crate::{
    attribute::{Columns, Record},
    error::VaultError,
    fields::{RecordKind, encrypted_column_name_for},
    marker::{MarkerStore, MigrationMarker},
    record_store::RecordStore,
    service::EncryptionService,
    traits::Cipher,
};

/// What happened to one record during a pass.
#[derive(Debug)]
pub enum RecordOutcome {
    /// At least one attribute was encrypted and written.
    Migrated {
        record_id: String,
        migrated: usize,
        skipped: usize,
    },
    /// Nothing to do: every attribute was already encrypted or had no value.
    Skipped { record_id: String, skipped: usize },
    /// Encryption or the update failed. Always a [`VaultError::MigrationRecordFailure`].
    Failed(VaultError),
}

/// Totals of one pass over one record kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub kind: RecordKind,
    pub records: usize,
    pub migrated_count: usize,
    pub skipped_count: usize,
}

impl PassReport {
    fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            records: 0,
            migrated_count: 0,
            skipped_count: 0,
        }
    }
}

/// Totals of a completed tenant migration, counted per attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub tenant_id: String,
    pub migrated_count: usize,
    pub skipped_count: usize,
    pub passes: Vec<PassReport>,
}

/// Drives the plaintext-to-ciphertext migration for a tenant.
pub struct MigrationOrchestrator<C: Cipher> {
    service: Arc<EncryptionService<C>>,
    records: Arc<dyn RecordStore>,
    markers: Arc<dyn MarkerStore>,
}

impl<C: Cipher> MigrationOrchestrator<C> {
    pub fn new(
        service: Arc<EncryptionService<C>>,
        records: Arc<dyn RecordStore>,
        markers: Arc<dyn MarkerStore>,
    ) -> Self {
        Self {
            service,
            records,
            markers,
        }
    }

    /// Whether a completion marker exists for `tenant_id`.
    pub async fn is_migrated(&self, tenant_id: &str) -> Result<bool, VaultError> {
        Ok(self.marker(tenant_id).await?.is_some())
    }

    pub async fn marker(&self, tenant_id: &str) -> Result<Option<MigrationMarker>, VaultError> {
        self.markers
            .get(tenant_id)
            .await
            .map_err(|source| VaultError::Marker {
                tenant_id: tenant_id.to_string(),
                source,
            })
    }

    /// Run every pass for `tenant_id` in [`RecordKind::ALL`] order, then write the marker.
    ///
    /// The marker is only written when every pass succeeded. Records migrated
    /// before a failure stay migrated.
    pub async fn migrate_tenant(&self, tenant_id: &str) -> Result<MigrationReport, VaultError> {
        #[cfg(feature = "tracing")]
        tracing::info!(tenant_id, "starting field encryption migration");

        let mut report = MigrationReport {
            tenant_id: tenant_id.to_string(),
            migrated_count: 0,
            skipped_count: 0,
            passes: Vec::with_capacity(RecordKind::ALL.len()),
        };

        for kind in RecordKind::ALL {
            let pass = match self.migrate_pass(kind, tenant_id).await {
                Ok(pass) => pass,
                Err(e) => {
                    #[cfg(feature = "metrics")]
                    counter!(migration_metrics::RUNS_FAILED_TOTAL).increment(1);
                    #[cfg(feature = "tracing")]
                    tracing::error!(tenant_id, %kind, error = %e, "migration aborted");
                    return Err(e);
                },
            };
            report.migrated_count += pass.migrated_count;
            report.skipped_count += pass.skipped_count;
            report.passes.push(pass);
        }

        let marker = MigrationMarker {
            tenant_id: tenant_id.to_string(),
            completed_at: Utc::now(),
            migrated_count: report.migrated_count,
            skipped_count: report.skipped_count,
        };
        self.markers
            .put(&marker)
            .await
            .map_err(|source| VaultError::Marker {
                tenant_id: tenant_id.to_string(),
                source,
            })?;

        #[cfg(feature = "metrics")]
        counter!(migration_metrics::RUNS_COMPLETED_TOTAL).increment(1);

        #[cfg(feature = "tracing")]
        tracing::info!(
            tenant_id,
            migrated = report.migrated_count,
            skipped = report.skipped_count,
            "field encryption migration complete"
        );

        Ok(report)
    }

    /// Migrate every record of `kind` for `tenant_id`. Stops at the first failed record.
    pub async fn migrate_pass(
        &self,
        kind: RecordKind,
        tenant_id: &str,
    ) -> Result<PassReport, VaultError> {
        let start = Instant::now();
        let rows = self.records.select(kind, tenant_id).await.map_err(|e| {
            VaultError::Other(e.context(format!("failed to select {kind} for tenant {tenant_id}")))
        })?;

        let mut report = PassReport::new(kind);
        let mut outcomes = pin!(self.record_outcomes(kind, rows));
        while let Some(outcome) = outcomes.next().await {
            report.records += 1;
            match outcome {
                RecordOutcome::Migrated {
                    migrated, skipped, ..
                } => {
                    report.migrated_count += migrated;
                    report.skipped_count += skipped;
                },
                RecordOutcome::Skipped { skipped, .. } => {
                    report.skipped_count += skipped;
                },
                RecordOutcome::Failed(e) => return Err(e),
            }
        }

        #[cfg(feature = "metrics")]
        {
            counter!(migration_metrics::ATTRIBUTES_MIGRATED_TOTAL, labels::KIND => kind.table())
                .increment(report.migrated_count as u64);
            counter!(migration_metrics::ATTRIBUTES_SKIPPED_TOTAL, labels::KIND => kind.table())
                .increment(report.skipped_count as u64);
            histogram!(migration_metrics::PASS_DURATION_SECONDS, labels::KIND => kind.table())
                .record(start.elapsed().as_secs_f64());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            tenant_id,
            %kind,
            records = report.records,
            migrated = report.migrated_count,
            skipped = report.skipped_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "migration pass complete"
        );
        #[cfg(not(any(feature = "metrics", feature = "tracing")))]
        let _ = start;

        Ok(report)
    }

    /// Lazily migrate `records`, one per poll, yielding what happened to each.
    pub fn record_outcomes(
        &self,
        kind: RecordKind,
        records: Vec<Record>,
    ) -> impl Stream<Item = RecordOutcome> + '_ {
        stream::iter(records)
            .then(move |record| async move { self.migrate_record(kind, record).await })
    }

    async fn migrate_record(&self, kind: RecordKind, record: Record) -> RecordOutcome {
        let mut patch = Columns::new();
        let mut skipped = 0;

        for field in kind.sensitive_fields() {
            let encrypted_column = encrypted_column_name_for(field);
            if record
                .text(&encrypted_column)
                .is_some_and(|value| !value.is_empty())
            {
                skipped += 1;
                continue;
            }

            let Some(legacy) = record.text(field).filter(|value| !value.trim().is_empty()) else {
                skipped += 1;
                continue;
            };

            match self.service.encrypt(Some(legacy)).await {
                Ok(Some(sealed)) => {
                    patch.insert(encrypted_column, Value::String(sealed.to_string()));
                },
                Ok(None) => skipped += 1,
                Err(e) => {
                    return RecordOutcome::Failed(VaultError::MigrationRecordFailure {
                        kind,
                        record_id: record.id,
                        source: e.into(),
                    });
                },
            }
        }

        if patch.is_empty() {
            return RecordOutcome::Skipped {
                record_id: record.id,
                skipped,
            };
        }

        if let Err(source) = self.records.update(kind, &record.id, &patch).await {
            #[cfg(feature = "tracing")]
            tracing::warn!(%kind, record_id = %record.id, error = %source, "record update failed");
            return RecordOutcome::Failed(VaultError::MigrationRecordFailure {
                kind,
                record_id: record.id,
                source,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(%kind, record_id = %record.id, migrated = patch.len(), "record migrated");

        RecordOutcome::Migrated {
            record_id: record.id,
            migrated: patch.len(),
            skipped,
        }
    }
}
