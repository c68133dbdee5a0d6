//! Record-access collaborator used by the migration orchestrator.

use {anyhow::Result, async_trait::async_trait};

use crate::{
    attribute::{Columns, Record},
    fields::RecordKind,
};

/// Per-kind, tenant-scoped access to rows carrying sensitive attributes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every row of `kind` belonging to `tenant_id`, in a stable order.
    async fn select(&self, kind: RecordKind, tenant_id: &str) -> Result<Vec<Record>>;

    /// Write `columns` onto the row `record_id`. Columns not named are untouched.
    async fn update(&self, kind: RecordKind, record_id: &str, columns: &Columns) -> Result<()>;
}
