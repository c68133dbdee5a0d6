//! In-memory record store for tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use {
    anyhow::{Result, bail},
    async_trait::async_trait,
};

use crate::{
    attribute::{Columns, Record},
    fields::RecordKind,
    record_store::RecordStore,
};

struct Row {
    tenant_id: String,
    record: Record,
}

/// Record store backed by `HashMap`, with update failure injection.
pub struct InMemoryRecordStore {
    tables: Mutex<HashMap<RecordKind, Vec<Row>>>,
    updates: AtomicUsize,
    fail_after: Mutex<Option<usize>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            updates: AtomicUsize::new(0),
            fail_after: Mutex::new(None),
        }
    }

    /// Add or replace a row.
    pub fn insert(&self, kind: RecordKind, tenant_id: &str, record: Record) {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let rows = tables.entry(kind).or_default();
        rows.retain(|row| row.record.id != record.id);
        rows.push(Row {
            tenant_id: tenant_id.to_string(),
            record,
        });
    }

    /// Current state of one row.
    pub fn get(&self, kind: RecordKind, record_id: &str) -> Option<Record> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables
            .get(&kind)?
            .iter()
            .find(|row| row.record.id == record_id)
            .map(|row| row.record.clone())
    }

    /// Let `n` more updates succeed, then fail every update until [`Self::heal`].
    pub fn fail_after(&self, n: usize) {
        let done = self.updates.load(Ordering::SeqCst);
        *self.fail_after.lock().unwrap_or_else(|e| e.into_inner()) = Some(done + n);
    }

    /// Stop injecting update failures.
    pub fn heal(&self) {
        *self.fail_after.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Number of successful updates so far.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn select(&self, kind: RecordKind, tenant_id: &str) -> Result<Vec<Record>> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tables
            .get(&kind)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.tenant_id == tenant_id)
                    .map(|row| row.record.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, kind: RecordKind, record_id: &str, columns: &Columns) -> Result<()> {
        let limit = *self.fail_after.lock().unwrap_or_else(|e| e.into_inner());
        if limit.is_some_and(|limit| self.updates.load(Ordering::SeqCst) >= limit) {
            bail!("injected update failure for {kind}/{record_id}");
        }

        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let Some(row) = tables
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|row| row.record.id == record_id))
        else {
            bail!("record not found: {kind}/{record_id}");
        };
        for (column, value) in columns {
            row.record.columns.insert(column.clone(), value.clone());
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
