use std::sync::Arc;

use {
    anyhow::Result,
    kinvault_vault::{FileMarkerStore, MigrationOrchestrator, SqliteRecordStore},
    tracing::info,
};

use crate::context::Context;

/// Encrypt the legacy plaintext attributes of one tenant.
///
/// A tenant with a completion marker is skipped unless `force` is set. A
/// forced re-run is safe: attributes already encrypted are left alone.
pub async fn handle_migrate(ctx: &Context, tenant_id: &str, force: bool) -> Result<()> {
    let pool = ctx.pool().await?;
    let orchestrator = MigrationOrchestrator::new(
        Arc::new(ctx.service()?),
        Arc::new(SqliteRecordStore::with_pool(pool.clone())),
        Arc::new(FileMarkerStore::new(kinvault_config::markers_path(
            &ctx.config,
        ))),
    );

    if !force && let Some(marker) = orchestrator.marker(tenant_id).await? {
        info!(tenant_id, completed_at = %marker.completed_at, "tenant already migrated");
        println!(
            "tenant {tenant_id} already migrated at {} ({} encrypted, {} skipped); use --force to re-run",
            marker.completed_at, marker.migrated_count, marker.skipped_count
        );
        pool.close().await;
        return Ok(());
    }

    let report = orchestrator.migrate_tenant(tenant_id).await;
    pool.close().await;
    println!("{}", serde_json::to_string_pretty(&report?)?);
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::context::test_support::config_in,
        kinvault_vault::{RecordKind, RecordStore},
    };

    async fn seed(ctx: &Context) {
        let pool = ctx.pool().await.unwrap();
        sqlx::query(
            "INSERT INTO children (id, tenant_id, name, allergies, health_notes) \
             VALUES ('k1', 'fam-1', 'Mia', 'Erdnüsse', '')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO contacts (id, tenant_id, name, phone) VALUES ('c1', 'fam-1', 'Oma', '0301234')",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    #[tokio::test]
    async fn migrates_then_skips_marked_tenant() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = Context::new(config_in(tmp.path()));
        seed(&ctx).await;

        handle_migrate(&ctx, "fam-1", false).await.unwrap();

        let store = SqliteRecordStore::with_pool(ctx.pool().await.unwrap());
        let children = store.select(RecordKind::Children, "fam-1").await.unwrap();
        let service = ctx.service().unwrap();
        let allergies = children[0].text("allergies_enc").unwrap().to_string();
        assert_eq!(
            service.decrypt(Some(allergies.as_str())).await.as_deref(),
            Some("Erdnüsse")
        );
        // The legacy column is left in place.
        assert_eq!(children[0].text("allergies"), Some("Erdnüsse"));

        let marker = FileMarkerStore::new(kinvault_config::markers_path(&ctx.config));
        let orchestrator = MigrationOrchestrator::new(
            Arc::new(service),
            Arc::new(store),
            Arc::new(marker),
        );
        let recorded = orchestrator.marker("fam-1").await.unwrap().unwrap();
        assert_eq!(recorded.migrated_count, 2);

        // Second run is a no-op; a forced run finds nothing left to encrypt.
        handle_migrate(&ctx, "fam-1", false).await.unwrap();
        handle_migrate(&ctx, "fam-1", true).await.unwrap();
        let after = orchestrator.marker("fam-1").await.unwrap().unwrap();
        assert_eq!(after.migrated_count, 0);
        assert_eq!(after.skipped_count, recorded.migrated_count + recorded.skipped_count);
    }
}
