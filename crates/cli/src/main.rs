mod config_commands;
mod context;
mod db_commands;
mod key_commands;
mod migrate_commands;
mod value_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    kinvault_metrics::{MetricsHandle, MetricsRecorderConfig},
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::context::Context;

#[derive(Parser)]
#[command(name = "kinvault", about = "kinvault: field-level encryption for family records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (overrides discovery of ./kinvault.toml and ~/.config/kinvault/).
    #[arg(long, global = true, env = "KINVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Print collected metrics in Prometheus text format after the command.
    #[arg(long, global = true, default_value_t = false)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Database management.
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
    /// Master key management.
    Key {
        #[command(subcommand)]
        action: key_commands::KeyAction,
    },
    /// Encrypt one value and print its envelope (`-` reads stdin).
    Encrypt { value: String },
    /// Decrypt one envelope and print the plaintext (`-` reads stdin).
    Decrypt { envelope: String },
    /// Encrypt the legacy plaintext attributes of a tenant.
    Migrate {
        /// Tenant (family) identifier.
        #[arg(long)]
        tenant: String,
        /// Re-run even if the tenant is marked as migrated.
        #[arg(long)]
        force: bool,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn init_metrics(cli: &Cli, ctx: &Context) -> anyhow::Result<Option<MetricsHandle>> {
    let metrics = &ctx.config.metrics;
    if !cli.metrics && !metrics.enabled {
        return Ok(None);
    }
    let handle = kinvault_metrics::init_metrics(MetricsRecorderConfig {
        enabled: true,
        global_labels: metrics
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    })?;
    Ok(Some(handle))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "kinvault starting");

    // Validation must work on configs that fail to load.
    if let Commands::Config { action } = cli.command {
        return config_commands::handle_config(cli.config.as_deref(), action).await;
    }

    let config = kinvault_config::load(cli.config.as_deref())?;
    let ctx = Context::new(config);
    let metrics = init_metrics(&cli, &ctx)?;
    info!(cipher = %ctx.config.cipher.backend, "configuration loaded");

    let result = match cli.command {
        Commands::Db { action } => db_commands::handle_db(&ctx, action).await,
        Commands::Key { action } => key_commands::handle_key(&ctx, action).await,
        Commands::Encrypt { value } => value_commands::handle_encrypt(&ctx, value).await,
        Commands::Decrypt { envelope } => value_commands::handle_decrypt(&ctx, envelope).await,
        Commands::Migrate { tenant, force } => {
            migrate_commands::handle_migrate(&ctx, &tenant, force).await
        },
        Commands::Config { .. } => Ok(()),
    };

    if let Some(handle) = metrics {
        eprint!("{}", handle.render());
    }
    result
}
