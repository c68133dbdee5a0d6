use std::path::{Path, PathBuf};

use {
    anyhow::{Result, bail},
    clap::Subcommand,
    kinvault_vault::{KeyStatus, WrappedKey},
    secrecy::ExposeSecret,
};

use crate::context::Context;

#[derive(Subcommand)]
pub enum KeyAction {
    /// Show whether a master key exists and its fingerprint.
    Status,
    /// Replace the master key. Everything encrypted under the old key becomes unreadable.
    Rotate {
        /// Confirm that existing ciphertext will be orphaned.
        #[arg(long)]
        yes: bool,
    },
    /// Drop the in-memory key (sign-out). The persisted key is kept.
    Clear,
    /// Write the master key wrapped under KINVAULT_PASSPHRASE, for another device.
    Export {
        /// Output file (stdout if omitted).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Install a master key exported by another device.
    Import {
        /// Wrapped key file produced by `key export`.
        file: PathBuf,
        /// Replace an existing local key.
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_key(ctx: &Context, action: KeyAction) -> Result<()> {
    match action {
        KeyAction::Status => status(ctx).await,
        KeyAction::Rotate { yes } => rotate(ctx, yes).await,
        KeyAction::Clear => clear(ctx).await,
        KeyAction::Export { out } => export(ctx, out).await,
        KeyAction::Import { file, force } => import(ctx, &file, force).await,
    }
}

async fn status(ctx: &Context) -> Result<()> {
    let keys = ctx.key_manager();
    let status = keys.status().await?;
    println!("status:      {}", status_label(status));
    if status != KeyStatus::Absent {
        let key = keys.get_or_create_master_key().await?;
        println!("fingerprint: {}", key.fingerprint());
    }
    println!("cipher:      {}", ctx.cipher()?);
    Ok(())
}

async fn rotate(ctx: &Context, yes: bool) -> Result<()> {
    if !yes {
        bail!(
            "rotating destroys the current master key and every value encrypted under it \
             becomes unreadable; re-run with --yes to continue"
        );
    }
    let key = ctx.key_manager().rotate_master_key().await?;
    println!("master key rotated, new fingerprint {}", key.fingerprint());
    Ok(())
}

async fn clear(ctx: &Context) -> Result<()> {
    let keys = ctx.key_manager();
    keys.clear_cached_key().await;
    println!("cached key cleared; status: {}", status_label(keys.status().await?));
    Ok(())
}

async fn export(ctx: &Context, out: Option<PathBuf>) -> Result<()> {
    let passphrase = ctx.passphrase()?;
    let wrapped = ctx
        .key_manager()
        .export_wrapped(&ctx.cipher()?, passphrase.expose_secret(), ctx.kdf_params())
        .await?;
    let json = serde_json::to_string_pretty(&wrapped)?;

    match out {
        Some(path) => {
            tokio::fs::write(&path, format!("{json}\n")).await?;
            eprintln!(
                "wrapped key {} written to {}",
                wrapped.fingerprint,
                path.display()
            );
        },
        None => println!("{json}"),
    }
    Ok(())
}

async fn import(ctx: &Context, file: &Path, force: bool) -> Result<()> {
    let keys = ctx.key_manager();
    if keys.status().await? != KeyStatus::Absent && !force {
        bail!(
            "a master key already exists on this device; importing replaces it and orphans \
             anything encrypted under it. Re-run with --force to continue"
        );
    }

    let raw = tokio::fs::read_to_string(file).await?;
    let wrapped: WrappedKey = serde_json::from_str(&raw)?;
    let passphrase = ctx.passphrase()?;
    let key = keys
        .import_wrapped(&ctx.cipher()?, &wrapped, passphrase.expose_secret())
        .await?;
    println!("imported master key {}", key.fingerprint());
    Ok(())
}

fn status_label(status: KeyStatus) -> &'static str {
    match status {
        KeyStatus::Absent => "absent",
        KeyStatus::Persisted => "persisted",
        KeyStatus::Cached => "cached",
    }
}
