// src/bin/decrypt_batch.rs
//! Operator batch decrypt
//!
//! ```text
//! decrypt_batch [--config <file>] [--out <file>] (--all | <id>...)
//! ```
//!
//! The admin credential comes from `SV_ADMIN_TOKEN`, or is prompted for.
//! Prints the batch report as JSON; exits with status 2 if any id failed.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use submission_vault::{AdminRequest, App, BatchDecryptRequest, Config, SubmissionFilter};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CALLER_ID: &str = "decrypt_batch-cli";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    all: bool,
    ids: Vec<String>,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--all" => args.all = true,
            "--config" => args.config = Some(raw.next().context("--config needs a path")?.into()),
            "--out" => args.out = Some(raw.next().context("--out needs a path")?.into()),
            "-h" | "--help" => {
                println!("usage: decrypt_batch [--config <file>] [--out <file>] (--all | <id>...)");
                std::process::exit(0);
            }
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            _ => args.ids.push(arg),
        }
    }
    if args.all == !args.ids.is_empty() {
        bail!("pass either --all or one or more ids");
    }
    Ok(args)
}

fn admin_token() -> Result<String> {
    if let Ok(token) = std::env::var("SV_ADMIN_TOKEN") {
        if !token.trim().is_empty() {
            return Ok(token);
        }
    }
    let token = rpassword::prompt_password("Admin token: ").context("reading admin token")?;
    Ok(token.trim_end().to_owned())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;

    let app = App::connect(&config).await.context("connecting submission store")?;
    let token = admin_token()?;
    let request = AdminRequest::new(CALLER_ID, Some(token.as_str()));

    let ids: Vec<String> = if args.all {
        app.admin()
            .list(&request, &SubmissionFilter::all())
            .await?
            .into_iter()
            .map(|view| view.id)
            .collect()
    } else {
        args.ids
    };
    if ids.is_empty() {
        warn!("No submissions to decrypt");
        app.close().await?;
        return Ok(());
    }

    info!(count = ids.len(), "Decrypting submissions");
    let report = app
        .admin()
        .batch_decrypt(&request, &BatchDecryptRequest { ids })
        .await?;

    let json = serde_json::to_string_pretty(&report)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{json}"),
    }

    info!(
        succeeded = report.success_count,
        failed = report.failure_count,
        total = report.total,
        "Batch complete"
    );
    app.close().await?;
    if report.failure_count > 0 {
        std::process::exit(2);
    }
    Ok(())
}
