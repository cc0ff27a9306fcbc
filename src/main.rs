use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use relwatch::config::Config;
use relwatch::notify::Notifier;
use relwatch::storage::Database;
use relwatch::watch;

/// Get the config directory path (~/.config/relwatch/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("relwatch"))
}

#[derive(Parser, Debug)]
#[command(
    name = "relwatch",
    about = "Watches a GitHub releases Atom feed and posts new releases to a Slack webhook"
)]
struct Args {
    /// Path to the config file (default: ~/.config/relwatch/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // The config and state files hold a webhook credential; user-only access.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    let feed_url = config
        .feed_url
        .clone()
        .context("feed_url is not configured (set it in config.toml)")?;
    let webhook_url = config.webhook_url().context(
        "webhook_url is not configured (set it in config.toml or RELWATCH_WEBHOOK_URL)",
    )?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;

    // Best-effort startup: a broken state file costs dedup across restarts,
    // never the watch loop itself.
    let db_path = config_dir.join("state.db");
    let db_path_str = db_path
        .to_str()
        .context("Invalid UTF-8 in state database path")?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(
                path = %db_path.display(),
                error = %e,
                "Failed to open state database, falling back to in-memory state"
            );
            Database::open(":memory:")
                .await
                .context("Failed to open in-memory state database")?
        }
    };

    let notifier = Notifier::new(
        client.clone(),
        webhook_url,
        config.channel.clone(),
        config.username.clone(),
        config.icon_emoji.as_deref(),
    );

    let last_updated = match db.last_updated().await {
        Ok(ts) => ts,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read watermark at startup, assuming never-notified");
            0
        }
    };
    tracing::info!(
        feed = %feed_url,
        interval_seconds = config.interval_seconds,
        last_updated,
        "Release watcher loaded"
    );

    if args.once {
        let outcome = watch::run_cycle(&client, &db, &notifier, &feed_url)
            .await
            .context("Poll cycle failed")?;
        tracing::info!(?outcome, "Single cycle complete");
        return Ok(());
    }

    watch::run_forever(
        client,
        db,
        notifier,
        feed_url,
        config.interval_seconds,
        config.allow_overlapping_cycles,
    )
    .await;

    Ok(())
}
