//! Fulcrum CLI entry point.

use clap::Parser;
use fulcrum::cli::commands::{self, CliContext};
use fulcrum::cli::{Cli, Commands};
use fulcrum::infrastructure::config::ConfigLoader;
use fulcrum::infrastructure::logging;
use fulcrum::infrastructure::persistence::SqliteActivityStore;
use fulcrum::services::lifecycle::{FactoryTable, LifecycleManager};
use fulcrum::services::registry::CandidateRegistry;
use fulcrum::services::security::FactoryPolicy;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = ConfigLoader::load().context("failed to load configuration")?;
    let _logging_guard = logging::init(&settings.logging);

    let registry = Arc::new(CandidateRegistry::new());

    let policy = FactoryPolicy::new(settings.registry.factory_blocklist.clone(), settings.registry.factory_allowlist.clone());
    // No extension ships its factory in this binary; a deployment embeds
    // `fulcrum` as a library and registers its own factories into this
    // table before serving traffic. See `services::lifecycle` for why a
    // static table stands in for dynamic symbol resolution here.
    let factories = Arc::new(FactoryTable::new());
    let lifecycle = Arc::new(
        LifecycleManager::new(registry.clone(), factories, policy)
            .with_cleanup_timeout(Duration::from_millis(settings.lifecycle.swap_cleanup_timeout_ms))
            .with_init_timeout(Duration::from_millis(settings.lifecycle.swap_init_timeout_ms))
            .with_health_timeout(Duration::from_millis(settings.lifecycle.swap_health_timeout_ms)),
    );

    let activity_store = SqliteActivityStore::connect(&format!("sqlite:{}", settings.persistence.database_path))
        .await
        .context("failed to open activity store")?;

    let ctx = CliContext { registry, lifecycle, json: cli.json };

    match cli.command {
        Commands::Register { file } => commands::handle_register(&ctx, &file)?,
        Commands::Resolve { key, required_caps, optional_caps } => commands::handle_resolve(&ctx, &key.0, &required_caps, &optional_caps)?,
        Commands::Explain { key, required_caps, optional_caps } => commands::handle_explain(&ctx, &key.0, &required_caps, &optional_caps)?,
        Commands::ListActive => commands::handle_list_active(&ctx)?,
        Commands::ListShadowed { key, required_caps, optional_caps } => {
            commands::handle_list_shadowed(&ctx, &key.0, &required_caps, &optional_caps)?
        }
        Commands::Swap { key, provider, force } => commands::handle_swap(&ctx, &key.0, provider.as_deref(), force).await?,
        Commands::Pause { key } => {
            commands::handle_pause(&ctx, &key.0).await?;
            persist_activity(&activity_store, &key.0, Some(true), None).await?;
        }
        Commands::Resume { key } => {
            commands::handle_resume(&ctx, &key.0).await?;
            persist_activity(&activity_store, &key.0, Some(false), None).await?;
        }
        Commands::Drain { key } => {
            commands::handle_drain(&ctx, &key.0).await?;
            persist_activity(&activity_store, &key.0, None, Some(true)).await?;
        }
        Commands::Undrain { key } => {
            commands::handle_undrain(&ctx, &key.0).await?;
            persist_activity(&activity_store, &key.0, None, Some(false)).await?;
        }
        Commands::Health { key, probe } => commands::handle_health(&ctx, &key.0, probe).await?,
    }

    Ok(())
}

async fn persist_activity(store: &SqliteActivityStore, key: &str, paused: Option<bool>, draining: Option<bool>) -> Result<()> {
    use fulcrum::domain::ports::ActivityStore;
    use fulcrum::domain::{ActivityRecord, Domain, Key};
    use std::str::FromStr;

    let (domain, name) = key.split_once('.').context("expected 'domain.key'")?;
    let key = Key::new(Domain::from_str(domain).map_err(anyhow::Error::msg)?, name);

    let mut record = store.load(&key).await?.unwrap_or_else(|| ActivityRecord::clean(key.clone()));
    if let Some(paused) = paused {
        record.paused = paused;
    }
    if let Some(draining) = draining {
        record.draining = draining;
    }
    record.updated_at = chrono::Utc::now();
    store.save(&record).await?;
    Ok(())
}
