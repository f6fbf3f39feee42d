//! Command handlers. Each takes the already-built services and prints
//! either JSON or a one-line-per-field plain rendering -- never a table.

use crate::domain::model::{Candidate, Domain, Key, Source};
use crate::services::lifecycle::LifecycleManager;
use crate::services::registry::CandidateRegistry;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

pub struct CliContext {
    pub registry: Arc<CandidateRegistry>,
    pub lifecycle: Arc<LifecycleManager>,
    pub json: bool,
}

fn parse_key(raw: &str) -> Result<Key> {
    let (domain, name) = raw.split_once('.').ok_or_else(|| anyhow!("expected 'domain.key', got '{raw}'"))?;
    let domain = Domain::from_str(domain).map_err(|e| anyhow!(e))?;
    Ok(Key::new(domain, name))
}

fn print_value(json: bool, value: &impl Serialize) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print_plain(&serde_json::to_value(value)?, "");
    }
    Ok(())
}

fn print_plain(value: &serde_json::Value, prefix: &str) {
    match value {
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                let field = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
                print_plain(v, &field);
            }
        }
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                print_plain(item, &format!("{prefix}[{i}]"));
            }
        }
        other => println!("{prefix}={other}"),
    }
}

#[derive(Debug, Deserialize)]
struct CandidateFile {
    candidates: Vec<CandidateSpec>,
}

#[derive(Debug, Deserialize)]
struct CandidateSpec {
    domain: Domain,
    key: String,
    provider: String,
    factory: String,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    stack_level: i32,
    #[serde(default)]
    capabilities: Vec<String>,
    version: Option<String>,
}

/// `register` reads a YAML candidate file -- the same document shape the
/// remote manifest's `entries` list uses, minus `uri`/`sha256` since a
/// locally-registered candidate's code is already present.
pub fn handle_register(ctx: &CliContext, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let parsed: CandidateFile = serde_yaml::from_str(&text).with_context(|| format!("parsing {}", file.display()))?;

    let mut registered = Vec::new();
    for spec in parsed.candidates {
        let candidate = Candidate {
            key: Key::new(spec.domain, spec.key),
            provider: spec.provider,
            factory: spec.factory,
            priority: spec.priority,
            stack_level: spec.stack_level,
            capabilities: spec.capabilities,
            version: spec.version,
            source: Source::Manual,
            registered_at: Utc::now(),
        };
        ctx.registry.register(candidate.clone())?;
        registered.push(format!("{}/{}", candidate.key, candidate.provider));
    }

    print_value(ctx.json, &serde_json::json!({ "registered": registered }))
}

pub fn handle_resolve(ctx: &CliContext, key: &str, required_caps: &[String], optional_caps: &[String]) -> Result<()> {
    let key = parse_key(key)?;
    let candidate = ctx.registry.resolve(&key, required_caps, optional_caps)?;
    print_value(ctx.json, &candidate)
}

pub fn handle_explain(ctx: &CliContext, key: &str, required_caps: &[String], optional_caps: &[String]) -> Result<()> {
    let key = parse_key(key)?;
    let trace = ctx.registry.explain(&key, required_caps, optional_caps);
    print_value(ctx.json, &trace)
}

pub fn handle_list_active(ctx: &CliContext) -> Result<()> {
    let candidates = ctx.registry.list_active(&[], &[]);
    print_value(ctx.json, &candidates)
}

pub fn handle_list_shadowed(ctx: &CliContext, key: &str, required_caps: &[String], optional_caps: &[String]) -> Result<()> {
    let key = parse_key(key)?;
    let shadowed = ctx.registry.list_shadowed(&key, required_caps, optional_caps);
    print_value(ctx.json, &shadowed)
}

pub async fn handle_swap(ctx: &CliContext, key: &str, provider: Option<&str>, force: bool) -> Result<()> {
    let key = parse_key(key)?;
    ctx.lifecycle.swap(&key, provider, force).await?;
    print_value(ctx.json, &serde_json::json!({ "swapped": key.to_string() }))
}

pub async fn handle_pause(ctx: &CliContext, key: &str) -> Result<()> {
    let key = parse_key(key)?;
    ctx.lifecycle.pause(&key).await?;
    print_value(ctx.json, &serde_json::json!({ "paused": key.to_string() }))
}

pub async fn handle_resume(ctx: &CliContext, key: &str) -> Result<()> {
    let key = parse_key(key)?;
    ctx.lifecycle.resume(&key).await?;
    print_value(ctx.json, &serde_json::json!({ "resumed": key.to_string() }))
}

pub async fn handle_drain(ctx: &CliContext, key: &str) -> Result<()> {
    let key = parse_key(key)?;
    ctx.lifecycle.drain(&key).await?;
    print_value(ctx.json, &serde_json::json!({ "draining": key.to_string() }))
}

pub async fn handle_undrain(ctx: &CliContext, key: &str) -> Result<()> {
    let key = parse_key(key)?;
    ctx.lifecycle.resume(&key).await?;
    print_value(ctx.json, &serde_json::json!({ "undrained": key.to_string() }))
}

pub async fn handle_health(ctx: &CliContext, key: &str, probe: bool) -> Result<()> {
    let key = parse_key(key)?;
    let status = ctx.lifecycle.health(&key, probe).await?;
    print_value(ctx.json, &serde_json::json!({ "key": key.to_string(), "health": format!("{status:?}") }))
}
