//! Remote manifest loader.
//!
//! Pipeline: fetch -> canonicalize -> verify signature -> validate entries
//! -> fetch artifacts into the content-addressed cache -> register
//! candidates. Each network step goes through a per-source circuit
//! breaker with bounded retry/backoff; a source that is down does not
//! block the others, and a manifest that fails integrity checks is
//! dropped in its entirety rather than partially registered.

use crate::domain::model::{Candidate, Key, Manifest, ManifestEntry, Source};
use crate::domain::ports::manifest_source::{FetchError, ManifestSource};
use crate::infrastructure::cache::artifact_cache::{ArtifactCache, CacheError};
use crate::infrastructure::signing::ed25519::{SignatureError, TrustedSigners};
use crate::services::circuit_breaker::{CircuitBreakerService, CircuitScope};
use crate::services::registry::{CandidateRegistry, RegistryError};
use crate::services::security::{self, SecurityError};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to fetch manifest from '{source_id}': {reason}")]
    Fetch { source_id: String, reason: String },

    #[error("manifest source circuit open for '{0}'")]
    CircuitOpen(String),

    #[error("failed to parse manifest: {0}")]
    Parse(String),

    #[error("signature verification failed: {0}")]
    Integrity(#[from] SignatureError),

    #[error("artifact digest mismatch for entry '{0}'")]
    DigestMismatch(String),

    #[error(transparent)]
    Invalid(#[from] SecurityError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A manifest document re-serialized through a `BTreeMap`, which sorts its
/// keys by construction -- this is the canonicalization step §6 requires
/// before a signature is computed or checked.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            serde_json::to_value(sorted).expect("BTreeMap<String, Value> always serializes")
        }
        serde_json::Value::Array(items) => serde_json::Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn canonical_bytes_for_signing(manifest_json: &serde_json::Value) -> Vec<u8> {
    let mut unsigned = manifest_json.clone();
    if let serde_json::Value::Object(map) = &mut unsigned {
        map.remove("signature");
    }
    let canonical = canonicalize(&unsigned);
    serde_json::to_vec(&canonical).expect("canonical value always serializes")
}

pub struct ManifestLoader {
    sources: Vec<Arc<dyn ManifestSource>>,
    trusted_signers: TrustedSigners,
    cache: ArtifactCache,
    circuit_breaker: Arc<CircuitBreakerService>,
    http: reqwest::Client,
    registry: Arc<CandidateRegistry>,
    policy: security::FactoryPolicy,
    last_good: tokio::sync::Mutex<std::collections::HashMap<String, Manifest>>,
}

impl ManifestLoader {
    pub fn new(
        sources: Vec<Arc<dyn ManifestSource>>,
        trusted_signers: TrustedSigners,
        cache: ArtifactCache,
        circuit_breaker: Arc<CircuitBreakerService>,
        registry: Arc<CandidateRegistry>,
        policy: security::FactoryPolicy,
    ) -> Self {
        Self {
            sources,
            trusted_signers,
            cache,
            circuit_breaker,
            http: reqwest::Client::new(),
            registry,
            policy,
            last_good: tokio::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Poll every source once, registering any candidates from manifests
    /// that pass integrity and entry validation. A source whose fetch
    /// fails (network error, circuit open) degrades to the last manifest
    /// successfully loaded from it, if any, rather than failing the whole
    /// poll.
    pub async fn load_all(&self) -> Vec<(String, Result<usize, ManifestError>)> {
        let mut results = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let outcome = self.load_one(source.as_ref()).await;
            results.push((source.id().to_string(), outcome));
        }
        results
    }

    async fn load_one(&self, source: &dyn ManifestSource) -> Result<usize, ManifestError> {
        let scope = CircuitScope::source(source.id());
        if !self.circuit_breaker.check(scope.clone()).await.is_allowed() {
            warn!(source = source.id(), "circuit open, using cached manifest if any");
            return self.register_cached(source.id()).await;
        }

        let fetched = self.fetch_with_retry(source).await;
        let manifest = match fetched {
            Ok(Some(bytes)) => match self.parse_and_verify(&bytes) {
                Ok(manifest) => {
                    self.circuit_breaker.record_success(scope).await;
                    let mut cache = self.last_good.lock().await;
                    cache.insert(source.id().to_string(), manifest.clone());
                    manifest
                }
                Err(err) => {
                    self.circuit_breaker.record_failure(scope, err.to_string()).await;
                    return Err(err);
                }
            },
            Ok(None) => return self.register_cached(source.id()).await,
            Err(err) => {
                self.circuit_breaker.record_failure(scope, err.to_string()).await;
                return self.register_cached(source.id()).await.or(Err(err));
            }
        };

        self.register_entries(&manifest).await
    }

    async fn register_cached(&self, source_id: &str) -> Result<usize, ManifestError> {
        let cache = self.last_good.lock().await;
        match cache.get(source_id) {
            Some(manifest) => self.register_entries(manifest).await,
            None => Err(ManifestError::CircuitOpen(source_id.to_string())),
        }
    }

    async fn fetch_with_retry(&self, source: &dyn ManifestSource) -> Result<Option<Vec<u8>>, ManifestError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(5),
            max_elapsed_time: Some(Duration::from_secs(15)),
            ..Default::default()
        };

        loop {
            match source.fetch(None).await {
                Ok(Some(fetched)) => return Ok(Some(fetched.bytes)),
                Ok(None) => return Ok(None),
                Err(FetchError::Timeout) | Err(FetchError::Unreachable(_)) => {
                    match backoff.next_backoff() {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => {
                            return Err(ManifestError::Fetch { source_id: source.id().to_string(), reason: "retries exhausted".into() })
                        }
                    }
                }
                Err(FetchError::Status(reason)) => {
                    return Err(ManifestError::Fetch { source_id: source.id().to_string(), reason })
                }
            }
        }
    }

    fn parse_and_verify(&self, bytes: &[u8]) -> Result<Manifest, ManifestError> {
        let value: serde_json::Value = serde_yaml::from_slice(bytes)
            .or_else(|_| serde_json::from_slice(bytes))
            .map_err(|e| ManifestError::Parse(e.to_string()))?;
        let manifest: Manifest = serde_json::from_value(value.clone()).map_err(|e| ManifestError::Parse(e.to_string()))?;

        let signing_bytes = canonical_bytes_for_signing(&value);
        self.trusted_signers.verify(&manifest.signer, &signing_bytes, &manifest.signature)?;

        Ok(manifest)
    }

    async fn register_entries(&self, manifest: &Manifest) -> Result<usize, ManifestError> {
        let mut registered = 0;
        for entry in &manifest.entries {
            match self.register_one(entry).await {
                Ok(()) => registered += 1,
                Err(err) => warn!(entry = %entry.key, error = %err, "skipping invalid manifest entry"),
            }
        }
        info!(source = %manifest.source, registered, total = manifest.entries.len(), "manifest load complete");
        Ok(registered)
    }

    async fn register_one(&self, entry: &ManifestEntry) -> Result<(), ManifestError> {
        security::validate_identity(&entry.key)?;
        security::validate_identity(&entry.provider)?;
        security::validate_priority(entry.priority)?;
        security::validate_stack_level(entry.stack_level)?;
        let factory_ref = security::parse_factory(&entry.factory)?;
        self.policy.check(&factory_ref)?;

        if let (Some(uri), Some(sha256)) = (&entry.uri, &entry.sha256) {
            security::reject_path_traversal(uri)?;
            let bytes = self.http.get(uri).send().await.map_err(|e| ManifestError::Fetch { source_id: uri.clone(), reason: e.to_string() })?
                .bytes()
                .await
                .map_err(|e| ManifestError::Fetch { source_id: uri.clone(), reason: e.to_string() })?;
            self.cache.store_verified(&bytes, sha256).map_err(|_| ManifestError::DigestMismatch(entry.key.clone()))?;
        }

        let candidate = Candidate {
            key: Key::new(entry.domain, entry.key.clone()),
            provider: entry.provider.clone(),
            factory: entry.factory.clone(),
            priority: entry.priority,
            stack_level: entry.stack_level,
            capabilities: entry.capabilities.clone(),
            version: entry.version.clone(),
            source: Source::RemoteManifest,
            registered_at: Utc::now(),
        };
        self.registry.register(candidate)?;
        Ok(())
    }
}
