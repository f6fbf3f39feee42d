//! Core data model: domains, candidates, resolution entries, and activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The five extension points a candidate can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Adapter,
    Service,
    Task,
    Event,
    Workflow,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adapter => "adapter",
            Self::Service => "service",
            Self::Task => "task",
            Self::Event => "event",
            Self::Workflow => "workflow",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adapter" => Ok(Self::Adapter),
            "service" => Ok(Self::Service),
            "task" => Ok(Self::Task),
            "event" => Ok(Self::Event),
            "workflow" => Ok(Self::Workflow),
            other => Err(format!("unknown domain: {other}")),
        }
    }
}

/// A logical key within a domain, e.g. `(adapter, "cache")`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    pub domain: Domain,
    pub name: String,
}

impl Key {
    pub fn new(domain: Domain, name: impl Into<String>) -> Self {
        Self { domain, name: name.into() }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.name)
    }
}

/// Where a candidate was registered from. Part of a candidate's replacement
/// identity alongside `(domain, key, provider)`: two candidates from
/// different sources coexist as distinct registry entries even if they
/// share a provider name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Compiled into the binary, registered at startup.
    LocalPkg,
    /// Loaded from a remote, signed manifest.
    RemoteManifest,
    /// Registered by an entry-point/plugin discovery mechanism.
    EntryPoint,
    /// Registered directly through the operator CLI or API.
    Manual,
}

/// Candidate-supplied capability tags, used only as a precedence tie-breaker.
pub type Capabilities = Vec<String>;

/// A registered implementation competing to be the active instance for a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub key: Key,
    /// Unique provider name within `key` (e.g. "redis", "stripe").
    pub provider: String,
    /// `module:symbol` reference to the factory that builds an instance.
    pub factory: String,
    /// Higher wins. Bounded per §6 (-1000..=1000).
    pub priority: i32,
    /// Higher wins on a priority tie. Bounded per §6 (-100..=100).
    pub stack_level: i32,
    pub capabilities: Capabilities,
    pub version: Option<String>,
    pub source: Source,
    pub registered_at: DateTime<Utc>,
}

impl Candidate {
    /// A candidate is eligible only if it declares every tag in `required`.
    /// An empty `required` is trivially satisfied by every candidate.
    pub fn is_eligible(&self, required: &[String]) -> bool {
        required.iter().all(|cap| self.capabilities.iter().any(|c| c == cap))
    }

    /// Count of `optional` tags this candidate declares, used as the
    /// capability-score rung of the precedence ladder: more matches wins.
    pub fn optional_match_count(&self, optional: &[String]) -> usize {
        optional
            .iter()
            .filter(|cap| self.capabilities.iter().any(|c| c == *cap))
            .count()
    }
}

/// A registry slot: every candidate registered for a key, plus any explicit
/// override pinning one provider regardless of the precedence ladder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub candidates: Vec<Candidate>,
    pub override_provider: Option<String>,
}

/// Runtime state of a live instance, per §3 invariant 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninit,
    Initializing,
    Ready,
    Paused,
    Draining,
    Cleanup,
    Failed,
}

impl LifecycleState {
    pub fn is_terminal_for_swap(&self) -> bool {
        matches!(self, Self::Ready | Self::Paused | Self::Draining | Self::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninit => "uninit",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Paused => "paused",
            Self::Draining => "draining",
            Self::Cleanup => "cleanup",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The activity record persisted across restarts: pause/drain intent survives
/// a process restart even though the live instance does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub key: Key,
    pub paused: bool,
    pub draining: bool,
    pub note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn clean(key: Key) -> Self {
        Self { key, paused: false, draining: false, note: None, updated_at: Utc::now() }
    }
}

/// One step of the precedence ladder, recorded for `explain`.
#[derive(Debug, Clone, Serialize)]
pub struct ExplainStep {
    pub rule: &'static str,
    pub candidate: Option<String>,
    pub detail: String,
}

/// Full trace of how a key was (or was not) resolved, for `services::registry::explain`.
#[derive(Debug, Clone, Serialize)]
pub struct ExplainTrace {
    pub key: Key,
    pub steps: Vec<ExplainStep>,
    pub winner: Option<String>,
}

/// A decoded, validated manifest entry, one step away from becoming a
/// `Candidate` once its artifact (if any) is staged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub domain: Domain,
    pub key: String,
    pub provider: String,
    pub factory: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub stack_level: i32,
    #[serde(default)]
    pub capabilities: Capabilities,
    pub version: Option<String>,
    pub uri: Option<String>,
    pub sha256: Option<String>,
}

/// A parsed remote manifest document, pre-canonicalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub source: String,
    #[serde(default)]
    pub profile: ManifestProfile,
    pub entries: Vec<ManifestEntry>,
    pub signature: String,
    pub signer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestProfile {
    #[serde(default)]
    pub disable_watch: bool,
    #[serde(default)]
    pub inline: bool,
}

/// Canonical JSON value used to produce the byte form a manifest's signature
/// covers: object keys are kept in a `BTreeMap`, which sorts by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<CanonicalValue>),
    Object(BTreeMap<String, CanonicalValue>),
}
