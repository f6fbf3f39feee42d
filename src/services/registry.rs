//! Candidate registry and resolver.
//!
//! Registration holds a write lock just long enough to mutate the
//! `HashMap` before publishing a fresh immutable snapshot through an
//! `ArcSwap`; every `resolve`/`list_*` call is then a lock-free read of
//! that snapshot. This is the copy-on-write alternative `spec.md` §5
//! explicitly allows in place of a plain `RwLock` over the whole table.

use crate::domain::model::{Candidate, ExplainStep, ExplainTrace, Key, RegistryEntry};
use crate::services::security::{self, SecurityError};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error(transparent)]
    Invalid(#[from] SecurityError),

    #[error("no candidate registered for {0}")]
    ResolutionMiss(Key),

    #[error("override provider '{0}' is not registered for {1}")]
    UnknownOverrideProvider(String, Key),
}

#[derive(Debug, Default, Clone)]
struct Table {
    entries: HashMap<Key, RegistryEntry>,
}

/// Stores every registered candidate and resolves the active one per key.
pub struct CandidateRegistry {
    snapshot: ArcSwap<Table>,
}

impl Default for CandidateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateRegistry {
    pub fn new() -> Self {
        Self { snapshot: ArcSwap::from_pointee(Table::default()) }
    }

    /// Build a registry pre-loaded with candidates, e.g. from a manifest
    /// load at startup. Mirrors `AdapterRegistry::from_loaded`.
    pub fn from_candidates(candidates: Vec<Candidate>) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for candidate in candidates {
            registry.register(candidate)?;
        }
        Ok(registry)
    }

    pub fn register(&self, candidate: Candidate) -> Result<(), RegistryError> {
        security::validate_identity(&candidate.key.name)?;
        security::validate_identity(&candidate.provider)?;
        security::validate_priority(candidate.priority)?;
        security::validate_stack_level(candidate.stack_level)?;
        security::parse_factory(&candidate.factory)?;

        let mut table = (**self.snapshot.load()).clone();
        let entry = table.entries.entry(candidate.key.clone()).or_default();
        // Identity for replacement is (domain, key, provider, source): a
        // remote-manifest candidate and a locally-registered candidate with
        // the same provider name coexist as distinct entries.
        entry.candidates.retain(|c| !(c.provider == candidate.provider && c.source == candidate.source));
        entry.candidates.push(candidate);
        self.snapshot.store(Arc::new(table));
        Ok(())
    }

    pub fn unregister(&self, key: &Key, provider: &str, source: crate::domain::model::Source) {
        let mut table = (**self.snapshot.load()).clone();
        if let Some(entry) = table.entries.get_mut(key) {
            entry.candidates.retain(|c| !(c.provider == provider && c.source == source));
            if entry.override_provider.as_deref() == Some(provider) {
                entry.override_provider = None;
            }
        }
        self.snapshot.store(Arc::new(table));
    }

    /// Pin a provider regardless of the precedence ladder (rule 1). Passing
    /// `None` clears the pin.
    pub fn set_override(&self, key: &Key, provider: Option<String>) -> Result<(), RegistryError> {
        let mut table = (**self.snapshot.load()).clone();
        let entry = table.entries.entry(key.clone()).or_default();
        if let Some(ref p) = provider {
            if !entry.candidates.iter().any(|c| &c.provider == p) {
                return Err(RegistryError::UnknownOverrideProvider(p.clone(), key.clone()));
            }
        }
        entry.override_provider = provider;
        self.snapshot.store(Arc::new(table));
        Ok(())
    }

    pub fn candidates_for(&self, key: &Key) -> Vec<Candidate> {
        self.snapshot
            .load()
            .entries
            .get(key)
            .map(|e| e.candidates.clone())
            .unwrap_or_default()
    }

    /// Resolve the active candidate for `key`, applying the precedence
    /// ladder: explicit override, then capability score, priority,
    /// stack_level, registration recency (newest wins), and finally
    /// lexicographic provider name as a fully deterministic last resort.
    ///
    /// `required_caps` is a hard eligibility filter: a candidate missing
    /// any required tag is excluded from consideration entirely, not
    /// merely ranked lower. `optional_caps` feeds the capability-score
    /// rung of the ladder instead.
    ///
    /// Paused and draining candidates are still eligible: pause/drain are
    /// live-instance states tracked separately, not a resolution filter.
    pub fn resolve(&self, key: &Key, required_caps: &[String], optional_caps: &[String]) -> Result<Candidate, RegistryError> {
        let snapshot = self.snapshot.load();
        let entry = snapshot.entries.get(key).ok_or_else(|| RegistryError::ResolutionMiss(key.clone()))?;

        if let Some(ref pinned) = entry.override_provider {
            if let Some(c) = entry.candidates.iter().find(|c| &c.provider == pinned) {
                return Ok(c.clone());
            }
        }

        let eligible = eligible_candidates(&entry.candidates, required_caps);
        best_candidate(&eligible, optional_caps)
            .cloned()
            .ok_or_else(|| RegistryError::ResolutionMiss(key.clone()))
    }

    pub fn list_active(&self, required_caps: &[String], optional_caps: &[String]) -> Vec<Candidate> {
        let snapshot = self.snapshot.load();
        snapshot
            .entries
            .iter()
            .filter_map(|(_, entry)| {
                if let Some(ref pinned) = entry.override_provider {
                    return entry.candidates.iter().find(|c| &c.provider == pinned).cloned();
                }
                let eligible = eligible_candidates(&entry.candidates, required_caps);
                best_candidate(&eligible, optional_caps).cloned()
            })
            .collect()
    }

    pub fn list_shadowed(&self, key: &Key, required_caps: &[String], optional_caps: &[String]) -> Vec<Candidate> {
        let active = self.resolve(key, required_caps, optional_caps).ok();
        self.candidates_for(key)
            .into_iter()
            .filter(|c| Some(c.provider.clone()) != active.as_ref().map(|a| a.provider.clone()))
            .collect()
    }

    /// Reconstruct every step the ladder took, for operator diagnostics.
    pub fn explain(&self, key: &Key, required_caps: &[String], optional_caps: &[String]) -> ExplainTrace {
        let snapshot = self.snapshot.load();
        let mut steps = Vec::new();
        let Some(entry) = snapshot.entries.get(key) else {
            steps.push(ExplainStep { rule: "lookup", candidate: None, detail: "no candidates registered".into() });
            return ExplainTrace { key: key.clone(), steps, winner: None };
        };

        if let Some(ref pinned) = entry.override_provider {
            let hit = entry.candidates.iter().find(|c| &c.provider == pinned);
            steps.push(ExplainStep {
                rule: "explicit_override",
                candidate: hit.map(|c| c.provider.clone()),
                detail: format!("override pins provider '{pinned}'"),
            });
            if let Some(c) = hit {
                return ExplainTrace { key: key.clone(), steps, winner: Some(c.provider.clone()) };
            }
            steps.push(ExplainStep {
                rule: "explicit_override",
                candidate: None,
                detail: "pinned provider not registered, falling through to ladder".into(),
            });
        }

        let eligible = eligible_candidates(&entry.candidates, required_caps);
        for candidate in &entry.candidates {
            if !candidate.is_eligible(required_caps) {
                steps.push(ExplainStep {
                    rule: "required_caps",
                    candidate: Some(candidate.provider.clone()),
                    detail: format!("missing a required capability out of {required_caps:?}"),
                });
            }
        }
        if eligible.is_empty() {
            return ExplainTrace { key: key.clone(), steps, winner: None };
        }

        let ranked = rank(&eligible, optional_caps);
        for (candidate, score) in &ranked {
            steps.push(ExplainStep {
                rule: "ladder",
                candidate: Some(candidate.provider.clone()),
                detail: format!("{score:?}"),
            });
        }
        let winner = ranked.first().map(|(c, _)| c.provider.clone());
        ExplainTrace { key: key.clone(), steps, winner }
    }
}

fn eligible_candidates<'a>(candidates: &'a [Candidate], required_caps: &[String]) -> Vec<&'a Candidate> {
    candidates.iter().filter(|c| c.is_eligible(required_caps)).collect()
}

/// Sort key for the precedence ladder: larger tuples win, compared
/// lexicographically left to right. Provider name is reversed so that
/// sorting descending still yields ascending (A before B) as the final
/// tie-break.
type RankKey = (usize, i32, i32, i64, std::cmp::Reverse<String>);

fn rank_key(candidate: &Candidate, optional_caps: &[String]) -> RankKey {
    (
        candidate.optional_match_count(optional_caps),
        candidate.priority,
        candidate.stack_level,
        candidate.registered_at.timestamp_nanos_opt().unwrap_or(i64::MIN),
        std::cmp::Reverse(candidate.provider.clone()),
    )
}

fn rank<'a>(candidates: &[&'a Candidate], optional_caps: &[String]) -> Vec<(&'a Candidate, RankKey)> {
    let mut ranked: Vec<_> = candidates.iter().map(|&c| (c, rank_key(c, optional_caps))).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

fn best_candidate<'a>(candidates: &[&'a Candidate], optional_caps: &[String]) -> Option<&'a Candidate> {
    candidates.iter().copied().max_by_key(|c| rank_key(c, optional_caps))
}
