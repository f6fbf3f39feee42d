//! Precedence ladder scenarios: priority, stack-level tie break, and the
//! lexicographic provider-name last resort.

use chrono::{Duration, Utc};
use fulcrum::domain::{Candidate, Domain, Key, Source};
use fulcrum::services::registry::CandidateRegistry;

fn candidate(provider: &str, priority: i32, stack_level: i32, offset_secs: i64) -> Candidate {
    Candidate {
        key: Key::new(Domain::Adapter, "cache"),
        provider: provider.into(),
        factory: "adapters.x:make".into(),
        priority,
        stack_level,
        capabilities: vec![],
        version: None,
        source: Source::Manual,
        registered_at: Utc::now() + Duration::seconds(offset_secs),
    }
}

#[test]
fn higher_priority_candidate_wins_resolution() {
    let registry = CandidateRegistry::new();
    registry.register(candidate("slow", 1, 0, 0)).unwrap();
    registry.register(candidate("fast", 50, 0, 1)).unwrap();

    let winner = registry.resolve(&Key::new(Domain::Adapter, "cache"), &[], &[]).unwrap();
    assert_eq!(winner.provider, "fast");
}

#[test]
fn stack_level_breaks_a_priority_tie() {
    let registry = CandidateRegistry::new();
    registry.register(candidate("base", 10, 1, 0)).unwrap();
    registry.register(candidate("overlay", 10, 9, 1)).unwrap();

    let winner = registry.resolve(&Key::new(Domain::Adapter, "cache"), &[], &[]).unwrap();
    assert_eq!(winner.provider, "overlay");
}

#[test]
fn lexicographic_name_is_the_final_deterministic_tie_break() {
    let registry = CandidateRegistry::new();
    let tied_at = Utc::now();

    let mut zeta = candidate("zeta", 5, 5, 0);
    zeta.registered_at = tied_at;
    let mut alpha = candidate("alpha", 5, 5, 0);
    alpha.registered_at = tied_at;

    registry.register(zeta).unwrap();
    registry.register(alpha).unwrap();

    let winner = registry.resolve(&Key::new(Domain::Adapter, "cache"), &[], &[]).unwrap();
    assert_eq!(winner.provider, "alpha");
}

#[test]
fn optional_capability_score_outranks_priority() {
    let registry = CandidateRegistry::new();
    let key = Key::new(Domain::Adapter, "cache");

    let mut high_priority_no_caps = candidate("generic", 100, 0, 0);
    high_priority_no_caps.capabilities = vec![];
    registry.register(high_priority_no_caps).unwrap();

    let mut low_priority_with_caps = candidate("specialized", 1, 0, 1);
    low_priority_with_caps.capabilities = vec!["tls".into()];
    registry.register(low_priority_with_caps).unwrap();

    let winner = registry.resolve(&key, &[], &["tls".to_string()]).unwrap();
    assert_eq!(winner.provider, "specialized");
}

#[test]
fn required_capability_filters_out_ineligible_candidates() {
    let registry = CandidateRegistry::new();
    let key = Key::new(Domain::Adapter, "cache");

    let mut high_priority_no_caps = candidate("generic", 100, 0, 0);
    high_priority_no_caps.capabilities = vec![];
    registry.register(high_priority_no_caps).unwrap();

    let required = vec!["tls".to_string()];
    let miss = registry.resolve(&key, &required, &[]);
    assert!(miss.is_err());

    let mut low_priority_with_caps = candidate("specialized", 1, 0, 1);
    low_priority_with_caps.capabilities = vec!["tls".into()];
    registry.register(low_priority_with_caps).unwrap();

    let winner = registry.resolve(&key, &required, &[]).unwrap();
    assert_eq!(winner.provider, "specialized");
}

#[test]
fn explain_trace_names_the_winner_and_walks_the_ladder() {
    let registry = CandidateRegistry::new();
    let key = Key::new(Domain::Adapter, "cache");
    registry.register(candidate("a", 1, 0, 0)).unwrap();
    registry.register(candidate("b", 5, 0, 1)).unwrap();

    let trace = registry.explain(&key, &[], &[]);
    assert_eq!(trace.winner.as_deref(), Some("b"));
    assert!(!trace.steps.is_empty());
}
