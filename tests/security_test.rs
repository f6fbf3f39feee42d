//! Identity grammar, numeric bounds, and factory allow/block-listing as
//! enforced at the registry boundary and by the policy gate the manifest
//! loader applies to remote entries.

use fulcrum::domain::{Candidate, Domain, Key, Source};
use fulcrum::services::registry::{CandidateRegistry, RegistryError};
use fulcrum::services::security::{self, FactoryPolicy, SecurityError};

fn candidate(key: &str, provider: &str, factory: &str, priority: i32, stack_level: i32) -> Candidate {
    Candidate {
        key: Key::new(Domain::Adapter, key),
        provider: provider.into(),
        factory: factory.into(),
        priority,
        stack_level,
        capabilities: vec![],
        version: None,
        source: Source::Manual,
        registered_at: chrono::Utc::now(),
    }
}

#[test]
fn registry_rejects_a_key_with_path_traversal_characters() {
    let registry = CandidateRegistry::new();
    let result = registry.register(candidate("../etc", "redis", "adapters.redis:make", 1, 0));
    assert!(matches!(result, Err(RegistryError::Invalid(SecurityError::InvalidIdentity(_)))));
}

#[test]
fn registry_rejects_a_provider_name_with_whitespace() {
    let registry = CandidateRegistry::new();
    assert!(registry.register(candidate("cache", "redis cluster", "adapters.redis:make", 1, 0)).is_err());
}

#[test]
fn registry_accepts_a_provider_name_with_uppercase() {
    let registry = CandidateRegistry::new();
    assert!(registry.register(candidate("cache", "Redis", "adapters.redis:make", 1, 0)).is_ok());
}

#[test]
fn registry_rejects_an_oversized_identity() {
    let registry = CandidateRegistry::new();
    let long_name = "a".repeat(65);
    let result = registry.register(candidate(&long_name, "redis", "adapters.redis:make", 1, 0));
    assert!(result.is_err());
}

#[test]
fn registry_rejects_priority_and_stack_level_out_of_bounds() {
    let registry = CandidateRegistry::new();
    assert!(registry.register(candidate("cache", "redis", "adapters.redis:make", 1001, 0)).is_err());
    assert!(registry.register(candidate("cache", "redis", "adapters.redis:make", -1001, 0)).is_err());
    assert!(registry.register(candidate("cache", "redis", "adapters.redis:make", 1, 101)).is_err());
    assert!(registry.register(candidate("cache", "redis", "adapters.redis:make", 1, -101)).is_err());
}

#[test]
fn registry_accepts_the_boundary_values() {
    let registry = CandidateRegistry::new();
    assert!(registry.register(candidate("cache", "redis", "adapters.redis:make", -1000, -100)).is_ok());
    assert!(registry.register(candidate("edge", "memcached", "adapters.memcached:make", 1000, 100)).is_ok());
}

#[test]
fn registry_rejects_a_malformed_factory_reference() {
    let registry = CandidateRegistry::new();
    assert!(registry.register(candidate("cache", "redis", "adapters.redis", 1, 0)).is_err());
    assert!(registry.register(candidate("cache", "redis", ":make", 1, 0)).is_err());
    assert!(registry.register(candidate("cache", "redis", "adapters.redis:", 1, 0)).is_err());
}

#[test]
fn factory_policy_blocks_a_prefixed_module_even_when_allow_listed() {
    let policy = FactoryPolicy::new(vec!["adapters.legacy".into()], Some(vec!["adapters".into()]));
    let blocked = security::parse_factory("adapters.legacy.redis:make").unwrap();
    assert!(policy.check(&blocked).is_err());
}

#[test]
fn factory_policy_rejects_anything_outside_an_active_allow_list() {
    let policy = FactoryPolicy::new(vec![], Some(vec!["adapters.trusted".into()]));
    let outside = security::parse_factory("adapters.untrusted:make").unwrap();
    assert!(policy.check(&outside).is_err());

    let inside = security::parse_factory("adapters.trusted.redis:make").unwrap();
    assert!(policy.check(&inside).is_ok());
}

#[test]
fn factory_policy_with_no_allow_list_admits_anything_not_blocked() {
    let policy = FactoryPolicy::new(vec!["adapters.banned".into()], None);
    let admitted = security::parse_factory("adapters.redis:make").unwrap();
    assert!(policy.check(&admitted).is_ok());
}

#[test]
fn path_traversal_is_rejected_in_all_its_forms() {
    assert!(security::reject_path_traversal("../secrets").is_err());
    assert!(security::reject_path_traversal("/etc/passwd").is_err());
    assert!(security::reject_path_traversal("a\\b").is_err());
    assert!(security::reject_path_traversal("artifacts/redis-1.2.3.tar.gz").is_ok());
}
