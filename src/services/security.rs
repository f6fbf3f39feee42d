//! Identity grammar, numeric bounds, and factory allow/block-listing.
//!
//! Every candidate admitted to the registry — whether registered directly
//! or produced by the manifest loader — passes through here first. Nothing
//! downstream re-checks these invariants.

use thiserror::Error;

/// Acceptable characters within one dot-separated segment of a `key` or
/// `provider`: ASCII letters (either case), digits, `-` and `_`. No `/`,
/// `\`, or whitespace in any segment -- this forecloses path traversal via
/// a key that is later used to build a cache or log file path.
const SEGMENT_CHARS: fn(char) -> bool = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';

pub const MIN_PRIORITY: i32 = -1000;
pub const MAX_PRIORITY: i32 = 1000;
pub const MIN_STACK_LEVEL: i32 = -100;
pub const MAX_STACK_LEVEL: i32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityError {
    #[error("invalid identity '{0}': must match [A-Za-z0-9_-]+([.][A-Za-z0-9_-]+)*, 1-64 characters")]
    InvalidIdentity(String),

    #[error("invalid factory reference '{0}': expected 'module:symbol'")]
    InvalidFactory(String),

    #[error("factory module '{0}' is block-listed")]
    FactoryBlocked(String),

    #[error("factory module '{0}' is not in the allow-list")]
    FactoryNotAllowed(String),

    #[error("priority {0} out of bounds [{MIN_PRIORITY}, {MAX_PRIORITY}]")]
    PriorityOutOfBounds(i32),

    #[error("stack_level {0} out of bounds [{MIN_STACK_LEVEL}, {MAX_STACK_LEVEL}]")]
    StackLevelOutOfBounds(i32),
}

/// Validates `key`/`provider` identity strings against the grammar in §6:
/// `[A-Za-z0-9_-]+([.][A-Za-z0-9_-]+)*`, i.e. one or more dot-separated
/// segments, each non-empty and drawn from `SEGMENT_CHARS`. This rejects
/// `..`, a leading or trailing dot, and empty segments by construction.
pub fn validate_identity(value: &str) -> Result<(), SecurityError> {
    let invalid = || SecurityError::InvalidIdentity(value.to_string());
    if value.is_empty() || value.len() > 64 {
        return Err(invalid());
    }
    for segment in value.split('.') {
        if segment.is_empty() || !segment.chars().all(SEGMENT_CHARS) {
            return Err(invalid());
        }
    }
    Ok(())
}

pub fn validate_priority(priority: i32) -> Result<(), SecurityError> {
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return Err(SecurityError::PriorityOutOfBounds(priority));
    }
    Ok(())
}

pub fn validate_stack_level(stack_level: i32) -> Result<(), SecurityError> {
    if !(MIN_STACK_LEVEL..=MAX_STACK_LEVEL).contains(&stack_level) {
        return Err(SecurityError::StackLevelOutOfBounds(stack_level));
    }
    Ok(())
}

/// A parsed `module:symbol` factory reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryRef {
    pub module: String,
    pub symbol: String,
}

pub fn parse_factory(value: &str) -> Result<FactoryRef, SecurityError> {
    let (module, symbol) = value
        .split_once(':')
        .ok_or_else(|| SecurityError::InvalidFactory(value.to_string()))?;
    if module.is_empty() || symbol.is_empty() {
        return Err(SecurityError::InvalidFactory(value.to_string()));
    }
    Ok(FactoryRef { module: module.to_string(), symbol: symbol.to_string() })
}

/// Module-prefix allow/block list, consulted before a factory is ever
/// resolved to a callable. A candidate whose factory fails this check is
/// never even instantiated, let alone swapped in.
#[derive(Debug, Clone, Default)]
pub struct FactoryPolicy {
    block_prefixes: Vec<String>,
    allow_prefixes: Option<Vec<String>>,
}

impl FactoryPolicy {
    pub fn new(block_prefixes: Vec<String>, allow_prefixes: Option<Vec<String>>) -> Self {
        Self { block_prefixes, allow_prefixes }
    }

    pub fn check(&self, factory: &FactoryRef) -> Result<(), SecurityError> {
        if let Some(blocked) = self.block_prefixes.iter().find(|p| factory.module.starts_with(p.as_str())) {
            return Err(SecurityError::FactoryBlocked(blocked.clone()));
        }
        if let Some(allowed) = &self.allow_prefixes {
            if !allowed.iter().any(|p| factory.module.starts_with(p.as_str())) {
                return Err(SecurityError::FactoryNotAllowed(factory.module.clone()));
            }
        }
        Ok(())
    }
}

/// Rejects a relative path that would escape its intended base directory
/// (used on manifest artifact `uri`s and cache paths alike).
pub fn reject_path_traversal(candidate: &str) -> Result<(), SecurityError> {
    if candidate.contains("..") || candidate.starts_with('/') || candidate.contains('\\') {
        return Err(SecurityError::InvalidIdentity(candidate.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_identity() {
        assert!(validate_identity("redis-cache_1").is_ok());
        assert!(validate_identity("Redis-Cache_1").is_ok());
        assert!(validate_identity("adapters.redis.primary").is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized_identity() {
        assert!(validate_identity("").is_err());
        assert!(validate_identity(&"a".repeat(65)).is_err());
    }

    #[test]
    fn rejects_path_characters_and_malformed_dot_segments_in_identity() {
        assert!(validate_identity("../etc").is_err());
        assert!(validate_identity("a/b").is_err());
        assert!(validate_identity("a..b").is_err());
        assert!(validate_identity(".leading").is_err());
        assert!(validate_identity("trailing.").is_err());
    }

    #[test]
    fn parses_well_formed_factory() {
        let f = parse_factory("adapters.redis:make_cache").unwrap();
        assert_eq!(f.module, "adapters.redis");
        assert_eq!(f.symbol, "make_cache");
    }

    #[test]
    fn rejects_factory_without_colon() {
        assert!(parse_factory("adapters.redis").is_err());
    }

    #[test]
    fn block_list_wins_over_allow_list() {
        let policy = FactoryPolicy::new(
            vec!["adapters.danger".into()],
            Some(vec!["adapters".into()]),
        );
        let blocked = parse_factory("adapters.danger:make").unwrap();
        assert!(policy.check(&blocked).is_err());
        let allowed = parse_factory("adapters.redis:make").unwrap();
        assert!(policy.check(&allowed).is_ok());
    }

    #[test]
    fn allow_list_rejects_unlisted_module() {
        let policy = FactoryPolicy::new(vec![], Some(vec!["adapters".into()]));
        let other = parse_factory("evil:make").unwrap();
        assert!(policy.check(&other).is_err());
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(validate_priority(-1000).is_ok());
        assert!(validate_priority(1000).is_ok());
        assert!(validate_priority(1001).is_err());
        assert!(validate_priority(-1001).is_err());
        assert!(validate_stack_level(-100).is_ok());
        assert!(validate_stack_level(100).is_ok());
        assert!(validate_stack_level(-101).is_err());
        assert!(validate_stack_level(101).is_err());
    }

    #[test]
    fn rejects_traversal_in_paths() {
        assert!(reject_path_traversal("../../etc/passwd").is_err());
        assert!(reject_path_traversal("/etc/passwd").is_err());
        assert!(reject_path_traversal("artifacts/redis.tar.gz").is_ok());
    }
}
