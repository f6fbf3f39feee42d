//! Domain layer: the types and contracts the control plane operates on.
//!
//! Pure data and traits, no infrastructure concerns.

pub mod errors;
pub mod model;
pub mod ports;

pub use errors::{DatabaseError, FulcrumError, FulcrumResult};
pub use model::{
    ActivityRecord, Candidate, CanonicalValue, Domain, ExplainStep, ExplainTrace, Key,
    LifecycleState, Manifest, ManifestEntry, ManifestProfile, RegistryEntry, Source,
};
