//! Fulcrum -- a component resolution and lifecycle control plane for
//! pluggable runtime extensions.
//!
//! Candidates (domain, key, provider) register from local code or signed
//! remote manifests; the resolver picks the active one per a fixed
//! precedence ladder; the lifecycle manager instantiates and hot-swaps
//! instances behind that resolution as it changes.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::{FulcrumError, FulcrumResult};
