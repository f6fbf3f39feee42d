//! Operator CLI for the control plane: a thin layer over
//! `CandidateRegistry`, `LifecycleManager`, and `ManifestLoader`. No
//! tables, no color, no progress bars -- `--json` or one line per field.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fulcrum")]
#[command(about = "Component resolution and lifecycle control plane", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format (default is one line per field)
    #[arg(long, global = true)]
    pub json: bool,
}

/// `domain.key`, e.g. `adapter.cache`.
#[derive(Clone, Debug)]
pub struct KeyArg(pub String);

impl std::str::FromStr for KeyArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.split_once('.').is_some() {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("expected 'domain.key', got '{s}'"))
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register candidates from a local YAML candidate file.
    Register {
        /// Path to a YAML file listing one or more candidates.
        file: PathBuf,
    },

    /// Resolve the active candidate for a key.
    Resolve {
        key: KeyArg,
        /// Capability tags that eliminate any candidate missing one.
        #[arg(long, value_delimiter = ',')]
        required_caps: Vec<String>,
        /// Capability tags that break ties in favor of more matches.
        #[arg(long, value_delimiter = ',')]
        optional_caps: Vec<String>,
    },

    /// Show the full precedence-ladder trace for a key.
    Explain {
        key: KeyArg,
        #[arg(long, value_delimiter = ',')]
        required_caps: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        optional_caps: Vec<String>,
    },

    /// List the active candidate for every known key.
    ListActive,

    /// List candidates shadowed by the active one for a key.
    ListShadowed {
        key: KeyArg,
        #[arg(long, value_delimiter = ',')]
        required_caps: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        optional_caps: Vec<String>,
    },

    /// Hot swap a key to its currently-resolved candidate, or to a specific
    /// provider. `--force` bypasses the no-op short-circuit and skips
    /// rollback on a failed init/health check.
    Swap {
        key: KeyArg,
        /// Swap to this specific provider instead of re-resolving.
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        force: bool,
    },

    /// Pause the live instance for a key.
    Pause { key: KeyArg },

    /// Resume a paused live instance for a key.
    Resume { key: KeyArg },

    /// Begin draining the live instance for a key.
    Drain { key: KeyArg },

    /// Clear a key's drain state.
    Undrain { key: KeyArg },

    /// Report the live health of a key's instance.
    Health {
        key: KeyArg,
        /// Actively probe rather than returning the last known status.
        #[arg(long)]
        probe: bool,
    },
}
