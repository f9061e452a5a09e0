//! Configuration file loading
//!
//! ```toml
//! [solver]
//! time_limit_secs = 60
//! workers = 8
//! seed = 42          # optional; a clock seed is used otherwise
//! backend = "cp"     # or "branch-and-bound"
//!
//! [policy]
//! min_shifts = 3
//! rest_gap_cap = 1
//! ```
//!
//! Command-line flags override the file.

use anyhow::{Context, Result};
use rota_solver::{clock_seed, Backend, SchedulingPolicy, SolveOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// File looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG: &str = "rota.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverSection {
    pub time_limit_secs: Option<u64>,
    pub workers: Option<usize>,
    pub seed: Option<u64>,
    pub backend: Option<Backend>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub solver: SolverSection,
    pub policy: SchedulingPolicy,
}

/// Flags that take precedence over the file
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub time_limit_secs: Option<u64>,
    pub workers: Option<usize>,
    pub seed: Option<u64>,
    pub backend: Option<Backend>,
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Load `path`, or `rota.toml` from the working directory if it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG);
                if !fallback.is_file() {
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        debug!(path = %path.display(), "loaded configuration");
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn solve_options(&self, overrides: Overrides) -> SolveOptions {
        let defaults = SolveOptions::default();
        let time_limit = overrides
            .time_limit_secs
            .or(self.solver.time_limit_secs)
            .map_or(defaults.time_limit, Duration::from_secs);
        SolveOptions {
            time_limit,
            workers: overrides.workers.or(self.solver.workers).unwrap_or(defaults.workers),
            seed: overrides.seed.or(self.solver.seed).unwrap_or_else(clock_seed),
            policy: self.policy.clone(),
            backend: overrides.backend.or(self.solver.backend).unwrap_or(defaults.backend),
        }
    }
}
