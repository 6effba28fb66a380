//! Solver configuration
//!
//! All settings have defaults, so a JSON file only needs to list what it
//! changes:
//!
//! ```json
//! {
//!   "mode": "mg_preconditioned",
//!   "krylov": "bi_cgstab",
//!   "cycle": "w_cycle",
//!   "relaxation": ["line_yz", "line_xz", "line_xy"],
//!   "tolerance": 1e-7
//! }
//! ```

use crate::error::{Result, SolverError};
use crate::multigrid::{Coarsening, CycleType, DEFAULT_COARSE_DIRECT_LIMIT, Relaxation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How the linear system is solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMode {
    /// Multigrid iterations alone
    #[default]
    MgOnly,
    /// Krylov method without preconditioning
    KrylovOnly,
    /// Krylov method preconditioned by multigrid
    MgPreconditioned,
}

impl SolverMode {
    pub fn uses_multigrid(self) -> bool {
        !matches!(self, SolverMode::KrylovOnly)
    }
}

/// Krylov method for the Krylov modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KrylovMethod {
    #[default]
    BiCgstab,
    Cgs,
    /// Restarted GMRES with the given restart length
    Gmres { restart: usize },
}

/// Settings for [`crate::solve`] and [`crate::Multigrid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub mode: SolverMode,
    pub krylov: KrylovMethod,
    pub cycle: CycleType,
    /// Relaxation per MG iteration, cycled
    pub relaxation: Vec<Relaxation>,
    /// Coarsening per MG iteration, cycled
    pub semicoarsening: Vec<Coarsening>,
    /// Relative residual tolerance
    pub tolerance: f64,
    /// Maximum MG cycles or Krylov iterations
    pub max_iterations: usize,
    /// Smoothing sweeps on the initial guess before the first cycle
    pub nu_init: usize,
    pub nu_pre: usize,
    /// Sweeps on the coarsest level when it is not solved directly
    pub nu_coarse: usize,
    pub nu_post: usize,
    /// Smallest cell count an axis is coarsened to
    pub min_cells: usize,
    /// Cap on the number of levels
    pub max_levels: Option<usize>,
    /// MG fails as diverged once the residual exceeds this multiple of the
    /// initial residual
    pub divergence_factor: f64,
    /// Largest coarsest-level system factored directly
    pub coarse_direct_limit: usize,
    /// Log Krylov progress every N iterations (0 = quiet)
    pub log_interval: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            mode: SolverMode::MgOnly,
            krylov: KrylovMethod::BiCgstab,
            cycle: CycleType::FCycle,
            relaxation: vec![Relaxation::Point],
            semicoarsening: vec![Coarsening::All],
            tolerance: 1e-6,
            max_iterations: 50,
            nu_init: 0,
            nu_pre: 2,
            nu_coarse: 1,
            nu_post: 2,
            min_cells: 2,
            max_levels: None,
            divergence_factor: 10.0,
            coarse_direct_limit: DEFAULT_COARSE_DIRECT_LIMIT,
            log_interval: 0,
        }
    }
}

impl SolverConfig {
    /// Check ranges; every setting is validated before any work starts.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(SolverError::Configuration(msg));
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return fail(format!("tolerance must be positive, got {}", self.tolerance));
        }
        if self.max_iterations == 0 {
            return fail("max_iterations must be at least 1".into());
        }
        if self.relaxation.is_empty() {
            return fail("relaxation schedule is empty".into());
        }
        if self.semicoarsening.is_empty() {
            return fail("semicoarsening schedule is empty".into());
        }
        if self.min_cells < 2 {
            return fail(format!("min_cells must be at least 2, got {}", self.min_cells));
        }
        if self.max_levels == Some(0) {
            return fail("max_levels must be at least 1".into());
        }
        if !(self.divergence_factor.is_finite() && self.divergence_factor > 1.0) {
            return fail(format!(
                "divergence_factor must be greater than 1, got {}",
                self.divergence_factor
            ));
        }
        if let KrylovMethod::Gmres { restart: 0 } = self.krylov {
            return fail("GMRES restart length must be at least 1".into());
        }
        Ok(())
    }

    /// Parse from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SolverError::Configuration(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SolverError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    /// Save as pretty-printed JSON.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SolverError::Configuration(format!("cannot serialize config: {}", e)))?;
        fs::write(path, content).map_err(|e| {
            SolverError::Configuration(format!("cannot write {}: {}", path.display(), e))
        })
    }
}
