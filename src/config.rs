//! Solver configuration.
use crate::assembly::form::LevelCoupling;
use eyre::eyre;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolverKind {
    /// Jacobi-preconditioned conjugate gradient.
    #[default]
    Cg,
    /// Sparse Cholesky factorization.
    Cholesky,
}

/// Parameters of a space-time solve. Missing fields take their default values when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub end_time: f64,
    /// The coarsest temporal mesh has `2^min_temporal_level` elements.
    pub min_temporal_level: u32,
    /// Number of temporal levels. The spatial hierarchy must have at least as many levels
    /// as the level pairing refers to.
    pub num_levels: usize,
    /// Polynomial degree of the spatial and temporal bases. Only 1 is supported.
    pub deg: usize,
    pub level_coupling: LevelCoupling,
    pub linear_solver: LinearSolverKind,
    pub cg_tolerance: f64,
    pub cg_max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            end_time: 1.0,
            min_temporal_level: 1,
            num_levels: 1,
            deg: 1,
            level_coupling: LevelCoupling::default(),
            linear_solver: LinearSolverKind::default(),
            cg_tolerance: 1e-10,
            cg_max_iterations: 10_000,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.deg != 1 {
            return Err(eyre!("Only polynomial degree 1 is supported, got {}", self.deg));
        }
        if self.num_levels == 0 {
            return Err(eyre!("At least one level is required"));
        }
        if !(self.end_time > 0.0) {
            return Err(eyre!("End time must be positive, got {}", self.end_time));
        }
        if !(self.cg_tolerance > 0.0) {
            return Err(eyre!("CG tolerance must be positive, got {}", self.cg_tolerance));
        }
        Ok(())
    }
}
