//! Linear solver backends and the end-to-end space-time solve.
use crate::assembly::system::SparseSystemAssembler;
use crate::assembly::temporal::uniform_temporal_hierarchy;
use crate::config::{LinearSolverKind, SolverConfig};
use crate::element::ElementConnectivity;
use crate::error::AssemblyError;
use crate::hierarchy::{NestedFeHierarchy, NestedMeshHierarchy};
use crate::problem::HeatProblem;
use crate::solution::SolutionHandler;
use eyre::{eyre, WrapErr};
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};
use sparse_heat_linalg::cg::{ConjugateGradient, JacobiPreconditioner, RelativeResidualCriterion};

/// Solves a sparse symmetric positive definite system.
pub trait LinearSolver {
    fn solve(&self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> eyre::Result<DVector<f64>>;
}

#[derive(Debug, Clone, Copy)]
pub struct ConjugateGradientSolver {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for ConjugateGradientSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 10_000,
        }
    }
}

impl LinearSolver for ConjugateGradientSolver {
    fn solve(&self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> eyre::Result<DVector<f64>> {
        let mut x = DVector::zeros(rhs.len());
        let output = ConjugateGradient::new()
            .with_operator(matrix)
            .with_preconditioner(JacobiPreconditioner::from_csr(matrix))
            .with_stopping_criterion(RelativeResidualCriterion::new(self.tolerance))
            .with_max_iter(self.max_iterations)
            .solve_with_guess(rhs, &mut x)
            .map_err(|err| eyre!("{}", err))?;
        debug!("CG finished after {} iterations", output.num_iterations);
        Ok(x)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CholeskySolver;

impl LinearSolver for CholeskySolver {
    fn solve(&self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> eyre::Result<DVector<f64>> {
        if matrix.nrows() != rhs.len() {
            return Err(eyre!(
                "Right-hand side of length {} does not match {}x{} matrix",
                rhs.len(),
                matrix.nrows(),
                matrix.ncols()
            ));
        }
        let cholesky = CscCholesky::factor(&CscMatrix::from(matrix)).map_err(|err| eyre!("{}", err))?;
        let b = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
        let x = cholesky.solve(&b);
        Ok(x.column(0).into_owned())
    }
}

/// Solves heat problems on a fixed spatial mesh hierarchy.
///
/// The temporal hierarchy is built from the configuration; temporal level `i` is paired with
/// spatial level `num_levels - 1 - i`, so the spatial hierarchy must have exactly `num_levels`
/// levels.
pub struct Solver<'a, const D: usize, C> {
    config: SolverConfig,
    spatial_meshes: &'a NestedMeshHierarchy<D, C>,
}

impl<'a, const D: usize, C> Solver<'a, D, C>
where
    C: ElementConnectivity<D>,
{
    pub fn new(config: SolverConfig, spatial_meshes: &'a NestedMeshHierarchy<D, C>) -> eyre::Result<Self> {
        config.validate().wrap_err("Invalid solver configuration")?;
        if spatial_meshes.num_levels() != config.num_levels {
            return Err(AssemblyError::hierarchy(format!(
                "{} temporal levels must be paired with as many spatial levels, got {}",
                config.num_levels,
                spatial_meshes.num_levels()
            ))
            .into());
        }
        Ok(Self { config, spatial_meshes })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn linear_solver(&self) -> Box<dyn LinearSolver> {
        match self.config.linear_solver {
            LinearSolverKind::Cg => Box::new(ConjugateGradientSolver {
                tolerance: self.config.cg_tolerance,
                max_iterations: self.config.cg_max_iterations,
            }),
            LinearSolverKind::Cholesky => Box::new(CholeskySolver),
        }
    }

    pub fn run<P: HeatProblem<D>>(&self, problem: &P) -> eyre::Result<SolutionHandler> {
        let config = &self.config;
        info!(
            "Building temporal hierarchy on [0, {}] with {} levels",
            config.end_time, config.num_levels
        );
        let temporal_meshes = uniform_temporal_hierarchy(config.end_time, config.min_temporal_level, config.num_levels)
            .wrap_err("Failed to build temporal hierarchy")?;
        let temporal_fe = NestedFeHierarchy::hierarchical(&temporal_meshes)?;
        let temperature_fe = NestedFeHierarchy::nodal(self.spatial_meshes, 1);
        let heat_flux_fe = NestedFeHierarchy::nodal(self.spatial_meshes, D);

        let mut assembler = SparseSystemAssembler::new(&temporal_fe, &temperature_fe, &heat_flux_fe, config.level_coupling)?;

        info!("Assembling medium-independent operators");
        assembler
            .assemble_system_medium_independent()
            .wrap_err("Failed to assemble medium-independent system")?;
        info!("Assembling medium-dependent operators");
        let mut matrix = assembler
            .assemble_system_medium_dependent(problem.medium())
            .wrap_err("Failed to assemble medium-dependent system")?;
        let mut rhs = assembler
            .assemble_rhs(problem)
            .wrap_err("Failed to assemble right-hand side")?;
        assembler.apply_bcs(&mut matrix, &mut rhs)?;

        info!(
            "Solving system with {} unknowns and {} non-zeros",
            matrix.nrows(),
            matrix.nnz()
        );
        let solution = self
            .linear_solver()
            .solve(&matrix, &rhs)
            .wrap_err("Linear solve failed")?;

        let mut handler = assembler.solution_handler()?;
        handler.store(&solution)?;
        Ok(handler)
    }
}
