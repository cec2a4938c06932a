//! The sparse space-time least-squares system.
//!
//! Unknowns are the temperature `u` (scalar P1 in space) and the heat flux `q` (vector P1 in
//! space), both discretized with the hierarchical temporal basis. Minimizing
//!
//! ```text
//! ||du/dt - div q - f||^2 + ||q - k grad u||^2 + ||u(0) - u0||^2
//! ```
//!
//! gives the normal equations
//!
//! ```text
//! A11 = M_t (x) K_x(k^2) + (K_t + E_t) (x) M_x
//! A22 = M_t (x) (M2_x + DD_x)
//! A12 = -C_t^T (x) D_x - M_t (x) G_x(k)^T,   A21 = A12^T
//! ```
//!
//! Temporal level `i` is combined with spatial level `p(i)` for a [`LevelPairing`] `p`, and
//! only the level pairs allowed by the [`LevelCoupling`] are formed. Kronecker products are
//! taken block by block in time-major order, so the dense tensor product of all temporal and
//! all spatial degrees of freedom never appears.
use crate::assembly::form::{BlockMixedBilinearForm, LevelCoupling};
use crate::assembly::integrators::{
    Coefficient, DivDivIntegrator, DivergenceIntegrator, GradientIntegrator, Integrator, MassIntegrator, OperatorKind,
    StiffnessIntegrator, VectorMassIntegrator,
};
use crate::assembly::rhs::RhsAssembler;
use crate::assembly::temporal::{TemporalBlockMatrixAssembler, TemporalFeHierarchy};
use crate::element::ElementConnectivity;
use crate::error::AssemblyError;
use crate::hierarchy::NestedFeHierarchy;
use crate::problem::{HeatProblem, Medium};
use crate::solution::SolutionHandler;
use log::debug;
use nalgebra::{DVector, Point};
use nalgebra_sparse::CsrMatrix;
use rustc_hash::FxHashMap;
use sparse_heat_linalg::{
    eliminate_rows_and_columns, kronecker_product, scaled_kronecker_product, zero_constrained_entries, BlockMatrix,
    BlockOffsets,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Assigns a spatial level to every temporal level.
pub trait LevelPairing: Send + Sync {
    fn spatial_level(&self, temporal_level: usize, num_temporal_levels: usize) -> usize;
}

impl<F> LevelPairing for F
where
    F: Fn(usize, usize) -> usize + Send + Sync,
{
    fn spatial_level(&self, temporal_level: usize, num_temporal_levels: usize) -> usize {
        self(temporal_level, num_temporal_levels)
    }
}

/// Pairs the finest temporal level with the coarsest spatial level: `p(i) = L - 1 - i`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ReverseLevelPairing;

impl LevelPairing for ReverseLevelPairing {
    fn spatial_level(&self, temporal_level: usize, num_temporal_levels: usize) -> usize {
        num_temporal_levels - 1 - temporal_level
    }
}

/// `p(i) = i`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct IdentityLevelPairing;

impl LevelPairing for IdentityLevelPairing {
    fn spatial_level(&self, temporal_level: usize, _num_temporal_levels: usize) -> usize {
        temporal_level
    }
}

/// The diffusivity of a medium, or its square, as an integrator coefficient.
pub(crate) struct DiffusivityCoefficient<'m, M> {
    pub medium: &'m M,
    pub squared: bool,
}

impl<'m, const D: usize, M: Medium<D>> Coefficient<D> for DiffusivityCoefficient<'m, M> {
    fn evaluate(&self, x: &Point<f64, D>) -> f64 {
        let k = self.medium.diffusivity(x);
        if self.squared {
            k * k
        } else {
            k
        }
    }

    fn is_constant(&self) -> bool {
        self.medium.is_homogeneous()
    }
}

#[derive(Debug, Clone)]
struct MediumIndependentCache {
    temporal: FxHashMap<OperatorKind, BlockMatrix<f64>>,
    spatial: FxHashMap<OperatorKind, BlockMatrix<f64>>,
    system: BlockMatrix<f64>,
}

fn required_block<'b>(
    matrix: &'b BlockMatrix<f64>,
    operator: OperatorKind,
    i: usize,
    j: usize,
) -> Result<&'b CsrMatrix<f64>, AssemblyError> {
    matrix.block(i, j).ok_or_else(|| {
        AssemblyError::structural(format!("{:?} operator has no block ({}, {})", operator, i, j))
    })
}

fn cached(
    operators: &FxHashMap<OperatorKind, BlockMatrix<f64>>,
    operator: OperatorKind,
) -> Result<&BlockMatrix<f64>, AssemblyError> {
    operators
        .get(&operator)
        .ok_or_else(|| AssemblyError::unassembled(format!("{:?} operator is not cached", operator)))
}

/// Assembles the space-time system of the heat equation on a temporal and a spatial
/// hierarchy.
///
/// The temperature hierarchy must consist of scalar nodal spaces and the heat-flux hierarchy of
/// `D`-component nodal spaces on the same spatial mesh hierarchy.
pub struct SparseSystemAssembler<'a, const D: usize, C> {
    temporal: TemporalBlockMatrixAssembler<'a>,
    temperature: &'a NestedFeHierarchy<'a, D, C>,
    heat_flux: &'a NestedFeHierarchy<'a, D, C>,
    coupling: LevelCoupling,
    pairing: Box<dyn LevelPairing + 'a>,
    offsets: BlockOffsets,
    cache: Option<MediumIndependentCache>,
}

impl<'a, const D: usize, C> SparseSystemAssembler<'a, D, C>
where
    C: ElementConnectivity<D>,
{
    /// An assembler with the default [`ReverseLevelPairing`].
    pub fn new(
        temporal: &'a TemporalFeHierarchy<'a>,
        temperature: &'a NestedFeHierarchy<'a, D, C>,
        heat_flux: &'a NestedFeHierarchy<'a, D, C>,
        coupling: LevelCoupling,
    ) -> Result<Self, AssemblyError> {
        Self::with_level_pairing(temporal, temperature, heat_flux, coupling, ReverseLevelPairing)
    }

    pub fn with_level_pairing(
        temporal: &'a TemporalFeHierarchy<'a>,
        temperature: &'a NestedFeHierarchy<'a, D, C>,
        heat_flux: &'a NestedFeHierarchy<'a, D, C>,
        coupling: LevelCoupling,
        pairing: impl LevelPairing + 'a,
    ) -> Result<Self, AssemblyError> {
        temporal.check_complete()?;
        temperature.check_complete()?;
        heat_flux.check_complete()?;
        if !std::ptr::eq(temperature.mesh_hierarchy(), heat_flux.mesh_hierarchy()) {
            return Err(AssemblyError::structural(
                "temperature and heat flux hierarchies must share one spatial mesh hierarchy",
            ));
        }
        let dims_match = |fe: &NestedFeHierarchy<D, C>, dim: usize| {
            fe.fe_spaces()
                .iter()
                .all(|space| space.solution_dim() == dim)
        };
        if !dims_match(temperature, 1) || !dims_match(heat_flux, D) {
            return Err(AssemblyError::structural(format!(
                "expected scalar temperature spaces and heat flux spaces with {} components",
                D
            )));
        }

        let num_levels = temporal.num_levels();
        let num_spatial_levels = temperature.num_levels();
        let mut spatial_levels = Vec::with_capacity(num_levels);
        for level in 0..num_levels {
            let spatial_level = pairing.spatial_level(level, num_levels);
            if spatial_level >= num_spatial_levels {
                return Err(AssemblyError::structural(format!(
                    "temporal level {} is paired with spatial level {}, but only {} spatial levels exist",
                    level, spatial_level, num_spatial_levels
                )));
            }
            spatial_levels.push(spatial_level);
        }

        let temporal_sizes = temporal.num_dofs();
        let (u_sizes, q_sizes) = (temperature.num_dofs(), heat_flux.num_dofs());
        let block_sizes = |spatial_sizes: &[usize]| -> Vec<usize> {
            temporal_sizes
                .iter()
                .zip(&spatial_levels)
                .map(|(n_t, &sp)| n_t * spatial_sizes[sp])
                .collect::<Vec<_>>()
        };
        let offsets = BlockOffsets::from_sizes(block_sizes(&u_sizes).into_iter().chain(block_sizes(&q_sizes)));
        debug!(
            "Space-time system with {} levels, block sizes {:?}",
            num_levels,
            offsets.sizes().collect::<Vec<_>>()
        );

        Ok(Self {
            temporal: TemporalBlockMatrixAssembler::new(temporal, coupling),
            temperature,
            heat_flux,
            coupling,
            pairing: Box::new(pairing),
            offsets,
            cache: None,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.temporal.fe_hierarchy().num_levels()
    }

    pub fn coupling(&self) -> LevelCoupling {
        self.coupling
    }

    pub fn temporal_assembler(&self) -> &TemporalBlockMatrixAssembler<'a> {
        &self.temporal
    }

    pub fn temporal_fe(&self) -> &'a TemporalFeHierarchy<'a> {
        self.temporal.fe_hierarchy()
    }

    pub fn temperature_fe(&self) -> &'a NestedFeHierarchy<'a, D, C> {
        self.temperature
    }

    pub fn heat_flux_fe(&self) -> &'a NestedFeHierarchy<'a, D, C> {
        self.heat_flux
    }

    pub fn level_pairing(&self) -> &dyn LevelPairing {
        self.pairing.as_ref()
    }

    /// The spatial level paired with a temporal level.
    pub fn spatial_level(&self, temporal_level: usize) -> usize {
        self.pairing
            .spatial_level(temporal_level, self.num_levels())
    }

    /// Block layout `[u_0, ..., u_{L-1}, q_0, ..., q_{L-1}]` of the global system.
    pub fn system_offsets(&self) -> &BlockOffsets {
        &self.offsets
    }

    /// Whether the medium-independent phase has been assembled and cached.
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    pub fn clear_cache(&mut self) {
        self.cache = None;
    }

    /// Coupled temporal level pairs `(i, j)`, row-major.
    fn temporal_pairs(&self) -> Vec<(usize, usize)> {
        self.coupling
            .coupled_pairs(self.num_levels())
            .collect()
    }

    /// Spatial level pairs needed by the coupled temporal pairs.
    fn spatial_pairs(&self) -> BTreeSet<(usize, usize)> {
        self.temporal_pairs()
            .into_iter()
            .map(|(i, j)| (self.spatial_level(i), self.spatial_level(j)))
            .collect()
    }

    fn assemble_spatial<'m>(
        &self,
        test: &'m NestedFeHierarchy<'m, D, C>,
        trial: &'m NestedFeHierarchy<'m, D, C>,
        integrator: Arc<dyn Integrator<D> + 'm>,
    ) -> Result<BlockMatrix<f64>, AssemblyError> {
        let mut form = BlockMixedBilinearForm::new(test, trial);
        form.allocate_block_matrix()?;
        for (i, j) in self.spatial_pairs() {
            form.add_domain_integrator(integrator.clone(), i, j)?;
        }
        form.assemble()?;
        form.into_block_matrix()
    }

    /// Assembles and caches every operator that does not depend on the medium, together with
    /// the medium-independent part of the global matrix. Does nothing if the cache is filled.
    pub fn assemble_system_medium_independent(&mut self) -> Result<(), AssemblyError> {
        if self.cache.is_some() {
            debug!("Reusing cached medium-independent system");
            return Ok(());
        }

        let mut temporal = FxHashMap::default();
        temporal.insert(OperatorKind::Mass, self.temporal.mass()?);
        temporal.insert(OperatorKind::Stiffness, self.temporal.stiffness()?);
        temporal.insert(OperatorKind::Gradient, self.temporal.gradient()?);
        temporal.insert(OperatorKind::Initial, self.temporal.initial()?);

        let (u, q) = (self.temperature, self.heat_flux);
        let mut spatial = FxHashMap::default();
        spatial.insert(OperatorKind::Mass, self.assemble_spatial(u, u, Arc::new(MassIntegrator))?);
        spatial.insert(OperatorKind::VectorMass, self.assemble_spatial(q, q, Arc::new(VectorMassIntegrator))?);
        spatial.insert(OperatorKind::DivDiv, self.assemble_spatial(q, q, Arc::new(DivDivIntegrator))?);
        spatial.insert(OperatorKind::Divergence, self.assemble_spatial(u, q, Arc::new(DivergenceIntegrator))?);
        // Unit-diffusivity operators, rescaled for homogeneous media
        spatial.insert(OperatorKind::Stiffness, self.assemble_spatial(u, u, Arc::new(StiffnessIntegrator::unit()))?);
        spatial.insert(OperatorKind::Gradient, self.assemble_spatial(q, u, Arc::new(GradientIntegrator::unit()))?);

        let system = self.combine_medium_independent(&temporal, &spatial)?;
        debug!(
            "Cached medium-independent system: {}x{}, {} temporal and {} spatial operators",
            system.nrows(),
            system.ncols(),
            temporal.len(),
            spatial.len()
        );
        self.cache = Some(MediumIndependentCache {
            temporal,
            spatial,
            system,
        });
        Ok(())
    }

    fn combine_medium_independent(
        &self,
        temporal: &FxHashMap<OperatorKind, BlockMatrix<f64>>,
        spatial: &FxHashMap<OperatorKind, BlockMatrix<f64>>,
    ) -> Result<BlockMatrix<f64>, AssemblyError> {
        use OperatorKind::*;
        let num_levels = self.num_levels();
        let (m_t, k_t, c_t, e_t) = (
            cached(temporal, Mass)?,
            cached(temporal, Stiffness)?,
            cached(temporal, Gradient)?,
            cached(temporal, Initial)?,
        );
        let (m_x, m2_x, dd_x, d_x) = (
            cached(spatial, Mass)?,
            cached(spatial, VectorMass)?,
            cached(spatial, DivDiv)?,
            cached(spatial, Divergence)?,
        );

        let mut system = BlockMatrix::new(self.offsets.clone(), self.offsets.clone());
        for (i, j) in self.temporal_pairs() {
            let (si, sj) = (self.spatial_level(i), self.spatial_level(j));

            // (K_t + E_t) (x) M_x
            let k_t_ij = required_block(k_t, Stiffness, i, j)?;
            let time_evolution = match e_t.block(i, j) {
                Some(e_t_ij) => k_t_ij + e_t_ij,
                None => k_t_ij.clone(),
            };
            let a11 = kronecker_product(&time_evolution, required_block(m_x, Mass, si, sj)?);
            system.add_to_block(i, j, &a11)?;

            // M_t (x) (M2_x + DD_x)
            let flux = required_block(m2_x, VectorMass, si, sj)? + required_block(dd_x, DivDiv, si, sj)?;
            let a22 = kronecker_product(required_block(m_t, Mass, i, j)?, &flux);
            system.add_to_block(num_levels + i, num_levels + j, &a22)?;

            // -C_t^T (x) D_x and its transpose
            let c_t_ji = required_block(c_t, Gradient, j, i)?.transpose();
            let a12 = scaled_kronecker_product(-1.0, &c_t_ji, required_block(d_x, Divergence, si, sj)?);
            system.add_to_block(num_levels + j, i, &a12.transpose())?;
            system.add_to_block(i, num_levels + j, &a12)?;
        }
        Ok(system)
    }

    /// Assembles the medium-dependent operators and returns the complete global matrix.
    ///
    /// Fails with an unassembled access if the medium-independent phase has not run.
    pub fn assemble_system_medium_dependent<M: Medium<D>>(&self, medium: &M) -> Result<CsrMatrix<f64>, AssemblyError> {
        let cache = self.cache.as_ref().ok_or_else(|| {
            AssemblyError::unassembled("the medium-independent system must be assembled first")
        })?;
        let num_levels = self.num_levels();
        let m_t = cached(&cache.temporal, OperatorKind::Mass)?;

        let (k_x, g_x) = if medium.is_homogeneous() {
            let k = medium.diffusivity(&Point::origin());
            debug!("Rescaling cached spatial operators for homogeneous diffusivity {}", k);
            let mut k_x = cached(&cache.spatial, OperatorKind::Stiffness)?.clone();
            k_x.scale_mut(k * k);
            let mut g_x = cached(&cache.spatial, OperatorKind::Gradient)?.clone();
            g_x.scale_mut(k);
            (k_x, g_x)
        } else {
            let (u, q) = (self.temperature, self.heat_flux);
            let k_x = self.assemble_spatial(
                u,
                u,
                Arc::new(StiffnessIntegrator::new(DiffusivityCoefficient { medium, squared: true })),
            )?;
            let g_x = self.assemble_spatial(
                q,
                u,
                Arc::new(GradientIntegrator::new(DiffusivityCoefficient { medium, squared: false })),
            )?;
            (k_x, g_x)
        };

        let mut system = cache.system.clone();
        for (i, j) in self.temporal_pairs() {
            let (si, sj) = (self.spatial_level(i), self.spatial_level(j));
            let m_t_ij = required_block(m_t, OperatorKind::Mass, i, j)?;

            // M_t (x) K_x(k^2)
            let a11 = kronecker_product(m_t_ij, required_block(&k_x, OperatorKind::Stiffness, si, sj)?);
            system.add_to_block(i, j, &a11)?;

            // -M_t (x) G_x(k)^T and its transpose
            let g_x_t = required_block(&g_x, OperatorKind::Gradient, sj, si)?.transpose();
            let a12 = scaled_kronecker_product(-1.0, m_t_ij, &g_x_t);
            system.add_to_block(num_levels + j, i, &a12.transpose())?;
            system.add_to_block(i, num_levels + j, &a12)?;
        }

        let matrix = system.to_monolithic();
        debug!(
            "Assembled space-time system: {}x{} with {} non-zeros",
            matrix.nrows(),
            matrix.ncols(),
            matrix.nnz()
        );
        Ok(matrix)
    }

    /// The right-hand side of the normal equations for the given problem data.
    pub fn assemble_rhs<P: HeatProblem<D>>(&self, problem: &P) -> Result<DVector<f64>, AssemblyError> {
        let spatial_levels: Vec<_> = (0..self.num_levels())
            .map(|level| self.spatial_level(level))
            .collect();
        RhsAssembler::new(self.temporal_fe(), self.temperature, self.heat_flux, &spatial_levels)
            .assemble(problem, &self.offsets)
    }

    /// Global indices of the temperature degrees of freedom on the spatial boundary, for every
    /// temporal degree of freedom of every level. Sorted.
    pub fn dirichlet_dofs(&self) -> Vec<usize> {
        let temporal_sizes = self.temporal_fe().num_dofs();
        let spatial_meshes = self.temperature.mesh_hierarchy();
        let mut dofs = Vec::new();
        for (level, &n_t) in temporal_sizes.iter().enumerate() {
            let spatial_level = self.spatial_level(level);
            let space = &self.temperature.fe_spaces()[spatial_level];
            let boundary = space.dofs_for_vertices(&spatial_meshes.mesh(spatial_level).find_boundary_vertices());
            let offset = self.offsets.block_offset(level);
            let n_x = space.num_dofs();
            for t in 0..n_t {
                dofs.extend(boundary.iter().map(|&dof| offset + t * n_x + dof));
            }
        }
        dofs.sort_unstable();
        dofs
    }

    /// Imposes homogeneous Dirichlet conditions on the temperature: the rows and columns of
    /// the boundary degrees of freedom are removed, their diagonal set to one and their
    /// right-hand side entries zeroed. Applying this more than once has no further effect.
    pub fn apply_bcs(&self, matrix: &mut CsrMatrix<f64>, rhs: &mut DVector<f64>) -> Result<(), AssemblyError> {
        let n = self.offsets.total_size();
        if matrix.nrows() != n || matrix.ncols() != n || rhs.len() != n {
            return Err(AssemblyError::structural(format!(
                "system of size {}x{} with right-hand side of length {} does not match {} degrees of freedom",
                matrix.nrows(),
                matrix.ncols(),
                rhs.len(),
                n
            )));
        }
        let dofs = self.dirichlet_dofs();
        *matrix = eliminate_rows_and_columns(matrix, &dofs);
        zero_constrained_entries(rhs, &dofs);
        Ok(())
    }

    /// An empty solution handler matching the layout of this system.
    pub fn solution_handler(&self) -> Result<SolutionHandler, AssemblyError> {
        SolutionHandler::new(
            &self.temporal_fe().num_dofs(),
            &self.temperature.num_dofs(),
            &self.heat_flux.num_dofs(),
            self.pairing.as_ref(),
        )
    }
}
