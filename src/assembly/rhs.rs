//! Right-hand side of the space-time normal equations.
//!
//! For temporal basis functions `psi_i` and spatial basis functions `phi_a` (temperature) and
//! `chi_b` (heat flux), the right-hand side reads
//!
//! ```text
//! b_u[i, a] = int int f psi_i' phi_a + psi_i(t0) int u0 phi_a
//! b_q[i, b] = -int int f psi_i div chi_b
//! ```
//!
//! and is integrated with tensor products of temporal and spatial element rules.
use crate::assembly::temporal::{initial_time, TemporalFeHierarchy};
use crate::element::{ElementConnectivity, FiniteElement, GradientMatrix};
use crate::error::AssemblyError;
use crate::hierarchy::NestedFeHierarchy;
use crate::mesh::Mesh;
use crate::problem::HeatProblem;
use crate::space::FeSpace;
use nalgebra::{DVector, Point};
use rayon::prelude::*;
use sparse_heat_linalg::BlockOffsets;

/// Quadrature strength for products of the data with the basis.
const DATA_QUADRATURE_STRENGTH: usize = 4;
/// Tolerance for identifying a temporal vertex with the initial time.
const INITIAL_TIME_TOL: f64 = 1e-12;

struct QuadraturePoint<const D: usize> {
    weight: f64,
    x: Point<f64, D>,
    values: DVector<f64>,
    gradients: GradientMatrix<D>,
}

struct ElementQuadrature<const D: usize> {
    points: Vec<QuadraturePoint<D>>,
    /// Scalar degrees of freedom, one per local node.
    scalar_dofs: Vec<Option<usize>>,
    /// Vector-valued degrees of freedom, local node-major with interleaved components.
    vector_dofs: Vec<Option<usize>>,
}

fn element_quadratures<const D: usize, C>(
    mesh: &Mesh<D, C>,
    scalar_space: &FeSpace,
    vector_space: Option<&FeSpace>,
) -> Result<Vec<ElementQuadrature<D>>, AssemblyError>
where
    C: ElementConnectivity<D>,
{
    mesh.element_iter()
        .zip(mesh.connectivity())
        .map(|(element, conn)| -> Result<ElementQuadrature<D>, AssemblyError> {
            let (weights, points) = element.quadrature(DATA_QUADRATURE_STRENGTH)?;
            let jacobian_det = element.measure() / element.reference_measure();
            let points = weights
                .iter()
                .zip(&points)
                .map(|(w, xi)| -> eyre::Result<QuadraturePoint<D>> {
                    Ok(QuadraturePoint {
                        weight: w * jacobian_det,
                        x: element.map_reference_coords(xi),
                        values: element.evaluate_basis(xi),
                        gradients: element.physical_gradients(xi)?,
                    })
                })
                .collect::<eyre::Result<Vec<_>>>()?;

            let mut scalar_dofs = Vec::new();
            scalar_space.populate_element_dofs(conn, &mut scalar_dofs);
            let mut vector_dofs = Vec::new();
            if let Some(space) = vector_space {
                space.populate_element_dofs(conn, &mut vector_dofs);
            }
            Ok(ElementQuadrature {
                points,
                scalar_dofs,
                vector_dofs,
            })
        })
        .collect()
}

/// Assembles the right-hand side for a fixed pairing of temporal and spatial levels.
pub struct RhsAssembler<'a, const D: usize, C> {
    temporal: &'a TemporalFeHierarchy<'a>,
    temperature: &'a NestedFeHierarchy<'a, D, C>,
    heat_flux: &'a NestedFeHierarchy<'a, D, C>,
    spatial_levels: Vec<usize>,
}

impl<'a, const D: usize, C> RhsAssembler<'a, D, C>
where
    C: ElementConnectivity<D>,
{
    /// `spatial_levels[i]` is the spatial level paired with temporal level `i`.
    pub fn new(
        temporal: &'a TemporalFeHierarchy<'a>,
        temperature: &'a NestedFeHierarchy<'a, D, C>,
        heat_flux: &'a NestedFeHierarchy<'a, D, C>,
        spatial_levels: &[usize],
    ) -> Self {
        Self {
            temporal,
            temperature,
            heat_flux,
            spatial_levels: spatial_levels.to_vec(),
        }
    }

    fn check_layout(&self, offsets: &BlockOffsets) -> Result<(), AssemblyError> {
        let num_levels = self.temporal.num_levels();
        if self.spatial_levels.len() != num_levels {
            return Err(AssemblyError::structural(format!(
                "{} spatial levels given for {} temporal levels",
                self.spatial_levels.len(),
                num_levels
            )));
        }
        if let Some(&level) = self
            .spatial_levels
            .iter()
            .find(|&&level| level >= self.temperature.num_levels())
        {
            return Err(AssemblyError::structural(format!("spatial level {} does not exist", level)));
        }
        let temporal_sizes = self.temporal.num_dofs();
        let (u_sizes, q_sizes) = (self.temperature.num_dofs(), self.heat_flux.num_dofs());
        let expected: Vec<usize> = [u_sizes, q_sizes]
            .iter()
            .flat_map(|spatial_sizes| {
                temporal_sizes
                    .iter()
                    .zip(&self.spatial_levels)
                    .map(move |(n_t, &s)| n_t * spatial_sizes[s])
            })
            .collect();
        if offsets.sizes().ne(expected.iter().copied()) {
            return Err(AssemblyError::structural(format!(
                "block layout {:?} does not match the expected block sizes {:?}",
                offsets.sizes().collect::<Vec<_>>(),
                expected
            )));
        }
        Ok(())
    }

    /// Temperature and heat-flux blocks of one temporal level.
    fn assemble_level<P: HeatProblem<D>>(
        &self,
        problem: &P,
        level: usize,
    ) -> Result<(DVector<f64>, DVector<f64>), AssemblyError> {
        let temporal_meshes = self.temporal.mesh_hierarchy();
        let temporal_space = &self.temporal.fe_spaces()[level];
        let temporal_mesh = temporal_meshes.mesh(level);
        let spatial_level = self.spatial_levels[level];
        let u_space = &self.temperature.fe_spaces()[spatial_level];
        let q_space = &self.heat_flux.fe_spaces()[spatial_level];
        let spatial_mesh = self.temperature.mesh_hierarchy().mesh(spatial_level);

        let temporal_elements = element_quadratures(temporal_mesh, temporal_space, None)?;
        let spatial_elements = element_quadratures(spatial_mesh, u_space, Some(q_space))?;

        let n_t = temporal_space.num_dofs();
        let (n_u, n_q) = (u_space.num_dofs(), q_space.num_dofs());
        let mut b_u = DVector::zeros(n_t * n_u);
        let mut b_q = DVector::zeros(n_t * n_q);

        for temporal_element in &temporal_elements {
            for tp in &temporal_element.points {
                let t = tp.x.x;
                for spatial_element in &spatial_elements {
                    for sp in &spatial_element.points {
                        let f = tp.weight * sp.weight * problem.source(t, &sp.x);
                        for (local_t, t_dof) in temporal_element.scalar_dofs.iter().enumerate() {
                            let Some(t_dof) = *t_dof else { continue };
                            let dpsi = tp.gradients[(0, local_t)];
                            let psi = tp.values[local_t];
                            for (local_a, a_dof) in spatial_element.scalar_dofs.iter().enumerate() {
                                if let Some(a_dof) = *a_dof {
                                    b_u[t_dof * n_u + a_dof] += f * dpsi * sp.values[local_a];
                                }
                            }
                            for (local_b, b_dof) in spatial_element.vector_dofs.iter().enumerate() {
                                if let Some(b_dof) = *b_dof {
                                    let (node, component) = (local_b / D, local_b % D);
                                    b_q[t_dof * n_q + b_dof] -= f * psi * sp.gradients[(component, node)];
                                }
                            }
                        }
                    }
                }
            }
        }

        // Only nodal functions of vertices at the initial time are non-zero there.
        let t0 = initial_time(temporal_meshes);
        let initial_dofs = temporal_mesh
            .vertices()
            .iter()
            .enumerate()
            .filter(|(_, v)| (v.x - t0).abs() <= INITIAL_TIME_TOL)
            .filter_map(|(vertex, _)| temporal_space.dof(vertex, 0));
        for t_dof in initial_dofs {
            for spatial_element in &spatial_elements {
                for sp in &spatial_element.points {
                    let u0 = sp.weight * problem.initial_temperature(&sp.x);
                    for (local_a, a_dof) in spatial_element.scalar_dofs.iter().enumerate() {
                        if let Some(a_dof) = *a_dof {
                            b_u[t_dof * n_u + a_dof] += u0 * sp.values[local_a];
                        }
                    }
                }
            }
        }

        Ok((b_u, b_q))
    }

    /// The global right-hand side in the block layout `offsets` of the system.
    pub fn assemble<P: HeatProblem<D>>(&self, problem: &P, offsets: &BlockOffsets) -> Result<DVector<f64>, AssemblyError> {
        self.check_layout(offsets)?;
        let num_levels = self.temporal.num_levels();
        let level_blocks = (0..num_levels)
            .into_par_iter()
            .map(|level| self.assemble_level(problem, level))
            .collect::<Result<Vec<_>, AssemblyError>>()?;

        let mut rhs = DVector::zeros(offsets.total_size());
        for (level, (b_u, b_q)) in level_blocks.into_iter().enumerate() {
            let u = offsets.block_range(level);
            let q = offsets.block_range(num_levels + level);
            rhs.rows_mut(u.start, u.len()).copy_from(&b_u);
            rhs.rows_mut(q.start, q.len()).copy_from(&b_q);
        }
        Ok(rhs)
    }
}
