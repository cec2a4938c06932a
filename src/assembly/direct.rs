//! Single-level space-time assembly through full Kronecker products.
//!
//! Serves as the reference for the hierarchical assembler: on a single level, both produce the
//! same matrix. Here every off-diagonal block is formed from its own Kronecker product instead
//! of transposing its counterpart.
use crate::assembly::global::{assemble_level_pair, LevelSpace};
use crate::assembly::integrators::{
    DivDivIntegrator, DivergenceIntegrator, GradientIntegrator, InitialIntegrator, Integrator, MassIntegrator,
    StiffnessIntegrator, VectorMassIntegrator,
};
use crate::assembly::system::DiffusivityCoefficient;
use crate::connectivity::Segment1dConnectivity;
use crate::element::ElementConnectivity;
use crate::error::AssemblyError;
use crate::hierarchy::NestedMeshHierarchy;
use crate::mesh::{IntervalMesh, Mesh};
use crate::problem::Medium;
use crate::space::FeSpace;
use nalgebra_sparse::CsrMatrix;
use sparse_heat_linalg::{kronecker_product, scaled_kronecker_product, BlockMatrix, BlockOffsets};

fn assemble_single_level<const D: usize, C>(
    meshes: &NestedMeshHierarchy<D, C>,
    test: &FeSpace,
    trial: &FeSpace,
    integrator: &dyn Integrator<D>,
) -> Result<CsrMatrix<f64>, AssemblyError>
where
    C: ElementConnectivity<D>,
{
    let test = LevelSpace { level: 0, space: test };
    let trial = LevelSpace { level: 0, space: trial };
    assemble_level_pair(meshes, test, trial, &[integrator])
}

/// Assembles the least-squares space-time system on the nodal spaces of a temporal mesh and a
/// spatial mesh, in the layout `[u, q]` with time-major ordering.
pub fn assemble_direct_system<const D: usize, C, M>(
    temporal_mesh: &IntervalMesh,
    spatial_mesh: &Mesh<D, C>,
    medium: &M,
) -> Result<CsrMatrix<f64>, AssemblyError>
where
    C: ElementConnectivity<D>,
    M: Medium<D>,
{
    let temporal = NestedMeshHierarchy::<1, Segment1dConnectivity>::new(temporal_mesh.clone());
    let spatial = NestedMeshHierarchy::new(spatial_mesh.clone());
    let psi = FeSpace::nodal(temporal_mesh.num_vertices(), 1);
    let phi = FeSpace::nodal(spatial_mesh.num_vertices(), 1);
    let chi = FeSpace::nodal(spatial_mesh.num_vertices(), D);

    let t0 = temporal_mesh
        .vertices()
        .iter()
        .map(|v| v.x)
        .fold(f64::INFINITY, f64::min);
    let m_t = assemble_single_level(&temporal, &psi, &psi, &MassIntegrator)?;
    let k_t = assemble_single_level(&temporal, &psi, &psi, &StiffnessIntegrator::unit())?;
    let c_t = assemble_single_level(&temporal, &psi, &psi, &GradientIntegrator::unit())?;
    let e_t = assemble_single_level(&temporal, &psi, &psi, &InitialIntegrator::at_time(t0))?;

    let k_x = assemble_single_level(
        &spatial,
        &phi,
        &phi,
        &StiffnessIntegrator::new(DiffusivityCoefficient { medium, squared: true }),
    )?;
    let m_x = assemble_single_level(&spatial, &phi, &phi, &MassIntegrator)?;
    let m2_x = assemble_single_level(&spatial, &chi, &chi, &VectorMassIntegrator)?;
    let dd_x = assemble_single_level(&spatial, &chi, &chi, &DivDivIntegrator)?;
    let d_x = assemble_single_level(&spatial, &phi, &chi, &DivergenceIntegrator)?;
    let g_x = assemble_single_level(
        &spatial,
        &chi,
        &phi,
        &GradientIntegrator::new(DiffusivityCoefficient { medium, squared: false }),
    )?;

    let a11 = &kronecker_product(&m_t, &k_x) + &kronecker_product(&(&k_t + &e_t), &m_x);
    let a22 = kronecker_product(&m_t, &(&m2_x + &dd_x));
    let a12 = &scaled_kronecker_product(-1.0, &c_t.transpose(), &d_x)
        + &scaled_kronecker_product(-1.0, &m_t, &g_x.transpose());
    let a21 = &scaled_kronecker_product(-1.0, &c_t, &d_x.transpose()) + &scaled_kronecker_product(-1.0, &m_t, &g_x);

    let offsets = BlockOffsets::from_sizes([a11.nrows(), a22.nrows()]);
    let mut system = BlockMatrix::new(offsets.clone(), offsets);
    system.set_block(0, 0, a11)?;
    system.set_block(0, 1, a12)?;
    system.set_block(1, 0, a21)?;
    system.set_block(1, 1, a22)?;
    Ok(system.to_monolithic())
}
