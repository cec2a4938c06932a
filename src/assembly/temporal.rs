//! Block operators of the temporal hierarchy.
//!
//! The temporal mesh hierarchy is a uniform partition of `[0, T]` into `2^min_level`
//! elements, refined uniformly level by level. Its FE hierarchy is hierarchical: nodal on
//! the coarsest level, and on every finer level spanned by the hat functions of the
//! vertices that level introduces. Block `(i, j)` of the temporal operators pairs level `i`
//! with level `j`.
use crate::assembly::form::{BlockBilinearForm, LevelCoupling};
use crate::assembly::integrators::{GradientIntegrator, InitialIntegrator, Integrator, MassIntegrator, StiffnessIntegrator};
use crate::connectivity::Segment1dConnectivity;
use crate::error::AssemblyError;
use crate::hierarchy::{NestedFeHierarchy, NestedMeshHierarchy};
use crate::mesh::procedural::create_interval_mesh;
use sparse_heat_linalg::{BlockMatrix, BlockOffsets};
use std::cell::OnceCell;
use std::sync::Arc;

pub type TemporalMeshHierarchy = NestedMeshHierarchy<1, Segment1dConnectivity>;
pub type TemporalFeHierarchy<'a> = NestedFeHierarchy<'a, 1, Segment1dConnectivity>;

/// Builds the temporal mesh hierarchy on `[0, end_time]` with `2^min_level` elements on the
/// coarsest of `num_levels` levels.
pub fn uniform_temporal_hierarchy(
    end_time: f64,
    min_level: u32,
    num_levels: usize,
) -> Result<TemporalMeshHierarchy, AssemblyError> {
    if num_levels == 0 {
        return Err(AssemblyError::structural("a temporal hierarchy needs at least one level"));
    }
    let coarse = create_interval_mesh(0.0, end_time, 1 << min_level);
    NestedMeshHierarchy::from_uniform_refinement(coarse, num_levels - 1)
}

/// The earliest time covered by the temporal hierarchy.
pub fn initial_time(meshes: &TemporalMeshHierarchy) -> f64 {
    meshes
        .mesh(0)
        .vertices()
        .iter()
        .map(|v| v.x)
        .fold(f64::INFINITY, f64::min)
}

/// Element counts and mesh widths per level.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshCharacteristics {
    pub num_elements: Vec<usize>,
    pub mesh_widths: Vec<f64>,
}

/// Assembles mass, stiffness, gradient and initial-condition block matrices of a temporal
/// FE hierarchy.
pub struct TemporalBlockMatrixAssembler<'a> {
    fe: &'a TemporalFeHierarchy<'a>,
    coupling: LevelCoupling,
    block_layout: OnceCell<(Vec<usize>, BlockOffsets)>,
    characteristics: OnceCell<MeshCharacteristics>,
}

impl<'a> TemporalBlockMatrixAssembler<'a> {
    pub fn new(fe: &'a TemporalFeHierarchy<'a>, coupling: LevelCoupling) -> Self {
        Self {
            fe,
            coupling,
            block_layout: OnceCell::new(),
            characteristics: OnceCell::new(),
        }
    }

    pub fn fe_hierarchy(&self) -> &'a TemporalFeHierarchy<'a> {
        self.fe
    }

    pub fn coupling(&self) -> LevelCoupling {
        self.coupling
    }

    fn assemble_for_levels(&self, integrator: Arc<dyn Integrator<1> + 'a>) -> Result<BlockMatrix<f64>, AssemblyError> {
        let mut form = BlockBilinearForm::new(self.fe);
        form.allocate_block_matrix()?;
        form.add_domain_integrator_for_levels(integrator, self.coupling)?;
        form.assemble()?;
        form.into_block_matrix()
    }

    /// `int psi_j psi_i`, same-level and coupled cross-level blocks.
    pub fn mass(&self) -> Result<BlockMatrix<f64>, AssemblyError> {
        self.assemble_for_levels(Arc::new(MassIntegrator))
    }

    /// `int psi_j' psi_i'`, same-level and coupled cross-level blocks.
    pub fn stiffness(&self) -> Result<BlockMatrix<f64>, AssemblyError> {
        self.assemble_for_levels(Arc::new(StiffnessIntegrator::unit()))
    }

    /// `int psi_j' psi_i`, with the derivative on the trial function.
    pub fn gradient(&self) -> Result<BlockMatrix<f64>, AssemblyError> {
        self.assemble_for_levels(Arc::new(GradientIntegrator::unit()))
    }

    /// `psi_i(0) psi_j(0)`. Only block `(0, 0)` is non-empty, since the functions of finer
    /// levels vanish at the end points of the time interval.
    pub fn initial(&self) -> Result<BlockMatrix<f64>, AssemblyError> {
        let start_time = initial_time(self.fe.mesh_hierarchy());
        let mut form = BlockBilinearForm::new(self.fe);
        form.allocate_block_matrix()?;
        form.add_domain_integrator(Arc::new(InitialIntegrator::at_time(start_time)), 0, 0)?;
        form.assemble()?;
        form.into_block_matrix()
    }

    /// Degrees of freedom per level and the block offsets they induce. Computed once per
    /// assembler.
    pub fn eval_block_sizes_and_offsets(&self) -> &(Vec<usize>, BlockOffsets) {
        self.block_layout.get_or_init(|| {
            let sizes = self.fe.num_dofs();
            let offsets = BlockOffsets::from_sizes(sizes.iter().copied());
            (sizes, offsets)
        })
    }

    /// Element counts and mesh widths per level. Computed once per assembler.
    pub fn eval_mesh_characteristics(&self) -> &MeshCharacteristics {
        self.characteristics.get_or_init(|| {
            let meshes = self.fe.mesh_hierarchy();
            MeshCharacteristics {
                num_elements: (0..meshes.num_levels())
                    .map(|level| meshes.num_elements(level))
                    .collect(),
                mesh_widths: meshes.mesh_widths(),
            }
        })
    }
}
