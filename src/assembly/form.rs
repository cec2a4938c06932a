//! Block bilinear forms over nested FE hierarchies.
//!
//! Block `(i, j)` of a form pairs the test space on level `i` with the trial space on
//! level `j`. Same-level blocks are assembled element by element; cross-level blocks iterate
//! the elements of the finer level and pair each with its ancestor on the coarser level.
use crate::assembly::global::{assemble_level_pair, check_integrator, LevelSpace};
use crate::assembly::integrators::{Integrator, LevelRelation};
use crate::element::ElementConnectivity;
use crate::error::AssemblyError;
use crate::hierarchy::NestedFeHierarchy;
use log::debug;
use serde::{Deserialize, Serialize};
use sparse_heat_linalg::{BlockMatrix, BlockOffsets};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Which pairs of levels are coupled by level-wise integrator registration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelCoupling {
    /// Blocks `(i, j)` with `|i - j| <= 1`.
    #[default]
    Adjacent,
    /// All blocks.
    Full,
}

impl LevelCoupling {
    pub fn couples(&self, i: usize, j: usize) -> bool {
        match self {
            Self::Adjacent => i.abs_diff(j) <= 1,
            Self::Full => true,
        }
    }

    /// All coupled pairs `(i, j)` of `num_levels` levels, row-major.
    pub fn coupled_pairs(&self, num_levels: usize) -> impl '_ + Iterator<Item = (usize, usize)> {
        (0..num_levels)
            .flat_map(move |i| (0..num_levels).map(move |j| (i, j)))
            .filter(move |&(i, j)| self.couples(i, j))
    }
}

/// A bilinear form whose test and trial spaces come from two FE hierarchies on the same
/// mesh hierarchy.
pub struct BlockMixedBilinearForm<'a, const D: usize, C> {
    test: &'a NestedFeHierarchy<'a, D, C>,
    trial: &'a NestedFeHierarchy<'a, D, C>,
    integrators: BTreeMap<(usize, usize), Vec<Arc<dyn Integrator<D> + 'a>>>,
    allocated: Option<BlockMatrix<f64>>,
    assembled: Option<BlockMatrix<f64>>,
}

impl<'a, const D: usize, C> BlockMixedBilinearForm<'a, D, C>
where
    C: ElementConnectivity<D>,
{
    pub fn new(test: &'a NestedFeHierarchy<'a, D, C>, trial: &'a NestedFeHierarchy<'a, D, C>) -> Self {
        Self {
            test,
            trial,
            integrators: BTreeMap::new(),
            allocated: None,
            assembled: None,
        }
    }

    /// Sizes the block layout from the degrees of freedom of the FE spaces.
    ///
    /// Fails with a structural mismatch if the hierarchies are incomplete or live on
    /// different mesh hierarchies.
    pub fn allocate_block_matrix(&mut self) -> Result<(), AssemblyError> {
        self.test.check_complete()?;
        self.trial.check_complete()?;
        if !std::ptr::eq(self.test.mesh_hierarchy(), self.trial.mesh_hierarchy()) {
            return Err(AssemblyError::structural(
                "test and trial FE hierarchies must share one mesh hierarchy",
            ));
        }
        let row_offsets = BlockOffsets::from_sizes(self.test.num_dofs());
        let col_offsets = BlockOffsets::from_sizes(self.trial.num_dofs());
        self.allocated = Some(BlockMatrix::new(row_offsets, col_offsets));
        Ok(())
    }

    /// Registers an integrator on one block. Several integrators on the same block sum.
    pub fn add_domain_integrator(
        &mut self,
        integrator: Arc<dyn Integrator<D> + 'a>,
        block_row: usize,
        block_col: usize,
    ) -> Result<(), AssemblyError> {
        let (num_rows, num_cols) = (self.test.num_levels(), self.trial.num_levels());
        if block_row >= num_rows || block_col >= num_cols {
            return Err(AssemblyError::structural(format!(
                "block ({}, {}) is out of range for {} x {} levels",
                block_row, block_col, num_rows, num_cols
            )));
        }
        self.integrators
            .entry((block_row, block_col))
            .or_default()
            .push(integrator);
        Ok(())
    }

    /// Registers an integrator on every block allowed by the coupling.
    pub fn add_domain_integrator_for_levels(
        &mut self,
        integrator: Arc<dyn Integrator<D> + 'a>,
        coupling: LevelCoupling,
    ) -> Result<(), AssemblyError> {
        let num_levels = self.test.num_levels().min(self.trial.num_levels());
        for (i, j) in coupling.coupled_pairs(num_levels) {
            self.add_domain_integrator(integrator.clone(), i, j)?;
        }
        Ok(())
    }

    /// Assembles every block with registered integrators. Blocks without integrators stay
    /// structurally zero.
    ///
    /// Every registration is validated before any element is visited. On failure, no
    /// previously assembled matrix is replaced.
    pub fn assemble(&mut self) -> Result<(), AssemblyError> {
        let mut matrix = self
            .allocated
            .clone()
            .ok_or_else(|| AssemblyError::unassembled("block matrix must be allocated before assembly"))?;

        for (&(i, j), integrators) in &self.integrators {
            let relation = LevelRelation::between(i, j);
            for integrator in integrators {
                check_integrator(
                    integrator.as_ref(),
                    relation,
                    &self.test.fe_spaces()[i],
                    &self.trial.fe_spaces()[j],
                )?;
            }
        }

        let meshes = self.test.mesh_hierarchy();
        for (&(i, j), integrators) in &self.integrators {
            let integrators: Vec<&dyn Integrator<D>> = integrators.iter().map(|integrator| integrator.as_ref()).collect();
            let test = LevelSpace {
                level: i,
                space: &self.test.fe_spaces()[i],
            };
            let trial = LevelSpace {
                level: j,
                space: &self.trial.fe_spaces()[j],
            };
            let block = assemble_level_pair(meshes, test, trial, &integrators)?;
            debug!(
                "Assembled block ({}, {}): {}x{} with {} non-zeros",
                i,
                j,
                block.nrows(),
                block.ncols(),
                block.nnz()
            );
            matrix.set_block(i, j, block)?;
        }

        self.assembled = Some(matrix);
        Ok(())
    }

    pub fn block_matrix(&self) -> Result<&BlockMatrix<f64>, AssemblyError> {
        self.assembled
            .as_ref()
            .ok_or_else(|| AssemblyError::unassembled("block matrix has not been assembled"))
    }

    pub fn into_block_matrix(self) -> Result<BlockMatrix<f64>, AssemblyError> {
        self.assembled
            .ok_or_else(|| AssemblyError::unassembled("block matrix has not been assembled"))
    }
}

/// A bilinear form whose test and trial spaces are the same FE hierarchy.
pub struct BlockBilinearForm<'a, const D: usize, C> {
    form: BlockMixedBilinearForm<'a, D, C>,
}

impl<'a, const D: usize, C> BlockBilinearForm<'a, D, C>
where
    C: ElementConnectivity<D>,
{
    pub fn new(fe: &'a NestedFeHierarchy<'a, D, C>) -> Self {
        Self {
            form: BlockMixedBilinearForm::new(fe, fe),
        }
    }

    pub fn allocate_block_matrix(&mut self) -> Result<(), AssemblyError> {
        self.form.allocate_block_matrix()
    }

    pub fn add_domain_integrator(
        &mut self,
        integrator: Arc<dyn Integrator<D> + 'a>,
        block_row: usize,
        block_col: usize,
    ) -> Result<(), AssemblyError> {
        self.form
            .add_domain_integrator(integrator, block_row, block_col)
    }

    pub fn add_domain_integrator_for_levels(
        &mut self,
        integrator: Arc<dyn Integrator<D> + 'a>,
        coupling: LevelCoupling,
    ) -> Result<(), AssemblyError> {
        self.form
            .add_domain_integrator_for_levels(integrator, coupling)
    }

    pub fn assemble(&mut self) -> Result<(), AssemblyError> {
        self.form.assemble()
    }

    pub fn block_matrix(&self) -> Result<&BlockMatrix<f64>, AssemblyError> {
        self.form.block_matrix()
    }

    pub fn into_block_matrix(self) -> Result<BlockMatrix<f64>, AssemblyError> {
        self.form.into_block_matrix()
    }
}
