//! Scatter of element matrices into global sparse matrices.
use crate::assembly::integrators::{ElementPair, Integrator, LevelRelation};
use crate::element::ElementConnectivity;
use crate::error::AssemblyError;
use crate::hierarchy::NestedMeshHierarchy;
use crate::space::FeSpace;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;

/// Pushes an element matrix into `coo`. Rows and columns whose global index is `None` are skipped.
///
/// # Panics
///
/// Panics if the index lists do not match the matrix dimensions or a global index is out
/// of bounds.
pub fn add_element_matrix_to_coo(
    coo: &mut CooMatrix<f64>,
    row_dofs: &[Option<usize>],
    col_dofs: &[Option<usize>],
    matrix: &DMatrix<f64>,
) {
    assert_eq!(row_dofs.len(), matrix.nrows());
    assert_eq!(col_dofs.len(), matrix.ncols());
    for (local_row, row) in row_dofs.iter().enumerate() {
        let Some(row) = *row else { continue };
        for (local_col, col) in col_dofs.iter().enumerate() {
            let Some(col) = *col else { continue };
            coo.push(row, col, matrix[(local_row, local_col)]);
        }
    }
}

/// One level of a hierarchy together with the space whose degrees of freedom index one side
/// of the matrix.
#[derive(Debug, Clone, Copy)]
pub struct LevelSpace<'a> {
    pub level: usize,
    pub space: &'a FeSpace,
}

/// Assembles the matrix of the given integrators between the test space on one level and the
/// trial space on another level of the same mesh hierarchy.
///
/// The elements of the finer of the two levels are visited. Element matrices are computed in
/// parallel and scattered sequentially in element order.
pub fn assemble_level_pair<const D: usize, C>(
    meshes: &NestedMeshHierarchy<D, C>,
    test: LevelSpace,
    trial: LevelSpace,
    integrators: &[&dyn Integrator<D>],
) -> Result<CsrMatrix<f64>, AssemblyError>
where
    C: ElementConnectivity<D>,
{
    let relation = LevelRelation::between(test.level, trial.level);
    for integrator in integrators {
        check_integrator(*integrator, relation, test.space, trial.space)?;
    }

    let fine_level = test.level.max(trial.level);
    let coarse_level = test.level.min(trial.level);
    let fine_mesh = meshes.mesh(fine_level);
    let coarse_mesh = meshes.mesh(coarse_level);

    let element_matrices = (0..fine_mesh.num_elements())
        .into_par_iter()
        .map(|fine_idx| -> Result<_, AssemblyError> {
            let fine_element = fine_mesh
                .element(fine_idx)
                .expect("Element index is within the mesh");
            let (coarse_idx, fine_to_coarse) = meshes.ancestor_with_map(fine_level, fine_idx, coarse_level);
            let coarse_element = coarse_mesh
                .element(coarse_idx)
                .expect("Ancestor index is within the coarse mesh");
            let pair = ElementPair::new(relation, &fine_element, &coarse_element, fine_to_coarse);

            let nrows = pair.test_element().num_nodes() * test.space.solution_dim();
            let ncols = pair.trial_element().num_nodes() * trial.space.solution_dim();
            let mut element_matrix = DMatrix::zeros(nrows, ncols);
            for integrator in integrators {
                integrator.assemble_element_matrix(&pair, element_matrix.as_view_mut())?;
            }
            Ok((fine_idx, coarse_idx, element_matrix))
        })
        .collect::<Result<Vec<_>, AssemblyError>>()?;

    let (test_mesh, trial_mesh) = (meshes.mesh(test.level), meshes.mesh(trial.level));
    let mut coo = CooMatrix::new(test.space.num_dofs(), trial.space.num_dofs());
    let mut row_dofs = Vec::new();
    let mut col_dofs = Vec::new();
    for (fine_idx, coarse_idx, element_matrix) in element_matrices {
        let (test_idx, trial_idx) = match relation {
            LevelRelation::SameLevel => (fine_idx, fine_idx),
            LevelRelation::FineTestCoarseTrial => (fine_idx, coarse_idx),
            LevelRelation::CoarseTestFineTrial => (coarse_idx, fine_idx),
        };
        test.space
            .populate_element_dofs(&test_mesh.connectivity()[test_idx], &mut row_dofs);
        trial
            .space
            .populate_element_dofs(&trial_mesh.connectivity()[trial_idx], &mut col_dofs);
        add_element_matrix_to_coo(&mut coo, &row_dofs, &col_dofs, &element_matrix);
    }

    // Duplicate entries are summed by the conversion
    Ok(CsrMatrix::from(&coo))
}

/// Fails fast if the integrator cannot produce the requested block.
pub(crate) fn check_integrator<const D: usize>(
    integrator: &dyn Integrator<D>,
    relation: LevelRelation,
    test_space: &FeSpace,
    trial_space: &FeSpace,
) -> Result<(), AssemblyError> {
    if !integrator.supports(relation) {
        return Err(AssemblyError::UnsupportedOperator {
            operator: integrator.operator_kind(),
            relation,
        });
    }
    if integrator.test_components() != test_space.solution_dim()
        || integrator.trial_components() != trial_space.solution_dim()
    {
        return Err(AssemblyError::structural(format!(
            "{:?} integrator with {} test and {} trial components applied to spaces with {} and {} components",
            integrator.operator_kind(),
            integrator.test_components(),
            integrator.trial_components(),
            test_space.solution_dim(),
            trial_space.solution_dim()
        )));
    }
    Ok(())
}
