use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};
use sparse_heat::assembly::form::{BlockBilinearForm, BlockMixedBilinearForm, LevelCoupling};
use sparse_heat::assembly::integrators::{
    DivergenceIntegrator, InitialIntegrator, LevelRelation, MassIntegrator, OperatorKind, StiffnessIntegrator,
    VectorMassIntegrator,
};
use sparse_heat::assembly::temporal::uniform_temporal_hierarchy;
use sparse_heat::error::AssemblyError;
use sparse_heat::hierarchy::{NestedFeHierarchy, NestedMeshHierarchy};
use sparse_heat::mesh::procedural::create_unit_square_uniform_tri_mesh_2d;
use std::sync::Arc;

fn square_hierarchy(num_refinements: usize) -> NestedMeshHierarchy<2, sparse_heat::connectivity::Tri3d2Connectivity> {
    NestedMeshHierarchy::from_uniform_refinement(create_unit_square_uniform_tri_mesh_2d(1), num_refinements).unwrap()
}

#[test]
fn coupled_pairs() {
    let adjacent: Vec<_> = LevelCoupling::Adjacent.coupled_pairs(3).collect();
    assert_eq!(adjacent, [(0, 0), (0, 1), (1, 0), (1, 1), (1, 2), (2, 1), (2, 2)]);
    assert_eq!(LevelCoupling::Full.coupled_pairs(3).count(), 9);
    assert!(LevelCoupling::Full.couples(0, 5));
    assert!(!LevelCoupling::Adjacent.couples(0, 2));
}

#[test]
fn cross_level_blocks_reproduce_coarse_functions() {
    let meshes = square_hierarchy(1);
    let fe = NestedFeHierarchy::nodal(&meshes, 1);
    let mut form = BlockBilinearForm::new(&fe);
    form.allocate_block_matrix().unwrap();
    form.add_domain_integrator_for_levels(Arc::new(MassIntegrator), LevelCoupling::Adjacent)
        .unwrap();
    form.assemble().unwrap();
    let mass = form.block_matrix().unwrap();

    // The linear function x is represented exactly on both levels, so pairing it with the
    // fine basis gives the same vector whether it comes from the coarse or the fine level
    let x_coarse = DVector::from_iterator(4, meshes.mesh(0).vertices().iter().map(|v| v.x));
    let x_fine = DVector::from_iterator(9, meshes.mesh(1).vertices().iter().map(|v| v.x));
    let m10 = DMatrix::from(mass.block(1, 0).unwrap());
    let m11 = DMatrix::from(mass.block(1, 1).unwrap());
    assert_matrix_eq!(&m10 * &x_coarse, &m11 * &x_fine, comp = abs, tol = 1e-13);

    let m01 = DMatrix::from(mass.block(0, 1).unwrap());
    assert_matrix_eq!(m01, m10.transpose(), comp = abs, tol = 1e-14);
    // Total mass of the constant function is the area of the domain
    let ones = DVector::from_element(4, 1.0);
    assert!((ones.dot(&(DMatrix::from(mass.block(0, 0).unwrap()) * &ones)) - 1.0).abs() < 1e-13);
}

#[test]
fn integrators_on_the_same_block_sum() {
    let meshes = square_hierarchy(0);
    let fe = NestedFeHierarchy::nodal(&meshes, 1);

    let mut single = BlockBilinearForm::new(&fe);
    single.allocate_block_matrix().unwrap();
    single
        .add_domain_integrator(Arc::new(StiffnessIntegrator::unit()), 0, 0)
        .unwrap();
    single.assemble().unwrap();

    let mut double = BlockBilinearForm::new(&fe);
    double.allocate_block_matrix().unwrap();
    double
        .add_domain_integrator(Arc::new(StiffnessIntegrator::unit()), 0, 0)
        .unwrap();
    double
        .add_domain_integrator(Arc::new(StiffnessIntegrator::unit()), 0, 0)
        .unwrap();
    double.assemble().unwrap();

    let single = DMatrix::from(single.block_matrix().unwrap().block(0, 0).unwrap());
    let double = DMatrix::from(double.block_matrix().unwrap().block(0, 0).unwrap());
    assert_matrix_eq!(double, single * 2.0, comp = abs, tol = 1e-14);
}

#[test]
fn mixed_form_has_rectangular_blocks() {
    let meshes = square_hierarchy(1);
    let u = NestedFeHierarchy::nodal(&meshes, 1);
    let q = NestedFeHierarchy::nodal(&meshes, 2);
    let mut form = BlockMixedBilinearForm::new(&u, &q);
    form.allocate_block_matrix().unwrap();
    form.add_domain_integrator_for_levels(Arc::new(DivergenceIntegrator), LevelCoupling::Full)
        .unwrap();
    form.assemble().unwrap();

    let matrix = form.into_block_matrix().unwrap();
    assert_eq!(matrix.nrows(), 4 + 9);
    assert_eq!(matrix.ncols(), 8 + 18);
    assert_eq!(matrix.block(0, 1).unwrap().nrows(), 4);
    assert_eq!(matrix.block(0, 1).unwrap().ncols(), 18);
}

#[test]
fn access_before_assembly_fails() {
    let meshes = square_hierarchy(0);
    let fe = NestedFeHierarchy::nodal(&meshes, 1);
    let mut form = BlockBilinearForm::new(&fe);
    assert!(matches!(form.block_matrix(), Err(AssemblyError::UnassembledAccess { .. })));
    // Assembly requires allocation
    assert!(matches!(form.assemble(), Err(AssemblyError::UnassembledAccess { .. })));
    form.allocate_block_matrix().unwrap();
    assert!(matches!(form.block_matrix(), Err(AssemblyError::UnassembledAccess { .. })));
    // Without integrators every block stays empty
    form.assemble().unwrap();
    assert!(!form.block_matrix().unwrap().has_block(0, 0));
}

#[test]
fn out_of_range_block_is_a_structural_mismatch() {
    let meshes = square_hierarchy(1);
    let fe = NestedFeHierarchy::nodal(&meshes, 1);
    let mut form = BlockBilinearForm::new(&fe);
    let result = form.add_domain_integrator(Arc::new(MassIntegrator), 2, 0);
    assert!(matches!(result, Err(AssemblyError::StructuralMismatch { .. })));
}

#[test]
fn component_mismatch_is_a_structural_mismatch() {
    let meshes = square_hierarchy(0);
    let fe = NestedFeHierarchy::nodal(&meshes, 1);
    let mut form = BlockBilinearForm::new(&fe);
    form.allocate_block_matrix().unwrap();
    form.add_domain_integrator(Arc::new(VectorMassIntegrator), 0, 0)
        .unwrap();
    assert!(matches!(form.assemble(), Err(AssemblyError::StructuralMismatch { .. })));
}

#[test]
fn hierarchies_on_different_meshes_are_rejected() {
    let meshes_a = square_hierarchy(0);
    let meshes_b = square_hierarchy(0);
    let u = NestedFeHierarchy::nodal(&meshes_a, 1);
    let v = NestedFeHierarchy::nodal(&meshes_b, 1);
    let mut form = BlockMixedBilinearForm::new(&u, &v);
    assert!(matches!(
        form.allocate_block_matrix(),
        Err(AssemblyError::StructuralMismatch { .. })
    ));

    let incomplete = NestedFeHierarchy::new(&meshes_a);
    let mut form = BlockBilinearForm::new(&incomplete);
    assert!(matches!(
        form.allocate_block_matrix(),
        Err(AssemblyError::StructuralMismatch { .. })
    ));
}

#[test]
fn unsupported_relation_fails_before_any_block_is_replaced() {
    let meshes = uniform_temporal_hierarchy(1.0, 0, 2).unwrap();
    let fe = NestedFeHierarchy::hierarchical(&meshes).unwrap();
    let mut form = BlockBilinearForm::new(&fe);
    form.allocate_block_matrix().unwrap();
    form.add_domain_integrator(Arc::new(MassIntegrator), 0, 0)
        .unwrap();
    form.assemble().unwrap();
    let assembled = form.block_matrix().unwrap().clone();

    form.add_domain_integrator(Arc::new(InitialIntegrator::at_time(0.0)), 1, 0)
        .unwrap();
    match form.assemble() {
        Err(AssemblyError::UnsupportedOperator { operator, relation }) => {
            assert_eq!(operator, OperatorKind::Initial);
            assert_eq!(relation, LevelRelation::FineTestCoarseTrial);
        }
        other => panic!("Expected unsupported operator, got {:?}", other),
    }
    assert_eq!(form.block_matrix().unwrap(), &assembled);
}
