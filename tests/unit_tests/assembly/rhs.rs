use nalgebra::{DVector, Point2};
use sparse_heat::assembly::form::LevelCoupling;
use sparse_heat::assembly::rhs::RhsAssembler;
use sparse_heat::assembly::system::SparseSystemAssembler;
use sparse_heat::assembly::temporal::uniform_temporal_hierarchy;
use sparse_heat::error::AssemblyError;
use sparse_heat::hierarchy::{NestedFeHierarchy, NestedMeshHierarchy};
use sparse_heat::mesh::procedural::create_unit_square_uniform_tri_mesh_2d;
use sparse_heat::problem::{ConstantMedium, FnHeatProblem, ZeroDataProblem};
use sparse_heat_linalg::BlockOffsets;

fn unit_square_hierarchy() -> NestedMeshHierarchy<2, sparse_heat::connectivity::Tri3d2Connectivity> {
    NestedMeshHierarchy::from_uniform_refinement(create_unit_square_uniform_tri_mesh_2d(1), 1).unwrap()
}

#[test]
fn zero_data_gives_zero_rhs() {
    let temporal_meshes = uniform_temporal_hierarchy(1.0, 0, 2).unwrap();
    let temporal = NestedFeHierarchy::hierarchical(&temporal_meshes).unwrap();
    let spatial = unit_square_hierarchy();
    let u = NestedFeHierarchy::nodal(&spatial, 1);
    let q = NestedFeHierarchy::nodal(&spatial, 2);
    let assembler = SparseSystemAssembler::new(&temporal, &u, &q, LevelCoupling::Adjacent).unwrap();
    let rhs = assembler.assemble_rhs(&ZeroDataProblem).unwrap();
    assert_eq!(rhs.len(), assembler.system_offsets().total_size());
    assert_eq!(rhs, DVector::zeros(rhs.len()));
}

#[test]
fn initial_temperature_enters_coarse_temperature_block_at_initial_node() {
    let temporal_meshes = uniform_temporal_hierarchy(1.0, 0, 2).unwrap();
    let temporal = NestedFeHierarchy::hierarchical(&temporal_meshes).unwrap();
    let spatial = unit_square_hierarchy();
    let u = NestedFeHierarchy::nodal(&spatial, 1);
    let q = NestedFeHierarchy::nodal(&spatial, 2);
    let assembler = SparseSystemAssembler::new(&temporal, &u, &q, LevelCoupling::Adjacent).unwrap();

    let problem = FnHeatProblem::new(ConstantMedium(1.0), |_: f64, _: &Point2<f64>| 0.0, |_: &Point2<f64>| 1.0);
    let rhs = assembler.assemble_rhs(&problem).unwrap();
    let offsets = assembler.system_offsets();

    // Level 0 is paired with spatial level 1 (9 vertices); temporal node 0 lies at t = 0
    let level0 = rhs.rows(offsets.block_offset(0), offsets.block_size(0));
    let at_initial = level0.rows(0, 9);
    assert!((at_initial.sum() - 1.0).abs() < 1e-13);
    assert!(at_initial.iter().all(|&v| v > 0.0));
    assert!(level0.rows(9, 9).iter().all(|&v| v == 0.0));

    // Finer temporal functions vanish at t = 0, and the heat flux blocks see no source
    for block in 1..offsets.num_blocks() {
        let range = offsets.block_range(block);
        assert!(rhs.rows(range.start, range.len()).iter().all(|&v| v == 0.0));
    }
}

#[test]
fn constant_source_pairs_with_temporal_derivative() {
    let temporal_meshes = uniform_temporal_hierarchy(1.0, 0, 2).unwrap();
    let temporal = NestedFeHierarchy::hierarchical(&temporal_meshes).unwrap();
    let spatial = unit_square_hierarchy();
    let u = NestedFeHierarchy::nodal(&spatial, 1);
    let q = NestedFeHierarchy::nodal(&spatial, 2);
    let assembler = SparseSystemAssembler::new(&temporal, &u, &q, LevelCoupling::Adjacent).unwrap();

    let problem = FnHeatProblem::new(ConstantMedium(1.0), |_: f64, _: &Point2<f64>| 1.0, |_: &Point2<f64>| 0.0);
    let rhs = assembler.assemble_rhs(&problem).unwrap();
    let offsets = assembler.system_offsets();

    // int psi_0' = -1 and int psi_1' = 1 on the single coarse element
    let level0 = rhs.rows(offsets.block_offset(0), offsets.block_size(0));
    assert!((level0.rows(0, 9).sum() + 1.0).abs() < 1e-13);
    assert!((level0.rows(9, 9).sum() - 1.0).abs() < 1e-13);
    // The hat function of level 1 has zero mean derivative
    let level1 = rhs.rows(offsets.block_offset(1), offsets.block_size(1));
    assert!(level1.norm() < 1e-13);

    // Divergence of every flux component integrates to zero over all basis functions
    let flux0 = rhs.rows(offsets.block_offset(2), offsets.block_size(2));
    for t in 0..2 {
        for component in 0..2 {
            let sum: f64 = (0..9).map(|node| flux0[t * 18 + 2 * node + component]).sum();
            assert!(sum.abs() < 1e-13);
        }
    }
}

#[test]
fn mismatched_layout_is_rejected() {
    let temporal_meshes = uniform_temporal_hierarchy(1.0, 0, 2).unwrap();
    let temporal = NestedFeHierarchy::hierarchical(&temporal_meshes).unwrap();
    let spatial = unit_square_hierarchy();
    let u = NestedFeHierarchy::nodal(&spatial, 1);
    let q = NestedFeHierarchy::nodal(&spatial, 2);

    let assembler = RhsAssembler::new(&temporal, &u, &q, &[1, 0]);
    let wrong = BlockOffsets::from_sizes([2 * 4, 9, 2 * 8, 18]);
    let result = assembler.assemble(&ZeroDataProblem, &wrong);
    assert!(matches!(result, Err(AssemblyError::StructuralMismatch { .. })));

    let right = BlockOffsets::from_sizes([2 * 9, 4, 2 * 18, 8]);
    assert_eq!(assembler.assemble(&ZeroDataProblem, &right).unwrap().len(), 66);

    let assembler = RhsAssembler::new(&temporal, &u, &q, &[0]);
    let result = assembler.assemble(&ZeroDataProblem, &right);
    assert!(matches!(result, Err(AssemblyError::StructuralMismatch { .. })));

    let assembler = RhsAssembler::new(&temporal, &u, &q, &[2, 0]);
    let result = assembler.assemble(&ZeroDataProblem, &right);
    assert!(matches!(result, Err(AssemblyError::StructuralMismatch { .. })));
}
