use matrixcompare::assert_scalar_eq;
use nalgebra::Point1;
use sparse_heat::assembly::temporal::{initial_time, uniform_temporal_hierarchy};
use sparse_heat::element::{AffineMap, FiniteElement};
use sparse_heat::error::AssemblyError;
use sparse_heat::hierarchy::{NestedFeHierarchy, NestedMeshHierarchy};
use sparse_heat::mesh::procedural::{create_interval_mesh, create_unit_square_uniform_tri_mesh_2d};
use sparse_heat::mesh::transformation::{build_hierarchical_transformations, MeshTransformationTable};
use sparse_heat::space::FeSpace;

#[test]
fn uniform_refinement_hierarchy_levels() {
    let hierarchy = NestedMeshHierarchy::from_uniform_refinement(create_unit_square_uniform_tri_mesh_2d(1), 2).unwrap();
    assert_eq!(hierarchy.num_levels(), 3);
    assert_eq!(hierarchy.transformations().len(), 2);
    assert_eq!(
        (0..3).map(|l| hierarchy.num_elements(l)).collect::<Vec<_>>(),
        [2, 8, 32]
    );
    let widths = hierarchy.mesh_widths();
    assert_scalar_eq!(widths[0], 2f64.sqrt(), comp = abs, tol = 1e-14);
    assert_scalar_eq!(widths[2], 2f64.sqrt() / 4.0, comp = abs, tol = 1e-14);
}

#[test]
fn ancestors_contain_their_descendants() {
    let hierarchy = NestedMeshHierarchy::from_uniform_refinement(create_interval_mesh(0.0, 1.0, 2), 2).unwrap();
    assert_eq!(hierarchy.parent(0, 1), None);

    for element in 0..hierarchy.num_elements(2) {
        let (ancestor, map) = hierarchy.ancestor_with_map(2, element, 0);
        let parent = hierarchy.parent(2, element).unwrap();
        assert_eq!(hierarchy.parent(1, parent), Some(ancestor));
        assert_eq!(hierarchy.ancestor(2, element, 2), element);

        let fine = hierarchy.mesh(2).element(element).unwrap();
        let coarse = hierarchy.mesh(0).element(ancestor).unwrap();
        let xi = Point1::new(0.25);
        let x_fine = fine.map_reference_coords(&xi);
        let x_coarse = coarse.map_reference_coords(&map.apply(&xi));
        assert_scalar_eq!(x_fine.x, x_coarse.x, comp = abs, tol = 1e-14);
    }
    // Elements are numbered left to right: the first quarter of [0, 1] belongs to element 0
    assert_eq!(hierarchy.ancestor(2, 1, 0), 0);
    assert_eq!(hierarchy.ancestor(2, 4, 0), 1);
}

#[test]
fn add_mesh_with_transformation_verifies_tiling() {
    let coarse = create_interval_mesh(0.0, 1.0, 1);
    let fine = create_interval_mesh(0.0, 1.0, 2);
    let table = build_hierarchical_transformations(&coarse, &fine).unwrap();

    let mut hierarchy = NestedMeshHierarchy::new(coarse.clone());
    hierarchy.add_mesh_with_transformation(fine, table.clone()).unwrap();
    assert_eq!(hierarchy.num_levels(), 2);

    let mut hierarchy = NestedMeshHierarchy::new(coarse);
    let result = hierarchy.add_mesh_with_transformation(create_interval_mesh(0.0, 1.0, 3), table);
    assert!(matches!(result, Err(AssemblyError::StructuralMismatch { .. })));
    assert_eq!(hierarchy.num_levels(), 1);
}

#[test]
fn add_mesh_with_transformation_rejects_wrong_maps() {
    let coarse = create_interval_mesh(0.0, 1.0, 1);
    let fine = create_interval_mesh(0.0, 1.0, 2);
    let table = MeshTransformationTable::try_new(1, vec![0, 0], vec![AffineMap::identity(); 2]).unwrap();

    let mut hierarchy = NestedMeshHierarchy::new(coarse);
    let result = hierarchy.add_mesh_with_transformation(fine, table);
    assert!(matches!(result, Err(AssemblyError::HierarchyInconsistency { .. })));
    assert_eq!(hierarchy.num_levels(), 1);
}

#[test]
fn three_level_temporal_hierarchy() {
    let meshes = uniform_temporal_hierarchy(1.0, 1, 3).unwrap();
    assert_eq!(meshes.num_levels(), 3);
    assert_eq!(
        (0..3).map(|l| meshes.num_elements(l)).collect::<Vec<_>>(),
        [2, 4, 8]
    );
    // Children are consecutive and ordered left to right
    assert_eq!(meshes.parent(2, 5), Some(2));
    assert_eq!(meshes.ancestor(2, 5, 0), 1);
    assert_eq!(meshes.transformations()[1].children(3), [6, 7]);
}

#[test]
fn temporal_hierarchical_space_sizes() {
    for min_level in 0..3u32 {
        let meshes = uniform_temporal_hierarchy(2.0, min_level, 4).unwrap();
        let fe = NestedFeHierarchy::hierarchical(&meshes).unwrap();
        let n = 1usize << min_level;
        assert_eq!(fe.num_dofs(), [n + 1, n, 2 * n, 4 * n]);
        fe.check_complete().unwrap();
    }
    let meshes = uniform_temporal_hierarchy(2.0, 0, 1).unwrap();
    assert_eq!(initial_time(&meshes), 0.0);
    assert!(matches!(
        uniform_temporal_hierarchy(1.0, 0, 0),
        Err(AssemblyError::StructuralMismatch { .. })
    ));
}

#[test]
fn add_fe_space_checks_level_and_size() {
    let meshes = NestedMeshHierarchy::from_uniform_refinement(create_interval_mesh(0.0, 1.0, 1), 1).unwrap();
    let mut fe = NestedFeHierarchy::new(&meshes);
    assert!(matches!(fe.check_complete(), Err(AssemblyError::StructuralMismatch { .. })));

    assert!(matches!(
        fe.add_fe_space(FeSpace::nodal(3, 1)),
        Err(AssemblyError::StructuralMismatch { .. })
    ));
    fe.add_fe_space(FeSpace::nodal(2, 1)).unwrap();
    fe.add_fe_space(FeSpace::nodal(3, 2)).unwrap();
    fe.check_complete().unwrap();
    assert_eq!(fe.num_dofs(), [2, 6]);
    assert!(matches!(
        fe.add_fe_space(FeSpace::nodal(3, 1)),
        Err(AssemblyError::StructuralMismatch { .. })
    ));

    let nodal = NestedFeHierarchy::nodal(&meshes, 2);
    assert_eq!(nodal.num_dofs(), [4, 6]);
    assert!(std::ptr::eq(nodal.mesh_hierarchy(), &meshes));
}
