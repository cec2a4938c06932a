use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, Point1, Point2};
use sparse_heat::assembly::direct::assemble_direct_system;
use sparse_heat::assembly::form::LevelCoupling;
use sparse_heat::assembly::system::SparseSystemAssembler;
use sparse_heat::assembly::temporal::uniform_temporal_hierarchy;
use sparse_heat::element::ElementConnectivity;
use sparse_heat::hierarchy::{NestedFeHierarchy, NestedMeshHierarchy};
use sparse_heat::mesh::procedural::{create_interval_mesh, create_unit_square_uniform_tri_mesh_2d};
use sparse_heat::mesh::Mesh;
use sparse_heat::problem::{ConstantMedium, Medium};

fn single_level_system<const D: usize, C, M>(
    end_time: f64,
    min_temporal_level: u32,
    spatial_mesh: Mesh<D, C>,
    medium: &M,
) -> DMatrix<f64>
where
    C: ElementConnectivity<D>,
    M: Medium<D>,
{
    let temporal_meshes = uniform_temporal_hierarchy(end_time, min_temporal_level, 1).unwrap();
    let temporal = NestedFeHierarchy::hierarchical(&temporal_meshes).unwrap();
    let spatial = NestedMeshHierarchy::new(spatial_mesh);
    let u = NestedFeHierarchy::nodal(&spatial, 1);
    let q = NestedFeHierarchy::nodal(&spatial, D);
    let mut assembler = SparseSystemAssembler::new(&temporal, &u, &q, LevelCoupling::Adjacent).unwrap();
    assembler.assemble_system_medium_independent().unwrap();
    DMatrix::from(&assembler.assemble_system_medium_dependent(medium).unwrap())
}

#[test]
fn single_level_hierarchical_system_matches_direct_assembly_1d() {
    let temporal_mesh = create_interval_mesh(0.0, 1.0, 1);
    let spatial_mesh = create_interval_mesh(0.0, 1.0, 2);
    let medium = ConstantMedium(1.0);

    let direct = DMatrix::from(&assemble_direct_system(&temporal_mesh, &spatial_mesh, &medium).unwrap());
    let hierarchical = single_level_system(1.0, 0, spatial_mesh, &medium);
    // Two temporal and three spatial nodes for u, and the same for the scalar flux
    assert_eq!(direct.shape(), (12, 12));
    assert_matrix_eq!(hierarchical, direct, comp = abs, tol = 1e-12);
}

#[test]
fn single_level_hierarchical_system_matches_direct_assembly_2d() {
    let temporal_mesh = create_interval_mesh(0.0, 2.0, 2);
    let spatial_mesh = create_unit_square_uniform_tri_mesh_2d(2);
    let medium = |x: &Point2<f64>| 1.0 + x.x + 0.5 * x.y;

    let direct = DMatrix::from(&assemble_direct_system(&temporal_mesh, &spatial_mesh, &medium).unwrap());
    let hierarchical = single_level_system(2.0, 1, spatial_mesh, &medium);
    assert_eq!(direct.nrows(), 3 * 9 + 3 * 18);
    assert_matrix_eq!(hierarchical, direct, comp = abs, tol = 1e-12);
}

#[test]
fn direct_system_is_symmetric() {
    let temporal_mesh = create_interval_mesh(0.0, 1.0, 3);
    let spatial_mesh = create_interval_mesh(-1.0, 1.0, 4);
    let medium = |x: &Point1<f64>| 2.0 + x.x;
    let direct = DMatrix::from(&assemble_direct_system(&temporal_mesh, &spatial_mesh, &medium).unwrap());
    assert_matrix_eq!(direct.clone(), direct.transpose(), comp = abs, tol = 1e-12);
}
