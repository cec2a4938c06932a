use nalgebra::Point2;
use sparse_heat::connectivity::{Segment1dConnectivity, Tri3d2Connectivity};
use sparse_heat::mesh::procedural::{create_interval_mesh, create_unit_square_uniform_tri_mesh_2d};
use sparse_heat::mesh::refinement::{refine_uniformly, uniform_refinement_sequence};
use sparse_heat::mesh::{Mesh, TriangleMesh2d};

#[test]
fn uniform_refinement_segment1d_keeps_left_to_right_order() {
    let mesh = create_interval_mesh(0.0, 1.0, 2);
    let refined = refine_uniformly(&mesh);

    let coords: Vec<_> = refined.vertices().iter().map(|v| v.x).collect();
    assert_eq!(coords, [0.0, 0.25, 0.5, 0.75, 1.0]);
    assert_eq!(
        refined.connectivity(),
        [
            Segment1dConnectivity([0, 1]),
            Segment1dConnectivity([1, 2]),
            Segment1dConnectivity([2, 3]),
            Segment1dConnectivity([3, 4])
        ]
    );
}

#[test]
fn uniform_refinement_tri3d2() {
    let mesh: TriangleMesh2d = Mesh::from_vertices_and_connectivity(
        vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(2.0, -1.0), Point2::new(2.5, 1.5), Point2::new(1.2, 1.0), Point2::new(0.0, 1.3)],
        vec![
            Tri3d2Connectivity([0, 1, 5]),
            Tri3d2Connectivity([1, 2, 3]),
            Tri3d2Connectivity([3, 4, 1]),
            Tri3d2Connectivity([1, 4, 5]),
        ],
    );
    let refined = refine_uniformly(&mesh);

    // Every triangle is split into four, every edge contributes a midpoint
    let num_edges = 9;
    assert_eq!(refined.num_elements(), 4 * mesh.num_elements());
    assert_eq!(refined.num_vertices(), mesh.num_vertices() + num_edges);
    assert!((refined.measure() - mesh.measure()).abs() < 1e-12);

    // Children of a coarse element are stored consecutively, the last one is the center triangle
    let [a, b, c] = mesh.connectivity()[0].0;
    let center = &refined.connectivity()[3];
    let centroid = |vertices: [usize; 3], mesh: &TriangleMesh2d| {
        vertices
            .iter()
            .map(|&v| mesh.vertices()[v].coords)
            .sum::<nalgebra::Vector2<f64>>()
            / 3.0
    };
    let diff = centroid(center.0, &refined) - centroid([a, b, c], &mesh);
    assert!(diff.norm() < 1e-12);
}

#[test]
fn refinement_sequence_matches_repeated_refinement() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(1);
    let sequence = uniform_refinement_sequence(mesh.clone(), 2);
    assert_eq!(sequence.len(), 3);
    assert_eq!(sequence[0], mesh);
    assert_eq!(sequence[2], refine_uniformly(&refine_uniformly(&mesh)));
    assert_eq!(uniform_refinement_sequence(mesh.clone(), 0), [mesh]);
    assert_eq!(sequence[2].num_elements(), 32);
    assert_eq!(sequence[2].num_vertices(), 25);
}
