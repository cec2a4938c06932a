use nalgebra::{Point2, Vector2};
use sparse_heat::connectivity::{Segment1dConnectivity, Tri3d2Connectivity};
use sparse_heat::element::FiniteElement;
use sparse_heat::mesh::procedural::{create_interval_mesh, create_rectangular_uniform_tri_mesh_2d};

#[test]
fn interval_mesh_is_numbered_left_to_right() {
    let mesh = create_interval_mesh(1.0, 2.0, 4);
    let coords: Vec<_> = mesh.vertices().iter().map(|v| v.x).collect();
    assert_eq!(coords, [1.0, 1.25, 1.5, 1.75, 2.0]);
    assert_eq!(
        mesh.connectivity(),
        [
            Segment1dConnectivity([0, 1]),
            Segment1dConnectivity([1, 2]),
            Segment1dConnectivity([2, 3]),
            Segment1dConnectivity([3, 4])
        ]
    );
}

#[test]
fn empty_interval_mesh() {
    let mesh = create_interval_mesh(0.0, 1.0, 0);
    assert_eq!(mesh.num_vertices(), 0);
    assert_eq!(mesh.num_elements(), 0);
}

#[test]
fn rectangular_tri_mesh_layout() {
    let mesh = create_rectangular_uniform_tri_mesh_2d(&Point2::new(1.0, -1.0), &Vector2::new(2.0, 1.0), [2, 1]);
    assert_eq!(mesh.num_vertices(), 6);
    assert_eq!(mesh.vertices()[0], Point2::new(1.0, -1.0));
    assert_eq!(mesh.vertices()[5], Point2::new(3.0, 0.0));
    assert_eq!(mesh.connectivity()[0], Tri3d2Connectivity([0, 1, 4]));
    assert_eq!(mesh.connectivity()[1], Tri3d2Connectivity([0, 4, 3]));

    // All triangles are counter-clockwise
    for element in mesh.element_iter() {
        let xi = Point2::origin();
        assert!(element.reference_jacobian(&xi).determinant() > 0.0);
    }
    assert!((mesh.measure() - 2.0).abs() < 1e-14);
}
