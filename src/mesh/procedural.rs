//! Basic procedural mesh generation routines.
use crate::connectivity::{Segment1dConnectivity, Tri3d2Connectivity};
use crate::mesh::{IntervalMesh, TriangleMesh2d};
use nalgebra::{Point1, Point2, Vector2};

/// Uniform mesh of `[start, end]` with vertices numbered left to right.
///
/// Returns an empty mesh if `num_elements` is zero.
pub fn create_interval_mesh(start: f64, end: f64, num_elements: usize) -> IntervalMesh {
    if num_elements == 0 {
        return IntervalMesh::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let h = (end - start) / num_elements as f64;
    let vertices = (0..=num_elements)
        .map(|i| Point1::new(start + i as f64 * h))
        .collect();
    let connectivity = (0..num_elements)
        .map(|i| Segment1dConnectivity([i, i + 1]))
        .collect();
    IntervalMesh::from_vertices_and_connectivity(vertices, connectivity)
}

pub fn create_unit_square_uniform_tri_mesh_2d(cells_per_dim: usize) -> TriangleMesh2d {
    create_rectangular_uniform_tri_mesh_2d(&Point2::origin(), &Vector2::new(1.0, 1.0), [cells_per_dim; 2])
}

/// Axis-aligned rectangle with the given lower-left corner and extents, split into
/// `cells[0] x cells[1]` squares that are each cut into two counter-clockwise triangles.
pub fn create_rectangular_uniform_tri_mesh_2d(
    lower_left: &Point2<f64>,
    extents: &Vector2<f64>,
    cells: [usize; 2],
) -> TriangleMesh2d {
    let [num_cells_x, num_cells_y] = cells;
    if num_cells_x == 0 || num_cells_y == 0 {
        return TriangleMesh2d::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let cell_size = Vector2::new(extents.x / num_cells_x as f64, extents.y / num_cells_y as f64);
    let to_global_vertex_index = |i, j| (num_cells_x + 1) * j + i;

    let mut vertices = Vec::with_capacity((num_cells_x + 1) * (num_cells_y + 1));
    for j in 0..=num_cells_y {
        for i in 0..=num_cells_x {
            let offset = Vector2::new(i as f64 * cell_size.x, j as f64 * cell_size.y);
            vertices.push(lower_left + offset);
        }
    }

    let mut connectivity = Vec::with_capacity(2 * num_cells_x * num_cells_y);
    for j in 0..num_cells_y {
        for i in 0..num_cells_x {
            let v00 = to_global_vertex_index(i, j);
            let v10 = to_global_vertex_index(i + 1, j);
            let v11 = to_global_vertex_index(i + 1, j + 1);
            let v01 = to_global_vertex_index(i, j + 1);
            connectivity.push(Tri3d2Connectivity([v00, v10, v11]));
            connectivity.push(Tri3d2Connectivity([v00, v11, v01]));
        }
    }

    TriangleMesh2d::from_vertices_and_connectivity(vertices, connectivity)
}
