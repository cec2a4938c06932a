use crate::element::{Segment1dElement, Tri3d2Element};
use crate::mesh::procedural::{create_interval_mesh, create_rectangular_uniform_tri_mesh_2d};
use crate::mesh::{IntervalMesh, TriangleMesh2d};
use ::proptest::prelude::*;
use nalgebra::{Point2, Vector2};
use std::cmp::max;

pub fn point2() -> impl Strategy<Value = Point2<f64>> {
    // Pick a reasonably small range to pick coordinates from,
    // otherwise we can easily get floating point numbers that are
    // so ridiculously large as to break anything we might want to do with them
    let range = -10.0..10.0;
    [range.clone(), range.clone()].prop_map(|[x, y]| Point2::new(x, y))
}

impl Arbitrary for Segment1dElement {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        (-10.0..10.0, 0.01..10.0)
            .prop_map(|(a, length): (f64, f64)| Self::from_interval([a, a + length]))
            .boxed()
    }
}

impl Arbitrary for Tri3d2Element {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        [point2(), point2(), point2()]
            .prop_filter("Triangle must not be degenerate", |[a, b, c]| {
                let area = 0.5 * (b - a).perp(&(c - a)).abs();
                area > 1e-3
            })
            .prop_map(|[a, b, c]| {
                // Swap two vertices of clockwise triangles
                if (b - a).perp(&(c - a)) > 0.0 {
                    Self::from_vertices([a, b, c])
                } else {
                    Self::from_vertices([a, c, b])
                }
            })
            .boxed()
    }
}

// Returns a strategy in which each value is a triplet (cells_per_unit, units_x, units_y)
// such that cells_per_unit^2 * units_x * units_y <= max_cells
fn rectangular_uniform_mesh_cell_distribution_strategy(
    max_cells: usize,
) -> impl Strategy<Value = (usize, usize, usize)> {
    let max_cells_per_unit = f64::floor(f64::sqrt(max_cells as f64)) as usize;
    (1..=max(1, max_cells_per_unit))
        .prop_flat_map(move |cells_per_unit| (Just(cells_per_unit), 0..=max_cells / (cells_per_unit * cells_per_unit)))
        .prop_flat_map(move |(cells_per_unit, units_x)| {
            let units_y_strategy = 0..=max_cells / (cells_per_unit * cells_per_unit * max(1, units_x));
            (Just(cells_per_unit), Just(units_x), units_y_strategy)
        })
}

/// Uniform triangle meshes of rectangles made of `units_x x units_y` squares of side
/// `unit_length`, with at most `2 * max_cells` triangles.
pub fn rectangular_uniform_mesh_strategy(
    unit_length: f64,
    max_cells: usize,
) -> impl Strategy<Value = TriangleMesh2d> {
    rectangular_uniform_mesh_cell_distribution_strategy(max_cells).prop_map(
        move |(cells_per_unit, units_x, units_y)| {
            create_rectangular_uniform_tri_mesh_2d(
                &Point2::origin(),
                &Vector2::new(unit_length * units_x as f64, unit_length * units_y as f64),
                [cells_per_unit * units_x, cells_per_unit * units_y],
            )
        },
    )
}

/// Uniform meshes of `[0, length]` with between 1 and `max_elements` elements.
pub fn interval_mesh_strategy(length: f64, max_elements: usize) -> impl Strategy<Value = IntervalMesh> {
    (1..=max(1, max_elements)).prop_map(move |n| create_interval_mesh(0.0, length, n))
}
