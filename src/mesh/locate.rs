//! Accelerated point location in meshes.
use crate::element::{ElementConnectivity, FiniteElement};
use crate::mesh::Mesh;
use nalgebra::{Point, SVector};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::RTree;

/// Coordinates in the R-tree. rstar needs at least two dimensions, so points of lower-dimensional
/// meshes are padded with zeros.
type TreePoint = [f64; 3];

fn lift<const D: usize>(point: &Point<f64, D>) -> TreePoint {
    let mut lifted = [0.0; 3];
    for (i, x) in point.iter().take(3).enumerate() {
        lifted[i] = *x;
    }
    lifted
}

/// Bounding box of the given points, padded by a small fraction of its largest extent
/// to accommodate floating point errors.
fn padded_bounding_box<const D: usize>(points: &[Point<f64, D>]) -> Rectangle<TreePoint> {
    let mut min = points[0];
    let mut max = points[0];
    for p in &points[1..] {
        min = min.inf(p);
        max = max.sup(p);
    }
    let padding = 0.005 * (max - min).amax();
    let min = min - SVector::<f64, D>::repeat(padding);
    let max = max + SVector::<f64, D>::repeat(padding);
    Rectangle::from_corners(lift(&min), lift(&max))
}

/// Finds the elements of a mesh whose bounding boxes contain a given point.
pub struct ElementLocator<const D: usize> {
    tree: RTree<GeomWithData<Rectangle<TreePoint>, usize>>,
}

impl<const D: usize> ElementLocator<D> {
    /// # Panics
    ///
    /// Panics if `D > 3`.
    pub fn from_mesh<C>(mesh: &Mesh<D, C>) -> Self
    where
        C: ElementConnectivity<D>,
    {
        assert!(D <= 3, "Element location supports at most three dimensions");
        let geometries = mesh
            .element_iter()
            .enumerate()
            .map(|(i, element)| GeomWithData::new(padded_bounding_box(element.vertices()), i))
            .collect();
        Self {
            tree: RTree::bulk_load(geometries),
        }
    }

    /// Indices of elements that may contain the point, in ascending order.
    pub fn candidates(&self, point: &Point<f64, D>) -> Vec<usize> {
        let mut candidates: Vec<_> = self
            .tree
            .locate_all_at_point(&lift(point))
            .map(|geom| geom.data)
            .collect();
        candidates.sort_unstable();
        candidates
    }

    /// Indices of the elements that contain the point, confirmed in reference coordinates.
    pub fn locate<C>(&self, mesh: &Mesh<D, C>, point: &Point<f64, D>, tol: f64) -> Vec<usize>
    where
        C: ElementConnectivity<D>,
    {
        self.candidates(point)
            .into_iter()
            .filter(|&idx| {
                mesh.element(idx)
                    .and_then(|element| element.map_physical_coords(point).ok().map(|xi| (element, xi)))
                    .map_or(false, |(element, xi)| element.contains_reference_point(&xi, tol))
            })
            .collect()
    }
}
