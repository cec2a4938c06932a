//! Linear finite elements and the maps between their reference domains.
use crate::connectivity::Connectivity;
use crate::quadrature::QuadraturePair;
use eyre::eyre;
use nalgebra::{Const, DMatrix, DVector, Dyn, OMatrix, Point, SMatrix, SVector};

mod segment;
mod triangle;

pub use segment::*;
pub use triangle::*;

/// Basis gradients with one column per node.
pub type GradientMatrix<const D: usize> = OMatrix<f64, Const<D>, Dyn>;

/// An affine map `xi -> A xi + b` between reference domains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMap<const D: usize> {
    pub matrix: SMatrix<f64, D, D>,
    pub translation: SVector<f64, D>,
}

impl<const D: usize> AffineMap<D> {
    pub fn identity() -> Self {
        Self {
            matrix: SMatrix::identity(),
            translation: SVector::zeros(),
        }
    }

    pub fn apply(&self, xi: &Point<f64, D>) -> Point<f64, D> {
        Point::from(self.matrix * xi.coords + self.translation)
    }

    /// Returns the map `x -> outer(self(x))`.
    pub fn then(&self, outer: &AffineMap<D>) -> AffineMap<D> {
        AffineMap {
            matrix: outer.matrix * self.matrix,
            translation: outer.matrix * self.translation + outer.translation,
        }
    }
}

// Small dense factorizations are only implemented for dimensions known to nalgebra's
// `DimMin`, so go through a dynamic matrix for generic `D`.
fn determinant<const D: usize>(matrix: &SMatrix<f64, D, D>) -> f64 {
    DMatrix::from_column_slice(D, D, matrix.as_slice()).determinant()
}

fn try_inverse<const D: usize>(matrix: &SMatrix<f64, D, D>) -> Option<SMatrix<f64, D, D>> {
    DMatrix::from_column_slice(D, D, matrix.as_slice())
        .try_inverse()
        .map(|inverse| SMatrix::from_column_slice(inverse.as_slice()))
}

/// A finite element with an affine geometry map from its reference domain.
pub trait FiniteElement<const D: usize>: Send + Sync {
    fn num_nodes(&self) -> usize;

    /// Reference coordinates of the node with the given local index.
    fn reference_node(&self, local_index: usize) -> Point<f64, D>;

    fn evaluate_basis(&self, xi: &Point<f64, D>) -> DVector<f64>;

    /// Gradients of the basis functions with respect to reference coordinates.
    fn reference_gradients(&self, xi: &Point<f64, D>) -> GradientMatrix<D>;

    fn reference_jacobian(&self, xi: &Point<f64, D>) -> SMatrix<f64, D, D>;

    fn map_reference_coords(&self, xi: &Point<f64, D>) -> Point<f64, D>;

    fn contains_reference_point(&self, xi: &Point<f64, D>, tol: f64) -> bool;

    /// Measure of the reference domain.
    fn reference_measure(&self) -> f64;

    /// A quadrature rule on the reference domain of at least the given strength.
    fn quadrature(&self, strength: usize) -> eyre::Result<QuadraturePair<D>>;

    fn diameter(&self) -> f64;

    fn vertices(&self) -> &[Point<f64, D>];

    fn centroid(&self) -> Point<f64, D> {
        let vertices = self.vertices();
        let sum = vertices
            .iter()
            .fold(SVector::<f64, D>::zeros(), |acc, v| acc + v.coords);
        Point::from(sum / vertices.len() as f64)
    }

    fn measure(&self) -> f64 {
        let xi = Point::origin();
        determinant(&self.reference_jacobian(&xi)).abs() * self.reference_measure()
    }

    /// Inverse of the geometry map.
    fn map_physical_coords(&self, x: &Point<f64, D>) -> eyre::Result<Point<f64, D>> {
        let xi0 = Point::origin();
        let x0 = self.map_reference_coords(&xi0);
        let j_inv = try_inverse(&self.reference_jacobian(&xi0))
            .ok_or_else(|| eyre!("Element has a singular Jacobian"))?;
        Ok(Point::from(j_inv * (x - x0)))
    }

    /// Gradients of the basis functions with respect to physical coordinates.
    fn physical_gradients(&self, xi: &Point<f64, D>) -> eyre::Result<GradientMatrix<D>> {
        let j_inv_t = try_inverse(&self.reference_jacobian(xi))
            .ok_or_else(|| eyre!("Element has a singular Jacobian"))?
            .transpose();
        Ok(j_inv_t * self.reference_gradients(xi))
    }

    /// The affine map from the reference domain of `self` to the reference domain of `other`.
    fn reference_map_into(&self, other: &dyn FiniteElement<D>) -> eyre::Result<AffineMap<D>> {
        let xi0 = Point::origin();
        let x0 = self.map_reference_coords(&xi0);
        let translation = other.map_physical_coords(&x0)?.coords;
        let other_j_inv = try_inverse(&other.reference_jacobian(&xi0))
            .ok_or_else(|| eyre!("Element has a singular Jacobian"))?;
        Ok(AffineMap {
            matrix: other_j_inv * self.reference_jacobian(&xi0),
            translation,
        })
    }
}

pub trait ElementConnectivity<const D: usize>: Connectivity + Send + Sync {
    type Element: FiniteElement<D>;

    /// Returns `None` if a vertex index is out of bounds.
    fn element(&self, vertices: &[Point<f64, D>]) -> Option<Self::Element>;
}
