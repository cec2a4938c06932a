use crate::connectivity::Tri3d2Connectivity;
use crate::element::{ElementConnectivity, FiniteElement, GradientMatrix};
use crate::quadrature::{self, QuadraturePair};
use eyre::WrapErr;
use itertools::Itertools;
use nalgebra::{distance, DVector, Matrix2, Matrix2x3, Point2, Vector2};

/// A finite element representing linear basis functions on a triangle, in two dimensions.
///
/// The reference element is the triangle defined by the corners
/// (-1, -1), (1, -1), (-1, 1), which is the domain of the quadrature rules we employ.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tri3d2Element {
    vertices: [Point2<f64>; 3],
}

impl Tri3d2Element {
    pub fn from_vertices(vertices: [Point2<f64>; 3]) -> Self {
        Self { vertices }
    }

    pub fn reference() -> Self {
        Self::from_vertices([Point2::new(-1.0, -1.0), Point2::new(1.0, -1.0), Point2::new(-1.0, 1.0)])
    }

    fn gradients() -> Matrix2x3<f64> {
        Matrix2x3::from_columns(&[Vector2::new(-0.5, -0.5), Vector2::new(0.5, 0.0), Vector2::new(0.0, 0.5)])
    }
}

impl FiniteElement<2> for Tri3d2Element {
    fn num_nodes(&self) -> usize {
        3
    }

    fn reference_node(&self, local_index: usize) -> Point2<f64> {
        Tri3d2Element::reference().vertices[local_index]
    }

    fn evaluate_basis(&self, xi: &Point2<f64>) -> DVector<f64> {
        DVector::from_column_slice(&[-0.5 * (xi.x + xi.y), 0.5 * (1.0 + xi.x), 0.5 * (1.0 + xi.y)])
    }

    fn reference_gradients(&self, _xi: &Point2<f64>) -> GradientMatrix<2> {
        let g = Self::gradients();
        GradientMatrix::<2>::from_column_slice(g.as_slice())
    }

    #[allow(non_snake_case)]
    fn reference_jacobian(&self, _xi: &Point2<f64>) -> Matrix2<f64> {
        let X: Matrix2x3<f64> = Matrix2x3::from_fn(|i, j| self.vertices[j][i]);
        X * Self::gradients().transpose()
    }

    #[allow(non_snake_case)]
    fn map_reference_coords(&self, xi: &Point2<f64>) -> Point2<f64> {
        let X: Matrix2x3<f64> = Matrix2x3::from_fn(|i, j| self.vertices[j][i]);
        Point2::from(X * self.evaluate_basis(xi))
    }

    fn contains_reference_point(&self, xi: &Point2<f64>, tol: f64) -> bool {
        xi.x >= -1.0 - tol && xi.y >= -1.0 - tol && xi.x + xi.y <= tol
    }

    fn reference_measure(&self) -> f64 {
        2.0
    }

    fn quadrature(&self, strength: usize) -> eyre::Result<QuadraturePair<2>> {
        quadrature::triangle(strength)
            .wrap_err_with(|| format!("No triangle quadrature rule of strength {}", strength))
    }

    fn diameter(&self) -> f64 {
        self.vertices
            .iter()
            .tuple_combinations()
            .map(|(x, y)| distance(x, y))
            .fold(0.0, f64::max)
    }

    fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }
}

impl ElementConnectivity<2> for Tri3d2Connectivity {
    type Element = Tri3d2Element;

    fn element(&self, vertices: &[Point2<f64>]) -> Option<Self::Element> {
        let Self(indices) = self;
        let lookup_vertex = |local_index: usize| vertices.get(indices[local_index]).cloned();

        Some(Tri3d2Element::from_vertices([
            lookup_vertex(0)?,
            lookup_vertex(1)?,
            lookup_vertex(2)?,
        ]))
    }
}
