use crate::connectivity::Segment1dConnectivity;
use crate::element::{ElementConnectivity, FiniteElement, GradientMatrix};
use crate::quadrature::{self, QuadraturePair};
use nalgebra::{DVector, Matrix1, Point1};

/// A linear segment in one dimension.
///
/// The reference element is the interval `[-1, 1]` with basis functions
/// `(1 - xi) / 2` and `(1 + xi) / 2`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Segment1dElement {
    vertices: [Point1<f64>; 2],
}

impl Segment1dElement {
    pub fn from_vertices(vertices: [Point1<f64>; 2]) -> Self {
        Self { vertices }
    }

    pub fn from_interval(interval: [f64; 2]) -> Self {
        Self::from_vertices([Point1::new(interval[0]), Point1::new(interval[1])])
    }

    pub fn reference() -> Self {
        Self::from_interval([-1.0, 1.0])
    }

    fn length(&self) -> f64 {
        self.vertices[1].x - self.vertices[0].x
    }
}

impl FiniteElement<1> for Segment1dElement {
    fn num_nodes(&self) -> usize {
        2
    }

    fn reference_node(&self, local_index: usize) -> Point1<f64> {
        assert!(local_index < 2, "Segment has two nodes");
        Point1::new(2.0 * local_index as f64 - 1.0)
    }

    fn evaluate_basis(&self, xi: &Point1<f64>) -> DVector<f64> {
        DVector::from_column_slice(&[0.5 * (1.0 - xi.x), 0.5 * (1.0 + xi.x)])
    }

    fn reference_gradients(&self, _xi: &Point1<f64>) -> GradientMatrix<1> {
        GradientMatrix::<1>::from_row_slice(&[-0.5, 0.5])
    }

    fn reference_jacobian(&self, _xi: &Point1<f64>) -> Matrix1<f64> {
        Matrix1::new(0.5 * self.length())
    }

    fn map_reference_coords(&self, xi: &Point1<f64>) -> Point1<f64> {
        let [a, b] = self.vertices;
        Point1::new(a.x + 0.5 * (xi.x + 1.0) * (b.x - a.x))
    }

    fn contains_reference_point(&self, xi: &Point1<f64>, tol: f64) -> bool {
        xi.x >= -1.0 - tol && xi.x <= 1.0 + tol
    }

    fn reference_measure(&self) -> f64 {
        2.0
    }

    fn quadrature(&self, strength: usize) -> eyre::Result<QuadraturePair<1>> {
        Ok(quadrature::segment(strength))
    }

    fn diameter(&self) -> f64 {
        self.length().abs()
    }

    fn vertices(&self) -> &[Point1<f64>] {
        &self.vertices
    }
}

impl ElementConnectivity<1> for Segment1dConnectivity {
    type Element = Segment1dElement;

    fn element(&self, vertices: &[Point1<f64>]) -> Option<Self::Element> {
        let [a, b] = self.0;
        Some(Segment1dElement::from_vertices([*vertices.get(a)?, *vertices.get(b)?]))
    }
}
