//! Quadrature rules on the reference domains of the supported elements.
use fenris_quadrature::{polyquad, univariate};
use nalgebra::Point;

/// Errors returned by quadrature methods.
pub use fenris_quadrature::Error as QuadratureError;

/// Weights and points of a quadrature rule.
pub type QuadraturePair<const D: usize> = (Vec<f64>, Vec<Point<f64, D>>);

/// Gauss-Legendre rule on `[-1, 1]` that integrates polynomials of degree `strength` exactly.
pub fn segment(strength: usize) -> QuadraturePair<1> {
    let num_points = strength / 2 + 1;
    let (weights, points) = univariate::gauss(num_points);
    (weights, points.into_iter().map(Point::from).collect())
}

/// Rule on the reference triangle `(-1, -1), (1, -1), (-1, 1)` of at least the given strength.
pub fn triangle(strength: usize) -> Result<QuadraturePair<2>, QuadratureError> {
    let (weights, points) = polyquad::triangle(strength)?;
    Ok((weights, points.into_iter().map(Point::from).collect()))
}
