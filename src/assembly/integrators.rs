//! Element-level integrators for the bilinear forms of the least-squares system.
//!
//! An integrator computes the local matrix of one bilinear operator for a pair of elements.
//! Both elements are the same on a single level. Across levels, the pair consists of a fine
//! element and its coarse ancestor, and integration always runs on the fine element, whose
//! restriction of any coarse basis function is again a polynomial.
use crate::element::{AffineMap, FiniteElement, GradientMatrix};
use eyre::eyre;
use nalgebra::{DMatrixViewMut, DVector, Point, Point1};
use serde::{Deserialize, Serialize};

/// Additional quadrature strength used for integrands with a non-constant coefficient.
const COEFFICIENT_EXTRA_STRENGTH: usize = 2;
/// Reference-coordinate tolerance for locating the point of a point functional.
const POINT_FUNCTIONAL_TOL: f64 = 1e-12;

/// The physical operator an integrator realizes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperatorKind {
    /// `(u, v)` for scalar functions.
    Mass,
    /// `(q, r)` for vector-valued functions.
    VectorMass,
    /// `(k grad u, grad v)`.
    Stiffness,
    /// `(div q, div r)`.
    DivDiv,
    /// `(k grad u, r)` with scalar trial and vector-valued test functions.
    Gradient,
    /// `(div q, v)` with vector-valued trial and scalar test functions.
    Divergence,
    /// `u(t0) v(t0)`, a point functional on one-dimensional meshes.
    Initial,
}

/// How the levels of the test and trial spaces relate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelRelation {
    SameLevel,
    FineTestCoarseTrial,
    CoarseTestFineTrial,
}

impl LevelRelation {
    /// The relation of block `(test_level, trial_level)`.
    pub fn between(test_level: usize, trial_level: usize) -> Self {
        use std::cmp::Ordering::*;
        match test_level.cmp(&trial_level) {
            Equal => Self::SameLevel,
            Greater => Self::FineTestCoarseTrial,
            Less => Self::CoarseTestFineTrial,
        }
    }
}

/// A scalar coefficient field.
pub trait Coefficient<const D: usize>: Send + Sync {
    fn evaluate(&self, x: &Point<f64, D>) -> f64;

    /// Whether the coefficient is known to be constant.
    fn is_constant(&self) -> bool {
        false
    }
}

impl<const D: usize, F> Coefficient<D> for F
where
    F: Fn(&Point<f64, D>) -> f64 + Send + Sync,
{
    fn evaluate(&self, x: &Point<f64, D>) -> f64 {
        self(x)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ConstantCoefficient(pub f64);

impl<const D: usize> Coefficient<D> for ConstantCoefficient {
    fn evaluate(&self, _x: &Point<f64, D>) -> f64 {
        self.0
    }

    fn is_constant(&self) -> bool {
        true
    }
}

/// A fine element, its ancestor on the other level and the map between their reference domains.
///
/// On a single level, both elements coincide and the map is the identity.
#[derive(Clone, Copy)]
pub struct ElementPair<'a, const D: usize> {
    relation: LevelRelation,
    fine: &'a dyn FiniteElement<D>,
    coarse: &'a dyn FiniteElement<D>,
    fine_to_coarse: AffineMap<D>,
}

/// Basis data of the test and trial elements at one quadrature point of the fine element.
pub struct QuadraturePointData<const D: usize> {
    /// Quadrature weight multiplied by the Jacobian determinant.
    pub weight: f64,
    /// Physical coordinates of the point.
    pub x: Point<f64, D>,
    pub test_values: DVector<f64>,
    pub trial_values: DVector<f64>,
    pub test_gradients: GradientMatrix<D>,
    pub trial_gradients: GradientMatrix<D>,
}

impl<'a, const D: usize> ElementPair<'a, D> {
    pub fn new(
        relation: LevelRelation,
        fine: &'a dyn FiniteElement<D>,
        coarse: &'a dyn FiniteElement<D>,
        fine_to_coarse: AffineMap<D>,
    ) -> Self {
        Self {
            relation,
            fine,
            coarse,
            fine_to_coarse,
        }
    }

    pub fn same_level(element: &'a dyn FiniteElement<D>) -> Self {
        Self::new(LevelRelation::SameLevel, element, element, AffineMap::identity())
    }

    pub fn relation(&self) -> LevelRelation {
        self.relation
    }

    /// The element on which quadrature is performed.
    pub fn fine_element(&self) -> &'a dyn FiniteElement<D> {
        self.fine
    }

    pub fn fine_to_coarse(&self) -> &AffineMap<D> {
        &self.fine_to_coarse
    }

    pub fn test_element(&self) -> &'a dyn FiniteElement<D> {
        match self.relation {
            LevelRelation::CoarseTestFineTrial => self.coarse,
            _ => self.fine,
        }
    }

    pub fn trial_element(&self) -> &'a dyn FiniteElement<D> {
        match self.relation {
            LevelRelation::FineTestCoarseTrial => self.coarse,
            _ => self.fine,
        }
    }

    /// Calls `f` for every point of a quadrature rule of the given strength on the fine element.
    pub fn for_each_quadrature_point(
        &self,
        strength: usize,
        mut f: impl FnMut(&QuadraturePointData<D>),
    ) -> eyre::Result<()> {
        let (weights, points) = self.fine.quadrature(strength)?;
        let jacobian_det = self.fine.measure() / self.fine.reference_measure();

        for (w, xi) in weights.iter().zip(&points) {
            let xi_coarse = self.fine_to_coarse.apply(xi);
            let fine_values = self.fine.evaluate_basis(xi);
            let fine_gradients = self.fine.physical_gradients(xi)?;
            let (coarse_values, coarse_gradients) = match self.relation {
                LevelRelation::SameLevel => (fine_values.clone(), fine_gradients.clone()),
                _ => (
                    self.coarse.evaluate_basis(&xi_coarse),
                    self.coarse.physical_gradients(&xi_coarse)?,
                ),
            };

            let (test_values, trial_values, test_gradients, trial_gradients) = match self.relation {
                LevelRelation::CoarseTestFineTrial => (coarse_values, fine_values, coarse_gradients, fine_gradients),
                _ => (fine_values, coarse_values, fine_gradients, coarse_gradients),
            };

            f(&QuadraturePointData {
                weight: w * jacobian_det,
                x: self.fine.map_reference_coords(xi),
                test_values,
                trial_values,
                test_gradients,
                trial_gradients,
            });
        }
        Ok(())
    }
}

/// Computes element matrices of one bilinear operator.
///
/// Element matrices have one row per test node and test component, ordered node-major with
/// interleaved components, and likewise one column per trial node and trial component.
pub trait Integrator<const D: usize>: Send + Sync {
    fn operator_kind(&self) -> OperatorKind;

    /// Number of components of the test functions.
    fn test_components(&self) -> usize {
        1
    }

    /// Number of components of the trial functions.
    fn trial_components(&self) -> usize {
        1
    }

    fn supports(&self, _relation: LevelRelation) -> bool {
        true
    }

    /// Adds the element matrix of the pair to `output`, which has the dimensions of the
    /// element matrix.
    fn assemble_element_matrix(&self, pair: &ElementPair<D>, output: DMatrixViewMut<f64>) -> eyre::Result<()>;
}

/// Mass matrix `(u, v)` of scalar functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct MassIntegrator;

impl<const D: usize> Integrator<D> for MassIntegrator {
    fn operator_kind(&self) -> OperatorKind {
        OperatorKind::Mass
    }

    fn assemble_element_matrix(&self, pair: &ElementPair<D>, mut output: DMatrixViewMut<f64>) -> eyre::Result<()> {
        pair.for_each_quadrature_point(2, |data| {
            output.ger(data.weight, &data.test_values, &data.trial_values, 1.0);
        })
    }
}

/// Mass matrix `(q, r)` of vector-valued functions with `D` components.
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorMassIntegrator;

impl<const D: usize> Integrator<D> for VectorMassIntegrator {
    fn operator_kind(&self) -> OperatorKind {
        OperatorKind::VectorMass
    }

    fn test_components(&self) -> usize {
        D
    }

    fn trial_components(&self) -> usize {
        D
    }

    fn assemble_element_matrix(&self, pair: &ElementPair<D>, mut output: DMatrixViewMut<f64>) -> eyre::Result<()> {
        pair.for_each_quadrature_point(2, |data| {
            for (a, phi_a) in data.test_values.iter().enumerate() {
                for (b, phi_b) in data.trial_values.iter().enumerate() {
                    for c in 0..D {
                        output[(D * a + c, D * b + c)] += data.weight * phi_a * phi_b;
                    }
                }
            }
        })
    }
}

/// Stiffness matrix `(k grad u, grad v)`.
#[derive(Debug, Clone, Copy)]
pub struct StiffnessIntegrator<K> {
    coefficient: K,
}

impl StiffnessIntegrator<ConstantCoefficient> {
    /// The Laplacian stiffness matrix `(grad u, grad v)`.
    pub fn unit() -> Self {
        Self::new(ConstantCoefficient(1.0))
    }
}

impl<K> StiffnessIntegrator<K> {
    pub fn new(coefficient: K) -> Self {
        Self { coefficient }
    }
}

impl<const D: usize, K: Coefficient<D>> Integrator<D> for StiffnessIntegrator<K> {
    fn operator_kind(&self) -> OperatorKind {
        OperatorKind::Stiffness
    }

    fn assemble_element_matrix(&self, pair: &ElementPair<D>, mut output: DMatrixViewMut<f64>) -> eyre::Result<()> {
        let strength = if self.coefficient.is_constant() {
            0
        } else {
            COEFFICIENT_EXTRA_STRENGTH
        };
        pair.for_each_quadrature_point(strength, |data| {
            let k = self.coefficient.evaluate(&data.x);
            output.gemm_tr(
                data.weight * k,
                &data.test_gradients,
                &data.trial_gradients,
                1.0,
            );
        })
    }
}

/// `(div q, div r)` for vector-valued functions with `D` components.
#[derive(Debug, Clone, Copy, Default)]
pub struct DivDivIntegrator;

impl<const D: usize> Integrator<D> for DivDivIntegrator {
    fn operator_kind(&self) -> OperatorKind {
        OperatorKind::DivDiv
    }

    fn test_components(&self) -> usize {
        D
    }

    fn trial_components(&self) -> usize {
        D
    }

    fn assemble_element_matrix(&self, pair: &ElementPair<D>, mut output: DMatrixViewMut<f64>) -> eyre::Result<()> {
        pair.for_each_quadrature_point(0, |data| {
            let test_grads = &data.test_gradients;
            let trial_grads = &data.trial_gradients;
            for a in 0..test_grads.ncols() {
                for b in 0..trial_grads.ncols() {
                    for c in 0..D {
                        for e in 0..D {
                            output[(D * a + c, D * b + e)] +=
                                data.weight * test_grads[(c, a)] * trial_grads[(e, b)];
                        }
                    }
                }
            }
        })
    }
}

/// `(k grad u, r)`: scalar trial functions, vector-valued test functions with `D` components.
///
/// On one-dimensional meshes with unit coefficient this is the derivative pairing
/// `int u' v` with the trial derivative against the test value.
#[derive(Debug, Clone, Copy)]
pub struct GradientIntegrator<K> {
    coefficient: K,
}

impl GradientIntegrator<ConstantCoefficient> {
    pub fn unit() -> Self {
        Self::new(ConstantCoefficient(1.0))
    }
}

impl<K> GradientIntegrator<K> {
    pub fn new(coefficient: K) -> Self {
        Self { coefficient }
    }
}

impl<const D: usize, K: Coefficient<D>> Integrator<D> for GradientIntegrator<K> {
    fn operator_kind(&self) -> OperatorKind {
        OperatorKind::Gradient
    }

    fn test_components(&self) -> usize {
        D
    }

    fn assemble_element_matrix(&self, pair: &ElementPair<D>, mut output: DMatrixViewMut<f64>) -> eyre::Result<()> {
        let strength = if self.coefficient.is_constant() {
            1
        } else {
            1 + COEFFICIENT_EXTRA_STRENGTH
        };
        pair.for_each_quadrature_point(strength, |data| {
            let k = self.coefficient.evaluate(&data.x);
            for (b, chi_b) in data.test_values.iter().enumerate() {
                for a in 0..data.trial_gradients.ncols() {
                    for c in 0..D {
                        output[(D * b + c, a)] += data.weight * k * chi_b * data.trial_gradients[(c, a)];
                    }
                }
            }
        })
    }
}

/// `(div q, v)`: vector-valued trial functions with `D` components, scalar test functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DivergenceIntegrator;

impl<const D: usize> Integrator<D> for DivergenceIntegrator {
    fn operator_kind(&self) -> OperatorKind {
        OperatorKind::Divergence
    }

    fn trial_components(&self) -> usize {
        D
    }

    fn assemble_element_matrix(&self, pair: &ElementPair<D>, mut output: DMatrixViewMut<f64>) -> eyre::Result<()> {
        pair.for_each_quadrature_point(1, |data| {
            for (a, phi_a) in data.test_values.iter().enumerate() {
                for b in 0..data.trial_gradients.ncols() {
                    for c in 0..D {
                        output[(a, D * b + c)] += data.weight * phi_a * data.trial_gradients[(c, b)];
                    }
                }
            }
        })
    }
}

/// The point functional `u(t0) v(t0)` on a one-dimensional mesh.
///
/// Only same-level pairs are supported. `t0` is expected to be an end point of the mesh, so
/// that exactly one element contains it.
#[derive(Debug, Clone, Copy)]
pub struct InitialIntegrator {
    time: f64,
}

impl InitialIntegrator {
    pub fn at_time(time: f64) -> Self {
        Self { time }
    }

    pub fn time(&self) -> f64 {
        self.time
    }
}

impl Integrator<1> for InitialIntegrator {
    fn operator_kind(&self) -> OperatorKind {
        OperatorKind::Initial
    }

    fn supports(&self, relation: LevelRelation) -> bool {
        relation == LevelRelation::SameLevel
    }

    fn assemble_element_matrix(&self, pair: &ElementPair<1>, mut output: DMatrixViewMut<f64>) -> eyre::Result<()> {
        if pair.relation() != LevelRelation::SameLevel {
            return Err(eyre!("Initial functional is only defined on a single level"));
        }
        let element = pair.fine_element();
        let xi = element.map_physical_coords(&Point1::new(self.time))?;
        if element.contains_reference_point(&xi, POINT_FUNCTIONAL_TOL) {
            let values = element.evaluate_basis(&xi);
            output.ger(1.0, &values, &values, 1.0);
        }
        Ok(())
    }
}
