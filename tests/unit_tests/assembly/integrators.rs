use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector, Matrix1, Point2, Vector1};
use sparse_heat::assembly::integrators::{
    ConstantCoefficient, DivDivIntegrator, DivergenceIntegrator, ElementPair, GradientIntegrator, InitialIntegrator,
    Integrator, LevelRelation, MassIntegrator, OperatorKind, StiffnessIntegrator, VectorMassIntegrator,
};
use sparse_heat::element::{AffineMap, FiniteElement, Segment1dElement, Tri3d2Element};

fn element_matrix<const D: usize, I>(integrator: &I, pair: &ElementPair<D>) -> DMatrix<f64>
where
    I: Integrator<D> + ?Sized,
{
    let nrows = pair.test_element().num_nodes() * integrator.test_components();
    let ncols = pair.trial_element().num_nodes() * integrator.trial_components();
    let mut output = DMatrix::zeros(nrows, ncols);
    integrator
        .assemble_element_matrix(pair, output.as_view_mut())
        .unwrap();
    output
}

fn reference_triangle() -> Tri3d2Element {
    Tri3d2Element::reference()
}

#[test]
fn level_relation_between_levels() {
    assert_eq!(LevelRelation::between(1, 1), LevelRelation::SameLevel);
    assert_eq!(LevelRelation::between(2, 1), LevelRelation::FineTestCoarseTrial);
    assert_eq!(LevelRelation::between(0, 1), LevelRelation::CoarseTestFineTrial);
}

#[test]
fn triangle_mass_and_stiffness() {
    let element = reference_triangle();
    let pair = ElementPair::<2>::same_level(&element);

    #[rustfmt::skip]
    let expected_mass = DMatrix::from_row_slice(3, 3, &[2.0, 1.0, 1.0,
                                                        1.0, 2.0, 1.0,
                                                        1.0, 1.0, 2.0]) / 6.0;
    assert_matrix_eq!(element_matrix(&MassIntegrator, &pair), expected_mass, comp = abs, tol = 1e-14);

    #[rustfmt::skip]
    let expected_stiffness = DMatrix::from_row_slice(3, 3, &[ 1.0, -0.5, -0.5,
                                                             -0.5,  0.5,  0.0,
                                                             -0.5,  0.0,  0.5]);
    let stiffness = element_matrix(&StiffnessIntegrator::unit(), &pair);
    assert_matrix_eq!(stiffness, expected_stiffness, comp = abs, tol = 1e-14);

    // A constant coefficient scales the matrix, and so does a spatially varying one that
    // happens to be constant
    let scaled = element_matrix(&StiffnessIntegrator::new(ConstantCoefficient(3.0)), &pair);
    assert_matrix_eq!(scaled, &expected_stiffness * 3.0, comp = abs, tol = 1e-13);
    let closure = element_matrix(&StiffnessIntegrator::new(|_: &Point2<f64>| 3.0), &pair);
    assert_matrix_eq!(closure, &expected_stiffness * 3.0, comp = abs, tol = 1e-13);
}

#[test]
fn vector_mass_interleaves_components() {
    let element = reference_triangle();
    let pair = ElementPair::<2>::same_level(&element);
    let scalar = element_matrix(&MassIntegrator, &pair);
    let vector = element_matrix(&VectorMassIntegrator, &pair);
    assert_eq!(vector.shape(), (6, 6));
    for a in 0..3 {
        for b in 0..3 {
            assert!((vector[(2 * a, 2 * b)] - scalar[(a, b)]).abs() < 1e-14);
            assert!((vector[(2 * a + 1, 2 * b + 1)] - scalar[(a, b)]).abs() < 1e-14);
            assert_eq!(vector[(2 * a, 2 * b + 1)], 0.0);
        }
    }
}

#[test]
fn divergence_and_div_div_are_consistent() {
    let element = Tri3d2Element::from_vertices([Point2::new(0.0, 0.0), Point2::new(1.0, 0.2), Point2::new(0.3, 0.8)]);
    let pair = ElementPair::<2>::same_level(&element);
    let area = element.measure();

    // For linear functions the divergence is constant on the element
    let gradients = element.physical_gradients(&Point2::origin()).unwrap();
    let div = DVector::from_fn(6, |i, _| gradients[(i % 2, i / 2)]);
    let expected_div_div = &div * div.transpose() * area;
    let div_div = element_matrix(&DivDivIntegrator, &pair);
    assert_matrix_eq!(div_div, expected_div_div, comp = abs, tol = 1e-13);

    let divergence = element_matrix(&DivergenceIntegrator, &pair);
    assert_eq!(divergence.shape(), (3, 6));
    // int phi_a = area / 3
    let expected_divergence = DVector::from_element(3, area / 3.0) * div.transpose();
    assert_matrix_eq!(divergence, expected_divergence, comp = abs, tol = 1e-13);

    // The gradient operator pairs the same functions with test and trial roles swapped
    let gradient = element_matrix(&GradientIntegrator::unit(), &pair);
    assert_eq!(gradient.shape(), (6, 3));
    assert_matrix_eq!(gradient, divergence.transpose(), comp = abs, tol = 1e-13);
}

#[test]
fn gradient_on_segment_is_derivative_pairing() {
    let element = Segment1dElement::from_interval([0.0, 2.0]);
    let pair = ElementPair::<1>::same_level(&element);
    let gradient = element_matrix(&GradientIntegrator::unit(), &pair);
    // int psi_i psi_j' with psi_j' = -1/2, 1/2 and int psi_i = 1
    let expected = DMatrix::from_row_slice(2, 2, &[-0.5, 0.5, -0.5, 0.5]);
    assert_matrix_eq!(gradient, expected, comp = abs, tol = 1e-14);
}

#[test]
fn cross_level_mass_on_segments() {
    let coarse = Segment1dElement::from_interval([0.0, 1.0]);
    let fine = Segment1dElement::from_interval([0.0, 0.5]);
    let map = AffineMap {
        matrix: Matrix1::new(0.5),
        translation: Vector1::new(-0.5),
    };

    let pair = ElementPair::<1>::new(LevelRelation::FineTestCoarseTrial, &fine, &coarse, map);
    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(2, 2, &[5.0 / 24.0, 1.0 / 24.0,
                                                   1.0 / 6.0,  1.0 / 12.0]);
    assert_matrix_eq!(element_matrix(&MassIntegrator, &pair), expected, comp = abs, tol = 1e-14);

    let pair = ElementPair::<1>::new(LevelRelation::CoarseTestFineTrial, &fine, &coarse, map);
    assert_matrix_eq!(element_matrix(&MassIntegrator, &pair), expected.transpose(), comp = abs, tol = 1e-14);

    // Constants have zero derivative on both levels
    let pair = ElementPair::<1>::new(LevelRelation::FineTestCoarseTrial, &fine, &coarse, map);
    let stiffness = element_matrix(&StiffnessIntegrator::unit(), &pair);
    assert!((stiffness * DVector::from_element(2, 1.0)).norm() < 1e-13);
}

#[test]
fn initial_functional_evaluates_at_point() {
    let element = Segment1dElement::from_interval([0.0, 1.0]);
    let pair = ElementPair::<1>::same_level(&element);

    let at_start = element_matrix(&InitialIntegrator::at_time(0.0), &pair);
    assert_matrix_eq!(at_start, DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.0]), comp = abs, tol = 1e-14);
    let at_midpoint = element_matrix(&InitialIntegrator::at_time(0.5), &pair);
    assert_matrix_eq!(at_midpoint, DMatrix::from_element(2, 2, 0.25), comp = abs, tol = 1e-14);
    let outside = element_matrix(&InitialIntegrator::at_time(2.0), &pair);
    assert_eq!(outside, DMatrix::zeros(2, 2));

    let initial = InitialIntegrator::at_time(0.0);
    assert_eq!(Integrator::<1>::operator_kind(&initial), OperatorKind::Initial);
    assert!(initial.supports(LevelRelation::SameLevel));
    assert!(!initial.supports(LevelRelation::FineTestCoarseTrial));
    assert!(!initial.supports(LevelRelation::CoarseTestFineTrial));
}

#[test]
fn integrators_report_components() {
    assert_eq!(Integrator::<2>::test_components(&VectorMassIntegrator), 2);
    assert_eq!(Integrator::<2>::trial_components(&DivergenceIntegrator), 2);
    assert_eq!(Integrator::<2>::test_components(&DivergenceIntegrator), 1);
    assert_eq!(Integrator::<2>::test_components(&GradientIntegrator::unit()), 2);
    assert_eq!(Integrator::<2>::trial_components(&GradientIntegrator::unit()), 1);
    assert_eq!(Integrator::<2>::operator_kind(&DivDivIntegrator), OperatorKind::DivDiv);
}
