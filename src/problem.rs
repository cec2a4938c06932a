//! Data of a heat problem `du/dt - div(k grad u) = f` on `(0, T) x Omega`.
//!
//! The core only consumes resolved callbacks: a medium with its diffusivity `k`, a source
//! `f(t, x)` and the initial temperature `u0(x)`. Homogeneous Dirichlet conditions hold on the
//! whole spatial boundary.
use nalgebra::Point;

/// A heat-conducting medium.
pub trait Medium<const D: usize>: Send + Sync {
    fn diffusivity(&self, x: &Point<f64, D>) -> f64;

    /// Whether the diffusivity is the same everywhere. Homogeneous media are integrated with
    /// lower-order quadrature.
    fn is_homogeneous(&self) -> bool {
        false
    }
}

impl<const D: usize, F> Medium<D> for F
where
    F: Fn(&Point<f64, D>) -> f64 + Send + Sync,
{
    fn diffusivity(&self, x: &Point<f64, D>) -> f64 {
        self(x)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ConstantMedium(pub f64);

impl<const D: usize> Medium<D> for ConstantMedium {
    fn diffusivity(&self, _x: &Point<f64, D>) -> f64 {
        self.0
    }

    fn is_homogeneous(&self) -> bool {
        true
    }
}

pub trait HeatProblem<const D: usize>: Send + Sync {
    type Medium: Medium<D>;

    fn source(&self, t: f64, x: &Point<f64, D>) -> f64;

    fn initial_temperature(&self, x: &Point<f64, D>) -> f64;

    fn medium(&self) -> &Self::Medium;
}

/// A heat problem assembled from closures.
#[derive(Debug, Clone)]
pub struct FnHeatProblem<M, S, I> {
    medium: M,
    source: S,
    initial_temperature: I,
}

impl<M, S, I> FnHeatProblem<M, S, I> {
    pub fn new(medium: M, source: S, initial_temperature: I) -> Self {
        Self {
            medium,
            source,
            initial_temperature,
        }
    }
}

impl<const D: usize, M, S, I> HeatProblem<D> for FnHeatProblem<M, S, I>
where
    M: Medium<D>,
    S: Fn(f64, &Point<f64, D>) -> f64 + Send + Sync,
    I: Fn(&Point<f64, D>) -> f64 + Send + Sync,
{
    type Medium = M;

    fn source(&self, t: f64, x: &Point<f64, D>) -> f64 {
        (self.source)(t, x)
    }

    fn initial_temperature(&self, x: &Point<f64, D>) -> f64 {
        (self.initial_temperature)(x)
    }

    fn medium(&self) -> &M {
        &self.medium
    }
}

static UNIT_MEDIUM: ConstantMedium = ConstantMedium(1.0);

/// Zero source and zero initial temperature in a medium of unit diffusivity.
#[derive(Debug, Copy, Clone, Default)]
pub struct ZeroDataProblem;

impl<const D: usize> HeatProblem<D> for ZeroDataProblem {
    type Medium = ConstantMedium;

    fn source(&self, _t: f64, _x: &Point<f64, D>) -> f64 {
        0.0
    }

    fn initial_temperature(&self, _x: &Point<f64, D>) -> f64 {
        0.0
    }

    fn medium(&self) -> &ConstantMedium {
        &UNIT_MEDIUM
    }
}
