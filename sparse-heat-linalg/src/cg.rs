//! Preconditioned Conjugate Gradient for symmetric positive definite systems.
use core::fmt;
use log::debug;
use nalgebra::{DMatrix, DVector, RealField, Scalar};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use std::error::Error;

pub trait LinearOperator<T: Scalar> {
    /// Computes `y = A x`.
    fn apply(&self, y: &mut DVector<T>, x: &DVector<T>) -> Result<(), Box<dyn Error>>;
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: &mut DVector<T>, x: &DVector<T>) -> Result<(), Box<dyn Error>> {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T: RealField> LinearOperator<T> for DMatrix<T> {
    fn apply(&self, y: &mut DVector<T>, x: &DVector<T>) -> Result<(), Box<dyn Error>> {
        y.gemv(T::one(), self, x, T::zero());
        Ok(())
    }
}

impl<T: RealField> LinearOperator<T> for CsrMatrix<T> {
    fn apply(&self, y: &mut DVector<T>, x: &DVector<T>) -> Result<(), Box<dyn Error>> {
        if self.ncols() != x.len() || self.nrows() != y.len() {
            return Err(Box::new(OperatorDimensionMismatch {
                operator: (self.nrows(), self.ncols()),
                input: x.len(),
                output: y.len(),
            }));
        }
        spmm_csr_dense(T::zero(), y, T::one(), Op::NoOp(self), Op::NoOp(x));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OperatorDimensionMismatch {
    pub operator: (usize, usize),
    pub input: usize,
    pub output: usize,
}

impl fmt::Display for OperatorDimensionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot apply {}x{} operator to vector of length {} with output of length {}",
            self.operator.0, self.operator.1, self.input, self.output
        )
    }
}

impl Error for OperatorDimensionMismatch {}

pub struct IdentityOperator;

impl<T: Scalar> LinearOperator<T> for IdentityOperator {
    fn apply(&self, y: &mut DVector<T>, x: &DVector<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(x);
        Ok(())
    }
}

/// Diagonal (Jacobi) preconditioner `P = diag(A)^{-1}`.
///
/// Zero diagonal entries are left unscaled.
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner<T: Scalar> {
    inverse_diagonal: DVector<T>,
}

impl<T: RealField> JacobiPreconditioner<T> {
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Self {
        let mut inverse_diagonal = DVector::from_element(matrix.nrows(), T::one());
        for (i, row) in matrix.row_iter().enumerate() {
            if let Some(a_ii) = row
                .col_indices()
                .iter()
                .position(|&j| j == i)
                .map(|local_idx| &row.values()[local_idx])
            {
                if *a_ii != T::zero() {
                    inverse_diagonal[i] = T::one() / a_ii.clone();
                }
            }
        }
        Self { inverse_diagonal }
    }
}

impl<T: RealField> LinearOperator<T> for JacobiPreconditioner<T> {
    fn apply(&self, y: &mut DVector<T>, x: &DVector<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(x);
        y.component_mul_assign(&self.inverse_diagonal);
        Ok(())
    }
}

pub trait CgStoppingCriterion<T: Scalar> {
    fn has_converged(&self, b_norm: T, iteration: usize, approx_residual: &DVector<T>) -> bool;
}

/// Relative residual tolerance `||r|| <= tol * ||b||`.
///
/// The residual is the one updated by the CG recurrence, which may drift from the true
/// residual for ill-conditioned systems.
#[derive(Debug, Clone, Copy)]
pub struct RelativeResidualCriterion<T: Scalar> {
    tol: T,
}

impl<T: Scalar> RelativeResidualCriterion<T> {
    pub fn new(tol: T) -> Self {
        Self { tol }
    }
}

impl Default for RelativeResidualCriterion<f64> {
    fn default() -> Self {
        Self::new(1e-8)
    }
}

impl<T: RealField> CgStoppingCriterion<T> for RelativeResidualCriterion<T> {
    fn has_converged(&self, b_norm: T, _iteration: usize, approx_residual: &DVector<T>) -> bool {
        approx_residual.norm() <= self.tol.clone() * b_norm
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SolveErrorKind {
    OperatorError(Box<dyn Error>),
    PreconditionerError(Box<dyn Error>),
    IndefiniteOperator,
    IndefinitePreconditioner,
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for SolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorError(err) => write!(f, "Error applying operator: {}", err),
            Self::PreconditionerError(err) => write!(f, "Error applying preconditioner: {}", err),
            Self::IndefiniteOperator => write!(f, "Operator appears to be indefinite"),
            Self::IndefinitePreconditioner => write!(f, "Preconditioner appears to be indefinite"),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached", max_iter)
            }
        }
    }
}

#[derive(Debug)]
pub struct SolveError {
    pub output: CgOutput,
    pub kind: SolveErrorKind,
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CG solve failed after {} iterations: {}",
            self.output.num_iterations, self.kind
        )
    }
}

impl Error for SolveError {}

#[derive(Debug, Clone, Copy)]
pub struct CgOutput {
    /// Number of updates made to the solution vector.
    pub num_iterations: usize,
}

#[derive(Debug, Clone)]
pub struct ConjugateGradient<A, P, Criterion> {
    operator: A,
    preconditioner: P,
    stopping_criterion: Criterion,
    max_iter: Option<usize>,
}

impl ConjugateGradient<(), IdentityOperator, ()> {
    pub fn new() -> Self {
        Self {
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            max_iter: None,
        }
    }
}

impl Default for ConjugateGradient<(), IdentityOperator, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, Criterion> ConjugateGradient<(), P, Criterion> {
    pub fn with_operator<A>(self, operator: A) -> ConjugateGradient<A, P, Criterion> {
        ConjugateGradient {
            operator,
            preconditioner: self.preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

impl<A, P, Criterion> ConjugateGradient<A, P, Criterion> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> ConjugateGradient<A, P2, Criterion> {
        ConjugateGradient {
            operator: self.operator,
            preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

impl<A, P> ConjugateGradient<A, P, ()> {
    pub fn with_stopping_criterion<Criterion>(self, stopping_criterion: Criterion) -> ConjugateGradient<A, P, Criterion> {
        ConjugateGradient {
            operator: self.operator,
            preconditioner: self.preconditioner,
            stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

impl<A, P, Criterion> ConjugateGradient<A, P, Criterion> {
    /// Solves `A x = b`, using the contents of `x` as the initial guess.
    #[allow(non_snake_case)]
    pub fn solve_with_guess<T>(&self, b: &DVector<T>, x: &mut DVector<T>) -> Result<CgOutput, SolveError>
    where
        T: RealField,
        A: LinearOperator<T>,
        P: LinearOperator<T>,
        Criterion: CgStoppingCriterion<T>,
    {
        use SolveErrorKind::*;
        assert_eq!(b.len(), x.len());

        let mut output = CgOutput { num_iterations: 0 };
        let n = x.len();
        let mut r = DVector::zeros(n);
        let mut z = DVector::zeros(n);
        let mut Ap = DVector::zeros(n);

        let b_norm = b.norm();
        if b_norm == T::zero() {
            x.fill(T::zero());
            return Ok(output);
        }

        // r = b - Ax
        if let Err(err) = self.operator.apply(&mut r, x) {
            return Err(SolveError {
                output,
                kind: OperatorError(err),
            });
        }
        r.axpy(T::one(), b, -T::one());

        // z = Pr
        if let Err(err) = self.preconditioner.apply(&mut z, &r) {
            return Err(SolveError {
                output,
                kind: PreconditionerError(err),
            });
        }

        let mut p = z.clone();
        let mut zTr = z.dot(&r);

        loop {
            if self
                .stopping_criterion
                .has_converged(b_norm.clone(), output.num_iterations, &r)
            {
                break;
            } else if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError {
                        output,
                        kind: MaxIterationsReached { max_iter },
                    });
                }
            }

            if let Err(err) = self.operator.apply(&mut Ap, &p) {
                return Err(SolveError {
                    output,
                    kind: OperatorError(err),
                });
            }
            let pAp = p.dot(&Ap);
            if pAp <= T::zero() {
                return Err(SolveError {
                    output,
                    kind: IndefiniteOperator,
                });
            }
            if zTr <= T::zero() {
                return Err(SolveError {
                    output,
                    kind: IndefinitePreconditioner,
                });
            }

            let alpha = zTr.clone() / pAp;
            x.axpy(alpha.clone(), &p, T::one());
            r.axpy(-alpha, &Ap, T::one());
            output.num_iterations += 1;

            if let Err(err) = self.preconditioner.apply(&mut z, &r) {
                return Err(SolveError {
                    output,
                    kind: PreconditionerError(err),
                });
            }
            let zTr_next = z.dot(&r);
            let beta = zTr_next.clone() / zTr;
            // p <- z + beta * p
            p.axpy(T::one(), &z, beta);
            zTr = zTr_next;
        }

        debug!("CG converged after {} iterations", output.num_iterations);
        Ok(output)
    }
}
