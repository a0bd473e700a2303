//! Operator values and role classification
//!
//! Loaded operators are a single tagged variant: a square matrix or a
//! two-outcome measurement pair. Roles (unitary, Hermitian predicate,
//! measurement) are properties checked at use sites, not types; the arity
//! is carried by the placement, not the type. All property checks compare
//! the Frobenius norm of a difference against the tolerance.

use crate::error::{CoreError, Result};
use crate::order::loewner_le;
use crate::tensor::frobenius_distance;
use crate::Complex;
use nalgebra::DMatrix;

/// A loaded operator value
#[derive(Debug, Clone)]
pub enum OperatorValue {
    /// A square matrix on `2^n` dimensions (unitary or Hermitian role)
    Square(DMatrix<Complex>),
    /// A two-outcome measurement pair
    Measurement {
        m0: DMatrix<Complex>,
        m1: DMatrix<Complex>,
    },
}

impl OperatorValue {
    /// Wrap a square matrix, validating its shape
    pub fn square(matrix: DMatrix<Complex>) -> Result<Self> {
        check_square_pow2(&matrix)?;
        Ok(Self::Square(matrix))
    }

    /// Wrap a measurement pair, validating shapes and completeness
    pub fn measurement(m0: DMatrix<Complex>, m1: DMatrix<Complex>, eps: f64) -> Result<Self> {
        check_square_pow2(&m0)?;
        check_square_pow2(&m1)?;
        if m0.nrows() != m1.nrows() {
            return Err(CoreError::DimensionMismatch {
                expected: m0.nrows(),
                actual: m1.nrows(),
            });
        }
        if !is_measurement_pair(&m0, &m1, eps) {
            return Err(CoreError::Solver(format!(
                "measurement pair does not resolve the identity (eps = {eps})"
            )));
        }
        Ok(Self::Measurement { m0, m1 })
    }

    /// Number of qubits the operator acts on
    pub fn qubit_count(&self) -> usize {
        self.dim().trailing_zeros() as usize
    }

    /// Matrix dimension
    pub fn dim(&self) -> usize {
        match self {
            Self::Square(m) => m.nrows(),
            Self::Measurement { m0, .. } => m0.nrows(),
        }
    }
}

fn check_square_pow2(m: &DMatrix<Complex>) -> Result<()> {
    if m.nrows() != m.ncols() {
        return Err(CoreError::NotSquare {
            rows: m.nrows(),
            cols: m.ncols(),
        });
    }
    let dim = m.nrows();
    if dim == 0 || (dim & (dim - 1)) != 0 {
        return Err(CoreError::NotAPowerOfTwo(dim));
    }
    Ok(())
}

/// Whether `T† T = I` within tolerance
pub fn is_unitary(m: &DMatrix<Complex>, eps: f64) -> bool {
    let product = m.adjoint() * m;
    let identity = DMatrix::identity(m.nrows(), m.ncols());
    frobenius_distance(&product, &identity) <= eps
}

/// Whether `T = T†` within tolerance
pub fn is_hermitian(m: &DMatrix<Complex>, eps: f64) -> bool {
    frobenius_distance(m, &m.adjoint()) <= eps
}

/// Whether `M₀† M₀ + M₁† M₁ = I` within tolerance
pub fn is_measurement_pair(m0: &DMatrix<Complex>, m1: &DMatrix<Complex>, eps: f64) -> bool {
    let total = m0.adjoint() * m0 + m1.adjoint() * m1;
    let identity = DMatrix::identity(m0.nrows(), m0.ncols());
    frobenius_distance(&total, &identity) <= eps
}

/// Whether `T` is a Hermitian predicate: `T = T†` and `0 ⊑ T ⊑ I` within
/// tolerance. The interval bounds go through the Löwner order.
pub fn is_effect(m: &DMatrix<Complex>, eps: f64) -> Result<bool> {
    if !is_hermitian(m, eps) {
        return Ok(false);
    }
    let zero = DMatrix::zeros(m.nrows(), m.ncols());
    let identity = DMatrix::identity(m.nrows(), m.ncols());
    Ok(loewner_le(&zero, m, eps)? && loewner_le(m, &identity, eps)?)
}
