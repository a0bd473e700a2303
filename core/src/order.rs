//! Löwner partial order decided by semidefinite feasibility
//!
//! `A ⊑ B` iff `B − A` is positive semidefinite. The query is framed as a
//! one-variable semidefinite feasibility problem `X = B − A − εI`, `X ⪰ 0`
//! with `ε = SDP_PRECISION`, accepted when the feasibility residual stays
//! below tolerance (net acceptance: `λmin(B − A) ≥ −ε`). The solver brackets
//! the feasibility slack by bisection with a Cholesky factorization oracle
//! and, on infeasibility, produces a certificate: a unit vector `v` with
//! `v† X v < 0`, obtained by inverse iteration at a strictly feasible shift.
//!
//! The order is intentionally numeric. A true mathematical order may be
//! rejected when the equality tolerance is tighter than the solver can
//! certify.

use crate::error::{CoreError, Result};
use crate::{Complex, ONE};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

/// Interior offset applied to every oracle shift so boundary-exact pivots
/// still factor.
const INTERIOR_MARGIN: f64 = 1e-3;

/// Bisection and inverse-iteration step caps.
const MAX_BISECTIONS: usize = 64;
const INVERSE_ITERATIONS: usize = 24;

/// Outcome of a semidefinite feasibility query
#[derive(Debug, Clone)]
pub struct Feasibility {
    /// Whether `X ⪰ 0` holds within the residual tolerance
    pub feasible: bool,
    /// Signed residual: the certified quadratic form `v† X v` on failure,
    /// the accepted tolerance on success
    pub residual: f64,
    /// Infeasibility certificate (unit vector with `v† X v < 0`)
    pub witness: Option<DVector<Complex>>,
}

/// Solve the one-variable feasibility problem `X = C ⪰ 0` to `tolerance`.
///
/// Accepts iff `λmin(C) ≥ −tolerance`.
pub fn check_feasibility(c: &DMatrix<Complex>, tolerance: f64) -> Result<Feasibility> {
    if c.nrows() != c.ncols() {
        return Err(CoreError::NotSquare {
            rows: c.nrows(),
            cols: c.ncols(),
        });
    }
    if !(tolerance > 0.0) || !tolerance.is_finite() {
        return Err(CoreError::Solver(format!(
            "nonpositive feasibility tolerance {tolerance}"
        )));
    }
    if c.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
        return Err(CoreError::Solver(
            "constraint matrix has non-finite entries".into(),
        ));
    }

    // The oracle reads only one triangle; hermitize so drift between the
    // halves cannot skew the pivots.
    let c = hermitize(c);

    if psd_oracle(&c, tolerance) {
        return Ok(Feasibility {
            feasible: true,
            residual: tolerance,
            witness: None,
        });
    }

    // Infeasible at the accepted tolerance. Bracket the slack needed to
    // reach positive definiteness, bounded by the matrix norm.
    let bound = c.norm() + tolerance + 1.0;
    let mut hi = tolerance * 2.0;
    while !psd_oracle(&c, hi) {
        hi *= 2.0;
        if hi > bound {
            return Err(CoreError::Solver(format!(
                "feasibility bracket exceeded the norm bound {bound:e}"
            )));
        }
    }
    let mut lo = tolerance;
    for _ in 0..MAX_BISECTIONS {
        if hi - lo <= tolerance {
            break;
        }
        let mid = 0.5 * (lo + hi);
        if psd_oracle(&c, mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    // The bracket is only known PD under the oracle's interior offset;
    // factor the certificate at that shift plus the tolerance.
    let witness = infeasibility_witness(&c, hi * (1.0 + INTERIOR_MARGIN) + tolerance)?;
    let residual = (witness.adjoint() * &c * &witness)[(0, 0)].re;
    debug!(residual, slack = hi, "semidefinite feasibility rejected");
    Ok(Feasibility {
        feasible: false,
        residual,
        witness: Some(witness),
    })
}

/// Decide `A ⊑ B` (Löwner order) within `precision`.
///
/// Feasibility of `X = B − A − εI ⪰ 0` with `ε = precision`, accepted up to
/// a residual of `2ε` (the subtracted shift plus the solver tolerance).
pub fn loewner_le(a: &DMatrix<Complex>, b: &DMatrix<Complex>, precision: f64) -> Result<bool> {
    Ok(loewner_le_certified(a, b, precision)?.feasible)
}

/// As [`loewner_le`], returning the full feasibility outcome (certificate
/// included) for diagnostic consumers.
pub fn loewner_le_certified(
    a: &DMatrix<Complex>,
    b: &DMatrix<Complex>,
    precision: f64,
) -> Result<Feasibility> {
    if a.nrows() != b.nrows() || a.ncols() != b.ncols() {
        return Err(CoreError::DimensionMismatch {
            expected: a.nrows(),
            actual: b.nrows(),
        });
    }
    let dim = a.nrows();
    let x = b - a - DMatrix::<Complex>::identity(dim, dim) * Complex::new(precision, 0.0);
    check_feasibility(&x, 2.0 * precision)
}

/// Equality up to the order: `A ⊑ B ∧ B ⊑ A`
pub fn loewner_eq(a: &DMatrix<Complex>, b: &DMatrix<Complex>, precision: f64) -> Result<bool> {
    Ok(loewner_le(a, b, precision)? && loewner_le(b, a, precision)?)
}

/// `(C + C†) / 2`
fn hermitize(c: &DMatrix<Complex>) -> DMatrix<Complex> {
    (c + c.adjoint()).unscale(2.0)
}

/// Positive-definiteness oracle at a given diagonal shift
fn psd_oracle(c: &DMatrix<Complex>, shift: f64) -> bool {
    let dim = c.nrows();
    let shifted =
        c + DMatrix::<Complex>::identity(dim, dim) * Complex::new(shift * (1.0 + INTERIOR_MARGIN), 0.0);
    shifted.cholesky().is_some()
}

/// Approximate minimal-eigenvalue direction by inverse iteration at a
/// strictly feasible shift.
fn infeasibility_witness(c: &DMatrix<Complex>, shift: f64) -> Result<DVector<Complex>> {
    let dim = c.nrows();
    let shifted = c + DMatrix::<Complex>::identity(dim, dim) * Complex::new(shift, 0.0);
    let chol = shifted.cholesky().ok_or_else(|| {
        CoreError::Solver("certificate factorization failed at a feasible shift".into())
    })?;

    let mut v = DVector::from_element(dim, ONE);
    v = v.unscale(v.norm());
    for _ in 0..INVERSE_ITERATIONS {
        v = chol.solve(&v);
        let norm = v.norm();
        if norm == 0.0 || !norm.is_finite() {
            warn!("inverse iteration collapsed while extracting a certificate");
            return Err(CoreError::Solver("certificate extraction diverged".into()));
        }
        v = v.unscale(norm);
    }
    Ok(v)
}
