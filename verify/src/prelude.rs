//! Preloaded operator library
//!
//! The read-only root scope shared by all verifications. It carries the
//! standard gate set, the Hermitian predicates used by the repository
//! examples (with their half-scaled variants), and the two-outcome
//! measurements.
//!
//! ## Measurement naming
//!
//! The leading label of a measurement names its outcome-1 branch, the one a
//! loop guard continues on: `M10` has `M₁ = |1⟩⟨1|` and `M₀ = |0⟩⟨0|`, so
//! `while M10[q]` keeps running while the qubit measures 1 and exits once
//! it measures 0.

use crate::scope::{Binding, Scope};
use nalgebra::DMatrix;
use qpv_core::{Complex, OperatorValue, FRAC_1_SQRT_2, IM, ONE, ZERO};
use std::rc::Rc;

fn m2(entries: [Complex; 4]) -> DMatrix<Complex> {
    DMatrix::from_row_slice(2, 2, &entries)
}

// ==================== Single-qubit gates ====================

fn identity() -> DMatrix<Complex> {
    DMatrix::identity(2, 2)
}

fn pauli_x() -> DMatrix<Complex> {
    m2([ZERO, ONE, ONE, ZERO])
}

fn pauli_y() -> DMatrix<Complex> {
    m2([ZERO, -IM, IM, ZERO])
}

fn pauli_z() -> DMatrix<Complex> {
    m2([ONE, ZERO, ZERO, -ONE])
}

fn hadamard() -> DMatrix<Complex> {
    let h = Complex::new(FRAC_1_SQRT_2, 0.0);
    m2([h, h, h, -h])
}

// ==================== Multi-qubit gates ====================

/// CNOT, control on the high-order qubit
fn cnot() -> DMatrix<Complex> {
    DMatrix::from_row_slice(
        4,
        4,
        &[
            ONE, ZERO, ZERO, ZERO, //
            ZERO, ONE, ZERO, ZERO, //
            ZERO, ZERO, ZERO, ONE, //
            ZERO, ZERO, ONE, ZERO,
        ],
    )
}

/// Controlled-Hadamard, control on the high-order qubit
fn controlled_h() -> DMatrix<Complex> {
    let h = Complex::new(FRAC_1_SQRT_2, 0.0);
    DMatrix::from_row_slice(
        4,
        4,
        &[
            ONE, ZERO, ZERO, ZERO, //
            ZERO, ONE, ZERO, ZERO, //
            ZERO, ZERO, h, h, //
            ZERO, ZERO, h, -h,
        ],
    )
}

fn swap() -> DMatrix<Complex> {
    DMatrix::from_row_slice(
        4,
        4,
        &[
            ONE, ZERO, ZERO, ZERO, //
            ZERO, ZERO, ONE, ZERO, //
            ZERO, ONE, ZERO, ZERO, //
            ZERO, ZERO, ZERO, ONE,
        ],
    )
}

/// Toffoli: flips the low-order qubit when both controls are 1
fn toffoli() -> DMatrix<Complex> {
    let mut matrix = DMatrix::identity(8, 8);
    matrix[(6, 6)] = ZERO;
    matrix[(6, 7)] = ONE;
    matrix[(7, 6)] = ONE;
    matrix[(7, 7)] = ZERO;
    matrix
}

// ==================== Hermitian predicates ====================

fn zero_predicate() -> DMatrix<Complex> {
    DMatrix::zeros(2, 2)
}

/// |0⟩⟨0|
fn p0() -> DMatrix<Complex> {
    m2([ONE, ZERO, ZERO, ZERO])
}

/// |1⟩⟨1|
fn p1() -> DMatrix<Complex> {
    m2([ZERO, ZERO, ZERO, ONE])
}

/// |+⟩⟨+|
fn p_plus() -> DMatrix<Complex> {
    let half = Complex::new(0.5, 0.0);
    m2([half, half, half, half])
}

/// |−⟩⟨−|
fn p_minus() -> DMatrix<Complex> {
    let half = Complex::new(0.5, 0.0);
    m2([half, -half, -half, half])
}

/// Projector onto the two qubits agreeing: |00⟩⟨00| + |11⟩⟨11|
fn eq01_2() -> DMatrix<Complex> {
    let mut matrix = DMatrix::zeros(4, 4);
    matrix[(0, 0)] = ONE;
    matrix[(3, 3)] = ONE;
    matrix
}

/// Projector onto the two qubits disagreeing
fn neq01_2() -> DMatrix<Complex> {
    let mut matrix = DMatrix::zeros(4, 4);
    matrix[(1, 1)] = ONE;
    matrix[(2, 2)] = ONE;
    matrix
}

/// Projector onto all three qubits agreeing: |000⟩⟨000| + |111⟩⟨111|
fn eq01_3() -> DMatrix<Complex> {
    let mut matrix = DMatrix::zeros(8, 8);
    matrix[(0, 0)] = ONE;
    matrix[(7, 7)] = ONE;
    matrix
}

fn half(matrix: DMatrix<Complex>) -> DMatrix<Complex> {
    matrix * Complex::new(0.5, 0.0)
}

/// Build the preloaded global scope.
///
/// Callers verify against a child of this scope; the library itself is
/// never written to after construction.
pub fn standard() -> Rc<Scope> {
    let scope = Scope::root();

    let bind_square = |name: &str, matrix: DMatrix<Complex>| {
        let value = OperatorValue::Square(matrix);
        scope
            .bind(name, Binding::Operator(Rc::new(value)))
            .unwrap_or_else(|_| unreachable!("library names are bound once"));
    };

    // Unitaries
    bind_square("I", identity());
    bind_square("X", pauli_x());
    bind_square("Y", pauli_y());
    bind_square("Z", pauli_z());
    bind_square("H", hadamard());
    bind_square("CX", cnot());
    bind_square("CH", controlled_h());
    bind_square("SWAP", swap());
    bind_square("CCX", toffoli());

    // Hermitian predicates
    bind_square("Zero", zero_predicate());
    bind_square("P0", p0());
    bind_square("P1", p1());
    bind_square("Pp", p_plus());
    bind_square("Pm", p_minus());
    bind_square("Eq01_2", eq01_2());
    bind_square("Neq01_2", neq01_2());
    bind_square("Eq01_3", eq01_3());

    // Half-scaled variants
    bind_square("Idiv2", half(identity()));
    bind_square("P0div2", half(p0()));
    bind_square("P1div2", half(p1()));
    bind_square("Ppdiv2", half(p_plus()));
    bind_square("Pmdiv2", half(p_minus()));
    bind_square("Eq01_2div2", half(eq01_2()));
    bind_square("Neq01_2div2", half(neq01_2()));
    bind_square("Eq01_3div2", half(eq01_3()));

    let bind_measurement = |name: &str, m0: DMatrix<Complex>, m1: DMatrix<Complex>| {
        let value = OperatorValue::Measurement { m0, m1 };
        scope
            .bind(name, Binding::Operator(Rc::new(value)))
            .unwrap_or_else(|_| unreachable!("library names are bound once"));
    };

    // Measurements (outcome 1 first in the name)
    bind_measurement("M01", p1(), p0());
    bind_measurement("M10", p0(), p1());
    bind_measurement("Mpm", p_minus(), p_plus());
    bind_measurement("Mmp", p_plus(), p_minus());
    bind_measurement("MEq01_2", neq01_2(), eq01_2());
    bind_measurement("MEq10_2", eq01_2(), neq01_2());

    scope
}
