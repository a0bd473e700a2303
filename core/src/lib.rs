//! # QPV Core
//!
//! Semantic kernel for the QPV quantum program verifier.
//!
//! ## Features
//!
//! - **Register**: Named qubit registers (identity by name, not position)
//! - **Tensor**: Placed operators with cylindrical extension and composition
//! - **Operator**: Tagged operator values and role classification
//! - **Order**: Löwner partial order decided by semidefinite feasibility
//! - **Predicate**: Assertion sets of Hermitians in `[0, I]` with entailment
//!
//! The kernel is purely functional: every operation allocates fresh buffers
//! and never mutates its inputs.

pub mod error;
pub mod operator;
pub mod order;
pub mod predicate;
pub mod register;
pub mod tensor;

pub use error::{CoreError, Result};
pub use operator::{is_effect, is_hermitian, is_measurement_pair, is_unitary, OperatorValue};
pub use order::{check_feasibility, loewner_eq, loewner_le, Feasibility};
pub use predicate::{EntailmentCheck, Predicate, PredicateSet};
pub use register::Register;
pub use tensor::{compose, frobenius_distance, identity_on, sandwich, sum, PlacedOperator};

use num_complex::Complex64;

/// Complex number type alias
pub type Complex = Complex64;

/// Zero complex number
pub const ZERO: Complex = Complex64::new(0.0, 0.0);

/// One complex number
pub const ONE: Complex = Complex64::new(1.0, 0.0);

/// Imaginary unit
pub const IM: Complex = Complex64::new(0.0, 1.0);

/// 1/sqrt(2), the Hadamard normalization
pub const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Module version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
