//! Error types for the verifier

use qpv_core::CoreError;
use thiserror::Error;

/// Which entailment of the while rule failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantStage {
    /// The loop body does not preserve the invariant
    Preservation,
    /// The invariant is too weak for the postcondition on exit
    Exit,
}

impl std::fmt::Display for InvariantStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preservation => write!(f, "preservation"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

/// Verifier error types
#[derive(Error, Debug, Clone)]
pub enum VerifyError {
    #[error("Undefined name '{0}'")]
    UndefinedName(String),

    #[error("'{0}' is bound but is not an operator")]
    NotAnOperator(String),

    #[error("Duplicate qubit '{qubit}' in the placement of '{name}'")]
    DuplicateQubit { name: String, qubit: String },

    #[error("Qubit '{qubit}' is not part of register {register}")]
    QubitNotInRegister { qubit: String, register: String },

    #[error("'{name}' acts on {expected} qubit(s) but is placed on {actual}")]
    QubitCountMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("'{0}' is already bound in this scope")]
    Rebinding(String),

    #[error("'{0}' collides with the generated-name space")]
    ReservedName(String),

    #[error("'{0}' is not unitary within tolerance")]
    NotUnitary(String),

    #[error("'{0}' is not a Hermitian predicate in [0, I] within tolerance")]
    NotAPredicate(String),

    #[error("'{0}' is not a two-outcome measurement")]
    NotAMeasurement(String),

    #[error("Nondeterministic choice needs at least two branches, got {0}")]
    ChoiceArity(usize),

    #[error("Intermediate assertion does not entail its postcondition: {0}")]
    AssertionFailed(String),

    #[error("Loop invariant failed the {stage} entailment: {detail}")]
    InvariantFailed {
        stage: InvariantStage,
        detail: String,
    },

    #[error("Unknown setting '{0}'")]
    UnknownSetting(String),

    #[error("Setting '{key}' expects a {expected} value")]
    SettingType {
        key: String,
        expected: &'static str,
    },

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, VerifyError>;
