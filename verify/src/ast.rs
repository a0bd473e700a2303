//! Program abstract syntax
//!
//! The tree the parser hands to the verifier: every operator reference has
//! already been resolved to a value plus a placement, and every qubit name
//! appears in the enclosing register. Role validation (unitary, predicate,
//! measurement pair) happens against the scope settings before the
//! transformer runs.

use crate::error::{Result, VerifyError};
use crate::settings::Settings;
use nalgebra::DMatrix;
use qpv_core::{is_effect, is_hermitian, is_measurement_pair, is_unitary, Complex, Register};

/// A unitary resolved onto a placement
#[derive(Debug, Clone)]
pub struct PlacedUnitary {
    pub name: String,
    pub qubits: Vec<String>,
    pub matrix: DMatrix<Complex>,
}

/// A two-outcome measurement resolved onto a placement
#[derive(Debug, Clone)]
pub struct PlacedMeasurement {
    pub name: String,
    pub qubits: Vec<String>,
    pub m0: DMatrix<Complex>,
    pub m1: DMatrix<Complex>,
}

/// A Hermitian predicate resolved onto a placement
#[derive(Debug, Clone)]
pub struct PlacedPredicate {
    pub name: String,
    pub qubits: Vec<String>,
    pub matrix: DMatrix<Complex>,
}

impl PlacedPredicate {
    /// Display form `name[q ...]`
    pub fn label(&self) -> String {
        format!("{}[{}]", self.name, self.qubits.join(" "))
    }
}

/// A program statement
#[derive(Debug, Clone)]
pub enum Statement {
    Skip,
    Abort,
    Init {
        qubits: Vec<String>,
    },
    Unitary(PlacedUnitary),
    If {
        guard: PlacedMeasurement,
        then_branch: Box<Statement>,
        else_branch: Box<Statement>,
    },
    While {
        invariant: Vec<PlacedPredicate>,
        guard: PlacedMeasurement,
        body: Box<Statement>,
    },
    Choice(Vec<Statement>),
    Seq(Vec<Statement>),
    Assert(Vec<PlacedPredicate>),
}

/// A register, a precondition, a program and a postcondition
#[derive(Debug, Clone)]
pub struct ProofTerm {
    pub register: Register,
    pub pre: Vec<PlacedPredicate>,
    pub body: Statement,
    pub post: Vec<PlacedPredicate>,
}

fn check_placement(
    name: &str,
    qubits: &[String],
    dim: usize,
    register: &Register,
) -> Result<()> {
    for (i, q) in qubits.iter().enumerate() {
        if qubits[..i].contains(q) {
            return Err(VerifyError::DuplicateQubit {
                name: name.to_string(),
                qubit: q.clone(),
            });
        }
        if !register.contains(q) {
            return Err(VerifyError::QubitNotInRegister {
                qubit: q.clone(),
                register: register.to_string(),
            });
        }
    }
    let expected = dim.trailing_zeros() as usize;
    if qubits.len() != expected {
        return Err(VerifyError::QubitCountMismatch {
            name: name.to_string(),
            expected,
            actual: qubits.len(),
        });
    }
    Ok(())
}

fn check_predicates(
    predicates: &[PlacedPredicate],
    register: &Register,
    settings: &Settings,
) -> Result<()> {
    for p in predicates {
        check_placement(&p.name, &p.qubits, p.matrix.nrows(), register)?;
        if !is_hermitian(&p.matrix, settings.eps) || !is_effect(&p.matrix, settings.eps)? {
            return Err(VerifyError::NotAPredicate(p.label()));
        }
    }
    Ok(())
}

fn check_measurement(
    m: &PlacedMeasurement,
    register: &Register,
    settings: &Settings,
) -> Result<()> {
    check_placement(&m.name, &m.qubits, m.m0.nrows(), register)?;
    if m.m0.nrows() != m.m1.nrows() || !is_measurement_pair(&m.m0, &m.m1, settings.eps) {
        return Err(VerifyError::NotAMeasurement(m.name.clone()));
    }
    Ok(())
}

impl Statement {
    /// Whether the statement contains a loop
    pub fn contains_while(&self) -> bool {
        match self {
            Self::While { .. } => true,
            Self::If {
                then_branch,
                else_branch,
                ..
            } => then_branch.contains_while() || else_branch.contains_while(),
            Self::Choice(branches) => branches.iter().any(Self::contains_while),
            Self::Seq(stmts) => stmts.iter().any(Self::contains_while),
            _ => false,
        }
    }

    /// Validate placements and operator roles against a register
    pub fn validate(&self, register: &Register, settings: &Settings) -> Result<()> {
        match self {
            Self::Skip | Self::Abort => Ok(()),
            Self::Init { qubits } => {
                check_placement("init", qubits, 1 << qubits.len(), register)
            }
            Self::Unitary(u) => {
                check_placement(&u.name, &u.qubits, u.matrix.nrows(), register)?;
                if !is_unitary(&u.matrix, settings.eps) {
                    return Err(VerifyError::NotUnitary(u.name.clone()));
                }
                Ok(())
            }
            Self::If {
                guard,
                then_branch,
                else_branch,
            } => {
                check_measurement(guard, register, settings)?;
                then_branch.validate(register, settings)?;
                else_branch.validate(register, settings)
            }
            Self::While {
                invariant,
                guard,
                body,
            } => {
                check_predicates(invariant, register, settings)?;
                check_measurement(guard, register, settings)?;
                body.validate(register, settings)
            }
            Self::Choice(branches) => {
                if branches.len() < 2 {
                    return Err(VerifyError::ChoiceArity(branches.len()));
                }
                for branch in branches {
                    branch.validate(register, settings)?;
                }
                Ok(())
            }
            Self::Seq(stmts) => {
                for stmt in stmts {
                    stmt.validate(register, settings)?;
                }
                Ok(())
            }
            Self::Assert(predicates) => check_predicates(predicates, register, settings),
        }
    }

    /// Single-line summary used by proof outlines
    pub fn summary(&self) -> String {
        match self {
            Self::Skip => "skip".to_string(),
            Self::Abort => "abort".to_string(),
            Self::Init { qubits } => format!("{} := 0", placement(qubits)),
            Self::Unitary(u) => format!("{} *= {}", placement(&u.qubits), u.name),
            Self::If { guard, .. } => {
                format!("if {}[{}] then .. else .. end", guard.name, guard.qubits.join(" "))
            }
            Self::While { guard, .. } => {
                format!("while {}[{}] do .. end", guard.name, guard.qubits.join(" "))
            }
            Self::Choice(branches) => {
                let dots = vec![".."; branches.len()];
                format!("( {} )", dots.join(" # "))
            }
            Self::Seq(stmts) => stmts
                .iter()
                .map(Self::summary)
                .collect::<Vec<_>>()
                .join("; "),
            Self::Assert(predicates) => format!("{{ {} }}", labels(predicates)),
        }
    }

    fn fmt_indented(&self, f: &mut std::fmt::Formatter<'_>, indent: usize) -> std::fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            Self::Skip => write!(f, "{pad}skip"),
            Self::Abort => write!(f, "{pad}abort"),
            Self::Init { qubits } => write!(f, "{pad}{} := 0", placement(qubits)),
            Self::Unitary(u) => write!(f, "{pad}{} *= {}", placement(&u.qubits), u.name),
            Self::If {
                guard,
                then_branch,
                else_branch,
            } => {
                writeln!(f, "{pad}if {}[{}] then", guard.name, guard.qubits.join(" "))?;
                then_branch.fmt_indented(f, indent + 1)?;
                writeln!(f)?;
                writeln!(f, "{pad}else")?;
                else_branch.fmt_indented(f, indent + 1)?;
                writeln!(f)?;
                write!(f, "{pad}end")
            }
            Self::While {
                invariant,
                guard,
                body,
            } => {
                writeln!(f, "{pad}{{ inv: {} }};", labels(invariant))?;
                writeln!(f, "{pad}while {}[{}] do", guard.name, guard.qubits.join(" "))?;
                body.fmt_indented(f, indent + 1)?;
                writeln!(f)?;
                write!(f, "{pad}end")
            }
            Self::Choice(branches) => {
                writeln!(f, "{pad}(")?;
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        writeln!(f, "{pad}#")?;
                    }
                    branch.fmt_indented(f, indent + 1)?;
                    writeln!(f)?;
                }
                write!(f, "{pad})")
            }
            Self::Seq(stmts) => {
                for (i, stmt) in stmts.iter().enumerate() {
                    if i > 0 {
                        writeln!(f, ";")?;
                    }
                    stmt.fmt_indented(f, indent)?;
                }
                Ok(())
            }
            Self::Assert(predicates) => write!(f, "{pad}{{ {} }}", labels(predicates)),
        }
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl ProofTerm {
    /// Validate register containment, placements and operator roles
    pub fn validate(&self, settings: &Settings) -> Result<()> {
        check_predicates(&self.pre, &self.register, settings)?;
        check_predicates(&self.post, &self.register, settings)?;
        self.body.validate(&self.register, settings)
    }
}

impl std::fmt::Display for ProofTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "proof {} :", self.register)?;
        writeln!(f, "  {{ {} }}", labels(&self.pre))?;
        self.body.fmt_indented(f, 1)?;
        writeln!(f)?;
        write!(f, "  {{ {} }}", labels(&self.post))
    }
}

fn placement(qubits: &[String]) -> String {
    if qubits.len() == 1 {
        qubits[0].clone()
    } else {
        format!("[{}]", qubits.join(" "))
    }
}

fn labels(predicates: &[PlacedPredicate]) -> String {
    predicates
        .iter()
        .map(PlacedPredicate::label)
        .collect::<Vec<_>>()
        .join(" ")
}
