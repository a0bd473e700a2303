//! Verifier driver
//!
//! Orchestrates the backward transformer over a proof term, collates the
//! proof outline, and produces the verdict:
//!
//! - `holds` - the stated precondition entails the computed one;
//! - `does not hold` - the entailment failed and the program is loop-free
//!   (the transformer is exact in that fragment);
//! - `undetermined` - a loop is present and either the invariant check or
//!   the final entailment failed: the invariant may simply be too weak.

use crate::ast::ProofTerm;
use crate::error::{Result, VerifyError};
use crate::scope::Scope;
use crate::transformer::{assertion_set, OutlineEntry, Transformer};
use serde::Serialize;
use std::fmt::Write as _;
use std::rc::Rc;
use tracing::{info, warn};

/// Final verdict for one proof term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Holds,
    DoesNotHold,
    Undetermined,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Holds => write!(f, "holds"),
            Self::DoesNotHold => write!(f, "does not hold"),
            Self::Undetermined => write!(f, "undetermined"),
        }
    }
}

/// Kind of the first failure site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    EntailmentFailed,
    InvariantFailed,
    AssertionFailed,
}

/// First failure site and its kind
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Structured verification result
#[derive(Debug, Clone, Serialize)]
pub struct VerdictReport {
    pub verdict: Verdict,
    pub outline: Vec<OutlineEntry>,
    pub diagnostic: Option<Diagnostic>,
}

/// A proof term together with its verification result
#[derive(Debug, Clone)]
pub struct VerifiedProof {
    pub term: ProofTerm,
    pub report: VerdictReport,
}

/// Verify a resolved proof term against a scope.
///
/// Intermediate predicates are interned into `scope` under generated names
/// as the transformer walks the program.
pub fn verify(term: &ProofTerm, scope: &Rc<Scope>) -> Result<VerdictReport> {
    let settings = scope.settings();
    settings.validate()?;
    term.validate(&settings)?;

    let register = term.register.clone();
    let pre = assertion_set(&register, &term.pre, settings.eps)?;
    let post = assertion_set(&register, &term.post, settings.eps)?;

    if !settings.silent {
        info!(register = %register, "verifying proof term");
    }

    let transformer = Transformer::new(scope, register);
    let (computed, outline) = match transformer.run(&term.body, &post) {
        Ok(result) => result,
        Err(VerifyError::InvariantFailed { stage, detail }) => {
            let message = format!("loop invariant failed the {stage} entailment: {detail}");
            if !settings.silent {
                warn!(%message);
            }
            return Ok(VerdictReport {
                verdict: Verdict::Undetermined,
                outline: Vec::new(),
                diagnostic: Some(Diagnostic {
                    kind: DiagnosticKind::InvariantFailed,
                    message,
                }),
            });
        }
        Err(VerifyError::AssertionFailed(label)) => {
            let message =
                format!("intermediate assertion does not entail its postcondition at '{label}'");
            if !settings.silent {
                warn!(%message);
            }
            return Ok(VerdictReport {
                verdict: Verdict::Undetermined,
                outline: Vec::new(),
                diagnostic: Some(Diagnostic {
                    kind: DiagnosticKind::AssertionFailed,
                    message,
                }),
            });
        }
        Err(err) => return Err(err),
    };

    let check = pre.entails(&computed, settings.sdp_precision)?;
    if check.holds {
        if !settings.silent {
            info!(verdict = %Verdict::Holds, "verification finished");
        }
        return Ok(VerdictReport {
            verdict: Verdict::Holds,
            outline,
            diagnostic: None,
        });
    }

    let failing = check
        .failing
        .and_then(|i| computed.labels().get(i).cloned())
        .unwrap_or_else(|| "?".to_string());
    let verdict = if term.body.contains_while() {
        Verdict::Undetermined
    } else {
        Verdict::DoesNotHold
    };
    let message = format!("stated precondition does not entail computed element '{failing}'");
    if !settings.silent {
        info!(verdict = %verdict, %message, "verification finished");
    }
    Ok(VerdictReport {
        verdict,
        outline,
        diagnostic: Some(Diagnostic {
            kind: DiagnosticKind::EntailmentFailed,
            message,
        }),
    })
}

/// Render a textual proof outline: the program interleaved with its
/// computed weakest preconditions.
pub fn render_outline(term: &ProofTerm, report: &VerdictReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "proof {} :", term.register);
    for entry in &report.outline {
        let pad = "  ".repeat(entry.depth + 1);
        let _ = writeln!(out, "{pad}{{ {} }}", entry.pre.join(" "));
        let _ = writeln!(out, "{pad}{};", entry.statement);
    }
    let post: Vec<String> = term.post.iter().map(|p| p.label()).collect();
    let _ = writeln!(out, "  {{ {} }}", post.join(" "));
    let _ = write!(out, "verdict: {}", report.verdict);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{PlacedPredicate, PlacedUnitary, Statement};
    use crate::prelude;
    use crate::scope::Binding;
    use nalgebra::DMatrix;
    use qpv_core::{Complex, OperatorValue, Register};

    fn library_square(scope: &Rc<Scope>, name: &str) -> DMatrix<Complex> {
        match scope.lookup(name) {
            Some(Binding::Operator(op)) => match op.as_ref() {
                OperatorValue::Square(m) => m.clone(),
                _ => panic!("{name} is not square"),
            },
            _ => panic!("{name} missing"),
        }
    }

    fn predicate(scope: &Rc<Scope>, name: &str, q: &str) -> PlacedPredicate {
        PlacedPredicate {
            name: name.to_string(),
            qubits: vec![q.to_string()],
            matrix: library_square(scope, name),
        }
    }

    fn flip_term(scope: &Rc<Scope>, post_name: &str) -> ProofTerm {
        ProofTerm {
            register: Register::new(vec!["q"]).unwrap(),
            pre: vec![predicate(scope, "P0", "q")],
            body: Statement::Unitary(PlacedUnitary {
                name: "X".to_string(),
                qubits: vec!["q".to_string()],
                matrix: library_square(scope, "X"),
            }),
            post: vec![predicate(scope, post_name, "q")],
        }
    }

    #[test]
    fn test_flip_holds() {
        let scope = prelude::standard().child();
        let report = verify(&flip_term(&scope, "P1"), &scope).unwrap();
        assert_eq!(report.verdict, Verdict::Holds);
        assert!(report.diagnostic.is_none());
        assert_eq!(report.outline.len(), 1);
    }

    #[test]
    fn test_flip_wrong_post_does_not_hold() {
        let scope = prelude::standard().child();
        let report = verify(&flip_term(&scope, "P0"), &scope).unwrap();
        assert_eq!(report.verdict, Verdict::DoesNotHold);
        let diag = report.diagnostic.expect("diagnostic on failure");
        assert_eq!(diag.kind, DiagnosticKind::EntailmentFailed);
    }

    #[test]
    fn test_outline_rendering() {
        let scope = prelude::standard().child();
        let term = flip_term(&scope, "P1");
        let report = verify(&term, &scope).unwrap();
        let text = render_outline(&term, &report);
        assert!(text.contains("proof [q] :"));
        assert!(text.contains("q *= X"));
        assert!(text.contains("verdict: holds"));
    }
}
