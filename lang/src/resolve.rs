//! Command interpreter and name resolution
//!
//! Walks the parsed command list against a scope tree: `def` evaluates its
//! right-hand side (loading operators, building sub-scopes, or resolving
//! and immediately verifying proof terms), `show` renders bindings, `save`
//! writes operator files, and `setting` updates the current scope. A
//! failed proof is terminal for that proof only; unrelated commands in the
//! same file still run.

use crate::error::Result;
use crate::loader;
use crate::parser::{parse, Command, Expr, OperatorRef, ProofExpr, SettingLit, Stmt};
use nalgebra::DMatrix;
use qpv_core::{Complex, OperatorValue, Register};
use qpv_verify::{
    prelude, render_outline, verify, Binding, PlacedMeasurement, PlacedPredicate, PlacedUnitary,
    ProofTerm, Scope, SettingValue, Statement, Verdict, VerifiedProof, VerifyError,
};
use std::path::Path;
use std::rc::Rc;
use tracing::info;

/// The result of running one command
#[derive(Debug)]
pub enum Outcome {
    Defined {
        name: String,
        kind: &'static str,
    },
    Verified {
        name: String,
        verdict: Verdict,
        rendered: String,
    },
    Shown {
        path: String,
        text: String,
    },
    Saved {
        path: String,
        file: String,
    },
    SettingUpdated {
        key: String,
        value: String,
    },
    Failed {
        context: String,
        error: String,
    },
}

impl Outcome {
    /// Whether the command reached its goal (for proofs: the verdict holds)
    pub fn succeeded(&self) -> bool {
        match self {
            Self::Failed { .. } => false,
            Self::Verified { verdict, .. } => *verdict == Verdict::Holds,
            _ => true,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Defined { name, kind } => write!(f, "defined {name} ({kind})"),
            Self::Verified {
                name, rendered, ..
            } => {
                writeln!(f, "{name}:")?;
                write!(f, "{rendered}")
            }
            Self::Shown { path, text } => {
                writeln!(f, "{path}:")?;
                write!(f, "{text}")
            }
            Self::Saved { path, file } => write!(f, "saved {path} to {file}"),
            Self::SettingUpdated { key, value } => write!(f, "setting {key} := {value}"),
            Self::Failed { context, error } => write!(f, "error in {context}: {error}"),
        }
    }
}

/// Interpreter over one scope
pub struct Interpreter {
    scope: Rc<Scope>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter over a fresh child of the preloaded library
    pub fn new() -> Self {
        Self {
            scope: prelude::standard().child(),
        }
    }

    /// An interpreter over an existing scope
    pub fn with_scope(scope: Rc<Scope>) -> Self {
        Self { scope }
    }

    /// The interpreter's scope
    pub fn scope(&self) -> &Rc<Scope> {
        &self.scope
    }

    /// Parse and run a whole source file. Syntax errors abort; semantic
    /// failures are reported per command and the rest of the file runs.
    pub fn run_source(&mut self, source: &str) -> Result<Vec<Outcome>> {
        let commands = parse(source)?;
        Ok(commands
            .iter()
            .map(|command| match self.run_command(command) {
                Ok(outcome) => outcome,
                Err(err) => Outcome::Failed {
                    context: describe(command),
                    error: err.to_string(),
                },
            })
            .collect())
    }

    /// Run a single command
    pub fn run_command(&mut self, command: &Command) -> Result<Outcome> {
        match command {
            Command::Setting { key, value } => {
                let value = match value {
                    SettingLit::Float(x) => SettingValue::Float(*x),
                    SettingLit::Bool(b) => SettingValue::Bool(*b),
                };
                self.scope.update_setting(key, value)?;
                Ok(Outcome::SettingUpdated {
                    key: key.clone(),
                    value: value.to_string(),
                })
            }

            Command::Show { path } => {
                let joined = path.join(".");
                let binding = self
                    .scope
                    .lookup_path(path)
                    .ok_or_else(|| VerifyError::UndefinedName(joined.clone()))?;
                Ok(Outcome::Shown {
                    path: joined,
                    text: render_binding(&binding),
                })
            }

            Command::Save { path, file } => {
                let joined = path.join(".");
                let binding = self
                    .scope
                    .lookup_path(path)
                    .ok_or_else(|| VerifyError::UndefinedName(joined.clone()))?;
                let Binding::Operator(value) = binding else {
                    return Err(VerifyError::NotAnOperator(joined).into());
                };
                loader::save_operator(Path::new(file), &value, self.scope.settings().eps)?;
                Ok(Outcome::Saved {
                    path: joined,
                    file: file.clone(),
                })
            }

            Command::Def { name, expr } => self.run_def(name, expr),
        }
    }

    fn run_def(&mut self, name: &str, expr: &Expr) -> Result<Outcome> {
        match expr {
            Expr::Load(file) => {
                let value = loader::load_operator(Path::new(file), self.scope.settings().eps)?;
                self.scope
                    .bind(name, Binding::Operator(Rc::new(value)))?;
                Ok(Outcome::Defined {
                    name: name.to_string(),
                    kind: "operator",
                })
            }

            Expr::Predicate(refs) => {
                let predicates = self.resolve_predicate_list(refs)?;
                // Implied register: the placements in order of appearance
                let mut qubits: Vec<String> = Vec::new();
                for p in &predicates {
                    for q in &p.qubits {
                        if !qubits.contains(q) {
                            qubits.push(q.clone());
                        }
                    }
                }
                let register = Register::new(qubits)?;
                let settings = self.scope.settings();
                for p in &predicates {
                    register.contains_all(&p.qubits)?;
                    if !qpv_core::is_effect(&p.matrix, settings.eps)? {
                        return Err(VerifyError::NotAPredicate(p.label()).into());
                    }
                }
                self.scope
                    .bind(name, Binding::Assertion(Rc::new(predicates)))?;
                Ok(Outcome::Defined {
                    name: name.to_string(),
                    kind: "assertion",
                })
            }

            Expr::Proof(proof_expr) => {
                let term = self.resolve_proof(proof_expr)?;
                let report = verify(&term, &self.scope)?;
                info!(name, verdict = %report.verdict, "proof term verified");
                let rendered = render_outline(&term, &report);
                let verdict = report.verdict;
                let proof = VerifiedProof { term, report };
                self.scope.bind(name, Binding::Proof(Rc::new(proof)))?;
                Ok(Outcome::Verified {
                    name: name.to_string(),
                    verdict,
                    rendered,
                })
            }

            Expr::Scope(commands) => {
                let child = self.scope.child();
                let mut inner = Interpreter::with_scope(child.clone());
                for command in commands {
                    inner.run_command(command)?;
                }
                self.scope.bind(name, Binding::Scope(child))?;
                Ok(Outcome::Defined {
                    name: name.to_string(),
                    kind: "scope",
                })
            }
        }
    }

    // ==================== Resolution ====================

    fn resolve_proof(&self, proof: &ProofExpr) -> Result<ProofTerm> {
        let register = Register::new(proof.register.clone())?;
        let pre = self.resolve_predicate_list(&proof.pre)?;
        let body = self.resolve_body(&proof.body)?;
        let post = self.resolve_predicate_list(&proof.post)?;
        Ok(ProofTerm {
            register,
            pre,
            body,
            post,
        })
    }

    fn resolve_body(&self, stmts: &[Stmt]) -> Result<Statement> {
        let mut resolved = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            resolved.push(self.resolve_stmt(stmt)?);
        }
        if resolved.len() == 1 {
            Ok(resolved.remove(0))
        } else {
            Ok(Statement::Seq(resolved))
        }
    }

    fn resolve_stmt(&self, stmt: &Stmt) -> Result<Statement> {
        match stmt {
            Stmt::Skip => Ok(Statement::Skip),
            Stmt::Abort => Ok(Statement::Abort),
            Stmt::Init { qubits } => Ok(Statement::Init {
                qubits: qubits.clone(),
            }),
            Stmt::Unitary(op) => {
                let matrix = self.resolve_square(op)?;
                Ok(Statement::Unitary(PlacedUnitary {
                    name: op.path.join("."),
                    qubits: op.qubits.clone(),
                    matrix,
                }))
            }
            Stmt::If {
                guard,
                then_body,
                else_body,
            } => Ok(Statement::If {
                guard: self.resolve_measurement(guard)?,
                then_branch: Box::new(self.resolve_body(then_body)?),
                else_branch: Box::new(self.resolve_body(else_body)?),
            }),
            Stmt::While {
                invariant,
                guard,
                body,
            } => Ok(Statement::While {
                invariant: self.resolve_predicate_list(invariant)?,
                guard: self.resolve_measurement(guard)?,
                body: Box::new(self.resolve_body(body)?),
            }),
            Stmt::Choice(branches) => {
                let mut resolved = Vec::with_capacity(branches.len());
                for branch in branches {
                    resolved.push(self.resolve_body(branch)?);
                }
                Ok(Statement::Choice(resolved))
            }
            Stmt::Assert(refs) => Ok(Statement::Assert(self.resolve_predicate_list(refs)?)),
        }
    }

    fn resolve_predicate_list(&self, refs: &[OperatorRef]) -> Result<Vec<PlacedPredicate>> {
        refs.iter().map(|r| self.resolve_predicate(r)).collect()
    }

    fn resolve_predicate(&self, op: &OperatorRef) -> Result<PlacedPredicate> {
        let matrix = self.resolve_square(op)?;
        Ok(PlacedPredicate {
            name: op.path.join("."),
            qubits: op.qubits.clone(),
            matrix,
        })
    }

    fn resolve_square(&self, op: &OperatorRef) -> Result<DMatrix<Complex>> {
        let name = op.path.join(".");
        match self.lookup_operator(op)?.as_ref() {
            OperatorValue::Square(m) => Ok(m.clone()),
            OperatorValue::Measurement { .. } => Err(VerifyError::NotAnOperator(format!(
                "{name} is a measurement and cannot stand here"
            ))
            .into()),
        }
    }

    fn resolve_measurement(&self, op: &OperatorRef) -> Result<PlacedMeasurement> {
        let name = op.path.join(".");
        match self.lookup_operator(op)?.as_ref() {
            OperatorValue::Measurement { m0, m1 } => Ok(PlacedMeasurement {
                name,
                qubits: op.qubits.clone(),
                m0: m0.clone(),
                m1: m1.clone(),
            }),
            OperatorValue::Square(_) => Err(VerifyError::NotAMeasurement(name).into()),
        }
    }

    fn lookup_operator(&self, op: &OperatorRef) -> Result<Rc<OperatorValue>> {
        let name = op.path.join(".");
        match self.scope.lookup_path(&op.path) {
            Some(Binding::Operator(value)) => Ok(value),
            Some(_) => Err(VerifyError::NotAnOperator(name).into()),
            None => Err(VerifyError::UndefinedName(name).into()),
        }
    }
}

// ==================== Rendering ====================

fn describe(command: &Command) -> String {
    match command {
        Command::Def { name, .. } => format!("def {name}"),
        Command::Show { path } => format!("show {}", path.join(".")),
        Command::Save { path, .. } => format!("save {}", path.join(".")),
        Command::Setting { key, .. } => format!("setting {key}"),
    }
}

fn format_complex(c: Complex) -> String {
    if c.im.abs() < 1e-12 {
        format!("{:.4}", c.re)
    } else {
        format!("{:.4}{:+.4}i", c.re, c.im)
    }
}

fn format_matrix(m: &DMatrix<Complex>) -> String {
    let mut rows = Vec::with_capacity(m.nrows());
    for i in 0..m.nrows() {
        let entries: Vec<String> = (0..m.ncols()).map(|j| format_complex(m[(i, j)])).collect();
        rows.push(format!("  [ {} ]", entries.join("  ")));
    }
    rows.join("\n")
}

fn render_binding(binding: &Binding) -> String {
    match binding {
        Binding::Operator(value) => match value.as_ref() {
            OperatorValue::Square(m) => format_matrix(m),
            OperatorValue::Measurement { m0, m1 } => {
                format!(
                    "outcome 0:\n{}\noutcome 1:\n{}",
                    format_matrix(m0),
                    format_matrix(m1)
                )
            }
        },
        Binding::Proof(proof) => render_outline(&proof.term, &proof.report),
        Binding::Assertion(predicates) => {
            let labels: Vec<String> = predicates.iter().map(|p| p.label()).collect();
            format!("{{ {} }}", labels.join(" "))
        }
        Binding::Scope(scope) => {
            let mut lines: Vec<String> = scope
                .entries()
                .iter()
                .map(|(name, binding)| format!("  {name}: {}", binding.kind()))
                .collect();
            if lines.is_empty() {
                lines.push("  (empty)".to_string());
            }
            lines.join("\n")
        }
    }
}
