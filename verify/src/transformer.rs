//! Backward predicate transformer
//!
//! Computes `wp(S, Q)` per the quantum Hoare rules over assertion sets.
//! The transformer itself is stateless; the only implicit state is the
//! naming counter on the scope, reached through [`Scope::intern_predicate`]
//! when intermediate predicates are offered to the scope after each rule.
//! Growth from the `if` rule's Cartesian combination is bounded by
//! structural deduplication after every step.

use crate::ast::{PlacedMeasurement, PlacedPredicate, Statement};
use crate::error::{InvariantStage, Result, VerifyError};
use crate::scope::Scope;
use crate::settings::Settings;
use nalgebra::DMatrix;
use qpv_core::{sandwich, Complex, PlacedOperator, PredicateSet, Register, ONE};
use serde::Serialize;
use std::rc::Rc;
use tracing::debug;

/// One `(statement, precondition, postcondition)` triple of a proof outline
#[derive(Debug, Clone, Serialize)]
pub struct OutlineEntry {
    /// Nesting depth within compound statements
    pub depth: usize,
    /// Single-line statement summary
    pub statement: String,
    /// Labels of the computed precondition set
    pub pre: Vec<String>,
    /// Labels of the postcondition set the statement was transformed against
    pub post: Vec<String>,
}

/// Build a canonical assertion set from placed predicates
pub fn assertion_set(
    register: &Register,
    predicates: &[PlacedPredicate],
    eps: f64,
) -> Result<PredicateSet> {
    let mut items = Vec::with_capacity(predicates.len());
    for p in predicates {
        let label = if p.qubits == register.qubits() {
            p.name.clone()
        } else {
            p.label()
        };
        items.push((
            Some(label),
            PlacedOperator::new(p.qubits.clone(), p.matrix.clone())?,
        ));
    }
    Ok(PredicateSet::from_placed(register.clone(), items, eps)?)
}

/// Backward walker over one proof term
pub struct Transformer<'a> {
    scope: &'a Rc<Scope>,
    register: Register,
    settings: Settings,
    // Entries accumulate in completion order (backward); `run` reverses
    // them into program order.
    entries: Vec<OutlineEntry>,
}

impl<'a> Transformer<'a> {
    pub fn new(scope: &'a Rc<Scope>, register: Register) -> Self {
        let settings = scope.settings();
        Self {
            scope,
            register,
            settings,
            entries: Vec::new(),
        }
    }

    /// Compute `wp(body, post)`, returning the precondition set and the
    /// proof outline in program order.
    pub fn run(
        mut self,
        body: &Statement,
        post: &PredicateSet,
    ) -> Result<(PredicateSet, Vec<OutlineEntry>)> {
        let pre = self.wp(body, post, 0)?;
        self.entries.reverse();
        Ok((pre, self.entries))
    }

    fn wp(&mut self, stmt: &Statement, post: &PredicateSet, depth: usize) -> Result<PredicateSet> {
        let eps = self.settings.eps;
        match stmt {
            Statement::Skip => {
                let pre = post.clone();
                self.record(depth, stmt.summary(), &pre, post);
                Ok(pre)
            }

            Statement::Abort => {
                let pre = self.finalize(PredicateSet::identity(self.register.clone()));
                self.record(depth, stmt.summary(), &pre, post);
                Ok(pre)
            }

            Statement::Init { qubits } => {
                // Reset rule: H ↦ Σₖ |k⟩⟨0| · H · |0⟩⟨k| on the named qubits
                let sub_dim = 1usize << qubits.len();
                let mut embeddings = Vec::with_capacity(sub_dim);
                for k in 0..sub_dim {
                    let mut ket = DMatrix::zeros(sub_dim, sub_dim);
                    ket[(0, k)] = ONE;
                    embeddings.push(self.extend_matrix(qubits, &ket)?);
                }
                let dim = self.register.dimension();
                let pre = post.map(eps, |h| {
                    let mut acc: DMatrix<Complex> = DMatrix::zeros(dim, dim);
                    for e in &embeddings {
                        acc += sandwich(e, h)?;
                    }
                    Ok(acc)
                })?;
                let pre = self.finalize(pre);
                self.record(depth, stmt.summary(), &pre, post);
                Ok(pre)
            }

            Statement::Unitary(u) => {
                let u_ext = self.extend_matrix(&u.qubits, &u.matrix)?;
                let pre = post.map(eps, |h| sandwich(&u_ext, h))?;
                let pre = self.finalize(pre);
                self.record(depth, stmt.summary(), &pre, post);
                Ok(pre)
            }

            Statement::If {
                guard,
                then_branch,
                else_branch,
            } => {
                let m0 = self.extend_matrix(&guard.qubits, &guard.m0)?;
                let m1 = self.extend_matrix(&guard.qubits, &guard.m1)?;
                // The else branch is transformed first so the reversed
                // outline reads in program order.
                let wp_else = self.wp(else_branch, post, depth + 1)?;
                let wp_then = self.wp(then_branch, post, depth + 1)?;

                // Cartesian combination: every element of each branch must
                // be covered.
                let mut pre = PredicateSet::empty(self.register.clone());
                for ht in wp_then.items() {
                    for he in wp_else.items() {
                        let combined = sandwich(&m1, &ht.matrix)? + sandwich(&m0, &he.matrix)?;
                        pre.insert(None, combined, eps);
                    }
                }
                let pre = self.finalize(pre);
                self.record(depth, stmt.summary(), &pre, post);
                Ok(pre)
            }

            Statement::While {
                invariant,
                guard,
                body,
            } => self.wp_while(invariant, guard, body, post, depth),

            Statement::Choice(branches) => {
                let mut pre: Option<PredicateSet> = None;
                for branch in branches.iter().rev() {
                    let w = self.wp(branch, post, depth + 1)?;
                    pre = Some(match pre {
                        None => w,
                        Some(acc) => w.meet(&acc, eps)?,
                    });
                }
                let Some(pre) = pre else {
                    return Err(VerifyError::ChoiceArity(0));
                };
                let pre = self.finalize(pre);
                self.record(depth, stmt.summary(), &pre, post);
                Ok(pre)
            }

            Statement::Seq(stmts) => {
                let mut current = post.clone();
                for stmt in stmts.iter().rev() {
                    current = self.wp(stmt, &current, depth)?;
                }
                Ok(current)
            }

            Statement::Assert(predicates) => {
                let set = assertion_set(&self.register, predicates, eps)?;
                let check = set.entails(post, self.settings.sdp_precision)?;
                if !check.holds {
                    let failing = check
                        .failing
                        .and_then(|i| post.labels().get(i).cloned())
                        .unwrap_or_else(|| "?".to_string());
                    return Err(VerifyError::AssertionFailed(failing));
                }
                self.record(depth, stmt.summary(), &set, post);
                Ok(set)
            }
        }
    }

    /// The while rule pipeline: body-wp, then the invariant entailment,
    /// with failures split into preservation and exit diagnostics.
    fn wp_while(
        &mut self,
        invariant: &[PlacedPredicate],
        guard: &PlacedMeasurement,
        body: &Statement,
        post: &PredicateSet,
        depth: usize,
    ) -> Result<PredicateSet> {
        let eps = self.settings.eps;
        let precision = self.settings.sdp_precision;

        let inv = assertion_set(&self.register, invariant, eps)?;
        let m0 = self.extend_matrix(&guard.qubits, &guard.m0)?;
        let m1 = self.extend_matrix(&guard.qubits, &guard.m1)?;

        debug!(guard = %guard.name, "checking loop invariant");
        let body_wp = self.wp(body, &inv, depth + 1)?;

        let combined = self.loop_combination(post, &body_wp, &m0, &m1)?;
        let check = inv.entails(&combined, precision)?;
        if !check.holds {
            // Re-run the failing entailment with the invariant standing in
            // for the body's wp: if that version holds, the body is what
            // loses the invariant; otherwise the invariant cannot reach the
            // postcondition on exit.
            let idealized = self.loop_combination(post, &inv, &m0, &m1)?;
            let stage = if inv.entails(&idealized, precision)?.holds {
                InvariantStage::Preservation
            } else {
                InvariantStage::Exit
            };
            let detail = format!(
                "invariant {{ {} }} does not cover element {} of the combined guard set",
                inv.labels().join(" "),
                check.failing.map_or_else(|| "?".to_string(), |i| i.to_string()),
            );
            return Err(VerifyError::InvariantFailed { stage, detail });
        }

        let summary = format!("while {}[{}] do .. end", guard.name, guard.qubits.join(" "));
        self.record(depth, summary, &inv, post);
        Ok(inv)
    }

    /// `{M₀† q M₀ + M₁† j M₁ : q ∈ post, j ∈ js}`
    fn loop_combination(
        &self,
        post: &PredicateSet,
        js: &PredicateSet,
        m0: &DMatrix<Complex>,
        m1: &DMatrix<Complex>,
    ) -> Result<PredicateSet> {
        let mut out = PredicateSet::empty(self.register.clone());
        for q in post.items() {
            for j in js.items() {
                let combined = sandwich(m0, &q.matrix)? + sandwich(m1, &j.matrix)?;
                out.insert(None, combined, self.settings.eps);
            }
        }
        Ok(out)
    }

    fn extend_matrix(&self, qubits: &[String], matrix: &DMatrix<Complex>) -> Result<DMatrix<Complex>> {
        Ok(PlacedOperator::new(qubits.to_vec(), matrix.clone())?
            .extend(&self.register)?
            .into_matrix())
    }

    /// Offer every unnamed element to the scope and label it
    fn finalize(&self, set: PredicateSet) -> PredicateSet {
        let mut out = PredicateSet::empty(self.register.clone());
        for item in set.items() {
            let label = item
                .label
                .clone()
                .unwrap_or_else(|| self.scope.intern_predicate(&item.matrix));
            out.insert(Some(label), item.matrix.clone(), self.settings.eps);
        }
        out
    }

    fn record(&mut self, depth: usize, statement: String, pre: &PredicateSet, post: &PredicateSet) {
        self.entries.push(OutlineEntry {
            depth,
            statement,
            pre: pre.labels(),
            post: post.labels(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{PlacedMeasurement, PlacedUnitary};
    use crate::prelude;
    use qpv_core::{frobenius_distance, is_effect, ZERO};

    fn reg(names: &[&str]) -> Register {
        Register::new(names.to_vec()).unwrap()
    }

    fn p0() -> DMatrix<Complex> {
        DMatrix::from_row_slice(2, 2, &[ONE, ZERO, ZERO, ZERO])
    }

    fn p1() -> DMatrix<Complex> {
        DMatrix::from_row_slice(2, 2, &[ZERO, ZERO, ZERO, ONE])
    }

    fn x_gate() -> DMatrix<Complex> {
        DMatrix::from_row_slice(2, 2, &[ZERO, ONE, ONE, ZERO])
    }

    fn h_gate() -> DMatrix<Complex> {
        let h = Complex::new(qpv_core::FRAC_1_SQRT_2, 0.0);
        DMatrix::from_row_slice(2, 2, &[h, h, h, -h])
    }

    fn unitary(name: &str, q: &str, m: DMatrix<Complex>) -> Statement {
        Statement::Unitary(PlacedUnitary {
            name: name.to_string(),
            qubits: vec![q.to_string()],
            matrix: m,
        })
    }

    fn m10(q: &str) -> PlacedMeasurement {
        PlacedMeasurement {
            name: "M10".to_string(),
            qubits: vec![q.to_string()],
            m0: p0(),
            m1: p1(),
        }
    }

    fn m01(q: &str) -> PlacedMeasurement {
        PlacedMeasurement {
            name: "M01".to_string(),
            qubits: vec![q.to_string()],
            m0: p1(),
            m1: p0(),
        }
    }

    fn placed(name: &str, q: &str, m: DMatrix<Complex>) -> PlacedPredicate {
        PlacedPredicate {
            name: name.to_string(),
            qubits: vec![q.to_string()],
            matrix: m,
        }
    }

    fn singleton(register: &Register, m: DMatrix<Complex>) -> PredicateSet {
        let mut set = PredicateSet::empty(register.clone());
        set.insert(None, m, 1e-7);
        set
    }

    fn run_wp(body: &Statement, post: &PredicateSet) -> PredicateSet {
        let scope = prelude::standard().child();
        let tr = Transformer::new(&scope, post.register().clone());
        tr.run(body, post).unwrap().0
    }

    #[test]
    fn test_wp_skip_is_post() {
        let r = reg(&["q"]);
        let post = singleton(&r, p0());
        let pre = run_wp(&Statement::Skip, &post);
        assert_eq!(pre.len(), 1);
        assert!(frobenius_distance(&pre.items()[0].matrix, &p0()) < 1e-12);
    }

    #[test]
    fn test_wp_abort_is_identity() {
        let r = reg(&["q"]);
        let post = singleton(&r, p0());
        let pre = run_wp(&Statement::Abort, &post);
        assert_eq!(pre.len(), 1);
        assert!(frobenius_distance(&pre.items()[0].matrix, &DMatrix::identity(2, 2)) < 1e-12);
    }

    #[test]
    fn test_wp_unitary_preserves_identity() {
        let r = reg(&["q"]);
        let post = PredicateSet::identity(r.clone());
        let pre = run_wp(&unitary("H", "q", h_gate()), &post);
        assert_eq!(pre.len(), 1);
        assert!(frobenius_distance(&pre.items()[0].matrix, &DMatrix::identity(2, 2)) < 1e-12);
    }

    #[test]
    fn test_wp_unitary_pulls_back() {
        // wp(q *= X, {P1}) = {P0}
        let r = reg(&["q"]);
        let post = singleton(&r, p1());
        let pre = run_wp(&unitary("X", "q", x_gate()), &post);
        assert!(frobenius_distance(&pre.items()[0].matrix, &p0()) < 1e-12);
    }

    #[test]
    fn test_wp_init_projects_on_zero() {
        let r = reg(&["q"]);
        let init = Statement::Init {
            qubits: vec!["q".to_string()],
        };
        // ⟨0|P0|0⟩ = 1, so the reset reaches {I}
        let pre = run_wp(&init, &singleton(&r, p0()));
        assert!(frobenius_distance(&pre.items()[0].matrix, &DMatrix::identity(2, 2)) < 1e-12);
        // ⟨0|P1|0⟩ = 0, so the reset cannot reach P1
        let pre = run_wp(&init, &singleton(&r, p1()));
        assert!(pre.items()[0].matrix.norm() < 1e-12);
    }

    #[test]
    fn test_wp_seq_composes() {
        let r = reg(&["q"]);
        let post = singleton(&r, p0());
        let seq = Statement::Seq(vec![
            unitary("H", "q", h_gate()),
            unitary("X", "q", x_gate()),
        ]);
        let pre_seq = run_wp(&seq, &post);
        let inner = run_wp(&unitary("X", "q", x_gate()), &post);
        let pre_nested = run_wp(&unitary("H", "q", h_gate()), &inner);
        assert!(
            frobenius_distance(&pre_seq.items()[0].matrix, &pre_nested.items()[0].matrix) < 1e-12
        );
    }

    #[test]
    fn test_wp_choice_idempotent() {
        let r = reg(&["q"]);
        let post = singleton(&r, p0());
        let branch = unitary("X", "q", x_gate());
        let choice = Statement::Choice(vec![branch.clone(), branch.clone()]);
        let pre_choice = run_wp(&choice, &post);
        let pre_single = run_wp(&branch, &post);
        assert_eq!(pre_choice.len(), pre_single.len());
        assert!(frobenius_distance(
            &pre_choice.items()[0].matrix,
            &pre_single.items()[0].matrix
        ) < 1e-12);
    }

    #[test]
    fn test_wp_if_combines_branches() {
        // if M10[q] then skip else skip end with post {P0}:
        // wp = M0 P0 M0 + M1 P0 M1 = P0
        let r = reg(&["q"]);
        let post = singleton(&r, p0());
        let stmt = Statement::If {
            guard: m10("q"),
            then_branch: Box::new(Statement::Skip),
            else_branch: Box::new(Statement::Skip),
        };
        let pre = run_wp(&stmt, &post);
        assert_eq!(pre.len(), 1);
        assert!(frobenius_distance(&pre.items()[0].matrix, &p0()) < 1e-12);
    }

    #[test]
    fn test_wp_elements_stay_effects() {
        let r = reg(&["q", "p"]);
        let post = singleton(&r, {
            let mut eq = DMatrix::zeros(4, 4);
            eq[(0, 0)] = ONE;
            eq[(3, 3)] = ONE;
            eq
        });
        let stmt = Statement::Seq(vec![
            Statement::Init {
                qubits: vec!["p".to_string()],
            },
            unitary("H", "q", h_gate()),
            Statement::If {
                guard: m10("q"),
                then_branch: Box::new(unitary("X", "p", x_gate())),
                else_branch: Box::new(Statement::Skip),
            },
        ]);
        let pre = run_wp(&stmt, &post);
        for item in pre.items() {
            assert!(is_effect(&item.matrix, 1e-7).unwrap());
        }
    }

    #[test]
    fn test_while_trivial_invariant() {
        let r = reg(&["q"]);
        let post = singleton(&r, p0());
        let stmt = Statement::While {
            invariant: vec![placed("I", "q", DMatrix::identity(2, 2))],
            guard: m10("q"),
            body: Box::new(unitary("H", "q", h_gate())),
        };
        let pre = run_wp(&stmt, &post);
        assert_eq!(pre.len(), 1);
        assert!(frobenius_distance(&pre.items()[0].matrix, &DMatrix::identity(2, 2)) < 1e-12);
    }

    #[test]
    fn test_while_preservation_failure() {
        // Loop continues on |0⟩ but the body flips it: the invariant P0 is
        // lost by the body while the idealized check passes.
        let r = reg(&["q"]);
        let post = singleton(&r, p1());
        let stmt = Statement::While {
            invariant: vec![placed("P0", "q", p0())],
            guard: m01("q"),
            body: Box::new(unitary("X", "q", x_gate())),
        };
        let scope = prelude::standard().child();
        let tr = Transformer::new(&scope, r);
        let err = tr.run(&stmt, &post).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::InvariantFailed {
                stage: InvariantStage::Preservation,
                ..
            }
        ));
    }

    #[test]
    fn test_while_exit_failure() {
        // The invariant survives the body but cannot reach the
        // postcondition on exit.
        let r = reg(&["q"]);
        let pp = DMatrix::from_row_slice(
            2,
            2,
            &[
                Complex::new(0.5, 0.0),
                Complex::new(0.5, 0.0),
                Complex::new(0.5, 0.0),
                Complex::new(0.5, 0.0),
            ],
        );
        let post = singleton(&r, pp);
        let stmt = Statement::While {
            invariant: vec![placed("P0", "q", p0())],
            guard: m10("q"),
            body: Box::new(Statement::Skip),
        };
        let scope = prelude::standard().child();
        let tr = Transformer::new(&scope, r);
        let err = tr.run(&stmt, &post).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::InvariantFailed {
                stage: InvariantStage::Exit,
                ..
            }
        ));
    }

    #[test]
    fn test_outline_in_program_order() {
        let r = reg(&["q"]);
        let post = singleton(&r, p0());
        let seq = Statement::Seq(vec![
            Statement::Init {
                qubits: vec!["q".to_string()],
            },
            unitary("X", "q", x_gate()),
        ]);
        let scope = prelude::standard().child();
        let tr = Transformer::new(&scope, r);
        let (_, outline) = tr.run(&seq, &post).unwrap();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].statement, "q := 0");
        assert_eq!(outline[1].statement, "q *= X");
    }

    #[test]
    fn test_intermediate_names_reused_from_library() {
        // With IDENTICAL_VAR_CHECK on, wp(q *= X, {P1}) picks up the
        // library name P0 instead of a fresh VARi.
        let r = reg(&["q"]);
        let post = singleton(&r, p1());
        let scope = prelude::standard().child();
        let tr = Transformer::new(&scope, r);
        let (pre, _) = tr.run(&unitary("X", "q", x_gate()), &post).unwrap();
        assert_eq!(pre.labels(), vec!["P0"]);
    }
}
