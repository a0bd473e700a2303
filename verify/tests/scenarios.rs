//! End-to-end verification scenarios
//!
//! Each test builds a resolved proof term against the preloaded library and
//! checks the driver's verdict.

use nalgebra::DMatrix;
use qpv_core::{Complex, OperatorValue, Register};
use qpv_verify::{
    prelude, verify, Binding, PlacedMeasurement, PlacedPredicate, PlacedUnitary, ProofTerm, Scope,
    SettingValue, Statement, Verdict,
};
use rand::Rng;
use std::rc::Rc;

fn library_square(scope: &Rc<Scope>, name: &str) -> DMatrix<Complex> {
    match scope.lookup(name) {
        Some(Binding::Operator(op)) => match op.as_ref() {
            OperatorValue::Square(m) => m.clone(),
            _ => panic!("{name} is not a square operator"),
        },
        _ => panic!("{name} is not in the library"),
    }
}

fn library_measurement(scope: &Rc<Scope>, name: &str) -> (DMatrix<Complex>, DMatrix<Complex>) {
    match scope.lookup(name) {
        Some(Binding::Operator(op)) => match op.as_ref() {
            OperatorValue::Measurement { m0, m1 } => (m0.clone(), m1.clone()),
            _ => panic!("{name} is not a measurement"),
        },
        _ => panic!("{name} is not in the library"),
    }
}

fn gate(scope: &Rc<Scope>, name: &str, qubits: &[&str]) -> Statement {
    Statement::Unitary(PlacedUnitary {
        name: name.to_string(),
        qubits: qubits.iter().map(|q| q.to_string()).collect(),
        matrix: library_square(scope, name),
    })
}

fn predicate(scope: &Rc<Scope>, name: &str, qubits: &[&str]) -> PlacedPredicate {
    PlacedPredicate {
        name: name.to_string(),
        qubits: qubits.iter().map(|q| q.to_string()).collect(),
        matrix: library_square(scope, name),
    }
}

fn measurement(scope: &Rc<Scope>, name: &str, qubits: &[&str]) -> PlacedMeasurement {
    let (m0, m1) = library_measurement(scope, name);
    PlacedMeasurement {
        name: name.to_string(),
        qubits: qubits.iter().map(|q| q.to_string()).collect(),
        m0,
        m1,
    }
}

fn init(qubits: &[&str]) -> Statement {
    Statement::Init {
        qubits: qubits.iter().map(|q| q.to_string()).collect(),
    }
}

#[test]
fn x_flips_zero_to_one() {
    let scope = prelude::standard().child();
    let term = ProofTerm {
        register: Register::new(vec!["q"]).unwrap(),
        pre: vec![predicate(&scope, "P0", &["q"])],
        body: gate(&scope, "X", &["q"]),
        post: vec![predicate(&scope, "P1", &["q"])],
    };
    let report = verify(&term, &scope).unwrap();
    assert_eq!(report.verdict, Verdict::Holds);
}

#[test]
fn x_does_not_preserve_p0() {
    let scope = prelude::standard().child();
    let term = ProofTerm {
        register: Register::new(vec!["q"]).unwrap(),
        pre: vec![predicate(&scope, "P0", &["q"])],
        body: gate(&scope, "X", &["q"]),
        post: vec![predicate(&scope, "P0", &["q"])],
    };
    let report = verify(&term, &scope).unwrap();
    assert_eq!(report.verdict, Verdict::DoesNotHold);
    assert!(report.diagnostic.is_some());
}

#[test]
fn trivially_invariant_loop_holds() {
    // {inv: I[q]}; while M10[q] do q *= H end
    let scope = prelude::standard().child();
    let term = ProofTerm {
        register: Register::new(vec!["q"]).unwrap(),
        pre: vec![predicate(&scope, "I", &["q"])],
        body: Statement::While {
            invariant: vec![predicate(&scope, "I", &["q"])],
            guard: measurement(&scope, "M10", &["q"]),
            body: Box::new(gate(&scope, "H", &["q"])),
        },
        post: vec![predicate(&scope, "P0", &["q"])],
    };
    let report = verify(&term, &scope).unwrap();
    assert_eq!(report.verdict, Verdict::Holds);
}

#[test]
fn weak_invariant_is_undetermined() {
    // Same loop with inv Zero[q]: the invariant survives the rule but the
    // stated precondition cannot entail it.
    let scope = prelude::standard().child();
    let term = ProofTerm {
        register: Register::new(vec!["q"]).unwrap(),
        pre: vec![predicate(&scope, "I", &["q"])],
        body: Statement::While {
            invariant: vec![predicate(&scope, "Zero", &["q"])],
            guard: measurement(&scope, "M10", &["q"]),
            body: Box::new(gate(&scope, "H", &["q"])),
        },
        post: vec![predicate(&scope, "P0", &["q"])],
    };
    let report = verify(&term, &scope).unwrap();
    assert_eq!(report.verdict, Verdict::Undetermined);
    assert!(report.diagnostic.is_some());
}

#[test]
fn bit_flip_code_protects_random_state() {
    // Three-qubit code: entangle with CX, one nondeterministic X (or none),
    // undo, majority-vote with CCX. A random pure state survives.
    let mut rng = rand::thread_rng();
    let theta: f64 = rng.gen_range(0.0..std::f64::consts::PI);
    let phi: f64 = rng.gen_range(0.0..2.0 * std::f64::consts::PI);
    let a = Complex::new(theta.cos(), 0.0);
    let b = Complex::from_polar(theta.sin(), phi);
    // |ψ⟩⟨ψ| for |ψ⟩ = a|0⟩ + b|1⟩
    let h_rand = DMatrix::from_row_slice(
        2,
        2,
        &[
            a * a.conj(),
            a * b.conj(),
            b * a.conj(),
            b * b.conj(),
        ],
    );

    let scope = prelude::standard().child();
    let rand_pred = PlacedPredicate {
        name: "Hrand".to_string(),
        qubits: vec!["q".to_string()],
        matrix: h_rand,
    };

    let term = ProofTerm {
        register: Register::new(vec!["q", "q1", "q2"]).unwrap(),
        pre: vec![rand_pred.clone()],
        body: Statement::Seq(vec![
            init(&["q1", "q2"]),
            gate(&scope, "CX", &["q", "q1"]),
            gate(&scope, "CX", &["q", "q2"]),
            Statement::Choice(vec![
                Statement::Skip,
                gate(&scope, "X", &["q"]),
                gate(&scope, "X", &["q1"]),
                gate(&scope, "X", &["q2"]),
            ]),
            gate(&scope, "CX", &["q", "q1"]),
            gate(&scope, "CX", &["q", "q2"]),
            gate(&scope, "CCX", &["q1", "q2", "q"]),
        ]),
        post: vec![rand_pred],
    };
    let report = verify(&term, &scope).unwrap();
    assert_eq!(report.verdict, Verdict::Holds);
}

#[test]
fn deutsch_algorithm_holds() {
    // Two-qubit Deutsch with the oracle drawn nondeterministically from the
    // four one-bit functions; the verdict is blind to which branch runs.
    let scope = prelude::standard().child();
    let term = ProofTerm {
        register: Register::new(vec!["q", "q1"]).unwrap(),
        pre: vec![predicate(&scope, "Idiv2", &["q", "q1"])],
        body: Statement::Seq(vec![
            init(&["q", "q1"]),
            gate(&scope, "X", &["q1"]),
            gate(&scope, "H", &["q"]),
            gate(&scope, "H", &["q1"]),
            Statement::Choice(vec![
                Statement::Skip,
                gate(&scope, "CX", &["q", "q1"]),
                gate(&scope, "X", &["q1"]),
                Statement::Seq(vec![
                    gate(&scope, "CX", &["q", "q1"]),
                    gate(&scope, "X", &["q1"]),
                ]),
            ]),
            gate(&scope, "H", &["q"]),
        ]),
        post: vec![predicate(&scope, "Eq01_2", &["q", "q1"])],
    };
    let report = verify(&term, &scope).unwrap();
    assert_eq!(report.verdict, Verdict::Holds);
}

#[test]
fn solver_precision_bounds_the_verdict() {
    // Postcondition sits 1e-8 below the precondition. The default solver
    // precision rejects the entailment; a coarse one absorbs the gap.
    let scope = prelude::standard().child();
    let delta = 1e-8;
    let p0 = library_square(&scope, "P0");
    let dip = &p0 - DMatrix::<Complex>::identity(2, 2) * Complex::new(delta, 0.0);
    let term = ProofTerm {
        register: Register::new(vec!["q"]).unwrap(),
        pre: vec![PlacedPredicate {
            name: "P0".to_string(),
            qubits: vec!["q".to_string()],
            matrix: p0,
        }],
        body: Statement::Skip,
        post: vec![PlacedPredicate {
            name: "Hdip".to_string(),
            qubits: vec!["q".to_string()],
            matrix: dip,
        }],
    };

    let report = verify(&term, &scope).unwrap();
    assert_eq!(report.verdict, Verdict::DoesNotHold);

    scope
        .update_setting("SDP_PRECISION", SettingValue::Float(1e-6))
        .unwrap();
    let report = verify(&term, &scope).unwrap();
    assert_eq!(report.verdict, Verdict::Holds);
}

#[test]
fn choice_requires_all_branches_safe() {
    // One safe branch and one violating branch: the conjunction fails.
    let scope = prelude::standard().child();
    let term = ProofTerm {
        register: Register::new(vec!["q"]).unwrap(),
        pre: vec![predicate(&scope, "P0", &["q"])],
        body: Statement::Choice(vec![Statement::Skip, gate(&scope, "X", &["q"])]),
        post: vec![predicate(&scope, "P0", &["q"])],
    };
    let report = verify(&term, &scope).unwrap();
    assert_eq!(report.verdict, Verdict::DoesNotHold);
}
