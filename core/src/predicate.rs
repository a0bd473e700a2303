//! Assertion sets - finite sets of Hermitian predicates in `[0, I]`
//!
//! A predicate set denotes the meet (greatest lower bound) of its members
//! after cylindrical extension to the full register. Canonical sets keep
//! every element extended and deduplicated under structural equality
//! (Frobenius distance within tolerance). Entailment is the pointwise test
//! `∀H ∈ T. ∃H' ∈ S. H' ⊑ H` - sound but incomplete, and the contract the
//! verifier promises.

use crate::error::{CoreError, Result};
use crate::order::{loewner_le, loewner_le_certified};
use crate::register::Register;
use crate::tensor::{frobenius_distance, PlacedOperator};
use crate::Complex;
use nalgebra::{DMatrix, DVector};
use tracing::warn;

/// One element of an assertion set: a full-register Hermitian with an
/// optional display label (its scope-interned name)
#[derive(Debug, Clone)]
pub struct Predicate {
    pub label: Option<String>,
    pub matrix: DMatrix<Complex>,
}

/// An unordered finite set of placed Hermitian predicates
#[derive(Debug, Clone)]
pub struct PredicateSet {
    register: Register,
    items: Vec<Predicate>,
}

/// Outcome of an entailment query
#[derive(Debug, Clone)]
pub struct EntailmentCheck {
    /// Whether the entailment holds
    pub holds: bool,
    /// Index (in the right-hand set) of the first uncovered element
    pub failing: Option<usize>,
    /// Infeasibility certificate for the uncovered element, when available
    pub witness: Option<DVector<Complex>>,
}

impl PredicateSet {
    /// The empty set over a register
    pub fn empty(register: Register) -> Self {
        Self {
            register,
            items: Vec::new(),
        }
    }

    /// The singleton `{I}` - the weakest assertion
    pub fn identity(register: Register) -> Self {
        let dim = register.dimension();
        let mut set = Self::empty(register);
        set.items.push(Predicate {
            label: None,
            matrix: DMatrix::identity(dim, dim),
        });
        set
    }

    /// Build a canonical set from placed operators: every element is
    /// extended to the register, then deduplicated.
    pub fn from_placed(
        register: Register,
        items: Vec<(Option<String>, PlacedOperator)>,
        eps: f64,
    ) -> Result<Self> {
        let mut set = Self::empty(register);
        for (label, op) in items {
            let extended = op.extend(&set.register)?;
            set.insert(label, extended.into_matrix(), eps);
        }
        Ok(set)
    }

    /// Insert a full-register matrix, skipping structural duplicates.
    /// A duplicate with a label adopts it when the kept element has none.
    pub fn insert(&mut self, label: Option<String>, matrix: DMatrix<Complex>, eps: f64) {
        for item in &mut self.items {
            if frobenius_distance(&item.matrix, &matrix) <= eps {
                if item.label.is_none() {
                    item.label = label;
                }
                return;
            }
        }
        self.items.push(Predicate { label, matrix });
    }

    /// The register all elements are extended to
    pub fn register(&self) -> &Register {
        &self.register
    }

    /// The elements
    pub fn items(&self) -> &[Predicate] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Display labels, `?` for unnamed elements
    pub fn labels(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|p| p.label.clone().unwrap_or_else(|| "?".to_string()))
            .collect()
    }

    /// Union viewed as conjunction
    pub fn meet(&self, other: &Self, eps: f64) -> Result<Self> {
        if self.register != other.register {
            return Err(CoreError::PlacementMismatch(
                self.register.qubits().join(" "),
                other.register.qubits().join(" "),
            ));
        }
        let mut out = self.clone();
        for item in &other.items {
            out.insert(item.label.clone(), item.matrix.clone(), eps);
        }
        Ok(out)
    }

    /// Pointwise application of a Hermitian-preserving map. The images are
    /// fresh operators, so labels are cleared; the result is deduplicated.
    pub fn map<F>(&self, eps: f64, f: F) -> Result<Self>
    where
        F: Fn(&DMatrix<Complex>) -> Result<DMatrix<Complex>>,
    {
        let mut out = Self::empty(self.register.clone());
        for item in &self.items {
            out.insert(None, f(&item.matrix)?, eps);
        }
        Ok(out)
    }

    /// Check every element lies in `[0, I]` within tolerance, reporting the
    /// first ill-formed element.
    pub fn validate_effects(&self, eps: f64) -> Result<()> {
        for (idx, item) in self.items.iter().enumerate() {
            if !crate::operator::is_effect(&item.matrix, eps)? {
                let label = item
                    .label
                    .clone()
                    .unwrap_or_else(|| format!("#{idx}"));
                return Err(CoreError::NotAnEffect(label));
            }
        }
        Ok(())
    }

    /// Pointwise entailment `self ⊑ other`: every element of `other` must
    /// dominate some element of `self` in the Löwner order. Solver failures
    /// count as non-coverage for the single query and are logged.
    pub fn entails(&self, other: &Self, precision: f64) -> Result<EntailmentCheck> {
        if self.register != other.register {
            return Err(CoreError::PlacementMismatch(
                self.register.qubits().join(" "),
                other.register.qubits().join(" "),
            ));
        }
        for (idx, target) in other.items.iter().enumerate() {
            let mut covered = false;
            for candidate in &self.items {
                match loewner_le(&candidate.matrix, &target.matrix, precision) {
                    Ok(true) => {
                        covered = true;
                        break;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(%err, "order query failed; treating as not below");
                    }
                }
            }
            if !covered {
                let witness = self.items.first().and_then(|candidate| {
                    loewner_le_certified(&candidate.matrix, &target.matrix, precision)
                        .ok()
                        .and_then(|f| f.witness)
                });
                return Ok(EntailmentCheck {
                    holds: false,
                    failing: Some(idx),
                    witness,
                });
            }
        }
        Ok(EntailmentCheck {
            holds: true,
            failing: None,
            witness: None,
        })
    }
}
