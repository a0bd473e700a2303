//! Hierarchical scopes binding identifiers to operators, proofs and
//! sub-scopes
//!
//! Children hold strong references to their sub-scopes through bindings;
//! parent links are weak. Binding is write-once per identifier in a given
//! scope; lookup walks to the root. Auto-generated names (`VARi`) come from
//! a monotonic counter on the owning scope and are disjoint from user-bound
//! names.

use crate::driver::VerifiedProof;
use crate::error::{Result, VerifyError};
use crate::settings::{Settings, SettingValue};
use nalgebra::DMatrix;
use qpv_core::{frobenius_distance, Complex, OperatorValue};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Wide registers make the structural-equality scan too expensive; the
/// reuse check is quadratic and is skipped above this dimension.
const IDENTICAL_CHECK_MAX_DIM: usize = 64;

/// A value bound in a scope
#[derive(Clone)]
pub enum Binding {
    Operator(Rc<OperatorValue>),
    Proof(Rc<VerifiedProof>),
    Assertion(Rc<Vec<crate::ast::PlacedPredicate>>),
    Scope(Rc<Scope>),
}

impl Binding {
    /// Short tag used by scope listings
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Operator(_) => "operator",
            Self::Proof(_) => "proof",
            Self::Assertion(_) => "assertion",
            Self::Scope(_) => "scope",
        }
    }
}

/// A hierarchical environment
pub struct Scope {
    parent: Option<Weak<Scope>>,
    bindings: RefCell<Vec<(String, Binding)>>,
    counter: Cell<usize>,
    settings: RefCell<Settings>,
}

impl Scope {
    /// Create a root scope with default settings
    pub fn root() -> Rc<Self> {
        Rc::new(Self {
            parent: None,
            bindings: RefCell::new(Vec::new()),
            counter: Cell::new(0),
            settings: RefCell::new(Settings::default()),
        })
    }

    /// Create a child scope inheriting this scope's settings
    pub fn child(self: &Rc<Self>) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(Rc::downgrade(self)),
            bindings: RefCell::new(Vec::new()),
            counter: Cell::new(0),
            settings: RefCell::new(self.settings.borrow().clone()),
        })
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    /// Update one setting locally
    pub fn update_setting(&self, key: &str, value: SettingValue) -> Result<()> {
        self.settings.borrow_mut().set(key, value)
    }

    /// Whether a name belongs to the generated-name space
    pub fn is_generated_name(name: &str) -> bool {
        name.len() > 3
            && name.starts_with("VAR")
            && name[3..].bytes().all(|b| b.is_ascii_digit())
    }

    /// Bind a user identifier. Write-once; generated-looking names are
    /// rejected to keep the two name spaces disjoint.
    pub fn bind(&self, name: &str, binding: Binding) -> Result<()> {
        if Self::is_generated_name(name) {
            return Err(VerifyError::ReservedName(name.to_string()));
        }
        self.bind_raw(name, binding)
    }

    fn bind_raw(&self, name: &str, binding: Binding) -> Result<()> {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.iter().any(|(n, _)| n == name) {
            return Err(VerifyError::Rebinding(name.to_string()));
        }
        bindings.push((name.to_string(), binding));
        Ok(())
    }

    /// Look up a name in this scope only
    pub fn lookup_local(&self, name: &str) -> Option<Binding> {
        self.bindings
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.clone())
    }

    /// Look up a name, walking parent scopes to the root
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(binding) = self.lookup_local(name) {
            return Some(binding);
        }
        let mut parent = self.parent.as_ref().and_then(Weak::upgrade);
        while let Some(scope) = parent {
            if let Some(binding) = scope.lookup_local(name) {
                return Some(binding);
            }
            parent = scope.parent.as_ref().and_then(Weak::upgrade);
        }
        None
    }

    /// Resolve a dotted path left-to-right. The first segment uses full
    /// lookup; each later segment restarts in the named sub-scope and never
    /// crosses into a sibling.
    pub fn lookup_path(&self, path: &[String]) -> Option<Binding> {
        let (first, rest) = path.split_first()?;
        let mut binding = self.lookup(first)?;
        for segment in rest {
            let Binding::Scope(scope) = binding else {
                return None;
            };
            binding = scope.lookup_local(segment)?;
        }
        Some(binding)
    }

    /// Issue a fresh generated name
    pub fn fresh_name(&self) -> String {
        let n = self.counter.get();
        self.counter.set(n + 1);
        format!("VAR{n}")
    }

    /// Name an intermediate predicate.
    ///
    /// With `IDENTICAL_VAR_CHECK` on, a structurally equal square operator
    /// anywhere up the chain lends its name; otherwise a fresh `VARi` is
    /// issued and, with `OPT_PRESERVING` on, bound into this scope.
    pub fn intern_predicate(&self, matrix: &DMatrix<Complex>) -> String {
        let settings = self.settings();
        if settings.identical_var_check && matrix.nrows() <= IDENTICAL_CHECK_MAX_DIM {
            if let Some(name) = self.find_structural(matrix, settings.eps) {
                return name;
            }
        }
        let name = self.fresh_name();
        if settings.opt_preserving {
            let value = OperatorValue::Square(matrix.clone());
            // Generated names cannot collide: the counter is monotonic and
            // user binds matching the pattern are rejected.
            let _ = self.bind_raw(&name, Binding::Operator(Rc::new(value)));
        }
        name
    }

    fn find_structural(&self, matrix: &DMatrix<Complex>, eps: f64) -> Option<String> {
        if let Some(name) = self.find_structural_local(matrix, eps) {
            return Some(name);
        }
        let mut parent = self.parent.as_ref().and_then(Weak::upgrade);
        while let Some(scope) = parent {
            if let Some(name) = scope.find_structural_local(matrix, eps) {
                return Some(name);
            }
            parent = scope.parent.as_ref().and_then(Weak::upgrade);
        }
        None
    }

    fn find_structural_local(&self, matrix: &DMatrix<Complex>, eps: f64) -> Option<String> {
        for (name, binding) in self.bindings.borrow().iter() {
            if let Binding::Operator(op) = binding {
                if let OperatorValue::Square(m) = op.as_ref() {
                    if m.nrows() == matrix.nrows() && frobenius_distance(m, matrix) <= eps {
                        return Some(name.clone());
                    }
                }
            }
        }
        None
    }

    /// Snapshot of the local bindings in definition order
    pub fn entries(&self) -> Vec<(String, Binding)> {
        self.bindings.borrow().clone()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .bindings
            .borrow()
            .iter()
            .map(|(n, b)| format!("{n}: {}", b.kind()))
            .collect();
        f.debug_struct("Scope")
            .field("bindings", &names)
            .field("counter", &self.counter.get())
            .finish()
    }
}
