//! # QPV Verify
//!
//! Backward predicate transformer, verifier driver and scope model for the
//! QPV quantum program verifier.
//!
//! ## Features
//!
//! - **Ast**: Typed statement tree with resolved operator references
//! - **Scope**: Hierarchical environments with write-once bindings and
//!   generated intermediate names
//! - **Settings**: Per-scope tolerances and naming/output switches
//! - **Prelude**: The preloaded gate, predicate and measurement library
//! - **Transformer**: Quantum Hoare `wp` rules over assertion sets
//! - **Driver**: Verdicts, proof outlines and diagnostics

pub mod ast;
pub mod driver;
pub mod error;
pub mod prelude;
pub mod scope;
pub mod settings;
pub mod transformer;

pub use ast::{PlacedMeasurement, PlacedPredicate, PlacedUnitary, ProofTerm, Statement};
pub use driver::{
    render_outline, verify, Diagnostic, DiagnosticKind, VerdictReport, Verdict, VerifiedProof,
};
pub use error::{InvariantStage, Result, VerifyError};
pub use prelude::standard;
pub use scope::{Binding, Scope};
pub use settings::{SettingValue, Settings};
pub use transformer::{assertion_set, OutlineEntry, Transformer};

/// Module version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
