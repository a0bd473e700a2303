//! Verification settings
//!
//! Every scope carries a settings record; subscopes inherit it at creation
//! and later updates stay local. Key names are fixed by the surface
//! language.

use crate::error::{Result, VerifyError};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Settings record carried by each scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Equality tolerance for structural comparisons and effect validation
    pub eps: f64,
    /// Solver tolerance for Löwner order queries
    pub sdp_precision: f64,
    /// Suppress per-proof progress output
    pub silent: bool,
    /// Reuse the name of a structurally equal operator when naming
    /// intermediates
    pub identical_var_check: bool,
    /// Keep intermediate operators bound in the scope
    pub opt_preserving: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            eps: 1e-7,
            sdp_precision: 1e-9,
            silent: false,
            identical_var_check: true,
            opt_preserving: true,
        }
    }
}

/// A setting value as written in the surface language
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Settings {
    /// The fixed key names
    pub const KEYS: [&'static str; 5] = [
        "EPS",
        "SDP_PRECISION",
        "SILENT",
        "IDENTICAL_VAR_CHECK",
        "OPT_PRESERVING",
    ];

    /// Validate tolerances. `EPS < SDP_PRECISION` is allowed but the solver
    /// cannot certify entailments at that scale, so it is flagged.
    pub fn validate(&self) -> Result<()> {
        if !(self.eps > 0.0) || !self.eps.is_finite() {
            return Err(VerifyError::InvalidSetting(format!(
                "EPS must be a positive float, got {}",
                self.eps
            )));
        }
        if !(self.sdp_precision > 0.0) || !self.sdp_precision.is_finite() {
            return Err(VerifyError::InvalidSetting(format!(
                "SDP_PRECISION must be a positive float, got {}",
                self.sdp_precision
            )));
        }
        if self.eps < self.sdp_precision {
            warn!(
                eps = self.eps,
                sdp_precision = self.sdp_precision,
                "EPS is tighter than SDP_PRECISION; true entailments may be rejected"
            );
        }
        Ok(())
    }

    /// Update one setting by its surface-language key. The update is
    /// validated before it is committed.
    pub fn set(&mut self, key: &str, value: SettingValue) -> Result<()> {
        let mut next = self.clone();
        match (key, value) {
            ("EPS", SettingValue::Float(x)) => next.eps = x,
            ("SDP_PRECISION", SettingValue::Float(x)) => next.sdp_precision = x,
            ("SILENT", SettingValue::Bool(b)) => next.silent = b,
            ("IDENTICAL_VAR_CHECK", SettingValue::Bool(b)) => next.identical_var_check = b,
            ("OPT_PRESERVING", SettingValue::Bool(b)) => next.opt_preserving = b,
            ("EPS" | "SDP_PRECISION", SettingValue::Bool(_)) => {
                return Err(VerifyError::SettingType {
                    key: key.to_string(),
                    expected: "float",
                })
            }
            ("SILENT" | "IDENTICAL_VAR_CHECK" | "OPT_PRESERVING", SettingValue::Float(_)) => {
                return Err(VerifyError::SettingType {
                    key: key.to_string(),
                    expected: "bool",
                })
            }
            _ => return Err(VerifyError::UnknownSetting(key.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Read one setting by key
    pub fn get(&self, key: &str) -> Option<SettingValue> {
        match key {
            "EPS" => Some(SettingValue::Float(self.eps)),
            "SDP_PRECISION" => Some(SettingValue::Float(self.sdp_precision)),
            "SILENT" => Some(SettingValue::Bool(self.silent)),
            "IDENTICAL_VAR_CHECK" => Some(SettingValue::Bool(self.identical_var_check)),
            "OPT_PRESERVING" => Some(SettingValue::Bool(self.opt_preserving)),
            _ => None,
        }
    }
}
