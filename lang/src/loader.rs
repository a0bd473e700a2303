//! Operator file I/O
//!
//! On-disk tensors are dense complex arrays stored as JSON: the matrix is
//! flattened row-major into `(re, im)` pairs, high-order qubit first on
//! both the ket and bra sides. Measurement files carry the outcome-0 block
//! followed by the outcome-1 block. Operators are validated for their
//! declared role as they are decoded.

use crate::error::{LangError, Result};
use nalgebra::DMatrix;
use qpv_core::{is_effect, is_unitary, Complex, OperatorValue};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct OperatorFile {
    kind: String,
    qubits: usize,
    data: Vec<(f64, f64)>,
}

fn matrix_from_pairs(dim: usize, pairs: &[(f64, f64)]) -> DMatrix<Complex> {
    let entries: Vec<Complex> = pairs.iter().map(|(re, im)| Complex::new(*re, *im)).collect();
    DMatrix::from_row_slice(dim, dim, &entries)
}

fn pairs_from_matrix(m: &DMatrix<Complex>) -> Vec<(f64, f64)> {
    let mut pairs = Vec::with_capacity(m.nrows() * m.ncols());
    for i in 0..m.nrows() {
        for j in 0..m.ncols() {
            let c = m[(i, j)];
            pairs.push((c.re, c.im));
        }
    }
    pairs
}

/// Load and validate an operator file
pub fn load_operator(path: &Path, eps: f64) -> Result<OperatorValue> {
    let content = std::fs::read_to_string(path)?;
    let file: OperatorFile = serde_json::from_str(&content)?;
    let dim = 1usize << file.qubits;
    debug!(path = %path.display(), kind = %file.kind, qubits = file.qubits, "loading operator");

    let expected = match file.kind.as_str() {
        "unitary" | "hermitian" => dim * dim,
        "measurement" => 2 * dim * dim,
        other => {
            return Err(LangError::File(format!(
                "{}: unknown operator kind '{other}'",
                path.display()
            )))
        }
    };
    if file.data.len() != expected {
        return Err(LangError::File(format!(
            "{}: expected {expected} entries for a {}-qubit {}, got {}",
            path.display(),
            file.qubits,
            file.kind,
            file.data.len()
        )));
    }

    match file.kind.as_str() {
        "unitary" => {
            let m = matrix_from_pairs(dim, &file.data);
            if !is_unitary(&m, eps) {
                return Err(LangError::File(format!(
                    "{}: operator is not unitary within tolerance",
                    path.display()
                )));
            }
            Ok(OperatorValue::Square(m))
        }
        "hermitian" => {
            let m = matrix_from_pairs(dim, &file.data);
            if !is_effect(&m, eps)? {
                return Err(LangError::File(format!(
                    "{}: operator is not a Hermitian predicate in [0, I]",
                    path.display()
                )));
            }
            Ok(OperatorValue::Square(m))
        }
        "measurement" => {
            let half = dim * dim;
            let m0 = matrix_from_pairs(dim, &file.data[..half]);
            let m1 = matrix_from_pairs(dim, &file.data[half..]);
            Ok(OperatorValue::measurement(m0, m1, eps).map_err(|_| {
                LangError::File(format!(
                    "{}: measurement pair does not resolve the identity",
                    path.display()
                ))
            })?)
        }
        _ => unreachable!("kind validated above"),
    }
}

/// Write an operator file; the inverse of [`load_operator`]
pub fn save_operator(path: &Path, value: &OperatorValue, eps: f64) -> Result<()> {
    let file = match value {
        OperatorValue::Square(m) => OperatorFile {
            kind: if is_unitary(m, eps) {
                "unitary".to_string()
            } else {
                "hermitian".to_string()
            },
            qubits: value.qubit_count(),
            data: pairs_from_matrix(m),
        },
        OperatorValue::Measurement { m0, m1 } => {
            let mut data = pairs_from_matrix(m0);
            data.extend(pairs_from_matrix(m1));
            OperatorFile {
                kind: "measurement".to_string(),
                qubits: value.qubit_count(),
                data,
            }
        }
    };
    let content = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpv_core::{frobenius_distance, FRAC_1_SQRT_2, ONE, ZERO};

    const EPS: f64 = 1e-7;

    fn h_gate() -> DMatrix<Complex> {
        let h = Complex::new(FRAC_1_SQRT_2, 0.0);
        DMatrix::from_row_slice(2, 2, &[h, h, h, -h])
    }

    #[test]
    fn test_round_trip_unitary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");
        save_operator(&path, &OperatorValue::Square(h_gate()), EPS).unwrap();
        let loaded = load_operator(&path, EPS).unwrap();
        let OperatorValue::Square(m) = loaded else {
            panic!("expected square operator");
        };
        assert!(frobenius_distance(&m, &h_gate()) < 1e-12);
    }

    #[test]
    fn test_round_trip_measurement() {
        let p0 = DMatrix::from_row_slice(2, 2, &[ONE, ZERO, ZERO, ZERO]);
        let p1 = DMatrix::from_row_slice(2, 2, &[ZERO, ZERO, ZERO, ONE]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        save_operator(
            &path,
            &OperatorValue::Measurement {
                m0: p0.clone(),
                m1: p1.clone(),
            },
            EPS,
        )
        .unwrap();
        let loaded = load_operator(&path, EPS).unwrap();
        let OperatorValue::Measurement { m0, m1 } = loaded else {
            panic!("expected measurement");
        };
        assert!(frobenius_distance(&m0, &p0) < 1e-12);
        assert!(frobenius_distance(&m1, &p1) < 1e-12);
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"kind": "unitary", "qubits": 1, "data": [[1.0, 0.0]]}"#,
        )
        .unwrap();
        assert!(matches!(load_operator(&path, EPS), Err(LangError::File(_))));
    }

    #[test]
    fn test_rejects_non_unitary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"kind": "unitary", "qubits": 1,
                "data": [[2.0, 0.0], [0.0, 0.0], [0.0, 0.0], [2.0, 0.0]]}"#,
        )
        .unwrap();
        assert!(matches!(load_operator(&path, EPS), Err(LangError::File(_))));
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"kind": "spooky", "qubits": 1, "data": []}"#).unwrap();
        assert!(matches!(load_operator(&path, EPS), Err(LangError::File(_))));
    }
}
