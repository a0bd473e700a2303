//! Placed operators and the tensor calculus
//!
//! An operator is a dense complex matrix together with a placement, the
//! ordered list of qubit names it acts on. Cylindrical extension tensors an
//! operator with identity on the missing qubits of a target register and
//! permutes both the ket and bra index sides to match the register ordering.
//! The permutation is realized as basis-index bit reassembly: an entry of
//! the extended matrix is copied from the source wherever the uninvolved
//! bits of row and column index agree.

use crate::error::{CoreError, Result};
use crate::register::Register;
use crate::{Complex, ONE};
use nalgebra::DMatrix;

/// A dense complex operator on named qubits
#[derive(Debug, Clone)]
pub struct PlacedOperator {
    qubits: Vec<String>,
    matrix: DMatrix<Complex>,
}

impl PlacedOperator {
    /// Create a placed operator, validating placement and shape
    pub fn new<S: Into<String>>(qubits: Vec<S>, matrix: DMatrix<Complex>) -> Result<Self> {
        let qubits: Vec<String> = qubits.into_iter().map(Into::into).collect();
        for (i, q) in qubits.iter().enumerate() {
            if qubits[..i].contains(q) {
                return Err(CoreError::DuplicateQubit(q.clone()));
            }
        }
        if matrix.nrows() != matrix.ncols() {
            return Err(CoreError::NotSquare {
                rows: matrix.nrows(),
                cols: matrix.ncols(),
            });
        }
        let dim = matrix.nrows();
        if dim == 0 || (dim & (dim - 1)) != 0 {
            return Err(CoreError::NotAPowerOfTwo(dim));
        }
        if dim != 1 << qubits.len() {
            return Err(CoreError::PlacementWidth {
                placement: qubits.len(),
                dim,
            });
        }
        Ok(Self { qubits, matrix })
    }

    /// A width-0 operator holding a single scalar
    pub fn scalar(value: Complex) -> Self {
        Self {
            qubits: Vec::new(),
            matrix: DMatrix::from_element(1, 1, value),
        }
    }

    /// Number of qubits in the placement
    pub fn width(&self) -> usize {
        self.qubits.len()
    }

    /// Matrix dimension (2^width)
    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    /// Placement qubit names
    pub fn qubits(&self) -> &[String] {
        &self.qubits
    }

    /// The underlying matrix
    pub fn matrix(&self) -> &DMatrix<Complex> {
        &self.matrix
    }

    /// Consume into the underlying matrix
    pub fn into_matrix(self) -> DMatrix<Complex> {
        self.matrix
    }

    /// Whether two placements cover the same qubits (order-insensitive)
    pub fn same_qubits(&self, other: &Self) -> bool {
        self.qubits.len() == other.qubits.len()
            && self.qubits.iter().all(|q| other.qubits.contains(q))
    }

    /// Cylindrical extension onto a target register.
    ///
    /// Tensors with identity on the qubits of `target` absent from the
    /// placement and permutes ket and bra axes so the qubit ordering matches
    /// `target`. Extension of a width-0 operator is its scalar times the
    /// identity.
    pub fn extend(&self, target: &Register) -> Result<Self> {
        let n = self.width();
        let nt = target.width();
        let dim = target.dimension();

        let mut positions = Vec::with_capacity(n);
        for q in &self.qubits {
            positions.push(
                target
                    .position(q)
                    .ok_or_else(|| CoreError::UnknownQubit(q.clone()))?,
            );
        }

        if n == 0 {
            let matrix = DMatrix::identity(dim, dim) * self.matrix[(0, 0)];
            return Ok(Self {
                qubits: target.qubits().to_vec(),
                matrix,
            });
        }

        // Bits of the full index owned by the placement
        let mut involved = 0usize;
        for &p in &positions {
            involved |= 1 << (nt - 1 - p);
        }
        let spectator = !involved & (dim - 1);

        let mut matrix = DMatrix::zeros(dim, dim);
        for i in 0..dim {
            for j in 0..dim {
                if (i & spectator) != (j & spectator) {
                    continue;
                }
                let mut gi = 0usize;
                let mut gj = 0usize;
                for (k, &p) in positions.iter().enumerate() {
                    let bit = nt - 1 - p;
                    gi |= ((i >> bit) & 1) << (n - 1 - k);
                    gj |= ((j >> bit) & 1) << (n - 1 - k);
                }
                matrix[(i, j)] = self.matrix[(gi, gj)];
            }
        }

        Ok(Self {
            qubits: target.qubits().to_vec(),
            matrix,
        })
    }

    /// Conjugate transpose over the ket/bra split
    pub fn adjoint(&self) -> Self {
        Self {
            qubits: self.qubits.clone(),
            matrix: self.matrix.adjoint(),
        }
    }

    /// Scalar multiple
    pub fn scale(&self, alpha: Complex) -> Self {
        Self {
            qubits: self.qubits.clone(),
            matrix: &self.matrix * alpha,
        }
    }
}

/// Sum of operators sharing one placement
pub fn sum(ops: &[PlacedOperator]) -> Result<PlacedOperator> {
    let first = ops.first().ok_or(CoreError::EmptyOperandList)?;
    let mut matrix = first.matrix.clone();
    for op in &ops[1..] {
        if op.qubits != first.qubits {
            return Err(CoreError::PlacementMismatch(
                first.qubits.join(" "),
                op.qubits.join(" "),
            ));
        }
        matrix += &op.matrix;
    }
    Ok(PlacedOperator {
        qubits: first.qubits.clone(),
        matrix,
    })
}

/// Matrix product `A · B` with both operands extended to `register`
pub fn compose(
    a: &PlacedOperator,
    b: &PlacedOperator,
    register: &Register,
) -> Result<PlacedOperator> {
    let a = a.extend(register)?;
    let b = b.extend(register)?;
    Ok(PlacedOperator {
        qubits: a.qubits,
        matrix: a.matrix * b.matrix,
    })
}

/// Quadratic form `K† · M · K`.
///
/// `K` need not be square; it must map the domain of the result into the
/// domain of `M` (`M` is `r×r`, `K` is `r×c`, the result `c×c`).
pub fn sandwich(k: &DMatrix<Complex>, m: &DMatrix<Complex>) -> Result<DMatrix<Complex>> {
    if m.nrows() != m.ncols() {
        return Err(CoreError::NotSquare {
            rows: m.nrows(),
            cols: m.ncols(),
        });
    }
    if k.nrows() != m.nrows() {
        return Err(CoreError::DimensionMismatch {
            expected: m.nrows(),
            actual: k.nrows(),
        });
    }
    Ok(k.adjoint() * m * k)
}

/// Frobenius distance between two matrices of equal shape
pub fn frobenius_distance(a: &DMatrix<Complex>, b: &DMatrix<Complex>) -> f64 {
    (a - b).norm()
}

/// Identity matrix of the register's dimension
pub fn identity_on(register: &Register) -> DMatrix<Complex> {
    DMatrix::from_diagonal_element(register.dimension(), register.dimension(), ONE)
}
