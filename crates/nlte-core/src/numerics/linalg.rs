use faer::prelude::*;
use faer::{Col, Mat};

pub type DenseMatrix = Mat<f64>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LuError {
    #[error("LU factorization requires a square matrix, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },
    #[error("LU factorization requires a non-empty matrix")]
    EmptyMatrix,
    #[error("matrix is singular at pivot index {pivot_index}")]
    SingularMatrix { pivot_index: usize },
    #[error("right-hand side length mismatch: expected {expected}, got {actual}")]
    RhsLengthMismatch { expected: usize, actual: usize },
}

/// Solves `matrix · x = rhs` with faer's partially pivoted LU.
///
/// Only an exactly zero or non-finite pivot of `U` is treated as singular;
/// badly scaled but regular systems are solved as given.
pub fn lu_solve(matrix: &DenseMatrix, rhs: &[f64]) -> Result<Vec<f64>, LuError> {
    let dimension = validate_square_shape(matrix)?;
    if rhs.len() != dimension {
        return Err(LuError::RhsLengthMismatch {
            expected: dimension,
            actual: rhs.len(),
        });
    }

    let lu = matrix.partial_piv_lu();
    let upper = lu.U();
    let singular_pivot = (0..dimension).find(|&index| {
        let pivot = upper[(index, index)];
        pivot == 0.0 || !pivot.is_finite()
    });
    if let Some(pivot_index) = singular_pivot {
        return Err(LuError::SingularMatrix { pivot_index });
    }

    let rhs = Col::<f64>::from_fn(dimension, |row| rhs[row]);
    let solution = lu.solve(&rhs);
    Ok((0..dimension).map(|row| solution[row]).collect())
}

fn validate_square_shape(matrix: &DenseMatrix) -> Result<usize, LuError> {
    let rows = matrix.nrows();
    let cols = matrix.ncols();
    if rows == 0 || cols == 0 {
        return Err(LuError::EmptyMatrix);
    }
    if rows != cols {
        return Err(LuError::NonSquareMatrix { rows, cols });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::{DenseMatrix, LuError, lu_solve};

    fn dense_matrix(rows: &[&[f64]]) -> DenseMatrix {
        DenseMatrix::from_fn(rows.len(), rows[0].len(), |row, col| rows[row][col])
    }

    #[test]
    fn lu_solve_recovers_known_solution_with_pivoting() {
        let matrix = dense_matrix(&[&[0.0, 2.0, 1.0], &[1.0, -2.0, -3.0], &[2.0, 3.0, 1.0]]);
        let expected = [1.0, -2.0, 3.0];
        let rhs: Vec<f64> = (0..3)
            .map(|row| (0..3).map(|col| matrix[(row, col)] * expected[col]).sum())
            .collect();

        let solution = lu_solve(&matrix, &rhs).expect("system should solve");
        for (actual, expected) in solution.iter().zip(expected) {
            assert!((actual - expected).abs() <= 1.0e-12, "{actual} vs {expected}");
        }
    }

    #[test]
    fn badly_scaled_rows_are_still_solved() {
        let matrix = dense_matrix(&[&[-3.0e-16, 1.0e-16], &[1.0, 1.0]]);
        let solution = lu_solve(&matrix, &[0.0, 1.0]).expect("regular system");
        assert!((solution[1] / solution[0] - 3.0).abs() <= 1.0e-12);
    }

    #[test]
    fn lu_rejects_singular_and_malformed_inputs() {
        let singular = dense_matrix(&[&[1.0, 2.0], &[2.0, 4.0]]);
        assert!(matches!(
            lu_solve(&singular, &[1.0, 1.0]),
            Err(LuError::SingularMatrix { .. })
        ));

        let rectangular = DenseMatrix::zeros(2, 3);
        assert_eq!(
            lu_solve(&rectangular, &[0.0, 0.0]),
            Err(LuError::NonSquareMatrix { rows: 2, cols: 3 })
        );
        assert_eq!(
            lu_solve(&DenseMatrix::zeros(0, 0), &[]),
            Err(LuError::EmptyMatrix)
        );

        let identity = dense_matrix(&[&[1.0, 0.0], &[0.0, 1.0]]);
        assert_eq!(
            lu_solve(&identity, &[1.0]),
            Err(LuError::RhsLengthMismatch {
                expected: 2,
                actual: 1
            })
        );
    }
}
