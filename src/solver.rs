use log::trace;

use crate::error::{CircuitError, Result};

/// Smallest pivot magnitude accepted during elimination
const PIVOT_EPSILON: f64 = 1e-12;

/// Relative residual below which an equation counts as dependent
const RANK_EPSILON: f64 = 1e-9;

/// Numerical tolerances used when selecting and solving the equations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    pub pivot_epsilon: f64,
    pub rank_epsilon: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            pivot_epsilon: PIVOT_EPSILON,
            rank_epsilon: RANK_EPSILON,
        }
    }
}

// Stores [A | b] for A*x = b, where x is the solution.
//
// Stored as a vector of rows, for easy in-place pivots.
pub type Row = Vec<f64>;
pub type AugmentedMatrix = Vec<Row>;

/// Solve the n x (n+1) augmented system in place and return x.
pub fn solve(mut mat: AugmentedMatrix, settings: &SolverSettings) -> Result<Vec<f64>> {
    let n = mat.len();
    for row in &mat {
        if row.len() != n + 1 {
            return Err(CircuitError::DimensionMismatch {
                expected: n + 1,
                actual: row.len(),
            });
        }
    }
    gaussian_elimination(&mut mat, settings.pivot_epsilon)?;
    Ok(back_substitution(&mat))
}

/// Reduce to upper-triangular form with partial pivoting.
pub fn gaussian_elimination(mat: &mut AugmentedMatrix, pivot_epsilon: f64) -> Result<()> {
    let n = mat.len();
    for k in 0..n {
        // largest magnitude in column k keeps the multipliers <= 1
        let mut i_max = k;
        let mut v_max = mat[k][k].abs();
        for i in k + 1..n {
            if mat[i][k].abs() > v_max {
                i_max = i;
                v_max = mat[i][k].abs();
            }
        }
        if v_max < pivot_epsilon {
            return Err(CircuitError::SingularMatrix { column: k });
        }
        if i_max != k {
            trace!("pivot column {}: swap rows {} and {} ({:e})", k, k, i_max, v_max);
            mat.swap(k, i_max);
        }

        let pivot_row = mat[k].clone();
        for row in mat.iter_mut().skip(k + 1) {
            let f = row[k] / pivot_row[k];
            if f == 0.0 {
                continue;
            }
            for j in k + 1..=n {
                row[j] -= pivot_row[j] * f;
            }
            // exact zero instead of round-off below the pivot
            row[k] = 0.0;
        }
    }
    Ok(())
}

/// Solve an upper-triangular augmented system from the last row up.
pub fn back_substitution(mat: &AugmentedMatrix) -> Vec<f64> {
    let n = mat.len();
    let mut ans = vec![0.0; n];
    for i in (0..n).rev() {
        let mut v = mat[i][n];
        for j in i + 1..n {
            v -= mat[i][j] * ans[j];
        }
        ans[i] = v / mat[i][i];
    }
    ans
}

/// Row-echelon basis used to keep only linearly independent equations.
#[derive(Debug)]
pub(crate) struct RowBasis {
    rows: Vec<(usize, Row)>,
    epsilon: f64,
}

impl RowBasis {
    pub(crate) fn new(epsilon: f64) -> Self {
        Self {
            rows: Vec::new(),
            epsilon,
        }
    }

    pub(crate) fn rank(&self) -> usize {
        self.rows.len()
    }

    /// Add `row` to the basis if it is independent of it. Every stored row
    /// is zero at the pivots of the rows stored before it.
    pub(crate) fn admit(&mut self, row: &[f64]) -> bool {
        let scale = row.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
        let mut r = row.to_vec();
        for (p, b) in &self.rows {
            let f = r[*p] / b[*p];
            if f != 0.0 {
                for (x, y) in r.iter_mut().zip(b) {
                    *x -= f * y;
                }
            }
        }
        let pivot = r
            .iter()
            .enumerate()
            .map(|(i, v)| (i, v.abs()))
            .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
                Some((_, bv)) if bv >= v => best,
                _ => Some((i, v)),
            });
        match pivot {
            Some((p, v)) if v > self.epsilon * scale => {
                self.rows.push((p, r));
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn test_solve_simple() -> Result<(), String> {
        // 2x + y = 5
        // x + 3y = 6
        let mat = vec![vec![2.0, 1.0, 5.0], vec![1.0, 3.0, 6.0]];
        let x = solve(mat, &SolverSettings::default()).map_err(|e| e.to_string())?;
        assert!(approx_eq!(f64, x[0], 1.8, ulps = 4));
        assert!(approx_eq!(f64, x[1], 1.4, ulps = 4));
        Ok(())
    }

    #[test]
    fn test_needs_pivot() -> Result<(), String> {
        // zero on the diagonal of the first row
        let mat = vec![
            vec![0.0, 2.0, 1.0, 7.0],
            vec![1.0, 1.0, 1.0, 6.0],
            vec![3.0, 0.0, -1.0, 0.0],
        ];
        let x = solve(mat, &SolverSettings::default()).map_err(|e| e.to_string())?;
        assert!(approx_eq!(f64, x[0], 1.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, x[1], 2.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, x[2], 3.0, epsilon = 1e-12));
        Ok(())
    }

    #[test]
    fn test_pivot_picks_largest_magnitude() -> Result<(), String> {
        let mut mat = vec![vec![1.0, 1.0, 2.0], vec![-4.0, 2.0, -2.0]];
        gaussian_elimination(&mut mat, PIVOT_EPSILON).map_err(|e| e.to_string())?;
        assert_eq!(mat[0], vec![-4.0, 2.0, -2.0]);
        assert_eq!(mat[1][0], 0.0);
        let x = back_substitution(&mat);
        assert!(approx_eq!(f64, x[0], 1.0, ulps = 4));
        assert!(approx_eq!(f64, x[1], 1.0, ulps = 4));
        Ok(())
    }

    #[test]
    fn test_singular() -> Result<(), String> {
        let mat = vec![vec![1.0, 2.0, 3.0], vec![2.0, 4.0, 6.0]];
        assert_eq!(
            solve(mat, &SolverSettings::default()),
            Err(CircuitError::SingularMatrix { column: 1 })
        );
        Ok(())
    }

    #[test]
    fn test_dimension_mismatch() -> Result<(), String> {
        let mat = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert_eq!(
            solve(mat, &SolverSettings::default()),
            Err(CircuitError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
        Ok(())
    }

    #[test]
    fn test_empty_system() -> Result<(), String> {
        let x = solve(vec![], &SolverSettings::default()).map_err(|e| e.to_string())?;
        assert!(x.is_empty());
        Ok(())
    }

    #[test]
    fn test_row_basis() -> Result<(), String> {
        let mut basis = RowBasis::new(RANK_EPSILON);
        assert!(basis.admit(&[1.0, -1.0, 0.0]));
        assert!(basis.admit(&[0.0, 1.0, -1.0]));
        // sum of the first two, negated
        assert!(!basis.admit(&[-1.0, 0.0, 1.0]));
        assert!(!basis.admit(&[0.0, 0.0, 0.0]));
        assert!(basis.admit(&[100.0, 200.0, 0.0]));
        assert_eq!(basis.rank(), 3);
        Ok(())
    }
}
