/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Auxiliary numeric kernel shared by the QBD solvers.
//!
//! Everything here is a pure function over `nalgebra` dense matrices: no
//! state, safe to call from any thread. The solvers treat this module as
//! their narrow linear-algebra boundary: the general eigenvalue machinery
//! and the SVD live behind these helpers, never inline in solver code.

use nalgebra::{ComplexField, DMatrix, RowDVector};
use thiserror::Error;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failures of the numeric primitives.
#[derive(Debug, Error)]
pub enum NumericError {
    /// The operation requires a square matrix.
    #[error("matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    /// The SVD-based pseudo-inverse could not be formed.
    #[error("pseudo-inverse failed: {detail}")]
    PseudoInverse { detail: &'static str },

    /// A matrix that must be invertible turned out singular.
    #[error("singular matrix while computing {context}")]
    Singular { context: &'static str },
}

// ── Norms and spectra ─────────────────────────────────────────────────────────

/// Infinity norm: the maximum absolute row sum.
pub fn infinity_norm(m: &DMatrix<f64>) -> f64 {
    m.row_iter()
        .map(|row| row.iter().map(|x| x.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

/// Spectral radius: the largest eigenvalue modulus.
///
/// Used only for diagnostics (a rate matrix with spectral radius above 1
/// signals an unstable chain); the result is not a gate anywhere.
pub fn spectral_radius(m: &DMatrix<f64>) -> f64 {
    m.clone()
        .complex_eigenvalues()
        .iter()
        .map(|ev| ev.norm())
        .fold(0.0, f64::max)
}

// ── Pseudo-inverse ────────────────────────────────────────────────────────────

/// Moore–Penrose pseudo-inverse via SVD, for real and complex matrices.
///
/// Singular values below `f64::EPSILON * max_singular_value * max_dim` are
/// treated as zero, the customary cutoff for a numerically rank-revealing
/// SVD.
pub fn pseudo_inverse<T>(m: &DMatrix<T>) -> Result<DMatrix<T>, NumericError>
where
    T: ComplexField<RealField = f64>,
{
    let svd = m.clone().svd(true, true);
    let max_sv = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let tolerance = f64::EPSILON * max_sv * m.nrows().max(m.ncols()) as f64;
    svd.pseudo_inverse(tolerance)
        .map_err(|detail| NumericError::PseudoInverse { detail })
}

/// Numerical rank of a matrix, with the same cutoff as [`pseudo_inverse`].
pub fn rank(m: &DMatrix<f64>) -> usize {
    let svd = m.clone().svd(false, false);
    let max_sv = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let tolerance = f64::EPSILON * max_sv * m.nrows().max(m.ncols()) as f64;
    svd.rank(tolerance)
}

// ── Stationary vector ─────────────────────────────────────────────────────────

/// Stationary row vector of a stochastic matrix: the `θ` with
/// `θ(A − I) = 0` and `θ·1 = 1`.
///
/// Solved as the augmented least-squares system `θ·[A − I | 1] = [0 | 1]`
/// through the pseudo-inverse, which tolerates the rank deficiency of
/// `A − I` by construction.
pub fn stat(a: &DMatrix<f64>) -> Result<RowDVector<f64>, NumericError> {
    if a.nrows() != a.ncols() {
        return Err(NumericError::NotSquare {
            rows: a.nrows(),
            cols: a.ncols(),
        });
    }
    let n = a.nrows();
    let mut b = DMatrix::<f64>::zeros(n, n + 1);
    b.view_mut((0, 0), (n, n))
        .copy_from(&(a - DMatrix::<f64>::identity(n, n)));
    for i in 0..n {
        b[(i, n)] = 1.0;
    }

    let pinv = pseudo_inverse(&b)?;
    let mut selector = RowDVector::<f64>::zeros(n + 1);
    selector[n] = 1.0;
    Ok(selector * pinv)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn infinity_norm_is_max_abs_row_sum() {
        let m = dmatrix![1.0, -2.0; 3.0, 0.5];
        assert!((infinity_norm(&m) - 3.5).abs() < 1e-12);
    }

    #[test]
    fn infinity_norm_of_zero_matrix_is_zero() {
        let m = DMatrix::<f64>::zeros(3, 3);
        assert_eq!(infinity_norm(&m), 0.0);
    }

    #[test]
    fn spectral_radius_of_diagonal_matrix() {
        let m = dmatrix![0.5, 0.0; 0.0, -0.9];
        assert!((spectral_radius(&m) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn pseudo_inverse_of_invertible_matrix_is_inverse() {
        let m = dmatrix![4.0, 7.0; 2.0, 6.0];
        let pinv = pseudo_inverse(&m).unwrap();
        let id = &m * &pinv;
        assert!((id - DMatrix::<f64>::identity(2, 2)).abs().max() < 1e-9);
    }

    #[test]
    fn pseudo_inverse_of_rank_deficient_matrix() {
        // rank-1 matrix: A = [[1, 2], [2, 4]]; its Moore–Penrose inverse is
        // A^T / 25 (since ||A||_F^2 = 25 for a rank-1 A = u v^T scaling)
        let m = dmatrix![1.0, 2.0; 2.0, 4.0];
        let pinv = pseudo_inverse(&m).unwrap();
        // A · A⁺ · A = A characterises the Moore–Penrose inverse
        let back = &m * &pinv * &m;
        assert!((back - &m).abs().max() < 1e-9);
    }

    #[test]
    fn rank_detects_deficiency() {
        assert_eq!(rank(&dmatrix![1.0, 2.0; 2.0, 4.0]), 1);
        assert_eq!(rank(&dmatrix![1.0, 0.0; 0.0, 1.0]), 2);
    }

    #[test]
    fn stat_of_two_state_chain() {
        // P = [[0.5, 0.5], [0.25, 0.75]] has stationary vector (1/3, 2/3)
        let p = dmatrix![0.5, 0.5; 0.25, 0.75];
        let theta = stat(&p).unwrap();
        assert!((theta[0] - 1.0 / 3.0).abs() < 1e-9);
        assert!((theta[1] - 2.0 / 3.0).abs() < 1e-9);
        assert!((theta.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stat_of_identity_is_normalised() {
        // every distribution is stationary for I; the least-squares solution
        // must still be a distribution
        let theta = stat(&DMatrix::<f64>::identity(3, 3)).unwrap();
        assert!((theta.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stat_rejects_non_square_input() {
        let m = DMatrix::<f64>::zeros(2, 3);
        assert!(matches!(stat(&m), Err(NumericError::NotSquare { .. })));
    }
}
