/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Latouche–Ramaswami fixed-point iteration for the QBD rate matrix.
//!
//! Iterates `R <- A0 + R*A1 + R^2*A2` from `R = 0` until the infinity norm
//! of the update drops below `epsilon` or the iteration budget runs out.
//! Hitting the budget is a numerical anomaly, not a failure: the last
//! iterate is returned with a warning, reflecting that the iteration
//! converges monotonically from below and a truncated run is simply a
//! slightly pessimistic `R`.
//!
//! Reference: G. Latouche and V. Ramaswami, "A logarithmic reduction
//! algorithm for quasi-birth-and-death processes", J. Appl. Probab.
//! 30:650-674, 1993.

use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::numeric::infinity_norm;

use super::error::SolverError;
use super::matrix::QbdBlocks;

/// Result of a fixed-point run.
#[derive(Debug)]
pub(crate) struct LatoucheOutcome {
    /// Minimal nonnegative solution of `R = A0 + R*A1 + R^2*A2` (or the
    /// last iterate on cutoff).
    pub r: DMatrix<f64>,
    pub iterations: u64,
    pub converged: bool,
}

/// Run the fixed-point iteration on one QBD block set.
pub(crate) fn solve(
    blocks: &QbdBlocks,
    epsilon: f64,
    max_iter: u32,
    verbose: bool,
) -> Result<LatoucheOutcome, SolverError> {
    blocks.check_sizes()?;
    let n = blocks.order();

    let mut r = DMatrix::<f64>::zeros(n, n);
    let mut iterations = 0u64;
    let mut converged = false;

    loop {
        let r_new = &blocks.a0 + &r * &blocks.a1 + &r * &r * &blocks.a2;
        let delta = infinity_norm(&(&r_new - &r));
        r = r_new;
        iterations += 1;

        if delta < epsilon {
            converged = true;
            break;
        }
        if iterations >= max_iter as u64 {
            warn!(
                iterations,
                delta, "latouche: maximum number of iterations reached, keeping last iterate"
            );
            break;
        }
        if verbose && iterations % 100 == 0 {
            debug!(iterations, delta, "latouche iteration");
        }
    }

    Ok(LatoucheOutcome {
        r,
        iterations,
        converged,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    /// Scalar chain: up 0.2, stay 0.3, down 0.5. The rate equation
    /// `R = 0.2 + 0.3 R + 0.5 R^2` has roots 0.4 and 1.0; the minimal
    /// nonnegative solution is 0.4.
    fn scalar_blocks() -> QbdBlocks {
        QbdBlocks {
            b0: dmatrix![0.8],
            a0: dmatrix![0.2],
            a1: dmatrix![0.3],
            a2: dmatrix![0.5],
        }
    }

    fn residual(blocks: &QbdBlocks, r: &DMatrix<f64>) -> f64 {
        infinity_norm(&(r - &blocks.a0 - r * &blocks.a1 - r * r * &blocks.a2))
    }

    #[test]
    fn scalar_chain_converges_to_minimal_root() {
        let outcome = solve(&scalar_blocks(), 1e-10, 10_000, false).unwrap();
        assert!(outcome.converged);
        assert!((outcome.r[(0, 0)] - 0.4).abs() < 1e-8);
    }

    #[test]
    fn converged_r_satisfies_rate_equation() {
        let blocks = scalar_blocks();
        let outcome = solve(&blocks, 1e-10, 10_000, false).unwrap();
        assert!(residual(&blocks, &outcome.r) < 1e-6);
    }

    #[test]
    fn two_state_chain_residual_is_small() {
        // (A0 + A1 + A2) row-stochastic with net downward drift
        let blocks = QbdBlocks {
            b0: dmatrix![0.8, 0.0; 0.3, 0.5],
            a0: dmatrix![0.1, 0.1; 0.05, 0.05],
            a1: dmatrix![0.2, 0.2; 0.1, 0.3],
            a2: dmatrix![0.2, 0.2; 0.3, 0.2],
        };
        let outcome = solve(&blocks, 1e-12, 50_000, false).unwrap();
        assert!(outcome.converged);
        assert!(residual(&blocks, &outcome.r) < 1e-6);
        assert!(outcome.r.min() >= 0.0, "R must be nonnegative");
    }

    #[test]
    fn iteration_cutoff_returns_last_iterate() {
        let blocks = scalar_blocks();
        let outcome = solve(&blocks, 1e-15, 3, false).unwrap();
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 3);
        // partial iterate approaches R from below
        assert!(outcome.r[(0, 0)] > 0.0);
        assert!(outcome.r[(0, 0)] < 0.4);
    }

    #[test]
    fn mismatched_blocks_are_rejected() {
        let blocks = QbdBlocks {
            b0: dmatrix![0.8],
            a0: dmatrix![0.2],
            a1: dmatrix![0.3, 0.0; 0.0, 0.3],
            a2: dmatrix![0.5],
        };
        assert!(matches!(
            solve(&blocks, 1e-8, 100, false),
            Err(SolverError::BlockSizeMismatch { .. })
        ));
    }
}
