/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Cyclic Reduction for the QBD matrix equations (Bini–Meini scheme).
//!
//! A doubling iteration on the quadruple `(A, B, C, Ahat)`: each pass
//! squares the effective step of the chain, so the off-diagonal blocks `B`
//! and `C` decay quadratically and the loop terminates when either norm
//! falls below a hard threshold. From the fixed point, `G`, `R` and `U`
//! are recovered in closed form.
//!
//! The optional shift preprocessing moves the unit eigenvalue of the block
//! sum away from the unit circle before reducing, which restores quadratic
//! convergence for chains near the stability boundary. The direction of
//! the shift follows the drift of the unbounded chain: a transient chain
//! is replaced by its dual, a recurrent one has its up block shifted by
//! its row sums (compensated in the local block), and the substitution is
//! undone on the results after the loop.
//!
//! Only discrete-time chains are supported: a negative diagonal in the
//! down block (the signature of a continuous-time generator) is rejected.

use nalgebra::{DMatrix, DVector, RowDVector};
use tracing::{debug, info, warn};

use crate::numeric::{infinity_norm, stat, NumericError};

use super::error::SolverError;
use super::matrix::QbdBlocks;

/// Off-diagonal decay threshold terminating the reduction.
const CR_THRESHOLD: f64 = 1e-14;

/// Result of a cyclic-reduction run.
#[derive(Debug)]
pub(crate) struct CyclicReductionOutcome {
    /// Minimal nonnegative solution of `G = A2 + A1*G + A0*G^2`.
    pub g: DMatrix<f64>,
    /// Minimal nonnegative solution of `R = A0 + R*A1 + R^2*A2`.
    pub r: DMatrix<f64>,
    /// Minimal nonnegative solution of `U = A1 + A0*(I-U)^-1*A2`.
    pub u: DMatrix<f64>,
    pub iterations: u64,
    pub converged: bool,
}

/// Run cyclic reduction on one QBD block set.
pub(crate) fn solve(
    blocks: &QbdBlocks,
    shift: bool,
    max_iter: u32,
    verbose: bool,
) -> Result<CyclicReductionOutcome, SolverError> {
    blocks.check_sizes()?;
    let n = blocks.order();
    let id = DMatrix::<f64>::identity(n, n);

    if blocks.a2.diagonal().sum() < 0.0 {
        return Err(SolverError::ContinuousTimeChain);
    }

    // working copies; the shift rewrites these, the originals stay intact
    // for the closed-form recovery of R and U
    let mut up = blocks.a0.clone();
    let mut local = blocks.a1.clone();
    let mut down = blocks.a2.clone();

    let ones = DVector::<f64>::repeat(n, 1.0);
    let ut = RowDVector::<f64>::repeat(n, 1.0 / n as f64);

    let mut recurrent_shift = false;
    if shift {
        let theta = stat(&(&blocks.a0 + &blocks.a1 + &blocks.a2))?;
        let down_sums = row_sums(&blocks.a2);
        let up_sums = row_sums(&blocks.a0);
        let drift = (&theta * &down_sums)[(0, 0)] - (&theta * &up_sums)[(0, 0)];
        if verbose {
            info!(drift, "cyclic reduction drift");
        }
        if drift < 0.0 {
            // transient chain: reduce its dual instead
            local += &ones * (&theta * &blocks.a2);
            up -= &ones * (&theta * &blocks.a0);
        } else {
            recurrent_shift = true;
            down -= &down_sums * &ut;
            local += &up_sums * &ut;
        }
    }

    // doubling loop
    let mut a = local;
    let mut b = up;
    let mut c = down.clone();
    let mut ahat = a.clone();

    let mut check = 1.0_f64;
    let mut iterations = 0u64;
    while check > CR_THRESHOLD && iterations < max_iter as u64 {
        let ainv = (&id - &a)
            .try_inverse()
            .ok_or(NumericError::Singular {
                context: "cyclic reduction pivot (I - A)",
            })?;
        let ba = &b * &ainv;
        let ca = &c * &ainv;
        ahat += &ba * &c;
        a += &ba * &c + &ca * &b;
        b = &ba * &b;
        c = &ca * &c;
        iterations += 1;

        check = infinity_norm(&b).min(infinity_norm(&c));
        if verbose {
            debug!(iterations, check, "cyclic reduction iteration");
        }
    }
    let converged = check <= CR_THRESHOLD;
    if !converged {
        warn!(
            iterations,
            check, "cyclic reduction: maximum number of iterations reached"
        );
    }

    let mut g = (&id - &ahat)
        .try_inverse()
        .ok_or(NumericError::Singular {
            context: "cyclic reduction (I - Ahat)",
        })?
        * &down;
    if recurrent_shift {
        // undo the shift: the reduced chain's G misses the unit-eigenvalue
        // direction removed up front
        g += &ones * &ut;
    }

    let r = &blocks.a0
        * (&id - (&blocks.a1 + &blocks.a0 * &g))
            .try_inverse()
            .ok_or(NumericError::Singular {
                context: "rate matrix recovery (I - A1 - A0*G)",
            })?;
    let u = &blocks.a1 + &r * &blocks.a2;

    if verbose {
        let res_g = infinity_norm(&(&g - &blocks.a2 - (&blocks.a1 + &blocks.a0 * &g) * &g));
        let res_r = infinity_norm(&(&r - &blocks.a0 - &r * (&blocks.a1 + &r * &blocks.a2)));
        info!(res_g, res_r, "cyclic reduction final residuals");
        if let Some(iu_inv) = (&id - &u).try_inverse() {
            let res_u = infinity_norm(&(&u - &blocks.a1 - &blocks.a0 * iu_inv * &blocks.a2));
            info!(res_u, "cyclic reduction residual for U");
        }
    }

    Ok(CyclicReductionOutcome {
        g,
        r,
        u,
        iterations,
        converged,
    })
}

/// Row sums as a column vector (Eigen's `rowwise().sum()`).
fn row_sums(m: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(m.nrows(), m.row_iter().map(|row| row.sum()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    /// Scalar chain: up 0.2, stay 0.3, down 0.5. Minimal solutions:
    /// R = 0.4 (roots 0.4 and 1.0), G = 1.0 (recurrent chain).
    fn recurrent_scalar() -> QbdBlocks {
        QbdBlocks {
            b0: dmatrix![0.8],
            a0: dmatrix![0.2],
            a1: dmatrix![0.3],
            a2: dmatrix![0.5],
        }
    }

    /// Mirror chain drifting upward: transient, R = 1.0, G = 0.4.
    fn transient_scalar() -> QbdBlocks {
        QbdBlocks {
            b0: dmatrix![0.5],
            a0: dmatrix![0.5],
            a1: dmatrix![0.3],
            a2: dmatrix![0.2],
        }
    }

    fn residual_r(blocks: &QbdBlocks, r: &DMatrix<f64>) -> f64 {
        infinity_norm(&(r - &blocks.a0 - r * &blocks.a1 - r * r * &blocks.a2))
    }

    #[test]
    fn recurrent_scalar_basic_mode() {
        let blocks = recurrent_scalar();
        let out = solve(&blocks, false, 100, false).unwrap();
        assert!(out.converged);
        assert!((out.r[(0, 0)] - 0.4).abs() < 1e-9);
        assert!((out.g[(0, 0)] - 1.0).abs() < 1e-9);
        assert!(residual_r(&blocks, &out.r) < 1e-6);
    }

    #[test]
    fn recurrent_scalar_shift_mode() {
        let blocks = recurrent_scalar();
        let out = solve(&blocks, true, 100, false).unwrap();
        assert!(out.converged);
        assert!((out.r[(0, 0)] - 0.4).abs() < 1e-9);
        assert!((out.g[(0, 0)] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn transient_scalar_uses_dual_chain() {
        let blocks = transient_scalar();
        let out = solve(&blocks, true, 100, false).unwrap();
        assert!(out.converged);
        assert!((out.g[(0, 0)] - 0.4).abs() < 1e-9);
        assert!((out.r[(0, 0)] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn u_matrix_satisfies_its_equation() {
        let blocks = recurrent_scalar();
        let out = solve(&blocks, false, 100, false).unwrap();
        // U = A1 + A0 (I-U)^-1 A2
        let lhs = out.u[(0, 0)];
        let rhs = 0.3 + 0.2 * (1.0 / (1.0 - lhs)) * 0.5;
        assert!((lhs - rhs).abs() < 1e-9);
    }

    #[test]
    fn agrees_with_latouche_on_two_state_chain() {
        let blocks = QbdBlocks {
            b0: dmatrix![0.8, 0.0; 0.3, 0.5],
            a0: dmatrix![0.1, 0.1; 0.05, 0.05],
            a1: dmatrix![0.2, 0.2; 0.1, 0.3],
            a2: dmatrix![0.2, 0.2; 0.3, 0.2],
        };
        let cr = solve(&blocks, false, 100, false).unwrap();
        let cr_shifted = solve(&blocks, true, 100, false).unwrap();
        let lat = super::super::latouche::solve(&blocks, 1e-12, 100_000, false).unwrap();
        assert!(residual_r(&blocks, &cr.r) < 1e-6);
        assert!(residual_r(&blocks, &cr_shifted.r) < 1e-6);
        assert!(infinity_norm(&(&cr.r - &lat.r)) < 1e-6);
        assert!(infinity_norm(&(&cr_shifted.r - &lat.r)) < 1e-6);
    }

    #[test]
    fn continuous_time_generator_is_rejected() {
        let blocks = QbdBlocks {
            b0: dmatrix![0.0],
            a0: dmatrix![0.2],
            a1: dmatrix![0.3],
            a2: dmatrix![-0.5],
        };
        assert!(matches!(
            solve(&blocks, false, 100, false),
            Err(SolverError::ContinuousTimeChain)
        ));
    }
}
