/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Transition-matrix builder for the reservation QBD model.
//!
//! The backlog of a reservation-scheduled task, sampled at server-period
//! boundaries, evolves as a quasi-birth-death chain: in one period the
//! backlog can drop by at most the budget `Q` and grow by at most one job.
//! This module turns the computation-time cdf `C` and the inter-arrival
//! pmf `U` (already resampled to server-period units) into one period of
//! the repeating block-tridiagonal transition matrix
//!
//! ```text
//! [ B0  A0   0   0  ... ]
//! [ A2  A1  A0   0  ... ]
//! [  0  A2  A1  A0  ... ]
//! ```
//!
//! and slices it into the four blocks the solvers consume. Blocks are named
//! by their role in this layout: `a0` moves one level up, `a1` stays,
//! `a2` moves down, `b0` is the boundary.
//!
//! Two constructions are available: the extended form, and a compressed
//! form that collapses every backlog state below `U.min() * Q` into state
//! 0 to shrink the matrices.

use nalgebra::DMatrix;

use crate::distribution::{Cdf, DistributionError, Pmf};

use super::error::SolverError;

// ── Block set ─────────────────────────────────────────────────────────────────

/// One period of the repeating block-tridiagonal QBD transition matrix.
#[derive(Debug, Clone)]
pub struct QbdBlocks {
    /// Boundary-to-boundary block.
    pub b0: DMatrix<f64>,
    /// Up block (level `i` to `i + 1`).
    pub a0: DMatrix<f64>,
    /// Local block (level `i` to `i`).
    pub a1: DMatrix<f64>,
    /// Down block (level `i` to `i - 1`).
    pub a2: DMatrix<f64>,
}

impl QbdBlocks {
    /// Common square dimension of the four blocks.
    pub fn order(&self) -> usize {
        self.a1.nrows()
    }

    /// Verify the four blocks are square matrices of one common dimension.
    pub fn check_sizes(&self) -> Result<(), SolverError> {
        let order = self.order();
        for m in [&self.b0, &self.a0, &self.a1, &self.a2] {
            if m.nrows() != order || m.ncols() != order {
                return Err(SolverError::BlockSizeMismatch {
                    rows: m.nrows(),
                    cols: m.ncols(),
                    order,
                });
            }
        }
        Ok(())
    }
}

// ── Transition probabilities ──────────────────────────────────────────────────

/// Transition probability from backlog state `i` to `j` over one server
/// period, extended form.
///
/// The entry convolves "one more job may or may not have arrived" (weighted
/// by `u`) with "the remaining computation completes" (through the cdf
/// `p`). Below the minimum inter-arrival backlog the chain behaves as a
/// pure completion process.
pub(crate) fn transition_prob(
    i: i64,
    j: i64,
    q: i64,
    p: &Cdf,
    u: &Pmf,
) -> Result<f64, DistributionError> {
    let mut prob = 0.0;
    if i < u.min() * q {
        if j == 0 {
            prob = p.get(j)?;
        } else {
            prob = p.get(j)? - p.get(j - 1)?;
        }
    } else {
        for z in u.min()..=u.max() {
            let x = j - i + z * q;
            if x <= p.min() {
                prob += u.get(z) * p.get(x)?;
            } else {
                prob += u.get(z) * (p.get(x)? - p.get(x - 1)?);
            }
        }
    }
    Ok(prob)
}

/// Transition probability from `i` to `j`, compressed form.
///
/// Identical semantics to [`transition_prob`] with every backlog state
/// below `u.min() * q` collapsed into state 0. Only valid when the task
/// does not always finish before its next activation; the builder checks
/// that before calling here.
pub(crate) fn transition_prob_compressed(
    i: i64,
    j: i64,
    q: i64,
    p: &Cdf,
    u: &Pmf,
) -> Result<f64, DistributionError> {
    let zmin = u.min();
    let zmax = u.max();
    let mut prob = 0.0;
    if i == 0 {
        if j == 0 {
            // P(v' <= zmin*Q | v <= zmin*Q) = P(c <= zmin*Q)
            prob = p.get(zmin * q)?;
        } else {
            // P(v' = zmin*Q + j | v <= zmin*Q) = P(c = zmin*Q + j)
            prob = p.get(zmin * q + j)? - p.get(zmin * q + j - 1)?;
        }
    } else if j == 0 {
        // P(v' <= zmin*Q | v = zmin*Q + i): completion anywhere in the
        // collapsed band
        for h in zmin..=zmax {
            prob += u.get(h) * (p.get(h * q - i)? - p.get(h * q - i - zmin * q)?);
        }
    } else {
        for h in zmin..=zmax {
            prob += u.get(h) * (p.get(h * q + j - i)? - p.get(h * q + j - i - 1)?);
        }
    }
    Ok(prob)
}

// ── Assembly ──────────────────────────────────────────────────────────────────

/// Slice the `3*dim x 3*dim` repeating matrix into its four QBD blocks.
///
/// A pure index copy: `B0` and `A0` come from the first block row, `A2`
/// and `A1` from the second.
pub(crate) fn extract_sub_matrices(mat: &DMatrix<f64>, dim: usize) -> QbdBlocks {
    let mut b0 = DMatrix::zeros(dim, dim);
    let mut a0 = DMatrix::zeros(dim, dim);
    let mut a1 = DMatrix::zeros(dim, dim);
    let mut a2 = DMatrix::zeros(dim, dim);
    for i in 0..dim {
        for j in 0..dim {
            b0[(i, j)] = mat[(i, j)];
            a0[(i, j)] = mat[(i, j + dim)];
            a2[(i, j)] = mat[(i + dim, j)];
            a1[(i, j)] = mat[(i + dim, j + dim)];
        }
    }
    QbdBlocks { b0, a0, a1, a2 }
}

/// Build the QBD block set for a reservation with (coarsened) budget `q`,
/// computation-time cdf `p` and inter-arrival pmf `u`.
///
/// The block dimension is `max(forward, back)` where `forward`/`back`
/// bound how many backlog levels one step can move in either direction;
/// three consecutive repetitions are materialised and sliced.
///
/// # Errors
/// In compressed mode, a task that always finishes before its next
/// activation (`u.min() * q > p.max()`) is a fatal error: there is nothing
/// left to compress.
pub(crate) fn build_blocks(
    p: &Cdf,
    u: &Pmf,
    q: i64,
    compress: bool,
    task: &str,
) -> Result<QbdBlocks, SolverError> {
    let (forward, back) = if compress {
        if u.min() * q > p.max() {
            return Err(SolverError::CompressionNotApplicable {
                task: task.to_string(),
                min_interarrival_budget: u.min() * q,
                wcet: p.max(),
            });
        }
        (u.min() * q - p.min() + 1, p.max() + 1 - u.min() * q)
    } else {
        (u.min() * q + 1, p.max() + 1)
    };

    let maxv = forward.max(back).max(1) as usize;

    let mut mat = DMatrix::zeros(3 * maxv, 3 * maxv);
    for i in 0..3 * maxv {
        for j in 0..3 * maxv {
            mat[(i, j)] = if compress {
                transition_prob_compressed(i as i64, j as i64, q, p, u)?
            } else {
                transition_prob(i as i64, j as i64, q, p, u)?
            };
        }
    }

    Ok(extract_sub_matrices(&mat, maxv))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Pmf;

    /// Two-point computation {10: 0.5, 40: 0.5} as a cdf, point inter-arrival
    /// at 4 server periods, budget 10: the reference reservation scenario.
    fn reference_inputs() -> (Cdf, Pmf) {
        let c = Pmf::from_entries(&[(10, 0.5), (40, 0.5)])
            .unwrap()
            .to_cdf()
            .unwrap();
        let u = Pmf::from_entries(&[(4, 1.0)]).unwrap();
        (c, u)
    }

    #[test]
    fn extended_blocks_have_expected_dimension() {
        let (c, u) = reference_inputs();
        let blocks = build_blocks(&c, &u, 10, false, "ref").unwrap();
        // forward = 4*10 + 1 = 41, back = 40 + 1 = 41
        assert_eq!(blocks.order(), 41);
        blocks.check_sizes().unwrap();
    }

    #[test]
    fn interior_rows_of_full_chain_sum_to_one() {
        let (c, u) = reference_inputs();
        let q = 10;
        let maxv = 41i64;
        // row i of the infinite chain: entries j in [i - 40, i + 40];
        // materialise a window wide enough and check a middle row
        let i = maxv + 5;
        let mut sum = 0.0;
        for j in 0..4 * maxv {
            sum += transition_prob(i, j, q, &c, &u).unwrap();
        }
        assert!((sum - 1.0).abs() < 1e-9, "row sum was {sum}");
    }

    #[test]
    fn boundary_rows_sum_to_one() {
        let (c, u) = reference_inputs();
        let q = 10;
        for i in 0..5 {
            let mut sum = 0.0;
            for j in 0..200 {
                sum += transition_prob(i, j, q, &c, &u).unwrap();
            }
            assert!((sum - 1.0).abs() < 1e-9, "row {i} sum was {sum}");
        }
    }

    #[test]
    fn below_min_interarrival_rows_are_pure_completion() {
        let (c, u) = reference_inputs();
        // i < u.min * q = 40: transition to j is P(C = j)
        let p10 = transition_prob(5, 10, 10, &c, &u).unwrap();
        let p40 = transition_prob(5, 40, 10, &c, &u).unwrap();
        assert!((p10 - 0.5).abs() < 1e-12);
        assert!((p40 - 0.5).abs() < 1e-12);
        assert_eq!(transition_prob(5, 25, 10, &c, &u).unwrap(), 0.0);
    }

    #[test]
    fn compressed_rows_sum_to_one() {
        // computation up to 60 > u.min * q = 40, so compression applies
        let c = Pmf::from_entries(&[(20, 0.5), (60, 0.5)])
            .unwrap()
            .to_cdf()
            .unwrap();
        let u = Pmf::from_entries(&[(4, 1.0)]).unwrap();
        for i in 0..5 {
            let mut sum = 0.0;
            for j in 0..200 {
                sum += transition_prob_compressed(i, j, 10, &c, &u).unwrap();
            }
            assert!((sum - 1.0).abs() < 1e-9, "row {i} sum was {sum}");
        }
    }

    #[test]
    fn compression_rejected_when_task_always_finishes_early() {
        let (c, u) = reference_inputs();
        // u.min * q = 4 * 11 = 44 > WCET 40
        let err = build_blocks(&c, &u, 11, true, "ref").unwrap_err();
        assert!(matches!(
            err,
            SolverError::CompressionNotApplicable { .. }
        ));
    }

    #[test]
    fn extract_sub_matrices_is_a_pure_index_copy() {
        // encode block coordinates in the values to verify slicing
        let dim = 2usize;
        let mut mat = DMatrix::zeros(3 * dim, 3 * dim);
        for i in 0..3 * dim {
            for j in 0..3 * dim {
                mat[(i, j)] = (i * 10 + j) as f64;
            }
        }
        let blocks = extract_sub_matrices(&mat, dim);
        assert_eq!(blocks.b0[(0, 0)], 0.0);
        assert_eq!(blocks.a0[(0, 0)], mat[(0, dim)]);
        assert_eq!(blocks.a2[(0, 0)], mat[(dim, 0)]);
        assert_eq!(blocks.a1[(0, 0)], mat[(dim, dim)]);
        assert_eq!(blocks.a1[(1, 1)], mat[(dim + 1, dim + 1)]);
    }

    #[test]
    fn tiny_support_still_yields_valid_blocks() {
        // deterministic unit computation with immediate reactivation: the
        // smallest meaningful chain
        let c = Pmf::from_entries(&[(1, 1.0)]).unwrap().to_cdf().unwrap();
        let u = Pmf::from_entries(&[(1, 1.0)]).unwrap();
        let blocks = build_blocks(&c, &u, 1, false, "tiny").unwrap();
        assert!(blocks.order() >= 1);
        blocks.check_sizes().unwrap();
    }
}
