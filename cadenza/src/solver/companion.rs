/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Companion-form eigenvalue method for periodic reservation tasks.
//!
//! Non-iterative alternative to the QBD iterations: the stationary
//! recurrence of the backlog chain is encoded as the characteristic
//! polynomial of a companion matrix built from the normalized first
//! differences of the computation-time cdf and the ratio
//! `N = period / server_period`. Its roots split at the unit circle:
//!
//! * the product `prod (1 - lambda)` over the stable roots
//!   (`|lambda| < 1 - eps`) gives the boundary probability `pi0` directly;
//! * each unstable root contributes one independent linear equation, built
//!   from a recursive Gamma-function over the coefficients, whose solution
//!   (through the complex pseudo-inverse) recovers the next probability
//!   components one per root.
//!
//! Numerical blemishes are tolerated, not fatal: a non-negligible
//! imaginary residue is a warning and an out-of-range `pi0` is clamped to
//! 0 with a warning, since this method is a known-imprecise fallback near the
//! stability boundary.

use nalgebra::{Complex, DMatrix, DVector, RowDVector};
use tracing::{debug, warn};

use crate::distribution::Cdf;
use crate::numeric::pseudo_inverse;

use super::error::SolverError;

/// Roots with modulus below `1 - STABILITY_EPSILON` count as stable.
const STABILITY_EPSILON: f64 = 1e-9;

/// Imaginary residues above this threshold trigger a warning.
const IMAGINARY_TOLERANCE: f64 = 1e-8;

/// Result of a companion-form run.
#[derive(Debug)]
pub(crate) struct CompanionOutcome {
    /// `[pi0, x1, .., xm]`: boundary probability followed by one component
    /// per unstable root.
    pub pi: RowDVector<f64>,
    /// Number of unstable roots.
    pub unstable_count: usize,
}

/// Solve the companion form for a periodic task.
///
/// `p` is the (resampled) computation-time cdf, `n_ratio` the number of
/// server periods per task period, `q` the coarsened budget. The caller
/// has already filtered the trivial `N*Q > WCET` case.
pub(crate) fn solve(p: &Cdf, n_ratio: u32, q: i64) -> Result<CompanionOutcome, SolverError> {
    let bcet = p.min();
    let wcet = p.max();
    let budget = n_ratio as i64 * q;

    if budget <= bcet {
        // the whole period's budget is below the best case: the chain can
        // never clear a job within its period
        warn!(
            budget,
            bcet, "companion: period budget does not reach the best-case computation time"
        );
        return Ok(CompanionOutcome {
            pi: RowDVector::from_element(1, 0.0),
            unstable_count: 0,
        });
    }

    let size = (wcet - bcet) as usize;
    if size == 0 {
        // deterministic computation time; with the trivial case filtered,
        // budget < wcet means the job can never finish in time
        let pi0 = if budget >= wcet { 1.0 } else { 0.0 };
        return Ok(CompanionOutcome {
            pi: RowDVector::from_element(1, pi0),
            unstable_count: 0,
        });
    }

    // normalized coefficients of the recurrence
    let a0 = p.get(bcet)?;
    let mut v = RowDVector::<f64>::zeros(size);
    let mut alfa = RowDVector::<f64>::zeros(size + 1);
    alfa[0] = 1.0;
    for i in 0..size {
        let ai = p.get(bcet + i as i64 + 1)? - p.get(bcet + i as i64)?;
        v[size - 1 - i] = -ai / a0;
        alfa[i + 1] = ai / a0;
    }
    v[(wcet - budget) as usize] += 1.0 / a0;

    // companion matrix: shifted identity above the coefficient row
    let mut m = DMatrix::<f64>::zeros(size, size);
    for i in 0..size - 1 {
        m[(i, i + 1)] = 1.0;
    }
    m.row_mut(size - 1).copy_from(&v);
    debug!(order = size, "companion matrix assembled");

    // root split at the unit circle
    let eigenvalues = m.complex_eigenvalues();
    let mut product = Complex::new(1.0, 0.0);
    let mut unstable: Vec<Complex<f64>> = Vec::new();
    for lambda in eigenvalues.iter() {
        if lambda.norm() < 1.0 - STABILITY_EPSILON {
            product *= Complex::new(1.0, 0.0) - *lambda;
        } else {
            unstable.push(*lambda);
        }
    }

    if product.im.abs() > IMAGINARY_TOLERANCE {
        warn!(
            imaginary = product.im,
            "companion: boundary probability has a non-negligible imaginary residue"
        );
    }
    let mut pi0 = product.re;
    if !(0.0..=1.0 + 1e-7).contains(&pi0) {
        warn!(pi0, "companion: boundary probability out of range, clamping to 0");
        pi0 = 0.0;
    }

    let unstable_count = unstable.len();
    if unstable_count == 0 {
        return Ok(CompanionOutcome {
            pi: RowDVector::from_element(1, pi0),
            unstable_count,
        });
    }

    // one equation per unstable root: Gamma-function sums over the
    // coefficient vector
    let mut a = DMatrix::<Complex<f64>>::zeros(unstable_count, unstable_count);
    let mut b = DVector::<Complex<f64>>::zeros(unstable_count);
    for (h, beta) in unstable.iter().enumerate() {
        let mut bh = Complex::new(0.0, 0.0);
        for q1 in 0..=unstable_count {
            bh += gamma_total(*beta, q1, &alfa);
        }
        b[h] = -bh * pi0;
        for k in 1..=unstable_count {
            let mut ah = Complex::new(0.0, 0.0);
            for q1 in 0..=unstable_count - k {
                ah += gamma_total(*beta, q1, &alfa);
            }
            a[(h, k - 1)] = ah;
        }
    }

    let res = pseudo_inverse(&a)? * b;

    let mut pi = RowDVector::<f64>::zeros(unstable_count + 1);
    pi[0] = pi0;
    for (i, el) in res.iter().enumerate() {
        if el.im.abs() > IMAGINARY_TOLERANCE {
            warn!(
                imaginary = el.im,
                component = i + 1,
                "companion: probability component has a non-negligible imaginary residue"
            );
        }
        pi[i + 1] = el.re;
    }

    Ok(CompanionOutcome {
        pi,
        unstable_count,
    })
}

/// Recursive Gamma-function over the normalized coefficients:
/// `Gamma(b, d) = b^d + sum_{i=1..d} b^(d-i) * alfa[i+2]`, coefficients
/// beyond the stored vector counting as zero.
fn gamma_total(b: Complex<f64>, dim: usize, alfa: &RowDVector<f64>) -> Complex<f64> {
    let mut gamma = b.powu(dim as u32);
    for i in 1..=dim {
        let coeff = alfa.get(i + 2).copied().unwrap_or(0.0);
        gamma += b.powu((dim - i) as u32) * coeff;
    }
    gamma
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Pmf;

    /// Computation {1: 0.75, 4: 0.25}, N = 2, Q = 1. The companion
    /// polynomial is l^3 - (4/3) l^2 + 1/3 with roots 1 (unstable) and
    /// (1 +/- sqrt(13)) / 6 (both stable), so pi0 = 1/3 exactly.
    fn reference_cdf() -> Cdf {
        Pmf::from_entries(&[(1, 0.75), (4, 0.25)])
            .unwrap()
            .to_cdf()
            .unwrap()
    }

    #[test]
    fn reference_case_boundary_probability_is_one_third() {
        let out = solve(&reference_cdf(), 2, 1).unwrap();
        assert_eq!(out.unstable_count, 1);
        assert!(
            (out.pi[0] - 1.0 / 3.0).abs() < 1e-9,
            "pi0 was {}",
            out.pi[0]
        );
    }

    #[test]
    fn outcome_has_one_component_per_unstable_root() {
        let out = solve(&reference_cdf(), 2, 1).unwrap();
        assert_eq!(out.pi.len(), out.unstable_count + 1);
        // pi0 itself is exact and must be a probability; the recovered
        // components are only clamped later, at map-fill time
        assert!(out.pi[0] >= 0.0 && out.pi[0] <= 1.0);
    }

    #[test]
    fn budget_below_best_case_yields_zero() {
        // bcet = 1; N*Q = 1 <= bcet, the job can never clear in one period
        let out = solve(&reference_cdf(), 1, 1).unwrap();
        assert_eq!(out.pi[0], 0.0);
        assert_eq!(out.unstable_count, 0);
    }

    #[test]
    fn deterministic_computation_collapses() {
        let cdf = Pmf::from_entries(&[(4, 1.0)]).unwrap().to_cdf().unwrap();
        // budget 3 < wcet 4, degenerate support
        let out = solve(&cdf, 3, 1).unwrap();
        assert_eq!(out.pi[0], 0.0);
    }

    #[test]
    fn gamma_of_dimension_zero_is_one() {
        let alfa = RowDVector::from_vec(vec![1.0, 0.5, 0.25]);
        let g = gamma_total(Complex::new(0.7, 0.0), 0, &alfa);
        assert!((g.re - 1.0).abs() < 1e-12);
        assert!(g.im.abs() < 1e-12);
    }
}
