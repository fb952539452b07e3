/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Closed-form analytic bound on the boundary probability.
//!
//! A conservative lower bound for periodic reservation tasks that needs no
//! eigenvalues and no iteration, just one pass over the computation-time cdf.
//! Used by the CLI as a quick sanity check against the full solvers; it is
//! a free function, deliberately outside the solver state machine.

use tracing::{debug, info};

use crate::distribution::Pmf;

use super::error::SolverError;

/// Denominators below this are treated as a vanishing bandwidth.
const DENOMINATOR_FLOOR: f64 = 1e-10;

/// Analytic bound on the probability of finishing within one task period.
///
/// `n_ratio` is the number of server periods per task period, `q` the
/// (coarsened) budget. Returns 1 when the period budget exceeds the worst
/// case, 0 when the denominator `C(N*Q - 1)` is negligible; a negative
/// bound is clamped to 0.
pub fn closed_form_pi0(computation: &Pmf, n_ratio: u32, q: i64) -> Result<f64, SolverError> {
    let c = computation.to_cdf()?;
    let budget = n_ratio as i64 * q;
    let wcet = c.max();

    if budget > wcet {
        info!("bandwidth greater than worst-case requirements");
        return Ok(1.0);
    }

    let a0p = c.get(budget - 1)?;
    if a0p.abs() < DENOMINATOR_FLOOR {
        info!("bandwidth too small for the analytic bound");
        return Ok(0.0);
    }

    let mut pi0 = 1.0;
    for i in budget + 1..=wcet {
        pi0 -= (i - budget) as f64 * (c.get(i)? - c.get(i - 1)?) / a0p;
    }
    debug!(pi0, "analytic bound computed");

    Ok(pi0.max(0.0))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_case_bound_is_one_third() {
        // {1: 0.75, 4: 0.25}, N = 2, Q = 1: same value the companion form
        // produces exactly
        let p = Pmf::from_entries(&[(1, 0.75), (4, 0.25)]).unwrap();
        let pi0 = closed_form_pi0(&p, 2, 1).unwrap();
        assert!((pi0 - 1.0 / 3.0).abs() < 1e-9, "bound was {pi0}");
    }

    #[test]
    fn over_provisioned_task_is_certain() {
        let p = Pmf::from_entries(&[(10, 0.5), (20, 0.5)]).unwrap();
        assert_eq!(closed_form_pi0(&p, 3, 10).unwrap(), 1.0);
    }

    #[test]
    fn vanishing_denominator_gives_zero() {
        // C(N*Q - 1) = C(0) = 0: no mass at or below the period budget
        let p = Pmf::from_entries(&[(5, 1.0)]).unwrap();
        assert_eq!(closed_form_pi0(&p, 1, 1).unwrap(), 0.0);
    }

    #[test]
    fn heavy_tail_clamps_to_zero() {
        // overload: most of the mass far above the budget drives the bound
        // negative, which clamps to 0
        let p = Pmf::from_entries(&[(1, 0.05), (100, 0.95)]).unwrap();
        let pi0 = closed_form_pi0(&p, 2, 1).unwrap();
        assert_eq!(pi0, 0.0);
    }
}
