/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Probability solvers for reservation-scheduled tasks.
//!
//! [`ProbabilitySolver`] drives one of three interchangeable strategies
//! over the same template:
//!
//! ```text
//! check -> pre_process -> apply_algorithm -> post_process -> fill map
//! ```
//!
//! Only `apply_algorithm` truly differs between strategies, so the
//! dispatch is a plain [`Algorithm`] enum rather than an object hierarchy.
//! The solver binds to exactly one [`TaskDescriptor`] through
//! [`register_task`](ProbabilitySolver::register_task): the descriptor is
//! moved in, results are cached until [`reset`](ProbabilitySolver::reset)
//! or re-registration, and the deadline map is filled in place.
//!
//! # State machine
//!
//! ```text
//! Unlinked --register_task--> Linked --solve--> Solved
//!                               ^                 |
//!                               +----- reset -----+
//! ```
//!
//! `solve()` on a solved instance is a warning no-op; `solve()` while
//! unlinked, with no deadlines, or with the deadline step unset is a fatal
//! precondition error. The precondition set is the same for every
//! strategy; the companion form adds a periodicity requirement.

pub mod closed_form;
pub mod error;
pub mod matrix;

mod companion;
mod cyclic_reduction;
mod latouche;

pub use error::SolverError;
pub use matrix::QbdBlocks;

use nalgebra::{DMatrix, DVector, RowDVector};
use tracing::{debug, info, warn};

use crate::distribution::Cdf;
use crate::numeric::{pseudo_inverse, rank, spectral_radius};
use crate::task::TaskDescriptor;

// ── Algorithm selection ───────────────────────────────────────────────────────

/// The three interchangeable solution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Latouche–Ramaswami fixed-point iteration. Robust default; linear
    /// convergence that slows near the stability boundary.
    Latouche,
    /// Cyclic reduction with optional drift-based shift. Quadratic
    /// convergence.
    CyclicReduction,
    /// Companion-form eigen-decomposition. Non-iterative; periodic tasks
    /// only.
    Companion,
}

// ── Solver ────────────────────────────────────────────────────────────────────

/// Default update-norm threshold for the fixed-point iteration.
const DEFAULT_EPSILON: f64 = 1e-4;

/// Default iteration budget for the iterative strategies.
const DEFAULT_MAX_ITER: u32 = 100;

/// Tolerance before an out-of-range probability draws a warning.
const PROBABILITY_SLACK: f64 = 1e-6;

/// Steady-state deadline-probability solver for one reservation task.
#[derive(Debug)]
pub struct ProbabilitySolver {
    algorithm: Algorithm,

    // tuning
    granularity: u32,
    compress: bool,
    shift: bool,
    epsilon: f64,
    max_iter: u32,

    // binding and state flags
    task: Option<TaskDescriptor>,
    pre_process_done: bool,
    solved: bool,
    post_process_done: bool,
    trivially_schedulable: bool,

    // derived inputs
    blocks: Option<QbdBlocks>,
    companion_cdf: Option<Cdf>,
    coarse_budget: i64,
    n_ratio: u32,
    compressed_floor: u32,

    // results
    r: Option<DMatrix<f64>>,
    g: Option<DMatrix<f64>>,
    u: Option<DMatrix<f64>>,
    pi0: Option<RowDVector<f64>>,
    companion_components: usize,
}

impl ProbabilitySolver {
    /// Create an unlinked solver for the given strategy.
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            granularity: 1,
            compress: false,
            shift: false,
            epsilon: DEFAULT_EPSILON,
            max_iter: DEFAULT_MAX_ITER,
            task: None,
            pre_process_done: false,
            solved: false,
            post_process_done: false,
            trivially_schedulable: false,
            blocks: None,
            companion_cdf: None,
            coarse_budget: 0,
            n_ratio: 0,
            compressed_floor: 0,
            r: None,
            g: None,
            u: None,
            pi0: None,
            companion_components: 0,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    // ── Binding ───────────────────────────────────────────────────────────────

    /// Bind the solver to a task descriptor, taking ownership.
    ///
    /// Invalidates any cached result: the solver returns to the linked,
    /// unsolved state. Strategy compatibility (the companion form's
    /// periodicity requirement) is enforced by `solve()`, not here, so a
    /// solver can be configured before the task's shape is final.
    pub fn register_task(&mut self, task: TaskDescriptor) {
        self.reset();
        self.task = Some(task);
    }

    /// Give the descriptor (and its filled deadline map) back to the
    /// caller. The solver returns to the unlinked state.
    pub fn release_task(&mut self) -> Option<TaskDescriptor> {
        self.reset();
        self.task.take()
    }

    /// Borrow the bound descriptor.
    pub fn task(&self) -> Option<&TaskDescriptor> {
        self.task.as_ref()
    }

    /// Mutably borrow the bound descriptor (e.g. to add deadlines between
    /// runs). Cached results are *not* invalidated; call
    /// [`reset`](Self::reset) when the change affects the solution.
    pub fn task_mut(&mut self) -> Option<&mut TaskDescriptor> {
        self.task.as_mut()
    }

    // ── Tuning ────────────────────────────────────────────────────────────────

    /// Resample the computation time at this stride to cap matrix size.
    pub fn set_granularity(&mut self, granularity: u32) {
        self.granularity = granularity.max(1);
        self.reset();
    }

    /// Collapse all backlog states below the minimum inter-arrival backlog
    /// into one, shrinking the matrices.
    pub fn set_compress_flag(&mut self) {
        self.compress = true;
        self.reset();
    }

    /// Enable the drift-based shift preprocessing of cyclic reduction.
    pub fn set_shift(&mut self, shift: bool) {
        self.shift = shift;
        self.reset();
    }

    /// Convergence threshold for the fixed-point iteration.
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
        self.reset();
    }

    /// Iteration budget for the iterative strategies.
    pub fn set_max_iter(&mut self, max_iter: u32) {
        self.max_iter = max_iter;
        self.reset();
    }

    // ── State ─────────────────────────────────────────────────────────────────

    /// Discard every cached result, returning a linked solver to the
    /// freshly-registered state.
    pub fn reset(&mut self) {
        self.pre_process_done = false;
        self.solved = false;
        self.post_process_done = false;
        self.trivially_schedulable = false;
        self.blocks = None;
        self.companion_cdf = None;
        self.coarse_budget = 0;
        self.n_ratio = 0;
        self.compressed_floor = 0;
        self.r = None;
        self.g = None;
        self.u = None;
        self.pi0 = None;
        self.companion_components = 0;
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }

    pub fn is_linked(&self) -> bool {
        self.task.is_some()
    }

    /// The computed rate matrix, once solved (QBD strategies only).
    pub fn rate_matrix(&self) -> Option<&DMatrix<f64>> {
        self.r.as_ref()
    }

    /// The boundary probability vector, once solved.
    pub fn pi0(&self) -> Option<&RowDVector<f64>> {
        self.pi0.as_ref()
    }

    /// Cyclic-reduction byproduct `G`, when that strategy ran.
    pub fn g_matrix(&self) -> Option<&DMatrix<f64>> {
        self.g.as_ref()
    }

    /// Cyclic-reduction byproduct `U`, when that strategy ran.
    pub fn u_matrix(&self) -> Option<&DMatrix<f64>> {
        self.u.as_ref()
    }

    // ── Template ──────────────────────────────────────────────────────────────

    /// Compute the deadline probabilities for the bound task.
    ///
    /// Runs the full phase chain and writes the results into the task's
    /// deadline map. Idempotent: a second call on a solved instance is a
    /// no-op.
    ///
    /// # Errors
    /// Fatal precondition and structural errors abort the run; numerical
    /// anomalies are clamped and reported as warnings instead.
    pub fn solve(&mut self) -> Result<(), SolverError> {
        if !self.check()? {
            return Ok(());
        }
        self.pre_process()?;
        self.apply_algorithm()?;
        self.post_process()?;
        self.fill_in_probability_map()?;
        self.solved = true;
        Ok(())
    }

    /// Precondition gate shared by all strategies.
    ///
    /// Returns `Ok(false)` when there is nothing to do (already solved),
    /// `Ok(true)` when the run should proceed.
    fn check(&self) -> Result<bool, SolverError> {
        let task = self.task.as_ref().ok_or(SolverError::TaskNotRegistered)?;
        if self.solved {
            if task.verbose() {
                warn!(
                    task = task.name(),
                    "solution requested for an already-solved instance"
                );
            }
            return Ok(false);
        }
        if task.deadline_step() == 0 {
            return Err(SolverError::DeadlineStepUnset {
                task: task.name().to_string(),
            });
        }
        if task.probabilistic_deadlines().is_empty() {
            return Err(SolverError::NoDeadlines {
                task: task.name().to_string(),
            });
        }
        if self.algorithm == Algorithm::Companion && !task.is_periodic() {
            return Err(SolverError::NotPeriodic {
                task: task.name().to_string(),
            });
        }
        Ok(true)
    }

    /// Resample the distributions and materialise the strategy's inputs
    /// (QBD blocks or companion cdf).
    fn pre_process(&mut self) -> Result<(), SolverError> {
        let task = self.task.as_ref().ok_or(SolverError::TaskNotRegistered)?;
        let verbose = task.verbose();
        if self.pre_process_done {
            if verbose {
                warn!(task = task.name(), "pre_process called twice, ignoring");
            }
            return Ok(());
        }

        let step = self.granularity;
        if task.budget() % step != 0 {
            warn!(
                task = task.name(),
                budget = task.budget(),
                granularity = step,
                "granularity is not a submultiple of the budget"
            );
        }
        let coarse_budget = ((task.budget() / step) as i64).max(1);

        if verbose && step != 1 {
            info!(
                wcet = task.computation_time().max(),
                bcet = task.computation_time().min(),
                granularity = step,
                "resampling the computation time distribution"
            );
        }
        let computation = task.computation_time().resample(step)?;
        if verbose && step != 1 {
            info!(
                wcet = computation.max(),
                bcet = computation.min(),
                "distribution resampled"
            );
        }
        let computation_cdf = computation.to_cdf()?;

        // inter-arrival time in server-period units
        let arrivals = task.interarrival_time().resample(task.server_period())?;
        if verbose {
            info!(
                min = arrivals.min(),
                max = arrivals.max(),
                "inter-arrival time resampled at the server period"
            );
        }

        self.coarse_budget = coarse_budget;
        self.compressed_floor = if self.compress {
            arrivals.min().max(0) as u32
        } else {
            0
        };

        // the compression-applicability error outranks the trivial
        // short-circuit on the same condition
        if self.compress && arrivals.min() * coarse_budget > computation_cdf.max() {
            return Err(SolverError::CompressionNotApplicable {
                task: task.name().to_string(),
                min_interarrival_budget: arrivals.min() * coarse_budget,
                wcet: computation_cdf.max(),
            });
        }

        if task.is_periodic() {
            let period = task.period()?;
            if period % task.server_period() != 0 {
                warn!(
                    task = task.name(),
                    period,
                    server_period = task.server_period(),
                    "task period is not a multiple of the server period"
                );
            }
            self.n_ratio = period / task.server_period();
        }

        let period_budget = if task.is_periodic() {
            self.n_ratio as i64 * coarse_budget
        } else {
            coarse_budget
        };
        if period_budget > computation_cdf.max() {
            info!(
                task = task.name(),
                "budget exceeds worst-case requirements, every deadline holds trivially"
            );
            self.trivially_schedulable = true;
            self.pre_process_done = true;
            return Ok(());
        }

        match self.algorithm {
            Algorithm::Companion => {
                self.companion_cdf = Some(computation_cdf);
            }
            Algorithm::Latouche | Algorithm::CyclicReduction => {
                if verbose {
                    info!(
                        compressed = self.compress,
                        "computing the transition matrix"
                    );
                }
                let blocks = matrix::build_blocks(
                    &computation_cdf,
                    &arrivals,
                    coarse_budget,
                    self.compress,
                    task.name(),
                )?;
                if verbose {
                    info!(order = blocks.order(), "QBD blocks extracted");
                }
                self.blocks = Some(blocks);
            }
        }

        self.pre_process_done = true;
        Ok(())
    }

    /// Run the selected strategy on the prepared inputs.
    fn apply_algorithm(&mut self) -> Result<(), SolverError> {
        let task = self.task.as_ref().ok_or(SolverError::TaskNotRegistered)?;
        if !self.pre_process_done {
            return Err(SolverError::PhaseOrder {
                phase: "apply_algorithm",
            });
        }
        if self.trivially_schedulable {
            return Ok(());
        }
        let verbose = task.verbose();

        match self.algorithm {
            Algorithm::Latouche => {
                let blocks = self.blocks.as_ref().ok_or(SolverError::PhaseOrder {
                    phase: "apply_algorithm",
                })?;
                let outcome = latouche::solve(blocks, self.epsilon, self.max_iter, verbose)?;
                if verbose {
                    info!(
                        iterations = outcome.iterations,
                        converged = outcome.converged,
                        "latouche finished"
                    );
                }
                self.r = Some(outcome.r);
            }
            Algorithm::CyclicReduction => {
                let blocks = self.blocks.as_ref().ok_or(SolverError::PhaseOrder {
                    phase: "apply_algorithm",
                })?;
                let outcome = cyclic_reduction::solve(blocks, self.shift, self.max_iter, verbose)?;
                if verbose {
                    info!(
                        iterations = outcome.iterations,
                        converged = outcome.converged,
                        "cyclic reduction finished"
                    );
                }
                self.g = Some(outcome.g);
                self.u = Some(outcome.u);
                self.r = Some(outcome.r);
            }
            Algorithm::Companion => {
                let cdf = self.companion_cdf.as_ref().ok_or(SolverError::PhaseOrder {
                    phase: "apply_algorithm",
                })?;
                let outcome = companion::solve(cdf, self.n_ratio, self.coarse_budget)?;
                self.companion_components = outcome.unstable_count;
                self.pi0 = Some(outcome.pi);
            }
        }
        Ok(())
    }

    /// Derive the boundary probability vector from the rate matrix (QBD
    /// strategies; the companion form produces it directly).
    fn post_process(&mut self) -> Result<(), SolverError> {
        let task = self.task.as_ref().ok_or(SolverError::TaskNotRegistered)?;
        if self.post_process_done {
            if task.verbose() {
                warn!(task = task.name(), "post_process called twice, ignoring");
            }
            return Ok(());
        }
        if !self.trivially_schedulable && self.algorithm != Algorithm::Companion {
            let blocks = self.blocks.as_ref().ok_or(SolverError::PhaseOrder {
                phase: "post_process",
            })?;
            let r = self.r.as_ref().ok_or(SolverError::PhaseOrder {
                phase: "post_process",
            })?;
            let pi0 = compute_pi0(r, &blocks.b0, &blocks.a2, task.verbose(), task.name())?;
            self.pi0 = Some(pi0);
        }
        self.post_process_done = true;
        Ok(())
    }

    /// Walk the stationary distribution and write the deadline map.
    fn fill_in_probability_map(&mut self) -> Result<(), SolverError> {
        // disjoint field borrows: the map is written while pi0/r are read
        let Self {
            task,
            algorithm,
            compress,
            trivially_schedulable,
            coarse_budget,
            n_ratio,
            compressed_floor,
            companion_components,
            r,
            pi0,
            ..
        } = self;
        let task = task.as_mut().ok_or(SolverError::TaskNotRegistered)?;
        let verbose = task.verbose();
        let name = task.name().to_string();
        let server_period = task.server_period();
        let step_ratio = task.deadline_step() / server_period;

        if *trivially_schedulable {
            for probability in task.probabilistic_deadlines_mut().values_mut() {
                *probability = 1.0;
            }
            return Ok(());
        }

        let pi0 = pi0.as_ref().ok_or(SolverError::PhaseOrder {
            phase: "fill_in_probability_map",
        })?;

        match algorithm {
            Algorithm::Companion => {
                let base = *n_ratio;
                let last = base + *companion_components as u32;
                for (&key, _) in task.probabilistic_deadlines().iter() {
                    let delta = key * step_ratio;
                    if delta < base || delta > last {
                        warn!(
                            task = %name,
                            deadline = delta * server_period,
                            "deadline outside the companion window will not be computed"
                        );
                    }
                }
                let mut probability = 0.0;
                for (i, component) in pi0.iter().enumerate() {
                    let mut component = *component;
                    if !(-PROBABILITY_SLACK..=1.0 + PROBABILITY_SLACK).contains(&component) {
                        warn!(
                            task = %name,
                            component,
                            "companion component out of range, clamping"
                        );
                    }
                    component = component.clamp(0.0, 1.0);
                    probability += component;
                    let delta = base + i as u32;
                    write_probability(task, delta, step_ratio, server_period, probability, verbose);
                }
            }
            Algorithm::Latouche | Algorithm::CyclicReduction => {
                let r = r.as_ref().ok_or(SolverError::PhaseOrder {
                    phase: "fill_in_probability_map",
                })?;
                let q = (*coarse_budget).max(1) as usize;
                let n = pi0.len();
                let floor = *compressed_floor;

                // in compressed mode the first levels are collapsed away and
                // their deadlines cannot be computed
                if *compress {
                    for (&key, _) in task.probabilistic_deadlines().iter() {
                        if key * step_ratio <= floor {
                            warn!(
                                task = %name,
                                deadline = key * step_ratio * server_period,
                                "deadline below the first representable level of the \
                                 compressed model will not be computed"
                            );
                        }
                    }
                }

                let max_key = *task
                    .probabilistic_deadlines()
                    .keys()
                    .next_back()
                    .ok_or_else(|| SolverError::NoDeadlines { task: name.clone() })?;
                let max_delta = max_key * step_ratio;

                let mut delta = if *compress { floor + 1 } else { 0 };
                // the collapsed band is not a boundary of its own
                let mut skip_boundary = *compress;
                let mut probability = 0.0;
                let mut pi = pi0.clone();

                if delta <= max_delta {
                    // one level is written per block at minimum, so this
                    // bound is generous
                    'outer: for _ in 0..=max_delta as usize + 1 {
                        for i in 0..n {
                            if i % q == 0 {
                                if skip_boundary {
                                    skip_boundary = false;
                                } else {
                                    write_probability(
                                        task,
                                        delta,
                                        step_ratio,
                                        server_period,
                                        probability,
                                        verbose,
                                    );
                                    if delta >= max_delta {
                                        break 'outer;
                                    }
                                    delta += 1;
                                }
                            }
                            probability += pi[i];
                        }
                        pi = &pi * r;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Write one accumulated probability into the map, scaled back to the
/// caller's deadline step; out-of-range values are clamped with a warning.
fn write_probability(
    task: &mut TaskDescriptor,
    delta: u32,
    step_ratio: u32,
    server_period: u32,
    probability: f64,
    verbose: bool,
) {
    if delta % step_ratio != 0 {
        return;
    }
    let key = delta / step_ratio;
    let name = task.name().to_string();
    if let Some(entry) = task.probabilistic_deadlines_mut().get_mut(&key) {
        if probability > 1.0 + PROBABILITY_SLACK || probability < -PROBABILITY_SLACK {
            warn!(
                task = %name,
                probability,
                "accumulated probability out of range, clamping"
            );
        }
        *entry = probability.clamp(0.0, 1.0);
        if verbose {
            debug!(
                task = %name,
                deadline = delta * server_period,
                probability = *entry,
                "deadline probability"
            );
        }
    }
}

// ── Boundary probability ──────────────────────────────────────────────────────

/// Boundary probability vector `pi0` from the rate matrix and boundary
/// blocks.
///
/// Solves the `n x (n+1)` system `[B0 + R*A2 - I | (I-R)^-1 * 1]` (the
/// boundary balance equations joined with the normalisation constraint)
/// through the pseudo-inverse against the normalisation selector.
///
/// # Errors
/// Mismatched block dimensions are fatal; a rank-deficient system means
/// the chain has no unique boundary solution.
pub(crate) fn compute_pi0(
    r: &DMatrix<f64>,
    b0: &DMatrix<f64>,
    a2: &DMatrix<f64>,
    verbose: bool,
    task: &str,
) -> Result<RowDVector<f64>, SolverError> {
    let n = r.nrows();
    if r.ncols() != n {
        return Err(SolverError::BlockSizeMismatch {
            rows: r.nrows(),
            cols: r.ncols(),
            order: n,
        });
    }
    for m in [b0, a2] {
        if m.nrows() != n || m.ncols() != n {
            return Err(SolverError::BlockSizeMismatch {
                rows: m.nrows(),
                cols: m.ncols(),
                order: n,
            });
        }
    }

    if r.min() < 0.0 && verbose {
        warn!(task, "rate matrix has negative coefficients");
    }
    let radius = spectral_radius(r);
    if radius > 1.0 {
        warn!(
            task,
            spectral_radius = radius,
            "rate matrix has spectral radius greater than 1"
        );
    }

    let id = DMatrix::<f64>::identity(n, n);
    let normalisation = (&id - r)
        .try_inverse()
        .ok_or(crate::numeric::NumericError::Singular {
            context: "boundary normalisation (I - R)",
        })?
        * DVector::<f64>::repeat(n, 1.0);

    let mut m = DMatrix::<f64>::zeros(n, n + 1);
    m.view_mut((0, 0), (n, n)).copy_from(&(b0 + r * a2 - id));
    m.set_column(n, &normalisation);

    if rank(&m) < n {
        if verbose {
            warn!(task, "boundary system is rank deficient");
        }
        return Err(SolverError::NoUniqueSolution {
            task: task.to_string(),
        });
    }

    let pinv = pseudo_inverse(&m)?;
    let mut selector = RowDVector::<f64>::zeros(n + 1);
    selector[n] = 1.0;
    let pi0 = selector * pinv;

    if pi0.min() < 0.0 && verbose {
        warn!(task, "boundary vector has negative elements");
    }
    Ok(pi0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
