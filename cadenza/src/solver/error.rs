/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the probability solvers.
//!
//! One enum models the fatal tier of the two-tier error design: structural
//! and precondition faults that abort the current `solve()` and must be
//! fixed by the caller before retrying. The other tier (numerical
//! anomalies such as negative probabilities, spectral radius above 1 or a
//! convergence cutoff) never surfaces here; those are clamped to the
//! nearest valid value and reported through `tracing::warn!`.

use thiserror::Error;

use crate::distribution::DistributionError;
use crate::numeric::NumericError;
use crate::task::TaskError;

/// Fatal failures of a solver run.
#[derive(Debug, Error)]
pub enum SolverError {
    /// `solve()` (or a phase of it) was invoked before `register_task`.
    #[error("no task registered with this solver")]
    TaskNotRegistered,

    /// The task has no deadline step, so the deadline map is meaningless.
    #[error("task '{task}' has no deadline step set")]
    DeadlineStepUnset { task: String },

    /// The task has an empty deadline map: there is nothing to solve for.
    #[error("task '{task}' has no registered deadlines")]
    NoDeadlines { task: String },

    /// The companion-form method only applies to periodic tasks.
    #[error("task '{task}' is aperiodic; the companion-form method requires a periodic task")]
    NotPeriodic { task: String },

    /// Compressed-mode aggregation is meaningless when the task always
    /// finishes before its next activation.
    #[error(
        "task '{task}': compressed mode not usable, task always finishes before its next \
         activation (min interarrival x budget = {min_interarrival_budget} > WCET = {wcet})"
    )]
    CompressionNotApplicable {
        task: String,
        min_interarrival_budget: i64,
        wcet: i64,
    },

    /// The QBD blocks are not square matrices of one common dimension.
    #[error("QBD blocks must be square and of equal size, got {rows}x{cols} against order {order}")]
    BlockSizeMismatch {
        rows: usize,
        cols: usize,
        order: usize,
    },

    /// The boundary system is rank deficient: the stationary equations do
    /// not pin down a unique boundary vector.
    #[error("task '{task}': boundary system is rank deficient, no unique solution for pi0")]
    NoUniqueSolution { task: String },

    /// The block diagonal indicates a continuous-time generator; only
    /// discrete-time chains are supported.
    #[error("negative diagonal entries: only discrete-time chains are supported")]
    ContinuousTimeChain,

    /// A phase was invoked out of order (internal sequencing fault).
    #[error("solver phase '{phase}' invoked before its prerequisites")]
    PhaseOrder { phase: &'static str },

    /// A numeric primitive failed.
    #[error(transparent)]
    Numeric(#[from] NumericError),

    /// A distribution operation failed while preparing matrices.
    #[error(transparent)]
    Distribution(#[from] DistributionError),

    /// A task-descriptor operation failed.
    #[error(transparent)]
    Task(#[from] TaskError),
}
