/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Cadenza – steady-state probabilistic deadline analysis for
//! reservation-scheduled real-time tasks.
//!
//! Given probabilistic (not worst-case) models of a task's computation
//! time and inter-arrival time and its reservation parameters (budget `Q`
//! every server period `Ts`), the engine computes the stationary
//! probability of finishing within each of a set of candidate deadlines,
//! by building and solving a quasi-birth-death Markov chain.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── distribution/   – pmf/cdf value types and the distribution file loader
//! ├── numeric/        – infinity norm, pseudo-inverse, stationary vector
//! ├── task            – task descriptor and the deadline-probability map
//! ├── config/         – YAML scenario loading
//! └── solver/         – matrix builder, the three QBD strategies,
//!                       boundary mapper, analytic bound
//! ```

pub mod config;
pub mod distribution;
pub mod numeric;
pub mod solver;
pub mod task;

pub use distribution::{Cdf, DistributionError, Pmf};
pub use solver::{Algorithm, ProbabilitySolver, SolverError};
pub use task::{DeadlineProbabilityMap, TaskDescriptor, TaskError};
