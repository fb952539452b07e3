/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Task descriptor for reservation-scheduled tasks.
//!
//! A [`TaskDescriptor`] carries the timing model the solver consumes: the
//! computation-time and inter-arrival distributions, the reservation
//! parameters (budget `Q`, server period `Ts`), the deadline step, and the
//! deadline→probability map the solver fills in.
//!
//! # Ownership model
//! The descriptor owns its distributions and its deadline map. A solver
//! takes ownership of the whole descriptor at `register_task` time and
//! writes probabilities into the map in place; the compiler guarantees the
//! map is never aliased while the solver works on it. The caller gets the
//! descriptor back through the solver's accessors once the run completes.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::distribution::{DistributionError, Pmf};

/// Deadlines are integer multiples of a basic step (the deadline step),
/// itself a multiple of the server period.
pub type DeadlineUnit = u32;

/// Ordered map from deadline index to probability of meeting it.
///
/// `BTreeMap` keeps iteration in deadline order, which both the map filler
/// and the result printers rely on.
pub type DeadlineProbabilityMap = BTreeMap<DeadlineUnit, f64>;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failures raised while building or mutating a task descriptor.
#[derive(Debug, Error)]
pub enum TaskError {
    /// `budget / server_period` exceeds 1: the reservation is infeasible.
    #[error("task '{task}': bandwidth {budget}/{server_period} exceeds 1.0")]
    BandwidthExceeded {
        task: String,
        budget: u32,
        server_period: u32,
    },

    /// A periodic-only parameter was requested from an aperiodic task.
    #[error("task '{task}' is not periodic")]
    NotPeriodic { task: String },

    /// A deadline was inserted before the deadline step was defined.
    #[error("task '{task}': deadline inserted before defining the deadline step")]
    DeadlineStepUnset { task: String },

    /// The deadline step must be a whole number of server periods.
    #[error("task '{task}': deadline step {step} is not a multiple of the server period {server_period}")]
    StepNotMultipleOfServerPeriod {
        task: String,
        step: u32,
        server_period: u32,
    },

    /// The deadline step cannot change once deadlines have been registered.
    #[error("task '{task}': deadline step reset while probabilistic deadlines exist")]
    DeadlineStepReset { task: String },

    /// A deadline must be a multiple of the deadline step.
    #[error("task '{task}': deadline {deadline} is not a multiple of step {step}")]
    DeadlineNotMultiple {
        task: String,
        deadline: DeadlineUnit,
        step: u32,
    },

    /// The same deadline was registered twice.
    #[error("task '{task}': deadline {deadline} already registered")]
    DuplicateDeadline {
        task: String,
        deadline: DeadlineUnit,
    },

    /// A probability was requested for a deadline that was never registered.
    #[error("task '{task}': deadline {deadline} does not exist")]
    UnknownDeadline {
        task: String,
        deadline: DeadlineUnit,
    },

    /// Building the implicit point-mass inter-arrival of a periodic task
    /// failed.
    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

// ── TaskDescriptor ────────────────────────────────────────────────────────────

/// Timing model of one reservation-scheduled task.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    name: String,
    computation_time: Pmf,
    interarrival_time: Pmf,
    periodic: bool,
    /// Task period; meaningful only when `periodic` is set.
    period: u32,
    /// Reservation budget: execution units granted every server period.
    budget: u32,
    /// Reservation (server) period.
    server_period: u32,
    /// Granularity of the probabilistic deadlines; 0 until set.
    deadline_step: u32,
    probabilistic_deadlines: DeadlineProbabilityMap,
    verbose: bool,
}

impl TaskDescriptor {
    /// Descriptor for an aperiodic task with an explicit inter-arrival
    /// distribution.
    ///
    /// # Errors
    /// Fails when the requested bandwidth `budget / server_period` exceeds 1.
    pub fn aperiodic(
        name: impl Into<String>,
        computation_time: Pmf,
        interarrival_time: Pmf,
        budget: u32,
        server_period: u32,
    ) -> Result<Self, TaskError> {
        let name = name.into();
        Self::check_bandwidth(&name, budget, server_period)?;
        Ok(Self {
            name,
            computation_time,
            interarrival_time,
            periodic: false,
            period: 0,
            budget,
            server_period,
            deadline_step: 0,
            probabilistic_deadlines: DeadlineProbabilityMap::new(),
            verbose: false,
        })
    }

    /// Descriptor for a periodic task.
    ///
    /// The inter-arrival distribution is the point mass at `period`, so the
    /// QBD path treats periodic and aperiodic tasks uniformly.
    ///
    /// # Errors
    /// Fails when the requested bandwidth exceeds 1.
    pub fn periodic(
        name: impl Into<String>,
        computation_time: Pmf,
        period: u32,
        budget: u32,
        server_period: u32,
    ) -> Result<Self, TaskError> {
        let name = name.into();
        Self::check_bandwidth(&name, budget, server_period)?;
        let mut interarrival_time = Pmf::new(period as usize + 1, 0);
        interarrival_time.set(period as i64, 1.0)?;
        Ok(Self {
            name,
            computation_time,
            interarrival_time,
            periodic: true,
            period,
            budget,
            server_period,
            deadline_step: 0,
            probabilistic_deadlines: DeadlineProbabilityMap::new(),
            verbose: false,
        })
    }

    fn check_bandwidth(name: &str, budget: u32, server_period: u32) -> Result<(), TaskError> {
        if server_period == 0 || budget as f64 / server_period as f64 > 1.0 {
            return Err(TaskError::BandwidthExceeded {
                task: name.to_string(),
                budget,
                server_period,
            });
        }
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn computation_time(&self) -> &Pmf {
        &self.computation_time
    }

    /// Inter-arrival distribution; for periodic tasks this is the point
    /// mass at the period.
    pub fn interarrival_time(&self) -> &Pmf {
        &self.interarrival_time
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    pub fn server_period(&self) -> u32 {
        self.server_period
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// Task period.
    ///
    /// # Errors
    /// Requesting the period of an aperiodic task is an error.
    pub fn period(&self) -> Result<u32, TaskError> {
        if !self.periodic {
            return Err(TaskError::NotPeriodic {
                task: self.name.clone(),
            });
        }
        Ok(self.period)
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Set the verbose flag, returning the previous value.
    pub fn set_verbose(&mut self, verbose: bool) -> bool {
        std::mem::replace(&mut self.verbose, verbose)
    }

    /// Basic unit all registered deadlines are multiples of; 0 while unset.
    pub fn deadline_step(&self) -> u32 {
        self.deadline_step
    }

    /// Define the deadline step.
    ///
    /// # Errors
    /// The step must be a multiple of the server period, and cannot change
    /// once deadlines have been registered.
    pub fn set_deadline_step(&mut self, step: u32) -> Result<(), TaskError> {
        if step != 0 && step % self.server_period != 0 {
            return Err(TaskError::StepNotMultipleOfServerPeriod {
                task: self.name.clone(),
                step,
                server_period: self.server_period,
            });
        }
        if self.deadline_step != 0 && !self.probabilistic_deadlines.is_empty() {
            return Err(TaskError::DeadlineStepReset {
                task: self.name.clone(),
            });
        }
        self.deadline_step = step;
        Ok(())
    }

    /// Register a probabilistic deadline (initial probability 0).
    ///
    /// `deadline` is absolute, in the same time unit as the server period;
    /// the map stores it divided down to deadline-step units.
    ///
    /// # Errors
    /// The step must be set first; the deadline must be one of its
    /// multiples and not already present.
    pub fn insert_deadline(&mut self, deadline: DeadlineUnit) -> Result<(), TaskError> {
        if self.deadline_step == 0 {
            return Err(TaskError::DeadlineStepUnset {
                task: self.name.clone(),
            });
        }
        if deadline % self.deadline_step != 0 {
            return Err(TaskError::DeadlineNotMultiple {
                task: self.name.clone(),
                deadline,
                step: self.deadline_step,
            });
        }
        let key = deadline / self.deadline_step;
        if self.probabilistic_deadlines.contains_key(&key) {
            return Err(TaskError::DuplicateDeadline {
                task: self.name.clone(),
                deadline,
            });
        }
        self.probabilistic_deadlines.insert(key, 0.0);
        Ok(())
    }

    /// The deadline map, keyed by deadline index in deadline-step units.
    pub fn probabilistic_deadlines(&self) -> &DeadlineProbabilityMap {
        &self.probabilistic_deadlines
    }

    /// Mutable access for the solver's map filler.
    pub fn probabilistic_deadlines_mut(&mut self) -> &mut DeadlineProbabilityMap {
        &mut self.probabilistic_deadlines
    }

    /// Probability of meeting `deadline` (absolute, multiple of the step).
    ///
    /// # Errors
    /// The deadline must have been registered.
    pub fn probability(&self, deadline: DeadlineUnit) -> Result<f64, TaskError> {
        if self.deadline_step == 0 {
            return Err(TaskError::DeadlineStepUnset {
                task: self.name.clone(),
            });
        }
        self.probabilistic_deadlines
            .get(&(deadline / self.deadline_step))
            .copied()
            .ok_or_else(|| TaskError::UnknownDeadline {
                task: self.name.clone(),
                deadline,
            })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Pmf;

    fn two_point_computation() -> Pmf {
        Pmf::from_entries(&[(10, 0.5), (40, 0.5)]).unwrap()
    }

    fn sample_task() -> TaskDescriptor {
        TaskDescriptor::periodic("video", two_point_computation(), 160, 10, 40).unwrap()
    }

    #[test]
    fn bandwidth_above_one_is_rejected() {
        let err = TaskDescriptor::periodic("t", two_point_computation(), 160, 50, 40).unwrap_err();
        assert!(matches!(err, TaskError::BandwidthExceeded { .. }));
    }

    #[test]
    fn periodic_task_has_point_mass_interarrival() {
        let task = sample_task();
        assert!(task.is_periodic());
        assert_eq!(task.period().unwrap(), 160);
        assert_eq!(task.interarrival_time().get(160), 1.0);
        assert_eq!(task.interarrival_time().min(), 160);
        assert_eq!(task.interarrival_time().max(), 160);
    }

    #[test]
    fn aperiodic_task_rejects_period_query() {
        let arrivals = Pmf::from_entries(&[(120, 0.5), (200, 0.5)]).unwrap();
        let task =
            TaskDescriptor::aperiodic("ap", two_point_computation(), arrivals, 10, 40).unwrap();
        assert!(!task.is_periodic());
        assert!(matches!(task.period(), Err(TaskError::NotPeriodic { .. })));
    }

    #[test]
    fn deadline_requires_step_first() {
        let mut task = sample_task();
        let err = task.insert_deadline(40).unwrap_err();
        assert!(matches!(err, TaskError::DeadlineStepUnset { .. }));
    }

    #[test]
    fn deadline_step_must_be_multiple_of_server_period() {
        let mut task = sample_task();
        let err = task.set_deadline_step(50).unwrap_err();
        assert!(matches!(
            err,
            TaskError::StepNotMultipleOfServerPeriod { .. }
        ));
        task.set_deadline_step(80).unwrap();
    }

    #[test]
    fn deadline_step_cannot_change_under_existing_deadlines() {
        let mut task = sample_task();
        task.set_deadline_step(40).unwrap();
        task.insert_deadline(40).unwrap();
        let err = task.set_deadline_step(80).unwrap_err();
        assert!(matches!(err, TaskError::DeadlineStepReset { .. }));
    }

    #[test]
    fn deadline_must_be_multiple_of_step() {
        let mut task = sample_task();
        task.set_deadline_step(40).unwrap();
        let err = task.insert_deadline(60).unwrap_err();
        assert!(matches!(err, TaskError::DeadlineNotMultiple { .. }));
    }

    #[test]
    fn duplicate_deadline_is_rejected() {
        let mut task = sample_task();
        task.set_deadline_step(40).unwrap();
        task.insert_deadline(80).unwrap();
        let err = task.insert_deadline(80).unwrap_err();
        assert!(matches!(err, TaskError::DuplicateDeadline { .. }));
    }

    #[test]
    fn probability_lookup_follows_registration() {
        let mut task = sample_task();
        task.set_deadline_step(40).unwrap();
        task.insert_deadline(0).unwrap();
        task.insert_deadline(40).unwrap();
        assert_eq!(task.probability(40).unwrap(), 0.0);
        assert!(matches!(
            task.probability(120),
            Err(TaskError::UnknownDeadline { .. })
        ));
    }
}
