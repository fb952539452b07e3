//! Scenario configuration loading.
//!
//! A scenario file describes a set of tasks to analyse: timing
//! distributions (inline or by file reference), reservation parameters,
//! deadlines, and the solver each task should use:
//!
//! ```yaml
//! tasks:
//!   - name: video_decode
//!     computation: [[10, 0.5], [40, 0.5]]
//!     period: 160
//!     budget: 10
//!     server_period: 40
//!     deadline_step: 40
//!     deadlines: [0, 40, 80, 120, 160, 320]
//!     method: latouche
//!     epsilon: 1.0e-8
//!     max_iter: 2000
//! ```
//!
//! The loader validates each entry, builds the task descriptors and the
//! configured solvers, and reports faults with file context. Distribution
//! file references are resolved relative to the scenario file's directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::distribution::Pmf;
use crate::solver::{Algorithm, ProbabilitySolver};
use crate::task::TaskDescriptor;

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Deserialize)]
struct ScenarioFile {
    tasks: Vec<TaskEntry>,
}

/// Solver selection as spelled in the YAML file.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum MethodEntry {
    #[default]
    Latouche,
    CyclicReduction,
    Companion,
}

impl From<MethodEntry> for Algorithm {
    fn from(entry: MethodEntry) -> Self {
        match entry {
            MethodEntry::Latouche => Algorithm::Latouche,
            MethodEntry::CyclicReduction => Algorithm::CyclicReduction,
            MethodEntry::Companion => Algorithm::Companion,
        }
    }
}

/// Per-task fields as they appear in the YAML file.
///
/// Exactly one of `computation` / `computation_file` must be present, and
/// exactly one of `period` / `interarrival` / `interarrival_file`.
/// Solver tuning fields are optional with the solver's defaults.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TaskEntry {
    name: String,

    computation: Option<Vec<(i64, f64)>>,
    computation_file: Option<PathBuf>,

    period: Option<u32>,
    interarrival: Option<Vec<(i64, f64)>>,
    interarrival_file: Option<PathBuf>,

    budget: u32,
    server_period: u32,

    /// Defaults to the server period.
    deadline_step: Option<u32>,
    deadlines: Vec<u32>,

    #[serde(default)]
    method: MethodEntry,
    epsilon: Option<f64>,
    max_iter: Option<u32>,
    granularity: Option<u32>,
    #[serde(default)]
    compress: bool,
    #[serde(default)]
    shift: bool,
    #[serde(default)]
    verbose: bool,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// One task of a loaded scenario: a solver with its task registered,
/// ready to `solve()`.
pub type ConfiguredSolver = ProbabilitySolver;

/// Load a scenario file and build one configured solver per task.
///
/// # Errors
/// Returns an error when the file cannot be read, the YAML is invalid, a
/// task entry is incoherent (e.g. both a period and an inter-arrival
/// distribution) or a referenced distribution file fails to load.
pub fn load_scenario(path: &Path) -> Result<Vec<ConfiguredSolver>> {
    info!("loading scenario from: {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot open scenario file: {}", path.display()))?;

    let file: ScenarioFile = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse scenario file: {}", path.display()))?;

    if file.tasks.is_empty() {
        bail!("scenario file {} declares no tasks", path.display());
    }

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    // duplicate task names would make the result table ambiguous
    let mut seen: BTreeMap<&str, ()> = BTreeMap::new();
    for entry in &file.tasks {
        if seen.insert(entry.name.as_str(), ()).is_some() {
            bail!("duplicate task name '{}' in scenario", entry.name);
        }
    }

    file.tasks
        .iter()
        .map(|entry| {
            build_solver(entry, base_dir)
                .with_context(|| format!("task '{}' in {}", entry.name, path.display()))
        })
        .collect()
}

fn build_solver(entry: &TaskEntry, base_dir: &Path) -> Result<ConfiguredSolver> {
    let computation = load_distribution(
        entry.computation.as_deref(),
        entry.computation_file.as_deref(),
        base_dir,
        "computation",
    )?;

    let mut task = if let Some(period) = entry.period {
        if entry.interarrival.is_some() || entry.interarrival_file.is_some() {
            bail!("a task is either periodic or carries an inter-arrival distribution, not both");
        }
        TaskDescriptor::periodic(
            entry.name.clone(),
            computation,
            period,
            entry.budget,
            entry.server_period,
        )?
    } else {
        let interarrival = load_distribution(
            entry.interarrival.as_deref(),
            entry.interarrival_file.as_deref(),
            base_dir,
            "inter-arrival",
        )?;
        TaskDescriptor::aperiodic(
            entry.name.clone(),
            computation,
            interarrival,
            entry.budget,
            entry.server_period,
        )?
    };

    task.set_verbose(entry.verbose);
    task.set_deadline_step(entry.deadline_step.unwrap_or(entry.server_period))?;
    for &deadline in &entry.deadlines {
        task.insert_deadline(deadline)?;
    }

    let mut solver = ProbabilitySolver::new(entry.method.into());
    if let Some(epsilon) = entry.epsilon {
        solver.set_epsilon(epsilon);
    }
    if let Some(max_iter) = entry.max_iter {
        solver.set_max_iter(max_iter);
    }
    if let Some(granularity) = entry.granularity {
        solver.set_granularity(granularity);
    }
    if entry.compress {
        solver.set_compress_flag();
    }
    solver.set_shift(entry.shift);

    debug!(task = %entry.name, method = ?entry.method, "task configured");
    solver.register_task(task);
    Ok(solver)
}

/// Build a pmf from inline pairs or a referenced file (exactly one).
fn load_distribution(
    inline: Option<&[(i64, f64)]>,
    file: Option<&Path>,
    base_dir: &Path,
    what: &str,
) -> Result<Pmf> {
    match (inline, file) {
        (Some(entries), None) => {
            Pmf::from_entries(entries).with_context(|| format!("inline {what} distribution"))
        }
        (None, Some(relative)) => {
            let path = if relative.is_absolute() {
                relative.to_path_buf()
            } else {
                base_dir.join(relative)
            };
            Pmf::load(&path)
                .with_context(|| format!("{what} distribution file {}", path.display()))
        }
        (Some(_), Some(_)) => {
            bail!("give the {what} distribution inline or as a file, not both")
        }
        (None, None) => bail!("{what} distribution is required"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
