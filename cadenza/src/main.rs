/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};

use cadenza::config::load_scenario;
use cadenza::distribution::Pmf;
use cadenza::solver::closed_form::closed_form_pi0;
use cadenza::{Algorithm, ProbabilitySolver, TaskDescriptor};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Steady-state probabilistic deadline analysis for reservation-scheduled
/// tasks.
///
/// Examples:
///   cadenza --latouche -q 10000 -t 20000 -M 10 computation.txt arrivals.txt
///   cadenza --companion -q 10000 -t 20000 -T 80000 computation.txt
///   cadenza --scenario tasks.yaml
#[derive(Debug, Parser)]
#[command(name = "cadenza", about = "Probabilistic deadline analysis", long_about = None)]
struct Cli {
    /// Analyse a whole YAML scenario instead of a single task.
    #[arg(long, conflicts_with_all = ["computation", "interarrival"])]
    scenario: Option<PathBuf>,

    /// Computation time distribution file.
    computation: Option<PathBuf>,

    /// Inter-arrival time distribution file (aperiodic tasks).
    interarrival: Option<PathBuf>,

    /// Reservation budget.
    #[arg(short = 'q', long, default_value_t = 10_000)]
    budget: u32,

    /// Reservation (server) period.
    #[arg(short = 't', long, default_value_t = 20_000)]
    period: u32,

    /// Task period (declares the task periodic).
    #[arg(short = 'T', long)]
    task_period: Option<u32>,

    /// Use the Latouche fixed-point iteration (default when no method is
    /// chosen).
    #[arg(short = 'l', long)]
    latouche: bool,

    /// Use cyclic reduction.
    #[arg(short = 'c', long)]
    cyclic: bool,

    /// Use the companion-form method (periodic tasks only).
    #[arg(short = 'o', long)]
    companion: bool,

    /// Print only the closed-form analytic bound (periodic tasks only).
    #[arg(short = 'a', long)]
    analytic: bool,

    /// Convergence threshold for the fixed-point iteration.
    #[arg(short = 'e', long, default_value_t = 1e-4)]
    epsilon: f64,

    /// Iteration budget for the iterative methods.
    #[arg(short = 'i', long, default_value_t = 100)]
    max_iterations: u32,

    /// Resampling granularity for the computation time.
    #[arg(short = 's', long, default_value_t = 1)]
    step: u32,

    /// Largest deadline to evaluate, in server periods.
    #[arg(short = 'M', long, default_value_t = 10)]
    max_deadline: u32,

    /// Collapse the backlog states below the minimum inter-arrival time.
    #[arg(short = 'm', long)]
    compress: bool,

    /// Enable the drift-based shift of cyclic reduction.
    #[arg(long)]
    shift: bool,

    /// Verbose solver diagnostics.
    #[arg(short = 'v', long)]
    verbose: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(scenario) = &cli.scenario {
        return run_scenario(scenario);
    }

    let chosen =
        cli.latouche as u8 + cli.cyclic as u8 + cli.companion as u8 + cli.analytic as u8;
    if chosen > 1 {
        bail!("ambiguous choice of the algorithm");
    }

    let computation_path = cli
        .computation
        .as_ref()
        .context("a computation time distribution file is required")?;
    let computation = Pmf::load(computation_path)
        .with_context(|| format!("loading {}", computation_path.display()))?;

    if cli.analytic {
        return run_analytic(&cli, &computation);
    }

    let algorithm = if cli.cyclic {
        Algorithm::CyclicReduction
    } else if cli.companion {
        Algorithm::Companion
    } else {
        Algorithm::Latouche
    };

    // build the descriptor: periodic when a task period is given, otherwise
    // an inter-arrival distribution file is required
    let mut task = match (cli.task_period, &cli.interarrival) {
        (Some(task_period), None) => TaskDescriptor::periodic(
            "task",
            computation,
            task_period,
            cli.budget,
            cli.period,
        )?,
        (None, Some(interarrival_path)) => {
            let interarrival = Pmf::load(interarrival_path)
                .with_context(|| format!("loading {}", interarrival_path.display()))?;
            TaskDescriptor::aperiodic("task", computation, interarrival, cli.budget, cli.period)?
        }
        (Some(_), Some(_)) => bail!("give a task period or an inter-arrival file, not both"),
        (None, None) => bail!("either a task period or an inter-arrival file is required"),
    };
    task.set_verbose(cli.verbose);
    task.set_deadline_step(cli.period)?;
    for delta in 0..=cli.max_deadline {
        task.insert_deadline(delta * cli.period)?;
    }

    let mut solver = ProbabilitySolver::new(algorithm);
    solver.set_epsilon(cli.epsilon);
    solver.set_max_iter(cli.max_iterations);
    solver.set_granularity(cli.step);
    solver.set_shift(cli.shift);
    if cli.compress {
        solver.set_compress_flag();
    }
    solver.register_task(task);

    let start = Instant::now();
    solver.solve()?;
    let elapsed = start.elapsed();

    let task = solver
        .task()
        .context("solver lost its task after solving")?;
    print_deadline_table(task);
    info!(elapsed_us = elapsed.as_micros() as u64, "solve finished");
    Ok(())
}

fn run_analytic(cli: &Cli, computation: &Pmf) -> Result<()> {
    let task_period = cli
        .task_period
        .context("the analytic bound applies to periodic tasks: set --task-period")?;
    let n_ratio = task_period / cli.period;
    let coarse = computation.resample(cli.step)?;
    let start = Instant::now();
    let pi0 = closed_form_pi0(&coarse, n_ratio, (cli.budget / cli.step.max(1)) as i64)?;
    let elapsed = start.elapsed();
    println!("P{{d < {task_period}}} {pi0}");
    info!(elapsed_us = elapsed.as_micros() as u64, "analytic bound finished");
    Ok(())
}

fn run_scenario(path: &PathBuf) -> Result<()> {
    let mut solvers = load_scenario(path)?;
    let start = Instant::now();
    for solver in &mut solvers {
        solver.solve().with_context(|| {
            format!(
                "solving task '{}'",
                solver.task().map(|t| t.name().to_string()).unwrap_or_default()
            )
        })?;
        if let Some(task) = solver.task() {
            println!("task {}", task.name());
            print_deadline_table(task);
        }
    }
    info!(
        tasks = solvers.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "scenario finished"
    );
    Ok(())
}

fn print_deadline_table(task: &TaskDescriptor) {
    let step = task.deadline_step();
    for (&key, &probability) in task.probabilistic_deadlines() {
        println!("P{{d < {}}} {probability}", key * step);
    }
}
