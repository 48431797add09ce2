//! Dynamic Allocation CLI
//!
//! Solves an allocation problem and prints the optimal policy, or follows
//! the policy forward from one cell and prints its confidence bands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use dynamic_allocation::problem::loader::load_problem;
use dynamic_allocation::report::{policy_rows, quantile_rows, write_rows_to_path};
use dynamic_allocation::{PolicyCell, Problem, Solution, Solver, SolverConfig};

/// Dynamic Allocation - optimal investment strategy per period and wealth
#[derive(Parser)]
#[command(name = "dynamic-allocation")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON problem file (defaults to the built-in ten-year example)
    #[arg(short, long, global = true)]
    problem: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the problem and export the policy
    Solve(SolveArgs),

    /// Propagate the optimal policy from one cell
    Trajectory(TrajectoryArgs),
}

#[derive(Args)]
struct SolveArgs {
    /// Where to write the policy CSV
    #[arg(short, long, default_value = "policy.csv")]
    output: PathBuf,

    /// Print the solution as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct TrajectoryArgs {
    /// Starting period (0-indexed)
    #[arg(long, default_value_t = 0)]
    period: usize,

    /// Starting wealth bin of the problem grid (0-indexed)
    #[arg(long)]
    wealth_index: usize,

    /// Confidence levels of the bands
    #[arg(long, value_delimiter = ',', default_value = "0.5,0.9,0.99")]
    probabilities: Vec<f64>,

    /// Optional CSV output for the bands
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let problem = match &cli.problem {
        Some(path) => load_problem(path)
            .with_context(|| format!("Failed to load problem from {}", path.display()))?,
        None => Problem::default_example(),
    };

    let config = SolverConfig::from_env();
    let solution = Solver::new(config).solve(&problem).context("Solve failed")?;

    match cli.command {
        Commands::Solve(args) => run_solve(&problem, &solution, &args),
        Commands::Trajectory(args) => run_trajectory(&problem, &solution, &args),
    }
}

fn run_solve(problem: &Problem, solution: &Solution, args: &SolveArgs) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(solution)?);
    } else {
        print_policy(problem, solution);
    }

    write_rows_to_path(&args.output, &policy_rows(problem, solution))
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("\nPolicy written to: {}", args.output.display());
    Ok(())
}

fn print_policy(problem: &Problem, solution: &Solution) {
    println!("Dynamic Allocation v{}", env!("CARGO_PKG_VERSION"));
    println!("===========================\n");

    println!("Strategies:");
    for (s, strategy) in problem.strategies.iter().enumerate() {
        println!(
            "  [{}] {:<10} location {:>7.4}  scale {:>7.4}",
            s,
            strategy.name,
            strategy.location(),
            strategy.scale()
        );
    }
    println!();

    // Heat map: wealth down, period across
    print!("{:>12}", "Wealth");
    for p in 0..solution.periods() {
        print!(" {:>3}", p + 1);
    }
    println!();
    println!("{}", "-".repeat(12 + 4 * solution.periods()));

    let by_wealth = solution.policy_by_wealth();
    for (k, row) in by_wealth.iter().enumerate().rev() {
        print!("{:>12.0}", problem.grid.values[k]);
        for cell in row {
            match cell {
                PolicyCell::Determined(s) => print!(" {:>3}", s),
                PolicyCell::Ambiguous => print!(" {:>3}", "?"),
            }
        }
        println!();
    }

    println!("\nSummary:");
    println!("  Periods: {}", solution.periods());
    println!("  Wealth bins: {}", solution.wealth_bins());
    println!("  Extended bins: {}", solution.extended.bins());
    println!("  Ambiguous cells: {}", solution.ambiguous_cells);
}

fn run_trajectory(problem: &Problem, solution: &Solution, args: &TrajectoryArgs) -> Result<()> {
    let trajectory = solution
        .extended
        .trajectories(args.period, args.wealth_index)
        .context("Invalid trajectory seed")?;
    let traces = trajectory
        .quantiles(&args.probabilities, args.period)
        .context("Invalid confidence levels")?;
    let rows = quantile_rows(&solution.extended.grid, &traces);

    println!(
        "Trajectory from period {} at wealth {:.0}",
        args.period + 1,
        problem.grid.values[args.wealth_index]
    );
    println!(
        "{:>6} {:>6} {:>14} {:>14}",
        "Period", "Level", "Lower", "Upper"
    );
    println!("{}", "-".repeat(44));
    for row in &rows {
        println!(
            "{:>6} {:>6.2} {:>14.0} {:>14.0}",
            row.period + 1,
            row.probability,
            row.lower_wealth,
            row.upper_wealth
        );
    }

    if let Some(path) = &args.output {
        write_csv(path, &rows)?;
    }
    Ok(())
}

fn write_csv<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    write_rows_to_path(path, rows).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("\nBands written to: {}", path.display());
    Ok(())
}
