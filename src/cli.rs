//! Command line surface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use particle_simulation::Backend;

#[derive(Parser, Debug)]
#[command(name = "particle-compare", version, about = "Compare N-body integration backends")]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// YAML simulation config; flags below override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Worker threads / processes for the parallel backends
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Seed for randomly emitted systems
    #[arg(long, global = true, default_value_t = 0)]
    pub seed: u64,

    /// Skip force contributions between overlapping particles
    #[arg(long, global = true)]
    pub collision_gate: bool,
}

/// Where the initial particles come from
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SystemArgs {
    /// Emit this many random particles
    #[arg(long)]
    pub particles: Option<usize>,

    /// Load particles from a JSON scenario file
    #[arg(long)]
    pub scenario: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one backend and print a summary
    Run {
        #[arg(long, default_value = "verlet-sequential")]
        backend: Backend,
        #[command(flatten)]
        system: SystemArgs,
        #[arg(long, default_value_t = 10.0)]
        max_time: f64,
        #[arg(long, default_value_t = 100)]
        ticks: usize,
        /// Write every snapshot as CSV
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Per-tick divergence of several backends against a reference
    Accuracy {
        #[arg(long, value_delimiter = ',', required = true)]
        backends: Vec<Backend>,
        #[arg(long, default_value = "baseline")]
        reference: Backend,
        #[command(flatten)]
        system: SystemArgs,
        #[arg(long, default_value_t = 10.0)]
        max_time: f64,
        #[arg(long, default_value_t = 100)]
        ticks: usize,
        /// Text report, appended to
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Mean runtime and speedup per backend and particle count
    Runtime {
        /// The first backend is the speedup baseline
        #[arg(long, value_delimiter = ',', required = true)]
        backends: Vec<Backend>,
        #[arg(long, value_delimiter = ',', default_value = "10,50,100")]
        counts: Vec<usize>,
        #[arg(long, default_value_t = 10.0)]
        max_time: f64,
        #[arg(long, default_value_t = 100)]
        ticks: usize,
        #[arg(long, default_value_t = 3)]
        iterations: usize,
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Serve the process-backend worker protocol on stdin/stdout
    #[command(hide = true)]
    Worker,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_lists_and_aliases() {
        let cli = Cli::parse_from([
            "particle-compare",
            "accuracy",
            "--backends",
            "verlet,verlet-threaded",
            "--reference",
            "odeint",
            "--particles",
            "20",
        ]);
        match cli.command {
            Command::Accuracy {
                backends,
                reference,
                system,
                ..
            } => {
                assert_eq!(backends, vec![Backend::VerletSequential, Backend::VerletThreaded]);
                assert_eq!(reference, Backend::Baseline);
                assert_eq!(system.particles, Some(20));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::parse_from([
            "particle-compare",
            "runtime",
            "--backends",
            "verlet-sequential",
            "--workers",
            "3",
            "--collision-gate",
        ]);
        assert_eq!(cli.common.workers, Some(3));
        assert!(cli.common.collision_gate);
        assert!(matches!(cli.command, Command::Runtime { ref counts, .. } if counts == &[10, 50, 100]));
    }

    #[test]
    fn system_source_is_required_and_exclusive() {
        assert!(Cli::try_parse_from(["particle-compare", "run"]).is_err());
        assert!(Cli::try_parse_from([
            "particle-compare",
            "run",
            "--particles",
            "3",
            "--scenario",
            "a.json"
        ])
        .is_err());
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        assert!(Cli::try_parse_from([
            "particle-compare",
            "run",
            "--backend",
            "rk4",
            "--particles",
            "3"
        ])
        .is_err());
    }
}
