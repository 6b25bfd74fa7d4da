//! particle-compare
//!
//! Runs the gravitational N-body backends side by side and reports how far
//! they drift apart and how fast each one is.

mod cli;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Command, CommonArgs, SystemArgs};
use particle_bench::{
    append_accuracy_report, append_runtime_report, compare_accuracy, compare_runtime,
    load_scenario, random_system, write_accuracy_report, write_divergence_csv,
    write_runtime_csv, write_runtime_report, RuntimeRequest,
};
use particle_physics::SystemState;
use particle_simulation::{Simulation, SimulationConfig, Trajectory, WorkerCommand};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        // stdout carries frames from here on; logs stay on stderr
        Command::Worker => {
            particle_simulation::process::serve_stdio().context("worker failed")?;
        }

        Command::Run {
            backend,
            system,
            max_time,
            ticks,
            output,
        } => {
            let simulation = Simulation::new(load_config(&cli.common)?);
            let initial = initial_system(&system, cli.common.seed)?;
            let run = simulation
                .run(&initial, max_time, ticks, backend)
                .with_context(|| format!("{backend} run failed"))?;

            let last = run.trajectory.last().unwrap_or(&initial);
            println!(
                "{backend}: {} ticks in {:.6}s, {} -> {} particles, momentum {:?}",
                run.trajectory.len(),
                run.elapsed_secs,
                initial.len(),
                last.len(),
                last.total_momentum()
            );
            if let Some(path) = output {
                write_trajectory_csv(&path, &run.trajectory)
                    .with_context(|| format!("writing {}", path.display()))?;
                log::info!("Trajectory written to {}", path.display());
            }
        }

        Command::Accuracy {
            backends,
            reference,
            system,
            max_time,
            ticks,
            report,
            csv,
        } => {
            let simulation = Simulation::new(load_config(&cli.common)?);
            let initial = initial_system(&system, cli.common.seed)?;
            let result =
                compare_accuracy(&simulation, &initial, reference, &backends, max_time, ticks)?;

            write_accuracy_report(&mut std::io::stdout().lock(), &result)?;
            if let Some(path) = report {
                append_accuracy_report(&path, &result)
                    .with_context(|| format!("appending to {}", path.display()))?;
            }
            if let Some(path) = csv {
                write_divergence_csv(&path, &result)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
        }

        Command::Runtime {
            backends,
            counts,
            max_time,
            ticks,
            iterations,
            report,
            csv,
        } => {
            let simulation = Simulation::new(load_config(&cli.common)?);
            let request = RuntimeRequest {
                backends,
                particle_counts: counts,
                max_time,
                tick_count: ticks,
                iterations,
                seed: cli.common.seed,
            };
            let result = compare_runtime(&simulation, &request)?;

            write_runtime_report(&mut std::io::stdout().lock(), &result)?;
            if let Some(path) = report {
                append_runtime_report(&path, &result)
                    .with_context(|| format!("appending to {}", path.display()))?;
            }
            if let Some(path) = csv {
                write_runtime_csv(&path, &result)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
        }
    }

    Ok(())
}

fn load_config(common: &CommonArgs) -> Result<SimulationConfig> {
    let mut config = match &common.config {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    // Unless the config names a worker binary, re-enter this executable
    if config.worker_command == WorkerCommand::default() {
        config.worker_command = self_worker_command()?;
    }
    if let Some(workers) = common.workers {
        config.workers = workers;
    }
    if common.collision_gate {
        config.force.collision_gate = true;
    }
    log::debug!("Config: {config:?}");
    Ok(config)
}

fn self_worker_command() -> Result<WorkerCommand> {
    let exe = std::env::current_exe().context("locating the running executable")?;
    Ok(WorkerCommand::new(exe).arg("worker"))
}

fn initial_system(system: &SystemArgs, seed: u64) -> Result<SystemState> {
    match (&system.scenario, system.particles) {
        (Some(path), _) => {
            load_scenario(path).with_context(|| format!("loading scenario {}", path.display()))
        }
        (None, Some(count)) => Ok(random_system(count, seed, true)?),
        (None, None) => bail!("either --particles or --scenario is required"),
    }
}

/// `tick,index,x,y,vx,vy,mass`, one row per particle per snapshot
fn write_trajectory_csv(path: &Path, trajectory: &Trajectory) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "tick,index,x,y,vx,vy,mass")?;
    for (tick, snapshot) in trajectory.iter().enumerate() {
        for (index, record) in snapshot.records().iter().enumerate() {
            let (p, v) = (record.position(), record.velocity());
            writeln!(
                out,
                "{tick},{index},{},{},{},{},{}",
                p.x, p.y, v.x, v.y, record.mass
            )?;
        }
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common(config: Option<std::path::PathBuf>) -> CommonArgs {
        CommonArgs {
            config,
            workers: Some(2),
            seed: 0,
            collision_gate: true,
        }
    }

    #[test]
    fn default_worker_re_enters_this_executable() {
        let config = load_config(&common(None)).unwrap();
        assert_eq!(config.worker_command.program, std::env::current_exe().unwrap());
        assert_eq!(config.worker_command.args, vec!["worker".to_string()]);
        assert_eq!(config.workers, 2);
        assert!(config.force.collision_gate);
    }

    #[test]
    fn configured_worker_is_kept() {
        let path = std::env::temp_dir().join(format!("worker-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "worker_command:\n  program: /opt/bin/particle-worker\n").unwrap();
        let config = load_config(&common(Some(path.clone()))).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            config.worker_command,
            WorkerCommand::new("/opt/bin/particle-worker")
        );
    }
}
