//! Report writers
//!
//! Text reports are appended to a log file, one block per comparison. CSV
//! files are rewritten each time and hold plot-ready columns.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::accuracy::AccuracyReport;
use crate::error::{BackendFailure, BenchError};
use crate::runtime::RuntimeReport;

fn write_failures<W: Write>(out: &mut W, failures: &[BackendFailure]) -> std::io::Result<()> {
    for failure in failures {
        match failure.particle_count {
            Some(count) => writeln!(
                out,
                "Failed: {} ({} particles): {}",
                failure.backend, count, failure.reason
            )?,
            None => writeln!(out, "Failed: {}: {}", failure.backend, failure.reason)?,
        }
    }
    Ok(())
}

pub fn write_accuracy_report<W: Write>(out: &mut W, report: &AccuracyReport) -> std::io::Result<()> {
    write!(out, "Execution time: {}={:.6}s", report.reference, report.reference_secs)?;
    for run in &report.runs {
        write!(out, ", {}={:.6}s", run.backend, run.elapsed_secs)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "Reference: {}, particles: {}, max time: {}, delta_t: {}, tick count: {}",
        report.reference, report.particle_count, report.max_time, report.dt, report.tick_count
    )?;
    for run in &report.runs {
        writeln!(
            out,
            "{}: mean divergence {:e}, max divergence {:e}",
            run.backend,
            run.mean_divergence(),
            run.max_divergence()
        )?;
        writeln!(out, "{}: {:?}", run.backend, run.divergence)?;
    }
    write_failures(out, &report.failures)?;
    writeln!(out)
}

pub fn write_runtime_report<W: Write>(out: &mut W, report: &RuntimeReport) -> std::io::Result<()> {
    writeln!(
        out,
        "Runtime: max time: {}, tick count: {}, iterations: {}, baseline: {}",
        report.max_time,
        report.tick_count,
        report.iterations,
        report.baseline()
    )?;

    write!(out, "{:<22}", "particles")?;
    for count in &report.particle_counts {
        write!(out, "{count:>14}")?;
    }
    writeln!(out)?;

    let speedups = report.speedups();
    for (b, backend) in report.backends.iter().enumerate() {
        write!(out, "{:<22}", format!("{backend} [s]"))?;
        for mean in &report.mean_secs[b] {
            match mean {
                Some(secs) => write!(out, "{secs:>14.6}")?,
                None => write!(out, "{:>14}", "failed")?,
            }
        }
        writeln!(out)?;

        write!(out, "{:<22}", format!("{backend} [x]"))?;
        for speedup in &speedups[b] {
            match speedup {
                Some(x) => write!(out, "{x:>14.3}")?,
                None => write!(out, "{:>14}", "-")?,
            }
        }
        writeln!(out)?;
    }
    write_failures(out, &report.failures)?;
    writeln!(out)
}

fn append(path: &Path) -> Result<BufWriter<File>, BenchError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

pub fn append_accuracy_report(path: &Path, report: &AccuracyReport) -> Result<(), BenchError> {
    let mut out = append(path)?;
    write_accuracy_report(&mut out, report)?;
    out.flush()?;
    Ok(())
}

pub fn append_runtime_report(path: &Path, report: &RuntimeReport) -> Result<(), BenchError> {
    let mut out = append(path)?;
    write_runtime_report(&mut out, report)?;
    out.flush()?;
    Ok(())
}

/// `tick,<backend>,...` with one row per tick
pub fn write_divergence_csv(path: &Path, report: &AccuracyReport) -> Result<(), BenchError> {
    let mut out = BufWriter::new(File::create(path)?);

    write!(out, "tick")?;
    for run in &report.runs {
        write!(out, ",{}", run.backend)?;
    }
    writeln!(out)?;

    let ticks = report.runs.iter().map(|r| r.divergence.len()).max().unwrap_or(0);
    for tick in 0..ticks {
        write!(out, "{tick}")?;
        for run in &report.runs {
            match run.divergence.get(tick) {
                Some(d) => write!(out, ",{d:e}")?,
                None => write!(out, ",")?,
            }
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

/// `backend,particles,mean_secs,speedup`; failed cells are left empty
pub fn write_runtime_csv(path: &Path, report: &RuntimeReport) -> Result<(), BenchError> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "backend,particles,mean_secs,speedup")?;

    let speedups = report.speedups();
    for (b, backend) in report.backends.iter().enumerate() {
        for (c, count) in report.particle_counts.iter().enumerate() {
            let mean = report.mean_secs[b][c].map(|s| format!("{s:.9}")).unwrap_or_default();
            let speedup = speedups[b][c].map(|x| format!("{x:.6}")).unwrap_or_default();
            writeln!(out, "{backend},{count},{mean},{speedup}")?;
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accuracy::AccuracyRun;
    use particle_simulation::Backend;

    fn accuracy() -> AccuracyReport {
        AccuracyReport {
            reference: Backend::Baseline,
            reference_secs: 1.5,
            particle_count: 3,
            max_time: 10.0,
            tick_count: 3,
            dt: 10.0 / 3.0,
            runs: vec![AccuracyRun {
                backend: Backend::VerletSequential,
                elapsed_secs: 0.25,
                divergence: vec![0.0, 0.5, 1.0],
            }],
            failures: vec![BackendFailure {
                backend: Backend::VerletGpu,
                particle_count: None,
                reason: "no adapter".into(),
            }],
        }
    }

    #[test]
    fn accuracy_report_lists_times_series_and_failures() {
        let mut out = Vec::new();
        write_accuracy_report(&mut out, &accuracy()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("Execution time: baseline=1.500000s, verlet-sequential=0.250000s"));
        assert!(text.contains("tick count: 3"));
        assert!(text.contains("verlet-sequential: mean divergence 5e-1"));
        assert!(text.contains("verlet-sequential: [0.0, 0.5, 1.0]"));
        assert!(text.contains("Failed: verlet-gpu: no adapter"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn runtime_report_marks_failed_cells() {
        let report = RuntimeReport {
            backends: vec![Backend::VerletSequential, Backend::VerletThreaded],
            particle_counts: vec![10, 50],
            max_time: 1.0,
            tick_count: 5,
            iterations: 2,
            mean_secs: vec![vec![Some(0.2), Some(0.4)], vec![Some(0.1), None]],
            failures: Vec::new(),
        };
        let mut out = Vec::new();
        write_runtime_report(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("baseline: verlet-sequential"));
        assert!(text.contains("failed"));
        assert!(text.contains("2.000"));
    }
}
