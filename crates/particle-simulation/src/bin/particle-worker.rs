//! Worker process for the multiprocess Verlet backend.
//!
//! Speaks the frame protocol on stdin/stdout; logs go to stderr.

use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match particle_simulation::process::serve_stdio() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("worker failed: {e}");
            ExitCode::FAILURE
        }
    }
}
