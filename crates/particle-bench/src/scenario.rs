//! Scenario files
//!
//! JSON of the form
//!
//! ```json
//! {"particles": [
//!   {"x_coord": "0", "y_coord": 0, "u_speed": "0", "v_speed": "29780",
//!    "mass": "5.97e24", "color": [0, 0, 255], "life_time": "100"}
//! ]}
//! ```
//!
//! Numbers may be written as JSON numbers or as strings. `color` is accepted
//! for compatibility and ignored; a missing `life_time` means the particle
//! never expires.

use std::path::Path;

use glam::DVec2;
use particle_physics::{Particle, SystemState};
use serde::Deserialize;

use crate::emitter::Emitter;
use crate::error::BenchError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Number {
    Value(f64),
    Text(String),
}

impl Number {
    fn value(&self, field: &str) -> Result<f64, String> {
        let value = match self {
            Number::Value(v) => *v,
            Number::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("{field}: '{s}' is not a number ({e})"))?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(format!("{field}: {value} is not finite"))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScenarioParticle {
    x_coord: Number,
    y_coord: Number,
    u_speed: Number,
    v_speed: Number,
    mass: Number,
    #[serde(default)]
    life_time: Option<Number>,
}

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    particles: Vec<ScenarioParticle>,
}

impl ScenarioParticle {
    fn particle(&self) -> Result<Particle, String> {
        let life_time = match &self.life_time {
            None => None,
            Some(n) => {
                let ticks = n.value("life_time")?;
                if ticks < 0.0 || ticks.fract() != 0.0 || ticks > u32::MAX as f64 {
                    return Err(format!("life_time: {ticks} is not a tick count"));
                }
                Some(ticks as u32)
            }
        };

        let emitter = Emitter {
            position: DVec2::new(self.x_coord.value("x_coord")?, self.y_coord.value("y_coord")?),
            ..Emitter::default()
        };
        let speed = DVec2::new(self.u_speed.value("u_speed")?, self.v_speed.value("v_speed")?);
        Ok(emitter.emit(speed, self.mass.value("mass")?, life_time))
    }
}

/// Parse scenario JSON; `origin` only labels errors
pub fn parse_scenario(text: &str, origin: &Path) -> Result<SystemState, BenchError> {
    let scenario_error = |reason: String| BenchError::Scenario {
        path: origin.to_path_buf(),
        reason,
    };

    let file: ScenarioFile =
        serde_json::from_str(text).map_err(|e| scenario_error(e.to_string()))?;

    let particles = file
        .particles
        .iter()
        .enumerate()
        .map(|(i, p)| p.particle().map_err(|e| scenario_error(format!("particle {i}: {e}"))))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("{}: {} particles", origin.display(), particles.len());
    Ok(SystemState::from_particles(particles)?)
}

pub fn load_scenario(path: &Path) -> Result<SystemState, BenchError> {
    let text = std::fs::read_to_string(path)?;
    parse_scenario(&text, path)
}
