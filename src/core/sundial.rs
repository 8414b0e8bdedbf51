//! Sundial - simulated time of day
//!
//! Tracks elapsed simulated seconds and exposes the day phase and the sun
//! position that observers render as the sundial anchor.

use serde::{Deserialize, Serialize};

use crate::core::types::Vec3;

/// Phase of the simulated day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPhase {
    Dawn,  // 0.20-0.30
    Day,   // 0.30-0.70
    Dusk,  // 0.70-0.80
    Night, // 0.80-0.20
}

impl DayPhase {
    pub fn from_time_of_day(t: f32) -> Self {
        match t {
            t if (0.20..0.30).contains(&t) => DayPhase::Dawn,
            t if (0.30..0.70).contains(&t) => DayPhase::Day,
            t if (0.70..0.80).contains(&t) => DayPhase::Dusk,
            _ => DayPhase::Night,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sundial {
    elapsed_secs: f64,
    day_length_secs: f32,
}

impl Sundial {
    /// Starts at dawn so the first minutes of a fresh world are lit
    pub fn new(day_length_secs: f32) -> Self {
        Self {
            elapsed_secs: day_length_secs as f64 * 0.25,
            day_length_secs: day_length_secs.max(1.0),
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.elapsed_secs += dt as f64;
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn day(&self) -> u64 {
        (self.elapsed_secs / self.day_length_secs as f64) as u64
    }

    /// Fraction of the current day in [0, 1); 0.5 is noon
    pub fn time_of_day(&self) -> f32 {
        let day = self.day_length_secs as f64;
        ((self.elapsed_secs % day) / day) as f32
    }

    pub fn phase(&self) -> DayPhase {
        DayPhase::from_time_of_day(self.time_of_day())
    }

    pub fn is_night(&self) -> bool {
        self.phase() == DayPhase::Night
    }

    /// Sun position on an arc over the ground disc
    ///
    /// Rises in +x at 0.25, peaks overhead at 0.5, sets in -x at 0.75 and
    /// stays below the horizon (negative y) at night.
    pub fn sun_position(&self, radius: f32) -> Vec3 {
        let angle = (self.time_of_day() - 0.25) * std::f32::consts::TAU;
        Vec3::new(radius * angle.cos(), radius * angle.sin(), radius * 0.25)
    }
}

impl Default for Sundial {
    fn default() -> Self {
        Self::new(240.0)
    }
}
