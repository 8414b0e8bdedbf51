pub mod config;
pub mod error;
pub mod sundial;
pub mod types;

pub use config::EngineConfig;
pub use sundial::{DayPhase, Sundial};
