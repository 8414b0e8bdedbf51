pub mod clock;
pub mod controller;
pub mod population;
pub mod social;
pub mod tick;

pub use clock::{Simulation, SimulationLoop};
pub use social::{Milestone, Speech, SpeechSource};
pub use tick::{run_simulation_tick, TickReport};
