//! Bot Habitat - multi-agent life simulation engine

pub mod broadcast;
pub mod core;
pub mod entity;
pub mod nav;
pub mod publish;
pub mod simulation;
pub mod world;
