//! Real-time state broadcast to observers

pub mod hub;
pub mod protocol;
pub mod server;
pub mod snapshot;

pub use hub::{BroadcastHub, ControlCommand, Observer};
pub use protocol::{BotSpeak, ClientMessage, ResetComplete, ServerMessage};
pub use snapshot::WorldSnapshot;
