pub mod agent;
pub mod identity;
pub mod needs;

pub use agent::{Agent, Appearance, BodyShape, BotState, Goal, Inventory};
pub use needs::{NeedKind, NeedLevel, Needs};
