//! Observer wire protocol
//!
//! Every frame is a JSON object `{"type": ..., "data": ...}`.

use serde::{Deserialize, Serialize};

use crate::broadcast::snapshot::WorldSnapshot;
use crate::core::error::Result;
use crate::core::types::AgentId;

/// `bot:speak` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSpeak {
    pub agent_id: AgentId,
    pub name: String,
    pub color: String,
    /// Present when the content service persisted the post
    pub post_id: Option<String>,
    pub title: String,
    pub content: String,
    /// Epoch milliseconds, used by clients to measure latency
    pub timestamp: u64,
}

/// `sim:reset:complete` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetComplete {
    pub generation: u64,
    pub agents: usize,
    pub spots: usize,
}

/// Messages sent to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "world:init")]
    WorldInit(WorldSnapshot),
    #[serde(rename = "world:update")]
    WorldUpdate(WorldSnapshot),
    #[serde(rename = "bot:speak")]
    BotSpeak(BotSpeak),
    #[serde(rename = "sim:reset:complete")]
    ResetComplete(ResetComplete),
    #[serde(rename = "sim:speed")]
    Speed { speed: f32 },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::WorldInit(_) => "world:init",
            ServerMessage::WorldUpdate(_) => "world:update",
            ServerMessage::BotSpeak(_) => "bot:speak",
            ServerMessage::ResetComplete(_) => "sim:reset:complete",
            ServerMessage::Speed { .. } => "sim:speed",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Messages accepted from observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "sim:speed")]
    SetSpeed { speed: f32 },
    #[serde(rename = "sim:reset")]
    Reset,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_speed_command() {
        let msg = ClientMessage::parse(r#"{"type":"sim:speed","data":{"speed":4}}"#).unwrap();
        assert_eq!(msg, ClientMessage::SetSpeed { speed: 4.0 });
    }

    #[test]
    fn test_parse_reset_without_data() {
        let msg = ClientMessage::parse(r#"{"type":"sim:reset"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Reset);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(ClientMessage::parse(r#"{"type":"bot:kill","data":{}}"#).is_err());
        assert!(ClientMessage::parse("not json").is_err());
    }

    #[test]
    fn test_server_envelope_shape() {
        let msg = ServerMessage::ResetComplete(ResetComplete {
            generation: 2,
            agents: 5,
            spots: 12,
        });
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "sim:reset:complete");
        assert_eq!(json["data"]["agents"], 5);
        assert_eq!(msg.kind(), "sim:reset:complete");
    }

    #[test]
    fn test_bot_speak_fields() {
        let msg = ServerMessage::BotSpeak(BotSpeak {
            agent_id: AgentId::from_parts(1, 2),
            name: "Tova".into(),
            color: "#2a9d8f".into(),
            post_id: None,
            title: "Thirsty".into(),
            content: "Heading to the creek.".into(),
            timestamp: 1_700_000_000_000,
        });
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "bot:speak");
        assert!(json["data"]["postId"].is_null());
        assert_eq!(json["data"]["agentId"], "00000000-0000-0001-0000-000000000002");
    }
}
