//! # Subscriber Messages
//!
//! The feed itself is made of [`Envelope`] frames from `haifu-protocol`.
//! Subscribers may also talk back; the only message the server understands
//! is a heartbeat `{"type": "ping"}`, answered with `{"type": "pong"}`.
//! Anything else is logged and ignored.

use haifu_protocol::Envelope;
use serde::{Deserialize, Serialize};

/// Messages a subscriber may send.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    #[serde(other)]
    Other,
}

/// Heartbeat replies sent by the server.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlReply {
    Pong,
}

/// Everything queued on a subscriber's outbound channel.
#[derive(Debug, Serialize, Clone)]
#[serde(untagged)]
pub enum Outbound {
    Feed(Envelope),
    Control(ControlReply),
}
