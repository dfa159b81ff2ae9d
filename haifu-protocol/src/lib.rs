//! # Deployment Log Feed Protocol
//!
//! Defines the JSON envelope exchanged over `/ws/deployment/{resource_id}`.
//! Every server → client text frame is an object of the form
//! `{"type": "...", "data": ...}`. Only `log` frames carry a known payload
//! shape; `status`, `error` and `complete` payloads are opaque JSON.
//!
//! This crate is shared by the stream client and the development feed
//! server, so both sides serialize the exact same shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ─── Frame Kinds ────────────────────────────────────────────────

/// The `type` tag of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// A single pipeline log line.
    Log,
    /// A deployment status change.
    Status,
    /// A server-side failure report.
    Error,
    /// The pipeline finished.
    Complete,
}

impl FrameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Log => "log",
            FrameKind::Status => "status",
            FrameKind::Error => "error",
            FrameKind::Complete => "complete",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Log Payload ────────────────────────────────────────────────

/// Severity of a log line. Serialized in upper case (`"INFO"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
    Success,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Success => "SUCCESS",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `data` of a `log` envelope as it appears on the wire.
///
/// `timestamp` is an ISO-8601 string and `level` may be omitted; receivers
/// apply their own defaults (receipt time and [`LogLevel::Info`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub stage: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
}

// ─── Envelope ───────────────────────────────────────────────────

/// The `{type, data}` wrapper around every inbound frame.
///
/// A missing `data` field decodes as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: FrameKind, data: Value) -> Self {
        Self { kind, data }
    }

    /// Wraps a log line. Serializing a `LogLine` cannot fail, so the
    /// fallback to `null` is never taken in practice.
    pub fn log(line: &LogLine) -> Self {
        Self::new(
            FrameKind::Log,
            serde_json::to_value(line).unwrap_or(Value::Null),
        )
    }

    pub fn status(data: Value) -> Self {
        Self::new(FrameKind::Status, data)
    }

    pub fn error(data: Value) -> Self {
        Self::new(FrameKind::Error, data)
    }

    pub fn complete(data: Value) -> Self {
        Self::new(FrameKind::Complete, data)
    }

    /// Parses a text frame into an envelope.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serializes the envelope into a text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Interprets `data` as a [`LogLine`]. Only meaningful for `log` frames.
    pub fn log_line(&self) -> Result<LogLine, serde_json::Error> {
        LogLine::deserialize(&self.data)
    }
}
