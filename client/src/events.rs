//! # Deployment Events
//!
//! Strongly-typed form of the inbound envelopes. Decoding applies the
//! receiver-side defaults: a log line without a timestamp is stamped with
//! the receipt time, and a missing level means [`LogLevel::Info`].

use crate::error::FrameError;
use chrono::{DateTime, NaiveDateTime, Utc};
use haifu_protocol::{Envelope, FrameKind, LogLevel};
use serde_json::Value;
use tracing::debug;

/// One pipeline log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub stage: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
}

/// An event delivered to message observers.
#[derive(Debug, Clone, PartialEq)]
pub enum DeploymentEvent {
    Log(LogEvent),
    Status(Value),
    Error(Value),
    Complete(Value),
}

impl DeploymentEvent {
    /// Decodes a text frame. `received_at` stands in for a missing or
    /// unreadable log timestamp.
    pub fn decode(text: &str, received_at: DateTime<Utc>) -> Result<Self, FrameError> {
        let envelope = Envelope::from_json(text).map_err(FrameError::Envelope)?;

        Ok(match envelope.kind {
            FrameKind::Log => {
                let line = envelope.log_line().map_err(FrameError::LogPayload)?;
                DeploymentEvent::Log(LogEvent {
                    stage: line.stage,
                    message: line.message,
                    timestamp: parse_timestamp(line.timestamp.as_deref(), received_at),
                    level: line.level.unwrap_or_default(),
                })
            }
            FrameKind::Status => DeploymentEvent::Status(envelope.data),
            FrameKind::Error => DeploymentEvent::Error(envelope.data),
            FrameKind::Complete => DeploymentEvent::Complete(envelope.data),
        })
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            DeploymentEvent::Log(_) => FrameKind::Log,
            DeploymentEvent::Status(_) => FrameKind::Status,
            DeploymentEvent::Error(_) => FrameKind::Error,
            DeploymentEvent::Complete(_) => FrameKind::Complete,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, DeploymentEvent::Complete(_))
    }
}

/// RFC 3339 first, then an offset-less ISO-8601 value read as UTC.
fn parse_timestamp(raw: Option<&str>, received_at: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return received_at;
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.and_utc();
    }

    debug!("Unreadable log timestamp {:?}, using receipt time", raw);
    received_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn received() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 5, 6, 7, 8, 9).unwrap()
    }

    #[test]
    fn decodes_full_log_frame() {
        let event = DeploymentEvent::decode(
            r#"{"type":"log","data":{"stage":"BUILD","message":"Installing deps","timestamp":"2024-01-01T00:00:00Z","level":"WARN"}}"#,
            received(),
        )
        .unwrap();

        assert_eq!(
            event,
            DeploymentEvent::Log(LogEvent {
                stage: "BUILD".into(),
                message: "Installing deps".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                level: LogLevel::Warn,
            })
        );
    }

    #[test]
    fn log_defaults_apply() {
        let event = DeploymentEvent::decode(
            r#"{"type":"log","data":{"stage":"DEPLOY","message":"ok"}}"#,
            received(),
        )
        .unwrap();

        let DeploymentEvent::Log(log) = event else {
            panic!("expected a log event");
        };
        assert_eq!(log.level, LogLevel::Info);
        assert_eq!(log.timestamp, received());
    }

    #[test]
    fn naive_and_garbage_timestamps() {
        let naive = parse_timestamp(Some("2024-03-04T05:06:07.250"), received());
        assert_eq!(naive.timestamp_millis(), 1_709_528_767_250);

        let offset = parse_timestamp(Some("2024-03-04T14:06:07+09:00"), received());
        assert_eq!(offset, Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap());

        assert_eq!(parse_timestamp(Some("yesterday"), received()), received());
    }

    #[test]
    fn opaque_payloads_pass_through() {
        let event = DeploymentEvent::decode(
            r#"{"type":"status","data":{"status":"RUNNING","url":"https://svc.example"}}"#,
            received(),
        )
        .unwrap();
        assert_eq!(
            event,
            DeploymentEvent::Status(json!({"status": "RUNNING", "url": "https://svc.example"}))
        );
        assert_eq!(event.kind(), FrameKind::Status);

        let done = DeploymentEvent::decode(r#"{"type":"complete"}"#, received()).unwrap();
        assert!(done.is_complete());
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(
            DeploymentEvent::decode("{not json", received()),
            Err(FrameError::Envelope(_))
        ));
        assert!(matches!(
            DeploymentEvent::decode(r#"{"type":"log","data":"hello"}"#, received()),
            Err(FrameError::LogPayload(_))
        ));
        assert!(matches!(
            DeploymentEvent::decode(r#"{"type":"shout","data":{}}"#, received()),
            Err(FrameError::Envelope(_))
        ));
    }
}
