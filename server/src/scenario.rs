//! # Simulated Deployment
//!
//! The scripted deployment every subscriber is shown: a status change, five
//! pipeline log lines, then completion. Timestamps are stamped when a step
//! is emitted, not when the script is built.

use chrono::{DateTime, SecondsFormat, Utc};
use haifu_protocol::{Envelope, LogLevel, LogLine};
use serde_json::{json, Value};

/// Pipeline stage reported on every simulated log line.
pub const STAGE: &str = "DEPLOY";

const LOG_LINES: [(LogLevel, &str); 5] = [
    (LogLevel::Info, "Starting deployment..."),
    (LogLevel::Info, "Pulling latest image..."),
    (LogLevel::Info, "Creating containers..."),
    (LogLevel::Info, "Starting services..."),
    (LogLevel::Success, "Deployment completed successfully!"),
];

/// One frame of the script.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedStep {
    Status(Value),
    Log(LogLevel, &'static str),
    Complete(Value),
}

impl FeedStep {
    /// The wire envelope for this step as emitted at `at`.
    pub fn envelope(&self, at: DateTime<Utc>) -> Envelope {
        match self {
            FeedStep::Status(data) => Envelope::status(data.clone()),
            FeedStep::Log(level, message) => Envelope::log(&LogLine {
                stage: STAGE.to_string(),
                message: (*message).to_string(),
                timestamp: Some(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
                level: Some(*level),
            }),
            FeedStep::Complete(data) => Envelope::complete(data.clone()),
        }
    }
}

/// The full script for one resource.
pub fn simulated_deployment(resource_id: &str) -> Vec<FeedStep> {
    let mut steps = Vec::with_capacity(LOG_LINES.len() + 2);
    steps.push(FeedStep::Status(json!({ "status": "DEPLOYING" })));
    steps.extend(
        LOG_LINES
            .iter()
            .map(|&(level, message)| FeedStep::Log(level, message)),
    );
    steps.push(FeedStep::Complete(json!({
        "resourceId": resource_id,
        "status": "RUNNING",
        "summary": "Deployment completed successfully. All services are running normally.",
    })));
    steps
}
