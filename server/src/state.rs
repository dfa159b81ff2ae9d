//! # Server State
//!
//! Shared state for the feed server:
//! - **Stream registry**: one entry per open `/ws/deployment/...` socket,
//!   keyed by connection ID
//! - **Feed settings**: pacing and the optional token every subscriber
//!   must present
//!
//! The registry is a [`DashMap`] because every socket task inserts and
//! removes its own entry concurrently.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Default pause between two frames of the simulated deployment.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_secs(1);

/// Generates a short, human-readable connection ID from a UUID.
///
/// Format: "XXXX-XXXX" (8 uppercase hex characters split by a hyphen).
pub fn generate_connection_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}-{}", uuid[..4].to_uppercase(), uuid[4..8].to_uppercase())
}

/// One live subscription to a resource's deployment feed.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub connection_id: String,
    pub resource_id: String,
    pub project_id: Option<String>,
}

/// How the feed is replayed to subscribers.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Pause between consecutive frames.
    pub frame_interval: Duration,
    /// When set, subscribers must pass this value as `?token=`.
    pub required_token: Option<String>,
}

impl FeedSettings {
    /// Whether a subscriber presenting `token` may receive the feed.
    pub fn accepts(&self, token: Option<&str>) -> bool {
        match &self.required_token {
            Some(required) => token == Some(required.as_str()),
            None => true,
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
            required_token: None,
        }
    }
}

/// Shared application state, cloned into each request handler.
#[derive(Clone)]
pub struct AppState {
    /// Open feed subscriptions, keyed by connection ID.
    pub streams: Arc<DashMap<String, StreamInfo>>,
    pub feed: Arc<FeedSettings>,
}

impl AppState {
    pub fn new(feed: FeedSettings) -> Self {
        Self {
            streams: Arc::new(DashMap::new()),
            feed: Arc::new(feed),
        }
    }
}
