//! # REST API Endpoints
//!
//! Read-only view of the feed server's subscriptions.

use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

/// One open feed subscription.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamListItem {
    pub connection_id: String,
    pub resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// `GET /api/streams`: returns every open subscription.
pub async fn list_streams(State(state): State<AppState>) -> Json<Vec<StreamListItem>> {
    let streams: Vec<StreamListItem> = state
        .streams
        .iter()
        .map(|entry| StreamListItem {
            connection_id: entry.connection_id.clone(),
            resource_id: entry.resource_id.clone(),
            project_id: entry.project_id.clone(),
        })
        .collect();
    Json(streams)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FeedSettings, StreamInfo};

    #[tokio::test]
    async fn lists_registered_streams() {
        let state = AppState::new(FeedSettings::default());
        state.streams.insert(
            "AB12-CD34".into(),
            StreamInfo {
                connection_id: "AB12-CD34".into(),
                resource_id: "svc-1".into(),
                project_id: Some("proj-1".into()),
            },
        );

        let Json(streams) = list_streams(State(state)).await;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].resource_id, "svc-1");
        assert_eq!(
            serde_json::to_value(&streams[0]).unwrap()["projectId"],
            "proj-1"
        );
    }
}
