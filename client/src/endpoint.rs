//! Channel identity and connection URL construction.

use crate::error::StreamError;
use url::Url;

/// The `(resource, project)` pair a log stream is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelIdentity {
    pub resource_id: String,
    pub project_id: Option<String>,
}

/// Builds `{base}/ws/deployment/{resource_id}?token=..&projectId=..`.
///
/// The identity is fixed at construction; the token is supplied per call so
/// that each connection attempt can use a freshly read credential.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: Url,
    identity: ChannelIdentity,
}

impl Endpoint {
    pub fn new(
        ws_base_url: &str,
        resource_id: impl Into<String>,
        project_id: Option<String>,
    ) -> Result<Self, StreamError> {
        let resource_id = resource_id.into();
        if resource_id.trim().is_empty() {
            return Err(StreamError::InvalidResourceId);
        }

        let base = Url::parse(ws_base_url)?;
        if !matches!(base.scheme(), "ws" | "wss") {
            return Err(StreamError::InvalidEndpoint(format!(
                "expected a ws:// or wss:// address, got {}",
                base.scheme()
            )));
        }
        if base.cannot_be_a_base() {
            return Err(StreamError::InvalidEndpoint(ws_base_url.to_string()));
        }

        Ok(Self {
            base,
            identity: ChannelIdentity {
                resource_id,
                project_id: project_id.filter(|p| !p.is_empty()),
            },
        })
    }

    pub fn identity(&self) -> &ChannelIdentity {
        &self.identity
    }

    /// Produces the URL for one connection attempt.
    pub fn resolve(&self, token: Option<&str>) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);

        // `new` rejects cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["ws", "deployment", self.identity.resource_id.as_str()]);
        }

        let mut params: Vec<(&str, &str)> = Vec::with_capacity(2);
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            params.push(("token", token));
        }
        if let Some(project_id) = self.identity.project_id.as_deref() {
            params.push(("projectId", project_id));
        }
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        url
    }
}
