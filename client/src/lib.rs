//! # hAIfu Deployment Log Stream
//!
//! Client for the live deployment-log channel of a hAIfu resource.
//!
//! A [`LogStreamClient`] is bound to one `(resource, project)` pair. It opens
//! a WebSocket to `<base>/ws/deployment/<resource>?token=..&projectId=..`,
//! decodes every text frame into a [`DeploymentEvent`], fans events out to
//! registered observers, and reconnects with exponential backoff after an
//! unexpected close.
//!
//! ```no_run
//! use haifu_logstream::{LogStreamClient, StaticCredential, StreamConfig};
//!
//! # async fn demo() -> Result<(), haifu_logstream::StreamError> {
//! let client = LogStreamClient::new(
//!     StreamConfig::from_env(),
//!     "svc-42",
//!     Some("proj-7".to_string()),
//!     StaticCredential::new(Some("jwt".to_string())),
//! )?;
//! client.on_message(|event| println!("{:?}", event));
//! client.connect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod observers;
pub mod transport;

pub use client::{ConnectionState, LogStreamClient};
pub use config::{ReconnectPolicy, StreamConfig};
pub use credentials::{CredentialStore, StaticCredential, TokenStorage};
pub use endpoint::{ChannelIdentity, Endpoint};
pub use error::{CredentialError, FrameError, StreamError, TransportError};
pub use events::{DeploymentEvent, LogEvent};
pub use haifu_protocol::{FrameKind, LogLevel};
pub use observers::{ObserverKind, Subscription};
pub use transport::{Connection, Connector, WsConnector};
