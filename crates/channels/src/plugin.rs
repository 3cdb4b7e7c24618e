use std::{fmt, sync::Arc};

use {async_trait::async_trait, serde::Serialize, tokio::sync::mpsc};

/// Substrings that mean the platform session went away underneath a call.
const SESSION_LOST_MARKERS: &[&str] = &[
    "Session closed",
    "Execution context was destroyed",
    "Connection Closed",
];

/// Lifecycle notifications pushed by a live transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// An opaque pairing payload the operator must acknowledge out-of-band.
    PairingChallenge(String),
    /// Credentials accepted; the connection is not usable yet.
    Authenticated,
    /// Fully authenticated and able to send.
    Ready,
    /// Pairing was rejected or expired.
    AuthFailure(String),
    Disconnected(DisconnectReason),
}

/// Why a transport reported a disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Administrative teardown. Never triggers automatic recovery.
    Manual,
    Remote(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::Remote(reason) => f.write_str(reason),
        }
    }
}

/// Transport-level failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Http(String),
    #[error("platform returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("transport closed: {0}")]
    Closed(String),
    #[error("unexpected platform response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Whether the failure shows the platform session was invalidated mid-call.
    pub fn is_session_lost(&self) -> bool {
        match self {
            Self::Closed(_) => true,
            // Instance unauthorized or gone on the bridge side.
            Self::Api {
                status: 401 | 404, ..
            } => true,
            other => {
                let text = other.to_string();
                SESSION_LOST_MARKERS.iter().any(|m| text.contains(m))
            },
        }
    }
}

/// Acknowledgement returned by the platform for a sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: String,
    pub to: String,
}

/// Channel used by a transport to report lifecycle events.
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// One connection to a messaging platform.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Begin the authentication handshake. Progress is reported through the
    /// event sink handed to the factory; this returns once the handshake has
    /// been started.
    async fn start(&self) -> Result<(), TransportError>;

    /// Cheap liveness probe of the underlying connection.
    fn is_connected(&self) -> bool;

    /// Platform-specific destination id for a configured target.
    fn resolve_address(&self, target: &str) -> String {
        format!("{target}@c.us")
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<SendReceipt, TransportError>;

    /// Release the connection. Best-effort: callers may ignore the error.
    async fn destroy(&self) -> Result<(), TransportError>;
}

/// Allocates a fresh transport for each connection attempt.
pub trait TransportFactory: Send + Sync {
    fn create(&self, events: EventSink) -> Result<Arc<dyn ChannelTransport>, TransportError>;
}

/// Channel health snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelHealthSnapshot {
    pub channel: String,
    pub connected: bool,
    pub details: Option<String>,
}
