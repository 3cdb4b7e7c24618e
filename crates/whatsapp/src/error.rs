use serde::Serialize;

use crate::session::SessionState;

/// Why a dispatch did not produce a delivered message.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliveryError {
    #[error("WhatsApp client is not ready (state: {state}). Please wait for QR code scan.")]
    NotReady { state: SessionState },
    #[error("WhatsApp connection lost. Attempting to reconnect...")]
    ConnectionStale,
    #[error("WhatsApp delivery failed: {reason}")]
    DeliveryFailed { reason: String, session_lost: bool },
    #[error("WhatsApp pairing failed: {reason}")]
    PairingFailed { reason: String },
    #[error("WhatsApp reconnection attempts exhausted ({attempts}); restart required")]
    ReconnectExhausted { attempts: u32 },
}

/// Serializable discriminant of [`DeliveryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotReady,
    ConnectionStale,
    DeliveryFailed,
    PairingFailed,
    ReconnectExhausted,
}

impl DeliveryError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotReady { .. } => FailureKind::NotReady,
            Self::ConnectionStale => FailureKind::ConnectionStale,
            Self::DeliveryFailed { .. } => FailureKind::DeliveryFailed,
            Self::PairingFailed { .. } => FailureKind::PairingFailed,
            Self::ReconnectExhausted { .. } => FailureKind::ReconnectExhausted,
        }
    }

    /// The caller should surface this as "temporarily unavailable" and retry
    /// later rather than treating it as a hard failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotReady { .. } | Self::ConnectionStale)
    }
}

/// Errors from the session control surface itself.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session manager has stopped")]
    Stopped,
    #[error("teardown of previous connection failed: {0}")]
    Teardown(#[from] hugli_channels::TransportError),
}
