use serde::Serialize;

use crate::{
    error::{DeliveryError, FailureKind},
    session::{SessionState, SessionStatus},
};

/// Coarse status shown to polling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedStatus {
    Ready,
    WaitingForScan,
    Initializing,
    Disconnected,
}

/// Status payload served by the HTTP layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub state: SessionState,
    pub is_ready: bool,
    pub has_pairing_challenge: bool,
    pub is_initializing: bool,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub target_address: String,
    pub reconnect_exhausted: bool,
    /// Set when the session needs operator action.
    pub fault: Option<FailureKind>,
    pub fault_detail: Option<String>,
    pub derived_status: DerivedStatus,
}

impl From<&SessionStatus> for StatusReport {
    fn from(s: &SessionStatus) -> Self {
        let derived_status = if s.is_ready() {
            DerivedStatus::Ready
        } else if s.has_pairing_challenge() {
            DerivedStatus::WaitingForScan
        } else if s.is_initializing {
            DerivedStatus::Initializing
        } else {
            DerivedStatus::Disconnected
        };

        let fault = operator_fault(s);
        Self {
            state: s.state,
            is_ready: s.is_ready(),
            has_pairing_challenge: s.has_pairing_challenge(),
            is_initializing: s.is_initializing,
            reconnect_attempts: s.reconnect_attempts,
            max_reconnect_attempts: s.max_reconnect_attempts,
            target_address: s.target_address.clone(),
            reconnect_exhausted: s.reconnect_exhausted(),
            fault: fault.as_ref().map(DeliveryError::kind),
            fault_detail: fault.map(|e| e.to_string()),
            derived_status,
        }
    }
}

/// Conditions automatic recovery will not resolve on its own.
pub fn operator_fault(s: &SessionStatus) -> Option<DeliveryError> {
    if s.reconnect_exhausted() {
        return Some(DeliveryError::ReconnectExhausted {
            attempts: s.reconnect_attempts,
        });
    }
    if !s.is_initializing {
        if let Some(reason) = &s.pairing_failure {
            return Some(DeliveryError::PairingFailed {
                reason: reason.clone(),
            });
        }
    }
    None
}
