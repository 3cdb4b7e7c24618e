//! Dispatch of one formatted message through the live session.

use {
    serde::Serialize,
    tracing::{error, info, warn},
};

use crate::{
    error::DeliveryError,
    format::{ContactForm, Order, OutboundMessage},
    session::{SessionManager, SessionState},
};

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub success: bool,
    pub external_message_id: String,
    /// Platform address the message was sent to.
    pub recipient: String,
}

/// Sends notifications to the configured target through the session.
#[derive(Clone)]
pub struct DeliveryGateway {
    session: SessionManager,
}

impl DeliveryGateway {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub async fn send_contact(&self, form: ContactForm) -> Result<DeliveryResult, DeliveryError> {
        self.dispatch(&OutboundMessage::ContactForm(form)).await
    }

    pub async fn send_order(&self, order: Order) -> Result<DeliveryResult, DeliveryError> {
        self.dispatch(&OutboundMessage::Order(order)).await
    }

    /// Deliver one message, or fail without buffering it.
    ///
    /// Never waits for the session: anything other than `Ready` fails
    /// immediately with [`DeliveryError::NotReady`] and performs no I/O.
    pub async fn dispatch(&self, message: &OutboundMessage) -> Result<DeliveryResult, DeliveryError> {
        let kind = message.kind();
        let status = self.session.snapshot_status();
        if status.state != SessionState::Ready {
            warn!(?kind, state = %status.state, "WhatsApp service not ready");
            return Err(DeliveryError::NotReady {
                state: status.state,
            });
        }

        let Some(active) = self.session.active_transport() else {
            return Err(DeliveryError::NotReady {
                state: status.state,
            });
        };

        if !active.transport.is_connected() {
            warn!("WhatsApp connection lost, attempting to reconnect");
            self.session
                .report_connection_lost(active.generation, "transport reports disconnected");
            return Err(DeliveryError::ConnectionStale);
        }

        let text = message.render();
        let to = active.transport.resolve_address(&status.target_address);
        info!(?kind, %to, target = %status.target_address, "sending WhatsApp message");

        match active.transport.send_text(&to, &text).await {
            Ok(receipt) => {
                info!(?kind, message_id = %receipt.message_id, to = %receipt.to, "WhatsApp message sent");
                Ok(DeliveryResult {
                    success: true,
                    external_message_id: receipt.message_id,
                    recipient: receipt.to,
                })
            },
            Err(e) => {
                let session_lost = e.is_session_lost();
                error!(?kind, %to, error = %e, session_lost, "error sending WhatsApp message");
                if session_lost {
                    self.session
                        .report_connection_lost(active.generation, e.to_string());
                }
                Err(DeliveryError::DeliveryFailed {
                    reason: e.to_string(),
                    session_lost,
                })
            },
        }
    }
}
