//! WhatsApp notification delivery for the Hugli back end.
//!
//! - [`session`]: lifecycle of the single WhatsApp connection (pairing,
//!   bounded reconnect, restart).
//! - [`format`]: rendering of contact forms and orders into message text.
//! - [`delivery`]: dispatch of one message through a ready session.
//! - [`status`]: read-only status report for polling clients.
//! - [`evolution`]: Evolution API bridge transport.

pub mod delivery;
pub mod error;
pub mod evolution;
pub mod format;
pub mod qr;
pub mod session;
pub mod status;

#[cfg(test)]
mod testing;

pub use {
    delivery::{DeliveryGateway, DeliveryResult},
    error::{DeliveryError, FailureKind, SessionError},
    evolution::{EvolutionApi, EvolutionFactory},
    format::{
        ContactForm, CustomerInfo, DeliveryInfo, MessageKind, Order, OrderItem, OutboundMessage,
        Preferences,
    },
    session::{SessionConfig, SessionManager, SessionState, SessionStatus},
    status::{DerivedStatus, StatusReport},
};
