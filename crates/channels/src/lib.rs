//! Channel transport seam.
//!
//! A messaging platform (the WhatsApp bridge today) implements
//! [`ChannelTransport`] and pushes lifecycle changes as [`TransportEvent`]s.
//! A [`TransportFactory`] hands out a fresh transport for every connection
//! attempt so the session owner never reuses a torn-down resource.

pub mod plugin;

pub use plugin::{
    ChannelHealthSnapshot, ChannelTransport, DisconnectReason, EventSink, SendReceipt,
    TransportError, TransportEvent, TransportFactory,
};
