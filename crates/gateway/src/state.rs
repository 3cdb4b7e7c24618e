use std::sync::Arc;

use {
    hugli_config::IpRestrictionConfig,
    hugli_whatsapp::{DeliveryGateway, SessionManager},
};

use crate::store::NotificationStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NotificationStore>,
    pub delivery: DeliveryGateway,
    pub ip_restriction: Arc<IpRestrictionConfig>,
    pub version: &'static str,
}

impl AppState {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        delivery: DeliveryGateway,
        ip_restriction: IpRestrictionConfig,
    ) -> Self {
        Self {
            store,
            delivery,
            ip_restriction: Arc::new(ip_restriction),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn session(&self) -> &SessionManager {
        self.delivery.session()
    }
}
