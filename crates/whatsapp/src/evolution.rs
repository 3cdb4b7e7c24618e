//! WhatsApp bridge transport backed by an Evolution API instance.
//!
//! The bridge owns the actual WhatsApp Web connection. A transport created
//! here makes sure the named instance exists, then polls its connection
//! state and turns what it sees into [`TransportEvent`]s: a changed pairing
//! code while the instance is unlinked, `Authenticated` + `Ready` once it
//! opens, and a remote disconnect when an open instance drops or the bridge
//! becomes unreachable.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    hugli_channels::{
        ChannelTransport, DisconnectReason, EventSink, SendReceipt, TransportError, TransportEvent,
        TransportFactory,
    },
    hugli_config::BridgeConfig,
    reqwest::{Method, RequestBuilder},
    secrecy::{ExposeSecret, Secret},
    serde::{
        Deserialize,
        de::{DeserializeOwned, IgnoredAny},
    },
    serde_json::json,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection state of a bridge instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Connecting,
    Close,
}

impl ConnectionState {
    fn parse(raw: &str) -> Self {
        match raw {
            "open" => Self::Open,
            "connecting" => Self::Connecting,
            _ => Self::Close,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Connecting => "connecting",
            Self::Close => "close",
        })
    }
}

#[derive(Deserialize)]
struct StateResponse {
    instance: StateInstance,
}

#[derive(Deserialize)]
struct StateInstance {
    state: String,
}

#[derive(Deserialize)]
struct ConnectResponse {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Deserialize)]
struct SendResponse {
    key: MessageKey,
}

#[derive(Deserialize)]
struct MessageKey {
    id: String,
}

/// Client for the Evolution API endpoints used by the session.
pub struct EvolutionApi {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<Secret<String>>,
    instance: String,
}

impl fmt::Debug for EvolutionApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvolutionApi")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("instance", &self.instance)
            .finish()
    }
}

impl EvolutionApi {
    pub fn new(config: &BridgeConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().map(Secret::new),
            instance: config.instance.clone(),
        })
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.api_key {
            Some(key) => req.header("apikey", key.expose_secret()),
            None => req,
        }
    }

    async fn call<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, TransportError> {
        let resp = req
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Create the instance. An instance that already exists is not an error.
    pub async fn create_instance(&self) -> Result<(), TransportError> {
        let req = self.request(Method::POST, "/instance/create").json(&json!({
            "instanceName": self.instance,
            "qrcode": true,
            "integration": "WHATSAPP-BAILEYS",
        }));
        match self.call::<IgnoredAny>(req).await {
            Ok(_) => {
                info!(instance = %self.instance, "bridge instance created");
                Ok(())
            },
            Err(TransportError::Api {
                status: 403 | 409, ..
            }) => {
                debug!(instance = %self.instance, "bridge instance already exists");
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    pub async fn connection_state(&self) -> Result<ConnectionState, TransportError> {
        let path = format!("/instance/connectionState/{}", self.instance);
        let resp: StateResponse = self.call(self.request(Method::GET, &path)).await?;
        Ok(ConnectionState::parse(&resp.instance.state))
    }

    /// Current pairing payload, if the instance is waiting to be linked.
    pub async fn connect_code(&self) -> Result<Option<String>, TransportError> {
        let path = format!("/instance/connect/{}", self.instance);
        let resp: ConnectResponse = self.call(self.request(Method::GET, &path)).await?;
        Ok(resp.code.filter(|c| !c.is_empty()))
    }

    /// Send a text message and return the platform message id.
    pub async fn send_text(&self, number: &str, text: &str) -> Result<String, TransportError> {
        let path = format!("/message/sendText/{}", self.instance);
        let req = self
            .request(Method::POST, &path)
            .json(&json!({ "number": number, "text": text }));
        let resp: SendResponse = self.call(req).await?;
        Ok(resp.key.id)
    }

    /// Unlink the instance from its WhatsApp account.
    pub async fn logout(&self) -> Result<(), TransportError> {
        let path = format!("/instance/logout/{}", self.instance);
        self.call::<IgnoredAny>(self.request(Method::DELETE, &path))
            .await?;
        info!(instance = %self.instance, "bridge instance logged out");
        Ok(())
    }
}

/// Hands out one [`EvolutionTransport`] per connection attempt.
#[derive(Debug)]
pub struct EvolutionFactory {
    api: Arc<EvolutionApi>,
    poll_interval: Duration,
}

impl EvolutionFactory {
    pub fn new(config: &BridgeConfig) -> Result<Self, TransportError> {
        Ok(Self {
            api: Arc::new(EvolutionApi::new(config)?),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        })
    }

    pub fn api(&self) -> &EvolutionApi {
        &self.api
    }
}

impl TransportFactory for EvolutionFactory {
    fn create(&self, events: EventSink) -> Result<Arc<dyn ChannelTransport>, TransportError> {
        Ok(Arc::new(EvolutionTransport {
            api: Arc::clone(&self.api),
            events,
            connected: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            poll_interval: self.poll_interval,
        }))
    }
}

pub struct EvolutionTransport {
    api: Arc<EvolutionApi>,
    events: EventSink,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    poll_interval: Duration,
}

#[async_trait]
impl ChannelTransport for EvolutionTransport {
    async fn start(&self) -> Result<(), TransportError> {
        self.api.create_instance().await?;

        let poller = Poller {
            api: Arc::clone(&self.api),
            events: self.events.clone(),
            connected: Arc::clone(&self.connected),
            interval: self.poll_interval,
        };
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => debug!("bridge poller cancelled"),
                () = poller.run() => {},
            }
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.cancel.is_cancelled() && self.connected.load(Ordering::SeqCst)
    }

    /// The bridge takes bare phone numbers.
    fn resolve_address(&self, target: &str) -> String {
        target.to_string()
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<SendReceipt, TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Closed("transport destroyed".into()));
        }
        let message_id = self.api.send_text(to, text).await?;
        Ok(SendReceipt {
            message_id,
            to: to.to_string(),
        })
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        self.cancel.cancel();
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

struct Poller {
    api: Arc<EvolutionApi>,
    events: EventSink,
    connected: Arc<AtomicBool>,
    interval: Duration,
}

impl Poller {
    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    fn lost(&self, reason: String) {
        self.connected.store(false, Ordering::SeqCst);
        self.emit(TransportEvent::Disconnected(DisconnectReason::Remote(reason)));
    }

    async fn run(self) {
        let mut opened = false;
        let mut last_code: Option<String> = None;

        loop {
            match self.api.connection_state().await {
                Ok(ConnectionState::Open) => {
                    if !opened {
                        opened = true;
                        self.connected.store(true, Ordering::SeqCst);
                        self.emit(TransportEvent::Authenticated);
                        self.emit(TransportEvent::Ready);
                    }
                },
                Ok(state) if opened => {
                    self.lost(format!("bridge instance is {state}"));
                    return;
                },
                Ok(_) => match self.api.connect_code().await {
                    Ok(Some(code)) if last_code.as_deref() != Some(code.as_str()) => {
                        last_code = Some(code.clone());
                        self.emit(TransportEvent::PairingChallenge(code));
                    },
                    Ok(_) => {},
                    Err(TransportError::Api {
                        status: 401 | 403,
                        body,
                    }) => {
                        self.emit(TransportEvent::AuthFailure(body));
                        return;
                    },
                    Err(e) => {
                        warn!(error = %e, "failed to fetch pairing code");
                        self.lost(e.to_string());
                        return;
                    },
                },
                Err(e) => {
                    warn!(error = %e, "bridge connection state unavailable");
                    self.lost(e.to_string());
                    return;
                },
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
