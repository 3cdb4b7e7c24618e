//! Router harness with an in-memory database and a scripted transport.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    },
    hugli_channels::{
        ChannelTransport, EventSink, SendReceipt, TransportError, TransportEvent, TransportFactory,
    },
    hugli_config::IpRestrictionConfig,
    hugli_whatsapp::{DeliveryGateway, SessionConfig, SessionManager, SessionStatus},
    serde_json::Value,
    sqlx::SqlitePool,
    tokio::sync::watch,
    tower::ServiceExt,
};

use crate::{
    server::build_app,
    state::AppState,
    store::{SqliteStore, memory_pool},
};

const WAIT: Duration = Duration::from_secs(5);

struct ScriptedTransport {
    connected: Arc<AtomicBool>,
    sends: Arc<AtomicUsize>,
    send_error: Arc<Mutex<Option<TransportError>>>,
}

#[async_trait]
impl ChannelTransport for ScriptedTransport {
    async fn start(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_text(&self, to: &str, _text: &str) -> Result<SendReceipt, TransportError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(e) = self.send_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(SendReceipt {
            message_id: format!("msg-{n}"),
            to: to.to_string(),
        })
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct ScriptedFactory {
    sinks: Mutex<Vec<EventSink>>,
    created: watch::Sender<usize>,
    connected: Arc<AtomicBool>,
    sends: Arc<AtomicUsize>,
    send_error: Arc<Mutex<Option<TransportError>>>,
}

impl ScriptedFactory {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sinks: Mutex::new(Vec::new()),
            created: watch::channel(0).0,
            connected: Arc::new(AtomicBool::new(true)),
            sends: Arc::new(AtomicUsize::new(0)),
            send_error: Arc::new(Mutex::new(None)),
        })
    }

    pub fn created(&self) -> usize {
        *self.created.borrow()
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Make every transport report its connection as dropped (or back up).
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_next_send(&self, error: TransportError) {
        *self.send_error.lock().unwrap() = Some(error);
    }

    /// Push an event from the most recently created transport.
    pub fn emit(&self, event: TransportEvent) {
        let sinks = self.sinks.lock().unwrap();
        sinks.last().unwrap().send(event).unwrap();
    }

    pub async fn wait_created(&self, n: usize) {
        let mut rx = self.created.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|c| *c >= n))
            .await
            .unwrap()
            .unwrap();
    }
}

impl TransportFactory for ScriptedFactory {
    fn create(&self, events: EventSink) -> Result<Arc<dyn ChannelTransport>, TransportError> {
        self.sinks.lock().unwrap().push(events);
        self.created.send_modify(|c| *c += 1);
        Ok(Arc::new(ScriptedTransport {
            connected: Arc::clone(&self.connected),
            sends: Arc::clone(&self.sends),
            send_error: Arc::clone(&self.send_error),
        }))
    }
}

pub struct Harness {
    pub app: Router,
    pub pool: SqlitePool,
    pub session: SessionManager,
    pub factory: Arc<ScriptedFactory>,
}

impl Harness {
    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn wait_for(&self, pred: impl Fn(&SessionStatus) -> bool) -> SessionStatus {
        let mut rx = self.session.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|s| pred(s)))
            .await
            .unwrap()
            .unwrap()
            .clone()
    }
}

pub async fn harness_with(ready: bool, ip_restriction: IpRestrictionConfig) -> Harness {
    let pool = memory_pool().await;
    let factory = ScriptedFactory::new();
    let session = SessionManager::spawn(
        SessionConfig {
            target_address: "919464820510".into(),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(10),
        },
        factory.clone(),
    );
    let state = AppState::new(
        Arc::new(SqliteStore::new(pool.clone())),
        DeliveryGateway::new(session.clone()),
        ip_restriction,
    );
    let harness = Harness {
        app: build_app(state, "*"),
        pool,
        session,
        factory,
    };

    if ready {
        harness.session.initialize();
        harness.factory.wait_created(1).await;
        harness.factory.emit(TransportEvent::Ready);
        harness.wait_for(SessionStatus::is_ready).await;
    }
    harness
}

pub async fn harness(ready: bool) -> Harness {
    harness_with(ready, IpRestrictionConfig::default()).await
}
