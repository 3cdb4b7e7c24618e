//! In-process transport double used by the session and delivery tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    hugli_channels::{
        ChannelTransport, EventSink, SendReceipt, TransportError, TransportEvent, TransportFactory,
    },
    tokio::sync::watch,
};

use crate::session::{SessionManager, SessionStatus};

const WAIT: Duration = Duration::from_secs(300);

pub struct StubTransport {
    events: EventSink,
    connected: AtomicBool,
    destroyed: AtomicBool,
    fail_destroy: AtomicBool,
    starts: AtomicUsize,
    sends: AtomicUsize,
    start_error: Mutex<Option<TransportError>>,
    send_error: Mutex<Option<TransportError>>,
    destroyed_count: Arc<AtomicUsize>,
}

impl StubTransport {
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_destroy(&self) {
        self.fail_destroy.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_send(&self, error: TransportError) {
        *self.send_error.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl ChannelTransport for StubTransport {
    async fn start(&self) -> Result<(), TransportError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        match self.start_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_text(&self, to: &str, _text: &str) -> Result<SendReceipt, TransportError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.send_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(SendReceipt {
            message_id: format!("true_{to}_3EB0{}", self.sends()),
            to: to.to_string(),
        })
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        if self.fail_destroy.load(Ordering::SeqCst) {
            return Err(TransportError::Closed("browser already closed".into()));
        }
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.destroyed_count.fetch_add(1, Ordering::SeqCst);
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

pub struct StubFactory {
    transports: Mutex<Vec<Arc<StubTransport>>>,
    created: watch::Sender<usize>,
    destroyed: Arc<AtomicUsize>,
    fail_create: AtomicBool,
    start_error: Mutex<Option<TransportError>>,
}

impl StubFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            transports: Mutex::new(Vec::new()),
            created: watch::channel(0).0,
            destroyed: Arc::new(AtomicUsize::new(0)),
            fail_create: AtomicBool::new(false),
            start_error: Mutex::new(None),
        })
    }

    pub fn created(&self) -> usize {
        *self.created.borrow()
    }

    /// Transports allocated and not yet destroyed.
    pub fn live(&self) -> usize {
        self.created() - self.destroyed.load(Ordering::SeqCst)
    }

    pub fn latest(&self) -> Arc<StubTransport> {
        self.transports.lock().unwrap().last().cloned().unwrap()
    }

    pub fn nth(&self, n: usize) -> Arc<StubTransport> {
        self.transports.lock().unwrap()[n].clone()
    }

    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_start(&self, error: TransportError) {
        *self.start_error.lock().unwrap() = Some(error);
    }

    pub async fn wait_created(&self, n: usize) {
        let mut rx = self.created.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|c| *c >= n))
            .await
            .unwrap()
            .unwrap();
    }
}

impl TransportFactory for StubFactory {
    fn create(&self, events: EventSink) -> Result<Arc<dyn ChannelTransport>, TransportError> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Http("could not launch client".into()));
        }
        let transport = Arc::new(StubTransport {
            events,
            connected: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
            fail_destroy: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            sends: AtomicUsize::new(0),
            start_error: Mutex::new(self.start_error.lock().unwrap().take()),
            send_error: Mutex::new(None),
            destroyed_count: Arc::clone(&self.destroyed),
        });
        self.transports.lock().unwrap().push(Arc::clone(&transport));
        self.created.send_modify(|c| *c += 1);
        Ok(transport)
    }
}

/// Wait until a published status satisfies `pred`.
pub async fn wait_for(
    session: &SessionManager,
    mut pred: impl FnMut(&SessionStatus) -> bool,
) -> SessionStatus {
    let mut rx = session.subscribe();
    tokio::time::timeout(WAIT, rx.wait_for(|s| pred(s)))
        .await
        .unwrap()
        .unwrap()
        .clone()
}
