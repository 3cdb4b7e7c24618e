//! Session lifecycle: connection establishment, pairing, bounded reconnect
//! and teardown of the single WhatsApp connection.
//!
//! All mutation happens inside one control-loop task that consumes
//! [`Command`]s in arrival order. Transport events are tagged with the
//! generation of the transport that produced them, and reconnect timers with
//! the epoch they were scheduled in, so anything originating from a torn-down
//! connection is dropped instead of resurrecting it.

use std::{fmt, sync::Arc, time::Duration};

use {
    hugli_channels::{
        ChannelTransport, DisconnectReason, TransportError, TransportEvent, TransportFactory,
    },
    serde::Serialize,
    tokio::{
        sync::{mpsc, oneshot, watch},
        task::JoinHandle,
    },
    tracing::{debug, error, info, warn},
};

use crate::{error::SessionError, qr};

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    AwaitingPairing,
    Ready,
    Disconnected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::AwaitingPairing => "awaiting_pairing",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
        })
    }
}

/// Fixed session parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub target_address: String,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl From<&hugli_config::WhatsAppConfig> for SessionConfig {
    fn from(cfg: &hugli_config::WhatsAppConfig) -> Self {
        Self {
            target_address: cfg.target_number.clone(),
            max_reconnect_attempts: cfg.max_reconnect_attempts,
            reconnect_delay: cfg.reconnect_delay(),
        }
    }
}

/// Point-in-time view of the session, published after every transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: SessionState,
    /// Connection establishment in flight.
    pub is_initializing: bool,
    pub pairing_challenge: Option<String>,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub target_address: String,
    /// Reason of the last pairing rejection, cleared on the next challenge.
    pub pairing_failure: Option<String>,
}

impl SessionStatus {
    fn new(config: &SessionConfig) -> Self {
        Self {
            state: SessionState::Uninitialized,
            is_initializing: false,
            pairing_challenge: None,
            reconnect_attempts: 0,
            max_reconnect_attempts: config.max_reconnect_attempts,
            target_address: config.target_address.clone(),
            pairing_failure: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn has_pairing_challenge(&self) -> bool {
        self.pairing_challenge.is_some()
    }

    /// Automatic recovery has given up; only a restart brings the session back.
    pub fn reconnect_exhausted(&self) -> bool {
        self.state == SessionState::Disconnected
            && self.reconnect_attempts >= self.max_reconnect_attempts
    }
}

/// The transport currently owned by the session, with its generation.
#[derive(Clone)]
pub struct ActiveTransport {
    pub generation: u64,
    pub transport: Arc<dyn ChannelTransport>,
}

enum Command {
    Initialize,
    Restart(oneshot::Sender<Result<(), TransportError>>),
    Shutdown(oneshot::Sender<Result<(), TransportError>>),
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    StartFailed {
        generation: u64,
        error: TransportError,
    },
    ConnectionLost {
        generation: u64,
        reason: String,
    },
    ReconnectDue {
        epoch: u64,
    },
}

/// Handle to the session control loop. Cheap to clone.
#[derive(Clone)]
pub struct SessionManager {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    transport: watch::Receiver<Option<ActiveTransport>>,
}

impl SessionManager {
    /// Spawn the control loop. The session starts `Uninitialized`; call
    /// [`initialize`](Self::initialize) to connect.
    pub fn spawn(config: SessionConfig, factory: Arc<dyn TransportFactory>) -> Self {
        info!(target_address = %config.target_address, "WhatsApp target number configured");

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::new(&config));
        let (transport_tx, transport_rx) = watch::channel(None);

        let actor = SessionActor {
            config,
            factory,
            commands: commands_tx.clone(),
            status: status_tx,
            transport: transport_tx,
            generation: 0,
            epoch: 0,
            forwarder: None,
            starter: None,
            reconnect_timer: None,
        };
        tokio::spawn(actor.run(commands_rx));

        Self {
            commands: commands_tx,
            status: status_rx,
            transport: transport_rx,
        }
    }

    /// Start connecting. Returns immediately; a call while a connection
    /// attempt is already in flight is a logged no-op.
    pub fn initialize(&self) {
        if self.commands.send(Command::Initialize).is_err() {
            warn!("initialize ignored: session manager has stopped");
        }
    }

    /// Tear down the current connection, reset the reconnect budget and
    /// initialize again. Resolves once the new attempt has been started.
    ///
    /// An `Err(SessionError::Teardown)` reports a failed cleanup of the old
    /// connection; the new attempt is started regardless.
    pub async fn restart(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Restart(tx))
            .map_err(|_| SessionError::Stopped)?;
        rx.await.map_err(|_| SessionError::Stopped)??;
        Ok(())
    }

    /// Tear down the connection and stop the control loop.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Shutdown(tx))
            .map_err(|_| SessionError::Stopped)?;
        rx.await.map_err(|_| SessionError::Stopped)??;
        Ok(())
    }

    pub fn snapshot_status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn current_pairing_challenge(&self) -> Option<String> {
        self.status.borrow().pairing_challenge.clone()
    }

    /// Watch every published status.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub(crate) fn active_transport(&self) -> Option<ActiveTransport> {
        self.transport.borrow().clone()
    }

    /// Report that the transport of `generation` proved dead outside of its
    /// own event stream. Ignored if that transport has since been replaced.
    pub(crate) fn report_connection_lost(&self, generation: u64, reason: impl Into<String>) {
        let _ = self.commands.send(Command::ConnectionLost {
            generation,
            reason: reason.into(),
        });
    }
}

struct SessionActor {
    config: SessionConfig,
    factory: Arc<dyn TransportFactory>,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Sender<SessionStatus>,
    transport: watch::Sender<Option<ActiveTransport>>,
    /// Bumped for every allocated transport.
    generation: u64,
    /// Bumped on teardown; invalidates pending reconnect timers.
    epoch: u64,
    forwarder: Option<JoinHandle<()>>,
    starter: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Initialize => self.initialize().await,
                Command::Restart(reply) => {
                    info!("restarting WhatsApp service");
                    let teardown = self.teardown().await;
                    self.update(|s| s.reconnect_attempts = 0);
                    self.initialize().await;
                    let _ = reply.send(teardown);
                },
                Command::Shutdown(reply) => {
                    let teardown = self.teardown().await;
                    let _ = reply.send(teardown);
                    break;
                },
                Command::Transport { generation, event } => {
                    if generation == self.generation {
                        self.on_transport_event(event);
                    } else {
                        debug!(generation, current = self.generation, ?event, "dropping event from stale transport");
                    }
                },
                Command::StartFailed { generation, error } => {
                    if generation == self.generation {
                        error!(error = %error, "error initializing WhatsApp service");
                        self.on_connection_lost();
                    }
                },
                // Only a session that believes it is Ready can go stale; a
                // fresh attempt is not connected yet by definition.
                Command::ConnectionLost { generation, reason } => {
                    if generation == self.generation
                        && self.status.borrow().state == SessionState::Ready
                    {
                        warn!(%reason, "WhatsApp session lost, marking as not ready");
                        self.on_connection_lost();
                    }
                },
                Command::ReconnectDue { epoch } => {
                    if epoch == self.epoch {
                        self.reconnect_timer = None;
                        self.initialize().await;
                    }
                },
            }
        }
        debug!("session control loop stopped");
    }

    fn update(&self, f: impl FnOnce(&mut SessionStatus)) {
        self.status.send_modify(f);
    }

    async fn initialize(&mut self) {
        if self.status.borrow().is_initializing {
            info!("WhatsApp service is already initializing");
            return;
        }

        info!("initializing WhatsApp client");
        self.update(|s| {
            s.state = SessionState::Initializing;
            s.is_initializing = true;
        });

        if let Err(e) = self.release_transport().await {
            warn!(error = %e, "error destroying existing client");
        }

        self.generation += 1;
        let generation = self.generation;
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let transport = match self.factory.create(events_tx) {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "failed to allocate WhatsApp transport");
                self.on_connection_lost();
                return;
            },
        };

        let commands = self.commands.clone();
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                if commands.send(Command::Transport { generation, event }).is_err() {
                    break;
                }
            }
        }));

        let commands = self.commands.clone();
        let starting = Arc::clone(&transport);
        self.starter = Some(tokio::spawn(async move {
            if let Err(error) = starting.start().await {
                let _ = commands.send(Command::StartFailed { generation, error });
            }
        }));

        self.transport.send_replace(Some(ActiveTransport {
            generation,
            transport,
        }));
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        let state = self.status.borrow().state;
        match event {
            TransportEvent::PairingChallenge(code) => {
                if !matches!(
                    state,
                    SessionState::Initializing | SessionState::AwaitingPairing
                ) {
                    debug!(%state, "ignoring pairing challenge outside of handshake");
                    return;
                }
                info!("WhatsApp QR code generated");
                if let Some(rendered) = qr::render_terminal(&code) {
                    info!("scan with WhatsApp to pair:\n{rendered}");
                }
                self.update(|s| {
                    s.state = SessionState::AwaitingPairing;
                    s.pairing_challenge = Some(code);
                    s.pairing_failure = None;
                });
            },
            TransportEvent::Authenticated => info!("WhatsApp client authenticated"),
            TransportEvent::Ready => {
                info!("WhatsApp client is ready");
                self.cancel_reconnect();
                self.update(|s| {
                    s.state = SessionState::Ready;
                    s.is_initializing = false;
                    s.pairing_challenge = None;
                    s.pairing_failure = None;
                    s.reconnect_attempts = 0;
                });
            },
            TransportEvent::AuthFailure(reason) => {
                error!(%reason, "WhatsApp authentication failed");
                // No automatic retry: the operator has to restart pairing.
                self.update(|s| {
                    if matches!(
                        s.state,
                        SessionState::Initializing | SessionState::AwaitingPairing
                    ) {
                        s.state = SessionState::Initializing;
                    }
                    s.is_initializing = false;
                    s.pairing_challenge = None;
                    s.pairing_failure = Some(reason);
                });
            },
            TransportEvent::Disconnected(reason) => {
                info!(%reason, "WhatsApp client disconnected");
                if state == SessionState::Uninitialized {
                    return;
                }
                match reason {
                    DisconnectReason::Manual => self.update(|s| {
                        s.state = SessionState::Disconnected;
                        s.is_initializing = false;
                    }),
                    DisconnectReason::Remote(_) => self.on_connection_lost(),
                }
            },
        }
    }

    fn on_connection_lost(&mut self) {
        self.update(|s| {
            s.state = SessionState::Disconnected;
            s.is_initializing = false;
            s.pairing_challenge = None;
        });
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_timer.is_some() {
            debug!("reconnect already scheduled");
            return;
        }

        let (attempts, max) = {
            let s = self.status.borrow();
            (s.reconnect_attempts, s.max_reconnect_attempts)
        };
        if attempts >= max {
            error!(max, "max reconnection attempts reached, stopping reconnection");
            return;
        }

        let attempt = attempts + 1;
        self.update(|s| s.reconnect_attempts = attempt);
        info!(attempt, max, delay = ?self.config.reconnect_delay, "scheduling WhatsApp reconnect");

        let commands = self.commands.clone();
        let delay = self.config.reconnect_delay;
        let epoch = self.epoch;
        self.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = commands.send(Command::ReconnectDue { epoch });
        }));
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }

    /// Stop the tasks attached to the current transport and destroy it.
    async fn release_transport(&mut self) -> Result<(), TransportError> {
        for task in [self.forwarder.take(), self.starter.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        match self.transport.send_replace(None) {
            Some(active) => active.transport.destroy().await,
            None => Ok(()),
        }
    }

    /// Back to `Uninitialized`: no live transport, no pending timers.
    async fn teardown(&mut self) -> Result<(), TransportError> {
        self.epoch += 1;
        self.cancel_reconnect();
        let result = self.release_transport().await;
        match &result {
            Ok(()) => info!("WhatsApp client disconnected"),
            Err(e) => error!(error = %e, "error disconnecting WhatsApp client"),
        }
        self.update(|s| {
            s.state = SessionState::Uninitialized;
            s.is_initializing = false;
            s.pairing_challenge = None;
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubFactory, wait_for};

    fn config(max: u32) -> SessionConfig {
        SessionConfig {
            target_address: "919464820510".into(),
            max_reconnect_attempts: max,
            reconnect_delay: Duration::from_secs(10),
        }
    }

    async fn ready_session(max: u32) -> (SessionManager, Arc<StubFactory>) {
        let factory = StubFactory::new();
        let session = SessionManager::spawn(config(max), factory.clone());
        session.initialize();
        factory.wait_created(1).await;
        factory.latest().emit(TransportEvent::Ready);
        wait_for(&session, |s| s.is_ready()).await;
        (session, factory)
    }

    #[tokio::test]
    async fn starts_uninitialized() {
        let session = SessionManager::spawn(config(5), StubFactory::new());
        let status = session.snapshot_status();
        assert_eq!(status.state, SessionState::Uninitialized);
        assert_eq!(status.max_reconnect_attempts, 5);
        assert_eq!(status.target_address, "919464820510");
        assert!(session.current_pairing_challenge().is_none());
    }

    #[tokio::test]
    async fn pairing_then_ready_clears_challenge() {
        let factory = StubFactory::new();
        let session = SessionManager::spawn(config(5), factory.clone());
        session.initialize();
        factory.wait_created(1).await;
        assert_eq!(factory.latest().starts(), 1);

        factory
            .latest()
            .emit(TransportEvent::PairingChallenge("2@abc".into()));
        let status = wait_for(&session, |s| s.state == SessionState::AwaitingPairing).await;
        assert_eq!(status.pairing_challenge.as_deref(), Some("2@abc"));
        assert!(status.is_initializing);

        factory
            .latest()
            .emit(TransportEvent::PairingChallenge("2@def".into()));
        wait_for(&session, |s| s.pairing_challenge.as_deref() == Some("2@def")).await;

        factory.latest().emit(TransportEvent::Authenticated);
        factory.latest().emit(TransportEvent::Ready);
        let status = wait_for(&session, |s| s.is_ready()).await;
        assert!(status.pairing_challenge.is_none());
        assert!(!status.is_initializing);
        assert_eq!(status.reconnect_attempts, 0);
    }

    #[tokio::test]
    async fn overlapping_initialize_collapses_to_one_attempt() {
        let factory = StubFactory::new();
        let session = SessionManager::spawn(config(5), factory.clone());
        session.initialize();
        session.initialize();
        session.initialize();
        factory.wait_created(1).await;
        wait_for(&session, |s| s.is_initializing).await;
        tokio::task::yield_now().await;
        assert_eq!(factory.created(), 1);
    }

    #[tokio::test]
    async fn auth_failure_does_not_retry() {
        let factory = StubFactory::new();
        let session = SessionManager::spawn(config(5), factory.clone());
        session.initialize();
        factory.wait_created(1).await;
        factory
            .latest()
            .emit(TransportEvent::PairingChallenge("2@abc".into()));
        wait_for(&session, |s| s.has_pairing_challenge()).await;

        factory
            .latest()
            .emit(TransportEvent::AuthFailure("pairing expired".into()));
        let status = wait_for(&session, |s| s.pairing_failure.is_some()).await;
        assert_eq!(status.state, SessionState::Initializing);
        assert!(!status.is_initializing);
        assert!(status.pairing_challenge.is_none());
        assert_eq!(status.reconnect_attempts, 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(factory.created(), 1);

        // Operator re-triggers: the in-progress flag no longer blocks.
        session.initialize();
        factory.wait_created(2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_schedules_delayed_reconnect() {
        let (session, factory) = ready_session(5).await;

        factory
            .latest()
            .emit(TransportEvent::Disconnected(DisconnectReason::Remote("NAVIGATION".into())));
        let status = wait_for(&session, |s| s.state == SessionState::Disconnected).await;
        assert_eq!(status.reconnect_attempts, 1);
        assert_eq!(factory.created(), 1);

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(factory.created(), 1);

        factory.wait_created(2).await;
        assert!(factory.nth(0).destroyed());
        wait_for(&session, |s| s.state == SessionState::Initializing).await;

        factory.latest().emit(TransportEvent::Ready);
        let status = wait_for(&session, |s| s.is_ready()).await;
        assert_eq!(status.reconnect_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_disconnect_does_not_reconnect() {
        let (session, factory) = ready_session(5).await;
        factory
            .latest()
            .emit(TransportEvent::Disconnected(DisconnectReason::Manual));
        let status = wait_for(&session, |s| s.state == SessionState::Disconnected).await;
        assert_eq!(status.reconnect_attempts, 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(factory.created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_are_bounded_and_counter_is_monotonic() {
        let (session, factory) = ready_session(2).await;
        let mut observed = Vec::new();

        for expected in 1..=2u32 {
            factory
                .latest()
                .emit(TransportEvent::Disconnected(DisconnectReason::Remote("lost".into())));
            let status = wait_for(&session, |s| s.state == SessionState::Disconnected).await;
            observed.push(status.reconnect_attempts);
            assert_eq!(status.reconnect_attempts, expected);

            factory.wait_created(expected as usize + 1).await;
            wait_for(&session, |s| s.state == SessionState::Initializing).await;
        }

        // Budget consumed: the next disconnect is final.
        factory
            .latest()
            .emit(TransportEvent::Disconnected(DisconnectReason::Remote("lost".into())));
        let status = wait_for(&session, |s| s.state == SessionState::Disconnected).await;
        observed.push(status.reconnect_attempts);
        assert!(status.reconnect_exhausted());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(factory.created(), 3);
        assert_eq!(session.snapshot_status().state, SessionState::Disconnected);
        assert!(observed.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn start_failure_counts_as_disconnect() {
        let factory = StubFactory::new();
        factory.fail_next_start(TransportError::Http("connection refused".into()));
        let session = SessionManager::spawn(config(3), factory.clone());
        session.initialize();

        let status = wait_for(&session, |s| s.state == SessionState::Disconnected).await;
        assert_eq!(status.reconnect_attempts, 1);
        factory.wait_created(2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn allocation_failure_is_recovered() {
        let factory = StubFactory::new();
        factory.fail_next_create();
        let session = SessionManager::spawn(config(3), factory.clone());
        session.initialize();

        let status = wait_for(&session, |s| s.state == SessionState::Disconnected).await;
        assert_eq!(status.reconnect_attempts, 1);
        factory.wait_created(1).await;
        wait_for(&session, |s| s.state == SessionState::Initializing).await;
    }

    #[tokio::test(start_paused = true)]
    async fn restart_cancels_pending_reconnect_and_resets_budget() {
        let (session, factory) = ready_session(5).await;
        factory
            .latest()
            .emit(TransportEvent::Disconnected(DisconnectReason::Remote("lost".into())));
        wait_for(&session, |s| s.reconnect_attempts == 1).await;

        session.restart().await.unwrap();
        assert_eq!(factory.created(), 2);
        let status = session.snapshot_status();
        assert_eq!(status.reconnect_attempts, 0);
        assert_eq!(status.state, SessionState::Initializing);

        // The timer from before the restart must not fire a third attempt.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test]
    async fn concurrent_restarts_leave_one_live_transport() {
        let (session, factory) = ready_session(5).await;

        let (a, b) = tokio::join!(session.restart(), session.restart());
        a.unwrap();
        b.unwrap();

        assert_eq!(factory.created(), 3);
        assert_eq!(factory.live(), 1);
        assert!(!factory.latest().destroyed());
    }

    #[tokio::test]
    async fn events_from_replaced_transport_are_ignored() {
        let (session, factory) = ready_session(5).await;
        let old = factory.latest();
        session.restart().await.unwrap();

        old.emit(TransportEvent::Ready);
        old.emit(TransportEvent::Disconnected(DisconnectReason::Remote("late".into())));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let status = session.snapshot_status();
        assert_eq!(status.state, SessionState::Initializing);
        assert_eq!(status.reconnect_attempts, 0);
    }

    #[tokio::test]
    async fn connection_lost_is_ignored_while_pairing() {
        let (session, factory) = ready_session(5).await;
        session.restart().await.unwrap();
        factory
            .latest()
            .emit(TransportEvent::PairingChallenge("2@qr".into()));
        wait_for(&session, |s| s.state == SessionState::AwaitingPairing).await;

        // A dispatch that read Ready before the restart and the new transport after.
        let fresh = session.active_transport().unwrap();
        session.report_connection_lost(fresh.generation, "transport reports disconnected");
        tokio::time::sleep(Duration::from_millis(20)).await;

        let status = session.snapshot_status();
        assert_eq!(status.state, SessionState::AwaitingPairing);
        assert_eq!(status.pairing_challenge.as_deref(), Some("2@qr"));
        assert_eq!(status.reconnect_attempts, 0);
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test]
    async fn connection_lost_while_ready_disconnects() {
        let (session, factory) = ready_session(5).await;
        let active = session.active_transport().unwrap();
        session.report_connection_lost(active.generation, "send failed: Session closed");

        let status = wait_for(&session, |s| s.state == SessionState::Disconnected).await;
        assert_eq!(status.reconnect_attempts, 1);
        assert_eq!(factory.created(), 1);
    }

    #[tokio::test]
    async fn teardown_errors_are_reported_but_restart_proceeds() {
        let (session, factory) = ready_session(5).await;
        factory.latest().fail_destroy();

        let err = session.restart().await.unwrap_err();
        assert!(matches!(err, SessionError::Teardown(_)));
        assert_eq!(factory.created(), 2);
        assert_eq!(session.snapshot_status().state, SessionState::Initializing);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let (session, factory) = ready_session(5).await;
        session.shutdown().await.unwrap();
        assert!(factory.latest().destroyed());
        assert_eq!(session.snapshot_status().state, SessionState::Uninitialized);
        assert!(matches!(session.restart().await, Err(SessionError::Stopped)));
    }
}
