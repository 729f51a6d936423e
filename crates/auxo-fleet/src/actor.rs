//! Agent-side actor.
//!
//! An [`Actor`] runs inside every agent process. It holds a dealer connected
//! to the broker (`remote`) and a router bound for local workers (`local`),
//! announces itself with READY, and then heartbeats while relaying worker
//! traffic to a [`WorkerHandler`].

use async_trait::async_trait;
use auxo_types::config::AgentConfig;
use auxo_types::{Command, DiscoveryMessage, Entity, Header};
use auxo_wire::{
    decode, encode, shutdown, BindError, Dealer, Endpoint, EndpointFailure, Identity, Router,
    WireError,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where the actor is in its handshake with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Not announced (or told to go away).
    Idle,
    /// READY sent, no ACK yet.
    AwaitingAck,
    /// ACK received.
    Connected,
}

/// Handles frames from local workers.
#[async_trait]
pub trait WorkerHandler: Send + Sync + 'static {
    /// Handle one frame. A returned frame is sent back to the same worker.
    async fn handle(&self, worker: Identity, frame: Bytes) -> Option<Bytes>;
}

/// Default handler: logs and ignores worker frames.
pub struct LoggingWorkerHandler;

#[async_trait]
impl WorkerHandler for LoggingWorkerHandler {
    async fn handle(&self, worker: Identity, frame: Bytes) -> Option<Bytes> {
        debug!(%worker, len = frame.len(), "Ignoring worker frame");
        None
    }
}

enum Event {
    Shutdown,
    Remote(Option<Bytes>),
    Local(Option<(Identity, Bytes)>),
    Tick,
}

/// The agent's connection to the fleet.
pub struct Actor {
    config: AgentConfig,
    origin: Entity,
    remote: Option<Dealer>,
    local: Option<Router>,
    state: HandshakeState,
    last_heartbeat: Option<Instant>,
    dropped_frames: u64,
    worker_handler: Arc<dyn WorkerHandler>,
}

impl Actor {
    /// Create an unconnected actor.
    pub fn new(config: AgentConfig) -> Self {
        let origin = Entity::agent(config.name.clone());
        Self {
            config,
            origin,
            remote: None,
            local: None,
            state: HandshakeState::Idle,
            last_heartbeat: None,
            dropped_frames: 0,
            worker_handler: Arc::new(LoggingWorkerHandler),
        }
    }

    pub fn with_worker_handler(mut self, handler: Arc<dyn WorkerHandler>) -> Self {
        self.worker_handler = handler;
        self
    }

    pub fn origin(&self) -> &Entity {
        &self.origin
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Frames from the broker that could not be decoded.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// The bound worker endpoint, once `bind` has succeeded for it.
    pub fn worker_endpoint(&self) -> Option<&Endpoint> {
        self.local.as_ref().map(Router::endpoint)
    }

    pub fn is_connected(&self) -> bool {
        self.remote.is_some()
    }

    /// Connect to the broker (sending READY) and bind the worker endpoint.
    ///
    /// Both endpoints are attempted; every failure is reported in one
    /// [`BindError`]. Whatever did succeed stays open until [`Actor::close`].
    pub async fn bind(&mut self) -> Result<(), WireError> {
        let mut failures = Vec::new();

        let remote_addr = self.config.broker_endpoint();
        if let Err(e) = self.connect_remote(&remote_addr).await {
            failures.push(EndpointFailure {
                role: "remote",
                endpoint: remote_addr,
                error: Box::new(e),
            });
        }

        let local_addr = self.config.workers_endpoint.clone();
        if let Err(e) = self.bind_local(&local_addr).await {
            failures.push(EndpointFailure {
                role: "local",
                endpoint: local_addr,
                error: Box::new(e),
            });
        }

        BindError::into_result(failures)
    }

    async fn connect_remote(&mut self, addr: &str) -> Result<(), WireError> {
        let endpoint: Endpoint = addr.parse()?;
        let dealer = Dealer::connect(&endpoint).await?;
        dealer
            .send(encode(&DiscoveryMessage::ready(self.origin.clone()))?)
            .await?;
        info!(%endpoint, agent = %self.origin, "Actor connected to broker, READY sent");

        self.remote = Some(dealer);
        self.state = HandshakeState::AwaitingAck;
        self.last_heartbeat = Some(Instant::now());
        Ok(())
    }

    async fn bind_local(&mut self, addr: &str) -> Result<(), WireError> {
        let endpoint: Endpoint = addr.parse()?;
        let router = Router::bind(&endpoint).await?;
        info!(endpoint = %router.endpoint(), "Actor worker endpoint bound");
        self.local = Some(router);
        Ok(())
    }

    /// Event loop. Returns `Ok` on shutdown and `ConnectionClosed` if an
    /// endpoint goes away underneath it.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), WireError> {
        let interval = self.config.heartbeat_interval();
        if self.remote.is_none() {
            return Err(WireError::NotBound("remote"));
        }
        if self.local.is_none() {
            return Err(WireError::NotBound("local"));
        }

        loop {
            let next_heartbeat = self
                .last_heartbeat
                .map_or_else(Instant::now, |at| at + interval);
            let event = {
                let (Some(remote), Some(local)) = (self.remote.as_mut(), self.local.as_mut())
                else {
                    return Err(WireError::ConnectionClosed);
                };
                tokio::select! {
                    _ = shutdown::signalled(&mut shutdown) => Event::Shutdown,
                    frame = remote.recv() => Event::Remote(frame),
                    inbound = local.recv() => Event::Local(inbound),
                    _ = tokio::time::sleep_until(next_heartbeat) => Event::Tick,
                }
            };

            match event {
                Event::Shutdown => {
                    info!(agent = %self.origin, "Actor stopping");
                    return Ok(());
                }
                Event::Remote(Some(frame)) => self.handle_remote(&frame),
                Event::Remote(None) => {
                    warn!(agent = %self.origin, "Broker connection closed");
                    self.state = HandshakeState::Idle;
                    return Err(WireError::ConnectionClosed);
                }
                Event::Local(Some((worker, frame))) => self.handle_local(worker, frame).await,
                Event::Local(None) => {
                    warn!(agent = %self.origin, "Worker endpoint closed");
                    return Err(WireError::ConnectionClosed);
                }
                Event::Tick => {}
            }

            if let Err(e) = self.heartbeat_if_due(interval).await {
                warn!(agent = %self.origin, error = %e, "Heartbeat failed");
                self.state = HandshakeState::Idle;
                return Err(e);
            }
        }
    }

    fn handle_remote(&mut self, frame: &[u8]) {
        let msg = match decode(frame) {
            Ok(msg) => msg,
            Err(e) => {
                self.dropped_frames += 1;
                warn!(
                    error = %e,
                    dropped_frames = self.dropped_frames,
                    "Actor dropped undecodable frame from broker"
                );
                return;
            }
        };

        match msg.header() {
            Header::Ack => {
                if self.state != HandshakeState::Connected {
                    let timeout_ms = match msg.command() {
                        Command::Ack { liveness_timeout_ms } => *liveness_timeout_ms,
                        _ => 0,
                    };
                    info!(agent = %self.origin, liveness_timeout_ms = timeout_ms, "Broker acknowledged READY");
                }
                self.state = HandshakeState::Connected;
            }
            Header::Disconnect => {
                warn!(agent = %self.origin, broker = %msg.origin(), "Broker sent DISCONNECT");
                self.state = HandshakeState::Idle;
            }
            other => {
                debug!(header = %other, from = %msg.origin(), "Actor ignoring message");
            }
        }
    }

    async fn handle_local(&mut self, worker: Identity, frame: Bytes) {
        let Some(reply) = self.worker_handler.handle(worker, frame).await else {
            return;
        };
        if let Some(local) = &self.local {
            if let Err(e) = local.send(worker, reply).await {
                warn!(%worker, error = %e, "Failed to reply to worker");
            }
        }
    }

    async fn heartbeat_if_due(&mut self, interval: Duration) -> Result<(), WireError> {
        let now = Instant::now();
        if self
            .last_heartbeat
            .is_some_and(|at| now.saturating_duration_since(at) < interval)
        {
            return Ok(());
        }
        let Some(remote) = &self.remote else {
            return Err(WireError::NotBound("remote"));
        };
        remote
            .send(encode(&DiscoveryMessage::heartbeat(self.origin.clone()))?)
            .await?;
        debug!(agent = %self.origin, "HEARTBEAT sent");
        self.last_heartbeat = Some(now);
        Ok(())
    }

    /// Say goodbye (best effort) and release both endpoints. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut remote) = self.remote.take() {
            let goodbye = DiscoveryMessage::disconnect(self.origin.clone(), Some("shutdown".to_string()));
            match encode(&goodbye) {
                Ok(frame) => {
                    if let Err(e) = remote.send(frame).await {
                        debug!(error = %e, "DISCONNECT not delivered");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode DISCONNECT"),
            }
            remote.close().await;
            info!(agent = %self.origin, "Actor disconnected from broker");
        }
        self.local = None;
        self.state = HandshakeState::Idle;
        self.last_heartbeat = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auxo_wire::Shutdown;

    fn config_for(broker: &Endpoint) -> AgentConfig {
        AgentConfig {
            name: "apollo-test".to_string(),
            olympus: "127.0.0.1".to_string(),
            port: broker.port(),
            workers_endpoint: "tcp://127.0.0.1:0".to_string(),
            heartbeat_interval_ms: 50,
        }
    }

    async fn fake_broker() -> Router {
        Router::bind(&"tcp://127.0.0.1:0".parse().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_bind_sends_ready() {
        let mut broker = fake_broker().await;
        let mut actor = Actor::new(config_for(broker.endpoint()));
        actor.bind().await.unwrap();
        assert_eq!(actor.state(), HandshakeState::AwaitingAck);
        assert!(actor.worker_endpoint().is_some());

        let (_, frame) = broker.recv().await.unwrap();
        let msg = decode(&frame).unwrap();
        assert_eq!(msg.header(), &Header::Ready);
        assert_eq!(msg.origin(), &Entity::agent("apollo-test"));
    }

    #[tokio::test]
    async fn test_bind_reports_every_failure() {
        let mut config = AgentConfig {
            workers_endpoint: "not-an-endpoint".to_string(),
            ..AgentConfig::default()
        };
        config.olympus = "127.0.0.1".to_string();
        config.port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut actor = Actor::new(config);
        match actor.bind().await {
            Err(WireError::Bind(err)) => assert_eq!(err.roles(), vec!["remote", "local"]),
            other => panic!("Expected Bind, got {other:?}"),
        }
        actor.close().await;
    }

    #[tokio::test]
    async fn test_run_requires_bind() {
        let mut actor = Actor::new(AgentConfig::default());
        let shutdown = Shutdown::new();
        let result = actor.run(shutdown.subscribe()).await;
        assert!(matches!(result, Err(WireError::NotBound("remote"))));
    }

    #[tokio::test]
    async fn test_handshake_heartbeat_and_close() {
        let mut broker = fake_broker().await;
        let mut actor = Actor::new(config_for(broker.endpoint()));
        actor.bind().await.unwrap();

        let (identity, _ready) = broker.recv().await.unwrap();
        let ack = encode(&DiscoveryMessage::ack(Entity::broker(), 150)).unwrap();
        broker.send(identity, ack).await.unwrap();
        // Garbage is counted, not fatal.
        broker.send(identity, Bytes::from_static(b"\xc1")).await.unwrap();

        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        let task = tokio::spawn(async move {
            let result = actor.run(rx).await;
            (actor, result)
        });

        // Heartbeats keep arriving while the actor runs.
        let mut heartbeats = 0;
        while heartbeats < 2 {
            let (_, frame) = tokio::time::timeout(Duration::from_secs(2), broker.recv())
                .await
                .unwrap()
                .unwrap();
            if decode(&frame).unwrap().header() == &Header::Heartbeat {
                heartbeats += 1;
            }
        }

        shutdown.trigger();
        let (mut actor, result) = task.await.unwrap();
        result.unwrap();
        assert_eq!(actor.state(), HandshakeState::Connected);
        assert_eq!(actor.dropped_frames(), 1);

        actor.close().await;
        actor.close().await;
        assert_eq!(actor.state(), HandshakeState::Idle);

        // The last thing the broker hears is DISCONNECT.
        let mut last = None;
        while let Ok(Some((_, frame))) =
            tokio::time::timeout(Duration::from_millis(300), broker.recv()).await
        {
            last = Some(decode(&frame).unwrap());
        }
        assert_eq!(last.unwrap().header(), &Header::Disconnect);
    }

    struct Upper;

    #[async_trait]
    impl WorkerHandler for Upper {
        async fn handle(&self, _worker: Identity, frame: Bytes) -> Option<Bytes> {
            Some(Bytes::from(frame.to_ascii_uppercase()))
        }
    }

    #[tokio::test]
    async fn test_worker_frames_reach_handler() {
        let broker = fake_broker().await;
        let mut actor =
            Actor::new(config_for(broker.endpoint())).with_worker_handler(Arc::new(Upper));
        actor.bind().await.unwrap();
        let workers = actor.worker_endpoint().unwrap().clone();

        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        let task = tokio::spawn(async move { actor.run(rx).await });

        let mut worker = Dealer::connect(&workers).await.unwrap();
        worker.send(Bytes::from_static(b"job")).await.unwrap();
        let reply = tokio::time::timeout(Duration::from_secs(2), worker.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&reply[..], b"JOB");

        shutdown.trigger();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_broker_going_away_ends_run() {
        let broker = fake_broker().await;
        let mut actor = Actor::new(config_for(broker.endpoint()));
        actor.bind().await.unwrap();
        drop(broker);

        let shutdown = Shutdown::new();
        let result = tokio::time::timeout(Duration::from_secs(2), actor.run(shutdown.subscribe()))
            .await
            .unwrap();
        assert!(matches!(result, Err(WireError::ConnectionClosed)));
        assert_eq!(actor.state(), HandshakeState::Idle);
    }
}
