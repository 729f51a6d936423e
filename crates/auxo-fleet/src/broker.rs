//! The broker: accepts actors, tracks them, and answers fleet queries.
//!
//! One task runs the discovery loop ([`Broker::handle`]) and owns the router
//! and the [`EntityDirectory`]. A second task runs the RPC server; its
//! handlers reach the directory through a [`BrokerHandle`], which sends
//! requests into the loop and waits for the reply.

use crate::directory::EntityDirectory;
use async_trait::async_trait;
use auxo_rpc::{
    CallContext, FleetService, FleetServiceServer, GetNumberOfAgentsRequest,
    GetNumberOfAgentsResponse, RpcError, RpcServer,
};
use auxo_types::config::BrokerConfig;
use auxo_types::{AuxoError, DiscoveryMessage, Entity, EntityType, Header};
use auxo_wire::{decode, encode, shutdown, Endpoint, Identity, Router, WireError};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const REQUEST_QUEUE: usize = 64;

/// A question for the discovery loop.
#[derive(Debug)]
pub enum DirectoryRequest {
    /// Number of live entities of a type.
    LiveCount {
        entity_type: EntityType,
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable access to a running broker's directory.
#[derive(Debug, Clone)]
pub struct BrokerHandle {
    requests: mpsc::Sender<DirectoryRequest>,
}

impl BrokerHandle {
    pub async fn live_count(&self, entity_type: EntityType) -> Result<usize, RpcError> {
        let gone = || RpcError::Unavailable("broker discovery loop is not running".to_string());
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(DirectoryRequest::LiveCount { entity_type, reply })
            .await
            .map_err(|_| gone())?;
        answer.await.map_err(|_| gone())
    }

    /// Number of distinct live AGENT entities.
    pub async fn live_agent_count(&self) -> Result<usize, RpcError> {
        self.live_count(EntityType::Agent).await
    }
}

/// [`FleetService`] backed by the broker's directory.
pub struct BrokerFleetService {
    handle: BrokerHandle,
}

impl BrokerFleetService {
    pub fn new(handle: BrokerHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl FleetService for BrokerFleetService {
    async fn get_number_of_agents(
        &self,
        _ctx: &CallContext,
        _request: GetNumberOfAgentsRequest,
    ) -> Result<GetNumberOfAgentsResponse, RpcError> {
        let count = self.handle.live_agent_count().await?;
        Ok(GetNumberOfAgentsResponse {
            number: i32::try_from(count).unwrap_or(i32::MAX),
        })
    }
}

enum Event {
    Shutdown,
    Frame(Option<(Identity, Bytes)>),
    Request(DirectoryRequest),
    Tick,
}

/// Central broker (olympus).
pub struct Broker {
    config: BrokerConfig,
    endpoint: Option<Endpoint>,
    router: Option<Router>,
    directory: EntityDirectory,
    requests_tx: mpsc::Sender<DirectoryRequest>,
    requests_rx: mpsc::Receiver<DirectoryRequest>,
    dropped_frames: u64,
}

impl Broker {
    /// Create an unbound broker. `localhost`, `*` and `0.0.0.0` bind every
    /// interface; a blank hostname leaves the broker without an endpoint.
    pub fn new(config: BrokerConfig) -> Self {
        let endpoint = if config.hostname.trim().is_empty() {
            None
        } else {
            Some(Endpoint::for_bind(&config.hostname, config.port))
        };
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE);
        Self {
            directory: EntityDirectory::new(config.liveness_timeout()),
            config,
            endpoint,
            router: None,
            requests_tx,
            requests_rx,
            dropped_frames: 0,
        }
    }

    /// Configured endpoint, if any.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Endpoint actually bound (real port when 0 was configured).
    pub fn bound_endpoint(&self) -> Option<&Endpoint> {
        self.router.as_ref().map(Router::endpoint)
    }

    pub fn directory(&self) -> &EntityDirectory {
        &self.directory
    }

    pub fn directory_handle(&self) -> BrokerHandle {
        BrokerHandle {
            requests: self.requests_tx.clone(),
        }
    }

    /// Frames that could not be decoded.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Bind the fleet router on `endpoint`, closing any previous one first.
    pub async fn bind(&mut self, endpoint: Endpoint) -> Result<(), WireError> {
        self.close();
        let router = Router::bind(&endpoint).await?;
        info!(endpoint = %router.endpoint(), "Broker bound");
        self.endpoint = Some(endpoint);
        self.router = Some(router);
        Ok(())
    }

    /// Discovery loop. Returns `Ok` on shutdown.
    pub async fn handle(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), WireError> {
        let interval = self.config.heartbeat_interval();

        loop {
            let event = {
                let Some(router) = self.router.as_mut() else {
                    return Err(WireError::NotBound("fleet"));
                };
                tokio::select! {
                    _ = shutdown::signalled(&mut shutdown) => Event::Shutdown,
                    inbound = router.recv() => Event::Frame(inbound),
                    Some(request) = self.requests_rx.recv() => Event::Request(request),
                    _ = tokio::time::sleep(interval) => Event::Tick,
                }
            };

            match event {
                Event::Shutdown => {
                    info!(
                        entities = self.directory.len(),
                        dropped_frames = self.dropped_frames,
                        "Broker stopping"
                    );
                    return Ok(());
                }
                Event::Frame(Some((identity, frame))) => self.handle_frame(identity, &frame).await?,
                Event::Frame(None) => {
                    error!("Broker router closed");
                    return Err(WireError::ConnectionClosed);
                }
                Event::Request(request) => self.answer(request),
                Event::Tick => {}
            }

            for record in self.directory.evict_expired(Instant::now()) {
                info!(
                    identity = %record.identity,
                    entity = %record.entity,
                    "Evicted silent entity"
                );
            }
        }
    }

    async fn handle_frame(&mut self, identity: Identity, frame: &[u8]) -> Result<(), WireError> {
        let msg = match decode(frame) {
            Ok(msg) => msg,
            Err(e) => {
                self.dropped_frames += 1;
                warn!(
                    %identity,
                    error = %e,
                    dropped_frames = self.dropped_frames,
                    "Broker dropped undecodable frame"
                );
                return Ok(());
            }
        };

        let now = Instant::now();
        match msg.header() {
            Header::Ready => {
                let new = self.directory.record(identity, msg.origin(), msg.header(), now);
                info!(%identity, entity = %msg.origin(), new, "READY");
                self.acknowledge(identity).await?;
            }
            Header::Heartbeat => {
                self.directory.record(identity, msg.origin(), msg.header(), now);
                debug!(%identity, entity = %msg.origin(), "HEARTBEAT");
            }
            Header::Disconnect => {
                if self.directory.remove(identity).is_some() {
                    info!(%identity, entity = %msg.origin(), "DISCONNECT");
                }
            }
            other => {
                debug!(%identity, header = %other, "Broker ignoring message");
            }
        }
        Ok(())
    }

    async fn acknowledge(&self, identity: Identity) -> Result<(), WireError> {
        let timeout_ms =
            u64::try_from(self.directory.liveness_timeout().as_millis()).unwrap_or(u64::MAX);
        let ack = encode(&DiscoveryMessage::ack(Entity::broker(), timeout_ms))?;
        if let Some(router) = &self.router {
            if let Err(e) = router.send(identity, ack).await {
                // The actor left between READY and ACK.
                debug!(%identity, error = %e, "ACK not delivered");
            }
        }
        Ok(())
    }

    fn answer(&self, request: DirectoryRequest) {
        match request {
            DirectoryRequest::LiveCount { entity_type, reply } => {
                let count = self.directory.live_count(&entity_type, Instant::now());
                let _ = reply.send(count);
            }
        }
    }

    /// Start the discovery loop and the fleet RPC server as two tasks.
    pub async fn start(mut self, shutdown: watch::Receiver<bool>) -> Result<BrokerRuntime, AuxoError> {
        let Some(endpoint) = self.endpoint.clone() else {
            return Err(WireError::Configuration("broker endpoint is not configured".to_string()).into());
        };
        if self.router.is_none() {
            self.bind(endpoint).await?;
        }
        let fleet_endpoint = match self.bound_endpoint() {
            Some(endpoint) => endpoint.clone(),
            None => return Err(WireError::NotBound("fleet").into()),
        };

        let handle = self.directory_handle();
        let server =
            bind_frontend_server(handle.clone(), &self.config.frontend_server.authority()).await?;
        let rpc_addr = server.local_addr();

        let mut tasks = JoinSet::new();
        let loop_shutdown = shutdown.clone();
        tasks.spawn(async move {
            let mut broker = self;
            broker.handle(loop_shutdown).await.map_err(AuxoError::from)
        });
        tasks.spawn(async move { server.serve(shutdown).await.map_err(AuxoError::from) });

        info!(%fleet_endpoint, %rpc_addr, "Broker running");
        Ok(BrokerRuntime {
            fleet_endpoint,
            rpc_addr,
            handle,
            tasks,
        })
    }

    /// Start, then wait until shutdown or until either task fails.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), AuxoError> {
        self.start(shutdown).await?.wait().await
    }

    /// Release the router. Idempotent.
    pub fn close(&mut self) {
        if let Some(router) = self.router.take() {
            info!(endpoint = %router.endpoint(), "Broker router closed");
        }
    }
}

async fn bind_frontend_server(handle: BrokerHandle, address: &str) -> Result<RpcServer, RpcError> {
    let mut server = RpcServer::bind(address).await?;
    server.add_service(Arc::new(FleetServiceServer::new(Arc::new(
        BrokerFleetService::new(handle),
    ))));
    Ok(server)
}

/// Serve `HestiaFrontendService` for `handle` on `address` until shutdown.
pub async fn run_frontend_server(
    handle: BrokerHandle,
    address: &str,
    shutdown: watch::Receiver<bool>,
) -> Result<(), RpcError> {
    bind_frontend_server(handle, address)
        .await?
        .serve(shutdown)
        .await
}

/// A started broker.
pub struct BrokerRuntime {
    fleet_endpoint: Endpoint,
    rpc_addr: SocketAddr,
    handle: BrokerHandle,
    tasks: JoinSet<Result<(), AuxoError>>,
}

impl BrokerRuntime {
    /// Where actors connect.
    pub fn fleet_endpoint(&self) -> &Endpoint {
        &self.fleet_endpoint
    }

    /// Where the fleet RPC server listens.
    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    pub fn handle(&self) -> BrokerHandle {
        self.handle.clone()
    }

    /// Wait for both tasks. The first failure stops the other and is returned.
    pub async fn wait(mut self) -> Result<(), AuxoError> {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "Broker task failed");
                    return Err(e);
                }
                Err(e) => {
                    error!(error = %e, "Broker task panicked");
                    return Err(AuxoError::Internal(format!("broker task ended abnormally: {e}")));
                }
            }
        }
        Ok(())
    }
}
