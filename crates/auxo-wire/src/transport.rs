//! Router/dealer transport over TCP.
//!
//! A [`Router`] binds a listener and accepts many connections. Each
//! connection gets an [`Identity`]; inbound frames arrive tagged with it and
//! replies are addressed by it. A [`Dealer`] owns one outbound connection.
//!
//! Both sides move frames through channels fed by per-connection reader and
//! writer tasks, so [`Router::recv`] and [`Dealer::recv`] are cancel-safe and
//! can sit in a `tokio::select!` next to other endpoints.

use crate::codec::{read_frame, write_frame};
use crate::endpoint::Endpoint;
use crate::error::WireError;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error};

/// Inbound frames buffered per endpoint before readers wait.
const INBOUND_QUEUE: usize = 1024;
/// Outbound frames buffered per connection before senders wait.
const OUTBOUND_QUEUE: usize = 256;
/// How long [`Dealer::close`] waits for queued frames to be written.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-connection identity assigned by a [`Router`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(u64);

impl Identity {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

type PeerTable = Arc<Mutex<HashMap<Identity, mpsc::Sender<Bytes>>>>;

/// Many-to-one endpoint.
pub struct Router {
    endpoint: Endpoint,
    local_addr: SocketAddr,
    inbound: mpsc::Receiver<(Identity, Bytes)>,
    peers: PeerTable,
    accept_task: JoinHandle<()>,
}

impl Router {
    /// Bind a listener on `endpoint` and start accepting.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self, WireError> {
        let listener = TcpListener::bind(endpoint.bind_authority()).await?;
        let local_addr = listener.local_addr()?;
        let (inbound_tx, inbound) = mpsc::channel(INBOUND_QUEUE);
        let peers = PeerTable::default();

        let accept_task = tokio::spawn(accept_loop(listener, inbound_tx, Arc::clone(&peers)));
        debug!(%endpoint, %local_addr, "router bound");

        Ok(Self {
            endpoint: endpoint.with_port(local_addr.port()),
            local_addr,
            inbound,
            peers,
            accept_task,
        })
    }

    /// The bound endpoint (with the real port when port 0 was requested).
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Next inbound frame and the identity of the connection it came from.
    pub async fn recv(&mut self) -> Option<(Identity, Bytes)> {
        self.inbound.recv().await
    }

    /// Queue a frame for the connection with identity `to`.
    pub async fn send(&self, to: Identity, frame: Bytes) -> Result<(), WireError> {
        let tx = self
            .peers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&to)
            .cloned()
            .ok_or(WireError::UnknownIdentity(to))?;
        tx.send(frame)
            .await
            .map_err(|_| WireError::UnknownIdentity(to))
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.peers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        // The accept task owns every connection task; aborting it closes them.
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    inbound: mpsc::Sender<(Identity, Bytes)>,
    peers: PeerTable,
) {
    let mut connections = JoinSet::new();
    let mut next_identity = 1u64;

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let identity = Identity(next_identity);
                    next_identity += 1;
                    debug!(%identity, %addr, "router accepted connection");

                    let _ = stream.set_nodelay(true);
                    let (reader, writer) = stream.into_split();
                    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
                    peers
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(identity, tx);

                    connections.spawn(write_loop(writer, rx));
                    connections.spawn(router_read_loop(
                        reader,
                        identity,
                        inbound.clone(),
                        Arc::clone(&peers),
                    ));
                }
                Err(e) => {
                    error!(error = %e, "router accept error");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn router_read_loop(
    mut reader: OwnedReadHalf,
    identity: Identity,
    inbound: mpsc::Sender<(Identity, Bytes)>,
    peers: PeerTable,
) {
    loop {
        match read_frame(&mut reader).await {
            Ok(frame) => {
                if inbound.send((identity, frame)).await.is_err() {
                    break;
                }
            }
            Err(WireError::ConnectionClosed) => {
                debug!(%identity, "connection closed by peer");
                break;
            }
            Err(e) => {
                debug!(%identity, error = %e, "connection read failed");
                break;
            }
        }
    }
    // Dropping the sender ends the matching write loop.
    peers
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&identity);
}

async fn write_loop(mut writer: OwnedWriteHalf, mut outbound: mpsc::Receiver<Bytes>) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            debug!(error = %e, "connection write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// One-to-one endpoint connected to a [`Router`].
pub struct Dealer {
    endpoint: Endpoint,
    local_addr: SocketAddr,
    inbound: mpsc::Receiver<Bytes>,
    outbound: Option<mpsc::Sender<Bytes>>,
    reader: JoinHandle<()>,
    writer: Option<JoinHandle<()>>,
}

impl Dealer {
    /// Connect to `endpoint`. A wildcard host connects to loopback.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, WireError> {
        let stream = TcpStream::connect(endpoint.connect_authority()).await?;
        let _ = stream.set_nodelay(true);
        let local_addr = stream.local_addr()?;
        let (reader, writer) = stream.into_split();

        let (inbound_tx, inbound) = mpsc::channel(INBOUND_QUEUE);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let reader = tokio::spawn(dealer_read_loop(reader, inbound_tx));
        let writer = tokio::spawn(write_loop(writer, outbound_rx));
        debug!(%endpoint, %local_addr, "dealer connected");

        Ok(Self {
            endpoint: endpoint.clone(),
            local_addr,
            inbound,
            outbound: Some(outbound_tx),
            reader,
            writer: Some(writer),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queue a frame for the router.
    pub async fn send(&self, frame: Bytes) -> Result<(), WireError> {
        let tx = self.outbound.as_ref().ok_or(WireError::ConnectionClosed)?;
        tx.send(frame).await.map_err(|_| WireError::ConnectionClosed)
    }

    /// Next inbound frame; `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.inbound.recv().await
    }

    /// Flush queued frames (bounded wait) and close the connection.
    pub async fn close(&mut self) {
        self.outbound.take();
        if let Some(mut writer) = self.writer.take() {
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut writer).await.is_err() {
                debug!(endpoint = %self.endpoint, "dealer drain timed out");
                writer.abort();
            }
        }
        self.reader.abort();
    }
}

impl Drop for Dealer {
    fn drop(&mut self) {
        self.reader.abort();
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

async fn dealer_read_loop(mut reader: OwnedReadHalf, inbound: mpsc::Sender<Bytes>) {
    loop {
        match read_frame(&mut reader).await {
            Ok(frame) => {
                if inbound.send(frame).await.is_err() {
                    break;
                }
            }
            Err(WireError::ConnectionClosed) => break,
            Err(e) => {
                debug!(error = %e, "dealer read failed");
                break;
            }
        }
    }
}
