//! All-to-all bootstrap of the worker mesh.
//!
//! Every worker connects to all workers with a smaller id and accepts
//! connections from all workers with a larger id, exchanging worker ids on
//! each fresh socket. The result is one authenticated-by-id byte channel
//! per foreign worker, indexed in worker-id order.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn, Level};

use crate::channel::TcpChannel;

/// Identifier of a worker within the cluster.
pub type WorkerId = u32;

/// Maximum connect attempts per peer while the peer refuses connections.
const MAX_TRIES: u32 = 20;

/// Pause between connect attempts on connection-refused.
const CONNECT_BACKOFF: Duration = Duration::from_millis(3000);

/// Network endpoints of one worker, as listed in the cluster
/// configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSpec {
    /// Host of the worker's internal listener.
    pub internal_host: String,
    /// Port of the worker's internal listener.
    pub internal_port: String,
}

/// Errors raised while composing the mesh.
///
/// Everything here is reported before any protocol traffic flows, so the
/// caller can recover (fix the configuration, retry the bootstrap).
#[derive(Debug, Error)]
pub enum Error {
    /// `self_id` does not index into the worker list.
    #[error("self id {self_id} is out of range for {num_workers} workers")]
    SelfIdOutOfRange {
        /// The local worker's claimed id.
        self_id: WorkerId,
        /// Size of the worker list.
        num_workers: usize,
    },
    /// A worker record lacks an internal host or port.
    #[error("missing internal network information for worker {0}")]
    MissingEndpoint(WorkerId),
    /// Some peers never became reachable; every partial socket has been
    /// closed.
    #[error("could not connect to worker(s) {0:?}")]
    Unreachable(Vec<WorkerId>),
    /// A local socket operation failed.
    #[error("failed to {phase}: {source}")]
    Io {
        /// What the bootstrap was doing.
        phase: &'static str,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

/// Fully connected mesh: one channel per foreign worker.
pub struct ClusterNetwork {
    self_id: WorkerId,
    channels: Vec<Option<TcpChannel>>,
}

impl ClusterNetwork {
    /// The local worker's id.
    pub fn self_id(&self) -> WorkerId {
        self.self_id
    }

    /// Total number of workers, the local one included.
    pub fn num_workers(&self) -> usize {
        self.channels.len()
    }

    /// The channel to `worker`, or `None` for the local slot.
    pub fn contact_worker(&mut self, worker: WorkerId) -> Option<&mut TcpChannel> {
        self.channels[worker as usize].as_mut()
    }

    /// Builds the mesh: connects to every smaller-id worker (with retries
    /// while the peer is still coming up), accepts one connection from
    /// every larger-id worker, and exchanges worker ids on each socket.
    ///
    /// On any missing peer, every socket established so far is closed and
    /// the full list of unreachable ids is returned.
    #[tracing::instrument(level = Level::DEBUG, skip(workers))]
    pub fn establish(self_id: WorkerId, workers: &[WorkerSpec]) -> Result<Self, Error> {
        let num_workers = workers.len();
        if self_id as usize >= num_workers {
            return Err(Error::SelfIdOutOfRange {
                self_id,
                num_workers,
            });
        }
        for (i, worker) in workers.iter().enumerate() {
            if worker.internal_host.is_empty() || worker.internal_port.is_empty() {
                return Err(Error::MissingEndpoint(i as WorkerId));
            }
        }

        let mut sockets: Vec<Option<TcpStream>> = Vec::new();
        sockets.resize_with(num_workers, || None);

        // outbound side: one short-lived connector per smaller-id worker,
        // posting its result back over a channel
        let (tx, rx) = mpsc::channel::<(WorkerId, io::Result<TcpStream>)>();
        let mut connectors = Vec::new();
        for j in 0..self_id {
            let spec = workers[j as usize].clone();
            let tx = tx.clone();
            connectors.push(thread::spawn(move || {
                let _ = tx.send((j, connect_with_retries(self_id, j, &spec)));
            }));
        }
        drop(tx);

        // inbound side: exactly one connection per larger-id worker
        let remaining = num_workers - self_id as usize - 1;
        if remaining > 0 {
            let listen_addr = format!("0.0.0.0:{}", workers[self_id as usize].internal_port);
            let listener = TcpListener::bind(&listen_addr).map_err(|source| Error::Io {
                phase: "bind the internal listener",
                source,
            })?;
            for _ in 0..remaining {
                let (mut stream, addr) = listener.accept().map_err(|source| Error::Io {
                    phase: "accept a peer connection",
                    source,
                })?;
                let mut id_bytes = [0u8; 4];
                if let Err(e) = stream.read_exact(&mut id_bytes) {
                    warn!(peer = %addr, error = %e, "discarding connection without an id");
                    continue;
                }
                let peer = WorkerId::from_ne_bytes(id_bytes);
                if peer > self_id
                    && (peer as usize) < num_workers
                    && sockets[peer as usize].is_none()
                {
                    debug!(peer, "accepted inbound worker");
                    sockets[peer as usize] = Some(stream);
                } else {
                    warn!(peer, "discarding connection with an invalid worker id");
                }
            }
        }

        for connector in connectors {
            let _ = connector.join();
        }
        while let Ok((j, result)) = rx.try_recv() {
            match result {
                Ok(stream) => sockets[j as usize] = Some(stream),
                Err(e) => warn!(peer = j, error = %e, "outbound connection failed"),
            }
        }

        let missing: Vec<WorkerId> = (0..num_workers as WorkerId)
            .filter(|&i| i != self_id && sockets[i as usize].is_none())
            .collect();
        if !missing.is_empty() {
            // dropping `sockets` closes every partial connection
            return Err(Error::Unreachable(missing));
        }

        let mut channels = Vec::with_capacity(num_workers);
        for socket in sockets {
            let channel = match socket {
                Some(stream) => Some(TcpChannel::from_tcp(stream).map_err(|source| Error::Io {
                    phase: "split a peer socket",
                    source,
                })?),
                None => None,
            };
            channels.push(channel);
        }
        debug!(num_workers, "mesh established");
        Ok(Self { self_id, channels })
    }
}

/// Dials one smaller-id worker, retrying while it refuses connections.
/// Timeouts and every other error abort the attempt immediately.
fn connect_with_retries(
    self_id: WorkerId,
    peer: WorkerId,
    spec: &WorkerSpec,
) -> io::Result<TcpStream> {
    let addr = format!("{}:{}", spec.internal_host, spec.internal_port);
    let mut attempt = 0;
    loop {
        match TcpStream::connect(&addr) {
            Ok(mut stream) => {
                stream.write_all(&self_id.to_ne_bytes())?;
                debug!(peer, attempt, "connected to worker");
                return Ok(stream);
            }
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                attempt += 1;
                if attempt == MAX_TRIES {
                    return Err(e);
                }
                debug!(peer, attempt, "connection refused, backing off");
                thread::sleep(CONNECT_BACKOFF);
            }
            Err(e) => return Err(e),
        }
    }
}
