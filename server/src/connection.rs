//! Transport plumbing: the writer task, the reader task, and a cloneable
//! handle for talking back to the host.
//!
//! The reader routes responses straight to their waiting callers, so a
//! handler can await a host round trip while further traffic queues up
//! behind it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::codec::{FrameReader, FrameWriter};
use crate::protocol::{self, Incoming, Notification, Request, parse_incoming};

const WRITER_CHANNEL_CAPACITY: usize = 64;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A request or notification pulled off the transport for dispatch.
#[derive(Debug)]
pub enum Inbound {
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("failed to encode message")]
    Encode(#[from] serde_json::Error),
    #[error("writer channel closed")]
    ChannelClosed,
    #[error("response channel dropped")]
    Dropped,
    #[error("request timed out")]
    Timeout,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// Cloneable sender side of the connection. Handlers use it to respond,
/// notify, and issue server-to-host requests.
#[derive(Clone)]
pub struct HostHandle {
    writer_tx: mpsc::Sender<Value>,
    pending: PendingMap,
    next_id: Arc<AtomicU64>,
}

impl HostHandle {
    pub fn new(writer_tx: mpsc::Sender<Value>) -> Self {
        Self {
            writer_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Sends a request to the host and waits for the matching response
    /// body. The pending entry is cleaned up on every failure path.
    pub async fn request(
        &self,
        method: &'static str,
        params: Option<Value>,
    ) -> Result<Value, RequestError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let message = match serde_json::to_value(Request::new(id, method, params)) {
            Ok(message) => message,
            Err(error) => {
                self.pending.lock().await.remove(&id);
                return Err(RequestError::Encode(error));
            }
        };
        if self.writer_tx.send(message).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(RequestError::ChannelClosed);
        }

        match timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS), rx).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => Err(RequestError::Dropped),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(RequestError::Timeout)
            }
        }
    }

    /// Sends a notification to the host.
    pub async fn notify(
        &self,
        method: &'static str,
        params: Option<Value>,
    ) -> Result<(), RequestError> {
        let message = serde_json::to_value(Notification::new(method, params))?;
        self.writer_tx
            .send(message)
            .await
            .map_err(|_| RequestError::ChannelClosed)
    }

    /// Answers a host request. A send failure means the transport is gone,
    /// which the reader loop surfaces on its own.
    pub async fn respond(&self, id: &Value, result: Value) {
        self.send(protocol::response(id, &result)).await;
    }

    /// Answers a host request with an error.
    pub async fn respond_error(&self, id: &Value, code: i64, message: &str) {
        self.send(protocol::error_response(id, code, message)).await;
    }

    async fn send(&self, message: Value) {
        if self.writer_tx.send(message).await.is_err() {
            debug!("writer channel closed; dropping outgoing message");
        }
    }

    /// Hands a host response to whichever request call is waiting on it.
    pub async fn route_response(&self, id: u64, body: Value) {
        match self.pending.lock().await.remove(&id) {
            Some(tx) => {
                // The caller may have timed out and dropped the receiver.
                let _ = tx.send(body);
            }
            None => debug!(id, "response for unknown request id"),
        }
    }
}

/// Spawns the writer task. Everything the server sends funnels through the
/// returned channel so frames never interleave.
pub fn spawn_writer<W>(writer: W) -> (mpsc::Sender<Value>, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Value>(WRITER_CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut writer = FrameWriter::new(writer);
        while let Some(message) = rx.recv().await {
            if let Err(error) = writer.write_frame(&message).await {
                warn!(%error, "failed to write frame; stopping writer");
                break;
            }
        }
    });
    (tx, handle)
}

/// Spawns the reader task. Responses are routed straight to their waiting
/// callers; requests and notifications queue for the dispatch loop.
///
/// The inbound channel is unbounded so routing never stalls behind a
/// handler that is itself awaiting a host response.
pub fn spawn_reader<R>(
    reader: R,
    host: HostHandle,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = FrameReader::new(reader);
        loop {
            match reader.read_frame().await {
                Ok(Some(body)) => {
                    let message: Value = match serde_json::from_slice(&body) {
                        Ok(message) => message,
                        Err(error) => {
                            warn!(%error, "discarding frame with invalid JSON");
                            host.respond_error(&Value::Null, protocol::PARSE_ERROR, "invalid JSON")
                                .await;
                            continue;
                        }
                    };
                    match parse_incoming(&message) {
                        Some(Incoming::Response { id, body }) => {
                            host.route_response(id, body).await;
                        }
                        Some(Incoming::Request { id, method, params }) => {
                            if inbound_tx
                                .send(Inbound::Request { id, method, params })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Some(Incoming::Notification { method, params }) => {
                            if inbound_tx
                                .send(Inbound::Notification { method, params })
                                .is_err()
                            {
                                break;
                            }
                        }
                        None => trace!("ignoring frame with no JSON-RPC shape"),
                    }
                }
                Ok(None) => {
                    info!("host closed the transport");
                    break;
                }
                Err(error) => {
                    warn!(%error, "transport error; stopping reader");
                    break;
                }
            }
        }
    })
}
