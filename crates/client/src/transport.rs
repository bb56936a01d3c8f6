use crate::auth::Authenticator;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("{0}")]
    Io(String),
}

/// The one collaborator interface the engine needs from a socket library:
/// an ordered, reliable, single-connection message channel. Reconnection
/// and backoff are the implementation's concern.
#[async_trait]
pub trait SocketTransport: Send {
    async fn send(&mut self, payload: Value) -> Result<(), TransportError>;

    /// Next message, in delivery order. `None` once the connection closed.
    async fn receive(&mut self) -> Option<Value>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens the connection on first use, with the authenticator's headers.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
    ) -> Result<Box<dyn SocketTransport>, TransportError>;
}

/// The single shared, mutable resource of a client instance: one lazily
/// opened connection, reused across queries. Exclusive access is handed out
/// a guard at a time, so chunk handling for one session can never
/// interleave with another session's submit.
pub(crate) struct SharedTransport {
    connector: Arc<dyn TransportConnector>,
    endpoint: String,
    auth: Arc<dyn Authenticator>,
    conn: Mutex<Option<Box<dyn SocketTransport>>>,
}

impl SharedTransport {
    pub(crate) fn new(
        connector: Arc<dyn TransportConnector>,
        endpoint: String,
        auth: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            connector,
            endpoint,
            auth,
            conn: Mutex::new(None),
        }
    }

    pub(crate) async fn acquire(&self) -> Result<TransportGuard<'_>, TransportError> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            log::debug!("opening socket session to {}", self.endpoint);
            let transport = self
                .connector
                .connect(&self.endpoint, &self.auth.headers())
                .await?;
            *guard = Some(transport);
        }
        Ok(TransportGuard { guard })
    }

    pub(crate) async fn close(&self) {
        let mut guard = self.conn.lock().await;
        if let Some(mut transport) = guard.take() {
            if let Err(err) = transport.close().await {
                log::warn!("error closing transport: {err}");
            }
        }
    }
}

pub(crate) struct TransportGuard<'a> {
    guard: MutexGuard<'a, Option<Box<dyn SocketTransport>>>,
}

impl TransportGuard<'_> {
    pub(crate) async fn send(&mut self, payload: Value) -> Result<(), TransportError> {
        match self.guard.as_mut() {
            Some(transport) => transport.send(payload).await,
            None => Err(TransportError::Closed),
        }
    }

    pub(crate) async fn receive(&mut self) -> Option<Value> {
        match self.guard.as_mut() {
            Some(transport) => transport.receive().await,
            None => None,
        }
    }
}
