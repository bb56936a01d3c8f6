//! In-memory transport for exercising the full client stack without a
//! socket: the test plays the server side through a [`ServerHarness`].

use crate::transport::{SocketTransport, TransportConnector, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 64;

/// Paired channels standing in for one ordered socket connection.
pub struct ChannelTransport {
    outgoing: mpsc::Sender<Value>,
    incoming: mpsc::Receiver<Value>,
    closed: bool,
}

/// The server side of a [`ChannelTransport`]: read what the client
/// submitted, push response chunks.
pub struct ServerHarness {
    pub requests: mpsc::Receiver<Value>,
    pub chunks: mpsc::Sender<Value>,
}

pub fn channel_transport() -> (ChannelTransport, ServerHarness) {
    let (outgoing_tx, outgoing_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (incoming_tx, incoming_rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        ChannelTransport {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
            closed: false,
        },
        ServerHarness {
            requests: outgoing_rx,
            chunks: incoming_tx,
        },
    )
}

#[async_trait]
impl SocketTransport for ChannelTransport {
    async fn send(&mut self, payload: Value) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.outgoing
            .send(payload)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn receive(&mut self) -> Option<Value> {
        if self.closed {
            return None;
        }
        self.incoming.recv().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

/// Hands out one pre-built [`ChannelTransport`] on the first connect.
pub struct ChannelConnector {
    transport: Mutex<Option<ChannelTransport>>,
}

impl ChannelConnector {
    pub fn new(transport: ChannelTransport) -> Arc<Self> {
        Arc::new(Self {
            transport: Mutex::new(Some(transport)),
        })
    }
}

#[async_trait]
impl TransportConnector for ChannelConnector {
    async fn connect(
        &self,
        _endpoint: &str,
        _headers: &[(String, String)],
    ) -> Result<Box<dyn SocketTransport>, TransportError> {
        self.transport
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .map(|t| Box::new(t) as Box<dyn SocketTransport>)
            .ok_or(TransportError::Closed)
    }
}
