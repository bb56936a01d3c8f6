use crate::message::MessageType;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message kind {kind:?} arrived out of order")]
    OutOfOrder { kind: MessageType },

    #[error("message kind {kind:?} arrived before headers")]
    MissingHeaders { kind: MessageType },
}

/// Verdict for one incoming message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCheck {
    /// In order; process the message.
    Accept,
    /// Out of order but recoverable; drop the message, keep the stream.
    Drop,
    /// Structurally unrecoverable (data-bearing chunk with no headers to
    /// anchor it); the session must fail.
    Fatal,
}

/// Tracks the canonical partial order of message kinds within one stream.
///
/// Kinds may be skipped (absent kinds are optional) but never revisited,
/// except `data`, which repeats once per chunk. `error` is accepted at any
/// point before a terminal marker and terminates the stream, as does
/// `finish`; everything after a terminal marker is dropped.
#[derive(Debug, Default)]
pub struct StreamOrder {
    last_rank: u8,
    headers_seen: bool,
    terminated: bool,
}

fn rank(kind: MessageType) -> u8 {
    match kind {
        MessageType::Error => 0,
        MessageType::Headers => 1,
        MessageType::Grand => 2,
        MessageType::Metadata => 3,
        MessageType::Data => 4,
        MessageType::DataFinish => 5,
        MessageType::TotalRows => 6,
        MessageType::DataBars => 7,
        MessageType::RangeMinMax => 8,
        MessageType::Finish => 9,
    }
}

impl StreamOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, kind: MessageType) -> OrderCheck {
        if self.terminated {
            return OrderCheck::Drop;
        }

        if kind == MessageType::Error {
            self.terminated = true;
            return OrderCheck::Accept;
        }

        if matches!(kind, MessageType::Data | MessageType::Grand) && !self.headers_seen {
            return OrderCheck::Fatal;
        }

        let incoming = rank(kind);
        let repeatable = kind == MessageType::Data;
        if incoming < self.last_rank || (incoming == self.last_rank && !repeatable) {
            return OrderCheck::Drop;
        }

        self.last_rank = incoming;
        match kind {
            MessageType::Headers => self.headers_seen = true,
            MessageType::Finish => self.terminated = true,
            _ => {}
        }
        OrderCheck::Accept
    }

    pub fn terminated(&self) -> bool {
        self.terminated
    }
}
