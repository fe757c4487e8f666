//! Messages exchanged between agents.
//!
//! A `Message` is an immutable record of one occurrence. Agents build one with
//! [`Message::new`] and the builder methods; the bus stamps the sequence number
//! at enqueue time. Sequence numbers are diagnostic only and never affect
//! delivery order.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::types::AgentId;

/// Type tag broadcast by an agent entering Halt.
pub const HALT: &str = "halt";

/// Suffix appended to a message type to form its acknowledgment type.
pub const ACK_SUFFIX: &str = "_ack";

/// Acknowledgment type for a given message type (`done` -> `done_ack`).
pub fn ack_kind(kind: &str) -> String {
    format!("{kind}{ACK_SUFFIX}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    seq: u64,
    kind: String,
    emitter: AgentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination: Option<AgentId>,
    #[serde(skip_serializing_if = "Value::is_null")]
    payload: Value,
    ack: bool,
}

impl Message {
    /// A broadcast message with no payload.
    pub fn new(kind: impl Into<String>, emitter: AgentId) -> Self {
        Self {
            seq: 0,
            kind: kind.into(),
            emitter,
            destination: None,
            payload: Value::Null,
            ack: false,
        }
    }

    /// Target a single agent instead of broadcasting.
    pub fn to(mut self, destination: AgentId) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Ask the receiver's Listen state to reply with `<kind>_ack`.
    pub fn requesting_ack(mut self) -> Self {
        self.ack = true;
        self
    }

    pub(crate) fn stamped(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// The automatic reply sent by `from` when it accepts this message.
    pub(crate) fn acknowledgement(&self, from: AgentId) -> Message {
        Message::new(ack_kind(&self.kind), from)
            .to(self.emitter)
            .with_payload(self.payload.clone())
    }

    /// Sequence number, or 0 if not yet enqueued.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn emitter(&self) -> AgentId {
        self.emitter
    }

    pub fn destination(&self) -> Option<AgentId> {
        self.destination
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn ack_requested(&self) -> bool {
        self.ack
    }

    pub fn is_broadcast(&self) -> bool {
        self.destination.is_none()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} from {}", self.seq, self.kind, self.emitter)?;
        match self.destination {
            Some(dest) => write!(f, " to {dest}")?,
            None => write!(f, " to *")?,
        }
        if self.ack {
            write!(f, " (ack)")?;
        }
        if !self.payload.is_null() {
            write!(f, " {}", self.payload)?;
        }
        Ok(())
    }
}
