//! The agent's handle onto the control core during one cycle.

use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

use super::{Agent, State};
use crate::kernel::control::ControlCore;
use crate::message::{ack_kind, Message};
use crate::types::{AgentId, Result};

static NO_PAYLOAD: Value = Value::Null;

/// Everything a state handler may do: emit, subscribe, spawn.
///
/// Borrowed mutably from the kernel for exactly one state invocation, so all
/// mutation of the registry, bus and subscription tables still goes through
/// the control core.
pub struct Context<'a, A> {
    core: &'a mut ControlCore,
    id: AgentId,
    message: Option<&'a Message>,
    _agent: PhantomData<fn(&mut A)>,
}

impl<'a, A: Agent> Context<'a, A> {
    pub(crate) fn new(
        core: &'a mut ControlCore,
        id: AgentId,
        message: Option<&'a Message>,
    ) -> Self {
        Self {
            core,
            id,
            message,
            _agent: PhantomData,
        }
    }

    /// This agent's id.
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// The agent that spawned this one (`AgentId::ROOT` for the first agent).
    pub fn parent(&self) -> AgentId {
        self.core
            .registry
            .context_of(self.id)
            .unwrap_or(AgentId::ROOT)
    }

    /// The message whose subscription led to the current state, if any.
    pub fn message(&self) -> Option<&Message> {
        self.message
    }

    /// Payload of [`Context::message`], or `null`.
    pub fn payload(&self) -> &Value {
        self.message.map_or(&NO_PAYLOAD, Message::payload)
    }

    /// Broadcast to every other registered agent. Returns the sequence number.
    pub fn emit(&mut self, kind: impl Into<String>, payload: impl Into<Value>) -> u64 {
        self.core.emit(Message::new(kind, self.id).with_payload(payload))
    }

    /// Send to a single agent; dropped if it is gone by delivery time.
    pub fn emit_to(
        &mut self,
        destination: AgentId,
        kind: impl Into<String>,
        payload: impl Into<Value>,
    ) -> u64 {
        let message = Message::new(kind, self.id).to(destination).with_payload(payload);
        self.core.emit(message)
    }

    /// Send with acknowledgment requested and resume at `on_ack` when the
    /// target's `<kind>_ack` reply arrives.
    pub fn request(
        &mut self,
        destination: AgentId,
        kind: impl Into<String>,
        payload: impl Into<Value>,
        on_ack: State<A>,
    ) -> u64 {
        let kind = kind.into();
        let reply = ack_kind(&kind);
        let seq = self.core.emit(
            Message::new(kind, self.id)
                .to(destination)
                .with_payload(payload)
                .requesting_ack(),
        );
        self.core.subscribe_from(reply, destination, self.id, on_ack);
        seq
    }

    /// React to `kind` from any emitter.
    pub fn when(&mut self, kind: impl Into<String>, state: State<A>) {
        self.core.subscribe_any(kind, self.id, state);
    }

    /// React to `kind` only when emitted by `emitter`.
    pub fn when_from(&mut self, kind: impl Into<String>, emitter: AgentId, state: State<A>) {
        self.core.subscribe_from(kind, emitter, self.id, state);
    }

    /// Drop the any-emitter reaction to `kind`. Returns the number of queued
    /// inbox messages purged with it.
    pub fn ignore(&mut self, kind: &str) -> usize {
        self.core.unsubscribe_any(kind, self.id)
    }

    /// Drop the reaction to `kind` from `emitter`, purging queued matches.
    pub fn ignore_from(&mut self, kind: &str, emitter: AgentId) -> usize {
        self.core.unsubscribe_from(kind, emitter, self.id)
    }

    /// Spawn a child agent with this agent as its context.
    pub fn spawn<B, F>(&mut self, factory: F) -> Result<AgentId>
    where
        B: Agent,
        F: FnOnce() -> Result<B>,
    {
        self.core.spawn(factory, self.id)
    }

    pub fn is_registered(&self, agent: AgentId) -> bool {
        self.core.registry.contains(agent)
    }
}

impl<A> fmt::Debug for Context<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}
