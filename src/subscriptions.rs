//! Subscription registry: who reacts to which message, and in which state.
//!
//! Two tables, both keyed further by subscriber:
//!   - **any-emitter**: `type -> subscriber -> continuation`
//!   - **specific-emitter**: `(type, emitter) -> subscriber -> continuation`
//!
//! Lookup consults the specific-emitter table first, so a binding on a named
//! emitter shadows a type-wide one for that emitter's messages. At most one
//! continuation exists per (key, subscriber); registering again overwrites.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::agent::{Agent, State};
use crate::message::Message;
use crate::types::AgentId;

/// A `State<A>` with the agent type erased.
pub(crate) struct Continuation {
    name: &'static str,
    state: Box<dyn Any>,
}

impl Continuation {
    pub(crate) fn new<A: Agent>(state: State<A>) -> Self {
        Self {
            name: state.name(),
            state: Box::new(state),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Recover the typed state; `None` if registered for another agent type.
    pub(crate) fn resume<A: Agent>(&self) -> Option<State<A>> {
        self.state.downcast_ref::<State<A>>().copied()
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Continuation({})", self.name)
    }
}

type Bindings = HashMap<AgentId, Continuation>;

#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    any: HashMap<String, Bindings>,
    from: HashMap<(String, AgentId), Bindings>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns true if an earlier binding was overwritten.
    pub(crate) fn subscribe_any(
        &mut self,
        kind: String,
        subscriber: AgentId,
        continuation: Continuation,
    ) -> bool {
        self.any
            .entry(kind)
            .or_default()
            .insert(subscriber, continuation)
            .is_some()
    }

    /// Returns true if an earlier binding was overwritten.
    pub(crate) fn subscribe_from(
        &mut self,
        kind: String,
        emitter: AgentId,
        subscriber: AgentId,
        continuation: Continuation,
    ) -> bool {
        self.from
            .entry((kind, emitter))
            .or_default()
            .insert(subscriber, continuation)
            .is_some()
    }

    pub(crate) fn unsubscribe_any(&mut self, kind: &str, subscriber: AgentId) -> bool {
        let Some(bindings) = self.any.get_mut(kind) else {
            return false;
        };
        let removed = bindings.remove(&subscriber).is_some();
        if bindings.is_empty() {
            self.any.remove(kind);
        }
        removed
    }

    pub(crate) fn unsubscribe_from(
        &mut self,
        kind: &str,
        emitter: AgentId,
        subscriber: AgentId,
    ) -> bool {
        let key = (kind.to_string(), emitter);
        let Some(bindings) = self.from.get_mut(&key) else {
            return false;
        };
        let removed = bindings.remove(&subscriber).is_some();
        if bindings.is_empty() {
            self.from.remove(&key);
        }
        removed
    }

    /// Find the continuation `subscriber` holds for `message`.
    pub(crate) fn lookup(&self, message: &Message, subscriber: AgentId) -> Option<&Continuation> {
        let key = (message.kind().to_string(), message.emitter());
        self.from
            .get(&key)
            .and_then(|bindings| bindings.get(&subscriber))
            .or_else(|| {
                self.any
                    .get(message.kind())
                    .and_then(|bindings| bindings.get(&subscriber))
            })
    }

    /// Typed lookup used by the Listen state.
    pub(crate) fn resolve<A: Agent>(
        &self,
        message: &Message,
        subscriber: AgentId,
    ) -> Option<State<A>> {
        let continuation = self.lookup(message, subscriber)?;
        let state = continuation.resume::<A>();
        if state.is_none() {
            tracing::warn!(
                agent = %subscriber,
                continuation = continuation.name(),
                "continuation registered for a different agent type; ignoring"
            );
        }
        state
    }

    /// Drop every binding held by `agent`.
    ///
    /// Bindings that name `agent` as emitter stay: its last messages (the
    /// `halt` broadcast included) may still be sitting in other inboxes.
    pub(crate) fn forget(&mut self, agent: AgentId) -> usize {
        let mut removed = 0;

        for bindings in self.any.values_mut() {
            removed += usize::from(bindings.remove(&agent).is_some());
        }
        self.any.retain(|_, bindings| !bindings.is_empty());

        for bindings in self.from.values_mut() {
            removed += usize::from(bindings.remove(&agent).is_some());
        }
        self.from.retain(|_, bindings| !bindings.is_empty());

        removed
    }

    /// Drop every binding keyed by `emitter`. Only sound once none of its
    /// messages can still arrive.
    pub(crate) fn forget_emitter(&mut self, emitter: AgentId) -> usize {
        let mut removed = 0;
        self.from.retain(|(_, from), bindings| {
            if *from != emitter {
                return true;
            }
            removed += bindings.len();
            false
        });
        removed
    }

    /// Total number of bindings across both tables.
    pub(crate) fn len(&self) -> usize {
        self.any.values().map(HashMap::len).sum::<usize>()
            + self.from.values().map(HashMap::len).sum::<usize>()
    }
}
