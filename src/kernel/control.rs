//! Control core: exclusive owner of the registry, bus and subscription tables.
//!
//! Every mutation of shared scheduler state funnels through `ControlCore`.
//! Agents reach it only via [`Context`](crate::agent::Context), which borrows
//! it for the duration of a single state invocation.

use super::bus::{self, Delivery, MessageBus};
use super::registry::AgentRegistry;
use super::KernelStats;
use crate::agent::{Agent, AgentCell, State};
use crate::message::{Message, HALT};
use crate::subscriptions::{Continuation, SubscriptionRegistry};
use crate::trace::Tracer;
use crate::types::{AgentId, Error, Result};

#[derive(Debug)]
pub(crate) struct ControlCore {
    pub(crate) registry: AgentRegistry,
    pub(crate) bus: MessageBus,
    pub(crate) subscriptions: SubscriptionRegistry,
    pub(crate) tracer: Tracer,
    pub(crate) stats: KernelStats,
    journal: Option<Vec<Message>>,
    /// Halted agents whose emitter-keyed bindings are still live.
    retired: Vec<AgentId>,
}

impl ControlCore {
    pub(crate) fn new(tracer: Tracer, journal: bool) -> Self {
        Self {
            registry: AgentRegistry::new(),
            bus: MessageBus::new(),
            subscriptions: SubscriptionRegistry::new(),
            tracer,
            stats: KernelStats::default(),
            journal: journal.then(Vec::new),
            retired: Vec::new(),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Construct and register an agent under `context`.
    ///
    /// Nothing is registered (and no id consumed) if the factory fails or the
    /// initial state uses a reserved name.
    pub(crate) fn spawn<A, F>(&mut self, factory: F, context: AgentId) -> Result<AgentId>
    where
        A: Agent,
        F: FnOnce() -> Result<A>,
    {
        let agent = factory().map_err(|err| {
            tracing::debug!(context = %context, error = %err, "agent construction failed");
            err
        })?;

        let initial = agent.initial_state();
        if initial.is_reserved_violation() {
            return Err(Error::reserved_state(format!(
                "{} uses reserved name '{}' for a custom state",
                agent.label(),
                initial.name()
            )));
        }

        let id = self.registry.allocate();
        let label = agent.label();
        self.registry
            .insert(id, context, Box::new(AgentCell::new(agent, initial)));

        // Parent halt cascades to the child.
        self.subscriptions.subscribe_from(
            HALT.to_string(),
            context,
            id,
            Continuation::new(State::<A>::Halt),
        );

        self.tracer.open(id, &label);
        self.stats.agents_spawned += 1;

        tracing::debug!(
            agent = %id,
            context = %context,
            label = %label,
            initial = initial.name(),
            "spawned"
        );
        Ok(id)
    }

    /// Remove an agent that entered Halt: broadcast `halt`, then unregister.
    pub(crate) fn retire(&mut self, id: AgentId) {
        if !self.registry.contains(id) {
            return;
        }

        self.emit(Message::new(HALT, id));

        let discarded = self.registry.remove(id).unwrap_or(0);
        let forgotten = self.subscriptions.forget(id);
        self.tracer.line(id, || "halted".to_string());
        self.tracer.close(id);
        self.stats.agents_halted += 1;
        self.retired.push(id);

        tracing::debug!(agent = %id, discarded, forgotten, "halted");
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    pub(crate) fn subscribe_any<A: Agent>(
        &mut self,
        kind: impl Into<String>,
        subscriber: AgentId,
        state: State<A>,
    ) {
        let kind = kind.into();
        warn_reserved(&state, subscriber);
        tracing::trace!(agent = %subscriber, kind = %kind, state = state.name(), "subscribe any");
        self.subscriptions
            .subscribe_any(kind, subscriber, Continuation::new(state));
    }

    pub(crate) fn subscribe_from<A: Agent>(
        &mut self,
        kind: impl Into<String>,
        emitter: AgentId,
        subscriber: AgentId,
        state: State<A>,
    ) {
        let kind = kind.into();
        warn_reserved(&state, subscriber);
        tracing::trace!(
            agent = %subscriber,
            kind = %kind,
            emitter = %emitter,
            state = state.name(),
            "subscribe from"
        );
        self.subscriptions
            .subscribe_from(kind, emitter, subscriber, Continuation::new(state));
    }

    /// Remove the any-emitter binding and purge every queued message of that
    /// kind from the subscriber's inbox.
    pub(crate) fn unsubscribe_any(&mut self, kind: &str, subscriber: AgentId) -> usize {
        self.subscriptions.unsubscribe_any(kind, subscriber);

        let purged = self
            .registry
            .purge_inbox(subscriber, |message| message.kind() == kind);
        self.stats.messages_purged += purged as u64;

        tracing::trace!(agent = %subscriber, kind, purged, "unsubscribe any");
        purged
    }

    /// Remove the specific-emitter binding and purge every queued message of
    /// that kind from that emitter.
    pub(crate) fn unsubscribe_from(
        &mut self,
        kind: &str,
        emitter: AgentId,
        subscriber: AgentId,
    ) -> usize {
        self.subscriptions.unsubscribe_from(kind, emitter, subscriber);

        let purged = self.registry.purge_inbox(subscriber, |message| {
            message.kind() == kind && message.emitter() == emitter
        });
        self.stats.messages_purged += purged as u64;

        tracing::trace!(agent = %subscriber, kind, emitter = %emitter, purged, "unsubscribe from");
        purged
    }

    // =========================================================================
    // Bus
    // =========================================================================

    /// Append to the bus tail. Returns the assigned sequence number.
    pub(crate) fn emit(&mut self, message: Message) -> u64 {
        let message = self.bus.enqueue(message);
        let seq = message.seq();
        let emitter = message.emitter();

        tracing::trace!(%message, "emit");
        self.tracer.line(emitter, || format!("emit {message}"));
        if let Some(journal) = self.journal.as_mut() {
            journal.push(message.clone());
        }
        self.stats.messages_emitted += 1;

        seq
    }

    /// Drain phase: route every queued message, then collect bindings keyed
    /// by halted emitters once none of their messages are queued anywhere.
    /// Returns how many messages were routed.
    pub(crate) fn drain(&mut self) -> usize {
        let mut routed = 0;
        while let Some(message) = self.bus.pop() {
            routed += 1;
            let seq = message.seq();
            match bus::route(&mut self.registry, message) {
                Delivery::Delivered(n) => {
                    self.stats.messages_delivered += n as u64;
                    tracing::trace!(seq, recipients = n, "delivered");
                }
                Delivery::Dropped => {
                    self.stats.messages_dropped += 1;
                    tracing::trace!(seq, "dropped: destination gone");
                }
            }
        }
        self.collect_retired();
        routed
    }

    fn collect_retired(&mut self) {
        let registry = &self.registry;
        let subscriptions = &mut self.subscriptions;
        self.retired.retain(|&emitter| {
            if registry.holds_from(emitter) {
                return true;
            }
            let collected = subscriptions.forget_emitter(emitter);
            tracing::trace!(emitter = %emitter, collected, "emitter bindings collected");
            false
        });
    }

    pub(crate) fn note_discarded(&mut self, id: AgentId, message: &Message) {
        self.stats.messages_discarded += 1;
        tracing::trace!(agent = %id, %message, "discarded: no subscription");
        self.tracer.line(id, || format!("discarded {message}"));
    }

    // =========================================================================
    // Cycle
    // =========================================================================

    /// Cycle phase for one agent: invoke its current state exactly once.
    pub(crate) fn cycle(&mut self, id: AgentId, turn: u64) {
        let Some(mut slot) = self.registry.take_slot(id) else {
            tracing::warn!(agent = %id, "scheduled agent has no slot; skipping");
            return;
        };

        let inbox = self.registry.inbox_len(id);
        let before = slot.state_name();
        tracing::trace!(agent = %id, turn, state = before, inbox, "cycle");
        self.tracer
            .line(id, || format!("cycle {turn}: {before} (inbox {inbox})"));

        slot.cycle(self, id);
        self.stats.cycles += 1;

        if slot.is_halted() {
            return;
        }

        let after = slot.state_name();
        let title = (after != before && self.tracer.is_enabled())
            .then(|| format!("{}: {after}", slot.label()));
        if self.registry.restore_slot(id, slot) {
            if let Some(title) = title {
                self.tracer.title(id, &title);
            }
        }
    }

    pub(crate) fn journal(&self) -> &[Message] {
        self.journal.as_deref().unwrap_or(&[])
    }
}

fn warn_reserved<A>(state: &State<A>, subscriber: AgentId) {
    if state.is_reserved_violation() {
        tracing::warn!(
            agent = %subscriber,
            state = state.name(),
            "continuation uses a reserved state name; behavior is undefined"
        );
    }
}
