//! Kernel - the control core and its two-phase run loop.
//!
//! The Kernel owns all mutable state. Subsystems (agent registry, message bus,
//! subscription tables, tracer) are plain structs owned by the control core,
//! not separate actors. Each turn:
//!
//! ```text
//!   drain:  bus ──route──► inboxes      (until the bus is empty)
//!   cycle:  head of registry ──► tail, run its current state once
//! ```
//!
//! The run ends when no agents remain registered.

pub(crate) mod bus;
pub(crate) mod control;
pub(crate) mod registry;
pub mod step;

pub use step::{FnGate, StdinGate, StepGate};

use serde::{Deserialize, Serialize};
use std::fmt;

use self::control::ControlCore;
use crate::agent::{Agent, State};
use crate::message::Message;
use crate::trace::{DirectorySinks, SinkFactory, StderrSinks, Tracer};
use crate::types::{AgentId, Error, KernelConfig, Result};

/// Counters accumulated over a run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelStats {
    pub agents_spawned: u64,
    pub agents_halted: u64,
    pub messages_emitted: u64,
    /// Inbox insertions (a broadcast counts once per recipient).
    pub messages_delivered: u64,
    /// Targeted messages whose destination was gone.
    pub messages_dropped: u64,
    /// Messages popped by Listen with no matching subscription.
    pub messages_discarded: u64,
    /// Inbox messages removed by unsubscribe.
    pub messages_purged: u64,
    pub cycles: u64,
}

/// The scheduler.
pub struct Kernel {
    core: ControlCore,
    config: KernelConfig,
    gate: Option<Box<dyn StepGate>>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        let tracer = match (config.debug, &config.trace_dir) {
            (false, _) => Tracer::disabled(),
            (true, Some(dir)) => Tracer::new(Box::new(DirectorySinks::new(dir))),
            (true, None) => Tracer::new(Box::new(StderrSinks)),
        };
        let gate = config
            .step
            .then(|| Box::new(StdinGate) as Box<dyn StepGate>);

        Self {
            core: ControlCore::new(tracer, config.journal),
            config,
            gate,
        }
    }

    /// Send the per-agent trace to `factory` and turn debug on. Call before
    /// spawning.
    pub fn with_trace_sinks(mut self, factory: impl SinkFactory + 'static) -> Self {
        self.config.debug = true;
        self.core.tracer = Tracer::new(Box::new(factory));
        self
    }

    /// Pause at `gate` before every cycle.
    pub fn with_step_gate(mut self, gate: impl StepGate + 'static) -> Self {
        self.gate = Some(Box::new(gate));
        self
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    // =========================================================================
    // Control core operations
    // =========================================================================

    /// Construct an agent and register it at the tail of the schedule.
    pub fn spawn<A, F>(&mut self, factory: F, context: AgentId) -> Result<AgentId>
    where
        A: Agent,
        F: FnOnce() -> Result<A>,
    {
        self.core.spawn(factory, context)
    }

    pub fn subscribe_any<A: Agent>(
        &mut self,
        kind: impl Into<String>,
        subscriber: AgentId,
        state: State<A>,
    ) {
        self.core.subscribe_any(kind, subscriber, state);
    }

    pub fn subscribe_from<A: Agent>(
        &mut self,
        kind: impl Into<String>,
        emitter: AgentId,
        subscriber: AgentId,
        state: State<A>,
    ) {
        self.core.subscribe_from(kind, emitter, subscriber, state);
    }

    /// Returns the number of purged inbox messages.
    pub fn unsubscribe_any(&mut self, kind: &str, subscriber: AgentId) -> usize {
        self.core.unsubscribe_any(kind, subscriber)
    }

    /// Returns the number of purged inbox messages.
    pub fn unsubscribe_from(&mut self, kind: &str, emitter: AgentId, subscriber: AgentId) -> usize {
        self.core.unsubscribe_from(kind, emitter, subscriber)
    }

    /// Append a message to the bus. Returns its sequence number.
    pub fn emit(&mut self, message: Message) -> u64 {
        self.core.emit(message)
    }

    // =========================================================================
    // Run loop
    // =========================================================================

    /// Spawn the root agent under the synthetic root and run to completion.
    pub fn run<A, F>(&mut self, factory: F) -> Result<KernelStats>
    where
        A: Agent,
        F: FnOnce() -> Result<A>,
    {
        let root = self.spawn(factory, AgentId::ROOT)?;
        tracing::info!(root = %root, "run started");
        self.run_loop()
    }

    /// Turn until the registry is empty (or `max_cycles` is hit).
    pub fn run_loop(&mut self) -> Result<KernelStats> {
        loop {
            if let Some(max) = self.config.max_cycles {
                if self.core.stats.cycles >= max && !self.core.registry.is_empty() {
                    tracing::warn!(
                        max_cycles = max,
                        agents = self.agent_count(),
                        "cycle limit reached"
                    );
                    return Err(Error::CycleLimit(max));
                }
            }
            if !self.turn() {
                break;
            }
        }

        let stats = self.core.stats.clone();
        tracing::info!(
            cycles = stats.cycles,
            emitted = stats.messages_emitted,
            spawned = stats.agents_spawned,
            "run finished"
        );
        Ok(stats)
    }

    /// One drain phase plus one cycle. Returns false once no agents remain.
    pub fn turn(&mut self) -> bool {
        self.core.drain();

        let Some(id) = self.core.registry.rotate() else {
            return false;
        };
        let turn = self.core.stats.cycles + 1;

        if let Some(gate) = self.gate.as_mut() {
            gate.pause(turn, id);
        }
        self.core.cycle(id, turn);
        true
    }

    /// Drain phase only. Returns the number of messages routed.
    pub fn drain(&mut self) -> usize {
        self.core.drain()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn agent_count(&self) -> usize {
        self.core.registry.len()
    }

    pub fn is_registered(&self, agent: AgentId) -> bool {
        self.core.registry.contains(agent)
    }

    pub fn inbox_len(&self, agent: AgentId) -> usize {
        self.core.registry.inbox_len(agent)
    }

    /// Name of the agent's current state, if registered.
    pub fn state_of(&self, agent: AgentId) -> Option<&'static str> {
        self.core
            .registry
            .slot(agent)
            .map(|slot| slot.state_name())
    }

    /// Registered agents in schedule order.
    pub fn agents(&self) -> Vec<AgentId> {
        self.core.registry.ids().collect()
    }

    /// Messages emitted but not yet drained.
    pub fn pending_messages(&self) -> usize {
        self.core.bus.len()
    }

    /// Sequence number of the most recently emitted message (0 before any).
    pub fn last_seq(&self) -> u64 {
        self.core.bus.last_seq()
    }

    pub fn subscription_count(&self) -> usize {
        self.core.subscriptions.len()
    }

    pub fn stats(&self) -> &KernelStats {
        &self.core.stats
    }

    /// Every emitted message in sequence order (empty unless `journal` is on).
    pub fn journal(&self) -> &[Message] {
        self.core.journal()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("core", &self.core)
            .field("config", &self.config)
            .field("step_gate", &self.gate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Context, Transition};
    use crate::message::HALT;
    use crate::trace::MemoryTrace;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tracing_test::traced_test;

    /// Listens for `poke` from anyone and counts them.
    #[derive(Debug, Default)]
    struct Counter {
        pokes: u32,
    }

    impl Counter {
        fn setup(&mut self, ctx: &mut Context<'_, Self>) -> Transition<Self> {
            ctx.when("poke", State::custom("poked", Self::poked));
            None
        }

        fn poked(&mut self, _ctx: &mut Context<'_, Self>) -> Transition<Self> {
            self.pokes += 1;
            None
        }
    }

    impl Agent for Counter {
        fn initial_state(&self) -> State<Self> {
            State::custom("setup", Self::setup)
        }
    }

    /// Runs `steps` custom cycles then halts.
    #[derive(Debug)]
    struct Countdown {
        steps: u32,
    }

    impl Countdown {
        fn tick(&mut self, _ctx: &mut Context<'_, Self>) -> Transition<Self> {
            if self.steps == 0 {
                return Some(State::Halt);
            }
            self.steps -= 1;
            Some(State::custom("tick", Self::tick))
        }
    }

    impl Agent for Countdown {
        fn initial_state(&self) -> State<Self> {
            State::custom("tick", Self::tick)
        }
    }

    fn journaled() -> Kernel {
        Kernel::new(KernelConfig {
            journal: true,
            ..KernelConfig::default()
        })
    }

    #[test]
    fn test_run_ends_when_registry_empty() {
        let mut kernel = journaled();
        let stats = kernel.run(|| Ok(Countdown { steps: 2 })).unwrap();

        // tick, tick, tick (-> Halt), halt
        assert_eq!(stats.cycles, 4);
        assert_eq!(stats.agents_spawned, 1);
        assert_eq!(stats.agents_halted, 1);
        assert_eq!(kernel.agent_count(), 0);
        assert_eq!(kernel.journal().len(), 1);
        assert_eq!(kernel.journal()[0].kind(), HALT);
        assert!(!kernel.turn());
    }

    #[test]
    fn test_run_propagates_construction_failure() {
        let mut kernel = Kernel::default();
        let result = kernel.run::<Countdown, _>(|| Err(Error::construction("bad input")));
        assert!(matches!(result, Err(Error::Construction(_))));
        assert_eq!(kernel.agent_count(), 0);
        assert_eq!(kernel.stats().cycles, 0);
    }

    #[test]
    fn test_round_robin_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&order);
        let gate = FnGate(move |_: u64, id: AgentId| seen.borrow_mut().push(id));
        let mut kernel = Kernel::default().with_step_gate(gate);

        let a = kernel.spawn(|| Ok(Countdown { steps: 5 }), AgentId::ROOT).unwrap();
        let b = kernel.spawn(|| Ok(Countdown { steps: 5 }), AgentId::ROOT).unwrap();
        for _ in 0..4 {
            kernel.turn();
        }
        assert_eq!(*order.borrow(), vec![a, b, a, b]);
    }

    #[test]
    fn test_step_gate_sees_increasing_turns() {
        let turns = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&turns);
        let gate = FnGate(move |turn: u64, _: AgentId| seen.borrow_mut().push(turn));
        let mut kernel = Kernel::default().with_step_gate(gate);

        kernel.run(|| Ok(Countdown { steps: 1 })).unwrap();
        assert_eq!(*turns.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_cycle_limit() {
        let mut kernel = Kernel::new(KernelConfig {
            max_cycles: Some(10),
            ..KernelConfig::default()
        });
        // A listener with nothing to hear never halts.
        let result = kernel.run(|| Ok(Counter::default()));
        assert!(matches!(result, Err(Error::CycleLimit(10))));
        assert_eq!(kernel.stats().cycles, 10);
        assert_eq!(kernel.agent_count(), 1);
    }

    #[test]
    fn test_kernel_emit_reaches_agents() {
        let mut kernel = Kernel::default();
        let a = kernel.spawn(|| Ok(Counter::default()), AgentId::ROOT).unwrap();
        kernel.turn(); // setup

        kernel.emit(Message::new("poke", AgentId::ROOT).with_payload(json!(1)));
        assert_eq!(kernel.pending_messages(), 1);
        assert_eq!(kernel.drain(), 1);
        assert_eq!(kernel.inbox_len(a), 1);

        kernel.turn(); // listen -> poked
        assert_eq!(kernel.state_of(a), Some("poked"));
        kernel.turn();
        assert_eq!(kernel.state_of(a), Some("listen"));
    }

    #[test]
    fn test_root_halt_cascades_to_first_agent() {
        let mut kernel = Kernel::default();
        let a = kernel.spawn(|| Ok(Counter::default()), AgentId::ROOT).unwrap();

        kernel.emit(Message::new(HALT, AgentId::ROOT));
        let stats = kernel.run_loop().unwrap();

        assert!(!kernel.is_registered(a));
        assert_eq!(stats.agents_halted, 1);
    }

    #[test]
    fn test_debug_trace_to_memory() {
        let trace = MemoryTrace::new();
        let mut kernel = Kernel::new(KernelConfig {
            debug: true,
            ..KernelConfig::default()
        })
        .with_trace_sinks(trace.clone());

        kernel.run(|| Ok(Countdown { steps: 0 })).unwrap();
        let id = AgentId::from_raw(1);
        let lines = trace.lines(id);

        assert_eq!(lines[0], "#Countdown (agent-1)");
        assert!(lines.iter().any(|l| l == "cycle 1: tick (inbox 0)"));
        assert!(lines.iter().any(|l| l == "#Countdown: halt"));
        assert!(lines.iter().any(|l| l.starts_with("emit #1 halt from agent-1")));
        assert_eq!(lines.last().map(String::as_str), Some("halted"));
    }

    #[test]
    fn test_trace_sinks_turn_debug_on() {
        let trace = MemoryTrace::new();
        let mut kernel = Kernel::default().with_trace_sinks(trace.clone());
        assert!(kernel.config().debug);

        kernel.run(|| Ok(Countdown { steps: 0 })).unwrap();
        assert!(!trace.lines(AgentId::from_raw(1)).is_empty());
    }

    #[test]
    #[traced_test]
    fn test_unmatched_message_is_discarded() {
        let mut kernel = Kernel::default();
        let a = kernel.spawn(|| Ok(Counter::default()), AgentId::ROOT).unwrap();
        kernel.turn();

        kernel.emit(Message::new("shove", AgentId::ROOT).with_payload(Value::Null));
        kernel.turn();

        assert_eq!(kernel.state_of(a), Some("listen"));
        assert_eq!(kernel.stats().messages_discarded, 1);
        assert!(logs_contain("discarded: no subscription"));
    }

    #[test]
    fn test_stats_serialize() {
        let stats = KernelStats {
            cycles: 3,
            ..KernelStats::default()
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["cycles"], 3);
        assert_eq!(value["messages_dropped"], 0);
    }
}
