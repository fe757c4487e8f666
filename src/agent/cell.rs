//! Per-agent cell: the agent value, its current state, and the built-in
//! Listen/Halt behavior.

use std::fmt;

use super::{Agent, Context, State, Transition};
use crate::kernel::control::ControlCore;
use crate::message::Message;
use crate::types::AgentId;

/// Type-erased view of an [`AgentCell`] so the registry can hold agents of
/// different types.
pub(crate) trait Slot: fmt::Debug {
    fn label(&self) -> String;

    fn state_name(&self) -> &'static str;

    fn is_halted(&self) -> bool;

    /// Run the current state exactly once.
    fn cycle(&mut self, core: &mut ControlCore, id: AgentId);
}

pub(crate) struct AgentCell<A: Agent> {
    agent: A,
    state: State<A>,
    /// Message accepted by the last Listen, visible to its continuation.
    current: Option<Message>,
    halted: bool,
}

impl<A: Agent> AgentCell<A> {
    pub(crate) fn new(agent: A, initial: State<A>) -> Self {
        Self {
            agent,
            state: initial,
            current: None,
            halted: false,
        }
    }

    fn listen(&mut self, core: &mut ControlCore, id: AgentId) -> Transition<A> {
        let message = core.registry.pop_inbox(id)?;

        let Some(next) = core.subscriptions.resolve::<A>(&message, id) else {
            core.note_discarded(id, &message);
            return None;
        };

        if message.ack_requested() {
            core.emit(message.acknowledgement(id));
        }

        tracing::trace!(agent = %id, message = %message, next = next.name(), "accepted");
        core.tracer
            .line(id, || format!("accepted {message} -> {}", next.name()));

        self.current = Some(message);
        Some(next)
    }
}

impl<A: Agent> Slot for AgentCell<A> {
    fn label(&self) -> String {
        self.agent.label()
    }

    fn state_name(&self) -> &'static str {
        self.state.name()
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn cycle(&mut self, core: &mut ControlCore, id: AgentId) {
        if self.halted {
            return;
        }

        let next = match self.state {
            State::Halt => {
                self.halted = true;
                core.retire(id);
                return;
            }
            State::Listen => self.listen(core, id),
            State::Custom { handler, .. } => {
                let mut ctx = Context::new(core, id, self.current.as_ref());
                handler(&mut self.agent, &mut ctx)
            }
        };

        self.state = next.unwrap_or(State::Listen);
    }
}

impl<A: Agent> fmt::Debug for AgentCell<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentCell")
            .field("agent", &self.agent)
            .field("state", &self.state)
            .field("halted", &self.halted)
            .finish()
    }
}
