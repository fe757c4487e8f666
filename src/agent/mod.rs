//! Agent state machine runtime.
//!
//! An agent is a plain struct implementing [`Agent`]. Its behavior is a set of
//! named states, each a method with the [`Handler`] signature that returns the
//! next state, or `None` to fall back to [`State::Listen`]. Two states are
//! reserved and implemented by the runtime:
//!
//! - **Listen** pops the oldest inbox message and, if a subscription matches,
//!   transitions to its continuation (replying `<type>_ack` first when asked).
//! - **Halt** broadcasts `halt` and removes the agent from the kernel.
//!
//! ```text
//!   initial ──► custom ──► None ──► Listen ──match──► continuation
//!                 │                   │
//!                 └──── Halt ◄────────┘ (implicit on parent halt)
//! ```
//!
//! Agents only ever see the kernel through a [`Context`].

mod cell;
mod context;

pub(crate) use cell::{AgentCell, Slot};
pub use context::Context;

use std::fmt;

/// Name of the reserved listening state.
pub const LISTEN_STATE: &str = "listen";

/// Name of the reserved terminal state.
pub const HALT_STATE: &str = "halt";

/// Signature of a client state.
pub type Handler<A> = fn(&mut A, &mut Context<'_, A>) -> Transition<A>;

/// Result of running a state; `None` means "no explicit transition" (Listen).
pub type Transition<A> = Option<State<A>>;

/// A client-defined state machine.
pub trait Agent: Sized + fmt::Debug + 'static {
    /// State executed on the agent's first cycle.
    fn initial_state(&self) -> State<Self>;

    /// Human-readable name used in trace titles.
    fn label(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_string()
    }
}

/// Current state of an agent: a reserved state or a named handler.
///
/// Equality is by identity (variant and name), never by function pointer.
pub enum State<A> {
    Listen,
    Halt,
    Custom {
        name: &'static str,
        handler: Handler<A>,
    },
}

impl<A> State<A> {
    pub fn custom(name: &'static str, handler: Handler<A>) -> Self {
        State::Custom { name, handler }
    }

    pub fn name(&self) -> &'static str {
        match *self {
            State::Listen => LISTEN_STATE,
            State::Halt => HALT_STATE,
            State::Custom { name, .. } => name,
        }
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, State::Halt)
    }

    /// A custom state that borrowed a reserved name.
    pub fn is_reserved_violation(&self) -> bool {
        matches!(self, State::Custom { name, .. } if *name == LISTEN_STATE || *name == HALT_STATE)
    }
}

impl<A> Clone for State<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for State<A> {}

impl<A> PartialEq for State<A> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (State::Listen, State::Listen) | (State::Halt, State::Halt) => true,
            (State::Custom { name: a, .. }, State::Custom { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl<A> Eq for State<A> {}

impl<A> fmt::Debug for State<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Listen => write!(f, "Listen"),
            State::Halt => write!(f, "Halt"),
            State::Custom { name, .. } => write!(f, "Custom({name})"),
        }
    }
}

/// Build a [`State::Custom`] named after a method of `Self`.
///
/// ```ignore
/// fn initial_state(&self) -> State<Self> {
///     state!(announce)
/// }
/// ```
#[macro_export]
macro_rules! state {
    ($method:ident) => {
        $crate::agent::State::custom(stringify!($method), Self::$method)
    };
}
