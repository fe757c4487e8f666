//! # Agent Kernel - Message-Driven State Machine Scheduler
//!
//! A deterministic, single-threaded kernel for composing cooperating agents
//! that interact only through typed, asynchronous messages:
//! - Agent lifecycle (spawn, halt) with implicit parent-to-child halt cascade
//! - Message bus with targeted and broadcast (self-excluding) delivery
//! - Subscription tables keyed by type or by (type, emitter)
//! - Built-in Listen and Halt states
//! - Acknowledgment protocol for correlated request/response
//! - Optional per-agent text trace and step mode
//!
//! ## Architecture
//!
//! The kernel follows a single-owner model where the `Kernel` owns all mutable state:
//! ```text
//!                    ┌─────────────────────────────────┐
//!   Context ops   →  │         Control Core            │
//!                    │  ┌─────────┐ ┌─────────┐        │
//!                    │  │  Agent  │ │ Message │        │
//!                    │  │Registry │ │   Bus   │        │
//!                    │  └─────────┘ └─────────┘        │
//!                    │  ┌─────────┐ ┌─────────┐        │
//!                    │  │Subscrip-│ │ Tracer  │        │
//!                    │  │  tions  │ │         │        │
//!                    │  └─────────┘ └─────────┘        │
//!                    └─────────────────────────────────┘
//! ```
//!
//! Agents hold ids, never references to each other, and reach the core only
//! through the [`Context`] lent to them for a single state invocation.

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Re-export public API
pub mod agent;
pub mod kernel;
pub mod message;
pub mod trace;
pub mod types;

mod subscriptions;

// Internal utilities
pub mod observability;

pub use agent::{Agent, Context, Handler, State, Transition};
pub use kernel::{Kernel, KernelStats};
pub use message::Message;
pub use types::{AgentId, Config, Error, KernelConfig, Result};
