//! Step mode: pause for external confirmation between cycles.

use std::io::{self, BufRead, Write};

use crate::types::AgentId;

/// Called once before every cycle while step mode is on.
pub trait StepGate {
    fn pause(&mut self, turn: u64, next: AgentId);
}

/// Waits for a line on stdin. Read errors (closed stdin) just let the run continue.
#[derive(Debug, Default)]
pub struct StdinGate;

impl StepGate for StdinGate {
    fn pause(&mut self, turn: u64, next: AgentId) {
        let mut stderr = io::stderr();
        let _ = write!(stderr, "turn {turn}: next {next} [enter] ");
        let _ = stderr.flush();

        let mut line = String::new();
        if let Err(err) = io::stdin().lock().read_line(&mut line) {
            tracing::debug!(error = %err, "step gate read failed; continuing");
        }
    }
}

/// Gate backed by a closure, handy for embedding and tests.
pub struct FnGate<F>(pub F);

impl<F: FnMut(u64, AgentId)> StepGate for FnGate<F> {
    fn pause(&mut self, turn: u64, next: AgentId) {
        (self.0)(turn, next)
    }
}

impl<F> std::fmt::Debug for FnGate<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnGate")
    }
}
