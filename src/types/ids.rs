//! Agent identity.
//!
//! Ids are handed out by the registry in increasing order and never reused
//! within a run. Id 0 is the synthetic root context, which is never registered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lightweight handle naming a registered (or formerly registered) agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(u64);

impl AgentId {
    /// The synthetic root: context of the first agent and emitter of
    /// kernel-level messages.
    pub const ROOT: AgentId = AgentId(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "root")
        } else {
            write!(f, "agent-{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(AgentId::ROOT.to_string(), "root");
        assert_eq!(AgentId::from_raw(7).to_string(), "agent-7");
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_string(&AgentId::from_raw(3)).unwrap();
        assert_eq!(json, "3");
    }
}
