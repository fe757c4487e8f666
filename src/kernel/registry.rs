//! Agent registry: round-robin order, inboxes, and the agents themselves.

use std::collections::{HashMap, VecDeque};

use crate::agent::Slot;
use crate::message::Message;
use crate::types::AgentId;

/// One registered agent.
#[derive(Debug)]
struct AgentEntry {
    context: AgentId,
    inbox: VecDeque<Message>,
    /// `None` only while the agent is being cycled.
    slot: Option<Box<dyn Slot>>,
}

/// Registry of live agents.
///
/// NOT a separate actor - owned by the control core and called via &mut self.
/// `order` is the scheduling queue; its iteration order is also the broadcast
/// delivery order.
#[derive(Debug, Default)]
pub(crate) struct AgentRegistry {
    order: VecDeque<AgentId>,
    entries: HashMap<AgentId, AgentEntry>,
    last_id: u64,
}

impl AgentRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Next unused id. Ids are never handed out twice.
    pub(crate) fn allocate(&mut self) -> AgentId {
        self.last_id += 1;
        AgentId::from_raw(self.last_id)
    }

    /// Register at the tail of the schedule.
    pub(crate) fn insert(&mut self, id: AgentId, context: AgentId, slot: Box<dyn Slot>) {
        debug_assert!(!self.entries.contains_key(&id), "agent {id} registered twice");
        self.entries.insert(
            id,
            AgentEntry {
                context,
                inbox: VecDeque::new(),
                slot: Some(slot),
            },
        );
        self.order.push_back(id);
    }

    /// Unregister; the inbox is discarded. Returns the number of discarded messages.
    pub(crate) fn remove(&mut self, id: AgentId) -> Option<usize> {
        let entry = self.entries.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(entry.inbox.len())
    }

    pub(crate) fn contains(&self, id: AgentId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Move the head of the schedule to the tail and return it.
    pub(crate) fn rotate(&mut self) -> Option<AgentId> {
        let id = self.order.pop_front()?;
        self.order.push_back(id);
        Some(id)
    }

    /// Registered agents in schedule order.
    pub(crate) fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.order.iter().copied()
    }

    pub(crate) fn context_of(&self, id: AgentId) -> Option<AgentId> {
        self.entries.get(&id).map(|entry| entry.context)
    }

    /// Append to the agent's inbox. Returns false if it is not registered.
    pub(crate) fn deliver(&mut self, id: AgentId, message: Message) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.inbox.push_back(message);
                true
            }
            None => false,
        }
    }

    pub(crate) fn pop_inbox(&mut self, id: AgentId) -> Option<Message> {
        self.entries.get_mut(&id)?.inbox.pop_front()
    }

    pub(crate) fn inbox_len(&self, id: AgentId) -> usize {
        self.entries.get(&id).map_or(0, |entry| entry.inbox.len())
    }

    /// Remove inbox messages matching `stale`, keeping the rest in order.
    pub(crate) fn purge_inbox(
        &mut self,
        id: AgentId,
        mut stale: impl FnMut(&Message) -> bool,
    ) -> usize {
        let Some(entry) = self.entries.get_mut(&id) else {
            return 0;
        };
        let before = entry.inbox.len();
        entry.inbox.retain(|message| !stale(message));
        before - entry.inbox.len()
    }

    /// True if any inbox still holds a message from `emitter`.
    pub(crate) fn holds_from(&self, emitter: AgentId) -> bool {
        self.entries
            .values()
            .any(|entry| entry.inbox.iter().any(|m| m.emitter() == emitter))
    }

    pub(crate) fn take_slot(&mut self, id: AgentId) -> Option<Box<dyn Slot>> {
        self.entries.get_mut(&id)?.slot.take()
    }

    /// Put a cycled agent back; dropped if it was removed meanwhile.
    pub(crate) fn restore_slot(&mut self, id: AgentId, slot: Box<dyn Slot>) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.slot = Some(slot);
                true
            }
            None => false,
        }
    }

    pub(crate) fn slot(&self, id: AgentId) -> Option<&dyn Slot> {
        self.entries.get(&id)?.slot.as_deref()
    }
}
