//! Message bus and routing.
//!
//! The bus is a FIFO of emitted-but-undelivered messages. The drain phase
//! empties it into inboxes using [`route`]:
//!   - destination set: that agent's inbox if still registered, else dropped
//!   - destination unset: every registered agent except the emitter

use std::collections::VecDeque;

use super::registry::AgentRegistry;
use crate::message::Message;

/// Outcome of routing one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Delivered to this many inboxes (possibly zero for a lone broadcaster).
    Delivered(usize),
    /// Destination no longer registered.
    Dropped,
}

#[derive(Debug, Default)]
pub(crate) struct MessageBus {
    queue: VecDeque<Message>,
    last_seq: u64,
}

impl MessageBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stamp the next sequence number and append to the tail.
    pub(crate) fn enqueue(&mut self, message: Message) -> &Message {
        self.last_seq += 1;
        self.queue.push_back(message.stamped(self.last_seq));
        &self.queue[self.queue.len() - 1]
    }

    pub(crate) fn pop(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Sequence number of the most recent message (0 if none yet).
    pub(crate) fn last_seq(&self) -> u64 {
        self.last_seq
    }
}

pub(crate) fn route(registry: &mut AgentRegistry, message: Message) -> Delivery {
    if let Some(destination) = message.destination() {
        return if registry.deliver(destination, message) {
            Delivery::Delivered(1)
        } else {
            Delivery::Dropped
        };
    }

    let emitter = message.emitter();
    let recipients: Vec<_> = registry.ids().filter(|id| *id != emitter).collect();
    for id in &recipients {
        registry.deliver(*id, message.clone());
    }
    Delivery::Delivered(recipients.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Slot;
    use crate::kernel::control::ControlCore;
    use crate::types::AgentId;

    #[derive(Debug)]
    struct Inert;

    impl Slot for Inert {
        fn label(&self) -> String {
            "Inert".to_string()
        }

        fn state_name(&self) -> &'static str {
            "listen"
        }

        fn is_halted(&self) -> bool {
            false
        }

        fn cycle(&mut self, _core: &mut ControlCore, _id: AgentId) {}
    }

    fn registry_with(n: usize) -> (AgentRegistry, Vec<AgentId>) {
        let mut registry = AgentRegistry::new();
        let ids = (0..n)
            .map(|_| {
                let id = registry.allocate();
                registry.insert(id, AgentId::ROOT, Box::new(Inert));
                id
            })
            .collect();
        (registry, ids)
    }

    #[test]
    fn test_sequence_numbers_increase_from_one() {
        let mut bus = MessageBus::new();
        let seqs: Vec<u64> = (0..5)
            .map(|_| bus.enqueue(Message::new("tick", AgentId::ROOT)).seq())
            .collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        assert_eq!(bus.len(), 5);
        assert_eq!(bus.last_seq(), 5);
    }

    #[test]
    fn test_bus_is_fifo() {
        let mut bus = MessageBus::new();
        bus.enqueue(Message::new("a", AgentId::ROOT));
        bus.enqueue(Message::new("b", AgentId::ROOT));
        assert_eq!(bus.pop().unwrap().kind(), "a");
        assert_eq!(bus.pop().unwrap().kind(), "b");
        assert_eq!(bus.len(), 0);
    }

    #[test]
    fn test_broadcast_excludes_emitter() {
        let (mut registry, ids) = registry_with(3);
        let delivery = route(&mut registry, Message::new("go", ids[1]));

        assert_eq!(delivery, Delivery::Delivered(2));
        assert_eq!(registry.inbox_len(ids[0]), 1);
        assert_eq!(registry.inbox_len(ids[1]), 0);
        assert_eq!(registry.inbox_len(ids[2]), 1);
    }

    #[test]
    fn test_broadcast_from_root_reaches_everyone() {
        let (mut registry, ids) = registry_with(2);
        let delivery = route(&mut registry, Message::new("go", AgentId::ROOT));
        assert_eq!(delivery, Delivery::Delivered(2));
        assert!(ids.iter().all(|id| registry.inbox_len(*id) == 1));
    }

    #[test]
    fn test_targeted_delivery() {
        let (mut registry, ids) = registry_with(2);
        let delivery = route(&mut registry, Message::new("ping", ids[0]).to(ids[1]));
        assert_eq!(delivery, Delivery::Delivered(1));
        assert_eq!(registry.inbox_len(ids[0]), 0);
        assert_eq!(registry.inbox_len(ids[1]), 1);
    }

    #[test]
    fn test_missing_destination_is_dropped() {
        let (mut registry, ids) = registry_with(2);
        registry.remove(ids[1]);
        let delivery = route(&mut registry, Message::new("ping", ids[0]).to(ids[1]));
        assert_eq!(delivery, Delivery::Dropped);
        assert_eq!(registry.inbox_len(ids[0]), 0);
    }
}
