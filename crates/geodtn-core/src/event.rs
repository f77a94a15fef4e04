//! Message lifecycle notifications
//!
//! Routers report what happens to messages through [`Listeners`]. Each event
//! carries a snapshot of the message, so listeners never see a router's
//! live copy.

use std::cell::RefCell;
use std::rc::Rc;

use crate::message::{HostId, Message, MessageId};
use crate::time::SimTime;

/// Something that happened to a message
#[derive(Debug, Clone, PartialEq)]
pub enum MessageEvent {
    /// A host created a new message
    Created { message: Message, at: SimTime },

    /// A transfer over a link began
    TransferStarted {
        message: Message,
        from: HostId,
        to: HostId,
        at: SimTime,
    },

    /// A transfer completed at the receiver
    Transferred {
        message: Message,
        from: HostId,
        to: HostId,
        /// True the first time this host received the message as a final recipient
        first_delivery: bool,
        at: SimTime,
    },

    /// A transfer was cut off before completing
    TransferAborted {
        message: Message,
        from: HostId,
        to: HostId,
        bytes_remaining: u64,
        at: SimTime,
    },

    /// A message left a host's buffer
    Deleted {
        message: Message,
        host: HostId,
        /// True when removed by eviction, expiry or an application,
        /// false when removed after delivery
        dropped: bool,
        at: SimTime,
    },
}

impl MessageEvent {
    pub fn message(&self) -> &Message {
        match self {
            MessageEvent::Created { message, .. }
            | MessageEvent::TransferStarted { message, .. }
            | MessageEvent::Transferred { message, .. }
            | MessageEvent::TransferAborted { message, .. }
            | MessageEvent::Deleted { message, .. } => message,
        }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message().id
    }

    pub fn at(&self) -> SimTime {
        match self {
            MessageEvent::Created { at, .. }
            | MessageEvent::TransferStarted { at, .. }
            | MessageEvent::Transferred { at, .. }
            | MessageEvent::TransferAborted { at, .. }
            | MessageEvent::Deleted { at, .. } => *at,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            MessageEvent::Created { .. } => "created",
            MessageEvent::TransferStarted { .. } => "transfer_started",
            MessageEvent::Transferred { .. } => "transferred",
            MessageEvent::TransferAborted { .. } => "transfer_aborted",
            MessageEvent::Deleted { .. } => "deleted",
        }
    }
}

/// Observer of message events
pub trait MessageListener {
    fn on_event(&mut self, event: &MessageEvent);
}

impl<L: MessageListener + ?Sized> MessageListener for Rc<RefCell<L>> {
    fn on_event(&mut self, event: &MessageEvent) {
        self.borrow_mut().on_event(event);
    }
}

/// Registered listeners, notified in registration order
#[derive(Default)]
pub struct Listeners {
    listeners: Vec<Box<dyn MessageListener>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: impl MessageListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn emit(&mut self, event: MessageEvent) {
        tracing::trace!(kind = event.kind(), message = %event.message_id(), "Message event");
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}

/// Listener that records every event it sees
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<MessageEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared log; register one clone and keep the other for inspection
    pub fn shared() -> Rc<RefCell<EventLog>> {
        Rc::new(RefCell::new(EventLog::new()))
    }

    pub fn events(&self) -> &[MessageEvent] {
        &self.events
    }

    /// Number of events of the given kind
    pub fn count(&self, kind: &str) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }

    /// Number of first deliveries of `id`
    pub fn deliveries(&self, id: &MessageId) -> usize {
        self.events
            .iter()
            .filter(|e| {
                matches!(e, MessageEvent::Transferred { message, first_delivery: true, .. } if &message.id == id)
            })
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl MessageListener for EventLog {
    fn on_event(&mut self, event: &MessageEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::HostId;

    fn created(id: &str) -> MessageEvent {
        MessageEvent::Created {
            message: Message::unicast(id, HostId(0), HostId(1), 10, SimTime::ZERO),
            at: SimTime::ZERO,
        }
    }

    struct Tagger {
        tag: &'static str,
        order: Rc<RefCell<Vec<&'static str>>>,
    }

    impl MessageListener for Tagger {
        fn on_event(&mut self, _event: &MessageEvent) {
            self.order.borrow_mut().push(self.tag);
        }
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::new();
        listeners.register(Tagger { tag: "first", order: order.clone() });
        listeners.register(Tagger { tag: "second", order: order.clone() });

        listeners.emit(created("M1"));
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_shared_event_log() {
        let log = EventLog::shared();
        let mut listeners = Listeners::new();
        listeners.register(log.clone());

        listeners.emit(created("M1"));
        listeners.emit(created("M2"));

        assert_eq!(log.borrow().count("created"), 2);
        assert_eq!(log.borrow().events()[1].message_id(), &MessageId::from("M2"));
    }
}
