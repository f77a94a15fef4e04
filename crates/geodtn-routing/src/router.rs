//! Router base: storage, incoming transfers and delivery bookkeeping
//!
//! [`MessageRouter`] accepts every offer; admission control lives in the
//! active router built on top of it. What it does own:
//!
//! - the message buffer
//! - in-progress inbound copies, keyed by `(id, sender)` so that the same
//!   message arriving from two peers at once does not collide
//! - the delivered set (ids this host received as a final recipient)
//! - the blacklist (ids an application dropped here)
//! - the application pipeline

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use geodtn_core::{
    Coord, HostId, Listeners, Message, MessageEvent, MessageId, RouterConfig, SimTime,
};

use crate::application::Application;
use crate::buffer::MessageBuffer;
use crate::error::{RoutingError, RoutingResult};

/// Outcome of a completed inbound transfer
#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    pub id: MessageId,
    /// Whether this host is a final recipient (after any application retarget)
    pub final_recipient: bool,
    /// True only the first time this host receives the id as a final recipient
    pub first_delivery: bool,
    /// Whether the message ended up in the buffer
    pub buffered: bool,
}

/// Per-host message store
#[derive(Debug)]
pub struct MessageRouter {
    host: HostId,
    config: RouterConfig,
    buffer: MessageBuffer,
    incoming: BTreeMap<(MessageId, HostId), Message>,
    delivered: BTreeSet<MessageId>,
    blacklist: BTreeSet<MessageId>,
    applications: Vec<Box<dyn Application>>,
}

impl MessageRouter {
    pub fn new(host: HostId, config: RouterConfig) -> Self {
        Self {
            host,
            buffer: MessageBuffer::new(config.buffer_size),
            config,
            incoming: BTreeMap::new(),
            delivered: BTreeSet::new(),
            blacklist: BTreeSet::new(),
            applications: Vec::new(),
        }
    }

    pub fn host(&self) -> HostId {
        self.host
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut MessageBuffer {
        &mut self.buffer
    }

    pub fn has_message(&self, id: &MessageId) -> bool {
        self.buffer.contains(id)
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.buffer.get(id)
    }

    pub fn message_count(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer capacity minus occupancy; negative while transiently overfull
    pub fn free_buffer_size(&self) -> i64 {
        self.buffer.free()
    }

    pub fn is_delivered(&self, id: &MessageId) -> bool {
        self.delivered.contains(id)
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    pub fn is_blacklisted(&self, id: &MessageId) -> bool {
        self.blacklist.contains(id)
    }

    pub fn blacklist_count(&self) -> usize {
        self.blacklist.len()
    }

    pub fn is_incoming(&self, id: &MessageId, from: HostId) -> bool {
        self.incoming.contains_key(&(id.clone(), from))
    }

    pub fn add_application(&mut self, app: Box<dyn Application>) {
        self.applications.push(app);
    }

    pub fn update_applications(&mut self, now: SimTime) {
        for app in &mut self.applications {
            app.update(self.host, now);
        }
    }

    /// Buffer a freshly created message and announce it
    pub fn add_created(&mut self, message: Message, now: SimTime, listeners: &mut Listeners) {
        let snapshot = message.clone();
        self.buffer.insert(message);
        listeners.emit(MessageEvent::Created {
            message: snapshot,
            at: now,
        });
    }

    /// Start receiving a replica of `message` from `from`
    pub fn receive(
        &mut self,
        message: &Message,
        from: HostId,
        now: SimTime,
        listeners: &mut Listeners,
    ) {
        let mut replica = message.replicate();
        replica.add_hop(self.host);
        let snapshot = replica.clone();
        self.incoming.insert((replica.id.clone(), from), replica);
        listeners.emit(MessageEvent::TransferStarted {
            message: snapshot,
            from,
            to: self.host,
            at: now,
        });
    }

    /// Complete an inbound transfer
    ///
    /// Geocast messages stay buffered at final recipients because more
    /// region members may still need them. Unicast messages are buffered
    /// only while in transit.
    pub fn transferred(
        &mut self,
        id: &MessageId,
        from: HostId,
        location: Coord,
        now: SimTime,
        listeners: &mut Listeners,
    ) -> RoutingResult<Arrival> {
        let mut message = self
            .incoming
            .remove(&(id.clone(), from))
            .ok_or_else(|| RoutingError::MissingIncoming {
                host: self.host,
                id: id.clone(),
                from,
            })?;
        message.received_at = now;
        let arrived = message.clone();

        let mut kept = Some(message);
        for app in &mut self.applications {
            let Some(m) = kept.take() else { break };
            kept = if app.wants(&m) {
                app.handle(m, self.host, now)
            } else {
                Some(m)
            };
        }

        let arrival = match kept {
            Some(message) => {
                let final_recipient = message.is_final_recipient(self.host, location);
                let first_delivery = final_recipient && !self.delivered.contains(id);
                if first_delivery {
                    self.delivered.insert(id.clone());
                }
                let buffered = message.destination.is_geocast() || !final_recipient;
                if buffered {
                    self.buffer.insert(message);
                }
                Arrival {
                    id: id.clone(),
                    final_recipient,
                    first_delivery,
                    buffered,
                }
            }
            None => {
                debug!("Application at {} dropped {}", self.host, id);
                self.blacklist.insert(id.clone());
                Arrival {
                    id: id.clone(),
                    final_recipient: false,
                    first_delivery: false,
                    buffered: false,
                }
            }
        };

        listeners.emit(MessageEvent::Transferred {
            message: arrived,
            from,
            to: self.host,
            first_delivery: arrival.first_delivery,
            at: now,
        });

        Ok(arrival)
    }

    /// Discard an inbound transfer that was cut short
    pub fn aborted(
        &mut self,
        id: &MessageId,
        from: HostId,
        bytes_remaining: u64,
        now: SimTime,
        listeners: &mut Listeners,
    ) -> RoutingResult<()> {
        let message = self
            .incoming
            .remove(&(id.clone(), from))
            .ok_or_else(|| RoutingError::MissingIncoming {
                host: self.host,
                id: id.clone(),
                from,
            })?;
        listeners.emit(MessageEvent::TransferAborted {
            message,
            from,
            to: self.host,
            bytes_remaining,
            at: now,
        });
        Ok(())
    }

    /// Remove a buffered message
    pub fn delete(
        &mut self,
        id: &MessageId,
        dropped: bool,
        now: SimTime,
        listeners: &mut Listeners,
    ) -> RoutingResult<Message> {
        let message = self
            .buffer
            .remove(id)
            .ok_or_else(|| RoutingError::MissingMessage {
                host: self.host,
                id: id.clone(),
            })?;
        if dropped {
            debug!("Dropped {} at {}", id, self.host);
        }
        listeners.emit(MessageEvent::Deleted {
            message: message.clone(),
            host: self.host,
            dropped,
            at: now,
        });
        Ok(message)
    }

    /// Drop every message whose lifetime has run out
    pub fn drop_expired(&mut self, now: SimTime, listeners: &mut Listeners) -> usize {
        let expired: Vec<MessageId> = self
            .buffer
            .iter()
            .filter(|m| m.is_expired(now))
            .map(|m| m.id.clone())
            .collect();
        for id in &expired {
            if let Err(e) = self.delete(id, true, now, listeners) {
                warn!("Expiry sweep at {} lost {}: {}", self.host, id, e);
            }
        }
        expired.len()
    }
}
