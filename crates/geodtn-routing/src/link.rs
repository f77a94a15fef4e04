//! Link transfer state machine
//!
//! A [`Link`] joins two hosts and carries at most one message at a time.
//!
//! ```text
//! Idle --carry--> Transferring --finalize--> Idle
//!                      |
//!                      +-------abort-------> Idle
//! ```
//!
//! The link never judges a transfer. The receiver's admission decides
//! whether `carry` is called at all, and the sending router decides when
//! to `finalize` (remaining bytes reached zero) or `abort` (link went down).
//! Completion is reported back as a [`Delivered`] or [`Interrupted`] value
//! for the world to hand to the receiving router.

use geodtn_core::{HostId, Message, MessageId, SimTime};

use crate::error::{RoutingError, RoutingResult};

/// Handle of a link in the world arena
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display,
)]
#[display("l{_0}")]
pub struct LinkId(pub u32);

impl LinkId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A message occupying a link
#[derive(Debug, Clone, PartialEq)]
pub struct InFlight {
    pub message: Message,
    pub sender: HostId,
    remaining: f64,
}

impl InFlight {
    /// Bytes still to send, rounded up
    pub fn remaining_bytes(&self) -> u64 {
        self.remaining.max(0.0).ceil() as u64
    }
}

/// A completed transfer, to be reported to the receiver
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub id: MessageId,
    pub sender: HostId,
    pub receiver: HostId,
}

/// A transfer cut short, to be reported to the receiver
#[derive(Debug, Clone, PartialEq)]
pub struct Interrupted {
    pub id: MessageId,
    pub sender: HostId,
    pub receiver: HostId,
    pub bytes_remaining: u64,
}

/// A bidirectional channel between two hosts
#[derive(Debug, Clone)]
pub struct Link {
    id: LinkId,
    /// The host that opened the link
    initiator: HostId,
    peer: HostId,
    up: bool,
    /// Bytes per second
    speed: f64,
    in_flight: Option<InFlight>,
    bytes_transferred: u64,
    last_update: SimTime,
}

impl Link {
    pub fn new(id: LinkId, initiator: HostId, peer: HostId, speed: f64, now: SimTime) -> Self {
        Self {
            id,
            initiator,
            peer,
            up: true,
            speed,
            in_flight: None,
            bytes_transferred: 0,
            last_update: now,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn endpoints(&self) -> (HostId, HostId) {
        (self.initiator, self.peer)
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn set_up(&mut self, up: bool) {
        self.up = up;
    }

    pub fn is_initiator(&self, host: HostId) -> bool {
        self.initiator == host
    }

    pub fn involves(&self, host: HostId) -> bool {
        self.initiator == host || self.peer == host
    }

    /// The endpoint that is not `host`
    pub fn other_end(&self, host: HostId) -> Option<HostId> {
        if host == self.initiator {
            Some(self.peer)
        } else if host == self.peer {
            Some(self.initiator)
        } else {
            None
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Change throughput; takes effect from the next `advance`
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    pub fn is_transferring(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Up and idle
    pub fn is_ready_for_transfer(&self) -> bool {
        self.up && self.in_flight.is_none()
    }

    /// Whether the carried message has been fully sent
    pub fn is_message_transferred(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|f| f.remaining <= 0.0)
    }

    /// Lifetime bytes, including the sent part of the current message
    pub fn total_bytes_transferred(&self) -> u64 {
        let partial = self
            .in_flight
            .as_ref()
            .map(|f| f.message.size.saturating_sub(f.remaining_bytes()))
            .unwrap_or(0);
        self.bytes_transferred + partial
    }

    /// Start carrying `message` from `sender`
    pub fn carry(&mut self, message: Message, sender: HostId, now: SimTime) -> RoutingResult<()> {
        if self.in_flight.is_some() {
            return Err(RoutingError::LinkBusy(self.id));
        }
        if !self.involves(sender) {
            return Err(RoutingError::NotAnEndpoint {
                host: sender,
                link: self.id,
            });
        }
        self.in_flight = Some(InFlight {
            remaining: message.size as f64,
            message,
            sender,
        });
        self.last_update = now;
        Ok(())
    }

    /// Recompute remaining bytes at `now`
    pub fn advance(&mut self, now: SimTime) {
        let elapsed = now.since(self.last_update).max(0.0);
        if let Some(flight) = &mut self.in_flight
            && self.up
        {
            flight.remaining = (flight.remaining - self.speed * elapsed).max(0.0);
        }
        self.last_update = now;
    }

    /// Complete the current transfer
    pub fn finalize(&mut self) -> RoutingResult<Delivered> {
        let flight = self
            .in_flight
            .take()
            .ok_or(RoutingError::NothingInFlight(self.id))?;
        self.bytes_transferred += flight.message.size;
        Ok(Delivered {
            receiver: self.receiver_of(flight.sender),
            id: flight.message.id,
            sender: flight.sender,
        })
    }

    /// Cut the current transfer short
    pub fn abort(&mut self) -> RoutingResult<Interrupted> {
        let flight = self
            .in_flight
            .take()
            .ok_or(RoutingError::NothingInFlight(self.id))?;
        let bytes_remaining = flight.remaining_bytes().min(flight.message.size);
        self.bytes_transferred += flight.message.size - bytes_remaining;
        Ok(Interrupted {
            receiver: self.receiver_of(flight.sender),
            id: flight.message.id,
            sender: flight.sender,
            bytes_remaining,
        })
    }

    fn receiver_of(&self, sender: HostId) -> HostId {
        if sender == self.initiator {
            self.peer
        } else {
            self.initiator
        }
    }
}
