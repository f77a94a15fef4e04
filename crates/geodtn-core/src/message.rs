//! Messages and their per-strategy routing state
//!
//! Every host keeps its own copy of a message. A hop produces a new copy
//! with [`Message::replicate`], so strategies can mutate a copy's
//! [`RoutingState`] without affecting any other host's copy.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geometry::{Coord, Heading};
use crate::region::Region;
use crate::time::SimTime;

/// Handle of a host in the world arena
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("h{_0}")]
pub struct HostId(pub u32);

impl HostId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Unique message identifier
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where a message is going
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// A single host
    Host(HostId),
    /// Every host that enters the region before expiry
    Region(Arc<Region>),
}

impl Destination {
    /// Whether a host at `location` is a final recipient
    pub fn is_final_recipient(&self, host: HostId, location: Coord) -> bool {
        match self {
            Destination::Host(target) => *target == host,
            Destination::Region(region) => region.contains(location),
        }
    }

    pub fn region(&self) -> Option<&Region> {
        match self {
            Destination::Region(region) => Some(region),
            Destination::Host(_) => None,
        }
    }

    pub fn is_geocast(&self) -> bool {
        matches!(self, Destination::Region(_))
    }
}

/// Copy budget shared by the spray strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SprayState {
    pub copies: u32,
}

/// Copy budget plus the heading a relay must be travelling in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectedSprayState {
    pub copies: u32,
    /// Bearing from the current holder toward the destination centroid
    pub target: Heading,
}

/// Copy budget with a one-time extra copy once the budget runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondChanceState {
    pub copies: u32,
    /// Set when the budget is spent
    pub exhausted: bool,
    /// Set once the extra copy has been granted to this lineage
    pub granted: bool,
}

/// Copy budget plus the headings still worth sending a copy in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionSetState {
    pub copies: u32,
    pub directions: BTreeSet<Heading>,
}

/// Score-gated forwarding state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreState {
    /// The current holder's score for the destination
    pub score: f64,
    /// Set once this copy has been seen inside its destination region
    pub reached: bool,
}

/// Typed per-message extension selected by the routing strategy
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RoutingState {
    #[default]
    None,
    Spray(SprayState),
    DirectedSpray(DirectedSprayState),
    SecondChance(SecondChanceState),
    DirectionSet(DirectionSetState),
    Scored(ScoreState),
}

impl RoutingState {
    /// Remaining copy budget, for strategies that have one
    pub fn copies(&self) -> Option<u32> {
        match self {
            RoutingState::Spray(s) => Some(s.copies),
            RoutingState::DirectedSpray(s) => Some(s.copies),
            RoutingState::SecondChance(s) => Some(s.copies),
            RoutingState::DirectionSet(s) => Some(s.copies),
            RoutingState::None | RoutingState::Scored(_) => None,
        }
    }
}

/// A message as held in one host's buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub from: HostId,
    pub destination: Destination,
    /// Size in bytes
    pub size: u64,
    /// Lifetime in minutes from creation; `None` never expires
    pub ttl: Option<u32>,
    pub created_at: SimTime,
    /// When this copy arrived at its current holder
    pub received_at: SimTime,
    /// Application the message belongs to, if any
    pub app_id: Option<String>,
    /// Hosts visited so far, origin first
    pub path: Vec<HostId>,
    pub state: RoutingState,
}

impl Message {
    pub fn new(
        id: impl Into<MessageId>,
        from: HostId,
        destination: Destination,
        size: u64,
        created_at: SimTime,
    ) -> Self {
        Self {
            id: id.into(),
            from,
            destination,
            size,
            ttl: None,
            created_at,
            received_at: created_at,
            app_id: None,
            path: vec![from],
            state: RoutingState::None,
        }
    }

    /// Geocast message to `region`
    pub fn geocast(
        id: impl Into<MessageId>,
        from: HostId,
        region: Arc<Region>,
        size: u64,
        created_at: SimTime,
    ) -> Self {
        Self::new(id, from, Destination::Region(region), size, created_at)
    }

    /// Unicast message to `to`
    pub fn unicast(
        id: impl Into<MessageId>,
        from: HostId,
        to: HostId,
        size: u64,
        created_at: SimTime,
    ) -> Self {
        Self::new(id, from, Destination::Host(to), size, created_at)
    }

    pub fn with_ttl(mut self, minutes: u32) -> Self {
        self.ttl = Some(minutes);
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Independent copy for the next holder
    pub fn replicate(&self) -> Self {
        self.clone()
    }

    /// Remaining lifetime in minutes, `None` when the message never expires
    pub fn remaining_ttl(&self, now: SimTime) -> Option<f64> {
        self.ttl
            .map(|ttl| (ttl as f64 * 60.0 - now.since(self.created_at)) / 60.0)
    }

    /// Remaining lifetime for ordering purposes; infinite lifetimes sort last
    pub fn remaining_ttl_or_max(&self, now: SimTime) -> f64 {
        self.remaining_ttl(now).unwrap_or(f64::INFINITY)
    }

    pub fn is_expired(&self, now: SimTime) -> bool {
        self.remaining_ttl(now).is_some_and(|ttl| ttl <= 0.0)
    }

    /// Absolute expiry time
    pub fn expires_at(&self) -> Option<SimTime> {
        self.ttl
            .map(|ttl| SimTime::from_secs(self.created_at.as_secs() + ttl as f64 * 60.0))
    }

    pub fn is_final_recipient(&self, host: HostId, location: Coord) -> bool {
        self.destination.is_final_recipient(host, location)
    }

    /// Number of hops taken so far
    pub fn hop_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn add_hop(&mut self, host: HostId) {
        self.path.push(host);
    }
}
