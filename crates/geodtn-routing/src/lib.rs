//! # GeoDTN Routing
//!
//! Store-carry-forward routing for geocast delay-tolerant networks.
//!
//! Hosts buffer messages and hand replicas to each other over short-lived
//! links. A message addressed to a region is delivered to every host that
//! receives it while standing inside the region; a unicast message is
//! delivered to one host.
//!
//! ## Layers
//!
//! - [`Link`]: one message at a time between two hosts, with a byte countdown
//! - [`MessageRouter`]: buffer, inbound transfers, delivered set, blacklist
//!   and application pipeline
//! - [`ActiveRouter`]: admission verdicts, eviction, TTL sweeps, energy and
//!   accept policy on top of the base router
//! - [`World`]: the arena of hosts and links that runs the delivery and
//!   flood searches every tick
//!
//! ## Strategies
//!
//! Behaviour that differs between protocols plugs in through
//! [`RoutingStrategy`]:
//!
//! - [`Epidemic`]: flood to everyone
//! - [`Spray`]: copy-limited flooding (GSAF)
//! - [`DirectedSpray`]: copies only to peers heading at the region (GSWD)
//! - [`SecondChanceSpray`]: one extra copy after leaving the region (GeoCastPlus)
//! - [`DirectionUnicast`]: one copy per compass heading
//! - [`Evr`]: forward to hosts that visit the region more often
//! - [`Geoopp`]: forward by contact, regularity and distance estimates
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use geodtn_core::{Coord, Message, Region, RouterConfig, SimTime};
//! use geodtn_routing::{StrategyConfig, World};
//!
//! let mut world = World::new();
//! let gsaf = StrategyConfig::Gsaf { copies: 3 };
//! let a = world.add_host(Coord::new(0.0, 0.0), RouterConfig::default(), &gsaf)?;
//! let b = world.add_host(Coord::new(5.0, 5.0), RouterConfig::default(), &gsaf)?;
//!
//! let region = Arc::new(Region::from_points(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)])?);
//! world.create_message(Message::geocast("M1", a, region, 1_000, SimTime::ZERO))?;
//! world.connect(a, b, 250.0)?;
//!
//! for t in 0..10 {
//!     world.update(SimTime::from_secs(t as f64))?;
//! }
//! ```

pub mod active;
pub mod application;
pub mod buffer;
pub mod cells;
pub mod energy;
pub mod error;
pub mod link;
pub mod policy;
pub mod queue;
pub mod router;
pub mod strategy;
pub mod verdict;
pub mod world;

pub use active::{ActiveRouter, BufferedMessage, RoutingSummary};
pub use application::Application;
pub use buffer::MessageBuffer;
pub use cells::{CellGrid, GapStats, VisitHistory};
pub use energy::EnergyModel;
pub use error::{CreateError, RoutingError, RoutingResult};
pub use link::{Delivered, InFlight, Interrupted, Link, LinkId};
pub use policy::{AcceptPolicy, RulePolicy};
pub use queue::{Queued, compare_by_queue_mode, sort_by_queue_mode};
pub use router::{Arrival, MessageRouter};
pub use strategy::{
    DEFAULT_COPIES, DirectedSpray, DirectionUnicast, Epidemic, Evr, Geoopp, HostView, PeerView,
    RoutingStrategy, SecondChanceSpray, Spray, StrategyConfig,
};
pub use verdict::ReceiveVerdict;
pub use world::{Host, World};
