//! # GeoDTN Core
//!
//! Core types for geocast delay-tolerant networking.
//!
//! This crate holds everything the routing layer reasons about but that
//! carries no routing logic of its own: where hosts are, what a destination
//! region looks like, what a message is, what time it is, and what gets
//! reported to observers.
//!
//! ## Key Types
//!
//! - [`Region`]: A closed polygon with precomputed edge equations and a
//!   point-membership test
//! - [`Message`]: A unicast or geocast message together with its typed
//!   per-strategy [`RoutingState`]
//! - [`SimTime`]: The simulated clock value threaded through every call
//! - [`MessageEvent`]: Notifications fanned out to [`MessageListener`]s
//! - [`RouterConfig`]: Per-router buffer, TTL and queue settings

pub mod config;
pub mod error;
pub mod event;
pub mod geometry;
pub mod message;
pub mod region;
pub mod time;
pub mod wkt;

pub use config::*;
pub use error::*;
pub use event::*;
pub use geometry::*;
pub use message::*;
pub use region::*;
pub use time::*;
pub use wkt::*;
