//! Routing strategies
//!
//! A strategy plugs into the active router through the hooks of
//! [`RoutingStrategy`]. The engine owns the transfer algorithms; a strategy
//! only decides what state a message carries and which candidates the
//! search phases consider:
//!
//! - **Per-hop mutation**: [`init_message`](RoutingStrategy::init_message),
//!   [`on_received`](RoutingStrategy::on_received) (receiver side),
//!   [`on_transfer_done`](RoutingStrategy::on_transfer_done) (sender side),
//!   [`before_transfer`](RoutingStrategy::before_transfer)
//! - **Per-tick refresh**: [`refresh`](RoutingStrategy::refresh)
//! - **Search**: [`relay_to`](RoutingStrategy::relay_to) widens the delivery
//!   search, [`floods`](RoutingStrategy::floods),
//!   [`flood_candidate`](RoutingStrategy::flood_candidate) and
//!   [`flood_to`](RoutingStrategy::flood_to) shape the flood search
//! - **Scoring**: [`destination_score`](RoutingStrategy::destination_score),
//!   read by peers running a scored strategy

mod direction_unicast;
mod directed_spray;
mod epidemic;
mod evr;
mod geoopp;
mod second_chance;
mod spray;

pub use direction_unicast::DirectionUnicast;
pub use directed_spray::DirectedSpray;
pub use epidemic::Epidemic;
pub use evr::Evr;
pub use geoopp::Geoopp;
pub use second_chance::SecondChanceSpray;
pub use spray::Spray;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use geodtn_core::{ConfigError, ConfigResult, Coord, Heading, HostId, Message, SimTime};

use crate::buffer::MessageBuffer;
use crate::cells::CellGrid;
use crate::link::LinkId;

/// Default copy budget for copy-limited strategies
pub const DEFAULT_COPIES: u32 = 3;

/// What a strategy may know about a host at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostView {
    pub id: HostId,
    pub location: Coord,
    /// Direction of travel since the host's previous update
    pub heading: Heading,
    /// Number of links currently up
    pub link_count: usize,
    pub now: SimTime,
}

/// A connected peer as seen from the host running a search
#[derive(Debug, Clone, Copy)]
pub struct PeerView<'a> {
    pub host: HostView,
    pub link: LinkId,
    pub strategy: &'a dyn RoutingStrategy,
}

/// Hooks a strategy supplies to the active router
pub trait RoutingStrategy: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Attach initial routing state to a message created at this host
    fn init_message(&self, message: &mut Message);

    /// Receiver side: a copy just arrived and was buffered at `host`
    fn on_received(&mut self, _message: &mut Message, _host: &HostView) {}

    /// Sender side: our copy was fully delivered to `peer`
    fn on_transfer_done(&mut self, _message: &mut Message, _peer: &HostView) {}

    /// Sender side: `message` is about to be offered over a link
    fn before_transfer(&mut self, _message: &mut Message, _holder: &HostView) {}

    /// Update host and message state once per tick, before any search
    fn refresh(&mut self, _host: &HostView, _buffer: &mut MessageBuffer) {}

    /// Delivery search: also hand `message` to `peer`, which is not a final recipient
    fn relay_to(&self, _message: &Message, _host: &HostView, _peer: &PeerView<'_>) -> bool {
        false
    }

    /// Whether a flood search follows an unsuccessful delivery search
    fn floods(&self) -> bool {
        true
    }

    /// Flood search: whether `message` is offered at all
    fn flood_candidate(&self, _message: &Message, _host: &HostView) -> bool {
        true
    }

    /// Flood search: whether `message` may go to `peer`
    fn flood_to(&self, _message: &Message, _peer: &PeerView<'_>) -> bool {
        true
    }

    /// This host's score for delivering `message` into its destination
    fn destination_score(&self, _message: &Message, _host: &HostView) -> f64 {
        0.0
    }
}

/// Strategy selection as it appears in scenario files
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Flood everything to everyone
    #[default]
    Epidemic,
    /// Copy-limited spray
    Gsaf {
        #[serde(default = "default_copies")]
        copies: u32,
    },
    /// Copy-limited spray toward peers heading at the destination
    Gswd {
        #[serde(default = "default_copies")]
        copies: u32,
    },
    /// Copy-limited spray with one extra copy after leaving the region
    CastPlus {
        #[serde(default = "default_copies")]
        copies: u32,
    },
    /// Unicast spray along distinct headings
    DirectionBased {
        #[serde(default = "default_copies")]
        copies: u32,
    },
    /// Score by expected visit rate of destination cells
    Evr,
    /// Score by contact, regularity and distance to destination cells
    Geoopp,
}

fn default_copies() -> u32 {
    DEFAULT_COPIES
}

impl StrategyConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        match self {
            StrategyConfig::Gsaf { copies }
            | StrategyConfig::Gswd { copies }
            | StrategyConfig::CastPlus { copies }
            | StrategyConfig::DirectionBased { copies }
                if *copies == 0 =>
            {
                Err(ConfigError::ZeroCopies)
            }
            _ => Ok(()),
        }
    }

    /// Build a fresh strategy instance for one host
    pub fn build(&self, cells: &Arc<CellGrid>) -> ConfigResult<Box<dyn RoutingStrategy>> {
        self.validate()?;
        Ok(match *self {
            StrategyConfig::Epidemic => Box::new(Epidemic),
            StrategyConfig::Gsaf { copies } => Box::new(Spray::new(copies)),
            StrategyConfig::Gswd { copies } => Box::new(DirectedSpray::new(copies)),
            StrategyConfig::CastPlus { copies } => Box::new(SecondChanceSpray::new(copies)),
            StrategyConfig::DirectionBased { copies } => Box::new(DirectionUnicast::new(copies)),
            StrategyConfig::Evr => Box::new(Evr::new(Arc::clone(cells))),
            StrategyConfig::Geoopp => Box::new(Geoopp::new(Arc::clone(cells))),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json() {
        let config: StrategyConfig = serde_json::from_str(r#"{ "kind": "gsaf", "copies": 5 }"#).unwrap();
        assert_eq!(config, StrategyConfig::Gsaf { copies: 5 });

        let config: StrategyConfig = serde_json::from_str(r#"{ "kind": "cast_plus" }"#).unwrap();
        assert_eq!(config, StrategyConfig::CastPlus { copies: DEFAULT_COPIES });

        let config: StrategyConfig = serde_json::from_str(r#"{ "kind": "geoopp" }"#).unwrap();
        assert_eq!(config, StrategyConfig::Geoopp);
    }

    #[test]
    fn test_zero_copies_rejected() {
        let cells = Arc::new(CellGrid::empty());
        assert!(matches!(
            StrategyConfig::Gswd { copies: 0 }.build(&cells),
            Err(ConfigError::ZeroCopies)
        ));
    }

    #[test]
    fn test_build_names() {
        let cells = Arc::new(CellGrid::empty());
        let names: Vec<&str> = [
            StrategyConfig::Epidemic,
            StrategyConfig::Gsaf { copies: 3 },
            StrategyConfig::Gswd { copies: 3 },
            StrategyConfig::CastPlus { copies: 3 },
            StrategyConfig::DirectionBased { copies: 3 },
            StrategyConfig::Evr,
            StrategyConfig::Geoopp,
        ]
        .iter()
        .map(|c| c.build(&cells).unwrap().name())
        .collect();
        assert_eq!(
            names,
            vec!["epidemic", "gsaf", "gswd", "cast_plus", "direction_based", "evr", "geoopp"]
        );
    }
}
