use std::collections::BTreeSet;

use geodtn_core::{DirectionSetState, Heading, Message, RoutingState};

use super::{HostView, PeerView, RoutingStrategy};

/// Spray along distinct headings
///
/// A message carries a hop budget and the set of headings it may still be
/// sent in. The holder sends at most one copy per heading, to a peer
/// travelling that way, and crosses the heading off afterwards. Each
/// receiver spends one unit of the budget and, while budget remains, starts
/// over with every heading except its own.
#[derive(Debug, Clone)]
pub struct DirectionUnicast {
    copies: u32,
}

impl DirectionUnicast {
    pub fn new(copies: u32) -> Self {
        Self { copies }
    }

    fn all_headings() -> BTreeSet<Heading> {
        Heading::COMPASS.into_iter().collect()
    }

    fn directions(message: &Message) -> Option<&BTreeSet<Heading>> {
        match &message.state {
            RoutingState::DirectionSet(state) => Some(&state.directions),
            _ => None,
        }
    }
}

impl RoutingStrategy for DirectionUnicast {
    fn name(&self) -> &'static str {
        "direction_based"
    }

    fn init_message(&self, message: &mut Message) {
        message.state = RoutingState::DirectionSet(DirectionSetState {
            copies: self.copies,
            directions: Self::all_headings(),
        });
    }

    fn on_received(&mut self, message: &mut Message, host: &HostView) {
        if !matches!(message.state, RoutingState::DirectionSet(_)) {
            self.init_message(message);
        }
        if let RoutingState::DirectionSet(state) = &mut message.state {
            state.copies = state.copies.saturating_sub(1);
            state.directions = if state.copies != 0 {
                let mut headings = Self::all_headings();
                headings.remove(&host.heading);
                headings
            } else {
                BTreeSet::new()
            };
        }
    }

    fn on_transfer_done(&mut self, message: &mut Message, peer: &HostView) {
        if let RoutingState::DirectionSet(state) = &mut message.state {
            state.directions.remove(&peer.heading);
        }
    }

    fn flood_candidate(&self, message: &Message, _host: &HostView) -> bool {
        Self::directions(message).is_some_and(|d| !d.is_empty())
    }

    fn flood_to(&self, message: &Message, peer: &PeerView<'_>) -> bool {
        Self::directions(message).is_some_and(|d| d.contains(&peer.host.heading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkId;
    use crate::strategy::Epidemic;
    use crate::strategy::test_support::*;

    fn peer(heading: Heading, strategy: &dyn RoutingStrategy) -> PeerView<'_> {
        PeerView {
            host: view(1, 0.0, 0.0, heading),
            link: LinkId(0),
            strategy,
        }
    }

    #[test]
    fn test_created_with_every_heading() {
        let strategy = DirectionUnicast::new(3);
        let mut m = geocast(square(0.0, 0.0, 10.0));
        strategy.init_message(&mut m);

        let epidemic = Epidemic;
        for heading in Heading::COMPASS {
            assert!(strategy.flood_to(&m, &peer(heading, &epidemic)));
        }
        assert!(!strategy.flood_to(&m, &peer(Heading::StandStill, &epidemic)));
    }

    #[test]
    fn test_heading_crossed_off_after_send() {
        let mut strategy = DirectionUnicast::new(3);
        let mut m = geocast(square(0.0, 0.0, 10.0));
        strategy.init_message(&mut m);
        let epidemic = Epidemic;

        let north_east = view(1, 0.0, 0.0, Heading::NorthEast);
        strategy.on_transfer_done(&mut m, &north_east);
        assert!(!strategy.flood_to(&m, &peer(Heading::NorthEast, &epidemic)));
        assert!(strategy.flood_to(&m, &peer(Heading::SouthWest, &epidemic)));

        for heading in [Heading::SouthWest, Heading::SouthEast, Heading::NorthWest] {
            strategy.on_transfer_done(&mut m, &view(1, 0.0, 0.0, heading));
        }
        assert!(!strategy.flood_candidate(&m, &north_east));
    }

    #[test]
    fn test_receiver_excludes_own_heading() {
        let mut strategy = DirectionUnicast::new(3);
        let mut m = geocast(square(0.0, 0.0, 10.0));
        strategy.init_message(&mut m);

        strategy.on_received(&mut m, &view(2, 0.0, 0.0, Heading::SouthEast));
        let RoutingState::DirectionSet(state) = &m.state else {
            panic!("expected a direction set");
        };
        assert_eq!(state.copies, 2);
        assert_eq!(state.directions.len(), 3);
        assert!(!state.directions.contains(&Heading::SouthEast));
    }

    #[test]
    fn test_budget_exhausted_clears_headings() {
        let mut strategy = DirectionUnicast::new(2);
        let mut m = geocast(square(0.0, 0.0, 10.0));
        strategy.init_message(&mut m);
        let host = view(2, 0.0, 0.0, Heading::StandStill);

        strategy.on_received(&mut m, &host);
        assert!(strategy.flood_candidate(&m, &host));
        strategy.on_received(&mut m, &host);
        assert_eq!(m.state.copies(), Some(0));
        assert!(!strategy.flood_candidate(&m, &host));
    }
}
