//! Contact-probability forwarding
//!
//! The score of a host for a message is the best delivery estimate over
//! every pair `(v, d)` where `d` is a cell crossing the destination region
//! and `v` is any cell. Each pair multiplies three factors:
//!
//! - **contact** `PiC(v)`: how reliably the host meets someone while in `v`
//! - **regularity** `PiV(v)`: how surely the host is back in `v` before the
//!   message expires, from the spread of past gaps between entries
//! - **distance** `PiM(v, d)`: how much closer `v` is to `d` than the host
//!
//! A host without history in `v` gets zero for that cell.

use std::sync::Arc;

use geodtn_core::{Coord, Message, Region, RoutingState, ScoreState};

use crate::buffer::MessageBuffer;
use crate::cells::{CellGrid, VisitHistory};

use super::{HostView, PeerView, RoutingStrategy};

/// Score-gated forwarding by contact, regularity and distance
#[derive(Debug, Clone)]
pub struct Geoopp {
    history: VisitHistory,
}

impl Geoopp {
    pub fn new(cells: Arc<CellGrid>) -> Self {
        Self {
            history: VisitHistory::new(cells),
        }
    }

    pub fn history(&self) -> &VisitHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut VisitHistory {
        &mut self.history
    }

    /// Best estimate of this host delivering `message` into `region` from `location`
    pub fn cast_score(&self, region: &Region, message: &Message, location: Coord) -> f64 {
        let grid = self.history.grid();
        grid.cells_crossing(region)
            .into_iter()
            .filter_map(|d| grid.cell(d))
            .map(|target| {
                (0..grid.len())
                    .map(|via| self.via_score(via, target, message, location))
                    .fold(0.0, f64::max)
            })
            .fold(0.0, f64::max)
    }

    fn via_score(&self, via: usize, target: &Region, message: &Message, location: Coord) -> f64 {
        let contact = self.contact_factor(via);
        if contact == 0.0 {
            return 0.0;
        }
        let regularity = self.regularity_factor(via, message);
        if regularity == 0.0 {
            return 0.0;
        }
        let Some(cell) = self.history.grid().cell(via) else {
            return 0.0;
        };
        distance_factor(location, cell.centroid(), target.centroid()) * regularity * contact
    }

    /// `1 - var / (1 - mean)^2` over the contact flags of past stays
    pub fn contact_factor(&self, cell: usize) -> f64 {
        let Some(stats) = self.history.contact_stats(cell) else {
            return 0.0;
        };
        if stats.mean >= 1.0 {
            return 1.0;
        }
        (1.0 - stats.variance / (1.0 - stats.mean).powi(2)).clamp(0.0, 1.0)
    }

    /// `1 - var / (t_exp - t_last - mean)^2` over the gaps between entries
    pub fn regularity_factor(&self, cell: usize, message: &Message) -> f64 {
        let (Some(stats), Some(last)) = (self.history.gap_stats(cell), self.history.last_visit(cell))
        else {
            return 0.0;
        };
        let Some(expiry) = message.expires_at() else {
            return 1.0;
        };
        let horizon = expiry.as_secs() - last;
        if horizon <= stats.mean {
            return 0.0;
        }
        (1.0 - stats.variance / (horizon - stats.mean).powi(2)).clamp(0.0, 1.0)
    }
}

/// `(CD - ID) / CD` with `CD` the host's distance to the target centre and
/// `ID` the via cell's distance to it
fn distance_factor(location: Coord, via: Coord, target: Coord) -> f64 {
    let current = location.distance(&target);
    if current <= 0.0 {
        return 0.0;
    }
    (current - via.distance(&target)) / current
}

impl RoutingStrategy for Geoopp {
    fn name(&self) -> &'static str {
        "geoopp"
    }

    fn init_message(&self, message: &mut Message) {
        message.state = RoutingState::Scored(ScoreState {
            score: 0.0,
            reached: false,
        });
    }

    fn refresh(&mut self, host: &HostView, buffer: &mut MessageBuffer) {
        self.history
            .observe(host.location, host.now, host.link_count > 0);

        for message in buffer.iter_mut() {
            let Some(region) = message.destination.region() else {
                continue;
            };
            let score = self.cast_score(region, message, host.location);
            let inside = region.contains(host.location);
            let was_reached = matches!(message.state, RoutingState::Scored(s) if s.reached);
            message.state = RoutingState::Scored(ScoreState {
                score,
                reached: was_reached || inside,
            });
        }
    }

    fn relay_to(&self, message: &Message, _host: &HostView, peer: &PeerView<'_>) -> bool {
        match message.state {
            RoutingState::Scored(state) if message.destination.is_geocast() => {
                !state.reached && state.score < peer.strategy.destination_score(message, &peer.host)
            }
            _ => false,
        }
    }

    fn floods(&self) -> bool {
        false
    }

    fn destination_score(&self, message: &Message, host: &HostView) -> f64 {
        message
            .destination
            .region()
            .map(|r| self.cast_score(r, message, host.location))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkId;
    use crate::strategy::test_support::*;
    use geodtn_core::{Heading, SimTime};

    fn grid() -> Arc<CellGrid> {
        Arc::new(CellGrid::regular(Coord::new(0.0, 0.0), 10.0, 10.0, 3, 1).unwrap())
    }

    /// Crosses only the rightmost cell
    fn diamond() -> Arc<Region> {
        Arc::new(
            Region::from_points(&[(25.0, -5.0), (30.0, 5.0), (25.0, 15.0), (20.0, 5.0)]).unwrap(),
        )
    }

    fn regular_visitor(cell: usize) -> Geoopp {
        let mut g = Geoopp::new(grid());
        for t in [0.0, 100.0, 200.0] {
            g.history_mut().record_visit(cell, SimTime::from_secs(t));
        }
        g.history_mut().record_stay(cell, true);
        g
    }

    #[test]
    fn test_no_history_scores_zero() {
        let g = Geoopp::new(grid());
        let m = geocast(diamond()).with_ttl(60);
        assert_eq!(g.contact_factor(0), 0.0);
        assert_eq!(g.regularity_factor(0, &m), 0.0);
        assert_eq!(g.cast_score(&diamond(), &m, Coord::new(-50.0, 5.0)), 0.0);
    }

    #[test]
    fn test_contact_factor() {
        let mut g = Geoopp::new(grid());
        g.history_mut().record_stay(0, true);
        g.history_mut().record_stay(0, true);
        assert_eq!(g.contact_factor(0), 1.0);

        // mean 0.5, variance 0.25: 1 - 0.25 / 0.25 = 0
        g.history_mut().record_stay(1, true);
        g.history_mut().record_stay(1, false);
        assert_eq!(g.contact_factor(1), 0.0);

        // mean 0.25, variance 0.1875: 1 - 0.1875 / 0.5625 = 2/3
        for met in [true, false, false, false] {
            g.history_mut().record_stay(2, met);
        }
        assert!((g.contact_factor(2) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_regularity_factor() {
        let g = regular_visitor(0);
        // Gaps 100 and 100: zero variance.
        let long = geocast(diamond()).with_ttl(60);
        assert_eq!(g.regularity_factor(0, &long), 1.0);

        // Expiry at 240s, last visit 200s: 40s left is within the mean gap.
        let short = geocast(diamond()).with_ttl(4);
        assert_eq!(g.regularity_factor(0, &short), 0.0);

        let forever = geocast(diamond());
        assert_eq!(g.regularity_factor(0, &forever), 1.0);
    }

    #[test]
    fn test_distance_factor() {
        let target = Coord::new(25.0, 5.0);
        assert_eq!(distance_factor(Coord::new(-75.0, 5.0), Coord::new(5.0, 5.0), target), 0.8);
        assert_eq!(distance_factor(target, Coord::new(5.0, 5.0), target), 0.0);
        assert!(distance_factor(Coord::new(15.0, 5.0), Coord::new(5.0, 5.0), target) < 0.0);
    }

    #[test]
    fn test_far_host_with_regular_visits_scores_higher() {
        let m = geocast(diamond()).with_ttl(60);
        let far = Coord::new(-75.0, 5.0);
        let visitor = regular_visitor(2);
        let stranger = Geoopp::new(grid());

        // Via the destination cell itself: distance factor 1.
        let score = visitor.cast_score(&diamond(), &m, far);
        assert!((score - 1.0).abs() < 1e-12);
        assert_eq!(stranger.cast_score(&diamond(), &m, far), 0.0);

        let mut holder = stranger;
        let mut buffer = MessageBuffer::new(u64::MAX);
        let mut copy = m.clone();
        holder.init_message(&mut copy);
        buffer.insert(copy);
        let host = view(0, far.x, far.y, Heading::StandStill);
        holder.refresh(&host, &mut buffer);

        let peer = PeerView {
            host: view(1, far.x, far.y, Heading::StandStill),
            link: LinkId(0),
            strategy: &visitor,
        };
        assert!(holder.relay_to(buffer.get(&"M1".into()).unwrap(), &host, &peer));
    }

    #[test]
    fn test_received_copy_keeps_score() {
        let mut g = Geoopp::new(grid());
        let mut m = geocast(diamond());
        m.state = RoutingState::Scored(ScoreState {
            score: 0.5,
            reached: false,
        });
        g.on_received(&mut m, &view(1, 0.0, 0.0, Heading::StandStill));
        assert!(matches!(m.state, RoutingState::Scored(s) if s.score == 0.5));
    }
}
