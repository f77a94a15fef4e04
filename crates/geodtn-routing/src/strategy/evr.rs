use std::sync::Arc;

use geodtn_core::{Message, Region, RoutingState, ScoreState};

use crate::buffer::MessageBuffer;
use crate::cells::{CellGrid, VisitHistory};

use super::{HostView, PeerView, RoutingStrategy};

/// Expected-visit-rate forwarding
///
/// A host's score for a destination region is the highest visit rate among
/// the cells whose boundary crosses the region's boundary. Copies move only
/// to peers that score strictly higher than the current holder, and stop
/// moving once a holder has been inside the region.
#[derive(Debug, Clone)]
pub struct Evr {
    history: VisitHistory,
}

impl Evr {
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

    /// Score of this host for `region`; zero without any history
    pub fn region_score(&self, region: &Region) -> f64 {
        self.history
            .grid()
            .cells_crossing(region)
            .into_iter()
            .map(|cell| self.history.visit_rate(cell))
            .fold(0.0, f64::max)
    }
}

impl RoutingStrategy for Evr {
    fn name(&self) -> &'static str {
        "evr"
    }

    fn init_message(&self, message: &mut Message) {
        message.state = RoutingState::Scored(ScoreState {
            score: 0.0,
            reached: false,
        });
    }

    fn on_received(&mut self, message: &mut Message, _host: &HostView) {
        let reached = match message.state {
            RoutingState::Scored(state) => state.reached,
            _ => false,
        };
        message.state = RoutingState::Scored(ScoreState {
            score: 0.0,
            reached,
        });
    }

    fn refresh(&mut self, host: &HostView, buffer: &mut MessageBuffer) {
        self.history
            .observe(host.location, host.now, host.link_count > 0);

        for message in buffer.iter_mut() {
            let Some((score, inside)) = message
                .destination
                .region()
                .map(|r| (self.region_score(r), r.contains(host.location)))
            else {
                continue;
            };
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

    fn destination_score(&self, message: &Message, _host: &HostView) -> f64 {
        message
            .destination
            .region()
            .map(|r| self.region_score(r))
            .unwrap_or(0.0)
    }
}
