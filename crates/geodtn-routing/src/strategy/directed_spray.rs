use geodtn_core::{DirectedSprayState, Heading, Message, RoutingState};

use crate::buffer::MessageBuffer;

use super::{HostView, PeerView, RoutingStrategy};

/// Copy-limited spray that only hands copies to peers heading for the destination
///
/// Every tick the holder recomputes its bearing toward each destination
/// centroid and stamps it on the message as the target heading. A copy is
/// relayed only to a peer whose own heading is that target while the
/// holder's heading is not.
#[derive(Debug, Clone)]
pub struct DirectedSpray {
    copies: u32,
}

impl DirectedSpray {
    pub fn new(copies: u32) -> Self {
        Self { copies }
    }

    fn update(&self, message: &mut Message, f: impl FnOnce(&mut DirectedSprayState)) {
        match &mut message.state {
            RoutingState::DirectedSpray(state) => f(state),
            other => {
                let mut state = DirectedSprayState {
                    copies: self.copies,
                    target: Heading::StandStill,
                };
                f(&mut state);
                *other = RoutingState::DirectedSpray(state);
            }
        }
    }

    fn spend(&self, message: &mut Message) {
        self.update(message, |state| state.copies = state.copies.saturating_sub(1));
    }
}

impl RoutingStrategy for DirectedSpray {
    fn name(&self) -> &'static str {
        "gswd"
    }

    fn init_message(&self, message: &mut Message) {
        message.state = RoutingState::DirectedSpray(DirectedSprayState {
            copies: self.copies,
            target: Heading::StandStill,
        });
    }

    fn on_received(&mut self, message: &mut Message, _host: &HostView) {
        self.spend(message);
    }

    fn on_transfer_done(&mut self, message: &mut Message, _peer: &HostView) {
        self.spend(message);
    }

    fn refresh(&mut self, host: &HostView, buffer: &mut MessageBuffer) {
        for message in buffer.iter_mut() {
            let Some(centroid) = message.destination.region().map(|r| r.centroid()) else {
                continue;
            };
            let target = Heading::toward(host.location, centroid);
            self.update(message, |state| state.target = target);
        }
    }

    fn relay_to(&self, message: &Message, host: &HostView, peer: &PeerView<'_>) -> bool {
        if !message.destination.is_geocast() {
            return false;
        }
        match &message.state {
            RoutingState::DirectedSpray(state) => {
                state.copies > 0
                    && host.heading != state.target
                    && peer.host.heading == state.target
            }
            _ => false,
        }
    }

    fn floods(&self) -> bool {
        false
    }
}
