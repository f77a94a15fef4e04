use geodtn_core::{Message, RoutingState, SprayState};

use super::{HostView, RoutingStrategy};

/// Copy-limited spray
///
/// Each completed hop takes one copy from the receiver's replica and one
/// from the sender's retained copy, never going below zero. Only messages
/// with copies left are flooded; delivery to final recipients is never
/// gated by the counter.
#[derive(Debug, Clone)]
pub struct Spray {
    copies: u32,
}

impl Spray {
    pub fn new(copies: u32) -> Self {
        Self { copies }
    }

    pub fn initial_copies(&self) -> u32 {
        self.copies
    }

    fn spend(&self, message: &mut Message) {
        match &mut message.state {
            RoutingState::Spray(state) => state.copies = state.copies.saturating_sub(1),
            other => {
                *other = RoutingState::Spray(SprayState {
                    copies: self.copies.saturating_sub(1),
                })
            }
        }
    }
}

impl RoutingStrategy for Spray {
    fn name(&self) -> &'static str {
        "gsaf"
    }

    fn init_message(&self, message: &mut Message) {
        message.state = RoutingState::Spray(SprayState {
            copies: self.copies,
        });
    }

    fn on_received(&mut self, message: &mut Message, _host: &HostView) {
        self.spend(message);
    }

    fn on_transfer_done(&mut self, message: &mut Message, _peer: &HostView) {
        self.spend(message);
    }

    fn flood_candidate(&self, message: &Message, _host: &HostView) -> bool {
        match &message.state {
            RoutingState::Spray(state) => state.copies > 0,
            _ => self.copies > 0,
        }
    }
}
