use geodtn_core::{Message, RoutingState, SecondChanceState};

use super::{HostView, RoutingStrategy};

/// Copy-limited spray with one extra copy for holders that left the region
///
/// When a copy's budget runs out it is marked exhausted. If the holder is
/// outside the destination region the next time that copy is about to be
/// offered, the copy is granted one more hop. A copy lineage is granted at
/// most once.
#[derive(Debug, Clone)]
pub struct SecondChanceSpray {
    copies: u32,
}

impl SecondChanceSpray {
    pub fn new(copies: u32) -> Self {
        Self { copies }
    }

    fn fresh(&self) -> SecondChanceState {
        SecondChanceState {
            copies: self.copies,
            exhausted: false,
            granted: false,
        }
    }

    fn spend(&self, message: &mut Message) {
        if !matches!(message.state, RoutingState::SecondChance(_)) {
            message.state = RoutingState::SecondChance(self.fresh());
        }
        if let RoutingState::SecondChance(state) = &mut message.state {
            if state.copies > 0 {
                state.copies -= 1;
            }
            if state.copies == 0 {
                state.exhausted = true;
            }
        }
    }

    /// Whether `holder` may claim the extra copy for `message`
    fn eligible(state: &SecondChanceState, message: &Message, holder: &HostView) -> bool {
        state.exhausted
            && !state.granted
            && message
                .destination
                .region()
                .is_some_and(|region| !region.contains(holder.location))
    }
}

impl RoutingStrategy for SecondChanceSpray {
    fn name(&self) -> &'static str {
        "cast_plus"
    }

    fn init_message(&self, message: &mut Message) {
        message.state = RoutingState::SecondChance(self.fresh());
    }

    fn on_received(&mut self, message: &mut Message, _host: &HostView) {
        self.spend(message);
    }

    fn on_transfer_done(&mut self, message: &mut Message, _peer: &HostView) {
        self.spend(message);
    }

    fn before_transfer(&mut self, message: &mut Message, holder: &HostView) {
        let RoutingState::SecondChance(state) = &message.state else {
            return;
        };
        let state = *state;
        if Self::eligible(&state, message, holder) {
            message.state = RoutingState::SecondChance(SecondChanceState {
                copies: state.copies + 1,
                exhausted: false,
                granted: true,
            });
        }
    }

    fn flood_candidate(&self, message: &Message, host: &HostView) -> bool {
        match &message.state {
            RoutingState::SecondChance(state) => {
                state.copies > 0 || Self::eligible(state, message, host)
            }
            _ => self.copies > 0,
        }
    }
}
