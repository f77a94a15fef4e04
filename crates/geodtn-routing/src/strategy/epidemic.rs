use geodtn_core::{Message, RoutingState};

use super::RoutingStrategy;

/// Flood every buffered message to every peer
///
/// Epidemic carries no per-message state and uses every default hook: a
/// delivery search for final recipients, then a flood over all links.
#[derive(Debug, Clone, Copy, Default)]
pub struct Epidemic;

impl RoutingStrategy for Epidemic {
    fn name(&self) -> &'static str {
        "epidemic"
    }

    fn init_message(&self, message: &mut Message) {
        message.state = RoutingState::None;
    }
}
