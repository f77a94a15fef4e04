//! Transfer accept policies

use std::collections::BTreeSet;

use geodtn_core::{HostId, Message, PolicyConfig};

/// Veto over individual transfers
pub trait AcceptPolicy: std::fmt::Debug {
    /// May `from` offer `message` to `to`?
    fn accept_sending(&self, from: HostId, to: HostId, message: &Message) -> bool;

    /// May `to` take `message` from `from`?
    fn accept_receiving(&self, from: HostId, to: HostId, message: &Message) -> bool;
}

/// Policy built from [`PolicyConfig`] rules
#[derive(Debug, Clone, Default)]
pub struct RulePolicy {
    deny_send_to: BTreeSet<HostId>,
    deny_receive_from: BTreeSet<HostId>,
    max_message_size: Option<u64>,
    max_hops: Option<usize>,
}

impl RulePolicy {
    /// Policy that accepts everything
    pub fn permissive() -> Self {
        Self::default()
    }

    fn message_allowed(&self, message: &Message) -> bool {
        if self.max_message_size.is_some_and(|max| message.size > max) {
            return false;
        }
        if self.max_hops.is_some_and(|max| message.hop_count() >= max) {
            return false;
        }
        true
    }
}

impl From<&PolicyConfig> for RulePolicy {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            deny_send_to: config.deny_send_to.iter().copied().collect(),
            deny_receive_from: config.deny_receive_from.iter().copied().collect(),
            max_message_size: config.max_message_size,
            max_hops: config.max_hops,
        }
    }
}

impl AcceptPolicy for RulePolicy {
    fn accept_sending(&self, _from: HostId, to: HostId, message: &Message) -> bool {
        !self.deny_send_to.contains(&to) && self.message_allowed(message)
    }

    fn accept_receiving(&self, from: HostId, _to: HostId, message: &Message) -> bool {
        !self.deny_receive_from.contains(&from) && self.message_allowed(message)
    }
}
