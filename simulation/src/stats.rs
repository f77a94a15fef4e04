//! Run statistics collected from message events

use std::collections::BTreeMap;

use serde::Serialize;

use geodtn_core::{MessageEvent, MessageId, MessageListener, SimTime};

/// Counters for a whole run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimStats {
    pub messages_created: u64,
    /// Scripted messages the origin refused
    pub creations_failed: u64,
    pub transfers_started: u64,
    pub transfers_completed: u64,
    pub transfers_aborted: u64,
    /// Host-level first deliveries; a geocast can reach many hosts
    pub deliveries: u64,
    pub messages_dropped: u64,
    /// Removed after delivery rather than dropped
    pub messages_removed: u64,
    /// Bytes that crossed a link before the transfer was cut off
    pub aborted_bytes: u64,
    /// Time of the first delivery of each message, by id
    #[serde(skip)]
    first_delivered: BTreeMap<MessageId, f64>,
    /// Seconds from creation to first delivery, summed over delivered messages
    pub total_delivery_latency: f64,
}

impl SimStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct messages delivered at least once
    pub fn messages_delivered(&self) -> u64 {
        self.first_delivered.len() as u64
    }

    /// Share of created messages delivered at least once
    pub fn delivery_ratio(&self) -> f64 {
        if self.messages_created == 0 {
            0.0
        } else {
            self.messages_delivered() as f64 / self.messages_created as f64
        }
    }

    pub fn average_latency(&self) -> Option<f64> {
        let delivered = self.messages_delivered();
        (delivered > 0).then(|| self.total_delivery_latency / delivered as f64)
    }

    /// Relays that were not deliveries, per delivery
    pub fn overhead_ratio(&self) -> Option<f64> {
        (self.deliveries > 0).then(|| {
            (self.transfers_completed as f64 - self.deliveries as f64) / self.deliveries as f64
        })
    }

    /// When `id` first reached a final recipient
    pub fn first_delivery(&self, id: &MessageId) -> Option<SimTime> {
        self.first_delivered.get(id).map(|&t| SimTime::from_secs(t))
    }
}

impl MessageListener for SimStats {
    fn on_event(&mut self, event: &MessageEvent) {
        match event {
            MessageEvent::Created { .. } => self.messages_created += 1,
            MessageEvent::TransferStarted { .. } => self.transfers_started += 1,
            MessageEvent::Transferred {
                message,
                first_delivery,
                at,
                ..
            } => {
                self.transfers_completed += 1;
                if *first_delivery {
                    self.deliveries += 1;
                    if !self.first_delivered.contains_key(&message.id) {
                        self.first_delivered
                            .insert(message.id.clone(), at.as_secs());
                        self.total_delivery_latency += at.since(message.created_at);
                    }
                }
            }
            MessageEvent::TransferAborted {
                message,
                bytes_remaining,
                ..
            } => {
                self.transfers_aborted += 1;
                self.aborted_bytes += message.size.saturating_sub(*bytes_remaining);
            }
            MessageEvent::Deleted { dropped: true, .. } => self.messages_dropped += 1,
            MessageEvent::Deleted { dropped: false, .. } => self.messages_removed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use geodtn_core::{HostId, Message};

    use super::*;

    fn make_message(id: &str, created: f64) -> Message {
        Message::unicast(id, HostId(0), HostId(1), 100, SimTime::from_secs(created))
    }

    fn transferred(message: &Message, first: bool, at: f64) -> MessageEvent {
        MessageEvent::Transferred {
            message: message.clone(),
            from: HostId(0),
            to: HostId(1),
            first_delivery: first,
            at: SimTime::from_secs(at),
        }
    }

    #[test]
    fn test_latency_counts_first_delivery_only() {
        let mut stats = SimStats::new();
        let m = make_message("M1", 10.0);
        stats.on_event(&MessageEvent::Created {
            message: m.clone(),
            at: SimTime::from_secs(10.0),
        });
        stats.on_event(&transferred(&m, false, 12.0));
        stats.on_event(&transferred(&m, true, 20.0));
        stats.on_event(&transferred(&m, true, 50.0));

        assert_eq!(stats.transfers_completed, 3);
        assert_eq!(stats.deliveries, 2);
        assert_eq!(stats.messages_delivered(), 1);
        assert_eq!(stats.average_latency(), Some(10.0));
        assert_eq!(stats.first_delivery(&m.id), Some(SimTime::from_secs(20.0)));
        assert_eq!(stats.delivery_ratio(), 1.0);
        assert_eq!(stats.overhead_ratio(), Some(0.5));
    }

    #[test]
    fn test_abort_and_delete_accounting() {
        let mut stats = SimStats::new();
        let m = make_message("M1", 0.0);
        stats.on_event(&MessageEvent::TransferAborted {
            message: m.clone(),
            from: HostId(0),
            to: HostId(1),
            bytes_remaining: 40,
            at: SimTime::from_secs(3.0),
        });
        for dropped in [true, true, false] {
            stats.on_event(&MessageEvent::Deleted {
                message: m.clone(),
                host: HostId(0),
                dropped,
                at: SimTime::from_secs(4.0),
            });
        }

        assert_eq!(stats.transfers_aborted, 1);
        assert_eq!(stats.aborted_bytes, 60);
        assert_eq!(stats.messages_dropped, 2);
        assert_eq!(stats.messages_removed, 1);
    }

    #[test]
    fn test_empty_run_ratios() {
        let stats = SimStats::new();
        assert_eq!(stats.delivery_ratio(), 0.0);
        assert_eq!(stats.average_latency(), None);
        assert_eq!(stats.overhead_ratio(), None);
    }
}
