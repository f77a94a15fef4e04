//! Queue ordering for messages competing for a link

use std::cmp::Ordering;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use geodtn_core::{Message, QueueMode, SimTime};

/// Anything that can be ordered by the message it refers to
pub trait Queued {
    fn queued_message(&self) -> &Message;
}

impl Queued for Message {
    fn queued_message(&self) -> &Message {
        self
    }
}

impl Queued for &Message {
    fn queued_message(&self) -> &Message {
        self
    }
}

impl<T> Queued for (&Message, T) {
    fn queued_message(&self) -> &Message {
        self.0
    }
}

/// Order `items` by `mode`
///
/// Comparator modes are stable. Random mode shuffles with a generator
/// seeded from the whole seconds of `now`, so a run is reproducible.
pub fn sort_by_queue_mode<T: Queued>(items: &mut [T], mode: QueueMode, now: SimTime) {
    match mode {
        QueueMode::Random => {
            if items.len() > 1 {
                let mut rng = StdRng::seed_from_u64(now.whole_secs());
                items.shuffle(&mut rng);
            }
        }
        _ => items.sort_by(|a, b| {
            compare_by_queue_mode(a.queued_message(), b.queued_message(), mode, now)
        }),
    }
}

/// Which of two messages goes first under `mode`
///
/// Random mode treats every pair as equal.
pub fn compare_by_queue_mode(a: &Message, b: &Message, mode: QueueMode, now: SimTime) -> Ordering {
    match mode {
        QueueMode::Random => Ordering::Equal,
        QueueMode::Fifo => a.received_at.as_secs().total_cmp(&b.received_at.as_secs()),
        QueueMode::Lifo => b.received_at.as_secs().total_cmp(&a.received_at.as_secs()),
        QueueMode::HighTtlFirst => b
            .remaining_ttl_or_max(now)
            .total_cmp(&a.remaining_ttl_or_max(now)),
        QueueMode::LowTtlFirst => a
            .remaining_ttl_or_max(now)
            .total_cmp(&b.remaining_ttl_or_max(now)),
    }
}
