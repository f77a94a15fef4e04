//! Active router: admission, eviction and sending bookkeeping
//!
//! [`ActiveRouter`] wraps a [`MessageRouter`] with everything a host needs
//! to take part in transfers: the admission gate that produces a
//! [`ReceiveVerdict`], buffer eviction, the list of links it is sending on,
//! the periodic TTL sweep, an optional energy model and an accept policy.
//! The transfer searches themselves run in the world, which can see both
//! ends of a link.

use serde::Serialize;
use tracing::{debug, trace, warn};

use geodtn_core::{Coord, HostId, Listeners, Message, MessageId, RouterConfig, SimTime};

use crate::energy::EnergyModel;
use crate::error::CreateError;
use crate::link::LinkId;
use crate::policy::{AcceptPolicy, RulePolicy};
use crate::router::MessageRouter;
use crate::strategy::RoutingStrategy;
use crate::verdict::ReceiveVerdict;

/// One buffered message as it appears in a [`RoutingSummary`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferedMessage {
    pub id: MessageId,
    pub size: u64,
    /// Minutes left, `None` for messages that never expire
    pub remaining_ttl: Option<f64>,
    pub hops: usize,
    /// Remaining copy budget for copy-limited strategies
    pub copies: Option<u32>,
}

/// Point-in-time view of one router, for reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingSummary {
    pub host: HostId,
    pub strategy: &'static str,
    pub messages: Vec<BufferedMessage>,
    pub occupied_bytes: u64,
    pub free_bytes: i64,
    pub delivered: usize,
    pub blacklisted: usize,
    pub sending: usize,
    pub energy: Option<f64>,
}

/// Router of one host taking part in transfers
#[derive(Debug)]
pub struct ActiveRouter {
    base: MessageRouter,
    strategy: Box<dyn RoutingStrategy>,
    /// Links this router is sending on, with the message each carries
    sending: Vec<(LinkId, MessageId)>,
    last_ttl_check: SimTime,
    energy: Option<EnergyModel>,
    policy: Box<dyn AcceptPolicy>,
}

impl ActiveRouter {
    pub fn new(
        host: HostId,
        config: RouterConfig,
        strategy: Box<dyn RoutingStrategy>,
        now: SimTime,
    ) -> Self {
        let energy = config.energy.clone().map(|e| EnergyModel::new(e, now));
        let policy = Box::new(RulePolicy::from(&config.policy));
        Self {
            base: MessageRouter::new(host, config),
            strategy,
            sending: Vec::new(),
            last_ttl_check: now,
            energy,
            policy,
        }
    }

    /// Replace the accept policy built from the configuration
    pub fn with_policy(mut self, policy: Box<dyn AcceptPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn host(&self) -> HostId {
        self.base.host()
    }

    pub fn config(&self) -> &RouterConfig {
        self.base.config()
    }

    pub fn base(&self) -> &MessageRouter {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut MessageRouter {
        &mut self.base
    }

    pub fn strategy(&self) -> &dyn RoutingStrategy {
        self.strategy.as_ref()
    }

    pub fn strategy_mut(&mut self) -> &mut dyn RoutingStrategy {
        self.strategy.as_mut()
    }

    /// Both halves at once, for hooks that mutate buffered messages
    pub fn parts_mut(&mut self) -> (&mut MessageRouter, &mut dyn RoutingStrategy) {
        (&mut self.base, self.strategy.as_mut())
    }

    pub fn policy(&self) -> &dyn AcceptPolicy {
        self.policy.as_ref()
    }

    pub fn energy(&self) -> Option<&EnergyModel> {
        self.energy.as_ref()
    }

    pub fn energy_mut(&mut self) -> Option<&mut EnergyModel> {
        self.energy.as_mut()
    }

    /// Whether `id` currently occupies one of our outbound links
    pub fn is_sending(&self, id: &MessageId) -> bool {
        self.sending.iter().any(|(_, m)| m == id)
    }

    pub fn sending(&self) -> &[(LinkId, MessageId)] {
        &self.sending
    }

    pub fn is_transferring(&self) -> bool {
        !self.sending.is_empty()
    }

    pub(crate) fn mark_sending(&mut self, link: LinkId, id: MessageId) {
        self.sending.push((link, id));
    }

    pub(crate) fn release(&mut self, link: LinkId) -> Option<MessageId> {
        let pos = self.sending.iter().position(|(l, _)| *l == link)?;
        Some(self.sending.remove(pos).1)
    }

    /// Admission gate for an offer of `message` from `from`
    ///
    /// `busy` reports whether this host already has a transfer in progress.
    /// Checks run in a fixed order and the first failure decides.
    pub fn check_receiving(
        &mut self,
        message: &Message,
        from: HostId,
        busy: bool,
        location: Coord,
        now: SimTime,
        listeners: &mut Listeners,
    ) -> ReceiveVerdict {
        let host = self.host();
        if busy {
            return ReceiveVerdict::TryLaterBusy;
        }
        let id = &message.id;
        if self.base.has_message(id) || self.base.is_delivered(id) || self.base.is_blacklisted(id) {
            return ReceiveVerdict::DeniedOld;
        }
        if message.is_expired(now) && !message.is_final_recipient(host, location) {
            return ReceiveVerdict::DeniedTtl;
        }
        if self.energy.as_ref().is_some_and(EnergyModel::is_depleted) {
            return ReceiveVerdict::DeniedLowResources;
        }
        if !self.policy.accept_receiving(from, host, message) {
            return ReceiveVerdict::DeniedPolicy;
        }
        if !self.make_room(message.size, now, listeners) {
            return ReceiveVerdict::DeniedNoSpace;
        }
        ReceiveVerdict::Accepted
    }

    /// Evict oldest messages until `size` bytes are free
    ///
    /// Never evicts a message that is being sent. Fails at once when `size`
    /// exceeds the capacity, and when evictable messages run out first.
    pub fn make_room(&mut self, size: u64, now: SimTime, listeners: &mut Listeners) -> bool {
        if size > self.base.buffer().capacity() {
            return false;
        }
        while i128::from(self.base.free_buffer_size()) < i128::from(size) {
            let victim = {
                let sending = &self.sending;
                self.base
                    .buffer()
                    .oldest_evictable(|id| sending.iter().any(|(_, m)| m == id))
                    .cloned()
            };
            let Some(victim) = victim else {
                trace!("No evictable message left at {}", self.host());
                return false;
            };
            if let Err(e) = self.base.delete(&victim, true, now, listeners) {
                warn!("Eviction at {} failed: {}", self.host(), e);
                return false;
            }
        }
        true
    }

    /// Create `message` at this host
    ///
    /// A message larger than the whole buffer is refused and leaves the
    /// buffer untouched. Otherwise room is made on a best-effort basis and
    /// any overflow is repaired on the next update.
    pub fn create_message(
        &mut self,
        mut message: Message,
        now: SimTime,
        listeners: &mut Listeners,
    ) -> Result<(), CreateError> {
        if self.base.has_message(&message.id) {
            return Err(CreateError::Duplicate(message.id));
        }
        let capacity = self.base.buffer().capacity();
        if message.size > capacity {
            debug!(
                "Refusing {} at {}: {} bytes exceed capacity {}",
                message.id,
                self.host(),
                message.size,
                capacity
            );
            return Err(CreateError::TooLarge {
                size: message.size,
                capacity,
            });
        }
        self.make_room(message.size, now, listeners);
        if let Some(ttl) = self.config().message_ttl {
            message.ttl = Some(ttl);
        }
        self.strategy.init_message(&mut message);
        self.base.add_created(message, now, listeners);
        Ok(())
    }

    /// Evict until occupancy is back within capacity
    pub fn repair_overflow(&mut self, now: SimTime, listeners: &mut Listeners) {
        if self.base.free_buffer_size() < 0 && !self.make_room(0, now, listeners) {
            warn!(
                "Buffer at {} still overfull by {} bytes",
                self.host(),
                -self.base.free_buffer_size()
            );
        }
    }

    /// Drop expired messages once per sweep interval, never mid-transfer
    pub fn sweep_expired(&mut self, now: SimTime, listeners: &mut Listeners) -> usize {
        if now.since(self.last_ttl_check) < self.config().ttl_check_interval
            || self.is_transferring()
        {
            return 0;
        }
        self.last_ttl_check = now;
        let dropped = self.base.drop_expired(now, listeners);
        if dropped > 0 {
            debug!("Dropped {} expired messages at {}", dropped, self.host());
        }
        dropped
    }

    /// Charge the energy model for time up to `now`
    ///
    /// `transferring` is whether any link of the host carries a message,
    /// received ones included; the router alone only knows what it sends.
    pub fn update_energy(&mut self, now: SimTime, transferring: bool) {
        if let Some(energy) = &mut self.energy {
            energy.update(now, transferring);
        }
    }

    pub fn summary(&self, now: SimTime) -> RoutingSummary {
        let messages = self
            .base
            .buffer()
            .iter()
            .map(|m| BufferedMessage {
                id: m.id.clone(),
                size: m.size,
                remaining_ttl: m.remaining_ttl(now),
                hops: m.hop_count(),
                copies: m.state.copies(),
            })
            .collect();
        RoutingSummary {
            host: self.host(),
            strategy: self.strategy.name(),
            messages,
            occupied_bytes: self.base.buffer().occupied(),
            free_bytes: self.base.free_buffer_size(),
            delivered: self.base.delivered_count(),
            blacklisted: self.base.blacklist_count(),
            sending: self.sending.len(),
            energy: self.energy.as_ref().map(EnergyModel::level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use geodtn_core::{EnergyConfig, EventLog, PolicyConfig, Region};

    use crate::strategy::{Epidemic, Spray};

    fn region() -> Arc<Region> {
        Arc::new(Region::from_points(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]).unwrap())
    }

    fn make_message(id: &str, size: u64, received: f64) -> Message {
        let mut m = Message::geocast(id, HostId(0), region(), size, SimTime::ZERO);
        m.received_at = SimTime::from_secs(received);
        m
    }

    fn make_router(config: RouterConfig) -> ActiveRouter {
        ActiveRouter::new(HostId(1), config, Box::new(Epidemic), SimTime::ZERO)
    }

    fn outside() -> Coord {
        Coord::new(50.0, 50.0)
    }

    #[test]
    fn test_create_too_large_leaves_buffer_untouched() {
        let mut router = make_router(RouterConfig::bounded(1000));
        let mut listeners = Listeners::new();
        router
            .create_message(make_message("A", 400, 0.0), SimTime::ZERO, &mut listeners)
            .unwrap();
        let free = router.base().free_buffer_size();

        let err = router.create_message(make_message("B", 1200, 0.0), SimTime::ZERO, &mut listeners);
        assert_eq!(
            err,
            Err(CreateError::TooLarge {
                size: 1200,
                capacity: 1000
            })
        );
        assert_eq!(router.base().free_buffer_size(), free);
        assert!(router.base().has_message(&"A".into()));
    }

    #[test]
    fn test_create_duplicate_refused() {
        let mut router = make_router(RouterConfig::default());
        let mut listeners = Listeners::new();
        router
            .create_message(make_message("A", 10, 0.0), SimTime::ZERO, &mut listeners)
            .unwrap();
        assert_eq!(
            router.create_message(make_message("A", 10, 0.0), SimTime::ZERO, &mut listeners),
            Err(CreateError::Duplicate("A".into()))
        );
    }

    #[test]
    fn test_create_applies_router_ttl_and_strategy_state() {
        let mut router = ActiveRouter::new(
            HostId(0),
            RouterConfig::default().with_ttl(5),
            Box::new(Spray::new(3)),
            SimTime::ZERO,
        );
        let mut listeners = Listeners::new();
        router
            .create_message(make_message("A", 10, 0.0), SimTime::ZERO, &mut listeners)
            .unwrap();
        let m = router.base().message(&"A".into()).unwrap();
        assert_eq!(m.ttl, Some(5));
        assert_eq!(m.state.copies(), Some(3));
    }

    #[test]
    fn test_admission_order() {
        let mut router = make_router(RouterConfig::bounded(1000));
        let mut listeners = Listeners::new();
        let m = make_message("M", 100, 0.0);

        // Busy wins over everything.
        router
            .create_message(make_message("M", 100, 0.0), SimTime::ZERO, &mut listeners)
            .unwrap();
        assert_eq!(
            router.check_receiving(&m, HostId(0), true, outside(), SimTime::ZERO, &mut listeners),
            ReceiveVerdict::TryLaterBusy
        );
        assert_eq!(
            router.check_receiving(&m, HostId(0), false, outside(), SimTime::ZERO, &mut listeners),
            ReceiveVerdict::DeniedOld
        );

        let fresh = make_message("N", 100, 0.0);
        assert_eq!(
            router.check_receiving(&fresh, HostId(0), false, outside(), SimTime::ZERO, &mut listeners),
            ReceiveVerdict::Accepted
        );
        let big = make_message("X", 2000, 0.0);
        assert_eq!(
            router.check_receiving(&big, HostId(0), false, outside(), SimTime::ZERO, &mut listeners),
            ReceiveVerdict::DeniedNoSpace
        );
    }

    #[test]
    fn test_expired_denied_unless_final_recipient() {
        let mut router = make_router(RouterConfig::default());
        let mut listeners = Listeners::new();
        let m = make_message("M", 10, 0.0).with_ttl(1);
        let late = SimTime::from_secs(61.0);

        assert_eq!(
            router.check_receiving(&m, HostId(0), false, outside(), late, &mut listeners),
            ReceiveVerdict::DeniedTtl
        );
        assert_eq!(
            router.check_receiving(&m, HostId(0), false, Coord::new(5.0, 5.0), late, &mut listeners),
            ReceiveVerdict::Accepted
        );
    }

    #[test]
    fn test_low_resources_and_policy() {
        let config = RouterConfig::default().with_energy(EnergyConfig {
            initial: 0.0,
            ..EnergyConfig::default()
        });
        let mut router = make_router(config);
        let mut listeners = Listeners::new();
        let m = make_message("M", 10, 0.0);
        assert_eq!(
            router.check_receiving(&m, HostId(0), false, outside(), SimTime::ZERO, &mut listeners),
            ReceiveVerdict::DeniedLowResources
        );

        let config = RouterConfig::default().with_policy(PolicyConfig {
            deny_receive_from: vec![HostId(0)],
            ..PolicyConfig::default()
        });
        let mut router = make_router(config);
        assert_eq!(
            router.check_receiving(&m, HostId(0), false, outside(), SimTime::ZERO, &mut listeners),
            ReceiveVerdict::DeniedPolicy
        );
        assert_eq!(
            router.check_receiving(&m, HostId(2), false, outside(), SimTime::ZERO, &mut listeners),
            ReceiveVerdict::Accepted
        );
    }

    #[test]
    fn test_make_room_evicts_oldest_first() {
        let mut router = make_router(RouterConfig::bounded(300));
        let log = EventLog::shared();
        let mut listeners = Listeners::new();
        listeners.register(log.clone());

        for (id, received) in [("A", 5.0), ("B", 1.0), ("C", 3.0)] {
            router
                .base_mut()
                .add_created(make_message(id, 100, received), SimTime::ZERO, &mut listeners);
        }
        assert!(router.make_room(150, SimTime::ZERO, &mut listeners));
        assert!(!router.base().has_message(&"B".into()));
        assert!(!router.base().has_message(&"C".into()));
        assert!(router.base().has_message(&"A".into()));
        assert_eq!(log.borrow().count("deleted"), 2);
    }

    #[test]
    fn test_make_room_never_evicts_sending() {
        let mut router = make_router(RouterConfig::bounded(200));
        let mut listeners = Listeners::new();
        router
            .base_mut()
            .add_created(make_message("A", 100, 0.0), SimTime::ZERO, &mut listeners);
        router
            .base_mut()
            .add_created(make_message("B", 100, 1.0), SimTime::ZERO, &mut listeners);
        router.mark_sending(LinkId(0), "A".into());

        assert!(router.make_room(100, SimTime::ZERO, &mut listeners));
        assert!(router.base().has_message(&"A".into()));
        assert!(!router.base().has_message(&"B".into()));

        assert!(!router.make_room(200, SimTime::ZERO, &mut listeners));
        assert!(router.base().has_message(&"A".into()));
        assert!(!router.make_room(201, SimTime::ZERO, &mut listeners));
    }

    #[test]
    fn test_sweep_waits_for_interval_and_idle_links() {
        let mut router = make_router(RouterConfig::default());
        let mut listeners = Listeners::new();
        router
            .base_mut()
            .add_created(make_message("A", 10, 0.0).with_ttl(1), SimTime::ZERO, &mut listeners);

        assert_eq!(router.sweep_expired(SimTime::from_secs(30.0), &mut listeners), 0);

        router.mark_sending(LinkId(0), "B".into());
        assert_eq!(router.sweep_expired(SimTime::from_secs(61.0), &mut listeners), 0);
        assert!(router.base().has_message(&"A".into()));

        assert_eq!(router.release(LinkId(0)), Some("B".into()));
        assert_eq!(router.sweep_expired(SimTime::from_secs(62.0), &mut listeners), 1);
        assert!(!router.base().has_message(&"A".into()));
    }

    #[test]
    fn test_repair_overflow() {
        let mut router = make_router(RouterConfig::bounded(150));
        let mut listeners = Listeners::new();
        router
            .base_mut()
            .add_created(make_message("A", 100, 0.0), SimTime::ZERO, &mut listeners);
        router
            .base_mut()
            .add_created(make_message("B", 100, 1.0), SimTime::ZERO, &mut listeners);
        assert!(router.base().free_buffer_size() < 0);

        router.repair_overflow(SimTime::ZERO, &mut listeners);
        assert_eq!(router.base().free_buffer_size(), 50);
        assert!(router.base().has_message(&"B".into()));
    }

    #[test]
    fn test_summary() {
        let mut router = make_router(RouterConfig::bounded(500));
        let mut listeners = Listeners::new();
        router
            .create_message(make_message("A", 100, 0.0).with_ttl(10), SimTime::ZERO, &mut listeners)
            .unwrap();
        let summary = router.summary(SimTime::from_minutes(4.0));
        assert_eq!(summary.strategy, "epidemic");
        assert_eq!(summary.messages.len(), 1);
        assert_eq!(summary.messages[0].remaining_ttl, Some(6.0));
        assert_eq!(summary.free_bytes, 400);
        assert_eq!(summary.energy, None);
    }
}
