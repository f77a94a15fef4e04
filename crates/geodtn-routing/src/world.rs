//! Arena of hosts and links
//!
//! The [`World`] owns every host (location, heading and router) and every
//! link, addressed by [`HostId`] and [`LinkId`] handles. It is the only place
//! that sees both ends of a link at once, so it runs the transfer searches:
//!
//! 1. **Delivery search**: every `(message, link)` pair whose peer is a final
//!    recipient, or that the strategy wants relayed, in queue order. The
//!    first accepted pair wins. If none is accepted, peers are asked to push
//!    the messages they hold for this host.
//! 2. **Flood search** (strategies that flood): links in order, and for each
//!    link the strategy's candidates in queue order. The first accepted
//!    message stops the search; a retry-later answer moves to the next link.
//!
//! A driver moves hosts with [`World::set_location`], opens and closes links
//! with [`World::connect`] / [`World::disconnect`] and calls
//! [`World::update`] once per tick.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, debug_span, trace, warn};

use geodtn_core::{
    ConfigResult, Coord, Heading, HostId, Listeners, Message, MessageId, MessageListener,
    RouterConfig, SimTime,
};

use crate::active::{ActiveRouter, RoutingSummary};
use crate::cells::CellGrid;
use crate::error::{CreateError, RoutingError, RoutingResult};
use crate::link::{Delivered, Link, LinkId};
use crate::queue::sort_by_queue_mode;
use crate::strategy::{HostView, PeerView, RoutingStrategy, StrategyConfig};
use crate::verdict::ReceiveVerdict;

/// A node of the simulated network
#[derive(Debug)]
pub struct Host {
    id: HostId,
    location: Coord,
    /// Location at the previous update
    anchor: Coord,
    heading: Heading,
    /// Live links touching this host, in the order they were opened
    links: Vec<LinkId>,
    router: ActiveRouter,
}

impl Host {
    pub fn id(&self) -> HostId {
        self.id
    }

    pub fn location(&self) -> Coord {
        self.location
    }

    /// Direction of travel since the previous update
    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub fn router(&self) -> &ActiveRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut ActiveRouter {
        &mut self.router
    }
}

/// Hosts, links, listeners and the clock
#[derive(Debug, Default)]
pub struct World {
    hosts: Vec<Host>,
    /// Live links only; handles are never reused
    links: BTreeMap<LinkId, Link>,
    next_link: u32,
    cells: Arc<CellGrid>,
    listeners: Listeners,
    now: SimTime,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// World whose scored strategies use `cells`
    pub fn with_cells(cells: CellGrid) -> Self {
        Self {
            cells: Arc::new(cells),
            ..Self::default()
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn cells(&self) -> &Arc<CellGrid> {
        &self.cells
    }

    pub fn register_listener(&mut self, listener: impl MessageListener + 'static) {
        self.listeners.register(listener);
    }

    pub fn listeners_mut(&mut self) -> &mut Listeners {
        &mut self.listeners
    }

    /// Add a host running the strategy described by `strategy`
    pub fn add_host(
        &mut self,
        location: Coord,
        config: RouterConfig,
        strategy: &StrategyConfig,
    ) -> ConfigResult<HostId> {
        let strategy = strategy.build(&self.cells)?;
        self.add_host_with(location, config, strategy)
    }

    /// Add a host running an already built strategy
    pub fn add_host_with(
        &mut self,
        location: Coord,
        config: RouterConfig,
        strategy: Box<dyn RoutingStrategy>,
    ) -> ConfigResult<HostId> {
        config.validate()?;
        let id = HostId(self.hosts.len() as u32);
        for warning in config.warnings() {
            warn!("Router config warning for host {}: {}", id, warning);
        }
        let router = ActiveRouter::new(id, config, strategy, self.now);
        self.hosts.push(Host {
            id,
            location,
            anchor: location,
            heading: Heading::StandStill,
            links: Vec::new(),
            router,
        });
        Ok(id)
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn host(&self, id: HostId) -> RoutingResult<&Host> {
        self.hosts
            .get(id.index())
            .ok_or(RoutingError::UnknownHost(id))
    }

    pub fn host_mut(&mut self, id: HostId) -> RoutingResult<&mut Host> {
        self.hosts
            .get_mut(id.index())
            .ok_or(RoutingError::UnknownHost(id))
    }

    /// Move a host
    ///
    /// The heading becomes the bearing from where the host was at its
    /// previous update, so several moves within one tick count as one.
    pub fn set_location(&mut self, id: HostId, location: Coord) -> RoutingResult<()> {
        let host = self.host_mut(id)?;
        host.heading = Heading::toward(host.anchor, location);
        host.location = location;
        Ok(())
    }

    /// Bring up a link opened by `initiator` toward `peer`
    pub fn connect(&mut self, initiator: HostId, peer: HostId, speed: f64) -> RoutingResult<LinkId> {
        self.host(initiator)?;
        if let Some(energy) = self.host_mut(peer)?.router.energy_mut() {
            energy.reduce_discovery();
        }
        let id = LinkId(self.next_link);
        self.next_link += 1;
        self.links
            .insert(id, Link::new(id, initiator, peer, speed, self.now));
        self.hosts[initiator.index()].links.push(id);
        if peer != initiator {
            self.hosts[peer.index()].links.push(id);
        }
        trace!("Link {} up between {} and {}", id, initiator, peer);
        Ok(id)
    }

    /// Take a link down
    ///
    /// An idle link is released at once. A link carrying a message stays
    /// until its sender notices and aborts the transfer.
    pub fn disconnect(&mut self, id: LinkId) -> RoutingResult<()> {
        let link = self.link_mut(id)?;
        link.set_up(false);
        let idle = !link.is_transferring();
        if idle {
            self.release_link(id);
        }
        trace!("Link {} down", id);
        Ok(())
    }

    /// Forget a link and drop it from both endpoints' indexes
    fn release_link(&mut self, id: LinkId) {
        let Some(link) = self.links.remove(&id) else {
            return;
        };
        let (a, b) = link.endpoints();
        for end in [a, b] {
            if let Some(host) = self.hosts.get_mut(end.index()) {
                host.links.retain(|&l| l != id);
            }
        }
    }

    pub fn link(&self, id: LinkId) -> RoutingResult<&Link> {
        self.links.get(&id).ok_or(RoutingError::UnknownLink(id))
    }

    fn link_mut(&mut self, id: LinkId) -> RoutingResult<&mut Link> {
        self.links.get_mut(&id).ok_or(RoutingError::UnknownLink(id))
    }

    /// Links still held, including down links waiting for their sender
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn set_link_speed(&mut self, id: LinkId, speed: f64) -> RoutingResult<()> {
        self.link_mut(id)?.set_speed(speed);
        Ok(())
    }

    /// Up links of `host`, in the order they were opened
    pub fn links_of(&self, host: HostId) -> Vec<LinkId> {
        self.host_links(host)
            .filter(|l| l.is_up())
            .map(Link::id)
            .collect()
    }

    /// Whether any link of `host` is carrying a message, in either direction
    pub fn is_transferring(&self, host: HostId) -> bool {
        self.host_links(host).any(Link::is_transferring)
    }

    fn host_links(&self, host: HostId) -> impl Iterator<Item = &Link> {
        self.hosts
            .get(host.index())
            .map(|h| h.links.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.links.get(id))
    }

    pub fn host_view(&self, id: HostId) -> RoutingResult<HostView> {
        let host = self.host(id)?;
        Ok(HostView {
            id,
            location: host.location,
            heading: host.heading,
            link_count: self.links_of(id).len(),
            now: self.now,
        })
    }

    /// Create a message at its origin host
    pub fn create_message(&mut self, message: Message) -> Result<(), CreateError> {
        let origin = message.from;
        let host = self
            .hosts
            .get_mut(origin.index())
            .ok_or(CreateError::UnknownHost(origin))?;
        host.router
            .create_message(message, self.now, &mut self.listeners)
    }

    /// Remove a buffered message from `host`
    pub fn delete_message(
        &mut self,
        host: HostId,
        id: &MessageId,
        dropped: bool,
    ) -> RoutingResult<Message> {
        let now = self.now;
        let host = self
            .hosts
            .get_mut(host.index())
            .ok_or(RoutingError::UnknownHost(host))?;
        host.router
            .base_mut()
            .delete(id, dropped, now, &mut self.listeners)
    }

    pub fn summary(&self) -> Vec<RoutingSummary> {
        self.hosts
            .iter()
            .map(|h| h.router.summary(self.now))
            .collect()
    }

    /// Advance the clock and every link to `now`
    pub fn advance(&mut self, now: SimTime) {
        self.now = now;
        for link in self.links.values_mut() {
            link.advance(now);
        }
    }

    /// One tick: advance to `now`, then update every host in id order
    pub fn update(&mut self, now: SimTime) -> RoutingResult<()> {
        self.advance(now);
        for i in 0..self.hosts.len() {
            let id = HostId(i as u32);
            let _span = debug_span!("host", host = %id).entered();
            self.update_host(id)?;
        }
        Ok(())
    }

    /// Run one host's share of a tick
    pub fn update_host(&mut self, id: HostId) -> RoutingResult<()> {
        let now = self.now;
        self.host_mut(id)?
            .router
            .base_mut()
            .update_applications(now);

        self.settle_transfers(id)?;

        let transferring = self.is_transferring(id);
        let host = &mut self.hosts[id.index()];
        host.heading = Heading::toward(host.anchor, host.location);
        host.anchor = host.location;
        host.router.repair_overflow(now, &mut self.listeners);
        host.router.sweep_expired(now, &mut self.listeners);
        host.router.update_energy(now, transferring);

        let view = self.host_view(id)?;
        let (base, strategy) = self.hosts[id.index()].router.parts_mut();
        strategy.refresh(&view, base.buffer_mut());

        if self.is_transferring(id) || self.hosts[id.index()].router.base().message_count() == 0 {
            return Ok(());
        }
        let links = self.links_of(id);
        if links.is_empty() {
            return Ok(());
        }

        if self.exchange_deliverable(id, &links)? {
            return Ok(());
        }
        if self.hosts[id.index()].router.strategy().floods() {
            self.flood(id, &links)?;
        }
        Ok(())
    }

    /// Finalize completed sends and abort sends on links that went down
    fn settle_transfers(&mut self, id: HostId) -> RoutingResult<()> {
        let now = self.now;
        let sending = self.host(id)?.router.sending().to_vec();
        for (link_id, _) in sending {
            let link = self.link_mut(link_id)?;
            let up = link.is_up();
            if link.is_message_transferred() {
                let done = link.finalize()?;
                if !up {
                    self.release_link(link_id);
                }
                self.hosts[id.index()].router.release(link_id);
                self.complete_transfer(done)?;
            } else if !up {
                let cut = link.abort()?;
                self.hosts[id.index()].router.release(link_id);
                self.release_link(link_id);
                debug!(
                    "Transfer of {} to {} aborted with {} bytes left",
                    cut.id, cut.receiver, cut.bytes_remaining
                );
                let receiver = self
                    .hosts
                    .get_mut(cut.receiver.index())
                    .ok_or(RoutingError::UnknownHost(cut.receiver))?;
                receiver.router.base_mut().aborted(
                    &cut.id,
                    cut.sender,
                    cut.bytes_remaining,
                    now,
                    &mut self.listeners,
                )?;
            }
        }
        Ok(())
    }

    fn complete_transfer(&mut self, done: Delivered) -> RoutingResult<()> {
        let now = self.now;
        let receiver_view = self.host_view(done.receiver)?;

        let (base, strategy) = self.host_mut(done.sender)?.router.parts_mut();
        if let Some(message) = base.buffer_mut().get_mut(&done.id) {
            strategy.on_transfer_done(message, &receiver_view);
        }

        let receiver = self
            .hosts
            .get_mut(done.receiver.index())
            .ok_or(RoutingError::UnknownHost(done.receiver))?;
        let arrival = receiver.router.base_mut().transferred(
            &done.id,
            done.sender,
            receiver.location,
            now,
            &mut self.listeners,
        )?;
        if arrival.buffered {
            let (base, strategy) = receiver.router.parts_mut();
            if let Some(message) = base.buffer_mut().get_mut(&done.id) {
                strategy.on_received(message, &receiver_view);
            }
        }
        debug!(
            "{} delivered {} to {} (final: {}, first: {})",
            done.sender, done.id, done.receiver, arrival.final_recipient, arrival.first_delivery
        );
        Ok(())
    }

    /// Offer buffered message `id` of `sender` over `link`
    ///
    /// Returns the receiver's verdict. Only faults are errors; a refusal is
    /// an ordinary outcome.
    pub fn start_transfer(
        &mut self,
        sender: HostId,
        id: &MessageId,
        link_id: LinkId,
    ) -> RoutingResult<ReceiveVerdict> {
        let now = self.now;
        let link = self.link(link_id)?;
        let peer = link.other_end(sender).ok_or(RoutingError::NotAnEndpoint {
            host: sender,
            link: link_id,
        })?;
        if !link.is_ready_for_transfer() {
            return Ok(ReceiveVerdict::TryLaterBusy);
        }

        let holder = self.host_view(sender)?;
        let (base, strategy) = self.host_mut(sender)?.router.parts_mut();
        let message = base
            .buffer_mut()
            .get_mut(id)
            .ok_or_else(|| RoutingError::MissingMessage {
                host: sender,
                id: id.clone(),
            })?;
        strategy.before_transfer(message, &holder);
        let message = message.replicate();

        if !self.hosts[sender.index()]
            .router
            .policy()
            .accept_sending(sender, peer, &message)
        {
            return Ok(ReceiveVerdict::DeniedPolicy);
        }

        let busy = self.is_transferring(peer);
        let receiver = self
            .hosts
            .get_mut(peer.index())
            .ok_or(RoutingError::UnknownHost(peer))?;
        let peer_location = receiver.location;
        let verdict = receiver.router.check_receiving(
            &message,
            sender,
            busy,
            peer_location,
            now,
            &mut self.listeners,
        );

        match verdict {
            ReceiveVerdict::Accepted => {
                receiver
                    .router
                    .base_mut()
                    .receive(&message, sender, now, &mut self.listeners);
                self.link_mut(link_id)?.carry(message, sender, now)?;
                self.hosts[sender.index()]
                    .router
                    .mark_sending(link_id, id.clone());
                debug!("{} started sending {} to {} on {}", sender, id, peer, link_id);
            }
            ReceiveVerdict::DeniedOld
                if self.hosts[sender.index()].router.config().delete_delivered
                    && message.is_final_recipient(peer, peer_location) =>
            {
                debug!("{} already delivered {} to {}, deleting", sender, id, peer);
                self.hosts[sender.index()].router.base_mut().delete(
                    id,
                    false,
                    now,
                    &mut self.listeners,
                )?;
            }
            other => trace!("{} refused {} from {}: {}", peer, id, sender, other),
        }
        Ok(verdict)
    }

    fn peer_view(&self, host: HostId, link: LinkId) -> RoutingResult<PeerView<'_>> {
        let peer = self
            .link(link)?
            .other_end(host)
            .ok_or(RoutingError::NotAnEndpoint { host, link })?;
        Ok(PeerView {
            host: self.host_view(peer)?,
            link,
            strategy: self.host(peer)?.router.strategy(),
        })
    }

    /// Delivery search, then ask peers to push what they hold for us
    fn exchange_deliverable(&mut self, id: HostId, links: &[LinkId]) -> RoutingResult<bool> {
        let view = self.host_view(id)?;
        let router = &self.hosts[id.index()].router;
        let strategy = router.strategy();

        let mut pairs: Vec<(&Message, LinkId)> = Vec::new();
        for message in router.base().buffer().iter() {
            for &link in links {
                let peer = self.peer_view(id, link)?;
                if message.is_final_recipient(peer.host.id, peer.host.location)
                    || strategy.relay_to(message, &view, &peer)
                {
                    pairs.push((message, link));
                }
            }
        }
        sort_by_queue_mode(&mut pairs, router.config().queue_mode, self.now);
        let pairs: Vec<(MessageId, LinkId)> =
            pairs.into_iter().map(|(m, l)| (m.id.clone(), l)).collect();

        for (message_id, link) in pairs {
            if !self.hosts[id.index()].router.base().has_message(&message_id) {
                continue;
            }
            if self.start_transfer(id, &message_id, link)?.is_accepted() {
                return Ok(true);
            }
        }

        self.request_deliverable(id, links)
    }

    /// Let each idle peer push one message for which `id` is a final recipient
    fn request_deliverable(&mut self, id: HostId, links: &[LinkId]) -> RoutingResult<bool> {
        let location = self.host(id)?.location;
        for &link in links {
            let Some(peer) = self.link(link)?.other_end(id) else {
                continue;
            };
            if self.is_transferring(peer) {
                continue;
            }
            let peer_router = &self.host(peer)?.router;
            let mut wanted: Vec<&Message> = peer_router
                .base()
                .buffer()
                .iter()
                .filter(|m| m.is_final_recipient(id, location))
                .collect();
            sort_by_queue_mode(&mut wanted, peer_router.config().queue_mode, self.now);
            let wanted: Vec<MessageId> = wanted.into_iter().map(|m| m.id.clone()).collect();

            for message_id in wanted {
                if !self.host(peer)?.router.base().has_message(&message_id) {
                    continue;
                }
                if self.start_transfer(peer, &message_id, link)?.is_accepted() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Flood search over the strategy's candidates
    fn flood(&mut self, id: HostId, links: &[LinkId]) -> RoutingResult<bool> {
        let view = self.host_view(id)?;
        let router = &self.hosts[id.index()].router;
        let mut candidates: Vec<&Message> = router
            .base()
            .buffer()
            .iter()
            .filter(|m| router.strategy().flood_candidate(m, &view))
            .collect();
        if candidates.is_empty() {
            return Ok(false);
        }
        sort_by_queue_mode(&mut candidates, router.config().queue_mode, self.now);
        let candidates: Vec<MessageId> = candidates.into_iter().map(|m| m.id.clone()).collect();

        for &link in links {
            for message_id in &candidates {
                let router = &self.hosts[id.index()].router;
                let Some(message) = router.base().message(message_id) else {
                    continue;
                };
                let peer = self.peer_view(id, link)?;
                if !router.strategy().flood_to(message, &peer) {
                    continue;
                }
                let verdict = self.start_transfer(id, message_id, link)?;
                if verdict.is_accepted() {
                    return Ok(true);
                }
                if verdict.is_retry_later() {
                    break;
                }
            }
        }
        Ok(false)
    }
}
