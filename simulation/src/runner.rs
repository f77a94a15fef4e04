//! Scenario runner
//!
//! Drives a [`World`] through a scenario: each tick it moves the clock,
//! replays the script entries that fell due, opens and closes range links,
//! creates the scheduled messages and then updates every host in id order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, debug_span, info, warn};

use geodtn_core::{HostId, Message, Region, SimTime};
use geodtn_logging::HostContextGuard;
use geodtn_routing::{LinkId, RoutingResult, RoutingSummary, World};

use crate::scenario::{MessageSpec, ScenarioConfig, ScenarioError, ScriptEvent, Target, coord};
use crate::stats::SimStats;

/// A scenario loaded into a world, ready to run
pub struct Runner {
    name: String,
    duration: f64,
    tick: f64,
    link_range: Option<f64>,
    link_speed: f64,
    world: World,
    stats: Rc<RefCell<SimStats>>,
    regions: BTreeMap<String, Arc<Region>>,
    events: Vec<ScriptEvent>,
    next_event: usize,
    messages: Vec<MessageSpec>,
    next_message: usize,
    /// Open links keyed by the unordered host pair
    links: BTreeMap<(HostId, HostId), LinkId>,
    ticks: u64,
}

/// End-of-run report
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub scenario: String,
    pub ended_at: SimTime,
    pub stats: SimStats,
    pub hosts: Vec<RoutingSummary>,
}

fn pair(a: HostId, b: HostId) -> (HostId, HostId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Runner {
    /// Build the world described by `config`
    pub fn new(config: &ScenarioConfig) -> Result<Self, ScenarioError> {
        config.validate()?;

        let mut world = World::with_cells(config.build_cells()?);
        for (index, host) in config.hosts.iter().enumerate() {
            world.add_host(
                coord(host.location),
                config.router_for(index).clone(),
                config.strategy_for(index),
            )?;
        }

        let stats = Rc::new(RefCell::new(SimStats::new()));
        world.register_listener(Rc::clone(&stats));

        let mut events = config.events.clone();
        events.sort_by(|a, b| a.at().total_cmp(&b.at()));
        let mut messages = config.messages.clone();
        messages.sort_by(|a, b| a.at.total_cmp(&b.at));

        Ok(Self {
            name: config.name.clone(),
            duration: config.duration,
            tick: config.tick,
            link_range: config.link_range,
            link_speed: config.link_speed,
            world,
            stats,
            regions: config.build_regions()?,
            events,
            next_event: 0,
            messages,
            next_message: 0,
            links: BTreeMap::new(),
            ticks: 0,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn stats(&self) -> SimStats {
        self.stats.borrow().clone()
    }

    /// Time of the next tick
    fn next_time(&self) -> SimTime {
        SimTime::from_secs(self.ticks as f64 * self.tick)
    }

    pub fn is_finished(&self) -> bool {
        self.next_time().as_secs() > self.duration
    }

    /// Run every remaining tick
    pub fn run(&mut self) -> RoutingResult<Report> {
        info!(
            scenario = %self.name,
            hosts = self.world.host_count(),
            duration = self.duration,
            "Starting simulation"
        );
        while !self.is_finished() {
            self.step()?;
        }
        let stats = self.stats.borrow();
        info!(
            created = stats.messages_created,
            delivered = stats.messages_delivered(),
            transfers = stats.transfers_completed,
            aborted = stats.transfers_aborted,
            "Simulation finished"
        );
        drop(stats);
        Ok(self.report())
    }

    /// Run one tick
    pub fn step(&mut self) -> RoutingResult<()> {
        let now = self.next_time();
        self.ticks += 1;

        self.world.advance(now);
        self.apply_events(now)?;
        if let Some(range) = self.link_range {
            self.update_range_links(range)?;
        }
        self.create_messages(now);

        for i in 0..self.world.host_count() {
            let id = HostId(i as u32);
            let _context = HostContextGuard::at(id, now);
            let _span = debug_span!("host", host = %id, now = %now).entered();
            self.world.update_host(id)?;
        }
        Ok(())
    }

    fn apply_events(&mut self, now: SimTime) -> RoutingResult<()> {
        while let Some(event) = self.events.get(self.next_event) {
            if event.at() > now.as_secs() {
                break;
            }
            let event = event.clone();
            self.next_event += 1;

            match event {
                ScriptEvent::Move { host, to, .. } => {
                    self.world.set_location(HostId(host), coord(to))?;
                }
                ScriptEvent::Up {
                    from, to, speed, ..
                } => {
                    let speed = speed.unwrap_or(self.link_speed);
                    self.link_up(HostId(from), HostId(to), speed)?;
                }
                ScriptEvent::Down { from, to, .. } => {
                    self.link_down(HostId(from), HostId(to))?;
                }
            }
        }
        Ok(())
    }

    fn link_up(&mut self, from: HostId, to: HostId, speed: f64) -> RoutingResult<()> {
        let key = pair(from, to);
        if self.links.contains_key(&key) {
            debug!("Link between {} and {} is already up", from, to);
            return Ok(());
        }
        let link = self.world.connect(from, to, speed)?;
        self.links.insert(key, link);
        Ok(())
    }

    fn link_down(&mut self, from: HostId, to: HostId) -> RoutingResult<()> {
        match self.links.remove(&pair(from, to)) {
            Some(link) => self.world.disconnect(link),
            None => {
                debug!("No link between {} and {} to take down", from, to);
                Ok(())
            }
        }
    }

    fn update_range_links(&mut self, range: f64) -> RoutingResult<()> {
        let count = self.world.host_count();
        for i in 0..count {
            for j in (i + 1)..count {
                let (a, b) = (HostId(i as u32), HostId(j as u32));
                let distance = self
                    .world
                    .host(a)?
                    .location()
                    .distance(&self.world.host(b)?.location());
                let connected = self.links.contains_key(&(a, b));
                if distance <= range && !connected {
                    self.link_up(a, b, self.link_speed)?;
                } else if distance > range && connected {
                    self.link_down(a, b)?;
                }
            }
        }
        Ok(())
    }

    fn create_messages(&mut self, now: SimTime) {
        while let Some(spec) = self.messages.get(self.next_message) {
            if spec.at > now.as_secs() {
                break;
            }
            self.next_message += 1;

            let from = HostId(spec.from);
            let mut message = match &spec.to {
                Target::Host(to) => {
                    Message::unicast(spec.id.as_str(), from, HostId(*to), spec.size, now)
                }
                Target::Region(name) => match self.regions.get(name) {
                    Some(region) => Message::geocast(
                        spec.id.as_str(),
                        from,
                        Arc::clone(region),
                        spec.size,
                        now,
                    ),
                    None => {
                        warn!("Skipping {}: region `{}` is not defined", spec.id, name);
                        self.stats.borrow_mut().creations_failed += 1;
                        continue;
                    }
                },
            };
            if let Some(ttl) = spec.ttl {
                message = message.with_ttl(ttl);
            }
            if let Some(app_id) = &spec.app_id {
                message = message.with_app_id(app_id.as_str());
            }

            let id = message.id.clone();
            match self.world.create_message(message) {
                Ok(()) => debug!("Created {} at {}", id, from),
                Err(e) => {
                    warn!("Could not create {}: {}", id, e);
                    self.stats.borrow_mut().creations_failed += 1;
                }
            }
        }
    }

    pub fn report(&self) -> Report {
        Report {
            scenario: self.name.clone(),
            ended_at: self.world.now(),
            stats: self.stats(),
            hosts: self.world.summary(),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f, "=== {} (ended at {}) ===", self.scenario, self.ended_at)?;
        writeln!(f, "  Messages created:    {}", s.messages_created)?;
        writeln!(f, "  Creations failed:    {}", s.creations_failed)?;
        writeln!(
            f,
            "  Messages delivered:  {} ({:.1}%)",
            s.messages_delivered(),
            s.delivery_ratio() * 100.0
        )?;
        writeln!(f, "  Host deliveries:     {}", s.deliveries)?;
        writeln!(f, "  Transfers started:   {}", s.transfers_started)?;
        writeln!(f, "  Transfers completed: {}", s.transfers_completed)?;
        writeln!(f, "  Transfers aborted:   {}", s.transfers_aborted)?;
        writeln!(f, "  Messages dropped:    {}", s.messages_dropped)?;
        match s.average_latency() {
            Some(latency) => writeln!(f, "  Average latency:     {:.1}s", latency)?,
            None => writeln!(f, "  Average latency:     n/a")?,
        }
        if let Some(overhead) = s.overhead_ratio() {
            writeln!(f, "  Overhead ratio:      {:.2}", overhead)?;
        }
        writeln!(f)?;
        for host in &self.hosts {
            writeln!(
                f,
                "  {} [{}] buffered={} delivered={} occupied={}B",
                host.host,
                host.strategy,
                host.messages.len(),
                host.delivered,
                host.occupied_bytes
            )?;
        }
        Ok(())
    }
}
