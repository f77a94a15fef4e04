//! End-to-end strategy behaviour on small scripted topologies

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use geodtn_core::{Coord, EventLog, HostId, Message, MessageId, Region, RouterConfig, SimTime};
use geodtn_routing::{CellGrid, CreateError, StrategyConfig, World};

fn target_region() -> Arc<Region> {
    Arc::new(
        Region::from_points(&[(100.0, 100.0), (110.0, 100.0), (110.0, 110.0), (100.0, 110.0)])
            .unwrap(),
    )
}

fn tick(world: &mut World, secs: f64) {
    world.update(SimTime::from_secs(secs)).unwrap();
}

fn message<'a>(world: &'a World, host: HostId, id: &str) -> Option<&'a Message> {
    world
        .host(host)
        .unwrap()
        .router()
        .base()
        .message(&MessageId::from(id))
}

fn copies(world: &World, host: HostId, id: &str) -> Option<u32> {
    message(world, host, id).and_then(|m| m.state.copies())
}

/// Open a link, let one transfer finish, close the link again
fn hop(world: &mut World, from: HostId, to: HostId, start: f64) {
    let link = world.connect(from, to, 1000.0).unwrap();
    tick(world, start);
    tick(world, start + 1.0);
    world.disconnect(link).unwrap();
}

#[test]
fn test_gsaf_copies_run_out_along_a_chain() {
    let mut world = World::new();
    let gsaf = StrategyConfig::Gsaf { copies: 3 };
    let chain: Vec<HostId> = (0..5)
        .map(|i| {
            world
                .add_host(Coord::new(i as f64, 0.0), RouterConfig::default(), &gsaf)
                .unwrap()
        })
        .collect();
    let sink = world
        .add_host(Coord::new(105.0, 105.0), RouterConfig::default(), &gsaf)
        .unwrap();

    world
        .create_message(Message::geocast("M1", chain[0], target_region(), 100, SimTime::ZERO))
        .unwrap();

    hop(&mut world, chain[0], chain[1], 0.0);
    assert_eq!(copies(&world, chain[0], "M1"), Some(2));
    assert_eq!(copies(&world, chain[1], "M1"), Some(2));

    hop(&mut world, chain[1], chain[2], 10.0);
    hop(&mut world, chain[2], chain[3], 20.0);
    assert_eq!(copies(&world, chain[0], "M1"), Some(2), "Replicas are independent");
    assert_eq!(copies(&world, chain[2], "M1"), Some(0));
    assert_eq!(copies(&world, chain[3], "M1"), Some(0));

    // Out of copies: no more flooding to relays
    hop(&mut world, chain[3], chain[4], 30.0);
    assert!(message(&world, chain[4], "M1").is_none());

    // Delivery to a region member is never gated by the counter
    hop(&mut world, chain[3], sink, 40.0);
    let sink_router = world.host(sink).unwrap().router().base();
    assert!(sink_router.is_delivered(&"M1".into()));
    assert_eq!(message(&world, sink, "M1").unwrap().hop_count(), 4);
}

#[test]
fn test_gswd_relays_only_toward_region() {
    let mut world = World::new();
    let gswd = StrategyConfig::Gswd { copies: 3 };
    let holder = world
        .add_host(Coord::new(0.0, 0.0), RouterConfig::default(), &gswd)
        .unwrap();
    let toward = world
        .add_host(Coord::new(0.0, 0.0), RouterConfig::default(), &gswd)
        .unwrap();
    let away = world
        .add_host(Coord::new(5.0, 5.0), RouterConfig::default(), &gswd)
        .unwrap();
    world.set_location(toward, Coord::new(5.0, 5.0)).unwrap();
    world.set_location(away, Coord::new(0.0, 0.0)).unwrap();

    world
        .create_message(Message::geocast("M1", holder, target_region(), 100, SimTime::ZERO))
        .unwrap();
    world.connect(holder, toward, 1000.0).unwrap();
    world.connect(holder, away, 1000.0).unwrap();
    for t in 0..5 {
        tick(&mut world, t as f64);
    }

    assert!(message(&world, toward, "M1").is_some());
    assert!(message(&world, away, "M1").is_none());
}

#[test]
fn test_evr_relays_to_frequent_visitor() {
    // Three 10x10 cells in a row; the diamond crosses only the last one.
    let cells = CellGrid::regular(Coord::new(0.0, 0.0), 10.0, 10.0, 3, 1).unwrap();
    let diamond = Arc::new(
        Region::from_points(&[(25.0, -5.0), (30.0, 5.0), (25.0, 15.0), (20.0, 5.0)]).unwrap(),
    );
    let in_cell = Coord::new(21.0, 1.0);
    let away = Coord::new(50.0, 50.0);

    let mut world = World::with_cells(cells);
    let holder = world
        .add_host(away, RouterConfig::default(), &StrategyConfig::Evr)
        .unwrap();
    let visitor = world
        .add_host(in_cell, RouterConfig::default(), &StrategyConfig::Evr)
        .unwrap();
    let stranger = world
        .add_host(away, RouterConfig::default(), &StrategyConfig::Evr)
        .unwrap();
    world
        .create_message(Message::geocast("M1", holder, diamond, 100, SimTime::ZERO))
        .unwrap();

    // The visitor enters the cell at 0s and again at 100s.
    tick(&mut world, 0.0);
    world.set_location(visitor, away).unwrap();
    tick(&mut world, 10.0);
    world.set_location(visitor, in_cell).unwrap();
    tick(&mut world, 100.0);

    world.connect(holder, stranger, 1000.0).unwrap();
    world.connect(holder, visitor, 1000.0).unwrap();
    tick(&mut world, 101.0);
    tick(&mut world, 102.0);

    assert!(message(&world, visitor, "M1").is_some());
    assert!(message(&world, stranger, "M1").is_none());
    assert!(
        !world
            .host(visitor)
            .unwrap()
            .router()
            .base()
            .is_delivered(&"M1".into())
    );
}

#[test]
fn test_create_too_large_for_buffer() {
    let mut world = World::new();
    let host = world
        .add_host(
            Coord::new(0.0, 0.0),
            RouterConfig::bounded(50),
            &StrategyConfig::Gsaf { copies: 3 },
        )
        .unwrap();
    let err = world
        .create_message(Message::geocast("M1", host, target_region(), 100, SimTime::ZERO))
        .unwrap_err();
    assert_eq!(
        err,
        CreateError::TooLarge {
            size: 100,
            capacity: 50
        }
    );
    assert_eq!(world.host(host).unwrap().router().base().message_count(), 0);
}

#[test]
fn test_epidemic_reaches_quiescence() {
    let mut world = World::new();
    let log = EventLog::shared();
    world.register_listener(log.clone());
    let hosts: Vec<HostId> = (0..3)
        .map(|i| {
            world
                .add_host(
                    Coord::new(i as f64, 0.0),
                    RouterConfig::default(),
                    &StrategyConfig::Epidemic,
                )
                .unwrap()
        })
        .collect();
    world
        .create_message(Message::unicast("U1", hosts[0], HostId(99), 100, SimTime::ZERO))
        .unwrap();
    for (i, &a) in hosts.iter().enumerate() {
        for &b in &hosts[i + 1..] {
            world.connect(a, b, 1000.0).unwrap();
        }
    }

    for t in 0..10 {
        tick(&mut world, t as f64);
    }
    let started = log.borrow().count("transfer_started");
    assert_eq!(started, 2, "Every host receives the message exactly once");

    for t in 10..20 {
        tick(&mut world, t as f64);
    }
    assert_eq!(log.borrow().count("transfer_started"), started);
    assert!(hosts.iter().all(|&h| !world.is_transferring(h)));
}

#[test]
fn test_summary_reports_copies() {
    let mut world = World::new();
    let host = world
        .add_host(
            Coord::new(0.0, 0.0),
            RouterConfig::default().with_ttl(10),
            &StrategyConfig::CastPlus { copies: 4 },
        )
        .unwrap();
    world
        .create_message(Message::geocast("M1", host, target_region(), 100, SimTime::ZERO))
        .unwrap();

    let summary = world.summary();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].strategy, "cast_plus");
    assert_eq!(summary[0].messages[0].copies, Some(4));
    assert_eq!(summary[0].messages[0].remaining_ttl, Some(10.0));

    let json = serde_json::to_value(&summary[0]).unwrap();
    assert_eq!(json["messages"][0]["id"], "M1");
}

// ============================================================================
// Copy accounting on a dense mesh
// ============================================================================

/// Every host at `at`, all pairs linked, `M1` created at the first host
fn spray_mesh(
    strategy: &StrategyConfig,
    at: Coord,
    size: usize,
) -> (World, Vec<HostId>, Rc<RefCell<EventLog>>) {
    let mut world = World::new();
    let log = EventLog::shared();
    world.register_listener(log.clone());
    let hosts: Vec<HostId> = (0..size)
        .map(|_| {
            world
                .add_host(at, RouterConfig::default(), strategy)
                .unwrap()
        })
        .collect();
    world
        .create_message(Message::geocast("M1", hosts[0], target_region(), 100, SimTime::ZERO))
        .unwrap();
    for (i, &a) in hosts.iter().enumerate() {
        for &b in &hosts[i + 1..] {
            world.connect(a, b, 1000.0).unwrap();
        }
    }
    (world, hosts, log)
}

/// Hops the buffered counters can still fund: a counter `c` spawns at most
/// `2^c - 1` further copies when both ends of a hop spend one
fn copy_potential(world: &World, hosts: &[HostId]) -> u64 {
    hosts
        .iter()
        .filter_map(|&h| copies(world, h, "M1"))
        .map(|c| (1u64 << c) - 1)
        .sum()
}

/// Tick until `until`, checking that no counter or the potential ever grows
fn run_checking_copies(world: &mut World, hosts: &[HostId], until: u32) {
    let mut counters: Vec<Option<u32>> = hosts.iter().map(|&h| copies(world, h, "M1")).collect();
    let mut potential = copy_potential(world, hosts);
    for t in 0..until {
        tick(world, t as f64);

        for (i, &h) in hosts.iter().enumerate() {
            let now = copies(world, h, "M1");
            if let (Some(before), Some(after)) = (counters[i], now) {
                assert!(after <= before, "host {h} went from {before} to {after} at {t}s");
            }
            counters[i] = now.or(counters[i]);
        }
        let now = copy_potential(world, hosts);
        assert!(now <= potential, "potential grew from {potential} to {now} at {t}s");
        potential = now;
    }
}

fn holders(world: &World, hosts: &[HostId]) -> usize {
    hosts
        .iter()
        .filter(|&&h| message(world, h, "M1").is_some())
        .count()
}

#[test]
fn test_gsaf_mesh_copies_never_grow() {
    let (mut world, hosts, log) =
        spray_mesh(&StrategyConfig::Gsaf { copies: 2 }, Coord::new(0.0, 0.0), 6);
    run_checking_copies(&mut world, &hosts, 20);

    // Counter 2 funds at most three hops
    let reached = holders(&world, &hosts);
    assert!((2..=4).contains(&reached), "{reached} holders");
    assert_eq!(log.borrow().count("transfer_started"), reached - 1);
    assert!(hosts.iter().all(|&h| !world.is_transferring(h)));

    let settled = log.borrow().count("transfer_started");
    for t in 20..30 {
        tick(&mut world, t as f64);
    }
    assert_eq!(log.borrow().count("transfer_started"), settled);
}

#[test]
fn test_cast_plus_mesh_in_region_copies_never_grow() {
    // Region members get every copy through the delivery search, yet the
    // counters keep falling and no second chance is granted inside.
    let (mut world, hosts, log) = spray_mesh(
        &StrategyConfig::CastPlus { copies: 2 },
        Coord::new(105.0, 105.0),
        5,
    );
    run_checking_copies(&mut world, &hosts, 20);

    assert_eq!(holders(&world, &hosts), 5);
    assert_eq!(log.borrow().count("transfer_started"), 4);
    assert_eq!(copy_potential(&world, &hosts), 0);
}

// ============================================================================
// Scripted deliveries
// ============================================================================

#[test]
fn test_cast_plus_second_chance_after_leaving_region() {
    let mut world = World::new();
    let cast_plus = StrategyConfig::CastPlus { copies: 1 };
    let inside = Coord::new(105.0, 105.0);
    let outside = Coord::new(0.0, 0.0);
    let holder = world
        .add_host(inside, RouterConfig::default(), &cast_plus)
        .unwrap();
    let relays: Vec<HostId> = (0..3)
        .map(|_| {
            world
                .add_host(outside, RouterConfig::default(), &cast_plus)
                .unwrap()
        })
        .collect();
    world
        .create_message(Message::geocast("M1", holder, target_region(), 100, SimTime::ZERO))
        .unwrap();

    // The only copy goes to the first relay
    hop(&mut world, holder, relays[0], 0.0);
    assert_eq!(copies(&world, holder, "M1"), Some(0));
    assert!(message(&world, relays[0], "M1").is_some());

    // Exhausted inside the region: nothing more
    world.connect(holder, relays[1], 1000.0).unwrap();
    tick(&mut world, 10.0);
    tick(&mut world, 11.0);
    assert!(message(&world, relays[1], "M1").is_none());

    // Leaving the region earns one more hop
    world.set_location(holder, outside).unwrap();
    tick(&mut world, 12.0);
    tick(&mut world, 13.0);
    assert!(message(&world, relays[1], "M1").is_some());
    assert_eq!(copies(&world, holder, "M1"), Some(0));
    assert_eq!(copies(&world, relays[1], "M1"), Some(0));

    // ...and only one
    world.connect(holder, relays[2], 1000.0).unwrap();
    for t in 20..25 {
        tick(&mut world, t as f64);
    }
    assert!(message(&world, relays[2], "M1").is_none());
}

#[test]
fn test_direction_based_one_copy_per_heading() {
    let mut world = World::new();
    let strategy = StrategyConfig::DirectionBased { copies: 3 };
    let origin = Coord::new(0.0, 0.0);
    let add = |world: &mut World| {
        world
            .add_host(origin, RouterConfig::default(), &strategy)
            .unwrap()
    };
    let holder = add(&mut world);
    let north_east = add(&mut world);
    let also_north_east = add(&mut world);
    let south_west = add(&mut world);
    let destination = world
        .add_host(Coord::new(500.0, 500.0), RouterConfig::default(), &strategy)
        .unwrap();

    world
        .create_message(Message::unicast("U1", holder, destination, 100, SimTime::ZERO))
        .unwrap();
    for peer in [north_east, also_north_east, south_west] {
        world.connect(holder, peer, 1000.0).unwrap();
    }

    // Relays keep moving so their headings hold every tick
    for t in 0..6 {
        let step = (t + 1) as f64;
        world.set_location(north_east, Coord::new(step, -step)).unwrap();
        world
            .set_location(also_north_east, Coord::new(step, -step))
            .unwrap();
        world.set_location(south_west, Coord::new(-step, step)).unwrap();
        tick(&mut world, t as f64);
    }

    assert!(message(&world, north_east, "U1").is_some());
    assert!(message(&world, south_west, "U1").is_some());
    assert!(
        message(&world, also_north_east, "U1").is_none(),
        "North-east was already used"
    );

    // Delivery to the destination is not gated by headings
    world.connect(south_west, destination, 1000.0).unwrap();
    tick(&mut world, 6.0);
    tick(&mut world, 7.0);
    assert!(
        world
            .host(destination)
            .unwrap()
            .router()
            .base()
            .is_delivered(&"U1".into())
    );
}

#[test]
fn test_geoopp_relays_to_regular_visitor() {
    let cells = CellGrid::regular(Coord::new(0.0, 0.0), 10.0, 10.0, 3, 1).unwrap();
    let diamond = Arc::new(
        Region::from_points(&[(25.0, -5.0), (30.0, 5.0), (25.0, 15.0), (20.0, 5.0)]).unwrap(),
    );
    let in_cell = Coord::new(21.0, 1.0);
    let away = Coord::new(50.0, 50.0);

    let mut world = World::with_cells(cells);
    let holder = world
        .add_host(away, RouterConfig::default(), &StrategyConfig::Geoopp)
        .unwrap();
    let visitor = world
        .add_host(in_cell, RouterConfig::default(), &StrategyConfig::Geoopp)
        .unwrap();
    let stranger = world
        .add_host(away, RouterConfig::default(), &StrategyConfig::Geoopp)
        .unwrap();
    world
        .create_message(Message::geocast("M1", holder, diamond, 100, SimTime::ZERO))
        .unwrap();

    // The visitor meets someone during its first stay in the cell, leaves,
    // and comes back 100s after the first entry.
    let contact = world.connect(visitor, stranger, 1000.0).unwrap();
    tick(&mut world, 0.0);
    world.disconnect(contact).unwrap();
    world.set_location(visitor, away).unwrap();
    tick(&mut world, 10.0);
    world.set_location(visitor, in_cell).unwrap();
    tick(&mut world, 100.0);

    world.connect(holder, stranger, 1000.0).unwrap();
    world.connect(holder, visitor, 1000.0).unwrap();
    tick(&mut world, 101.0);
    tick(&mut world, 102.0);

    assert!(message(&world, visitor, "M1").is_some());
    assert!(message(&world, stranger, "M1").is_none());
}
