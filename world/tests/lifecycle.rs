use std::time::Duration;

use flag_war_core::{
    AttackRules, BlockPos, CancelReason, Cell, Command, Event, MarkerRole, PlayerName,
};
use flag_war_world::{self as world, query, World};

fn rules() -> AttackRules {
    AttackRules {
        attack_duration: Duration::from_secs(30),
        refresh_interval: Duration::from_secs(10),
        beacon: None,
        ..AttackRules::default()
    }
}

fn start(world: &mut World, attacker: &str, x: i32, events: &mut Vec<Event>) -> Cell {
    let flag_base = BlockPos::new("world", x, 70, 4);
    let cell = query::registration_check(world, &PlayerName::new(attacker), &flag_base)
        .expect("registration should be accepted");
    world::apply(
        world,
        Command::RegisterAttack {
            attacker: PlayerName::new(attacker),
            flag_base,
        },
        events,
    );
    cell
}

fn tick(world: &mut World, secs: u64, events: &mut Vec<Event>) {
    world::apply(
        world,
        Command::Tick {
            dt: Duration::from_secs(secs),
        },
        events,
    );
}

#[test]
fn undisturbed_attack_is_won_at_deadline() {
    let mut world = World::with_rules(rules());
    let mut events = Vec::new();
    let cell = start(&mut world, "Ayla", 5, &mut events);

    events.clear();
    for _ in 0..2 {
        tick(&mut world, 10, &mut events);
    }
    let refreshes = events
        .iter()
        .filter(|event| matches!(event, Event::CountdownAdvanced { .. }))
        .count();
    assert_eq!(refreshes, 2, "countdown repaints once per interval");
    assert!(query::is_under_attack(&world, &cell));

    events.clear();
    tick(&mut world, 10, &mut events);

    assert!(
        events.contains(&Event::AttackWon {
            cell: cell.clone(),
            attacker: PlayerName::new("Ayla"),
        }),
        "attack should be won once the deadline passes"
    );
    let cleared = events.iter().find_map(|event| match event {
        Event::MarkersCleared { positions } => Some(positions.len()),
        _ => None,
    });
    assert_eq!(cleared, Some(3), "flag base, timer and light are removed");
    assert!(!query::is_under_attack(&world, &cell));
    assert_eq!(query::active_flag_count(&world, &PlayerName::new("Ayla")), 0);

    events.clear();
    tick(&mut world, 10, &mut events);
    assert_eq!(
        events,
        vec![Event::TimeAdvanced {
            dt: Duration::from_secs(10)
        }],
        "a won attack never resolves again"
    );
}

#[test]
fn destroying_timer_marker_defends_cell() {
    let mut world = World::with_rules(rules());
    let mut events = Vec::new();
    let cell = start(&mut world, "Ayla", 5, &mut events);
    tick(&mut world, 15, &mut events);

    let timer = BlockPos::new("world", 5, 71, 4);
    let (attack, role) = query::marker_at(&world, &timer).expect("timer marker is tracked");
    assert_eq!(role, MarkerRole::FlagTimer);
    assert_eq!(attack.cell(), &cell);

    events.clear();
    world::apply(
        &mut world,
        Command::DefendAttack {
            cell: cell.clone(),
            defender: Some(PlayerName::new("Cato")),
        },
        &mut events,
    );

    assert_eq!(
        events.first(),
        Some(&Event::AttackDefended {
            cell: cell.clone(),
            attacker: PlayerName::new("Ayla"),
            defender: Some(PlayerName::new("Cato")),
        })
    );
    assert!(!query::is_under_attack(&world, &cell));

    events.clear();
    tick(&mut world, 60, &mut events);
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, Event::AttackWon { .. })),
        "defended attack must not also be won"
    );
}

#[test]
fn shutdown_cancels_every_attack() {
    let mut world = World::with_rules(rules());
    let mut events = Vec::new();
    let _ = start(&mut world, "Ayla", 0, &mut events);
    let _ = start(&mut world, "Ayla", 16, &mut events);
    let _ = start(&mut world, "Bram", 32, &mut events);

    events.clear();
    world::apply(
        &mut world,
        Command::CancelAllAttacks {
            reason: CancelReason::Shutdown,
        },
        &mut events,
    );

    let canceled: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::AttackCanceled { cell, reason, .. } => Some((cell.clone(), *reason)),
            _ => None,
        })
        .collect();
    assert_eq!(canceled.len(), 3);
    assert!(canceled
        .iter()
        .all(|(_, reason)| *reason == CancelReason::Shutdown));
    assert_eq!(query::attack_count(&world), 0);
    assert_eq!(query::attacks(&world).count(), 0);
}

#[test]
fn attacks_by_preserves_registration_order() {
    let mut world = World::with_rules(rules());
    let mut events = Vec::new();
    let second = start(&mut world, "Ayla", 48, &mut events);
    let first = start(&mut world, "Ayla", 0, &mut events);

    let cells: Vec<_> = query::attacks_by(&world, &PlayerName::new("Ayla"))
        .into_iter()
        .map(|attack| attack.cell().clone())
        .collect();
    assert_eq!(cells, vec![second, first]);
}

#[test]
fn rules_change_does_not_move_running_deadlines() {
    let mut world = World::with_rules(rules());
    let mut events = Vec::new();
    let cell = start(&mut world, "Ayla", 0, &mut events);

    world::apply(
        &mut world,
        Command::ConfigureRules {
            rules: AttackRules {
                attack_duration: Duration::from_secs(600),
                ..rules()
            },
        },
        &mut events,
    );

    let attack = query::attack(&world, &cell).expect("attack still live");
    assert_eq!(attack.deadline(), Duration::from_secs(30));
}
