//! End-to-end tick scenarios driven through [`Simulation`].

use vigil_common::{EntityId, Vec2};
use vigil_gameplay::prelude::*;

const ARENA: &str = r#"[
    (
        name: "dummy",
        category: Player,
        max_health: 100.0,
        speed: 0.0,
        target_categories: [],
    ),
    (
        name: "frail_dummy",
        category: Player,
        max_health: 10.0,
        speed: 0.0,
        target_categories: [],
    ),
    (
        name: "striker",
        category: Hazard,
        max_health: 50.0,
        speed: 0.0,
        damage: 7.0,
        target_categories: [Player],
        behaviors: [
            (name: "jab", action: Some(Config(Melee((range: 2.0, cooldown: 10.0)))), priority: 10),
        ],
    ),
    (
        name: "heavy_striker",
        category: Hazard,
        max_health: 50.0,
        speed: 0.0,
        damage: 25.0,
        target_categories: [Player],
        behaviors: [
            (name: "slam", action: Some(Config(Melee((range: 2.0, cooldown: 10.0)))), priority: 10),
        ],
    ),
    (
        name: "watcher",
        category: Enemy,
        max_health: 60.0,
        sensor_range: 5.0,
        target_categories: [Player],
        parameters: (
            aggro_distance: (value: 10.0, min: 1.0, max: 50.0),
        ),
        states: [Idle, Chase, Fight, Flee],
    ),
]"#;

fn arena() -> Simulation {
    let catalog = CapabilityCatalog::with_defaults();
    let mut library = ArchetypeLibrary::new();
    let rejected = library
        .load_ron(ARENA, &catalog)
        .expect("arena archetypes should parse");
    assert!(rejected.is_empty(), "rejected: {rejected:?}");
    Simulation::new(catalog, library)
}

fn health(sim: &Simulation, id: EntityId) -> f32 {
    sim.entity(id)
        .map(|e| e.agent().health().current())
        .expect("entity should exist")
}

#[test]
fn test_simultaneous_damage_is_order_independent() {
    let mut first = arena();
    let target_a = first.spawn("dummy", Vec2::ZERO).expect("spawn");
    first.spawn("striker", Vec2::new(1.0, 0.0)).expect("spawn");
    first.spawn("heavy_striker", Vec2::new(-1.0, 0.0)).expect("spawn");

    let mut second = arena();
    second.spawn("heavy_striker", Vec2::new(-1.0, 0.0)).expect("spawn");
    second.spawn("striker", Vec2::new(1.0, 0.0)).expect("spawn");
    let target_b = second.spawn("dummy", Vec2::ZERO).expect("spawn");

    let summary_a = first.step(0.1);
    let summary_b = second.step(0.1);

    assert_eq!(summary_a.requests_applied, 2);
    assert_eq!(summary_b.requests_applied, 2);
    assert_eq!(health(&first, target_a), 68.0);
    assert_eq!(health(&second, target_b), 68.0);
}

#[test]
fn test_death_removes_entity_at_end_of_tick() {
    let mut sim = arena();
    let victim = sim.spawn("frail_dummy", Vec2::ZERO).expect("spawn");
    let striker = sim.spawn("heavy_striker", Vec2::new(1.0, 0.0)).expect("spawn");
    sim.events().drain();

    let summary = sim.step(0.1);
    assert_eq!(summary.deaths, vec![victim]);
    assert_eq!(summary.removed, vec![victim]);
    assert!(sim.entity(victim).is_none());
    assert!(sim.entity(striker).is_some());

    let events: Vec<GameEvent> = sim
        .events()
        .drain()
        .into_iter()
        .filter(|e| e.entity_id() == victim)
        .collect();
    assert_eq!(
        events,
        vec![
            GameEvent::HealthChanged {
                entity_id: victim,
                old: 10.0,
                new: 0.0,
            },
            GameEvent::Died { entity_id: victim },
            GameEvent::EntityDestroyed {
                entity_id: victim,
                reason: DestroyReason::Died,
            },
        ]
    );

    let summary = sim.step(0.1);
    assert_eq!(summary.requests_applied, 0);
    assert!(summary.deaths.is_empty());
    assert!(sim.events().drain().iter().all(|e| e.entity_id() != victim));
}

#[test]
fn test_overkill_and_heal_same_tick_dies_once() {
    let mut sim = arena();
    let id = sim.spawn("dummy", Vec2::ZERO).expect("spawn");
    sim.enqueue_health_delta(id, -150.0).expect("entity exists");
    sim.enqueue_health_delta(id, 1_000.0).expect("entity exists");
    sim.events().drain();

    let summary = sim.step(0.1);
    assert_eq!(summary.deaths, vec![id]);

    let events = sim.events().drain();
    let died = events
        .iter()
        .filter(|e| matches!(e, GameEvent::Died { .. }))
        .count();
    let destroyed = events
        .iter()
        .filter(|e| matches!(e, GameEvent::EntityDestroyed { .. }))
        .count();
    assert_eq!(died, 1);
    assert_eq!(destroyed, 1);
}

#[test]
fn test_deaths_survive_full_event_bus() {
    let mut sim = arena().with_event_bus(EventBus::new(2));
    let first = sim.spawn("frail_dummy", Vec2::ZERO).expect("spawn");
    let second = sim.spawn("frail_dummy", Vec2::new(3.0, 0.0)).expect("spawn");
    sim.events().drain();

    sim.enqueue_health_delta(first, -100.0).expect("entity exists");
    sim.enqueue_health_delta(second, -100.0).expect("entity exists");
    let summary = sim.step(0.1);
    assert_eq!(summary.deaths.len(), 2);

    let events = sim.events().drain();
    for id in [first, second] {
        assert!(events.contains(&GameEvent::Died { entity_id: id }));
        assert!(events.contains(&GameEvent::EntityDestroyed {
            entity_id: id,
            reason: DestroyReason::Died,
        }));
    }
}

#[test]
fn test_idle_holds_against_weaker_chase() {
    // Outside sensor range idle scores 0.4; chase scores 1 - d / 10.
    let mut sim = arena();
    let watcher = sim.spawn("watcher", Vec2::ZERO).expect("spawn");
    sim.spawn("dummy", Vec2::new(6.1, 0.0)).expect("spawn");

    sim.step(0.1);
    assert_eq!(sim.current_state(watcher), Some(StateKind::Idle));

    let mut sim = arena();
    let watcher = sim.spawn("watcher", Vec2::ZERO).expect("spawn");
    sim.spawn("dummy", Vec2::new(5.9, 0.0)).expect("spawn");

    sim.step(0.1);
    assert_eq!(sim.current_state(watcher), Some(StateKind::Chase));
}

#[test]
fn test_stun_swaps_and_restores_behaviors() {
    let mut sim = Simulation::with_builtins().expect("built-ins should load");
    let warrior = sim.spawn("warrior", Vec2::ZERO).expect("spawn");
    let names = |sim: &Simulation| -> Vec<String> {
        sim.entity(warrior)
            .expect("warrior exists")
            .brain()
            .executor()
            .names()
            .map(str::to_string)
            .collect()
    };
    assert_eq!(names(&sim), vec!["second_wind".to_string()]);

    let outcome = sim
        .apply_status(warrior, StatusKind::Stun, 0.25)
        .expect("stun should apply");
    assert_eq!(outcome, StatusOutcome::Applied);
    assert_eq!(names(&sim), vec!["stun:hold".to_string()]);

    sim.step(0.1);
    sim.step(0.1);
    assert_eq!(names(&sim), vec!["stun:hold".to_string()]);
    sim.step(0.1);
    assert_eq!(names(&sim), vec!["second_wind".to_string()]);

    let events = sim.events().drain();
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::StatusApplied { kind: StatusKind::Stun, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::StatusExpired { kind: StatusKind::Stun, .. })));
}

#[test]
fn test_charm_turns_on_allies() {
    let mut sim = Simulation::with_builtins().expect("built-ins should load");
    let charmed = sim.spawn("goblin", Vec2::ZERO).expect("spawn");
    let ally = sim.spawn("goblin", Vec2::new(1.0, 0.0)).expect("spawn");

    sim.apply_status(charmed, StatusKind::Charm, 5.0)
        .expect("charm should apply");
    sim.step(0.1);

    assert_eq!(health(&sim, ally), 52.0);
    assert_eq!(health(&sim, charmed), 60.0);

    assert_eq!(sim.clear_status(charmed).expect("entity exists"), Some(StatusKind::Charm));
    assert!(sim
        .entity(charmed)
        .expect("goblin exists")
        .brain()
        .executor()
        .is_empty());
}

#[test]
fn test_despawn_is_idempotent() {
    let mut sim = arena();
    let id = sim.spawn("dummy", Vec2::ZERO).expect("spawn");
    assert!(sim.despawn(id));
    assert!(!sim.despawn(id));
    sim.step(0.1);
    assert!(sim.is_empty());

    let destroyed = sim
        .events()
        .drain()
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                GameEvent::EntityDestroyed {
                    reason: DestroyReason::Despawned,
                    ..
                }
            )
        })
        .count();
    assert_eq!(destroyed, 1);
}

#[test]
fn test_telemetry_readable_from_another_thread() {
    let mut sim = arena();
    let id = sim.spawn("dummy", Vec2::ZERO).expect("spawn");
    let handle = sim.telemetry();
    sim.run(3, 0.1);

    let frame = std::thread::spawn(move || handle.snapshot())
        .join()
        .expect("reader thread panicked");
    assert_eq!(frame.tick, 3);
    assert!(frame.entity(id).is_some());
}
