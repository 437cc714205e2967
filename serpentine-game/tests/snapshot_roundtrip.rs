//! Persistence and restore semantics: byte-identical re-persists, replay
//! without re-randomization, and graceful degradation of broken snapshots.

use std::rc::Rc;

use serpentine_game::{
    BoardMode, GameMachine, GamePhase, MemoryStore, ResourceConfig, RollRequest, SESSION_SLOT,
    SessionConfig, SessionState, SnapshotStore, TaskRegistry, TurnEvent,
};

fn registry() -> Rc<TaskRegistry> {
    Rc::new(TaskRegistry::from_json(include_str!("../assets/registry.json")).unwrap())
}

fn quiet_config() -> SessionConfig {
    let mut config = SessionConfig {
        board: BoardMode::Classic,
        selected_sets: vec!["dressup".to_string()],
        ..SessionConfig::default()
    };
    for id in ["pegs", "wristband", "silly_hat", "scarf"] {
        config.resources.insert(
            id.to_string(),
            ResourceConfig {
                quantity: 6,
                add_chance: 0,
                remove_chance: 0,
                ..ResourceConfig::default()
            },
        );
    }
    config
}

#[test]
fn save_restore_save_is_byte_identical() {
    let store = MemoryStore::new();
    let mut machine = GameMachine::new(quiet_config(), 201, registry(), store.clone()).unwrap();

    machine.request_roll(RollRequest::JumpTo(11)).unwrap();
    machine.movement_settled().unwrap();
    let before = store.raw(SESSION_SLOT).expect("snapshot written");

    let mut restored = GameMachine::resume(registry(), store.clone())
        .unwrap()
        .expect("snapshot resumable");
    restored.persist().unwrap();
    let after = store.raw(SESSION_SLOT).unwrap();
    assert_eq!(before, after, "restore must not re-randomize anything");
}

#[test]
fn restore_replays_the_cached_task_without_rerolling() {
    let store = MemoryStore::new();
    let mut machine = GameMachine::new(quiet_config(), 202, registry(), store.clone()).unwrap();
    machine.request_roll(RollRequest::JumpTo(23)).unwrap();
    machine.movement_settled().unwrap();
    let shown = machine.active_task().expect("task active").clone();
    let counters = machine.state().rng_counters;

    let restored = GameMachine::resume(registry(), store.clone())
        .unwrap()
        .expect("resumable");
    assert_eq!(restored.phase(), GamePhase::AwaitingNormalTask);
    let replayed = restored.active_task().expect("task survives restore");
    assert_eq!(replayed, &shown, "the same card replays from the snapshot");
    assert_eq!(
        restored.state().rng_counters, counters,
        "no stream advanced during restore"
    );
}

#[test]
fn restore_mid_hazard_movement_rearms_the_traversal() {
    let store = MemoryStore::new();
    let mut machine = GameMachine::new(quiet_config(), 203, registry(), store.clone()).unwrap();
    machine.request_roll(RollRequest::JumpTo(16)).unwrap();
    machine.movement_settled().unwrap();
    machine.task_completed().unwrap();
    assert_eq!(machine.phase(), GamePhase::AwaitingHazardMovement);
    drop(machine);

    let mut restored = GameMachine::resume(registry(), store.clone())
        .unwrap()
        .expect("resumable");
    assert_eq!(restored.phase(), GamePhase::AwaitingHazardMovement);
    let event = restored.movement_settled().unwrap();
    assert!(matches!(event, TurnEvent::Task { .. }));
    assert_eq!(restored.state().position, 6);
}

#[test]
fn task_progress_is_checkpointed_per_step() {
    let store = MemoryStore::new();
    let mut machine = GameMachine::new(quiet_config(), 204, registry(), store.clone()).unwrap();
    machine.request_roll(RollRequest::JumpTo(2)).unwrap();
    machine.movement_settled().unwrap();

    let steps = machine
        .active_task()
        .map(|active| active.card.content.step_count())
        .unwrap();
    if steps > 1 {
        machine.advance_task().unwrap();
        let restored = GameMachine::resume(registry(), store.clone())
            .unwrap()
            .expect("resumable");
        assert_eq!(
            restored.active_task().unwrap().progress,
            1,
            "reveal position resumes exactly"
        );
    }

    // Progress never walks past the last step.
    for _ in 0..10 {
        machine.advance_task().unwrap();
    }
    assert!(machine.active_task().unwrap().progress < steps.max(1));
}

#[test]
fn snapshot_missing_replay_state_resets_the_turn() {
    let store = MemoryStore::new();
    let registry = registry();
    let machine = GameMachine::new(quiet_config(), 205, registry.clone(), store.clone()).unwrap();
    let mut broken: SessionState = machine.into_state();
    // Simulate a snapshot written by a buggy client: task-bound phase with
    // no stored task.
    broken.phase = GamePhase::AwaitingNormalTask;
    broken.active_task = None;
    store.save(SESSION_SLOT, &broken).unwrap();

    let restored = GameMachine::resume(registry, store)
        .unwrap()
        .expect("still resumable");
    assert_eq!(restored.phase(), GamePhase::AwaitingDiceRoll);
    assert!(restored.state().pending_hazard.is_none());
    // Only the in-progress task is lost.
    assert_eq!(restored.state().seed, 205);
}

#[test]
fn missing_snapshot_resumes_to_none() {
    let store = MemoryStore::new();
    assert!(GameMachine::resume(registry(), store).unwrap().is_none());
}
