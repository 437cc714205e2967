//! Serpentine Game Engine
//!
//! Platform-agnostic core logic for the Serpentine board game: procedural
//! snakes-and-ladders hazard generation, a declarative task registry with
//! eligibility-filtered weighted selection, per-turn add/remove side
//! events, and a persisted turn-phase state machine. This crate provides
//! all game mechanics without UI or platform-specific dependencies; the
//! presentation layer consumes content descriptors and phase values and
//! reports back task-completion and roll-request signals.

pub mod board;
pub mod config;
pub mod constants;
pub mod content;
pub mod inventory;
pub mod machine;
pub mod registry;
pub mod seed;
pub mod selector;
pub mod session;
pub mod side_events;
pub mod snapshot;

use std::rc::Rc;

// Re-export commonly used types
pub use board::{
    BoardDifficulty, BoardError, BoardLayout, DifficultyPreset, HazardKind, PlacementReport,
    Square, apply_override, format_hazards, generate, parse_hazard_text, validate_board_size,
    validate_override,
};
pub use config::{BoardMode, ConfigError, PrizeWeights, ResourceConfig, SessionConfig};
pub use constants::SESSION_SLOT;
pub use content::{ChoiceDef, Stage, TaskCard, TaskContent};
pub use inventory::{BodyPart, Inventory, InventoryError};
pub use machine::{EngineError, GameMachine, RollRequest, TurnEvent};
pub use registry::{
    Difficulty, RegistryError, Requires, ResourceDef, ScaledAmount, TaskKind, TaskMetadata,
    TaskRegistry, ThemeSet,
};
pub use seed::{RngBundle, RngCounters};
pub use selector::{
    FinalPrize, PrizeKind, SelectionContext, draw_final_prize, draw_prize, select_final_task,
    select_hazard_task, select_next_task,
};
pub use session::{ActiveTask, GamePhase, PendingHazard, RollOutcome, SessionState};
pub use side_events::{SideEvent, SideEventKind, roll_side_event};
pub use snapshot::{FileStore, FileStoreError, MemoryStore, SnapshotStore};

/// Main entry point binding a task registry to a snapshot store.
pub struct GameEngine<S>
where
    S: SnapshotStore + Clone,
{
    registry: Rc<TaskRegistry>,
    store: S,
}

impl<S> GameEngine<S>
where
    S: SnapshotStore + Clone,
{
    /// Create an engine with the provided registry and store.
    #[must_use]
    pub const fn new(registry: Rc<TaskRegistry>, store: S) -> Self {
        Self { registry, store }
    }

    /// Start a fresh session with the given configuration and seed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error before any state change, or a store
    /// error from the initial checkpoint.
    pub fn new_session(
        &self,
        config: SessionConfig,
        seed: u64,
    ) -> Result<GameMachine<S>, EngineError<S::Error>> {
        GameMachine::new(config, seed, self.registry.clone(), self.store.clone())
    }

    /// Resume the persisted session, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be read.
    pub fn resume(&self) -> Result<Option<GameMachine<S>>, S::Error> {
        GameMachine::resume(self.registry.clone(), self.store.clone())
    }

    /// Delete the persisted session.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be deleted.
    pub fn wipe(&self) -> Result<(), S::Error> {
        self.store.delete(SESSION_SLOT)
    }

    #[must_use]
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin_registry() -> Rc<TaskRegistry> {
        Rc::new(TaskRegistry::from_json(include_str!("../assets/registry.json")).unwrap())
    }

    fn base_config() -> SessionConfig {
        SessionConfig {
            selected_sets: vec!["dressup".to_string()],
            ..SessionConfig::default()
        }
    }

    #[test]
    fn engine_creates_and_resumes_session() {
        let engine = GameEngine::new(builtin_registry(), MemoryStore::new());
        let machine = engine.new_session(base_config(), 0xABCD).unwrap();
        assert_eq!(machine.phase(), GamePhase::AwaitingDiceRoll);
        drop(machine);

        let resumed = engine.resume().unwrap().expect("snapshot exists");
        assert_eq!(resumed.state().seed, 0xABCD);
        assert_eq!(resumed.phase(), GamePhase::AwaitingDiceRoll);

        engine.wipe().unwrap();
        assert!(engine.resume().unwrap().is_none());
    }

    #[test]
    fn invalid_config_is_rejected_before_any_state_change() {
        let store = MemoryStore::new();
        let engine = GameEngine::new(builtin_registry(), store.clone());
        let config = SessionConfig {
            total_squares: 55,
            ..base_config()
        };
        assert!(matches!(
            engine.new_session(config, 1),
            Err(EngineError::Config(ConfigError::Board(
                BoardError::InvalidSize { size: 55 }
            )))
        ));
        assert!(store.raw(SESSION_SLOT).is_none());
    }
}
