//! Session state: the single owned value the state machine mutates and the
//! snapshot persists. Everything needed to resume play without re-rolling
//! past decisions lives here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::board::{BoardLayout, HazardKind, Square};
use crate::config::SessionConfig;
use crate::content::TaskCard;
use crate::inventory::Inventory;
use crate::registry::TaskMetadata;
use crate::seed::RngCounters;
use crate::selector::FinalPrize;
use crate::side_events::SideEvent;

/// Player-visible turn phase. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    AwaitingDiceRoll,
    AwaitingNormalTask,
    AwaitingHazardTask,
    AwaitingHazardMovement,
    AwaitingFinalChallenge,
}

impl GamePhase {
    /// Phases that display an active task.
    #[must_use]
    pub const fn is_task_bound(self) -> bool {
        matches!(
            self,
            Self::AwaitingNormalTask | Self::AwaitingHazardTask | Self::AwaitingFinalChallenge
        )
    }
}

/// A hazard entered but not yet traversed. Exists only between landing on
/// the hazard start and completing the movement to its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingHazard {
    pub kind: HazardKind,
    pub from: Square,
    pub to: Square,
}

/// Result of a roll or test jump, kept for display and the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    /// Display string, e.g. `Dice: 5` or `Jump to: 42`.
    pub description: String,
    /// The die value for real rolls; `None` for test jumps.
    pub rolled: Option<u8>,
    pub from: Square,
    pub to: Square,
}

/// The task currently shown to the player, with enough rendering state to
/// resume exactly where they left off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTask {
    pub card: TaskCard,
    /// Index of the segment/stage currently revealed.
    #[serde(default)]
    pub progress: usize,
    /// Present for final-challenge tasks only.
    #[serde(default)]
    pub prize: Option<FinalPrize>,
}

/// The full persisted session. One record per session slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub seed: u64,
    pub config: SessionConfig,
    pub board: BoardLayout,
    #[serde(default)]
    pub phase: GamePhase,
    /// Current square; zero means not yet on the board.
    #[serde(default)]
    pub position: Square,
    #[serde(default)]
    pub turn_count: u32,
    #[serde(default)]
    pub turns_by_set: BTreeMap<String, u32>,
    #[serde(default)]
    pub turns_by_resource: BTreeMap<String, u32>,
    /// Which set last selected a task for each resource.
    #[serde(default)]
    pub last_set_for_resource: BTreeMap<String, String>,
    #[serde(default)]
    pub last_roll: Option<RollOutcome>,
    #[serde(default)]
    pub pending_hazard: Option<PendingHazard>,
    /// The side event attached to the current turn, if one fired.
    #[serde(default)]
    pub side_event: Option<SideEvent>,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub active_task: Option<ActiveTask>,
    #[serde(default)]
    pub rng_counters: RngCounters,
}

impl SessionState {
    /// Fresh state at the configured board's start.
    #[must_use]
    pub fn new(config: SessionConfig, seed: u64, board: BoardLayout) -> Self {
        Self {
            seed,
            config,
            board,
            phase: GamePhase::default(),
            position: 0,
            turn_count: 0,
            turns_by_set: BTreeMap::new(),
            turns_by_resource: BTreeMap::new(),
            last_set_for_resource: BTreeMap::new(),
            last_roll: None,
            pending_hazard: None,
            side_event: None,
            inventory: Inventory::new(),
            active_task: None,
            rng_counters: RngCounters::default(),
        }
    }

    /// Bump the per-set/per-resource counters when a set task is shown.
    pub fn record_task_presented(&mut self, task: &TaskMetadata) {
        let Some(set_id) = task.set.as_deref() else {
            return;
        };
        *self.turns_by_set.entry(set_id.to_string()).or_default() += 1;
        if let Some(resource) = task.resource.as_deref() {
            *self
                .turns_by_resource
                .entry(format!("{set_id}.{resource}"))
                .or_default() += 1;
            self.last_set_for_resource
                .insert(resource.to_string(), set_id.to_string());
        }
    }
}
