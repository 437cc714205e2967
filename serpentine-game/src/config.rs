//! Session configuration: everything the player chooses before and during
//! a game. Validated before a session starts; no partial state change is
//! possible on a rejected configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::board::{self, BoardDifficulty, BoardError, BoardLayout, Square};
use crate::constants::{
    DEFAULT_ADD_CHANCE, DEFAULT_MODIFIER_CHANCE, DEFAULT_PRIZE_DENIED, DEFAULT_PRIZE_FULL,
    DEFAULT_PRIZE_PARTIAL, DEFAULT_REMOVE_CHANCE, PRIZE_PERCENT_TOTAL,
};
use crate::registry::{Difficulty, TaskRegistry};

/// How the session's hazard map is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BoardMode {
    /// The traditional fixed 100-square layout.
    #[default]
    Classic,
    /// Procedural generation under a difficulty preset.
    Generated { difficulty: BoardDifficulty },
    /// Hand-authored hazard maps, validated before acceptance.
    Custom {
        snakes: BTreeMap<Square, Square>,
        ladders: BTreeMap<Square, Square>,
    },
}

impl BoardMode {
    /// Build a custom mode from settings-form text (`from:to, from:to`).
    /// Parsing is strict; the invariants themselves are checked later by
    /// [`SessionConfig::validate`], so every violation is reported at once.
    ///
    /// # Errors
    ///
    /// Returns `BoardError::MalformedPair` for unparseable entries.
    pub fn custom_from_text(snakes: &str, ladders: &str) -> Result<Self, BoardError> {
        Ok(Self::Custom {
            snakes: board::parse_hazard_text(snakes)?,
            ladders: board::parse_hazard_text(ladders)?,
        })
    }
}

/// Per-resource session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Globally enabled ("checked") by the player.
    #[serde(default = "default_true")]
    pub checked: bool,
    /// Owned quantity available to tasks.
    #[serde(default = "default_one")]
    pub quantity: u8,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Percent chance per settle that an add side-event fires.
    #[serde(default = "default_add_chance")]
    pub add_chance: u8,
    /// Percent chance per settle that a remove side-event fires.
    #[serde(default = "default_remove_chance")]
    pub remove_chance: u8,
    /// Locked resources have both chances forced to zero.
    #[serde(default)]
    pub locked: bool,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            checked: true,
            quantity: 1,
            difficulty: Difficulty::default(),
            add_chance: DEFAULT_ADD_CHANCE,
            remove_chance: DEFAULT_REMOVE_CHANCE,
            locked: false,
        }
    }
}

impl ResourceConfig {
    /// Effective add chance, respecting the locked state.
    #[must_use]
    pub const fn effective_add_chance(&self) -> u8 {
        if self.locked { 0 } else { self.add_chance }
    }

    /// Effective remove chance, respecting the locked state.
    #[must_use]
    pub const fn effective_remove_chance(&self) -> u8 {
        if self.locked { 0 } else { self.remove_chance }
    }
}

/// Prize slider percentages; must sum to exactly 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeWeights {
    pub full: u8,
    pub partial: u8,
    pub denied: u8,
}

impl Default for PrizeWeights {
    fn default() -> Self {
        Self {
            full: DEFAULT_PRIZE_FULL,
            partial: DEFAULT_PRIZE_PARTIAL,
            denied: DEFAULT_PRIZE_DENIED,
        }
    }
}

impl PrizeWeights {
    #[must_use]
    pub const fn total(self) -> u32 {
        self.full as u32 + self.partial as u32 + self.denied as u32
    }
}

/// Errors raised by configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error("prize percentages must sum to 100 (got {total})")]
    PrizePercentSum { total: u32 },
    #[error("modifier chance for '{modifier}' must be at most 100 (got {chance})")]
    ModifierChance { modifier: String, chance: u8 },
    #[error("side-event chance for '{resource}' must be at most 100 (got {chance})")]
    SideEventChance { resource: String, chance: u8 },
    #[error("no theme sets selected")]
    NoSetsSelected,
    #[error("unknown theme set '{set}'")]
    UnknownSet { set: String },
    #[error("unknown resource '{resource}'")]
    UnknownResource { resource: String },
}

/// The full pre-game configuration, part of the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_total_squares")]
    pub total_squares: Square,
    #[serde(default)]
    pub board: BoardMode,
    /// Active theme sets, in player-chosen order.
    pub selected_sets: Vec<String>,
    /// Per-resource settings, keyed by resource id. Resources absent from
    /// the map use [`ResourceConfig::default`].
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceConfig>,
    /// Per (set, resource) enable toggles keyed `"set.resource"`; pairs
    /// absent from the map are enabled.
    #[serde(default)]
    pub pair_enabled: BTreeMap<String, bool>,
    #[serde(default)]
    pub prize: PrizeWeights,
    /// Session weight deltas by task id, added to the base weight.
    #[serde(default)]
    pub weight_overrides: BTreeMap<String, i32>,
    /// Final-challenge modifier percent chances by modifier id.
    #[serde(default = "default_modifier_chances")]
    pub modifier_chances: BTreeMap<String, u8>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_squares: default_total_squares(),
            board: BoardMode::default(),
            selected_sets: Vec::new(),
            resources: BTreeMap::new(),
            pair_enabled: BTreeMap::new(),
            prize: PrizeWeights::default(),
            weight_overrides: BTreeMap::new(),
            modifier_chances: default_modifier_chances(),
        }
    }
}

const fn default_total_squares() -> Square {
    100
}

const fn default_true() -> bool {
    true
}

const fn default_one() -> u8 {
    1
}

const fn default_add_chance() -> u8 {
    DEFAULT_ADD_CHANCE
}

const fn default_remove_chance() -> u8 {
    DEFAULT_REMOVE_CHANCE
}

fn default_modifier_chances() -> BTreeMap<String, u8> {
    ["cold_hands", "blindfold"]
        .into_iter()
        .map(|id| (id.to_string(), DEFAULT_MODIFIER_CHANCE))
        .collect()
}

impl SessionConfig {
    /// Settings for a resource, falling back to defaults when unset.
    #[must_use]
    pub fn resource(&self, resource_id: &str) -> ResourceConfig {
        self.resources
            .get(resource_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether a (set, resource) pair is enabled.
    #[must_use]
    pub fn pair_enabled(&self, set_id: &str, resource_id: &str) -> bool {
        self.pair_enabled
            .get(&format!("{set_id}.{resource_id}"))
            .copied()
            .unwrap_or(true)
    }

    /// Disable or re-enable a (set, resource) pair.
    pub fn set_pair_enabled(&mut self, set_id: &str, resource_id: &str, enabled: bool) {
        self.pair_enabled
            .insert(format!("{set_id}.{resource_id}"), enabled);
    }

    /// Effective weight delta for a task id.
    #[must_use]
    pub fn weight_override(&self, task_id: &str) -> i32 {
        self.weight_overrides.get(task_id).copied().unwrap_or(0)
    }

    /// Validate the configuration against the registry. Nothing is mutated;
    /// a failed validation leaves no partial state anywhere.
    ///
    /// # Errors
    ///
    /// Returns the first violation found: board size or override problems,
    /// prize sliders not summing to 100, out-of-range chances, or unknown
    /// set/resource references.
    pub fn validate(&self, registry: &TaskRegistry) -> Result<(), ConfigError> {
        board::validate_board_size(self.total_squares)?;
        if let BoardMode::Custom { snakes, ladders } = &self.board {
            let failures = board::validate_override(snakes, ladders, self.total_squares);
            if !failures.is_empty() {
                return Err(BoardError::OverrideRejected { failures }.into());
            }
        }
        if self.prize.total() != PRIZE_PERCENT_TOTAL {
            return Err(ConfigError::PrizePercentSum {
                total: self.prize.total(),
            });
        }
        if self.selected_sets.is_empty() {
            return Err(ConfigError::NoSetsSelected);
        }
        for set_id in &self.selected_sets {
            if registry.set(set_id).is_none() {
                return Err(ConfigError::UnknownSet {
                    set: set_id.clone(),
                });
            }
        }
        let known_resource = |id: &str| {
            registry
                .sets()
                .iter()
                .any(|set| set.resources.iter().any(|def| def.id == id))
        };
        for (resource_id, resource) in &self.resources {
            if !known_resource(resource_id) {
                return Err(ConfigError::UnknownResource {
                    resource: resource_id.clone(),
                });
            }
            if resource.add_chance > 100 {
                return Err(ConfigError::SideEventChance {
                    resource: resource_id.clone(),
                    chance: resource.add_chance,
                });
            }
            if resource.remove_chance > 100 {
                return Err(ConfigError::SideEventChance {
                    resource: resource_id.clone(),
                    chance: resource.remove_chance,
                });
            }
        }
        for (modifier, &chance) in &self.modifier_chances {
            if chance > 100 {
                return Err(ConfigError::ModifierChance {
                    modifier: modifier.clone(),
                    chance,
                });
            }
        }
        Ok(())
    }

    /// Normalize soft problems that do not warrant rejection: duplicate
    /// set selections collapse to their first occurrence.
    pub fn sanitize(&mut self) {
        let mut seen = Vec::new();
        self.selected_sets.retain(|set| {
            if seen.contains(set) {
                false
            } else {
                seen.push(set.clone());
                true
            }
        });
    }

    /// Build the session board for this configuration. Custom boards are
    /// assumed validated; generated boards draw from `rng`.
    pub(crate) fn build_board<R: rand::Rng>(&self, rng: &mut R) -> BoardLayout {
        match &self.board {
            BoardMode::Classic => BoardLayout::classic(),
            BoardMode::Generated { difficulty } => {
                let (layout, _report) = board::generate(self.total_squares, difficulty.preset(), rng);
                layout
            }
            BoardMode::Custom { snakes, ladders } => BoardLayout {
                total_squares: self.total_squares,
                snakes: snakes.clone(),
                ladders: ladders.clone(),
            },
        }
    }
}
