//! Declarative task registry.
//!
//! The registry is loaded once per session from JSON, indexed by set and by
//! id, and read-only afterwards. The manifest is the source of truth for
//! task requirements; per-id weight overrides live in mutable session
//! configuration, never here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

use crate::board::HazardKind;
use crate::content::TaskContent;
use crate::inventory::{BodyPart, is_stackable};

/// Task difficulty tier, configured per resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(()),
        }
    }
}

/// Task categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Standard,
    Add,
    Remove,
    Snake,
    Ladder,
    Final,
}

impl TaskKind {
    /// The hazard this kind responds to, if it is a hazard-entry task.
    #[must_use]
    pub const fn hazard(self) -> Option<HazardKind> {
        match self {
            Self::Snake => Some(HazardKind::Snake),
            Self::Ladder => Some(HazardKind::Ladder),
            _ => None,
        }
    }
}

/// A resource quantity requirement: `quantity` unused units must exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNeed {
    pub resource: String,
    #[serde(default = "default_one")]
    pub quantity: u8,
}

/// Free space needed at a specific part for the stackable resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityNeed {
    pub part: BodyPart,
    pub resource: String,
    #[serde(default = "default_one")]
    pub space: u8,
}

/// Declarative eligibility requirements for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Requires {
    #[serde(default)]
    pub resources: Vec<ResourceNeed>,
    #[serde(default)]
    pub free_parts: Vec<BodyPart>,
    #[serde(default)]
    pub not_holding: Vec<String>,
    #[serde(default)]
    pub part_capacity: Vec<CapacityNeed>,
}

impl Requires {
    /// Whether this task has no requirements at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
            && self.free_parts.is_empty()
            && self.not_holding.is_empty()
            && self.part_capacity.is_empty()
    }
}

/// Per-difficulty amount used by add/remove and scaled task content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledAmount {
    pub easy: u8,
    pub medium: u8,
    pub hard: u8,
}

impl Default for ScaledAmount {
    fn default() -> Self {
        Self {
            easy: 1,
            medium: 1,
            hard: 1,
        }
    }
}

impl ScaledAmount {
    #[must_use]
    pub const fn for_difficulty(self, difficulty: Difficulty) -> u8 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

/// One task entry in the registry manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub id: String,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    pub kind: TaskKind,
    #[serde(default)]
    pub is_fallback: bool,
    /// Final tasks only: passes take absolute precedence over the
    /// weighted draw.
    #[serde(default)]
    pub always_select: bool,
    /// Add/remove tasks only: the target part.
    #[serde(default)]
    pub part: Option<BodyPart>,
    /// Difficulty-scaled amount substituted into content as `{n}`.
    #[serde(default)]
    pub amount: Option<ScaledAmount>,
    #[serde(default)]
    pub requires: Requires,
    #[serde(default = "default_one_u32")]
    pub base_weight: u32,
    pub content: TaskContent,
}

const fn default_one() -> u8 {
    1
}

const fn default_one_u32() -> u32 {
    1
}

/// A resource ("toy") definition within a theme set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub stackable: bool,
}

/// A theme set grouping resources and their tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSet {
    pub id: String,
    pub name: String,
    pub resources: Vec<ResourceDef>,
}

/// On-disk manifest shape.
#[derive(Debug, Clone, Deserialize)]
struct RegistryData {
    sets: Vec<ThemeSet>,
    tasks: Vec<TaskMetadata>,
}

/// Errors raised while loading or cross-checking the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry JSON invalid: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate task id '{id}'")]
    DuplicateTask { id: String },
    #[error("task '{task}' references unknown set '{set}'")]
    UnknownSet { task: String, set: String },
    #[error("task '{task}' references unknown resource '{resource}' in set '{set}'")]
    UnknownResource {
        task: String,
        set: String,
        resource: String,
    },
    #[error("task '{task}' is an add/remove task without a target part")]
    MissingPart { task: String },
    #[error("registry is missing the system {kind} fallback")]
    MissingFallback { kind: &'static str },
    #[error("resource '{resource}' declares stackable={declared}, but the engine disagrees")]
    StackableMismatch { resource: String, declared: bool },
    #[error("system fallback '{task}' must have no requirements")]
    FallbackHasRequirements { task: String },
}

/// Loaded, indexed, read-only task registry.
#[derive(Debug)]
pub struct TaskRegistry {
    sets: Vec<ThemeSet>,
    tasks: Vec<TaskMetadata>,
    by_id: BTreeMap<String, usize>,
    general_fallback: usize,
    snake_fallback: usize,
    ladder_fallback: usize,
    final_fallback: usize,
}

impl TaskRegistry {
    /// Load and index a registry from manifest JSON.
    ///
    /// # Errors
    ///
    /// Returns a `RegistryError` for malformed JSON, duplicate ids, broken
    /// set/resource references, or missing system fallbacks.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let data: RegistryData = serde_json::from_str(json)?;
        Self::from_data(data.sets, data.tasks)
    }

    fn from_data(sets: Vec<ThemeSet>, tasks: Vec<TaskMetadata>) -> Result<Self, RegistryError> {
        // The manifest may restate occupancy semantics, but the inventory
        // model is the authority; a disagreement is a data bug.
        for set in &sets {
            for def in &set.resources {
                if def.stackable != is_stackable(&def.id) {
                    return Err(RegistryError::StackableMismatch {
                        resource: def.id.clone(),
                        declared: def.stackable,
                    });
                }
            }
        }

        let mut by_id = BTreeMap::new();
        for (index, task) in tasks.iter().enumerate() {
            if by_id.insert(task.id.clone(), index).is_some() {
                return Err(RegistryError::DuplicateTask {
                    id: task.id.clone(),
                });
            }
            if let Some(set_id) = task.set.as_deref() {
                let set = sets.iter().find(|set| set.id == set_id).ok_or_else(|| {
                    RegistryError::UnknownSet {
                        task: task.id.clone(),
                        set: set_id.to_string(),
                    }
                })?;
                if let Some(resource) = task.resource.as_deref()
                    && !set.resources.iter().any(|def| def.id == resource)
                {
                    return Err(RegistryError::UnknownResource {
                        task: task.id.clone(),
                        set: set_id.to_string(),
                        resource: resource.to_string(),
                    });
                }
            }
            if matches!(task.kind, TaskKind::Add | TaskKind::Remove)
                && (task.part.is_none() || task.resource.is_none())
            {
                return Err(RegistryError::MissingPart {
                    task: task.id.clone(),
                });
            }
        }

        let system_fallback = |kind: TaskKind, label: &'static str| {
            let index = tasks
                .iter()
                .position(|task| task.kind == kind && task.is_fallback && task.set.is_none())
                .ok_or(RegistryError::MissingFallback { kind: label })?;
            if kind == TaskKind::Standard && !tasks[index].requires.is_empty() {
                return Err(RegistryError::FallbackHasRequirements {
                    task: tasks[index].id.clone(),
                });
            }
            Ok(index)
        };
        let general_fallback = system_fallback(TaskKind::Standard, "general")?;
        let snake_fallback = system_fallback(TaskKind::Snake, "snake")?;
        let ladder_fallback = system_fallback(TaskKind::Ladder, "ladder")?;
        let final_fallback = system_fallback(TaskKind::Final, "final")?;

        Ok(Self {
            sets,
            tasks,
            by_id,
            general_fallback,
            snake_fallback,
            ladder_fallback,
            final_fallback,
        })
    }

    /// The manifest JSON embedded with the engine.
    #[must_use]
    pub const fn builtin_json() -> &'static str {
        include_str!("../assets/registry.json")
    }

    /// The built-in registry shipped with the engine.
    ///
    /// # Panics
    ///
    /// Panics if the embedded asset is invalid, which is a build defect.
    #[must_use]
    pub fn builtin() -> &'static Self {
        static REGISTRY: OnceLock<TaskRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            Self::from_json(Self::builtin_json()).expect("built-in registry is valid")
        })
    }

    #[must_use]
    pub fn sets(&self) -> &[ThemeSet] {
        &self.sets
    }

    #[must_use]
    pub fn set(&self, set_id: &str) -> Option<&ThemeSet> {
        self.sets.iter().find(|set| set.id == set_id)
    }

    #[must_use]
    pub fn task(&self, task_id: &str) -> Option<&TaskMetadata> {
        self.by_id.get(task_id).map(|&index| &self.tasks[index])
    }

    /// All tasks belonging to `set_id`, in manifest order.
    pub fn tasks_in_set<'a>(&'a self, set_id: &'a str) -> impl Iterator<Item = &'a TaskMetadata> {
        self.tasks
            .iter()
            .filter(move |task| task.set.as_deref() == Some(set_id))
    }

    /// Add or remove tasks for a (set, resource) pair.
    pub fn side_tasks<'a>(
        &'a self,
        set_id: &'a str,
        resource: &'a str,
        kind: TaskKind,
    ) -> impl Iterator<Item = &'a TaskMetadata> {
        self.tasks_in_set(set_id)
            .filter(move |task| task.kind == kind && task.resource.as_deref() == Some(resource))
    }

    /// The guaranteed system-wide general fallback.
    #[must_use]
    pub fn general_fallback(&self) -> &TaskMetadata {
        &self.tasks[self.general_fallback]
    }

    /// The always-eligible fallback for a hazard kind.
    #[must_use]
    pub fn hazard_fallback(&self, kind: HazardKind) -> &TaskMetadata {
        match kind {
            HazardKind::Snake => &self.tasks[self.snake_fallback],
            HazardKind::Ladder => &self.tasks[self.ladder_fallback],
        }
    }

    /// The system final-challenge fallback.
    #[must_use]
    pub fn final_fallback(&self) -> &TaskMetadata {
        &self.tasks[self.final_fallback]
    }
}
