//! Task content descriptors handed to the presentation layer.
//!
//! Content shape is resolved once at load time into a tagged variant:
//! a simple paginated card or an explicit multi-stage sequence. The
//! presentation layer pages through segments/stages and reports a single
//! completion signal back to the engine.

use serde::{Deserialize, Serialize};

/// A choice offered alongside task content. Presentation-only; the engine
/// never branches on which choice was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceDef {
    pub label: String,
    #[serde(default)]
    pub detail: Option<String>,
}

/// One step of a staged task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub prompt: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChoiceDef>,
}

/// Declarative task content, shape-resolved at registry load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TaskContent {
    /// Paginated text segments with an optional image and choices.
    Simple {
        segments: Vec<String>,
        #[serde(default)]
        image: Option<String>,
        #[serde(default)]
        choices: Vec<ChoiceDef>,
    },
    /// Explicit multi-step structure.
    Staged { stages: Vec<Stage> },
}

impl TaskContent {
    /// Number of advance steps the presentation will page through.
    #[must_use]
    pub fn step_count(&self) -> usize {
        match self {
            Self::Simple { segments, .. } => segments.len(),
            Self::Staged { stages } => stages.len(),
        }
    }
}

/// Rendered content for one selected task, with amount placeholders
/// substituted. This is what the presentation layer receives and what the
/// snapshot replays after a restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCard {
    pub task_id: String,
    pub content: TaskContent,
}

impl TaskCard {
    /// Render a card from declarative content. `amount` replaces the `{n}`
    /// placeholder used by add/remove and difficulty-scaled tasks.
    #[must_use]
    pub fn render(task_id: &str, content: &TaskContent, amount: Option<u8>) -> Self {
        let substitute = |text: &str| match amount {
            Some(n) => text.replace("{n}", &n.to_string()),
            None => text.to_string(),
        };
        let content = match content {
            TaskContent::Simple {
                segments,
                image,
                choices,
            } => TaskContent::Simple {
                segments: segments.iter().map(|s| substitute(s)).collect(),
                image: image.clone(),
                choices: choices.clone(),
            },
            TaskContent::Staged { stages } => TaskContent::Staged {
                stages: stages
                    .iter()
                    .map(|stage| Stage {
                        prompt: substitute(&stage.prompt),
                        image: stage.image.clone(),
                        choices: stage.choices.clone(),
                    })
                    .collect(),
            },
        };
        Self {
            task_id: task_id.to_string(),
            content,
        }
    }
}
