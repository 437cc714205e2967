//! Per-turn add/remove side events.
//!
//! An independent stochastic layer that may attach a resource-add or
//! resource-remove micro-task before the main task. Every eligible
//! (resource, body-part) candidate gets its own Bernoulli trial; one
//! winner is chosen uniformly. The inventory mutation is carried by the
//! returned descriptor and executed exactly once, at a point the state
//! machine controls.

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::inventory::{BodyPart, Inventory};
use crate::registry::{TaskKind, TaskMetadata};
use crate::selector::SelectionContext;

/// Whether the event attaches or detaches a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideEventKind {
    Add,
    Remove,
}

/// A fired side event, carried in the snapshot until its turn ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEvent {
    pub kind: SideEventKind,
    pub task_id: String,
    pub set_id: String,
    pub resource: String,
    pub part: BodyPart,
    pub amount: u8,
    /// Set once the inventory mutation has run; restores never re-run it.
    pub executed: bool,
}

impl SideEvent {
    /// Apply the inventory mutation. Safe to call more than once: only the
    /// first call mutates. Returns how many units were actually moved
    /// (capacity may stop an add early).
    pub fn execute(&mut self, inventory: &mut Inventory) -> u8 {
        if self.executed {
            return 0;
        }
        self.executed = true;
        let mut applied = 0;
        for _ in 0..self.amount {
            let result = match self.kind {
                SideEventKind::Add => inventory.add(self.part, &self.resource),
                SideEventKind::Remove => inventory.remove(self.part, &self.resource),
            };
            if result.is_err() {
                break;
            }
            applied += 1;
        }
        debug!(
            "side event {} {}x{} at {} (applied {applied})",
            self.task_id, self.resource, self.amount, self.part
        );
        applied
    }
}

struct Candidate<'a> {
    task: &'a TaskMetadata,
    kind: SideEventKind,
    chance: u8,
    amount: u8,
}

/// Roll for a side event at a settle, before the main task is selected.
/// Returns `None` when no candidate wins its trial.
pub fn roll_side_event<R: Rng>(ctx: &SelectionContext<'_>, rng: &mut R) -> Option<SideEvent> {
    let mut candidates: Vec<Candidate<'_>> = Vec::new();

    for set_id in &ctx.config.selected_sets {
        let Some(set) = ctx.registry.set(set_id) else {
            continue;
        };
        for resource_def in &set.resources {
            let resource = resource_def.id.as_str();
            let settings = ctx.config.resource(resource);
            if !settings.checked || !ctx.config.pair_enabled(set_id, resource) {
                continue;
            }

            let add_chance = settings.effective_add_chance();
            if add_chance > 0 {
                for task in ctx.registry.side_tasks(set_id, resource, TaskKind::Add) {
                    let part = task.part.expect("add tasks carry a part");
                    let amount = task
                        .amount
                        .unwrap_or_default()
                        .for_difficulty(settings.difficulty);
                    if ctx.inventory.free_space_for(part, resource) >= amount
                        && ctx.available_quantity(resource) >= amount
                        && ctx.meets_requirements(task)
                    {
                        candidates.push(Candidate {
                            task,
                            kind: SideEventKind::Add,
                            chance: add_chance,
                            amount,
                        });
                    }
                }
            }

            let remove_chance = settings.effective_remove_chance();
            if remove_chance > 0 {
                for task in ctx.registry.side_tasks(set_id, resource, TaskKind::Remove) {
                    let part = task.part.expect("remove tasks carry a part");
                    let held = ctx.inventory.count_in(part, resource);
                    if held == 0 {
                        continue;
                    }
                    let amount = task
                        .amount
                        .unwrap_or_default()
                        .for_difficulty(settings.difficulty)
                        .min(held);
                    candidates.push(Candidate {
                        task,
                        kind: SideEventKind::Remove,
                        chance: remove_chance,
                        amount,
                    });
                }
            }
        }
    }

    // Every candidate rolls independently; multiple can win.
    let winners: Vec<&Candidate<'_>> = candidates
        .iter()
        .filter(|candidate| rng.gen_range(0..100u8) < candidate.chance)
        .collect();
    if winners.is_empty() {
        return None;
    }
    let chosen = winners[rng.gen_range(0..winners.len())];
    debug!(
        "side event fired: {:?} {} ({} candidates, {} winners)",
        chosen.kind,
        chosen.task.id,
        candidates.len(),
        winners.len()
    );
    Some(SideEvent {
        kind: chosen.kind,
        task_id: chosen.task.id.clone(),
        set_id: chosen.task.set.clone().unwrap_or_default(),
        resource: chosen.task.resource.clone().unwrap_or_default(),
        part: chosen.task.part.expect("side tasks carry a part"),
        amount: chosen.amount,
        executed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResourceConfig, SessionConfig};
    use crate::registry::TaskRegistry;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn test_registry() -> TaskRegistry {
        TaskRegistry::from_json(
            r#"{
            "sets": [
                {
                    "id": "dressup",
                    "name": "Dress-Up",
                    "resources": [
                        { "id": "pegs", "name": "Clothes Pegs", "stackable": true }
                    ]
                }
            ],
            "tasks": [
                {
                    "id": "pegs_add_ears",
                    "set": "dressup",
                    "resource": "pegs",
                    "kind": "add",
                    "part": "ears",
                    "amount": { "easy": 1, "medium": 2, "hard": 2 },
                    "content": { "shape": "simple", "segments": ["Clip {n} pegs to your ears."] }
                },
                {
                    "id": "pegs_remove_ears",
                    "set": "dressup",
                    "resource": "pegs",
                    "kind": "remove",
                    "part": "ears",
                    "amount": { "easy": 1, "medium": 1, "hard": 2 },
                    "content": { "shape": "simple", "segments": ["Take {n} pegs off."] }
                },
                {
                    "id": "general_fallback",
                    "kind": "standard",
                    "is_fallback": true,
                    "content": { "shape": "simple", "segments": ["Take a breather."] }
                },
                {
                    "id": "snake_fallback",
                    "kind": "snake",
                    "is_fallback": true,
                    "content": { "shape": "simple", "segments": ["Slide down."] }
                },
                {
                    "id": "ladder_fallback",
                    "kind": "ladder",
                    "is_fallback": true,
                    "content": { "shape": "simple", "segments": ["Climb up."] }
                },
                {
                    "id": "final_fallback",
                    "kind": "final",
                    "is_fallback": true,
                    "content": { "shape": "simple", "segments": ["The end."] }
                }
            ]
        }"#,
        )
        .unwrap()
    }

    fn config_with_chances(add: u8, remove: u8) -> SessionConfig {
        let mut config = SessionConfig {
            selected_sets: vec!["dressup".to_string()],
            ..SessionConfig::default()
        };
        config.resources.insert(
            "pegs".to_string(),
            ResourceConfig {
                quantity: 10,
                add_chance: add,
                remove_chance: remove,
                ..ResourceConfig::default()
            },
        );
        config
    }

    #[test]
    fn certain_add_chance_always_fires() {
        let registry = test_registry();
        let config = config_with_chances(100, 0);
        let inventory = Inventory::new();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        let mut rng = ChaCha20Rng::from_seed([8u8; 32]);
        let event = roll_side_event(&ctx, &mut rng).expect("guaranteed add");
        assert_eq!(event.kind, SideEventKind::Add);
        assert_eq!(event.part, BodyPart::Ears);
        assert_eq!(event.amount, 2);
        assert!(!event.executed);
    }

    #[test]
    fn zero_chances_never_fire() {
        let registry = test_registry();
        let config = config_with_chances(0, 0);
        let inventory = Inventory::new();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        let mut rng = ChaCha20Rng::from_seed([8u8; 32]);
        assert!(roll_side_event(&ctx, &mut rng).is_none());
    }

    #[test]
    fn locked_resource_cannot_fire() {
        let registry = test_registry();
        let mut config = config_with_chances(100, 100);
        config.resources.get_mut("pegs").unwrap().locked = true;
        let inventory = Inventory::new();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        let mut rng = ChaCha20Rng::from_seed([8u8; 32]);
        assert!(roll_side_event(&ctx, &mut rng).is_none());
    }

    #[test]
    fn remove_requires_something_held() {
        let registry = test_registry();
        let config = config_with_chances(0, 100);
        let empty = Inventory::new();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &empty,
        };
        let mut rng = ChaCha20Rng::from_seed([8u8; 32]);
        assert!(roll_side_event(&ctx, &mut rng).is_none());

        let mut holding = Inventory::new();
        holding.add(BodyPart::Ears, "pegs").unwrap();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &holding,
        };
        let event = roll_side_event(&ctx, &mut rng).expect("remove fires");
        assert_eq!(event.kind, SideEventKind::Remove);
        // Only one peg is held; the amount clamps to it.
        assert_eq!(event.amount, 1);
    }

    #[test]
    fn add_blocked_when_capacity_is_short() {
        let registry = test_registry();
        let config = config_with_chances(100, 0);
        let mut inventory = Inventory::new();
        // Ears cap is 2 and the add task wants 2 on medium.
        inventory.add(BodyPart::Ears, "pegs").unwrap();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        let mut rng = ChaCha20Rng::from_seed([8u8; 32]);
        assert!(roll_side_event(&ctx, &mut rng).is_none());
    }

    #[test]
    fn execute_mutates_exactly_once() {
        let mut inventory = Inventory::new();
        let mut event = SideEvent {
            kind: SideEventKind::Add,
            task_id: "pegs_add_ears".to_string(),
            set_id: "dressup".to_string(),
            resource: "pegs".to_string(),
            part: BodyPart::Ears,
            amount: 2,
            executed: false,
        };
        assert_eq!(event.execute(&mut inventory), 2);
        assert_eq!(inventory.count_in(BodyPart::Ears, "pegs"), 2);
        // Second call is a no-op.
        assert_eq!(event.execute(&mut inventory), 0);
        assert_eq!(inventory.count_in(BodyPart::Ears, "pegs"), 2);
    }
}
