//! Task eligibility filtering, weighted selection, and the fallback chain.
//!
//! Selection never fails: when no standard task is eligible the chain walks
//! set fallbacks and lands on the guaranteed general fallback. Surfacing
//! the general fallback is defined behavior, not an error.

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::HazardKind;
use crate::config::SessionConfig;
use crate::inventory::Inventory;
use crate::registry::{TaskKind, TaskMetadata, TaskRegistry};

/// Read-only view over everything selection consults.
pub struct SelectionContext<'a> {
    pub registry: &'a TaskRegistry,
    pub config: &'a SessionConfig,
    pub inventory: &'a Inventory,
}

impl SelectionContext<'_> {
    /// Unused owned quantity of a resource.
    #[must_use]
    pub fn available_quantity(&self, resource: &str) -> u8 {
        self.config
            .resource(resource)
            .quantity
            .saturating_sub(self.inventory.count_total(resource))
    }

    /// Whether a task's owning resource is checked and its set-toggle on.
    fn task_enabled(&self, task: &TaskMetadata) -> bool {
        let Some(set_id) = task.set.as_deref() else {
            return true;
        };
        let Some(resource) = task.resource.as_deref() else {
            return true;
        };
        self.config.resource(resource).checked && self.config.pair_enabled(set_id, resource)
    }

    /// The declarative eligibility filter from the manifest requirements.
    #[must_use]
    pub fn meets_requirements(&self, task: &TaskMetadata) -> bool {
        let requires = &task.requires;
        for need in &requires.resources {
            if self.available_quantity(&need.resource) < need.quantity {
                return false;
            }
        }
        for cap in &requires.part_capacity {
            // Zero free space also covers a part occupied by an exclusive
            // resource of another kind.
            if self.inventory.free_stack_space(cap.part) < cap.space {
                return false;
            }
        }
        for &part in &requires.free_parts {
            if !self.inventory.is_empty(part) {
                return false;
            }
        }
        for resource in &requires.not_holding {
            if self.inventory.is_holding(resource) {
                return false;
            }
        }
        true
    }

    fn eligible(&self, task: &TaskMetadata) -> bool {
        self.task_enabled(task) && self.meets_requirements(task)
    }
}

/// Walk a cumulative weight list; ties go to the first entry whose
/// cumulative weight exceeds the draw.
fn weighted_pick<'a, R: Rng>(
    weighted: &[(&'a TaskMetadata, u32)],
    rng: &mut R,
) -> Option<&'a TaskMetadata> {
    let total: u32 = weighted.iter().map(|(_, weight)| *weight).sum();
    if total == 0 {
        return None;
    }
    let roll = rng.gen_range(0..total);
    let mut current = 0;
    for (task, weight) in weighted {
        current += *weight;
        if roll < current {
            return Some(task);
        }
    }
    weighted.first().map(|(task, _)| *task)
}

fn uniform_pick<'a, R: Rng>(
    candidates: &[&'a TaskMetadata],
    rng: &mut R,
) -> Option<&'a TaskMetadata> {
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.gen_range(0..candidates.len())])
}

fn effective_weight(config: &SessionConfig, task: &TaskMetadata) -> u32 {
    let effective = i64::from(task.base_weight) + i64::from(config.weight_override(&task.id));
    u32::try_from(effective.max(0)).unwrap_or(u32::MAX)
}

/// Select the next standard task. Never returns nothing: the fallback
/// chain ends at the guaranteed general fallback.
pub fn select_next_task<'a, R: Rng>(
    ctx: &SelectionContext<'a>,
    rng: &mut R,
) -> &'a TaskMetadata {
    let mut weighted: Vec<(&TaskMetadata, u32)> = Vec::new();
    for set_id in &ctx.config.selected_sets {
        for task in ctx.registry.tasks_in_set(set_id) {
            if task.kind != TaskKind::Standard || task.is_fallback || !ctx.eligible(task) {
                continue;
            }
            let weight = effective_weight(ctx.config, task);
            if weight > 0 {
                weighted.push((task, weight));
            }
        }
    }
    if let Some(task) = weighted_pick(&weighted, rng) {
        return task;
    }

    // Nothing standard is eligible: per-set fallbacks, filter re-applied.
    debug!("no eligible standard task; walking set fallbacks");
    let mut fallbacks: Vec<&TaskMetadata> = Vec::new();
    for set_id in &ctx.config.selected_sets {
        for task in ctx.registry.tasks_in_set(set_id) {
            if task.kind == TaskKind::Standard && task.is_fallback && ctx.meets_requirements(task) {
                fallbacks.push(task);
            }
        }
    }
    uniform_pick(&fallbacks, rng).unwrap_or_else(|| ctx.registry.general_fallback())
}

/// Select the task shown on entering a hazard. Set-specific conditional
/// tasks win over the kind fallback; ties break uniformly.
pub fn select_hazard_task<'a, R: Rng>(
    ctx: &SelectionContext<'a>,
    kind: HazardKind,
    rng: &mut R,
) -> &'a TaskMetadata {
    let wanted = match kind {
        HazardKind::Snake => TaskKind::Snake,
        HazardKind::Ladder => TaskKind::Ladder,
    };
    let mut candidates: Vec<&TaskMetadata> = Vec::new();
    for set_id in &ctx.config.selected_sets {
        for task in ctx.registry.tasks_in_set(set_id) {
            if task.kind == wanted && !task.is_fallback && ctx.eligible(task) {
                candidates.push(task);
            }
        }
    }
    uniform_pick(&candidates, rng).unwrap_or_else(|| ctx.registry.hazard_fallback(kind))
}

/// Select the final-challenge task. Always-select tasks whose precondition
/// passes take absolute precedence; otherwise a weighted draw; otherwise
/// the system final fallback.
pub fn select_final_task<'a, R: Rng>(
    ctx: &SelectionContext<'a>,
    rng: &mut R,
) -> &'a TaskMetadata {
    let mut always: Vec<&TaskMetadata> = Vec::new();
    let mut weighted: Vec<(&TaskMetadata, u32)> = Vec::new();
    for set_id in &ctx.config.selected_sets {
        for task in ctx.registry.tasks_in_set(set_id) {
            if task.kind != TaskKind::Final || task.is_fallback || !ctx.meets_requirements(task) {
                continue;
            }
            if task.always_select {
                always.push(task);
            }
            weighted.push((task, task.base_weight.max(1)));
        }
    }
    if let Some(task) = uniform_pick(&always, rng) {
        return task;
    }
    weighted_pick(&weighted, rng).unwrap_or_else(|| ctx.registry.final_fallback())
}

/// Outcome of the independent prize draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrizeKind {
    Full,
    Partial,
    Denied,
}

/// Prize outcome plus the modifier rolls threaded into final-task content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalPrize {
    pub prize: PrizeKind,
    pub modifiers: Vec<String>,
}

/// Draw the prize kind against the configured percentages. Independent of
/// task selection; computed before content generation.
pub fn draw_prize<R: Rng>(config: &SessionConfig, rng: &mut R) -> PrizeKind {
    let roll = rng.gen_range(0..100u32);
    if roll < u32::from(config.prize.full) {
        PrizeKind::Full
    } else if roll < u32::from(config.prize.full) + u32::from(config.prize.partial) {
        PrizeKind::Partial
    } else {
        PrizeKind::Denied
    }
}

/// Roll the final-challenge modifiers. The denied branch never carries
/// modifier content.
pub fn draw_final_prize<R: Rng>(config: &SessionConfig, rng: &mut R) -> FinalPrize {
    let prize = draw_prize(config, rng);
    let modifiers = if prize == PrizeKind::Denied {
        Vec::new()
    } else {
        config
            .modifier_chances
            .iter()
            .filter(|&(_, &chance)| rng.gen_range(0..100u8) < chance)
            .map(|(id, _)| id.clone())
            .collect()
    };
    FinalPrize { prize, modifiers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PrizeWeights, ResourceConfig};
    use crate::inventory::BodyPart;
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
                        { "id": "pegs", "name": "Clothes Pegs", "stackable": true },
                        { "id": "wristband", "name": "Wristband" }
                    ]
                },
                {
                    "id": "juggling",
                    "name": "Juggling",
                    "resources": [{ "id": "beanbag", "name": "Beanbag" }]
                }
            ],
            "tasks": [
                {
                    "id": "pegs_clip",
                    "set": "dressup",
                    "resource": "pegs",
                    "kind": "standard",
                    "base_weight": 5,
                    "requires": {
                        "resources": [{ "resource": "pegs", "quantity": 2 }],
                        "part_capacity": [{ "part": "ears", "resource": "pegs", "space": 2 }]
                    },
                    "content": { "shape": "simple", "segments": ["Clip {n} pegs."] }
                },
                {
                    "id": "wristband_wear",
                    "set": "dressup",
                    "resource": "wristband",
                    "kind": "standard",
                    "base_weight": 5,
                    "requires": {
                        "resources": [{ "resource": "wristband" }],
                        "free_parts": ["hands"],
                        "not_holding": ["beanbag"]
                    },
                    "content": { "shape": "simple", "segments": ["Put the wristband on."] }
                },
                {
                    "id": "dressup_fallback",
                    "set": "dressup",
                    "resource": "pegs",
                    "kind": "standard",
                    "is_fallback": true,
                    "content": { "shape": "simple", "segments": ["March in place."] }
                },
                {
                    "id": "juggling_toss",
                    "set": "juggling",
                    "resource": "beanbag",
                    "kind": "standard",
                    "base_weight": 1,
                    "requires": { "resources": [{ "resource": "beanbag" }] },
                    "content": { "shape": "simple", "segments": ["Toss the beanbag."] }
                },
                {
                    "id": "snake_special",
                    "set": "juggling",
                    "kind": "snake",
                    "requires": { "resources": [{ "resource": "beanbag" }] },
                    "content": { "shape": "simple", "segments": ["Slide with the beanbag."] }
                },
                {
                    "id": "final_always",
                    "set": "dressup",
                    "kind": "final",
                    "always_select": true,
                    "requires": { "resources": [{ "resource": "wristband" }] },
                    "content": { "shape": "simple", "segments": ["Grand finale."] }
                },
                {
                    "id": "final_weighted",
                    "set": "dressup",
                    "kind": "final",
                    "base_weight": 2,
                    "content": { "shape": "simple", "segments": ["Quiet finale."] }
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

    fn base_config() -> SessionConfig {
        let mut config = SessionConfig {
            selected_sets: vec!["dressup".to_string(), "juggling".to_string()],
            ..SessionConfig::default()
        };
        for id in ["pegs", "wristband", "beanbag"] {
            config.resources.insert(
                id.to_string(),
                ResourceConfig {
                    quantity: 5,
                    ..ResourceConfig::default()
                },
            );
        }
        config
    }

    #[test]
    fn selection_is_pure_given_fixed_rng() {
        let registry = test_registry();
        let config = base_config();
        let inventory = Inventory::new();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        let mut rng_a = ChaCha20Rng::from_seed([5u8; 32]);
        let mut rng_b = ChaCha20Rng::from_seed([5u8; 32]);
        assert_eq!(
            select_next_task(&ctx, &mut rng_a).id,
            select_next_task(&ctx, &mut rng_b).id
        );
    }

    #[test]
    fn quantity_requirement_filters_out_tasks() {
        let registry = test_registry();
        let mut config = base_config();
        config.resources.get_mut("pegs").unwrap().quantity = 1;
        let inventory = Inventory::new();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        let pegs_clip = registry.task("pegs_clip").unwrap();
        assert!(!ctx.meets_requirements(pegs_clip));
    }

    #[test]
    fn in_use_quantity_counts_against_availability() {
        let registry = test_registry();
        let mut config = base_config();
        config.resources.get_mut("pegs").unwrap().quantity = 2;
        let mut inventory = Inventory::new();
        inventory.add(BodyPart::Nose, "pegs").unwrap();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        assert_eq!(ctx.available_quantity("pegs"), 1);
        assert!(!ctx.meets_requirements(registry.task("pegs_clip").unwrap()));
    }

    #[test]
    fn occupied_free_part_blocks_task() {
        let registry = test_registry();
        let config = base_config();
        let mut inventory = Inventory::new();
        inventory.add(BodyPart::Hands, "beanbag").unwrap();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        // Fails twice over: hands are occupied and a beanbag is held.
        assert!(!ctx.meets_requirements(registry.task("wristband_wear").unwrap()));
    }

    #[test]
    fn capacity_requirement_respects_partial_occupancy() {
        let registry = test_registry();
        let config = base_config();
        let mut inventory = Inventory::new();
        inventory.add(BodyPart::Ears, "pegs").unwrap();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        // Ears cap is 2; one is taken, the task needs space for 2.
        assert!(!ctx.meets_requirements(registry.task("pegs_clip").unwrap()));
    }

    #[test]
    fn fallback_chain_reaches_general_fallback() {
        let registry = test_registry();
        let mut config = base_config();
        // Zero quantities starve every standard task. The pair toggle only
        // gates standard selection; fallbacks re-check requirements alone.
        for resource in config.resources.values_mut() {
            resource.quantity = 0;
        }
        config.set_pair_enabled("dressup", "pegs", false);
        let inventory = Inventory::new();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        let mut rng = ChaCha20Rng::from_seed([1u8; 32]);
        let picked = select_next_task(&ctx, &mut rng);
        // Set fallback still passes the filter (it has no requirements),
        // so the chain stops there, not at the general fallback.
        assert_eq!(picked.id, "dressup_fallback");

        // With no sets selected at all, only the general fallback remains.
        config.selected_sets.clear();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        let picked = select_next_task(&ctx, &mut rng);
        assert_eq!(picked.id, "general_fallback");
    }

    #[test]
    fn weight_override_can_zero_out_a_task() {
        let registry = test_registry();
        let mut config = base_config();
        config.selected_sets = vec!["juggling".to_string()];
        config
            .weight_overrides
            .insert("juggling_toss".to_string(), -1);
        let inventory = Inventory::new();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        let mut rng = ChaCha20Rng::from_seed([2u8; 32]);
        // The only standard task in the set is weighted to zero.
        let picked = select_next_task(&ctx, &mut rng);
        assert_eq!(picked.id, "general_fallback");
    }

    #[test]
    fn hazard_selection_prefers_conditional_then_falls_back() {
        let registry = test_registry();
        let config = base_config();
        let inventory = Inventory::new();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        let mut rng = ChaCha20Rng::from_seed([3u8; 32]);
        let picked = select_hazard_task(&ctx, HazardKind::Snake, &mut rng);
        assert_eq!(picked.id, "snake_special");

        // Ladder has no set-specific task anywhere.
        let picked = select_hazard_task(&ctx, HazardKind::Ladder, &mut rng);
        assert_eq!(picked.id, "ladder_fallback");

        // Starve the snake task's precondition.
        let mut starved = base_config();
        starved.resources.get_mut("beanbag").unwrap().quantity = 0;
        let ctx = SelectionContext {
            registry: &registry,
            config: &starved,
            inventory: &inventory,
        };
        let picked = select_hazard_task(&ctx, HazardKind::Snake, &mut rng);
        assert_eq!(picked.id, "snake_fallback");
    }

    #[test]
    fn final_selection_honors_always_select_precedence() {
        let registry = test_registry();
        let config = base_config();
        let inventory = Inventory::new();
        let ctx = SelectionContext {
            registry: &registry,
            config: &config,
            inventory: &inventory,
        };
        let mut rng = ChaCha20Rng::from_seed([4u8; 32]);
        assert_eq!(select_final_task(&ctx, &mut rng).id, "final_always");

        // Starving the always-select precondition falls back to the
        // weighted pool, which still has an unconditional final.
        let mut starved = base_config();
        starved.resources.get_mut("wristband").unwrap().quantity = 0;
        let ctx = SelectionContext {
            registry: &registry,
            config: &starved,
            inventory: &inventory,
        };
        assert_eq!(select_final_task(&ctx, &mut rng).id, "final_weighted");
    }

    #[test]
    fn prize_draw_is_independent_and_denied_has_no_modifiers() {
        let mut config = base_config();
        config.prize = PrizeWeights {
            full: 0,
            partial: 0,
            denied: 100,
        };
        let mut rng = ChaCha20Rng::from_seed([6u8; 32]);
        let prize = draw_final_prize(&config, &mut rng);
        assert_eq!(prize.prize, PrizeKind::Denied);
        assert!(prize.modifiers.is_empty());

        config.prize = PrizeWeights {
            full: 100,
            partial: 0,
            denied: 0,
        };
        config.modifier_chances.insert("blindfold".to_string(), 100);
        let prize = draw_final_prize(&config, &mut rng);
        assert_eq!(prize.prize, PrizeKind::Full);
        assert!(prize.modifiers.contains(&"blindfold".to_string()));
    }
}
