//! Body-part slot inventory.
//!
//! Each part holds items of only one kind at a time: any number of the one
//! stackable resource up to the part's cap, or at most one non-stackable
//! resource. All mutation goes through [`Inventory::add`] and
//! [`Inventory::remove`], which re-check that invariant.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::constants::STACKABLE_RESOURCE;

/// Body-part slot keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyPart {
    Head,
    Ears,
    Nose,
    Arms,
    Hands,
    Waist,
    Legs,
    Feet,
}

impl BodyPart {
    pub const ALL: [Self; 8] = [
        Self::Head,
        Self::Ears,
        Self::Nose,
        Self::Arms,
        Self::Hands,
        Self::Waist,
        Self::Legs,
        Self::Feet,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Ears => "ears",
            Self::Nose => "nose",
            Self::Arms => "arms",
            Self::Hands => "hands",
            Self::Waist => "waist",
            Self::Legs => "legs",
            Self::Feet => "feet",
        }
    }

    /// Maximum stackable-resource count this part can carry.
    #[must_use]
    pub const fn stack_capacity(self) -> u8 {
        match self {
            Self::Arms => 20,
            Self::Nose => 3,
            Self::Ears => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyPart {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|part| part.as_str() == s)
            .ok_or(())
    }
}

/// Whether a resource stacks or occupies a part exclusively.
#[must_use]
pub fn is_stackable(resource: &str) -> bool {
    resource == STACKABLE_RESOURCE
}

/// Errors raised when an add/remove would violate the occupancy invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("{part} cannot hold {resource}")]
    WontFit { part: BodyPart, resource: String },
    #[error("{part} does not hold {resource}")]
    NotHeld { part: BodyPart, resource: String },
}

/// Per-part occupancy state. The only mutable structure shared between the
/// selector, the side-event roller, and task effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    parts: BTreeMap<BodyPart, SmallVec<[String; 4]>>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    /// Fresh inventory with every part empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parts: BodyPart::ALL
                .into_iter()
                .map(|part| (part, SmallVec::new()))
                .collect(),
        }
    }

    fn items(&self, part: BodyPart) -> &[String] {
        self.parts.get(&part).map_or(&[], SmallVec::as_slice)
    }

    /// True when the part holds nothing at all.
    #[must_use]
    pub fn is_empty(&self, part: BodyPart) -> bool {
        self.items(part).is_empty()
    }

    /// Count of `resource` at one part.
    #[must_use]
    pub fn count_in(&self, part: BodyPart, resource: &str) -> u8 {
        #[allow(clippy::cast_possible_truncation)]
        let count = self
            .items(part)
            .iter()
            .filter(|item| item.as_str() == resource)
            .count() as u8;
        count
    }

    /// Count of `resource` across every part.
    #[must_use]
    pub fn count_total(&self, resource: &str) -> u8 {
        BodyPart::ALL
            .into_iter()
            .map(|part| self.count_in(part, resource))
            .sum()
    }

    /// Whether `resource` is held anywhere.
    #[must_use]
    pub fn is_holding(&self, resource: &str) -> bool {
        BodyPart::ALL
            .into_iter()
            .any(|part| self.items(part).iter().any(|item| item == resource))
    }

    /// Every held resource id, deduplicated.
    #[must_use]
    pub fn held_resources(&self) -> Vec<String> {
        let mut held: Vec<String> = self
            .parts
            .values()
            .flat_map(|items| items.iter().cloned())
            .collect();
        held.sort();
        held.dedup();
        held
    }

    /// Whether the part holds anything other than the stackable resource.
    #[must_use]
    pub fn holds_exclusive_kind(&self, part: BodyPart) -> bool {
        self.items(part).iter().any(|item| !is_stackable(item))
    }

    /// Remaining stackable capacity at a part; zero when an exclusive
    /// resource already occupies it.
    #[must_use]
    pub fn free_stack_space(&self, part: BodyPart) -> u8 {
        if self.holds_exclusive_kind(part) {
            return 0;
        }
        part.stack_capacity()
            .saturating_sub(self.count_in(part, STACKABLE_RESOURCE))
    }

    /// How many more units of `resource` fit at `part`: remaining stack
    /// capacity for the stackable kind, one-or-zero for everything else.
    #[must_use]
    pub fn free_space_for(&self, part: BodyPart, resource: &str) -> u8 {
        if is_stackable(resource) {
            self.free_stack_space(part)
        } else {
            u8::from(self.is_empty(part))
        }
    }

    /// Whether one more `resource` fits at `part` under the invariant.
    #[must_use]
    pub fn can_hold(&self, part: BodyPart, resource: &str) -> bool {
        if is_stackable(resource) {
            self.free_stack_space(part) > 0
        } else {
            self.is_empty(part)
        }
    }

    /// Add one `resource` at `part`.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::WontFit` when the occupancy invariant would
    /// be violated (capacity reached, or the part holds another kind).
    pub fn add(&mut self, part: BodyPart, resource: &str) -> Result<(), InventoryError> {
        if !self.can_hold(part, resource) {
            return Err(InventoryError::WontFit {
                part,
                resource: resource.to_string(),
            });
        }
        self.parts
            .entry(part)
            .or_default()
            .push(resource.to_string());
        Ok(())
    }

    /// Remove one `resource` from `part`.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::NotHeld` when the part does not hold it.
    pub fn remove(&mut self, part: BodyPart, resource: &str) -> Result<(), InventoryError> {
        let items = self.parts.entry(part).or_default();
        let Some(index) = items.iter().position(|item| item == resource) else {
            return Err(InventoryError::NotHeld {
                part,
                resource: resource.to_string(),
            });
        };
        items.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_resource_needs_empty_part() {
        let mut inv = Inventory::new();
        inv.add(BodyPart::Hands, "wristband").unwrap();
        assert_eq!(
            inv.add(BodyPart::Hands, "scarf"),
            Err(InventoryError::WontFit {
                part: BodyPart::Hands,
                resource: "scarf".to_string()
            })
        );
        assert!(inv.is_holding("wristband"));
        assert_eq!(inv.count_total("wristband"), 1);
    }

    #[test]
    fn stackable_respects_per_part_cap() {
        let mut inv = Inventory::new();
        inv.add(BodyPart::Ears, "pegs").unwrap();
        inv.add(BodyPart::Ears, "pegs").unwrap();
        assert_eq!(inv.free_stack_space(BodyPart::Ears), 0);
        assert!(inv.add(BodyPart::Ears, "pegs").is_err());
        assert_eq!(inv.count_in(BodyPart::Ears, "pegs"), 2);
    }

    #[test]
    fn stackable_blocked_by_exclusive_occupant() {
        let mut inv = Inventory::new();
        inv.add(BodyPart::Nose, "scarf").unwrap();
        assert!(!inv.can_hold(BodyPart::Nose, "pegs"));
        assert_eq!(inv.free_stack_space(BodyPart::Nose), 0);
    }

    #[test]
    fn exclusive_blocked_by_stackable_occupant() {
        let mut inv = Inventory::new();
        inv.add(BodyPart::Arms, "pegs").unwrap();
        assert!(!inv.can_hold(BodyPart::Arms, "wristband"));
    }

    #[test]
    fn remove_restores_capacity() {
        let mut inv = Inventory::new();
        inv.add(BodyPart::Waist, "scarf").unwrap();
        assert_eq!(
            inv.remove(BodyPart::Waist, "pegs"),
            Err(InventoryError::NotHeld {
                part: BodyPart::Waist,
                resource: "pegs".to_string()
            })
        );
        inv.remove(BodyPart::Waist, "scarf").unwrap();
        assert!(inv.is_empty(BodyPart::Waist));
        assert!(inv.can_hold(BodyPart::Waist, "pegs"));
    }

    #[test]
    fn invariant_holds_under_mixed_sequences() {
        let mut inv = Inventory::new();
        for _ in 0..30 {
            let _ = inv.add(BodyPart::Arms, "pegs");
        }
        assert_eq!(inv.count_in(BodyPart::Arms, "pegs"), 20);
        for _ in 0..5 {
            inv.remove(BodyPart::Arms, "pegs").unwrap();
        }
        assert_eq!(inv.free_stack_space(BodyPart::Arms), 5);
        assert!(!inv.can_hold(BodyPart::Arms, "hoop"));

        let held = inv.held_resources();
        assert_eq!(held, vec!["pegs".to_string()]);
    }

    #[test]
    fn serde_round_trip_preserves_order() {
        let mut inv = Inventory::new();
        inv.add(BodyPart::Head, "silly_hat").unwrap();
        inv.add(BodyPart::Nose, "pegs").unwrap();
        let json = serde_json::to_string(&inv).unwrap();
        let back: Inventory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, inv);
    }
}
