//! Centralized balance and tuning constants for the Serpentine engine.
//!
//! Gameplay can only be adjusted via code changes reviewed in version
//! control; nothing here is read from external assets at runtime.

// Board geometry -----------------------------------------------------------
pub(crate) const ROW_WIDTH: u16 = 10;
pub(crate) const MIN_BOARD_SQUARES: u16 = 10;
pub(crate) const MAX_BOARD_SQUARES: u16 = 1000;

// Hazard placement ---------------------------------------------------------
/// Attempts per placement pass before a hazard is given up on.
pub(crate) const PLACEMENT_ATTEMPTS_PER_PASS: u32 = 100;

// Dice ---------------------------------------------------------------------
pub(crate) const DIE_SIDES: u8 = 6;

// Side events --------------------------------------------------------------
pub(crate) const DEFAULT_ADD_CHANCE: u8 = 10;
pub(crate) const DEFAULT_REMOVE_CHANCE: u8 = 20;

// Prize draw ---------------------------------------------------------------
pub(crate) const PRIZE_PERCENT_TOTAL: u32 = 100;
pub(crate) const DEFAULT_PRIZE_FULL: u8 = 33;
pub(crate) const DEFAULT_PRIZE_PARTIAL: u8 = 33;
pub(crate) const DEFAULT_PRIZE_DENIED: u8 = 34;
pub(crate) const DEFAULT_MODIFIER_CHANCE: u8 = 10;

// Inventory ----------------------------------------------------------------
/// The single stackable resource kind. Every other resource occupies a
/// body part exclusively.
pub(crate) const STACKABLE_RESOURCE: &str = "pegs";

// Persistence --------------------------------------------------------------
/// Single session slot; there is no multi-session namespace.
pub const SESSION_SLOT: &str = "serpentine.session";
