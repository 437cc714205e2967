//! Board hazard generation, difficulty presets, and the hand-authored
//! override parser/validator.
//!
//! Generation is best-effort: under extreme density settings fewer hazards
//! than the nominal target are placed and the shortfall is logged, never
//! raised as an error.

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::constants::{
    MAX_BOARD_SQUARES, MIN_BOARD_SQUARES, PLACEMENT_ATTEMPTS_PER_PASS, ROW_WIDTH,
};

/// One-based board square index.
pub type Square = u16;

/// A descending (snake) or ascending (ladder) link on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardKind {
    Snake,
    Ladder,
}

impl HazardKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Snake => "snake",
            Self::Ladder => "ladder",
        }
    }
}

impl fmt::Display for HazardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed difficulty selector for generated boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoardDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl BoardDifficulty {
    /// Resolve the fixed preset for this difficulty.
    #[must_use]
    pub const fn preset(self) -> &'static DifficultyPreset {
        match self {
            Self::Easy => &EASY_PRESET,
            Self::Medium => &MEDIUM_PRESET,
            Self::Hard => &HARD_PRESET,
        }
    }
}

/// Density and hazard-length bounds for generated boards.
///
/// Length bounds are percentages of the board size; minimums round up,
/// maximums round down, and both are floored at one square.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyPreset {
    pub snakes_per_row: f32,
    pub ladders_per_row: f32,
    pub max_any_per_row: u8,
    pub min_jump_percent: u8,
    pub max_jump_percent: u8,
    pub min_fall_percent: u8,
    pub max_fall_percent: u8,
}

pub(crate) const EASY_PRESET: DifficultyPreset = DifficultyPreset {
    snakes_per_row: 1.0,
    ladders_per_row: 2.0,
    max_any_per_row: 4,
    min_jump_percent: 10,
    max_jump_percent: 50,
    min_fall_percent: 5,
    max_fall_percent: 30,
};

pub(crate) const MEDIUM_PRESET: DifficultyPreset = DifficultyPreset {
    snakes_per_row: 1.0,
    ladders_per_row: 1.0,
    max_any_per_row: 3,
    min_jump_percent: 5,
    max_jump_percent: 40,
    min_fall_percent: 5,
    max_fall_percent: 40,
};

pub(crate) const HARD_PRESET: DifficultyPreset = DifficultyPreset {
    snakes_per_row: 2.0,
    ladders_per_row: 1.0,
    max_any_per_row: 4,
    min_jump_percent: 5,
    max_jump_percent: 30,
    min_fall_percent: 10,
    max_fall_percent: 50,
};

/// Errors raised by board validation and override parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("board size must be a multiple of 10 between 10 and 1000 (got {size})")]
    InvalidSize { size: u32 },
    #[error("malformed hazard pair '{pair}' (expected 'from:to')")]
    MalformedPair { pair: String },
    #[error("hazard override rejected: {}", failures.join("; "))]
    OverrideRejected { failures: Vec<String> },
}

/// Immutable hazard map for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BoardLayout {
    pub total_squares: Square,
    pub snakes: BTreeMap<Square, Square>,
    pub ladders: BTreeMap<Square, Square>,
}

impl BoardLayout {
    /// The finish square.
    #[must_use]
    pub const fn finish(&self) -> Square {
        self.total_squares
    }

    /// Hazard starting at `square`, if any.
    #[must_use]
    pub fn hazard_at(&self, square: Square) -> Option<(HazardKind, Square)> {
        if let Some(&dest) = self.snakes.get(&square) {
            return Some((HazardKind::Snake, dest));
        }
        self.ladders
            .get(&square)
            .map(|&dest| (HazardKind::Ladder, dest))
    }

    /// The original fixed 100-square layout. Shipped data, not validated
    /// input: it keeps the traditional ladder on square 1, which generated
    /// and hand-authored boards never get.
    #[must_use]
    pub fn classic() -> Self {
        let snakes = [
            (16, 6),
            (47, 26),
            (49, 11),
            (56, 53),
            (62, 19),
            (64, 60),
            (87, 24),
            (93, 73),
            (95, 75),
            (98, 78),
        ];
        let ladders = [
            (1, 38),
            (4, 14),
            (9, 31),
            (21, 42),
            (28, 84),
            (36, 44),
            (51, 67),
            (71, 91),
            (80, 99),
        ];
        Self {
            total_squares: 100,
            snakes: snakes.into_iter().collect(),
            ladders: ladders.into_iter().collect(),
        }
    }
}

/// Placed-vs-targeted counts reported by generation for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlacementReport {
    pub snakes_placed: usize,
    pub snakes_target: usize,
    pub ladders_placed: usize,
    pub ladders_target: usize,
}

impl PlacementReport {
    /// Whether every targeted hazard found a home.
    #[must_use]
    pub const fn met_targets(&self) -> bool {
        self.snakes_placed == self.snakes_target && self.ladders_placed == self.ladders_target
    }
}

/// Validate a board size: multiple of 10 in `10..=1000`.
///
/// # Errors
///
/// Returns `BoardError::InvalidSize` when out of range or not a multiple
/// of the row width.
pub fn validate_board_size(total_squares: Square) -> Result<(), BoardError> {
    if total_squares < MIN_BOARD_SQUARES
        || total_squares > MAX_BOARD_SQUARES
        || total_squares % ROW_WIDTH != 0
    {
        return Err(BoardError::InvalidSize {
            size: u32::from(total_squares),
        });
    }
    Ok(())
}

/// Generate a hazard map for `total_squares` under `preset`.
///
/// Best-effort: a hazard that cannot be placed within the attempt budget
/// is skipped, and the shortfall is visible in the returned report. The
/// board size is assumed to be validated.
pub fn generate<R: Rng>(
    total_squares: Square,
    preset: &DifficultyPreset,
    rng: &mut R,
) -> (BoardLayout, PlacementReport) {
    let rows = total_squares / ROW_WIDTH;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let snakes_target = (preset.snakes_per_row * f32::from(rows)).round().max(0.0) as usize;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let ladders_target = (preset.ladders_per_row * f32::from(rows)).round().max(0.0) as usize;

    let mut placement = Placement::new(total_squares, rows, preset.max_any_per_row);
    let mut layout = BoardLayout {
        total_squares,
        ..BoardLayout::default()
    };

    let mut snakes_placed = 0;
    for _ in 0..snakes_target {
        if let Some((from, to)) = placement.place(HazardKind::Snake, preset, rng) {
            layout.snakes.insert(from, to);
            snakes_placed += 1;
        }
    }

    let mut ladders_placed = 0;
    for _ in 0..ladders_target {
        if let Some((from, to)) = placement.place(HazardKind::Ladder, preset, rng) {
            layout.ladders.insert(from, to);
            ladders_placed += 1;
        }
    }

    let report = PlacementReport {
        snakes_placed,
        snakes_target,
        ladders_placed,
        ladders_target,
    };
    if report.met_targets() {
        debug!(
            "generated {snakes_placed} snakes and {ladders_placed} ladders on {total_squares} squares"
        );
    } else {
        warn!(
            "hazard shortfall: {snakes_placed}/{snakes_target} snakes, \
             {ladders_placed}/{ladders_target} ladders on {total_squares} squares"
        );
    }
    (layout, report)
}

/// Shared bookkeeping for sequential hazard placement. Placed hazards are
/// recorded immediately so later placements see them as used squares.
struct Placement {
    total_squares: Square,
    rows: u16,
    max_any_per_row: u8,
    /// Squares claimed as a hazard start (plus square 1 and the finish).
    starts: BTreeSet<Square>,
    /// Squares claimed as a hazard destination.
    destinations: BTreeSet<Square>,
    per_row: Vec<u8>,
}

impl Placement {
    fn new(total_squares: Square, rows: u16, max_any_per_row: u8) -> Self {
        Self {
            total_squares,
            rows,
            max_any_per_row,
            starts: BTreeSet::from([1, total_squares]),
            destinations: BTreeSet::new(),
            per_row: vec![0; usize::from(rows)],
        }
    }

    fn used(&self, square: Square) -> bool {
        self.starts.contains(&square) || self.destinations.contains(&square)
    }

    fn record(&mut self, from: Square, to: Square) {
        self.starts.insert(from);
        self.destinations.insert(to);
        self.per_row[usize::from((from - 1) / ROW_WIDTH)] += 1;
    }

    /// Place one hazard: a strict first pass requiring an unused
    /// destination, then a relaxed pass that may reuse destinations and
    /// clamps the length to the widest edge-safe value when the admissible
    /// range is empty. Returns `None` when both passes exhaust their
    /// attempt budget.
    fn place<R: Rng>(
        &mut self,
        kind: HazardKind,
        preset: &DifficultyPreset,
        rng: &mut R,
    ) -> Option<(Square, Square)> {
        for relaxed in [false, true] {
            for _ in 0..PLACEMENT_ATTEMPTS_PER_PASS {
                let Some(from) = self.pick_start(kind, rng) else {
                    continue;
                };
                let Some(to) = self.pick_destination(kind, preset, from, relaxed, rng) else {
                    continue;
                };
                self.record(from, to);
                return Some((from, to));
            }
        }
        None
    }

    fn pick_start<R: Rng>(&self, kind: HazardKind, rng: &mut R) -> Option<Square> {
        let row = match kind {
            // Snakes exclude the first row unless the board is one row tall.
            HazardKind::Snake => {
                let min_row = u16::from(self.rows > 1);
                rng.gen_range(min_row..self.rows)
            }
            // Ladders exclude the last row unless the board is one row tall.
            HazardKind::Ladder => {
                if self.rows > 1 {
                    rng.gen_range(0..self.rows - 1)
                } else {
                    0
                }
            }
        };
        let from = row * ROW_WIDTH + 1 + rng.gen_range(0..ROW_WIDTH);
        if self.used(from) {
            return None;
        }
        if self.per_row[usize::from(row)] >= self.max_any_per_row {
            return None;
        }
        Some(from)
    }

    fn pick_destination<R: Rng>(
        &self,
        kind: HazardKind,
        preset: &DifficultyPreset,
        from: Square,
        relaxed: bool,
        rng: &mut R,
    ) -> Option<Square> {
        let (min_pct, max_pct) = match kind {
            HazardKind::Snake => (preset.min_fall_percent, preset.max_fall_percent),
            HazardKind::Ladder => (preset.min_jump_percent, preset.max_jump_percent),
        };
        let min_len = percent_ceil(self.total_squares, min_pct).max(1);
        let max_len = percent_floor(self.total_squares, max_pct).max(1);

        // Clamp so the hazard cannot cross the board edge: snakes cannot
        // pass below square 1, ladders cannot land on or past the finish.
        let edge_max = match kind {
            HazardKind::Snake => from - 1,
            HazardKind::Ladder => (self.total_squares - from).saturating_sub(1),
        };
        let effective_max = max_len.min(edge_max);

        let length = if effective_max < min_len {
            if !relaxed || edge_max == 0 {
                return None;
            }
            // Relaxed pass: clamp to the widest edge-safe length.
            edge_max.min(max_len)
        } else {
            rng.gen_range(min_len..=effective_max)
        };

        let to = match kind {
            HazardKind::Snake => from - length,
            HazardKind::Ladder => from + length,
        };
        debug_assert!(to >= 1 && to < self.total_squares && to != from);

        // A destination may never be a square already claimed as a start;
        // only the relaxed pass may reuse an existing destination.
        if self.starts.contains(&to) {
            return None;
        }
        if !relaxed && self.destinations.contains(&to) {
            return None;
        }
        Some(to)
    }
}

const fn percent_ceil(total: Square, percent: u8) -> Square {
    (total as u32 * percent as u32).div_ceil(100) as Square
}

const fn percent_floor(total: Square, percent: u8) -> Square {
    (total as u32 * percent as u32 / 100) as Square
}

/// Parse hand-authored hazard text of the form `from:to, from:to, ...`.
/// Surrounding braces from older settings exports are tolerated.
///
/// # Errors
///
/// Returns `BoardError::MalformedPair` for any entry that is not two
/// integers separated by a colon.
pub fn parse_hazard_text(text: &str) -> Result<BTreeMap<Square, Square>, BoardError> {
    let trimmed = text
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim();
    let mut map = BTreeMap::new();
    if trimmed.is_empty() {
        return Ok(map);
    }
    for pair in trimmed.split(',') {
        let malformed = || BoardError::MalformedPair {
            pair: pair.trim().to_string(),
        };
        let (from, to) = pair.split_once(':').ok_or_else(malformed)?;
        let from: Square = from.trim().parse().map_err(|_| malformed())?;
        let to: Square = to.trim().parse().map_err(|_| malformed())?;
        map.insert(from, to);
    }
    Ok(map)
}

/// Render a hazard map back to the `from:to, ...` text form.
#[must_use]
pub fn format_hazards(map: &BTreeMap<Square, Square>) -> String {
    map.iter()
        .map(|(from, to)| format!("{from}:{to}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate caller-supplied hazard maps. Returns every violation as a
/// human-readable message; an empty list means the override is acceptable.
/// Rejection is all-or-nothing — no partial application.
#[must_use]
pub fn validate_override(
    snakes: &BTreeMap<Square, Square>,
    ladders: &BTreeMap<Square, Square>,
    total_squares: Square,
) -> Vec<String> {
    let mut failures = Vec::new();
    let mut starts: BTreeSet<Square> = BTreeSet::new();
    let mut used: BTreeSet<Square> = BTreeSet::new();

    let mut check = |kind: HazardKind, from: Square, to: Square| {
        let label = kind.as_str();
        if from < 1 || from > total_squares {
            failures.push(format!(
                "{label} start {from} is out of bounds (1-{total_squares})"
            ));
        }
        if to < 1 || to > total_squares {
            failures.push(format!(
                "{label} end {to} is out of bounds (1-{total_squares})"
            ));
        }
        match kind {
            HazardKind::Snake if to >= from => {
                failures.push(format!("snake {from}:{to} must go down, not up"));
            }
            HazardKind::Ladder if to <= from => {
                failures.push(format!("ladder {from}:{to} must go up, not down"));
            }
            _ => {}
        }
        if from == 1 {
            failures.push(format!("{label} cannot start on square 1"));
        }
        if from == total_squares {
            failures.push(format!(
                "{label} cannot start on the finish square {total_squares}"
            ));
        }
        if kind == HazardKind::Ladder && to == total_squares {
            failures.push(format!(
                "ladder cannot land on the finish square {total_squares}"
            ));
        }
        if starts.contains(&from) {
            failures.push(format!(
                "square {from} is used as the start of multiple hazards"
            ));
        }
        if !starts.contains(&from) && used.contains(&from) {
            failures.push(format!(
                "square {from} cannot be both a destination and a start"
            ));
        }
        if used.contains(&to) {
            failures.push(format!("square {to} is used by more than one hazard"));
        }
        starts.insert(from);
        used.insert(from);
        used.insert(to);
    };

    for (&from, &to) in snakes {
        check(HazardKind::Snake, from, to);
    }
    for (&from, &to) in ladders {
        check(HazardKind::Ladder, from, to);
    }
    failures
}

/// Build a layout from caller-supplied maps, validating the invariants.
///
/// # Errors
///
/// Returns `BoardError::OverrideRejected` carrying every violation when
/// validation fails; no partial layout is produced.
pub fn apply_override(
    snakes: BTreeMap<Square, Square>,
    ladders: BTreeMap<Square, Square>,
    total_squares: Square,
) -> Result<BoardLayout, BoardError> {
    validate_board_size(total_squares)?;
    let failures = validate_override(&snakes, &ladders, total_squares);
    if !failures.is_empty() {
        return Err(BoardError::OverrideRejected { failures });
    }
    Ok(BoardLayout {
        total_squares,
        snakes,
        ladders,
    })
}
