//! Game-over detection and the advisory danger level.

use std::fmt;

use crate::grid::{Grid, GRID_WIDTH};
use crate::piece::PiecePair;

/// Rows from the top counted toward the danger level.
pub const DANGER_ROWS: usize = 3;

/// Danger level at which callers should warn.
pub const DANGER_WARNING_LEVEL: usize = 3;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameOverReason {
    /// A settled cell sits in the spawn row.
    TopReached { column: usize },
    /// The freshly promoted pair overlaps the stack.
    SpawnBlocked,
}

impl fmt::Display for GameOverReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameOverReason::TopReached { column } => write!(f, "stack reached the top (column {column})"),
            GameOverReason::SpawnBlocked => write!(f, "new pair cannot be placed"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verdict {
    Normal,
    Danger(usize),
    Over(GameOverReason),
}

impl Verdict {
    pub fn is_over(&self) -> bool {
        matches!(self, Verdict::Over(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Normal => write!(f, "normal"),
            Verdict::Danger(level) => write!(f, "danger level {level}: cells stacked near the top"),
            Verdict::Over(reason) => reason.fmt(f),
        }
    }
}

/// First column with a cell in row 0.
pub fn top_reached(grid: &Grid) -> Option<usize> {
    (0..GRID_WIDTH).find(|&x| !grid.is_empty(x as i16, 0))
}

pub fn check_game_over(grid: &Grid) -> bool {
    top_reached(grid).is_some()
}

/// True when a pair sitting in the spawn row overlaps settled cells.
pub fn spawn_blocked(grid: &Grid, pair: &PiecePair) -> bool {
    pair.position.y == 0 && !grid.can_place_pair(pair)
}

/// Occupied cells across the top `DANGER_ROWS` rows.
pub fn danger_level(grid: &Grid) -> usize {
    grid.cells()
        .filter(|cell| (cell.position.y as usize) < DANGER_ROWS)
        .count()
}

pub fn evaluate(grid: &Grid, falling: Option<&PiecePair>) -> Verdict {
    if let Some(column) = top_reached(grid) {
        return Verdict::Over(GameOverReason::TopReached { column });
    }
    if falling.is_some_and(|pair| spawn_blocked(grid, pair)) {
        return Verdict::Over(GameOverReason::SpawnBlocked);
    }
    match danger_level(grid) {
        level if level >= DANGER_WARNING_LEVEL => Verdict::Danger(level),
        _ => Verdict::Normal,
    }
}
