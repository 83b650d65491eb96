use std::collections::HashSet;

use crate::grid::ConnectedGroup;

// ============================================================================
// Scoring tables
// ============================================================================

pub const SCORE_PER_CELL: u64 = 10;

/// Chain multiplier by chain level, 1-based. Levels past the end use the last entry.
pub const CHAIN_MULTIPLIERS: [u64; 10] = [1, 8, 16, 32, 64, 96, 128, 160, 192, 224];

pub fn chain_multiplier(chain_level: u32) -> u64 {
    match chain_level {
        0 => 0,
        level => CHAIN_MULTIPLIERS[(level as usize).min(CHAIN_MULTIPLIERS.len()) - 1],
    }
}

/// Bonus for the number of distinct colors cleared at once.
pub fn color_bonus(color_count: usize) -> u64 {
    match color_count {
        2 => 3,
        3 => 6,
        4 => 12,
        5 => 24,
        _ => 0,
    }
}

pub fn group_bonus(cleared_count: usize) -> u64 {
    if cleared_count >= 4 {
        (cleared_count as u64 - 4) * 2
    } else {
        0
    }
}

/// `cleared * 10 * chain_multiplier * max(1, 1 + color_bonus + group_bonus)`.
///
/// `group_count` is accepted alongside the other counts but does not weigh in.
pub fn calculate_score(cleared_count: usize, chain_level: u32, color_count: usize, _group_count: usize) -> u64 {
    if cleared_count == 0 {
        return 0;
    }
    let base = cleared_count as u64 * SCORE_PER_CELL;
    let bonus = 1 + color_bonus(color_count) + group_bonus(cleared_count);
    base * chain_multiplier(chain_level) * bonus.max(1)
}

/// Score for one elimination step across all of its groups.
pub fn chain_score(groups: &[ConnectedGroup], chain_level: u32) -> u64 {
    if groups.is_empty() {
        return 0;
    }
    let cleared: usize = groups.iter().map(ConnectedGroup::len).sum();
    let colors = groups.iter().map(|g| g.color).collect::<HashSet<_>>().len();
    calculate_score(cleared, chain_level, colors, groups.len())
}

/// `1234567` -> `"1,234,567"`.
pub fn format_score(score: u64) -> String {
    let digits = score.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// ============================================================================
// Score state
// ============================================================================

/// Running total. Only grows, except on `reset`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ScoreState {
    total: u64,
}

impl ScoreState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Ignores zero.
    pub fn add(&mut self, points: u64) {
        if points > 0 {
            self.total = self.total.saturating_add(points);
        }
    }

    pub fn reset(&mut self) {
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Color, Position};

    fn group(color: Color, len: usize) -> ConnectedGroup {
        ConnectedGroup {
            color,
            positions: (0..len as i16).map(|y| Position::new(0, y)).collect(),
        }
    }

    #[test]
    fn multiplier_clamps_past_table() {
        assert_eq!(chain_multiplier(0), 0);
        assert_eq!(chain_multiplier(1), 1);
        assert_eq!(chain_multiplier(10), 224);
        assert_eq!(chain_multiplier(42), 224);
    }

    #[test]
    fn unlisted_color_counts_get_no_bonus() {
        assert_eq!(color_bonus(0), 0);
        assert_eq!(color_bonus(1), 0);
        assert_eq!(color_bonus(6), 0);
    }

    #[test]
    fn chain_score_counts_distinct_colors() {
        let same = [group(Color::Red, 4), group(Color::Red, 4)];
        // 80 * 1 * (1 + 0 + 8)
        assert_eq!(chain_score(&same, 1), 720);

        let mixed = [group(Color::Red, 4), group(Color::Blue, 4)];
        // 80 * 1 * (1 + 3 + 8)
        assert_eq!(chain_score(&mixed, 1), 960);
        assert_eq!(chain_score(&[], 3), 0);
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(format_score(0), "0");
        assert_eq!(format_score(999), "999");
        assert_eq!(format_score(1000), "1,000");
        assert_eq!(format_score(1_234_567), "1,234,567");
    }
}
