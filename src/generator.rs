use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::grid::Color;
use crate::piece::{PiecePair, ROTATION_DOWN};

// ============================================================================
// Configuration
// ============================================================================

pub const SPAWN_X: i16 = 2;
pub const SPAWN_Y: i16 = 0;

/// Recent colors remembered for balancing.
pub const HISTORY_LEN: usize = 8;

/// Share of draws that ignore history entirely.
const FLAT_DRAW_CHANCE: f64 = 0.2;

/// Rerolls allowed when a mixed pair comes out single-colored.
const SUB_COLOR_RETRIES: usize = 3;

/// Pairs dealt between obstacle pairs at difficulty 0.
pub const OBSTACLE_THRESHOLD: u32 = 25;

// ============================================================================
// Pair Provider Trait
// ============================================================================

/// Source of pair colors. The generator decides when an obstacle pair is due;
/// the provider decides what it looks like.
pub trait PairProvider {
    fn next_colors(&mut self, difficulty: f32) -> (Color, Color);
    fn next_obstacle_colors(&mut self, difficulty: f32) -> (Color, Color);
    fn reset(&mut self) {}
}

/// Recency-weighted random colors. Colors seen less often in the last
/// `HISTORY_LEN` draws are more likely to come up.
pub struct RandomPairProvider {
    rng: StdRng,
    history: VecDeque<Color>,
}

impl RandomPairProvider {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            history: VecDeque::with_capacity(HISTORY_LEN + 1),
        }
    }

    pub fn history(&self) -> impl Iterator<Item = Color> + '_ {
        self.history.iter().copied()
    }

    fn flat_color(&mut self) -> Color {
        Color::NORMAL[self.rng.gen_range(0..Color::NORMAL.len())]
    }

    fn next_color(&mut self) -> Color {
        if self.rng.gen::<f64>() < FLAT_DRAW_CHANCE {
            return self.flat_color();
        }

        let color = if self.history.is_empty() {
            self.flat_color()
        } else {
            let counts = Color::NORMAL.map(|c| self.history.iter().filter(|&&h| h == c).count() as u32);
            let max_count = counts.iter().copied().max().unwrap_or(0);
            let weights = counts.map(|count| max_count - count + 1);
            let total: u32 = weights.iter().sum();

            let mut roll = self.rng.gen_range(0..total);
            let mut picked = Color::NORMAL[Color::NORMAL.len() - 1];
            for (color, weight) in Color::NORMAL.into_iter().zip(weights) {
                if roll < weight {
                    picked = color;
                    break;
                }
                roll -= weight;
            }
            picked
        };

        self.history.push_back(color);
        if self.history.len() > HISTORY_LEN {
            self.history.pop_front();
        }
        color
    }
}

impl Default for RandomPairProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PairProvider for RandomPairProvider {
    fn next_colors(&mut self, difficulty: f32) -> (Color, Color) {
        let main = self.next_color();
        let same_color_chance = 0.3 - f64::from(difficulty) * 0.2;
        if self.rng.gen::<f64>() < same_color_chance {
            return (main, main);
        }

        let mut sub = self.next_color();
        let mut attempts = 0;
        while sub == main && attempts < SUB_COLOR_RETRIES {
            sub = self.next_color();
            attempts += 1;
        }
        (main, sub)
    }

    fn next_obstacle_colors(&mut self, difficulty: f32) -> (Color, Color) {
        if self.rng.gen::<f64>() < f64::from(difficulty) {
            (Color::Obstacle, Color::Obstacle)
        } else {
            (Color::Obstacle, self.next_color())
        }
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}

/// Replays a fixed list of color pairs, cycling when exhausted.
pub struct SequencePairProvider {
    pairs: Vec<(Color, Color)>,
    index: usize,
}

impl SequencePairProvider {
    /// # Panics
    ///
    /// If `pairs` is empty.
    pub fn new(pairs: Vec<(Color, Color)>) -> Self {
        assert!(!pairs.is_empty(), "pair sequence must not be empty");
        Self { pairs, index: 0 }
    }
}

impl PairProvider for SequencePairProvider {
    fn next_colors(&mut self, _difficulty: f32) -> (Color, Color) {
        let pair = self.pairs[self.index % self.pairs.len()];
        self.index += 1;
        pair
    }

    /// Next scripted pair with its pivot swapped for an obstacle.
    fn next_obstacle_colors(&mut self, difficulty: f32) -> (Color, Color) {
        let (_, sub) = self.next_colors(difficulty);
        (Color::Obstacle, sub)
    }

    fn reset(&mut self) {
        self.index = 0;
    }
}

// ============================================================================
// Piece Generator
// ============================================================================

/// Deals pairs with a one-pair lookahead and injects obstacle pairs on a
/// difficulty-scaled schedule.
pub struct PieceGenerator {
    provider: Box<dyn PairProvider>,
    next: PiecePair,
    difficulty: f32,
    obstacle_counter: u32,
    obstacle_threshold: u32,
}

impl PieceGenerator {
    pub fn new(provider: Box<dyn PairProvider>, difficulty: f32) -> Self {
        let mut provider = provider;
        let difficulty = difficulty.clamp(0.0, 1.0);
        let next = Self::pair_from(provider.next_colors(difficulty));
        Self {
            provider,
            next,
            difficulty,
            obstacle_counter: 0,
            obstacle_threshold: OBSTACLE_THRESHOLD,
        }
    }

    pub fn seeded(seed: u64, difficulty: f32) -> Self {
        Self::new(Box::new(RandomPairProvider::with_seed(seed)), difficulty)
    }

    fn pair_from((pivot, satellite): (Color, Color)) -> PiecePair {
        PiecePair::with_rotation(pivot, satellite, SPAWN_X, SPAWN_Y, ROTATION_DOWN)
    }

    pub fn next(&self) -> &PiecePair {
        &self.next
    }

    pub fn difficulty(&self) -> f32 {
        self.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: f32) {
        self.difficulty = difficulty.clamp(0.0, 1.0);
    }

    pub fn obstacle_counter(&self) -> u32 {
        self.obstacle_counter
    }

    pub fn set_obstacle_threshold(&mut self, threshold: u32) {
        self.obstacle_threshold = threshold;
    }

    /// Pairs dealt before an obstacle pair is queued at the current difficulty.
    pub fn effective_obstacle_threshold(&self) -> u32 {
        let reduction = (self.difficulty * 10.0) as u32;
        self.obstacle_threshold.saturating_sub(reduction)
    }

    /// A fresh normal pair at the spawn point, outside the lookahead.
    pub fn create_random_pair(&mut self, x: i16, y: i16) -> PiecePair {
        let (pivot, satellite) = self.provider.next_colors(self.difficulty);
        PiecePair::new(pivot, satellite, x, y)
    }

    /// The pair that opens a game. Does not count toward the obstacle schedule.
    pub fn spawn_first(&mut self) -> PiecePair {
        Self::pair_from(self.provider.next_colors(self.difficulty))
    }

    /// Promotes the lookahead pair to spawn position (satellite below pivot)
    /// and queues a replacement, which is an obstacle pair once enough pairs
    /// have been dealt.
    pub fn advance_to_next(&mut self) -> PiecePair {
        self.obstacle_counter += 1;
        let colors = if self.obstacle_counter >= self.effective_obstacle_threshold() {
            self.obstacle_counter = 0;
            self.provider.next_obstacle_colors(self.difficulty)
        } else {
            self.provider.next_colors(self.difficulty)
        };

        let mut promoted = std::mem::replace(&mut self.next, Self::pair_from(colors));
        promoted.rotation = ROTATION_DOWN;
        promoted.set_position(SPAWN_X, SPAWN_Y);
        promoted
    }

    /// Clears history and the obstacle schedule, then re-deals the lookahead.
    pub fn reset(&mut self) {
        self.provider.reset();
        self.obstacle_counter = 0;
        self.next = Self::pair_from(self.provider.next_colors(self.difficulty));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded() {
        let mut provider = RandomPairProvider::with_seed(7);
        for _ in 0..100 {
            provider.next_colors(0.5);
        }
        assert!(provider.history().count() <= HISTORY_LEN);
        assert!(provider.history().all(|c| !c.is_obstacle()));
    }

    #[test]
    fn same_seed_same_pairs() {
        let mut a = RandomPairProvider::with_seed(42);
        let mut b = RandomPairProvider::with_seed(42);
        for _ in 0..50 {
            assert_eq!(a.next_colors(0.3), b.next_colors(0.3));
        }
    }

    #[test]
    fn starved_color_is_favoured() {
        let mut provider = RandomPairProvider::with_seed(3);
        provider.history.extend([Color::Red; HISTORY_LEN]);
        let mut red = 0;
        for _ in 0..200 {
            if provider.next_color() == Color::Red {
                red += 1;
            }
            provider.history.clear();
            provider.history.extend([Color::Red; HISTORY_LEN]);
        }
        // Weighted draws give red 1/28; flat draws 1/4.
        assert!(red < 40, "red drawn {red} times");
    }

    fn same_color_rate(difficulty: f32) -> f64 {
        let mut provider = RandomPairProvider::with_seed(2024);
        let draws = 20_000;
        let same = (0..draws)
            .filter(|_| {
                let (main, sub) = provider.next_colors(difficulty);
                main == sub
            })
            .count();
        same as f64 / draws as f64
    }

    #[test]
    fn same_color_pairs_thin_out_with_difficulty() {
        let easy = same_color_rate(0.0);
        let hard = same_color_rate(1.0);
        assert!((0.27..0.33).contains(&easy), "difficulty 0: {easy}");
        assert!((0.08..0.12).contains(&hard), "difficulty 1: {hard}");
    }

    #[test]
    fn random_pair_lands_where_asked() {
        let mut generator = PieceGenerator::seeded(5, 0.0);
        let lookahead = generator.next().clone();

        let pair = generator.create_random_pair(3, 4);
        assert_eq!(pair.rotation, 0);
        assert_eq!(pair.positions()[0], crate::grid::Position::new(3, 4));
        assert!(!pair.colors().0.is_obstacle());
        assert_eq!(generator.next(), &lookahead);
        assert_eq!(generator.obstacle_counter(), 0);
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn empty_sequence_is_rejected() {
        SequencePairProvider::new(Vec::new());
    }

    #[test]
    fn sequence_cycles() {
        let mut provider = SequencePairProvider::new(vec![(Color::Red, Color::Blue)]);
        assert_eq!(provider.next_colors(0.0), (Color::Red, Color::Blue));
        assert_eq!(provider.next_colors(0.0), (Color::Red, Color::Blue));
    }

    #[test]
    fn full_difficulty_obstacles_are_doubled() {
        let mut provider = RandomPairProvider::with_seed(11);
        for _ in 0..20 {
            assert_eq!(provider.next_obstacle_colors(1.0), (Color::Obstacle, Color::Obstacle));
        }
    }

    #[test]
    fn zero_difficulty_obstacles_carry_one_color() {
        let mut provider = RandomPairProvider::with_seed(11);
        for _ in 0..20 {
            let (pivot, sub) = provider.next_obstacle_colors(0.0);
            assert_eq!(pivot, Color::Obstacle);
            assert!(!sub.is_obstacle());
        }
    }
}
