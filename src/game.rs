use std::f32::consts::TAU;

use crate::config::SimConfig;
use crate::danger::{self, GameOverReason, Verdict};
use crate::generator::{PairProvider, PieceGenerator, RandomPairProvider};
use crate::grid::{Cell, Color, ConnectedGroup, Grid, Position, GRID_HEIGHT, GRID_WIDTH};
use crate::piece::PiecePair;
use crate::score::{self, ScoreState};

// ============================================================================
// Configuration
// ============================================================================

/// Chain banner animation advance per frame, in radians.
const CHAIN_PHASE_STEP: f32 = 0.2;

/// Frames a score gain stays flagged for the renderer.
pub const SCORE_POPUP_FRAMES: u32 = 60;

/// Frames per on/off half-cycle of cells about to be erased.
const FLASH_FRAMES: u32 = 4;

/// Banner level after which the debug chain animation wraps back to 1.
const DEBUG_CHAIN_WRAP: u32 = 5;

const DEBUG_ELIMINATION_CELLS: [(i16, i16); 4] = [(0, 8), (0, 9), (1, 8), (1, 9)];

// ============================================================================
// Types
// ============================================================================

/// Simulation phase while playing. Input and falling only run in `Falling`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Falling,
    Eliminating,
    Gravity,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameState {
    Menu,
    Playing,
    GameOver,
}

impl GameState {
    pub fn can_transition_to(self, target: GameState) -> bool {
        matches!(
            (self, target),
            (GameState::Menu, GameState::Playing)
                | (GameState::Playing, GameState::GameOver)
                | (GameState::Playing, GameState::Menu)
                | (GameState::GameOver, GameState::Menu)
                | (GameState::GameOver, GameState::Playing)
        )
    }
}

/// Test hooks, honoured only when `SimConfig::debug` is set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DebugCommand {
    TestGravity,
    TestConnection,
    TestElimination,
    TestChainAnimation,
}

/// Intents for one frame. Each flag means "fire this frame"; key repeat is
/// the caller's job. `soft_drop_held` selects the fast fall interval.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct FrameInput {
    pub move_left: bool,
    pub move_right: bool,
    pub rotate_cw: bool,
    pub rotate_ccw: bool,
    pub fast_drop: bool,
    pub soft_drop_held: bool,
    pub start: bool,
    pub restart: bool,
    pub quit: bool,
    pub debug: Option<DebugCommand>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum GameEvent {
    PieceMoved,
    PieceRotated,
    PieceLanded,
    /// First elimination of a chain.
    GroupCleared { cells: usize, points: u64 },
    /// Elimination at chain level 2 or higher.
    ChainCleared { level: u32, cells: usize, points: u64 },
    ChainEnded { level: u32, total: u64 },
    GameOver(GameOverReason),
    GameRestarted,
    StateChanged { from: GameState, to: GameState },
    ConnectionReport { groups: usize, erasable: usize },
    QuitRequested,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ChainState {
    /// 0 while inactive.
    pub level: u32,
    pub active: bool,
    pub total_score: u64,
}

impl ChainState {
    fn advance(&mut self) -> u32 {
        self.level = if self.active { self.level + 1 } else { 1 };
        self.active = true;
        self.level
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct ChainBanner {
    pub visible: bool,
    pub level: u32,
    pub timer: u32,
    pub animation_phase: f32,
}

impl ChainBanner {
    fn show(&mut self, level: u32) {
        *self = Self {
            visible: true,
            level,
            timer: 0,
            animation_phase: 0.0,
        };
    }

    fn hide(&mut self) {
        self.visible = false;
        self.timer = 0;
    }
}

/// Read-only view handed to the renderer each frame.
#[derive(Clone, PartialEq, Debug)]
pub struct Snapshot {
    pub state: GameState,
    pub phase: Phase,
    /// Settled cells, `cells[y][x]`.
    pub cells: [[Option<Color>; GRID_WIDTH]; GRID_HEIGHT],
    pub piece: Option<[(Position, Color); 2]>,
    pub next: (Color, Color),
    pub chain_level: u32,
    pub chain_visible: bool,
    pub chain_animation_phase: f32,
    pub score: u64,
    pub score_gain: u64,
    pub score_popup_active: bool,
    pub eliminating: bool,
    pub flashing: Vec<Position>,
    pub flash_on: bool,
    pub danger_level: usize,
    pub game_over_reason: Option<GameOverReason>,
}

// ============================================================================
// Simulation Clock
// ============================================================================

/// Sole owner of grid, falling pair, score and chain. Advanced one frame at
/// a time through `tick`.
pub struct SimulationClock {
    config: SimConfig,
    state: GameState,
    frames_in_state: u32,
    phase: Phase,
    grid: Grid,
    falling: Option<PiecePair>,
    generator: PieceGenerator,
    score: ScoreState,
    chain: ChainState,
    banner: ChainBanner,
    pending_groups: Vec<ConnectedGroup>,
    fall_timer: u32,
    elimination_timer: u32,
    gravity_timer: u32,
    score_gain: u64,
    score_popup_timer: u32,
    game_over_reason: Option<GameOverReason>,
    events: Vec<GameEvent>,
}

impl SimulationClock {
    pub fn new(config: SimConfig) -> Self {
        let provider: Box<dyn PairProvider> = match config.seed {
            Some(seed) => Box::new(RandomPairProvider::with_seed(seed)),
            None => Box::new(RandomPairProvider::new()),
        };
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: SimConfig, provider: Box<dyn PairProvider>) -> Self {
        let mut generator = PieceGenerator::new(provider, config.difficulty);
        let falling = Some(generator.spawn_first());
        Self {
            config,
            state: GameState::Playing,
            frames_in_state: 0,
            phase: Phase::Falling,
            grid: Grid::new(),
            falling,
            generator,
            score: ScoreState::new(),
            chain: ChainState::default(),
            banner: ChainBanner::default(),
            pending_groups: Vec::new(),
            fall_timer: 0,
            elimination_timer: 0,
            gravity_timer: 0,
            score_gain: 0,
            score_popup_timer: 0,
            game_over_reason: None,
            events: Vec::new(),
        }
    }

    /// Starts from a prepared playfield with `piece` already falling.
    pub fn with_grid(config: SimConfig, grid: Grid, piece: PiecePair) -> Self {
        let mut clock = Self::new(config);
        clock.grid = grid;
        clock.falling = Some(piece);
        clock
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn frames_in_state(&self) -> u32 {
        self.frames_in_state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn falling(&self) -> Option<&PiecePair> {
        self.falling.as_ref()
    }

    pub fn next_pair(&self) -> &PiecePair {
        self.generator.next()
    }

    pub fn generator(&self) -> &PieceGenerator {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut PieceGenerator {
        &mut self.generator
    }

    pub fn score(&self) -> u64 {
        self.score.total()
    }

    pub fn chain(&self) -> &ChainState {
        &self.chain
    }

    pub fn banner(&self) -> &ChainBanner {
        &self.banner
    }

    /// Groups found by the last elimination check, waiting to be erased.
    pub fn pending_groups(&self) -> &[ConnectedGroup] {
        &self.pending_groups
    }

    pub fn game_over_reason(&self) -> Option<GameOverReason> {
        self.game_over_reason
    }

    /// True while elimination or gravity is running.
    pub fn is_systems_active(&self) -> bool {
        self.phase != Phase::Falling
    }

    pub fn check_game_over(&self) -> bool {
        danger::check_game_over(&self.grid)
    }

    pub fn danger_level(&self) -> usize {
        danger::danger_level(&self.grid)
    }

    pub fn evaluate(&self) -> Verdict {
        danger::evaluate(&self.grid, self.falling.as_ref())
    }

    pub fn set_difficulty(&mut self, difficulty: f32) {
        self.generator.set_difficulty(difficulty);
        self.config.difficulty = self.generator.difficulty();
    }

    /// Takes and clears all pending events
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------------
    // Frame entry point
    // ------------------------------------------------------------------------

    /// Advances one frame and returns what happened during it.
    pub fn tick(&mut self, input: &FrameInput) -> Vec<GameEvent> {
        self.frames_in_state = self.frames_in_state.saturating_add(1);

        match self.state {
            GameState::Menu => {
                if input.start {
                    self.start();
                } else if input.quit {
                    self.events.push(GameEvent::QuitRequested);
                }
            }
            GameState::GameOver => {
                if input.restart {
                    self.restart();
                } else if input.quit {
                    self.return_to_menu();
                }
            }
            GameState::Playing => {
                if input.quit {
                    self.events.push(GameEvent::QuitRequested);
                } else if input.restart {
                    self.restart();
                } else {
                    self.tick_playing(input);
                }
            }
        }

        self.take_events()
    }

    fn tick_playing(&mut self, input: &FrameInput) {
        if let Verdict::Over(reason) = self.evaluate() {
            self.enter_game_over(reason);
            return;
        }

        if let Some(command) = input.debug.filter(|_| self.config.debug) {
            self.run_debug(command);
        }

        self.update_score_popup();
        self.update_elimination();
        self.update_gravity();
        self.update_banner();

        if self.phase == Phase::Falling {
            self.update_fall(input.soft_drop_held);
            self.handle_input(input);
        }
    }

    // ------------------------------------------------------------------------
    // Outer game state
    // ------------------------------------------------------------------------

    fn change_state(&mut self, to: GameState) -> bool {
        if !self.state.can_transition_to(to) {
            return false;
        }
        self.events.push(GameEvent::StateChanged {
            from: self.state,
            to,
        });
        self.state = to;
        self.frames_in_state = 0;
        true
    }

    /// Menu -> Playing with a fresh board.
    pub fn start(&mut self) -> bool {
        if self.state != GameState::Menu {
            return false;
        }
        self.reset_world();
        self.change_state(GameState::Playing)
    }

    /// New game from any state.
    pub fn restart(&mut self) {
        self.reset_world();
        if self.state != GameState::Playing {
            self.change_state(GameState::Playing);
        }
        self.events.push(GameEvent::GameRestarted);
    }

    pub fn return_to_menu(&mut self) -> bool {
        self.change_state(GameState::Menu)
    }

    fn reset_world(&mut self) {
        self.grid.clear();
        self.score.reset();
        self.chain.reset();
        self.banner = ChainBanner::default();
        self.pending_groups.clear();
        self.phase = Phase::Falling;
        self.fall_timer = 0;
        self.elimination_timer = 0;
        self.gravity_timer = 0;
        self.score_gain = 0;
        self.score_popup_timer = 0;
        self.game_over_reason = None;
        self.generator.reset();
        self.falling = Some(self.generator.spawn_first());
    }

    fn enter_game_over(&mut self, reason: GameOverReason) {
        self.chain.reset();
        self.banner.hide();
        self.pending_groups.clear();
        self.phase = Phase::Falling;
        self.falling = None;
        self.game_over_reason = Some(reason);
        self.change_state(GameState::GameOver);
        self.events.push(GameEvent::GameOver(reason));
    }

    // ------------------------------------------------------------------------
    // Falling
    // ------------------------------------------------------------------------

    fn accepts_input(&self) -> bool {
        self.state == GameState::Playing && self.phase == Phase::Falling
    }

    fn update_fall(&mut self, soft_drop_held: bool) {
        let can_fall = match &self.falling {
            Some(pair) => self.grid.can_move_pair(pair, 0, 1),
            None => return,
        };

        self.fall_timer += 1;
        let interval = if soft_drop_held {
            self.config.fast_fall_interval
        } else {
            self.config.fall_interval
        };
        if self.fall_timer < interval {
            return;
        }

        if can_fall {
            if let Some(pair) = self.falling.as_mut() {
                pair.move_by(0, 1);
            }
            self.fall_timer = 0;
        } else {
            self.fix_pair();
        }
    }

    fn handle_input(&mut self, input: &FrameInput) {
        if input.move_left {
            self.move_pair(-1);
        }
        if input.move_right {
            self.move_pair(1);
        }
        if input.rotate_cw {
            self.rotate_pair(true);
        }
        if input.rotate_ccw {
            self.rotate_pair(false);
        }
        if input.fast_drop {
            self.fast_drop();
        }
    }

    pub fn move_pair(&mut self, dx: i16) -> bool {
        if !self.accepts_input() {
            return false;
        }
        let Some(pair) = self.falling.as_mut() else {
            return false;
        };
        if !self.grid.can_move_pair(pair, dx, 0) {
            return false;
        }
        pair.move_by(dx, 0);
        self.events.push(GameEvent::PieceMoved);
        true
    }

    pub fn rotate_pair(&mut self, clockwise: bool) -> bool {
        if !self.accepts_input() {
            return false;
        }
        let Some(pair) = self.falling.as_mut() else {
            return false;
        };
        if !self.grid.rotate_with_kick(pair, clockwise) {
            return false;
        }
        self.events.push(GameEvent::PieceRotated);
        true
    }

    /// Moves the pair down one row right away and restarts the fall timer.
    pub fn fast_drop(&mut self) -> bool {
        if !self.accepts_input() {
            return false;
        }
        let Some(pair) = self.falling.as_mut() else {
            return false;
        };
        if !self.grid.can_move_pair(pair, 0, 1) {
            return false;
        }
        pair.move_by(0, 1);
        self.fall_timer = 0;
        self.events.push(GameEvent::PieceMoved);
        true
    }

    /// Writes the pair into the grid, starts elimination, then promotes the
    /// next pair. The promoted pair stays frozen until the board settles.
    fn fix_pair(&mut self) {
        let Some(pair) = self.falling.take() else {
            return;
        };
        let (pivot, satellite) = pair.into_cells();
        let (p, s) = (pivot.position, satellite.position);
        let placed_pivot = self.grid.place(p.x, p.y, pivot);
        let placed_satellite = self.grid.place(s.x, s.y, satellite);
        debug_assert!(placed_pivot && placed_satellite, "landed pair overlaps the stack");
        self.events.push(GameEvent::PieceLanded);

        self.begin_elimination_check();

        let next = self.generator.advance_to_next();
        let blocked = danger::spawn_blocked(&self.grid, &next);
        self.falling = Some(next);
        self.fall_timer = 0;

        if let Some(column) = danger::top_reached(&self.grid) {
            self.enter_game_over(GameOverReason::TopReached { column });
        } else if blocked {
            self.enter_game_over(GameOverReason::SpawnBlocked);
        }
    }

    // ------------------------------------------------------------------------
    // Elimination / gravity / chains
    // ------------------------------------------------------------------------

    fn begin_elimination_check(&mut self) {
        let groups = self.grid.find_erasable_groups();
        if groups.is_empty() {
            if self.chain.active {
                self.end_chain();
                self.phase = Phase::Falling;
            } else {
                self.chain.reset();
                self.start_gravity();
            }
            return;
        }

        let level = self.chain.advance();
        self.banner.show(level);
        self.pending_groups = groups;
        self.elimination_timer = 0;
        self.phase = Phase::Eliminating;
    }

    fn update_elimination(&mut self) {
        if self.phase != Phase::Eliminating {
            return;
        }
        self.elimination_timer += 1;
        if self.elimination_timer < self.config.elimination_interval {
            return;
        }
        self.elimination_timer = 0;

        let groups = std::mem::take(&mut self.pending_groups);
        let cells = self.grid.erase_groups(&groups);
        let level = self.chain.level;
        let points = score::chain_score(&groups, level);
        self.score.add(points);
        self.chain.total_score += points;
        if points > 0 {
            self.score_gain = points;
            self.score_popup_timer = SCORE_POPUP_FRAMES;
        }

        self.events.push(if level > 1 {
            GameEvent::ChainCleared {
                level,
                cells,
                points,
            }
        } else {
            GameEvent::GroupCleared { cells, points }
        });

        self.start_gravity();
    }

    fn start_gravity(&mut self) {
        self.phase = Phase::Gravity;
        self.gravity_timer = 0;
    }

    fn update_gravity(&mut self) {
        if self.phase != Phase::Gravity {
            return;
        }
        self.gravity_timer += 1;
        if self.gravity_timer < self.config.gravity_interval {
            return;
        }
        self.gravity_timer = 0;
        if self.grid.apply_gravity() {
            return;
        }

        self.phase = Phase::Falling;
        self.check_for_chain();
    }

    /// After the board settles: erase again if something new lines up,
    /// otherwise close out any running chain.
    fn check_for_chain(&mut self) {
        if !self.grid.find_erasable_groups().is_empty() {
            self.begin_elimination_check();
        } else if self.chain.active {
            self.end_chain();
        }
    }

    fn end_chain(&mut self) {
        let level = self.chain.level;
        let total = self.chain.total_score;
        self.chain.reset();
        self.banner.hide();
        self.events.push(GameEvent::ChainEnded { level, total });
    }

    fn update_banner(&mut self) {
        if !self.banner.visible {
            return;
        }
        self.banner.timer += 1;
        self.banner.animation_phase = (self.banner.animation_phase + CHAIN_PHASE_STEP) % TAU;
        if self.banner.timer >= self.config.chain_display_duration {
            self.banner.hide();
        }
    }

    fn update_score_popup(&mut self) {
        self.score_popup_timer = self.score_popup_timer.saturating_sub(1);
    }

    // ------------------------------------------------------------------------
    // Debug channel
    // ------------------------------------------------------------------------

    fn run_debug(&mut self, command: DebugCommand) {
        match command {
            DebugCommand::TestGravity => {
                if self.phase == Phase::Falling {
                    self.start_gravity();
                }
            }
            DebugCommand::TestConnection => {
                let groups = self.grid.find_connected_groups();
                let erasable = groups.iter().filter(|g| g.is_erasable()).count();
                self.events.push(GameEvent::ConnectionReport {
                    groups: groups.len(),
                    erasable,
                });
            }
            DebugCommand::TestElimination => {
                if self.phase == Phase::Falling {
                    let covered = self.falling.as_ref().map(PiecePair::positions);
                    for (x, y) in DEBUG_ELIMINATION_CELLS {
                        if covered.is_some_and(|cells| cells.contains(&Position::new(x, y))) {
                            continue;
                        }
                        self.grid.place(x, y, Cell::new(Color::Red));
                    }
                    self.begin_elimination_check();
                }
            }
            DebugCommand::TestChainAnimation => {
                let level = match self.banner {
                    ChainBanner { visible: true, level, .. } if level < DEBUG_CHAIN_WRAP => level + 1,
                    _ => 1,
                };
                self.banner.show(level);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Rendering views
    // ------------------------------------------------------------------------

    /// Settled cells with the falling pair overlaid.
    pub fn render_grid(&self) -> [[Option<Color>; GRID_WIDTH]; GRID_HEIGHT] {
        let mut visual = self.grid.colors();
        if let Some(pair) = &self.falling {
            for (pos, color) in piece_cells(pair) {
                if self.grid.is_valid_position(pos.x, pos.y) {
                    visual[pos.y as usize][pos.x as usize] = Some(color);
                }
            }
        }
        visual
    }

    pub fn snapshot(&self) -> Snapshot {
        let eliminating = self.phase == Phase::Eliminating;
        Snapshot {
            state: self.state,
            phase: self.phase,
            cells: self.grid.colors(),
            piece: self.falling.as_ref().map(piece_cells),
            next: self.generator.next().colors(),
            chain_level: self.banner.level,
            chain_visible: self.banner.visible,
            chain_animation_phase: self.banner.animation_phase,
            score: self.score.total(),
            score_gain: self.score_gain,
            score_popup_active: self.score_popup_timer > 0,
            eliminating,
            flashing: if eliminating {
                self.pending_groups
                    .iter()
                    .flat_map(|g| g.positions.iter().copied())
                    .collect()
            } else {
                Vec::new()
            },
            flash_on: (self.elimination_timer / FLASH_FRAMES) % 2 == 0,
            danger_level: self.danger_level(),
            game_over_reason: self.game_over_reason,
        }
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

fn piece_cells(pair: &PiecePair) -> [(Position, Color); 2] {
    [
        (pair.pivot.position, pair.pivot.color),
        (pair.satellite.position, pair.satellite.color),
    ]
}
