//! Falling-pair matching puzzle core: a 6x12 playfield, a two-cell falling
//! piece, connected-group elimination and cascading chains, all advanced by
//! a fixed-timestep frame clock.

pub mod config;
pub mod danger;
pub mod game;
pub mod generator;
pub mod grid;
pub mod piece;
pub mod score;

pub use config::{ConfigError, SimConfig};
pub use game::{DebugCommand, FrameInput, GameEvent, GameState, Phase, SimulationClock, Snapshot};
pub use grid::{Cell, Color, ConnectedGroup, Grid, Position, GRID_HEIGHT, GRID_WIDTH};
pub use piece::PiecePair;
