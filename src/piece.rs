use crate::grid::{Cell, Color, Position};

/// Satellite offset from the pivot per rotation: up, right, down, left.
pub const ROTATION_OFFSETS: [(i16, i16); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Positional fallbacks tried after a rotation, in priority order:
/// none, right, left, up.
pub const KICK_OFFSETS: [(i16, i16); 4] = [(0, 0), (1, 0), (-1, 0), (0, -1)];

/// Rotation that places the satellite directly below the pivot.
pub const ROTATION_DOWN: usize = 2;

/// Two-cell falling piece. The pivot sits at `position`; the satellite orbits
/// it at `ROTATION_OFFSETS[rotation]`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PiecePair {
    pub pivot: Cell,
    pub satellite: Cell,
    pub position: Position,
    pub rotation: usize,
}

impl PiecePair {
    pub fn new(pivot: Color, satellite: Color, x: i16, y: i16) -> Self {
        Self::with_rotation(pivot, satellite, x, y, 0)
    }

    pub fn with_rotation(pivot: Color, satellite: Color, x: i16, y: i16, rotation: usize) -> Self {
        let mut pair = Self {
            pivot: Cell::new(pivot),
            satellite: Cell::new(satellite),
            position: Position::new(x, y),
            rotation: rotation % 4,
        };
        pair.sync_cells();
        pair
    }

    pub fn satellite_offset(&self) -> (i16, i16) {
        ROTATION_OFFSETS[self.rotation % 4]
    }

    /// Pivot then satellite.
    pub fn positions(&self) -> [Position; 2] {
        let (dx, dy) = self.satellite_offset();
        [self.position, self.position.offset(dx, dy)]
    }

    pub fn colors(&self) -> (Color, Color) {
        (self.pivot.color, self.satellite.color)
    }

    pub fn rotate_clockwise(&mut self) {
        self.rotation = (self.rotation + 1) % 4;
        self.sync_cells();
    }

    pub fn rotate_counterclockwise(&mut self) {
        self.rotation = (self.rotation + 3) % 4;
        self.sync_cells();
    }

    pub fn move_by(&mut self, dx: i16, dy: i16) {
        self.set_position(self.position.x + dx, self.position.y + dy);
    }

    pub fn set_position(&mut self, x: i16, y: i16) {
        self.position = Position::new(x, y);
        self.sync_cells();
    }

    /// Translated copy; `self` is left alone.
    pub fn moved(&self, dx: i16, dy: i16) -> Self {
        let mut pair = self.clone();
        pair.move_by(dx, dy);
        pair
    }

    /// Hands both cells over, positioned where the pair currently sits.
    pub fn into_cells(self) -> (Cell, Cell) {
        (self.pivot, self.satellite)
    }

    fn sync_cells(&mut self) {
        let [pivot, satellite] = self.positions();
        self.pivot.position = pivot;
        self.satellite.position = satellite;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satellite_follows_rotation_table() {
        let mut pair = PiecePair::new(Color::Red, Color::Blue, 2, 5);
        let expected = [(2, 4), (3, 5), (2, 6), (1, 5)];
        for (x, y) in expected {
            assert_eq!(pair.satellite.position, Position::new(x, y));
            assert_eq!(pair.pivot.position, Position::new(2, 5));
            pair.rotate_clockwise();
        }
        assert_eq!(pair.rotation, 0);
    }

    #[test]
    fn counterclockwise_wraps_to_left() {
        let mut pair = PiecePair::new(Color::Red, Color::Blue, 2, 5);
        pair.rotate_counterclockwise();
        assert_eq!(pair.rotation, 3);
        assert_eq!(pair.satellite.position, Position::new(1, 5));
    }

    #[test]
    fn move_translates_both_cells() {
        let mut pair = PiecePair::with_rotation(Color::Red, Color::Blue, 2, 0, ROTATION_DOWN);
        pair.move_by(1, 3);
        assert_eq!(pair.positions(), [Position::new(3, 3), Position::new(3, 4)]);
        assert_eq!(pair.satellite.position, Position::new(3, 4));
    }

    #[test]
    fn moved_leaves_source_untouched() {
        let pair = PiecePair::new(Color::Green, Color::Green, 2, 5);
        let shifted = pair.moved(-1, 0);
        assert_eq!(pair.position, Position::new(2, 5));
        assert_eq!(shifted.position, Position::new(1, 5));
    }
}
