use crate::piece::{PiecePair, KICK_OFFSETS};

// ============================================================================
// Configuration
// ============================================================================

pub const GRID_WIDTH: usize = 6;
pub const GRID_HEIGHT: usize = 12;

/// Minimum size of a same-color group that gets erased.
pub const ERASE_THRESHOLD: usize = 4;

/// Up, down, left, right.
const NEIGHBOURS_4: [(i16, i16); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

// ============================================================================
// Types
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub struct Position {
    pub x: i16,
    pub y: i16,
}

impl Position {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i16, dy: i16) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Color {
    Red,
    Orange,
    Green,
    Blue,
    /// Nuisance cell: occupies space, never erased by matching.
    Obstacle,
}

impl Color {
    /// Colors a normal pair is drawn from.
    pub const NORMAL: [Color; 4] = [Color::Red, Color::Orange, Color::Green, Color::Blue];

    /// Numeric tag 1..=5.
    pub fn code(self) -> u8 {
        match self {
            Color::Red => 1,
            Color::Orange => 2,
            Color::Green => 3,
            Color::Blue => 4,
            Color::Obstacle => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Color::Red),
            2 => Some(Color::Orange),
            3 => Some(Color::Green),
            4 => Some(Color::Blue),
            5 => Some(Color::Obstacle),
            _ => None,
        }
    }

    pub fn is_obstacle(self) -> bool {
        self == Color::Obstacle
    }
}

/// A single colored cell. Owned by exactly one of the grid or a falling pair.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Cell {
    pub color: Color,
    pub position: Position,
}

impl Cell {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            position: Position::default(),
        }
    }

    pub fn at(color: Color, x: i16, y: i16) -> Self {
        Self {
            color,
            position: Position::new(x, y),
        }
    }
}

/// Same-color cells joined by 4-directional adjacency.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ConnectedGroup {
    pub color: Color,
    pub positions: Vec<Position>,
}

impl ConnectedGroup {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn contains(&self, x: i16, y: i16) -> bool {
        self.positions.contains(&Position::new(x, y))
    }

    pub fn is_erasable(&self) -> bool {
        !self.color.is_obstacle() && self.len() >= ERASE_THRESHOLD
    }
}

// ============================================================================
// Grid
// ============================================================================

/// Playfield. Row 0 is the spawn row at the top; row `GRID_HEIGHT - 1` is the floor.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Grid {
    cells: [[Option<Cell>; GRID_WIDTH]; GRID_HEIGHT],
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> usize {
        GRID_WIDTH
    }

    pub fn height(&self) -> usize {
        GRID_HEIGHT
    }

    pub fn is_valid_position(&self, x: i16, y: i16) -> bool {
        x >= 0 && (x as usize) < GRID_WIDTH && y >= 0 && (y as usize) < GRID_HEIGHT
    }

    pub fn is_empty(&self, x: i16, y: i16) -> bool {
        self.is_valid_position(x, y) && self.cells[y as usize][x as usize].is_none()
    }

    pub fn get(&self, x: i16, y: i16) -> Option<&Cell> {
        if !self.is_valid_position(x, y) {
            return None;
        }
        self.cells[y as usize][x as usize].as_ref()
    }

    pub fn color_at(&self, x: i16, y: i16) -> Option<Color> {
        self.get(x, y).map(|cell| cell.color)
    }

    /// Stores `cell` at (x, y). Fails without mutating when the slot is out of
    /// bounds or already taken; the rejected cell is dropped.
    pub fn place(&mut self, x: i16, y: i16, mut cell: Cell) -> bool {
        if !self.is_empty(x, y) {
            return false;
        }
        cell.position = Position::new(x, y);
        self.cells[y as usize][x as usize] = Some(cell);
        true
    }

    pub fn remove(&mut self, x: i16, y: i16) -> Option<Cell> {
        if !self.is_valid_position(x, y) {
            return None;
        }
        self.cells[y as usize][x as usize].take()
    }

    pub fn clear(&mut self) {
        for row in self.cells.iter_mut() {
            row.fill(None);
        }
    }

    /// Occupied cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().flatten().flatten()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells().count()
    }

    /// Color per slot, `rows[y][x]`.
    pub fn colors(&self) -> [[Option<Color>; GRID_WIDTH]; GRID_HEIGHT] {
        let mut out = [[None; GRID_WIDTH]; GRID_HEIGHT];
        for cell in self.cells() {
            out[cell.position.y as usize][cell.position.x as usize] = Some(cell.color);
        }
        out
    }

    /// In-bounds 4-neighbours of (x, y), ordered up, down, left, right.
    pub fn adjacent_positions(&self, x: i16, y: i16) -> Vec<Position> {
        NEIGHBOURS_4
            .iter()
            .map(|&(dx, dy)| Position::new(x + dx, y + dy))
            .filter(|p| self.is_valid_position(p.x, p.y))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Connectivity
    // ------------------------------------------------------------------------

    /// Partitions every occupied cell into same-color groups, singletons included.
    pub fn find_connected_groups(&self) -> Vec<ConnectedGroup> {
        let mut visited = [[false; GRID_WIDTH]; GRID_HEIGHT];
        let mut groups = Vec::new();

        for y in 0..GRID_HEIGHT {
            for x in 0..GRID_WIDTH {
                if visited[y][x] {
                    continue;
                }
                if let Some(cell) = &self.cells[y][x] {
                    let positions = self.flood_fill(x, y, cell.color, &mut visited);
                    groups.push(ConnectedGroup {
                        color: cell.color,
                        positions,
                    });
                }
            }
        }
        groups
    }

    fn flood_fill(
        &self,
        start_x: usize,
        start_y: usize,
        color: Color,
        visited: &mut [[bool; GRID_WIDTH]; GRID_HEIGHT],
    ) -> Vec<Position> {
        let mut component = Vec::new();
        let mut stack = vec![Position::new(start_x as i16, start_y as i16)];
        visited[start_y][start_x] = true;

        while let Some(pos) = stack.pop() {
            component.push(pos);
            for next in self.adjacent_positions(pos.x, pos.y) {
                let (nx, ny) = (next.x as usize, next.y as usize);
                if visited[ny][nx] {
                    continue;
                }
                if self.color_at(next.x, next.y) == Some(color) {
                    visited[ny][nx] = true;
                    stack.push(next);
                }
            }
        }
        component
    }

    /// Groups of at least `ERASE_THRESHOLD` matching cells. Obstacle groups never qualify.
    pub fn find_erasable_groups(&self) -> Vec<ConnectedGroup> {
        self.find_connected_groups()
            .into_iter()
            .filter(ConnectedGroup::is_erasable)
            .collect()
    }

    /// Size of the same-color group through (x, y); 0 when the slot is empty.
    pub fn count_connected(&self, x: i16, y: i16) -> usize {
        let Some(color) = self.color_at(x, y) else {
            return 0;
        };
        let mut visited = [[false; GRID_WIDTH]; GRID_HEIGHT];
        self.flood_fill(x as usize, y as usize, color, &mut visited).len()
    }

    /// Removes every cell covered by `groups`. Returns how many were removed.
    pub fn erase_groups(&mut self, groups: &[ConnectedGroup]) -> usize {
        groups
            .iter()
            .flat_map(|group| group.positions.iter())
            .filter(|pos| self.remove(pos.x, pos.y).is_some())
            .count()
    }

    /// Finds and erases in one step: (anything erased, cells removed, groups removed).
    pub fn process_elimination(&mut self) -> (bool, usize, usize) {
        let groups = self.find_erasable_groups();
        if groups.is_empty() {
            return (false, 0, 0);
        }
        let erased = self.erase_groups(&groups);
        (true, erased, groups.len())
    }

    /// Color of each group, read from its first cell still on the grid.
    pub fn group_colors(&self, groups: &[ConnectedGroup]) -> Vec<Option<Color>> {
        groups
            .iter()
            .map(|group| {
                group
                    .positions
                    .first()
                    .and_then(|pos| self.color_at(pos.x, pos.y))
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Gravity
    // ------------------------------------------------------------------------

    /// One compaction pass: every column is packed toward the floor, keeping
    /// the vertical order of its cells. Returns true if any cell changed row.
    pub fn apply_gravity(&mut self) -> bool {
        let mut moved = false;
        for x in 0..GRID_WIDTH {
            let mut write_y = GRID_HEIGHT;
            for y in (0..GRID_HEIGHT).rev() {
                if let Some(mut cell) = self.cells[y][x].take() {
                    write_y -= 1;
                    if write_y != y {
                        moved = true;
                    }
                    cell.position = Position::new(x as i16, write_y as i16);
                    self.cells[write_y][x] = Some(cell);
                }
            }
        }
        moved
    }

    // ------------------------------------------------------------------------
    // Falling pair collision
    // ------------------------------------------------------------------------

    pub fn can_place_pair(&self, pair: &PiecePair) -> bool {
        pair.positions().iter().all(|p| self.is_empty(p.x, p.y))
    }

    /// Probes a translation without touching the pair.
    pub fn can_move_pair(&self, pair: &PiecePair, dx: i16, dy: i16) -> bool {
        self.can_place_pair(&pair.moved(dx, dy))
    }

    /// Rotates `pair` in place, falling back through `KICK_OFFSETS` in order.
    /// Returns the accepted offset, or `None` with the pair left exactly as it was.
    pub fn try_rotate_with_kick(&self, pair: &mut PiecePair, clockwise: bool) -> Option<(i16, i16)> {
        let start_rotation = pair.rotation;
        let start = pair.position;

        if clockwise {
            pair.rotate_clockwise();
        } else {
            pair.rotate_counterclockwise();
        }

        for (dx, dy) in KICK_OFFSETS {
            pair.set_position(start.x + dx, start.y + dy);
            if self.can_place_pair(pair) {
                return Some((dx, dy));
            }
        }

        pair.rotation = start_rotation;
        pair.set_position(start.x, start.y);
        None
    }

    pub fn rotate_with_kick(&self, pair: &mut PiecePair, clockwise: bool) -> bool {
        self.try_rotate_with_kick(pair, clockwise).is_some()
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

pub mod test_helpers {
    use super::*;

    /// Builds a grid from bottom-aligned text rows: `.` empty, `R` `O` `G` `B`
    /// colors, `X` obstacle. The last row given lands on the floor.
    pub fn grid_from_rows(rows: &[&str]) -> Grid {
        let mut grid = Grid::new();
        let top = GRID_HEIGHT - rows.len();
        for (i, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let color = match ch {
                    'R' => Color::Red,
                    'O' => Color::Orange,
                    'G' => Color::Green,
                    'B' => Color::Blue,
                    'X' => Color::Obstacle,
                    _ => continue,
                };
                grid.place(x as i16, (top + i) as i16, Cell::new(color));
            }
        }
        grid
    }

    /// Column contents from floor upward.
    pub fn column(grid: &Grid, x: i16) -> Vec<Color> {
        (0..GRID_HEIGHT as i16)
            .rev()
            .filter_map(|y| grid.color_at(x, y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use super::*;

    #[test]
    fn colors_round_trip_through_codes() {
        for code in 1..=5 {
            let color = Color::from_code(code).unwrap();
            assert_eq!(color.code(), code);
        }
        assert_eq!(Color::from_code(0), None);
        assert_eq!(Color::from_code(6), None);
    }

    #[test]
    fn corner_has_two_neighbours() {
        let grid = Grid::new();
        assert_eq!(
            grid.adjacent_positions(0, 0),
            vec![Position::new(0, 1), Position::new(1, 0)]
        );
        assert_eq!(grid.adjacent_positions(2, 5).len(), 4);
    }

    #[test]
    fn text_rows_are_bottom_aligned() {
        let grid = grid_from_rows(&["R.....", "GB...X"]);
        assert_eq!(grid.color_at(0, 10), Some(Color::Red));
        assert_eq!(grid.color_at(0, 11), Some(Color::Green));
        assert_eq!(grid.color_at(5, 11), Some(Color::Obstacle));
        assert_eq!(column(&grid, 0), vec![Color::Green, Color::Red]);
    }
}
