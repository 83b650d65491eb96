#![forbid(unsafe_code)]

/**
 * Property tests for the playfield.
 *
 * Invariants covered:
 * - Flood fill partitions every occupied cell into exactly one group, and
 *   each group is a single 4-connected run of one color.
 * - Distinct groups of the same color never touch.
 * - Gravity reaches its fixed point in one pass and keeps column order.
 * - Kick resolution either lands on free cells or leaves the pair untouched.
 */
use std::collections::HashSet;

use proptest::prelude::*;
use puyo::grid::test_helpers::column;
use puyo::{Cell, Color, Grid, PiecePair, Position, GRID_HEIGHT, GRID_WIDTH};

fn arb_grid() -> impl Strategy<Value = Grid> {
    // 0 is empty, 1..=5 are color codes; empty weighted up so groups stay varied.
    prop::collection::vec(prop_oneof![3 => Just(0u8), 5 => 1u8..=5], GRID_WIDTH * GRID_HEIGHT)
        .prop_map(|codes| {
            let mut grid = Grid::new();
            for (i, code) in codes.into_iter().enumerate() {
                if let Some(color) = Color::from_code(code) {
                    let (x, y) = ((i % GRID_WIDTH) as i16, (i / GRID_WIDTH) as i16);
                    grid.place(x, y, Cell::new(color));
                }
            }
            grid
        })
}

fn is_connected(positions: &[Position]) -> bool {
    let members: HashSet<Position> = positions.iter().copied().collect();
    let mut seen = HashSet::new();
    let mut stack = vec![positions[0]];
    while let Some(pos) = stack.pop() {
        if !seen.insert(pos) {
            continue;
        }
        for (dx, dy) in [(0, -1), (0, 1), (-1, 0), (1, 0)] {
            let next = pos.offset(dx, dy);
            if members.contains(&next) && !seen.contains(&next) {
                stack.push(next);
            }
        }
    }
    seen.len() == members.len()
}

proptest! {
    #[test]
    fn flood_fill_partitions_occupied_cells(grid in arb_grid()) {
        let groups = grid.find_connected_groups();

        let mut covered = HashSet::new();
        for group in &groups {
            prop_assert!(!group.is_empty());
            prop_assert!(is_connected(&group.positions));
            for pos in &group.positions {
                prop_assert_eq!(grid.color_at(pos.x, pos.y), Some(group.color));
                prop_assert!(covered.insert(*pos), "{:?} in two groups", pos);
            }
        }
        prop_assert_eq!(covered.len(), grid.occupied_count());
    }

    #[test]
    fn same_color_groups_never_touch(grid in arb_grid()) {
        let groups = grid.find_connected_groups();
        for (i, a) in groups.iter().enumerate() {
            for b in groups.iter().skip(i + 1).filter(|b| b.color == a.color) {
                for pos in &a.positions {
                    for next in grid.adjacent_positions(pos.x, pos.y) {
                        prop_assert!(!b.contains(next.x, next.y));
                    }
                }
            }
        }
    }

    #[test]
    fn erasable_groups_meet_threshold(grid in arb_grid()) {
        for group in grid.find_erasable_groups() {
            prop_assert!(group.len() >= 4);
            prop_assert_ne!(group.color, Color::Obstacle);
        }
    }

    #[test]
    fn gravity_settles_in_one_pass(grid in arb_grid()) {
        let before: Vec<Vec<Color>> = (0..GRID_WIDTH as i16).map(|x| column(&grid, x)).collect();
        let occupied = grid.occupied_count();

        let mut settled = grid.clone();
        settled.apply_gravity();
        prop_assert!(!settled.apply_gravity());
        prop_assert_eq!(settled.occupied_count(), occupied);

        for x in 0..GRID_WIDTH as i16 {
            let stack = column(&settled, x);
            prop_assert_eq!(&stack, &before[x as usize]);
            // bottom-packed: the lowest `len` rows are exactly the occupied ones
            for depth in 0..stack.len() as i16 {
                prop_assert!(!settled.is_empty(x, GRID_HEIGHT as i16 - 1 - depth));
            }
        }
    }

    #[test]
    fn rotation_lands_clear_or_restores(
        grid in arb_grid(),
        x in 0i16..GRID_WIDTH as i16,
        y in 0i16..GRID_HEIGHT as i16,
        rotation in 0usize..4,
        clockwise in any::<bool>(),
    ) {
        let mut pair = PiecePair::with_rotation(Color::Red, Color::Blue, x, y, rotation);
        let before = pair.clone();

        match grid.try_rotate_with_kick(&mut pair, clockwise) {
            Some((dx, dy)) => {
                prop_assert!(grid.can_place_pair(&pair));
                prop_assert_eq!(pair.position, before.position.offset(dx, dy));
                prop_assert_ne!(pair.rotation, before.rotation);
            }
            None => {
                prop_assert_eq!(pair, before);
            }
        }
    }
}
