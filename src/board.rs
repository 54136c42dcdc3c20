//! Game board representation and collision detection

use crate::piece::FallingPiece;
use crate::tetromino::Color;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Board dimensions, constant for every session
pub const BOARD_COLS: usize = 10;
pub const BOARD_ROWS: usize = 20;

/// A cell on the board - either empty or filled with a color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Filled(Color),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, Cell::Filled(_))
    }

    /// Persisted form: 0 for empty, the ARGB value otherwise
    pub fn to_raw(self) -> u32 {
        match self {
            Cell::Empty => 0,
            Cell::Filled(color) => color.0,
        }
    }

    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Cell::Empty,
            color => Cell::Filled(Color(color)),
        }
    }
}

/// A pre-filled cell from a level layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obstacle {
    pub row: usize,
    pub col: usize,
}

/// The game board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Grid stored as [row][col], row 0 is the top
    cells: [[Cell; BOARD_COLS]; BOARD_ROWS],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Create a new empty board
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; BOARD_COLS]; BOARD_ROWS],
        }
    }

    /// Create a board pre-filled with a level's obstacles
    pub fn with_obstacles(obstacles: &[Obstacle]) -> Self {
        let mut board = Self::new();
        for obstacle in obstacles {
            if !board.set(obstacle.row as i32, obstacle.col as i32, Cell::Filled(Color::GRAY)) {
                warn!("Ignoring obstacle outside the board at ({}, {})", obstacle.row, obstacle.col);
            }
        }
        board
    }

    /// Rebuild a board from its flattened row-major form.
    /// Missing trailing cells are treated as empty, extra cells are ignored.
    pub fn from_cells(raw: &[u32]) -> Self {
        let mut board = Self::new();
        for (idx, &value) in raw.iter().take(BOARD_ROWS * BOARD_COLS).enumerate() {
            board.cells[idx / BOARD_COLS][idx % BOARD_COLS] = Cell::from_raw(value);
        }
        board
    }

    /// Flatten row-major, top row first
    pub fn to_cells(&self) -> Vec<u32> {
        self.cells
            .iter()
            .flat_map(|row| row.iter().map(|cell| cell.to_raw()))
            .collect()
    }

    /// Get the cell at a position (row, col)
    /// Returns None if out of bounds
    pub fn get(&self, row: i32, col: i32) -> Option<Cell> {
        if row < 0 || col < 0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= BOARD_ROWS || col >= BOARD_COLS {
            return None;
        }
        Some(self.cells[row][col])
    }

    /// Set a cell at a position
    /// Returns false if out of bounds
    pub fn set(&mut self, row: i32, col: i32, cell: Cell) -> bool {
        if row < 0 || col < 0 {
            return false;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= BOARD_ROWS || col >= BOARD_COLS {
            return false;
        }
        self.cells[row][col] = cell;
        true
    }

    /// Whether the piece, shifted by (dx, dy), hits a wall, the floor or a
    /// filled cell. Cells above the top edge never collide so a piece may sit
    /// partially above the board.
    pub fn collides(&self, piece: &FallingPiece, dx: i32, dy: i32) -> bool {
        piece.positions().iter().any(|&(row, col)| {
            let (row, col) = (row + dy, col + dx);
            if col < 0 || col >= BOARD_COLS as i32 || row >= BOARD_ROWS as i32 {
                return true;
            }
            row >= 0 && self.cells[row as usize][col as usize].is_filled()
        })
    }

    /// Commit a piece into the grid. No validation; cells above the top edge
    /// are dropped.
    pub fn place(&mut self, piece: &FallingPiece) {
        for (row, col) in piece.positions() {
            self.set(row, col, Cell::Filled(piece.color));
        }
    }

    /// Remove every full row, shift the rows above down and return how many
    /// were removed
    pub fn clear_full_rows(&mut self) -> usize {
        let mut write_row = BOARD_ROWS;

        // Walk bottom-up so kept rows keep their relative order
        for read_row in (0..BOARD_ROWS).rev() {
            if !self.is_row_full(read_row) {
                write_row -= 1;
                if write_row != read_row {
                    self.cells[write_row] = self.cells[read_row];
                }
            }
        }

        // Fill the top with empty rows
        for row in 0..write_row {
            self.cells[row] = [Cell::Empty; BOARD_COLS];
        }

        write_row
    }

    /// Check if a row is completely filled
    fn is_row_full(&self, row: usize) -> bool {
        self.cells[row].iter().all(|cell| cell.is_filled())
    }

    /// Number of filled cells on the whole board
    pub fn filled_count(&self) -> usize {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|cell| cell.is_filled()).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.filled_count() == 0
    }

    /// Iterate rows top to bottom
    pub fn rows(&self) -> impl Iterator<Item = &[Cell; BOARD_COLS]> {
        self.cells.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tetromino::ShapeId;
    use proptest::prelude::*;

    fn fill_row(board: &mut Board, row: i32) {
        for col in 0..BOARD_COLS as i32 {
            board.set(row, col, Cell::Filled(Color::CYAN));
        }
    }

    #[test]
    fn test_new_board_is_empty() {
        let board = Board::new();
        assert!(board.is_empty());
    }

    #[test]
    fn test_set_and_get() {
        let mut board = Board::new();
        assert!(board.set(5, 5, Cell::Filled(Color::RED)));
        assert_eq!(board.get(5, 5), Some(Cell::Filled(Color::RED)));
    }

    #[test]
    fn test_out_of_bounds() {
        let board = Board::new();
        assert_eq!(board.get(-1, 0), None);
        assert_eq!(board.get(0, -1), None);
        assert_eq!(board.get(BOARD_ROWS as i32, 0), None);
        assert_eq!(board.get(0, BOARD_COLS as i32), None);
    }

    #[test]
    fn test_obstacles_seeded_and_out_of_range_ignored() {
        let board = Board::with_obstacles(&[
            Obstacle { row: 19, col: 0 },
            Obstacle { row: 18, col: 9 },
            Obstacle { row: 40, col: 2 },
        ]);
        assert_eq!(board.filled_count(), 2);
        assert_eq!(board.get(19, 0), Some(Cell::Filled(Color::GRAY)));
    }

    #[test]
    fn test_collides_with_walls_floor_and_cells() {
        let mut board = Board::new();
        let piece = FallingPiece::spawn(ShapeId::I);
        assert!(!board.collides(&piece, 0, 0));
        assert!(board.collides(&piece, -4, 0));
        assert!(board.collides(&piece, 4, 0));
        assert!(board.collides(&piece, 0, BOARD_ROWS as i32));

        board.set(1, 4, Cell::Filled(Color::RED));
        assert!(board.collides(&piece, 0, 1));
    }

    #[test]
    fn test_above_top_is_not_a_collision() {
        let board = Board::new();
        let piece = FallingPiece::spawn(ShapeId::T);
        assert!(!board.collides(&piece, 0, -3));
    }

    #[test]
    fn test_place_uses_piece_color() {
        let mut board = Board::new();
        let piece = FallingPiece::spawn(ShapeId::O).translated(0, 10);
        board.place(&piece);
        assert_eq!(board.filled_count(), 4);
        assert_eq!(board.get(10, 3), Some(Cell::Filled(Color::YELLOW)));
    }

    #[test]
    fn test_clear_single_line() {
        let mut board = Board::new();
        fill_row(&mut board, 19);
        // A block resting on the full row
        board.set(18, 0, Cell::Filled(Color::RED));

        assert_eq!(board.clear_full_rows(), 1);
        assert_eq!(board.get(19, 0), Some(Cell::Filled(Color::RED)));
        assert!(board.get(18, 0).is_some_and(|cell| cell.is_empty()));
    }

    #[test]
    fn test_clear_non_adjacent_rows_keeps_order() {
        let mut board = Board::new();
        fill_row(&mut board, 19);
        board.set(18, 1, Cell::Filled(Color::BLUE));
        fill_row(&mut board, 17);
        board.set(16, 2, Cell::Filled(Color::GREEN));

        assert_eq!(board.clear_full_rows(), 2);
        assert_eq!(board.get(19, 1), Some(Cell::Filled(Color::BLUE)));
        assert_eq!(board.get(18, 2), Some(Cell::Filled(Color::GREEN)));
        assert_eq!(board.filled_count(), 2);
    }

    #[test]
    fn test_flatten_round_trip() {
        let mut board = Board::with_obstacles(&[Obstacle { row: 3, col: 7 }]);
        board.set(19, 9, Cell::Filled(Color::ORANGE));
        let raw = board.to_cells();
        assert_eq!(raw.len(), BOARD_ROWS * BOARD_COLS);
        assert_eq!(Board::from_cells(&raw), board);
    }

    #[test]
    fn test_from_short_cells_pads_with_empty() {
        let board = Board::from_cells(&[Color::RED.0]);
        assert_eq!(board.filled_count(), 1);
        assert_eq!(board.get(0, 0), Some(Cell::Filled(Color::RED)));
    }

    fn arb_board() -> impl Strategy<Value = Board> {
        prop::collection::vec(prop::bool::weighted(0.4), BOARD_ROWS * BOARD_COLS).prop_map(|bits| {
            let raw: Vec<u32> = bits
                .into_iter()
                .map(|filled| if filled { Color::GRAY.0 } else { 0 })
                .collect();
            Board::from_cells(&raw)
        })
    }

    proptest! {
        #[test]
        fn prop_clearing_twice_clears_nothing(mut board in arb_board(), full in prop::collection::vec(0i32..BOARD_ROWS as i32, 0..4)) {
            for row in full {
                fill_row(&mut board, row);
            }
            board.clear_full_rows();
            prop_assert_eq!(board.clear_full_rows(), 0);
        }

        #[test]
        fn prop_clearing_removes_exactly_full_rows(mut board in arb_board(), full in prop::collection::btree_set(0i32..BOARD_ROWS as i32, 0..5)) {
            for &row in &full {
                fill_row(&mut board, row);
            }
            let full_rows = board.rows().filter(|row| row.iter().all(|c| c.is_filled())).count();
            let survivors: Vec<[Cell; BOARD_COLS]> = board
                .rows()
                .filter(|row| !row.iter().all(|c| c.is_filled()))
                .copied()
                .collect();
            let before = board.filled_count();

            prop_assert_eq!(board.clear_full_rows(), full_rows);
            prop_assert_eq!(board.filled_count(), before - full_rows * BOARD_COLS);

            let after: Vec<[Cell; BOARD_COLS]> = board.rows().skip(full_rows).copied().collect();
            prop_assert_eq!(after, survivors);
        }

        #[test]
        fn prop_inside_piece_on_empty_board_fits(shape_idx in 0usize..7, dx in 0i32..7, dy in 1i32..18) {
            let board = Board::new();
            let piece = FallingPiece::spawn(ShapeId::ALL[shape_idx]);
            let piece = FallingPiece { col: dx, ..piece }.translated(0, dy);
            // Every spawn-orientation shape spans at most 4 columns and 2 rows
            prop_assume!(piece.positions().iter().all(|&(r, c)| c < BOARD_COLS as i32 && r < BOARD_ROWS as i32));
            prop_assert!(!board.collides(&piece, 0, 0));
            prop_assert!(board.collides(&piece, -(dx + 1), 0));
            prop_assert!(board.collides(&piece, BOARD_COLS as i32, 0));
            prop_assert!(board.collides(&piece, 0, BOARD_ROWS as i32));
        }
    }
}
