//! Active falling piece logic
//!
//! Pieces are immutable values: every transform returns a new piece and
//! leaves validation to the caller via [`Board::collides`].

use crate::board::{BOARD_COLS, Board};
use crate::tetromino::{Color, Offset, ShapeId};

/// Column of the spawn anchor, centering a 4-wide piece
pub const SPAWN_COL: i32 = (BOARD_COLS as i32 - 4) / 2;
/// Row of the spawn anchor
pub const SPAWN_ROW: i32 = 0;

/// An active falling piece
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallingPiece {
    /// Which catalogue shape this piece came from
    pub shape: ShapeId,
    /// Occupied cells relative to the anchor, (col, row)
    pub cells: [Offset; 4],
    pub color: Color,
    /// Absolute position of the anchor on the board
    pub row: i32,
    pub col: i32,
}

impl FallingPiece {
    /// Create a new piece at the spawn position (top-center)
    pub fn spawn(shape: ShapeId) -> Self {
        Self::at(shape, shape.color(), SPAWN_ROW, SPAWN_COL)
    }

    /// Create a piece in spawn orientation at an arbitrary anchor
    pub fn at(shape: ShapeId, color: Color, row: i32, col: i32) -> Self {
        Self {
            shape,
            cells: shape.cells(),
            color,
            row,
            col,
        }
    }

    /// Absolute (row, col) of every occupied cell
    pub fn positions(&self) -> [(i32, i32); 4] {
        self.cells.map(|(dc, dr)| (self.row + dr, self.col + dc))
    }

    /// Return a copy shifted by (dx, dy); positive dy moves down
    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        Self {
            row: self.row + dy,
            col: self.col + dx,
            ..self.clone()
        }
    }

    /// Return a copy rotated 90° clockwise about the shape's pivot.
    ///
    /// There is no wall-kick search: if the result collides the caller keeps
    /// this piece. Shapes without a pivot (O) are returned unchanged.
    pub fn rotated(&self) -> Self {
        let Some((px, py)) = self.shape.pivot() else {
            return self.clone();
        };
        let cells = self.cells.map(|(x, y)| (px - (y - py), py + (x - px)));
        Self {
            cells,
            ..self.clone()
        }
    }

    /// Drop straight down until the next step would collide
    pub fn hard_dropped(&self, board: &Board) -> Self {
        let mut piece = self.clone();
        while !board.collides(&piece, 0, 1) {
            piece = piece.translated(0, 1);
        }
        piece
    }
}
