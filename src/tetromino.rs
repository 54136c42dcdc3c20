//! Tetromino definitions and shapes
//!
//! Static catalogue of the 7 shapes: cell offsets in spawn orientation,
//! rotation pivot and color. Offsets are (col, row) with row increasing
//! downward, matching the board's top-first layout.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque ARGB cell color, persisted as a plain integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const CYAN: Color = Color(0xFF00_FFFF);
    pub const YELLOW: Color = Color(0xFFFF_FF00);
    pub const PURPLE: Color = Color(0xFFA0_00F0);
    pub const GREEN: Color = Color(0xFF00_FF00);
    pub const RED: Color = Color(0xFFFF_0000);
    pub const BLUE: Color = Color(0xFF00_00FF);
    pub const ORANGE: Color = Color(0xFFFF_A500);
    /// Used for level obstacles
    pub const GRAY: Color = Color(0xFF80_8080);
}

/// The 7 shape identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeId {
    I, // Cyan - long bar
    O, // Yellow - square
    T, // Purple - T-shape
    S, // Green - S-shape
    Z, // Red - Z-shape
    J, // Blue - J-shape
    L, // Orange - L-shape
}

/// A cell offset relative to a piece anchor: (col, row)
pub type Offset = (i32, i32);

impl ShapeId {
    /// Every shape, in catalogue order
    pub const ALL: [ShapeId; 7] = [
        ShapeId::I,
        ShapeId::O,
        ShapeId::T,
        ShapeId::S,
        ShapeId::Z,
        ShapeId::J,
        ShapeId::L,
    ];

    /// Get the color for this shape
    pub fn color(&self) -> Color {
        match self {
            ShapeId::I => Color::CYAN,
            ShapeId::O => Color::YELLOW,
            ShapeId::T => Color::PURPLE,
            ShapeId::S => Color::GREEN,
            ShapeId::Z => Color::RED,
            ShapeId::J => Color::BLUE,
            ShapeId::L => Color::ORANGE,
        }
    }

    /// Cell offsets in spawn orientation
    //
    // I: ####   O: ##   T: ###   S: .##   Z: ##.   J: #..   L: ..#
    //               ##      .#.      ##.      .##      ###      ###
    pub fn cells(&self) -> [Offset; 4] {
        match self {
            ShapeId::I => [(0, 0), (1, 0), (2, 0), (3, 0)],
            ShapeId::O => [(0, 0), (1, 0), (0, 1), (1, 1)],
            ShapeId::T => [(0, 0), (1, 0), (2, 0), (1, 1)],
            ShapeId::S => [(1, 0), (2, 0), (0, 1), (1, 1)],
            ShapeId::Z => [(0, 0), (1, 0), (1, 1), (2, 1)],
            ShapeId::J => [(0, 0), (0, 1), (1, 1), (2, 1)],
            ShapeId::L => [(2, 0), (0, 1), (1, 1), (2, 1)],
        }
    }

    /// Local pivot used for rotation. `None` for shapes that don't rotate.
    pub fn pivot(&self) -> Option<Offset> {
        match self {
            ShapeId::O => None,
            ShapeId::I | ShapeId::T | ShapeId::S | ShapeId::Z => Some((1, 0)),
            ShapeId::J | ShapeId::L => Some((1, 1)),
        }
    }

    /// Single-letter identifier used in persisted documents
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeId::I => "I",
            ShapeId::O => "O",
            ShapeId::T => "T",
            ShapeId::S => "S",
            ShapeId::Z => "Z",
            ShapeId::J => "J",
            ShapeId::L => "L",
        }
    }

    /// Look a shape up by identifier
    pub fn from_id(id: &str) -> Option<ShapeId> {
        ShapeId::ALL.into_iter().find(|shape| shape.as_str() == id)
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_shape_has_four_distinct_cells() {
        for shape in ShapeId::ALL {
            let cells: HashSet<_> = shape.cells().into_iter().collect();
            assert_eq!(cells.len(), 4, "{shape} has overlapping cells");
        }
    }

    #[test]
    fn test_pivot_is_one_of_the_cells() {
        for shape in ShapeId::ALL {
            if let Some(pivot) = shape.pivot() {
                assert!(shape.cells().contains(&pivot), "{shape} pivot outside piece");
            }
        }
    }

    #[test]
    fn test_id_lookup() {
        for shape in ShapeId::ALL {
            assert_eq!(ShapeId::from_id(shape.as_str()), Some(shape));
        }
        assert_eq!(ShapeId::from_id("X"), None);
    }

    #[test]
    fn test_colors_are_never_empty() {
        for shape in ShapeId::ALL {
            assert_ne!(shape.color().0, 0);
        }
    }
}
