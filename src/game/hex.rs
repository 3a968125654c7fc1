//! Hexagonal addressing for the bubble field.
//!
//! The grid is row/column addressed with an even-row horizontal offset:
//! even rows are shifted right by half a cell width relative to odd rows,
//! which packs the circles into the classic bubble-shooter hex mesh.
//!
//! Pixel coordinates are y-down: row 0 hangs from the ceiling at y = 0 and
//! rows grow toward the shooter. All addressing math is integer/parity
//! based so no floating error accumulates in the grid itself.

use bevy::prelude::*;

/// Radius of every bubble in pixels.
pub const BUBBLE_RADIUS: f32 = 20.0;

/// Width and height of one grid cell (a bubble diameter).
pub const CELL_SIZE: f32 = BUBBLE_RADIUS * 2.0;

/// Neighbor offsets for even rows, in adjacency enumeration order.
/// The attach scan and wildcard evaluation iterate in exactly this order.
const EVEN_ROW_NEIGHBORS: [(i32, i32); 6] = [
    (-1, -1),
    (-1, 0),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
];

/// Neighbor offsets for odd rows, in adjacency enumeration order.
const ODD_ROW_NEIGHBORS: [(i32, i32); 6] = [
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, 0),
    (1, 1),
];

/// A cell address on the bubble grid.
///
/// Coordinates may fall outside the playable field; bounds are checked by
/// the caller against [`super::grid::FieldConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Component, Reflect)]
#[reflect(Component)]
pub struct GridCoord {
    pub row: i32,
    pub col: i32,
}

impl GridCoord {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Whether this coordinate sits on an offset (even) row.
    #[inline]
    pub const fn is_offset_row(&self) -> bool {
        self.row % 2 == 0
    }

    /// The six neighboring cells, in adjacency enumeration order.
    ///
    /// The direction set depends on row parity because even rows are
    /// shifted half a cell to the right. Out-of-bounds results are not
    /// filtered here.
    pub fn neighbors(&self) -> [GridCoord; 6] {
        let offsets = if self.is_offset_row() {
            EVEN_ROW_NEIGHBORS
        } else {
            ODD_ROW_NEIGHBORS
        };

        offsets.map(|(dr, dc)| GridCoord::new(self.row + dr, self.col + dc))
    }

    /// Canonical pixel center of this cell.
    pub fn to_pixel(&self) -> Vec2 {
        let x_offset = if self.is_offset_row() {
            BUBBLE_RADIUS
        } else {
            0.0
        };
        Vec2::new(
            self.col as f32 * CELL_SIZE + BUBBLE_RADIUS + x_offset,
            self.row as f32 * CELL_SIZE + BUBBLE_RADIUS,
        )
    }

    /// Convert a pixel position to the cell containing it.
    ///
    /// The row is found first; the column correction then depends on the
    /// row's parity (even rows subtract the half-cell offset before
    /// dividing).
    pub fn from_pixel(pos: Vec2) -> Self {
        let row = (pos.y / CELL_SIZE).floor() as i32;

        let col = if row % 2 == 0 {
            ((pos.x - BUBBLE_RADIUS) / CELL_SIZE).floor() as i32
        } else {
            (pos.x / CELL_SIZE).floor() as i32
        };

        Self { row, col }
    }
}

impl std::fmt::Display for GridCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_sets_differ_by_parity() {
        let even = GridCoord::new(2, 5).neighbors();
        let odd = GridCoord::new(3, 5).neighbors();

        assert_eq!(even[0], GridCoord::new(1, 4));
        assert_eq!(even[1], GridCoord::new(1, 5));
        assert_eq!(odd[0], GridCoord::new(2, 5));
        assert_eq!(odd[1], GridCoord::new(2, 6));

        // Left/right neighbors are parity independent.
        for coords in [even, odd] {
            assert_eq!(coords[2].row, coords[3].row);
        }
    }

    #[test]
    fn adjacency_is_symmetric() {
        // If b is a neighbor of a then a must be a neighbor of b,
        // across both parities.
        for a in [GridCoord::new(4, 7), GridCoord::new(5, 7)] {
            for b in a.neighbors() {
                assert!(
                    b.neighbors().contains(&a),
                    "{b} does not link back to {a}"
                );
            }
        }
    }

    #[test]
    fn pixel_roundtrip_even_row() {
        let original = GridCoord::new(4, 9);
        assert_eq!(GridCoord::from_pixel(original.to_pixel()), original);
    }

    #[test]
    fn pixel_roundtrip_odd_row() {
        let original = GridCoord::new(7, 0);
        assert_eq!(GridCoord::from_pixel(original.to_pixel()), original);
    }

    #[test]
    fn from_pixel_respects_row_offset() {
        // Just right of the half-cell shift on an even row.
        let even = GridCoord::from_pixel(Vec2::new(BUBBLE_RADIUS + 1.0, 1.0));
        assert_eq!(even, GridCoord::new(0, 0));

        // The same x on an odd row already belongs to column 1.
        let odd = GridCoord::from_pixel(Vec2::new(CELL_SIZE + 1.0, CELL_SIZE + 1.0));
        assert_eq!(odd, GridCoord::new(1, 1));
    }
}
