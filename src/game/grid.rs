//! The bubble grid - authoritative store of anchored bubbles.
//!
//! Uses a HashMap for sparse storage, keyed by hex coordinate. Each cell
//! records the bubble entity and its kind so the connectivity algorithms
//! can traverse the grid without touching component storage.

use bevy::prelude::*;
use std::collections::HashMap;

use super::{bubble::BubbleKind, hex::GridCoord};

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<FieldConfig>();
    app.init_resource::<BubbleGrid>();
    app.register_type::<FieldConfig>();

    #[cfg(debug_assertions)]
    app.add_systems(
        FixedUpdate,
        verify_grid_consistency
            .after(super::SimulationSet::Scoring)
            .run_if(in_state(crate::GamePhase::Playing)),
    );
}

/// Read-only field dimensions, fixed for the lifetime of a game.
#[derive(Resource, Debug, Clone, Reflect)]
#[reflect(Resource)]
pub struct FieldConfig {
    /// Number of grid rows; the bottom-most row is the game-over line.
    pub rows: i32,
    /// Number of grid columns.
    pub cols: i32,
    /// Field width in pixels (wall-to-wall, wider than the grid itself).
    pub width: f32,
    /// Field height in pixels.
    pub height: f32,
    /// Y position the projectile launches from.
    pub shooter_y: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            rows: 12,
            cols: 16,
            width: 800.0,
            height: 600.0,
            shooter_y: 550.0,
        }
    }
}

impl FieldConfig {
    /// Check whether a coordinate lies inside the grid.
    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.row >= 0 && coord.row < self.rows && coord.col >= 0 && coord.col < self.cols
    }

    /// The row index at which anchored bubbles end the game.
    pub fn bottom_row(&self) -> i32 {
        self.rows - 1
    }
}

/// One occupied cell: the anchored bubble entity and its kind.
///
/// The kind is mirrored here so flood fills are pure functions over the
/// grid snapshot, independent of ECS queries.
#[derive(Debug, Clone, Copy)]
pub struct GridBubble {
    pub entity: Entity,
    pub kind: BubbleKind,
}

/// Violation of the grid/bubble address agreement. Should never occur if
/// contracts are honored; fatal to the simulation step when it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridInvariantError {
    /// A bubble component's stored address disagrees with the cell map.
    AddressMismatch { entity: Entity, coord: GridCoord },
    /// An anchored bubble entity exists with no cell referring to it.
    UntrackedBubble { entity: Entity, coord: GridCoord },
    /// The cell map holds more cells than anchored bubbles exist.
    CountMismatch { anchored: usize, cells: usize },
}

impl std::fmt::Display for GridInvariantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddressMismatch { entity, coord } => {
                write!(f, "cell {coord} does not refer back to bubble {entity:?}")
            }
            Self::UntrackedBubble { entity, coord } => {
                write!(f, "anchored bubble {entity:?} at {coord} missing from grid")
            }
            Self::CountMismatch { anchored, cells } => {
                write!(f, "{cells} occupied cells but {anchored} anchored bubbles")
            }
        }
    }
}

impl std::error::Error for GridInvariantError {}

/// The main grid resource.
#[derive(Resource, Debug, Default)]
pub struct BubbleGrid {
    cells: HashMap<GridCoord, GridBubble>,
}

impl BubbleGrid {
    pub fn is_occupied(&self, coord: GridCoord) -> bool {
        self.cells.contains_key(&coord)
    }

    pub fn get(&self, coord: GridCoord) -> Option<GridBubble> {
        self.cells.get(&coord).copied()
    }

    /// The kind at a cell, if occupied.
    pub fn kind_at(&self, coord: GridCoord) -> Option<BubbleKind> {
        self.cells.get(&coord).map(|b| b.kind)
    }

    /// Insert a bubble. Returns the previous occupant if the cell held one.
    pub fn insert(
        &mut self,
        coord: GridCoord,
        entity: Entity,
        kind: BubbleKind,
    ) -> Option<GridBubble> {
        self.cells.insert(coord, GridBubble { entity, kind })
    }

    /// Remove a bubble from a cell. Returns it if the cell was occupied.
    pub fn remove(&mut self, coord: GridCoord) -> Option<GridBubble> {
        self.cells.remove(&coord)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GridCoord, GridBubble)> + '_ {
        self.cells.iter().map(|(c, b)| (*c, *b))
    }

    pub fn coords(&self) -> impl Iterator<Item = GridCoord> + '_ {
        self.cells.keys().copied()
    }

    /// All occupied cells in the permanent anchor row (row 0), the seeds
    /// for floating-cluster detection.
    pub fn anchor_row_coords(&self) -> Vec<GridCoord> {
        self.cells.keys().filter(|c| c.row == 0).copied().collect()
    }

    /// Resolve the cell a colliding projectile attaches to.
    ///
    /// The collision point maps to its containing cell; if that cell is
    /// occupied, its neighbors are scanned in adjacency order for the
    /// first empty in-bounds cell. `None` means the attach fails and the
    /// projectile is discarded - a normal outcome of the search, not an
    /// error.
    pub fn resolve_attach_cell(&self, pos: Vec2, config: &FieldConfig) -> Option<GridCoord> {
        let target = GridCoord::from_pixel(pos);

        if !config.contains(target) {
            return None;
        }

        if !self.is_occupied(target) {
            return Some(target);
        }

        target
            .neighbors()
            .into_iter()
            .find(|n| config.contains(*n) && !self.is_occupied(*n))
    }

    /// Occupancy count per column, for the column-clear effect.
    pub fn column_counts(&self, config: &FieldConfig) -> Vec<usize> {
        let mut counts = vec![0usize; config.cols.max(0) as usize];
        for coord in self.cells.keys() {
            if let Some(slot) = counts.get_mut(coord.col as usize) {
                *slot += 1;
            }
        }
        counts
    }

    /// Whether any anchored bubble has reached the bottom-most row.
    pub fn bottom_row_reached(&self, config: &FieldConfig) -> bool {
        self.cells.keys().any(|c| c.row >= config.bottom_row())
    }

    /// Verify that grid contents and anchored bubble addresses agree.
    ///
    /// `anchored` is the full set of anchored bubbles as (entity, stored
    /// address, kind). A disagreement is surfaced, never patched.
    pub fn check_consistency<I>(&self, anchored: I) -> Result<(), GridInvariantError>
    where
        I: IntoIterator<Item = (Entity, GridCoord, BubbleKind)>,
    {
        let mut seen = 0usize;
        for (entity, coord, kind) in anchored {
            seen += 1;
            match self.cells.get(&coord) {
                None => return Err(GridInvariantError::UntrackedBubble { entity, coord }),
                Some(cell) if cell.entity != entity || cell.kind != kind => {
                    return Err(GridInvariantError::AddressMismatch { entity, coord });
                }
                Some(_) => {}
            }
        }

        if seen != self.cells.len() {
            return Err(GridInvariantError::CountMismatch {
                anchored: seen,
                cells: self.cells.len(),
            });
        }
        Ok(())
    }
}

/// Debug-build watchdog for the grid/bubble invariant.
#[cfg(debug_assertions)]
fn verify_grid_consistency(
    grid: Res<BubbleGrid>,
    bubbles: Query<(Entity, &super::bubble::Bubble)>,
) {
    let anchored = bubbles
        .iter()
        .map(|(entity, b)| (entity, b.coord, b.kind));
    if let Err(err) = grid.check_consistency(anchored) {
        panic!("grid invariant violated: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::bubble::BubbleColor;
    use crate::game::hex::CELL_SIZE;

    fn red() -> BubbleKind {
        BubbleKind::Color(BubbleColor::Red)
    }

    fn fill(grid: &mut BubbleGrid, coords: &[(i32, i32)]) {
        for &(row, col) in coords {
            grid.insert(GridCoord::new(row, col), Entity::PLACEHOLDER, red());
        }
    }

    #[test]
    fn attach_lands_in_empty_target_cell() {
        let grid = BubbleGrid::default();
        let config = FieldConfig::default();

        let coord = grid
            .resolve_attach_cell(GridCoord::new(3, 4).to_pixel(), &config)
            .unwrap();
        assert_eq!(coord, GridCoord::new(3, 4));
    }

    #[test]
    fn attach_scans_neighbors_in_adjacency_order() {
        let mut grid = BubbleGrid::default();
        let config = FieldConfig::default();
        fill(&mut grid, &[(3, 4)]);

        // Odd-row target occupied: first neighbor offset is (-1, 0).
        let coord = grid
            .resolve_attach_cell(GridCoord::new(3, 4).to_pixel(), &config)
            .unwrap();
        assert_eq!(coord, GridCoord::new(2, 4));

        // With that one also occupied the scan moves to (-1, +1).
        fill(&mut grid, &[(2, 4)]);
        let coord = grid
            .resolve_attach_cell(GridCoord::new(3, 4).to_pixel(), &config)
            .unwrap();
        assert_eq!(coord, GridCoord::new(2, 5));
    }

    #[test]
    fn attach_fails_when_no_neighbor_is_free() {
        let mut grid = BubbleGrid::default();
        let config = FieldConfig::default();

        // Occupy a cell and its entire neighborhood.
        fill(&mut grid, &[(3, 4)]);
        for n in GridCoord::new(3, 4).neighbors() {
            grid.insert(n, Entity::PLACEHOLDER, red());
        }

        let result = grid.resolve_attach_cell(GridCoord::new(3, 4).to_pixel(), &config);
        assert_eq!(result, None);
    }

    #[test]
    fn attach_fails_outside_the_grid() {
        let grid = BubbleGrid::default();
        let config = FieldConfig::default();

        let below = Vec2::new(100.0, config.rows as f32 * CELL_SIZE + 10.0);
        assert_eq!(grid.resolve_attach_cell(below, &config), None);
    }

    #[test]
    fn column_counts_track_occupancy() {
        let mut grid = BubbleGrid::default();
        let config = FieldConfig::default();
        fill(&mut grid, &[(0, 7), (1, 7), (2, 7), (0, 3)]);

        let counts = grid.column_counts(&config);
        assert_eq!(counts[7], 3);
        assert_eq!(counts[3], 1);
        assert_eq!(counts[0], 0);
    }

    #[test]
    fn consistency_accepts_agreeing_state() {
        let mut grid = BubbleGrid::default();
        let coord = GridCoord::new(2, 2);
        grid.insert(coord, Entity::PLACEHOLDER, red());

        let anchored = [(Entity::PLACEHOLDER, coord, red())];
        assert!(grid.check_consistency(anchored).is_ok());
    }

    #[test]
    fn consistency_rejects_address_disagreement() {
        let mut grid = BubbleGrid::default();
        grid.insert(GridCoord::new(2, 2), Entity::PLACEHOLDER, red());

        // Bubble claims a different cell than the grid records.
        let anchored = [(Entity::PLACEHOLDER, GridCoord::new(2, 3), red())];
        assert!(grid.check_consistency(anchored).is_err());
    }
}
