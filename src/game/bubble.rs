//! Bubble entities - the objects filling the grid.
//!
//! A bubble is always in exactly one of three states: anchored (occupies a
//! unique grid cell), free (projectile or falling, physically simulated),
//! or removed (despawned). Anchored bubbles have no velocity; their pixel
//! position is the canonical center of their cell.

use bevy::prelude::*;
use rand::Rng;

use super::{
    grid::{BubbleGrid, FieldConfig},
    hex::{BUBBLE_RADIUS, GridCoord},
};
use crate::{GamePhase, PausableSystems};

pub(super) fn plugin(app: &mut App) {
    app.register_type::<Bubble>();
    app.register_type::<BubbleKind>();

    app.add_systems(OnEnter(GamePhase::Playing), spawn_initial_bubbles);
    app.add_systems(OnExit(GamePhase::Playing), clear_grid);

    app.add_systems(
        FixedUpdate,
        update_falling_bubbles
            .in_set(super::SimulationSet::Motion)
            .in_set(PausableSystems)
            .run_if(in_state(GamePhase::Playing)),
    );
}

/// The fixed bubble palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Default)]
pub enum BubbleColor {
    #[default]
    Red,
    Green,
    Blue,
    Yellow,
    Purple,
    Cyan,
    Orange,
}

impl BubbleColor {
    pub const ALL: [BubbleColor; 7] = [
        BubbleColor::Red,
        BubbleColor::Green,
        BubbleColor::Blue,
        BubbleColor::Yellow,
        BubbleColor::Purple,
        BubbleColor::Cyan,
        BubbleColor::Orange,
    ];

    /// Pick a uniformly random color.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

/// What a bubble is made of: a fixed color, or a wildcard that has no
/// color of its own and matches any neighbor during connectivity
/// evaluation. Resolved once at construction, never probed ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum BubbleKind {
    Color(BubbleColor),
    Wildcard,
}

impl BubbleKind {
    /// Whether two bubbles form a match edge.
    #[inline]
    pub fn matches(self, other: BubbleKind) -> bool {
        match (self, other) {
            (BubbleKind::Wildcard, _) | (_, BubbleKind::Wildcard) => true,
            (BubbleKind::Color(a), BubbleKind::Color(b)) => a == b,
        }
    }
}

/// Component for a bubble anchored on the grid.
///
/// Invariant: `grid.get(coord)` refers back to this entity with the same
/// kind. [`BubbleGrid::check_consistency`] verifies this.
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct Bubble {
    pub kind: BubbleKind,
    pub coord: GridCoord,
}

/// Component for a bubble knocked loose from the grid, falling under
/// gravity until it leaves the field.
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct FallingBubble {
    pub kind: BubbleKind,
    pub fall_speed: f32,
}

/// Downward acceleration of falling bubbles, px/tick^2.
const FALL_GRAVITY: f32 = 0.2;

/// Number of rows filled at the start of a game.
const INITIAL_ROWS: i32 = 5;

/// Probability that an initial cell is left empty.
const INITIAL_HOLE_CHANCE: f64 = 0.3;

/// Spawn an anchored bubble and record it in the grid.
pub fn spawn_anchored_bubble(
    commands: &mut Commands,
    grid: &mut BubbleGrid,
    coord: GridCoord,
    kind: BubbleKind,
) -> Entity {
    let entity = commands
        .spawn((
            Name::new(format!("Bubble {kind:?} at {coord}")),
            Bubble { kind, coord },
            Transform::from_translation(coord.to_pixel().extend(0.0)),
            DespawnOnExit(GamePhase::Playing),
        ))
        .id();
    grid.insert(coord, entity, kind);
    entity
}

/// Detach an anchored bubble and let it fall from its cell center.
pub fn spawn_falling_bubble(commands: &mut Commands, coord: GridCoord, kind: BubbleKind) {
    commands.spawn((
        Name::new("Falling Bubble"),
        FallingBubble {
            kind,
            fall_speed: 0.0,
        },
        Transform::from_translation(coord.to_pixel().extend(0.0)),
        DespawnOnExit(GamePhase::Playing),
    ));
}

/// Fill the top rows with a random board, leaving holes for variety.
fn spawn_initial_bubbles(
    mut commands: Commands,
    mut grid: ResMut<BubbleGrid>,
    config: Res<FieldConfig>,
) {
    grid.clear();
    let mut rng = rand::rng();
    let mut count = 0;

    for row in 0..INITIAL_ROWS.min(config.rows) {
        for col in 0..config.cols {
            if rng.random_bool(INITIAL_HOLE_CHANCE) {
                continue;
            }
            let kind = BubbleKind::Color(BubbleColor::random());
            spawn_anchored_bubble(&mut commands, &mut grid, GridCoord::new(row, col), kind);
            count += 1;
        }
    }

    info!("Spawned {count} initial bubbles");
}

/// Integrate falling bubbles and despawn them once they exit the field.
fn update_falling_bubbles(
    mut commands: Commands,
    config: Res<FieldConfig>,
    mut query: Query<(Entity, &mut Transform, &mut FallingBubble)>,
) {
    for (entity, mut transform, mut falling) in &mut query {
        falling.fall_speed += FALL_GRAVITY;
        transform.translation.y += falling.fall_speed;

        if transform.translation.y > config.height + BUBBLE_RADIUS {
            commands.entity(entity).despawn();
        }
    }
}

/// Drop all grid contents when leaving gameplay; the bubble entities
/// themselves carry `DespawnOnExit`.
fn clear_grid(mut grid: ResMut<BubbleGrid>) {
    grid.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_every_color() {
        for color in BubbleColor::ALL {
            assert!(BubbleKind::Wildcard.matches(BubbleKind::Color(color)));
            assert!(BubbleKind::Color(color).matches(BubbleKind::Wildcard));
        }
        assert!(BubbleKind::Wildcard.matches(BubbleKind::Wildcard));
    }

    #[test]
    fn colors_match_only_themselves() {
        assert!(BubbleKind::Color(BubbleColor::Red).matches(BubbleKind::Color(BubbleColor::Red)));
        assert!(
            !BubbleKind::Color(BubbleColor::Red).matches(BubbleKind::Color(BubbleColor::Blue))
        );
    }
}
