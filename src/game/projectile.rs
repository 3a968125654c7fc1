//! Projectile - the one free bubble in flight.
//!
//! The projectile integrates linearly each tick, bounces off the side
//! walls, and attaches to the grid when it crosses the ceiling or overlaps
//! an anchored bubble. Active modifiers bend the flight: time dilation
//! scales the integration, the magnet steers toward same-colored bubbles.

use bevy::prelude::*;

use super::{
    bubble::{spawn_anchored_bubble, BubbleKind},
    grid::{BubbleGrid, FieldConfig},
    hex::{BUBBLE_RADIUS, GridCoord},
    powerup::ModifierState,
};
use crate::{GamePhase, PausableSystems};

pub(super) fn plugin(app: &mut App) {
    app.register_type::<Projectile>();
    app.add_message::<FireProjectile>();
    app.add_message::<BubbleLanded>();

    app.add_systems(
        FixedUpdate,
        (spawn_projectile, advance_projectile)
            .chain()
            .in_set(super::SimulationSet::Motion)
            .in_set(PausableSystems)
            .run_if(in_state(GamePhase::Playing)),
    );

    app.add_systems(
        FixedUpdate,
        resolve_projectile_collision
            .in_set(super::SimulationSet::Attach)
            .in_set(PausableSystems)
            .run_if(in_state(GamePhase::Playing)),
    );
}

/// Launch speed in px/tick.
pub const SHOOT_SPEED: f32 = 20.0;

/// Magnet steering acceleration, px/tick^2.
const MAGNET_PULL: f32 = 0.5;

/// Pixel radius within which the magnet locks onto a target.
const MAGNET_RANGE: f32 = 200.0;

/// Overall speed cap while the magnet is bending the flight path.
const MAGNET_SPEED_CAP: f32 = SHOOT_SPEED * 1.5;

/// Message requesting a projectile spawn (written by the shooter).
#[derive(Message, Debug, Clone)]
pub struct FireProjectile {
    pub position: Vec2,
    pub velocity: Vec2,
    pub kind: BubbleKind,
}

/// Message sent when the projectile anchors onto the grid.
#[derive(Message, Debug, Clone)]
pub struct BubbleLanded {
    pub coord: GridCoord,
    pub kind: BubbleKind,
    pub entity: Entity,
}

/// The bubble currently in flight. At most one exists at a time.
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct Projectile {
    /// Velocity in px/tick.
    pub velocity: Vec2,
    pub kind: BubbleKind,
}

/// Spawn the projectile entity for each fire request.
fn spawn_projectile(mut commands: Commands, mut fire_events: MessageReader<FireProjectile>) {
    for event in fire_events.read() {
        commands.spawn((
            Name::new("Projectile"),
            Projectile {
                velocity: event.velocity,
                kind: event.kind,
            },
            Transform::from_translation(event.position.extend(0.0)),
            DespawnOnExit(GamePhase::Playing),
        ));
        debug!("Projectile launched at {:?}", event.velocity);
    }
}

/// One integration step with wall bounce, in field coordinates (y-down).
///
/// Crossing either vertical boundary negates the horizontal velocity and
/// clamps the bubble fully back inside, so it can neither stick to nor
/// tunnel through a wall.
pub fn integrate_with_walls(pos: Vec2, velocity: &mut Vec2, time_factor: f32, width: f32) -> Vec2 {
    let mut next = pos + *velocity * time_factor;

    if next.x - BUBBLE_RADIUS < 0.0 {
        next.x = BUBBLE_RADIUS;
        velocity.x = velocity.x.abs();
    } else if next.x + BUBBLE_RADIUS > width {
        next.x = width - BUBBLE_RADIUS;
        velocity.x = -velocity.x.abs();
    }

    next
}

/// Steer `velocity` toward `target` by the magnet pull, capping speed.
fn apply_magnet_pull(velocity: Vec2, from: Vec2, target: Vec2) -> Vec2 {
    let Some(direction) = (target - from).try_normalize() else {
        return velocity;
    };
    let pulled = velocity + direction * MAGNET_PULL;
    pulled.clamp_length_max(MAGNET_SPEED_CAP)
}

/// Advance the projectile: magnet steering, then linear integration with
/// wall bounce, scaled by any active time dilation.
fn advance_projectile(
    grid: Res<BubbleGrid>,
    config: Res<FieldConfig>,
    modifiers: Res<ModifierState>,
    mut query: Query<(&mut Transform, &mut Projectile)>,
) {
    for (mut transform, mut projectile) in &mut query {
        let pos = transform.translation.truncate();

        if modifiers.magnet_active() {
            if let Some(target) = nearest_same_color(&grid, pos, projectile.kind) {
                projectile.velocity = apply_magnet_pull(projectile.velocity, pos, target);
            }
        }

        let mut velocity = projectile.velocity;
        let next = integrate_with_walls(pos, &mut velocity, modifiers.time_factor, config.width);
        projectile.velocity = velocity;
        transform.translation = next.extend(0.0);
    }
}

/// Center of the nearest anchored bubble sharing the projectile's color,
/// within magnet range. Wildcards have no color and are never targets.
fn nearest_same_color(grid: &BubbleGrid, from: Vec2, kind: BubbleKind) -> Option<Vec2> {
    let BubbleKind::Color(color) = kind else {
        return None;
    };

    let mut best: Option<(f32, Vec2)> = None;
    for (coord, cell) in grid.iter() {
        if cell.kind != BubbleKind::Color(color) {
            continue;
        }
        let center = coord.to_pixel();
        let dist = from.distance(center);
        if dist < MAGNET_RANGE && best.is_none_or(|(d, _)| dist < d) {
            best = Some((dist, center));
        }
    }
    best.map(|(_, center)| center)
}

/// Resolve ceiling and bubble collisions, anchoring the projectile.
///
/// When no empty cell exists near the collision point the projectile is
/// simply discarded - the documented attach-failure policy, not an error.
fn resolve_projectile_collision(
    mut commands: Commands,
    mut grid: ResMut<BubbleGrid>,
    config: Res<FieldConfig>,
    query: Query<(Entity, &Transform, &Projectile)>,
    mut landed: MessageWriter<BubbleLanded>,
) {
    for (entity, transform, projectile) in &query {
        let pos = transform.translation.truncate();

        let hit_ceiling = pos.y - BUBBLE_RADIUS <= 0.0;
        let hit_bubble = !hit_ceiling
            && grid
                .iter()
                .any(|(coord, _)| pos.distance(coord.to_pixel()) < BUBBLE_RADIUS * 2.0);

        if !hit_ceiling && !hit_bubble {
            continue;
        }

        commands.entity(entity).despawn();

        match grid.resolve_attach_cell(pos, &config) {
            Some(coord) => {
                let new_entity =
                    spawn_anchored_bubble(&mut commands, &mut grid, coord, projectile.kind);
                landed.write(BubbleLanded {
                    coord,
                    kind: projectile.kind,
                    entity: new_entity,
                });
                debug!("Projectile anchored at {coord}");
            }
            None => {
                debug!("No free cell near {pos:?}; projectile discarded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_bounce_reflects_and_clamps() {
        let mut velocity = Vec2::new(-30.0, -5.0);
        let next = integrate_with_walls(Vec2::new(25.0, 300.0), &mut velocity, 1.0, 800.0);

        assert_eq!(next.x, BUBBLE_RADIUS);
        assert!(velocity.x > 0.0);
        // Vertical motion is unaffected by the bounce.
        assert_eq!(next.y, 295.0);
    }

    #[test]
    fn right_wall_bounce_mirrors_left() {
        let mut velocity = Vec2::new(30.0, -5.0);
        let next = integrate_with_walls(Vec2::new(790.0, 300.0), &mut velocity, 1.0, 800.0);

        assert_eq!(next.x, 800.0 - BUBBLE_RADIUS);
        assert!(velocity.x < 0.0);
    }

    #[test]
    fn time_dilation_halves_displacement() {
        let mut velocity = Vec2::new(0.0, -20.0);
        let next = integrate_with_walls(Vec2::new(400.0, 300.0), &mut velocity, 0.5, 800.0);

        assert_eq!(next.y, 290.0);
        // Velocity itself stays unscaled; only the step shrinks.
        assert_eq!(velocity.y, -20.0);
    }

    #[test]
    fn magnet_pull_caps_overall_speed() {
        let mut velocity = Vec2::new(0.0, -SHOOT_SPEED * 1.5);
        for _ in 0..100 {
            velocity = apply_magnet_pull(velocity, Vec2::new(400.0, 300.0), Vec2::new(500.0, 100.0));
        }
        assert!(velocity.length() <= MAGNET_SPEED_CAP + 1e-3);
    }
}
