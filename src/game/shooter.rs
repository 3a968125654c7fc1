//! The shooter - entry point for fire commands.
//!
//! External code aims and fires through [`FireCommand`]; the core owns
//! the loaded/next color queue so the multi-shot modifier can launch
//! follow-up shots on its own.

use bevy::prelude::*;

use super::{
    bubble::{BubbleColor, BubbleKind},
    grid::FieldConfig,
    powerup::ModifierState,
    projectile::{BubbleLanded, FireProjectile, Projectile, SHOOT_SPEED},
    score::GameScore,
};
use crate::{GamePhase, PausableSystems};

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<Shooter>();
    app.add_message::<FireCommand>();

    app.add_systems(OnEnter(GamePhase::Playing), reset_shooter);

    app.add_systems(
        FixedUpdate,
        handle_fire_commands
            .in_set(super::SimulationSet::Input)
            .in_set(PausableSystems)
            .run_if(in_state(GamePhase::Playing)),
    );

    app.add_systems(
        FixedUpdate,
        auto_fire_on_attach
            .in_set(super::SimulationSet::Powerups)
            .in_set(PausableSystems)
            .run_if(in_state(GamePhase::Playing)),
    );
}

/// Maximum launch angle either side of vertical, in degrees.
pub const MAX_ANGLE_DEG: f32 = 80.0;

/// External command: fire the loaded bubble.
///
/// `color` optionally overrides the loaded color for embedders that run
/// their own next-bubble display; `None` consumes the core's queue.
#[derive(Message, Debug, Clone)]
pub struct FireCommand {
    pub angle_deg: f32,
    pub color: Option<BubbleColor>,
}

impl FireCommand {
    pub fn at_angle(angle_deg: f32) -> Self {
        Self {
            angle_deg,
            color: None,
        }
    }
}

/// The shooter's color queue and last aim direction.
#[derive(Resource, Debug)]
pub struct Shooter {
    pub loaded: BubbleColor,
    pub next: BubbleColor,
    /// Angle of the most recent shot, reused by automatic shots.
    pub last_angle_deg: f32,
}

impl Default for Shooter {
    fn default() -> Self {
        Self {
            loaded: BubbleColor::random(),
            next: BubbleColor::random(),
            last_angle_deg: 0.0,
        }
    }
}

impl Shooter {
    /// Pop the loaded color and advance the queue.
    fn reload(&mut self) -> BubbleColor {
        let fired = self.loaded;
        self.loaded = self.next;
        self.next = BubbleColor::random();
        fired
    }
}

/// Launch velocity for a clamped angle: `(speed*sin, -speed*cos)` in the
/// y-down field (straight up at 0 degrees).
fn launch_velocity(angle_deg: f32) -> Vec2 {
    let angle = angle_deg.clamp(-MAX_ANGLE_DEG, MAX_ANGLE_DEG).to_radians();
    Vec2::new(SHOOT_SPEED * angle.sin(), -SHOOT_SPEED * angle.cos())
}

fn reset_shooter(mut shooter: ResMut<Shooter>) {
    *shooter = Shooter::default();
}

/// Turn external fire commands into projectile spawns. Ignored while a
/// projectile is already in flight - one bubble at a time.
fn handle_fire_commands(
    mut shooter: ResMut<Shooter>,
    config: Res<FieldConfig>,
    mut score: ResMut<GameScore>,
    mut commands_in: MessageReader<FireCommand>,
    mut fire_out: MessageWriter<FireProjectile>,
    in_flight: Query<(), With<Projectile>>,
) {
    for command in commands_in.read() {
        if !in_flight.is_empty() {
            continue;
        }

        let color = match command.color {
            Some(color) => {
                shooter.loaded = color;
                shooter.reload()
            }
            None => shooter.reload(),
        };
        shooter.last_angle_deg = command.angle_deg.clamp(-MAX_ANGLE_DEG, MAX_ANGLE_DEG);
        score.shots_fired += 1;

        fire_out.write(FireProjectile {
            position: Vec2::new(config.width / 2.0, config.shooter_y),
            velocity: launch_velocity(command.angle_deg),
            kind: BubbleKind::Color(color),
        });
        info!("Fired {color:?} at {:.1} degrees", shooter.last_angle_deg);
    }
}

/// While multi-shot is active, every successful attach immediately
/// launches the next loaded bubble at the last aim angle. Automatic
/// shots do not count toward `shots_fired`.
fn auto_fire_on_attach(
    mut shooter: ResMut<Shooter>,
    config: Res<FieldConfig>,
    mut modifiers: ResMut<ModifierState>,
    mut landed: MessageReader<BubbleLanded>,
    mut fire_out: MessageWriter<FireProjectile>,
) {
    for _ in landed.read() {
        if !modifiers.multi_shot_active() {
            continue;
        }
        modifiers.multi_shots_left -= 1;

        let color = shooter.reload();
        fire_out.write(FireProjectile {
            position: Vec2::new(config.width / 2.0, config.shooter_y),
            velocity: launch_velocity(shooter.last_angle_deg),
            kind: BubbleKind::Color(color),
        });
        info!(
            "Multi-shot fired {color:?}, {} shots left",
            modifiers.multi_shots_left
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_angle_is_clamped() {
        let velocity = launch_velocity(120.0);
        let clamped = launch_velocity(MAX_ANGLE_DEG);
        assert!((velocity - clamped).length() < 1e-5);
    }

    #[test]
    fn straight_shot_goes_up() {
        let velocity = launch_velocity(0.0);
        assert!(velocity.x.abs() < 1e-5);
        assert_eq!(velocity.y, -SHOOT_SPEED);
    }

    #[test]
    fn launch_speed_is_constant() {
        for angle in [-80.0, -35.0, 10.0, 55.0] {
            assert!((launch_velocity(angle).length() - SHOOT_SPEED).abs() < 1e-4);
        }
    }

    #[test]
    fn reload_advances_the_queue() {
        let mut shooter = Shooter {
            loaded: BubbleColor::Red,
            next: BubbleColor::Blue,
            last_angle_deg: 0.0,
        };

        assert_eq!(shooter.reload(), BubbleColor::Red);
        assert_eq!(shooter.loaded, BubbleColor::Blue);
    }
}
