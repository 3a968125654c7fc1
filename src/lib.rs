//! Headless match-connectivity core for a hexagonal bubble-shooter.
//!
//! The crate simulates one fixed-timestep game: a projectile fired into a
//! field of colored bubbles snaps onto a hex grid, same-color clusters of 3+
//! pop, unsupported bubbles drop, and collectible power-ups mutate the grid,
//! the projectile, or scoring. Rendering, audio, and input translation are
//! external collaborators - the embedding app drives the core through
//! messages ([`game::shooter::FireCommand`], [`game::shooter::UseStoredPowerup`])
//! and observes it through the messages the core emits each tick.

pub mod game;

use bevy::prelude::*;

/// Fixed simulation rate. All velocities and timers in the core are
/// expressed per tick at this rate.
pub const TICK_HZ: f64 = 60.0;

pub struct AppPlugin;

impl Plugin for AppPlugin {
    fn build(&self, app: &mut App) {
        // The whole simulation runs on a fixed timestep so coordinate math
        // and power-up timers stay exact and reproducible.
        app.insert_resource(Time::<Fixed>::from_hz(TICK_HZ));

        // The core runs headless on MinimalPlugins, which does not bring
        // the state machinery along.
        if !app.is_plugin_added::<bevy::state::app::StatesPlugin>() {
            app.add_plugins(bevy::state::app::StatesPlugin);
        }

        app.init_state::<GamePhase>();
        app.init_state::<Pause>();

        app.configure_sets(
            FixedUpdate,
            PausableSystems.run_if(in_state(Pause(false))),
        );

        app.add_plugins(game::plugin);
    }
}

/// Top-level phase of the simulation. External code restarts a finished
/// game by setting this back to `Playing`.
#[derive(States, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GamePhase {
    #[default]
    Playing,
    GameOver,
}

/// Whether the simulation is paused.
#[derive(States, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pause(pub bool);

/// Systems that stop ticking while the game is paused.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PausableSystems;
