//! The simulation core.
//!
//! One module per concern, each contributing a plugin:
//! - Hexagonal addressing and the bubble grid
//! - Bubble entities and colors
//! - Shooter and projectile flight
//! - Cluster matching and floating-bubble removal
//! - Power-up drops and the modifier state machine
//! - Score, combo, and the leaderboard

pub mod bubble;
pub mod cluster;
pub mod grid;
pub mod hex;
pub mod highscore;
pub mod powerup;
pub mod projectile;
pub mod score;
pub mod shooter;

use bevy::prelude::*;

pub(super) fn plugin(app: &mut App) {
    // The per-tick sequence is a fixed contract: fire intake, motion,
    // attachment, match then floating evaluation, power-up bookkeeping,
    // scoring. A clear is fully applied before the floating pass runs, so
    // a cleared cell can never itself be flagged floating.
    app.configure_sets(
        FixedUpdate,
        (
            SimulationSet::Input,
            SimulationSet::Motion,
            SimulationSet::Attach,
            SimulationSet::Connectivity,
            SimulationSet::Powerups,
            SimulationSet::Scoring,
        )
            .chain(),
    );

    app.add_plugins((
        grid::plugin,
        bubble::plugin,
        shooter::plugin,
        projectile::plugin,
        cluster::plugin,
        powerup::plugin,
        score::plugin,
        highscore::plugin,
    ));
}

/// Stages of one simulation tick, executed in declaration order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    /// External fire/trigger command intake.
    Input,
    /// Projectile, falling-bubble, and drop motion.
    Motion,
    /// Collision resolution and grid attachment.
    Attach,
    /// Match clusters, then floating clusters.
    Connectivity,
    /// Drop collection, effects, and modifier timers.
    Powerups,
    /// Score bookkeeping and the game-over check.
    Scoring,
}
