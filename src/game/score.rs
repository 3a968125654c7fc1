//! Score, combo, and the terminal game-over check.
//!
//! The combo counter climbs by one per consecutive clear and resets on
//! any attach that fails to clear; it multiplies match scores, capped.

use bevy::prelude::*;

use super::grid::{BubbleGrid, FieldConfig};
use crate::{GamePhase, PausableSystems};

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<GameScore>();
    app.register_type::<GameScore>();
    app.add_message::<GameOver>();

    app.add_systems(OnEnter(GamePhase::Playing), reset_score);

    app.add_systems(
        FixedUpdate,
        (tick_elapsed, check_game_over)
            .chain()
            .in_set(super::SimulationSet::Scoring)
            .in_set(PausableSystems)
            .run_if(in_state(GamePhase::Playing)),
    );
}

/// Largest combo multiplier a streak can reach.
pub const COMBO_CAP: u32 = 5;

/// Message sent once when the simulation reaches its terminal state.
#[derive(Message, Debug, Clone)]
pub struct GameOver {
    pub score: u32,
    pub shots_fired: u32,
    pub ticks_elapsed: u32,
}

/// Running score and game statistics.
#[derive(Resource, Debug, Default, Reflect)]
#[reflect(Resource)]
pub struct GameScore {
    pub total: u32,
    /// Consecutive-clear counter; 0 after any non-clearing attach.
    pub combo: u32,
    pub bubbles_popped: u32,
    pub shots_fired: u32,
    pub ticks_elapsed: u32,
}

impl GameScore {
    /// The multiplier applied to match scores, `min(combo, 5)`.
    pub fn combo_multiplier(&self) -> u32 {
        self.combo.min(COMBO_CAP)
    }

    /// Points per shot, for the leaderboard.
    pub fn efficiency(&self) -> f32 {
        self.total as f32 / self.shots_fired.max(1) as f32
    }

    /// Elapsed play time in whole seconds at the fixed tick rate.
    pub fn elapsed_secs(&self) -> u32 {
        self.ticks_elapsed / crate::TICK_HZ as u32
    }
}

fn reset_score(mut score: ResMut<GameScore>) {
    *score = GameScore::default();
}

fn tick_elapsed(mut score: ResMut<GameScore>) {
    score.ticks_elapsed += 1;
}

/// The game ends when any anchored bubble reaches the bottom-most row.
fn check_game_over(
    grid: Res<BubbleGrid>,
    config: Res<FieldConfig>,
    score: Res<GameScore>,
    mut game_over: MessageWriter<GameOver>,
    mut next_phase: ResMut<NextState<GamePhase>>,
) {
    if !grid.bottom_row_reached(&config) {
        return;
    }

    info!(
        "Game over: final score {} in {} shots",
        score.total, score.shots_fired
    );
    game_over.write(GameOver {
        score: score.total,
        shots_fired: score.shots_fired,
        ticks_elapsed: score.ticks_elapsed,
    });
    next_phase.set(GamePhase::GameOver);
}
