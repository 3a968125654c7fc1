//! Headless demo driver: runs the simulation at 60 Hz with scripted
//! shots and prints every event the core emits. Useful for eyeballing
//! the engine without a renderer.

use std::time::Duration;

use bevy::{app::ScheduleRunnerPlugin, log::LogPlugin, prelude::*};

use hexpop::{
    game::{
        cluster::{ClusterPopped, FloatingDropped},
        powerup::{PowerupActivated, PowerupCollected, PowerupExpired, UseStoredPowerup},
        score::{GameOver, GameScore},
        shooter::FireCommand,
    },
    AppPlugin,
};

/// Ticks between scripted shots.
const SHOT_INTERVAL: u32 = 75;

/// Ticks between attempts to use the stored power-up.
const TRIGGER_INTERVAL: u32 = 600;

/// Hard stop for the demo, in ticks.
const MAX_TICKS: u32 = 7200;

fn main() {
    App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / 60.0,
            ))),
        )
        .add_plugins(LogPlugin::default())
        .add_plugins(AppPlugin)
        .add_systems(Update, (drive_shots, report_events))
        .run();
}

/// Fire on a fixed cadence, sweeping the aim back and forth.
fn drive_shots(
    score: Res<GameScore>,
    mut fire: MessageWriter<FireCommand>,
    mut trigger: MessageWriter<UseStoredPowerup>,
    mut last_shot_tick: Local<u32>,
) {
    let tick = score.ticks_elapsed;

    if tick >= *last_shot_tick + SHOT_INTERVAL {
        *last_shot_tick = tick;
        let angle = 60.0 * (tick as f32 * 0.011).sin();
        fire.write(FireCommand::at_angle(angle));
    }

    if tick > 0 && tick % TRIGGER_INTERVAL == 0 {
        trigger.write(UseStoredPowerup);
    }
}

/// Print core events and stop on game over (or the tick cap).
fn report_events(
    score: Res<GameScore>,
    mut popped: MessageReader<ClusterPopped>,
    mut dropped: MessageReader<FloatingDropped>,
    mut collected: MessageReader<PowerupCollected>,
    mut activated: MessageReader<PowerupActivated>,
    mut expired: MessageReader<PowerupExpired>,
    mut game_over: MessageReader<GameOver>,
    mut app_exit: MessageWriter<AppExit>,
) {
    for event in popped.read() {
        info!(
            "cluster popped: {} bubbles at {} (+{})",
            event.bubbles.len(),
            event.origin,
            event.score_delta
        );
    }
    for event in dropped.read() {
        info!(
            "floating drop: {} bubbles (+{})",
            event.bubbles.len(),
            event.score_delta
        );
    }
    for event in collected.read() {
        info!("power-up collected: {} (+{})", event.kind.name(), event.score_delta);
    }
    for event in activated.read() {
        info!("power-up active: {}", event.kind.name());
    }
    for event in expired.read() {
        info!("power-up expired: {}", event.kind.name());
    }

    for event in game_over.read() {
        info!(
            "game over: score {} in {} shots over {}s",
            event.score,
            event.shots_fired,
            event.ticks_elapsed / 60
        );
        app_exit.write(AppExit::Success);
    }

    if score.ticks_elapsed >= MAX_TICKS {
        info!("demo cap reached, final score {}", score.total);
        app_exit.write(AppExit::Success);
    }
}
