//! Power-ups - collectible drops and the modifier state machine.
//!
//! A qualifying pop may spawn a drop that falls toward the shooter,
//! accelerating onto the projectile once it strays into attraction range.
//! Collection either applies an instant effect (area clear, column clear,
//! wildcard) or feeds the one-slot active/stored modifier machine:
//! `Falling -> Collected -> {Instant | Active(timer) | Stored}`,
//! `Active -> Expired` on timer zero, `Stored -> Active` on the external
//! trigger only.

use bevy::prelude::*;
use rand::Rng;
use std::collections::HashMap;

use super::{
    bubble::BubbleKind,
    cluster::{run_floating_pass, BubbleDescriptor, ClusterPopped, FloatingDropped},
    grid::{BubbleGrid, FieldConfig},
    hex::{BUBBLE_RADIUS, GridCoord},
    projectile::Projectile,
    score::GameScore,
};
use crate::{GamePhase, PausableSystems};

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<ModifierState>();
    app.init_resource::<PowerupStats>();
    app.add_message::<UseStoredPowerup>();
    app.add_message::<PowerupCollected>();
    app.add_message::<PowerupActivated>();
    app.add_message::<PowerupExpired>();

    app.add_systems(OnEnter(GamePhase::Playing), reset_modifiers);

    app.add_systems(
        FixedUpdate,
        (
            spawn_drops_on_pop,
            update_drops,
            collect_drops,
            trigger_stored_powerup,
            tick_modifier_timer,
        )
            .chain()
            .in_set(super::SimulationSet::Powerups)
            .in_set(PausableSystems)
            .run_if(in_state(GamePhase::Playing)),
    );
}

/// The seven effect kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum PowerupKind {
    AreaClear,
    ColumnClear,
    ColorWildcard,
    Freeze,
    Magnet,
    TimeDilation,
    MultiShot,
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 7] = [
        PowerupKind::AreaClear,
        PowerupKind::ColumnClear,
        PowerupKind::ColorWildcard,
        PowerupKind::Freeze,
        PowerupKind::Magnet,
        PowerupKind::TimeDilation,
        PowerupKind::MultiShot,
    ];

    /// Instant kinds consume on collection and never touch the slots.
    pub fn is_instant(self) -> bool {
        matches!(
            self,
            PowerupKind::AreaClear | PowerupKind::ColumnClear | PowerupKind::ColorWildcard
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            PowerupKind::AreaClear => "area clear",
            PowerupKind::ColumnClear => "column clear",
            PowerupKind::ColorWildcard => "color wildcard",
            PowerupKind::Freeze => "freeze",
            PowerupKind::Magnet => "magnet",
            PowerupKind::TimeDilation => "time dilation",
            PowerupKind::MultiShot => "multi-shot",
        }
    }

    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

/// Duration of every timed modifier, in ticks (5 s at 60 Hz).
pub const MODIFIER_DURATION_TICKS: u32 = 300;

/// Score for collecting any drop, before effect scores.
const COLLECT_SCORE: u32 = 50;

/// Grid radius of the area-clear blast.
const AREA_CLEAR_RADIUS: i32 = 3;

/// Points per bubble removed by area clear.
const AREA_CLEAR_POINTS: u32 = 15;

/// Points per bubble removed by column clear.
const COLUMN_CLEAR_POINTS: u32 = 20;

/// Velocity integration factor while time dilation is active.
const TIME_DILATION_FACTOR: f32 = 0.5;

/// Automatic shots granted by multi-shot.
const MULTI_SHOT_COUNT: u8 = 3;

/// Base probability that a pop spawns a drop.
const DROP_BASE_CHANCE: f64 = 0.1;

/// Extra spawn probability per popped bubble, and its cap.
const DROP_CHANCE_PER_BUBBLE: f64 = 0.05;
const DROP_CHANCE_BONUS_CAP: f64 = 0.4;

/// Fall speed of a drop, px/tick.
const DROP_FALL_SPEED: f32 = 2.0;

/// Radius of the drop's collision circle.
const DROP_RADIUS: f32 = BUBBLE_RADIUS * 0.8;

/// Distance at which a drop starts accelerating toward the projectile.
const ATTRACTION_RANGE: f32 = 100.0;

/// Attraction acceleration and speed cap, px/tick^2 and px/tick.
const ATTRACTION_ACCEL: f32 = 0.2;
const ATTRACTION_MAX_SPEED: f32 = 8.0;

/// External command: activate whatever occupies the stored slot.
#[derive(Message, Debug, Clone, Default)]
pub struct UseStoredPowerup;

/// Message sent when a drop is collected. `score_delta` includes the
/// collection bonus plus any instant-effect score.
#[derive(Message, Debug, Clone)]
pub struct PowerupCollected {
    pub kind: PowerupKind,
    pub score_delta: u32,
}

/// Message sent when a timed modifier becomes active.
#[derive(Message, Debug, Clone)]
pub struct PowerupActivated {
    pub kind: PowerupKind,
}

/// Message sent when the active modifier's timer runs out.
#[derive(Message, Debug, Clone)]
pub struct PowerupExpired {
    pub kind: PowerupKind,
}

/// What happened to a collected power-up under the slot policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Instant kind; apply the effect now.
    Instant(PowerupKind),
    /// No modifier was active; the new one is now.
    Activated(PowerupKind),
    /// A modifier was active and the stored slot was free.
    Stored(PowerupKind),
    /// Both slots were full: the previously stored modifier was promoted
    /// to active and the new one took its place in storage.
    Swapped {
        promoted: PowerupKind,
        stored: PowerupKind,
    },
}

/// The currently active timed modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveModifier {
    pub kind: PowerupKind,
    pub ticks_left: u32,
}

/// Global modifier state: at most one active and one stored power-up,
/// plus the effect-specific values the rest of the core reads each tick.
#[derive(Resource, Debug)]
pub struct ModifierState {
    active: Option<ActiveModifier>,
    stored: Option<PowerupKind>,
    /// Projectile integration scale; 1.0 unless time dilation is active.
    pub time_factor: f32,
    /// Automatic shots remaining from multi-shot.
    pub multi_shots_left: u8,
}

impl Default for ModifierState {
    fn default() -> Self {
        Self {
            active: None,
            stored: None,
            time_factor: 1.0,
            multi_shots_left: 0,
        }
    }
}

impl ModifierState {
    pub fn active(&self) -> Option<ActiveModifier> {
        self.active
    }

    pub fn stored(&self) -> Option<PowerupKind> {
        self.stored
    }

    fn active_kind_is(&self, kind: PowerupKind) -> bool {
        self.active.is_some_and(|a| a.kind == kind)
    }

    pub fn magnet_active(&self) -> bool {
        self.active_kind_is(PowerupKind::Magnet)
    }

    /// Cosmetic flag for renderers; freeze has no gameplay effect.
    pub fn freeze_active(&self) -> bool {
        self.active_kind_is(PowerupKind::Freeze)
    }

    pub fn multi_shot_active(&self) -> bool {
        self.active_kind_is(PowerupKind::MultiShot) && self.multi_shots_left > 0
    }

    /// Route a collected power-up through the slot policy.
    ///
    /// Instant kinds always apply immediately regardless of slot
    /// occupancy. A timed kind activates if nothing is active, stores if
    /// only the active slot is taken, and otherwise swaps: the stored one
    /// is promoted over the expiring active effect and the new collection
    /// takes the stored slot.
    pub fn collect(&mut self, kind: PowerupKind) -> CollectOutcome {
        if kind.is_instant() {
            return CollectOutcome::Instant(kind);
        }

        match (self.active, self.stored) {
            (None, _) => {
                self.activate(kind);
                CollectOutcome::Activated(kind)
            }
            (Some(_), None) => {
                self.stored = Some(kind);
                CollectOutcome::Stored(kind)
            }
            (Some(_), Some(previously_stored)) => {
                self.stored = Some(kind);
                self.activate(previously_stored);
                CollectOutcome::Swapped {
                    promoted: previously_stored,
                    stored: kind,
                }
            }
        }
    }

    /// Activate the stored modifier, emptying the slot.
    pub fn trigger_stored(&mut self) -> Option<PowerupKind> {
        let kind = self.stored.take()?;
        self.activate(kind);
        Some(kind)
    }

    /// Count down the active timer; returns the kind that just expired.
    pub fn tick(&mut self) -> Option<PowerupKind> {
        let active = self.active.as_mut()?;
        active.ticks_left = active.ticks_left.saturating_sub(1);
        if active.ticks_left > 0 {
            return None;
        }

        let kind = active.kind;
        self.reset_effect(kind);
        self.active = None;
        Some(kind)
    }

    fn activate(&mut self, kind: PowerupKind) {
        // Replacing an active modifier ends its effect now rather than at
        // its original expiry.
        if let Some(previous) = self.active.take() {
            self.reset_effect(previous.kind);
        }

        self.active = Some(ActiveModifier {
            kind,
            ticks_left: MODIFIER_DURATION_TICKS,
        });

        match kind {
            PowerupKind::TimeDilation => self.time_factor = TIME_DILATION_FACTOR,
            PowerupKind::MultiShot => self.multi_shots_left = MULTI_SHOT_COUNT,
            _ => {}
        }
    }

    fn reset_effect(&mut self, kind: PowerupKind) {
        match kind {
            PowerupKind::TimeDilation => self.time_factor = 1.0,
            PowerupKind::MultiShot => self.multi_shots_left = 0,
            _ => {}
        }
    }
}

/// Per-kind collection counters for the current game.
#[derive(Resource, Debug, Default)]
pub struct PowerupStats {
    counts: HashMap<PowerupKind, u32>,
}

impl PowerupStats {
    pub fn record(&mut self, kind: PowerupKind) {
        *self.counts.entry(kind).or_default() += 1;
    }

    pub fn count(&self, kind: PowerupKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }
}

/// A power-up drop falling through the field.
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct PowerupDrop {
    pub kind: PowerupKind,
    /// Set once the drop has locked onto the projectile.
    attracted: bool,
    attraction_speed: f32,
}

/// Cells hit by an area-clear blast centered on `center`: circular test
/// in grid coordinates, dr^2 + dc^2 <= R^2.
fn area_clear_cells(grid: &BubbleGrid, center: GridCoord) -> Vec<GridCoord> {
    let r2 = AREA_CLEAR_RADIUS * AREA_CLEAR_RADIUS;
    grid.coords()
        .filter(|coord| {
            let dr = coord.row - center.row;
            let dc = coord.col - center.col;
            dr * dr + dc * dc <= r2
        })
        .collect()
}

/// Every occupied cell of the most-occupied column. Ties go to the
/// lowest column index.
fn column_clear_cells(grid: &BubbleGrid, config: &FieldConfig) -> Vec<GridCoord> {
    let counts = grid.column_counts(config);

    let mut target_col = None;
    let mut best = 0usize;
    for (col, &count) in counts.iter().enumerate() {
        if count > best {
            best = count;
            target_col = Some(col as i32);
        }
    }
    let Some(target_col) = target_col else {
        return Vec::new();
    };

    grid.coords().filter(|c| c.col == target_col).collect()
}

fn reset_modifiers(mut modifiers: ResMut<ModifierState>, mut stats: ResMut<PowerupStats>) {
    *modifiers = ModifierState::default();
    *stats = PowerupStats::default();
}

/// Roll for a drop after each pop; bigger clusters spawn more often.
fn spawn_drops_on_pop(mut commands: Commands, mut popped: MessageReader<ClusterPopped>) {
    for event in popped.read() {
        let chance = DROP_BASE_CHANCE
            + (event.bubbles.len() as f64 * DROP_CHANCE_PER_BUBBLE).min(DROP_CHANCE_BONUS_CAP);

        let mut rng = rand::rng();
        if !rng.random_bool(chance.min(1.0)) {
            continue;
        }

        let kind = PowerupKind::random();
        info!("Power-up drop spawned: {}", kind.name());
        commands.spawn((
            Name::new(format!("Powerup Drop ({})", kind.name())),
            PowerupDrop {
                kind,
                attracted: false,
                attraction_speed: 0.0,
            },
            Transform::from_translation(event.origin.to_pixel().extend(0.0)),
            DespawnOnExit(GamePhase::Playing),
        ));
    }
}

/// Move drops: plain gravity until the projectile comes within range,
/// then accelerate onto it. Drops leaving the field despawn.
fn update_drops(
    mut commands: Commands,
    config: Res<FieldConfig>,
    projectile: Query<&Transform, With<Projectile>>,
    mut drops: Query<(Entity, &mut Transform, &mut PowerupDrop), Without<Projectile>>,
) {
    let target = projectile.single().ok().map(|t| t.translation.truncate());

    for (entity, mut transform, mut drop) in &mut drops {
        let pos = transform.translation.truncate();

        if let Some(target) = target {
            if !drop.attracted && pos.distance(target) < ATTRACTION_RANGE {
                drop.attracted = true;
            }

            if drop.attracted {
                drop.attraction_speed =
                    (drop.attraction_speed + ATTRACTION_ACCEL).min(ATTRACTION_MAX_SPEED);
                if let Some(direction) = (target - pos).try_normalize() {
                    transform.translation += (direction * drop.attraction_speed).extend(0.0);
                }
                continue;
            }
        } else {
            // Lock is lost when the projectile lands; resume falling.
            drop.attracted = false;
            drop.attraction_speed = 0.0;
        }

        transform.translation.y += DROP_FALL_SPEED;
        if transform.translation.y > config.height + DROP_RADIUS {
            commands.entity(entity).despawn();
        }
    }
}

/// Collect drops that touch the projectile and apply the slot policy
/// plus any instant effect.
fn collect_drops(
    mut commands: Commands,
    mut grid: ResMut<BubbleGrid>,
    config: Res<FieldConfig>,
    mut modifiers: ResMut<ModifierState>,
    mut stats: ResMut<PowerupStats>,
    mut score: ResMut<GameScore>,
    mut projectile: Query<(&Transform, &mut Projectile)>,
    drops: Query<(Entity, &Transform, &PowerupDrop), Without<Projectile>>,
    mut collected_events: MessageWriter<PowerupCollected>,
    mut activated_events: MessageWriter<PowerupActivated>,
    mut floating_events: MessageWriter<FloatingDropped>,
) {
    let Ok((projectile_transform, mut projectile)) = projectile.single_mut() else {
        return;
    };
    let projectile_pos = projectile_transform.translation.truncate();

    for (entity, transform, drop) in &drops {
        let pos = transform.translation.truncate();
        if pos.distance(projectile_pos) >= DROP_RADIUS + BUBBLE_RADIUS {
            continue;
        }

        commands.entity(entity).despawn();
        stats.record(drop.kind);

        let mut score_delta = COLLECT_SCORE;

        match modifiers.collect(drop.kind) {
            CollectOutcome::Instant(kind) => {
                score_delta += apply_instant_effect(
                    kind,
                    pos,
                    &mut commands,
                    &mut grid,
                    &config,
                    &mut score,
                    &mut *projectile,
                    &mut floating_events,
                );
            }
            CollectOutcome::Activated(kind) => {
                activated_events.write(PowerupActivated { kind });
                info!("{} active for {MODIFIER_DURATION_TICKS} ticks", kind.name());
            }
            CollectOutcome::Stored(kind) => {
                info!("{} stored", kind.name());
            }
            CollectOutcome::Swapped { promoted, stored } => {
                activated_events.write(PowerupActivated { kind: promoted });
                info!("{} promoted from storage; {} stored", promoted.name(), stored.name());
            }
        }

        score.total += score_delta;
        collected_events.write(PowerupCollected {
            kind: drop.kind,
            score_delta,
        });
    }
}

/// Apply one instant effect; returns the effect's score contribution.
fn apply_instant_effect(
    kind: PowerupKind,
    impact: Vec2,
    commands: &mut Commands,
    grid: &mut BubbleGrid,
    config: &FieldConfig,
    score: &mut GameScore,
    projectile: &mut Projectile,
    floating_events: &mut MessageWriter<FloatingDropped>,
) -> u32 {
    match kind {
        PowerupKind::AreaClear => {
            let cells = area_clear_cells(grid, GridCoord::from_pixel(impact));
            let removed = remove_cells(commands, grid, &cells);
            run_floating_pass(commands, grid, config, floating_events, score);
            info!("Area clear removed {} bubbles", removed.len());
            removed.len() as u32 * AREA_CLEAR_POINTS
        }
        PowerupKind::ColumnClear => {
            let cells = column_clear_cells(grid, config);
            let removed = remove_cells(commands, grid, &cells);
            run_floating_pass(commands, grid, config, floating_events, score);
            info!("Column clear removed {} bubbles", removed.len());
            removed.len() as u32 * COLUMN_CLEAR_POINTS
        }
        PowerupKind::ColorWildcard => {
            projectile.kind = BubbleKind::Wildcard;
            info!("Projectile is now a wildcard");
            0
        }
        // Timed kinds never reach this path.
        _ => 0,
    }
}

fn remove_cells(
    commands: &mut Commands,
    grid: &mut BubbleGrid,
    cells: &[GridCoord],
) -> Vec<BubbleDescriptor> {
    let mut removed = Vec::with_capacity(cells.len());
    for coord in cells {
        if let Some(cell) = grid.remove(*coord) {
            commands.entity(cell.entity).despawn();
            removed.push(BubbleDescriptor {
                kind: cell.kind,
                position: coord.to_pixel(),
            });
        }
    }
    removed
}

/// Handle the external "use stored power-up" trigger.
fn trigger_stored_powerup(
    mut modifiers: ResMut<ModifierState>,
    mut triggers: MessageReader<UseStoredPowerup>,
    mut activated_events: MessageWriter<PowerupActivated>,
) {
    for _ in triggers.read() {
        if let Some(kind) = modifiers.trigger_stored() {
            activated_events.write(PowerupActivated { kind });
            info!("Stored {} manually activated", kind.name());
        }
    }
}

/// Count the active modifier down and announce expiry.
fn tick_modifier_timer(
    mut modifiers: ResMut<ModifierState>,
    mut expired_events: MessageWriter<PowerupExpired>,
) {
    if let Some(kind) = modifiers.tick() {
        expired_events.write(PowerupExpired { kind });
        info!("{} expired", kind.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::bubble::BubbleColor;

    fn fill(grid: &mut BubbleGrid, coords: &[(i32, i32)]) {
        for &(row, col) in coords {
            grid.insert(
                GridCoord::new(row, col),
                Entity::PLACEHOLDER,
                BubbleKind::Color(BubbleColor::Red),
            );
        }
    }

    #[test]
    fn instant_kind_bypasses_the_slots() {
        let mut state = ModifierState::default();
        state.collect(PowerupKind::Magnet);

        let outcome = state.collect(PowerupKind::AreaClear);
        assert_eq!(outcome, CollectOutcome::Instant(PowerupKind::AreaClear));
        // The active magnet is untouched.
        assert!(state.magnet_active());
        assert_eq!(state.stored(), None);
    }

    #[test]
    fn timed_kind_activates_when_nothing_is_active() {
        let mut state = ModifierState::default();

        let outcome = state.collect(PowerupKind::TimeDilation);
        assert_eq!(outcome, CollectOutcome::Activated(PowerupKind::TimeDilation));
        assert_eq!(state.time_factor, 0.5);
        assert_eq!(
            state.active().map(|a| a.ticks_left),
            Some(MODIFIER_DURATION_TICKS)
        );
    }

    #[test]
    fn second_timed_kind_goes_to_storage_without_effect() {
        let mut state = ModifierState::default();
        state.collect(PowerupKind::Magnet);

        let outcome = state.collect(PowerupKind::TimeDilation);
        assert_eq!(outcome, CollectOutcome::Stored(PowerupKind::TimeDilation));
        // Stored means dormant: no dilation yet, magnet still active.
        assert_eq!(state.time_factor, 1.0);
        assert!(state.magnet_active());
    }

    #[test]
    fn third_timed_kind_swaps_storage_into_the_active_slot() {
        let mut state = ModifierState::default();
        state.collect(PowerupKind::Magnet); // A: active
        state.collect(PowerupKind::TimeDilation); // B: stored

        let outcome = state.collect(PowerupKind::Freeze); // C
        assert_eq!(
            outcome,
            CollectOutcome::Swapped {
                promoted: PowerupKind::TimeDilation,
                stored: PowerupKind::Freeze,
            }
        );
        // B replaced A's effect and C waits in storage.
        assert_eq!(state.active().map(|a| a.kind), Some(PowerupKind::TimeDilation));
        assert_eq!(state.time_factor, 0.5);
        assert_eq!(state.stored(), Some(PowerupKind::Freeze));
        assert!(!state.magnet_active());
    }

    #[test]
    fn manual_trigger_activates_and_empties_storage() {
        let mut state = ModifierState::default();
        state.collect(PowerupKind::Freeze);
        state.collect(PowerupKind::MultiShot);

        assert_eq!(state.trigger_stored(), Some(PowerupKind::MultiShot));
        assert_eq!(state.stored(), None);
        assert_eq!(state.multi_shots_left, 3);
        assert!(state.multi_shot_active());

        // Nothing left to trigger.
        assert_eq!(state.trigger_stored(), None);
    }

    #[test]
    fn expiry_resets_effect_state() {
        let mut state = ModifierState::default();
        state.collect(PowerupKind::TimeDilation);

        for _ in 0..MODIFIER_DURATION_TICKS - 1 {
            assert_eq!(state.tick(), None);
        }
        assert_eq!(state.tick(), Some(PowerupKind::TimeDilation));
        assert_eq!(state.time_factor, 1.0);
        assert_eq!(state.active(), None);

        // Ticking with nothing active is a no-op.
        assert_eq!(state.tick(), None);
    }

    #[test]
    fn area_clear_uses_circular_grid_distance() {
        let mut grid = BubbleGrid::default();
        // Center, a cell at distance 3 (on the circle), and one at
        // distance sqrt(10) (outside it).
        fill(&mut grid, &[(5, 5), (5, 8), (8, 6)]);

        let mut cells = area_clear_cells(&grid, GridCoord::new(5, 5));
        cells.sort_by_key(|c| (c.row, c.col));
        assert_eq!(cells, vec![GridCoord::new(5, 5), GridCoord::new(5, 8)]);
    }

    #[test]
    fn column_clear_targets_the_fullest_column() {
        let mut grid = BubbleGrid::default();
        let config = FieldConfig::default();
        fill(
            &mut grid,
            &[
                (0, 7),
                (1, 7),
                (2, 7),
                (3, 7),
                (4, 7),
                (5, 7),
                (6, 7),
                (7, 7),
                (0, 2),
                (1, 2),
            ],
        );

        let cells = column_clear_cells(&grid, &config);
        assert_eq!(cells.len(), 8);
        assert!(cells.iter().all(|c| c.col == 7));
        // Worth count x 20 points.
        assert_eq!(cells.len() as u32 * COLUMN_CLEAR_POINTS, 160);
    }

    #[test]
    fn column_clear_tie_picks_the_lowest_column() {
        let mut grid = BubbleGrid::default();
        let config = FieldConfig::default();
        fill(&mut grid, &[(0, 9), (1, 9), (0, 4), (1, 4)]);

        let cells = column_clear_cells(&grid, &config);
        assert!(cells.iter().all(|c| c.col == 4));
    }
}
