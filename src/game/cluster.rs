//! Connectivity - match detection and floating-cluster removal.
//!
//! Both passes are iterative flood fills (queue + visited set; the hex
//! mesh is full of cycles) over the grid snapshot. Wildcard evaluation
//! never mutates the grid: hypothetical origin colors are substituted
//! during traversal instead.

use bevy::prelude::*;
use std::collections::{HashSet, VecDeque};

use super::{
    bubble::{spawn_falling_bubble, BubbleColor, BubbleKind},
    grid::{BubbleGrid, FieldConfig},
    hex::GridCoord,
    projectile::BubbleLanded,
    score::GameScore,
};
use crate::{GamePhase, PausableSystems};

pub(super) fn plugin(app: &mut App) {
    app.add_message::<ClusterPopped>();
    app.add_message::<FloatingDropped>();

    app.add_systems(
        FixedUpdate,
        (detect_clusters, detect_floating_bubbles)
            .chain()
            .in_set(super::SimulationSet::Connectivity)
            .in_set(PausableSystems)
            .run_if(in_state(GamePhase::Playing)),
    );
}

/// Minimum cluster size that pops.
pub const MIN_CLUSTER_SIZE: usize = 3;

/// Points per bubble in a popped cluster, before the combo multiplier.
pub const POINTS_PER_MATCHED_BUBBLE: u32 = 10;

/// Points per bubble dropped by the floating pass.
pub const POINTS_PER_DROPPED_BUBBLE: u32 = 5;

/// Snapshot of a removed bubble, for renderers and scoring.
#[derive(Debug, Clone, Copy)]
pub struct BubbleDescriptor {
    pub kind: BubbleKind,
    pub position: Vec2,
}

/// Message sent when a matched cluster pops.
#[derive(Message, Debug, Clone)]
pub struct ClusterPopped {
    /// The cell the triggering bubble attached to.
    pub origin: GridCoord,
    pub bubbles: Vec<BubbleDescriptor>,
    pub score_delta: u32,
}

/// Message sent when bubbles lose their path to the anchor row and drop.
#[derive(Message, Debug, Clone)]
pub struct FloatingDropped {
    pub bubbles: Vec<BubbleDescriptor>,
    pub score_delta: u32,
}

/// Flood fill from `origin`, treating it as `origin_kind` instead of
/// whatever the grid holds there. Two cells connect when their kinds
/// match (same color, or either is a wildcard).
fn flood_cluster(
    grid: &BubbleGrid,
    config: &FieldConfig,
    origin: GridCoord,
    origin_kind: BubbleKind,
) -> Vec<GridCoord> {
    let kind_of = |coord: GridCoord| {
        if coord == origin {
            Some(origin_kind)
        } else {
            grid.kind_at(coord)
        }
    };

    let mut cluster = vec![origin];
    let mut visited = HashSet::from([origin]);
    let mut queue = VecDeque::from([origin]);

    while let Some(coord) = queue.pop_front() {
        let Some(kind) = kind_of(coord) else {
            continue;
        };

        for neighbor in coord.neighbors() {
            if !config.contains(neighbor) || visited.contains(&neighbor) {
                continue;
            }
            let Some(neighbor_kind) = kind_of(neighbor) else {
                continue;
            };
            if kind.matches(neighbor_kind) {
                visited.insert(neighbor);
                cluster.push(neighbor);
                queue.push_back(neighbor);
            }
        }
    }

    cluster
}

/// The match cluster produced by a bubble at `origin`.
///
/// A wildcard origin has no color of its own: each distinct color among
/// its immediate neighbors (in adjacency enumeration order) is tried as a
/// hypothetical origin color and the largest resulting cluster wins, the
/// first color keeping ties. A wildcard with no anchored neighbors
/// matches only itself.
pub fn match_cluster(grid: &BubbleGrid, config: &FieldConfig, origin: GridCoord) -> Vec<GridCoord> {
    let Some(kind) = grid.kind_at(origin) else {
        return Vec::new();
    };

    let BubbleKind::Wildcard = kind else {
        return flood_cluster(grid, config, origin, kind);
    };

    let mut best: Vec<GridCoord> = Vec::new();
    let mut tried: Vec<BubbleColor> = Vec::new();
    let mut has_anchored_neighbor = false;

    for neighbor in origin.neighbors() {
        if !config.contains(neighbor) {
            continue;
        }
        let Some(neighbor_kind) = grid.kind_at(neighbor) else {
            continue;
        };
        has_anchored_neighbor = true;

        if let BubbleKind::Color(color) = neighbor_kind {
            if tried.contains(&color) {
                continue;
            }
            tried.push(color);

            let candidate = flood_cluster(grid, config, origin, BubbleKind::Color(color));
            if candidate.len() > best.len() {
                best = candidate;
            }
        }
    }

    if !has_anchored_neighbor {
        return vec![origin];
    }
    if best.is_empty() {
        // Every neighbor is itself a wildcard; traverse as-is.
        return flood_cluster(grid, config, origin, BubbleKind::Wildcard);
    }
    best
}

/// All anchored bubbles with no adjacency path to the anchor row,
/// ignoring color.
pub fn floating_clusters(grid: &BubbleGrid, config: &FieldConfig) -> Vec<GridCoord> {
    let mut reached: HashSet<GridCoord> = HashSet::new();
    let mut queue: VecDeque<GridCoord> = VecDeque::new();

    for coord in grid.anchor_row_coords() {
        reached.insert(coord);
        queue.push_back(coord);
    }

    while let Some(coord) = queue.pop_front() {
        for neighbor in coord.neighbors() {
            if config.contains(neighbor)
                && grid.is_occupied(neighbor)
                && reached.insert(neighbor)
            {
                queue.push_back(neighbor);
            }
        }
    }

    grid.coords().filter(|c| !reached.contains(c)).collect()
}

/// Remove every bubble the floating pass flags, converting each to a
/// free-falling bubble, and report the drop. Shared by the match path
/// and the instant power-up effects, which also tear holes in the grid.
pub(super) fn run_floating_pass(
    commands: &mut Commands,
    grid: &mut BubbleGrid,
    config: &FieldConfig,
    drops: &mut MessageWriter<FloatingDropped>,
    score: &mut GameScore,
) -> usize {
    let floating = floating_clusters(grid, config);
    if floating.is_empty() {
        return 0;
    }

    let mut bubbles = Vec::with_capacity(floating.len());
    for coord in &floating {
        if let Some(cell) = grid.remove(*coord) {
            commands.entity(cell.entity).despawn();
            spawn_falling_bubble(commands, *coord, cell.kind);
            bubbles.push(BubbleDescriptor {
                kind: cell.kind,
                position: coord.to_pixel(),
            });
        }
    }

    let score_delta = bubbles.len() as u32 * POINTS_PER_DROPPED_BUBBLE;
    score.total += score_delta;
    info!("Dropped {} floating bubbles, +{score_delta}", bubbles.len());

    drops.write(FloatingDropped {
        bubbles,
        score_delta,
    });
    floating.len()
}

/// Evaluate the match cluster for every bubble landed this tick, popping
/// clusters of 3+ and updating the combo counter.
fn detect_clusters(
    mut commands: Commands,
    mut grid: ResMut<BubbleGrid>,
    config: Res<FieldConfig>,
    mut score: ResMut<GameScore>,
    mut landed: MessageReader<BubbleLanded>,
    mut popped: MessageWriter<ClusterPopped>,
) {
    for event in landed.read() {
        let cluster = match_cluster(&grid, &config, event.coord);

        if cluster.len() < MIN_CLUSTER_SIZE {
            score.combo = 0;
            continue;
        }

        score.combo += 1;
        let score_delta =
            cluster.len() as u32 * POINTS_PER_MATCHED_BUBBLE * score.combo_multiplier();
        score.total += score_delta;
        score.bubbles_popped += cluster.len() as u32;

        info!(
            "Popped cluster of {} at {} (combo x{}, +{score_delta})",
            cluster.len(),
            event.coord,
            score.combo_multiplier(),
        );

        let mut bubbles = Vec::with_capacity(cluster.len());
        for coord in &cluster {
            if let Some(cell) = grid.remove(*coord) {
                commands.entity(cell.entity).despawn();
                bubbles.push(BubbleDescriptor {
                    kind: cell.kind,
                    position: coord.to_pixel(),
                });
            }
        }

        popped.write(ClusterPopped {
            origin: event.coord,
            bubbles,
            score_delta,
        });
    }
}

/// After a pop tears a hole in the grid, drop everything no longer
/// connected to the anchor row. Only removals can strand bubbles, so the
/// pass runs on pop ticks only.
fn detect_floating_bubbles(
    mut commands: Commands,
    mut grid: ResMut<BubbleGrid>,
    config: Res<FieldConfig>,
    mut score: ResMut<GameScore>,
    mut popped: MessageReader<ClusterPopped>,
    mut drops: MessageWriter<FloatingDropped>,
) {
    if popped.read().last().is_none() {
        return;
    }

    run_floating_pass(&mut commands, &mut grid, &config, &mut drops, &mut score);
}
