//! Leaderboard persistence with a Top 10 table.
//!
//! Entries are saved to a local JSON file in the user's data directory.
//! The core only exposes the record type and add/load/save helpers; when
//! and with what name an entry is recorded is the embedder's decision.
//! All I/O failures degrade gracefully - a missing or corrupt file just
//! means an empty board.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use super::score::GameScore;

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<Leaderboard>();
    app.add_systems(Startup, load_leaderboard);
}

/// Maximum number of entries kept.
const MAX_ENTRIES: usize = 10;

/// A single leaderboard record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub name: String,
    pub score: u32,
    pub time_secs: u32,
    pub shots: u32,
    /// Points per shot.
    pub efficiency: f32,
    /// Seconds since the Unix epoch at save time.
    pub saved_at: u64,
}

impl ScoreEntry {
    /// Build an entry from a finished game's stats.
    pub fn from_game(name: impl Into<String>, score: &GameScore) -> Self {
        Self {
            name: name.into(),
            score: score.total,
            time_secs: score.elapsed_secs(),
            shots: score.shots_fired,
            efficiency: score.efficiency(),
            saved_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }
}

/// Resource holding the Top 10, sorted descending by score.
#[derive(Resource, Debug, Default, Serialize, Deserialize)]
pub struct Leaderboard {
    pub entries: Vec<ScoreEntry>,
}

impl Leaderboard {
    /// Whether a score would make the table.
    pub fn qualifies(&self, score: u32) -> bool {
        if score == 0 {
            return false;
        }
        if self.entries.len() < MAX_ENTRIES {
            return true;
        }
        self.entries.last().is_none_or(|lowest| score > lowest.score)
    }

    /// Insert an entry at its sorted position, keeping the table at ten.
    /// Returns true if the entry made the cut.
    pub fn add_entry(&mut self, entry: ScoreEntry) -> bool {
        if entry.score == 0 {
            return false;
        }

        let pos = self
            .entries
            .iter()
            .position(|e| entry.score > e.score)
            .unwrap_or(self.entries.len());

        if pos >= MAX_ENTRIES {
            return false;
        }

        self.entries.insert(pos, entry);
        self.entries.truncate(MAX_ENTRIES);
        true
    }

    fn file_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("hexpop").join("leaderboard.json"))
    }

    /// Load the leaderboard from disk, empty on any failure.
    pub fn load() -> Self {
        let Some(path) = Self::file_path() else {
            warn!("Could not determine data directory for the leaderboard");
            return Self::default();
        };

        if !path.exists() {
            info!("No leaderboard file at {path:?}, starting fresh");
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(board) => board,
                Err(e) => {
                    warn!("Failed to parse leaderboard: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read leaderboard file: {e}");
                Self::default()
            }
        }
    }

    /// Save the leaderboard to disk.
    pub fn save(&self) {
        let Some(path) = Self::file_path() else {
            warn!("Could not determine data directory for saving the leaderboard");
            return;
        };

        if let Some(parent) = path.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warn!("Failed to create leaderboard directory: {e}");
            return;
        }

        match serde_json::to_string_pretty(self) {
            Ok(json) => match fs::write(&path, json) {
                Ok(()) => info!("Saved leaderboard to {path:?}"),
                Err(e) => warn!("Failed to write leaderboard: {e}"),
            },
            Err(e) => warn!("Failed to serialize leaderboard: {e}"),
        }
    }
}

fn load_leaderboard(mut board: ResMut<Leaderboard>) {
    *board = Leaderboard::load();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, score: u32) -> ScoreEntry {
        ScoreEntry {
            name: name.into(),
            score,
            time_secs: 60,
            shots: 40,
            efficiency: score as f32 / 40.0,
            saved_at: 0,
        }
    }

    #[test]
    fn entries_stay_sorted_descending() {
        let mut board = Leaderboard::default();
        board.add_entry(entry("a", 100));
        board.add_entry(entry("b", 300));
        board.add_entry(entry("c", 200));

        let scores: Vec<u32> = board.entries.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![300, 200, 100]);
    }

    #[test]
    fn table_is_capped_at_ten() {
        let mut board = Leaderboard::default();
        for i in 1..=12 {
            board.add_entry(entry("p", i * 10));
        }
        assert_eq!(board.entries.len(), 10);
        // The two lowest scores fell off.
        assert!(board.entries.iter().all(|e| e.score >= 30));
    }

    #[test]
    fn low_score_does_not_displace_a_full_table() {
        let mut board = Leaderboard::default();
        for i in 1..=10 {
            board.add_entry(entry("p", 100 + i));
        }
        assert!(!board.add_entry(entry("late", 50)));
        assert!(!board.qualifies(50));
        assert!(board.qualifies(500));
    }

    #[test]
    fn zero_scores_never_qualify() {
        let mut board = Leaderboard::default();
        assert!(!board.add_entry(entry("z", 0)));
        assert!(!board.qualifies(0));
    }
}
