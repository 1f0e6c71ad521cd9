//! State export/import.
//!
//! A serializable snapshot of all four collections, used for the export
//! endpoint, for restoring state on import, and for carrying state across a
//! restart through an optional state file. Connections are runtime-only and
//! never part of a snapshot.

use super::{AppState, World, HELLO_SNAPSHOT};
use crate::broadcast::Audience;
use crate::repository::{MemoryRepository, Repository, Table};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Schema version for export format compatibility
pub const EXPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub schema_version: u32,
    /// Export timestamp (RFC 3339)
    pub exported_at: String,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub games: Vec<Game>,
    #[serde(default)]
    pub rounds: Vec<Round>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

impl StateSnapshot {
    pub fn from_repository(repo: &dyn Repository) -> Self {
        Self {
            schema_version: EXPORT_SCHEMA_VERSION,
            exported_at: chrono::Utc::now().to_rfc3339(),
            players: repo.players().all(),
            games: repo.games().all(),
            rounds: repo.rounds().all(),
            answers: repo.answers().all(),
        }
    }

    /// Validate the snapshot before import
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version > EXPORT_SCHEMA_VERSION {
            return Err(format!(
                "Export schema version {} is newer than supported version {}. \
                 Please update the server.",
                self.schema_version, EXPORT_SCHEMA_VERSION
            ));
        }

        let games: HashSet<&str> = self.games.iter().map(|g| g.id.as_str()).collect();
        let rounds: HashMap<&str, &str> = self
            .rounds
            .iter()
            .map(|r| (r.id.as_str(), r.game_id.as_str()))
            .collect();

        for round in &self.rounds {
            if !games.contains(round.game_id.as_str()) {
                return Err(format!(
                    "Round '{}' references game '{}' which doesn't exist",
                    round.id, round.game_id
                ));
            }
        }

        for game in &self.games {
            let active = self
                .rounds
                .iter()
                .filter(|r| r.game_id == game.id && r.active)
                .count();
            if active > 1 {
                return Err(format!(
                    "Game '{}' has {} active rounds, expected at most one",
                    game.id, active
                ));
            }
        }

        let mut answered = HashSet::new();
        for answer in &self.answers {
            match rounds.get(answer.round_id.as_str()) {
                None => {
                    return Err(format!(
                        "Answer '{}' references round '{}' which doesn't exist",
                        answer.id, answer.round_id
                    ));
                }
                Some(&game_id) if game_id != answer.game_id => {
                    return Err(format!(
                        "Answer '{}' is filed under game '{}' but its round belongs to '{}'",
                        answer.id, answer.game_id, game_id
                    ));
                }
                Some(_) => {}
            }
            let key = (&answer.game_id, &answer.round_id, &answer.player_id);
            if !answered.insert(key) {
                return Err(format!(
                    "Player '{}' has more than one answer in round '{}'",
                    answer.player_id, answer.round_id
                ));
            }
        }

        Ok(())
    }

    pub fn into_memory_repository(self) -> MemoryRepository {
        MemoryRepository {
            players: Table::from_records(self.players),
            games: Table::from_records(self.games),
            rounds: Table::from_records(self.rounds),
            answers: Table::from_records(self.answers),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to encode snapshot: {}", e))?;
        std::fs::write(path, json)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let snapshot: Self = serde_json::from_str(&json)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl AppState {
    pub async fn export_state(&self) -> StateSnapshot {
        StateSnapshot::from_repository(self.world().await.repo.as_ref())
    }

    /// Replace every collection with the snapshot's content and push fresh
    /// views to all authenticated connections. Bindings stay; a connection
    /// whose player is not in the snapshot simply stops resolving.
    pub async fn import_state(&self, snapshot: StateSnapshot) -> Result<(), String> {
        snapshot.validate()?;
        let mut world = self.world().await;
        world.replace_repository(Box::new(snapshot.into_memory_repository()));
        world.publish(&Audience::Authenticated, HELLO_SNAPSHOT);
        Ok(())
    }
}

impl World {
    pub fn replace_repository(&mut self, repo: Box<dyn Repository>) {
        self.repo = repo;
        tracing::info!(
            "State replaced: {} players, {} games",
            self.repo.players().all().len(),
            self.repo.games().all().len()
        );
    }
}
