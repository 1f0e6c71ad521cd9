//! Persistence seam for the four entity collections.
//!
//! The sync engine only ever talks to a [`Repository`]: find, insert, update and
//! delete by key. [`MemoryRepository`] is the in-process implementation, one
//! indexed map per collection.

use crate::types::*;
use std::collections::BTreeMap;

/// A record stored in a collection, addressed by its id
pub trait Record: Clone + Send + Sync + 'static {
    fn key(&self) -> &str;
}

impl Record for Player {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for Game {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for Round {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for Answer {
    fn key(&self) -> &str {
        &self.id
    }
}

/// CRUD over one entity collection
pub trait Collection<T: Record>: Send + Sync {
    fn get(&self, id: &str) -> Option<T>;

    /// All records matching `pred`, in key order
    fn find(&self, pred: &dyn Fn(&T) -> bool) -> Vec<T>;

    /// Insert or replace the record stored under its key
    fn insert(&mut self, record: T);

    /// Apply `change` in place and return the updated record
    fn update(&mut self, id: &str, change: &mut dyn FnMut(&mut T)) -> Option<T>;

    fn remove(&mut self, id: &str) -> Option<T>;

    /// Remove every record matching `pred`, returning how many went
    fn remove_where(&mut self, pred: &dyn Fn(&T) -> bool) -> usize;

    fn all(&self) -> Vec<T> {
        self.find(&|_| true)
    }
}

/// Indexed in-memory collection
#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: BTreeMap<String, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    pub fn from_records(records: impl IntoIterator<Item = T>) -> Self {
        Self {
            rows: records
                .into_iter()
                .map(|r| (r.key().to_string(), r))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T: Record> Collection<T> for Table<T> {
    fn get(&self, id: &str) -> Option<T> {
        self.rows.get(id).cloned()
    }

    fn find(&self, pred: &dyn Fn(&T) -> bool) -> Vec<T> {
        self.rows.values().filter(|r| pred(r)).cloned().collect()
    }

    fn insert(&mut self, record: T) {
        self.rows.insert(record.key().to_string(), record);
    }

    fn update(&mut self, id: &str, change: &mut dyn FnMut(&mut T)) -> Option<T> {
        let row = self.rows.get_mut(id)?;
        change(row);
        Some(row.clone())
    }

    fn remove(&mut self, id: &str) -> Option<T> {
        self.rows.remove(id)
    }

    fn remove_where(&mut self, pred: &dyn Fn(&T) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, r| !pred(r));
        before - self.rows.len()
    }
}

/// The four collections the sync engine works against
pub trait Repository: Send + Sync {
    fn players(&self) -> &dyn Collection<Player>;
    fn players_mut(&mut self) -> &mut dyn Collection<Player>;
    fn games(&self) -> &dyn Collection<Game>;
    fn games_mut(&mut self) -> &mut dyn Collection<Game>;
    fn rounds(&self) -> &dyn Collection<Round>;
    fn rounds_mut(&mut self) -> &mut dyn Collection<Round>;
    fn answers(&self) -> &dyn Collection<Answer>;
    fn answers_mut(&mut self) -> &mut dyn Collection<Answer>;

    /// Remove a game with all its rounds and answers as one unit.
    ///
    /// Callers hold the state lock for the duration, so the in-memory default
    /// is all-or-nothing. Stores with their own transactions should override.
    fn delete_game_cascade(&mut self, game_id: &str) -> Option<Game> {
        let game = self.games_mut().remove(game_id)?;
        let rounds = self.rounds_mut().remove_where(&|r| r.game_id == game_id);
        let answers = self.answers_mut().remove_where(&|a| a.game_id == game_id);
        tracing::debug!(
            "Cascade for game {} removed {} rounds and {} answers",
            game_id,
            rounds,
            answers
        );
        Some(game)
    }
}

/// In-process repository
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    pub players: Table<Player>,
    pub games: Table<Game>,
    pub rounds: Table<Round>,
    pub answers: Table<Answer>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    fn players(&self) -> &dyn Collection<Player> {
        &self.players
    }
    fn players_mut(&mut self) -> &mut dyn Collection<Player> {
        &mut self.players
    }
    fn games(&self) -> &dyn Collection<Game> {
        &self.games
    }
    fn games_mut(&mut self) -> &mut dyn Collection<Game> {
        &mut self.games
    }
    fn rounds(&self) -> &dyn Collection<Round> {
        &self.rounds
    }
    fn rounds_mut(&mut self) -> &mut dyn Collection<Round> {
        &mut self.rounds
    }
    fn answers(&self) -> &dyn Collection<Answer> {
        &self.answers
    }
    fn answers_mut(&mut self) -> &mut dyn Collection<Answer> {
        &mut self.answers
    }
}
