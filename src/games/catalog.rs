use super::types::Game;
use crate::errors::{ConfigurationError, FairroundError, FairroundResult};
use std::{collections::HashMap, sync::Arc};

/// Read-only set of offered games, validated at load time
#[derive(Debug, Clone)]
pub struct GameCatalog {
    games: Vec<Arc<Game>>,
    by_id: HashMap<String, usize>,
}

impl GameCatalog {
    pub fn new(games: Vec<Game>) -> FairroundResult<Self> {
        let mut by_id = HashMap::with_capacity(games.len());
        let mut loaded = Vec::with_capacity(games.len());

        for game in games {
            game.validate()?;
            if by_id.insert(game.id.clone(), loaded.len()).is_some() {
                return Err(ConfigurationError::ValidationFailed(format!(
                    "Duplicate game id: {}",
                    game.id
                ))
                .into());
            }
            loaded.push(Arc::new(game));
        }

        Ok(Self {
            games: loaded,
            by_id,
        })
    }

    pub fn get(&self, game_id: &str) -> Option<Arc<Game>> {
        self.by_id.get(game_id).map(|idx| self.games[*idx].clone())
    }

    /// Like [`get`](Self::get) but an unknown id is an error
    pub fn require(&self, game_id: &str) -> FairroundResult<Arc<Game>> {
        self.get(game_id)
            .ok_or_else(|| FairroundError::UnknownGame(game_id.to_string()))
    }

    /// Games in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Game>> {
        self.games.iter()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}
