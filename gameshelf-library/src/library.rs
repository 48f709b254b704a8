use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::{DatabaseError, GameChanges, GameData, NewGame, SharedDatabase};

/// Owner-scoped access to the games in everyone's libraries
pub struct Library {
    db: SharedDatabase,
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Invalid game: {0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

impl Library {
    pub fn new(db: &SharedDatabase) -> Self {
        Self { db: db.clone() }
    }

    /// Adds a game to the owner's library
    pub async fn create(&self, owner_id: &str, new_game: NewGame) -> Result<GameData, LibraryError> {
        let new_game = new_game.normalize();
        new_game.validate()?;

        Ok(self.db.create_game(owner_id, new_game).await?)
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<GameData>, DatabaseError> {
        self.db.games_by_owner(owner_id).await
    }

    pub async fn get(&self, game_id: &str, owner_id: &str) -> Result<GameData, DatabaseError> {
        self.db.game_by_id(game_id, owner_id).await
    }

    /// Applies a partial update to a game the owner has
    pub async fn update(
        &self,
        game_id: &str,
        owner_id: &str,
        changes: GameChanges,
    ) -> Result<GameData, LibraryError> {
        let changes = changes.normalize();
        changes.validate()?;

        Ok(self.db.update_game(game_id, owner_id, changes).await?)
    }

    pub async fn delete(&self, game_id: &str, owner_id: &str) -> Result<(), DatabaseError> {
        self.db.delete_game(game_id, owner_id).await
    }
}
