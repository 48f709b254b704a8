use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    util::new_id, Database, DatabaseError, GameChanges, GameData, NewGame, NewUser, Result,
    StorageKind, UpdatedUser, UserData,
};

/// Everything the volatile store knows, in the shape it is mirrored to disk
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    users: Vec<UserData>,
    games: Vec<GameData>,
}

/// An in-process database used when the durable backend is unavailable.
/// Optionally mirrors its whole state to a JSON file after every mutation.
///
/// All access goes through a single lock, so checks and writes
/// (such as title uniqueness followed by the insert) can't interleave.
pub struct MemoryDatabase {
    state: Mutex<Snapshot>,
    file: Option<PathBuf>,
}

impl MemoryDatabase {
    /// Creates an empty store that only lives in memory
    pub fn new() -> Self {
        Self {
            state: Default::default(),
            file: None,
        }
    }

    /// Creates a store mirrored to the given file, restoring its previous contents if any
    pub async fn with_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes).unwrap_or_else(|e| {
                warn!("Ignoring unreadable data file {}: {}", path.display(), e);
                Snapshot::default()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Snapshot::default(),
            Err(e) => {
                warn!(
                    "Could not read data file {}, it will not be mirrored: {}",
                    path.display(),
                    e
                );

                return Self::new();
            }
        };

        info!(
            "Volatile store restored {} user(s) and {} game(s) from {}",
            snapshot.users.len(),
            snapshot.games.len(),
            path.display()
        );

        Self {
            state: Mutex::new(snapshot),
            file: Some(path),
        }
    }

    /// Writes the snapshot to the mirror file.
    /// Failures are logged, the in-memory state stays authoritative.
    async fn persist(&self, snapshot: &Snapshot) {
        let Some(path) = &self.file else {
            return;
        };

        let bytes = match serde_json::to_vec_pretty(snapshot) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not serialize volatile store: {}", e);
                return;
            }
        };

        let temporary = path.with_extension("tmp");
        let result = match tokio::fs::write(&temporary, bytes).await {
            Ok(_) => tokio::fs::rename(&temporary, path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!("Could not write data file {}: {}", path.display(), e);
        }
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    fn user(
        &self,
        predicate: impl Fn(&UserData) -> bool,
        identifier: &'static str,
    ) -> Result<UserData> {
        self.users
            .iter()
            .find(|&u| predicate(u))
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier,
            })
    }

    /// Finds the position of a game, making sure it belongs to the owner
    fn owned_game_index(&self, game_id: &str, owner_id: &str) -> Result<usize> {
        let index = self
            .games
            .iter()
            .position(|g| g.id == game_id)
            .ok_or(DatabaseError::NotFound {
                resource: "game",
                identifier: "id",
            })?;

        if self.games[index].owner_id != owner_id {
            return Err(DatabaseError::Forbidden { resource: "game" });
        }

        Ok(index)
    }

    fn ensure_unique_title(
        &self,
        owner_id: &str,
        title: &str,
        except: Option<&str>,
    ) -> Result<()> {
        let taken = self.games.iter().any(|g| {
            g.owner_id == owner_id && g.title == title && Some(g.id.as_str()) != except
        });

        if taken {
            return Err(DatabaseError::Conflict {
                resource: "game",
                field: "title",
                value: title.to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn kind(&self) -> StorageKind {
        StorageKind::Volatile
    }

    async fn user_by_id(&self, user_id: &str) -> Result<UserData> {
        self.state.lock().await.user(|u| u.id == user_id, "id")
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.state
            .lock()
            .await
            .user(|u| u.username == username, "username")
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        self.state.lock().await.user(|u| u.email == email, "email")
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let mut state = self.state.lock().await;

        if state.users.iter().any(|u| u.username == new_user.username) {
            return Err(DatabaseError::Conflict {
                resource: "user",
                field: "username",
                value: new_user.username,
            });
        }

        if state.users.iter().any(|u| u.email == new_user.email) {
            return Err(DatabaseError::Conflict {
                resource: "user",
                field: "email",
                value: new_user.email,
            });
        }

        let now = Utc::now();
        let user = UserData {
            id: new_id(),
            username: new_user.username,
            email: new_user.email,
            password: new_user.password,
            avatar: None,
            bio: new_user.bio,
            is_public: new_user.is_public,
            created_at: now,
            updated_at: now,
        };

        state.users.push(user.clone());
        self.persist(&state).await;

        Ok(user)
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let mut state = self.state.lock().await;

        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == updated_user.id)
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })?;

        if let Some(avatar) = updated_user.avatar {
            user.avatar = avatar;
        }
        if let Some(bio) = updated_user.bio {
            user.bio = bio;
        }
        if let Some(is_public) = updated_user.is_public {
            user.is_public = is_public;
        }
        user.updated_at = Utc::now();

        let user = user.clone();
        self.persist(&state).await;

        Ok(user)
    }

    async fn game_by_id(&self, game_id: &str, owner_id: &str) -> Result<GameData> {
        let state = self.state.lock().await;
        let index = state.owned_game_index(game_id, owner_id)?;

        Ok(state.games[index].clone())
    }

    async fn games_by_owner(&self, owner_id: &str) -> Result<Vec<GameData>> {
        let state = self.state.lock().await;

        Ok(state
            .games
            .iter()
            .filter(|g| g.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn create_game(&self, owner_id: &str, new_game: NewGame) -> Result<GameData> {
        let mut state = self.state.lock().await;
        state.ensure_unique_title(owner_id, &new_game.title, None)?;

        let now = Utc::now();
        let game = GameData {
            id: new_id(),
            owner_id: owner_id.to_string(),
            title: new_game.title,
            platform: new_game.platform,
            status: new_game.status,
            cover_image: new_game.cover_image,
            rating: new_game.rating,
            genres: new_game.genres,
            description: new_game.description,
            notes: new_game.notes,
            created_at: now,
            updated_at: now,
        };

        state.games.push(game.clone());
        self.persist(&state).await;

        Ok(game)
    }

    async fn update_game(
        &self,
        game_id: &str,
        owner_id: &str,
        changes: GameChanges,
    ) -> Result<GameData> {
        let mut state = self.state.lock().await;
        let index = state.owned_game_index(game_id, owner_id)?;

        if let Some(title) = &changes.title {
            state.ensure_unique_title(owner_id, title, Some(game_id))?;
        }

        changes.apply(&mut state.games[index]);
        let game = state.games[index].clone();
        self.persist(&state).await;

        Ok(game)
    }

    async fn delete_game(&self, game_id: &str, owner_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let index = state.owned_game_index(game_id, owner_id)?;

        state.games.remove(index);
        self.persist(&state).await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::GameStatus;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "hash".to_string(),
            bio: String::new(),
            is_public: true,
        }
    }

    fn new_game(title: &str) -> NewGame {
        NewGame {
            title: title.to_string(),
            platform: "PC".to_string(),
            status: GameStatus::Pending,
            cover_image: None,
            rating: Some(8.5),
            genres: vec!["Roguelike".to_string(), "Action".to_string()],
            description: None,
            notes: Some("Try the spear".to_string()),
        }
    }

    #[tokio::test]
    async fn test_user_uniqueness() {
        let db = MemoryDatabase::new();

        db.create_user(new_user("ana", "ana@x.com")).await.unwrap();
        db.create_user(new_user("bob", "bob@x.com")).await.unwrap();

        let same_username = db.create_user(new_user("ana", "other@x.com")).await;
        assert!(matches!(
            same_username,
            Err(DatabaseError::Conflict { field: "username", .. })
        ));

        let same_email = db.create_user(new_user("other", "ana@x.com")).await;
        assert!(matches!(
            same_email,
            Err(DatabaseError::Conflict { field: "email", .. })
        ));
    }

    #[tokio::test]
    async fn test_titles_are_unique_per_owner() {
        let db = MemoryDatabase::new();

        db.create_game("ana", new_game("Hades")).await.unwrap();

        let duplicate = db.create_game("ana", new_game("Hades")).await;
        assert!(matches!(duplicate, Err(DatabaseError::Conflict { .. })));

        db.create_game("bob", new_game("Hades")).await.unwrap();

        assert_eq!(db.games_by_owner("ana").await.unwrap().len(), 1);
        assert_eq!(db.games_by_owner("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ownership_is_not_hidden_as_missing() {
        let db = MemoryDatabase::new();
        let game = db.create_game("ana", new_game("Hades")).await.unwrap();

        let foreign_read = db.game_by_id(&game.id, "bob").await;
        assert!(matches!(foreign_read, Err(DatabaseError::Forbidden { .. })));

        let foreign_update = db
            .update_game(&game.id, "bob", GameChanges::default())
            .await;
        assert!(matches!(foreign_update, Err(DatabaseError::Forbidden { .. })));

        let foreign_delete = db.delete_game(&game.id, "bob").await;
        assert!(matches!(foreign_delete, Err(DatabaseError::Forbidden { .. })));

        let missing = db.game_by_id("nope", "ana").await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_round_trip_and_partial_update() {
        let db = MemoryDatabase::new();
        let created = db.create_game("ana", new_game("Hades")).await.unwrap();

        let fetched = db.game_by_id(&created.id, "ana").await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.notes.as_deref(), Some("Try the spear"));

        let changes = GameChanges {
            status: Some(GameStatus::Completed),
            rating: Some(None),
            ..Default::default()
        };
        let updated = db.update_game(&created.id, "ana", changes).await.unwrap();

        assert_eq!(updated.status, GameStatus::Completed);
        assert_eq!(updated.rating, None);
        assert_eq!(updated.title, "Hades");
        assert_eq!(updated.genres, created.genres);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_rename_onto_existing_title_conflicts() {
        let db = MemoryDatabase::new();
        db.create_game("ana", new_game("Hades")).await.unwrap();
        let celeste = db.create_game("ana", new_game("Celeste")).await.unwrap();

        let changes = GameChanges {
            title: Some("Hades".to_string()),
            ..Default::default()
        };
        let result = db.update_game(&celeste.id, "ana", changes).await;
        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));

        // Keeping its own title is fine
        let changes = GameChanges {
            title: Some("Celeste".to_string()),
            ..Default::default()
        };
        db.update_game(&celeste.id, "ana", changes).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let db = MemoryDatabase::new();
        let game = db.create_game("ana", new_game("Hades")).await.unwrap();

        db.delete_game(&game.id, "ana").await.unwrap();

        for _ in 0..2 {
            let result = db.delete_game(&game.id, "ana").await;
            assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
        }
    }

    #[tokio::test]
    async fn test_file_mirror_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        let db = MemoryDatabase::with_file(&path).await;
        let user = db.create_user(new_user("ana", "ana@x.com")).await.unwrap();
        db.create_game(&user.id, new_game("Hades")).await.unwrap();
        drop(db);

        let restored = MemoryDatabase::with_file(&path).await;
        let user = restored.user_by_email("ana@x.com").await.unwrap();

        assert_eq!(user.username, "ana");
        assert_eq!(restored.games_by_owner(&user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();

        let db = MemoryDatabase::with_file(&path).await;
        assert!(db.user_by_username("ana").await.is_err());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();

        // A directory can't be read as a file
        let db = MemoryDatabase::with_file(dir.path()).await;
        assert!(db.file.is_none());

        db.create_user(new_user("ana", "ana@x.com")).await.unwrap();
        assert!(dir.path().is_dir());
    }
}
