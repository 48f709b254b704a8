use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use log::warn;
use tokio::time::timeout;

use crate::{
    Database, GameChanges, GameData, MemoryDatabase, NewGame, NewUser, Result,
    SharedDatabase, StorageKind, UpdatedUser, UserData,
};

/// Presents a durable and a volatile backend as one database.
///
/// Every operation is attempted on the durable backend first, bounded by a timeout.
/// If it is missing, times out or fails for reasons other than a domain outcome,
/// the same operation is performed against the volatile store.
///
/// The two backends don't share state, so anything written to one
/// is invisible to the other.
pub struct FallbackDatabase {
    durable: Option<SharedDatabase>,
    volatile: MemoryDatabase,
    timeout: Duration,
    /// Set when the last operation was served by the volatile store
    degraded: AtomicBool,
}

impl FallbackDatabase {
    /// The default bound on a durable attempt
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(durable: Option<SharedDatabase>, volatile: MemoryDatabase) -> Self {
        Self {
            durable,
            volatile,
            timeout: Self::DEFAULT_TIMEOUT,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the operation against the durable backend, falling back to the volatile one
    async fn attempt<'a, T>(
        &'a self,
        operation: &'static str,
        call: impl Fn(&'a dyn Database) -> BoxFuture<'a, Result<T>>,
    ) -> Result<T> {
        if let Some(durable) = &self.durable {
            match timeout(self.timeout, call(durable.as_ref())).await {
                Ok(Ok(value)) => {
                    self.degraded.store(false, Ordering::Relaxed);
                    return Ok(value);
                }
                Ok(Err(e)) if !e.is_recoverable() => {
                    self.degraded.store(false, Ordering::Relaxed);
                    return Err(e);
                }
                Ok(Err(e)) => warn!("Durable {} failed, using volatile store: {}", operation, e),
                Err(_) => warn!(
                    "Durable {} timed out after {:?}, using volatile store",
                    operation, self.timeout
                ),
            }

            self.degraded.store(true, Ordering::Relaxed);
        }

        call(&self.volatile).await
    }
}

#[async_trait]
impl Database for FallbackDatabase {
    fn kind(&self) -> StorageKind {
        match &self.durable {
            Some(_) if !self.degraded.load(Ordering::Relaxed) => StorageKind::Durable,
            _ => StorageKind::Volatile,
        }
    }

    async fn user_by_id(&self, user_id: &str) -> Result<UserData> {
        self.attempt("user lookup", |db| db.user_by_id(user_id))
            .await
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.attempt("user lookup", |db| db.user_by_username(username))
            .await
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        self.attempt("user lookup", |db| db.user_by_email(email))
            .await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.attempt("user creation", |db| db.create_user(new_user.clone()))
            .await
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        self.attempt("user update", |db| db.update_user(updated_user.clone()))
            .await
    }

    async fn game_by_id(&self, game_id: &str, owner_id: &str) -> Result<GameData> {
        self.attempt("game lookup", |db| db.game_by_id(game_id, owner_id))
            .await
    }

    async fn games_by_owner(&self, owner_id: &str) -> Result<Vec<GameData>> {
        self.attempt("library listing", |db| db.games_by_owner(owner_id))
            .await
    }

    async fn create_game(&self, owner_id: &str, new_game: NewGame) -> Result<GameData> {
        self.attempt("game creation", |db| {
            db.create_game(owner_id, new_game.clone())
        })
        .await
    }

    async fn update_game(
        &self,
        game_id: &str,
        owner_id: &str,
        changes: GameChanges,
    ) -> Result<GameData> {
        self.attempt("game update", |db| {
            db.update_game(game_id, owner_id, changes.clone())
        })
        .await
    }

    async fn delete_game(&self, game_id: &str, owner_id: &str) -> Result<()> {
        self.attempt("game deletion", |db| db.delete_game(game_id, owner_id))
            .await
    }
}

#[cfg(test)]
mod test {
    use std::sync::{atomic::AtomicUsize, Arc};

    use super::*;
    use crate::{DatabaseError, GameStatus};

    /// How the stand-in durable backend misbehaves
    #[derive(Clone, Copy)]
    enum Behavior {
        Fail,
        Hang,
        Conflict,
    }

    struct BrokenDatabase {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl BrokenDatabase {
        fn shared(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        async fn misbehave<T>(&self) -> Result<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            match self.behavior {
                Behavior::Fail => Err(DatabaseError::Internal("connection refused".into())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Err(DatabaseError::Unavailable("hung".to_string()))
                }
                Behavior::Conflict => Err(DatabaseError::Conflict {
                    resource: "game",
                    field: "title",
                    value: "Hades".to_string(),
                }),
            }
        }
    }

    #[async_trait]
    impl Database for BrokenDatabase {
        fn kind(&self) -> StorageKind {
            StorageKind::Durable
        }

        async fn user_by_id(&self, _: &str) -> Result<UserData> {
            self.misbehave().await
        }

        async fn user_by_username(&self, _: &str) -> Result<UserData> {
            self.misbehave().await
        }

        async fn user_by_email(&self, _: &str) -> Result<UserData> {
            self.misbehave().await
        }

        async fn create_user(&self, _: NewUser) -> Result<UserData> {
            self.misbehave().await
        }

        async fn update_user(&self, _: UpdatedUser) -> Result<UserData> {
            self.misbehave().await
        }

        async fn game_by_id(&self, _: &str, _: &str) -> Result<GameData> {
            self.misbehave().await
        }

        async fn games_by_owner(&self, _: &str) -> Result<Vec<GameData>> {
            self.misbehave().await
        }

        async fn create_game(&self, _: &str, _: NewGame) -> Result<GameData> {
            self.misbehave().await
        }

        async fn update_game(&self, _: &str, _: &str, _: GameChanges) -> Result<GameData> {
            self.misbehave().await
        }

        async fn delete_game(&self, _: &str, _: &str) -> Result<()> {
            self.misbehave().await
        }
    }

    fn hades() -> NewGame {
        NewGame {
            title: "Hades".to_string(),
            platform: "PC".to_string(),
            status: GameStatus::Pending,
            cover_image: None,
            rating: None,
            genres: vec![],
            description: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_failing_durable_falls_back() {
        let durable = BrokenDatabase::shared(Behavior::Fail);
        let db = FallbackDatabase::new(Some(durable.clone()), MemoryDatabase::new());

        let game = db.create_game("ana", hades()).await.unwrap();
        let games = db.games_by_owner("ana").await.unwrap();

        assert_eq!(games, vec![game]);
        assert_eq!(durable.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_volatile_invariants_hold_after_fallback() {
        let durable = BrokenDatabase::shared(Behavior::Fail);
        let db = FallbackDatabase::new(Some(durable), MemoryDatabase::new());

        let game = db.create_game("ana", hades()).await.unwrap();

        let duplicate = db.create_game("ana", hades()).await;
        assert!(matches!(duplicate, Err(DatabaseError::Conflict { .. })));

        let foreign = db.game_by_id(&game.id, "bob").await;
        assert!(matches!(foreign, Err(DatabaseError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_domain_errors_are_not_retried() {
        let durable = BrokenDatabase::shared(Behavior::Conflict);
        let db = FallbackDatabase::new(Some(durable), MemoryDatabase::new());

        let result = db.create_game("ana", hades()).await;
        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));

        // Nothing was written to the volatile store
        let volatile_games = db.volatile.games_by_owner("ana").await.unwrap();
        assert!(volatile_games.is_empty());
    }

    #[tokio::test]
    async fn test_slow_durable_times_out() {
        let durable = BrokenDatabase::shared(Behavior::Hang);
        let db = FallbackDatabase::new(Some(durable), MemoryDatabase::new())
            .with_timeout(Duration::from_millis(50));

        let game = db.create_game("ana", hades()).await.unwrap();
        assert_eq!(game.title, "Hades");
    }

    #[tokio::test]
    async fn test_without_durable_backend() {
        let db = FallbackDatabase::new(None, MemoryDatabase::new());

        assert_eq!(db.kind(), StorageKind::Volatile);
        db.create_game("ana", hades()).await.unwrap();
        assert_eq!(db.games_by_owner("ana").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_kind_follows_the_serving_backend() {
        let failing = FallbackDatabase::new(
            Some(BrokenDatabase::shared(Behavior::Fail)),
            MemoryDatabase::new(),
        );

        assert_eq!(failing.kind(), StorageKind::Durable);
        failing.create_game("ana", hades()).await.unwrap();
        assert_eq!(failing.kind(), StorageKind::Volatile);

        let answering = FallbackDatabase::new(
            Some(BrokenDatabase::shared(Behavior::Conflict)),
            MemoryDatabase::new(),
        );

        let _ = answering.create_game("ana", hades()).await;
        assert_eq!(answering.kind(), StorageKind::Durable);
    }
}
