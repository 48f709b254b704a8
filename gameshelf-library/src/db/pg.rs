use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::{postgres::PgPoolOptions, query, query_as, Error as SqlxError, FromRow, PgPool};

use crate::{
    util::new_id, Database, DatabaseError, DatabaseResult, GameChanges, GameData, GameStatus,
    IntoDatabaseError, NewGame, NewUser, Result, StorageKind, UpdatedUser, UserData,
};

/// Idempotent schema, applied on every connect
const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL,
        email TEXT NOT NULL,
        password TEXT NOT NULL,
        avatar TEXT,
        bio TEXT NOT NULL DEFAULT '',
        is_public BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        CONSTRAINT users_username_key UNIQUE (username),
        CONSTRAINT users_email_key UNIQUE (email)
    )",
    "CREATE TABLE IF NOT EXISTS games (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        title TEXT NOT NULL,
        platform TEXT NOT NULL,
        status TEXT NOT NULL,
        cover_image TEXT,
        rating DOUBLE PRECISION,
        genres TEXT[] NOT NULL DEFAULT '{}',
        description TEXT,
        notes TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        CONSTRAINT games_owner_title_key UNIQUE (owner_id, title)
    )",
];

/// A postgres database implementation for gameshelf
pub struct PgDatabase {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct GameRow {
    id: String,
    owner_id: String,
    title: String,
    platform: String,
    status: String,
    cover_image: Option<String>,
    rating: Option<f64>,
    genres: Vec<String>,
    description: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GameRow> for GameData {
    type Error = DatabaseError;

    fn try_from(row: GameRow) -> Result<Self> {
        let status = row
            .status
            .parse::<GameStatus>()
            .map_err(|e| DatabaseError::Internal(e.into()))?;

        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            platform: row.platform,
            status,
            cover_image: row.cover_image,
            rating: row.rating,
            genres: row.genres,
            description: row.description,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl PgDatabase {
    /// Connects to postgres and makes sure the schema exists.
    /// `acquire_timeout` bounds how long a query waits for a connection.
    pub async fn new(url: &str, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        for statement in SCHEMA {
            query(statement)
                .execute(&pool)
                .await
                .map_err(|e| e.any())?;
        }

        info!("Connected to postgres, schema is up to date");

        Ok(Self { pool })
    }

    /// Fetches a game regardless of who owns it
    async fn game_row(&self, game_id: &str) -> Result<GameData> {
        query_as::<_, GameRow>("SELECT * FROM games WHERE id = $1")
            .bind(game_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("game", "id"))?
            .try_into()
    }
}

#[async_trait]
impl Database for PgDatabase {
    fn kind(&self) -> StorageKind {
        StorageKind::Durable
    }

    async fn user_by_id(&self, user_id: &str) -> Result<UserData> {
        query_as::<_, UserData>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        query_as::<_, UserData>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "username"))
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        query_as::<_, UserData>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "email"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_username(&new_user.username)
            .await
            .conflict_or_ok("user", "username", &new_user.username)?;

        self.user_by_email(&new_user.email)
            .await
            .conflict_or_ok("user", "email", &new_user.email)?;

        let now = Utc::now();

        query_as::<_, UserData>(
            "INSERT INTO users (id, username, email, password, bio, is_public, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *",
        )
        .bind(new_id())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password)
        .bind(&new_user.bio)
        .bind(new_user.is_public)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some("users_email_key") => DatabaseError::Conflict {
                resource: "user",
                field: "email",
                value: new_user.email.clone(),
            },
            Some(_) => DatabaseError::Conflict {
                resource: "user",
                field: "username",
                value: new_user.username.clone(),
            },
            None => e.any(),
        })
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let user = self.user_by_id(&updated_user.id).await?;

        query_as::<_, UserData>(
            "UPDATE users SET avatar = $1, bio = $2, is_public = $3, updated_at = $4
            WHERE id = $5
            RETURNING *",
        )
        .bind(updated_user.avatar.unwrap_or(user.avatar))
        .bind(updated_user.bio.unwrap_or(user.bio))
        .bind(updated_user.is_public.unwrap_or(user.is_public))
        .bind(Utc::now())
        .bind(&updated_user.id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn game_by_id(&self, game_id: &str, owner_id: &str) -> Result<GameData> {
        let game = self.game_row(game_id).await?;

        if game.owner_id != owner_id {
            return Err(DatabaseError::Forbidden { resource: "game" });
        }

        Ok(game)
    }

    async fn games_by_owner(&self, owner_id: &str) -> Result<Vec<GameData>> {
        query_as::<_, GameRow>("SELECT * FROM games WHERE owner_id = $1 ORDER BY created_at")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?
            .into_iter()
            .map(GameData::try_from)
            .collect()
    }

    async fn create_game(&self, owner_id: &str, new_game: NewGame) -> Result<GameData> {
        let now = Utc::now();
        let title = new_game.title.clone();

        query_as::<_, GameRow>(
            "INSERT INTO games
                (id, owner_id, title, platform, status, cover_image, rating, genres, description, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *",
        )
        .bind(new_id())
        .bind(owner_id)
        .bind(new_game.title)
        .bind(new_game.platform)
        .bind(new_game.status.as_str())
        .bind(new_game.cover_image)
        .bind(new_game.rating)
        .bind(new_game.genres)
        .bind(new_game.description)
        .bind(new_game.notes)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or_any("game", "title", &title))?
        .try_into()
    }

    async fn update_game(
        &self,
        game_id: &str,
        owner_id: &str,
        changes: GameChanges,
    ) -> Result<GameData> {
        let mut game = self.game_by_id(game_id, owner_id).await?;
        changes.apply(&mut game);

        query_as::<_, GameRow>(
            "UPDATE games SET
                title = $1,
                platform = $2,
                status = $3,
                cover_image = $4,
                rating = $5,
                genres = $6,
                description = $7,
                notes = $8,
                updated_at = $9
            WHERE id = $10
            RETURNING *",
        )
        .bind(&game.title)
        .bind(&game.platform)
        .bind(game.status.as_str())
        .bind(&game.cover_image)
        .bind(game.rating)
        .bind(&game.genres)
        .bind(&game.description)
        .bind(&game.notes)
        .bind(game.updated_at)
        .bind(game_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or_any("game", "title", &game.title))?
        .try_into()
    }

    async fn delete_game(&self, game_id: &str, owner_id: &str) -> Result<()> {
        // Ensure game exists and is owned by the caller
        let _ = self.game_by_id(game_id, owner_id).await?;

        query("DELETE FROM games WHERE id = $1")
            .bind(game_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }
}

/// Returns the name of the unique constraint the error violated, if any
fn violated_constraint(error: &SqlxError) -> Option<&str> {
    match error {
        SqlxError::Database(e) if e.is_unique_violation() => Some(e.constraint().unwrap_or("")),
        _ => None,
    }
}

trait ConflictOrAny {
    fn conflict_or_any(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
}

impl ConflictOrAny for SqlxError {
    fn conflict_or_any(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DatabaseError {
        match violated_constraint(&self) {
            Some(_) => DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            },
            None => self.any(),
        }
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        match self {
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
                DatabaseError::Unavailable(self.to_string())
            }
            e => DatabaseError::Internal(Box::new(e)),
        }
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
