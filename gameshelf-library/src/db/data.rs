use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The type used for primary keys in every backend.
pub type PrimaryKey = String;

/// A gameshelf account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserData {
    pub id: PrimaryKey,
    pub username: String,
    /// Always lowercase
    pub email: String,
    /// The argon2 hash of the password, never the plain text
    pub password: String,
    pub avatar: Option<String>,
    pub bio: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A game in someone's library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    pub id: PrimaryKey,
    /// The user this game belongs to
    pub owner_id: PrimaryKey,
    pub title: String,
    pub platform: String,
    pub status: GameStatus,
    pub cover_image: Option<String>,
    pub rating: Option<f64>,
    pub genres: Vec<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where the owner is with a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    #[serde(alias = "Pendiente")]
    Pending,
    #[serde(alias = "Jugando")]
    Playing,
    #[serde(alias = "Completado")]
    Completed,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Pending => "Pending",
            GameStatus::Playing => "Playing",
            GameStatus::Completed => "Completed",
        }
    }
}

impl Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" | "Pendiente" => Ok(Self::Pending),
            "Playing" | "Jugando" => Ok(Self::Playing),
            "Completed" | "Completado" => Ok(Self::Completed),
            other => Err(format!("unknown game status {other}")),
        }
    }
}

/// The storage backend currently answering requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Durable,
    Volatile,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Durable => "durable",
            StorageKind::Volatile => "volatile",
        }
    }
}
