use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

mod data;
pub use data::*;

mod fallback;
pub use fallback::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

use crate::util::{double_option, null_as_default};

pub type Result<T> = std::result::Result<T, DatabaseError>;
pub type SharedDatabase = Arc<dyn Database>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// The backend could not be reached in time
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    /// The resource exists but belongs to someone else
    #[error("{resource} belongs to another user")]
    Forbidden { resource: &'static str },
}

impl DatabaseError {
    /// Returns true if the same operation may succeed on another backend.
    /// Domain outcomes like conflicts or missing resources are final.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Unavailable(_))
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(DatabaseError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can store gameshelf data.
///
/// Every implementation enforces the same invariants on its own state:
/// unique usernames and emails, unique titles per owner, and ownership
/// checks on game access.
#[async_trait]
pub trait Database: Send + Sync {
    /// Which kind of storage is answering right now
    fn kind(&self) -> StorageKind;

    async fn user_by_id(&self, user_id: &str) -> Result<UserData>;
    async fn user_by_username(&self, username: &str) -> Result<UserData>;
    /// Expects an already normalized email
    async fn user_by_email(&self, email: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData>;

    async fn game_by_id(&self, game_id: &str, owner_id: &str) -> Result<GameData>;
    async fn games_by_owner(&self, owner_id: &str) -> Result<Vec<GameData>>;
    async fn create_game(&self, owner_id: &str, new_game: NewGame) -> Result<GameData>;
    async fn update_game(
        &self,
        game_id: &str,
        owner_id: &str,
        changes: GameChanges,
    ) -> Result<GameData>;
    async fn delete_game(&self, game_id: &str, owner_id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    /// Already hashed
    pub password: String,
    pub bio: String,
    pub is_public: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatedUser {
    pub id: PrimaryKey,
    /// `Some(None)` clears the avatar
    pub avatar: Option<Option<String>>,
    pub bio: Option<String>,
    pub is_public: Option<bool>,
}

/// The fields of a game that is being added to a library
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewGame {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub platform: String,
    pub status: GameStatus,
    pub cover_image: Option<String>,
    #[validate(range(min = 0.0, max = 10.0))]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// A partial update of a game. Absent fields are left untouched,
/// and `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameChanges {
    pub title: Option<String>,
    pub platform: Option<String>,
    pub status: Option<GameStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub cover_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub rating: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub genres: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl NewGame {
    /// Trims the free-form identifiers so uniqueness isn't fooled by whitespace
    pub fn normalize(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.platform = self.platform.trim().to_string();
        self.cover_image = self.cover_image.map(|c| c.trim().to_string());
        self.description = self.description.map(|d| d.trim().to_string());
        self
    }
}

impl GameChanges {
    pub fn normalize(mut self) -> Self {
        self.title = self.title.map(|t| t.trim().to_string());
        self.platform = self.platform.map(|p| p.trim().to_string());
        self.cover_image = self
            .cover_image
            .map(|c| c.map(|c| c.trim().to_string()));
        self.description = self
            .description
            .map(|d| d.map(|d| d.trim().to_string()));
        self
    }

    /// Applies the changes onto an existing game, bumping its modification time
    pub fn apply(self, game: &mut GameData) {
        if let Some(title) = self.title {
            game.title = title;
        }
        if let Some(platform) = self.platform {
            game.platform = platform;
        }
        if let Some(status) = self.status {
            game.status = status;
        }
        if let Some(cover_image) = self.cover_image {
            game.cover_image = cover_image;
        }
        if let Some(rating) = self.rating {
            game.rating = rating;
        }
        if let Some(genres) = self.genres {
            game.genres = genres.unwrap_or_default();
        }
        if let Some(description) = self.description {
            game.description = description;
        }
        if let Some(notes) = self.notes {
            game.notes = notes;
        }

        game.updated_at = chrono::Utc::now();
    }
}

impl Validate for GameChanges {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let mut check_length = |field: &'static str, value: Option<&str>, min, max| {
            if let Some(value) = value {
                let length = value.chars().count();
                if length < min || length > max {
                    errors.add(field, ValidationError::new("length"));
                }
            }
        };

        check_length("title", self.title.as_deref(), 1, 200);
        check_length("platform", self.platform.as_deref(), 1, 100);
        check_length("description", self.description.clone().flatten().as_deref(), 0, 2000);
        check_length("notes", self.notes.clone().flatten().as_deref(), 0, 1000);

        if let Some(Some(rating)) = self.rating {
            if !(0.0..=10.0).contains(&rating) {
                errors.add("rating", ValidationError::new("range"));
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
