//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls

use chrono::{DateTime, SecondsFormat, Utc};
use gameshelf_library::{CatalogEntry, GameData, UserData};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: String,
    username: String,
    email: String,
    avatar: Option<String>,
    bio: String,
    is_public: bool,
    created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    id: String,
    owner: String,
    title: String,
    platform: String,
    /// Pending, Playing or Completed
    status: String,
    cover_image: Option<String>,
    rating: Option<f64>,
    genres: Vec<String>,
    description: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogGame {
    id: u64,
    name: String,
    image_url: String,
    description: Option<String>,
    rating: Option<f64>,
    genres: Vec<String>,
    /// Only present for authenticated requests
    #[serde(skip_serializing_if = "Option::is_none")]
    in_library: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResult {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResult {
    pub success: bool,
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Message {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Health {
    pub status: String,
    pub timestamp: String,
    pub environment: String,
    /// Either durable or volatile
    pub storage: String,
}

/// The body of every error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors,
        }
    }
}

pub fn timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
            bio: self.bio.clone(),
            is_public: self.is_public,
            created_at: timestamp(&self.created_at),
        }
    }
}

impl ToSerialized<Game> for GameData {
    fn to_serialized(&self) -> Game {
        Game {
            id: self.id.clone(),
            owner: self.owner_id.clone(),
            title: self.title.clone(),
            platform: self.platform.clone(),
            status: self.status.to_string(),
            cover_image: self.cover_image.clone(),
            rating: self.rating,
            genres: self.genres.clone(),
            description: self.description.clone(),
            notes: self.notes.clone(),
            created_at: timestamp(&self.created_at),
            updated_at: timestamp(&self.updated_at),
        }
    }
}

impl ToSerialized<CatalogGame> for CatalogEntry {
    fn to_serialized(&self) -> CatalogGame {
        CatalogGame {
            id: self.id,
            name: self.name.clone(),
            image_url: self.image_url.clone(),
            description: self.description.clone(),
            rating: self.rating,
            genres: self.genres.clone(),
            in_library: self.in_library,
        }
    }
}
