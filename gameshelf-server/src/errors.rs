use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gameshelf_library::{AuthError, DatabaseError, LibraryError, TokenError};
use log::error;
use thiserror::Error;
use validator::ValidationErrors;

use crate::serialized::ErrorBody;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<String>,
    },
    #[error("{0}")]
    Unauthorized(String),
    #[error("You don't have permission to access this {resource}")]
    Forbidden { resource: &'static str },
    #[error("The {resource} was not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            errors: vec![],
        }
    }

    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();

        let body = match self {
            Self::Validation { message, errors } => ErrorBody::new(message, errors),
            Self::Unknown(detail) => {
                error!("Request failed: {}", detail);
                ErrorBody::new("Internal server error", vec![])
            }
            e => ErrorBody::new(e.to_string(), vec![]),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ServerError {
    fn from(value: ValidationErrors) -> Self {
        let mut errors: Vec<_> = value
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors
                    .iter()
                    .map(move |e| format!("{} is invalid ({})", field, e.code))
            })
            .collect();

        errors.sort();

        Self::Validation {
            message: "Invalid data".to_string(),
            errors,
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Forbidden { resource } => Self::Forbidden { resource },
            DatabaseError::Conflict {
                resource: "game", ..
            } => Self::Conflict("This game is already in your library".to_string()),
            e @ DatabaseError::Conflict { .. } => Self::Conflict(e.to_string()),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<LibraryError> for ServerError {
    fn from(value: LibraryError) -> Self {
        match value {
            LibraryError::Validation(errors) => errors.into(),
            LibraryError::Db(e) => e.into(),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::Unauthorized("Invalid credentials".to_string()),
            AuthError::Validation(message) => Self::validation(message),
            AuthError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<TokenError> for ServerError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Expired => {
                Self::Unauthorized("Token has expired, please log in again".to_string())
            }
            TokenError::Invalid => Self::Unauthorized("Invalid token".to_string()),
            e => Self::Unknown(e.to_string()),
        }
    }
}
