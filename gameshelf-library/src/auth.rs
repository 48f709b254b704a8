use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use log::info;
use rand::rngs::OsRng;
use thiserror::Error;

use crate::{
    util::normalize_email, DatabaseError, NewUser, SharedDatabase, UpdatedUser, UserData,
};

/// Registers users and checks their credentials
pub struct Auth {
    db: SharedDatabase,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Email, username or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
    #[error("{0}")]
    Validation(String),
}

impl Auth {
    const MAX_BIO_LENGTH: usize = 500;

    pub fn new(db: &SharedDatabase) -> Self {
        Self { db: db.clone() }
    }

    /// Creates a user with a freshly hashed password
    pub async fn register(&self, new_user: NewPlainUser) -> Result<UserData, AuthError> {
        let password = hash_password(new_user.password).await?;

        self.db
            .create_user(NewUser {
                username: new_user.username.trim().to_string(),
                email: normalize_email(&new_user.email),
                password,
                bio: String::new(),
                is_public: true,
            })
            .await
            .map_err(AuthError::Db)
    }

    /// Checks the credentials, returning the user they belong to.
    /// The identifier is tried as an email first, then as a username.
    pub async fn login(&self, credentials: Credentials) -> Result<UserData, AuthError> {
        let user = match self
            .db
            .user_by_email(&normalize_email(&credentials.identifier))
            .await
        {
            Err(DatabaseError::NotFound { .. }) => {
                self.db
                    .user_by_username(credentials.identifier.trim())
                    .await
            }
            result => result,
        }
        .map_err(|e| match e {
            DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
            err => AuthError::Db(err),
        })?;

        let matches = verify_password(credentials.password, user.password.clone()).await?;

        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    pub async fn user_by_id(&self, user_id: &str) -> Result<UserData, DatabaseError> {
        self.db.user_by_id(user_id).await
    }

    /// Updates the public profile of a user
    pub async fn update_profile(&self, updated_user: UpdatedUser) -> Result<UserData, AuthError> {
        let bio_length = updated_user
            .bio
            .as_ref()
            .map(|b| b.chars().count())
            .unwrap_or_default();

        if bio_length > Self::MAX_BIO_LENGTH {
            return Err(AuthError::Validation(format!(
                "Bio cannot exceed {} characters",
                Self::MAX_BIO_LENGTH
            )));
        }

        self.db
            .update_user(UpdatedUser {
                bio: updated_user.bio.map(|b| b.trim().to_string()),
                ..updated_user
            })
            .await
            .map_err(AuthError::Db)
    }

    /// Creates the given account unless its email is already registered.
    /// Returns the new user if one was created.
    pub async fn ensure_admin(
        &self,
        admin: NewPlainUser,
    ) -> Result<Option<UserData>, AuthError> {
        match self.db.user_by_email(&normalize_email(&admin.email)).await {
            Ok(_) => {
                info!("Admin account {} already exists", admin.email);
                Ok(None)
            }
            Err(DatabaseError::NotFound { .. }) => {
                let user = self.register(admin).await?;
                info!("Created admin account {}", user.username);

                Ok(Some(user))
            }
            Err(e) => Err(AuthError::Db(e)),
        }
    }
}

/// Hashes on a blocking thread, argon2 is deliberately slow
async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::HashError(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::HashError(e.to_string()))?
}

async fn verify_password(password: String, stored: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || {
        let stored = PasswordHash::parse(&stored, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &stored)
            .is_ok())
    })
    .await
    .map_err(|e| AuthError::HashError(e.to_string()))?
}

#[derive(Debug)]
pub struct Credentials {
    /// Either the email or the username
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct NewPlainUser {
    pub username: String,
    pub email: String,
    pub password: String,
}
