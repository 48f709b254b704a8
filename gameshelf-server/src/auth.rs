use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    routing::{get, post},
    Json,
};
use gameshelf_library::{AuthError, Claims, Credentials, DatabaseError, NewPlainUser, UpdatedUser};

use crate::{
    errors::{ServerError, ServerResult},
    schemas::{LoginSchema, ProfileSchema, RegisterSchema, ValidatedJson},
    serialized::{AuthResult, ErrorBody, ToSerialized, UserResult},
    Router, ServerContext,
};

/// The verified claims of the bearer token sent with the request
pub struct Session(Claims);

impl Session {
    /// Returns the id of the authenticated user
    pub fn user_id(&self) -> &str {
        &self.0.sub
    }
}

/// Like [Session], but requests without a valid token are let through
pub struct MaybeSession(pub Option<Session>);

/// Returns the raw Authorization value, or an error if it isn't a bearer token
fn bearer_token(parts: &Parts) -> Option<Result<&str, ServerError>> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|x| x.to_str().ok())?;

    let parts: Vec<_> = value.split_ascii_whitespace().collect();

    match parts.as_slice() {
        ["Bearer", token] => Some(Ok(*token)),
        _ => Some(Err(ServerError::Unauthorized(
            "Authorization must be Bearer".to_string(),
        ))),
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ServerError::Unauthorized(
            "No token provided, please log in".to_string(),
        ))??;

        let claims = state.shelf.tokens.verify(token)?;

        Ok(Self(claims))
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).and_then(Result::ok);
        let claims = state.shelf.tokens.verify_optional(token);

        Ok(Self(claims.map(Session)))
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterSchema,
    responses(
        (status = 201, body = AuthResult),
        (status = 400, body = ErrorBody, description = "Invalid data or user already registered")
    )
)]
async fn register(
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<(StatusCode, Json<AuthResult>)> {
    if body.password != body.password_confirm {
        return Err(ServerError::validation("Passwords do not match"));
    }

    let user = context
        .shelf
        .auth
        .register(NewPlainUser {
            username: body.username,
            email: body.email,
            password: body.password,
        })
        .await
        .map_err(|e| match e {
            AuthError::Db(DatabaseError::Conflict { .. }) => {
                ServerError::validation("User already registered")
            }
            e => e.into(),
        })?;

    let token = context.shelf.tokens.issue(&user.id, &user.username)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResult {
            success: true,
            message: "User registered".to_string(),
            token,
            user: user.to_serialized(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginSchema,
    responses(
        (status = 200, body = AuthResult),
        (status = 401, body = ErrorBody, description = "Invalid credentials")
    )
)]
async fn login(
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Json<AuthResult>> {
    let user = context
        .shelf
        .auth
        .login(Credentials {
            identifier: body.email,
            password: body.password,
        })
        .await?;

    let token = context.shelf.tokens.issue(&user.id, &user.username)?;

    Ok(Json(AuthResult {
        success: true,
        message: "Logged in".to_string(),
        token,
        user: user.to_serialized(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = UserResult),
        (status = 401, body = ErrorBody)
    )
)]
async fn me(session: Session, context: ServerContext) -> ServerResult<Json<UserResult>> {
    let user = context.shelf.auth.user_by_id(session.user_id()).await?;

    Ok(Json(UserResult {
        success: true,
        user: user.to_serialized(),
    }))
}

#[utoipa::path(
    patch,
    path = "/api/auth/me",
    tag = "auth",
    request_body = ProfileSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = UserResult),
        (status = 400, body = ErrorBody),
        (status = 401, body = ErrorBody)
    )
)]
async fn update_me(
    session: Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<ProfileSchema>,
) -> ServerResult<Json<UserResult>> {
    let user = context
        .shelf
        .auth
        .update_profile(UpdatedUser {
            id: session.user_id().to_string(),
            avatar: body.avatar,
            bio: body.bio,
            is_public: body.is_public,
        })
        .await?;

    Ok(Json(UserResult {
        success: true,
        user: user.to_serialized(),
    }))
}

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me).patch(update_me))
}
