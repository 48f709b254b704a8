use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{auth, games, schemas, serialized};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::health,
        auth::register,
        auth::login,
        auth::me,
        auth::update_me,
        games::create_game,
        games::list_games,
        games::my_games,
        games::game,
        games::update_game,
        games::delete_game,
        games::search,
        games::popular,
        games::explore,
    ),
    components(schemas(
        schemas::RegisterSchema,
        schemas::LoginSchema,
        schemas::ProfileSchema,
        serialized::User,
        serialized::Game,
        serialized::CatalogGame,
        serialized::AuthResult,
        serialized::UserResult,
        serialized::Message,
        serialized::Health,
        serialized::ErrorBody,
    )),
    modifiers(&Security),
    info(
        description = "gameshelf-server exposes endpoints to manage a personal game library"
    )
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
