use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::get,
    Json,
};
use gameshelf_library::{mark_owned, CatalogEntry, ExploreQuery, GameChanges, NewGame};
use log::warn;

use crate::{
    auth::{MaybeSession, Session},
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{ExploreParams, JsonBody},
    serialized::{CatalogGame, ErrorBody, Game, Message, ToSerialized},
    Router,
};

const MAX_SEARCH_LENGTH: usize = 100;

/// Flags catalog entries the caller already owns, if the caller is known
async fn annotate(
    context: &ServerContext,
    session: MaybeSession,
    mut entries: Vec<CatalogEntry>,
) -> Vec<CatalogGame> {
    if let MaybeSession(Some(session)) = session {
        match context.shelf.library.list_by_owner(session.user_id()).await {
            Ok(games) => mark_owned(&mut entries, &games),
            Err(e) => warn!("Could not check catalog entries against library: {}", e),
        }
    }

    entries.to_serialized()
}

#[utoipa::path(
    post,
    path = "/api/games",
    tag = "games",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Game),
        (status = 400, body = ErrorBody),
        (status = 409, body = ErrorBody, description = "The game is already in the library")
    )
)]
async fn create_game(
    session: Session,
    context: ServerContext,
    JsonBody(body): JsonBody<NewGame>,
) -> ServerResult<(StatusCode, Json<Game>)> {
    let game = context
        .shelf
        .library
        .create(session.user_id(), body)
        .await?;

    Ok((StatusCode::CREATED, Json(game.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/api/games",
    tag = "games",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Game>)
    )
)]
async fn list_games(session: Session, context: ServerContext) -> ServerResult<Json<Vec<Game>>> {
    let games = context
        .shelf
        .library
        .list_by_owner(session.user_id())
        .await?;

    Ok(Json(games.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/games/my",
    tag = "games",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Game>)
    )
)]
async fn my_games(session: Session, context: ServerContext) -> ServerResult<Json<Vec<Game>>> {
    list_games(session, context).await
}

#[utoipa::path(
    get,
    path = "/api/games/{id}",
    tag = "games",
    params(
        ("id" = String, Path, description = "The id of the game")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Game),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
async fn game(
    session: Session,
    context: ServerContext,
    Path(game_id): Path<String>,
) -> ServerResult<Json<Game>> {
    let game = context
        .shelf
        .library
        .get(&game_id, session.user_id())
        .await?;

    Ok(Json(game.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/api/games/{id}",
    tag = "games",
    params(
        ("id" = String, Path, description = "The id of the game")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Game),
        (status = 400, body = ErrorBody),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 409, body = ErrorBody)
    )
)]
async fn update_game(
    session: Session,
    context: ServerContext,
    Path(game_id): Path<String>,
    JsonBody(changes): JsonBody<GameChanges>,
) -> ServerResult<Json<Game>> {
    let game = context
        .shelf
        .library
        .update(&game_id, session.user_id(), changes)
        .await?;

    Ok(Json(game.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/api/games/{id}",
    tag = "games",
    params(
        ("id" = String, Path, description = "The id of the game")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
async fn delete_game(
    session: Session,
    context: ServerContext,
    Path(game_id): Path<String>,
) -> ServerResult<Json<Message>> {
    context
        .shelf
        .library
        .delete(&game_id, session.user_id())
        .await?;

    Ok(Json(Message {
        success: true,
        message: "Game deleted".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/games/search/{query}",
    tag = "catalog",
    params(
        ("query" = String, Path, description = "Between 1 and 100 characters")
    ),
    responses(
        (status = 200, body = Vec<CatalogGame>),
        (status = 400, body = ErrorBody)
    )
)]
async fn search(
    session: MaybeSession,
    context: ServerContext,
    Path(query): Path<String>,
) -> ServerResult<Json<Vec<CatalogGame>>> {
    let length = query.trim().chars().count();

    if length == 0 || length > MAX_SEARCH_LENGTH {
        return Err(ServerError::validation("Invalid search term"));
    }

    let entries = context.shelf.catalog.search(&query).await;

    Ok(Json(annotate(&context, session, entries).await))
}

#[utoipa::path(
    get,
    path = "/api/games/popular",
    tag = "catalog",
    responses(
        (status = 200, body = Vec<CatalogGame>)
    )
)]
async fn popular(session: MaybeSession, context: ServerContext) -> Json<Vec<CatalogGame>> {
    let entries = context.shelf.catalog.popular().await;

    Json(annotate(&context, session, entries).await)
}

#[utoipa::path(
    get,
    path = "/api/games/explore",
    tag = "catalog",
    params(ExploreParams),
    responses(
        (status = 200, body = Vec<CatalogGame>)
    )
)]
async fn explore(
    session: MaybeSession,
    context: ServerContext,
    params: Option<Query<ExploreParams>>,
) -> Json<Vec<CatalogGame>> {
    let params = params.map(|Query(p)| p).unwrap_or_default();

    let query = ExploreQuery {
        ordering: params.ordering,
        page_size: params.page_size.and_then(|s| s.trim().parse().ok()),
        page: params.page.and_then(|p| p.trim().parse().ok()),
    };

    let entries = context.shelf.catalog.explore(query).await;

    Json(annotate(&context, session, entries).await)
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_games).post(create_game))
        .route("/my", get(my_games))
        .route("/search/:query", get(search))
        .route("/popular", get(popular))
        .route("/explore", get(explore))
        .route("/:id", get(game).put(update_game).delete(delete_game))
}
