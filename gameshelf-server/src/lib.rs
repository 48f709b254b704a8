mod auth;
mod context;
mod docs;
mod errors;
mod games;
mod schemas;
mod serialized;

use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::{http::HeaderValue, routing::get, Json};
use chrono::Utc;
use gameshelf_library::Shelf;
use log::{info, warn};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub use context::ServerContext;
pub use errors::ServerError;

use crate::serialized::{timestamp, Health};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 8080;

pub type Router = axum::Router<ServerContext>;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Origins allowed by CORS, any origin if empty
    pub allowed_origins: Vec<String>,
    /// Reported by the health endpoint
    pub environment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_origins: vec![],
            environment: "development".to_string(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, body = Health)
    )
)]
async fn health(context: ServerContext) -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        timestamp: timestamp(&Utc::now()),
        environment: context.environment.clone(),
        storage: context.shelf.storage().as_str().to_string(),
    })
}

async fn not_found() -> ServerError {
    ServerError::NotFound {
        resource: "route",
        identifier: "path",
    }
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {}", o);
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}

/// Builds the complete application with all routes
pub fn router(context: ServerContext, allowed_origins: &[String]) -> axum::Router {
    let api_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/games", games::router());

    Router::new()
        .nest("/api", api_router)
        .route("/health", get(health))
        .route("/api.json", get(docs::docs))
        .fallback(not_found)
        .layer(cors(allowed_origins))
        .with_state(context)
}

/// Starts the gameshelf server
pub async fn run_server(config: ServerConfig, shelf: Shelf) -> std::io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, config.port).into();

    let context = ServerContext {
        shelf: Arc::new(shelf),
        environment: config.environment,
    };

    let listener = TcpListener::bind(&addr).await?;
    info!(
        "Listening on port {} using {} storage",
        config.port,
        context.shelf.storage().as_str()
    );

    axum::serve(listener, router(context, &config.allowed_origins)).await
}
