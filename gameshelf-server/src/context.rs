use std::{convert::Infallible, sync::Arc};

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use gameshelf_library::Shelf;

#[derive(Clone)]
pub struct ServerContext {
    pub shelf: Arc<Shelf>,
    /// Reported by the health endpoint
    pub environment: String,
}

/// Lets handlers take the context directly instead of through `State`
#[async_trait]
impl FromRequestParts<ServerContext> for ServerContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.clone())
    }
}
