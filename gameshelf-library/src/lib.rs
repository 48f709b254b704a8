mod auth;
mod catalog;
mod db;
mod library;
mod tokens;
mod util;

use std::sync::Arc;

pub use auth::*;
pub use catalog::*;
pub use db::*;
pub use library::*;
pub use tokens::*;
pub use util::double_option;

/// The gameshelf system, tying accounts, sessions, libraries and the catalog to one database.
pub struct Shelf {
    database: SharedDatabase,

    pub auth: Auth,
    pub tokens: Tokens,
    pub library: Library,
    pub catalog: Catalog,
}

impl Shelf {
    pub fn new(
        database: impl Database + 'static,
        tokens: TokenConfig,
        catalog: CatalogConfig,
    ) -> Self {
        let database: SharedDatabase = Arc::new(database);

        Self {
            auth: Auth::new(&database),
            library: Library::new(&database),
            tokens: Tokens::new(tokens),
            catalog: Catalog::new(catalog),
            database,
        }
    }

    /// Which backend is serving requests
    pub fn storage(&self) -> StorageKind {
        self.database.kind()
    }
}
