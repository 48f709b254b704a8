use std::sync::Arc;

use colored::Colorize;
use config::{Config, ConfigError};
use gameshelf_library::{
    AuthError, FallbackDatabase, MemoryDatabase, PgDatabase, SharedDatabase, Shelf,
};
use gameshelf_server::ServerConfig;
use log::{error, info, warn};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

use crate::logging::DIMMED;

mod config;
mod logging;

pub struct Gameshelf {
    shelf: Shelf,
    server: ServerConfig,
    runtime: Runtime,
}

#[derive(Debug, Error)]
enum GameshelfError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not create the admin account: {0}")]
    Admin(#[from] AuthError),

    #[error("Could not serve requests: {0}")]
    Server(#[from] std::io::Error),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Gameshelf {
    fn new() -> Result<Self, GameshelfError> {
        let config = Config::from_env()?;

        info!("Building async runtime...");
        let main_runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("gameshelf-async")
            .build()
            .map_err(|e| GameshelfError::Fatal(e.to_string()))?;

        let volatile = main_runtime.block_on(MemoryDatabase::with_file(&config.data_file));

        let durable = match &config.database_url {
            Some(url) => {
                info!("Connecting to database...");

                match main_runtime.block_on(PgDatabase::new(url, config.database_timeout)) {
                    Ok(db) => Some(Arc::new(db) as SharedDatabase),
                    Err(e) => {
                        warn!("Could not connect to postgres, using the volatile store: {}", e);
                        None
                    }
                }
            }
            None => {
                warn!("DATABASE_URL is not set, using the volatile store");
                None
            }
        };

        let database =
            FallbackDatabase::new(durable, volatile).with_timeout(config.database_timeout);
        let shelf = Shelf::new(database, config.tokens, config.catalog);

        if let Some(admin) = config.admin {
            main_runtime.block_on(shelf.auth.ensure_admin(admin))?;
        }

        Ok(Self {
            shelf,
            server: config.server,
            runtime: main_runtime,
        })
    }

    fn run(self) -> Result<(), GameshelfError> {
        self.runtime
            .block_on(gameshelf_server::run_server(self.server, self.shelf))?;

        Ok(())
    }
}

impl GameshelfError {
    fn hint(&self) -> String {
        match self {
            GameshelfError::Config(_) => "Check the environment variables or the .env file, then try again.".to_string(),
            GameshelfError::Admin(_) => "The admin account is seeded from GAMESHELF_ADMIN_USERNAME, GAMESHELF_ADMIN_EMAIL and GAMESHELF_ADMIN_PASSWORD. Make sure they are valid, or unset them.".to_string(),
            GameshelfError::Server(_) => "Make sure GAMESHELF_PORT is free and can be bound by this user.".to_string(),
            GameshelfError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn report(error: GameshelfError) {
    error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "Gameshelf failed to start!".bold().red());
    error!("{}", error);
    error!("{}", format!("Hint: {}", error.hint()).color(DIMMED).italic());
}

fn main() {
    let _ = dotenvy::dotenv();

    if let Err(e) = logging::init_logger(logging::level_from_env()) {
        eprintln!("Could not initialize logging: {}", e);
    }

    match Gameshelf::new() {
        Ok(gameshelf) => {
            info!("Initialized successfully.");

            if let Err(error) = gameshelf.run() {
                report(error);
            }
        }
        Err(error) => report(error),
    }
}
