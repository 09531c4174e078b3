#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the deforestation dashboard.
//!
//! Serves one dataset. Layers are loaded once through a shared
//! [`LayerCache`] and every dashboard request re-runs the pipeline against
//! them with the request's filter selection.

mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use deforest_map_loader::cache::LayerCache;
use deforest_map_loader::{Layers, LoaderError, registry};
use deforest_map_property_models::DatasetDefinition;

/// Server settings. Each field falls back to an environment variable and
/// then to a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `BIND_ADDR`, default `127.0.0.1`.
    pub bind_addr: String,
    /// `PORT`, default `8080`.
    pub port: u16,
    /// Dataset id or definition path. `DATASET`, default `feijo`.
    pub dataset: String,
    /// Directory layer paths are relative to. `DATA_DIR`, default `data`.
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            dataset: "feijo".to_string(),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            dataset: std::env::var("DATASET").unwrap_or(defaults.dataset),
            data_dir: std::env::var("DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// The dataset being served.
    pub definition: DatasetDefinition,
    pub data_dir: PathBuf,
    /// Loaded layers, keyed by dataset identity.
    pub cache: Arc<LayerCache>,
}

impl AppState {
    #[must_use]
    pub const fn new(
        definition: DatasetDefinition,
        data_dir: PathBuf,
        cache: Arc<LayerCache>,
    ) -> Self {
        Self {
            definition,
            data_dir,
            cache,
        }
    }

    /// Returns the served dataset's layers, loading them on first use.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError`] if the dataset fails to load.
    pub fn layers(&self) -> Result<Arc<Layers>, LoaderError> {
        self.cache.get_or_load(&self.definition, &self.data_dir)
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/dataset", web::get().to(handlers::dataset))
            .route("/filters", web::get().to(handlers::filters))
            .route("/dashboard", web::get().to(handlers::dashboard)),
    );
}

/// Starts the dashboard API server.
///
/// Resolves the dataset, loads its layers up front so a broken dataset
/// fails at startup, and starts the Actix-Web HTTP server. The caller is
/// responsible for initializing logging and providing the async runtime
/// (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the dataset cannot be loaded, or
/// if the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    let definition = registry::resolve(&config.dataset).map_err(std::io::Error::other)?;
    let state = web::Data::new(AppState::new(
        definition,
        config.data_dir,
        Arc::new(LayerCache::new()),
    ));

    log::info!("Loading dataset '{}'...", state.definition.id);
    state.layers().map_err(std::io::Error::other)?;

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr, config.port))?
    .run()
    .await
}
