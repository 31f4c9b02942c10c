use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    routing::{get, post, put},
};
use romvault_core::prelude::*;
use romvault_library::Library;
use tower_http::trace::TraceLayer;
use tracing::info;

mod api;

pub mod auth;
pub mod state;

use state::AppState;

/// The builder for the romvault server.
#[derive(Clone, Debug, Default)]
pub struct RomvaultServer {
    config: ServerConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Largest accepted request body in bytes.
    ///
    /// Defaults to 1 GiB, enough for CD images. `None` disables the limit.
    pub body_limit: Option<usize>,
    pub library: LibraryConfig,
}

const DEFAULT_BODY_LIMIT: usize = 1024 * 1024 * 1024;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            body_limit: Some(DEFAULT_BODY_LIMIT),
            library: LibraryConfig::default(),
        }
    }
}

impl RomvaultServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn build<S: StorageBackend, R: RecordStore, A: AuthProvider>(
        self,
        storage: S,
        records: R,
        auth: A,
    ) -> Router {
        let ServerConfig {
            body_limit,
            library,
        } = self.config;
        info!(mode = ?library.download.mode, "download references configured");

        let state = AppState {
            library: Library::new(storage, records, &library),
            auth,
        };
        let body_limit = match body_limit {
            Some(limit) => DefaultBodyLimit::max(limit),
            None => DefaultBodyLimit::disable(),
        };

        Router::new()
            .route("/health", get(|| async { "OK" }))
            .route("/games", get(api::list_games).post(api::upload_rom))
            .route(
                "/games/{id}",
                get(api::get_game)
                    .patch(api::update_game)
                    .delete(api::delete_game),
            )
            .route("/games/{id}/rom", get(api::stream_game_rom))
            .route("/games/{id}/download", get(api::game_download_reference))
            .route("/games/{id}/cover", put(api::upload_cover))
            .route(
                "/games/{id}/screenshots",
                get(api::list_screenshots).post(api::upload_screenshot),
            )
            .route(
                "/games/{id}/versions",
                get(api::list_versions).post(api::upload_version),
            )
            .route(
                "/games/{id}/versions/{version_id}/preferred",
                put(api::set_preferred_version),
            )
            .route("/versions/{id}", axum::routing::delete(api::delete_version))
            .route("/versions/{id}/rom", get(api::stream_version_rom))
            .route("/versions/{id}/download", get(api::version_download_reference))
            .route("/bios", get(api::list_bios).post(api::upload_bios))
            .route("/bios/{id}", axum::routing::delete(api::delete_bios))
            .route("/bios/{id}/download", get(api::stream_bios))
            .route("/bios/{id}/reference", get(api::bios_download_reference))
            .route("/bios/{id}/verify", post(api::verify_bios))
            .route("/systems/{system}/bios", get(api::bios_status))
            .route("/save-states", get(api::list_saves).post(api::upload_save))
            .route("/save-states/{id}", axum::routing::delete(api::delete_save))
            .route("/save-states/{id}/download", get(api::stream_save))
            .route(
                "/save-states/{id}/screenshot",
                get(api::stream_save_screenshot),
            )
            .route("/duplicates", get(api::duplicates))
            .route("/orphans", get(api::orphans))
            .layer(body_limit)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

pub mod prelude {
    pub use crate::auth::*;
    pub use crate::state::*;
    pub use crate::{RomvaultServer, ServerConfig};
}
