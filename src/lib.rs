pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    handler::Handler,
    middleware::from_fn,
    routing::get,
    Router,
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::database::{
    memory::MemoryUserRepository,
    user_repository::{PgUserRepository, UserRepository},
};
use crate::error::Result;
use crate::middleware::{cors::api_cors, json_guard::check_json_is_valid};
use crate::routes::{health, users};
use crate::services::{
    credential_service::{CredentialService, MemoryCredentialService, PgCredentialService},
    user_service::UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    /// Base URL prefixed to request paths in pagination links.
    pub app_url: Arc<str>,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self::from_parts(
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgCredentialService::new(pool)),
            &config.app_url,
        )
    }

    pub fn from_parts(
        users: Arc<dyn UserRepository>,
        credentials: Arc<dyn CredentialService>,
        app_url: &str,
    ) -> Self {
        Self {
            user_service: UserService::new(users, credentials),
            app_url: Arc::from(app_url.trim_end_matches('/')),
        }
    }

    /// State backed by process memory, for tests and local experiments.
    pub fn in_memory(app_url: &str) -> Result<Self> {
        Ok(Self::from_parts(
            Arc::new(MemoryUserRepository::new()),
            Arc::new(MemoryCredentialService::new()?),
            app_url,
        ))
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/users",
            get(users::list_users).post(users::store_user.layer(from_fn(check_json_is_valid))),
        )
        .route(
            "/api/users/:id",
            get(users::show_user)
                .put(users::update_user.layer(from_fn(check_json_is_valid)))
                .delete(users::destroy_user),
        )
        .fallback(health::not_found)
        .with_state(state)
        .layer(api_cors())
        .layer(TraceLayer::new_for_http())
}
