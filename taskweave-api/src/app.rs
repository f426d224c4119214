/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use taskweave_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = taskweave_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use taskweave_shared::{
    auth::{
        authorization::{AccessControl, AccessPolicy},
        jwt::TokenIssuer,
        session::SessionGuard,
    },
    cascade::CascadeManager,
    clock::{Clock, SystemClock},
    store::{AccountStore, EntityStore, MemoryStore, PgStore},
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{config::Config, middleware::session::CookiePolicy};

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor. Every
/// collaborator is behind an `Arc`, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Database pool, absent when running on the in-memory store
    pub db: Option<PgPool>,

    pub accounts: Arc<dyn AccountStore>,
    pub entities: Arc<dyn EntityStore>,
    pub clock: Arc<dyn Clock>,

    pub guard: SessionGuard,
    pub access: AccessControl,
    pub cascade: CascadeManager,
    pub cookie_policy: CookiePolicy,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// State backed by PostgreSQL and the system clock
    pub fn new(db: PgPool, config: Config) -> Self {
        let store = Arc::new(PgStore::new(db.clone()));
        Self::assemble(Some(db), store.clone(), store, Arc::new(SystemClock), config)
    }

    /// State backed by a fresh in-memory store
    ///
    /// Used by tests and for running the server without a database.
    pub fn in_memory(clock: Arc<dyn Clock>, config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::assemble(None, store.clone(), store, clock, config)
    }

    fn assemble(
        db: Option<PgPool>,
        accounts: Arc<dyn AccountStore>,
        entities: Arc<dyn EntityStore>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        let issuer = Arc::new(TokenIssuer::new(&config.session.token_config(), clock.clone()));
        let policy = AccessPolicy {
            comment_edit_window: config.comment_edit_window,
        };

        Self {
            db,
            guard: SessionGuard::new(issuer, accounts.clone()),
            access: AccessControl::new(entities.clone(), policy, clock.clone()),
            cascade: CascadeManager::new(entities.clone(), clock.clone()),
            cookie_policy: CookiePolicy::from_config(&config.session),
            accounts,
            entities,
            clock,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                           # Health check (public)
/// └── /v1/
///     ├── /auth/
///     │   ├── POST /register            # public
///     │   ├── POST /login               # public
///     │   ├── POST /logout              # public, clears cookies
///     │   └── GET  /me                  # session
///     ├── POST /accounts/:id/activation # session, admin only
///     ├── /tasks                        # session
///     │   ├── GET, POST /
///     │   ├── GET, PATCH, DELETE /:id
///     │   ├── GET, POST /:id/comments
///     │   └── GET /:id/files
///     ├── /comments                     # session
///     │   ├── GET, PATCH, DELETE /:id
///     │   └── GET /:id/files
///     └── /files                        # session
///         ├── POST /
///         └── GET, DELETE /:id
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Session guard (protected routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::middleware::session::require_session;
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes; only `/me` needs a session
    let auth_routes = Router::new()
        .route("/me", get(routes::auth::me))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ))
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout));

    // Everything below requires a session
    let protected_routes = Router::new()
        .route(
            "/accounts/:id/activation",
            post(routes::accounts::set_activation),
        )
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/tasks/:id/comments",
            get(routes::comments::list_comments).post(routes::comments::create_comment),
        )
        .route("/tasks/:id/files", get(routes::files::list_task_files))
        .route(
            "/comments/:id",
            get(routes::comments::get_comment)
                .patch(routes::comments::update_comment)
                .delete(routes::comments::delete_comment),
        )
        .route("/comments/:id/files", get(routes::files::list_comment_files))
        .route("/files", post(routes::files::create_file))
        .route(
            "/files/:id",
            get(routes::files::get_file).delete(routes::files::delete_file),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        // Cookies only cross origins with credentials allowed
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}
