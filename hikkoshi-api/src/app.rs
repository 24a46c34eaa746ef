/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use hikkoshi_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    mailer::{EmailSender, LogEmailSender},
    middleware::security::SecurityHeadersLayer,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use hikkoshi_shared::{
    auth::middleware::{jwt_auth_middleware, optional_jwt_auth_middleware, AuthError},
    membership::{InvitePolicy, MembershipStore, PgMembershipStore, PolicyError},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (tasks, messages, email change)
    pub db: PgPool,

    /// Accounts, households and invites
    pub store: Arc<dyn MembershipStore>,

    /// Password reset mail
    pub email_sender: Arc<dyn EmailSender>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// State backed entirely by PostgreSQL
    pub fn new(db: PgPool, config: Config) -> Self {
        let store = Arc::new(PgMembershipStore::new(db.clone()));
        Self::with_store(db, store, config)
    }

    /// State with a caller-provided membership store
    pub fn with_store(db: PgPool, store: Arc<dyn MembershipStore>, config: Config) -> Self {
        Self {
            db,
            store,
            email_sender: Arc::new(LogEmailSender),
            config: Arc::new(config),
        }
    }

    /// Replaces the email sender
    pub fn with_email_sender(mut self, email_sender: Arc<dyn EmailSender>) -> Self {
        self.email_sender = email_sender;
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn invite_policy(&self) -> Result<InvitePolicy, PolicyError> {
        self.config.invite_policy()
    }

    pub fn store(&self) -> &dyn MembershipStore {
        self.store.as_ref()
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Layout
///
/// ```text
/// /
/// ├── GET  /health
/// ├── GET  /invite?invite={code}           # preview (optional auth)
/// └── /v1/
///     ├── /auth/                           # public
///     │   ├── POST /signup
///     │   ├── POST /login
///     │   ├── POST /refresh
///     │   ├── POST /email/confirm
///     │   ├── POST /password/reset
///     │   └── POST /password/reset/confirm
///     ├── GET|PATCH /me                    # everything below needs a JWT
///     ├── POST /me/email, POST /me/password
///     ├── /households/
///     │   ├── POST   /
///     │   ├── GET    /current
///     │   ├── POST   /leave
///     │   ├── PUT    /:id/move-date
///     │   ├── GET    /:id/members
///     │   ├── DELETE /:id/members/:account_id
///     │   └── POST|GET /:id/invites
///     ├── POST /invites/redeem
///     ├── GET|POST /tasks, GET|PUT|DELETE /tasks/:id, POST /tasks/:id/complete
///     ├── GET  /calendar?from=&to=
///     └── /messages/ (POST /, GET /inbox, GET /sent, GET /unread-count, POST /:id/read)
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, request tracing, then
/// authentication per route group.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/invite",
            get(routes::invites::preview_invite)
                .layer(from_fn_with_state(state.clone(), optional_auth)),
        );

    let auth_routes = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/email/confirm", post(routes::auth::confirm_email_change))
        .route("/password/reset", post(routes::auth::request_password_reset))
        .route(
            "/password/reset/confirm",
            post(routes::auth::confirm_password_reset),
        );

    let household_routes = Router::new()
        .route("/", post(routes::households::create_household))
        .route("/current", get(routes::households::current_household))
        .route("/leave", post(routes::households::leave_household))
        .route("/:id/move-date", put(routes::households::update_move_date))
        .route("/:id/members", get(routes::households::list_members))
        .route(
            "/:id/members/:account_id",
            delete(routes::households::remove_member),
        )
        .route(
            "/:id/invites",
            post(routes::invites::issue_invite).get(routes::invites::list_invites),
        );

    let task_routes = Router::new()
        .route(
            "/",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:id/complete", post(routes::tasks::complete_task));

    let message_routes = Router::new()
        .route("/", post(routes::messages::send_message))
        .route("/inbox", get(routes::messages::inbox))
        .route("/sent", get(routes::messages::sent))
        .route("/unread-count", get(routes::messages::unread_count))
        .route("/:id/read", post(routes::messages::mark_read));

    let authenticated_routes = Router::new()
        .route("/me", get(routes::auth::me).patch(routes::auth::update_profile))
        .route("/me/email", post(routes::auth::request_email_change))
        .route("/me/password", post(routes::auth::change_password))
        .nest("/households", household_routes)
        .route("/invites/redeem", post(routes::invites::redeem_invite))
        .nest("/tasks", task_routes)
        .route("/calendar", get(routes::tasks::calendar))
        .nest("/messages", message_routes)
        .layer(from_fn_with_state(state.clone(), require_auth));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(authenticated_routes);

    Router::new()
        .merge(public_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Rejects requests without a valid access token; injects `AuthContext`
async fn require_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    jwt_auth_middleware(state.config.jwt.secret.clone(), req, next).await
}

/// Injects `AuthContext` when a valid access token is present
async fn optional_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    optional_jwt_auth_middleware(state.config.jwt.secret.clone(), req, next).await
}
