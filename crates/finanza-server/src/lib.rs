//! Finanza Web Server
//!
//! Axum-based REST API for the Finanza personal finance tracker.
//!
//! Two modes:
//! - **Cloud**: a relational database is configured; every user signs in with
//!   email and password and sends `Authorization: Bearer <token>`.
//! - **Local**: no database; a single shared ledger backed by the local JSON
//!   slot, no authentication.
//!
//! Security features:
//! - Restrictive CORS policy
//! - Security headers (CSP, nosniff, frame denial)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use finanza_core::{
    ai::InsightGenerator, AIClient, AppConfig, CategoryCatalog, Database, DbIdentity,
    IdentityProvider, LedgerRegistry, LocalStore, Session, TransactionStore,
};

mod handlers;

/// Authorization header carrying the session token
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub registry: Arc<LedgerRegistry>,
    /// `None` in local mode
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub catalog: CategoryCatalog,
    pub config: ServerConfig,
    /// Name of the configured AI backend, for status output
    pub ai_backend: Option<&'static str>,
}

impl AppState {
    /// Assemble state from its parts
    ///
    /// Must be called from within a Tokio runtime: with an identity provider,
    /// a task is spawned that drops a user's ledger whenever they sign in or out.
    pub fn new(
        registry: Arc<LedgerRegistry>,
        identity: Option<Arc<dyn IdentityProvider>>,
        config: ServerConfig,
    ) -> Self {
        if let Some(identity) = &identity {
            registry.watch_sessions(identity.subscribe());
        }
        Self {
            registry,
            identity,
            catalog: CategoryCatalog::default(),
            config,
            ai_backend: None,
        }
    }

    /// Build state from the application configuration
    ///
    /// A configured database selects cloud mode; otherwise the local slot in
    /// the data directory is used.
    pub async fn from_config(app: &AppConfig, config: ServerConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let ai = app.ai_client();
        let ai_backend = ai.as_ref().map(AIClient::backend_name);
        let generator = ai.map(|client| Arc::new(client) as Arc<dyn InsightGenerator>);

        let (store, identity): (Arc<dyn TransactionStore>, Option<Arc<dyn IdentityProvider>>) =
            match &app.database {
                Some(path) => {
                    let path = path.to_string_lossy();
                    let db = Database::new(&path)
                        .with_context(|| format!("Failed to open database at {}", path))?;
                    let identity = DbIdentity::new(db.clone()).with_session_ttl(
                        chrono::Duration::days(app.session_ttl_days),
                    );
                    (Arc::new(db), Some(Arc::new(identity)))
                }
                None => {
                    let mut local = LocalStore::new(&app.data_dir).with_context(|| {
                        format!("Failed to prepare data directory {}", app.data_dir.display())
                    })?;
                    if !app.seed_demo_data {
                        local = local.without_seed();
                    }
                    (Arc::new(local), None)
                }
            };

        let registry = Arc::new(
            LedgerRegistry::new(store, generator).with_insight_timeout(app.insight_timeout),
        );

        let mut state = Self::new(registry, identity, config);
        state.ai_backend = ai_backend;
        Ok(state)
    }

    pub fn mode(&self) -> &'static str {
        if self.identity.is_some() {
            "cloud"
        } else {
            "local"
        }
    }

    /// The identity provider, or a 400 in local mode
    pub(crate) fn require_identity(&self) -> Result<&Arc<dyn IdentityProvider>, AppError> {
        self.identity
            .as_ref()
            .ok_or_else(|| AppError::bad_request("identity provider not configured"))
    }
}

/// Who is making the request; inserted by [`auth_middleware`]
#[derive(Clone)]
pub struct CurrentUser {
    /// `None` in local mode
    pub session: Option<Session>,
    /// Raw bearer token, needed for sign-out
    pub token: Option<String>,
}

impl CurrentUser {
    /// Ledger owner key
    pub fn owner(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user.id.as_str())
    }
}

/// Extract the bearer token from request headers
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication middleware - resolves the bearer token to a session
///
/// Local mode has no identity provider, so every request passes as the single
/// local owner. In cloud mode a missing, unknown or expired token is a 401.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(identity) = &state.identity else {
        request.extensions_mut().insert(CurrentUser {
            session: None,
            token: None,
        });
        return next.run(request).await;
    };

    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        warn!(path = %request.uri().path(), "Unauthorized request - no bearer token");
        return AppError::unauthorized("Authentication required").into_response();
    };

    match identity.session(&token).await {
        Ok(Some(session)) => {
            debug!(user_id = %session.user.id, path = %request.uri().path(), "Authenticated");
            request.extensions_mut().insert(CurrentUser {
                session: Some(session),
                token: Some(token),
            });
            next.run(request).await
        }
        Ok(None) => {
            warn!(path = %request.uri().path(), "Unauthorized request - invalid or expired session");
            AppError::unauthorized("Authentication required").into_response()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the router with all API routes
pub fn create_router(state: AppState, static_dir: Option<&str>) -> Router {
    let allowed_origins = state.config.allowed_origins.clone();
    let state = Arc::new(state);

    let public_routes = Router::new()
        .route("/status", get(handlers::get_status))
        .route("/auth/signup", post(handlers::sign_up))
        .route("/auth/signin", post(handlers::sign_in))
        .route("/categories", get(handlers::list_categories));

    let protected_routes = Router::new()
        .route("/auth/signout", post(handlers::sign_out))
        .route("/me", get(handlers::get_me))
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route("/transactions/:id", delete(handlers::delete_transaction))
        .route("/summary", get(handlers::get_summary))
        .route("/insights", get(handlers::get_insights))
        .route("/insights/refresh", post(handlers::refresh_insights))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = public_routes.merge(protected_routes);

    // Configure CORS - restrictive by default
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server and run until it is stopped
pub async fn serve(
    app_config: &AppConfig,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let state = AppState::from_config(app_config, config).await?;

    match &app_config.database {
        Some(path) => info!(database = %path.display(), "Cloud mode: sign-in required"),
        None => {
            info!(data_dir = %app_config.data_dir.display(), "Local mode: single shared ledger");
            warn!("Authentication disabled in local mode - do not expose to network!");
        }
    }

    check_ai_connection(app_config).await;

    let app = create_router(state, static_dir);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log whether the configured AI backend is reachable
async fn check_ai_connection(app_config: &AppConfig) {
    match app_config.ai_client() {
        Some(client) => {
            if client.health_check().await {
                info!(
                    backend = client.backend_name(),
                    host = client.host(),
                    model = client.model(),
                    "AI backend connected"
                );
            } else {
                warn!(
                    backend = client.backend_name(),
                    host = client.host(),
                    "AI backend configured but not responding; insights will fall back to a generic tip"
                );
            }
        }
        None => {
            info!("AI backend not configured (set GEMINI_API_KEY or AI_BACKEND to enable insights)");
        }
    }
}

/// Application error type with sanitized messages
///
/// Internal errors are logged server-side but only a generic message is
/// returned to the client. Core domain errors keep their own message.
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            error!(error = %err, status = %self.status, "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        use finanza_core::Error as CoreError;

        let err = err.into();
        let mapped = match err.downcast_ref::<CoreError>() {
            Some(CoreError::Validation(msg)) | Some(CoreError::InvalidData(msg)) => {
                Some((StatusCode::BAD_REQUEST, msg.clone()))
            }
            Some(CoreError::NotFound(msg)) => Some((StatusCode::NOT_FOUND, msg.clone())),
            Some(CoreError::Unauthorized(msg)) => Some((StatusCode::UNAUTHORIZED, msg.clone())),
            Some(CoreError::Conflict(msg)) => Some((StatusCode::CONFLICT, msg.clone())),
            Some(CoreError::Store(_)) => Some((
                StatusCode::BAD_GATEWAY,
                "Storage is unavailable; nothing was changed".to_string(),
            )),
            _ => None,
        };

        match mapped {
            // Store failures are still logged in full
            Some((status, message)) if status == StatusCode::BAD_GATEWAY => Self {
                status,
                message,
                internal: Some(err),
            },
            Some((status, message)) => Self {
                status,
                message,
                internal: None,
            },
            None => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "An internal error occurred".to_string(),
                internal: Some(err),
            },
        }
    }
}
