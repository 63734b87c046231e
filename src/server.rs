use std::sync::Arc;

use axum::{
    extract::{Form, Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::cache::SnapshotCache;
use crate::config::{Config, Credentials};
use crate::db::SnapshotSource;
use crate::error::AppError;
use crate::export::{self, ExportTable};
use crate::metrics::Dashboard;
use crate::render::{self, View};
use crate::session::{AuthState, SessionStore};

const SESSION_COOKIE: &str = "analytics_session";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub cache: SnapshotCache,
    pub sessions: SessionStore,
    pub credentials: Credentials,
    pub zero_fill: bool,
}

impl AppStateInner {
    pub fn new(config: &Config, source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            cache: SnapshotCache::new(source, config.cache_ttl),
            sessions: SessionStore::new(config.session_ttl),
            credentials: config.credentials.clone(),
            zero_fill: config.zero_fill,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    view: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", post(login))
        .route("/api/dashboard", get(dashboard_json))
        .route("/export/{table}", get(export_table))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Dashboard listening on http://{addr}");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn session_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

fn session_cookie(id: Uuid) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

async fn require_session(state: &AppState, jar: &CookieJar) -> Result<(), AppError> {
    match state.sessions.state(session_id(jar)).await {
        AuthState::Authenticated => Ok(()),
        AuthState::Unauthenticated => Err(AppError::Unauthorized),
    }
}

async fn index(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ViewQuery>,
) -> Result<Html<String>, AppError> {
    if state.sessions.state(session_id(&jar)).await == AuthState::Unauthenticated {
        return Ok(Html(render::login_page(None)));
    }

    let snapshot = state.cache.get().await.map_err(AppError::DataUnavailable)?;
    let dashboard = Dashboard::compute(&snapshot);
    let view = View::from_query(query.view.as_deref());
    Ok(Html(render::dashboard_page(
        view,
        &dashboard,
        &snapshot,
        state.zero_fill,
    )))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), AppError> {
    let submitted = Credentials {
        username: form.username,
        password: form.password,
    };
    let id = state
        .sessions
        .login(session_id(&jar), &submitted, &state.credentials)
        .await?;
    Ok((jar.add(session_cookie(id)), Redirect::to("/")))
}

async fn dashboard_json(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Dashboard>, AppError> {
    require_session(&state, &jar).await?;
    let snapshot = state.cache.get().await.map_err(AppError::DataUnavailable)?;
    Ok(Json(Dashboard::compute(&snapshot)))
}

async fn export_table(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(table): Path<String>,
) -> Result<Response, AppError> {
    require_session(&state, &jar).await?;
    let table = ExportTable::from_name(&table).ok_or(AppError::NotFound)?;
    let snapshot = state.cache.get().await.map_err(AppError::DataUnavailable)?;
    let body = export::to_csv(table, &snapshot).map_err(AppError::Internal)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", table.file_name()),
            ),
        ],
        body,
    )
        .into_response())
}

async fn healthz() -> &'static str {
    "ok"
}
