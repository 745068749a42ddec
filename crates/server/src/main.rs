use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{rejection::FormRejection, DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use server_api::{ApiContext, RenderMode, ViewOutcome};
use shared::{
    domain::OwnerId,
    error::{ApiError, ErrorCode},
    form::OwnerForm,
};
use storage::{seed::seed_demo_owners, Storage};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod templates;

use app_state::AppState;
use config::{load_settings, prepare_database_url};
use templates::{Templates, ERROR_VIEW, WELCOME_VIEW};

const MAX_FORM_BYTES: usize = 64 * 1024;
const HX_REQUEST: &str = "hx-request";
const HX_BOOSTED: &str = "hx-boosted";
const HX_REDIRECT: &str = "HX-Redirect";

#[derive(Debug, Deserialize)]
struct FindOwnersQuery {
    #[serde(rename = "lastName")]
    last_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorPage<'a> {
    code: ErrorCode,
    message: &'a str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let repo = Arc::new(storage.clone());
    let state = AppState {
        api: ApiContext::new(repo.clone(), repo),
        storage: storage.clone(),
        templates: Templates::new()?,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    seed_on_ready(&storage, settings.seed_owners).await?;

    info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Fills an empty store with demo owners before the first request is served.
async fn seed_on_ready(storage: &Storage, count: usize) -> anyhow::Result<()> {
    if count == 0 {
        info!("demo seeding disabled");
        return Ok(());
    }
    let existing = storage.count_owners().await?;
    if existing > 0 {
        info!(existing, "owners already present; skipping demo seeding");
        return Ok(());
    }
    let mut rng = StdRng::from_entropy();
    seed_demo_owners(storage, count, &mut rng).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(welcome))
        .route(
            "/owners/new",
            get(http_init_creation_form).post(http_process_creation_form),
        )
        .route("/owners/find", get(http_init_find_form))
        .route("/owners", get(http_process_find_form))
        .route(
            "/owners/:owner_id/edit",
            get(http_init_update_owner_form).post(http_process_update_owner_form),
        )
        .route("/owners/:owner_id", get(http_show_owner))
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Boosted navigation swaps the whole `<body>`, so it needs the full page
/// even though htmx flags it with `HX-Request`.
fn render_mode(headers: &HeaderMap) -> RenderMode {
    if header_is_true(headers, HX_REQUEST) && !header_is_true(headers, HX_BOOSTED) {
        RenderMode::Fragment
    } else {
        RenderMode::Full
    }
}

fn header_is_true(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

fn respond(state: &AppState, mode: RenderMode, result: Result<ViewOutcome, ApiError>) -> Response {
    match result {
        Ok(ViewOutcome::Render(view)) => {
            render_page(state, view.name, view.mode, &view.model, StatusCode::OK)
        }
        Ok(ViewOutcome::Redirect(location)) => redirect(mode, location),
        Err(error) => render_error(state, mode, &error),
    }
}

/// Partial-refresh clients follow `HX-Redirect` with a full browser
/// navigation; everyone else gets a plain 303.
fn redirect(mode: RenderMode, location: String) -> Response {
    match mode {
        RenderMode::Fragment => (StatusCode::OK, [(HX_REDIRECT, location)]).into_response(),
        RenderMode::Full => Redirect::to(&location).into_response(),
    }
}

fn render_page<S: Serialize>(
    state: &AppState,
    name: &str,
    mode: RenderMode,
    model: S,
    status: StatusCode,
) -> Response {
    match state.templates.render(name, mode, model) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(error) => {
            error!(%error, view = name, "template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "template rendering failed").into_response()
        }
    }
}

fn render_error(state: &AppState, mode: RenderMode, error: &ApiError) -> Response {
    let status = match error.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(code = ?error.code, message = %error.message, "request failed");
    } else {
        warn!(code = ?error.code, message = %error.message, "request rejected");
    }
    let page = ErrorPage {
        code: error.code,
        message: &error.message,
    };
    render_page(state, ERROR_VIEW, mode, page, status)
}

/// Form bodies axum cannot decode go through the error view as a 400.
fn rejected_form(rejection: FormRejection) -> ApiError {
    ApiError::new(ErrorCode::Validation, rejection.body_text())
}

async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    match state.storage.health_check().await {
        Ok(()) => "ok".into_response(),
        Err(error) => {
            error!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable").into_response()
        }
    }
}

async fn welcome(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    render_page(
        &state,
        WELCOME_VIEW,
        render_mode(&headers),
        serde_json::json!({}),
        StatusCode::OK,
    )
}

async fn http_init_creation_form(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    respond(
        &state,
        render_mode(&headers),
        Ok(server_api::init_creation_form()),
    )
}

async fn http_process_creation_form(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<OwnerForm>, FormRejection>,
) -> Response {
    let result = match form {
        Ok(Form(form)) => server_api::process_creation_form(&state.api, form).await,
        Err(rejection) => Err(rejected_form(rejection)),
    };
    respond(&state, render_mode(&headers), result)
}

async fn http_init_find_form(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let mode = render_mode(&headers);
    respond(&state, mode, Ok(server_api::init_find_form(mode)))
}

async fn http_process_find_form(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<FindOwnersQuery>,
) -> Response {
    let mode = render_mode(&headers);
    let result = server_api::process_find_form(&state.api, q.last_name.as_deref(), mode).await;
    respond(&state, mode, result)
}

async fn http_init_update_owner_form(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(owner_id): Path<i64>,
) -> Response {
    let result = server_api::init_update_owner_form(&state.api, OwnerId(owner_id)).await;
    respond(&state, render_mode(&headers), result)
}

async fn http_process_update_owner_form(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(owner_id): Path<i64>,
    form: Result<Form<OwnerForm>, FormRejection>,
) -> Response {
    let result = match form {
        Ok(Form(form)) => {
            server_api::process_update_owner_form(&state.api, OwnerId(owner_id), form).await
        }
        Err(rejection) => Err(rejected_form(rejection)),
    };
    respond(&state, render_mode(&headers), result)
}

async fn http_show_owner(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(owner_id): Path<i64>,
) -> Response {
    let result = server_api::show_owner(&state.api, OwnerId(owner_id)).await;
    respond(&state, render_mode(&headers), result)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
