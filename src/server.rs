use crate::config::{AppConfig, ServerConfig};
use crate::error::DatasetError;
use crate::processing::{build_observations, year_totals, year_view, ObservationSets, YearView};
use crate::render::{choropleth_figure, dashboard_page, dashboard_title};
use crate::tunnel::{open_tunnel_nonfatal, TunnelGuard, TunnelProvider};
use crate::types::{Dataset, Observation, Year, YearSet};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub dataset: Dataset,
    pub observations: ObservationSets,
    pub default_year: Year,
    pub page: String,
    pub config: AppConfig,
}

impl AppState {
    /// Builds observations and the page once; both are read-only afterwards.
    pub fn new(config: AppConfig, dataset: Dataset) -> Result<Self, DatasetError> {
        let observations = build_observations(&dataset)?;
        let default_year = config.dashboard.resolve_default_year(&dataset.years)?;
        let page = dashboard_page(&dataset, &config.dashboard, default_year);
        Ok(Self {
            dataset,
            observations,
            default_year,
            page,
            config,
        })
    }

    pub fn view(&self, year: Year) -> Result<YearView, DatasetError> {
        year_view(&self.observations, &self.dataset.years, year)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/years", get(years_handler))
        .route("/api/view", get(view_handler))
        .route("/api/observations", get(observations_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn bind(server: &ServerConfig) -> Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", server.host, server.port))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "dashboard listening on http://{}", addr);
    Ok(listener)
}

pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Serves on an already bound listener while the optional tunnel comes up
/// alongside it. The tunnel handle lives until the server stops.
pub async fn run_dashboard(
    listener: TcpListener,
    state: Arc<AppState>,
    tunnel: Option<Box<dyn TunnelProvider>>,
) -> Result<()> {
    let port = listener.local_addr()?.port();
    let guard = TunnelGuard::new();
    let open_tunnel = async {
        match &tunnel {
            Some(provider) => open_tunnel_nonfatal(&guard, provider.as_ref(), port).await,
            None => None,
        }
    };

    let (served, _public) = tokio::join!(serve(listener, state), open_tunnel);
    served
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.page.clone())
}

#[derive(Serialize)]
pub struct YearsResponse {
    years: YearSet,
    default: Year,
    totals: BTreeMap<Year, u64>,
}

async fn years_handler(State(state): State<Arc<AppState>>) -> Response {
    match year_totals(&state.observations.all) {
        Ok(totals) => Json(YearsResponse {
            years: state.dataset.years.clone(),
            default: state.default_year,
            totals,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// The year stays a string until the handler parses it, so a malformed value
/// gets the same JSON error body as an unknown one.
#[derive(Deserialize)]
pub struct ViewParams {
    year: Option<String>,
}

#[derive(Serialize)]
pub struct ViewResponse {
    view: YearView,
    figure: Value,
}

async fn view_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewParams>,
) -> Response {
    let year = match params.year.as_deref().map(str::parse::<Year>).transpose() {
        Ok(year) => year.unwrap_or(state.default_year),
        Err(e) => return error_response(e),
    };
    match state.view(year) {
        Ok(view) => {
            tracing::debug!(%year, rows = view.table.len(), "serving year view");
            let title = dashboard_title(&state.dataset, &state.config.dashboard);
            let figure = choropleth_figure(&view, title, &state.config.dashboard);
            Json(ViewResponse { view, figure }).into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct ObservationParams {
    #[serde(default)]
    mappable: bool,
}

async fn observations_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ObservationParams>,
) -> Json<Vec<Observation>> {
    let observations = if params.mappable {
        &state.observations.mappable
    } else {
        &state.observations.all
    };
    Json(observations.clone())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

fn error_status(err: &DatasetError) -> StatusCode {
    match err {
        DatasetError::UnknownYear(_) => StatusCode::NOT_FOUND,
        DatasetError::InvalidYear(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: DatasetError) -> Response {
    let status = error_status(&err);
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

#[cfg(test)]
#[path = "server_test.rs"]
mod tests;
