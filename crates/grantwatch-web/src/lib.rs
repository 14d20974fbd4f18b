//! Read-only JSON API over the canonical grant set: filtering, CSV
//! download, and a health probe. Never mutates pipeline state.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use grantwatch_core::CanonicalGrant;
use grantwatch_pipeline::export;
use grantwatch_storage::GrantStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn GrantStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn GrantStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrantsQuery {
    pub geography: Option<String>,
    pub topic: Option<String>,
    pub audience: Option<String>,
    pub funder_type: Option<String>,
    /// Source slug, e.g. `grants-gov`.
    pub source: Option<String>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/grants", get(grants_handler))
        .route("/grants.csv", get(grants_csv_handler))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn healthz_handler(State(state): State<AppState>) -> Response {
    let ok = state.store.ping().await;
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(serde_json::json!({ "ok": ok }))).into_response()
}

async fn grants_handler(
    State(state): State<AppState>,
    Query(query): Query<GrantsQuery>,
) -> Response {
    match load_filtered(&state, &query).await {
        Ok(grants) => Json(grants).into_response(),
        Err(response) => response,
    }
}

async fn grants_csv_handler(
    State(state): State<AppState>,
    Query(query): Query<GrantsQuery>,
) -> Response {
    match load_filtered(&state, &query).await {
        Ok(grants) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"grantwatch_grants.csv\"",
                ),
            ],
            export::to_csv(&grants),
        )
            .into_response(),
        Err(response) => response,
    }
}

async fn load_filtered(
    state: &AppState,
    query: &GrantsQuery,
) -> Result<Vec<CanonicalGrant>, Response> {
    let mut grants = state.store.load_all().await.map_err(|err| {
        error!(%err, "failed to load grants from the store");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "store unavailable" })),
        )
            .into_response()
    })?;

    grants.retain(|grant| matches_query(grant, query));
    // Nearest deadline first; undated grants sink to the bottom.
    grants.sort_by(|a, b| match (a.deadline, b.deadline) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
    Ok(grants)
}

fn matches_query(grant: &CanonicalGrant, query: &GrantsQuery) -> bool {
    let field_matches = |selected: &Option<String>, value: &str| {
        selected
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case(value))
            .unwrap_or(true)
    };
    field_matches(&query.geography, &grant.geography)
        && field_matches(&query.topic, &grant.topic)
        && field_matches(&query.audience, &grant.audience)
        && field_matches(&query.funder_type, &grant.funder_type)
        && field_matches(&query.source, grant.source.slug())
}
