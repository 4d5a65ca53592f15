use crate::state::{CycleStage, PipelineStatus, SourceErrorSummary};
use crate::store::{ArticleFilter, ArticleStore};
use crate::types::Article;
use crate::utils::time::{days_before, time_ago};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

const DEFAULT_DAYS: u32 = 7;
const MAX_ARTICLES: usize = 500;

/// Read-only handles for the web surface. Handlers read the store and the
/// status snapshot, nothing else.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ArticleStore>,
    pub status: Arc<PipelineStatus>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/articles", get(list_articles))
        .route("/api/sources", get(list_sources))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ArticlesQuery {
    source: Option<String>,
    category: Option<String>,
    days: Option<u32>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ArticleView {
    #[serde(flatten)]
    article: Article,
    time_ago: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store_reachable: bool,
    article_count: Option<usize>,
    stage: CycleStage,
    cycles_completed: u64,
    last_cycle_finished: Option<DateTime<Utc>>,
    last_successful_cycle: Option<DateTime<Utc>>,
    source_errors: Vec<SourceErrorSummary>,
}

struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("API request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0 })),
        )
            .into_response()
    }
}

async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<ArticlesQuery>,
) -> Result<Json<Vec<ArticleView>>, ApiError> {
    let now = Utc::now();
    let days = query.days.unwrap_or(DEFAULT_DAYS);
    let filter = ArticleFilter {
        source: query.source.filter(|s| !s.is_empty() && s != "all"),
        category: query.category.filter(|c| !c.is_empty() && c != "all"),
        since: Some(days_before(now, days)),
        limit: Some(query.limit.unwrap_or(MAX_ARTICLES).min(MAX_ARTICLES)),
    };

    let articles = state
        .store
        .query(&filter)
        .await
        .map_err(|e| ApiError(e.to_string()))?;

    Ok(Json(
        articles
            .into_iter()
            .map(|article| ArticleView {
                time_ago: time_ago(article.first_seen, now),
                article,
            })
            .collect(),
    ))
}

async fn list_sources(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let sources = state
        .store
        .sources()
        .await
        .map_err(|e| ApiError(e.to_string()))?;
    Ok(Json(sources))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let count = state.store.count().await;
    let snapshot = state.status.snapshot().await;

    let (code, status) = match count {
        Ok(_) => (StatusCode::OK, "ok"),
        Err(ref e) => {
            warn!("Health check could not reach the store: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            store_reachable: count.is_ok(),
            article_count: count.ok(),
            stage: snapshot.stage,
            cycles_completed: snapshot.cycles_completed,
            last_cycle_finished: snapshot.last_cycle_finished,
            last_successful_cycle: snapshot.last_successful_cycle,
            source_errors: snapshot.source_errors,
        }),
    )
}
