//! HTTP API layer.
//!
//! Endpoints:
//! - `GET /healthz` — liveness check
//! - `GET /radar` — ranked market events for a time window
//! - `POST /news` — ad-hoc news ingestion
//! - `GET /swagger/openapi.yaml` — API contract

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{
    extract::rejection::JsonRejection,
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::model::{dedupe_strings, Event, NewsItem, QueryParams};
use crate::pipeline::Pipeline;
use crate::sources::IngestSource;

const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Shared handler state, injected via `Extension`.
pub struct ApiState {
    pub pipeline: Pipeline,
    pub ingest: Arc<IngestSource>,
    pub default_window: Duration,
    pub default_limit: usize,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/radar", get(handle_radar))
        .route("/news", post(handle_ingest))
        .route("/swagger/openapi.yaml", get(serve_openapi))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .layer(Extension(state))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn serve_openapi() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/yaml")],
        include_str!("../docs/openapi.yaml"),
    )
}

#[derive(Debug, Default, Deserialize)]
struct RadarQuery {
    from: Option<String>,
    to: Option<String>,
    limit: Option<String>,
    window_hours: Option<String>,
    lang: Option<String>,
}

#[derive(Serialize)]
struct RadarResponse {
    as_of: DateTime<Utc>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    events: Vec<Event>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

async fn handle_radar(
    Extension(state): Extension<Arc<ApiState>>,
    Query(query): Query<RadarQuery>,
) -> Result<Json<RadarResponse>, (StatusCode, Json<ErrorBody>)> {
    let params = resolve_params(&query, state.default_window, state.default_limit);
    let cancel = CancellationToken::new();

    let run = tokio::time::timeout(
        REQUEST_TIMEOUT,
        state.pipeline.run(&cancel, params.clone()),
    )
    .await;

    let events = match run {
        Ok(Ok(events)) => events,
        Ok(Err(err)) => {
            error!(error = %format!("{err:#}"), "radar pipeline failed");
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{err:#}"),
            ));
        }
        Err(_) => {
            cancel.cancel();
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "radar request timed out",
            ));
        }
    };

    Ok(Json(RadarResponse {
        as_of: Utc::now(),
        from: params.from,
        to: params.to,
        events,
    }))
}

/// Query parameter semantics: `to` defaults to now, `from` to
/// `to - default_window`; `window_hours` overrides `from`, an explicit
/// `from` wins over both; an inverted window resets to the default.
/// Unparseable values are ignored in favor of the defaults.
fn resolve_params(query: &RadarQuery, default_window: Duration, default_limit: usize) -> QueryParams {
    let limit = match query.limit.as_deref().and_then(|v| v.parse::<i64>().ok()) {
        Some(v) if v > 0 => v as usize,
        _ => default_limit,
    };

    let to = query
        .to
        .as_deref()
        .and_then(parse_rfc3339)
        .unwrap_or_else(Utc::now);

    let mut from = to - default_window;
    if let Some(hours) = query
        .window_hours
        .as_deref()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|h| *h > 0)
    {
        from = to - Duration::hours(hours);
    }
    if let Some(explicit) = query.from.as_deref().and_then(parse_rfc3339) {
        from = explicit;
    }
    if from > to {
        from = to - default_window;
    }

    QueryParams {
        from,
        to,
        limit,
        language: query.lang.clone().unwrap_or_default(),
    }
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IngestPayload {
    #[serde(default)]
    id: String,
    #[serde(default)]
    headline: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    tickers: Vec<String>,
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default)]
    country: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    sentiment: Option<f64>,
    #[serde(default)]
    importance_tag: String,
}

#[derive(Serialize)]
struct IngestResponse {
    status: &'static str,
    id: String,
    published_at: DateTime<Utc>,
}

async fn handle_ingest(
    Extension(state): Extension<Arc<ApiState>>,
    payload: Result<Json<IngestPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), (StatusCode, Json<ErrorBody>)> {
    let Json(payload) =
        payload.map_err(|_| error_response(StatusCode::BAD_REQUEST, "invalid payload"))?;

    if payload.headline.is_empty() || payload.url.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "headline and url are required",
        ));
    }

    let published = if payload.published_at.is_empty() {
        Utc::now()
    } else {
        parse_rfc3339(&payload.published_at).ok_or_else(|| {
            error_response(StatusCode::BAD_REQUEST, "published_at must be RFC3339")
        })?
    };

    let news = NewsItem {
        id: payload.id,
        headline: payload.headline,
        summary: payload.summary,
        body: payload.body,
        source: default_string(payload.source, "ingest"),
        url: payload.url,
        language: default_string(payload.language, "en"),
        published_at: Some(published),
        tickers: dedupe_strings(payload.tickers),
        entities: dedupe_strings(payload.entities),
        country: payload.country,
        category: payload.category,
        sentiment: payload.sentiment.unwrap_or_default(),
        importance_tag: payload.importance_tag,
    };

    let stored = state.ingest.add(news);

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            status: "accepted",
            published_at: stored.published(),
            id: stored.id,
        }),
    ))
}

fn default_string(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn explicit_from_wins_over_window_hours() {
        let query = RadarQuery {
            from: Some("2025-10-03T00:00:00Z".into()),
            to: Some("2025-10-03T12:00:00Z".into()),
            window_hours: Some("2".into()),
            ..RadarQuery::default()
        };
        let params = resolve_params(&query, Duration::hours(24), 5);
        assert_eq!(
            params.from,
            Utc.with_ymd_and_hms(2025, 10, 3, 0, 0, 0).unwrap()
        );
        assert_eq!(
            params.to,
            Utc.with_ymd_and_hms(2025, 10, 3, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn window_hours_overrides_the_default_window() {
        let query = RadarQuery {
            to: Some("2025-10-03T12:00:00Z".into()),
            window_hours: Some("3".into()),
            ..RadarQuery::default()
        };
        let params = resolve_params(&query, Duration::hours(24), 5);
        assert_eq!(params.to - params.from, Duration::hours(3));
    }

    #[test]
    fn inverted_window_resets_to_the_default() {
        let query = RadarQuery {
            from: Some("2025-10-04T00:00:00Z".into()),
            to: Some("2025-10-03T00:00:00Z".into()),
            ..RadarQuery::default()
        };
        let params = resolve_params(&query, Duration::hours(24), 5);
        assert_eq!(params.to - params.from, Duration::hours(24));
    }

    #[test]
    fn non_positive_limit_falls_back_to_the_service_default() {
        let query = RadarQuery {
            limit: Some("-3".into()),
            ..RadarQuery::default()
        };
        let params = resolve_params(&query, Duration::hours(24), 5);
        assert_eq!(params.limit, 5);
    }

    #[test]
    fn unparseable_timestamps_are_ignored() {
        let query = RadarQuery {
            from: Some("yesterday".into()),
            to: Some("noonish".into()),
            ..RadarQuery::default()
        };
        let params = resolve_params(&query, Duration::hours(24), 5);
        assert_eq!(params.to - params.from, Duration::hours(24));
    }
}
