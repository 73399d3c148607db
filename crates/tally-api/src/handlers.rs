//! HTTP handlers.
//!
//! Input errors (unknown type tag, unparsable number, malformed JSON) are
//! answered with 400 here and never reach the store. Unknown metric names
//! in value queries are 404.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use tally_store::{Metric, MetricKind};

use crate::ApiState;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

fn error_response(msg: &str, status: StatusCode) -> Response {
    (status, [(CONTENT_TYPE, TEXT_PLAIN)], msg.to_string()).into_response()
}

fn text_response(body: String) -> Response {
    (StatusCode::OK, [(CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}

fn parse_kind(raw: &str) -> Result<MetricKind, Response> {
    raw.parse::<MetricKind>().map_err(|e| {
        error_response(
            &format!("{e}; can only be 'gauge' or 'counter'"),
            StatusCode::BAD_REQUEST,
        )
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        error_response(&format!("error in JSON decode: {e}"), StatusCode::BAD_REQUEST)
    })
}

// ── Updates ────────────────────────────────────────────────────

/// POST /update/{type}/{name}/{value}
pub async fn update_path(
    State(state): State<ApiState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    match kind {
        MetricKind::Counter => match value.parse::<i64>() {
            Ok(delta) => {
                state.store.update_counter(&name, delta);
            }
            Err(_) => {
                return error_response(
                    &format!("{value} cannot be converted to an integer"),
                    StatusCode::BAD_REQUEST,
                );
            }
        },
        MetricKind::Gauge => match value.parse::<f64>() {
            Ok(value) => {
                state.store.update_gauge(&name, value);
            }
            Err(_) => {
                return error_response(
                    &format!("{value} cannot be converted to a float"),
                    StatusCode::BAD_REQUEST,
                );
            }
        },
    }

    text_response(String::new())
}

/// POST /update/
///
/// Responds with the entry as stored: `delta` carries the counter total,
/// `value` the gauge value.
pub async fn update_json(State(state): State<ApiState>, body: Bytes) -> Response {
    let metric: Metric = match parse_json(&body) {
        Ok(metric) => metric,
        Err(resp) => return resp,
    };
    let update = match metric.to_update() {
        Ok(update) => update,
        Err(reason) => return error_response(&reason.to_string(), StatusCode::BAD_REQUEST),
    };

    Json(state.store.apply(&update)).into_response()
}

/// POST /updates/
pub async fn update_batch(State(state): State<ApiState>, body: Bytes) -> Response {
    let entries: Vec<Metric> = match parse_json(&body) {
        Ok(entries) => entries,
        Err(resp) => return resp,
    };

    let outcome = state.store.apply_batch(&entries);
    for rejected in &outcome.rejected {
        debug!(
            index = rejected.index,
            id = %rejected.id,
            reason = %rejected.reason,
            "batch entry rejected"
        );
    }
    Json(outcome).into_response()
}

// ── Queries ────────────────────────────────────────────────────

/// GET /value/{type}/{name}
pub async fn value_path(
    State(state): State<ApiState>,
    Path((kind, name)): Path<(String, String)>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    let value = match kind {
        MetricKind::Counter => state.store.get_counter(&name).map(|v| v.to_string()),
        MetricKind::Gauge => state.store.get_gauge(&name).map(|v| v.to_string()),
    };
    match value {
        Some(value) => text_response(value),
        None => error_response("metric not found", StatusCode::NOT_FOUND),
    }
}

/// JSON value query. Payload fields are ignored if present.
#[derive(serde::Deserialize)]
pub struct ValueQuery {
    pub id: String,
    #[serde(rename = "type")]
    pub mtype: String,
}

/// POST /value/
pub async fn value_json(State(state): State<ApiState>, body: Bytes) -> Response {
    let query: ValueQuery = match parse_json(&body) {
        Ok(query) => query,
        Err(resp) => return resp,
    };
    let kind = match parse_kind(&query.mtype) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    let found = match kind {
        MetricKind::Counter => state
            .store
            .get_counter(&query.id)
            .map(|delta| Metric::counter(query.id.clone(), delta)),
        MetricKind::Gauge => state
            .store
            .get_gauge(&query.id)
            .map(|value| Metric::gauge(query.id.clone(), value)),
    };
    match found {
        Some(metric) => Json(metric).into_response(),
        None => error_response("metric not found", StatusCode::NOT_FOUND),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /ping
pub async fn ping(State(state): State<ApiState>) -> Response {
    match state.backend.probe().await {
        Ok(()) => text_response("database connection OK".to_string()),
        Err(e) => {
            warn!(error = %e, "database ping failed");
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tally_persist::Backend;
    use tally_store::MetricStore;

    fn test_state() -> ApiState {
        ApiState {
            store: MetricStore::new(),
            backend: Arc::new(Backend::Null),
        }
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn path3(kind: &str, name: &str, value: &str) -> Path<(String, String, String)> {
        Path((kind.to_string(), name.to_string(), value.to_string()))
    }

    #[tokio::test]
    async fn update_path_counter_accumulates() {
        let state = test_state();
        for _ in 0..3 {
            let resp = update_path(State(state.clone()), path3("counter", "PollCount", "1")).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
        assert_eq!(state.store.get_counter("PollCount"), Some(3));
    }

    #[tokio::test]
    async fn update_path_rejects_bad_values() {
        let state = test_state();
        let resp = update_path(State(state.clone()), path3("counter", "c", "1.5")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = update_path(State(state.clone()), path3("gauge", "g", "abc")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn update_path_rejects_unknown_type() {
        let state = test_state();
        let resp = update_path(State(state.clone()), path3("histogram", "h", "1")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_json_echoes_stored_value() {
        let state = test_state();
        state.store.update_counter("PollCount", 10);

        let body = Bytes::from_static(br#"{"id":"PollCount","type":"counter","delta":5}"#);
        let resp = update_json(State(state.clone()), body).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let echoed: Metric = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(echoed, Metric::counter("PollCount", 15));
    }

    #[tokio::test]
    async fn update_json_rejects_missing_payload() {
        let state = test_state();
        let body = Bytes::from_static(br#"{"id":"Alloc","type":"gauge"}"#);
        let resp = update_json(State(state.clone()), body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn update_json_rejects_malformed_body() {
        let resp = update_json(State(test_state()), Bytes::from_static(b"{not json")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_batch_reports_rejections() {
        let state = test_state();
        let body = Bytes::from_static(
            br#"[{"id":"X","type":"counter","delta":5},
                 {"id":"Y","type":"gauge","value":1.0},
                 {"id":"Z","type":"bogus","delta":1}]"#,
        );
        let resp = update_batch(State(state.clone()), body).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let outcome: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(outcome["applied"], 2);
        assert_eq!(outcome["rejected"][0]["index"], 2);
        assert_eq!(outcome["rejected"][0]["id"], "Z");

        assert_eq!(state.store.get_counter("X"), Some(5));
        assert_eq!(state.store.get_gauge("Y"), Some(1.0));
    }

    #[tokio::test]
    async fn value_path_formats_values() {
        let state = test_state();
        state.store.update_gauge("Alloc", 250.25);
        state.store.update_gauge("Whole", 100.0);
        state.store.update_counter("PollCount", 3);

        let resp = value_path(
            State(state.clone()),
            Path(("gauge".to_string(), "Alloc".to_string())),
        )
        .await;
        assert_eq!(body_string(resp).await, "250.25");

        let resp = value_path(
            State(state.clone()),
            Path(("gauge".to_string(), "Whole".to_string())),
        )
        .await;
        assert_eq!(body_string(resp).await, "100");

        let resp = value_path(
            State(state),
            Path(("counter".to_string(), "PollCount".to_string())),
        )
        .await;
        assert_eq!(body_string(resp).await, "3");
    }

    #[tokio::test]
    async fn value_path_unknown_name_is_not_found() {
        let state = test_state();
        state.store.update_gauge("g", 1.0);
        // Same name, other namespace.
        let resp = value_path(State(state), Path(("counter".to_string(), "g".to_string()))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn value_json_fills_payload() {
        let state = test_state();
        state.store.update_gauge("Alloc", 1.5);

        let body = Bytes::from_static(br#"{"id":"Alloc","type":"gauge"}"#);
        let resp = value_json(State(state.clone()), body).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let metric: Metric = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(metric, Metric::gauge("Alloc", 1.5));

        let body = Bytes::from_static(br#"{"id":"Missing","type":"gauge"}"#);
        let resp = value_json(State(state.clone()), body).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body = Bytes::from_static(br#"{"id":"Alloc","type":"bogus"}"#);
        let resp = value_json(State(state), body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ping_without_database_fails() {
        let resp = ping(State(test_state())).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
