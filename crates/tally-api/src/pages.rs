//! HTML pages.
//!
//! Rendered server-side from Askama templates under `templates/`. Metric
//! names are escaped by the template engine.

use askama::Template;
use axum::extract::State;
use axum::response::Html;

use tally_store::Snapshot;

use crate::ApiState;

fn render<T: Template>(tmpl: T) -> Html<String> {
    Html(tmpl.render().unwrap_or_else(|e| {
        format!("<pre>Template error: {e}</pre>")
    }))
}

// ── Listing ────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "metrics.html")]
struct MetricsTemplate {
    counters: Vec<(String, String)>,
    gauges: Vec<(String, String)>,
}

impl MetricsTemplate {
    /// Counters then gauges, each sorted by name.
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            counters: snapshot
                .counters()
                .iter()
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect(),
            gauges: snapshot
                .gauges()
                .iter()
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect(),
        }
    }
}

/// GET /
pub async fn list_metrics(State(state): State<ApiState>) -> Html<String> {
    render(MetricsTemplate::from_snapshot(&state.store.snapshot()))
}
