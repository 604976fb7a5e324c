use crate::pipeline::view_conforms;
use crate::server::ServerState;
use crate::store::Dataset;
use axum::extract::State;
use axum::response::Json;
use std::sync::Arc;

/// GET /api/views -- row count and conformance of every view in the published document.
/// Re-reads the file on each request so a fresh publish shows up without a restart.
pub async fn get_views(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    let dataset = match Dataset::load(&state.data_path) {
        Ok(d) => d,
        Err(e) => return Json(serde_json::json!({ "error": e.to_string() })),
    };

    let mut views = serde_json::Map::new();
    for (view, records) in dataset.views() {
        let entry = match view_conforms(records, view, &state.registry) {
            Ok(()) => serde_json::json!({ "rows": records.len(), "conforms": true }),
            Err(e) => serde_json::json!({
                "rows": records.len(),
                "conforms": false,
                "error": e.to_string(),
            }),
        };
        views.insert(view.to_string(), entry);
    }

    let missing: Vec<&str> = state
        .registry
        .views()
        .map(|s| s.view.as_str())
        .filter(|v| dataset.get(v).is_err())
        .collect();

    Json(serde_json::json!({
        "document": state.data_path.display().to_string(),
        "views": views,
        "missing": missing,
        "benchmark": dataset.benchmark().is_some(),
    }))
}
