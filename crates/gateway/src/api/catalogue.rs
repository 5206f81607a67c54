use axum::extract::State;
use axum::response::{IntoResponse, Json};

use pa_routing::{EntityKind, CATALOGUE};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/catalogue: operations and entity enumerations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_catalogue(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "operations": &CATALOGUE[..],
        "components": EntityKind::Component.members(),
        "products": EntityKind::Product.members(),
        "default_major_version": state.config.routing.default_major_version,
        "data_source": state.data_source.name(),
    }))
}
