/// Preset catalogue route
use crate::state::AppState;
use axum::{extract::State, Json};
use mastering_core::{Preset, PRESETS};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetsResponse {
    pub presets: &'static [Preset],
    pub default_preset: String,
}

/// GET /api/presets
pub async fn list_presets(State(app_state): State<AppState>) -> Json<PresetsResponse> {
    Json(PresetsResponse {
        presets: PRESETS,
        default_preset: app_state.config.engine.default_preset.clone(),
    })
}
