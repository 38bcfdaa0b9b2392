//! Classification relay handler

use axum::{extract::State, Json};
use serde_json::Value;

use super::ApiJson;
use crate::AppState;
use verinews_common::{
    classifier::{classify_text, ClassifyRequest},
    errors::Result,
};

/// Forward text to the model service and relay its answer unmodified
pub async fn classify(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ClassifyRequest>,
) -> Result<Json<Value>> {
    let result = classify_text(state.classifier.as_ref(), request).await?;
    Ok(Json(result))
}
