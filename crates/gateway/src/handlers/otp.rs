//! One-time code handlers

use axum::{extract::State, Json};

use super::{ApiJson, ApiResponse};
use crate::AppState;
use verinews_common::{
    errors::Result,
    otp::{SendCodeRequest, VerifyCodeRequest},
};

pub async fn send_code(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SendCodeRequest>,
) -> Result<Json<ApiResponse<()>>> {
    state.otp.issue(request).await?;
    Ok(Json(ApiResponse::message("Verification code sent.")))
}

pub async fn verify_code(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VerifyCodeRequest>,
) -> Result<Json<ApiResponse<()>>> {
    state.otp.verify(request).await?;
    Ok(Json(ApiResponse::message("Verification successful.")))
}
