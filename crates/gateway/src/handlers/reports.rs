//! Report handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{ApiJson, ApiResponse};
use crate::AppState;
use verinews_common::{
    auth::AuthContext,
    errors::Result,
    moderation::{Report, ReportDetails, ReportSubmission, StatusUpdate},
    services::ReportService,
};

pub async fn submit_report(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(submission): ApiJson<ReportSubmission>,
) -> Result<(StatusCode, Json<ApiResponse<Report>>)> {
    let report = ReportService::new(state.store.clone())
        .submit(&auth, submission)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Report submitted successfully", report)),
    ))
}

pub async fn pending_reports(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(news_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ReportDetails>>>> {
    let reports = ReportService::new(state.store.clone())
        .pending_for_news(&auth, &news_id)
        .await?;
    Ok(Json(ApiResponse::data(reports)))
}

pub async fn update_report_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(report_id): Path<String>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> Result<Json<ApiResponse<Report>>> {
    let report = ReportService::new(state.store.clone())
        .transition(&auth, &report_id, update)
        .await?;

    Ok(Json(ApiResponse::with_message(
        "Report status updated successfully",
        report,
    )))
}

pub async fn report_for_news(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(news_id): Path<String>,
) -> Result<Json<ApiResponse<ReportDetails>>> {
    let report = ReportService::new(state.store.clone())
        .latest_for_news(&auth, &news_id)
        .await?;
    Ok(Json(ApiResponse::data(report)))
}
