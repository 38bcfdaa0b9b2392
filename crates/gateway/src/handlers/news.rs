//! News handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use super::{ApiJson, ApiQuery, ApiResponse};
use crate::AppState;
use verinews_common::{
    auth::AuthContext,
    errors::Result,
    news::{News, NewsPage, NewsSuggestion, SaveNewsRequest, SuggestionQuery},
    paging::ListQuery,
    services::NewsService,
};

pub async fn save_news(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(request): ApiJson<SaveNewsRequest>,
) -> Result<(StatusCode, Json<ApiResponse<News>>)> {
    let news = NewsService::new(state.store.clone()).save(&auth, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("News article saved successfully!", news)),
    ))
}

pub async fn get_news(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<News>> {
    let news = NewsService::new(state.store.clone()).get(&id).await?;
    Ok(Json(news))
}

pub async fn list_news(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<NewsPage>> {
    let page = NewsService::new(state.store.clone()).list(&auth, query).await?;
    Ok(Json(page))
}

pub async fn suggestions(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(query): ApiQuery<SuggestionQuery>,
) -> Result<Json<ApiResponse<Vec<NewsSuggestion>>>> {
    let hits = NewsService::new(state.store.clone())
        .suggestions(&auth, query)
        .await?;
    Ok(Json(ApiResponse::data(hits)))
}

pub async fn update_news(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<Value>,
) -> Result<Json<News>> {
    let news = NewsService::new(state.store.clone())
        .update(&auth, &id, patch)
        .await?;
    Ok(Json(news))
}

pub async fn delete_news(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    NewsService::new(state.store.clone()).delete(&auth, &id).await?;
    Ok(Json(ApiResponse::message("News article deleted successfully.")))
}

pub async fn history(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<News>>> {
    let news = NewsService::new(state.store.clone())
        .history(&auth, &user_id)
        .await?;
    Ok(Json(news))
}
