//! Admin user management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{ApiJson, ApiQuery, ApiResponse};
use crate::AppState;
use verinews_common::{
    auth::AuthContext,
    errors::Result,
    paging::ListQuery,
    services::UserService,
    users::{AddUserRequest, UpdateUserRequest, User, UserPage, UserSuggestion, UserSuggestionQuery},
};

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<UserPage>> {
    let page = UserService::new(state.store.clone()).list(&auth, query).await?;
    Ok(Json(page))
}

pub async fn add_user(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(request): ApiJson<AddUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>)> {
    let user = UserService::new(state.store.clone()).add(&auth, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("User created successfully.", user)),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<String>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<User>>> {
    let user = UserService::new(state.store.clone())
        .update(&auth, &user_id, request)
        .await?;
    Ok(Json(ApiResponse::with_message("User updated successfully.", user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    UserService::new(state.store.clone())
        .delete(&auth, &user_id)
        .await?;
    Ok(Json(ApiResponse::message("User deleted successfully.")))
}

pub async fn suggestions(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(query): ApiQuery<UserSuggestionQuery>,
) -> Result<Json<ApiResponse<Vec<UserSuggestion>>>> {
    let hits = UserService::new(state.store.clone())
        .suggestions(&auth, query)
        .await?;
    Ok(Json(ApiResponse::data(hits)))
}
