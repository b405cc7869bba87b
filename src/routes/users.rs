use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Json},
    Extension,
};

use crate::{
    dto::{
        pagination_dto::PaginatedResponse,
        user_dto::{RegisteredUserResponse, UserResource, UserResponse},
    },
    error::{Error, Result},
    middleware::json_guard::JsonBody,
    AppState,
};

/// Path ids that are not integers can never match a user.
fn parse_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| Error::NotFound("User not found".to_string()))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    uri: Uri,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse> {
    let (query, page) = state.user_service.list(&params).await?;
    let path = format!("{}{}", state.app_url, uri.path());
    let data: Vec<UserResource> = page.items.into_iter().map(UserResource::from).collect();
    Ok(Json(PaginatedResponse::new(
        data,
        page.total,
        query.page,
        query.per_page,
        &path,
    )))
}

#[axum::debug_handler]
pub async fn show_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let user = state.user_service.get(parse_id(&id)?).await?;
    Ok(Json(UserResponse::from(user)))
}

#[axum::debug_handler]
pub async fn store_user(
    State(state): State<AppState>,
    Extension(JsonBody(body)): Extension<JsonBody>,
) -> Result<impl IntoResponse> {
    let (user, token) = state.user_service.register(body).await?;
    Ok((StatusCode::OK, Json(RegisteredUserResponse::new(user, token))))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(JsonBody(body)): Extension<JsonBody>,
) -> Result<impl IntoResponse> {
    let user = state.user_service.update(parse_id(&id)?, body).await?;
    Ok(Json(UserResponse::from(user)))
}

#[axum::debug_handler]
pub async fn destroy_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.user_service.delete(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
