use super::auth::{AuthClaims, CurrentUser, OptionalViewer};
use super::{ApiError, ApiResult, AppState, PageParams};
use crate::accounts::{CreateUserInput, UserProfile, UserSummary};
use crate::database::models::{Page, PageRequest, UserRecord};
use crate::error::StoreError;
use crate::posts::PostSummary;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

pub(crate) async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Page<UserSummary>> {
    let request = PageRequest::new(params.page, params.per_page);
    let page = state.accounts.list_users(request, params.search.as_deref())?;
    Ok(Json(page))
}

pub(crate) async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<UserSummary>), ApiError> {
    let record = state.accounts.create_user(payload)?;
    Ok((StatusCode::CREATED, Json(UserSummary::from_record(record))))
}

/// Create-or-update keyed by the token's verified email claim. Returns the
/// full record, email included, since the caller is looking at themselves.
pub(crate) async fn login(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
    payload: Option<Json<LoginRequest>>,
) -> ApiResult<UserRecord> {
    let payload = payload.map(|Json(p)| p).unwrap_or(LoginRequest {
        username: None,
        picture: None,
    });
    let user = state.accounts.login(
        &claims,
        payload.username.as_deref(),
        payload.picture.as_deref(),
    )?;
    Ok(Json(user))
}

pub(crate) async fn me(CurrentUser(user): CurrentUser) -> ApiResult<UserRecord> {
    Ok(Json(user))
}

pub(crate) async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<UserProfile> {
    match state.accounts.profile_of(&username)? {
        Some(profile) => Ok(Json(profile)),
        None => Err(StoreError::not_found("user").into()),
    }
}

pub(crate) async fn user_posts(
    State(state): State<AppState>,
    Path(username): Path<String>,
    OptionalViewer(viewer): OptionalViewer,
) -> ApiResult<Vec<PostSummary>> {
    let user = state
        .accounts
        .find_by_username(&username)?
        .ok_or(StoreError::not_found("user"))?;
    let include_private = viewer.map(|v| v.id == user.id).unwrap_or(false);
    let posts = state.posts.posts_of_owner(&user.id, include_private)?;
    Ok(Json(posts))
}

pub(crate) async fn user_likes(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Vec<PostSummary>> {
    let user = state
        .accounts
        .find_by_username(&username)?
        .ok_or(StoreError::not_found("user"))?;
    let posts = state.posts.posts_liked_by(&user.id)?;
    Ok(Json(posts))
}

pub(crate) async fn user_followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Vec<UserSummary>> {
    Ok(Json(state.accounts.followers_of(&username)?))
}

pub(crate) async fn user_following(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Vec<UserSummary>> {
    Ok(Json(state.accounts.following_of(&username)?))
}

pub(crate) async fn follow_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.accounts.follow(&user, &username)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn unfollow_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.accounts.unfollow(&user, &username)?;
    Ok(StatusCode::NO_CONTENT)
}
