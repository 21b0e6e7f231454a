use super::auth::{CurrentUser, OptionalViewer};
use super::{ApiError, ApiResult, AppState, PageParams};
use crate::database::models::{Page, PageRequest};
use crate::posts::{CommentView, CreatePostInput, PostDetails, PostSummary};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct CommentRequest {
    comment: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LikesResponse {
    likes: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ViewsResponse {
    views: i64,
}

pub(crate) async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Page<PostSummary>> {
    let request = PageRequest::new(params.page, params.per_page);
    let page = state.posts.list_posts(request, params.search.as_deref())?;
    Ok(Json(page))
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreatePostInput>,
) -> Result<(StatusCode, Json<PostDetails>), ApiError> {
    let details = state.posts.create_post(&user, payload)?;
    Ok((StatusCode::CREATED, Json(details)))
}

pub(crate) async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    OptionalViewer(viewer): OptionalViewer,
) -> ApiResult<PostDetails> {
    let viewer_id = viewer.as_ref().map(|v| v.id.as_str());
    let details = state.posts.get_post(&id, viewer_id)?;
    Ok(Json(details))
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.posts.delete_post(&id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ViewsResponse> {
    let views = state.posts.record_view(&id)?;
    Ok(Json(ViewsResponse { views }))
}

pub(crate) async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let comment = state.posts.add_comment(&id, &user, &payload.comment)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub(crate) async fn like_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<LikesResponse> {
    let likes = state.posts.like_post(&id, &user)?;
    Ok(Json(LikesResponse { likes }))
}

pub(crate) async fn unlike_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<LikesResponse> {
    let likes = state.posts.unlike_post(&id, &user)?;
    Ok(Json(LikesResponse { likes }))
}
