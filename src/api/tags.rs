use super::{ApiResult, AppState, PageParams};
use crate::database::models::{Page, PageRequest};
use crate::posts::{PostSummary, TagView};
use axum::extract::{Path, Query, State};
use axum::Json;

pub(crate) async fn list_tags(State(state): State<AppState>) -> ApiResult<Vec<TagView>> {
    Ok(Json(state.posts.list_tags()?))
}

pub(crate) async fn tag_posts(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Page<PostSummary>> {
    let request = PageRequest::new(params.page, params.per_page);
    let page = state.posts.posts_for_tag(&name, request)?;
    Ok(Json(page))
}
