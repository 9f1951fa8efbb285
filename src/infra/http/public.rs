use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    application::{
        blog::{BlogService, PublicComment},
        comments::CommentService,
        share::ShareService,
    },
    domain::forms::{CommentForm, SharePostForm},
    infra::db::PostgresRepositories,
};

use super::{
    ApiError, db_health_response,
    middleware::{log_responses, set_request_context},
    models::{ListQuery, SearchParams},
    parse_id,
};

const SOURCE: &str = "infra::http::public";

#[derive(Clone)]
pub struct HttpState {
    pub blog: Arc<BlogService>,
    pub comments: Arc<CommentService>,
    pub share: Arc<ShareService>,
    pub db: Arc<PostgresRepositories>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/{year}/{month}/{day}/{slug}", get(post_detail))
        .route("/post/{id}/comment", post(submit_comment))
        .route("/post/{id}/share", post(share_post))
        .route("/search", get(search))
        .route("/sidebar", get(sidebar))
        .route("/_health/db", get(public_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn list_posts(
    State(state): State<HttpState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = state
        .blog
        .list_posts(query.tag.as_deref(), query.page.as_deref())
        .await?;
    Ok(Json(listing))
}

async fn post_detail(
    State(state): State<HttpState>,
    Path((year, month, day, slug)): Path<(String, String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let not_found = || ApiError::not_found(SOURCE, "Post not found");
    let year: i32 = year.parse().map_err(|_| not_found())?;
    let month: u8 = month.parse().map_err(|_| not_found())?;
    let day: u8 = day.parse().map_err(|_| not_found())?;

    let detail = state.blog.post_detail(year, month, day, &slug).await?;
    Ok(Json(detail))
}

async fn submit_comment(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Json(form): Json<CommentForm>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = parse_id(SOURCE, &id, "Post not found")?;
    let comment = state.comments.submit(post_id, &form).await?;
    Ok((StatusCode::CREATED, Json(PublicComment::from(comment))))
}

async fn share_post(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    Json(form): Json<SharePostForm>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = parse_id(SOURCE, &id, "Post not found")?;
    let receipt = state.share.share(post_id, &form).await?;
    Ok(Json(receipt))
}

async fn search(
    State(state): State<HttpState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let results = state
        .blog
        .search(params.query.as_deref(), params.page.as_deref())
        .await?;
    Ok(Json(results))
}

async fn sidebar(State(state): State<HttpState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.blog.sidebar().await?))
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.health_check().await)
}
