use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};

use crate::{
    application::{authoring::AuthoringService, comments::CommentService},
    infra::db::PostgresRepositories,
};

use super::{
    ApiError, db_health_response,
    middleware::{log_responses, set_request_context},
    models::{
        AuthorCreateRequest, CommentActiveRequest, PostCreateRequest, PostTagsRequest,
        PostUpdateRequest,
    },
    parse_id,
};

const SOURCE: &str = "infra::http::admin";

#[derive(Clone)]
pub struct AdminState {
    pub authoring: Arc<AuthoringService>,
    pub comments: Arc<CommentService>,
    pub db: Arc<PostgresRepositories>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/authors", post(create_author))
        .route("/posts", post(create_post))
        .route("/posts/{id}", put(update_post))
        .route("/posts/{id}/publish", post(publish_post))
        .route("/posts/{id}/tags", put(replace_tags))
        .route("/comments/{id}/active", post(set_comment_active))
        .route("/_health/db", get(admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn create_author(
    State(state): State<AdminState>,
    Json(request): Json<AuthorCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let author = state.authoring.create_author(request.into()).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

async fn create_post(
    State(state): State<AdminState>,
    Json(request): Json<PostCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.authoring.create_post(request.into()).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(request): Json<PostUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(SOURCE, &id, "Post not found")?;
    let post = state.authoring.update_post(request.into_command(id)).await?;
    Ok(Json(post))
}

async fn publish_post(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(SOURCE, &id, "Post not found")?;
    let post = state.authoring.publish_post(id).await?;
    Ok(Json(post))
}

async fn replace_tags(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(request): Json<PostTagsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(SOURCE, &id, "Post not found")?;
    let post = state.authoring.replace_tags(id, &request.tags).await?;
    Ok(Json(post))
}

async fn set_comment_active(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(request): Json<CommentActiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(SOURCE, &id, "Comment not found")?;
    let comment = state.comments.set_active(id, request.active).await?;
    Ok(Json(comment))
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.db.health_check().await)
}
