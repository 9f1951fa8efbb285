use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{CommentsWriteRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::forms::{CommentForm, FormErrors};

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("post not found")]
    PostNotFound,
    #[error("comment not found")]
    CommentNotFound,
    #[error("invalid comment: {0}")]
    Validation(FormErrors),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Reader comment submission and the moderation toggle.
#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn CommentsWriteRepo>,
}

impl CommentService {
    pub fn new(posts: Arc<dyn PostsRepo>, writer: Arc<dyn CommentsWriteRepo>) -> Self {
        Self { posts, writer }
    }

    pub async fn submit(
        &self,
        post_id: Uuid,
        form: &CommentForm,
    ) -> Result<CommentRecord, CommentError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .filter(PostRecord::is_publicly_visible)
            .ok_or(CommentError::PostNotFound)?;

        let valid = form.validate().map_err(CommentError::Validation)?;

        let comment = self
            .writer
            .create_comment(CreateCommentParams {
                post_id: post.id,
                name: valid.name,
                email: valid.email,
                body: valid.body,
            })
            .await?;

        counter!("bitacora_comments_submitted_total").increment(1);
        info!(
            target = "bitacora::application::comments",
            post_id = %post.id,
            comment_id = %comment.id,
            "comment submitted"
        );

        Ok(comment)
    }

    /// Hide or restore a comment. Nothing else about a comment is editable.
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<CommentRecord, CommentError> {
        let comment = self
            .writer
            .set_comment_active(id, active)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => CommentError::CommentNotFound,
                other => CommentError::Repo(other),
            })?;

        info!(
            target = "bitacora::application::comments",
            comment_id = %comment.id,
            active,
            "comment moderated"
        );

        Ok(comment)
    }
}
