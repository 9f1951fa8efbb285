use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CommentedPost, RankedPost, SimilarPost};
use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Uuid,
    pub(crate) title: String,
    pub(crate) slug: String,
    pub(crate) author_id: Uuid,
    pub(crate) author_name: String,
    pub(crate) body: String,
    pub(crate) publish: OffsetDateTime,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
    pub(crate) status: PostStatus,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            author_id: row.author_id,
            author_name: row.author_name,
            body: row.body,
            publish: row.publish,
            created_at: row.created_at,
            updated_at: row.updated_at,
            status: row.status,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RankedPostRow {
    #[sqlx(flatten)]
    pub(crate) post: PostRow,
    pub(crate) rank: f32,
}

impl From<RankedPostRow> for RankedPost {
    fn from(row: RankedPostRow) -> Self {
        Self {
            post: row.post.into(),
            rank: row.rank,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SimilarPostRow {
    #[sqlx(flatten)]
    pub(crate) post: PostRow,
    pub(crate) shared_tags: i64,
}

impl From<SimilarPostRow> for SimilarPost {
    fn from(row: SimilarPostRow) -> Self {
        Self {
            post: row.post.into(),
            shared_tags: row.shared_tags,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CommentedPostRow {
    #[sqlx(flatten)]
    pub(crate) post: PostRow,
    pub(crate) total_comments: i64,
}

impl From<CommentedPostRow> for CommentedPost {
    fn from(row: CommentedPostRow) -> Self {
        Self {
            post: row.post.into(),
            total_comments: row.total_comments,
        }
    }
}
