//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageSlice;
use crate::domain::entities::{AuthorRecord, CommentRecord, PostRecord, TagRecord};
use crate::domain::types::PostStatus;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Optional refinements applied on top of the published-only listing.
#[derive(Debug, Clone, Default)]
pub struct PostQueryFilter {
    /// Tag slug the post must carry.
    pub tag: Option<String>,
}

/// Full-text query against published posts.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    /// Postgres text-search configuration, e.g. `spanish`.
    pub language: String,
}

/// UTC interval `[start, end)` covering one local publish day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedPost {
    pub post: PostRecord,
    pub rank: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarPost {
    pub post: PostRecord,
    pub shared_tags: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentedPost {
    pub post: PostRecord,
    pub total_comments: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub title: String,
    pub slug: String,
    pub author_id: Uuid,
    pub body: String,
    pub publish: OffsetDateTime,
    pub status: PostStatus,
    pub tags: Vec<NewTag>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub body: String,
    pub publish: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: Uuid,
    pub name: String,
    pub email: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct CreateAuthorParams {
    pub username: String,
    pub display_name: String,
}

/// Public read paths. Every method except [`PostsRepo::find_by_id`] and
/// [`PostsRepo::slug_taken`] only ever returns published posts.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn count_published(&self, filter: &PostQueryFilter) -> Result<u64, RepoError>;

    async fn list_published(
        &self,
        filter: &PostQueryFilter,
        slice: PageSlice,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_published_on_day(
        &self,
        slug: &str,
        day: DayRange,
    ) -> Result<Option<PostRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    async fn similar_published(
        &self,
        post_id: Uuid,
        limit: u32,
    ) -> Result<Vec<SimilarPost>, RepoError>;

    async fn count_search_results(&self, query: &SearchQuery) -> Result<u64, RepoError>;

    async fn search_published(
        &self,
        query: &SearchQuery,
        slice: PageSlice,
    ) -> Result<Vec<RankedPost>, RepoError>;

    async fn latest_published(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError>;

    async fn most_commented(&self, limit: u32) -> Result<Vec<CommentedPost>, RepoError>;

    /// Whether any post, in any status, already uses `slug` on the given day.
    async fn slug_taken(
        &self,
        slug: &str,
        day: DayRange,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post_status(
        &self,
        id: Uuid,
        status: PostStatus,
    ) -> Result<PostRecord, RepoError>;

    async fn replace_post_tags(
        &self,
        post_id: Uuid,
        tags: &[NewTag],
    ) -> Result<Vec<TagRecord>, RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError>;

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError>;

    /// Tags for several posts at once, as `(post_id, tag)` pairs.
    async fn list_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, TagRecord)>, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Active comments only, oldest first.
    async fn list_active_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError>;
}

#[async_trait]
pub trait CommentsWriteRepo: Send + Sync {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError>;

    async fn set_comment_active(
        &self,
        id: Uuid,
        active: bool,
    ) -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait AuthorsRepo: Send + Sync {
    async fn find_author(&self, id: Uuid) -> Result<Option<AuthorRecord>, RepoError>;

    async fn create_author(&self, params: CreateAuthorParams) -> Result<AuthorRecord, RepoError>;
}
