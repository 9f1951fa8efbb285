use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::authoring::{CreateAuthorCommand, CreatePostCommand, UpdatePostCommand};
use crate::domain::types::PostStatus;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub page: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub query: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthorCreateRequest {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl From<AuthorCreateRequest> for CreateAuthorCommand {
    fn from(request: AuthorCreateRequest) -> Self {
        Self {
            username: request.username,
            display_name: request.display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PostCreateRequest {
    pub author_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub body: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub publish: Option<OffsetDateTime>,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<PostCreateRequest> for CreatePostCommand {
    fn from(request: PostCreateRequest) -> Self {
        Self {
            author_id: request.author_id,
            title: request.title,
            slug: request.slug,
            body: request.body,
            publish: request.publish,
            status: request.status,
            tags: request.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PostUpdateRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub body: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub publish: Option<OffsetDateTime>,
}

impl PostUpdateRequest {
    pub fn into_command(self, id: Uuid) -> UpdatePostCommand {
        UpdatePostCommand {
            id,
            title: self.title,
            slug: self.slug,
            body: self.body,
            publish: self.publish,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PostTagsRequest {
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentActiveRequest {
    pub active: bool,
}
