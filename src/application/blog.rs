//! Reader-facing queries: listings, post detail, search and sidebar aggregates.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use chrono_tz::Tz;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::application::pagination::{Page, PageWindow};
use crate::application::repos::{
    CommentsRepo, DayRange, PostQueryFilter, PostsRepo, RepoError, SearchQuery, TagsRepo,
};
use crate::config::Settings;
use crate::domain::entities::{CommentRecord, PostRecord, TagRecord};
use crate::domain::posts::PublishDay;
use crate::util::timezone::{TimezoneError, day_bounds};

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("unknown tag `{0}`")]
    UnknownTag(String),
    #[error("post not found")]
    PostNotFound,
    #[error(transparent)]
    Timezone(#[from] TimezoneError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Reader-side tuning resolved from [`Settings`].
#[derive(Debug, Clone)]
pub struct ReadingConfig {
    pub page_size: NonZeroU32,
    pub similar_posts_limit: u32,
    pub latest_posts_count: u32,
    pub most_commented_count: u32,
    pub timezone: Tz,
    pub search_language: String,
}

impl From<&Settings> for ReadingConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            page_size: settings.blog.page_size,
            similar_posts_limit: settings.blog.similar_posts_limit.get(),
            latest_posts_count: settings.blog.latest_posts_count.get(),
            most_commented_count: settings.blog.most_commented_count.get(),
            timezone: settings.blog.timezone,
            search_language: settings.search.language.clone(),
        }
    }
}

/// Canonical public path of `post`, derived from its publish day in `tz`.
pub fn canonical_path(post: &PostRecord, tz: Tz) -> Result<String, TimezoneError> {
    Ok(PublishDay::of(post.publish, tz)?.post_path(&post.slug))
}

#[derive(Debug, Clone, Serialize)]
pub struct PostCard {
    #[serde(flatten)]
    pub post: PostRecord,
    pub path: String,
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostListing {
    pub tag: Option<TagRecord>,
    #[serde(flatten)]
    pub posts: Page<PostCard>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostLink {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub path: String,
    #[serde(with = "time::serde::rfc3339")]
    pub publish: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarPostLink {
    #[serde(flatten)]
    pub link: PostLink,
    pub shared_tags: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentedPostLink {
    #[serde(flatten)]
    pub link: PostLink,
    pub total_comments: i64,
}

/// Comment as shown to readers; the author's email stays private.
#[derive(Debug, Clone, Serialize)]
pub struct PublicComment {
    pub id: Uuid,
    pub name: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<CommentRecord> for PublicComment {
    fn from(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            body: record.body,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: PostRecord,
    pub path: String,
    pub tags: Vec<TagRecord>,
    pub comments: Vec<PublicComment>,
    pub similar_posts: Vec<SimilarPostLink>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub post: PostRecord,
    pub path: String,
    pub rank: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    /// `None` when no search was performed.
    pub query: Option<String>,
    #[serde(flatten)]
    pub results: Page<SearchHit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sidebar {
    pub total_posts: u64,
    pub latest_posts: Vec<PostLink>,
    pub most_commented_posts: Vec<CommentedPostLink>,
}

#[derive(Clone)]
pub struct BlogService {
    posts: Arc<dyn PostsRepo>,
    tags: Arc<dyn TagsRepo>,
    comments: Arc<dyn CommentsRepo>,
    config: ReadingConfig,
}

impl BlogService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        tags: Arc<dyn TagsRepo>,
        comments: Arc<dyn CommentsRepo>,
        config: ReadingConfig,
    ) -> Self {
        Self {
            posts,
            tags,
            comments,
            config,
        }
    }

    /// Published posts, newest first, optionally restricted to a tag slug.
    pub async fn list_posts(
        &self,
        tag_slug: Option<&str>,
        page: Option<&str>,
    ) -> Result<PostListing, BlogError> {
        let tag = match tag_slug.map(str::trim).filter(|slug| !slug.is_empty()) {
            Some(slug) => Some(
                self.tags
                    .find_by_slug(slug)
                    .await?
                    .ok_or_else(|| BlogError::UnknownTag(slug.to_string()))?,
            ),
            None => None,
        };

        let filter = PostQueryFilter {
            tag: tag.as_ref().map(|tag| tag.slug.clone()),
        };
        let total = self.posts.count_published(&filter).await?;
        let window = PageWindow::resolve(page, total, self.config.page_size);
        let records = self.posts.list_published(&filter, window.slice()).await?;
        let cards = self.cards(records).await?;

        Ok(PostListing {
            tag,
            posts: Page::new(cards, window),
        })
    }

    /// A published post addressed by its local publish day and slug.
    pub async fn post_detail(
        &self,
        year: i32,
        month: u8,
        day: u8,
        slug: &str,
    ) -> Result<PostDetail, BlogError> {
        let publish_day = PublishDay::new(year, month, day).map_err(|_| BlogError::PostNotFound)?;
        let date = publish_day.date().map_err(|_| BlogError::PostNotFound)?;
        let (start, end) =
            day_bounds(date, self.config.timezone).map_err(|_| BlogError::PostNotFound)?;

        let post = self
            .posts
            .find_published_on_day(slug, DayRange { start, end })
            .await?
            .filter(PostRecord::is_publicly_visible)
            .ok_or(BlogError::PostNotFound)?;

        let tags = self.tags.list_for_post(post.id).await?;
        let comments = self
            .comments
            .list_active_for_post(post.id)
            .await?
            .into_iter()
            .filter(|comment| comment.active)
            .map(PublicComment::from)
            .collect();

        let similar_posts = self
            .posts
            .similar_published(post.id, self.config.similar_posts_limit)
            .await?
            .into_iter()
            .map(|similar| -> Result<SimilarPostLink, BlogError> {
                Ok(SimilarPostLink {
                    link: self.link(&similar.post)?,
                    shared_tags: similar.shared_tags,
                })
            })
            .collect::<Result<Vec<_>, BlogError>>()?;

        Ok(PostDetail {
            path: publish_day.post_path(&post.slug),
            post,
            tags,
            comments,
            similar_posts,
        })
    }

    /// Full-text search over published posts. Blank queries perform no search.
    pub async fn search(
        &self,
        query: Option<&str>,
        page: Option<&str>,
    ) -> Result<SearchResults, BlogError> {
        let text = match query.map(str::trim).filter(|text| !text.is_empty()) {
            Some(text) => text.to_string(),
            None => {
                return Ok(SearchResults {
                    query: None,
                    results: Page::new(Vec::new(), PageWindow::empty(self.config.page_size)),
                });
            }
        };

        counter!("bitacora_search_queries_total").increment(1);

        let search = SearchQuery {
            text: text.clone(),
            language: self.config.search_language.clone(),
        };
        let total = self.posts.count_search_results(&search).await?;
        let window = PageWindow::resolve(page, total, self.config.page_size);
        let hits = if total == 0 {
            Vec::new()
        } else {
            self.posts.search_published(&search, window.slice()).await?
        };

        debug!(
            target = "bitacora::application::blog",
            query = %text,
            total,
            page = window.number,
            "search executed"
        );

        let hits = hits
            .into_iter()
            .map(|hit| -> Result<SearchHit, BlogError> {
                Ok(SearchHit {
                    path: canonical_path(&hit.post, self.config.timezone)?,
                    post: hit.post,
                    rank: hit.rank,
                })
            })
            .collect::<Result<Vec<_>, BlogError>>()?;

        Ok(SearchResults {
            query: Some(text),
            results: Page::new(hits, window),
        })
    }

    pub async fn sidebar(&self) -> Result<Sidebar, BlogError> {
        let total_posts = self
            .posts
            .count_published(&PostQueryFilter::default())
            .await?;

        let latest_posts = self
            .posts
            .latest_published(self.config.latest_posts_count)
            .await?
            .iter()
            .map(|post| self.link(post))
            .collect::<Result<Vec<_>, _>>()?;

        let most_commented_posts = self
            .posts
            .most_commented(self.config.most_commented_count)
            .await?
            .into_iter()
            .map(|entry| -> Result<CommentedPostLink, BlogError> {
                Ok(CommentedPostLink {
                    link: self.link(&entry.post)?,
                    total_comments: entry.total_comments,
                })
            })
            .collect::<Result<Vec<_>, BlogError>>()?;

        Ok(Sidebar {
            total_posts,
            latest_posts,
            most_commented_posts,
        })
    }

    fn link(&self, post: &PostRecord) -> Result<PostLink, BlogError> {
        Ok(PostLink {
            id: post.id,
            title: post.title.clone(),
            slug: post.slug.clone(),
            path: canonical_path(post, self.config.timezone)?,
            publish: post.publish,
        })
    }

    async fn cards(&self, records: Vec<PostRecord>) -> Result<Vec<PostCard>, BlogError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = records.iter().map(|post| post.id).collect();
        let mut tags_by_post: HashMap<Uuid, Vec<TagRecord>> = HashMap::new();
        for (post_id, tag) in self.tags.list_for_posts(&ids).await? {
            tags_by_post.entry(post_id).or_default().push(tag);
        }

        records
            .into_iter()
            .map(|post| -> Result<PostCard, BlogError> {
                Ok(PostCard {
                    path: canonical_path(&post, self.config.timezone)?,
                    tags: tags_by_post.remove(&post.id).unwrap_or_default(),
                    post,
                })
            })
            .collect()
    }
}
