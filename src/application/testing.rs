//! In-memory repositories shared by service tests.

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::blog::ReadingConfig;
use crate::application::pagination::PageSlice;
use crate::application::repos::{
    AuthorsRepo, CommentedPost, CommentsRepo, CommentsWriteRepo, CreateAuthorParams,
    CreateCommentParams, CreatePostParams, DayRange, NewTag, PostQueryFilter, PostsRepo,
    PostsWriteRepo, RankedPost, RepoError, SearchQuery, SimilarPost, TagsRepo, UpdatePostParams,
};
use crate::domain::entities::{AuthorRecord, CommentRecord, PostRecord, TagRecord};
use crate::domain::types::PostStatus;

#[derive(Default)]
struct State {
    authors: Vec<AuthorRecord>,
    posts: Vec<PostRecord>,
    tags: Vec<TagRecord>,
    post_tags: Vec<(Uuid, Uuid)>,
    comments: Vec<CommentRecord>,
}

#[derive(Default)]
pub(crate) struct InMemoryBlog {
    state: Mutex<State>,
    search_calls: AtomicUsize,
}

pub(crate) fn sample_author(store: &InMemoryBlog) -> AuthorRecord {
    let author = AuthorRecord {
        id: Uuid::new_v4(),
        username: "ana".into(),
        display_name: "Ana".into(),
        created_at: OffsetDateTime::now_utc(),
    };
    store.state.lock().unwrap().authors.push(author.clone());
    author
}

pub(crate) fn sample_post(
    author: &AuthorRecord,
    slug: &str,
    publish: OffsetDateTime,
    status: PostStatus,
) -> PostRecord {
    PostRecord {
        id: Uuid::new_v4(),
        title: slug.replace('-', " "),
        slug: slug.to_string(),
        author_id: author.id,
        author_name: author.display_name.clone(),
        body: format!("Body of {slug}"),
        publish,
        created_at: publish,
        updated_at: publish,
        status,
    }
}

impl InMemoryBlog {
    pub(crate) fn reading_config() -> ReadingConfig {
        ReadingConfig {
            page_size: NonZeroU32::new(3).unwrap(),
            similar_posts_limit: 4,
            latest_posts_count: 5,
            most_commented_count: 5,
            timezone: chrono_tz::UTC,
            search_language: "spanish".into(),
        }
    }

    pub(crate) fn insert_post(&self, post: PostRecord) -> PostRecord {
        self.state.lock().unwrap().posts.push(post.clone());
        post
    }

    pub(crate) fn insert_comment(&self, post_id: Uuid, name: &str, active: bool) -> CommentRecord {
        let now = OffsetDateTime::now_utc();
        let mut state = self.state.lock().unwrap();
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id,
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            body: format!("Comment from {name}"),
            created_at: now + time::Duration::milliseconds(state.comments.len() as i64),
            updated_at: now,
            active,
        };
        state.comments.push(comment.clone());
        comment
    }

    pub(crate) fn tag_post(&self, post_id: Uuid, names: &[&str]) {
        let tags: Vec<NewTag> = names
            .iter()
            .map(|name| NewTag {
                name: name.to_string(),
                slug: name.to_lowercase(),
            })
            .collect();
        let mut state = self.state.lock().unwrap();
        link_tags(&mut state, post_id, &tags);
    }

    pub(crate) fn post(&self, id: Uuid) -> Option<PostRecord> {
        let state = self.state.lock().unwrap();
        state.posts.iter().find(|post| post.id == id).cloned()
    }

    pub(crate) fn comment(&self, id: Uuid) -> Option<CommentRecord> {
        let state = self.state.lock().unwrap();
        state.comments.iter().find(|c| c.id == id).cloned()
    }

    pub(crate) fn tag_slugs_for(&self, post_id: Uuid) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut slugs: Vec<String> = tags_of(&state, post_id)
            .into_iter()
            .map(|tag| tag.slug)
            .collect();
        slugs.sort();
        slugs
    }

    pub(crate) fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    fn published(&self, filter: &PostQueryFilter) -> Vec<PostRecord> {
        let state = self.state.lock().unwrap();
        let mut posts: Vec<PostRecord> = state
            .posts
            .iter()
            .filter(|post| post.status == PostStatus::Published)
            .filter(|post| match filter.tag.as_ref() {
                Some(slug) => tags_of(&state, post.id).iter().any(|tag| &tag.slug == slug),
                None => true,
            })
            .cloned()
            .collect();
        sort_newest_first(&mut posts);
        posts
    }

    fn matches(&self, query: &SearchQuery) -> Vec<RankedPost> {
        let terms: Vec<String> = query
            .text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let mut hits: Vec<RankedPost> = self
            .published(&PostQueryFilter::default())
            .into_iter()
            .filter_map(|post| {
                let title = post.title.to_lowercase();
                let body = post.body.to_lowercase();
                let all_match = terms
                    .iter()
                    .all(|term| title.contains(term.as_str()) || body.contains(term.as_str()));
                if !all_match {
                    return None;
                }
                let rank: f32 = terms
                    .iter()
                    .map(|term| {
                        let mut score = 0.0_f32;
                        if title.contains(term.as_str()) {
                            score += 1.0;
                        }
                        if body.contains(term.as_str()) {
                            score += 0.4;
                        }
                        score
                    })
                    .sum();
                Some(RankedPost { post, rank })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.rank
                .total_cmp(&a.rank)
                .then_with(|| b.post.publish.cmp(&a.post.publish))
        });
        hits
    }
}

fn sort_newest_first(posts: &mut [PostRecord]) {
    posts.sort_by(|a, b| b.publish.cmp(&a.publish).then_with(|| b.id.cmp(&a.id)));
}

fn window<T>(items: Vec<T>, slice: PageSlice) -> Vec<T> {
    items
        .into_iter()
        .skip(slice.offset as usize)
        .take(slice.limit as usize)
        .collect()
}

fn tags_of(state: &State, post_id: Uuid) -> Vec<TagRecord> {
    let mut tags: Vec<TagRecord> = state
        .post_tags
        .iter()
        .filter(|(post, _)| *post == post_id)
        .filter_map(|(_, tag_id)| state.tags.iter().find(|tag| tag.id == *tag_id).cloned())
        .collect();
    tags.sort_by(|a, b| a.name.cmp(&b.name));
    tags
}

fn link_tags(state: &mut State, post_id: Uuid, tags: &[NewTag]) -> Vec<TagRecord> {
    state.post_tags.retain(|(post, _)| *post != post_id);
    let mut linked = Vec::new();
    for new_tag in tags {
        let tag = match state.tags.iter().find(|tag| tag.slug == new_tag.slug) {
            Some(existing) => existing.clone(),
            None => {
                let created = TagRecord {
                    id: Uuid::new_v4(),
                    name: new_tag.name.clone(),
                    slug: new_tag.slug.clone(),
                };
                state.tags.push(created.clone());
                created
            }
        };
        state.post_tags.push((post_id, tag.id));
        linked.push(tag);
    }
    linked.sort_by(|a, b| a.name.cmp(&b.name));
    linked
}

#[async_trait]
impl PostsRepo for InMemoryBlog {
    async fn count_published(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        Ok(self.published(filter).len() as u64)
    }

    async fn list_published(
        &self,
        filter: &PostQueryFilter,
        slice: PageSlice,
    ) -> Result<Vec<PostRecord>, RepoError> {
        Ok(window(self.published(filter), slice))
    }

    async fn find_published_on_day(
        &self,
        slug: &str,
        day: DayRange,
    ) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .published(&PostQueryFilter::default())
            .into_iter()
            .find(|post| post.slug == slug && post.publish >= day.start && post.publish < day.end))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.post(id))
    }

    async fn similar_published(
        &self,
        post_id: Uuid,
        limit: u32,
    ) -> Result<Vec<SimilarPost>, RepoError> {
        let target: HashSet<Uuid> = {
            let state = self.state.lock().unwrap();
            tags_of(&state, post_id).into_iter().map(|tag| tag.id).collect()
        };
        let candidates = self.published(&PostQueryFilter::default());
        let state = self.state.lock().unwrap();
        let mut similar: Vec<SimilarPost> = candidates
            .into_iter()
            .filter(|post| post.id != post_id)
            .filter_map(|post| {
                let shared = tags_of(&state, post.id)
                    .iter()
                    .filter(|tag| target.contains(&tag.id))
                    .count() as i64;
                (shared > 0).then_some(SimilarPost {
                    post,
                    shared_tags: shared,
                })
            })
            .collect();
        similar.sort_by(|a, b| {
            b.shared_tags
                .cmp(&a.shared_tags)
                .then_with(|| b.post.publish.cmp(&a.post.publish))
        });
        similar.truncate(limit as usize);
        Ok(similar)
    }

    async fn count_search_results(&self, query: &SearchQuery) -> Result<u64, RepoError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.matches(query).len() as u64)
    }

    async fn search_published(
        &self,
        query: &SearchQuery,
        slice: PageSlice,
    ) -> Result<Vec<RankedPost>, RepoError> {
        Ok(window(self.matches(query), slice))
    }

    async fn latest_published(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        let mut posts = self.published(&PostQueryFilter::default());
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn most_commented(&self, limit: u32) -> Result<Vec<CommentedPost>, RepoError> {
        let posts = self.published(&PostQueryFilter::default());
        let state = self.state.lock().unwrap();
        let mut ranked: Vec<CommentedPost> = posts
            .into_iter()
            .map(|post| {
                let total_comments = state
                    .comments
                    .iter()
                    .filter(|c| c.post_id == post.id && c.active)
                    .count() as i64;
                CommentedPost {
                    post,
                    total_comments,
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.total_comments
                .cmp(&a.total_comments)
                .then_with(|| b.post.publish.cmp(&a.post.publish))
        });
        ranked.truncate(limit as usize);
        Ok(ranked)
    }

    async fn slug_taken(
        &self,
        slug: &str,
        day: DayRange,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepoError> {
        let state = self.state.lock().unwrap();
        Ok(state.posts.iter().any(|post| {
            post.slug == slug
                && post.publish >= day.start
                && post.publish < day.end
                && Some(post.id) != exclude
        }))
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryBlog {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().unwrap();
        let author = state
            .authors
            .iter()
            .find(|author| author.id == params.author_id)
            .cloned()
            .ok_or_else(|| RepoError::InvalidInput {
                message: "unknown author".into(),
            })?;
        let now = OffsetDateTime::now_utc();
        let post = PostRecord {
            id: Uuid::new_v4(),
            title: params.title,
            slug: params.slug,
            author_id: author.id,
            author_name: author.display_name,
            body: params.body,
            publish: params.publish,
            created_at: now,
            updated_at: now,
            status: params.status,
        };
        state.posts.push(post.clone());
        link_tags(&mut state, post.id, &params.tags);
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().unwrap();
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.title = params.title;
        post.slug = params.slug;
        post.body = params.body;
        post.publish = params.publish;
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }

    async fn update_post_status(
        &self,
        id: Uuid,
        status: PostStatus,
    ) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().unwrap();
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or(RepoError::NotFound)?;
        post.status = status;
        Ok(post.clone())
    }

    async fn replace_post_tags(
        &self,
        post_id: Uuid,
        tags: &[NewTag],
    ) -> Result<Vec<TagRecord>, RepoError> {
        let mut state = self.state.lock().unwrap();
        Ok(link_tags(&mut state, post_id, tags))
    }
}

#[async_trait]
impl TagsRepo for InMemoryBlog {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError> {
        let state = self.state.lock().unwrap();
        Ok(state.tags.iter().find(|tag| tag.slug == slug).cloned())
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError> {
        let state = self.state.lock().unwrap();
        Ok(tags_of(&state, post_id))
    }

    async fn list_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, TagRecord)>, RepoError> {
        let state = self.state.lock().unwrap();
        Ok(post_ids
            .iter()
            .flat_map(|id| {
                tags_of(&state, *id)
                    .into_iter()
                    .map(move |tag| (*id, tag))
            })
            .collect())
    }
}

#[async_trait]
impl CommentsRepo for InMemoryBlog {
    async fn list_active_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.lock().unwrap();
        let mut comments: Vec<CommentRecord> = state
            .comments
            .iter()
            .filter(|c| c.post_id == post_id && c.active)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }
}

#[async_trait]
impl CommentsWriteRepo for InMemoryBlog {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let comment = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            name: params.name,
            email: params.email,
            body: params.body,
            created_at: now,
            updated_at: now,
            active: true,
        };
        self.state.lock().unwrap().comments.push(comment.clone());
        Ok(comment)
    }

    async fn set_comment_active(
        &self,
        id: Uuid,
        active: bool,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.lock().unwrap();
        let comment = state
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepoError::NotFound)?;
        comment.active = active;
        comment.updated_at = OffsetDateTime::now_utc();
        Ok(comment.clone())
    }
}

#[async_trait]
impl AuthorsRepo for InMemoryBlog {
    async fn find_author(&self, id: Uuid) -> Result<Option<AuthorRecord>, RepoError> {
        let state = self.state.lock().unwrap();
        Ok(state.authors.iter().find(|a| a.id == id).cloned())
    }

    async fn create_author(&self, params: CreateAuthorParams) -> Result<AuthorRecord, RepoError> {
        let mut state = self.state.lock().unwrap();
        if state.authors.iter().any(|a| a.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "authors_username_key".into(),
            });
        }
        let author = AuthorRecord {
            id: Uuid::new_v4(),
            username: params.username,
            display_name: params.display_name,
            created_at: OffsetDateTime::now_utc(),
        };
        state.authors.push(author.clone());
        Ok(author)
    }
}
