//! Author-side operations: authors, post drafting, publication and tagging.

use std::collections::HashSet;
use std::sync::Arc;

use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::blog::canonical_path;
use crate::application::repos::{
    AuthorsRepo, CreateAuthorParams, CreatePostParams, DayRange, NewTag, PostsRepo,
    PostsWriteRepo, RepoError, TagsRepo, UpdatePostParams,
};
use crate::domain::entities::{AuthorRecord, PostRecord, TagRecord};
use crate::domain::error::DomainError;
use crate::domain::forms::{FormErrors, TITLE_MAX, USERNAME_MAX, required_text};
use crate::domain::slug::{
    MAX_SLUG_LEN, SlugAsyncError, SlugError, derive_slug, generate_unique_slug_async,
    is_valid_slug,
};
use crate::domain::types::PostStatus;
use crate::util::timezone::{TimezoneError, day_bounds, localized_date};

const SLUG_TAKEN: &str = "Slug must be unique for the publish date.";
const PUBLISH_OUT_OF_RANGE: &str = "Publish date is outside the supported range.";

#[derive(Debug, Error)]
pub enum AuthoringError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("invalid input: {0}")]
    Validation(FormErrors),
    #[error(transparent)]
    Transition(#[from] DomainError),
    #[error(transparent)]
    Timezone(#[from] TimezoneError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateAuthorCommand {
    pub username: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub author_id: Uuid,
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub body: String,
    /// Defaults to now.
    pub publish: Option<OffsetDateTime>,
    pub status: PostStatus,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostCommand {
    pub id: Uuid,
    pub title: String,
    /// Keeps the current slug when absent.
    pub slug: Option<String>,
    pub body: String,
    /// Keeps the current publish time when absent.
    pub publish: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthoredPost {
    #[serde(flatten)]
    pub post: PostRecord,
    pub path: String,
    pub tags: Vec<TagRecord>,
}

#[derive(Clone)]
pub struct AuthoringService {
    authors: Arc<dyn AuthorsRepo>,
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    tags: Arc<dyn TagsRepo>,
    timezone: Tz,
}

impl AuthoringService {
    pub fn new(
        authors: Arc<dyn AuthorsRepo>,
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        tags: Arc<dyn TagsRepo>,
        timezone: Tz,
    ) -> Self {
        Self {
            authors,
            reader,
            writer,
            tags,
            timezone,
        }
    }

    pub async fn create_author(
        &self,
        command: CreateAuthorCommand,
    ) -> Result<AuthorRecord, AuthoringError> {
        let mut errors = FormErrors::new();
        let username = required_text(&mut errors, "username", &command.username, Some(USERNAME_MAX));
        if !username.is_empty() && username.chars().any(char::is_whitespace) {
            errors.add("username", "Usernames cannot contain spaces.");
        }
        let params = errors
            .into_result(CreateAuthorParams {
                display_name: command
                    .display_name
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| username.clone()),
                username,
            })
            .map_err(AuthoringError::Validation)?;

        let author = self
            .authors
            .create_author(params)
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => AuthoringError::Validation(FormErrors::single(
                    "username",
                    "An author with that username already exists.",
                )),
                other => AuthoringError::Repo(other),
            })?;

        info!(
            target = "bitacora::application::authoring",
            author_id = %author.id,
            username = %author.username,
            "author created"
        );
        Ok(author)
    }

    pub async fn create_post(
        &self,
        command: CreatePostCommand,
    ) -> Result<AuthoredPost, AuthoringError> {
        let mut errors = FormErrors::new();
        let title = required_text(&mut errors, "title", &command.title, Some(TITLE_MAX));
        let body = required_text(&mut errors, "body", &command.body, None);
        let explicit_slug = validate_slug(&mut errors, command.slug.as_deref());
        let tags = normalize_tags(&mut errors, &command.tags);

        if self.authors.find_author(command.author_id).await?.is_none() {
            errors.add("author_id", "Unknown author.");
        }
        if !errors.is_empty() {
            return Err(AuthoringError::Validation(errors));
        }

        let publish = command.publish.unwrap_or_else(OffsetDateTime::now_utc);
        let day = self.day_range(publish)?;

        let slug = match explicit_slug {
            Some(slug) => {
                if self.reader.slug_taken(&slug, day, None).await? {
                    return Err(AuthoringError::Validation(FormErrors::single(
                        "slug", SLUG_TAKEN,
                    )));
                }
                slug
            }
            None => self.unique_slug(&title, day).await?,
        };

        let post = self
            .writer
            .create_post(CreatePostParams {
                title,
                slug,
                author_id: command.author_id,
                body,
                publish,
                status: command.status,
                tags,
            })
            .await?;

        info!(
            target = "bitacora::application::authoring",
            post_id = %post.id,
            slug = %post.slug,
            status = %post.status,
            "post created"
        );
        self.authored(post).await
    }

    pub async fn update_post(
        &self,
        command: UpdatePostCommand,
    ) -> Result<AuthoredPost, AuthoringError> {
        let current = self.load(command.id).await?;

        let mut errors = FormErrors::new();
        let title = required_text(&mut errors, "title", &command.title, Some(TITLE_MAX));
        let body = required_text(&mut errors, "body", &command.body, None);
        let slug = validate_slug(&mut errors, command.slug.as_deref())
            .unwrap_or_else(|| current.slug.clone());
        if !errors.is_empty() {
            return Err(AuthoringError::Validation(errors));
        }

        let publish = command.publish.unwrap_or(current.publish);
        let day = self.day_range(publish)?;
        if self.reader.slug_taken(&slug, day, Some(current.id)).await? {
            return Err(AuthoringError::Validation(FormErrors::single(
                "slug", SLUG_TAKEN,
            )));
        }

        let post = self
            .writer
            .update_post(UpdatePostParams {
                id: current.id,
                title,
                slug,
                body,
                publish,
            })
            .await?;

        info!(
            target = "bitacora::application::authoring",
            post_id = %post.id,
            "post updated"
        );
        self.authored(post).await
    }

    /// Move a draft to published. Any other transition is rejected.
    pub async fn publish_post(&self, id: Uuid) -> Result<AuthoredPost, AuthoringError> {
        let current = self.load(id).await?;
        let next = current.status.transition_to(PostStatus::Published)?;

        let post = self.writer.update_post_status(current.id, next).await?;

        info!(
            target = "bitacora::application::authoring",
            post_id = %post.id,
            "post published"
        );
        self.authored(post).await
    }

    pub async fn replace_tags(
        &self,
        id: Uuid,
        names: &[String],
    ) -> Result<AuthoredPost, AuthoringError> {
        let current = self.load(id).await?;

        let mut errors = FormErrors::new();
        let tags = normalize_tags(&mut errors, names);
        if !errors.is_empty() {
            return Err(AuthoringError::Validation(errors));
        }

        let tags = self.writer.replace_post_tags(current.id, &tags).await?;

        info!(
            target = "bitacora::application::authoring",
            post_id = %current.id,
            tags = tags.len(),
            "post tags replaced"
        );
        Ok(AuthoredPost {
            path: canonical_path(&current, self.timezone)?,
            post: current,
            tags,
        })
    }

    async fn load(&self, id: Uuid) -> Result<PostRecord, AuthoringError> {
        self.reader
            .find_by_id(id)
            .await?
            .ok_or(AuthoringError::NotFound { entity: "post" })
    }

    async fn authored(&self, post: PostRecord) -> Result<AuthoredPost, AuthoringError> {
        let tags = self.tags.list_for_post(post.id).await?;
        Ok(AuthoredPost {
            path: canonical_path(&post, self.timezone)?,
            post,
            tags,
        })
    }

    /// Bounds of the local publish day. Dates the calendar cannot close are a `publish` error.
    fn day_range(&self, publish: OffsetDateTime) -> Result<DayRange, AuthoringError> {
        localized_date(publish, self.timezone)
            .and_then(|date| day_bounds(date, self.timezone))
            .map(|(start, end)| DayRange { start, end })
            .map_err(|_| {
                AuthoringError::Validation(FormErrors::single("publish", PUBLISH_OUT_OF_RANGE))
            })
    }

    async fn unique_slug(&self, title: &str, day: DayRange) -> Result<String, AuthoringError> {
        let reader = self.reader.clone();
        let result = generate_unique_slug_async(title, |candidate| {
            let reader = reader.clone();
            async move {
                reader
                    .slug_taken(&candidate, day, None)
                    .await
                    .map(|taken| !taken)
            }
        })
        .await;

        result.map_err(|err| match err {
            SlugAsyncError::Predicate(repo) => AuthoringError::Repo(repo),
            SlugAsyncError::Slug(SlugError::Exhausted { .. }) => {
                AuthoringError::Validation(FormErrors::single("slug", SLUG_TAKEN))
            }
            SlugAsyncError::Slug(_) => AuthoringError::Validation(FormErrors::single(
                "title",
                "Title must contain letters or digits to derive a slug.",
            )),
        })
    }
}

fn validate_slug(errors: &mut FormErrors, slug: Option<&str>) -> Option<String> {
    let slug = slug.map(str::trim).filter(|value| !value.is_empty())?;
    if slug.len() > MAX_SLUG_LEN {
        errors.add(
            "slug",
            format!("Ensure this value has at most {MAX_SLUG_LEN} characters."),
        );
    } else if !is_valid_slug(slug) {
        errors.add(
            "slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        );
    }
    Some(slug.to_string())
}

/// Trim names, drop blanks, and keep the first name for each derived slug.
fn normalize_tags(errors: &mut FormErrors, names: &[String]) -> Vec<NewTag> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for name in names.iter().map(|name| name.trim()).filter(|n| !n.is_empty()) {
        match derive_slug(name) {
            Ok(slug) => {
                if seen.insert(slug.clone()) {
                    tags.push(NewTag {
                        name: name.to_string(),
                        slug,
                    });
                }
            }
            Err(_) => errors.add("tags", format!("`{name}` cannot be used as a tag.")),
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{InMemoryBlog, sample_author};
    use time::macros::datetime;

    fn service(store: &Arc<InMemoryBlog>) -> AuthoringService {
        AuthoringService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            chrono_tz::UTC,
        )
    }

    fn create(author_id: Uuid, title: &str, slug: Option<&str>) -> CreatePostCommand {
        CreatePostCommand {
            author_id,
            title: title.into(),
            slug: slug.map(Into::into),
            body: "Body".into(),
            publish: Some(datetime!(2024-01-05 10:00 UTC)),
            status: PostStatus::Draft,
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_post_derives_slug_and_defaults_to_draft() {
        let store = Arc::new(InMemoryBlog::default());
        let author = sample_author(&store);

        let created = service(&store)
            .create_post(create(author.id, "Hello World", None))
            .await
            .expect("created");

        assert_eq!(created.post.slug, "hello-world");
        assert_eq!(created.post.status, PostStatus::Draft);
        assert_eq!(created.path, "/posts/2024/01/05/hello-world");
    }

    #[tokio::test]
    async fn derived_slug_avoids_same_day_collision() {
        let store = Arc::new(InMemoryBlog::default());
        let author = sample_author(&store);
        let svc = service(&store);

        svc.create_post(create(author.id, "Hello World", None))
            .await
            .expect("first");
        let second = svc
            .create_post(create(author.id, "Hello World", None))
            .await
            .expect("second");

        assert_eq!(second.post.slug, "hello-world-2");
    }

    #[tokio::test]
    async fn explicit_slug_must_be_unique_per_day() {
        let store = Arc::new(InMemoryBlog::default());
        let author = sample_author(&store);
        let svc = service(&store);

        svc.create_post(create(author.id, "Hello", Some("hello")))
            .await
            .expect("first");
        let err = svc
            .create_post(create(author.id, "Hello again", Some("hello")))
            .await
            .expect_err("duplicate slug");
        assert!(matches!(err, AuthoringError::Validation(errors) if errors.contains("slug")));

        let mut next_day = create(author.id, "Hello", Some("hello"));
        next_day.publish = Some(datetime!(2024-01-06 10:00 UTC));
        svc.create_post(next_day).await.expect("other day is free");
    }

    #[tokio::test]
    async fn create_post_validates_fields_together() {
        let store = Arc::new(InMemoryBlog::default());
        let svc = service(&store);

        let mut command = create(Uuid::new_v4(), "", Some("bad slug"));
        command.body = "  ".into();
        let err = svc.create_post(command).await.expect_err("invalid");
        match err {
            AuthoringError::Validation(errors) => {
                let fields: Vec<_> = errors.fields().collect();
                assert_eq!(fields, vec!["author_id", "body", "slug", "title"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_on_last_calendar_day_is_a_field_error() {
        let store = Arc::new(InMemoryBlog::default());
        let author = sample_author(&store);
        let mut command = create(author.id, "Far Future", None);
        command.publish = Some(datetime!(9999-12-31 10:00 UTC));

        let err = service(&store)
            .create_post(command)
            .await
            .expect_err("unbounded day");
        assert!(matches!(err, AuthoringError::Validation(errors) if errors.contains("publish")));
    }

    #[tokio::test]
    async fn publish_is_one_way() {
        let store = Arc::new(InMemoryBlog::default());
        let author = sample_author(&store);
        let svc = service(&store);
        let created = svc
            .create_post(create(author.id, "Hello", None))
            .await
            .expect("created");

        let published = svc.publish_post(created.post.id).await.expect("published");
        assert_eq!(published.post.status, PostStatus::Published);

        let err = svc
            .publish_post(created.post.id)
            .await
            .expect_err("already published");
        assert!(matches!(
            err,
            AuthoringError::Transition(DomainError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn replace_tags_deduplicates_by_slug() {
        let store = Arc::new(InMemoryBlog::default());
        let author = sample_author(&store);
        let svc = service(&store);
        let created = svc
            .create_post(create(author.id, "Hello", None))
            .await
            .expect("created");

        let names = vec![
            "Python".to_string(),
            " python ".to_string(),
            "".to_string(),
            "Django".to_string(),
        ];
        let tagged = svc
            .replace_tags(created.post.id, &names)
            .await
            .expect("tagged");

        assert_eq!(tagged.tags.len(), 2);
        assert_eq!(store.tag_slugs_for(created.post.id), vec!["django", "python"]);

        svc.replace_tags(created.post.id, &["rust".to_string()])
            .await
            .expect("retagged");
        assert_eq!(store.tag_slugs_for(created.post.id), vec!["rust"]);
    }

    #[tokio::test]
    async fn update_keeps_slug_and_checks_collisions() {
        let store = Arc::new(InMemoryBlog::default());
        let author = sample_author(&store);
        let svc = service(&store);
        let first = svc
            .create_post(create(author.id, "First", None))
            .await
            .expect("first");
        svc.create_post(create(author.id, "Second", None))
            .await
            .expect("second");

        let updated = svc
            .update_post(UpdatePostCommand {
                id: first.post.id,
                title: "First, revised".into(),
                slug: None,
                body: "New body".into(),
                publish: None,
            })
            .await
            .expect("updated");
        assert_eq!(updated.post.slug, "first");
        assert_eq!(store.post(first.post.id).unwrap().title, "First, revised");

        let err = svc
            .update_post(UpdatePostCommand {
                id: first.post.id,
                title: "First".into(),
                slug: Some("second".into()),
                body: "Body".into(),
                publish: None,
            })
            .await
            .expect_err("collision");
        assert!(matches!(err, AuthoringError::Validation(errors) if errors.contains("slug")));
    }

    #[tokio::test]
    async fn duplicate_username_is_a_field_error() {
        let store = Arc::new(InMemoryBlog::default());
        let svc = service(&store);
        let command = CreateAuthorCommand {
            username: "ana".into(),
            display_name: None,
        };

        let author = svc.create_author(command.clone()).await.expect("created");
        assert_eq!(author.display_name, "ana");

        let err = svc.create_author(command).await.expect_err("duplicate");
        assert!(matches!(err, AuthoringError::Validation(errors) if errors.contains("username")));
    }
}
