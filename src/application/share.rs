//! "Recommend this post" emails.

use std::sync::Arc;

use chrono_tz::Tz;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::application::blog::canonical_path;
use crate::application::mail::{MailError, MailTransport, OutgoingMail};
use crate::application::repos::{PostsRepo, RepoError};
use crate::config::Settings;
use crate::domain::entities::PostRecord;
use crate::domain::forms::{FormErrors, SharePostForm, ValidShare};
use crate::util::timezone::TimezoneError;

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("post not found")]
    PostNotFound,
    #[error("invalid share request: {0}")]
    Validation(FormErrors),
    #[error("failed to build post url: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Timezone(#[from] TimezoneError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct ShareConfig {
    pub public_site_url: Url,
    pub timezone: Tz,
    pub default_from: String,
}

impl From<&Settings> for ShareConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            public_site_url: settings.blog.public_site_url.clone(),
            timezone: settings.blog.timezone,
            default_from: settings.mail.default_from.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareReceipt {
    pub post_id: Uuid,
    pub to: String,
    pub url: String,
}

#[derive(Clone)]
pub struct ShareService {
    posts: Arc<dyn PostsRepo>,
    mailer: Arc<dyn MailTransport>,
    config: ShareConfig,
}

impl ShareService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        mailer: Arc<dyn MailTransport>,
        config: ShareConfig,
    ) -> Self {
        Self {
            posts,
            mailer,
            config,
        }
    }

    pub async fn share(
        &self,
        post_id: Uuid,
        form: &SharePostForm,
    ) -> Result<ShareReceipt, ShareError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .filter(PostRecord::is_publicly_visible)
            .ok_or(ShareError::PostNotFound)?;

        let valid = form.validate().map_err(ShareError::Validation)?;

        let path = canonical_path(&post, self.config.timezone)?;
        let url = absolute_url(&self.config.public_site_url, &path)?;
        let mail = compose(&post, &valid, url.as_str(), &self.config.default_from);

        self.mailer.send(mail).await?;

        counter!("bitacora_posts_shared_total").increment(1);
        info!(
            target = "bitacora::application::share",
            post_id = %post.id,
            "post shared by email"
        );

        Ok(ShareReceipt {
            post_id: post.id,
            to: valid.to,
            url: url.into(),
        })
    }
}

fn compose(post: &PostRecord, share: &ValidShare, url: &str, from: &str) -> OutgoingMail {
    OutgoingMail {
        from: from.to_string(),
        to: vec![share.to.clone()],
        subject: format!(
            "{} ({}) recommends you read {}",
            share.name, share.email, post.title
        ),
        body: format!(
            "Read {} at {}\n\n{}'s comments: {}",
            post.title, url, share.name, share.comments
        ),
    }
}

/// Join a site-relative path onto the configured base, keeping any base path prefix.
fn absolute_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
}
