//! Shared domain enumerations aligned with persisted database enums.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "post_status", rename_all = "snake_case")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }

    /// Publication is one-way: only `Draft -> Published` is accepted.
    pub fn transition_to(self, next: PostStatus) -> Result<PostStatus, DomainError> {
        match (self, next) {
            (PostStatus::Draft, PostStatus::Published) => Ok(next),
            (from, to) => Err(DomainError::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_can_be_published() {
        assert_eq!(
            PostStatus::Draft
                .transition_to(PostStatus::Published)
                .expect("valid transition"),
            PostStatus::Published
        );
    }

    #[test]
    fn published_posts_cannot_return_to_draft() {
        let err = PostStatus::Published
            .transition_to(PostStatus::Draft)
            .expect_err("transition rejected");
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                from: PostStatus::Published,
                to: PostStatus::Draft
            }
        ));
    }

    #[test]
    fn republishing_is_rejected() {
        assert!(
            PostStatus::Published
                .transition_to(PostStatus::Published)
                .is_err()
        );
        assert!(PostStatus::Draft.transition_to(PostStatus::Draft).is_err());
    }
}
