//! Field-level validation for reader and author submissions.
//!
//! Every validator reports all failing fields at once so callers can return
//! a complete error map instead of failing on the first problem.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const COMMENT_NAME_MAX: usize = 80;
pub const SHARE_NAME_MAX: usize = 25;
pub const EMAIL_MAX: usize = 254;
pub const TITLE_MAX: usize = 250;
pub const USERNAME_MAX: usize = 150;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:localhost|(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63})$",
    )
    .expect("email pattern compiles")
});

const REQUIRED: &str = "This field is required.";

/// Per-field validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for FormErrors {}

pub fn is_valid_email(value: &str) -> bool {
    value.len() <= EMAIL_MAX && EMAIL_PATTERN.is_match(value)
}

/// Trim `value` and record an error when it is blank or longer than `max` characters.
pub fn required_text(
    errors: &mut FormErrors,
    field: &'static str,
    value: &str,
    max: Option<usize>,
) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, REQUIRED);
    } else if let Some(max) = max {
        let length = trimmed.chars().count();
        if length > max {
            errors.add(
                field,
                format!("Ensure this value has at most {max} characters (it has {length})."),
            );
        }
    }
    trimmed.to_string()
}

pub fn required_email(errors: &mut FormErrors, field: &'static str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, REQUIRED);
    } else if !is_valid_email(trimmed) {
        errors.add(field, "Enter a valid email address.");
    }
    trimmed.to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CommentForm {
    pub name: String,
    pub email: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidComment {
    pub name: String,
    pub email: String,
    pub body: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<ValidComment, FormErrors> {
        let mut errors = FormErrors::new();
        let name = required_text(&mut errors, "name", &self.name, Some(COMMENT_NAME_MAX));
        let email = required_email(&mut errors, "email", &self.email);
        let body = required_text(&mut errors, "body", &self.body, None);
        errors.into_result(ValidComment { name, email, body })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SharePostForm {
    pub name: String,
    pub email: String,
    pub to: String,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidShare {
    pub name: String,
    pub email: String,
    pub to: String,
    pub comments: String,
}

impl SharePostForm {
    pub fn validate(&self) -> Result<ValidShare, FormErrors> {
        let mut errors = FormErrors::new();
        let name = required_text(&mut errors, "name", &self.name, Some(SHARE_NAME_MAX));
        let email = required_email(&mut errors, "email", &self.email);
        let to = required_email(&mut errors, "to", &self.to);
        let comments = self
            .comments
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        errors.into_result(ValidShare {
            name,
            email,
            to,
            comments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(name: &str, email: &str, body: &str) -> CommentForm {
        CommentForm {
            name: name.into(),
            email: email.into(),
            body: body.into(),
        }
    }

    #[test]
    fn valid_comment_is_trimmed() {
        let valid = comment("  Ana ", "ana@example.com ", " Nice post ")
            .validate()
            .expect("valid comment");
        assert_eq!(valid.name, "Ana");
        assert_eq!(valid.email, "ana@example.com");
        assert_eq!(valid.body, "Nice post");
    }

    #[test]
    fn comment_reports_every_failing_field() {
        let errors = comment("", "not-an-email", "   ")
            .validate()
            .expect_err("invalid comment");
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(fields, vec!["body", "email", "name"]);
    }

    #[test]
    fn comment_name_length_is_limited() {
        let errors = comment(&"x".repeat(81), "a@example.com", "hi")
            .validate()
            .expect_err("name too long");
        assert!(errors.contains("name"));
        assert!(comment(&"x".repeat(80), "a@example.com", "hi").validate().is_ok());
    }

    #[test]
    fn share_allows_missing_comments() {
        let form = SharePostForm {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            to: "luis@example.org".into(),
            comments: None,
        };
        let valid = form.validate().expect("valid share");
        assert_eq!(valid.comments, "");
    }

    #[test]
    fn share_validates_recipient_and_name_length() {
        let form = SharePostForm {
            name: "a".repeat(26),
            email: "ana@example.com".into(),
            to: "nobody".into(),
            comments: Some("look".into()),
        };
        let errors = form.validate().expect_err("invalid share");
        assert!(errors.contains("name"));
        assert!(errors.contains("to"));
        assert!(!errors.contains("email"));
    }

    #[test]
    fn email_pattern_accepts_common_addresses() {
        assert!(is_valid_email("first.last+tag@mail.example.co"));
        assert!(is_valid_email("root@localhost"));
        assert!(!is_valid_email("missing-at.example.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("trailing@example."));
    }

    #[test]
    fn display_joins_messages() {
        let mut errors = FormErrors::single("title", "required");
        errors.add("body", "required");
        assert_eq!(errors.to_string(), "body: required; title: required");
    }
}
