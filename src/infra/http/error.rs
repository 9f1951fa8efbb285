use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::authoring::AuthoringError;
use crate::application::blog::BlogError;
use crate::application::comments::CommentError;
use crate::application::error::ErrorReport;
use crate::application::mail::MailError;
use crate::application::repos::RepoError;
use crate::application::share::ShareError;
use crate::domain::forms::FormErrors;

pub mod codes {
    pub const NOT_FOUND: &str = "not_found";
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const CONFLICT: &str = "conflict";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const MAIL_UNAVAILABLE: &str = "mail_unavailable";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FormErrors>,
}

/// JSON error response. The diagnostic `detail` goes to the logs, never to the client.
#[derive(Debug)]
pub struct ApiError {
    source: &'static str,
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    fields: Option<FormErrors>,
    detail: Vec<String>,
}

impl ApiError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        code: &'static str,
        message: &'static str,
    ) -> Self {
        Self {
            source,
            status,
            code,
            message,
            hint: None,
            fields: None,
            detail: Vec::new(),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn with_detail(mut self, error: &dyn std::error::Error) -> Self {
        let report = ErrorReport::from_error(self.source, self.status, error);
        self.detail = report.messages;
        self
    }

    pub fn not_found(source: &'static str, message: &'static str) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, codes::NOT_FOUND, message)
    }

    pub fn validation(source: &'static str, fields: FormErrors) -> Self {
        let mut error = Self::new(
            source,
            StatusCode::BAD_REQUEST,
            codes::VALIDATION_FAILED,
            "Submitted data is invalid",
        );
        error.detail = vec![fields.to_string()];
        error.fields = Some(fields);
        error
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint.clone(),
                fields: self.fields,
            },
        };
        let mut response = (self.status, Json(body)).into_response();

        let report = if self.detail.is_empty() {
            ErrorReport::from_message(
                self.source,
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        } else {
            ErrorReport {
                source: self.source,
                status: self.status,
                messages: self.detail,
            }
        };
        report.attach(&mut response);
        response
    }
}

/// Map a repository failure onto the shared HTTP taxonomy.
pub fn repo_to_api(source: &'static str, err: RepoError) -> ApiError {
    let mapped = match &err {
        RepoError::Duplicate { constraint } => {
            ApiError::new(source, StatusCode::CONFLICT, codes::CONFLICT, "Duplicate record")
                .with_hint(constraint.clone())
        }
        RepoError::NotFound => ApiError::not_found(source, "Resource not found"),
        RepoError::InvalidInput { .. } => ApiError::new(
            source,
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
        ),
        RepoError::Integrity { .. } => ApiError::new(
            source,
            StatusCode::CONFLICT,
            codes::CONFLICT,
            "Integrity constraint violated",
        ),
        RepoError::Timeout => ApiError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
        ),
        RepoError::Persistence(_) => ApiError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "Persistence error",
        ),
    };
    mapped.with_detail(&err)
}

fn internal(source: &'static str, err: &dyn std::error::Error) -> ApiError {
    ApiError::new(
        source,
        StatusCode::INTERNAL_SERVER_ERROR,
        codes::INTERNAL,
        "Internal server error",
    )
    .with_detail(err)
}

impl From<BlogError> for ApiError {
    fn from(err: BlogError) -> Self {
        const SOURCE: &str = "application::blog";
        match err {
            BlogError::UnknownTag(_) => {
                ApiError::not_found(SOURCE, "Tag not found").with_detail(&err)
            }
            BlogError::PostNotFound => ApiError::not_found(SOURCE, "Post not found"),
            BlogError::Timezone(ref inner) => internal(SOURCE, inner),
            BlogError::Repo(repo) => repo_to_api(SOURCE, repo),
        }
    }
}

impl From<CommentError> for ApiError {
    fn from(err: CommentError) -> Self {
        const SOURCE: &str = "application::comments";
        match err {
            CommentError::PostNotFound => ApiError::not_found(SOURCE, "Post not found"),
            CommentError::CommentNotFound => ApiError::not_found(SOURCE, "Comment not found"),
            CommentError::Validation(fields) => ApiError::validation(SOURCE, fields),
            CommentError::Repo(repo) => repo_to_api(SOURCE, repo),
        }
    }
}

impl From<ShareError> for ApiError {
    fn from(err: ShareError) -> Self {
        const SOURCE: &str = "application::share";
        match err {
            ShareError::PostNotFound => ApiError::not_found(SOURCE, "Post not found"),
            ShareError::Validation(fields) => ApiError::validation(SOURCE, fields),
            ShareError::Mail(MailError::Unavailable(_)) => ApiError::new(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                codes::MAIL_UNAVAILABLE,
                "Mail transport unavailable",
            )
            .with_detail(&err),
            ShareError::Repo(repo) => repo_to_api(SOURCE, repo),
            other => internal(SOURCE, &other),
        }
    }
}

impl From<AuthoringError> for ApiError {
    fn from(err: AuthoringError) -> Self {
        const SOURCE: &str = "application::authoring";
        match err {
            AuthoringError::NotFound { .. } => ApiError::not_found(SOURCE, "Post not found"),
            AuthoringError::Validation(fields) => ApiError::validation(SOURCE, fields),
            AuthoringError::Transition(ref inner) => ApiError::new(
                SOURCE,
                StatusCode::CONFLICT,
                codes::CONFLICT,
                "Invalid status transition",
            )
            .with_hint(inner.to_string()),
            AuthoringError::Timezone(ref inner) => internal(SOURCE, inner),
            AuthoringError::Repo(repo) => repo_to_api(SOURCE, repo),
        }
    }
}
