//! Slug derivation for posts and tags.
//!
//! Slugs are ASCII, lowercase-by-derivation and limited to letters, digits,
//! hyphens and underscores. Authors may supply their own slug as long as it
//! stays inside that alphabet.

use std::future::Future;

use slug::slugify;
use thiserror::Error;

pub const MAX_SLUG_LEN: usize = 250;
const MAX_SUFFIX_ATTEMPTS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a slug from human-readable text, truncated to [`MAX_SLUG_LEN`].
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let mut candidate = slugify(input);
    if candidate.len() > MAX_SLUG_LEN {
        candidate.truncate(MAX_SLUG_LEN);
        while candidate.ends_with('-') {
            candidate.pop();
        }
    }

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_SLUG_LEN
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

/// Derive a slug and retry with `-2`, `-3`, … until `is_free` accepts one.
pub async fn generate_unique_slug_async<F, Fut, E>(
    input: &str,
    mut is_free: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_free(base.clone())
        .await
        .map_err(SlugAsyncError::Predicate)?
    {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let suffix = format!("-{attempt}");
        let mut stem = base.clone();
        stem.truncate(MAX_SLUG_LEN - suffix.len());
        let candidate = format!("{stem}{suffix}");
        if is_free(candidate.clone())
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[test]
    fn derive_slug_lowercases_and_hyphenates() {
        assert_eq!(derive_slug("Hello World!").unwrap(), "hello-world");
        assert_eq!(derive_slug("  Rust & Postgres ").unwrap(), "rust-postgres");
    }

    #[test]
    fn derive_slug_transliterates_accents() {
        assert_eq!(derive_slug("Búsqueda en español").unwrap(), "busqueda-en-espanol");
    }

    #[test]
    fn derive_slug_rejects_blank_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn derive_slug_respects_length_limit() {
        let long = "word ".repeat(100);
        let slug = derive_slug(&long).unwrap();
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn slug_alphabet_is_enforced() {
        assert!(is_valid_slug("hello-world_2"));
        assert!(!is_valid_slug("hello world"));
        assert!(!is_valid_slug("hola/mundo"));
        assert!(!is_valid_slug(""));
    }

    #[tokio::test]
    async fn unique_slug_appends_counter() {
        let taken = ["hello-world".to_string(), "hello-world-2".to_string()];
        let slug = generate_unique_slug_async("Hello World", |candidate| {
            let free = !taken.contains(&candidate);
            async move { Ok::<_, Infallible>(free) }
        })
        .await
        .expect("slug generated");

        assert_eq!(slug, "hello-world-3");
    }
}
