//! Postgres-backed repository implementations.

mod authors;
mod comments;
mod posts;
mod tags;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query, query_scalar,
};

use crate::application::repos::{PostQueryFilter, RepoError};
use crate::domain::types::PostStatus;

/// Post columns joined with the author's display name. Callers append `WHERE 1=1` clauses.
const POST_SELECT: &str = "SELECT p.id, p.title, p.slug, p.author_id, \
    a.display_name AS author_name, p.body, p.publish, p.created_at, p.updated_at, p.status \
    FROM posts p INNER JOIN authors a ON a.id = p.author_id";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Whether `language` names a text-search configuration known to the server.
    pub async fn search_language_exists(&self, language: &str) -> Result<bool, sqlx::Error> {
        query_scalar("SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_ts_config WHERE cfgname = $1)")
            .bind(language)
            .fetch_one(self.pool())
            .await
    }

    /// The one place the anonymous-reader visibility rule is expressed in SQL.
    fn push_published_predicate(qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" AND p.status = ");
        qb.push_bind(PostStatus::Published);
    }

    fn apply_tag_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q PostQueryFilter) {
        if let Some(tag) = filter.tag.as_ref() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM post_tags pt INNER JOIN tags t ON t.id = pt.tag_id \
                 WHERE pt.post_id = p.id AND t.slug = ",
            );
            qb.push_bind(tag);
            qb.push(")");
        }
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}
