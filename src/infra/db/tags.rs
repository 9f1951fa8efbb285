use async_trait::async_trait;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    application::repos::{NewTag, RepoError, TagsRepo},
    domain::entities::TagRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TagRow {
    id: Uuid,
    name: String,
    slug: String,
}

impl From<TagRow> for TagRecord {
    fn from(row: TagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostTagRow {
    post_id: Uuid,
    #[sqlx(flatten)]
    tag: TagRow,
}

/// Attach `tags` to a post, creating any tag whose slug is not known yet.
/// Existing links are left alone; callers clear them first when replacing.
pub(super) async fn link_tags(
    conn: &mut PgConnection,
    post_id: Uuid,
    tags: &[NewTag],
) -> Result<Vec<TagRecord>, sqlx::Error> {
    let mut linked = Vec::with_capacity(tags.len());
    for tag in tags {
        sqlx::query("INSERT INTO tags (id, name, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
            .bind(Uuid::new_v4())
            .bind(&tag.name)
            .bind(&tag.slug)
            .execute(&mut *conn)
            .await?;

        let row = sqlx::query_as::<_, TagRow>("SELECT id, name, slug FROM tags WHERE slug = $1")
            .bind(&tag.slug)
            .fetch_one(&mut *conn)
            .await?;

        sqlx::query(
            "INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(row.id)
        .execute(&mut *conn)
        .await?;

        linked.push(TagRecord::from(row));
    }
    linked.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(linked)
}

#[async_trait]
impl TagsRepo for PostgresRepositories {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError> {
        let row = sqlx::query_as::<_, TagRow>("SELECT id, name, slug FROM tags WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(TagRecord::from))
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TagRow>(
            r#"
            SELECT t.id, t.name, t.slug
            FROM tags t
            INNER JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = $1
            ORDER BY t.name ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TagRecord::from).collect())
    }

    async fn list_for_posts(
        &self,
        post_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, TagRecord)>, RepoError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, PostTagRow>(
            r#"
            SELECT pt.post_id, t.id, t.name, t.slug
            FROM tags t
            INNER JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = ANY($1)
            ORDER BY pt.post_id, t.name ASC
            "#,
        )
        .bind(post_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.post_id, TagRecord::from(row.tag)))
            .collect())
    }
}
