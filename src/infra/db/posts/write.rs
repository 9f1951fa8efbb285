use async_trait::async_trait;
use sqlx::{PgConnection, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, NewTag, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{PostRecord, TagRecord};
use crate::domain::types::PostStatus;

use super::super::tags::link_tags;
use super::super::{POST_SELECT, PostgresRepositories};
use super::types::PostRow;
use crate::infra::db::map_sqlx_error;

async fn fetch_post(conn: &mut PgConnection, id: Uuid) -> Result<PostRecord, sqlx::Error> {
    let mut qb = QueryBuilder::new(POST_SELECT);
    qb.push(" WHERE p.id = ");
    qb.push_bind(id);
    let row = qb.build_query_as::<PostRow>().fetch_one(conn).await?;
    Ok(PostRecord::from(row))
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            title,
            slug,
            author_id,
            body,
            publish,
            status,
            tags,
        } = params;

        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, title, slug, author_id, body, publish, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(slug)
        .bind(author_id)
        .bind(body)
        .bind(publish)
        .bind(status)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        link_tags(&mut tx, id, &tags).await.map_err(map_sqlx_error)?;
        let post = fetch_post(&mut tx, id).await.map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE posts
            SET title = $2, slug = $3, body = $4, publish = $5, updated_at = now()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(params.id)
        .bind(params.title)
        .bind(params.slug)
        .bind(params.body)
        .bind(params.publish)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let post = fetch_post(&mut tx, params.id)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(post)
    }

    async fn update_post_status(
        &self,
        id: Uuid,
        status: PostStatus,
    ) -> Result<PostRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query_scalar::<_, Uuid>(
            "UPDATE posts SET status = $2, updated_at = now() WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(status)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let post = fetch_post(&mut tx, id).await.map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(post)
    }

    async fn replace_post_tags(
        &self,
        post_id: Uuid,
        tags: &[NewTag],
    ) -> Result<Vec<TagRecord>, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let linked = link_tags(&mut tx, post_id, tags)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(linked)
    }
}
