use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::application::pagination::PageSlice;
use crate::application::repos::{
    CommentedPost, DayRange, PostQueryFilter, PostsRepo, RankedPost, RepoError, SearchQuery,
    SimilarPost,
};
use crate::domain::entities::PostRecord;

use super::super::{POST_SELECT, PostgresRepositories};
use super::types::{CommentedPostRow, PostRow, RankedPostRow, SimilarPostRow};
use crate::infra::db::map_sqlx_error;

impl PostgresRepositories {
    /// Title outranks body: weight `A` for the title, `B` for the body.
    fn push_search_document<'q>(qb: &mut QueryBuilder<'q, Postgres>, language: &'q str) {
        qb.push("(setweight(to_tsvector(CAST(");
        qb.push_bind(language);
        qb.push(" AS regconfig), p.title), 'A') || setweight(to_tsvector(CAST(");
        qb.push_bind(language);
        qb.push(" AS regconfig), p.body), 'B'))");
    }

    fn push_search_query<'q>(qb: &mut QueryBuilder<'q, Postgres>, query: &'q SearchQuery) {
        qb.push("plainto_tsquery(CAST(");
        qb.push_bind(query.language.as_str());
        qb.push(" AS regconfig), ");
        qb.push_bind(query.text.as_str());
        qb.push(")");
    }

    fn push_search_match<'q>(qb: &mut QueryBuilder<'q, Postgres>, query: &'q SearchQuery) {
        qb.push(" AND ");
        Self::push_search_document(qb, query.language.as_str());
        qb.push(" @@ ");
        Self::push_search_query(qb, query);
    }

    fn push_slice(qb: &mut QueryBuilder<'_, Postgres>, slice: PageSlice) -> Result<(), RepoError> {
        let offset = i64::try_from(slice.offset)
            .map_err(|_| RepoError::from_persistence("page offset exceeds supported range"))?;
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(slice.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_published(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::push_published_predicate(&mut qb);
        Self::apply_tag_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_published(
        &self,
        filter: &PostQueryFilter,
        slice: PageSlice,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE 1=1 ");
        Self::push_published_predicate(&mut qb);
        Self::apply_tag_filter(&mut qb, filter);
        qb.push(" ORDER BY p.publish DESC, p.id DESC");
        Self::push_slice(&mut qb, slice)?;

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_published_on_day(
        &self,
        slug: &str,
        day: DayRange,
    ) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE p.slug = ");
        qb.push_bind(slug);
        qb.push(" AND p.publish >= ");
        qb.push_bind(day.start);
        qb.push(" AND p.publish < ");
        qb.push_bind(day.end);
        Self::push_published_predicate(&mut qb);
        qb.push(" ORDER BY p.publish DESC LIMIT 1");

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn similar_published(
        &self,
        post_id: Uuid,
        limit: u32,
    ) -> Result<Vec<SimilarPost>, RepoError> {
        let mut qb = QueryBuilder::new(
            "SELECT p.id, p.title, p.slug, p.author_id, a.display_name AS author_name, \
             p.body, p.publish, p.created_at, p.updated_at, p.status, \
             COUNT(*) AS shared_tags \
             FROM posts p \
             INNER JOIN authors a ON a.id = p.author_id \
             INNER JOIN post_tags pt ON pt.post_id = p.id \
             WHERE pt.tag_id IN (SELECT tag_id FROM post_tags WHERE post_id = ",
        );
        qb.push_bind(post_id);
        qb.push(") AND p.id <> ");
        qb.push_bind(post_id);
        Self::push_published_predicate(&mut qb);
        qb.push(
            " GROUP BY p.id, a.display_name \
             ORDER BY shared_tags DESC, p.publish DESC, p.id DESC LIMIT ",
        );
        qb.push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<SimilarPostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SimilarPost::from).collect())
    }

    async fn count_search_results(&self, query: &SearchQuery) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::push_published_predicate(&mut qb);
        Self::push_search_match(&mut qb, query);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn search_published(
        &self,
        query: &SearchQuery,
        slice: PageSlice,
    ) -> Result<Vec<RankedPost>, RepoError> {
        let mut qb = QueryBuilder::new(
            "SELECT p.id, p.title, p.slug, p.author_id, a.display_name AS author_name, \
             p.body, p.publish, p.created_at, p.updated_at, p.status, ts_rank(",
        );
        Self::push_search_document(&mut qb, query.language.as_str());
        qb.push(", ");
        Self::push_search_query(&mut qb, query);
        qb.push(") AS rank FROM posts p INNER JOIN authors a ON a.id = p.author_id WHERE 1=1 ");
        Self::push_published_predicate(&mut qb);
        Self::push_search_match(&mut qb, query);
        qb.push(" ORDER BY rank DESC, p.publish DESC, p.id DESC");
        Self::push_slice(&mut qb, slice)?;

        let rows = qb
            .build_query_as::<RankedPostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(RankedPost::from).collect())
    }

    async fn latest_published(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        self.list_published(
            &PostQueryFilter::default(),
            PageSlice {
                offset: 0,
                limit,
            },
        )
        .await
    }

    async fn most_commented(&self, limit: u32) -> Result<Vec<CommentedPost>, RepoError> {
        let mut qb = QueryBuilder::new(
            "SELECT p.id, p.title, p.slug, p.author_id, a.display_name AS author_name, \
             p.body, p.publish, p.created_at, p.updated_at, p.status, \
             COUNT(c.id) AS total_comments \
             FROM posts p \
             INNER JOIN authors a ON a.id = p.author_id \
             LEFT JOIN comments c ON c.post_id = p.id AND c.active \
             WHERE 1=1 ",
        );
        Self::push_published_predicate(&mut qb);
        qb.push(
            " GROUP BY p.id, a.display_name \
             ORDER BY total_comments DESC, p.publish DESC, p.id DESC LIMIT ",
        );
        qb.push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<CommentedPostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentedPost::from).collect())
    }

    async fn slug_taken(
        &self,
        slug: &str,
        day: DayRange,
        exclude: Option<Uuid>,
    ) -> Result<bool, RepoError> {
        let mut qb = QueryBuilder::new("SELECT EXISTS (SELECT 1 FROM posts p WHERE p.slug = ");
        qb.push_bind(slug);
        qb.push(" AND p.publish >= ");
        qb.push_bind(day.start);
        qb.push(" AND p.publish < ");
        qb.push_bind(day.end);
        if let Some(id) = exclude {
            qb.push(" AND p.id <> ");
            qb.push_bind(id);
        }
        qb.push(")");

        qb.build_query_scalar::<bool>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
