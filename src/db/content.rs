use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{DBClient, page_offset};
use crate::models::{
    Approval, ApprovalState, Category, ContentBody, ContentItem, ContentKind, PrincipalKind,
    Submitter,
};

/// Listing filter; every `None` field is "don't care"
#[derive(Debug, Default, Clone)]
pub struct ContentFilter {
    pub kind: Option<ContentKind>,
    pub approval_state: Option<ApprovalState>,
    pub owner_id: Option<Uuid>,
    pub category: Option<Category>,
    /// Case-insensitive substring
    pub location: Option<String>,
    pub reporter_code: Option<String>,
    /// Case-insensitive substring of title or body
    pub search: Option<String>,
}

/// Number of items of one kind in one approval state
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct StateCount {
    pub kind: ContentKind,
    pub approval_state: ApprovalState,
    pub count: i64,
}

/// Content store operations
///
/// Futures are `Send` so the moderation workflow can stay generic over
/// the store and still run inside axum handlers.
pub trait ContentExt: Send + Sync {
    fn insert_content(
        &self,
        item: &ContentItem,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn get_content(
        &self,
        kind: ContentKind,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<ContentItem>, sqlx::Error>> + Send;

    /// Overwrites every mutable column; last writer wins.
    /// `RowNotFound` if the item no longer exists.
    fn update_content(
        &self,
        item: &ContentItem,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Hard delete. `RowNotFound` if nothing was deleted.
    fn delete_content(
        &self,
        kind: ContentKind,
        id: Uuid,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Trending items are ordered by score first, everything else newest first
    fn list_content(
        &self,
        filter: &ContentFilter,
        page: i64,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<ContentItem>, sqlx::Error>> + Send;

    fn count_content(
        &self,
        filter: &ContentFilter,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    fn content_state_counts(&self)
    -> impl Future<Output = Result<Vec<StateCount>, sqlx::Error>> + Send;
}

/// Flat row of the `content_items` table
#[derive(Debug, sqlx::FromRow)]
struct ContentRow {
    id: Uuid,
    kind: ContentKind,
    title: String,
    category: Category,
    location: String,
    thumbnail_url: Option<String>,
    body_text: String,
    video_url: Option<String>,
    duration: Option<String>,
    trending_score: Option<i32>,
    submitter_kind: PrincipalKind,
    submitter_id: Uuid,
    submitter_name: String,
    submitter_reporter_code: Option<String>,
    approval_state: ApprovalState,
    rejection_reason: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContentRow> for ContentItem {
    type Error = sqlx::Error;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| {
            sqlx::Error::Decode(format!("content item {}: {}", row.id, what).into())
        };

        let body = match row.kind {
            ContentKind::Article => ContentBody::Article {
                content: row.body_text,
            },
            ContentKind::Trending => ContentBody::Trending {
                content: row.body_text,
                trending_score: row.trending_score.unwrap_or(0),
            },
            ContentKind::Video => ContentBody::Video {
                description: row.body_text,
                video_url: row.video_url.ok_or_else(|| corrupt("video without video_url"))?,
                duration: row.duration,
            },
        };

        let submitter = match (row.submitter_kind, row.submitter_reporter_code) {
            (PrincipalKind::Admin, None) => Submitter::Admin {
                id: row.submitter_id,
                name: row.submitter_name,
            },
            (PrincipalKind::Reporter, Some(reporter_code)) => Submitter::Reporter {
                id: row.submitter_id,
                name: row.submitter_name,
                reporter_code,
            },
            _ => return Err(corrupt("inconsistent submitter")),
        };

        Ok(ContentItem {
            id: row.id,
            title: row.title,
            category: row.category,
            location: row.location,
            thumbnail_url: row.thumbnail_url,
            body,
            submitter,
            approval: Approval::from_parts(row.approval_state, row.rejection_reason),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Columns shared by insert and update, split out of the item's sum types
struct BodyColumns<'a> {
    text: &'a str,
    video_url: Option<&'a str>,
    duration: Option<&'a str>,
    trending_score: Option<i32>,
}

fn body_columns(body: &ContentBody) -> BodyColumns<'_> {
    match body {
        ContentBody::Article { content } => BodyColumns {
            text: content,
            video_url: None,
            duration: None,
            trending_score: None,
        },
        ContentBody::Trending {
            content,
            trending_score,
        } => BodyColumns {
            text: content,
            video_url: None,
            duration: None,
            trending_score: Some(*trending_score),
        },
        ContentBody::Video {
            description,
            video_url,
            duration,
        } => BodyColumns {
            text: description,
            video_url: Some(video_url),
            duration: duration.as_deref(),
            trending_score: None,
        },
    }
}

const FILTER_CLAUSE: &str = r#"
    ($1::content_kind IS NULL OR kind = $1)
    AND ($2::approval_state IS NULL OR approval_state = $2)
    AND ($3::uuid IS NULL OR submitter_id = $3)
    AND ($4::news_category IS NULL OR category = $4)
    AND ($5::text IS NULL OR location ILIKE $5 ESCAPE '\')
    AND ($6::text IS NULL OR submitter_reporter_code = $6)
    AND ($7::text IS NULL OR title ILIKE $7 ESCAPE '\' OR body_text ILIKE $7 ESCAPE '\')
"#;

/// `ILIKE` pattern matching `needle` literally anywhere in the column
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl ContentExt for DBClient {
    async fn insert_content(&self, item: &ContentItem) -> Result<(), sqlx::Error> {
        let cols = body_columns(&item.body);

        sqlx::query(
            r#"
            INSERT INTO content_items (
                id, kind, title, category, location, thumbnail_url,
                body_text, video_url, duration, trending_score,
                submitter_kind, submitter_id, submitter_name, submitter_reporter_code,
                approval_state, rejection_reason, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(item.id)
        .bind(item.kind())
        .bind(&item.title)
        .bind(item.category)
        .bind(&item.location)
        .bind(item.thumbnail_url.as_deref())
        .bind(cols.text)
        .bind(cols.video_url)
        .bind(cols.duration)
        .bind(cols.trending_score)
        .bind(item.submitter.kind())
        .bind(item.submitter.id())
        .bind(item.submitter.name())
        .bind(item.submitter.reporter_code())
        .bind(item.approval.state())
        .bind(item.approval.rejection_reason())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_content(
        &self,
        kind: ContentKind,
        id: Uuid,
    ) -> Result<Option<ContentItem>, sqlx::Error> {
        let row = sqlx::query_as::<_, ContentRow>(
            "SELECT * FROM content_items WHERE id = $1 AND kind = $2",
        )
        .bind(id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ContentItem::try_from).transpose()
    }

    async fn update_content(&self, item: &ContentItem) -> Result<(), sqlx::Error> {
        let cols = body_columns(&item.body);

        // Submitter and created_at are fixed at submission
        let result = sqlx::query(
            r#"
            UPDATE content_items
            SET title = $1, category = $2, location = $3, thumbnail_url = $4,
                body_text = $5, video_url = $6, duration = $7, trending_score = $8,
                approval_state = $9, rejection_reason = $10, updated_at = $11
            WHERE id = $12 AND kind = $13
            "#,
        )
        .bind(&item.title)
        .bind(item.category)
        .bind(&item.location)
        .bind(item.thumbnail_url.as_deref())
        .bind(cols.text)
        .bind(cols.video_url)
        .bind(cols.duration)
        .bind(cols.trending_score)
        .bind(item.approval.state())
        .bind(item.approval.rejection_reason())
        .bind(item.updated_at)
        .bind(item.id)
        .bind(item.kind())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn delete_content(&self, kind: ContentKind, id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM content_items WHERE id = $1 AND kind = $2")
            .bind(id)
            .bind(kind)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn list_content(
        &self,
        filter: &ContentFilter,
        page: i64,
        limit: i64,
    ) -> Result<Vec<ContentItem>, sqlx::Error> {
        let offset = page_offset(page, limit);
        let order = if filter.kind == Some(ContentKind::Trending) {
            "trending_score DESC, created_at DESC"
        } else {
            "created_at DESC"
        };
        let sql = format!(
            "SELECT * FROM content_items WHERE {} ORDER BY {} LIMIT $8 OFFSET $9",
            FILTER_CLAUSE, order
        );

        let rows = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(filter.kind)
            .bind(filter.approval_state)
            .bind(filter.owner_id)
            .bind(filter.category)
            .bind(filter.location.as_deref().map(contains_pattern))
            .bind(filter.reporter_code.as_deref())
            .bind(filter.search.as_deref().map(contains_pattern))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ContentItem::try_from).collect()
    }

    async fn count_content(&self, filter: &ContentFilter) -> Result<i64, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM content_items WHERE {}", FILTER_CLAUSE);

        sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.kind)
            .bind(filter.approval_state)
            .bind(filter.owner_id)
            .bind(filter.category)
            .bind(filter.location.as_deref().map(contains_pattern))
            .bind(filter.reporter_code.as_deref())
            .bind(filter.search.as_deref().map(contains_pattern))
            .fetch_one(&self.pool)
            .await
    }

    async fn content_state_counts(&self) -> Result<Vec<StateCount>, sqlx::Error> {
        sqlx::query_as::<_, StateCount>(
            r#"
            SELECT kind, approval_state, COUNT(*) AS count
            FROM content_items
            GROUP BY kind, approval_state
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}
