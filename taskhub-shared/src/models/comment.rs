/// Comment model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE comments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     author_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     content TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{contains_ignore_case, sql_contains, SortOrder, TimeRange};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,

    pub task_id: Uuid,

    pub author_id: Uuid,

    pub content: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
}

/// Filters for comment listings
#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    /// Case-insensitive substring of the content
    pub search: Option<String>,

    pub author_id: Option<Uuid>,

    /// Everybody but this author
    pub exclude_author_id: Option<Uuid>,

    pub created: TimeRange,

    pub updated: TimeRange,
}

impl CommentFilter {
    pub fn matches(&self, comment: &Comment) -> bool {
        self.search
            .as_deref()
            .map_or(true, |needle| contains_ignore_case(&comment.content, needle))
            && self.author_id.map_or(true, |id| comment.author_id == id)
            && self.exclude_author_id.map_or(true, |id| comment.author_id != id)
            && self.created.contains(comment.created_at)
            && self.updated.contains(comment.updated_at)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommentSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl CommentSortField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "createdAt" => Some(CommentSortField::CreatedAt),
            "updatedAt" => Some(CommentSortField::UpdatedAt),
            _ => None,
        }
    }
}

/// Comment listing order; oldest first by default, like a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSort {
    pub field: CommentSortField,
    pub order: SortOrder,
}

impl Default for CommentSort {
    fn default() -> Self {
        Self {
            field: CommentSortField::CreatedAt,
            order: SortOrder::Asc,
        }
    }
}

impl CommentSort {
    /// Orders comments given oldest first
    pub fn sort(&self, comments: &mut Vec<Comment>) {
        if self.field == CommentSortField::UpdatedAt {
            comments.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        }
        if self.order == SortOrder::Desc {
            comments.reverse();
        }
    }

    fn order_by(&self) -> String {
        let direction = self.order.as_sql();
        match self.field {
            CommentSortField::CreatedAt => format!("created_at {}", direction),
            CommentSortField::UpdatedAt => format!("updated_at {}, created_at {}", direction, direction),
        }
    }
}

/// WHERE clause shared by the comment listing and its count
fn comment_filter_sql() -> String {
    format!(
        r#"
        WHERE task_id = $1
          AND ($2::text IS NULL OR {search})
          AND ($3::uuid IS NULL OR author_id = $3)
          AND ($4::uuid IS NULL OR author_id <> $4)
          AND ($5::timestamptz IS NULL OR created_at >= $5)
          AND ($6::timestamptz IS NULL OR created_at <= $6)
          AND ($7::timestamptz IS NULL OR updated_at >= $7)
          AND ($8::timestamptz IS NULL OR updated_at <= $8)
        "#,
        search = sql_contains("content", 2),
    )
}

impl Comment {
    pub async fn create(pool: &PgPool, data: NewComment) -> Result<Self, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (task_id, author_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, task_id, author_id, content, created_at, updated_at
            "#,
        )
        .bind(data.task_id)
        .bind(data.author_id)
        .bind(data.content)
        .fetch_one(pool)
        .await?;

        Ok(comment)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, task_id, author_id, content, created_at, updated_at
            FROM comments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(comment)
    }

    /// Lists a task's filtered comments in `sort` order, with the total count
    pub async fn list_by_task(
        pool: &PgPool,
        task_id: Uuid,
        filter: &CommentFilter,
        sort: CommentSort,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let where_clause = comment_filter_sql();

        let select = format!(
            r#"
            SELECT id, task_id, author_id, content, created_at, updated_at
            FROM comments
            {}
            ORDER BY {}
            LIMIT $9 OFFSET $10
            "#,
            where_clause,
            sort.order_by(),
        );
        let comments = sqlx::query_as::<_, Comment>(&select)
            .bind(task_id)
            .bind(filter.search.as_deref())
            .bind(filter.author_id)
            .bind(filter.exclude_author_id)
            .bind(filter.created.after)
            .bind(filter.created.before)
            .bind(filter.updated.after)
            .bind(filter.updated.before)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        let count = format!("SELECT COUNT(*) FROM comments {}", where_clause);
        let total: i64 = sqlx::query_scalar(&count)
            .bind(task_id)
            .bind(filter.search.as_deref())
            .bind(filter.author_id)
            .bind(filter.exclude_author_id)
            .bind(filter.created.after)
            .bind(filter.created.before)
            .bind(filter.updated.after)
            .bind(filter.updated.before)
            .fetch_one(pool)
            .await?;

        Ok((comments, total))
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
