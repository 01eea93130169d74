/// Task model and database operations
///
/// Tasks belong to exactly one project. `created_by_id` records who created
/// the task and is never changed; `assigned_to_id` is optional.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     title TEXT NOT NULL,
///     description TEXT,
///     status TEXT NOT NULL DEFAULT 'todo',
///     priority TEXT NOT NULL DEFAULT 'medium',
///     assigned_to_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_by_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{contains_ignore_case, sql_contains, SortOrder, TimeRange};

/// Status assigned when the client doesn't provide one
pub const DEFAULT_STATUS: &str = "todo";

/// Priority assigned when the client doesn't provide one
pub const DEFAULT_PRIORITY: &str = "medium";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,

    pub project_id: Uuid,

    pub title: String,

    pub description: Option<String>,

    pub status: String,

    pub priority: String,

    pub assigned_to_id: Option<Uuid>,

    pub created_by_id: Uuid,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub assigned_to_id: Option<Uuid>,
    pub created_by_id: Uuid,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to_id: Option<Uuid>,
}

/// Filters for task listings; every field left unset matches everything
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Case-insensitive substring of the title or the description. Only the
    /// description is searched when `title` is also set.
    pub search: Option<String>,

    /// Exact title
    pub title: Option<String>,

    pub status: Option<String>,

    pub priority: Option<String>,

    /// Takes precedence over `unassigned`
    pub assigned_to_id: Option<Uuid>,

    /// `Some(true)`: only unassigned tasks; `Some(false)`: only assigned ones
    pub unassigned: Option<bool>,

    pub created_by_id: Option<Uuid>,

    pub created: TimeRange,

    pub updated: TimeRange,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        let assignment = match (self.assigned_to_id, self.unassigned) {
            (Some(id), _) => task.assigned_to_id == Some(id),
            (None, Some(true)) => task.assigned_to_id.is_none(),
            (None, Some(false)) => task.assigned_to_id.is_some(),
            (None, None) => true,
        };

        self.matches_search(task)
            && assignment
            && self.title.as_ref().map_or(true, |t| &task.title == t)
            && self.status.as_ref().map_or(true, |s| &task.status == s)
            && self.priority.as_ref().map_or(true, |p| &task.priority == p)
            && self.created_by_id.map_or(true, |id| task.created_by_id == id)
            && self.created.contains(task.created_at)
            && self.updated.contains(task.updated_at)
    }

    fn matches_search(&self, task: &Task) -> bool {
        let Some(needle) = self.search.as_deref() else {
            return true;
        };

        let in_description = task
            .description
            .as_deref()
            .is_some_and(|d| contains_ignore_case(d, needle));
        in_description || (self.title.is_none() && contains_ignore_case(&task.title, needle))
    }
}

/// Columns a task listing may be sorted on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskSortField {
    Title,
    Status,
    Priority,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl TaskSortField {
    /// Accepts the camelCase API names; anything else is `None`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "title" => Some(TaskSortField::Title),
            "status" => Some(TaskSortField::Status),
            "priority" => Some(TaskSortField::Priority),
            "createdAt" => Some(TaskSortField::CreatedAt),
            "updatedAt" => Some(TaskSortField::UpdatedAt),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            TaskSortField::Title => "title",
            TaskSortField::Status => "status",
            TaskSortField::Priority => "priority",
            TaskSortField::CreatedAt => "created_at",
            TaskSortField::UpdatedAt => "updated_at",
        }
    }
}

/// Task listing order; newest first by default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSort {
    pub field: TaskSortField,
    pub order: SortOrder,
}

impl Default for TaskSort {
    fn default() -> Self {
        Self {
            field: TaskSortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl TaskSort {
    /// Ascending comparison on the sort field, before `order` is applied
    fn compare_field(&self, a: &Task, b: &Task) -> Ordering {
        match self.field {
            TaskSortField::Title => a.title.cmp(&b.title),
            TaskSortField::Status => a.status.cmp(&b.status),
            TaskSortField::Priority => a.priority.cmp(&b.priority),
            TaskSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            TaskSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }
    }

    /// Orders tasks given oldest first; ties keep creation order, reversed
    /// for descending sorts
    pub fn sort(&self, tasks: &mut Vec<Task>) {
        tasks.sort_by(|a, b| self.compare_field(a, b));
        if self.order == SortOrder::Desc {
            tasks.reverse();
        }
    }

    fn order_by(&self) -> String {
        let direction = self.order.as_sql();
        match self.field {
            TaskSortField::CreatedAt => format!("created_at {}", direction),
            field => format!("{} {}, created_at {}", field.column(), direction, direction),
        }
    }
}

/// WHERE clause shared by the task listing and its count; `$1` is the
/// project, `$2..=$12` the filter fields in declaration order
fn task_filter_sql() -> String {
    format!(
        r#"
        WHERE project_id = $1
          AND ($2::text IS NULL OR {search_description}
               OR ($3::text IS NULL AND {search_title}))
          AND ($3::text IS NULL OR title = $3)
          AND ($4::text IS NULL OR status = $4)
          AND ($5::text IS NULL OR priority = $5)
          AND (CASE
                 WHEN $6::uuid IS NOT NULL THEN assigned_to_id = $6
                 WHEN $7::bool IS NULL THEN TRUE
                 WHEN $7 THEN assigned_to_id IS NULL
                 ELSE assigned_to_id IS NOT NULL
               END)
          AND ($8::uuid IS NULL OR created_by_id = $8)
          AND ($9::timestamptz IS NULL OR created_at >= $9)
          AND ($10::timestamptz IS NULL OR created_at <= $10)
          AND ($11::timestamptz IS NULL OR updated_at >= $11)
          AND ($12::timestamptz IS NULL OR updated_at <= $12)
        "#,
        search_description = sql_contains("COALESCE(description, '')", 2),
        search_title = sql_contains("title", 2),
    )
}

impl Task {
    pub async fn create(pool: &PgPool, data: NewTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (project_id, title, description, status, priority,
                               assigned_to_id, created_by_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, project_id, title, description, status, priority,
                      assigned_to_id, created_by_id, created_at, updated_at
            "#,
        )
        .bind(data.project_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.assigned_to_id)
        .bind(data.created_by_id)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, project_id, title, description, status, priority,
                   assigned_to_id, created_by_id, created_at, updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Lists a project's filtered tasks in `sort` order, with the total count
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: Uuid,
        filter: &TaskFilter,
        sort: TaskSort,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let where_clause = task_filter_sql();

        let select = format!(
            r#"
            SELECT id, project_id, title, description, status, priority,
                   assigned_to_id, created_by_id, created_at, updated_at
            FROM tasks
            {}
            ORDER BY {}
            LIMIT $13 OFFSET $14
            "#,
            where_clause,
            sort.order_by(),
        );
        let tasks = sqlx::query_as::<_, Task>(&select)
            .bind(project_id)
            .bind(filter.search.as_deref())
            .bind(filter.title.as_deref())
            .bind(filter.status.as_deref())
            .bind(filter.priority.as_deref())
            .bind(filter.assigned_to_id)
            .bind(filter.unassigned)
            .bind(filter.created_by_id)
            .bind(filter.created.after)
            .bind(filter.created.before)
            .bind(filter.updated.after)
            .bind(filter.updated.before)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        let count = format!("SELECT COUNT(*) FROM tasks {}", where_clause);
        let total: i64 = sqlx::query_scalar(&count)
            .bind(project_id)
            .bind(filter.search.as_deref())
            .bind(filter.title.as_deref())
            .bind(filter.status.as_deref())
            .bind(filter.priority.as_deref())
            .bind(filter.assigned_to_id)
            .bind(filter.unassigned)
            .bind(filter.created_by_id)
            .bind(filter.created.after)
            .bind(filter.created.before)
            .bind(filter.updated.after)
            .bind(filter.updated.before)
            .fetch_one(pool)
            .await?;

        Ok((tasks, total))
    }

    pub async fn update(pool: &PgPool, id: Uuid, data: UpdateTask) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                status = COALESCE($4, status),
                priority = COALESCE($5, priority),
                assigned_to_id = COALESCE($6, assigned_to_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, project_id, title, description, status, priority,
                      assigned_to_id, created_by_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.assigned_to_id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
