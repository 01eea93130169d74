/// Project model and database operations
///
/// A project has exactly one owner (`owner_id` is non-null). Deleting a
/// project cascades to its memberships, tasks and their comments.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL,
///     description TEXT,
///     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,

    pub name: String,

    pub description: Option<String>,

    /// The single owner of the project
    pub owner_id: Uuid,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating a project
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Which projects a list query may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectScope {
    /// Every project (global owners)
    All,

    /// Projects owned by, or shared with, the given user
    VisibleTo(Uuid),
}

/// Filters for project listings, applied within a [`ProjectScope`]
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// Case-insensitive substring of the name or the description
    pub search: Option<String>,

    /// Exact name
    pub name: Option<String>,

    pub owner_id: Option<Uuid>,

    /// Projects this user is a member of without owning them
    pub member_id: Option<Uuid>,

    pub created: TimeRange,

    pub updated: TimeRange,
}

impl ProjectFilter {
    /// `is_member` answers whether a user has a membership row in the project
    pub fn matches(&self, project: &Project, is_member: impl Fn(Uuid) -> bool) -> bool {
        let searched = self.search.as_deref().map_or(true, |needle| {
            contains_ignore_case(&project.name, needle)
                || project
                    .description
                    .as_deref()
                    .is_some_and(|d| contains_ignore_case(d, needle))
        });

        searched
            && self.name.as_ref().map_or(true, |n| &project.name == n)
            && self.owner_id.map_or(true, |id| project.owner_id == id)
            && self
                .member_id
                .map_or(true, |id| project.owner_id != id && is_member(id))
            && self.created.contains(project.created_at)
            && self.updated.contains(project.updated_at)
    }
}

/// Columns a project listing may be sorted on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProjectSortField {
    Name,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl ProjectSortField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "name" => Some(ProjectSortField::Name),
            "createdAt" => Some(ProjectSortField::CreatedAt),
            "updatedAt" => Some(ProjectSortField::UpdatedAt),
            _ => None,
        }
    }
}

/// Project listing order; newest first by default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectSort {
    pub field: ProjectSortField,
    pub order: SortOrder,
}

impl Default for ProjectSort {
    fn default() -> Self {
        Self {
            field: ProjectSortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl ProjectSort {
    /// Orders projects given oldest first
    pub fn sort(&self, projects: &mut Vec<Project>) {
        projects.sort_by(|a, b| -> Ordering {
            match self.field {
                ProjectSortField::Name => a.name.cmp(&b.name),
                ProjectSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                ProjectSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            }
        });
        if self.order == SortOrder::Desc {
            projects.reverse();
        }
    }

    fn order_by(&self) -> String {
        let direction = self.order.as_sql();
        match self.field {
            ProjectSortField::Name => format!("p.name {}, p.created_at {}", direction, direction),
            ProjectSortField::CreatedAt => format!("p.created_at {}", direction),
            ProjectSortField::UpdatedAt => format!("p.updated_at {}, p.created_at {}", direction, direction),
        }
    }
}

/// WHERE clause shared by the project listing and its count; `$1` is the
/// visibility user (NULL for every project), `$2..=$9` the filter fields
fn project_filter_sql() -> String {
    format!(
        r#"
        WHERE ($1::uuid IS NULL
               OR p.owner_id = $1
               OR EXISTS (
                    SELECT 1 FROM project_members m
                    WHERE m.project_id = p.id AND m.user_id = $1
               ))
          AND ($2::text IS NULL OR {search_name} OR {search_description})
          AND ($3::text IS NULL OR p.name = $3)
          AND ($4::uuid IS NULL OR p.owner_id = $4)
          AND ($5::uuid IS NULL OR (
                p.owner_id <> $5
                AND EXISTS (
                    SELECT 1 FROM project_members m
                    WHERE m.project_id = p.id AND m.user_id = $5
                )))
          AND ($6::timestamptz IS NULL OR p.created_at >= $6)
          AND ($7::timestamptz IS NULL OR p.created_at <= $7)
          AND ($8::timestamptz IS NULL OR p.updated_at >= $8)
          AND ($9::timestamptz IS NULL OR p.updated_at <= $9)
        "#,
        search_name = sql_contains("p.name", 2),
        search_description = sql_contains("COALESCE(p.description, '')", 2),
    )
}

impl Project {
    pub async fn create(pool: &PgPool, data: NewProject) -> Result<Self, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (name, description, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, owner_id, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.description)
        .bind(data.owner_id)
        .fetch_one(pool)
        .await?;

        Ok(project)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, description, owner_id, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    /// Returns only the owner id; cheaper than loading the whole row for
    /// authorization checks
    pub async fn find_owner(pool: &PgPool, id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        let owner_id: Option<Uuid> =
            sqlx::query_scalar("SELECT owner_id FROM projects WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;

        Ok(owner_id)
    }

    /// Lists filtered projects within `scope` in `sort` order, with the
    /// total count
    pub async fn list(
        pool: &PgPool,
        scope: ProjectScope,
        filter: &ProjectFilter,
        sort: ProjectSort,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let visible_to = match scope {
            ProjectScope::All => None,
            ProjectScope::VisibleTo(user_id) => Some(user_id),
        };
        let where_clause = project_filter_sql();

        let select = format!(
            r#"
            SELECT p.id, p.name, p.description, p.owner_id, p.created_at, p.updated_at
            FROM projects p
            {}
            ORDER BY {}
            LIMIT $10 OFFSET $11
            "#,
            where_clause,
            sort.order_by(),
        );
        let projects = sqlx::query_as::<_, Project>(&select)
            .bind(visible_to)
            .bind(filter.search.as_deref())
            .bind(filter.name.as_deref())
            .bind(filter.owner_id)
            .bind(filter.member_id)
            .bind(filter.created.after)
            .bind(filter.created.before)
            .bind(filter.updated.after)
            .bind(filter.updated.before)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        let count = format!("SELECT COUNT(*) FROM projects p {}", where_clause);
        let total: i64 = sqlx::query_scalar(&count)
            .bind(visible_to)
            .bind(filter.search.as_deref())
            .bind(filter.name.as_deref())
            .bind(filter.owner_id)
            .bind(filter.member_id)
            .bind(filter.created.after)
            .bind(filter.created.before)
            .bind(filter.updated.after)
            .bind(filter.updated.before)
            .fetch_one(pool)
            .await?;

        Ok((projects, total))
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, owner_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.description)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    /// Deletes a project; memberships, tasks and comments go with it
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(name: &str, description: Option<&str>, owner_id: Uuid) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            owner_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_search_covers_name_and_description() {
        let owner = Uuid::new_v4();
        let filter = ProjectFilter {
            search: Some("ROADMAP".to_string()),
            ..Default::default()
        };

        assert!(filter.matches(&project("Roadmap 2025", None, owner), |_| false));
        assert!(filter.matches(&project("Q3", Some("the roadmap"), owner), |_| false));
        assert!(!filter.matches(&project("Q3", None, owner), |_| false));
    }

    #[test]
    fn test_member_filter_excludes_owned_projects() {
        let user = Uuid::new_v4();
        let filter = ProjectFilter {
            member_id: Some(user),
            ..Default::default()
        };

        assert!(filter.matches(&project("Shared", None, Uuid::new_v4()), |id| id == user));
        assert!(!filter.matches(&project("Mine", None, user), |id| id == user));
        assert!(!filter.matches(&project("Foreign", None, Uuid::new_v4()), |_| false));
    }

    #[test]
    fn test_sort_by_name() {
        let owner = Uuid::new_v4();
        let mut projects = vec![project("b", None, owner), project("a", None, owner), project("c", None, owner)];

        ProjectSort {
            field: ProjectSortField::Name,
            order: SortOrder::Asc,
        }
        .sort(&mut projects);
        let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);

        assert_eq!(ProjectSortField::parse("owner"), None);
    }
}
