/// In-memory store
///
/// Keeps every table in a single `RwLock`-guarded struct so each trait call
/// is atomic, which is what the uniqueness guarantees rely on. Mirrors the
/// PostgreSQL schema:
///
/// - `users.email` is unique
/// - `(project_id, user_id)` is unique in memberships
/// - idempotency fingerprints are unique
/// - deleting a project removes its memberships, tasks and their comments
/// - deleting a task removes its comments
/// - references to missing rows fail with [`StoreError::ForeignKeyViolation`]
///
/// Listings filter and sort with the same model helpers the SQL queries
/// mirror. Users are listed newest first and memberships oldest first.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    comment::{Comment, CommentFilter, CommentSort, NewComment},
    idempotency::{IdempotencyRecord, NewIdempotencyRecord, StoredResponse},
    membership::{NewProjectMember, ProjectMember},
    project::{NewProject, Project, ProjectFilter, ProjectScope, ProjectSort, UpdateProject},
    task::{NewTask, Task, TaskFilter, TaskSort, UpdateTask},
    user::{NewUser, User},
    Page,
};

#[derive(Debug, Default)]
struct Tables {
    // Vecs keep insertion order, which stands in for `created_at` ordering
    users: Vec<User>,
    projects: Vec<Project>,
    members: Vec<ProjectMember>,
    tasks: Vec<Task>,
    comments: Vec<Comment>,
    idempotency: HashMap<String, IdempotencyRecord>,
}

impl Tables {
    fn user_exists(&self, id: Uuid) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    fn project_exists(&self, id: Uuid) -> bool {
        self.projects.iter().any(|p| p.id == id)
    }

    fn is_member(&self, project_id: Uuid, user_id: Uuid) -> bool {
        self.members
            .iter()
            .any(|m| m.project_id == project_id && m.user_id == user_id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Slices one page out of an already ordered listing
fn paginate<T: Clone>(items: Vec<T>, page: Page) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let rows = items
        .into_iter()
        .skip(offset)
        .take(page.limit as usize)
        .collect();
    (rows, total)
}

fn foreign_key(constraint: &str) -> StoreError {
    StoreError::ForeignKeyViolation(constraint.to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_user(&self, data: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == data.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: data.email,
            name: data.name,
            password_hash: data.password_hash,
            role: data.role,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, page: Page) -> StoreResult<(Vec<User>, u64)> {
        let tables = self.tables.read().await;
        let users = tables.users.iter().rev().cloned().collect();
        Ok(paginate(users, page))
    }

    async fn create_project(&self, data: NewProject) -> StoreResult<Project> {
        let mut tables = self.tables.write().await;
        if !tables.user_exists(data.owner_id) {
            return Err(foreign_key("projects_owner_id_fkey"));
        }

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: data.name,
            description: data.description,
            owner_id: data.owner_id,
            created_at: now,
            updated_at: now,
        };
        tables.projects.push(project.clone());
        Ok(project)
    }

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let tables = self.tables.read().await;
        Ok(tables.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn find_project_owner(&self, id: Uuid) -> StoreResult<Option<Uuid>> {
        let tables = self.tables.read().await;
        Ok(tables.projects.iter().find(|p| p.id == id).map(|p| p.owner_id))
    }

    async fn list_projects(
        &self,
        scope: ProjectScope,
        filter: &ProjectFilter,
        sort: ProjectSort,
        page: Page,
    ) -> StoreResult<(Vec<Project>, u64)> {
        let tables = self.tables.read().await;
        let mut projects: Vec<Project> = tables
            .projects
            .iter()
            .filter(|p| match scope {
                ProjectScope::All => true,
                ProjectScope::VisibleTo(user_id) => p.owner_id == user_id || tables.is_member(p.id, user_id),
            })
            .filter(|p| filter.matches(p, |user_id| tables.is_member(p.id, user_id)))
            .cloned()
            .collect();
        sort.sort(&mut projects);
        Ok(paginate(projects, page))
    }

    async fn update_project(&self, id: Uuid, data: UpdateProject) -> StoreResult<Option<Project>> {
        let mut tables = self.tables.write().await;
        let Some(project) = tables.projects.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        if let Some(name) = data.name {
            project.name = name;
        }
        if let Some(description) = data.description {
            project.description = Some(description);
        }
        project.updated_at = Utc::now();
        Ok(Some(project.clone()))
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.projects.len();
        tables.projects.retain(|p| p.id != id);
        if tables.projects.len() == before {
            return Ok(false);
        }

        let task_ids: Vec<Uuid> = tables
            .tasks
            .iter()
            .filter(|t| t.project_id == id)
            .map(|t| t.id)
            .collect();
        tables.comments.retain(|c| !task_ids.contains(&c.task_id));
        tables.tasks.retain(|t| t.project_id != id);
        tables.members.retain(|m| m.project_id != id);
        Ok(true)
    }

    async fn find_membership(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<Option<ProjectMember>> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .iter()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_memberships(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMember>> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .iter()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn create_membership(&self, data: NewProjectMember) -> StoreResult<ProjectMember> {
        let mut tables = self.tables.write().await;
        if !tables.project_exists(data.project_id) {
            return Err(foreign_key("project_members_project_id_fkey"));
        }
        if !tables.user_exists(data.user_id) {
            return Err(foreign_key("project_members_user_id_fkey"));
        }
        if tables
            .members
            .iter()
            .any(|m| m.project_id == data.project_id && m.user_id == data.user_id)
        {
            return Err(StoreError::UniqueViolation("project_members_pkey".to_string()));
        }

        let member = ProjectMember {
            project_id: data.project_id,
            user_id: data.user_id,
            role: data.role,
            created_at: Utc::now(),
        };
        tables.members.push(member.clone());
        Ok(member)
    }

    async fn delete_membership(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.members.len();
        tables
            .members
            .retain(|m| !(m.project_id == project_id && m.user_id == user_id));
        Ok(tables.members.len() < before)
    }

    async fn create_task(&self, data: NewTask) -> StoreResult<Task> {
        let mut tables = self.tables.write().await;
        if !tables.project_exists(data.project_id) {
            return Err(foreign_key("tasks_project_id_fkey"));
        }
        if !tables.user_exists(data.created_by_id) {
            return Err(foreign_key("tasks_created_by_id_fkey"));
        }
        if let Some(assignee) = data.assigned_to_id {
            if !tables.user_exists(assignee) {
                return Err(foreign_key("tasks_assigned_to_id_fkey"));
            }
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            project_id: data.project_id,
            title: data.title,
            description: data.description,
            status: data.status,
            priority: data.priority,
            assigned_to_id: data.assigned_to_id,
            created_by_id: data.created_by_id,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.push(task.clone());
        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks(
        &self,
        project_id: Uuid,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Page,
    ) -> StoreResult<(Vec<Task>, u64)> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .iter()
            .filter(|t| t.project_id == project_id && filter.matches(t))
            .cloned()
            .collect();
        sort.sort(&mut tasks);
        Ok(paginate(tasks, page))
    }

    async fn update_task(&self, id: Uuid, data: UpdateTask) -> StoreResult<Option<Task>> {
        let mut tables = self.tables.write().await;
        if let Some(assignee) = data.assigned_to_id {
            if !tables.user_exists(assignee) {
                return Err(foreign_key("tasks_assigned_to_id_fkey"));
            }
        }

        let Some(task) = tables.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };

        if let Some(title) = data.title {
            task.title = title;
        }
        if let Some(description) = data.description {
            task.description = Some(description);
        }
        if let Some(status) = data.status {
            task.status = status;
        }
        if let Some(priority) = data.priority {
            task.priority = priority;
        }
        if let Some(assignee) = data.assigned_to_id {
            task.assigned_to_id = Some(assignee);
        }
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.tasks.len();
        tables.tasks.retain(|t| t.id != id);
        if tables.tasks.len() == before {
            return Ok(false);
        }

        tables.comments.retain(|c| c.task_id != id);
        Ok(true)
    }

    async fn create_comment(&self, data: NewComment) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;
        if !tables.tasks.iter().any(|t| t.id == data.task_id) {
            return Err(foreign_key("comments_task_id_fkey"));
        }
        if !tables.user_exists(data.author_id) {
            return Err(foreign_key("comments_author_id_fkey"));
        }

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            task_id: data.task_id,
            author_id: data.author_id,
            content: data.content,
            created_at: now,
            updated_at: now,
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn list_comments(
        &self,
        task_id: Uuid,
        filter: &CommentFilter,
        sort: CommentSort,
        page: Page,
    ) -> StoreResult<(Vec<Comment>, u64)> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.task_id == task_id && filter.matches(c))
            .cloned()
            .collect();
        sort.sort(&mut comments);
        Ok(paginate(comments, page))
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.comments.len();
        tables.comments.retain(|c| c.id != id);
        Ok(tables.comments.len() < before)
    }

    async fn find_idempotency_record(&self, fingerprint: &str) -> StoreResult<Option<IdempotencyRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.idempotency.get(fingerprint).cloned())
    }

    async fn create_idempotency_record(&self, data: NewIdempotencyRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.user_exists(data.user_id) {
            return Err(foreign_key("idempotency_keys_user_id_fkey"));
        }
        if tables.idempotency.contains_key(&data.fingerprint) {
            return Err(StoreError::UniqueViolation("idempotency_keys_pkey".to_string()));
        }

        let record = IdempotencyRecord {
            fingerprint: data.fingerprint.clone(),
            claim_id: data.claim_id,
            user_id: data.user_id,
            method: data.method,
            path: data.path,
            response: None,
            expires_at: data.expires_at,
            created_at: Utc::now(),
        };
        tables.idempotency.insert(data.fingerprint, record);
        Ok(())
    }

    async fn complete_idempotency_record(
        &self,
        fingerprint: &str,
        claim_id: Uuid,
        response: &StoredResponse,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.idempotency.get_mut(fingerprint) {
            Some(record) if record.claim_id == claim_id && record.is_pending() => {
                record.response = Some(response.clone());
                record.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_idempotency_record(&self, fingerprint: &str, claim_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let held = tables
            .idempotency
            .get(fingerprint)
            .is_some_and(|r| r.claim_id == claim_id && r.is_pending());
        if held {
            tables.idempotency.remove(fingerprint);
        }
        Ok(held)
    }

    async fn purge_expired_idempotency_record(&self, fingerprint: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let expired = tables
            .idempotency
            .get(fingerprint)
            .is_some_and(|r| r.is_expired(now));
        if expired {
            tables.idempotency.remove(fingerprint);
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::GlobalRole;
    use chrono::Duration;

    async fn user(store: &MemoryStore, email: &str) -> User {
        store
            .create_user(NewUser {
                email: email.to_string(),
                name: "Test".to_string(),
                password_hash: "hash".to_string(),
                role: GlobalRole::Member,
            })
            .await
            .unwrap()
    }

    async fn project(store: &MemoryStore, owner_id: Uuid, name: &str) -> Project {
        store
            .create_project(NewProject {
                name: name.to_string(),
                description: None,
                owner_id,
            })
            .await
            .unwrap()
    }

    fn new_task(project_id: Uuid, created_by_id: Uuid, status: &str) -> NewTask {
        NewTask {
            project_id,
            title: "Task".to_string(),
            description: None,
            status: status.to_string(),
            priority: "medium".to_string(),
            assigned_to_id: None,
            created_by_id,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let store = MemoryStore::new();
        user(&store, "a@example.com").await;

        let err = store
            .create_user(NewUser {
                email: "a@example.com".to_string(),
                name: "Again".to_string(),
                password_hash: "hash".to_string(),
                role: GlobalRole::Member,
            })
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_duplicate_membership_is_unique_violation() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com").await;
        let member = user(&store, "member@example.com").await;
        let project = project(&store, owner.id, "P").await;

        let data = NewProjectMember {
            project_id: project.id,
            user_id: member.id,
            role: "developer".to_string(),
        };
        store.create_membership(data.clone()).await.unwrap();
        let err = store.create_membership(data).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_membership_for_missing_user_is_foreign_key_violation() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com").await;
        let project = project(&store, owner.id, "P").await;

        let err = store
            .create_membership(NewProjectMember {
                project_id: project.id,
                user_id: Uuid::new_v4(),
                role: "developer".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }

    #[tokio::test]
    async fn test_project_scope_includes_owned_and_shared() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice@example.com").await;
        let bob = user(&store, "bob@example.com").await;

        let owned = project(&store, alice.id, "Owned").await;
        let shared = project(&store, bob.id, "Shared").await;
        project(&store, bob.id, "Private").await;

        store
            .create_membership(NewProjectMember {
                project_id: shared.id,
                user_id: alice.id,
                role: "viewer".to_string(),
            })
            .await
            .unwrap();

        let (visible, total) = store
            .list_projects(
                ProjectScope::VisibleTo(alice.id),
                &ProjectFilter::default(),
                ProjectSort::default(),
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(total, 2);
        let ids: Vec<Uuid> = visible.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![shared.id, owned.id]);

        let (_, all) = store
            .list_projects(ProjectScope::All, &ProjectFilter::default(), ProjectSort::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(all, 3);

        // Shared with alice, not owned by her
        let member_of = ProjectFilter {
            member_id: Some(alice.id),
            ..Default::default()
        };
        let (visible, _) = store
            .list_projects(ProjectScope::VisibleTo(alice.id), &member_of, ProjectSort::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(visible.iter().map(|p| p.id).collect::<Vec<_>>(), vec![shared.id]);
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com").await;
        let member = user(&store, "member@example.com").await;
        let project = project(&store, owner.id, "P").await;

        store
            .create_membership(NewProjectMember {
                project_id: project.id,
                user_id: member.id,
                role: "developer".to_string(),
            })
            .await
            .unwrap();
        let task = store.create_task(new_task(project.id, owner.id, "todo")).await.unwrap();
        let comment = store
            .create_comment(NewComment {
                task_id: task.id,
                author_id: member.id,
                content: "hi".to_string(),
            })
            .await
            .unwrap();

        assert!(store.delete_project(project.id).await.unwrap());
        assert!(store.find_membership(project.id, member.id).await.unwrap().is_none());
        assert!(store.find_task(task.id).await.unwrap().is_none());
        assert!(store.find_comment(comment.id).await.unwrap().is_none());
        assert!(!store.delete_project(project.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_tasks_filters_and_paginates() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com").await;
        let project = project(&store, owner.id, "P").await;

        for status in ["todo", "done", "todo", "todo"] {
            store.create_task(new_task(project.id, owner.id, status)).await.unwrap();
        }

        let filter = TaskFilter {
            status: Some("todo".to_string()),
            ..Default::default()
        };
        let (tasks, total) = store
            .list_tasks(project.id, &filter, TaskSort::default(), Page::new(Some(2), Some(2)))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_list_tasks_searches_and_sorts() {
        use crate::models::{task::TaskSortField, SortOrder};

        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com").await;
        let project = project(&store, owner.id, "P").await;

        for (title, description) in [("Write docs", None), ("Fix bug", Some("Crash in the DOCS viewer")), ("Deploy", None)] {
            store
                .create_task(NewTask {
                    title: title.to_string(),
                    description: description.map(str::to_string),
                    ..new_task(project.id, owner.id, "todo")
                })
                .await
                .unwrap();
        }

        let search = TaskFilter {
            search: Some("docs".to_string()),
            ..Default::default()
        };
        let by_title = TaskSort {
            field: TaskSortField::Title,
            order: SortOrder::Asc,
        };
        let (tasks, total) = store
            .list_tasks(project.id, &search, by_title, Page::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["Fix bug", "Write docs"]);
    }

    #[tokio::test]
    async fn test_list_comments_filters_by_author_and_order() {
        use crate::models::SortOrder;

        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com").await;
        let member = user(&store, "member@example.com").await;
        let project = project(&store, owner.id, "P").await;
        let task = store.create_task(new_task(project.id, owner.id, "todo")).await.unwrap();

        for (author_id, content) in [(owner.id, "first"), (member.id, "second"), (owner.id, "third")] {
            store
                .create_comment(NewComment {
                    task_id: task.id,
                    author_id,
                    content: content.to_string(),
                })
                .await
                .unwrap();
        }

        let (all, _) = store
            .list_comments(task.id, &CommentFilter::default(), CommentSort::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(all.iter().map(|c| c.content.as_str()).collect::<Vec<_>>(), ["first", "second", "third"]);

        let not_mine = CommentFilter {
            exclude_author_id: Some(owner.id),
            ..Default::default()
        };
        let newest_first = CommentSort {
            order: SortOrder::Desc,
            ..Default::default()
        };
        let (others, total) = store
            .list_comments(task.id, &not_mine, newest_first, Page::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(others[0].content, "second");

        let (newest, _) = store
            .list_comments(task.id, &CommentFilter::default(), newest_first, Page::default())
            .await
            .unwrap();
        assert_eq!(newest[0].content, "third");
    }

    #[tokio::test]
    async fn test_idempotency_claim_lifecycle() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com").await;
        let now = Utc::now();
        let claim_id = Uuid::new_v4();

        let claim = NewIdempotencyRecord {
            fingerprint: "fp".to_string(),
            claim_id,
            user_id: owner.id,
            method: "POST".to_string(),
            path: "/api/v1/projects".to_string(),
            expires_at: now + Duration::seconds(60),
        };
        store.create_idempotency_record(claim.clone()).await.unwrap();

        let second = NewIdempotencyRecord {
            claim_id: Uuid::new_v4(),
            ..claim
        };
        assert!(store
            .create_idempotency_record(second)
            .await
            .unwrap_err()
            .is_unique_violation());

        let response = StoredResponse {
            status_code: 201,
            body: serde_json::json!({ "ok": true }),
        };
        assert!(!store
            .complete_idempotency_record("fp", Uuid::new_v4(), &response, now)
            .await
            .unwrap());
        assert!(store
            .complete_idempotency_record("fp", claim_id, &response, now + Duration::hours(24))
            .await
            .unwrap());

        // Completed records are not released
        assert!(!store.release_idempotency_record("fp", claim_id).await.unwrap());

        let record = store.find_idempotency_record("fp").await.unwrap().unwrap();
        assert_eq!(record.response, Some(response));

        assert!(!store.purge_expired_idempotency_record("fp", now).await.unwrap());
        assert!(store
            .purge_expired_idempotency_record("fp", now + Duration::hours(25))
            .await
            .unwrap());
        assert!(store.find_idempotency_record("fp").await.unwrap().is_none());
    }
}
