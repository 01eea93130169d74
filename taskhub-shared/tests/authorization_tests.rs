/// Integration tests for membership resolution and the authorization gate
///
/// Run against the in-memory store; no database required.

use taskhub_shared::auth::authorization::{
    authorize_comment, authorize_new_task, authorize_project, authorize_task,
    is_member, is_owner, AuthzError, CommentAction, ProjectAction, Relationship, TaskAction,
};
use taskhub_shared::auth::middleware::Principal;
use taskhub_shared::models::{
    comment::{Comment, NewComment},
    membership::NewProjectMember,
    project::{NewProject, Project},
    task::{NewTask, Task},
    user::{GlobalRole, NewUser, User},
};
use taskhub_shared::store::{MemoryStore, Store};
use uuid::Uuid;

struct Fixture {
    store: MemoryStore,
    owner: User,
    member: User,
    other_member: User,
    outsider: User,
    admin: User,
    project: Project,
    task: Task,
}

async fn user(store: &MemoryStore, email: &str, role: GlobalRole) -> User {
    store
        .create_user(NewUser {
            email: email.to_string(),
            name: email.to_string(),
            password_hash: "hash".to_string(),
            role,
        })
        .await
        .expect("Failed to create user")
}

/// A owns P; B and C are members with different labels; D is unrelated;
/// E is a global owner
async fn fixture() -> Fixture {
    let store = MemoryStore::new();
    let owner = user(&store, "a@example.com", GlobalRole::Member).await;
    let member = user(&store, "b@example.com", GlobalRole::Member).await;
    let other_member = user(&store, "c@example.com", GlobalRole::Member).await;
    let outsider = user(&store, "d@example.com", GlobalRole::Member).await;
    let admin = user(&store, "e@example.com", GlobalRole::Owner).await;

    let project = store
        .create_project(NewProject {
            name: "P".to_string(),
            description: None,
            owner_id: owner.id,
        })
        .await
        .unwrap();

    for (user_id, role) in [(member.id, "developer"), (other_member.id, "viewer")] {
        store
            .create_membership(NewProjectMember {
                project_id: project.id,
                user_id,
                role: role.to_string(),
            })
            .await
            .unwrap();
    }

    let task = store
        .create_task(NewTask {
            project_id: project.id,
            title: "T".to_string(),
            description: None,
            status: "todo".to_string(),
            priority: "medium".to_string(),
            assigned_to_id: None,
            created_by_id: member.id,
        })
        .await
        .unwrap();

    Fixture {
        store,
        owner,
        member,
        other_member,
        outsider,
        admin,
        project,
        task,
    }
}

async fn comment_by(f: &Fixture, author_id: Uuid) -> Comment {
    f.store
        .create_comment(NewComment {
            task_id: f.task.id,
            author_id,
            content: "comment".to_string(),
        })
        .await
        .unwrap()
}

fn scoped(user: &User) -> Principal {
    Principal::Scoped(user.id)
}

#[tokio::test]
async fn test_resolver_relationships() {
    let f = fixture().await;
    let p = f.project.id;

    assert!(is_owner(&f.store, p, scoped(&f.owner)).await.unwrap());
    assert!(is_member(&f.store, p, scoped(&f.owner)).await.unwrap());

    assert!(!is_owner(&f.store, p, scoped(&f.member)).await.unwrap());
    assert!(is_member(&f.store, p, scoped(&f.member)).await.unwrap());

    assert!(!is_owner(&f.store, p, scoped(&f.outsider)).await.unwrap());
    assert!(!is_member(&f.store, p, scoped(&f.outsider)).await.unwrap());
}

#[tokio::test]
async fn test_superuser_passes_every_check_on_existing_project() {
    let f = fixture().await;
    let admin = Principal::Superuser(f.admin.id);

    assert!(is_owner(&f.store, f.project.id, admin).await.unwrap());
    assert!(is_member(&f.store, f.project.id, admin).await.unwrap());
    authorize_project(&f.store, admin, f.project.id, ProjectAction::Delete)
        .await
        .unwrap();
    authorize_task(&f.store, admin, f.task.id, TaskAction::Delete).await.unwrap();

    let comment = comment_by(&f, f.member.id).await;
    authorize_comment(&f.store, admin, comment.id, CommentAction::Delete)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_missing_project_is_not_found_for_everyone() {
    let f = fixture().await;
    let missing = Uuid::new_v4();

    for principal in [scoped(&f.owner), Principal::Superuser(f.admin.id)] {
        assert!(matches!(
            is_member(&f.store, missing, principal).await,
            Err(AuthzError::ProjectNotFound)
        ));
        assert!(matches!(
            is_owner(&f.store, missing, principal).await,
            Err(AuthzError::ProjectNotFound)
        ));
        assert!(matches!(
            authorize_new_task(&f.store, principal, missing).await,
            Err(AuthzError::ProjectNotFound)
        ));
    }
}

#[tokio::test]
async fn test_project_owner_only_actions() {
    let f = fixture().await;

    for action in [ProjectAction::Update, ProjectAction::Delete, ProjectAction::ManageMembers] {
        authorize_project(&f.store, scoped(&f.owner), f.project.id, action)
            .await
            .unwrap();
        assert!(matches!(
            authorize_project(&f.store, scoped(&f.member), f.project.id, action).await,
            Err(AuthzError::AccessDenied)
        ));
    }

    authorize_project(&f.store, scoped(&f.member), f.project.id, ProjectAction::Read)
        .await
        .unwrap();
    assert!(matches!(
        authorize_project(&f.store, scoped(&f.outsider), f.project.id, ProjectAction::Read).await,
        Err(AuthzError::AccessDenied)
    ));
}

#[tokio::test]
async fn test_task_ownership_asymmetry() {
    let f = fixture().await;

    authorize_task(&f.store, scoped(&f.member), f.task.id, TaskAction::Update)
        .await
        .unwrap();
    assert!(matches!(
        authorize_task(&f.store, scoped(&f.member), f.task.id, TaskAction::Delete).await,
        Err(AuthzError::AccessDenied)
    ));

    // Creating the task doesn't make the member its deleter
    assert_eq!(f.task.created_by_id, f.member.id);

    let task = authorize_task(&f.store, scoped(&f.owner), f.task.id, TaskAction::Delete)
        .await
        .unwrap();
    assert_eq!(task.id, f.task.id);
}

#[tokio::test]
async fn test_membership_label_is_ignored() {
    let f = fixture().await;

    // "viewer" has the same rights as "developer"
    authorize_task(&f.store, scoped(&f.other_member), f.task.id, TaskAction::Update)
        .await
        .unwrap();
    authorize_new_task(&f.store, scoped(&f.other_member), f.project.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_outsider_is_denied_task_and_comment_access() {
    let f = fixture().await;
    let outsider = scoped(&f.outsider);

    assert!(matches!(
        authorize_new_task(&f.store, outsider, f.project.id).await,
        Err(AuthzError::AccessDenied)
    ));
    assert!(matches!(
        authorize_task(&f.store, outsider, f.task.id, TaskAction::Read).await,
        Err(AuthzError::AccessDenied)
    ));
    assert!(matches!(
        authorize_task(&f.store, outsider, f.task.id, CommentAction::Create).await,
        Err(AuthzError::AccessDenied)
    ));
}

#[tokio::test]
async fn test_task_gate_accepts_any_relationship() {
    let f = fixture().await;
    let member = scoped(&f.member);

    let task = authorize_task(&f.store, member, f.task.id, CommentAction::Create)
        .await
        .unwrap();
    assert_eq!(task.id, f.task.id);
    authorize_task(&f.store, member, f.task.id, Relationship::Participant)
        .await
        .unwrap();

    assert!(matches!(
        authorize_task(&f.store, member, f.task.id, Relationship::Owner).await,
        Err(AuthzError::AccessDenied)
    ));
    authorize_task(&f.store, scoped(&f.owner), f.task.id, Relationship::Owner)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_comment_delete_author_or_owner() {
    let f = fixture().await;
    let comment = comment_by(&f, f.member.id).await;

    authorize_comment(&f.store, scoped(&f.member), comment.id, CommentAction::Delete)
        .await
        .unwrap();
    authorize_comment(&f.store, scoped(&f.owner), comment.id, CommentAction::Delete)
        .await
        .unwrap();
    assert!(matches!(
        authorize_comment(&f.store, scoped(&f.other_member), comment.id, CommentAction::Delete).await,
        Err(AuthzError::AccessDenied)
    ));

    // Any participant may read it
    authorize_comment(&f.store, scoped(&f.other_member), comment.id, CommentAction::Read)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_missing_task_and_comment_are_not_found() {
    let f = fixture().await;

    assert!(matches!(
        authorize_task(&f.store, scoped(&f.owner), Uuid::new_v4(), TaskAction::Read).await,
        Err(AuthzError::TaskNotFound)
    ));
    assert!(matches!(
        authorize_task(&f.store, scoped(&f.outsider), Uuid::new_v4(), CommentAction::Read).await,
        Err(AuthzError::TaskNotFound)
    ));
    assert!(matches!(
        authorize_comment(&f.store, scoped(&f.outsider), Uuid::new_v4(), CommentAction::Read).await,
        Err(AuthzError::CommentNotFound)
    ));
}

#[tokio::test]
async fn test_removed_member_loses_access() {
    let f = fixture().await;

    f.store.delete_membership(f.project.id, f.member.id).await.unwrap();

    assert!(!is_member(&f.store, f.project.id, scoped(&f.member)).await.unwrap());
    assert!(matches!(
        authorize_task(&f.store, scoped(&f.member), f.task.id, TaskAction::Read).await,
        Err(AuthzError::AccessDenied)
    ));
}
