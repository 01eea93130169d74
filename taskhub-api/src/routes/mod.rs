/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login and current user
/// - `users`: User directory
/// - `projects`: Projects and memberships
/// - `tasks`: Tasks within projects
/// - `comments`: Comments on tasks

pub mod auth;
pub mod comments;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod users;
