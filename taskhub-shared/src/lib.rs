//! # TaskHub Shared Library
//!
//! Domain types, persistence, and the access-control and idempotency core
//! used by the TaskHub API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `store`: Persistence trait with PostgreSQL and in-memory backends
//! - `auth`: Authentication, principals and the authorization gate
//! - `idempotency`: Idempotency-key fingerprinting and coordination
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod idempotency;
pub mod models;
pub mod store;

/// Current version of the TaskHub shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
