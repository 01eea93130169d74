//! # TaskHub API Server Library
//!
//! This library provides the core functionality for the TaskHub API server.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Extractors that reject with the error envelope
//! - `middleware`: Idempotency coordinator and project-owner guard
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
