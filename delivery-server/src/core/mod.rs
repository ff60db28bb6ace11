//! Core: configuration, shared state, background tasks and the HTTP server
//!
//! - [`Config`] - environment configuration
//! - [`ServerState`] - service singletons shared by handlers and tasks
//! - [`BackgroundTasks`] - task registry with graceful shutdown
//! - [`Server`] - HTTP server

pub mod config;
pub mod error;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::{Config, ConfigError};
pub use error::{Result, ServerError};
pub use server::Server;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
