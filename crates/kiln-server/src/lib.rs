//! # kiln-server
//!
//! HTTP server exposing [`kiln_core`] code execution.
//!
//! The binary reads [`ServerConfig`] from the environment, builds an
//! [`Executor`](kiln_core::Executor) with the standard drivers and serves
//! the router from [`http::build_router`].

pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use config::ServerConfig;
pub use error::ApiError;
pub use types::{ErrorBody, LanguagesResponse, RunRequest, RunResponse};
