//! HTTP API: liveness, metrics and OpenAPI docs.

pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod server;

pub use server::{build_router, run_server};
