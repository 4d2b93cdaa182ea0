//! Courseboard: resource CRUD gateway for course content.
//!
//! One generic request pipeline serves four endpoint families (students,
//! assignments, discussion, weekly breakdown). Each resource is described by
//! a table-driven [`descriptor::ResourceDescriptor`] instead of per-resource
//! handler code; handlers differ only where resource contracts diverge.

pub mod descriptor;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod sanitize;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use descriptor::{GatewayFamily, Registry, ResourceDescriptor};
pub use error::ApiError;
pub use routes::app;
pub use state::AppState;
pub use store::ensure_schema;
