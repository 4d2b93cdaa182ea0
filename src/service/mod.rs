//! Data access and credential services.

pub mod crud;
pub mod password;

pub use crud::CrudGateway;
