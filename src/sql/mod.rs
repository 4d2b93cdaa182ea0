//! Parameterized SQL construction and value binding.

pub mod builder;
pub mod params;

pub use builder::{ColumnValue, QueryBuf};
pub use params::BindValue;
