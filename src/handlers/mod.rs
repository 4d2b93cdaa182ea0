pub mod fields;
pub mod gateway;
pub mod students;
