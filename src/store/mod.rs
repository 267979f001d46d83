pub mod json;
pub mod repo;
