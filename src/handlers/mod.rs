//! HTTP handlers for Model CRUD.

pub mod entity;
pub use entity::*;
