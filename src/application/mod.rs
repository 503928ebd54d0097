//! Application services layer.

pub mod admin;
pub mod catalog;
pub mod content;
pub mod error;
pub mod render;
pub mod repos;
