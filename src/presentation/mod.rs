//! Server-rendered views.

pub mod views;
