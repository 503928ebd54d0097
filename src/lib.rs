//! Patternbook: a bilingual design-pattern catalogue.
//!
//! Layers follow the usual split: `domain` holds records and invariants,
//! `application` the services and persistence ports, `cache` the tag
//! invalidated content cache, `infra` the adapters (Postgres, filesystem,
//! HTTP, telemetry) and `presentation` the askama views.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
