//! Analytics Hub access core
//!
//! Role-hierarchy permission resolution for the Analytics Hub platform:
//! a read-through cache over role/permission/user lookups and a hierarchy
//! engine that computes effective permission sets with rule-based
//! inheritance, cycle detection, and multi-key cache invalidation.
//!
//! Persistence and cache backends are injected at construction
//! ([`repository::AccessRepository`], [`cache::CacheStore`]); HTTP
//! routing, sessions, and rendering live upstream and consume this crate
//! in-process.

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use config::Config;
pub use error::{AccessError, Result};
