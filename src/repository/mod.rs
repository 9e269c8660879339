//! Data access layer (repository pattern)

pub mod access;

pub use access::{AccessRepository, AccessRepositoryImpl};
