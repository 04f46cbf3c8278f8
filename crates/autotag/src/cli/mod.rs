//! Command handlers.

pub mod classify;
pub mod config;
pub mod pool;
pub mod types;
