//! Utility types shared by the pool crates.

pub mod config;

pub use config::PoolConfig;
