//! Interfaces a resource type implements to be pooled.

pub mod manager;

pub use manager::{FnManager, Manager};
