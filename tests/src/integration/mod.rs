//! Cross-crate integration tests.

#[cfg(test)]
mod fixtures;

pub mod concurrency;
pub mod consistency;
pub mod lifecycle_flow;
