//! Helpers for the engine's own tests, and for crates that test against the engine.
pub mod fixtures;
pub mod mocks;
pub mod prepare_env;
