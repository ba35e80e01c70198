//! Unit tests for the scoped server registry.
