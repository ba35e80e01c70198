//! Adapter implementations for schema migration ports.

pub mod memory;
pub mod postgres;
