//! In-memory adapter for the server registry port.

mod repository;

pub use repository::InMemoryServerRegistry;
