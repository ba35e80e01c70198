//! Unit tests for schema migrations.
