//! `herdbook-store` — storage adapters for the authorization core's ports.
//!
//! Two implementations of the `herdbook-auth` store traits: a Postgres
//! adapter for production and an in-memory adapter for tests/dev. Both are
//! read-only from the core's perspective.

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryMembershipStore, InMemoryResourceStore};
pub use postgres::{PostgresMembershipStore, PostgresResourceStore};
