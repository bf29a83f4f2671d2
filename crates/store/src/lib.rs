//! Persistence seam for the library circulation system.
//!
//! The [`LibraryStore`] trait exposes typed reads per table and a single
//! atomic write path, [`LibraryStore::apply`], which commits a guarded
//! [`WriteBatch`]: either every mutation in the batch lands, or none does.
//! Guards are re-validated inside the implementation's transaction boundary,
//! so a workflow that read stale state fails with [`StoreError::Conflict`]
//! instead of overwriting a concurrent writer.
//!
//! Two implementations are provided: [`InMemoryLibraryStore`] for tests and
//! the default server, and [`PostgresLibraryStore`] backed by sqlx.

pub mod batch;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use batch::{Guard, Mutation, WriteBatch};
pub use error::{Result, StoreError};
pub use memory::InMemoryLibraryStore;
pub use postgres::PostgresLibraryStore;
pub use store::{LibraryStore, StoreExt};
