//! Durable activity-record storage.

pub mod sqlite_activity_store;

pub use sqlite_activity_store::SqliteActivityStore;
