mod access;
mod boards;
mod keys;
mod lock;
mod operations;
mod rows;
mod sprints;
mod sqlite_store;
mod tickets;

pub use sqlite_store::{SqliteStore, StoreOptions};
