pub mod store;

pub use store::{SqliteStore, StoreOptions};
