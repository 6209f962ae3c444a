// Persistence: SQLite known-id store.

pub mod known_ids;

pub use known_ids::KnownIdStore;
