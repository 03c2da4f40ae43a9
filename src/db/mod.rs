//! Persistence: record models and the JSON-file collection store.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring stored rows
//! - `schema.rs`: collection names and their file keys
//! - `json_store.rs`: reading and writing one collection file
//! - `instant.rs`: lenient timestamp parsing for client input and stored rows

pub mod instant;
pub mod json_store;
pub mod models;
pub mod schema;

pub use json_store::JsonFileStore;
pub use models::Record;
pub use schema::Collection;
