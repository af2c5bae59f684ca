pub mod db;
pub mod embedding_records;
pub mod models;
pub mod refresh_outbox;
pub mod schema;
pub mod usage;
pub mod workspace;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
