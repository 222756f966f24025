pub mod claims;
pub mod db;
pub mod embeddings;
pub mod models;
pub mod neighbors;
pub mod queue;
pub mod schema;
pub mod threads;
pub mod usage;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
