pub mod db;
pub mod events;
pub mod interactions;
pub mod models;
pub mod schema;
pub mod tokens;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
