pub mod connection;
pub mod metadata;
pub mod mirror;
pub mod query;

pub use connection::AppState;
