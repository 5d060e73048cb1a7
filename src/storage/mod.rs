pub mod local_store;

pub use local_store::{quote_identifier, LocalStore};
