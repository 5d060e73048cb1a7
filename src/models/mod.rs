pub mod mirror;
pub mod query;
pub mod schema;
pub mod value;

pub use mirror::*;
pub use query::*;
pub use schema::*;
pub use value::*;
