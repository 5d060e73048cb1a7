pub mod handlers;
pub mod middleware;
pub mod routes;

pub use middleware::AppError;
pub use routes::create_router;
