//! HTTP read surface: `GET /orders/:order_uid` and `GET /health`.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use routes::create_router;
pub use server::serve;
