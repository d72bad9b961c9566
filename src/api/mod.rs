//! HTTP surface: router, handlers, middleware, shared state.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::serve;
pub use types::{generate_token, hash_token, ApiContext, Identity};
