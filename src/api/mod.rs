//! HTTP query surface, JSON-RPC command surface and startup context

pub mod handlers;
pub mod mcp;
pub mod models;
pub mod routes;
pub mod state;

pub use models::{ApiError, McpRequest, McpResponse};
pub use routes::build_router;
pub use state::{select_retriever, AppContext, Backends, RetrieverPreference};
