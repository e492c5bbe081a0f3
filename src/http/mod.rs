//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → engine.rs (Axum router, middleware, graceful shutdown)
//!     → request.rs (request ID, request span)
//!     → bound handler: introspection API or service proxy
//!     → Send to client
//! ```

pub mod engine;
pub mod request;

pub use engine::{ApiHandler, ApiRequest, ApiResponse, AxumEngine, ProxyFuture, ProxyHandler, RouterEngine};
pub use request::{MakeGatewayRequestId, X_REQUEST_ID};
