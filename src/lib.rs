//! Context-path reverse proxy gateway library.

pub mod admin;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod proxy;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use gateway::Gateway;
pub use http::{AxumEngine, RouterEngine};
pub use lifecycle::Shutdown;
