//! sorrypage gate: maintenance-mode middleware for actix-web.
//!
//! While enabled, every request is relayed to a configured sorry-page service
//! and that service's status, headers and body are streamed back verbatim.
//! While disabled, requests reach the wrapped service untouched.
//!
//! # Modules
//!
//! - [`gate`]: the [`SorryPage`] middleware (PASSTHROUGH / REDIRECT dispatch)
//! - [`liveness`]: the per-request predicate deciding the dispatch
//! - [`proxy`]: single-host reverse-proxy forwarding
//! - [`config`]: gate and server configuration
//! - [`routes`]: health, metrics and the origin relay used by the binary

pub mod config;
pub mod error;
pub mod gate;
pub mod liveness;
pub mod metrics;
pub mod proxy;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ServerConfig, SorryPageConfig};
pub use error::GateError;
pub use gate::SorryPage;
pub use liveness::{LivenessCheck, StaticFlag};
pub use state::AppState;
