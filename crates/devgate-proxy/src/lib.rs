//! Devgate Proxy - Pingora-based dev and preview server
//!
//! Forwards configured path prefixes to their upstream origin (tunnelling
//! WebSocket upgrades where enabled) and serves static files for every
//! other request.

pub mod config;
pub mod error;
pub mod headers;
pub mod listener;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod static_files;
pub mod traits;

// Re-export main types and functions
pub use config::*;
pub use error::ProxyError;
pub use headers::*;
pub use listener::bind_listener;
pub use proxy::*;
pub use routes::*;
pub use server::*;
pub use static_files::StaticFiles;
pub use traits::*;
