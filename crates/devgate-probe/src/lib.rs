//! Devgate Probe - WebSocket connectivity checks
//!
//! A one-shot probe that opens a single WebSocket connection with a token in
//! the query string and reports its lifecycle events, plus scripted checks of
//! the backend's named channels.

pub mod auth;
pub mod checks;
pub mod error;
pub mod events;
pub mod runner;
pub mod target;
pub mod threat_events;
pub mod token;

pub use auth::login;
pub use checks::{run_check, Channel, CheckOptions, CheckReport, ThreatFilters, CONNECT_TIMEOUT};
pub use error::ProbeError;
pub use events::{ConsoleHandler, EventGate, GateState, ProbeEvent, ProbeHandler};
pub use runner::{run_probe, ProbeOutcome};
pub use target::{http_to_ws, ProbeTarget};
pub use threat_events::{create_threat_event, ThreatEvent, THREAT_EVENTS_PATH};
pub use token::{TokenSource, DEFAULT_TOKEN_ENV};
