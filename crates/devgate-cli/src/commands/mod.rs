pub mod check;
pub mod config;
pub mod probe;
pub mod serve;
mod shutdown;

pub use check::CheckCommand;
pub use config::ConfigCommand;
pub use probe::ProbeCommand;
pub use serve::ServeCommand;
