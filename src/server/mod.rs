/// Live session registry.
pub mod state;

/// TCP accept loop and per-connection session loop.
pub mod service;

/// Server configuration.
pub mod config;

pub use config::{ChallengeKind, ServerConfig};
pub use service::{ChallengeService, SessionFactory};
pub use state::{ServerState, SessionData};
