//! Host for interactive cryptographic challenges.
//!
//! Each TCP session plays one challenge over newline-delimited JSON:
//!
//! - **loak**: predict a generator chained through two client-influenced ring groups
//! - **parity**, **claw**, **length**, **textbook**: recover an RSA-encrypted
//!   flag through a deliberately leaky decryption oracle
//!
//! A session owns its generator state, its budget and its keys. The only
//! state shared between sessions is the [`server::ServerState`] registry.
//!
//! # Example
//!
//! ```no_run
//! use oracle_arena::server::{ChallengeService, ServerConfig, ServerState, SessionFactory};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::default();
//! config.validate()?;
//! let factory = SessionFactory::from_config(&config, config.load_flag()?)?;
//! let state = ServerState::new(config.server.max_sessions);
//! let listener = tokio::net::TcpListener::bind(config.server.addr()?).await?;
//! ChallengeService::new(&config, factory, state).serve(listener).await?;
//! # Ok(())
//! # }
//! ```

/// Error types.
pub mod error;
/// Hosted RSA oracles.
pub mod oracle;
/// Groups, generators and number theory.
pub mod primitives;
/// Wire records, budgets and per-session dispatch.
pub mod protocol;
/// TCP service, configuration and session registry.
pub mod server;

pub use error::Error;
pub use oracle::{Leak, PrimitiveAdapter, RsaKey};
pub use primitives::{BasePoint, BlumBlumShub, Group, LoakElement, LoakGroup, LoakRng, SecureRng};
pub use protocol::{Dispatcher, GuessingGame, GuessingSetup, OracleGame, Reply, RoundState};

/// Result type alias using the library's error type.
pub type Result<T> = core::result::Result<T, Error>;
