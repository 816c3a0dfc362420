//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! flags / environment
//!     → cli.rs (clap parsing)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!
//! policy document (YAML/TOML)
//!     → loader.rs (parse, resolve actions and matchers)
//!     → Policy (validated, immutable)
//!     → shared via Arc with every request
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - Every runtime parameter except the upstream and rule file has a default
//! - Any configuration error is fatal to startup

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::{load_policy, ConfigError};
pub use schema::{PolicyDocument, ProxyConfig, RuleConfig, RuleSetConfig};
pub use validation::{validate_config, ValidationError};
