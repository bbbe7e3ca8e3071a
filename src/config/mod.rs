//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, BREAKER_* env overrides)
//!     → validation.rs (semantic checks)
//!     → BreakerConfig (validated, immutable)
//!     → handed to the directory, executor and server at construction
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → directory swaps its live BreakerSettings
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only the failure threshold is live; everything else needs a restart

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_defaults, ConfigError};
pub use schema::{
    AdminConfig, BreakerConfig, BreakerSettings, ControlPlaneConfig, ListenerConfig,
    ObservabilityConfig, PersistenceConfig, RemediationConfig, StoreBackend,
};
