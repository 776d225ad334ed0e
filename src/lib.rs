//! # Babble
//!
//! Minimal real-time chat broadcaster. Clients connect over WebSocket,
//! submit short text messages, and receive every message submitted by any
//! connected client, in the order the hub observes them.
//!
//! ## Architecture
//!
//! - **Hub**: a single-actor control loop owning all session membership.
//!   Join, leave, and forward are signals into the loop; fan-out never
//!   blocks on a slow consumer - a full outbound queue means eviction.
//! - **Sessions**: one WebSocket connection each, bridged to the hub by
//!   two pumps (inbound to the hub, outbound from a bounded queue).
//! - **Tracer**: injectable diagnostic sink for hub events; no-op by
//!   default.
//!
//! ## Modules
//!
//! - [`hub`]: the broadcast hub actor
//! - [`api`]: WebSocket upgrade, session pumps, and the HTTP surface
//! - [`trace`]: pluggable diagnostics
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use babble::api::{serve, AppState};
//! use babble::config::Config;
//! use babble::hub::Hub;
//! use babble::trace;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let (hub, _hub_task) = Hub::spawn(config.hub.clone(), trace::off());
//!     let server = config.server.clone();
//!     serve(AppState::new(hub, config), &server).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod hub;
pub mod trace;

// Re-export top-level types for convenience
pub use api::{build_router, serve, AppState, ServerError};
pub use config::{Config, ConfigError, LoggingConfig, ServerConfig};
pub use hub::{Hub, HubConfig, HubError, HubHandle, Payload, Session, SessionId};
pub use trace::{NoopTracer, Tracer, WriterTracer};
