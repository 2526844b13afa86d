//! Service lifecycle coordination across init flavors.
//!
//! The crate detects which init system a host runs (systemd, upstart or
//! sysvinit), routes lifecycle operations through a provider for that
//! flavor, fires registrable before/after hooks around each operation,
//! and coalesces deferred lifecycle requests per service so that one run
//! performs at most one physical start/reload/restart per service.
//!
//! Typical use:
//!
//! ```no_run
//! use svcmux::{Config, DelayedAction, DelayedKind, ServiceCoordinator};
//!
//! # fn main() -> Result<(), svcmux::Error> {
//! let coordinator = ServiceCoordinator::new(Config::default())?;
//!
//! coordinator.enable("postfix")?;
//! coordinator.register_delayed_action(
//!     "postfix",
//!     DelayedAction::Lifecycle(DelayedKind::Restart),
//!     0,
//! )?;
//!
//! // ... more work, possibly deferring further actions ...
//!
//! // Required once, after all other work, before exit
//! coordinator.drain_delayed_actions()?;
//! # Ok(())
//! # }
//! ```

pub mod cmd;
pub mod config;
pub mod coordinator;
pub mod delayed;
pub mod detect;
pub mod error;
pub mod hooks;
pub mod provider;

pub use config::Config;
pub use coordinator::ServiceCoordinator;
pub use delayed::{DelayedAction, DelayedKind};
pub use detect::{detect, InitKind};
pub use error::{Error, Result};
pub use hooks::EventHooks;
pub use provider::ServiceProvider;
