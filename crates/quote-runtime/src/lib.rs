#![deny(warnings)]

//! Client runtime for the print-quoting dashboard.
//!
//! [`AppState`] holds credentials and the project cache, [`Dashboard`] drives
//! the project list, and [`ProjectSession`] is the parameter editor: live
//! recalculation, debounced autosave, status polling while a model is
//! analyzed, and gated AI text generation.

pub mod config;
pub mod dashboard;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::{AppConfig, ConfigError, ReactorConfig};
pub use dashboard::Dashboard;
pub use session::{ProjectSession, SaveState, SessionError, SessionEvent, SessionSnapshot};
pub use store::{AppState, AuthSession, ProjectCache};
