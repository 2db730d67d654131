//! Easel Config
//!
//! Serializable configuration for the easel host. A host reads one
//! [`HostConfig`] at startup, usually from a JSON file passed with
//! `--config`, and hands the pieces to the crates that need them:
//! - [`HttpConfig`] to the transport in `easel-host-http`
//! - [`ScriptConfig`] to the script unit in `easel-script-lua`
//! - [`RuntimeConfig`] to the binary's run loop
//!
//! Every field has a default, so an empty JSON object is a valid config.

mod error;
mod host;

pub use error::ConfigError;
pub use host::{HostConfig, HttpConfig, RuntimeConfig, ScriptConfig, ShutdownMode};
