//! journai configuration module
//!
//! Loads `journai.toml`, exposes the typed sections consumed by the chat
//! core and the binary, and centralizes endpoint paths and defaults in
//! [`constants`].

pub mod constants;
pub mod core;
pub mod loader;

pub use core::{
    ApiConfig, AuthConfig, ContextConfig, LoggingConfig, StreamConfig, ThrottleConfig,
};
pub use loader::{ConfigManager, JournaiConfig};
