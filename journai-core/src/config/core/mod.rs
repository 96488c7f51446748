pub mod api;
pub mod logging;
pub mod stream;

pub use api::{ApiConfig, AuthConfig, ContextConfig};
pub use logging::LoggingConfig;
pub use stream::{StreamConfig, ThrottleConfig};
