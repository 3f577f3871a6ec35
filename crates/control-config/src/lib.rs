//! Configuration, paths, and logging init shared by every control-plane binary.

mod config;
mod error;
mod logging;
mod paths;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
