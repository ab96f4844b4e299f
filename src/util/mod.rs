//! Shared utilities.

pub mod encoding;
pub mod telemetry;
pub mod types;
pub mod url;

pub use telemetry::*;
pub use types::*;
pub use url::fix_url;
