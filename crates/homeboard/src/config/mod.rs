#[allow(clippy::module_inception)]
mod config;
mod partial;

pub use config::*;
pub use homeboard_config::format_diagnostics;
pub use homeboard_config::Diagnostic;
pub use homeboard_config::Diagnostics;
