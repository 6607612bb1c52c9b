pub mod api;
pub mod config;
pub mod dashboard;
pub mod discovery;
pub mod entity;
pub mod hub;
pub mod icons;
pub mod mapping;
pub mod setup;
pub mod storage;
pub mod theme;

pub use config::format_diagnostics;
pub use config::Config;
pub use config::Diagnostic;
pub use config::Diagnostics;
pub use config::LogLevel;
pub use dashboard::Dashboard;
pub use hub::Hub;
pub use mapping::EntityMapper;
