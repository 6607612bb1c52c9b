//! Multi-file TOML configuration plumbing for homeboard.
//!
//! Files are loaded with recursive `imports`, merged with first-wins
//! semantics, and every problem found along the way is collected as a
//! [`Diagnostic`] so they can all be reported at once.

mod diagnostics;
mod load;

pub use diagnostics::format_diagnostics;
pub use diagnostics::Diagnostic;
pub use diagnostics::Diagnostics;
pub use diagnostics::Error;
pub use diagnostics::LoadError;
pub use diagnostics::MergeError;
pub use diagnostics::SourceInfo;
pub use diagnostics::SourceSpan;
pub use diagnostics::ValidationError;
pub use diagnostics::Warning;
pub use load::load_file;
pub use load::load_with_imports;
pub use load::FirstWins;
pub use load::PartialFile;
