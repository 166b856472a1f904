//! Project-level services for checking templates embedded in host-language
//! code: configuration discovery, a version-tracked document cache, the
//! virtual file overlay that feeds the host compiler transformed text, and
//! a one-shot batch checker.

pub mod analyzer;
pub mod check;
pub mod config;
pub mod document;
pub mod overlay;

pub use analyzer::{HostAnalyzer, NullAnalyzer, ScriptedAnalyzer};
pub use check::{CheckReport, Checker};
pub use config::{
    ConfigError, ConfigInput, ConfigLoader, ConfigScope, TemplatePrecedence, CONFIG_FILE_NAME,
};
pub use document::DocumentCache;
pub use overlay::{FileSystem, MemoryFileSystem, OverlayManager, RealFileSystem};
