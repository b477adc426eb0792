pub mod analyzer;
pub mod config;
pub mod domain;
pub mod error;
pub mod filter;
pub mod git;
pub mod process;
pub mod ui;

pub use analyzer::{resolve_version, VersionResolution};
pub use domain::{SemVer, VersionCalculationOptions};
pub use error::{Result, TagverError};
