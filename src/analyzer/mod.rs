//! Version resolution: find the nearest tag, then derive the version from it

pub mod calculator;
pub mod height;

pub use calculator::{bump, from_tag_information, next_version, overridden, resolve_version, VersionResolution};
pub use height::{HeightResult, HeightWalker};
