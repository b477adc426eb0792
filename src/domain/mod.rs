//! Domain logic - version values and ordering rules, independent of git

pub mod commit;
pub mod compare;
pub mod options;
pub mod tag;
pub mod version;

pub use commit::Commit;
pub use compare::{PostreleaseComparer, StrictComparer, VersionComparer, VersionOrdering};
pub use options::{VersionCalculationOptions, VersionPart};
pub use tag::{QueryTarget, Tag, TagSet, TaggedVersion};
pub use version::{compare_postrelease, compare_prerelease, SemVer};
