//! Tag filtering
//!
//! A [`TagFilter`] gets the final say on whether a parsed version tag may be
//! used as a base version. The only real implementation runs a user command.

pub mod command;
pub mod context;

pub use command::CommandTagFilter;
pub use context::FilterContext;

use crate::domain::TaggedVersion;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TagFilter: Send + Sync {
    /// Whether `candidate` may be used
    async fn passes(&self, candidate: &TaggedVersion) -> Result<bool>;
}
