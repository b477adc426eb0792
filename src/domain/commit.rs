use std::fmt;

/// An opaque commit identifier (a hex object hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Commit(String);

impl Commit {
    pub fn new(id: impl Into<String>) -> Self {
        Commit(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Commit {
    fn from(id: &str) -> Self {
        Commit::new(id)
    }
}
