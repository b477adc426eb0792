use super::commit::Commit;
use super::version::SemVer;
use std::collections::HashSet;
use std::fmt;

/// A version control tag pointing at a commit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub name: String,
    pub points_to: Commit,
}

impl Tag {
    pub fn new(name: impl Into<String>, points_to: Commit) -> Self {
        Tag {
            name: name.into(),
            points_to,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.name, self.points_to)
    }
}

/// A deduplicated collection of tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: HashSet<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        TagSet::default()
    }

    /// Add a tag, returning false if an identical tag was already present
    pub fn insert(&mut self, tag: Tag) -> bool {
        self.tags.insert(tag)
    }

    /// All tags pointing at `commit`
    pub fn find_commit_tags(&self, commit: &Commit) -> Vec<&Tag> {
        self.tags.iter().filter(|t| &t.points_to == commit).collect()
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        TagSet {
            tags: iter.into_iter().collect(),
        }
    }
}

impl Extend<Tag> for TagSet {
    fn extend<I: IntoIterator<Item = Tag>>(&mut self, iter: I) {
        self.tags.extend(iter);
    }
}

/// A parsed version together with the tag it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaggedVersion {
    pub version: SemVer,
    pub tag: Tag,
}

impl TaggedVersion {
    pub fn new(version: SemVer, tag: Tag) -> Self {
        TaggedVersion { version, tag }
    }
}

/// Which tag sources a query should consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryTarget {
    pub local: bool,
    pub remote: bool,
}

impl QueryTarget {
    pub const LOCAL: QueryTarget = QueryTarget {
        local: true,
        remote: false,
    };
    pub const REMOTE: QueryTarget = QueryTarget {
        local: false,
        remote: true,
    };
    pub const ALL: QueryTarget = QueryTarget {
        local: true,
        remote: true,
    };
}

impl fmt::Display for QueryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.local, self.remote) {
            (true, true) => write!(f, "local+remote"),
            (true, false) => write!(f, "local"),
            (false, true) => write!(f, "remote"),
            (false, false) => write!(f, "none"),
        }
    }
}
