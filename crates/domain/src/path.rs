//! Hierarchical resource addressing
//!
//! A [`ResourcePath`] is an immutable linked chain of segments. Children
//! share their parent through an `Arc`, so deriving `entity/FollowedContent`
//! from `entity` is a single allocation. A node can only be built from an
//! existing parent, which rules out cycles.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq, Hash)]
struct PathNode {
    segment: String,
    parent: Option<ResourcePath>,
}

/// Immutable, cheaply clonable resource address.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    node: Arc<PathNode>,
}

impl ResourcePath {
    pub fn new(segment: impl Into<String>, parent: Option<ResourcePath>) -> Self {
        Self { node: Arc::new(PathNode { segment: segment.into(), parent }) }
    }

    /// A path with no parent.
    pub fn root(segment: impl Into<String>) -> Self {
        Self::new(segment, None)
    }

    /// A new path one level below `self`.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        Self::new(segment, Some(self.clone()))
    }

    /// Build a chain from a slash-separated address, skipping empty segments.
    ///
    /// An address without any non-empty segment yields an empty root.
    pub fn from_address(address: &str) -> Self {
        let mut segments = address.split('/').filter(|s| !s.is_empty());
        let first = segments.next().unwrap_or_default();
        segments.fold(Self::root(first), |path, segment| path.child(segment))
    }

    pub fn segment(&self) -> &str {
        &self.node.segment
    }

    pub fn parent(&self) -> Option<&ResourcePath> {
        self.node.parent.as_ref()
    }

    /// Number of nodes in the chain, including empty ones.
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }

    /// Iterate from `self` up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = &ResourcePath> {
        std::iter::successors(Some(self), |path| path.parent())
    }

    /// Non-empty segments from root to leaf.
    pub fn segments(&self) -> Vec<&str> {
        let mut segments: Vec<&str> =
            self.ancestors().map(ResourcePath::segment).filter(|s| !s.is_empty()).collect();
        segments.reverse();
        segments
    }

    /// Full address, root first, joined with `/`.
    pub fn render(&self) -> String {
        self.segments().join("/")
    }

    /// Whether `other` appears in this path's ancestor chain (or is `self`).
    pub fn starts_with(&self, other: &ResourcePath) -> bool {
        self.ancestors().any(|path| path == other)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl fmt::Debug for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResourcePath").field(&self.render()).finish()
    }
}

impl From<&str> for ResourcePath {
    fn from(address: &str) -> Self {
        Self::from_address(address)
    }
}
