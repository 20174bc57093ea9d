//! Identifiers for trees and the nodes inside them.
//!
//! A [`NodeId`] is an arena index tagged with the ULID of the tree that issued
//! it. The tag is what lets a tree reject an id that belongs to some other
//! tree instead of silently addressing whatever node sits at that index.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::ports::Clock;

/// Identifier of a result tree.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreeId(Ulid);

impl TreeId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Time-ordered id whose timestamp part comes from `clock`.
    pub fn generate(clock: &dyn Clock) -> Self {
        let timestamp_ms = clock.now().timestamp_millis().max(0) as u64;
        Self(Ulid::from_parts(timestamp_ms, rand::random()))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree-{}", self.0)
    }
}

/// Identifier of a node within one [`crate::tree::ResultTree`].
///
/// Only meaningful for the tree that issued it. Grafting a subtree with
/// [`crate::tree::ResultTree::attach`] re-issues ids for the grafted nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    tree: TreeId,
    index: usize,
}

impl NodeId {
    pub(crate) fn new(tree: TreeId, index: usize) -> Self {
        Self { tree, index }
    }

    pub fn tree(&self) -> TreeId {
        self.tree
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tree, self.index)
    }
}
