//! Result tree: the arena that owns result nodes.
//!
//! Design:
//! - Nodes live in a `Vec`; parent/child links are [`NodeId`]s, never owning
//!   pointers, so there are no reference cycles to manage.
//! - Invariant: a child's index is always greater than its parent's. Both
//!   `add_child` and `attach` only append, which keeps this true and lets
//!   aggregation run as a single reverse pass.
//! - All status mutation goes through `set_status` / `force_status`.
//!
//! Concurrency: a tree has exactly one owner. For fan-out, `fork` a detached
//! subtree per concurrent operation, let each operation own its subtree, and
//! `attach` them back after joining.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{
    ErrorObject, NodeId, ResultNode, ResultStatus, ResultType, StatusOverride, TrackingError,
    TreeId,
};
use crate::ports::{Clock, SystemClock};

pub struct ResultTree {
    id: TreeId,
    nodes: Vec<ResultNode>,
    clock: Arc<dyn Clock>,
}

impl ResultTree {
    /// Start a tree whose root is a new `INITIALIZED` node, timed by the
    /// system clock.
    pub fn create(
        result_type: ResultType,
        name: impl Into<String>,
        detail: Option<serde_json::Value>,
    ) -> Result<Self, TrackingError> {
        Self::create_with_clock(Arc::new(SystemClock), result_type, name, detail)
    }

    /// Like [`ResultTree::create`], but the type comes in as its string form
    /// (`"COMMAND"`, `"TASK"`, ...).
    pub fn create_named(
        result_type: &str,
        name: impl Into<String>,
        detail: Option<serde_json::Value>,
    ) -> Result<Self, TrackingError> {
        let result_type = ResultType::from_str(result_type)?;
        Self::create(result_type, name, detail)
    }

    pub fn create_with_clock(
        clock: Arc<dyn Clock>,
        result_type: ResultType,
        name: impl Into<String>,
        detail: Option<serde_json::Value>,
    ) -> Result<Self, TrackingError> {
        let name = validate_name(name.into())?;
        let id = TreeId::generate(clock.as_ref());
        let root = ResultNode::new(result_type, name, detail, clock.now(), None);
        debug!(tree = %id, result_type = %result_type, name = %root.name(), "result tree created");
        Ok(Self {
            id,
            nodes: vec![root],
            clock,
        })
    }

    /// Create a detached tree sharing this tree's clock.
    ///
    /// The returned tree is independent: it can be moved into another task,
    /// mutated there, and grafted back with [`ResultTree::attach`].
    pub fn fork(
        &self,
        result_type: ResultType,
        name: impl Into<String>,
        detail: Option<serde_json::Value>,
    ) -> Result<ResultTree, TrackingError> {
        Self::create_with_clock(Arc::clone(&self.clock), result_type, name, detail)
    }

    /// Copy of this tree with the same id. Stays inside the crate so two live
    /// trees never hand out interchangeable ids to callers.
    pub(crate) fn snapshot(&self) -> ResultTree {
        ResultTree {
            id: self.id,
            nodes: self.nodes.clone(),
            clock: Arc::clone(&self.clock),
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn root(&self) -> NodeId {
        NodeId::new(self.id, 0)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Result<&ResultNode, TrackingError> {
        let index = self.index_of(id)?;
        Ok(&self.nodes[index])
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], TrackingError> {
        Ok(self.node(id)?.children())
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, TrackingError> {
        Ok(self.node(id)?.parent())
    }

    /// Every node in arena order. A parent always precedes its children.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ResultNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId::new(self.id, index), node))
    }

    /// Depth-first, pre-order walk of the subtree rooted at `id`, children in
    /// insertion order.
    pub fn walk(&self, id: NodeId) -> Result<Preorder<'_>, TrackingError> {
        self.index_of(id)?;
        Ok(Preorder {
            tree: self,
            stack: vec![id],
        })
    }

    /// Append a new `INITIALIZED` child under `parent`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        result_type: ResultType,
        name: impl Into<String>,
        detail: Option<serde_json::Value>,
    ) -> Result<NodeId, TrackingError> {
        let parent_index = self.open_parent(parent)?;
        let name = validate_name(name.into())?;

        let child = NodeId::new(self.id, self.nodes.len());
        let node = ResultNode::new(result_type, name, detail, self.clock.now(), Some(parent));
        debug!(
            tree = %self.id,
            node = %child,
            parent = %parent,
            result_type = %result_type,
            name = %node.name(),
            "child added"
        );
        self.nodes.push(node);
        self.nodes[parent_index].children.push(child);
        Ok(child)
    }

    /// Graft `subtree` as the next child of `parent`.
    ///
    /// The subtree's nodes are moved into this arena and get new ids; the id
    /// of the grafted root is returned. Same rule as `add_child`: the parent
    /// must not be terminal.
    pub fn attach(&mut self, parent: NodeId, subtree: ResultTree) -> Result<NodeId, TrackingError> {
        let parent_index = self.open_parent(parent)?;

        let offset = self.nodes.len();
        let remap = |old: NodeId| NodeId::new(self.id, offset + old.index());
        let grafted: Vec<ResultNode> = subtree
            .nodes
            .into_iter()
            .map(|mut node| {
                node.parent = Some(node.parent.map_or(parent, remap));
                node.children = node.children.into_iter().map(remap).collect();
                node
            })
            .collect();

        let root = NodeId::new(self.id, offset);
        debug!(
            tree = %self.id,
            node = %root,
            parent = %parent,
            nodes = grafted.len(),
            from_tree = %subtree.id,
            "subtree attached"
        );
        self.nodes.extend(grafted);
        self.nodes[parent_index].children.push(root);
        Ok(root)
    }

    /// Set the detail payload of a node created without one. A JSON `null`
    /// leaves the node without detail.
    pub fn set_detail(&mut self, id: NodeId, detail: serde_json::Value) -> Result<(), TrackingError> {
        let index = self.index_of(id)?;
        let node = &mut self.nodes[index];
        if node.detail.is_some() {
            return Err(TrackingError::invalid_state(format!(
                "detail of {} {:?} is already set",
                node.result_type, node.name
            )));
        }
        node.detail = Some(detail).filter(|d| !d.is_null());
        Ok(())
    }

    /// Move a node forward through its lifecycle.
    ///
    /// - Leaving a terminal status, moving backward, or moving into `UNKNOWN`
    ///   is `InvalidState`. Use [`ResultTree::force_status`] for overrides.
    /// - `FAILURE`/`ERROR` require `error`; any other target rejects one.
    /// - Entering a terminal status stamps `ended_at`.
    ///
    /// On error the node is left untouched.
    pub fn set_status(
        &mut self,
        id: NodeId,
        status: ResultStatus,
        error: Option<ErrorObject>,
    ) -> Result<(), TrackingError> {
        let index = self.index_of(id)?;
        let now = self.clock.now();
        let node = &mut self.nodes[index];
        let from = node.status;

        if !from.can_transition_to(status) {
            return Err(TrackingError::invalid_state(format!(
                "{} {:?} cannot move from {from} to {status} without force",
                node.result_type, node.name
            )));
        }
        check_error_payload(node, status, error.as_ref())?;

        if from == status {
            return Ok(());
        }

        node.status = status;
        node.error = error;
        if status.is_terminal() {
            node.ended_at = Some(now.max(node.started_at));
        }
        debug!(tree = %self.id, node = %id, name = %node.name, %from, to = %status, "status changed");
        Ok(())
    }

    /// Override a node's status regardless of the lifecycle (abort, cleanup).
    ///
    /// Error-payload rules still apply. Every call is appended to the node's
    /// `overrides` log and emitted at WARN. A terminal target keeps an
    /// existing `ended_at`; a non-terminal target clears `ended_at`.
    pub fn force_status(
        &mut self,
        id: NodeId,
        status: ResultStatus,
        error: Option<ErrorObject>,
    ) -> Result<(), TrackingError> {
        let index = self.index_of(id)?;
        let now = self.clock.now();
        let node = &mut self.nodes[index];
        check_error_payload(node, status, error.as_ref())?;

        let from = node.status;
        node.overrides.push(StatusOverride {
            from,
            to: status,
            at: now,
        });
        node.status = status;
        node.error = error;
        if status.is_terminal() {
            if node.ended_at.is_none() {
                node.ended_at = Some(now.max(node.started_at));
            }
        } else {
            node.ended_at = None;
        }
        warn!(tree = %self.id, node = %id, name = %node.name, %from, to = %status, "status forced");
        Ok(())
    }

    /// Worst status across `id` and its descendants.
    ///
    /// A node whose own status is `FAILURE` or `ERROR` reports that status.
    /// Otherwise it reports the worst of its own status and its children's
    /// aggregates, ranked
    /// `ERROR > FAILURE > WARNING > SUCCESS > WAITING > INITIALIZED > UNKNOWN`.
    pub fn aggregate_status(&self, id: NodeId) -> Result<ResultStatus, TrackingError> {
        Ok(self.subtree_aggregates(id)?[&id])
    }

    /// Aggregate status of every node in the subtree rooted at `id`.
    ///
    /// Reverse pre-order visits every descendant before its ancestors, so one
    /// pass suffices and nodes outside the subtree are never touched.
    pub(crate) fn subtree_aggregates(&self, id: NodeId) -> Result<HashMap<NodeId, ResultStatus>, TrackingError> {
        let order: Vec<(NodeId, &ResultNode)> = self.walk(id)?.collect();
        let mut aggregates = HashMap::with_capacity(order.len());
        for &(node_id, node) in order.iter().rev() {
            let status = if node.status.is_failure() {
                node.status
            } else {
                node.children
                    .iter()
                    .fold(node.status, |worst, child| worst.worst(aggregates[child]))
            };
            aggregates.insert(node_id, status);
        }
        Ok(aggregates)
    }

    /// First node (pre-order, insertion order) whose own status is
    /// `FAILURE` or `ERROR`.
    pub fn find_first_failure(&self, id: NodeId) -> Result<Option<NodeId>, TrackingError> {
        Ok(self
            .walk(id)?
            .find(|(_, node)| node.is_failed())
            .map(|(found, _)| found))
    }

    /// Every failing node in the subtree with its error, in tree order.
    pub fn collect_errors(&self, id: NodeId) -> Result<Vec<(NodeId, &ErrorObject)>, TrackingError> {
        Ok(self
            .walk(id)?
            .filter(|(_, node)| node.is_failed())
            .filter_map(|(found, node)| node.error().map(|e| (found, e)))
            .collect())
    }

    fn index_of(&self, id: NodeId) -> Result<usize, TrackingError> {
        if id.tree() != self.id {
            return Err(TrackingError::invalid_argument(format!(
                "node {id} does not belong to {}",
                self.id
            )));
        }
        if id.index() >= self.nodes.len() {
            return Err(TrackingError::invalid_argument(format!("node {id} does not exist")));
        }
        Ok(id.index())
    }

    /// Resolve `parent` and make sure it can still take children.
    pub(crate) fn open_parent(&self, parent: NodeId) -> Result<usize, TrackingError> {
        let index = self.index_of(parent)?;
        let node = &self.nodes[index];
        if node.is_terminal() {
            return Err(TrackingError::invalid_state(format!(
                "{} {:?} is {} and cannot take new children",
                node.result_type, node.name, node.status
            )));
        }
        Ok(index)
    }
}

impl fmt::Debug for ResultTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultTree")
            .field("id", &self.id)
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

/// Pre-order iterator returned by [`ResultTree::walk`].
pub struct Preorder<'a> {
    tree: &'a ResultTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (NodeId, &'a ResultNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.index()];
        self.stack.extend(node.children.iter().rev().copied());
        Some((id, node))
    }
}

fn validate_name(name: String) -> Result<String, TrackingError> {
    if name.trim().is_empty() {
        return Err(TrackingError::invalid_argument("result name must not be empty"));
    }
    Ok(name)
}

fn check_error_payload(
    node: &ResultNode,
    status: ResultStatus,
    error: Option<&ErrorObject>,
) -> Result<(), TrackingError> {
    match (status.is_failure(), error.is_some()) {
        (true, false) => Err(TrackingError::invalid_argument(format!(
            "{} {:?}: {status} requires an error payload",
            node.result_type, node.name
        ))),
        (false, true) => Err(TrackingError::invalid_argument(format!(
            "{} {:?}: {status} does not carry an error payload",
            node.result_type, node.name
        ))),
        _ => Ok(()),
    }
}
