//! Result node: one execution record inside a result tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ErrorObject;
use super::ids::NodeId;
use super::result_type::ResultType;
use super::status::ResultStatus;

/// Audit entry for a forced status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusOverride {
    pub from: ResultStatus,
    pub to: ResultStatus,
    pub at: DateTime<Utc>,
}

/// One tracked unit of work.
///
/// Fields are private: every mutation goes through [`crate::tree::ResultTree`]
/// so the status state machine cannot be bypassed.
#[derive(Debug, Clone)]
pub struct ResultNode {
    pub(crate) result_type: ResultType,
    pub(crate) name: String,
    pub(crate) detail: Option<serde_json::Value>,
    pub(crate) status: ResultStatus,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) ended_at: Option<DateTime<Utc>>,
    pub(crate) error: Option<ErrorObject>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) overrides: Vec<StatusOverride>,
}

impl ResultNode {
    pub(crate) fn new(
        result_type: ResultType,
        name: String,
        detail: Option<serde_json::Value>,
        started_at: DateTime<Utc>,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            result_type,
            name,
            detail: detail.filter(|d| !d.is_null()),
            status: ResultStatus::Initialized,
            started_at,
            ended_at: None,
            error: None,
            children: Vec::new(),
            parent,
            overrides: Vec::new(),
        }
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn detail(&self) -> Option<&serde_json::Value> {
        self.detail.as_ref()
    }

    /// The node's own status (see `ResultTree::aggregate_status` for the
    /// subtree view).
    pub fn status(&self) -> ResultStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Wall time between start and end, once the node has ended.
    pub fn duration_ms(&self) -> Option<u64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
    }

    pub fn error(&self) -> Option<&ErrorObject> {
        self.error.as_ref()
    }

    /// Child ids in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Non-owning back-reference. `None` for a root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Forced transitions applied to this node, oldest first.
    pub fn overrides(&self) -> &[StatusOverride] {
        &self.overrides
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_failed(&self) -> bool {
        self.status.is_failure()
    }
}
