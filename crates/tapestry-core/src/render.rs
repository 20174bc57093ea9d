//! Views over a result tree for renderers: a nested structured rendering and
//! a flat per-node summary.
//!
//! Both are plain serde data. How they end up on a terminal is the caller's
//! business; `RenderedNode`'s `Display` is only a minimal outline.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ErrorObject, NodeId, ResultStatus, ResultType, TrackingError};
use crate::tree::ResultTree;

/// What to include in [`ResultTree::render_tree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub include_detail: bool,
    pub include_timings: bool,

    /// Keep only nodes that failed or have a failed descendant. The node the
    /// rendering starts from is always kept.
    pub failures_only: bool,
}

impl RenderOptions {
    pub fn verbose() -> Self {
        Self {
            include_detail: true,
            include_timings: true,
            failures_only: false,
        }
    }
}

/// One node of a rendered tree, children nested in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedNode {
    #[serde(rename = "type")]
    pub result_type: ResultType,
    pub name: String,
    pub status: ResultStatus,
    pub aggregate_status: ResultStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderedNode>,
}

impl RenderedNode {
    /// Nodes in this rendering, self included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(RenderedNode::node_count).sum::<usize>()
    }

    /// Indented plain-text outline, one line per node.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    fn write_outline(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(
            f,
            "{:indent$}{} ({}) {}",
            "",
            self.name,
            self.result_type,
            self.status,
            indent = depth * 2
        )?;
        if self.aggregate_status != self.status {
            write!(f, " [{}]", self.aggregate_status)?;
        }
        if let Some(ms) = self.duration_ms {
            write!(f, " {ms}ms")?;
        }
        if let Some(error) = &self.error {
            write!(f, " - {error}")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, " {detail}")?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.write_outline(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for RenderedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_outline(f, 0)
    }
}

/// Flat snapshot of one node and its direct children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub status: ResultStatus,
    #[serde(rename = "type")]
    pub result_type: ResultType,
    pub name: String,
    /// `None` until the node reaches a terminal status.
    pub duration_ms: Option<u64>,
    pub child_count: usize,
    /// Direct children whose own status is FAILURE or ERROR.
    pub failed_child_count: usize,
}

impl ResultTree {
    /// Render the subtree rooted at `id` depth-first, children in insertion
    /// order. Pure: reads current state only.
    pub fn render_tree(&self, id: NodeId, options: RenderOptions) -> Result<RenderedNode, TrackingError> {
        let aggregates = self.subtree_aggregates(id)?;
        self.render_node(id, &aggregates, &options)
    }

    fn render_node(
        &self,
        id: NodeId,
        aggregates: &HashMap<NodeId, ResultStatus>,
        options: &RenderOptions,
    ) -> Result<RenderedNode, TrackingError> {
        let node = self.node(id)?;
        let aggregate_of = |n: NodeId| aggregates[&n];

        let mut children = Vec::with_capacity(node.children().len());
        for &child in node.children() {
            if options.failures_only && !aggregate_of(child).is_failure() {
                continue;
            }
            children.push(self.render_node(child, aggregates, options)?);
        }

        let timings = options.include_timings;
        Ok(RenderedNode {
            result_type: node.result_type(),
            name: node.name().to_string(),
            status: node.status(),
            aggregate_status: aggregate_of(id),
            detail: node.detail().filter(|_| options.include_detail).cloned(),
            started_at: timings.then(|| node.started_at()),
            ended_at: node.ended_at().filter(|_| timings),
            duration_ms: node.duration_ms().filter(|_| timings),
            error: node.error().cloned(),
            children,
        })
    }

    /// Snapshot of `id`: own status, timing, and direct-child counts.
    pub fn summary(&self, id: NodeId) -> Result<NodeSummary, TrackingError> {
        let node = self.node(id)?;
        let mut failed_child_count = 0;
        for &child in node.children() {
            if self.node(child)?.is_failed() {
                failed_child_count += 1;
            }
        }
        Ok(NodeSummary {
            status: node.status(),
            result_type: node.result_type(),
            name: node.name().to_string(),
            duration_ms: node.duration_ms(),
            child_count: node.children().len(),
            failed_child_count,
        })
    }
}
