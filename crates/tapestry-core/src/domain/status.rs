//! Result status: lifecycle states a unit of work can occupy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::TrackingError;

/// Lifecycle state of a result node.
///
/// State transitions:
/// - Initialized -> Waiting -> {Success | Failure | Warning | Error}
/// - Initialized -> {Success | Failure | Warning | Error}
/// - Unknown is a sentinel: never a target of a normal transition.
///
/// Serialized as SCREAMING_SNAKE_CASE (`"SUCCESS"`, `"WAITING"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    /// Not yet classified, or state was lost.
    Unknown,

    /// Created, nothing dispatched yet.
    Initialized,

    /// Asynchronous work has been dispatched.
    Waiting,

    Success,
    Failure,
    Warning,
    Error,
}

impl ResultStatus {
    pub const ALL: [ResultStatus; 7] = [
        ResultStatus::Unknown,
        ResultStatus::Initialized,
        ResultStatus::Waiting,
        ResultStatus::Success,
        ResultStatus::Failure,
        ResultStatus::Warning,
        ResultStatus::Error,
    ];

    /// Is this a terminal state (no further transitions without force)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResultStatus::Success
                | ResultStatus::Failure
                | ResultStatus::Warning
                | ResultStatus::Error
        )
    }

    /// Does this status require (and permit) an error payload?
    pub fn is_failure(self) -> bool {
        matches!(self, ResultStatus::Failure | ResultStatus::Error)
    }

    /// Position in the normal lifecycle. Terminal states share the last step.
    fn lifecycle_step(self) -> u8 {
        match self {
            ResultStatus::Unknown => 0,
            ResultStatus::Initialized => 1,
            ResultStatus::Waiting => 2,
            _ => 3,
        }
    }

    /// Can a node move from `self` to `next` without force?
    pub fn can_transition_to(self, next: ResultStatus) -> bool {
        if self.is_terminal() || next == ResultStatus::Unknown {
            return false;
        }
        next.lifecycle_step() >= self.lifecycle_step()
    }

    /// Rank used for aggregation: higher is worse.
    ///
    /// ERROR > FAILURE > WARNING > SUCCESS > WAITING > INITIALIZED > UNKNOWN
    pub fn severity(self) -> u8 {
        match self {
            ResultStatus::Unknown => 0,
            ResultStatus::Initialized => 1,
            ResultStatus::Waiting => 2,
            ResultStatus::Success => 3,
            ResultStatus::Warning => 4,
            ResultStatus::Failure => 5,
            ResultStatus::Error => 6,
        }
    }

    /// The worse of two statuses under [`ResultStatus::severity`].
    pub fn worst(self, other: ResultStatus) -> ResultStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Unknown => "UNKNOWN",
            ResultStatus::Initialized => "INITIALIZED",
            ResultStatus::Waiting => "WAITING",
            ResultStatus::Success => "SUCCESS",
            ResultStatus::Failure => "FAILURE",
            ResultStatus::Warning => "WARNING",
            ResultStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultStatus {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResultStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TrackingError::invalid_argument(format!("unrecognized result status: {s:?}")))
    }
}
