//! Result type: what kind of unit of work produced a result.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::TrackingError;

/// Classification tag for a result node.
///
/// Used for filtering and rendering only; never for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultType {
    Action,
    Command,
    Engine,
    Executor,
    Function,
    Generator,
    Initializer,
    Interview,
    Prompt,
    Recipe,
    Task,
    #[serde(rename = "TASKBUNDLE")]
    TaskBundle,
    Utility,
    Worker,
    Unknown,
}

impl ResultType {
    pub const ALL: [ResultType; 15] = [
        ResultType::Action,
        ResultType::Command,
        ResultType::Engine,
        ResultType::Executor,
        ResultType::Function,
        ResultType::Generator,
        ResultType::Initializer,
        ResultType::Interview,
        ResultType::Prompt,
        ResultType::Recipe,
        ResultType::Task,
        ResultType::TaskBundle,
        ResultType::Utility,
        ResultType::Worker,
        ResultType::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResultType::Action => "ACTION",
            ResultType::Command => "COMMAND",
            ResultType::Engine => "ENGINE",
            ResultType::Executor => "EXECUTOR",
            ResultType::Function => "FUNCTION",
            ResultType::Generator => "GENERATOR",
            ResultType::Initializer => "INITIALIZER",
            ResultType::Interview => "INTERVIEW",
            ResultType::Prompt => "PROMPT",
            ResultType::Recipe => "RECIPE",
            ResultType::Task => "TASK",
            ResultType::TaskBundle => "TASKBUNDLE",
            ResultType::Utility => "UTILITY",
            ResultType::Worker => "WORKER",
            ResultType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultType {
    type Err = TrackingError;

    /// Accepts only the exact upper-case names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResultType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| TrackingError::invalid_argument(format!("unrecognized result type: {s:?}")))
    }
}
