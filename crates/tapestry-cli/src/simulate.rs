//! Simulated deploy steps.
//!
//! Nothing is actually deployed: each task sleeps a little, records one
//! `ACTION` child per step, and fails or warns when told to on the command
//! line.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tapestry_core::{Completion, ErrorObject, ResultStatus, ResultTree, ResultType, UnitOfWork};

/// Which task/step names should fail or warn.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub fail: HashSet<String>,
    pub warn: HashSet<String>,
}

impl Faults {
    fn fails(&self, name: &str) -> bool {
        self.fail.contains(name)
    }

    fn warns(&self, name: &str) -> bool {
        self.warn.contains(name)
    }
}

pub struct SimulatedTask {
    name: &'static str,
    steps: &'static [&'static str],
    delay: Duration,
    faults: Arc<Faults>,
}

impl SimulatedTask {
    pub fn new(
        name: &'static str,
        steps: &'static [&'static str],
        delay_ms: u64,
        faults: Arc<Faults>,
    ) -> Self {
        Self {
            name,
            steps,
            delay: Duration::from_millis(delay_ms),
            faults,
        }
    }
}

#[async_trait]
impl UnitOfWork for SimulatedTask {
    fn result_type(&self) -> ResultType {
        ResultType::Task
    }

    fn name(&self) -> &str {
        self.name
    }

    fn detail(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "steps": self.steps,
            "delay_ms": self.delay.as_millis() as u64,
        }))
    }

    async fn run(&self, scope: &mut ResultTree) -> Result<Completion, ErrorObject> {
        let root = scope.root();
        let mut warned = self.faults.warns(self.name);

        for &step in self.steps {
            tokio::time::sleep(self.delay).await;
            let action = scope
                .add_child(root, ResultType::Action, step, None)
                .map_err(|e| ErrorObject::from_error(&e))?;

            if self.faults.fails(step) {
                let cause = ErrorObject::new(format!("{step} exited with status 1"))
                    .with_detail(serde_json::json!({ "exit_code": 1 }));
                scope
                    .set_status(action, ResultStatus::Failure, Some(cause.clone()))
                    .map_err(|e| ErrorObject::from_error(&e))?;
                return Err(ErrorObject::new(format!("step {step} failed")).with_cause(cause));
            }

            let status = if self.faults.warns(step) {
                warned = true;
                ResultStatus::Warning
            } else {
                ResultStatus::Success
            };
            scope
                .set_status(action, status, None)
                .map_err(|e| ErrorObject::from_error(&e))?;
        }

        if self.faults.fails(self.name) {
            return Err(ErrorObject::new(format!("{} rejected by remote", self.name)));
        }
        Ok(if warned {
            Completion::Warning
        } else {
            Completion::Success
        })
    }
}
