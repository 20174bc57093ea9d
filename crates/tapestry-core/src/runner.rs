//! Runner: drive units of work and record their outcomes in a result tree.
//!
//! Each unit runs inside its own forked subtree, so concurrent units never
//! touch the same node:
//! 1. fork one subtree per unit (`INITIALIZED` -> `WAITING`), all of them
//!    before any unit starts
//! 2. run units (sequentially or spawned on tokio)
//! 3. join, then attach every subtree under the parent in dispatch order
//!
//! Nothing here fails the parent when a unit fails; that decision stays with
//! the caller.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::domain::{ErrorObject, NodeId, ResultStatus, ResultType, TrackingError};
use crate::tree::ResultTree;

/// How a unit finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Success,
    Warning,
}

impl From<Completion> for ResultStatus {
    fn from(completion: Completion) -> Self {
        match completion {
            Completion::Success => ResultStatus::Success,
            Completion::Warning => ResultStatus::Warning,
        }
    }
}

/// A trackable piece of work.
///
/// `run` receives the unit's own subtree; its root is the unit's node, so the
/// unit can hang its own children off `scope.root()`. Returning `Err` marks
/// the node `FAILURE` with that error. A unit that already put its root in a
/// terminal status keeps it.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn result_type(&self) -> ResultType;

    fn name(&self) -> &str;

    fn detail(&self) -> Option<serde_json::Value> {
        None
    }

    async fn run(&self, scope: &mut ResultTree) -> Result<Completion, ErrorObject>;
}

/// Run one unit and attach its subtree under `parent`.
pub async fn run_unit(
    tree: &mut ResultTree,
    parent: NodeId,
    unit: &dyn UnitOfWork,
) -> Result<NodeId, TrackingError> {
    tree.open_parent(parent)?;
    let scope = dispatch(tree, unit)?;
    let scope = track(scope, unit).await;
    tree.attach(parent, scope)
}

/// Run `units` concurrently and attach their subtrees under `parent` in the
/// order given, whatever order they finish in.
///
/// Every unit is validated before any of them starts: if one cannot be
/// tracked (an empty name, say) nothing runs and the tree is unchanged. Once
/// started, every unit ends up attached. A unit that panics is recorded as an
/// `ERROR` node carrying the join error, timed from its dispatch.
pub async fn run_concurrent(
    tree: &mut ResultTree,
    parent: NodeId,
    units: Vec<Arc<dyn UnitOfWork>>,
) -> Result<Vec<NodeId>, TrackingError> {
    tree.open_parent(parent)?;

    let scopes = units
        .iter()
        .map(|unit| dispatch(&*tree, unit.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    // What each unit looked like when it was dispatched, for units that never
    // hand their scope back.
    let mut dispatched = Vec::with_capacity(scopes.len());
    let mut handles = Vec::with_capacity(scopes.len());
    for (unit, scope) in units.into_iter().zip(scopes) {
        dispatched.push((unit.name().to_string(), scope.snapshot()));
        handles.push(tokio::spawn(async move { track(scope, unit.as_ref()).await }));
    }

    info!(parent = %parent, units = handles.len(), "dispatched concurrent units");
    let joined = join_all(handles).await;

    let mut attached = Vec::with_capacity(joined.len());
    for (result, (name, mut placeholder)) in joined.into_iter().zip(dispatched) {
        let scope = match result {
            Ok(scope) => scope,
            Err(join_error) => {
                warn!(unit = %name, error = %join_error, "unit did not complete");
                abandon(
                    &mut placeholder,
                    ErrorObject::new("unit did not complete").with_cause(ErrorObject::from_error(&join_error)),
                );
                placeholder
            }
        };
        attached.push(tree.attach(parent, scope)?);
    }
    Ok(attached)
}

/// Fork the unit's scope and mark it `WAITING`.
fn dispatch(tree: &ResultTree, unit: &dyn UnitOfWork) -> Result<ResultTree, TrackingError> {
    let mut scope = tree.fork(unit.result_type(), unit.name(), unit.detail())?;
    let root = scope.root();
    scope.set_status(root, ResultStatus::Waiting, None)?;
    Ok(scope)
}

#[instrument(name = "unit", skip_all, fields(name = %unit.name(), result_type = %unit.result_type()))]
async fn track(mut scope: ResultTree, unit: &dyn UnitOfWork) -> ResultTree {
    if let Err(error) = settle(&mut scope, unit).await {
        warn!(error = %error, "unit could not be tracked");
        abandon(
            &mut scope,
            ErrorObject::new("unit could not be tracked").with_cause(ErrorObject::from_error(&error)),
        );
    }
    scope
}

async fn settle(scope: &mut ResultTree, unit: &dyn UnitOfWork) -> Result<(), TrackingError> {
    let root = scope.root();
    let outcome = unit.run(scope).await;

    if scope.node(root)?.is_terminal() {
        info!(status = %scope.node(root)?.status(), "unit settled its own status");
        return Ok(());
    }
    match outcome {
        Ok(completion) => {
            let status = ResultStatus::from(completion);
            scope.set_status(root, status, None)?;
            info!(%status, "unit finished");
        }
        Err(error) => {
            warn!(error = %error, "unit failed");
            scope.set_status(root, ResultStatus::Failure, Some(error))?;
        }
    }
    Ok(())
}

/// Mark the scope's root `ERROR`, forcing it if the unit already settled it.
fn abandon(scope: &mut ResultTree, error: ErrorObject) {
    let root = scope.root();
    let result = match scope.set_status(root, ResultStatus::Error, Some(error.clone())) {
        Err(TrackingError::InvalidState { .. }) => scope.force_status(root, ResultStatus::Error, Some(error)),
        other => other,
    };
    if let Err(error) = result {
        warn!(error = %error, "could not mark unit as errored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{Clock, FixedClock};
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Step {
        name: &'static str,
        delay_ms: u64,
        outcome: Result<Completion, &'static str>,
    }

    impl Step {
        fn ok(name: &'static str, delay_ms: u64) -> Arc<dyn UnitOfWork> {
            Arc::new(Self {
                name,
                delay_ms,
                outcome: Ok(Completion::Success),
            })
        }

        fn failing(name: &'static str, reason: &'static str) -> Arc<dyn UnitOfWork> {
            Arc::new(Self {
                name,
                delay_ms: 0,
                outcome: Err(reason),
            })
        }
    }

    #[async_trait]
    impl UnitOfWork for Step {
        fn result_type(&self) -> ResultType {
            ResultType::Task
        }

        fn name(&self) -> &str {
            self.name
        }

        fn detail(&self) -> Option<serde_json::Value> {
            Some(serde_json::json!({ "delay_ms": self.delay_ms }))
        }

        async fn run(&self, _scope: &mut ResultTree) -> Result<Completion, ErrorObject> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.outcome.map_err(ErrorObject::new)
        }
    }

    /// Adds two actions under its own node; the second one warns.
    struct Bundle;

    #[async_trait]
    impl UnitOfWork for Bundle {
        fn result_type(&self) -> ResultType {
            ResultType::TaskBundle
        }

        fn name(&self) -> &str {
            "bundle"
        }

        async fn run(&self, scope: &mut ResultTree) -> Result<Completion, ErrorObject> {
            let root = scope.root();
            let fetch = scope
                .add_child(root, ResultType::Action, "fetch", None)
                .map_err(|e| ErrorObject::from_error(&e))?;
            scope
                .set_status(fetch, ResultStatus::Success, None)
                .map_err(|e| ErrorObject::from_error(&e))?;
            let unpack = scope
                .add_child(root, ResultType::Action, "unpack", None)
                .map_err(|e| ErrorObject::from_error(&e))?;
            scope
                .set_status(unpack, ResultStatus::Warning, None)
                .map_err(|e| ErrorObject::from_error(&e))?;
            Ok(Completion::Warning)
        }
    }

    struct Panics;

    #[async_trait]
    impl UnitOfWork for Panics {
        fn result_type(&self) -> ResultType {
            ResultType::Worker
        }

        fn name(&self) -> &str {
            "panics"
        }

        async fn run(&self, _scope: &mut ResultTree) -> Result<Completion, ErrorObject> {
            panic!("worker blew up");
        }
    }

    /// Settles its own root and then reports success anyway.
    struct SelfSettling;

    #[async_trait]
    impl UnitOfWork for SelfSettling {
        fn result_type(&self) -> ResultType {
            ResultType::Function
        }

        fn name(&self) -> &str {
            "self-settling"
        }

        async fn run(&self, scope: &mut ResultTree) -> Result<Completion, ErrorObject> {
            let root = scope.root();
            scope
                .set_status(root, ResultStatus::Error, Some(ErrorObject::new("decided early")))
                .map_err(|e| ErrorObject::from_error(&e))?;
            Ok(Completion::Success)
        }
    }

    /// Counts how many times it actually ran.
    struct Counted {
        name: &'static str,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl UnitOfWork for Counted {
        fn result_type(&self) -> ResultType {
            ResultType::Task
        }

        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, _scope: &mut ResultTree) -> Result<Completion, ErrorObject> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(Completion::Success)
        }
    }

    /// Lets time pass on a fixed clock, then panics.
    struct SlowPanic {
        clock: Arc<FixedClock>,
    }

    #[async_trait]
    impl UnitOfWork for SlowPanic {
        fn result_type(&self) -> ResultType {
            ResultType::Worker
        }

        fn name(&self) -> &str {
            "slow-panic"
        }

        async fn run(&self, _scope: &mut ResultTree) -> Result<Completion, ErrorObject> {
            self.clock.advance(chrono::Duration::milliseconds(50));
            panic!("worker blew up late");
        }
    }

    fn root_tree() -> ResultTree {
        ResultTree::create(ResultType::Command, "deploy", None).unwrap()
    }

    #[tokio::test]
    async fn run_unit_tracks_success() {
        let mut tree = root_tree();
        let root = tree.root();
        let unit = Step::ok("validate", 0);

        let id = run_unit(&mut tree, root, unit.as_ref()).await.unwrap();

        let node = tree.node(id).unwrap();
        assert_eq!(node.status(), ResultStatus::Success);
        assert_eq!(node.result_type(), ResultType::Task);
        assert_eq!(node.detail().unwrap()["delay_ms"], 0);
        assert!(node.ended_at().is_some());
        assert_eq!(tree.children(root).unwrap(), &[id]);
    }

    #[tokio::test]
    async fn run_unit_turns_err_into_failure() {
        let mut tree = root_tree();
        let root = tree.root();
        let unit = Step::failing("push", "conflict");

        let id = run_unit(&mut tree, root, unit.as_ref()).await.unwrap();

        let node = tree.node(id).unwrap();
        assert_eq!(node.status(), ResultStatus::Failure);
        assert_eq!(node.error().unwrap().message, "conflict");
        // Parent is left alone.
        assert_eq!(tree.node(root).unwrap().status(), ResultStatus::Initialized);
    }

    #[tokio::test]
    async fn run_unit_keeps_nested_children() {
        let mut tree = root_tree();
        let root = tree.root();

        let id = run_unit(&mut tree, root, &Bundle).await.unwrap();

        let names: Vec<_> = tree.walk(id).unwrap().map(|(_, n)| n.name().to_string()).collect();
        assert_eq!(names, vec!["bundle", "fetch", "unpack"]);
        assert_eq!(tree.node(id).unwrap().status(), ResultStatus::Warning);
        assert_eq!(tree.aggregate_status(root).unwrap(), ResultStatus::Warning);
    }

    #[tokio::test]
    async fn run_unit_respects_self_settled_status() {
        let mut tree = root_tree();
        let root = tree.root();

        let id = run_unit(&mut tree, root, &SelfSettling).await.unwrap();
        assert_eq!(tree.node(id).unwrap().status(), ResultStatus::Error);
    }

    #[tokio::test]
    async fn run_unit_on_terminal_parent_is_invalid_state() {
        let mut tree = root_tree();
        let root = tree.root();
        tree.set_status(root, ResultStatus::Success, None).unwrap();

        let err = run_unit(&mut tree, root, Step::ok("late", 0).as_ref()).await.unwrap_err();
        assert!(matches!(err, TrackingError::InvalidState { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_units_attach_in_dispatch_order() {
        let mut tree = root_tree();
        let root = tree.root();
        let units = vec![
            Step::ok("slow", 60),
            Step::failing("broken", "conflict"),
            Step::ok("fast", 0),
        ];

        let ids = run_concurrent(&mut tree, root, units).await.unwrap();

        assert_eq!(tree.children(root).unwrap(), ids.as_slice());
        let names: Vec<_> = ids.iter().map(|id| tree.node(*id).unwrap().name().to_string()).collect();
        assert_eq!(names, vec!["slow", "broken", "fast"]);
        assert_eq!(tree.find_first_failure(root).unwrap(), Some(ids[1]));
        assert_eq!(tree.aggregate_status(root).unwrap(), ResultStatus::Failure);
        assert_eq!(tree.summary(root).unwrap().failed_child_count, 1);
    }

    #[tokio::test]
    async fn panicking_unit_becomes_error_node() {
        let mut tree = root_tree();
        let root = tree.root();
        let units: Vec<Arc<dyn UnitOfWork>> = vec![Step::ok("fine", 0), Arc::new(Panics)];

        let ids = run_concurrent(&mut tree, root, units).await.unwrap();

        assert_eq!(tree.node(ids[0]).unwrap().status(), ResultStatus::Success);
        let crashed = tree.node(ids[1]).unwrap();
        assert_eq!(crashed.name(), "panics");
        assert_eq!(crashed.status(), ResultStatus::Error);
        assert_eq!(crashed.error().unwrap().message, "unit did not complete");
        assert!(crashed.error().unwrap().cause.is_some());
    }

    #[tokio::test]
    async fn invalid_unit_stops_the_batch_before_anything_runs() {
        let mut tree = root_tree();
        let root = tree.root();
        let runs = Arc::new(AtomicUsize::new(0));
        let units: Vec<Arc<dyn UnitOfWork>> = vec![
            Arc::new(Counted {
                name: "build",
                runs: runs.clone(),
            }),
            Arc::new(Counted {
                name: "",
                runs: runs.clone(),
            }),
        ];

        let err = run_concurrent(&mut tree, root, units).await.unwrap_err();
        assert!(matches!(err, TrackingError::InvalidArgument { .. }));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(tree.children(root).unwrap().is_empty());
        assert_eq!(tree.node_count(), 1);
    }

    #[tokio::test]
    async fn every_started_unit_is_attached_after_a_panic() {
        let mut tree = root_tree();
        let root = tree.root();
        let runs = Arc::new(AtomicUsize::new(0));
        let units: Vec<Arc<dyn UnitOfWork>> = vec![
            Arc::new(Panics),
            Arc::new(Counted {
                name: "build",
                runs: runs.clone(),
            }),
            Step::failing("push", "conflict"),
        ];

        let ids = run_concurrent(&mut tree, root, units).await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let statuses: Vec<_> = ids.iter().map(|id| tree.node(*id).unwrap().status()).collect();
        assert_eq!(
            statuses,
            vec![ResultStatus::Error, ResultStatus::Success, ResultStatus::Failure]
        );
    }

    #[tokio::test]
    async fn panicking_unit_is_timed_from_dispatch() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()));
        let mut tree =
            ResultTree::create_with_clock(clock.clone(), ResultType::Command, "deploy", None).unwrap();
        let root = tree.root();
        let dispatched_at = clock.now();
        let units: Vec<Arc<dyn UnitOfWork>> = vec![Arc::new(SlowPanic { clock: clock.clone() })];

        let ids = run_concurrent(&mut tree, root, units).await.unwrap();

        let crashed = tree.node(ids[0]).unwrap();
        assert_eq!(crashed.status(), ResultStatus::Error);
        assert_eq!(crashed.started_at(), dispatched_at);
        assert_eq!(crashed.duration_ms(), Some(50));
    }

    #[test]
    fn abandon_forces_a_settled_scope() {
        let mut scope = ResultTree::create(ResultType::Task, "build", None).unwrap();
        let root = scope.root();
        scope.set_status(root, ResultStatus::Success, None).unwrap();

        abandon(&mut scope, ErrorObject::new("unit could not be tracked"));

        let node = scope.node(root).unwrap();
        assert_eq!(node.status(), ResultStatus::Error);
        assert_eq!(node.error().unwrap().message, "unit could not be tracked");
        assert_eq!(node.overrides().len(), 1);
    }

    #[test]
    fn abandon_moves_a_waiting_scope_without_force() {
        let mut scope = ResultTree::create(ResultType::Task, "build", None).unwrap();
        let root = scope.root();
        scope.set_status(root, ResultStatus::Waiting, None).unwrap();

        abandon(&mut scope, ErrorObject::new("unit did not complete"));

        let node = scope.node(root).unwrap();
        assert_eq!(node.status(), ResultStatus::Error);
        assert!(node.overrides().is_empty());
    }

    #[tokio::test]
    async fn no_units_is_a_no_op() {
        let mut tree = root_tree();
        let root = tree.root();
        let ids = run_concurrent(&mut tree, root, Vec::new()).await.unwrap();
        assert!(ids.is_empty());
        assert_eq!(tree.node_count(), 1);
    }
}
