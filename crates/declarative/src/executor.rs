//! Execution engine - runs planned lifecycle operations with parallelism
//!
//! Instances of the same type are independent, so the operations run on a
//! rayon pool. Each instance is handled by exactly one thread; recorded
//! state is only mutated afterwards, on the calling thread.

use crate::context::{ApplyContext, CancelToken, ProgressCallback};
use crate::diagnostics::Diagnostics;
use crate::diff::{Plan, ResourceDiff};
use crate::resource::Resource;
use crate::types::{ApplyResult, ChangeAction, ExecuteOptions, ExecuteSummary};
use anyhow::Result;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Outcome of one instance operation
#[derive(Debug, Clone)]
pub struct InstanceReport {
    pub address: String,
    pub action: ChangeAction,
    pub result: ApplyResult,
    pub diagnostics: Diagnostics,
}

/// Everything an execution produced
#[derive(Debug, Clone, Default)]
pub struct ExecuteReport {
    pub summary: ExecuteSummary,
    pub instances: Vec<InstanceReport>,
}

impl ExecuteReport {
    fn push(&mut self, report: InstanceReport) {
        self.summary.add_result(&report.result);
        self.summary.warnings += report.diagnostics.warning_count();
        self.instances.push(report);
    }

    /// Merge another report into this one
    pub fn merge(&mut self, other: ExecuteReport) {
        self.summary.merge(&other.summary);
        self.instances.extend(other.instances);
    }
}

/// What to do with recorded state after an operation
enum StateChange<S> {
    Keep,
    Set(S),
    Remove,
}

/// Execute a plan for one resource type
///
/// `desired` and `state` are keyed by instance name. Instances whose
/// operation fails keep their previous state; a successful delete always
/// removes the instance from state.
pub fn execute<R, P>(
    resource: &R,
    plan: &Plan,
    desired: &BTreeMap<String, R::Config>,
    state: &mut BTreeMap<String, R::State>,
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    progress: &mut P,
) -> Result<ExecuteReport>
where
    R: Resource,
    P: ProgressCallback,
{
    let mut report = ExecuteReport::default();

    if opts.dry_run {
        for diff in &plan.diffs {
            let result = if diff.action.is_change() {
                ApplyResult::Skipped {
                    reason: "Dry run".into(),
                }
            } else {
                ApplyResult::NoChange
            };
            report.push(InstanceReport {
                address: diff.address(),
                action: diff.action,
                result,
                diagnostics: Diagnostics::new(),
            });
        }
        return Ok(report);
    }

    let ctx = ApplyContext::new(false, opts.verbose).with_cancel(cancel.clone());
    let shared_state: &BTreeMap<String, R::State> = state;

    progress.on_batch_start(plan.diffs.len());
    let results = run_batch(opts.jobs, &plan.diffs, progress, |diff| {
        let config = desired.get(&diff.name);
        let prior = shared_state.get(&diff.name);
        run_instance(resource, &ctx, diff, config, prior)
    })?;
    progress.on_batch_complete();

    for (name, instance, change) in results {
        match change {
            StateChange::Keep => {}
            StateChange::Set(value) => {
                state.insert(name, value);
            }
            StateChange::Remove => {
                state.remove(&name);
            }
        }
        report.push(instance);
    }

    Ok(report)
}

/// Refresh every recorded instance of one resource type
///
/// Drifted instances get their new state recorded and are reported as
/// [`ApplyResult::Drifted`].
pub fn refresh<R, P>(
    resource: &R,
    state: &mut BTreeMap<String, R::State>,
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    progress: &mut P,
) -> Result<ExecuteReport>
where
    R: Resource,
    P: ProgressCallback,
{
    let ctx = ApplyContext::new(opts.dry_run, opts.verbose).with_cancel(cancel.clone());
    let diffs: Vec<ResourceDiff> = state
        .keys()
        .map(|name| ResourceDiff {
            resource_type: resource.type_name().to_string(),
            name: name.clone(),
            action: ChangeAction::NoOp,
        })
        .collect();
    let shared_state: &BTreeMap<String, R::State> = state;

    progress.on_batch_start(diffs.len());
    let results = run_batch(opts.jobs, &diffs, progress, |diff| {
        let address = diff.address();
        let Some(prior) = shared_state.get(&diff.name) else {
            return (
                InstanceReport {
                    address,
                    action: diff.action,
                    result: ApplyResult::NoChange,
                    diagnostics: Diagnostics::new(),
                },
                StateChange::Keep,
            );
        };
        match resource.read(&ctx, prior) {
            Ok(outcome) => {
                let drifted = outcome.value != *prior;
                let (result, change) = if drifted {
                    log::info!("{address}: recorded state drifted");
                    (ApplyResult::Drifted, StateChange::Set(outcome.value))
                } else {
                    (ApplyResult::NoChange, StateChange::Keep)
                };
                (
                    InstanceReport {
                        address,
                        action: diff.action,
                        result,
                        diagnostics: outcome.diagnostics,
                    },
                    change,
                )
            }
            Err(e) => (failure(&ctx, address, diff.action, &e), StateChange::Keep),
        }
    })?;
    progress.on_batch_complete();

    let mut report = ExecuteReport::default();
    for (name, instance, change) in results {
        if !opts.dry_run
            && let StateChange::Set(value) = change
        {
            state.insert(name, value);
        }
        report.push(instance);
    }
    Ok(report)
}

/// Run `op` for every diff, sequentially or on a bounded pool
fn run_batch<P, S, F>(
    jobs: usize,
    diffs: &[ResourceDiff],
    progress: &mut P,
    op: F,
) -> Result<Vec<(String, InstanceReport, StateChange<S>)>>
where
    P: ProgressCallback,
    S: Send,
    F: Fn(&ResourceDiff) -> (InstanceReport, StateChange<S>) + Sync,
{
    if jobs <= 1 || diffs.len() <= 1 {
        let mut results = Vec::with_capacity(diffs.len());
        for diff in diffs {
            let address = diff.address();
            progress.on_resource_start(&address);
            let (report, change) = op(diff);
            progress.on_resource_complete(&address, &report.result);
            results.push((diff.name.clone(), report, change));
        }
        return Ok(results);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    // The progress callback isn't thread-safe, so results are reported
    // once the parallel section is over.
    let results: Vec<(String, InstanceReport, StateChange<S>)> = pool.install(|| {
        diffs
            .par_iter()
            .map(|diff| {
                let (report, change) = op(diff);
                (diff.name.clone(), report, change)
            })
            .collect()
    });

    for (_, report, _) in &results {
        progress.on_resource_complete(&report.address, &report.result);
    }

    Ok(results)
}

/// Run the lifecycle operation a diff calls for
fn run_instance<R: Resource>(
    resource: &R,
    ctx: &ApplyContext,
    diff: &ResourceDiff,
    config: Option<&R::Config>,
    prior: Option<&R::State>,
) -> (InstanceReport, StateChange<R::State>) {
    let address = diff.address();
    let report = |result, diagnostics| InstanceReport {
        address: address.clone(),
        action: diff.action,
        result,
        diagnostics,
    };

    match (diff.action, config, prior) {
        (ChangeAction::Create, Some(config), _) => {
            log::info!("{address}: creating");
            match resource.create(ctx, config) {
                Ok(outcome) => (
                    report(ApplyResult::Created, outcome.diagnostics),
                    StateChange::Set(outcome.value),
                ),
                Err(e) => (failure(ctx, address.clone(), diff.action, &e), StateChange::Keep),
            }
        }
        (ChangeAction::Update, Some(config), Some(prior)) => {
            log::info!("{address}: updating");
            match resource.update(ctx, config, prior) {
                Ok(outcome) => {
                    let result = if outcome.value == *prior {
                        ApplyResult::NoChange
                    } else {
                        ApplyResult::Modified
                    };
                    (report(result, outcome.diagnostics), StateChange::Set(outcome.value))
                }
                Err(e) => (failure(ctx, address.clone(), diff.action, &e), StateChange::Keep),
            }
        }
        (ChangeAction::Delete, _, Some(prior)) => {
            log::info!("{address}: deleting");
            match resource.delete(ctx, prior) {
                Ok(outcome) => (
                    report(ApplyResult::Removed, outcome.diagnostics),
                    StateChange::Remove,
                ),
                Err(e) => (failure(ctx, address.clone(), diff.action, &e), StateChange::Keep),
            }
        }
        (ChangeAction::NoOp, _, _) => (
            report(ApplyResult::NoChange, Diagnostics::new()),
            StateChange::Keep,
        ),
        _ => (
            report(
                ApplyResult::Skipped {
                    reason: "No configuration or state for this instance".into(),
                },
                Diagnostics::new(),
            ),
            StateChange::Keep,
        ),
    }
}

/// Report for a failed operation, telling cancellation apart from failure
fn failure(
    ctx: &ApplyContext,
    address: String,
    action: ChangeAction,
    error: &anyhow::Error,
) -> InstanceReport {
    let message = format!("{error:#}");
    let mut diagnostics = Diagnostics::new();
    let result = if ctx.cancel.is_canceled() {
        log::warn!("{address}: canceled: {message}");
        diagnostics.error("Operation Canceled", message.clone());
        ApplyResult::Canceled { error: message }
    } else {
        log::warn!("{address}: failed: {message}");
        diagnostics.error(format!("Failed to {action} {address}"), message.clone());
        ApplyResult::Failed { error: message }
    };
    InstanceReport {
        address,
        action,
        result,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::diagnostics::Outcome;
    use crate::diff::{compute_destroy_plan, compute_plan};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A resource backed by a counter of applied operations
    #[derive(Default)]
    struct TestResource {
        calls: AtomicUsize,
        fail_on: Option<String>,
        cancel_on_create: Option<CancelToken>,
        drift: bool,
        warn_on_delete: bool,
    }

    impl Resource for TestResource {
        type Config = String;
        type State = String;

        fn type_name(&self) -> &'static str {
            "test"
        }

        fn create(&self, ctx: &ApplyContext, config: &String) -> Result<Outcome<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = &self.cancel_on_create {
                token.cancel();
                ctx.cancel.check()?;
            }
            if self.fail_on.as_deref() == Some(config.as_str()) {
                anyhow::bail!("cannot create {config}");
            }
            Ok(Outcome::ok(config.clone()))
        }

        fn read(&self, _ctx: &ApplyContext, prior: &String) -> Result<Outcome<String>> {
            if self.drift {
                let mut diags = Diagnostics::new();
                diags.warn("File Hash Mismatch Detected", "");
                return Ok(Outcome::with_diagnostics(format!("{prior}*"), diags));
            }
            Ok(Outcome::ok(prior.clone()))
        }

        fn update(&self, _ctx: &ApplyContext, config: &String, _prior: &String) -> Result<Outcome<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::ok(config.clone()))
        }

        fn delete(&self, _ctx: &ApplyContext, _prior: &String) -> Result<Outcome<()>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut diags = Diagnostics::new();
            if self.warn_on_delete {
                diags.warn("Path Removal Failed", "permission denied");
            }
            Ok(Outcome::with_diagnostics((), diags))
        }

        fn needs_update(&self, config: &String, prior: &String) -> Result<bool> {
            Ok(config != prior)
        }
    }

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn converge(
        resource: &TestResource,
        desired: &BTreeMap<String, String>,
        state: &mut BTreeMap<String, String>,
        opts: &ExecuteOptions,
    ) -> ExecuteReport {
        let plan = compute_plan(resource, desired, state).unwrap();
        execute(
            resource,
            &plan,
            desired,
            state,
            opts,
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap()
    }

    #[test]
    fn test_execute_empty_plan() {
        let resource = TestResource::default();
        let mut state = BTreeMap::new();
        let report = converge(&resource, &BTreeMap::new(), &mut state, &ExecuteOptions::default());
        assert_eq!(report.summary.total(), 0);
    }

    #[test]
    fn test_execute_creates_updates_and_deletes() {
        let resource = TestResource::default();
        let desired = map(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let mut state = map(&[("b", "old"), ("c", "3"), ("gone", "x")]);

        let report = converge(&resource, &desired, &mut state, &ExecuteOptions::default());

        assert_eq!(report.summary.created, 1);
        assert_eq!(report.summary.modified, 1);
        assert_eq!(report.summary.removed, 1);
        assert_eq!(report.summary.no_change, 1);
        assert_eq!(state, desired);
        assert_eq!(resource.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_execute_sequential_matches_parallel() {
        let resource = TestResource::default();
        let desired = map(&[("a", "1"), ("b", "2")]);
        let mut state = BTreeMap::new();
        let opts = ExecuteOptions {
            jobs: 1,
            ..Default::default()
        };

        let report = converge(&resource, &desired, &mut state, &opts);
        assert_eq!(report.summary.created, 2);
        assert_eq!(state, desired);
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let resource = TestResource::default();
        let desired = map(&[("a", "1")]);
        let mut state = BTreeMap::new();
        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };

        let report = converge(&resource, &desired, &mut state, &opts);
        assert_eq!(report.summary.skipped, 1);
        assert!(state.is_empty());
        assert_eq!(resource.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_create_keeps_state_unchanged() {
        let resource = TestResource {
            fail_on: Some("bad".into()),
            ..Default::default()
        };
        let desired = map(&[("good", "ok"), ("broken", "bad")]);
        let mut state = BTreeMap::new();

        let report = converge(&resource, &desired, &mut state, &ExecuteOptions::default());

        assert_eq!(report.summary.created, 1);
        assert_eq!(report.summary.failed, 1);
        assert!(state.contains_key("good"));
        assert!(!state.contains_key("broken"));
        let failed = report
            .instances
            .iter()
            .find(|i| i.address == "test.broken")
            .unwrap();
        assert!(failed.diagnostics.has_errors());
    }

    #[test]
    fn test_cancellation_is_reported_separately() {
        let token = CancelToken::new();
        let resource = TestResource {
            cancel_on_create: Some(token.clone()),
            ..Default::default()
        };
        let desired = map(&[("a", "1")]);
        let mut state = BTreeMap::new();
        let plan = compute_plan(&resource, &desired, &state).unwrap();

        let report = execute(
            &resource,
            &plan,
            &desired,
            &mut state,
            &ExecuteOptions::default(),
            &token,
            &mut NoProgress,
        )
        .unwrap();

        assert_eq!(report.summary.canceled, 1);
        assert_eq!(report.summary.failed, 0);
        assert!(state.is_empty());
    }

    #[test]
    fn test_delete_with_warnings_still_leaves_state() {
        let resource = TestResource {
            warn_on_delete: true,
            ..Default::default()
        };
        let mut state = map(&[("a", "1")]);
        let plan = compute_destroy_plan(&resource, &state);

        let report = execute(
            &resource,
            &plan,
            &BTreeMap::new(),
            &mut state,
            &ExecuteOptions::default(),
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap();

        assert!(state.is_empty());
        assert_eq!(report.summary.removed, 1);
        assert_eq!(report.summary.warnings, 1);
    }

    #[test]
    fn test_refresh_records_drift() {
        let resource = TestResource {
            drift: true,
            ..Default::default()
        };
        let mut state = map(&[("a", "1")]);

        let report = refresh(
            &resource,
            &mut state,
            &ExecuteOptions::default(),
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap();

        assert_eq!(report.summary.drifted, 1);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(state["a"], "1*");
    }

    #[test]
    fn test_refresh_without_drift() {
        let resource = TestResource::default();
        let mut state = map(&[("a", "1")]);

        let report = refresh(
            &resource,
            &mut state,
            &ExecuteOptions::default(),
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap();

        assert_eq!(report.summary.no_change, 1);
        assert_eq!(state["a"], "1");
    }
}
