//! Lifecycle commands
//!
//! - `plan` - Show what apply would change
//! - `apply` - Make the filesystem match the configuration
//! - `refresh` - Re-read recorded instances and record drift
//! - `destroy` - Delete recorded instances
//!
//! Directories are applied before archives, so an extraction may land inside
//! a managed directory; destroy runs in the opposite order.

use super::{PromptConfirm, Workspace};
use crate::Context;
use crate::cli::{ApplyArgs, DestroyArgs, TargetArgs};
use crate::config::ProviderConfig;
use crate::ownership::{self, OwnershipProvider};
use crate::progress::ApplyProgress;
use crate::provider::ARCHIVE_KINDS;
use crate::resource::{DirectoryConfig, ExtractArchive, ExtractConfig, LocalDirectory};
use crate::ui;
use anyhow::{Result, bail};
use declarative::{
    ApplyResult, AutoConfirm, CancelToken, ConfirmCallback, DiffSummary, ExecuteOptions,
    ExecuteReport, ExecuteSummary, Plan, Resource, ResourceDiff, compute_destroy_plan,
    compute_plan, execute, refresh as refresh_instances,
};
use extractkit::{ArchiveKind, Client};
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Resources and Plans
// ============================================================================

/// One resource value per managed type
pub struct Resources {
    directory: LocalDirectory,
    extracts: Vec<ExtractArchive>,
}

impl Resources {
    pub fn new(config: &ProviderConfig, ownership: Arc<dyn OwnershipProvider>) -> Self {
        let timeout = config.http_timeout();
        let protected = config.protected_paths();
        log::debug!(
            "Protected paths: {}",
            protected.iter().collect::<Vec<_>>().join(", ")
        );
        Self {
            directory: LocalDirectory::new(ownership, protected),
            extracts: ARCHIVE_KINDS
                .iter()
                .map(|&kind| ExtractArchive::new(kind, Client::with_timeout(timeout)))
                .collect(),
        }
    }

    fn extract(&self, kind: ArchiveKind) -> Option<&ExtractArchive> {
        self.extracts.iter().find(|r| r.kind() == kind)
    }
}

/// Planned work across every resource type
struct FullPlan {
    directories: Plan,
    desired_directories: BTreeMap<String, DirectoryConfig>,
    extracts: Vec<(ArchiveKind, Plan, BTreeMap<String, ExtractConfig>)>,
}

impl FullPlan {
    /// Plan converging recorded state to the configuration
    fn converge(resources: &Resources, ws: &Workspace, targets: &[String]) -> Result<Self> {
        let desired_directories = ws.config.desired_directories()?;
        let mut directories = compute_plan(
            &resources.directory,
            &desired_directories,
            &ws.state.local_directory,
        )?;
        directories.retain_targets(targets);

        let mut extracts = Vec::new();
        for resource in &resources.extracts {
            let kind = resource.kind();
            let desired = ws.config.desired_extracts(kind)?;
            let mut plan = compute_plan(resource, &desired, ws.state.extracts(kind))?;
            plan.retain_targets(targets);
            extracts.push((kind, plan, desired));
        }

        Ok(Self {
            directories,
            desired_directories,
            extracts,
        })
    }

    /// Plan deleting every recorded instance
    fn destroy(resources: &Resources, ws: &Workspace, targets: &[String]) -> Self {
        let mut directories = compute_destroy_plan(&resources.directory, &ws.state.local_directory);
        directories.retain_targets(targets);

        let extracts = resources
            .extracts
            .iter()
            .map(|resource| {
                let kind = resource.kind();
                let mut plan = compute_destroy_plan(resource, ws.state.extracts(kind));
                plan.retain_targets(targets);
                (kind, plan, BTreeMap::new())
            })
            .collect();

        Self {
            directories,
            desired_directories: BTreeMap::new(),
            extracts,
        }
    }

    fn diffs(&self) -> Vec<&ResourceDiff> {
        self.directories
            .diffs
            .iter()
            .chain(self.extracts.iter().flat_map(|(_, plan, _)| plan.diffs.iter()))
            .collect()
    }

    fn summary(&self) -> DiffSummary {
        let mut all = self.directories.clone();
        for (_, plan, _) in &self.extracts {
            all.merge(plan.clone());
        }
        all.summary()
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Show what apply would change
pub fn plan(ctx: &Context, args: TargetArgs) -> Result<()> {
    let ws = Workspace::load(ctx)?;
    let resources = Resources::new(&ws.config, ownership::detect());
    let plan = FullPlan::converge(&resources, &ws, &args.target)?;

    show_plan(&plan);
    Ok(())
}

/// Make the filesystem match the configuration
pub fn apply(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let mut ws = Workspace::load(ctx)?;
    let resources = Resources::new(&ws.config, ownership::detect());
    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args
            .jobs
            .or(ws.config.provider.jobs)
            .unwrap_or(ExecuteOptions::default().jobs),
        verbose: ctx.verbose > 0,
    };

    let summary = if args.yes || args.dry_run {
        apply_with(ctx, &mut ws, &resources, &args.target, &opts, &mut AutoConfirm)?
    } else {
        apply_with(ctx, &mut ws, &resources, &args.target, &opts, &mut PromptConfirm)?
    };
    finish(&summary, "Apply")
}

/// Re-read every recorded instance and record drift
pub fn refresh(ctx: &Context, args: TargetArgs) -> Result<()> {
    let mut ws = Workspace::load_optional(ctx)?;
    let resources = Resources::new(&ws.config, ownership::detect());

    let summary = refresh_with(ctx, &mut ws, &resources, &args.target)?;
    finish(&summary, "Refresh")
}

/// Delete every recorded instance
pub fn destroy(ctx: &Context, args: DestroyArgs) -> Result<()> {
    let mut ws = Workspace::load_optional(ctx)?;
    let resources = Resources::new(&ws.config, ownership::detect());

    let summary = if args.yes {
        destroy_with(ctx, &mut ws, &resources, &args.target, &mut AutoConfirm)?
    } else {
        destroy_with(ctx, &mut ws, &resources, &args.target, &mut PromptConfirm)?
    };
    finish(&summary, "Destroy")
}

// ============================================================================
// Drivers
// ============================================================================

fn apply_with<C: ConfirmCallback>(
    ctx: &Context,
    ws: &mut Workspace,
    resources: &Resources,
    targets: &[String],
    opts: &ExecuteOptions,
    confirm: &mut C,
) -> Result<ExecuteSummary> {
    let plan = FullPlan::converge(resources, ws, targets)?;
    show_plan(&plan);

    let planned = plan.summary();
    if !planned.has_changes() {
        return Ok(ExecuteSummary::default());
    }
    if opts.dry_run {
        ui::info("Dry run: no changes made");
        return Ok(ExecuteSummary::default());
    }
    if !confirm.confirm(&format!("Apply {} change(s)?", planned.total()))? {
        ui::info("Apply canceled");
        return Ok(ExecuteSummary::default());
    }

    let cancel = ctx.cancel_token();
    let mut report = run(
        &resources.directory,
        &plan.directories,
        &plan.desired_directories,
        &mut ws.state.local_directory,
        opts,
        &cancel,
        ctx.quiet,
    )?;
    for (kind, kind_plan, desired) in &plan.extracts {
        let Some(resource) = resources.extract(*kind) else {
            continue;
        };
        report.merge(run(
            resource,
            kind_plan,
            desired,
            ws.state.extracts_mut(*kind),
            opts,
            &cancel,
            ctx.quiet,
        )?);
    }

    ws.save_state()?;
    print_report(&report);
    Ok(report.summary)
}

fn destroy_with<C: ConfirmCallback>(
    ctx: &Context,
    ws: &mut Workspace,
    resources: &Resources,
    targets: &[String],
    confirm: &mut C,
) -> Result<ExecuteSummary> {
    let plan = FullPlan::destroy(resources, ws, targets);
    show_plan(&plan);

    let planned = plan.summary();
    if !planned.has_changes() {
        return Ok(ExecuteSummary::default());
    }
    if !confirm.confirm(&format!("Destroy {} instance(s)?", planned.removals))? {
        ui::info("Destroy canceled");
        return Ok(ExecuteSummary::default());
    }

    let opts = ExecuteOptions {
        verbose: ctx.verbose > 0,
        ..ExecuteOptions::default()
    };
    let cancel = ctx.cancel_token();
    let mut report = ExecuteReport::default();
    for (kind, kind_plan, desired) in &plan.extracts {
        let Some(resource) = resources.extract(*kind) else {
            continue;
        };
        report.merge(run(
            resource,
            kind_plan,
            desired,
            ws.state.extracts_mut(*kind),
            &opts,
            &cancel,
            ctx.quiet,
        )?);
    }
    report.merge(run(
        &resources.directory,
        &plan.directories,
        &plan.desired_directories,
        &mut ws.state.local_directory,
        &opts,
        &cancel,
        ctx.quiet,
    )?);

    ws.save_state()?;
    print_report(&report);
    Ok(report.summary)
}

fn refresh_with(
    ctx: &Context,
    ws: &mut Workspace,
    resources: &Resources,
    targets: &[String],
) -> Result<ExecuteSummary> {
    let opts = ExecuteOptions {
        verbose: ctx.verbose > 0,
        ..ExecuteOptions::default()
    };
    let cancel = ctx.cancel_token();

    let mut report = refresh_targets(
        &resources.directory,
        &mut ws.state.local_directory,
        targets,
        &opts,
        &cancel,
        ctx.quiet,
    )?;
    for resource in &resources.extracts {
        report.merge(refresh_targets(
            resource,
            ws.state.extracts_mut(resource.kind()),
            targets,
            &opts,
            &cancel,
            ctx.quiet,
        )?);
    }

    if report.summary.drifted > 0 {
        ws.save_state()?;
    }
    print_report(&report);
    Ok(report.summary)
}

fn run<R: Resource>(
    resource: &R,
    plan: &Plan,
    desired: &BTreeMap<String, R::Config>,
    state: &mut BTreeMap<String, R::State>,
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    quiet: bool,
) -> Result<ExecuteReport> {
    if plan.diffs.is_empty() {
        return Ok(ExecuteReport::default());
    }
    let mut progress = ApplyProgress::new(resource.type_name(), quiet);
    execute(resource, plan, desired, state, opts, cancel, &mut progress)
}

/// Refresh the targeted instances of one type, or all of them
fn refresh_targets<R: Resource>(
    resource: &R,
    state: &mut BTreeMap<String, R::State>,
    targets: &[String],
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    quiet: bool,
) -> Result<ExecuteReport> {
    let mut progress = ApplyProgress::new(resource.type_name(), quiet);
    if targets.is_empty() {
        return refresh_instances(resource, state, opts, cancel, &mut progress);
    }

    let type_name = resource.type_name();
    let mut selected: BTreeMap<String, R::State> = state
        .iter()
        .filter(|(name, _)| {
            targets
                .iter()
                .any(|t| t == *name || *t == format!("{type_name}.{name}"))
        })
        .map(|(name, record)| (name.clone(), record.clone()))
        .collect();
    if selected.is_empty() {
        return Ok(ExecuteReport::default());
    }

    let report = refresh_instances(resource, &mut selected, opts, cancel, &mut progress)?;
    state.extend(selected);
    Ok(report)
}

// ============================================================================
// Output
// ============================================================================

fn show_plan(plan: &FullPlan) {
    let summary = plan.summary();
    if !summary.has_changes() {
        ui::success("No changes. The filesystem matches the configuration.");
        return;
    }

    ui::header("Plan");
    for diff in plan.diffs().into_iter().filter(|d| d.action.is_change()) {
        ui::change(diff.action, &diff.address());
    }
    println!();
    ui::info(&format!(
        "{} to add, {} to change, {} to destroy",
        summary.additions, summary.modifications, summary.removals
    ));
}

fn print_report(report: &ExecuteReport) {
    for instance in &report.instances {
        let address = &instance.address;
        match &instance.result {
            ApplyResult::Created => ui::success(&format!("{address}: created")),
            ApplyResult::Modified => ui::success(&format!("{address}: updated")),
            ApplyResult::Removed => ui::success(&format!("{address}: destroyed")),
            ApplyResult::Drifted => ui::warn(&format!("{address}: changed outside of utilities")),
            ApplyResult::Skipped { reason } => ui::dim(&format!("{address}: skipped ({reason})")),
            ApplyResult::NoChange | ApplyResult::Failed { .. } | ApplyResult::Canceled { .. } => {}
        }
        for diag in instance.diagnostics.iter() {
            ui::diagnostic(address, diag);
        }
    }
}

fn finish(summary: &ExecuteSummary, operation: &str) -> Result<()> {
    if summary.total() == 0 {
        return Ok(());
    }

    ui::section(&format!("{operation} complete"));
    ui::kv("created", &summary.created.to_string());
    ui::kv("updated", &summary.modified.to_string());
    ui::kv("destroyed", &summary.removed.to_string());
    if summary.drifted > 0 {
        ui::kv("drifted", &summary.drifted.to_string());
    }
    if summary.warnings > 0 {
        ui::kv("warnings", &summary.warnings.to_string());
    }

    if !summary.is_success() {
        bail!(
            "{operation} finished with {} failed and {} canceled instance(s)",
            summary.failed,
            summary.canceled
        );
    }
    Ok(())
}
