//! # Declarative
//!
//! A framework for managing resources through a four-operation lifecycle.
//!
//! ## Core Concepts
//!
//! - **Resource**: A resource type with typed `Config` (declared) and `State`
//!   (recorded), managed through create / read / update / delete
//! - **DataSource**: A read-only query producing typed output
//! - **Function**: A provider function with argument-indexed errors
//! - **Plan**: Actions computed by comparing declared configuration with
//!   recorded state
//! - **Executor**: Runs a plan with bounded parallelism and folds the results
//!   back into state
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{compute_plan, execute, CancelToken, ExecuteOptions, NoProgress};
//!
//! let plan = compute_plan(&resource, &desired, &state)?;
//! let report = execute(
//!     &resource,
//!     &plan,
//!     &desired,
//!     &mut state,
//!     &ExecuteOptions::default(),
//!     &CancelToken::new(),
//!     &mut NoProgress,
//! )?;
//! println!("{} changed", report.summary.total_changes());
//! ```
//!
//! ## Outcomes and cancellation
//!
//! Operations return an [`Outcome`]: the value plus any [`Diagnostics`]
//! produced along the way, so "done", "done with warnings" and "aborted"
//! stay distinguishable. Long operations call [`CancelToken::check`] at their
//! checkpoints; a canceled token surfaces as [`ApplyResult::Canceled`]
//! rather than a plain failure.
//!
//! ## Provider Traits
//!
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks.

pub mod context;
pub mod diagnostics;
pub mod diff;
pub mod executor;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, CancelToken, Canceled, ConfirmCallback, NoProgress,
    ProgressCallback,
};
pub use diagnostics::{Completion, Diagnostic, Diagnostics, Outcome, Severity};
pub use diff::{
    compute_destroy_plan, compute_plan, DiffSummary, Plan, ResourceDiff,
};
pub use executor::{execute, refresh, ExecuteReport, InstanceReport};
pub use resource::{DataSource, Function, FunctionError, Resource};
pub use types::{ApplyResult, ChangeAction, ExecuteOptions, ExecuteSummary};
