//! Resource, data source and function traits
//!
//! A [`Resource`] owns a piece of the outside world through four lifecycle
//! operations. The orchestrator keeps the recorded state; resources only
//! receive it and hand back a replacement.

use crate::context::ApplyContext;
use crate::diagnostics::Outcome;
use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// A managed resource type
///
/// One value of the implementing type serves every instance of the
/// resource type; instance data lives in `Config` (declared) and `State`
/// (recorded).
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, Outcome, Resource};
///
/// struct Marker;
///
/// impl Resource for Marker {
///     type Config = String;
///     type State = String;
///
///     fn type_name(&self) -> &'static str { "marker" }
///
///     fn create(&self, _ctx: &ApplyContext, config: &String) -> anyhow::Result<Outcome<String>> {
///         std::fs::write(config, b"")?;
///         Ok(Outcome::ok(config.clone()))
///     }
///     // ...
/// }
/// ```
pub trait Resource: Send + Sync {
    /// Declared configuration of one instance
    type Config: Clone + fmt::Debug + PartialEq + Send + Sync;

    /// Recorded state of one instance
    type State: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync;

    /// Resource type name, e.g. `utilities_extract_zip`
    fn type_name(&self) -> &'static str;

    /// Reject invalid configuration before any I/O happens
    fn validate(&self, _config: &Self::Config) -> Result<()> {
        Ok(())
    }

    /// Bring a new instance into existence
    fn create(&self, ctx: &ApplyContext, config: &Self::Config) -> Result<Outcome<Self::State>>;

    /// Refresh recorded state from the real world
    ///
    /// Returning a value different from `prior` signals drift.
    fn read(&self, ctx: &ApplyContext, prior: &Self::State) -> Result<Outcome<Self::State>>;

    /// Converge an existing instance to new configuration
    fn update(
        &self,
        ctx: &ApplyContext,
        config: &Self::Config,
        prior: &Self::State,
    ) -> Result<Outcome<Self::State>>;

    /// Remove an instance
    ///
    /// Once this returns `Ok` the instance leaves state, even when the
    /// outcome carries warnings about leftovers.
    fn delete(&self, ctx: &ApplyContext, prior: &Self::State) -> Result<Outcome<()>>;

    /// Whether `update` has work to do
    fn needs_update(&self, config: &Self::Config, prior: &Self::State) -> Result<bool>;
}

/// A read-only query with typed arguments and output
pub trait DataSource: Send + Sync {
    type Args;
    type Output: Serialize;

    /// Data source type name, e.g. `utilities_bcrypt_hash`
    fn type_name(&self) -> &'static str;

    fn read(&self, ctx: &ApplyContext, args: Self::Args) -> Result<Outcome<Self::Output>>;
}

/// Error returned by a provider function
///
/// `argument` is the 1-based position of the argument at fault, if any.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FunctionError {
    pub argument: Option<usize>,
    pub message: String,
}

impl FunctionError {
    /// Error attributed to one argument
    pub fn argument(position: usize, message: impl Into<String>) -> Self {
        Self {
            argument: Some(position),
            message: message.into(),
        }
    }

    /// Error not attributed to any argument
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            argument: None,
            message: message.into(),
        }
    }
}

/// A pure-ish provider function
///
/// Functions may still produce a value together with error diagnostics
/// (an HTTP fallback body, for instance), so they return an [`Outcome`].
pub trait Function: Send + Sync {
    type Args;
    type Output: Serialize;

    fn name(&self) -> &'static str;

    fn summary(&self) -> &'static str;

    fn call(
        &self,
        ctx: &ApplyContext,
        args: Self::Args,
    ) -> std::result::Result<Outcome<Self::Output>, FunctionError>;
}
