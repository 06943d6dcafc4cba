use crate::ownership::{NOT_AVAILABLE, OwnershipProvider};
use declarative::{ApplyContext, Function, FunctionError, Outcome};
use std::path::Path;
use std::sync::Arc;

/// `path_owner(path)`: name of the user owning a path
pub struct PathOwner {
    ownership: Arc<dyn OwnershipProvider>,
}

impl PathOwner {
    pub fn new(ownership: Arc<dyn OwnershipProvider>) -> Self {
        Self { ownership }
    }
}

impl Function for PathOwner {
    type Args = String;
    type Output = String;

    fn name(&self) -> &'static str {
        "path_owner"
    }

    fn summary(&self) -> &'static str {
        "Returns the owner of a given path"
    }

    fn call(&self, _ctx: &ApplyContext, path: String) -> Result<Outcome<String>, FunctionError> {
        if path.is_empty() {
            return Err(FunctionError::argument(1, "Path cannot be empty"));
        }

        let owner = self.ownership.owner(Path::new(&path)).map_err(|e| {
            log::error!("Error retrieving path information for {path}: {e:#}");
            FunctionError::argument(1, "Error retrieving path information")
        })?;

        let Some((uid, _gid)) = owner else {
            return Ok(Outcome::ok(NOT_AVAILABLE.to_string()));
        };

        let user = self.ownership.user_name(uid).map_err(|e| {
            log::error!("Error retrieving owner of {path} (uid {uid}): {e:#}");
            FunctionError::argument(1, "Error retrieving file owner information")
        })?;

        log::debug!("{path} is owned by {user}");
        Ok(Outcome::ok(user))
    }
}
