use crate::ownership;
use declarative::{ApplyContext, Function, FunctionError, Outcome};
use std::fs;

/// `path_permission(path)`: permission bits as a 4-digit octal string
pub struct PathPermission;

impl Function for PathPermission {
    type Args = String;
    type Output = String;

    fn name(&self) -> &'static str {
        "path_permission"
    }

    fn summary(&self) -> &'static str {
        "Returns the permissions of a given path"
    }

    fn call(&self, _ctx: &ApplyContext, path: String) -> Result<Outcome<String>, FunctionError> {
        if path.is_empty() {
            return Err(FunctionError::argument(1, "Path cannot be empty"));
        }

        let metadata = fs::metadata(&path).map_err(|e| {
            FunctionError::argument(1, format!("Error retrieving path information: {e}"))
        })?;

        let permissions = ownership::permission_string(&metadata);
        log::debug!("{path} has permissions {permissions}");
        Ok(Outcome::ok(permissions))
    }
}
