use declarative::{ApplyContext, Function, FunctionError, Outcome};
use serde::Serialize;
use std::fs;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PathExistsOutput {
    pub exists: bool,
}

/// `path_exists(path)`
///
/// Anything but "not found" counts as existing, so a path hidden behind a
/// permission error is reported present.
pub struct PathExists;

impl Function for PathExists {
    type Args = String;
    type Output = PathExistsOutput;

    fn name(&self) -> &'static str {
        "path_exists"
    }

    fn summary(&self) -> &'static str {
        "Checks if a given path exists"
    }

    fn call(&self, _ctx: &ApplyContext, path: String) -> Result<Outcome<PathExistsOutput>, FunctionError> {
        log::debug!("Checking if {path} exists");
        let exists = match fs::metadata(&path) {
            Ok(_) => true,
            Err(e) => e.kind() != io::ErrorKind::NotFound,
        };
        Ok(Outcome::ok(PathExistsOutput { exists }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exists(path: &str) -> bool {
        PathExists
            .call(&ApplyContext::default(), path.to_string())
            .unwrap()
            .value
            .exists
    }

    #[test]
    fn test_existing_paths() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f");
        fs::write(&file, "x").unwrap();

        assert!(exists(&temp.path().to_string_lossy()));
        assert!(exists(&file.to_string_lossy()));
    }

    #[test]
    fn test_missing_path() {
        let temp = TempDir::new().unwrap();
        assert!(!exists(&temp.path().join("nope").to_string_lossy()));
        assert!(!exists(""));
    }
}
