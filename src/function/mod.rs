//! Provider functions
//!
//! Each function reports failures as a [`declarative::FunctionError`]
//! carrying the 1-based position of the offending argument.

pub mod http_request;
pub mod path_exists;
pub mod path_owner;
pub mod path_permission;

pub use http_request::{HttpRequest, HttpRequestArgs, HttpResponse};
pub use path_exists::{PathExists, PathExistsOutput};
pub use path_owner::PathOwner;
pub use path_permission::PathPermission;
