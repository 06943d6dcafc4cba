//! Read-only data sources
//!
//! - `utilities_local_directory`: facts about a directory
//! - `utilities_bcrypt_hash`: a stable bcrypt hash of a plaintext

pub mod bcrypt_hash;
pub mod local_directory;

pub use bcrypt_hash::{BcryptHash, BcryptHashArgs, BcryptHashOutput};
pub use local_directory::{DirectoryInfo, LocalDirectoryData};
