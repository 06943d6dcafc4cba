//! Managed resource types
//!
//! - `utilities_extract_zip`, `utilities_extract_tar_gz`, `utilities_extract_tar`:
//!   archive extraction with drift detection ([`extract_archive`])
//! - `utilities_local_directory`: a directory with ownership and permissions
//!   ([`local_directory`])

pub mod extract_archive;
pub mod local_directory;

pub use extract_archive::{ExtractArchive, ExtractConfig, ExtractionRecord};
pub use local_directory::{DirectoryConfig, DirectoryRecord, LocalDirectory};
