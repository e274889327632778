//! Filesystem primitives shared by the install cache, state files and
//! archives.

pub mod atomic;
pub mod digest;
pub mod extract;
pub mod lock;

pub use atomic::write_atomic;
pub use digest::tree_digest;
pub use extract::{extract_tar_gz, ExtractError};
pub use lock::FileLock;
