//! # Adapters
//!
//! Concrete implementations of the outbound ports plus the filesystem,
//! archive and HTTP plumbing the pipeline runs on.

pub mod archive;
pub mod clock;
pub mod fs;
pub mod keygen;
pub mod object_store;
pub mod release;
pub mod template;

pub use archive::{create_tar_gz, extract_tar_gz, sha256_file};
pub use clock::SystemClock;
pub use keygen::ClientKeyGenerator;
pub use object_store::{FsObjectStore, HttpObjectStore};
pub use release::{unpack, ReleaseFetcher};
pub use template::load_template;
