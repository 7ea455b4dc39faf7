//! nereid - content-addressable directory store over a package registry
//!
//! a directory tree is snapshotted into a deduplicated chunk store plus a JSON
//! index document; chunks and index then travel to other machines as versioned
//! packages on an npm-compatible registry.
//!
//! # Core concepts
//!
//! - **Bucket**: a named snapshot of one directory tree, one entry in the
//!   index document's bucket map
//! - **Composable**: a fixed-offset chunk of file content, stored once per
//!   distinct hash no matter how often it appears
//! - **Chunk store**: the flat `store/` directory of hash-named chunk files
//! - **Index document**: the versioned JSON document describing every bucket
//!   and every composable of a store
//!
//! # Hash format
//!
//! every hash is SHA-256 rendered in nix-style base32 (52 characters). a
//! file's hash covers its full content, a symlink's hash covers its target
//! text, and a folder's hash covers its children's hashes sorted
//! lexicographically and concatenated.
//!
//! # Example usage
//!
//! ```no_run
//! use std::path::Path;
//!
//! use nereid::ops::{build, BuildOptions};
//!
//! // snapshot ./data into the store at ./nereid, as bucket "data"
//! build(Path::new("./data"), Path::new("./nereid"), &BuildOptions::default()).unwrap();
//! ```

mod error;
mod hash;
mod store;
mod types;

pub mod ops;
pub mod registry;

pub use error::{Error, Result};
pub use hash::{hash_bytes, hash_file, hash_text, HashMode};
pub use store::{ChunkStore, STORE_DIR};
pub use types::{Composable, ComposableTable, Index, Node, DEFAULT_INDEX_NAME, INDEX_VERSION};
