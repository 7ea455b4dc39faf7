//! high-level operations on nereid stores

mod build;
mod extract;

pub use build::{build, build_tree, BuildOptions, DEFAULT_CHUNK_SIZE};
pub use extract::extract;
