//! package registry protocol: store content travels as versioned
//! packages, one package per composable plus one for the index document

mod http;
mod publish;
mod sync;
mod tarball;

pub use http::{HttpRegistry, DEFAULT_REGISTRY};
pub use publish::{publish_store, PublishOptions, PublishReport};
pub use sync::{fetch_index, sync, SourceSpec, SyncEvent, SyncOptions, SyncSource};

use semver::Version;

use crate::error::Result;

/// a single file carried inside a package artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageFile {
    /// path inside the package, relative to its root
    pub path: String,
    pub data: Vec<u8>,
}

impl PackageFile {
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }
}

/// the registry surface the publisher and the sync client drive
pub trait Registry {
    /// published versions of a package, sorted ascending, or None when
    /// the package does not exist at all
    fn versions(&self, name: &str) -> Result<Option<Vec<Version>>>;

    /// publish one new version carrying the given files; the registry
    /// rejects a version that already exists
    fn publish(&self, name: &str, version: &Version, files: &[PackageFile], token: &str)
        -> Result<()>;

    /// payload of one file from the most recently published version,
    /// or None when the package does not exist
    fn download_latest(&self, name: &str, path: &str) -> Result<Option<Vec<u8>>>;
}

/// package name carrying one composable
pub fn chunk_package(scope: &str, hash: &str) -> String {
    format!("@{}/{}", scope, hash)
}

/// package name carrying the index document
pub fn index_package(scope: &str, index_name: &str) -> String {
    format!("@{}/{}", scope, index_name)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_names() {
        assert_eq!(chunk_package("myorg", "0mdqa9w1p6"), "@myorg/0mdqa9w1p6");
        assert_eq!(index_package("myorg", "nereid.json"), "@myorg/nereid.json");
    }
}
