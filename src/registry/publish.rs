use std::fs;
use std::path::Path;

use semver::Version;

use crate::error::{Error, IoResultExt, Result};
use crate::registry::{chunk_package, index_package, PackageFile, Registry};
use crate::store::ChunkStore;
use crate::types::DEFAULT_INDEX_NAME;

/// options for one publish invocation
#[derive(Clone, Debug)]
pub struct PublishOptions {
    /// scope the packages live under, with or without the leading `@`
    pub scope: String,
    /// index document file name under the store root
    pub index: String,
    /// registry auth token
    pub token: String,
}

impl PublishOptions {
    pub fn new(scope: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            index: DEFAULT_INDEX_NAME.to_string(),
            token: token.into(),
        }
    }
}

/// what one publish run did
#[derive(Clone, Debug)]
pub struct PublishReport {
    /// composables uploaded by this run
    pub published: usize,
    /// composables the registry already had
    pub skipped: usize,
    /// package name of the index artifact
    pub index_name: String,
    /// version the index document was published at
    pub index_version: Version,
}

/// upload every chunk the registry is missing, then the index document
///
/// a chunk artifact is immutable: it is published once at 0.0.1 and
/// skipped forever after. the index artifact gets a fresh patch bump
/// each run so clients always see the newest document.
pub fn publish_store(
    registry: &dyn Registry,
    root: &Path,
    options: &PublishOptions,
    mut progress: impl FnMut(&str),
) -> Result<PublishReport> {
    if options.token.is_empty() {
        return Err(Error::MissingToken);
    }
    let scope = options.scope.trim_start_matches('@');

    let index_path = root.join(&options.index);
    if !index_path.exists() {
        return Err(Error::IndexNotFound(index_path));
    }

    let store = ChunkStore::at_root(root);
    let mut published = 0;
    let mut skipped = 0;

    for hash in store.list()? {
        let name = chunk_package(scope, &hash);
        if registry.versions(&name)?.is_some() {
            skipped += 1;
            continue;
        }
        let data = store.read(&hash)?;
        registry.publish(
            &name,
            &Version::new(0, 0, 1),
            &[PackageFile::new(hash.clone(), data)],
            &options.token,
        )?;
        progress(&hash);
        published += 1;
    }

    let index_name = index_package(scope, &options.index);
    let index_version = next_index_version(registry, &index_name)?;
    let data = fs::read(&index_path).with_path(&index_path)?;
    registry.publish(
        &index_name,
        &index_version,
        &[PackageFile::new(options.index.clone(), data)],
        &options.token,
    )?;

    Ok(PublishReport {
        published,
        skipped,
        index_name,
        index_version,
    })
}

/// patch bump over the highest published version, 0.0.1 for a fresh name
fn next_index_version(registry: &dyn Registry, name: &str) -> Result<Version> {
    let next = match registry.versions(name)?.as_deref() {
        Some([.., last]) => Version::new(last.major, last.minor, last.patch + 1),
        _ => Version::new(0, 0, 1),
    };
    Ok(next)
}
