use std::fs;
use std::path::PathBuf;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::{hash_bytes, HashMode};
use crate::ops::extract;
use crate::registry::{chunk_package, index_package, Registry, DEFAULT_REGISTRY};
use crate::store::ChunkStore;
use crate::types::{Index, DEFAULT_INDEX_NAME};

/// lifecycle notification from one sync run
#[derive(Debug)]
pub enum SyncEvent {
    /// one composable finished downloading
    Composable { hash: String },
    /// the whole operation failed; terminal
    Failed { error: Error },
    /// the whole operation completed; terminal
    Done { output: PathBuf },
}

/// a `<scope>` or `<scope>@<registry-url>` source argument, parsed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceSpec {
    /// package scope, without the leading `@`
    pub scope: String,
    /// registry base url
    pub registry: String,
}

impl SourceSpec {
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim().trim_start_matches('@');
        let (scope, registry) = match trimmed.split_once('@') {
            Some((scope, url)) => (scope, url),
            None => (trimmed, DEFAULT_REGISTRY),
        };
        if scope.is_empty() || registry.is_empty() {
            return Err(Error::InvalidSource(text.to_string()));
        }
        Ok(Self {
            scope: scope.to_string(),
            registry: registry.to_string(),
        })
    }
}

/// one registry a sync run may pull from
pub struct SyncSource<'a> {
    pub registry: &'a dyn Registry,
    /// package scope on that registry, without the leading `@`
    pub scope: String,
}

impl<'a> SyncSource<'a> {
    pub fn new(registry: &'a dyn Registry, scope: impl Into<String>) -> Self {
        Self {
            registry,
            scope: scope.into(),
        }
    }
}

/// options for sync and fetch_index
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// destination root holding the index document and the chunk store
    pub output: PathBuf,
    /// index document file name
    pub index: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from("nereid"),
            index: DEFAULT_INDEX_NAME.to_string(),
        }
    }
}

/// download one bucket from the first source able to serve it
///
/// missing composables are fetched into the local store, the index
/// document is written under the output root, and the tree is
/// reconstructed at `<output>/<bucket>`. progress is reported through
/// `on_event`: one `Composable` per downloaded chunk, then exactly one
/// terminal event, `Done` with the reconstruction path or `Failed`
/// with the error. never both.
pub fn sync(
    bucket: &str,
    sources: &[SyncSource<'_>],
    options: &SyncOptions,
    mut on_event: impl FnMut(SyncEvent),
) {
    match sync_inner(bucket, sources, options, &mut on_event) {
        Ok(output) => on_event(SyncEvent::Done { output }),
        Err(error) => on_event(SyncEvent::Failed { error }),
    }
}

fn sync_inner(
    bucket: &str,
    sources: &[SyncSource<'_>],
    options: &SyncOptions,
    on_event: &mut impl FnMut(SyncEvent),
) -> Result<PathBuf> {
    let index = resolve_index(sources, &options.index)?;
    let node = index
        .buckets
        .get(bucket)
        .ok_or_else(|| Error::BucketNotFound(bucket.to_string()))?;

    let store = ChunkStore::at_root(&options.output);
    store.ensure()?;

    for hash in node.referenced_composables() {
        if store.contains(hash) {
            continue;
        }
        let data = download_composable(sources, hash, index.hash_mode)?;
        store.write(hash, &data)?;
        on_event(SyncEvent::Composable {
            hash: hash.to_string(),
        });
    }

    index.save(&options.output.join(&options.index))?;

    let target = options.output.join(bucket);
    extract(node, &store, &target)?;
    Ok(target)
}

/// fetch only the index document and write it under the output root
pub fn fetch_index(sources: &[SyncSource<'_>], options: &SyncOptions) -> Result<Index> {
    let index = resolve_index(sources, &options.index)?;
    fs::create_dir_all(&options.output).with_path(&options.output)?;
    index.save(&options.output.join(&options.index))?;
    Ok(index)
}

/// first source with a published index document wins; a source that
/// errors or serves an unreadable document is passed over
fn resolve_index(sources: &[SyncSource<'_>], index_name: &str) -> Result<Index> {
    for source in sources {
        let name = index_package(source.scope.trim_start_matches('@'), index_name);
        let bytes = match source.registry.download_latest(&name, index_name) {
            Ok(Some(bytes)) => bytes,
            Ok(None) | Err(_) => continue,
        };
        if let Ok(index) = Index::from_slice(&bytes) {
            return Ok(index);
        }
    }
    Err(Error::IndexUnavailable(index_name.to_string()))
}

/// try each source in order until one serves bytes matching the hash
fn download_composable(sources: &[SyncSource<'_>], hash: &str, mode: HashMode) -> Result<Vec<u8>> {
    let mut corrupt = None;
    for source in sources {
        let name = chunk_package(source.scope.trim_start_matches('@'), hash);
        let data = match source.registry.download_latest(&name, hash) {
            Ok(Some(data)) => data,
            Ok(None) | Err(_) => continue,
        };
        let actual = hash_bytes(&data, mode);
        if actual != hash {
            corrupt = Some(Error::CorruptComposable {
                hash: hash.to_string(),
                actual,
            });
            continue;
        }
        return Ok(data);
    }
    Err(corrupt.unwrap_or_else(|| Error::ComposableUnavailable(hash.to_string())))
}
