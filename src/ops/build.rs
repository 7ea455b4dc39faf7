use std::fs::{self, File};
use std::io::Read;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::{hash_bytes, hash_file, hash_text, HashMode};
use crate::store::ChunkStore;
use crate::types::{ComposableTable, Index, Node, DEFAULT_INDEX_NAME};

/// default maximum chunk size: 10 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// options for one build invocation
#[derive(Clone, Debug)]
pub struct BuildOptions {
    pub hash_mode: HashMode,
    /// maximum chunk size in bytes
    pub chunk_size: u64,
    /// index document file name under the destination root
    pub index: String,
    /// bucket to write, defaults to the source basename
    pub bucket: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            hash_mode: HashMode::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            index: DEFAULT_INDEX_NAME.to_string(),
            bucket: None,
        }
    }
}

/// ingest a directory into the store under dst and update its index
///
/// the bucket is replaced wholesale; composables seen during the walk
/// are merged with the ones the index already lists. other buckets are
/// left untouched.
pub fn build(src: &Path, dst: &Path, options: &BuildOptions) -> Result<()> {
    if options.chunk_size == 0 {
        return Err(Error::InvalidChunkSize(options.chunk_size));
    }
    let meta = fs::symlink_metadata(src).with_path(src)?;
    if !meta.is_dir() {
        return Err(Error::NotADirectory(src.to_path_buf()));
    }
    let bucket = match &options.bucket {
        Some(name) => name.clone(),
        None => source_basename(src)?,
    };

    fs::create_dir_all(dst).with_path(dst)?;
    let index_path = dst.join(&options.index);
    let mut index = Index::load_or_new(&index_path, options.hash_mode)?;

    let store = ChunkStore::at_root(dst);
    store.ensure()?;

    let mut table = ComposableTable::from_index(&index);
    let root = build_tree(src, &store, &mut table, options)?;

    index.buckets.insert(bucket, root);
    index.composables = table.into_composables();
    index.save(&index_path)
}

/// hash one filesystem entry into a node, chunking file content into
/// the store on the way
pub fn build_tree(
    path: &Path,
    store: &ChunkStore,
    table: &mut ComposableTable,
    options: &BuildOptions,
) -> Result<Node> {
    let meta = fs::symlink_metadata(path).with_path(path)?;
    let name = entry_name(path);
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        let target = fs::read_link(path).with_path(path)?;
        let to = target.to_string_lossy().into_owned();
        Ok(Node::Symlink {
            name,
            hash: hash_text(&to, options.hash_mode),
            size: meta.len(),
            to,
        })
    } else if file_type.is_file() {
        let hash = hash_file(path, options.hash_mode)?;
        let composables = chunk_file(path, meta.len(), store, table, options)?;
        Ok(Node::File {
            name,
            hash,
            size: meta.len(),
            perm: meta.mode(),
            composables,
        })
    } else if file_type.is_dir() {
        let mut entries: Vec<_> = fs::read_dir(path)
            .with_path(path)?
            .collect::<std::io::Result<Vec<_>>>()
            .with_path(path)?;
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut children = Vec::new();
        for entry in entries {
            children.push(build_tree(&entry.path(), store, table, options)?);
        }

        let hash = Node::folder_hash(&children, options.hash_mode);
        let size = children.iter().map(Node::size).sum();
        Ok(Node::Folder {
            name,
            hash,
            size,
            perm: meta.mode(),
            files: children,
        })
    } else {
        Err(Error::UnsupportedEntryType(path.to_path_buf()))
    }
}

/// bucket name fallback: the final component of the source path
fn source_basename(src: &Path) -> Result<String> {
    src.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or(Error::AmbiguousBucket)
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string())
}

/// split a file into floor(size / chunk_size) full chunks plus a tail,
/// storing each one; the returned list keeps file-offset order and
/// repeats the hash of repeated content
fn chunk_file(
    path: &Path,
    size: u64,
    store: &ChunkStore,
    table: &mut ComposableTable,
    options: &BuildOptions,
) -> Result<Vec<String>> {
    let chunk_size = options.chunk_size;
    let full_chunks = size / chunk_size;
    let rest = size % chunk_size;

    let mut composables = Vec::new();
    let mut file = File::open(path).with_path(path)?;
    let mut buf = vec![0u8; chunk_size.min(size) as usize];

    for _ in 0..full_chunks {
        read_chunk(&mut file, &mut buf, path)?;
        composables.push(store_chunk(&buf, store, table, options)?);
    }
    if rest != 0 {
        read_chunk(&mut file, &mut buf[..rest as usize], path)?;
        composables.push(store_chunk(&buf[..rest as usize], store, table, options)?);
    }
    Ok(composables)
}

/// fill the whole buffer, failing when the content ends early
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8], path: &Path) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).with_path(path)?;
        if n == 0 {
            return Err(Error::ShortRead {
                path: path.to_path_buf(),
                expected: buf.len() as u64,
                got: filled as u64,
            });
        }
        filled += n;
    }
    Ok(())
}

fn store_chunk(
    bytes: &[u8],
    store: &ChunkStore,
    table: &mut ComposableTable,
    options: &BuildOptions,
) -> Result<String> {
    let hash = hash_bytes(bytes, options.hash_mode);
    table.record(&hash, bytes.len() as u64);
    store.write(&hash, bytes)?;
    Ok(hash)
}
