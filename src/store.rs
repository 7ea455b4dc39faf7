use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};

/// conventional chunk directory name under a destination root
pub const STORE_DIR: &str = "store";

/// flat directory of chunks, each file named by its content hash
#[derive(Clone, Debug)]
pub struct ChunkStore {
    dir: PathBuf,
}

impl ChunkStore {
    /// store rooted at an explicit directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// store under the conventional `store/` directory of a destination root
    pub fn at_root(root: &Path) -> Self {
        Self::new(root.join(STORE_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// create the store directory if missing
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).with_path(&self.dir)
    }

    /// filesystem path of a chunk
    pub fn chunk_path(&self, hash: &str) -> PathBuf {
        self.dir.join(hash)
    }

    /// check if a chunk exists in the store
    pub fn contains(&self, hash: &str) -> bool {
        self.chunk_path(hash).exists()
    }

    /// write a chunk unless it is already present
    ///
    /// content is addressed by hash, so an existing file never needs to
    /// be rewritten. returns whether anything was written.
    pub fn write(&self, hash: &str, bytes: &[u8]) -> Result<bool> {
        let path = self.chunk_path(hash);
        if path.exists() {
            return Ok(false);
        }
        fs::write(&path, bytes).with_path(&path)?;
        Ok(true)
    }

    /// read a whole chunk
    pub fn read(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.chunk_path(hash);
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::MissingComposable(hash.to_string())
            } else {
                Error::Io { path, source: e }
            }
        })
    }

    /// stream a chunk into a writer, returns the number of bytes copied
    pub fn copy_to<W: Write>(&self, hash: &str, writer: &mut W) -> Result<u64> {
        let path = self.chunk_path(hash);
        let mut file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::MissingComposable(hash.to_string())
            } else {
                Error::Io {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        let mut buf = [0u8; 64 * 1024];
        let mut total = 0u64;
        loop {
            let n = file.read(&mut buf).with_path(&path)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).with_path(&path)?;
            total += n as u64;
        }
        Ok(total)
    }

    /// hashes of every chunk on disk, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&self.dir).with_path(&self.dir)? {
            let entry = entry.with_path(&self.dir)?;
            if entry.file_type().with_path(entry.path())?.is_file() {
                hashes.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        hashes.sort_unstable();
        Ok(hashes)
    }
}
