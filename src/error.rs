use std::path::PathBuf;

use crate::HashMode;

/// error type for nereid operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("unsupported entry type at {0}")]
    UnsupportedEntryType(PathBuf),

    #[error("invalid entry name: {0}")]
    InvalidEntryName(String),

    #[error("short read at {path}: expected {expected} bytes, got {got}")]
    ShortRead {
        path: PathBuf,
        expected: u64,
        got: u64,
    },

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(u64),

    #[error("bucket name required when the source path has no basename")]
    AmbiguousBucket,

    #[error("registry token required")]
    MissingToken,

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("index document not found at {0}")]
    IndexNotFound(PathBuf),

    #[error("no source has a published index document {0}")]
    IndexUnavailable(String),

    #[error("unsupported index version: {0}")]
    IndexVersion(u32),

    #[error("hash mode mismatch: index uses {found}, requested {expected}")]
    HashModeMismatch { expected: HashMode, found: HashMode },

    #[error("bucket not found in index: {0}")]
    BucketNotFound(String),

    #[error("composable not found in store: {0}")]
    MissingComposable(String),

    #[error("no source has composable {0}")]
    ComposableUnavailable(String),

    #[error("corrupt composable {hash}: content hashes to {actual}")]
    CorruptComposable { hash: String, actual: String },

    #[error("reassembled {path} to {got} bytes, expected {expected}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        got: u64,
    },

    #[error("registry error: {0}")]
    Registry(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid version: {0}")]
    Version(#[from] semver::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
