use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::{hash_text, HashMode};

/// a single filesystem entry in a bucket's hash tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    /// regular file, content carried by composables
    File {
        name: String,
        hash: String,
        size: u64,
        perm: u32,
        /// chunk hashes in file-offset order, repeated content repeats
        composables: Vec<String>,
    },

    /// directory, hash derived from the children's hashes
    Folder {
        name: String,
        hash: String,
        size: u64,
        perm: u32,
        files: Vec<Node>,
    },

    /// symbolic link, hash derived from the target string
    Symlink {
        name: String,
        hash: String,
        size: u64,
        to: String,
    },
}

impl Node {
    /// entry name, the path component under the parent folder
    pub fn name(&self) -> &str {
        match self {
            Node::File { name, .. } | Node::Folder { name, .. } | Node::Symlink { name, .. } => {
                name
            }
        }
    }

    /// content hash of this entry
    pub fn hash(&self) -> &str {
        match self {
            Node::File { hash, .. } | Node::Folder { hash, .. } | Node::Symlink { hash, .. } => {
                hash
            }
        }
    }

    /// size in bytes, for folders the sum of the children's sizes
    pub fn size(&self) -> u64 {
        match self {
            Node::File { size, .. } | Node::Folder { size, .. } | Node::Symlink { size, .. } => {
                *size
            }
        }
    }

    /// get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::File { .. } => "file",
            Node::Folder { .. } => "folder",
            Node::Symlink { .. } => "symlink",
        }
    }

    /// is this a file entry
    pub fn is_file(&self) -> bool {
        matches!(self, Node::File { .. })
    }

    /// is this a folder entry
    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder { .. })
    }

    /// is this a symlink entry
    pub fn is_symlink(&self) -> bool {
        matches!(self, Node::Symlink { .. })
    }

    /// hash of a folder with the given children: the children's hashes
    /// sorted lexicographically, concatenated, hashed as text
    pub fn folder_hash(children: &[Node], mode: HashMode) -> String {
        let mut hashes: Vec<&str> = children.iter().map(Node::hash).collect();
        hashes.sort_unstable();
        hash_text(&hashes.concat(), mode)
    }

    /// every composable hash reachable from this subtree, deduplicated
    pub fn referenced_composables(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_composables(&mut out);
        out
    }

    fn collect_composables<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Node::File { composables, .. } => {
                for hash in composables {
                    out.insert(hash.as_str());
                }
            }
            Node::Folder { files, .. } => {
                for child in files {
                    child.collect_composables(out);
                }
            }
            Node::Symlink { .. } => {}
        }
    }
}

/// validate an entry name before it is used as a path component
///
/// index documents may come from a remote source; a valid name is one
/// non-empty component with no '/' or null byte, and not "." or ".."
pub(crate) fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidEntryName(format!(
            "name contains '/': {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidEntryName(format!(
            "name contains null byte: {}",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidEntryName(format!("reserved name: {}", name)));
    }
    Ok(())
}
