use std::fs::{self, File, Permissions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::error::{Error, IoResultExt, Result};
use crate::store::ChunkStore;
use crate::types::{validate_entry_name, Node};

/// materialize a node from the store at target
///
/// the node's own name is ignored; target is the path the entry is
/// created at. child names are validated before they are joined, so a
/// malformed index document cannot place entries outside target. files
/// and symlinks already present are replaced, directories are reused.
/// directory permissions are applied after the contents so a read-only
/// folder does not block its own children.
pub fn extract(node: &Node, store: &ChunkStore, target: &Path) -> Result<()> {
    match node {
        Node::Folder { files, perm, .. } => {
            fs::create_dir_all(target).with_path(target)?;
            for child in files {
                validate_entry_name(child.name())?;
                extract(child, store, &target.join(child.name()))?;
            }
            fs::set_permissions(target, Permissions::from_mode(perm & 0o7777)).with_path(target)
        }

        Node::File {
            size,
            perm,
            composables,
            ..
        } => {
            remove_existing(target)?;
            let mut out = File::create(target).with_path(target)?;
            let mut written = 0u64;
            for hash in composables {
                written += store.copy_to(hash, &mut out)?;
            }
            out.flush().with_path(target)?;
            if written != *size {
                return Err(Error::SizeMismatch {
                    path: target.to_path_buf(),
                    expected: *size,
                    got: written,
                });
            }
            fs::set_permissions(target, Permissions::from_mode(perm & 0o7777)).with_path(target)
        }

        Node::Symlink { to, .. } => {
            remove_existing(target)?;
            std::os::unix::fs::symlink(to, target).with_path(target)
        }
    }
}

/// remove a file or symlink so it can be recreated
fn remove_existing(target: &Path) -> Result<()> {
    if fs::symlink_metadata(target).is_ok() {
        fs::remove_file(target).with_path(target)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use tempfile::tempdir;

    use crate::ops::{build, BuildOptions};
    use crate::types::Index;

    fn build_and_load(
        src: &Path,
        dst: &Path,
        options: &BuildOptions,
    ) -> (Index, ChunkStore) {
        build(src, dst, options).unwrap();
        let index = Index::load(&dst.join("nereid.json")).unwrap();
        let store = ChunkStore::at_root(dst);
        (index, store)
    }

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf, PathBuf) {
        let dir = tempdir().unwrap();
        let src = dir.path().join("data");
        let dst = dir.path().join("out");
        let restored = dir.path().join("restored");
        fs::create_dir(&src).unwrap();
        (dir, src, dst, restored)
    }

    #[test]
    fn test_roundtrip_tree() {
        let (_dir, src, dst, restored) = setup();
        fs::write(src.join("a.txt"), "alpha").unwrap();
        fs::create_dir(src.join("sub")).unwrap();
        fs::write(src.join("sub").join("b.txt"), "beta").unwrap();
        std::os::unix::fs::symlink("a.txt", src.join("link")).unwrap();

        let (index, store) = build_and_load(&src, &dst, &BuildOptions::default());
        extract(&index.buckets["data"], &store, &restored).unwrap();

        assert_eq!(fs::read(restored.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(restored.join("sub").join("b.txt")).unwrap(), b"beta");
        assert_eq!(
            fs::read_link(restored.join("link")).unwrap(),
            PathBuf::from("a.txt")
        );
    }

    #[test]
    fn test_roundtrip_multichunk_file() {
        let (_dir, src, dst, restored) = setup();
        fs::write(src.join("f.bin"), "abcdefghij").unwrap();

        let options = BuildOptions {
            chunk_size: 4,
            ..BuildOptions::default()
        };
        let (index, store) = build_and_load(&src, &dst, &options);
        extract(&index.buckets["data"], &store, &restored).unwrap();

        assert_eq!(fs::read(restored.join("f.bin")).unwrap(), b"abcdefghij");
    }

    #[test]
    fn test_roundtrip_repeated_chunks() {
        let (_dir, src, dst, restored) = setup();
        // first and last chunk are identical, the list must repeat them
        fs::write(src.join("f.bin"), "aaaabbbbaaaa").unwrap();

        let options = BuildOptions {
            chunk_size: 4,
            ..BuildOptions::default()
        };
        let (index, store) = build_and_load(&src, &dst, &options);
        extract(&index.buckets["data"], &store, &restored).unwrap();

        assert_eq!(fs::read(restored.join("f.bin")).unwrap(), b"aaaabbbbaaaa");
    }

    #[test]
    fn test_preserves_permissions() {
        let (_dir, src, dst, restored) = setup();
        let script = src.join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, Permissions::from_mode(0o755)).unwrap();

        let (index, store) = build_and_load(&src, &dst, &BuildOptions::default());
        extract(&index.buckets["data"], &store, &restored).unwrap();

        let mode = fs::metadata(restored.join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_missing_composable() {
        let (_dir, src, dst, restored) = setup();
        fs::write(src.join("a.txt"), "abc").unwrap();

        let (index, store) = build_and_load(&src, &dst, &BuildOptions::default());

        // drop the only chunk from the store
        let hash = crate::hash::hash_text("abc", crate::hash::HashMode::Nix);
        fs::remove_file(store.chunk_path(&hash)).unwrap();

        let err = extract(&index.buckets["data"], &store, &restored).unwrap_err();
        assert!(matches!(err, Error::MissingComposable(h) if h == hash));
    }

    #[test]
    fn test_overwrites_existing_file() {
        let (_dir, src, dst, restored) = setup();
        fs::write(src.join("a.txt"), "fresh").unwrap();

        let (index, store) = build_and_load(&src, &dst, &BuildOptions::default());

        fs::create_dir_all(&restored).unwrap();
        fs::write(restored.join("a.txt"), "stale leftover bytes").unwrap();

        extract(&index.buckets["data"], &store, &restored).unwrap();
        assert_eq!(fs::read(restored.join("a.txt")).unwrap(), b"fresh");
    }

    #[test]
    fn test_overwrites_existing_symlink() {
        let (_dir, src, dst, restored) = setup();
        fs::write(src.join("a.txt"), "abc").unwrap();
        std::os::unix::fs::symlink("a.txt", src.join("link")).unwrap();

        let (index, store) = build_and_load(&src, &dst, &BuildOptions::default());

        fs::create_dir_all(&restored).unwrap();
        std::os::unix::fs::symlink("elsewhere", restored.join("link")).unwrap();

        extract(&index.buckets["data"], &store, &restored).unwrap();
        assert_eq!(
            fs::read_link(restored.join("link")).unwrap(),
            PathBuf::from("a.txt")
        );
    }

    #[test]
    fn test_empty_folder() {
        let (_dir, src, dst, restored) = setup();
        fs::create_dir(src.join("hollow")).unwrap();

        let (index, store) = build_and_load(&src, &dst, &BuildOptions::default());
        extract(&index.buckets["data"], &store, &restored).unwrap();

        assert!(restored.join("hollow").is_dir());
        assert_eq!(fs::read_dir(restored.join("hollow")).unwrap().count(), 0);
    }

    // names with traversal components only occur in hand-made or
    // malicious index documents, so the nodes are built directly
    #[test]
    fn test_rejects_traversal_file_name() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let store = ChunkStore::at_root(root);
        store.ensure().unwrap();

        let payload = crate::hash::hash_text("gotcha", crate::hash::HashMode::Nix);
        store.write(&payload, b"gotcha").unwrap();

        let tree = Node::Folder {
            name: "data".to_string(),
            hash: "h".to_string(),
            size: 6,
            perm: 0o40755,
            files: vec![Node::File {
                name: "../escaped.txt".to_string(),
                hash: payload.clone(),
                size: 6,
                perm: 0o100644,
                composables: vec![payload],
            }],
        };

        let target = root.join("restored").join("data");
        let err = extract(&tree, &store, &target).unwrap_err();
        assert!(matches!(err, Error::InvalidEntryName(_)));
        assert!(fs::symlink_metadata(root.join("restored").join("escaped.txt")).is_err());
    }

    #[test]
    fn test_rejects_traversal_symlink_name() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let store = ChunkStore::at_root(root);
        store.ensure().unwrap();

        let tree = Node::Folder {
            name: "data".to_string(),
            hash: "h".to_string(),
            size: 4,
            perm: 0o40755,
            files: vec![Node::Symlink {
                name: "../planted".to_string(),
                hash: "hl".to_string(),
                size: 4,
                to: "/etc".to_string(),
            }],
        };

        let target = root.join("restored").join("data");
        let err = extract(&tree, &store, &target).unwrap_err();
        assert!(matches!(err, Error::InvalidEntryName(_)));
        assert!(fs::symlink_metadata(root.join("restored").join("planted")).is_err());
    }

    #[test]
    fn test_rejects_empty_entry_name() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let store = ChunkStore::at_root(root);
        store.ensure().unwrap();

        let tree = Node::Folder {
            name: "data".to_string(),
            hash: "h".to_string(),
            size: 0,
            perm: 0o40755,
            files: vec![Node::Folder {
                name: String::new(),
                hash: "h2".to_string(),
                size: 0,
                perm: 0o40755,
                files: vec![],
            }],
        };

        let err = extract(&tree, &store, &root.join("restored")).unwrap_err();
        assert!(matches!(err, Error::InvalidEntryName(_)));
    }
}
