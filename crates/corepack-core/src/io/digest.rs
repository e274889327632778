//! Content hash of an installed tree.

use std::fs::File;
use std::io;
use std::path::Path;

use corepack_schema::{HashAlgorithm, INSTALL_MARKER, Integrity};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::Result;
use crate::error::IoContext;

/// SHA-256 over an installed tree.
///
/// Covers every entry's relative path, kind, executable bit and contents in
/// sorted order, so the same tree hashes the same on any machine. The
/// install marker at the top level is excluded.
pub fn tree_digest(root: &Path) -> Result<Integrity> {
    let mut hasher = Sha256::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            crate::Error::io(path, io::Error::other(e.to_string()))
        })?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if entry.depth() == 1 && relative == Path::new(INSTALL_MARKER) {
            continue;
        }

        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        hasher.update(name.as_bytes());
        hasher.update([0]);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            hasher.update(b"d");
        } else if file_type.is_symlink() {
            hasher.update(b"l");
            let target = std::fs::read_link(path).at(path)?;
            hasher.update(target.to_string_lossy().as_bytes());
        } else {
            hasher.update(if is_executable(&entry)? { b"x" } else { b"f" });
            let mut file = File::open(path).at(path)?;
            io::copy(&mut file, &mut hasher).at(path)?;
        }
        hasher.update([0]);
    }

    let digest = hasher.finalize().to_vec();
    Ok(Integrity::from_digest(HashAlgorithm::Sha256, digest)?)
}

#[cfg(unix)]
fn is_executable(entry: &walkdir::DirEntry) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = entry.metadata().map_err(|e| {
        crate::Error::io(entry.path(), io::Error::other(e.to_string()))
    })?;
    Ok(metadata.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(_entry: &walkdir::DirEntry) -> Result<bool> {
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("package.json"), b"{\"name\":\"yarn\"}").unwrap();
        fs::write(root.join("bin/yarn.js"), b"console.log(1)").unwrap();
    }

    #[test]
    fn test_digest_is_stable_across_locations() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        sample_tree(a.path());
        sample_tree(b.path());
        assert_eq!(tree_digest(a.path()).unwrap(), tree_digest(b.path()).unwrap());
    }

    #[test]
    fn test_digest_ignores_marker_but_not_content() {
        let dir = tempfile::tempdir().unwrap();
        sample_tree(dir.path());
        let before = tree_digest(dir.path()).unwrap();

        fs::write(dir.path().join(INSTALL_MARKER), b"{}").unwrap();
        assert_eq!(tree_digest(dir.path()).unwrap(), before);

        fs::write(dir.path().join("bin/yarn.js"), b"console.log(2)").unwrap();
        assert_ne!(tree_digest(dir.path()).unwrap(), before);
    }
}
