//! Content fingerprinting over a set of files and directories
//!
//! Used to decide whether a set of inputs changed in a way that requires
//! rework (e.g. rebuilding an image). The digest is a pure function of the
//! input set and file contents: callers can list paths in any order.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::FingerprintError;

/// Compute a SHA-256 digest over the given files and directories.
///
/// Inputs are deduplicated and sorted before hashing, so the digest does not
/// depend on the order the caller lists them in. For a file, its name and
/// full byte content are fed into the digest; for a directory, every direct
/// child file is fed the same way (sorted by name, named relative to the
/// directory). A path that is neither an existing file nor a directory is a
/// hard error.
pub fn hash_paths<P: AsRef<Path>>(paths: &[P]) -> Result<String, FingerprintError> {
    let mut inputs: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
    inputs.sort();
    inputs.dedup();

    let mut hasher = Sha256::new();

    for path in &inputs {
        if path.is_file() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            feed_file(&mut hasher, path, &name)?;
        } else if path.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(path)
                .map_err(|e| FingerprintError::Io {
                    path: path.clone(),
                    source: e,
                })?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            files.sort();

            for file in &files {
                let relative = file
                    .strip_prefix(path)
                    .unwrap_or(file)
                    .to_string_lossy()
                    .into_owned();
                feed_file(&mut hasher, file, &relative)?;
            }
        } else {
            return Err(FingerprintError::PathNotFound(path.clone()));
        }
    }

    let digest = format!("{:x}", hasher.finalize());
    debug!(inputs = inputs.len(), digest = %digest, "computed content fingerprint");
    Ok(digest)
}

fn feed_file(
    hasher: &mut Sha256,
    file: &Path,
    relative_name: &str,
) -> Result<(), FingerprintError> {
    hasher.update(relative_name.as_bytes());

    let contents = fs::read(file).map_err(|e| FingerprintError::Io {
        path: file.to_path_buf(),
        source: e,
    })?;
    hasher.update(&contents);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_is_order_independent() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.txt");
        let b = temp.path().join("b.txt");
        fs::write(&a, "alpha").unwrap();
        fs::write(&b, "beta").unwrap();

        let forward = hash_paths(&[&a, &b]).unwrap();
        let reversed = hash_paths(&[&b, &a]).unwrap();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_hash_dedupes_inputs() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.txt");
        fs::write(&a, "alpha").unwrap();

        let once = hash_paths(&[&a]).unwrap();
        let twice = hash_paths(&[&a, &a]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_hash_changes_with_content() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.txt");

        fs::write(&a, "alpha").unwrap();
        let before = hash_paths(&[&a]).unwrap();

        fs::write(&a, "alphb").unwrap();
        let after = hash_paths(&[&a]).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn test_hash_directory_covers_direct_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("one.yaml"), "a: 1").unwrap();
        fs::write(temp.path().join("two.yaml"), "b: 2").unwrap();

        let before = hash_paths(&[temp.path()]).unwrap();

        fs::write(temp.path().join("two.yaml"), "b: 3").unwrap();
        let after = hash_paths(&[temp.path()]).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn test_missing_path_is_hard_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        let err = hash_paths(&[&missing]).unwrap_err();
        assert!(matches!(err, FingerprintError::PathNotFound(_)));
    }

    #[test]
    fn test_digest_is_fixed_size_hex() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.txt");
        fs::write(&a, "alpha").unwrap();

        let digest = hash_paths(&[&a]).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_file_name_participates_in_digest() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.txt");
        let b = temp.path().join("b.txt");
        fs::write(&a, "same").unwrap();
        fs::write(&b, "same").unwrap();

        assert_ne!(hash_paths(&[&a]).unwrap(), hash_paths(&[&b]).unwrap());
    }
}
