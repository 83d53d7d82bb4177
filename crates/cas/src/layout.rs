//! On-disk layout: 256 fixed shard directories under the store root.
//!
//! ```text
//! {root}/
//! ├── 00/
//! ├── 01/
//! │   └── 01a4...  # object file, name == full digest
//! ├── ...
//! └── ff/
//! ```
//!
//! There is no manifest or version marker. A root is a valid store exactly
//! when every shard `00`..=`ff` exists and is a directory; anything else in
//! the root is ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Number of shard directories.
pub const SHARD_COUNT: usize = 256;

/// Name of shard `index` (`0` -> `"00"`, `255` -> `"ff"`).
pub fn shard_name(index: u8) -> String {
    format!("{:02x}", index)
}

/// All shard names in ascending order.
pub fn shard_names() -> impl Iterator<Item = String> {
    (0..=u8::MAX).map(shard_name)
}

/// Path of shard `index` under `root`.
pub fn shard_path(root: &Path, index: u8) -> PathBuf {
    root.join(shard_name(index))
}

/// True iff `root` is a directory containing all 256 shard directories.
///
/// Rescans the filesystem on every call.
pub fn is_valid_store(root: &Path) -> bool {
    if !root.is_dir() {
        return false;
    }
    shard_names().all(|shard| root.join(shard).is_dir())
}

/// Create every shard directory, including `root` and its parents if missing.
///
/// Fails if a shard path is occupied by something other than a directory.
pub fn build_structure(root: &Path) -> io::Result<()> {
    for shard in shard_names() {
        fs::create_dir_all(root.join(&shard))?;
    }
    debug!(root = %root.display(), "built shard structure");
    Ok(())
}

/// Delete whatever is at `root`: recursively if a directory, else the single entry.
///
/// No-op if nothing is there. Destroys data regardless of whether `root`
/// was a store.
pub fn clear(root: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(root)?;
    } else {
        fs::remove_file(root)?;
    }
    info!(root = %root.display(), "cleared store path");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn test_shard_names_cover_00_through_ff() {
        let names: Vec<String> = shard_names().collect();
        assert_eq!(names.len(), SHARD_COUNT);
        assert_eq!(names.first().map(String::as_str), Some("00"));
        assert_eq!(names.last().map(String::as_str), Some("ff"));
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_missing_root_is_not_valid() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!is_valid_store(&temp_dir.path().join("nope")));
    }

    #[test]
    fn test_empty_dir_is_not_valid() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!is_valid_store(temp_dir.path()));
    }

    #[test]
    fn test_build_structure_creates_nested_root() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("a").join("b").join("store");

        build_structure(&root)?;
        assert!(is_valid_store(&root));
        Ok(())
    }

    #[test]
    fn test_build_structure_is_repeatable() -> Result<()> {
        let temp_dir = TempDir::new()?;
        build_structure(temp_dir.path())?;
        build_structure(temp_dir.path())?;
        assert!(is_valid_store(temp_dir.path()));
        Ok(())
    }

    #[test]
    fn test_missing_last_shard_is_not_valid() -> Result<()> {
        let temp_dir = TempDir::new()?;
        build_structure(temp_dir.path())?;
        fs::remove_dir(temp_dir.path().join("ff"))?;
        assert!(!is_valid_store(temp_dir.path()));
        Ok(())
    }

    #[test]
    fn test_shard_that_is_a_file_is_not_valid() -> Result<()> {
        let temp_dir = TempDir::new()?;
        build_structure(temp_dir.path())?;
        fs::remove_dir(temp_dir.path().join("7f"))?;
        fs::write(temp_dir.path().join("7f"), b"not a dir")?;
        assert!(!is_valid_store(temp_dir.path()));

        // Rebuilding can't fix a file squatting on a shard name.
        assert!(build_structure(temp_dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_extra_content_is_tolerated() -> Result<()> {
        let temp_dir = TempDir::new()?;
        build_structure(temp_dir.path())?;
        fs::write(temp_dir.path().join("README"), b"hello")?;
        fs::create_dir(temp_dir.path().join("zz"))?;
        assert!(is_valid_store(temp_dir.path()));
        Ok(())
    }

    #[test]
    fn test_root_that_is_a_file_is_not_valid() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("store");
        fs::write(&root, b"")?;
        assert!(!is_valid_store(&root));
        Ok(())
    }

    #[test]
    fn test_clear_directory() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("store");
        build_structure(&root)?;
        fs::write(root.join("00").join("something"), b"data")?;

        clear(&root)?;
        assert!(!root.exists());
        Ok(())
    }

    #[test]
    fn test_clear_single_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("store");
        fs::write(&root, b"in the way")?;

        clear(&root)?;
        assert!(!root.exists());
        Ok(())
    }

    #[test]
    fn test_clear_missing_is_noop() -> Result<()> {
        let temp_dir = TempDir::new()?;
        clear(&temp_dir.path().join("never-existed"))?;
        Ok(())
    }
}
