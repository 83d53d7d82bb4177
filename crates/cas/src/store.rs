//! FileStore: Filesystem-based Content Addressable Storage.
//!
//! Implements the ContentStore trait on a local directory sharded 256 ways
//! by the first two hex chars of each digest.
//!
//! Layout:
//! ```text
//! {base_path}/
//! ├── 00/ .. ff/              # all 256 always present
//! └── e3/
//!     └── e3d062cd...3efd     # object file, name == full digest
//! ```
//!
//! All operations are blocking filesystem calls with no locking. One writer
//! at a time; concurrent `put_bytes` of identical content is harmless, but
//! anything racing `change_key` or a repair scan must be serialized by the
//! caller.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::CasConfig;
use crate::error::{CasError, Result};
use crate::hash::{ContentHash, HashAlgorithm};
use crate::layout;

/// Trait for content storage backends.
///
/// Absence is always a value (`None`/`false`), never an error.
pub trait ContentStore: Send + Sync {
    /// Store data, returning its content hash.
    ///
    /// If an object already exists under the hash, nothing is written.
    fn put_bytes(&self, data: &[u8]) -> Result<ContentHash>;

    /// Retrieve data by its content hash.
    ///
    /// Returns `Ok(None)` if the hash doesn't exist. The bytes are not
    /// re-verified against the hash.
    fn get_bytes(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>>;

    /// Check if an object exists (as a regular file) without reading it.
    fn exists(&self, hash: &ContentHash) -> bool;

    /// Size of the stored object; `Ok(None)` when absent, `Ok(Some(0))` when empty.
    fn get_size(&self, hash: &ContentHash) -> Result<Option<u64>>;

    /// Delete an object, reporting whether anything was removed.
    fn remove_key(&self, hash: &ContentHash) -> Result<bool>;

    /// Get the filesystem path for content, or `None` if it doesn't exist.
    fn path(&self, hash: &ContentHash) -> Option<PathBuf>;
}

/// Filesystem-based content store.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: CasConfig,
}

impl FileStore {
    /// Open a store per `config`.
    ///
    /// - `force`: delete whatever is at the root first.
    /// - `create`: build the shard layout if the root is not a valid store.
    /// - otherwise a root that is not a valid store fails with
    ///   [`CasError::StoreNotValid`].
    pub fn new(config: CasConfig) -> Result<Self> {
        let root = config.base_path.as_path();

        if config.force {
            warn!(root = %root.display(), "force requested, clearing store root");
            layout::clear(root)?;
        }

        if !layout::is_valid_store(root) {
            if !config.create {
                return Err(CasError::StoreNotValid {
                    path: root.to_path_buf(),
                });
            }
            layout::build_structure(root)?;
            info!(root = %root.display(), "initialized content store");
        }

        debug!(root = %root.display(), algorithm = %config.algorithm, "opened content store");
        Ok(Self { config })
    }

    /// Open a store at `path`, creating the layout if needed.
    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(CasConfig::with_base_path(path))
    }

    /// Attach to an existing store at `path`; never creates anything.
    pub fn open_existing(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(CasConfig::existing(path))
    }

    pub fn config(&self) -> &CasConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.base_path
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.config.algorithm
    }

    /// Re-check the 256-shard layout on disk.
    pub fn is_valid(&self) -> bool {
        layout::is_valid_store(self.root())
    }

    /// Delete the entire store root and everything in it.
    ///
    /// Irreversible. The handle is left pointing at a missing store; call
    /// [`FileStore::rebuild`] or reopen before storing again.
    pub fn clear(&self) -> Result<()> {
        layout::clear(self.root())?;
        Ok(())
    }

    /// Recreate any missing shard directories.
    pub fn rebuild(&self) -> Result<()> {
        layout::build_structure(self.root())?;
        Ok(())
    }

    /// Where an object with `hash` lives, whether or not it is present.
    pub fn object_path(&self, hash: &ContentHash) -> PathBuf {
        self.root().join(hash.prefix()).join(hash.as_str())
    }

    /// Hash a file with the store's algorithm, streaming it in 1 MiB blocks.
    ///
    /// Returns `Ok(None)` if `path` does not exist or is not a regular file.
    pub fn hash_file(&self, path: &Path) -> Result<Option<ContentHash>> {
        Ok(self.config.algorithm.hash_file(path)?)
    }

    /// Copy a file into the store, returning its key.
    ///
    /// When `key` is `None` the file is hashed first. When a key is supplied
    /// it is trusted as-is. Unlike [`ContentStore::put_bytes`], any existing
    /// object under the key is overwritten.
    pub fn put_file(&self, source: &Path, key: Option<&ContentHash>) -> Result<ContentHash> {
        let hash = match key {
            Some(hash) => hash.clone(),
            None => self.hash_file(source)?.ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("not a regular file: {}", source.display()),
                )
            })?,
        };

        let obj_path = self.object_path(&hash);
        if is_same_file(source, &obj_path) {
            // Copying a file onto itself would truncate it.
            debug!(%hash, "source is already the stored object");
            return Ok(hash);
        }

        fs::copy(source, &obj_path)?;
        debug!(%hash, source = %source.display(), "stored file");
        Ok(hash)
    }

    /// Copy an object out to `dest`.
    ///
    /// Returns `Ok(false)` without touching `dest` if the key is absent.
    pub fn get_to_file(&self, hash: &ContentHash, dest: &Path) -> Result<bool> {
        if !self.exists(hash) {
            return Ok(false);
        }
        fs::copy(self.object_path(hash), dest)?;
        debug!(%hash, dest = %dest.display(), "retrieved object to file");
        Ok(true)
    }

    /// True iff the object under `hash` is present and its content hashes to `hash`.
    pub fn is_valid_key(&self, hash: &ContentHash) -> Result<bool> {
        let actual = self.hash_file(&self.object_path(hash))?;
        Ok(actual.as_ref() == Some(hash))
    }

    /// Move the object stored under `old` so it is stored under `new`.
    ///
    /// **Dangerous.** `new` is not checked against the content, so this can
    /// create exactly the key/content mismatch that
    /// [`find_invalid_keys`](FileStore::find_invalid_keys) exists to detect.
    /// It is the primitive used by
    /// [`correct_invalid_keys`](FileStore::correct_invalid_keys). Any object
    /// already under `new` is replaced.
    pub fn change_key(&self, old: &ContentHash, new: &ContentHash) -> Result<()> {
        if old == new {
            return Ok(());
        }

        let old_path = self.object_path(old);
        let new_path = self.object_path(new);

        match fs::rename(&old_path, &new_path) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
                // Shard directories on different filesystems.
                fs::copy(&old_path, &new_path)?;
                fs::remove_file(&old_path)?;
            }
            Err(e) => return Err(e.into()),
        }

        info!(%old, %new, "changed object key");
        Ok(())
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl ContentStore for FileStore {
    fn put_bytes(&self, data: &[u8]) -> Result<ContentHash> {
        let hash = self.config.algorithm.hash_bytes(data);
        let obj_path = self.object_path(&hash);

        // Skip if exists - content-addressed = idempotent
        if !obj_path.exists() {
            fs::write(&obj_path, data)?;
            debug!(%hash, size = data.len(), "stored object");
        }

        Ok(hash)
    }

    fn get_bytes(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        if !self.exists(hash) {
            return Ok(None);
        }

        match fs::read(self.object_path(hash)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, hash: &ContentHash) -> bool {
        self.object_path(hash).is_file()
    }

    fn get_size(&self, hash: &ContentHash) -> Result<Option<u64>> {
        match fs::metadata(self.object_path(hash)) {
            Ok(m) if m.is_file() => Ok(Some(m.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_key(&self, hash: &ContentHash) -> Result<bool> {
        if !self.exists(hash) {
            return Ok(false);
        }

        match fs::remove_file(self.object_path(hash)) {
            Ok(()) => {
                debug!(%hash, "removed object");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn path(&self, hash: &ContentHash) -> Option<PathBuf> {
        let path = self.object_path(hash);
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }
}
