//! Enumeration and integrity repair.
//!
//! There is no index beside the objects themselves, so "invalid" can only
//! mean "the content no longer hashes to its file name". Every check here is
//! a full rescan and costs O(total stored bytes).
//!
//! Scans read each shard directory as they reach it. Objects added or
//! removed mid-scan may or may not be seen; run repairs with no other
//! writers active.

use std::fs::{self, DirEntry, ReadDir};
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::hash::ContentHash;
use crate::layout;
use crate::store::{ContentStore, FileStore};

/// Lazy iterator over every key in a store, shard `00` through `ff`.
///
/// Within a shard, keys come in whatever order the filesystem returns.
/// Entries that are not regular files named by a well-formed digest of their
/// own shard are skipped with a warning.
pub struct Keys<'a> {
    root: &'a Path,
    next_shard: u16,
    current: Option<ShardEntries>,
}

struct ShardEntries {
    name: String,
    entries: ReadDir,
}

impl<'a> Keys<'a> {
    fn new(root: &'a Path) -> Self {
        Self {
            root,
            next_shard: 0,
            current: None,
        }
    }
}

impl ShardEntries {
    fn key_for(&self, entry: &DirEntry) -> Option<ContentHash> {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!(path = %path.display(), "skipping non-UTF-8 entry in shard");
            return None;
        };

        let hash = match ContentHash::from_str_checked(&name) {
            Ok(hash) if hash.as_str() == name => hash,
            _ => {
                warn!(path = %path.display(), "skipping entry that is not a digest");
                return None;
            }
        };

        if hash.prefix() != self.name {
            warn!(path = %path.display(), "skipping object in the wrong shard");
            return None;
        }

        match entry.file_type() {
            Ok(ft) if ft.is_file() => Some(hash),
            _ => {
                warn!(path = %path.display(), "skipping shard entry that is not a regular file");
                None
            }
        }
    }
}

impl Iterator for Keys<'_> {
    type Item = Result<ContentHash>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(shard) = self.current.as_mut() {
                match shard.entries.next() {
                    Some(Ok(entry)) => {
                        if let Some(hash) = shard.key_for(&entry) {
                            return Some(Ok(hash));
                        }
                        continue;
                    }
                    Some(Err(e)) => return Some(Err(e.into())),
                    None => {}
                }
            }

            self.current = None;
            if self.next_shard > u16::from(u8::MAX) {
                return None;
            }
            let index = self.next_shard as u8;
            self.next_shard += 1;

            match fs::read_dir(layout::shard_path(self.root, index)) {
                Ok(entries) => {
                    self.current = Some(ShardEntries {
                        name: layout::shard_name(index),
                        entries,
                    })
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Lazy iterator over keys whose content does not hash to the key.
pub struct InvalidKeys<'a> {
    store: &'a FileStore,
    keys: Keys<'a>,
}

impl Iterator for InvalidKeys<'_> {
    type Item = Result<ContentHash>;

    fn next(&mut self) -> Option<Self::Item> {
        for key in self.keys.by_ref() {
            let key = match key {
                Ok(key) => key,
                Err(e) => return Some(Err(e)),
            };
            match self.store.is_valid_key(&key) {
                Ok(true) => continue,
                Ok(false) => return Some(Ok(key)),
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

impl FileStore {
    /// Iterate every key in the store.
    ///
    /// Each call starts a fresh scan from shard `00`.
    pub fn list_keys(&self) -> Keys<'_> {
        Keys::new(self.root())
    }

    /// Iterate keys whose stored content no longer hashes to the key.
    ///
    /// Reads every stored byte. Slow on large stores.
    pub fn find_invalid_keys(&self) -> InvalidKeys<'_> {
        InvalidKeys {
            store: self,
            keys: self.list_keys(),
        }
    }

    /// Rename every invalid object to the digest of its current content.
    ///
    /// Returns the `(old, new)` pairs moved. This assumes objects were filed
    /// under the wrong name, not altered in place: it never recovers the
    /// content a key originally named. Reads every stored byte.
    pub fn correct_invalid_keys(&self) -> Result<Vec<(ContentHash, ContentHash)>> {
        let mut renamed = Vec::new();
        for key in self.find_invalid_keys() {
            let old = key?;
            let Some(new) = self.hash_file(&self.object_path(&old))? else {
                // Vanished since it was listed.
                continue;
            };
            self.change_key(&old, &new)?;
            info!(%old, %new, "corrected invalid key");
            renamed.push((old, new));
        }
        Ok(renamed)
    }

    /// Delete every invalid object, returning the keys removed.
    ///
    /// **Destroys data.** Reads every stored byte.
    pub fn remove_invalid_keys(&self) -> Result<Vec<ContentHash>> {
        let mut removed = Vec::new();
        for key in self.find_invalid_keys() {
            let key = key?;
            if self.remove_key(&key)? {
                info!(%key, "removed invalid key");
                removed.push(key);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn zeros() -> ContentHash {
        "0".repeat(64).parse().unwrap()
    }

    fn effs() -> ContentHash {
        "f".repeat(64).parse().unwrap()
    }

    fn collect_keys(store: &FileStore) -> Result<Vec<ContentHash>> {
        store.list_keys().collect()
    }

    #[test]
    fn test_empty_store_has_no_keys() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::at_path(temp_dir.path())?;
        assert!(collect_keys(&store)?.is_empty());
        assert_eq!(store.find_invalid_keys().count(), 0);
        Ok(())
    }

    #[test]
    fn test_list_keys_is_complete() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::at_path(temp_dir.path())?;

        let mut expected = HashSet::new();
        for i in 0..200 {
            expected.insert(store.put_bytes(format!("object {}", i).as_bytes())?);
        }

        let keys = collect_keys(&store)?;
        assert_eq!(keys.len(), 200);
        let listed: HashSet<ContentHash> = keys.iter().cloned().collect();
        assert_eq!(listed, expected);

        for key in &keys {
            assert_eq!(store.object_path(key).parent(), Some(temp_dir.path().join(key.prefix()).as_path()));
            assert!(store.is_valid_key(key)?);
        }
        Ok(())
    }

    #[test]
    fn test_list_keys_walks_shards_in_order() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::at_path(temp_dir.path())?;
        for i in 0..100 {
            store.put_bytes(format!("ordered {}", i).as_bytes())?;
        }

        let prefixes: Vec<String> = collect_keys(&store)?
            .iter()
            .map(|k| k.prefix().to_string())
            .collect();
        let mut sorted = prefixes.clone();
        sorted.sort();
        assert_eq!(prefixes, sorted);
        Ok(())
    }

    #[test]
    fn test_list_keys_restarts_each_call() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::at_path(temp_dir.path())?;
        store.put_bytes(b"one")?;
        store.put_bytes(b"two")?;

        let mut partial = store.list_keys();
        assert!(partial.next().is_some());
        assert_eq!(collect_keys(&store)?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_list_keys_skips_stray_entries() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::at_path(temp_dir.path())?;
        let key = store.put_bytes(b"real")?;

        fs::write(temp_dir.path().join("00").join("notes.txt"), b"stray")?;
        fs::write(
            temp_dir.path().join("00").join(ContentHash::from_data(b"x").as_str().to_uppercase()),
            b"x",
        )?;
        // Well-formed digest filed under the wrong shard.
        let misplaced = effs();
        fs::write(temp_dir.path().join("01").join(misplaced.as_str()), b"lost")?;
        fs::create_dir(temp_dir.path().join("00").join(zeros().as_str()))?;

        assert_eq!(collect_keys(&store)?, vec![key]);
        Ok(())
    }

    #[test]
    fn test_missing_shard_surfaces_error() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::at_path(temp_dir.path())?;
        fs::remove_dir(temp_dir.path().join("80"))?;

        assert!(collect_keys(&store).is_err());
        Ok(())
    }

    #[test]
    fn test_find_invalid_keys_after_change_key() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::at_path(temp_dir.path())?;

        let good = store.put_bytes(b"stays put")?;
        let moved = store.put_bytes(b"This is a blob.")?;
        store.change_key(&moved, &zeros())?;

        let invalid: Vec<ContentHash> = store.find_invalid_keys().collect::<Result<_>>()?;
        assert_eq!(invalid, vec![zeros()]);
        assert!(store.is_valid_key(&good)?);
        Ok(())
    }

    #[test]
    fn test_find_invalid_keys_detects_in_place_edit() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::at_path(temp_dir.path())?;

        let key = store.put_bytes(b"original")?;
        fs::write(store.object_path(&key), b"bit rot")?;

        let invalid: Vec<ContentHash> = store.find_invalid_keys().collect::<Result<_>>()?;
        assert_eq!(invalid, vec![key]);
        Ok(())
    }

    #[test]
    fn test_correct_invalid_keys() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::at_path(temp_dir.path())?;

        let key1 = store.put_bytes(b"This is a blob.")?;
        let key2 = store.put_bytes(b"second object")?;
        store.change_key(&key1, &zeros())?;
        store.change_key(&key2, &effs())?;

        let mut renamed = store.correct_invalid_keys()?;
        renamed.sort();
        assert_eq!(renamed, vec![(zeros(), key1.clone()), (effs(), key2.clone())]);

        assert_eq!(store.find_invalid_keys().count(), 0);
        assert!(!store.exists(&zeros()));
        assert!(!store.exists(&effs()));
        assert_eq!(store.get_bytes(&key1)?.as_deref(), Some(&b"This is a blob."[..]));
        assert_eq!(store.get_bytes(&key2)?.as_deref(), Some(&b"second object"[..]));
        Ok(())
    }

    #[test]
    fn test_correct_on_clean_store_is_noop() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::at_path(temp_dir.path())?;
        store.put_bytes(b"clean")?;

        assert!(store.correct_invalid_keys()?.is_empty());
        assert_eq!(collect_keys(&store)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_remove_invalid_keys() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FileStore::at_path(temp_dir.path())?;

        let good = store.put_bytes(b"keep me")?;
        let bad = store.put_bytes(b"This is a blob.")?;
        store.change_key(&bad, &zeros())?;

        assert_eq!(store.remove_invalid_keys()?, vec![zeros()]);
        assert!(!store.exists(&zeros()));
        assert!(!store.exists(&bad));
        assert!(store.exists(&good));
        assert_eq!(store.find_invalid_keys().count(), 0);
        Ok(())
    }
}
