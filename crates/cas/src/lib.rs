//! Content Addressable Storage (CAS) on a sharded local directory.
//!
//! Every object is stored under the hex digest of its own bytes, so the key
//! doubles as a checksum: identical content is stored once, and any object
//! can be checked against its name.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cas::{ContentStore, FileStore};
//!
//! // Create (or attach to) a store at a path
//! let store = FileStore::at_path("/srv/cas").unwrap();
//!
//! // Store content
//! let hash = store.put_bytes(b"This is a blob.").unwrap();
//! println!("Stored as: {}", hash);
//!
//! // Retrieve content
//! if let Some(data) = store.get_bytes(&hash).unwrap() {
//!     println!("Got {} bytes", data.len());
//! }
//!
//! // Offline maintenance: rename objects whose content no longer matches
//! for (old, new) in store.correct_invalid_keys().unwrap() {
//!     println!("{} -> {}", old, new);
//! }
//! ```
//!
//! # Layout
//!
//! `{root}/{d[0:2]}/{d}` for digest `d`, with all 256 shard directories
//! `00`..`ff` created up front. No manifest, no version marker.
//!
//! # Concurrency
//!
//! Single writer. Nothing here locks; callers serialize access when more
//! than one process or thread mutates a store, and always around repairs.
//!
//! # Configuration
//!
//! Environment variables read by [`CasConfig::from_env`]:
//! - `CAS_PATH`: Root of the store (default: `~/.cas/store`)
//! - `CAS_ALGORITHM`: `sha256` (default) or `blake3`

pub mod config;
pub mod error;
pub mod hash;
pub mod layout;
pub mod scan;
pub mod store;

// Re-exports for convenience
pub use config::CasConfig;
pub use error::{CasError, Result};
pub use hash::{ContentHash, HashAlgorithm, HashError, BLOCK_SIZE};
pub use layout::{build_structure, clear, is_valid_store};
pub use scan::{InvalidKeys, Keys};
pub use store::{ContentStore, FileStore};
