//! Persistent storage for compiled artifacts
//!
//! Stores are dumb byte maps keyed by [`store_key`]. Validation of what they
//! return (format version, name, signature) is the cache's job.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Byte storage backing an [`ArtifactCache`](crate::ArtifactCache).
pub trait ArtifactStore: Send + Sync {
	/// Reads the entry for `key`, `Ok(None)` when absent.
	fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>>;

	/// Writes (or overwrites) the entry for `key`.
	fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()>;

	/// Removes every entry.
	fn delete_all(&self) -> io::Result<()>;
}

/// Key under which the artifact of `name` at `signature` is stored.
///
/// # Examples
///
/// ```
/// use stencil_templates::store::store_key;
///
/// let key = store_key("page.html", "abc");
/// assert_eq!(key.len(), 64);
/// assert_ne!(key, store_key("page.html", "abd"));
/// ```
pub fn store_key(name: &str, signature: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(name.as_bytes());
	hasher.update([0]);
	hasher.update(signature.as_bytes());
	hex::encode(hasher.finalize())
}

/// In-process store, mostly useful in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}

impl ArtifactStore for MemoryStore {
	fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
		Ok(self.entries.read().get(key).cloned())
	}

	fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
		self.entries.write().insert(key.to_string(), bytes.to_vec());
		Ok(())
	}

	fn delete_all(&self) -> io::Result<()> {
		self.entries.write().clear();
		Ok(())
	}
}

/// Store keeping one `<key>.json` file per artifact in a directory.
///
/// # Examples
///
/// ```
/// use stencil_templates::{ArtifactStore, FileStore};
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = FileStore::new(dir.path().join("artifacts"));
///
/// store.write("k", b"{}").unwrap();
/// assert_eq!(store.read("k").unwrap(), Some(b"{}".to_vec()));
/// assert_eq!(store.read("missing").unwrap(), None);
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
	directory: PathBuf,
}

impl FileStore {
	/// Creates a store rooted at `directory`, created on first write.
	pub fn new(directory: impl Into<PathBuf>) -> Self {
		Self {
			directory: directory.into(),
		}
	}

	pub fn directory(&self) -> &Path {
		&self.directory
	}

	fn path(&self, key: &str) -> PathBuf {
		self.directory.join(format!("{}.json", key))
	}
}

impl ArtifactStore for FileStore {
	fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
		match fs::read(self.path(key)) {
			Ok(bytes) => Ok(Some(bytes)),
			Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(err) => Err(err),
		}
	}

	fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
		fs::create_dir_all(&self.directory)?;
		// Write-then-rename so readers never see a partial file.
		let target = self.path(key);
		let temporary = target.with_extension("json.tmp");
		fs::write(&temporary, bytes)?;
		fs::rename(&temporary, &target)
	}

	fn delete_all(&self) -> io::Result<()> {
		let entries = match fs::read_dir(&self.directory) {
			Ok(entries) => entries,
			Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
			Err(err) => return Err(err),
		};
		for entry in entries {
			let path = entry?.path();
			if path.extension().is_some_and(|ext| ext == "json") {
				fs::remove_file(path)?;
			}
		}
		Ok(())
	}
}
