//! Compiled artifact cache
//!
//! Keyed by `(template name, signature)`. The cache is passive: it never
//! compiles anything itself, the engine compiles on a miss and calls
//! [`ArtifactCache::put`]. An optional [`ArtifactStore`] persists artifacts
//! across processes; anything wrong with a stored entry makes it a miss.

use crate::artifact::{CompiledArtifact, FORMAT_VERSION};
use crate::store::{ArtifactStore, store_key};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hit/miss counters of an [`ArtifactCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
	/// Lookups answered from memory
	pub hits: u64,
	/// Lookups answered from the persistent store
	pub store_hits: u64,
	pub misses: u64,
}

/// Two-level artifact cache: memory first, then the persistent store.
///
/// # Examples
///
/// ```
/// use stencil_templates::{ArtifactCache, MemoryStore};
///
/// let cache = ArtifactCache::with_store(MemoryStore::new());
/// assert!(cache.get("page.html", "0000").is_none());
/// assert_eq!(cache.stats().misses, 1);
/// ```
#[derive(Default)]
pub struct ArtifactCache {
	entries: RwLock<HashMap<(String, String), Arc<CompiledArtifact>>>,
	store: Option<Box<dyn ArtifactStore>>,
	hits: AtomicU64,
	store_hits: AtomicU64,
	misses: AtomicU64,
}

impl ArtifactCache {
	/// Creates a memory-only cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a cache backed by `store`.
	pub fn with_store(store: impl ArtifactStore + 'static) -> Self {
		Self {
			store: Some(Box::new(store)),
			..Self::default()
		}
	}

	/// Looks up the artifact of `name` at `signature`.
	pub fn get(&self, name: &str, signature: &str) -> Option<Arc<CompiledArtifact>> {
		let key = (name.to_string(), signature.to_string());
		if let Some(artifact) = self.entries.read().get(&key) {
			self.hits.fetch_add(1, Ordering::Relaxed);
			return Some(artifact.clone());
		}

		if let Some(artifact) = self.load_stored(name, signature) {
			self.store_hits.fetch_add(1, Ordering::Relaxed);
			let artifact = Arc::new(artifact);
			self.insert_current(key, artifact.clone());
			return Some(artifact);
		}

		self.misses.fetch_add(1, Ordering::Relaxed);
		None
	}

	/// Inserts an artifact, evicting every entry of the same name at another
	/// signature, and writes it through to the store.
	pub fn put(&self, name: &str, signature: &str, artifact: Arc<CompiledArtifact>) {
		if let Some(store) = &self.store {
			let written = artifact
				.to_bytes()
				.map_err(|err| err.to_string())
				.and_then(|bytes| {
					store
						.write(&store_key(name, signature), &bytes)
						.map_err(|err| err.to_string())
				});
			if let Err(error) = written {
				tracing::warn!(template = name, %error, "failed to persist compiled artifact");
			}
		}
		self.insert_current((name.to_string(), signature.to_string()), artifact);
	}

	/// Keeps at most one signature per template name in memory.
	fn insert_current(&self, key: (String, String), artifact: Arc<CompiledArtifact>) {
		let mut entries = self.entries.write();
		entries.retain(|(name, signature), _| name != &key.0 || signature == &key.1);
		entries.insert(key, artifact);
	}

	/// Drops every entry, in memory and in the store.
	pub fn clear(&self) {
		self.entries.write().clear();
		if let Some(store) = &self.store
			&& let Err(error) = store.delete_all()
		{
			tracing::warn!(%error, "failed to clear artifact store");
		}
	}

	/// Number of artifacts held in memory.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	pub fn stats(&self) -> CacheStats {
		CacheStats {
			hits: self.hits.load(Ordering::Relaxed),
			store_hits: self.store_hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
		}
	}

	/// Reads and validates a stored artifact. Every failure is a miss.
	fn load_stored(&self, name: &str, signature: &str) -> Option<CompiledArtifact> {
		let store = self.store.as_ref()?;
		let bytes = match store.read(&store_key(name, signature)) {
			Ok(Some(bytes)) => bytes,
			Ok(None) => return None,
			Err(error) => {
				tracing::warn!(template = name, %error, "failed to read artifact store");
				return None;
			}
		};
		let artifact = match CompiledArtifact::from_bytes(&bytes) {
			Ok(artifact) => artifact,
			Err(error) => {
				tracing::warn!(template = name, %error, "discarding undecodable stored artifact");
				return None;
			}
		};
		if artifact.format_version != FORMAT_VERSION {
			tracing::warn!(
				template = name,
				version = artifact.format_version,
				expected = FORMAT_VERSION,
				"discarding stored artifact with another format version"
			);
			return None;
		}
		if artifact.name != name || artifact.signature != signature {
			tracing::warn!(
				template = name,
				stored = %artifact.name,
				"discarding stored artifact for another template"
			);
			return None;
		}
		tracing::debug!(template = name, "loaded compiled artifact from store");
		Some(artifact)
	}
}

impl fmt::Debug for ArtifactCache {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ArtifactCache")
			.field("entries", &self.len())
			.field("persistent", &self.store.is_some())
			.field("stats", &self.stats())
			.finish()
	}
}
