//! Template loaders
//!
//! A loader resolves a logical template name to its source text. Loaders do
//! not cache: change detection relies on the signature recomputed on every
//! load.

use crate::artifact::signature;
use crate::error::LoadError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// A loaded template document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
	/// Logical name the template was requested by
	pub name: String,
	pub contents: String,
	/// File the contents were read from, if any
	pub path: Option<PathBuf>,
	/// Hex SHA-256 of `contents`
	pub signature: String,
}

impl TemplateSource {
	pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
		let contents = contents.into();
		Self {
			name: name.into(),
			signature: signature(&contents),
			contents,
			path: None,
		}
	}

	pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.path = Some(path.into());
		self
	}
}

/// Resolves template names to sources.
pub trait TemplateLoader: Send + Sync {
	fn load(&self, name: &str) -> Result<TemplateSource, LoadError>;
}

impl<T: TemplateLoader + ?Sized> TemplateLoader for Arc<T> {
	fn load(&self, name: &str) -> Result<TemplateSource, LoadError> {
		(**self).load(name)
	}
}

/// Loads templates from ordered search roots.
///
/// For each root in order, each suffix is tried in order (`name.html`, then
/// `name` by default); the first existing file wins.
///
/// # Security
///
/// Names containing `..` components or starting at the filesystem root are
/// rejected, and resolved files must stay inside their root.
///
/// # Example
///
/// ```rust,no_run
/// use stencil_templates::{FileSystemLoader, TemplateLoader};
///
/// let loader = FileSystemLoader::new(vec!["/app/templates".into()]);
/// let source = loader.load("pages/home").unwrap();
/// println!("{}", source.signature);
/// ```
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
	roots: Vec<PathBuf>,
	suffixes: Vec<String>,
}

impl FileSystemLoader {
	pub fn new(roots: Vec<PathBuf>) -> Self {
		Self {
			roots,
			suffixes: vec![".html".to_string(), String::new()],
		}
	}

	/// Replaces the suffixes tried for each root.
	pub fn with_suffixes(mut self, suffixes: Vec<String>) -> Self {
		self.suffixes = suffixes;
		self
	}

	pub fn roots(&self) -> &[PathBuf] {
		&self.roots
	}

	fn validate_name(name: &str) -> Result<&Path, LoadError> {
		if name.is_empty() {
			return Err(LoadError::InvalidName {
				name: name.to_string(),
				reason: "empty name",
			});
		}
		let path = Path::new(name);
		for component in path.components() {
			match component {
				Component::ParentDir => {
					return Err(LoadError::InvalidName {
						name: name.to_string(),
						reason: "directory traversal is not allowed",
					});
				}
				Component::RootDir | Component::Prefix(_) => {
					return Err(LoadError::InvalidName {
						name: name.to_string(),
						reason: "absolute paths are not allowed",
					});
				}
				_ => {}
			}
		}
		Ok(path)
	}

	/// Returns the file for `relative` under `root`, if it exists and does not
	/// escape the root through a symlink.
	fn candidate(root: &Path, relative: &str) -> io::Result<Option<PathBuf>> {
		let full = root.join(relative);
		if !full.is_file() {
			return Ok(None);
		}
		let canonical_full = full.canonicalize()?;
		let canonical_root = root.canonicalize()?;
		Ok(canonical_full.starts_with(&canonical_root).then_some(full))
	}
}

impl TemplateLoader for FileSystemLoader {
	fn load(&self, name: &str) -> Result<TemplateSource, LoadError> {
		Self::validate_name(name)?;
		for root in &self.roots {
			for suffix in &self.suffixes {
				let relative = format!("{}{}", name, suffix);
				let io_error = |source| LoadError::Io {
					name: name.to_string(),
					source,
				};
				if let Some(path) = Self::candidate(root, &relative).map_err(io_error)? {
					let contents = fs::read_to_string(&path).map_err(io_error)?;
					tracing::trace!(template = name, path = %path.display(), "loaded template");
					return Ok(TemplateSource::new(name, contents).with_path(path));
				}
			}
		}
		Err(LoadError::NotFound(name.to_string()))
	}
}

/// Serves templates registered in memory.
///
/// # Examples
///
/// ```
/// use stencil_templates::{MemoryLoader, TemplateLoader};
///
/// let loader = MemoryLoader::new();
/// loader.add("greeting", "<p>Hi {name}</p>");
/// assert_eq!(loader.load("greeting").unwrap().contents, "<p>Hi {name}</p>");
/// assert!(loader.load("missing").is_err());
/// ```
#[derive(Debug, Default)]
pub struct MemoryLoader {
	templates: RwLock<HashMap<String, String>>,
}

impl MemoryLoader {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds or replaces a template.
	pub fn add(&self, name: impl Into<String>, contents: impl Into<String>) {
		self.templates.write().insert(name.into(), contents.into());
	}

	/// Builder form of [`MemoryLoader::add`].
	pub fn with(self, name: impl Into<String>, contents: impl Into<String>) -> Self {
		self.add(name, contents);
		self
	}

	pub fn remove(&self, name: &str) -> bool {
		self.templates.write().remove(name).is_some()
	}
}

impl TemplateLoader for MemoryLoader {
	fn load(&self, name: &str) -> Result<TemplateSource, LoadError> {
		self.templates
			.read()
			.get(name)
			.map(|contents| TemplateSource::new(name, contents.as_str()))
			.ok_or_else(|| LoadError::NotFound(name.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::io::Write;
	use tempfile::TempDir;

	fn create_test_template(dir: &Path, name: &str, content: &str) -> io::Result<()> {
		let file_path = dir.join(name);
		if let Some(parent) = file_path.parent() {
			fs::create_dir_all(parent)?;
		}
		let mut file = fs::File::create(file_path)?;
		file.write_all(content.as_bytes())?;
		Ok(())
	}

	#[rstest]
	fn test_load_with_html_suffix() {
		let temp_dir = TempDir::new().unwrap();
		create_test_template(temp_dir.path(), "page.html", "<p>page</p>").unwrap();

		let loader = FileSystemLoader::new(vec![temp_dir.path().to_path_buf()]);
		let source = loader.load("page").unwrap();

		assert_eq!(source.contents, "<p>page</p>");
		assert_eq!(source.signature, signature("<p>page</p>"));
		assert!(source.path.unwrap().ends_with("page.html"));
	}

	#[rstest]
	fn test_load_exact_name() {
		let temp_dir = TempDir::new().unwrap();
		create_test_template(temp_dir.path(), "sub/card.htm", "card").unwrap();

		let loader = FileSystemLoader::new(vec![temp_dir.path().to_path_buf()]);
		assert_eq!(loader.load("sub/card.htm").unwrap().contents, "card");
	}

	#[rstest]
	fn test_roots_searched_in_order() {
		let first = TempDir::new().unwrap();
		let second = TempDir::new().unwrap();
		create_test_template(first.path(), "a.html", "first").unwrap();
		create_test_template(second.path(), "a.html", "second").unwrap();
		create_test_template(second.path(), "b.html", "only second").unwrap();

		let loader = FileSystemLoader::new(vec![
			first.path().to_path_buf(),
			second.path().to_path_buf(),
		]);
		assert_eq!(loader.load("a").unwrap().contents, "first");
		assert_eq!(loader.load("b").unwrap().contents, "only second");
	}

	#[rstest]
	#[case("../etc/passwd")]
	#[case("./../../secrets/key.txt")]
	#[case("sub/../../x")]
	#[case("/etc/passwd")]
	#[case("")]
	fn test_invalid_names_rejected(#[case] name: &str) {
		let temp_dir = TempDir::new().unwrap();
		let loader = FileSystemLoader::new(vec![temp_dir.path().to_path_buf()]);

		assert!(matches!(
			loader.load(name),
			Err(LoadError::InvalidName { .. })
		));
	}

	#[rstest]
	fn test_missing_template() {
		let temp_dir = TempDir::new().unwrap();
		let loader = FileSystemLoader::new(vec![temp_dir.path().to_path_buf()]);

		assert!(matches!(loader.load("nope"), Err(LoadError::NotFound(name)) if name == "nope"));
	}

	#[rstest]
	fn test_directory_is_not_a_template() {
		let temp_dir = TempDir::new().unwrap();
		fs::create_dir_all(temp_dir.path().join("dir")).unwrap();
		let loader = FileSystemLoader::new(vec![temp_dir.path().to_path_buf()]);

		assert!(matches!(loader.load("dir"), Err(LoadError::NotFound(_))));
	}

	#[rstest]
	fn test_changed_file_changes_signature() {
		let temp_dir = TempDir::new().unwrap();
		create_test_template(temp_dir.path(), "x.html", "one").unwrap();
		let loader = FileSystemLoader::new(vec![temp_dir.path().to_path_buf()]);
		let before = loader.load("x").unwrap().signature;

		create_test_template(temp_dir.path(), "x.html", "two").unwrap();
		assert_ne!(loader.load("x").unwrap().signature, before);
	}

	#[rstest]
	fn test_memory_loader_replace_and_remove() {
		let loader = MemoryLoader::new().with("a", "1");
		loader.add("a", "2");
		assert_eq!(loader.load("a").unwrap().contents, "2");
		assert!(loader.remove("a"));
		assert!(loader.load("a").is_err());
	}
}
