//! Engine configuration.
//!
//! Supports TOML configuration files and builder-style overrides.

use crate::scanner::ScanOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration of an [`Engine`](crate::Engine).
///
/// # Examples
///
/// ```
/// use stencil_templates::EngineConfig;
///
/// let config = EngineConfig::from_toml(
/// 	r#"
/// roots = ["templates"]
/// prefix = "st"
///
/// [forms]
/// errors_separator = "; "
/// "#,
/// )
/// .unwrap();
///
/// assert_eq!(config.prefix, "st");
/// assert_eq!(config.forms.errors_separator, "; ");
/// assert_eq!(config.max_include_depth, 32);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	/// Template search roots, in lookup order
	pub roots: Vec<PathBuf>,

	/// Suffixes tried for each name, in order
	pub suffixes: Vec<String>,

	/// Directive attribute prefix (`th` for `th:if`)
	pub prefix: String,

	/// Elements whose content is verbatim
	pub verbatim_tags: Vec<String>,

	/// Revalidate cached artifacts against the current sources on every lookup
	pub auto_reload: bool,

	/// Maximum fragment/component nesting
	pub max_include_depth: usize,

	/// Maximum layout chain length
	pub max_layout_depth: usize,

	/// Maximum number of fragments and components inlined into one artifact
	pub max_inlined_fragments: usize,

	/// Template name prefix used to resolve unregistered components
	pub component_prefix: String,

	/// Directory of the persistent artifact store, if any
	pub cache_dir: Option<PathBuf>,

	/// Names used by the form directives
	pub forms: FormConfig,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			roots: Vec::new(),
			suffixes: vec![".html".to_string(), String::new()],
			prefix: "th".to_string(),
			verbatim_tags: vec!["pre".to_string(), "code".to_string()],
			auto_reload: true,
			max_include_depth: 32,
			max_layout_depth: 16,
			max_inlined_fragments: 4096,
			component_prefix: "components/".to_string(),
			cache_dir: None,
			forms: FormConfig::default(),
		}
	}
}

impl EngineConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a template search root.
	pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
		self.roots.push(root.into());
		self
	}

	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();
		self
	}

	pub fn with_verbatim_tags(mut self, tags: Vec<String>) -> Self {
		self.verbatim_tags = tags;
		self
	}

	pub fn with_auto_reload(mut self, enabled: bool) -> Self {
		self.auto_reload = enabled;
		self
	}

	pub fn with_max_include_depth(mut self, depth: usize) -> Self {
		self.max_include_depth = depth;
		self
	}

	pub fn with_max_layout_depth(mut self, depth: usize) -> Self {
		self.max_layout_depth = depth;
		self
	}

	pub fn with_max_inlined_fragments(mut self, count: usize) -> Self {
		self.max_inlined_fragments = count;
		self
	}

	pub fn with_component_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.component_prefix = prefix.into();
		self
	}

	pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.cache_dir = Some(dir.into());
		self
	}

	pub fn with_forms(mut self, forms: FormConfig) -> Self {
		self.forms = forms;
		self
	}

	/// Load configuration from a TOML file.
	///
	/// # Errors
	///
	/// Returns error if the file cannot be read or parsed.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
			path: path.as_ref().to_path_buf(),
			source: e,
		})?;

		Self::from_toml(&content)
	}

	/// Parse configuration from a TOML string.
	pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
		toml::from_str(content).map_err(|e| ConfigError::Parse {
			message: e.to_string(),
		})
	}

	/// Scanner settings derived from this configuration.
	pub fn scan_options(&self) -> ScanOptions {
		ScanOptions {
			prefix: self.prefix.clone(),
			verbatim_tags: self.verbatim_tags.clone(),
		}
	}
}

/// Field and variable names used by `csrf`, `method` and `errors`.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
	/// Name of the hidden CSRF input
	pub csrf_field: String,
	/// Context variable holding the CSRF token
	pub csrf_variable: String,
	/// Name of the hidden method-override input
	pub method_field: String,
	/// Context variable holding field errors (a map keyed by binding path)
	pub errors_variable: String,
	/// Markup placed between error messages
	pub errors_separator: String,
}

impl Default for FormConfig {
	fn default() -> Self {
		Self {
			csrf_field: "_csrf_token".to_string(),
			csrf_variable: "csrf_token".to_string(),
			method_field: "_method".to_string(),
			errors_variable: "errors".to_string(),
			errors_separator: "<br>".to_string(),
		}
	}
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config: {message}")]
	Parse { message: String },
}
