//! Engine facade
//!
//! [`Engine`] ties a loader, the fragment/component registry, the artifact
//! cache and the configuration together. It is `Send + Sync`; share one per
//! application.

use crate::artifact::CompiledArtifact;
use crate::cache::ArtifactCache;
use crate::compiler::Compiler;
use crate::config::EngineConfig;
use crate::context::RenderContext;
use crate::error::{TemplateError, TemplateResult};
use crate::error_reporting::ErrorReport;
use crate::loader::{FileSystemLoader, TemplateLoader, TemplateSource};
use crate::registry::Registry;
use crate::runtime::execute;
use crate::store::{ArtifactStore, FileStore};
use std::fmt;
use std::sync::Arc;

/// Compiles, caches and renders templates.
///
/// # Examples
///
/// ```
/// use stencil_templates::{Engine, EngineConfig, MemoryLoader, RenderContext};
///
/// let loader = MemoryLoader::new()
/// 	.with("base", "<body><div th:yield=\"content\">nothing</div></body>")
/// 	.with(
/// 		"page",
/// 		"<th:block th:extend=\"base\"/><p th:section=\"content\">Hi {name}</p>",
/// 	);
/// let engine = Engine::with_loader(EngineConfig::default(), loader);
///
/// let mut ctx = RenderContext::new();
/// ctx.insert("name", "Al");
/// assert_eq!(engine.render("page", &ctx).unwrap(), "<body>Hi Al</body>");
/// ```
pub struct Engine {
	config: EngineConfig,
	loader: Box<dyn TemplateLoader>,
	registry: Registry,
	cache: ArtifactCache,
}

impl Engine {
	/// Creates an engine loading templates from `config.roots`, with a
	/// persistent artifact store when `config.cache_dir` is set.
	pub fn new(config: EngineConfig) -> Self {
		let loader =
			FileSystemLoader::new(config.roots.clone()).with_suffixes(config.suffixes.clone());
		Self::with_loader(config, loader)
	}

	/// Creates an engine with a custom loader.
	pub fn with_loader(config: EngineConfig, loader: impl TemplateLoader + 'static) -> Self {
		let cache = match &config.cache_dir {
			Some(dir) => ArtifactCache::with_store(FileStore::new(dir)),
			None => ArtifactCache::new(),
		};
		Self {
			config,
			loader: Box::new(loader),
			registry: Registry::new(),
			cache,
		}
	}

	/// Replaces the artifact cache with one persisted to `store`.
	pub fn with_store(mut self, store: impl ArtifactStore + 'static) -> Self {
		self.cache = ArtifactCache::with_store(store);
		self
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	/// Registry for components, guards and namespaced fragments.
	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	pub fn cache(&self) -> &ArtifactCache {
		&self.cache
	}

	/// Returns the compiled artifact of template `name`, compiling it when the
	/// cache has no valid entry.
	pub fn compile(&self, name: &str) -> TemplateResult<Arc<CompiledArtifact>> {
		let source = self.loader.load(name)?;
		self.compile_loaded(source)
	}

	/// Compiles a template given as a string. Layouts, fragments and
	/// components it references are still resolved through the loader.
	pub fn compile_source(
		&self,
		name: &str,
		contents: &str,
	) -> TemplateResult<Arc<CompiledArtifact>> {
		self.compile_loaded(TemplateSource::new(name, contents))
	}

	/// Compiles (or fetches) template `name` and renders it.
	pub fn render(&self, name: &str, ctx: &RenderContext) -> TemplateResult<String> {
		let artifact = self.compile(name)?;
		Ok(execute(&artifact, ctx)?)
	}

	/// Compiles (or fetches) a template given as a string and renders it.
	pub fn render_source(
		&self,
		name: &str,
		contents: &str,
		ctx: &RenderContext,
	) -> TemplateResult<String> {
		let artifact = self.compile_source(name, contents)?;
		Ok(execute(&artifact, ctx)?)
	}

	/// Drops every cached artifact and every namespaced fragment learned from
	/// them.
	pub fn clear_cache(&self) {
		tracing::debug!("clearing compiled artifact cache");
		self.cache.clear();
		self.registry.clear_fragments();
	}

	/// Builds a located report for a compile error, reading the offending
	/// template through the loader.
	pub fn report(&self, error: &TemplateError) -> Option<ErrorReport> {
		let TemplateError::Compile(error) = error else {
			return None;
		};
		let (template, _) = error.location()?;
		let source = self.loader.load(template).ok()?;
		ErrorReport::from_compile_error(error, &source.contents)
	}

	fn compile_loaded(&self, source: TemplateSource) -> TemplateResult<Arc<CompiledArtifact>> {
		if let Some(artifact) = self.cache.get(&source.name, &source.signature) {
			if self.dependencies_current(&artifact) {
				tracing::debug!(template = %source.name, "compiled artifact cache hit");
				self.learn_fragments(&artifact, false);
				return Ok(artifact);
			}
			tracing::debug!(
				template = %source.name,
				"dependency changed, recompiling template"
			);
		} else {
			tracing::debug!(template = %source.name, "compiled artifact cache miss");
		}

		let name = source.name.clone();
		let signature = source.signature.clone();
		let artifact = Compiler::new(&self.config, self.loader.as_ref(), &self.registry)
			.compile(source)
			.inspect_err(|error| tracing::debug!(template = %name, %error, "compilation failed"))?;
		let artifact = Arc::new(artifact);
		self.learn_fragments(&artifact, true);
		self.cache.put(&name, &signature, artifact.clone());
		Ok(artifact)
	}

	/// Checks the signature of every template inlined into `artifact`.
	///
	/// Without auto-reload, cached artifacts are trusted as they are.
	fn dependencies_current(&self, artifact: &CompiledArtifact) -> bool {
		if !self.config.auto_reload {
			return true;
		}
		artifact.dependencies.iter().all(|dependency| {
			self.loader
				.load(&dependency.name)
				.is_ok_and(|source| source.signature == dependency.signature)
		})
	}

	/// Records the namespaced fragments `artifact` declares so that other
	/// templates can include them as `ns::name`.
	fn learn_fragments(&self, artifact: &CompiledArtifact, force: bool) {
		let names: Vec<String> = artifact
			.fragments
			.iter()
			.filter(|fragment| fragment.name.contains("::"))
			.map(|fragment| fragment.name.clone())
			.collect();
		let known = names.iter().all(|name| {
			self.registry.fragment_template(name).as_deref() == Some(artifact.name.as_str())
		});
		if force || !known {
			self.registry.register_fragments(&artifact.name, &names);
		}
	}
}

impl fmt::Debug for Engine {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Engine")
			.field("config", &self.config)
			.field("registry", &self.registry)
			.field("cache", &self.cache)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::loader::MemoryLoader;
	use crate::store::MemoryStore;
	use rstest::rstest;

	#[rstest]
	fn test_engine_is_send_and_sync() {
		fn assert_send_sync<T: Send + Sync>() {}
		assert_send_sync::<Engine>();
	}

	#[rstest]
	fn test_second_compile_is_a_cache_hit() {
		let loader = MemoryLoader::new().with("a", "<p>{x}</p>");
		let engine = Engine::with_loader(EngineConfig::default(), loader);

		let first = engine.compile("a").unwrap();
		let second = engine.compile("a").unwrap();
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(engine.cache().stats().hits, 1);
	}

	#[rstest]
	fn test_changed_source_gets_new_artifact() {
		let loader = Arc::new(MemoryLoader::new().with("a", "one"));
		let engine = Engine::with_loader(EngineConfig::default(), loader.clone());
		let ctx = RenderContext::new();

		assert_eq!(engine.render("a", &ctx).unwrap(), "one");
		loader.add("a", "two");
		assert_eq!(engine.render("a", &ctx).unwrap(), "two");
		assert_eq!(engine.cache().len(), 1);
	}

	#[rstest]
	fn test_repeated_edits_keep_one_artifact_per_template() {
		let loader = Arc::new(MemoryLoader::new().with("a", "v0").with("b", "other"));
		let engine = Engine::with_loader(EngineConfig::default(), loader.clone());
		let ctx = RenderContext::new();
		engine.render("b", &ctx).unwrap();

		for version in 1..50 {
			loader.add("a", format!("v{version}"));
			assert_eq!(engine.render("a", &ctx).unwrap(), format!("v{version}"));
		}
		assert_eq!(engine.cache().len(), 2);
	}

	#[rstest]
	fn test_namespaced_fragments_are_registered() {
		let loader = MemoryLoader::new()
			.with("lib", "<b th:fragment=\"ui::badge(n)\">{n}</b>")
			.with("page", "<span th:replace=\"ui::badge(3)\"></span>");
		let engine = Engine::with_loader(EngineConfig::default(), loader);

		engine.compile("lib").unwrap();
		assert_eq!(
			engine.registry().fragment_template("ui::badge").as_deref(),
			Some("lib")
		);
		let html = engine.render("page", &RenderContext::new()).unwrap();
		assert_eq!(html, "<b>3</b>");

		engine.clear_cache();
		assert!(engine.registry().fragment_template("ui::badge").is_none());
		assert!(engine.cache().is_empty());
	}

	#[rstest]
	fn test_report_locates_compile_errors() {
		let loader = MemoryLoader::new().with("bad", "<div>\n  <p th:if=\"a +\">x</p>\n</div>");
		let engine = Engine::with_loader(EngineConfig::default(), loader);

		let error = engine.compile("bad").unwrap_err();
		let report = engine.report(&error).unwrap();
		assert_eq!(report.template, "bad");
		assert_eq!(report.line, 2);
		assert!(report.format().contains("Error in template: bad"));
	}

	#[rstest]
	fn test_with_store_persists_artifacts() {
		let loader = MemoryLoader::new().with("a", "x");
		let engine =
			Engine::with_loader(EngineConfig::default(), loader).with_store(MemoryStore::new());
		engine.compile("a").unwrap();
		assert_eq!(engine.cache().len(), 1);
	}
}
