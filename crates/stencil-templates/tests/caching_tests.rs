//! Artifact caching and loading integration tests
//!
//! Test Categories:
//! 1. In-memory cache behavior
//! 2. Dependency tracking
//! 3. Persistent store
//! 4. Filesystem loading and configuration

use rstest::rstest;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use stencil_templates::{
	ArtifactStore, CompiledArtifact, Engine, EngineConfig, FORMAT_VERSION, FileStore,
	MemoryLoader, MemoryStore, RenderContext, execute, signature,
};
use tempfile::TempDir;

fn ctx() -> RenderContext {
	RenderContext::from_json(json!({"name": "Al", "items": ["x", "y"]}))
}

const PAGE: &str = "<ul><li th:repeat=\"i in items\" th:text=\"i\"></li></ul><p>{name}</p>";

fn write_template(dir: &Path, name: &str, contents: &str) {
	let path = dir.join(name);
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).unwrap();
	}
	fs::write(path, contents).unwrap();
}

fn stored_files(dir: &Path) -> Vec<std::path::PathBuf> {
	fs::read_dir(dir)
		.unwrap()
		.map(|entry| entry.unwrap().path())
		.filter(|path| path.extension().is_some_and(|ext| ext == "json"))
		.collect()
}

// ============================================================================
// Category 1: In-memory cache behavior
// ============================================================================

#[rstest]
fn test_cached_render_matches_fresh_render() {
	let engine = Engine::with_loader(EngineConfig::default(), MemoryLoader::new().with("page", PAGE));

	let fresh = engine.render("page", &ctx()).unwrap();
	let cached = engine.render("page", &ctx()).unwrap();
	assert_eq!(fresh, "<ul><li>x</li><li>y</li></ul><p>Al</p>");
	assert_eq!(cached, fresh);
	assert_eq!(engine.cache().stats().hits, 1);
}

#[rstest]
fn test_artifact_survives_serialization_unchanged() {
	let engine = Engine::with_loader(EngineConfig::default(), MemoryLoader::new().with("page", PAGE));
	let artifact = engine.compile("page").unwrap();

	let decoded = CompiledArtifact::from_bytes(&artifact.to_bytes().unwrap()).unwrap();
	assert_eq!(&decoded, artifact.as_ref());
	assert_eq!(decoded.format_version, FORMAT_VERSION);
	assert_eq!(decoded.signature, signature(PAGE));
	assert_eq!(
		execute(&decoded, &ctx()).unwrap(),
		execute(&artifact, &ctx()).unwrap()
	);
}

#[rstest]
fn test_clear_cache_forces_recompilation() {
	let engine = Engine::with_loader(EngineConfig::default(), MemoryLoader::new().with("page", PAGE));
	let first = engine.compile("page").unwrap();

	engine.clear_cache();
	let second = engine.compile("page").unwrap();
	assert!(!Arc::ptr_eq(&first, &second));
	assert_eq!(first, second);
}

#[rstest]
fn test_concurrent_renders_share_one_engine() {
	let engine = Arc::new(Engine::with_loader(
		EngineConfig::default(),
		MemoryLoader::new().with("page", PAGE),
	));
	let expected = engine.render("page", &ctx()).unwrap();

	let handles: Vec<_> = (0..4)
		.map(|_| {
			let engine = engine.clone();
			std::thread::spawn(move || engine.render("page", &ctx()).unwrap())
		})
		.collect();
	for handle in handles {
		assert_eq!(handle.join().unwrap(), expected);
	}
}

// ============================================================================
// Category 2: Dependency tracking
// ============================================================================

#[rstest]
fn test_artifact_records_inlined_templates() {
	let loader = MemoryLoader::new()
		.with("base", "<main th:yield=\"content\">D</main>")
		.with("page", "<th:block th:extend=\"base\"/><p th:section=\"content\">X</p>");
	let engine = Engine::with_loader(EngineConfig::default(), loader);

	let artifact = engine.compile("page").unwrap();
	assert_eq!(artifact.layout.as_deref(), Some("base"));
	let names: Vec<&str> = artifact
		.dependencies
		.iter()
		.map(|dependency| dependency.name.as_str())
		.collect();
	assert!(names.contains(&"base"));
	assert_eq!(artifact.sections, vec!["content".to_string()]);
}

#[rstest]
#[case::auto_reload(true, "X<b>X</b>")]
#[case::trusting_cache(false, "X<i>!</i>")]
fn test_parent_change_and_auto_reload(#[case] auto_reload: bool, #[case] expected: &str) {
	let loader = Arc::new(
		MemoryLoader::new()
			.with("base", "<i th:yield=\"content\">D</i><i>!</i>")
			.with("page", "<th:block th:extend=\"base\"/><p th:section=\"content\">X</p>"),
	);
	let config = EngineConfig::default().with_auto_reload(auto_reload);
	let engine = Engine::with_loader(config, loader.clone());

	assert_eq!(engine.render("page", &ctx()).unwrap(), "X<i>!</i>");

	loader.add("base", "<b th:yield=\"content\">D</b><b>X</b>");
	assert_eq!(engine.render("page", &ctx()).unwrap(), expected);
}

#[rstest]
fn test_fragment_source_change_recompiles_includer() {
	let loader = Arc::new(
		MemoryLoader::new()
			.with("cards", "<em th:fragment=\"tag(t)\">{t}</em>")
			.with("page", "<p th:include=\"cards::tag('new')\"></p>"),
	);
	let engine = Engine::with_loader(EngineConfig::default(), loader.clone());
	assert_eq!(engine.render("page", &ctx()).unwrap(), "<p>new</p>");

	loader.add("cards", "<em th:fragment=\"tag(t)\">[{t}]</em>");
	assert_eq!(engine.render("page", &ctx()).unwrap(), "<p>[new]</p>");
}

// ============================================================================
// Category 3: Persistent store
// ============================================================================

#[rstest]
fn test_store_is_shared_across_engines() {
	let dir = TempDir::new().unwrap();
	let config = EngineConfig::default().with_cache_dir(dir.path().join("artifacts"));

	let first = Engine::with_loader(config.clone(), MemoryLoader::new().with("page", PAGE));
	let expected = first.render("page", &ctx()).unwrap();
	assert_eq!(stored_files(&dir.path().join("artifacts")).len(), 1);

	let second = Engine::with_loader(config, MemoryLoader::new().with("page", PAGE));
	assert_eq!(second.render("page", &ctx()).unwrap(), expected);
	let stats = second.cache().stats();
	assert_eq!(stats.store_hits, 1);
	assert_eq!(stats.misses, 0);
}

#[rstest]
#[case::garbage(b"\x00\x01 definitely not an artifact".to_vec())]
#[case::empty(Vec::new())]
#[case::wrong_shape(br#"{"format_version": 1}"#.to_vec())]
fn test_corrupt_store_entry_is_a_miss(#[case] corruption: Vec<u8>) {
	let dir = TempDir::new().unwrap();
	let store_dir = dir.path().join("artifacts");
	let config = EngineConfig::default().with_cache_dir(&store_dir);

	let expected = Engine::with_loader(config.clone(), MemoryLoader::new().with("page", PAGE))
		.render("page", &ctx())
		.unwrap();
	for path in stored_files(&store_dir) {
		fs::write(path, &corruption).unwrap();
	}

	let engine = Engine::with_loader(config, MemoryLoader::new().with("page", PAGE));
	assert_eq!(engine.render("page", &ctx()).unwrap(), expected);
	assert_eq!(engine.cache().stats().misses, 1);
	assert_eq!(engine.cache().stats().store_hits, 0);
}

#[rstest]
fn test_unwritable_store_does_not_fail_rendering() {
	let dir = TempDir::new().unwrap();
	let blocker = dir.path().join("not-a-dir");
	fs::write(&blocker, "file in the way").unwrap();

	let engine = Engine::with_loader(EngineConfig::default(), MemoryLoader::new().with("page", PAGE))
		.with_store(FileStore::new(&blocker));
	assert!(engine.render("page", &ctx()).is_ok());
	assert_eq!(engine.cache().len(), 1);
}

#[rstest]
fn test_clear_cache_empties_store() {
	let store = Arc::new(MemoryStore::new());
	struct Shared(Arc<MemoryStore>);

	impl ArtifactStore for Shared {
		fn read(&self, key: &str) -> std::io::Result<Option<Vec<u8>>> {
			self.0.read(key)
		}

		fn write(&self, key: &str, bytes: &[u8]) -> std::io::Result<()> {
			self.0.write(key, bytes)
		}

		fn delete_all(&self) -> std::io::Result<()> {
			self.0.delete_all()
		}
	}

	let engine = Engine::with_loader(EngineConfig::default(), MemoryLoader::new().with("page", PAGE))
		.with_store(Shared(store.clone()));
	engine.compile("page").unwrap();
	assert_eq!(store.len(), 1);

	engine.clear_cache();
	assert!(store.is_empty());
}

// ============================================================================
// Category 4: Filesystem loading and configuration
// ============================================================================

#[rstest]
fn test_engine_loads_layouts_from_disk() {
	let dir = TempDir::new().unwrap();
	write_template(
		dir.path(),
		"layouts/base.html",
		"<body><div th:yield=\"content\"></div></body>",
	);
	write_template(
		dir.path(),
		"pages/home.html",
		"<th:block th:extend=\"layouts/base\"/><h1 th:section=\"content\">Hi {name}</h1>",
	);

	let engine = Engine::new(EngineConfig::default().with_root(dir.path()));
	assert_eq!(engine.render("pages/home", &ctx()).unwrap(), "<body>Hi Al</body>");
}

#[rstest]
fn test_edited_file_is_picked_up() {
	let dir = TempDir::new().unwrap();
	write_template(dir.path(), "page.html", "one");
	let engine = Engine::new(EngineConfig::default().with_root(dir.path()));
	assert_eq!(engine.render("page", &ctx()).unwrap(), "one");

	write_template(dir.path(), "page.html", "two");
	assert_eq!(engine.render("page", &ctx()).unwrap(), "two");
}

#[rstest]
fn test_engine_config_from_toml_file() {
	let dir = TempDir::new().unwrap();
	let templates = dir.path().join("templates");
	write_template(&templates, "page.html", "<p data:text=\"name\">x</p>");
	let config_path = dir.path().join("stencil.toml");
	fs::write(
		&config_path,
		format!(
			"roots = [{:?}]\nprefix = \"data\"\nauto_reload = false\n\n[forms]\ncsrf_field = \"token\"\n",
			templates.display().to_string()
		),
	)
	.unwrap();

	let config = EngineConfig::from_file(&config_path).unwrap();
	assert_eq!(config.prefix, "data");
	assert!(!config.auto_reload);
	assert_eq!(config.forms.csrf_field, "token");
	assert_eq!(config.forms.errors_separator, "<br>");

	let engine = Engine::new(config);
	assert_eq!(engine.render("page", &ctx()).unwrap(), "<p>Al</p>");
}
