//! # Stencil Templates
//!
//! Directive-attribute template engine: HTML documents carry their logic in
//! `th:*` attributes and `{expr}` interpolations, are compiled once into an
//! instruction tree, cached by content signature and executed against a
//! render context.
//!
//! ## Features
//!
//! - Conditionals and selection: `th:if`, `th:unless`, `th:switch` / `th:case` / `th:default`
//! - Iteration and locals: `th:repeat="item in items"`, `th:with="a = b"`
//! - Output: `{expr}` and `th:text` (escaped), `th:html` / `th:raw` (unescaped)
//! - Attributes: `th:attr`, `th:class`, `th:style`, `th:<any>="expr"`
//! - Layouts: `th:extend`, `th:section`, `th:yield`
//! - Reuse: `th:fragment`, `th:include`, `th:replace`, `th:component`
//! - Forms: `th:field`, `th:errors`, `th:csrf`, `th:method`
//! - Verbatim regions (`pre`, `code`) whose entities survive byte-for-byte
//!
//! ## Example
//!
//! ```
//! use stencil_templates::{Engine, EngineConfig, MemoryLoader, RenderContext};
//!
//! let loader = MemoryLoader::new()
//! 	.with("greeting", "<p th:if=\"user.active\">Hi {user.name}</p>");
//! let engine = Engine::with_loader(EngineConfig::default(), loader);
//!
//! let ctx = RenderContext::from_json(serde_json::json!({
//! 	"user": {"active": true, "name": "<b>Al</b>"}
//! }));
//! assert_eq!(
//! 	engine.render("greeting", &ctx).unwrap(),
//! 	"<p>Hi &lt;b&gt;Al&lt;/b&gt;</p>"
//! );
//! ```

pub mod artifact;
pub mod cache;
mod compiler;
pub mod config;
pub mod context;
pub mod directive;
mod document;
pub mod engine;
pub mod error;
pub mod error_reporting;
pub mod escape;
mod fragment;
mod layout;
pub mod loader;
pub mod registry;
pub mod runtime;
pub mod scanner;
pub mod store;
pub mod value;

pub use artifact::{
	CompiledArtifact, Dependency, EmitMode, FORMAT_VERSION, FragmentSignature, Instr, signature,
};
pub use cache::{ArtifactCache, CacheStats};
pub use config::{ConfigError, EngineConfig, FormConfig};
pub use context::{Function, RenderContext};
pub use engine::Engine;
pub use error::{
	CompileError, CompileResult, HostError, LoadError, RuntimeError, ScanError, TemplateError,
	TemplateResult,
};
pub use error_reporting::{ErrorReport, suggest_similar};
pub use fragment::DEFAULT_SLOT;
pub use loader::{FileSystemLoader, MemoryLoader, TemplateLoader, TemplateSource};
pub use registry::Registry;
pub use runtime::execute;
pub use store::{ArtifactStore, FileStore, MemoryStore};
pub use value::{HostObject, Value, ValueMap};
