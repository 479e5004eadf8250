//! # Stencil
//!
//! Directive-attribute HTML templates. Documents stay valid HTML: logic lives
//! in `th:*` attributes and `{expr}` interpolations, templates are compiled
//! once into an instruction tree, cached by the SHA-256 of their contents and
//! rendered against a context of host values.
//!
//! ## Feature Flags
//!
//! - `templates` (default) - The engine: scanner, compiler, cache, renderer
//! - `expr` - The expression language alone (lexer, parser, AST)
//!
//! ## Quick Example
//!
//! ```rust
//! # #[cfg(feature = "templates")]
//! # {
//! use stencil::prelude::*;
//!
//! let loader = MemoryLoader::new()
//! 	.with("layout", "<body><main th:yield=\"content\"></main></body>")
//! 	.with(
//! 		"home",
//! 		"<th:block th:extend=\"layout\"/>\
//! 		 <ul th:section=\"content\"><li th:repeat=\"item in items\">{item}</li></ul>",
//! 	);
//! let engine = Engine::with_loader(EngineConfig::default(), loader);
//!
//! let ctx = RenderContext::from_json(serde_json::json!({"items": ["a", "b"]}));
//! assert_eq!(
//! 	engine.render("home", &ctx).unwrap(),
//! 	"<body><li>a</li><li>b</li></body>"
//! );
//! # }
//! ```

#[cfg(feature = "expr")]
pub use stencil_expr as expr;

#[cfg(feature = "templates")]
pub use stencil_templates as templates;

#[cfg(feature = "templates")]
pub use stencil_templates::{
	CompileError, Engine, EngineConfig, RenderContext, TemplateError, TemplateResult, Value,
};

/// Commonly used types.
pub mod prelude {
	#[cfg(feature = "expr")]
	pub use stencil_expr::{Expr, ParseError, parse};

	#[cfg(feature = "templates")]
	pub use stencil_templates::{
		ArtifactCache, CompileError, Engine, EngineConfig, FileStore, FileSystemLoader,
		HostError, HostObject, MemoryLoader, RenderContext, TemplateError, TemplateLoader,
		TemplateResult, Value,
	};
}
