//! Error types for scanning, compiling, loading and rendering templates.
//!
//! Each layer has its own enum; [`TemplateError`] wraps all of them for the
//! [`Engine`](crate::Engine) API. Cache misses and corrupted cache entries are
//! never errors.

use stencil_expr::ParseError;

/// Errors raised by the region scanner.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
	#[error("element <{tag}> opened at offset {offset} is never closed")]
	UnclosedElement { tag: String, offset: usize },

	#[error("unterminated tag starting at offset {offset}")]
	UnterminatedTag { offset: usize },

	#[error("unterminated comment starting at offset {offset}")]
	UnterminatedComment { offset: usize },
}

impl ScanError {
	/// Byte offset of the construct that failed to scan.
	pub fn offset(&self) -> usize {
		match self {
			Self::UnclosedElement { offset, .. }
			| Self::UnterminatedTag { offset }
			| Self::UnterminatedComment { offset } => *offset,
		}
	}
}

/// Errors raised while turning a template into a compiled artifact.
///
/// Offsets are byte offsets into the named template's source.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
	#[error("failed to scan template '{template}': {source}")]
	Scan {
		template: String,
		#[source]
		source: ScanError,
	},

	#[error("invalid expression in '{directive}' of template '{template}': {source}")]
	Expression {
		template: String,
		directive: String,
		offset: usize,
		#[source]
		source: ParseError,
	},

	#[error("invalid value for '{directive}' in template '{template}': {message}")]
	InvalidDirective {
		template: String,
		directive: String,
		offset: usize,
		message: String,
	},

	#[error("directives '{first}' and '{second}' cannot be combined on one element in template '{template}'")]
	IncompatibleDirectives {
		template: String,
		first: String,
		second: String,
		offset: usize,
	},

	#[error("'{directive}' used outside of a switch in template '{template}'")]
	CaseOutsideSwitch {
		template: String,
		directive: String,
		offset: usize,
	},

	#[error("template '{template}' declares more than one parent layout")]
	MultipleExtends { template: String, offset: usize },

	#[error("circular layout inheritance: {}", chain.join(" -> "))]
	CircularExtends { chain: Vec<String> },

	#[error("template '{name}' not found (referenced from '{referrer}')")]
	TemplateNotFound {
		name: String,
		referrer: String,
		#[source]
		source: LoadError,
	},

	#[error("fragment '{name}' not found in template '{template}'{}", suggestion.as_ref().map(|s| format!(" (did you mean '{}'?)", s)).unwrap_or_default())]
	FragmentNotFound {
		template: String,
		name: String,
		offset: usize,
		suggestion: Option<String>,
	},

	#[error("recursive fragment inclusion: {}", chain.join(" -> "))]
	RecursiveInclude { chain: Vec<String> },

	#[error("{kind} nesting exceeds the limit of {limit} in template '{template}'")]
	RecursionLimit {
		template: String,
		kind: &'static str,
		limit: usize,
	},

	#[error("bad arguments for '{name}' in template '{template}': {message}")]
	Arguments {
		template: String,
		name: String,
		offset: usize,
		message: String,
	},
}

impl CompileError {
	/// Template name and byte offset the error points at, when known.
	pub fn location(&self) -> Option<(&str, usize)> {
		match self {
			Self::Scan { template, source } => Some((template.as_str(), source.offset())),
			Self::Expression {
				template, offset, ..
			}
			| Self::InvalidDirective {
				template, offset, ..
			}
			| Self::IncompatibleDirectives {
				template, offset, ..
			}
			| Self::CaseOutsideSwitch {
				template, offset, ..
			}
			| Self::MultipleExtends { template, offset }
			| Self::FragmentNotFound {
				template, offset, ..
			}
			| Self::Arguments {
				template, offset, ..
			} => Some((template.as_str(), *offset)),
			_ => None,
		}
	}

	/// A fix hint to show next to the error, when one is available.
	pub fn suggestion(&self) -> Option<String> {
		match self {
			Self::FragmentNotFound {
				suggestion: Some(name),
				..
			} => Some(format!("Did you mean '{}'?", name)),
			Self::CaseOutsideSwitch { .. } => {
				Some("Place case/default elements inside an element carrying a switch".to_string())
			}
			Self::CircularExtends { .. } => {
				Some("Remove one of the extend directives to break the cycle".to_string())
			}
			_ => None,
		}
	}
}

/// Errors raised by template loaders.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
	#[error("template '{0}' not found")]
	NotFound(String),

	#[error("invalid template name '{name}': {reason}")]
	InvalidName { name: String, reason: &'static str },

	#[error("failed to read template '{name}': {source}")]
	Io {
		name: String,
		#[source]
		source: std::io::Error,
	},
}

/// Failure signaled by a host object while resolving a property or method.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HostError {
	pub message: String,
}

impl HostError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}
}

/// Errors raised while executing a compiled artifact.
///
/// Missing data never produces an error; only failures explicitly signaled by
/// host objects or host functions do.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
	#[error("host failure in {target}.{member}: {source}")]
	Host {
		target: String,
		member: String,
		#[source]
		source: HostError,
	},
}

/// Top-level error returned by the engine.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
	#[error(transparent)]
	Compile(#[from] CompileError),

	#[error(transparent)]
	Load(#[from] LoadError),

	#[error(transparent)]
	Runtime(#[from] RuntimeError),
}

/// Result alias for engine operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Result alias for compilation.
pub type CompileResult<T> = Result<T, CompileError>;
