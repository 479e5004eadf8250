//! Directive vocabulary, parsing and validation.
//!
//! Directive attributes are parsed into [`Directive`] values, checked for
//! incompatible combinations and ordered by [`Directive::priority`]:
//!
//! | Priority | Directives |
//! |---------:|------------|
//! | 1 | `if` `unless` `switch` `case` `default` |
//! | 2 | host-registered guards |
//! | 3 | `with` |
//! | 4 | `repeat` |
//! | 5 | `text` `html` `raw` |
//! | 6 | `fragment` `include` `replace` |
//! | 7 | `field` `errors` `csrf` `method` |
//! | 8 | `attr` `class` `style` and universal attribute bindings |
//! | 9 | `extend` `section` `yield` |
//! | 10 | `component` |
//! | 11 | `remove` |

use crate::error::{CompileError, CompileResult};
use crate::scanner::{Attribute, DirectiveElement};
use stencil_expr::{
	Binding, CallSignature, Expr, Iteration, ParseError, VariablePath, parse, parse_bindings,
	parse_call_signature, parse_iteration,
};

/// What `remove` strips from the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveMode {
	/// The element and its body
	All,
	/// Only the start and end tags
	Tag,
	/// Only the body
	Body,
	/// Nothing
	None,
}

/// A `fragment` declaration: `name(p1, p2)` or `ns::name(p1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDecl {
	pub namespace: Option<String>,
	pub name: String,
	pub params: Vec<String>,
}

impl FragmentDecl {
	pub fn qualified_name(&self) -> String {
		match &self.namespace {
			Some(ns) => format!("{}::{}", ns, self.name),
			None => self.name.clone(),
		}
	}
}

/// A parsed directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
	If(Expr),
	Unless(Expr),
	Switch(Expr),
	Case(Expr),
	Default,
	Guard { name: String, argument: Expr },
	With(Vec<Binding>),
	Repeat(Iteration),
	Text(Expr),
	Html(Expr),
	Raw(Expr),
	Fragment(FragmentDecl),
	Include(CallSignature),
	Replace(CallSignature),
	Field(VariablePath),
	Errors(String),
	Csrf,
	Method(String),
	Attr(Vec<Binding>),
	Class(Expr),
	Style(Expr),
	Universal { name: String, value: Expr },
	Extend(String),
	Section(String),
	Yield(String),
	Component(CallSignature),
	Remove(RemoveMode),
}

impl Directive {
	/// Wrapping order; lower values wrap higher ones.
	pub fn priority(&self) -> u8 {
		match self {
			Self::If(_) | Self::Unless(_) | Self::Switch(_) | Self::Case(_) | Self::Default => 1,
			Self::Guard { .. } => 2,
			Self::With(_) => 3,
			Self::Repeat(_) => 4,
			Self::Text(_) | Self::Html(_) | Self::Raw(_) => 5,
			Self::Fragment(_) | Self::Include(_) | Self::Replace(_) => 6,
			Self::Field(_) | Self::Errors(_) | Self::Csrf | Self::Method(_) => 7,
			Self::Attr(_) | Self::Class(_) | Self::Style(_) | Self::Universal { .. } => 8,
			Self::Extend(_) | Self::Section(_) | Self::Yield(_) => 9,
			Self::Component(_) => 10,
			Self::Remove(_) => 11,
		}
	}

	fn is_control(&self) -> bool {
		matches!(
			self,
			Self::If(_)
				| Self::Unless(_)
				| Self::Switch(_)
				| Self::Case(_)
				| Self::Default
				| Self::Repeat(_)
		)
	}

	fn replaces_body(&self, tag: &str) -> bool {
		match self {
			Self::Text(_)
			| Self::Html(_)
			| Self::Raw(_)
			| Self::Include(_)
			| Self::Replace(_)
			| Self::Component(_)
			| Self::Errors(_)
			| Self::Yield(_) => true,
			Self::Field(_) => matches!(tag, "textarea" | "select"),
			_ => false,
		}
	}

	fn conflicts_with(&self, other: &Directive, tag: &str) -> bool {
		if self.is_control() && other.is_control() {
			return true;
		}
		if self.replaces_body(tag) && other.replaces_body(tag) {
			return true;
		}
		let pair = |a: &Directive, b: &Directive| match (a, b) {
			(Self::Fragment(_), Self::Include(_) | Self::Replace(_) | Self::Component(_)) => true,
			(Self::Extend(_), Self::Section(_) | Self::Yield(_)) => true,
			(Self::Extend(_), other) => other.is_control(),
			_ => false,
		};
		pair(self, other) || pair(other, self)
	}
}

/// A directive together with the attribute it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDirective {
	pub directive: Directive,
	/// Directive keyword (`if`, `repeat`, a guard or attribute name ...)
	pub keyword: String,
	/// Full attribute name as written
	pub attribute: String,
	/// Byte offset of the attribute
	pub offset: usize,
}

/// Parses, validates and orders the directives of `element`.
///
/// `is_guard` tells whether an unknown directive name is a registered guard.
pub fn parse_directives(
	element: &DirectiveElement,
	prefix: &str,
	template: &str,
	is_guard: &dyn Fn(&str) -> bool,
) -> CompileResult<Vec<ParsedDirective>> {
	let tag = element.tag_name();
	let mut directives = Vec::new();
	for (keyword, attr) in element.directives(prefix) {
		let site = Site {
			template,
			attr,
			keyword: &keyword,
		};
		let directive = site.parse(is_guard)?;
		directives.push(ParsedDirective {
			directive,
			keyword,
			attribute: attr.name.clone(),
			offset: attr.offset,
		});
	}

	for (i, first) in directives.iter().enumerate() {
		for second in &directives[i + 1..] {
			if first.directive.conflicts_with(&second.directive, &tag) {
				return Err(CompileError::IncompatibleDirectives {
					template: template.to_string(),
					first: first.attribute.clone(),
					second: second.attribute.clone(),
					offset: second.offset,
				});
			}
		}
	}

	directives.sort_by_key(|parsed| parsed.directive.priority());
	Ok(directives)
}

struct Site<'a> {
	template: &'a str,
	attr: &'a Attribute,
	keyword: &'a str,
}

impl Site<'_> {
	fn raw(&self) -> &str {
		self.attr.value.as_deref().unwrap_or("")
	}

	fn expression_error(&self, err: ParseError) -> CompileError {
		let raw = self.raw();
		let byte = raw
			.char_indices()
			.nth(err.offset)
			.map_or(raw.len(), |(i, _)| i);
		CompileError::Expression {
			template: self.template.to_string(),
			directive: self.attr.name.clone(),
			offset: self.attr.value_offset + byte,
			source: err,
		}
	}

	fn invalid(&self, message: impl Into<String>) -> CompileError {
		CompileError::InvalidDirective {
			template: self.template.to_string(),
			directive: self.attr.name.clone(),
			offset: self.attr.value_offset,
			message: message.into(),
		}
	}

	fn expr(&self) -> CompileResult<Expr> {
		parse(self.raw()).map_err(|err| self.expression_error(err))
	}

	fn signature(&self) -> CompileResult<CallSignature> {
		parse_call_signature(self.raw()).map_err(|err| self.expression_error(err))
	}

	/// A plain name such as a layout, section or HTTP method.
	fn literal(&self) -> CompileResult<String> {
		let value = self.raw().trim();
		let value = value
			.strip_prefix('\'')
			.and_then(|v| v.strip_suffix('\''))
			.unwrap_or(value)
			.trim();
		if value.is_empty() {
			return Err(self.invalid("a name is required"));
		}
		Ok(value.to_string())
	}

	fn parse(&self, is_guard: &dyn Fn(&str) -> bool) -> CompileResult<Directive> {
		Ok(match self.keyword {
			"if" => Directive::If(self.expr()?),
			"unless" => Directive::Unless(self.expr()?),
			"switch" => Directive::Switch(self.expr()?),
			"case" => Directive::Case(self.expr()?),
			"default" => Directive::Default,
			"with" => Directive::With(
				parse_bindings(self.raw()).map_err(|err| self.expression_error(err))?,
			),
			"repeat" => Directive::Repeat(
				parse_iteration(self.raw()).map_err(|err| self.expression_error(err))?,
			),
			"text" => Directive::Text(self.expr()?),
			"html" => Directive::Html(self.expr()?),
			"raw" => Directive::Raw(self.expr()?),
			"fragment" => Directive::Fragment(self.fragment_decl()?),
			"include" => Directive::Include(self.signature()?),
			"replace" => Directive::Replace(self.signature()?),
			"field" => match self.expr()? {
				Expr::Path(path) => Directive::Field(path),
				_ => return Err(self.invalid("field binding must be a variable path")),
			},
			"errors" => Directive::Errors(self.literal()?),
			"csrf" => Directive::Csrf,
			"method" => Directive::Method(self.literal()?.to_ascii_uppercase()),
			"attr" => Directive::Attr(
				parse_bindings(self.raw()).map_err(|err| self.expression_error(err))?,
			),
			"class" => Directive::Class(self.expr()?),
			"style" => Directive::Style(self.expr()?),
			"extend" => Directive::Extend(self.literal()?),
			"section" => Directive::Section(self.literal()?),
			"yield" => Directive::Yield(self.literal()?),
			"component" => Directive::Component(self.signature()?),
			"remove" => Directive::Remove(self.remove_mode()?),
			name if is_guard(name) => Directive::Guard {
				name: name.to_string(),
				argument: self.expr()?,
			},
			_ => Directive::Universal {
				name: self
					.attr
					.name
					.split_once(':')
					.map_or(self.keyword, |(_, tail)| tail)
					.to_string(),
				value: self.expr()?,
			},
		})
	}

	fn fragment_decl(&self) -> CompileResult<FragmentDecl> {
		let signature = self.signature()?;
		let params = signature
			.arguments
			.iter()
			.map(|arg| match (&arg.name, arg.value.as_identifier()) {
				(None, Some(name)) => Ok(name.to_string()),
				_ => Err(self.invalid("fragment parameters must be plain names")),
			})
			.collect::<CompileResult<Vec<_>>>()?;
		Ok(FragmentDecl {
			namespace: signature.namespace,
			name: signature.name,
			params,
		})
	}

	fn remove_mode(&self) -> CompileResult<RemoveMode> {
		match self.raw().trim().to_ascii_lowercase().as_str() {
			"" | "all" => Ok(RemoveMode::All),
			"tag" => Ok(RemoveMode::Tag),
			"body" => Ok(RemoveMode::Body),
			"none" => Ok(RemoveMode::None),
			other => Err(self.invalid(format!(
				"unknown remove mode '{}' (expected all, tag, body or none)",
				other
			))),
		}
	}
}
