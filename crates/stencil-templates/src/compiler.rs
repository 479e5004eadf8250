//! Directive compiler
//!
//! A [`Compiler`] is one compile session: it turns a template (and every
//! layout, fragment and component it references) into a single
//! [`CompiledArtifact`]. Referenced documents are loaded, scanned and indexed
//! at most once per session and recorded as dependencies.
//!
//! Each directive element becomes a block of instructions. Directives wrap
//! each other in [`Directive::priority`] order: control flow outermost, then
//! guards, `with`, `repeat`, and finally the element's emission.

use crate::artifact::{
	CompiledArtifact, Dependency, EmitMode, FORMAT_VERSION, FragmentSignature, Instr,
};
use crate::config::EngineConfig;
use crate::directive::{Directive, ParsedDirective, RemoveMode, parse_directives};
use crate::document::Document;
use crate::error::{CompileError, CompileResult};
use crate::escape::{decode_verbatim_entities, escape_html_attr, is_boolean_attr};
use crate::layout::YieldFrame;
use crate::loader::{TemplateLoader, TemplateSource};
use crate::registry::Registry;
use crate::scanner::{DirectiveElement, ExpressionSite, ScanOptions, SiteContext, Span, split_sites};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use stencil_expr::{BinaryOp, Expr, Segment, VariablePath, parse};

/// How an element is being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementMode {
	/// At its position in the document
	InPlace,
	/// As the target of a `replace`; `remove` does not apply
	Fragment,
}

/// What fills the body of an element.
enum Content {
	Spans,
	Emit(Expr, EmitMode),
	Joined(Expr),
	Include(stencil_expr::CallSignature, usize),
}

/// One compile session.
pub(crate) struct Compiler<'a> {
	pub(crate) config: &'a EngineConfig,
	pub(crate) loader: &'a dyn TemplateLoader,
	pub(crate) registry: &'a Registry,
	options: ScanOptions,
	documents: HashMap<String, Rc<Document>>,
	dependencies: BTreeMap<String, String>,
	/// Case expressions collected per enclosing switch
	switches: Vec<Vec<Expr>>,
	/// Fragments and components being inlined, outermost first
	pub(crate) includes: Vec<String>,
	/// Fragments and components inlined so far
	pub(crate) inlined: usize,
	pub(crate) yields: Vec<YieldFrame>,
	/// Value bound by `field` on the enclosing `select`
	select_binding: Option<Expr>,
}

impl<'a> Compiler<'a> {
	pub(crate) fn new(
		config: &'a EngineConfig,
		loader: &'a dyn TemplateLoader,
		registry: &'a Registry,
	) -> Self {
		Self {
			config,
			loader,
			registry,
			options: config.scan_options(),
			documents: HashMap::new(),
			dependencies: BTreeMap::new(),
			switches: Vec::new(),
			includes: Vec::new(),
			inlined: 0,
			yields: Vec::new(),
			select_binding: None,
		}
	}

	/// Compiles `source` into an artifact.
	pub(crate) fn compile(mut self, source: TemplateSource) -> CompileResult<CompiledArtifact> {
		let name = source.name.clone();
		let signature = source.signature.clone();
		tracing::debug!(template = %name, signature = %signature, "compiling template");

		let doc = Rc::new(Document::parse(source, &self.options, self.registry)?);
		self.documents.insert(name.clone(), doc.clone());

		let chain = self.layout_chain(&doc)?;
		let instructions = self.compile_layout(&chain)?;

		let fragments = doc
			.fragments
			.iter()
			.map(|entry| FragmentSignature {
				name: entry.decl.qualified_name(),
				params: entry.decl.params.clone(),
			})
			.collect();
		let dependencies: Vec<Dependency> = self
			.dependencies
			.into_iter()
			.filter(|(dependency, _)| *dependency != name)
			.map(|(name, signature)| Dependency { name, signature })
			.collect();

		tracing::trace!(
			template = %name,
			dependencies = dependencies.len(),
			"compiled template"
		);

		Ok(CompiledArtifact {
			format_version: FORMAT_VERSION,
			layout: chain.get(1).map(|parent| parent.name().to_string()),
			sections: doc.section_names(),
			fragments,
			dependencies,
			instructions,
			name,
			signature,
		})
	}

	/// Returns the session's copy of template `name`, loading it on first use.
	pub(crate) fn document(&mut self, name: &str, referrer: &str) -> CompileResult<Rc<Document>> {
		if let Some(doc) = self.documents.get(name) {
			return Ok(doc.clone());
		}
		let source = self
			.loader
			.load(name)
			.map_err(|source| CompileError::TemplateNotFound {
				name: name.to_string(),
				referrer: referrer.to_string(),
				source,
			})?;
		self.dependencies
			.insert(name.to_string(), source.signature.clone());
		let doc = Rc::new(Document::parse(source, &self.options, self.registry)?);
		self.documents.insert(name.to_string(), doc.clone());
		Ok(doc)
	}

	pub(crate) fn directives(
		&self,
		doc: &Document,
		element: &DirectiveElement,
	) -> CompileResult<Vec<ParsedDirective>> {
		let registry = self.registry;
		parse_directives(element, &self.options.prefix, doc.name(), &|name| {
			registry.is_guard(name)
		})
	}

	pub(crate) fn compile_spans(
		&mut self,
		doc: &Rc<Document>,
		spans: &[Span],
	) -> CompileResult<Vec<Instr>> {
		let mut out = Vec::new();
		for span in spans {
			match span {
				Span::Literal(text) => match &self.select_binding {
					Some(binding) => extend_instrs(&mut out, rewrite_options(text, binding)),
					None => push_text(&mut out, text),
				},
				Span::Verbatim(text) => push_text(&mut out, &decode_verbatim_entities(text)),
				Span::Expression(site) => out.push(Instr::Emit {
					expr: site_expr(doc, site)?,
					mode: match site.context {
						SiteContext::Text => EmitMode::Html,
						SiteContext::Attribute => EmitMode::Attribute,
					},
				}),
				Span::Element(element) => {
					let instrs = self.compile_element(doc, element, ElementMode::InPlace)?;
					extend_instrs(&mut out, instrs);
				}
			}
		}
		Ok(out)
	}

	pub(crate) fn compile_element(
		&mut self,
		doc: &Rc<Document>,
		element: &DirectiveElement,
		mode: ElementMode,
	) -> CompileResult<Vec<Instr>> {
		let directives = self.directives(doc, element)?;
		let remove = match mode {
			ElementMode::InPlace => directives
				.iter()
				.find_map(|parsed| match parsed.directive {
					Directive::Remove(remove) => Some(remove),
					_ => None,
				})
				.unwrap_or(RemoveMode::None),
			ElementMode::Fragment => RemoveMode::None,
		};
		if remove == RemoveMode::All {
			return Ok(Vec::new());
		}

		let mut control = None;
		let mut guards = Vec::new();
		let mut with = None;
		let mut repeat = None;
		for parsed in &directives {
			match &parsed.directive {
				Directive::If(_)
				| Directive::Unless(_)
				| Directive::Switch(_)
				| Directive::Case(_)
				| Directive::Default => control = Some(parsed),
				Directive::Guard { name, argument } => guards.push((name, argument)),
				Directive::With(bindings) => with = Some(bindings),
				Directive::Repeat(iteration) => repeat = Some(iteration),
				_ => {}
			}
		}

		let mut case_index = 0;
		if let Some(parsed) = control {
			match &parsed.directive {
				Directive::Switch(_) => self.switches.push(Vec::new()),
				Directive::Case(expr) => {
					let frame = self
						.switches
						.last_mut()
						.ok_or_else(|| case_outside_switch(doc, parsed))?;
					frame.push(expr.clone());
					case_index = frame.len() - 1;
				}
				Directive::Default if self.switches.is_empty() => {
					return Err(case_outside_switch(doc, parsed));
				}
				_ => {}
			}
		}

		let emitted = self.emit_element(doc, element, &directives, remove);
		let cases = match control.map(|parsed| &parsed.directive) {
			Some(Directive::Switch(_)) => self.switches.pop().unwrap_or_default(),
			_ => Vec::new(),
		};
		let mut instrs = emitted?;

		if let Some(iteration) = repeat {
			instrs = vec![Instr::Repeat {
				iteration: iteration.clone(),
				body: instrs,
			}];
		}
		if let Some(bindings) = with {
			instrs = vec![Instr::With {
				bindings: bindings.clone(),
				body: instrs,
			}];
		}
		for (name, argument) in guards.into_iter().rev() {
			instrs = vec![Instr::Guard {
				function: name.clone(),
				argument: argument.clone(),
				body: instrs,
			}];
		}
		if let Some(parsed) = control {
			instrs = match &parsed.directive {
				Directive::If(condition) => vec![Instr::If {
					condition: condition.clone(),
					negate: false,
					body: instrs,
				}],
				Directive::Unless(condition) => vec![Instr::If {
					condition: condition.clone(),
					negate: true,
					body: instrs,
				}],
				Directive::Switch(subject) => vec![Instr::Switch {
					subject: subject.clone(),
					cases,
					body: instrs,
				}],
				Directive::Case(_) => vec![Instr::Case {
					index: case_index,
					body: instrs,
				}],
				Directive::Default => vec![Instr::Default { body: instrs }],
				_ => instrs,
			};
		}
		Ok(instrs)
	}

	/// Compiles the element itself: tags, attributes and body.
	fn emit_element(
		&mut self,
		doc: &Rc<Document>,
		element: &DirectiveElement,
		directives: &[ParsedDirective],
		remove: RemoveMode,
	) -> CompileResult<Vec<Instr>> {
		let prefix = self.options.prefix.clone();
		let mut attrs = AttributeSet::from_element(doc, element, &prefix)?;
		let mut content = Content::Spans;
		let mut drop_tags = element.is_block(&prefix) || remove == RemoveMode::Tag;
		let drop_body = remove == RemoveMode::Body;
		let mut prepend = Vec::new();
		let mut errors_condition = None;
		let mut select = None;

		for parsed in directives {
			match &parsed.directive {
				Directive::Text(expr) => content = Content::Emit(expr.clone(), EmitMode::Html),
				Directive::Html(expr) | Directive::Raw(expr) => {
					content = Content::Emit(expr.clone(), EmitMode::Raw)
				}
				Directive::Include(signature) => {
					content = Content::Include(signature.clone(), parsed.offset)
				}
				Directive::Replace(signature) => {
					return self.compile_replace(doc, signature, parsed.offset);
				}
				Directive::Component(signature) => {
					return self.compile_component(doc, element, signature, parsed.offset);
				}
				Directive::Field(path) => {
					self.apply_field(element, path, &mut attrs, &mut content, &mut select)
				}
				Directive::Errors(key) => {
					let expr = Expr::Path(VariablePath {
						root: self.config.forms.errors_variable.clone(),
						segments: vec![Segment::Index(Box::new(Expr::string(key.as_str())))],
					});
					errors_condition = Some(expr.clone());
					content = Content::Joined(expr);
				}
				Directive::Csrf => extend_instrs(&mut prepend, self.csrf_input()),
				Directive::Method(verb) => {
					attrs.set_static("method", if verb == "GET" { "get" } else { "post" });
					if verb != "GET" && verb != "POST" {
						push_text(&mut prepend, &self.method_input(verb));
					}
				}
				Directive::Attr(bindings) => {
					for binding in bindings {
						attrs.bind(&binding.name, binding.value.clone());
					}
				}
				Directive::Class(expr) => attrs.bind_class(expr.clone()),
				Directive::Style(expr) => attrs.bind_style(expr.clone()),
				Directive::Universal { name, value } => attrs.bind(name, value.clone()),
				Directive::Section(name) => {
					drop_tags = true;
					if let Some(instrs) = self.resolve_section(doc, element, name)? {
						return Ok(instrs);
					}
				}
				Directive::Yield(name) => {
					drop_tags = true;
					if let Some(instrs) = self.resolve_yield(name)? {
						return Ok(instrs);
					}
				}
				_ => {}
			}
		}

		if element.tag_name() == "option"
			&& let Some(binding) = &self.select_binding
			&& !attrs.has("selected")
			&& let Some(value) = attrs.value_expr()
		{
			let condition = selected_condition(binding, value);
			attrs.bind("selected", condition);
		}

		let mut body = Vec::new();
		if !drop_body {
			body = prepend;
			let inner = match content {
				Content::Spans => {
					let previous = self.select_binding.clone();
					if select.is_some() {
						self.select_binding = select;
					}
					let result = self.compile_spans(doc, &element.body);
					self.select_binding = previous;
					result?
				}
				Content::Emit(expr, mode) => vec![Instr::Emit { expr, mode }],
				Content::Joined(expr) => vec![Instr::EmitJoined {
					expr,
					separator: self.config.forms.errors_separator.clone(),
				}],
				Content::Include(signature, offset) => {
					self.compile_include(doc, &signature, offset)?
				}
			};
			extend_instrs(&mut body, inner);
		}

		let has_body = !body.is_empty();
		let mut out = Vec::new();
		if !drop_tags {
			extend_instrs(
				&mut out,
				attrs.start_tag(&element.tag, element.self_closing && !has_body),
			);
		}
		extend_instrs(&mut out, body);
		if !drop_tags {
			match &element.close_tag {
				Some(close) => push_text(&mut out, close),
				None if element.self_closing && has_body => {
					push_text(&mut out, &format!("</{}>", element.tag))
				}
				None => {}
			}
		}

		if let Some(condition) = errors_condition {
			out = vec![Instr::If {
				condition,
				negate: false,
				body: out,
			}];
		}
		Ok(out)
	}

	fn apply_field(
		&self,
		element: &DirectiveElement,
		path: &VariablePath,
		attrs: &mut AttributeSet,
		content: &mut Content,
		select: &mut Option<Expr>,
	) {
		let value = Expr::Path(path.clone());
		let name = path.to_string();
		attrs.set_static("name", &name);
		if !attrs.has("id") {
			attrs.set_static("id", &field_id(&name));
		}
		match element.tag_name().as_str() {
			"textarea" => *content = Content::Emit(value, EmitMode::Html),
			"select" => *select = Some(value),
			_ => {
				let input_type = attrs
					.raw("type")
					.map(str::to_ascii_lowercase)
					.unwrap_or_default();
				match input_type.as_str() {
					"checkbox" => attrs.bind("checked", value),
					"radio" => {
						let own = Expr::string(attrs.raw("value").unwrap_or_default());
						attrs.bind("checked", selected_condition(&value, own));
					}
					"password" | "file" => {}
					_ => attrs.bind("value", value),
				}
			}
		}
	}

	fn csrf_input(&self) -> Vec<Instr> {
		let forms = &self.config.forms;
		vec![
			Instr::Text(format!(
				"<input type=\"hidden\" name=\"{}\" value=\"",
				escape_html_attr(&forms.csrf_field)
			)),
			Instr::Emit {
				expr: Expr::Path(VariablePath::new(forms.csrf_variable.as_str())),
				mode: EmitMode::Attribute,
			},
			Instr::Text("\">".to_string()),
		]
	}

	fn method_input(&self, verb: &str) -> String {
		format!(
			"<input type=\"hidden\" name=\"{}\" value=\"{}\">",
			escape_html_attr(&self.config.forms.method_field),
			escape_html_attr(verb)
		)
	}
}

fn case_outside_switch(doc: &Document, parsed: &ParsedDirective) -> CompileError {
	CompileError::CaseOutsideSwitch {
		template: doc.name().to_string(),
		directive: parsed.attribute.clone(),
		offset: parsed.offset,
	}
}

fn site_expr(doc: &Document, site: &ExpressionSite) -> CompileResult<Expr> {
	parse(&site.text).map_err(|err| {
		let byte = site
			.text
			.char_indices()
			.nth(err.offset)
			.map_or(site.text.len(), |(i, _)| i);
		CompileError::Expression {
			template: doc.name().to_string(),
			directive: format!("{{{}}}", site.text),
			offset: site.offset + byte,
			source: err,
		}
	})
}

/// `id` derived from a binding path: `user.address[0]` → `user_address_0_`.
fn field_id(path: &str) -> String {
	path.chars()
		.filter(|c| !matches!(c, '\'' | '"'))
		.map(|c| if matches!(c, '.' | '[' | ']') { '_' } else { c })
		.collect()
}

/// `string(bound) == string(own)`: form values compare by their text.
fn selected_condition(bound: &Expr, own: Expr) -> Expr {
	let text = |expr: Expr| Expr::Call {
		target: Box::new(Expr::Path(VariablePath::new("string"))),
		args: vec![expr],
	};
	Expr::Binary {
		op: BinaryOp::Eq,
		left: Box::new(text(bound.clone())),
		right: Box::new(text(own)),
	}
}

pub(crate) fn push_text(out: &mut Vec<Instr>, text: &str) {
	if text.is_empty() {
		return;
	}
	if let Some(Instr::Text(last)) = out.last_mut() {
		last.push_str(text);
	} else {
		out.push(Instr::Text(text.to_string()));
	}
}

pub(crate) fn extend_instrs(out: &mut Vec<Instr>, instrs: Vec<Instr>) {
	for instr in instrs {
		match instr {
			Instr::Text(text) => push_text(out, &text),
			other => out.push(other),
		}
	}
}

/// Adds `selected` bindings to plain `<option value="...">` tags in `text`.
fn rewrite_options(text: &str, binding: &Expr) -> Vec<Instr> {
	let lower = text.to_ascii_lowercase();
	let mut out = Vec::new();
	let mut cursor = 0;
	let mut search = 0;
	while let Some(found) = lower[search..].find("<option") {
		let name_end = search + found + "<option".len();
		search = name_end;
		if !lower[name_end..].starts_with(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
		{
			continue;
		}
		let Some(end) = tag_end(text, name_end) else {
			break;
		};
		search = end;
		let attributes = literal_attributes(text[name_end..end].trim_end_matches('/'));
		if attributes
			.iter()
			.any(|(name, _)| name.eq_ignore_ascii_case("selected"))
		{
			continue;
		}
		let Some(value) = attributes
			.into_iter()
			.find(|(name, _)| name.eq_ignore_ascii_case("value"))
			.and_then(|(_, value)| value)
		else {
			continue;
		};
		let insert = if text[..end].ends_with('/') {
			end - 1
		} else {
			end
		};
		push_text(&mut out, &text[cursor..insert]);
		out.push(Instr::Attribute {
			name: "selected".to_string(),
			value: selected_condition(binding, Expr::string(value)),
			boolean: true,
		});
		cursor = insert;
	}
	push_text(&mut out, &text[cursor..]);
	out
}

/// Index of the `>` closing a tag whose attributes start at `from`.
fn tag_end(text: &str, from: usize) -> Option<usize> {
	let mut quote = None;
	for (i, c) in text[from..].char_indices() {
		match (quote, c) {
			(Some(q), c) if c == q => quote = None,
			(Some(_), _) => {}
			(None, '"' | '\'') => quote = Some(c),
			(None, '>') => return Some(from + i),
			_ => {}
		}
	}
	None
}

/// Attributes of a literal start tag, as `(name, value)` pairs.
fn literal_attributes(inner: &str) -> Vec<(String, Option<String>)> {
	let mut attributes = Vec::new();
	let mut rest = inner.trim_start();
	while !rest.is_empty() {
		let name_end = rest
			.find(|c: char| c.is_ascii_whitespace() || c == '=')
			.unwrap_or(rest.len());
		let name = rest[..name_end].to_string();
		rest = rest[name_end..].trim_start();
		let value = match rest.strip_prefix('=') {
			Some(after) => {
				let after = after.trim_start();
				let (value, remaining) = match after.chars().next() {
					Some(q @ ('"' | '\'')) => match after[1..].find(q) {
						Some(close) => (&after[1..close + 1], &after[close + 2..]),
						None => (&after[1..], ""),
					},
					_ => {
						let end = after
							.find(|c: char| c.is_ascii_whitespace())
							.unwrap_or(after.len());
						(&after[..end], &after[end..])
					}
				};
				rest = remaining.trim_start();
				Some(value.to_string())
			}
			None => None,
		};
		if name.is_empty() {
			break;
		}
		attributes.push((name, value));
	}
	attributes
}

/// One attribute of a start tag being rebuilt.
struct AttrSlot {
	name: String,
	quote: char,
	/// Raw source value, `None` for bare attributes or once replaced
	raw: Option<String>,
	/// Compiled static value
	value: Option<Vec<Instr>>,
	/// Dynamic binding replacing the static value
	dynamic: Option<Instr>,
}

/// Attributes of a directive element, in source order, with dynamic
/// bindings replacing same-name static attributes in place.
struct AttributeSet {
	slots: Vec<AttrSlot>,
}

impl AttributeSet {
	fn from_element(
		doc: &Document,
		element: &DirectiveElement,
		prefix: &str,
	) -> CompileResult<Self> {
		let mut slots = Vec::new();
		for attr in element.static_attributes(prefix) {
			let value = match &attr.value {
				None => None,
				Some(raw) if raw.contains('{') => {
					let mut instrs = Vec::new();
					for span in split_sites(raw, attr.value_offset, SiteContext::Attribute) {
						match span {
							Span::Expression(site) => instrs.push(Instr::Emit {
								expr: site_expr(doc, &site)?,
								mode: EmitMode::Attribute,
							}),
							Span::Literal(text) => push_text(&mut instrs, &text),
							_ => {}
						}
					}
					Some(instrs)
				}
				Some(raw) => Some(vec![Instr::Text(raw.clone())]),
			};
			slots.push(AttrSlot {
				name: attr.name.clone(),
				quote: attr.quote.unwrap_or('"'),
				raw: attr.value.clone(),
				value,
				dynamic: None,
			});
		}
		Ok(Self { slots })
	}

	fn slot_mut(&mut self, name: &str) -> Option<&mut AttrSlot> {
		self.slots
			.iter_mut()
			.find(|slot| slot.name.eq_ignore_ascii_case(name))
	}

	fn has(&self, name: &str) -> bool {
		self.slots
			.iter()
			.any(|slot| slot.name.eq_ignore_ascii_case(name))
	}

	/// Static value of `name`, unless a binding replaced it.
	fn raw(&self, name: &str) -> Option<&str> {
		self.slots
			.iter()
			.find(|slot| slot.name.eq_ignore_ascii_case(name) && slot.dynamic.is_none())
			.and_then(|slot| slot.raw.as_deref())
	}

	/// Expression for the element's `value`, bound or static.
	fn value_expr(&self) -> Option<Expr> {
		let slot = self
			.slots
			.iter()
			.find(|slot| slot.name.eq_ignore_ascii_case("value"))?;
		match &slot.dynamic {
			Some(Instr::Attribute { value, .. }) => Some(value.clone()),
			_ => slot.raw.clone().map(Expr::string),
		}
	}

	fn replace(&mut self, name: &str, dynamic: Instr) {
		match self.slot_mut(name) {
			Some(slot) => slot.dynamic = Some(dynamic),
			None => self.slots.push(AttrSlot {
				name: name.to_string(),
				quote: '"',
				raw: None,
				value: None,
				dynamic: Some(dynamic),
			}),
		}
	}

	fn bind(&mut self, name: &str, value: Expr) {
		let dynamic = Instr::Attribute {
			name: name.to_string(),
			value,
			boolean: is_boolean_attr(name),
		};
		self.replace(name, dynamic);
	}

	fn static_base(&self, name: &str) -> Vec<Instr> {
		self.slots
			.iter()
			.find(|slot| slot.name.eq_ignore_ascii_case(name) && slot.dynamic.is_none())
			.and_then(|slot| slot.value.clone())
			.unwrap_or_default()
	}

	fn bind_class(&mut self, value: Expr) {
		let base = self.static_base("class");
		self.replace("class", Instr::ClassAttribute { base, value });
	}

	fn bind_style(&mut self, value: Expr) {
		let base = self.static_base("style");
		self.replace("style", Instr::StyleAttribute { base, value });
	}

	fn set_static(&mut self, name: &str, value: &str) {
		let escaped = escape_html_attr(value).into_owned();
		match self.slot_mut(name) {
			Some(slot) => {
				slot.quote = '"';
				slot.raw = Some(value.to_string());
				slot.value = Some(vec![Instr::Text(escaped)]);
				slot.dynamic = None;
			}
			None => self.slots.push(AttrSlot {
				name: name.to_string(),
				quote: '"',
				raw: Some(value.to_string()),
				value: Some(vec![Instr::Text(escaped)]),
				dynamic: None,
			}),
		}
	}

	fn start_tag(self, tag: &str, self_closing: bool) -> Vec<Instr> {
		let mut out = vec![Instr::Text(format!("<{}", tag))];
		for slot in self.slots {
			match (slot.dynamic, slot.value) {
				(Some(dynamic), _) => out.push(dynamic),
				(None, Some(value)) => {
					push_text(&mut out, &format!(" {}={}", slot.name, slot.quote));
					extend_instrs(&mut out, value);
					push_text(&mut out, &slot.quote.to_string());
				}
				(None, None) => push_text(&mut out, &format!(" {}", slot.name)),
			}
		}
		push_text(&mut out, if self_closing { "/>" } else { ">" });
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::loader::MemoryLoader;
	use rstest::rstest;

	fn compile(source: &str) -> CompileResult<CompiledArtifact> {
		let config = EngineConfig::default();
		let loader = MemoryLoader::new();
		let registry = Registry::new();
		Compiler::new(&config, &loader, &registry).compile(TemplateSource::new("t.html", source))
	}

	#[rstest]
	fn test_plain_text_compiles_to_one_text() {
		let artifact = compile("<div class=\"a\">hello</div>").unwrap();
		assert_eq!(
			artifact.instructions,
			vec![Instr::Text("<div class=\"a\">hello</div>".into())]
		);
	}

	#[rstest]
	fn test_directive_attributes_are_stripped() {
		let artifact = compile("<p th:if=\"ok\" class=\"x\">hi</p>").unwrap();
		let Instr::If { body, negate, .. } = &artifact.instructions[0] else {
			panic!("expected If, got {:?}", artifact.instructions);
		};
		assert!(!negate);
		assert_eq!(body, &vec![Instr::Text("<p class=\"x\">hi</p>".into())]);
	}

	#[rstest]
	fn test_wrapping_order() {
		let artifact =
			compile("<li th:if=\"show\" th:with=\"n = 1\" th:repeat=\"x in xs\" th:text=\"x\"></li>")
				.unwrap();
		let Instr::If { body, .. } = &artifact.instructions[0] else {
			panic!("expected If");
		};
		let Instr::With { body, .. } = &body[0] else {
			panic!("expected With");
		};
		assert!(matches!(&body[0], Instr::Repeat { .. }));
	}

	#[rstest]
	fn test_case_indices_follow_document_order() {
		let artifact = compile(
			"<div th:switch=\"x\"><p th:default=\"\">d</p><p th:case=\"1\">a</p><p th:case=\"2\">b</p></div>",
		)
		.unwrap();
		let Instr::Switch { cases, body, .. } = &artifact.instructions[0] else {
			panic!("expected Switch");
		};
		assert_eq!(cases.len(), 2);
		assert!(body.iter().any(|i| matches!(i, Instr::Case { index: 1, .. })));
		assert!(body.iter().any(|i| matches!(i, Instr::Default { .. })));
	}

	#[rstest]
	#[case("<p th:case=\"1\">x</p>")]
	#[case("<div><p th:default=\"\">x</p></div>")]
	fn test_case_outside_switch(#[case] source: &str) {
		assert!(matches!(
			compile(source),
			Err(CompileError::CaseOutsideSwitch { .. })
		));
	}

	#[rstest]
	fn test_dynamic_attribute_replaces_static_in_place() {
		let artifact = compile("<a href=\"#\" th:href=\"url\" title=\"t\">x</a>").unwrap();
		let instructions = &artifact.instructions;
		assert_eq!(instructions[0], Instr::Text("<a".into()));
		assert!(matches!(&instructions[1], Instr::Attribute { name, boolean: false, .. } if name == "href"));
		assert_eq!(instructions[2], Instr::Text(" title=\"t\">x</a>".into()));
	}

	#[rstest]
	fn test_remove_modes() {
		assert!(compile("<p th:remove=\"all\">x</p>").unwrap().instructions.is_empty());
		assert_eq!(
			compile("<p th:remove=\"tag\">x</p>").unwrap().instructions,
			vec![Instr::Text("x".into())]
		);
		assert_eq!(
			compile("<p th:remove=\"body\">x</p>").unwrap().instructions,
			vec![Instr::Text("<p></p>".into())]
		);
	}

	#[rstest]
	fn test_expression_error_offset_points_into_source() {
		let source = "<p>{a + }</p>";
		let err = compile(source).unwrap_err();
		let CompileError::Expression { offset, .. } = err else {
			panic!("expected expression error, got {err}");
		};
		assert!(offset >= source.find('a').unwrap());
	}

	#[rstest]
	#[case("user.email", "user_email")]
	#[case("items[0].name", "items_0__name")]
	#[case("row['k']", "row_k_")]
	fn test_field_id(#[case] path: &str, #[case] expected: &str) {
		assert_eq!(field_id(path), expected);
	}

	#[rstest]
	fn test_literal_attributes() {
		let attrs = literal_attributes(" value=\"a b\" selected data-x=1 title='q'");
		assert_eq!(
			attrs,
			vec![
				("value".to_string(), Some("a b".to_string())),
				("selected".to_string(), None),
				("data-x".to_string(), Some("1".to_string())),
				("title".to_string(), Some("q".to_string())),
			]
		);
	}

	#[rstest]
	fn test_rewrite_options_marks_each_valued_option() {
		let binding = parse("country").unwrap();
		let instrs = rewrite_options(
			"<option value=\"fr\">France</option><option>None</option><option value='de' selected>DE</option>",
			&binding,
		);
		let selected = instrs
			.iter()
			.filter(|i| matches!(i, Instr::Attribute { name, .. } if name == "selected"))
			.count();
		assert_eq!(selected, 1);
		assert_eq!(instrs[0], Instr::Text("<option value=\"fr\"".into()));
	}
}
