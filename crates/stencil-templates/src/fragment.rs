//! Fragment and component resolution
//!
//! `include` and `replace` inline a fragment declared with `fragment`;
//! `component` inlines a whole template. Arguments become locals bound in
//! the caller's scope. Inclusion is resolved statically, so a fragment that
//! (directly or indirectly) includes itself is a compile error.

use crate::artifact::{EmitMode, Instr};
use crate::compiler::{Compiler, ElementMode};
use crate::directive::Directive;
use crate::document::{Document, FragmentEntry};
use crate::error::{CompileError, CompileResult};
use crate::error_reporting::suggest_similar;
use crate::layout::{FrameKind, Slot, SlotContent, YieldFrame};
use crate::scanner::{DirectiveElement, Span};
use std::collections::HashMap;
use std::rc::Rc;
use stencil_expr::{Binding, CallSignature, Expr, Literal};

/// Name of the yield receiving a component's call-site content.
pub const DEFAULT_SLOT: &str = "slot";

impl Compiler<'_> {
	/// Finds the fragment `signature` refers to from `doc`.
	///
	/// Unqualified names resolve in `doc`. `ns::name` resolves to a
	/// declaration in `doc`, then to the registered declaring template, then
	/// to fragment `name` of the template named `ns`.
	fn resolve_fragment(
		&mut self,
		doc: &Rc<Document>,
		signature: &CallSignature,
		offset: usize,
	) -> CompileResult<(Rc<Document>, FragmentEntry)> {
		let found = match &signature.namespace {
			None => doc
				.fragment(&signature.name)
				.map(|entry| (doc.clone(), entry.clone())),
			Some(namespace) => self.resolve_qualified(doc, namespace, &signature.name)?,
		};
		found.ok_or_else(|| {
			let mut candidates: Vec<String> = doc
				.fragments
				.iter()
				.map(|entry| entry.decl.qualified_name())
				.collect();
			candidates.extend(self.registry.fragment_names());
			let name = signature.qualified_name();
			CompileError::FragmentNotFound {
				template: doc.name().to_string(),
				suggestion: suggest_similar(&name, &candidates),
				name,
				offset,
			}
		})
	}

	fn resolve_qualified(
		&mut self,
		doc: &Rc<Document>,
		namespace: &str,
		name: &str,
	) -> CompileResult<Option<(Rc<Document>, FragmentEntry)>> {
		if let Some(entry) = doc.qualified_fragment(namespace, name) {
			return Ok(Some((doc.clone(), entry.clone())));
		}
		let qualified = format!("{}::{}", namespace, name);
		if let Some(template) = self.registry.fragment_template(&qualified) {
			let declaring = self.document(&template, doc.name())?;
			if let Some(entry) = declaring.qualified_fragment(namespace, name) {
				return Ok(Some((declaring.clone(), entry.clone())));
			}
		}
		let declaring = self.document(namespace, doc.name())?;
		Ok(declaring
			.fragment(name)
			.map(|entry| (declaring.clone(), entry.clone())))
	}

	/// Pushes `key` on the inclusion chain, rejecting cycles, deep nesting and
	/// artifacts that inline too many fragments.
	fn enter(&mut self, key: String, template: &str) -> CompileResult<()> {
		if self.includes.contains(&key) {
			let mut chain = self.includes.clone();
			chain.push(key);
			return Err(CompileError::RecursiveInclude { chain });
		}
		if self.includes.len() >= self.config.max_include_depth {
			return Err(CompileError::RecursionLimit {
				template: template.to_string(),
				kind: "include",
				limit: self.config.max_include_depth,
			});
		}
		self.inlined += 1;
		if self.inlined > self.config.max_inlined_fragments {
			return Err(CompileError::RecursionLimit {
				template: template.to_string(),
				kind: "inline",
				limit: self.config.max_inlined_fragments,
			});
		}
		self.includes.push(key);
		Ok(())
	}

	/// Body of the call-site element for `th:include`.
	pub(crate) fn compile_include(
		&mut self,
		doc: &Rc<Document>,
		signature: &CallSignature,
		offset: usize,
	) -> CompileResult<Vec<Instr>> {
		let (declaring, entry) = self.resolve_fragment(doc, signature, offset)?;
		let bindings = bind_arguments(doc.name(), signature, &entry.decl.params, offset)?;
		self.enter(fragment_key(&declaring, &entry), doc.name())?;
		let body = self.fragment_body(&declaring, &entry.element);
		self.includes.pop();
		Ok(scoped(bindings, body?))
	}

	/// Replacement of the call-site element for `th:replace`.
	pub(crate) fn compile_replace(
		&mut self,
		doc: &Rc<Document>,
		signature: &CallSignature,
		offset: usize,
	) -> CompileResult<Vec<Instr>> {
		let (declaring, entry) = self.resolve_fragment(doc, signature, offset)?;
		let bindings = bind_arguments(doc.name(), signature, &entry.decl.params, offset)?;
		self.enter(fragment_key(&declaring, &entry), doc.name())?;
		let element = self.compile_element(&declaring, &entry.element, ElementMode::Fragment);
		self.includes.pop();
		Ok(scoped(bindings, element?))
	}

	/// The content a fragment contributes to an include: its output
	/// directive if it has one, otherwise its compiled body.
	fn fragment_body(
		&mut self,
		doc: &Rc<Document>,
		element: &DirectiveElement,
	) -> CompileResult<Vec<Instr>> {
		for parsed in self.directives(doc, element)? {
			match parsed.directive {
				Directive::Text(expr) => {
					return Ok(vec![Instr::Emit {
						expr,
						mode: EmitMode::Html,
					}]);
				}
				Directive::Html(expr) | Directive::Raw(expr) => {
					return Ok(vec![Instr::Emit {
						expr,
						mode: EmitMode::Raw,
					}]);
				}
				_ => {}
			}
		}
		self.compile_spans(doc, &element.body)
	}

	/// Replacement of the call-site element for `th:component`.
	pub(crate) fn compile_component(
		&mut self,
		doc: &Rc<Document>,
		element: &DirectiveElement,
		signature: &CallSignature,
		offset: usize,
	) -> CompileResult<Vec<Instr>> {
		let qualified = signature.qualified_name();
		let mut bindings = Vec::new();
		for argument in &signature.arguments {
			let Some(name) = &argument.name else {
				return Err(CompileError::Arguments {
					template: doc.name().to_string(),
					name: qualified,
					offset,
					message: "component properties must be named (name = value)".to_string(),
				});
			};
			bindings.push(Binding {
				name: name.clone(),
				value: argument.value.clone(),
			});
		}

		let template = self.registry.component_template(&qualified).unwrap_or_else(|| {
			format!(
				"{}{}",
				self.config.component_prefix,
				qualified.replace("::", "/")
			)
		});
		let component = self.document(&template, doc.name())?;
		let slots = self.component_slots(doc, element)?;

		self.enter(format!("component:{}", template), doc.name())?;
		self.yields.push(YieldFrame::new(FrameKind::Component, slots));
		let body = self.compile_spans(&component, &component.spans);
		self.yields.pop();
		self.includes.pop();
		Ok(scoped(bindings, body?))
	}

	/// Splits a component call site into named slots (top-level section
	/// children) and the default slot (everything else).
	fn component_slots(
		&self,
		doc: &Rc<Document>,
		element: &DirectiveElement,
	) -> CompileResult<HashMap<String, Slot>> {
		let mut slots = HashMap::new();
		let mut loose = Vec::new();
		for span in &element.body {
			if let Span::Element(child) = span {
				let section = self
					.directives(doc, child)?
					.into_iter()
					.find_map(|parsed| match parsed.directive {
						Directive::Section(name) => Some(name),
						_ => None,
					});
				if let Some(name) = section {
					slots.insert(
						name,
						Slot {
							doc: doc.clone(),
							content: SlotContent::Body(Rc::new(child.clone())),
						},
					);
					continue;
				}
			}
			loose.push(span.clone());
		}
		let blank = loose
			.iter()
			.all(|span| matches!(span, Span::Literal(text) if text.trim().is_empty()));
		if !blank {
			slots.insert(
				DEFAULT_SLOT.to_string(),
				Slot {
					doc: doc.clone(),
					content: SlotContent::Spans(Rc::new(loose)),
				},
			);
		}
		Ok(slots)
	}
}

fn fragment_key(doc: &Document, entry: &FragmentEntry) -> String {
	format!("{}#{}", doc.name(), entry.decl.qualified_name())
}

/// Wraps `body` in a scope binding the arguments, when there are any.
fn scoped(bindings: Vec<Binding>, body: Vec<Instr>) -> Vec<Instr> {
	if bindings.is_empty() {
		body
	} else {
		vec![Instr::Scope { bindings, body }]
	}
}

/// Matches call arguments to fragment parameters.
///
/// Positional arguments bind in order, named ones by name; parameters left
/// unbound are null.
fn bind_arguments(
	template: &str,
	signature: &CallSignature,
	params: &[String],
	offset: usize,
) -> CompileResult<Vec<Binding>> {
	let error = |message: String| CompileError::Arguments {
		template: template.to_string(),
		name: signature.qualified_name(),
		offset,
		message,
	};

	let mut values: Vec<Option<Expr>> = vec![None; params.len()];
	let mut position = 0;
	for argument in &signature.arguments {
		let index = match &argument.name {
			None => {
				if position >= params.len() {
					let given = signature
						.arguments
						.iter()
						.filter(|argument| argument.name.is_none())
						.count();
					return Err(error(format!(
						"expected at most {} argument(s), got {}",
						params.len(),
						given
					)));
				}
				position += 1;
				position - 1
			}
			Some(name) => params
				.iter()
				.position(|param| param == name)
				.ok_or_else(|| error(format!("unknown parameter '{}'", name)))?,
		};
		if values[index].is_some() {
			return Err(error(format!(
				"parameter '{}' is bound more than once",
				params[index]
			)));
		}
		values[index] = Some(argument.value.clone());
	}

	Ok(params
		.iter()
		.zip(values)
		.map(|(name, value)| Binding {
			name: name.clone(),
			value: value.unwrap_or(Expr::Literal(Literal::Null)),
		})
		.collect())
}
