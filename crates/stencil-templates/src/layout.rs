//! Layout inheritance: `extend`, `section` and `yield`.
//!
//! A template that extends a parent is compiled by emitting the root layout
//! of its chain, with every yield replaced by the most-derived section of the
//! same name. Only section content of the derived templates is used; anything
//! outside their sections is discarded.
//!
//! Components reuse the same yield machinery: the call-site content fills the
//! component's yields.

use crate::artifact::Instr;
use crate::compiler::{Compiler, ElementMode};
use crate::document::Document;
use crate::error::{CompileError, CompileResult};
use crate::scanner::{DirectiveElement, Span};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
	Layout,
	Component,
}

/// Content available to a yield.
#[derive(Debug, Clone)]
pub(crate) enum SlotContent {
	/// A section element, compiled with its own directives
	Element(Rc<DirectiveElement>),
	/// The body of a section element passed to a component
	Body(Rc<DirectiveElement>),
	/// Loose call-site content passed to a component
	Spans(Rc<Vec<Span>>),
}

#[derive(Debug, Clone)]
pub(crate) struct Slot {
	/// Document the content belongs to
	pub doc: Rc<Document>,
	pub content: SlotContent,
}

impl Slot {
	fn is_element(&self, template: &str, offset: usize) -> bool {
		matches!(&self.content, SlotContent::Element(element) if element.offset == offset)
			&& self.doc.name() == template
	}
}

/// Slots visible to yields while a layout or component body is compiled.
#[derive(Debug)]
pub(crate) struct YieldFrame {
	pub kind: FrameKind,
	pub slots: HashMap<String, Slot>,
	/// Slots being expanded; a yield of an active slot uses its default
	pub active: HashSet<String>,
}

impl YieldFrame {
	pub fn new(kind: FrameKind, slots: HashMap<String, Slot>) -> Self {
		Self {
			kind,
			slots,
			active: HashSet::new(),
		}
	}
}

impl Compiler<'_> {
	/// Follows `extend` from `doc` to the root layout.
	///
	/// Returns the chain most-derived first.
	pub(crate) fn layout_chain(&mut self, doc: &Rc<Document>) -> CompileResult<Vec<Rc<Document>>> {
		let mut chain = vec![doc.clone()];
		let mut current = doc.clone();
		while let Some((parent, _)) = current.extend.clone() {
			if chain.iter().any(|linked| linked.name() == parent) {
				let mut names: Vec<String> = chain
					.iter()
					.map(|linked| linked.name().to_string())
					.collect();
				names.push(parent);
				return Err(CompileError::CircularExtends { chain: names });
			}
			if chain.len() > self.config.max_layout_depth {
				return Err(CompileError::RecursionLimit {
					template: doc.name().to_string(),
					kind: "layout",
					limit: self.config.max_layout_depth,
				});
			}
			let next = self.document(&parent, current.name())?;
			chain.push(next.clone());
			current = next;
		}
		Ok(chain)
	}

	/// Compiles the root of `chain` with the chain's sections in scope.
	pub(crate) fn compile_layout(&mut self, chain: &[Rc<Document>]) -> CompileResult<Vec<Instr>> {
		let Some(root) = chain.last() else {
			return Ok(Vec::new());
		};
		if chain.len() == 1 {
			return self.compile_spans(root, &root.spans);
		}

		let mut slots = HashMap::new();
		for doc in chain.iter().rev() {
			for entry in &doc.sections {
				slots.insert(
					entry.name.clone(),
					Slot {
						doc: doc.clone(),
						content: SlotContent::Element(entry.element.clone()),
					},
				);
			}
		}
		tracing::trace!(
			layout = root.name(),
			sections = slots.len(),
			"linking layout chain"
		);

		self.yields.push(YieldFrame::new(FrameKind::Layout, slots));
		let result = self.compile_spans(root, &root.spans);
		self.yields.pop();
		result
	}

	/// Content for `th:yield="name"`, or `None` to use the element's default.
	pub(crate) fn resolve_yield(&mut self, name: &str) -> CompileResult<Option<Vec<Instr>>> {
		let Some(depth) = self.yields.len().checked_sub(1) else {
			return Ok(None);
		};
		let frame = &self.yields[depth];
		if frame.active.contains(name) {
			return Ok(None);
		}
		let Some(slot) = frame.slots.get(name).cloned() else {
			return Ok(None);
		};
		self.compile_slot(depth, name, slot).map(Some)
	}

	/// Content for a `th:section` element met while compiling a layout, or
	/// `None` when the element renders its own body.
	pub(crate) fn resolve_section(
		&mut self,
		doc: &Document,
		element: &DirectiveElement,
		name: &str,
	) -> CompileResult<Option<Vec<Instr>>> {
		let Some(depth) = self.yields.len().checked_sub(1) else {
			return Ok(None);
		};
		let frame = &self.yields[depth];
		if frame.kind != FrameKind::Layout || frame.active.contains(name) {
			return Ok(None);
		}
		let Some(slot) = frame.slots.get(name).cloned() else {
			return Ok(None);
		};
		if slot.is_element(doc.name(), element.offset) {
			return Ok(None);
		}
		self.compile_slot(depth, name, slot).map(Some)
	}

	fn compile_slot(&mut self, depth: usize, name: &str, slot: Slot) -> CompileResult<Vec<Instr>> {
		match self.yields[depth].kind {
			FrameKind::Layout => {
				self.yields[depth].active.insert(name.to_string());
				let result = self.compile_slot_content(&slot);
				self.yields[depth].active.remove(name);
				result
			}
			FrameKind::Component => {
				// Call-site content sees the frames of the call site.
				let inner = self.yields.split_off(depth);
				let result = self.compile_slot_content(&slot);
				self.yields.extend(inner);
				result
			}
		}
	}

	fn compile_slot_content(&mut self, slot: &Slot) -> CompileResult<Vec<Instr>> {
		match &slot.content {
			SlotContent::Element(element) => {
				self.compile_element(&slot.doc, element, ElementMode::InPlace)
			}
			SlotContent::Body(element) => self.compile_spans(&slot.doc, &element.body),
			SlotContent::Spans(spans) => self.compile_spans(&slot.doc, spans),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::EngineConfig;
	use crate::loader::{MemoryLoader, TemplateLoader};
	use crate::registry::Registry;

	fn compile(loader: &MemoryLoader, name: &str) -> CompileResult<crate::CompiledArtifact> {
		let config = EngineConfig::default();
		let registry = Registry::new();
		let source = loader.load(name).unwrap();
		Compiler::new(&config, loader, &registry).compile(source)
	}

	#[test]
	fn test_chain_records_layout_and_dependencies() {
		let loader = MemoryLoader::new()
			.with("base", "<main th:yield=\"content\">D</main>")
			.with("mid", "<th:block th:extend=\"base\"/>")
			.with(
				"page",
				"<th:block th:extend=\"mid\"/><p th:section=\"content\">X</p>",
			);

		let artifact = compile(&loader, "page").unwrap();
		assert_eq!(artifact.layout.as_deref(), Some("mid"));
		assert_eq!(artifact.sections, vec!["content"]);
		let names: Vec<&str> = artifact
			.dependencies
			.iter()
			.map(|d| d.name.as_str())
			.collect();
		assert_eq!(names, vec!["base", "mid"]);
		assert_eq!(artifact.instructions, vec![Instr::Text("X".into())]);
	}

	#[test]
	fn test_self_extend_is_circular() {
		let loader = MemoryLoader::new().with("a", "<th:block th:extend=\"a\"/>");
		let err = compile(&loader, "a").unwrap_err();
		assert!(matches!(err, CompileError::CircularExtends { chain } if chain == vec!["a", "a"]));
	}

	#[test]
	fn test_layout_depth_limit() {
		let mut loader = MemoryLoader::new();
		for i in 0..20 {
			loader = loader.with(format!("l{}", i), format!("<th:block th:extend=\"l{}\"/>", i + 1));
		}
		loader.add("l20", "root");
		let err = compile(&loader, "l0").unwrap_err();
		assert!(matches!(err, CompileError::RecursionLimit { kind: "layout", limit: 16, .. }));
	}
}
