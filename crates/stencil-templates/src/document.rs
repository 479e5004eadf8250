//! Scanned documents and their declaration index.

use crate::directive::{Directive, FragmentDecl, parse_directives};
use crate::error::{CompileError, CompileResult};
use crate::loader::TemplateSource;
use crate::registry::Registry;
use crate::scanner::{DirectiveElement, ScanOptions, Span, scan};
use std::rc::Rc;

/// A fragment declared in a document.
#[derive(Debug, Clone)]
pub(crate) struct FragmentEntry {
	pub decl: FragmentDecl,
	pub element: Rc<DirectiveElement>,
}

/// A section declared in a document.
#[derive(Debug, Clone)]
pub(crate) struct SectionEntry {
	pub name: String,
	pub element: Rc<DirectiveElement>,
}

/// A template scanned and indexed once per compile session.
#[derive(Debug)]
pub(crate) struct Document {
	pub source: TemplateSource,
	pub spans: Vec<Span>,
	/// Parent layout and the offset of the `extend` attribute
	pub extend: Option<(String, usize)>,
	/// Sections in document order
	pub sections: Vec<SectionEntry>,
	/// Fragments in document order
	pub fragments: Vec<FragmentEntry>,
}

impl Document {
	/// Scans and indexes `source`, validating every directive it carries.
	pub fn parse(
		source: TemplateSource,
		options: &ScanOptions,
		registry: &Registry,
	) -> CompileResult<Self> {
		let spans = scan(&source.contents, options).map_err(|err| CompileError::Scan {
			template: source.name.clone(),
			source: err,
		})?;
		let mut document = Self {
			source,
			spans: Vec::new(),
			extend: None,
			sections: Vec::new(),
			fragments: Vec::new(),
		};
		document.index(&spans, &options.prefix, registry)?;
		document.spans = spans;
		Ok(document)
	}

	pub fn name(&self) -> &str {
		&self.source.name
	}

	fn index(&mut self, spans: &[Span], prefix: &str, registry: &Registry) -> CompileResult<()> {
		for span in spans {
			let Span::Element(element) = span else {
				continue;
			};
			let directives = parse_directives(element, prefix, &self.source.name, &|name| {
				registry.is_guard(name)
			})?;
			for parsed in directives {
				match parsed.directive {
					Directive::Extend(parent) => {
						if self.extend.is_some() {
							return Err(CompileError::MultipleExtends {
								template: self.source.name.clone(),
								offset: parsed.offset,
							});
						}
						self.extend = Some((parent, parsed.offset));
					}
					Directive::Section(name) => self.sections.push(SectionEntry {
						name,
						element: Rc::new(element.clone()),
					}),
					Directive::Fragment(decl) => self.fragments.push(FragmentEntry {
						decl,
						element: Rc::new(element.clone()),
					}),
					_ => {}
				}
			}
			self.index(&element.body, prefix, registry)?;
		}
		Ok(())
	}

	/// Finds a fragment by plain name, preferring unqualified declarations.
	pub fn fragment(&self, name: &str) -> Option<&FragmentEntry> {
		self.fragments
			.iter()
			.find(|entry| entry.decl.namespace.is_none() && entry.decl.name == name)
			.or_else(|| self.fragments.iter().find(|entry| entry.decl.name == name))
	}

	/// Finds a fragment declared as `ns::name`.
	pub fn qualified_fragment(&self, namespace: &str, name: &str) -> Option<&FragmentEntry> {
		self.fragments.iter().find(|entry| {
			entry.decl.namespace.as_deref() == Some(namespace) && entry.decl.name == name
		})
	}

	/// Section names in declaration order, without repeats.
	pub fn section_names(&self) -> Vec<String> {
		let mut names: Vec<String> = Vec::new();
		for entry in &self.sections {
			if !names.contains(&entry.name) {
				names.push(entry.name.clone());
			}
		}
		names
	}
}
