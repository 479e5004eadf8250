//! Region scanner
//!
//! Splits a template source into spans:
//!
//! - [`Span::Literal`]: markup copied to the output as-is (plain tags, text,
//!   comments, doctypes, raw-text element content)
//! - [`Span::Verbatim`]: content of a verbatim element (`pre`, `code` by
//!   default), where directive and expression recognition is suppressed
//! - [`Span::Expression`]: a `{expr}` site in text or in a plain attribute value
//! - [`Span::Element`]: an element carrying at least one directive attribute
//!   (`th:*` by default), with its body scanned recursively
//!
//! The scan is lossless: [`to_source`] reproduces the scanned text exactly, so
//! re-scanning never changes the classification of a span.

use crate::error::ScanError;

/// Elements whose content is kept byte-for-byte with no interpolation.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea"];

/// Elements that never have a body or an end tag.
const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
	"track", "wbr",
];

/// Scanner settings derived from the engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
	/// Directive attribute prefix, without the colon
	pub prefix: String,
	/// Elements whose content is verbatim
	pub verbatim_tags: Vec<String>,
}

impl Default for ScanOptions {
	fn default() -> Self {
		Self {
			prefix: "th".to_string(),
			verbatim_tags: vec!["pre".to_string(), "code".to_string()],
		}
	}
}

/// Where an expression site appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteContext {
	Text,
	Attribute,
}

/// A `{expr}` interpolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionSite {
	/// Expression text between the braces
	pub text: String,
	/// Byte offset of `text` in the source
	pub offset: usize,
	pub context: SiteContext,
}

/// An attribute of a directive element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
	pub name: String,
	/// Raw value, `None` for bare attributes such as `disabled`
	pub value: Option<String>,
	/// Quote character used around the value
	pub quote: Option<char>,
	/// Byte offset of the attribute name
	pub offset: usize,
	/// Byte offset of the value (equals `offset` for bare attributes)
	pub value_offset: usize,
}

/// An element carrying directive attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveElement {
	/// Tag name as written
	pub tag: String,
	/// Raw text of the start tag
	pub open_tag: String,
	pub attributes: Vec<Attribute>,
	pub body: Vec<Span>,
	/// Raw text of the end tag, `None` for void and self-closing elements
	pub close_tag: Option<String>,
	pub self_closing: bool,
	/// Byte offset of the start tag
	pub offset: usize,
}

impl DirectiveElement {
	/// Directive attributes as `(directive name, attribute)`, in source order.
	pub fn directives<'a>(&'a self, prefix: &str) -> impl Iterator<Item = (String, &'a Attribute)> {
		self.attributes
			.iter()
			.filter_map(move |attr| directive_name(&attr.name, prefix).map(|name| (name, attr)))
	}

	/// Attributes that are not directives, in source order.
	pub fn static_attributes<'a>(&'a self, prefix: &str) -> impl Iterator<Item = &'a Attribute> {
		self.attributes
			.iter()
			.filter(move |attr| directive_name(&attr.name, prefix).is_none())
	}

	/// Looks up a static attribute by name (case-insensitive).
	pub fn static_attribute(&self, prefix: &str, name: &str) -> Option<&Attribute> {
		self.static_attributes(prefix)
			.find(|attr| attr.name.eq_ignore_ascii_case(name))
	}

	/// Returns `true` for the transparent `<prefix:block>` element.
	pub fn is_block(&self, prefix: &str) -> bool {
		directive_name(&self.tag, prefix).is_some_and(|name| name == "block")
	}

	/// Lowercased tag name.
	pub fn tag_name(&self) -> String {
		self.tag.to_ascii_lowercase()
	}
}

/// A classified region of a template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
	Literal(String),
	Verbatim(String),
	Expression(ExpressionSite),
	Element(DirectiveElement),
}

/// Returns the directive name when `name` is `<prefix>:<directive>`.
pub fn directive_name(name: &str, prefix: &str) -> Option<String> {
	let (head, tail) = name.split_once(':')?;
	(head.eq_ignore_ascii_case(prefix) && !tail.is_empty()).then(|| tail.to_ascii_lowercase())
}

/// Scans `source` into spans.
///
/// # Examples
///
/// ```
/// use stencil_templates::scanner::{scan, ScanOptions, Span};
///
/// let spans = scan("<p th:if=\"ok\">Hi {name}</p>", &ScanOptions::default()).unwrap();
/// assert_eq!(spans.len(), 1);
/// let Span::Element(p) = &spans[0] else { panic!() };
/// assert_eq!(p.tag, "p");
/// assert_eq!(p.body.len(), 2);
/// ```
pub fn scan(source: &str, options: &ScanOptions) -> Result<Vec<Span>, ScanError> {
	let mut scanner = Scanner {
		source,
		bytes: source.as_bytes(),
		pos: 0,
		options,
	};
	scanner.nodes(None)
}

/// Reassembles spans into source text.
pub fn to_source(spans: &[Span]) -> String {
	let mut out = String::new();
	write_source(spans, &mut out);
	out
}

fn write_source(spans: &[Span], out: &mut String) {
	for span in spans {
		match span {
			Span::Literal(text) | Span::Verbatim(text) => out.push_str(text),
			Span::Expression(site) => {
				out.push('{');
				out.push_str(&site.text);
				out.push('}');
			}
			Span::Element(element) => {
				out.push_str(&element.open_tag);
				write_source(&element.body, out);
				if let Some(close) = &element.close_tag {
					out.push_str(close);
				}
			}
		}
	}
}

/// Splits text into literal and expression spans.
///
/// `offset` is the byte offset of `text` in the template source.
pub fn split_sites(text: &str, offset: usize, context: SiteContext) -> Vec<Span> {
	let mut spans = Vec::new();
	let mut cursor = 0;
	let mut pos = 0;
	while let Some(found) = text[pos..].find('{') {
		let open = pos + found;
		match site_end(text, open) {
			Some(close) => {
				push_literal(&mut spans, &text[cursor..open]);
				spans.push(Span::Expression(ExpressionSite {
					text: text[open + 1..close].to_string(),
					offset: offset + open + 1,
					context,
				}));
				cursor = close + 1;
				pos = close + 1;
			}
			None => pos = open + 1,
		}
	}
	push_literal(&mut spans, &text[cursor..]);
	spans
}

/// Finds the `}` closing the site opened at `open`, if `open` starts a site.
fn site_end(text: &str, open: usize) -> Option<usize> {
	let first = text[open + 1..].chars().next()?;
	let can_start =
		first.is_alphabetic() || first.is_ascii_digit() || matches!(first, '_' | '\'' | '(' | '!' | '-');
	if !can_start {
		return None;
	}
	let mut quote: Option<char> = None;
	let mut escaped = false;
	for (i, c) in text[open + 1..].char_indices() {
		match quote {
			Some(q) => {
				if escaped {
					escaped = false;
				} else if c == '\\' {
					escaped = true;
				} else if c == q {
					quote = None;
				}
			}
			None => match c {
				'\'' | '"' => quote = Some(c),
				'}' => return Some(open + 1 + i),
				'{' => return None,
				_ => {}
			},
		}
	}
	None
}

fn push_literal(spans: &mut Vec<Span>, text: &str) {
	if text.is_empty() {
		return;
	}
	if let Some(Span::Literal(last)) = spans.last_mut() {
		last.push_str(text);
	} else {
		spans.push(Span::Literal(text.to_string()));
	}
}

struct OpenTag {
	name: String,
	attributes: Vec<Attribute>,
	self_closing: bool,
	start: usize,
	end: usize,
}

struct Scanner<'a> {
	source: &'a str,
	bytes: &'a [u8],
	pos: usize,
	options: &'a ScanOptions,
}

impl<'a> Scanner<'a> {
	fn starts_with(&self, at: usize, pattern: &str) -> bool {
		self.bytes[at..].starts_with(pattern.as_bytes())
	}

	/// Scans nodes until end of input or, with `until`, the matching end tag.
	///
	/// On return with `until`, `pos` is left at the `</` of the end tag.
	fn nodes(&mut self, until: Option<(&str, usize)>) -> Result<Vec<Span>, ScanError> {
		let mut spans = Vec::new();
		let mut text_start = self.pos;
		let mut depth = 0usize;

		while self.pos < self.bytes.len() {
			match self.bytes[self.pos] {
				b'<' if self.starts_with(self.pos, "</") => {
					let name = self.tag_name_at(self.pos + 2);
					if let Some((tag, _)) = until
						&& name.eq_ignore_ascii_case(tag)
					{
						if depth == 0 {
							self.flush_text(&mut spans, text_start, self.pos);
							return Ok(spans);
						}
						depth -= 1;
					}
					self.pos = self.find_after(self.pos, ">")?;
				}
				b'<' if self.starts_with(self.pos, "<!--") => {
					let start = self.pos;
					match self.source[start + 4..].find("-->") {
						Some(end) => self.pos = start + 4 + end + 3,
						None => return Err(ScanError::UnterminatedComment { offset: start }),
					}
				}
				b'<' if self.starts_with(self.pos, "<!") || self.starts_with(self.pos, "<?") => {
					self.pos = self.find_after(self.pos, ">")?;
				}
				b'<' if self
					.bytes
					.get(self.pos + 1)
					.is_some_and(u8::is_ascii_alphabetic) =>
				{
					self.flush_text(&mut spans, text_start, self.pos);
					let tag = self.open_tag()?;
					if self.is_directive_tag(&tag) {
						let element = self.directive_element(tag)?;
						spans.push(Span::Element(element));
					} else {
						let lname = tag.name.to_ascii_lowercase();
						self.plain_tag(&mut spans, &tag);
						if !tag.self_closing && !VOID_ELEMENTS.contains(&lname.as_str()) {
							if RAW_TEXT_ELEMENTS.contains(&lname.as_str()) {
								let end = self.raw_text_end(&lname, tag.start)?;
								push_literal(&mut spans, &self.source[self.pos..end]);
								self.pos = end;
							} else if self.is_verbatim(&lname) {
								let end = self.verbatim_end(&lname, tag.start)?;
								if end > self.pos {
									spans.push(Span::Verbatim(self.source[self.pos..end].to_string()));
								}
								self.pos = end;
							} else if let Some((until_tag, _)) = until
								&& lname.eq_ignore_ascii_case(until_tag)
							{
								depth += 1;
							}
						}
					}
					text_start = self.pos;
				}
				b'{' => match site_end(self.source, self.pos) {
					Some(close) => {
						self.flush_text(&mut spans, text_start, self.pos);
						spans.push(Span::Expression(ExpressionSite {
							text: self.source[self.pos + 1..close].to_string(),
							offset: self.pos + 1,
							context: SiteContext::Text,
						}));
						self.pos = close + 1;
						text_start = self.pos;
					}
					None => self.pos += 1,
				},
				_ => self.pos += 1,
			}
		}

		self.flush_text(&mut spans, text_start, self.pos);
		match until {
			Some((tag, offset)) => Err(ScanError::UnclosedElement {
				tag: tag.to_string(),
				offset,
			}),
			None => Ok(spans),
		}
	}

	fn flush_text(&self, spans: &mut Vec<Span>, start: usize, end: usize) {
		if start < end {
			push_literal(spans, &self.source[start..end]);
		}
	}

	/// Position just past the next occurrence of `pattern` after `from`.
	fn find_after(&self, from: usize, pattern: &str) -> Result<usize, ScanError> {
		self.source[from..]
			.find(pattern)
			.map(|i| from + i + pattern.len())
			.ok_or(ScanError::UnterminatedTag { offset: from })
	}

	fn tag_name_at(&self, at: usize) -> &'a str {
		let rest = &self.source[at.min(self.source.len())..];
		let end = rest
			.find(|c: char| c.is_whitespace() || c == '>' || c == '/')
			.unwrap_or(rest.len());
		&rest[..end]
	}

	fn is_verbatim(&self, lname: &str) -> bool {
		self.options
			.verbatim_tags
			.iter()
			.any(|tag| tag.eq_ignore_ascii_case(lname))
	}

	fn is_directive_tag(&self, tag: &OpenTag) -> bool {
		directive_name(&tag.name, &self.options.prefix).is_some()
			|| tag
				.attributes
				.iter()
				.any(|attr| directive_name(&attr.name, &self.options.prefix).is_some())
	}

	fn open_tag(&mut self) -> Result<OpenTag, ScanError> {
		let start = self.pos;
		let name = self.tag_name_at(start + 1).to_string();
		self.pos = start + 1 + name.len();
		let mut attributes = Vec::new();

		loop {
			self.skip_whitespace();
			let Some(&byte) = self.bytes.get(self.pos) else {
				return Err(ScanError::UnterminatedTag { offset: start });
			};
			match byte {
				b'>' => {
					self.pos += 1;
					return Ok(OpenTag {
						name,
						attributes,
						self_closing: false,
						start,
						end: self.pos,
					});
				}
				b'/' if self.starts_with(self.pos, "/>") => {
					self.pos += 2;
					return Ok(OpenTag {
						name,
						attributes,
						self_closing: true,
						start,
						end: self.pos,
					});
				}
				b'/' => self.pos += 1,
				_ => attributes.push(self.attribute(start)?),
			}
		}
	}

	fn attribute(&mut self, tag_start: usize) -> Result<Attribute, ScanError> {
		let name_start = self.pos;
		self.pos += 1;
		while let Some(&b) = self.bytes.get(self.pos) {
			if b.is_ascii_whitespace() || b == b'=' || b == b'>' || self.starts_with(self.pos, "/>") {
				break;
			}
			self.pos += 1;
		}
		let name = self.source[name_start..self.pos].to_string();
		let name_end = self.pos;

		self.skip_whitespace();
		if self.bytes.get(self.pos) != Some(&b'=') {
			self.pos = name_end;
			return Ok(Attribute {
				name,
				value: None,
				quote: None,
				offset: name_start,
				value_offset: name_start,
			});
		}
		self.pos += 1;
		self.skip_whitespace();

		match self.bytes.get(self.pos) {
			Some(&q) if q == b'"' || q == b'\'' => {
				let value_start = self.pos + 1;
				let close = self.source[value_start..]
					.find(q as char)
					.ok_or(ScanError::UnterminatedTag { offset: tag_start })?;
				self.pos = value_start + close + 1;
				Ok(Attribute {
					name,
					value: Some(self.source[value_start..value_start + close].to_string()),
					quote: Some(q as char),
					offset: name_start,
					value_offset: value_start,
				})
			}
			Some(_) => {
				let value_start = self.pos;
				while let Some(&b) = self.bytes.get(self.pos) {
					if b.is_ascii_whitespace() || b == b'>' {
						break;
					}
					self.pos += 1;
				}
				Ok(Attribute {
					name,
					value: Some(self.source[value_start..self.pos].to_string()),
					quote: None,
					offset: name_start,
					value_offset: value_start,
				})
			}
			None => Err(ScanError::UnterminatedTag { offset: tag_start }),
		}
	}

	fn skip_whitespace(&mut self) {
		while self
			.bytes
			.get(self.pos)
			.is_some_and(u8::is_ascii_whitespace)
		{
			self.pos += 1;
		}
	}

	/// Emits a plain start tag as literal text, splitting `{expr}` sites out of
	/// its attribute values.
	///
	/// Unquoted values holding sites are emitted inside double quotes, since
	/// attribute escaping only holds within a quoted value.
	fn plain_tag(&self, spans: &mut Vec<Span>, tag: &OpenTag) {
		let mut cursor = tag.start;
		for attr in &tag.attributes {
			let Some(value) = &attr.value else { continue };
			let sites = split_sites(value, attr.value_offset, SiteContext::Attribute);
			if !sites.iter().any(|span| matches!(span, Span::Expression(_))) {
				continue;
			}
			let unquoted = attr.quote.is_none();
			push_literal(spans, &self.source[cursor..attr.value_offset]);
			if unquoted {
				push_literal(spans, "\"");
			}
			for span in sites {
				match span {
					Span::Literal(text) if unquoted => push_literal(spans, &text.replace('"', "&quot;")),
					Span::Literal(text) => push_literal(spans, &text),
					other => spans.push(other),
				}
			}
			if unquoted {
				push_literal(spans, "\"");
			}
			cursor = attr.value_offset + value.len();
		}
		push_literal(spans, &self.source[cursor..tag.end]);
	}

	/// Start of the end tag `</name` at or after `pos`, matching same-name nesting
	/// when `nested` is set.
	fn end_tag_position(&self, lname: &str, nested: bool) -> Option<usize> {
		let mut depth = 0usize;
		let mut at = self.pos;
		while let Some(found) = self.source[at..].find('<') {
			let i = at + found;
			if self.starts_with(i, "</") && self.tag_name_at(i + 2).eq_ignore_ascii_case(lname) {
				if depth == 0 {
					return Some(i);
				}
				depth -= 1;
			} else if nested && self.tag_name_at(i + 1).eq_ignore_ascii_case(lname) {
				let self_closing = self.source[i..]
					.find('>')
					.is_some_and(|gt| self.source[..i + gt].ends_with('/'));
				if !self_closing {
					depth += 1;
				}
			}
			at = i + 1;
		}
		None
	}

	fn raw_text_end(&self, lname: &str, offset: usize) -> Result<usize, ScanError> {
		self.end_tag_position(lname, false)
			.ok_or_else(|| ScanError::UnclosedElement {
				tag: lname.to_string(),
				offset,
			})
	}

	fn verbatim_end(&self, lname: &str, offset: usize) -> Result<usize, ScanError> {
		self.end_tag_position(lname, true)
			.ok_or_else(|| ScanError::UnclosedElement {
				tag: lname.to_string(),
				offset,
			})
	}

	fn directive_element(&mut self, tag: OpenTag) -> Result<DirectiveElement, ScanError> {
		let lname = tag.name.to_ascii_lowercase();
		let open_tag = self.source[tag.start..tag.end].to_string();
		let mut element = DirectiveElement {
			tag: tag.name,
			open_tag,
			attributes: tag.attributes,
			body: Vec::new(),
			close_tag: None,
			self_closing: tag.self_closing,
			offset: tag.start,
		};
		if tag.self_closing || VOID_ELEMENTS.contains(&lname.as_str()) {
			return Ok(element);
		}

		if RAW_TEXT_ELEMENTS.contains(&lname.as_str()) {
			let end = self.raw_text_end(&lname, tag.start)?;
			push_literal(&mut element.body, &self.source[self.pos..end]);
			self.pos = end;
		} else if self.is_verbatim(&lname) {
			let end = self.verbatim_end(&lname, tag.start)?;
			if end > self.pos {
				element
					.body
					.push(Span::Verbatim(self.source[self.pos..end].to_string()));
			}
			self.pos = end;
		} else {
			element.body = self.nodes(Some((&element.tag, tag.start)))?;
		}

		let close_start = self.pos;
		self.pos = self.find_after(close_start, ">")?;
		element.close_tag = Some(self.source[close_start..self.pos].to_string());
		Ok(element)
	}
}
