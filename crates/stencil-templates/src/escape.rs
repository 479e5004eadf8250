//! HTML escaping and entity handling
//!
//! Text output is escaped with [`escape_html`], attribute values with
//! [`escape_html_attr`]. Escaped characters:
//! - `&` → `&amp;`
//! - `<` → `&lt;`
//! - `>` → `&gt;`
//! - `"` → `&quot;`
//! - `'` → `&#x27;`
//!
//! Attribute escaping additionally encodes the backtick.

use std::borrow::Cow;

/// Escapes HTML special characters in text content.
///
/// Returns a borrowed reference if no escaping is needed.
///
/// # Examples
///
/// ```
/// use stencil_templates::escape::escape_html;
///
/// assert_eq!(escape_html("<b>Al</b>"), "&lt;b&gt;Al&lt;/b&gt;");
/// assert_eq!(escape_html("Tom & Jerry"), "Tom &amp; Jerry");
/// assert_eq!(escape_html("plain"), "plain");
/// ```
pub fn escape_html(s: &str) -> Cow<'_, str> {
	escape_with(s, false)
}

/// Escapes a value for use inside a quoted attribute.
///
/// # Examples
///
/// ```
/// use stencil_templates::escape::escape_html_attr;
///
/// assert_eq!(
/// 	escape_html_attr(r#"x" onclick="alert(1)"#),
/// 	"x&quot; onclick=&quot;alert(1)"
/// );
/// ```
pub fn escape_html_attr(s: &str) -> Cow<'_, str> {
	escape_with(s, true)
}

fn escape_with(s: &str, attribute: bool) -> Cow<'_, str> {
	let needs_escape = s.contains(['&', '<', '>', '"', '\'']) || (attribute && s.contains('`'));
	if !needs_escape {
		return Cow::Borrowed(s);
	}
	let mut escaped = String::with_capacity(s.len() + 8);
	for c in s.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#x27;"),
			'`' if attribute => escaped.push_str("&#x60;"),
			_ => escaped.push(c),
		}
	}
	Cow::Owned(escaped)
}

/// HTML boolean attributes: present means on, absent means off.
///
/// Dynamic bindings of these attributes are emitted bare when the bound value
/// is truthy and omitted otherwise.
pub const BOOLEAN_ATTRS: &[&str] = &[
	"allowfullscreen",
	"async",
	"autofocus",
	"autoplay",
	"checked",
	"controls",
	"default",
	"defer",
	"disabled",
	"formnovalidate",
	"hidden",
	"inert",
	"ismap",
	"itemscope",
	"loop",
	"multiple",
	"muted",
	"nomodule",
	"novalidate",
	"open",
	"playsinline",
	"readonly",
	"required",
	"reversed",
	"selected",
	"truespeed",
];

/// Returns `true` if `name` is an HTML boolean attribute (case-insensitive).
pub fn is_boolean_attr(name: &str) -> bool {
	BOOLEAN_ATTRS
		.iter()
		.any(|attr| attr.eq_ignore_ascii_case(name))
}

/// Named character references decoded inside verbatim regions.
///
/// Markup-significant references (`&lt;`, `&gt;`, `&amp;`, `&quot;`) and
/// numeric references are deliberately absent.
pub const VERBATIM_ENTITIES: &[(&str, &str)] = &[
	("mdash", "\u{2014}"),
	("ndash", "\u{2013}"),
	("hellip", "\u{2026}"),
	("lsquo", "\u{2018}"),
	("rsquo", "\u{2019}"),
	("ldquo", "\u{201C}"),
	("rdquo", "\u{201D}"),
	("laquo", "\u{00AB}"),
	("raquo", "\u{00BB}"),
	("bull", "\u{2022}"),
	("middot", "\u{00B7}"),
	("trade", "\u{2122}"),
	("copy", "\u{00A9}"),
	("reg", "\u{00AE}"),
	("deg", "\u{00B0}"),
];

/// Decodes the allow-listed named references in verbatim content.
///
/// # Examples
///
/// ```
/// use stencil_templates::escape::decode_verbatim_entities;
///
/// assert_eq!(
/// 	decode_verbatim_entities("a &mdash; &lt;b&gt; &amp;&#169;"),
/// 	"a \u{2014} &lt;b&gt; &amp;&#169;"
/// );
/// ```
pub fn decode_verbatim_entities(s: &str) -> Cow<'_, str> {
	if !s.contains('&') {
		return Cow::Borrowed(s);
	}
	let mut decoded = String::with_capacity(s.len());
	let mut rest = s;
	while let Some(amp) = rest.find('&') {
		decoded.push_str(&rest[..amp]);
		let candidate = &rest[amp + 1..];
		let replacement = candidate.find(';').and_then(|semi| {
			let name = &candidate[..semi];
			VERBATIM_ENTITIES
				.iter()
				.find(|(entity, _)| *entity == name)
				.map(|(_, text)| (*text, semi))
		});
		match replacement {
			Some((text, semi)) => {
				decoded.push_str(text);
				rest = &candidate[semi + 1..];
			}
			None => {
				decoded.push('&');
				rest = candidate;
			}
		}
	}
	decoded.push_str(rest);
	Cow::Owned(decoded)
}
