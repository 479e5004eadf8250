//! Developer-facing error reports
//!
//! Turns a compile error that carries a byte offset into a report with the
//! line, column, offending source line, surrounding context and a suggestion.

use crate::error::CompileError;
use std::fmt;

/// Number of context lines shown before and after the error line.
const CONTEXT_LINES: usize = 2;

/// A located template error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
	/// Template name
	pub template: String,
	/// 1-based line of the error
	pub line: usize,
	/// 1-based column (in characters) of the error
	pub column: usize,
	/// The line of source that caused the error
	pub source_line: String,
	/// Lines before the error line
	pub context_before: Vec<String>,
	/// Lines after the error line
	pub context_after: Vec<String>,
	/// Error message
	pub message: String,
	/// Suggestion for fixing the error
	pub suggestion: Option<String>,
}

impl ErrorReport {
	/// Builds a report for `offset` in `source`.
	///
	/// # Examples
	///
	/// ```
	/// use stencil_templates::ErrorReport;
	///
	/// let source = "<ul>\n  <li th:text=\"a +\"></li>\n</ul>";
	/// let offset = source.find("a +").unwrap();
	/// let report = ErrorReport::new("list.html", source, offset, "unexpected end");
	///
	/// assert_eq!(report.line, 2);
	/// assert_eq!(report.column, 16);
	/// assert_eq!(report.context_before, vec!["<ul>"]);
	/// ```
	pub fn new(
		template: impl Into<String>,
		source: &str,
		offset: usize,
		message: impl Into<String>,
	) -> Self {
		let (line, column) = locate(source, offset);
		let lines: Vec<&str> = source.lines().collect();
		let index = line - 1;
		let source_line = lines.get(index).copied().unwrap_or_default().to_string();
		let before_start = index.saturating_sub(CONTEXT_LINES);
		let context_before = lines
			.get(before_start..index.min(lines.len()))
			.unwrap_or_default()
			.iter()
			.map(|line| line.to_string())
			.collect();
		let context_after = lines
			.iter()
			.skip(index + 1)
			.take(CONTEXT_LINES)
			.map(|line| line.to_string())
			.collect();
		Self {
			template: template.into(),
			line,
			column,
			source_line,
			context_before,
			context_after,
			message: message.into(),
			suggestion: None,
		}
	}

	/// Builds a report for a compile error, when it points into `source`.
	pub fn from_compile_error(error: &CompileError, source: &str) -> Option<Self> {
		let (template, offset) = error.location()?;
		let mut report = Self::new(template, source, offset, error.to_string());
		report.suggestion = error.suggestion();
		Some(report)
	}

	/// Add a suggestion for fixing the error
	pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
		self.suggestion = Some(suggestion.into());
		self
	}

	/// Format the report for display
	pub fn format(&self) -> String {
		let mut output = String::new();

		output.push_str(&format!("Error in template: {}\n", self.template));
		output.push_str(&format!("  at line {}, column {}\n\n", self.line, self.column));

		for (i, line) in self.context_before.iter().enumerate() {
			let line_num = self.line.saturating_sub(self.context_before.len() - i);
			output.push_str(&format!("  {:4} | {}\n", line_num, line));
		}

		output.push_str(&format!("  {:4} | {}\n", self.line, self.source_line));
		output.push_str(&format!(
			"       | {}^\n",
			" ".repeat(self.column.saturating_sub(1))
		));

		for (i, line) in self.context_after.iter().enumerate() {
			output.push_str(&format!("  {:4} | {}\n", self.line + i + 1, line));
		}

		output.push('\n');
		output.push_str(&format!("Error: {}\n", self.message));

		if let Some(ref suggestion) = self.suggestion {
			output.push('\n');
			output.push_str(&format!("Suggestion: {}\n", suggestion));
		}

		output
	}
}

impl fmt::Display for ErrorReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.format())
	}
}

/// 1-based line and character column of a byte offset.
fn locate(source: &str, offset: usize) -> (usize, usize) {
	let mut offset = offset.min(source.len());
	while !source.is_char_boundary(offset) {
		offset -= 1;
	}
	let before = &source[..offset];
	let line = before.matches('\n').count() + 1;
	let line_start = before.rfind('\n').map_or(0, |i| i + 1);
	let column = before[line_start..].chars().count() + 1;
	(line, column)
}

/// Suggests the closest name from `available`, if any is close enough.
///
/// # Examples
///
/// ```
/// use stencil_templates::suggest_similar;
///
/// let available = ["card", "ui::badge", "header"];
/// assert_eq!(suggest_similar("crad", &available), Some("card".to_string()));
/// assert_eq!(suggest_similar("ui::badg", &available), Some("ui::badge".to_string()));
/// assert_eq!(suggest_similar("completely_different", &available), None);
/// ```
pub fn suggest_similar<S: AsRef<str>>(input: &str, available: &[S]) -> Option<String> {
	let input_lower = input.to_lowercase();
	let mut best_match: Option<(&str, usize)> = None;

	for candidate in available {
		let candidate = candidate.as_ref();
		let distance = levenshtein_distance(&input_lower, &candidate.to_lowercase());
		if distance <= 3 && best_match.is_none_or(|(_, best)| distance < best) {
			best_match = Some((candidate, distance));
		}
	}

	best_match.map(|(name, _)| name.to_string())
}

/// Levenshtein distance between two strings, counted in characters.
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
	let a: Vec<char> = s1.chars().collect();
	let b: Vec<char> = s2.chars().collect();
	let mut previous: Vec<usize> = (0..=b.len()).collect();
	let mut current = vec![0; b.len() + 1];

	for (i, c1) in a.iter().enumerate() {
		current[0] = i + 1;
		for (j, c2) in b.iter().enumerate() {
			let cost = usize::from(c1 != c2);
			current[j + 1] = (previous[j + 1] + 1)
				.min(current[j] + 1)
				.min(previous[j] + cost);
		}
		std::mem::swap(&mut previous, &mut current);
	}

	previous[b.len()]
}
