//! Parse errors for the expression language.

/// The kind of failure encountered while parsing an expression.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
	#[error("empty expression")]
	Empty,

	#[error("unterminated string literal")]
	UnterminatedString,

	#[error("invalid escape sequence '\\{0}' in string literal")]
	InvalidEscape(char),

	#[error("unmatched '{0}'")]
	Unmatched(char),

	#[error("unknown operator '{0}'")]
	UnknownOperator(String),

	#[error("invalid number literal '{0}'")]
	InvalidNumber(String),

	#[error("unexpected {found}, expected {expected}")]
	Unexpected {
		/// Description of the token that was found
		found: String,
		/// Description of what the grammar expected
		expected: String,
	},

	#[error("unexpected trailing input")]
	TrailingInput,

	#[error("expression nesting exceeds {0} levels")]
	TooDeep(usize),
}

/// Error produced by the expression parser.
///
/// `offset` is a character offset into the parsed text and `fragment` is the
/// offending substring (possibly empty at end of input).
///
/// # Examples
///
/// ```
/// use stencil_expr::{parse, ParseErrorKind};
///
/// let err = parse("a + 'oops").unwrap_err();
/// assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
/// assert_eq!(err.offset, 4);
/// assert_eq!(err.fragment, "'oops");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at offset {offset} (near `{fragment}`)")]
pub struct ParseError {
	/// What went wrong
	pub kind: ParseErrorKind,
	/// Character offset of the offending input
	pub offset: usize,
	/// The offending substring
	pub fragment: String,
}

impl ParseError {
	/// Builds an error from a byte range of `source`.
	pub(crate) fn at(kind: ParseErrorKind, source: &str, start: usize, end: usize) -> Self {
		let start = start.min(source.len());
		let end = end.clamp(start, source.len());
		Self {
			kind,
			offset: source[..start].chars().count(),
			fragment: source[start..end].to_string(),
		}
	}

	/// Returns a copy of this error with its offset shifted by `delta` characters.
	///
	/// Used when an expression is embedded in a larger document.
	pub fn shifted(mut self, delta: usize) -> Self {
		self.offset += delta;
		self
	}
}

/// Result type for expression parsing.
pub type ParseResult<T> = Result<T, ParseError>;
