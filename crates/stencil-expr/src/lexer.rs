//! Tokenizer for the expression language.

use crate::error::{ParseError, ParseErrorKind, ParseResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
	Ident(String),
	Int(i64),
	Float(f64),
	Str(String),
	True,
	False,
	Null,

	Plus,
	Minus,
	Star,
	Slash,
	Percent,
	EqEq,
	NotEq,
	Lt,
	Le,
	Gt,
	Ge,
	AndAnd,
	OrOr,
	Bang,
	Question,
	Colon,
	ColonColon,
	Assign,
	Dot,
	Comma,
	LParen,
	RParen,
	LBracket,
	RBracket,

	Eof,
}

impl TokenKind {
	/// Human readable description used in error messages.
	pub(crate) fn describe(&self) -> String {
		match self {
			TokenKind::Ident(name) => format!("identifier '{}'", name),
			TokenKind::Int(i) => format!("number {}", i),
			TokenKind::Float(x) => format!("number {}", x),
			TokenKind::Str(_) => "string literal".to_string(),
			TokenKind::True => "'true'".to_string(),
			TokenKind::False => "'false'".to_string(),
			TokenKind::Null => "'null'".to_string(),
			TokenKind::Eof => "end of expression".to_string(),
			other => format!("'{}'", other.symbol()),
		}
	}

	fn symbol(&self) -> &'static str {
		match self {
			TokenKind::Plus => "+",
			TokenKind::Minus => "-",
			TokenKind::Star => "*",
			TokenKind::Slash => "/",
			TokenKind::Percent => "%",
			TokenKind::EqEq => "==",
			TokenKind::NotEq => "!=",
			TokenKind::Lt => "<",
			TokenKind::Le => "<=",
			TokenKind::Gt => ">",
			TokenKind::Ge => ">=",
			TokenKind::AndAnd => "&&",
			TokenKind::OrOr => "||",
			TokenKind::Bang => "!",
			TokenKind::Question => "?",
			TokenKind::Colon => ":",
			TokenKind::ColonColon => "::",
			TokenKind::Assign => "=",
			TokenKind::Dot => ".",
			TokenKind::Comma => ",",
			TokenKind::LParen => "(",
			TokenKind::RParen => ")",
			TokenKind::LBracket => "[",
			TokenKind::RBracket => "]",
			_ => "?",
		}
	}
}

/// A token with its byte range in the source.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
	pub(crate) kind: TokenKind,
	pub(crate) start: usize,
	pub(crate) end: usize,
}

/// Splits `source` into tokens, always terminated by an `Eof` token.
pub(crate) fn tokenize(source: &str) -> ParseResult<Vec<Token>> {
	Lexer {
		source,
		bytes: source.as_bytes(),
		pos: 0,
		tokens: Vec::new(),
	}
	.run()
}

struct Lexer<'a> {
	source: &'a str,
	bytes: &'a [u8],
	pos: usize,
	tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
	fn run(mut self) -> ParseResult<Vec<Token>> {
		loop {
			self.skip_whitespace();
			let start = self.pos;
			let Some(&byte) = self.bytes.get(self.pos) else {
				self.tokens.push(Token {
					kind: TokenKind::Eof,
					start,
					end: start,
				});
				return Ok(self.tokens);
			};

			let kind = match byte {
				b'\'' | b'"' => self.string(byte)?,
				b'0'..=b'9' => self.number()?,
				b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),
				_ => self.operator()?,
			};
			self.tokens.push(Token {
				kind,
				start,
				end: self.pos,
			});
		}
	}

	fn skip_whitespace(&mut self) {
		while let Some(b) = self.bytes.get(self.pos) {
			if b.is_ascii_whitespace() {
				self.pos += 1;
			} else {
				break;
			}
		}
	}

	fn peek_byte(&self, ahead: usize) -> Option<u8> {
		self.bytes.get(self.pos + ahead).copied()
	}

	fn previous_is_dot(&self) -> bool {
		matches!(
			self.tokens.last(),
			Some(Token {
				kind: TokenKind::Dot,
				..
			})
		)
	}

	fn identifier(&mut self) -> TokenKind {
		let start = self.pos;
		while let Some(b) = self.peek_byte(0) {
			if b.is_ascii_alphanumeric() || b == b'_' {
				self.pos += 1;
			} else {
				break;
			}
		}
		let word = &self.source[start..self.pos];
		// After a dot, keywords are ordinary field names (`row.null` is a field).
		if self.previous_is_dot() {
			return TokenKind::Ident(word.to_string());
		}
		match word {
			"true" => TokenKind::True,
			"false" => TokenKind::False,
			"null" => TokenKind::Null,
			_ => TokenKind::Ident(word.to_string()),
		}
	}

	fn number(&mut self) -> ParseResult<TokenKind> {
		let start = self.pos;
		while matches!(self.peek_byte(0), Some(b'0'..=b'9')) {
			self.pos += 1;
		}
		// `items.0.1` is two integer segments, not a float.
		let is_float = !self.previous_is_dot()
			&& self.peek_byte(0) == Some(b'.')
			&& matches!(self.peek_byte(1), Some(b'0'..=b'9'));
		if is_float {
			self.pos += 1;
			while matches!(self.peek_byte(0), Some(b'0'..=b'9')) {
				self.pos += 1;
			}
		}
		let text = &self.source[start..self.pos];
		if is_float {
			text.parse::<f64>().map(TokenKind::Float).map_err(|_| {
				ParseError::at(
					ParseErrorKind::InvalidNumber(text.to_string()),
					self.source,
					start,
					self.pos,
				)
			})
		} else {
			text.parse::<i64>().map(TokenKind::Int).map_err(|_| {
				ParseError::at(
					ParseErrorKind::InvalidNumber(text.to_string()),
					self.source,
					start,
					self.pos,
				)
			})
		}
	}

	fn string(&mut self, quote: u8) -> ParseResult<TokenKind> {
		let source = self.source;
		let start = self.pos;
		self.pos += 1;
		let mut value = String::new();
		let mut chars = source[self.pos..].char_indices();

		while let Some((i, c)) = chars.next() {
			if c as u32 == quote as u32 {
				self.pos += i + 1;
				return Ok(TokenKind::Str(value));
			}
			if c != '\\' {
				value.push(c);
				continue;
			}
			let Some((j, escaped)) = chars.next() else {
				break;
			};
			match escaped {
				'n' => value.push('\n'),
				't' => value.push('\t'),
				'r' => value.push('\r'),
				'0' => value.push('\0'),
				'\\' | '\'' | '"' => value.push(escaped),
				'u' => {
					let rest = &source[self.pos + j + 1..];
					let decoded = rest
						.strip_prefix('{')
						.and_then(|r| r.split_once('}'))
						.and_then(|(hex, _)| u32::from_str_radix(hex, 16).ok())
						.and_then(char::from_u32);
					let Some(ch) = decoded else {
						let at = self.pos + j;
						return Err(ParseError::at(
							ParseErrorKind::InvalidEscape('u'),
							self.source,
							at - 1,
							at + 1,
						));
					};
					value.push(ch);
					// Skip `{XXXX}`
					for (_, skipped) in chars.by_ref() {
						if skipped == '}' {
							break;
						}
					}
				}
				other => {
					let at = self.pos + j;
					return Err(ParseError::at(
						ParseErrorKind::InvalidEscape(other),
						self.source,
						at - 1,
						at + other.len_utf8(),
					));
				}
			}
		}

		Err(ParseError::at(
			ParseErrorKind::UnterminatedString,
			self.source,
			start,
			self.source.len(),
		))
	}

	fn operator(&mut self) -> ParseResult<TokenKind> {
		let start = self.pos;
		let first = self.bytes[self.pos];
		let second = self.peek_byte(1);

		let (kind, len) = match (first, second) {
			(b'=', Some(b'=')) => (TokenKind::EqEq, 2),
			(b'!', Some(b'=')) => (TokenKind::NotEq, 2),
			(b'<', Some(b'=')) => (TokenKind::Le, 2),
			(b'>', Some(b'=')) => (TokenKind::Ge, 2),
			(b'&', Some(b'&')) => (TokenKind::AndAnd, 2),
			(b'|', Some(b'|')) => (TokenKind::OrOr, 2),
			(b':', Some(b':')) => (TokenKind::ColonColon, 2),
			(b'=', _) => (TokenKind::Assign, 1),
			(b'!', _) => (TokenKind::Bang, 1),
			(b'<', _) => (TokenKind::Lt, 1),
			(b'>', _) => (TokenKind::Gt, 1),
			(b'+', _) => (TokenKind::Plus, 1),
			(b'-', _) => (TokenKind::Minus, 1),
			(b'*', _) => (TokenKind::Star, 1),
			(b'/', _) => (TokenKind::Slash, 1),
			(b'%', _) => (TokenKind::Percent, 1),
			(b'?', _) => (TokenKind::Question, 1),
			(b':', _) => (TokenKind::Colon, 1),
			(b'.', _) => (TokenKind::Dot, 1),
			(b',', _) => (TokenKind::Comma, 1),
			(b'(', _) => (TokenKind::LParen, 1),
			(b')', _) => (TokenKind::RParen, 1),
			(b'[', _) => (TokenKind::LBracket, 1),
			(b']', _) => (TokenKind::RBracket, 1),
			_ => {
				let len = self.source[start..]
					.chars()
					.next()
					.map(char::len_utf8)
					.unwrap_or(1);
				return Err(ParseError::at(
					ParseErrorKind::UnknownOperator(self.source[start..start + len].to_string()),
					self.source,
					start,
					start + len,
				));
			}
		};

		// `===`, `!==`, `<>`, `=>`, `>>` ... are not part of the grammar.
		if let Some(next) = self.peek_byte(len)
			&& is_operator_byte(next)
			&& rejects_continuation(&kind, next)
		{
			return Err(ParseError::at(
				ParseErrorKind::UnknownOperator(self.source[start..start + len + 1].to_string()),
				self.source,
				start,
				start + len + 1,
			));
		}

		self.pos += len;
		Ok(kind)
	}
}

fn is_operator_byte(b: u8) -> bool {
	matches!(b, b'=' | b'<' | b'>' | b'&' | b'|')
}

fn rejects_continuation(kind: &TokenKind, next: u8) -> bool {
	match kind {
		TokenKind::EqEq | TokenKind::NotEq | TokenKind::Le | TokenKind::Ge => true,
		TokenKind::Assign => matches!(next, b'>' | b'<'),
		TokenKind::Lt => matches!(next, b'>' | b'<'),
		TokenKind::Gt => matches!(next, b'>' | b'<'),
		TokenKind::AndAnd => next == b'&',
		TokenKind::OrOr => next == b'|',
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn kinds(source: &str) -> Vec<TokenKind> {
		tokenize(source)
			.unwrap()
			.into_iter()
			.map(|t| t.kind)
			.collect()
	}

	#[rstest]
	fn test_tokenize_path_and_operators() {
		assert_eq!(
			kinds("user.age >= 18"),
			vec![
				TokenKind::Ident("user".into()),
				TokenKind::Dot,
				TokenKind::Ident("age".into()),
				TokenKind::Ge,
				TokenKind::Int(18),
				TokenKind::Eof,
			]
		);
	}

	#[rstest]
	fn test_numeric_segments_are_not_floats() {
		assert_eq!(
			kinds("a.0.1"),
			vec![
				TokenKind::Ident("a".into()),
				TokenKind::Dot,
				TokenKind::Int(0),
				TokenKind::Dot,
				TokenKind::Int(1),
				TokenKind::Eof,
			]
		);
		assert_eq!(kinds("1.5"), vec![TokenKind::Float(1.5), TokenKind::Eof]);
	}

	#[rstest]
	#[case(r#"'it\'s'"#, "it's")]
	#[case(r#""a\nb""#, "a\nb")]
	#[case(r#"'\u{2014}'"#, "\u{2014}")]
	#[case("'日本語'", "日本語")]
	fn test_string_escapes(#[case] source: &str, #[case] expected: &str) {
		assert_eq!(
			kinds(source),
			vec![TokenKind::Str(expected.to_string()), TokenKind::Eof]
		);
	}

	#[rstest]
	fn test_keywords_after_dot_are_fields() {
		assert_eq!(
			kinds("row.null"),
			vec![
				TokenKind::Ident("row".into()),
				TokenKind::Dot,
				TokenKind::Ident("null".into()),
				TokenKind::Eof,
			]
		);
	}

	#[rstest]
	#[case("a === b", "===")]
	#[case("a <> b", "<>")]
	#[case("a & b", "&")]
	#[case("a # b", "#")]
	fn test_unknown_operators(#[case] source: &str, #[case] fragment: &str) {
		let err = tokenize(source).unwrap_err();
		assert!(matches!(err.kind, ParseErrorKind::UnknownOperator(_)));
		assert_eq!(err.fragment, fragment);
	}
}
