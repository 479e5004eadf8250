//! Recursive-descent parser for template expressions.
//!
//! ## Precedence (lowest to highest)
//!
//! 1. ternary `c ? a : b` (right associative)
//! 2. `||`
//! 3. `&&`
//! 4. comparison `== != < <= > >=`
//! 5. additive `+ -`
//! 6. multiplicative `* / %`
//! 7. unary `! -`
//! 8. postfix `.field`, `[index]`, `(args)`
//! 9. primary: literals, identifiers, parenthesized expressions
//!
//! Binary levels are left associative.

use crate::ast::{
	Argument, BinaryOp, Binding, CallSignature, Expr, Iteration, Literal, Segment, UnaryOp,
	VariablePath,
};
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::lexer::{Token, TokenKind, tokenize};

/// Maximum nesting depth for parenthesized/bracketed sub-expressions, and the
/// maximum height of the tree built from operator chains. Evaluation and drop
/// both recurse over the tree.
const MAX_NESTING_DEPTH: usize = 64;

pub(crate) struct Parser<'a> {
	source: &'a str,
	tokens: Vec<Token>,
	pos: usize,
	depth: usize,
}

impl<'a> Parser<'a> {
	pub(crate) fn new(source: &'a str) -> ParseResult<Self> {
		Ok(Self {
			source,
			tokens: tokenize(source)?,
			pos: 0,
			depth: 0,
		})
	}

	// ------------------------------------------------------------------
	// Token helpers
	// ------------------------------------------------------------------

	fn peek(&self) -> &TokenKind {
		&self.tokens[self.pos].kind
	}

	fn peek_at(&self, ahead: usize) -> &TokenKind {
		let index = (self.pos + ahead).min(self.tokens.len() - 1);
		&self.tokens[index].kind
	}

	fn current(&self) -> &Token {
		&self.tokens[self.pos]
	}

	fn advance(&mut self) -> Token {
		let token = self.tokens[self.pos].clone();
		if self.pos < self.tokens.len() - 1 {
			self.pos += 1;
		}
		token
	}

	fn eat(&mut self, kind: &TokenKind) -> bool {
		if self.peek() == kind {
			self.advance();
			true
		} else {
			false
		}
	}

	fn is_at_end(&self) -> bool {
		matches!(self.peek(), TokenKind::Eof)
	}

	fn unexpected(&self, expected: &str) -> ParseError {
		let token = self.current();
		ParseError::at(
			ParseErrorKind::Unexpected {
				found: token.kind.describe(),
				expected: expected.to_string(),
			},
			self.source,
			token.start,
			token.end,
		)
	}

	fn unmatched(&self, open: &Token, delimiter: char) -> ParseError {
		ParseError::at(
			ParseErrorKind::Unmatched(delimiter),
			self.source,
			open.start,
			self.source.len(),
		)
	}

	fn expect_ident(&mut self, expected: &str) -> ParseResult<String> {
		match self.peek().clone() {
			TokenKind::Ident(name) => {
				self.advance();
				Ok(name)
			}
			_ => Err(self.unexpected(expected)),
		}
	}

	pub(crate) fn expect_end(&self) -> ParseResult<()> {
		if self.is_at_end() {
			return Ok(());
		}
		let token = self.current();
		let kind = match token.kind {
			TokenKind::RParen => ParseErrorKind::Unmatched(')'),
			TokenKind::RBracket => ParseErrorKind::Unmatched(']'),
			_ => ParseErrorKind::TrailingInput,
		};
		Err(ParseError::at(
			kind,
			self.source,
			token.start,
			self.source.len(),
		))
	}

	fn enter(&mut self) -> ParseResult<()> {
		self.depth += 1;
		if self.depth > MAX_NESTING_DEPTH {
			let token = self.current();
			return Err(ParseError::at(
				ParseErrorKind::TooDeep(MAX_NESTING_DEPTH),
				self.source,
				token.start,
				token.end,
			));
		}
		Ok(())
	}

	fn leave(&mut self) {
		self.depth -= 1;
	}

	/// Rejects a node whose subtree would exceed the nesting limit.
	fn check_height(&self, height: usize) -> ParseResult<()> {
		if height > MAX_NESTING_DEPTH {
			let token = &self.tokens[self.pos.saturating_sub(1)];
			return Err(ParseError::at(
				ParseErrorKind::TooDeep(MAX_NESTING_DEPTH),
				self.source,
				token.start,
				token.end,
			));
		}
		Ok(())
	}

	/// Folds `left op right`, tracking the height of the left-leaning chain.
	fn fold(&self, op: BinaryOp, left: Expr, height: &mut usize, right: Expr) -> ParseResult<Expr> {
		*height = 1 + (*height).max(right.height());
		self.check_height(*height)?;
		Ok(binary(op, left, right))
	}

	// ------------------------------------------------------------------
	// Entry points
	// ------------------------------------------------------------------

	pub(crate) fn parse_complete(&mut self) -> ParseResult<Expr> {
		if self.is_at_end() {
			return Err(ParseError::at(ParseErrorKind::Empty, self.source, 0, 0));
		}
		let expr = self.parse_expr()?;
		self.expect_end()?;
		Ok(expr)
	}

	/// `name = expr, name = expr`; names may contain `-` and `:`.
	pub(crate) fn parse_bindings(&mut self) -> ParseResult<Vec<Binding>> {
		let mut bindings = Vec::new();
		if self.is_at_end() {
			return Err(ParseError::at(ParseErrorKind::Empty, self.source, 0, 0));
		}
		loop {
			let name = self.parse_binding_name()?;
			if !self.eat(&TokenKind::Assign) {
				return Err(self.unexpected("'='"));
			}
			let value = self.parse_expr()?;
			bindings.push(Binding { name, value });
			if !self.eat(&TokenKind::Comma) || self.is_at_end() {
				break;
			}
		}
		self.expect_end()?;
		Ok(bindings)
	}

	fn parse_binding_name(&mut self) -> ParseResult<String> {
		let first = self.current().clone();
		if !matches!(first.kind, TokenKind::Ident(_)) {
			return Err(self.unexpected("a binding name"));
		}
		self.advance();
		let mut end = first.end;
		// Attribute names such as `data-user-id` or `xlink:href`; the parts must touch.
		while matches!(self.peek(), TokenKind::Minus | TokenKind::Colon)
			&& self.current().start == end
			&& matches!(self.peek_at(1), TokenKind::Ident(_) | TokenKind::Int(_))
			&& self.tokens[self.pos + 1].start == self.current().end
		{
			self.advance();
			end = self.advance().end;
		}
		Ok(self.source[first.start..end].to_string())
	}

	/// `item in expr` or `key, item in expr`.
	pub(crate) fn parse_iteration(&mut self) -> ParseResult<Iteration> {
		if self.is_at_end() {
			return Err(ParseError::at(ParseErrorKind::Empty, self.source, 0, 0));
		}
		let first = self.expect_ident("a loop variable")?;
		let (key, item) = if self.eat(&TokenKind::Comma) {
			let second = self.expect_ident("a loop variable")?;
			(Some(first), second)
		} else {
			(None, first)
		};
		match self.peek() {
			TokenKind::Ident(word) if word == "in" => {
				self.advance();
			}
			_ => return Err(self.unexpected("'in'")),
		}
		let collection = self.parse_expr()?;
		self.expect_end()?;
		Ok(Iteration {
			key,
			item,
			collection,
		})
	}

	/// `name`, `name(args)`, `ns::name(args)`.
	pub(crate) fn parse_call_signature(&mut self) -> ParseResult<CallSignature> {
		if self.is_at_end() {
			return Err(ParseError::at(ParseErrorKind::Empty, self.source, 0, 0));
		}
		let mut namespace = None;
		let mut name = self.parse_qualified_part()?;
		if self.eat(&TokenKind::ColonColon) {
			namespace = Some(name);
			name = self.parse_qualified_part()?;
		}
		let arguments = if matches!(self.peek(), TokenKind::LParen) {
			let open = self.advance();
			self.parse_arguments(&open)?
		} else {
			Vec::new()
		};
		self.expect_end()?;
		Ok(CallSignature {
			namespace,
			name,
			arguments,
		})
	}

	/// Identifier optionally followed by `/segment` or `-segment` parts so that
	/// template names like `layouts/base` or `user-card` can be used as namespaces.
	fn parse_qualified_part(&mut self) -> ParseResult<String> {
		let first = self.current().clone();
		if !matches!(first.kind, TokenKind::Ident(_)) {
			return Err(self.unexpected("a name"));
		}
		self.advance();
		let mut end = first.end;
		while matches!(
			self.peek(),
			TokenKind::Slash | TokenKind::Minus | TokenKind::Dot
		) && self.current().start == end
			&& matches!(self.peek_at(1), TokenKind::Ident(_) | TokenKind::Int(_))
			&& self.tokens[self.pos + 1].start == self.current().end
		{
			self.advance();
			end = self.advance().end;
		}
		Ok(self.source[first.start..end].to_string())
	}

	fn parse_arguments(&mut self, open: &Token) -> ParseResult<Vec<Argument>> {
		let mut arguments = Vec::new();
		if self.eat(&TokenKind::RParen) {
			return Ok(arguments);
		}
		loop {
			let named = matches!(self.peek(), TokenKind::Ident(_))
				&& matches!(self.peek_at(1), TokenKind::Assign);
			let name = if named {
				let name = self.expect_ident("an argument name")?;
				self.advance();
				Some(name)
			} else {
				None
			};
			let value = self.parse_expr()?;
			arguments.push(Argument { name, value });
			if self.eat(&TokenKind::Comma) {
				continue;
			}
			if self.eat(&TokenKind::RParen) {
				return Ok(arguments);
			}
			if self.is_at_end() {
				return Err(self.unmatched(open, '('));
			}
			return Err(self.unexpected("',' or ')'"));
		}
	}

	// ------------------------------------------------------------------
	// Expression grammar
	// ------------------------------------------------------------------

	pub(crate) fn parse_expr(&mut self) -> ParseResult<Expr> {
		self.enter()?;
		let result = self.parse_ternary();
		self.leave();
		result
	}

	fn parse_ternary(&mut self) -> ParseResult<Expr> {
		let condition = self.parse_or()?;
		if !self.eat(&TokenKind::Question) {
			return Ok(condition);
		}
		let then_branch = self.parse_expr()?;
		if !self.eat(&TokenKind::Colon) {
			return Err(self.unexpected("':' in conditional expression"));
		}
		let else_branch = self.parse_expr()?;
		Ok(Expr::Ternary {
			condition: Box::new(condition),
			then_branch: Box::new(then_branch),
			else_branch: Box::new(else_branch),
		})
	}

	fn parse_or(&mut self) -> ParseResult<Expr> {
		let mut left = self.parse_and()?;
		let mut height = left.height();
		while self.eat(&TokenKind::OrOr) {
			let right = self.parse_and()?;
			left = self.fold(BinaryOp::Or, left, &mut height, right)?;
		}
		Ok(left)
	}

	fn parse_and(&mut self) -> ParseResult<Expr> {
		let mut left = self.parse_comparison()?;
		let mut height = left.height();
		while self.eat(&TokenKind::AndAnd) {
			let right = self.parse_comparison()?;
			left = self.fold(BinaryOp::And, left, &mut height, right)?;
		}
		Ok(left)
	}

	fn parse_comparison(&mut self) -> ParseResult<Expr> {
		let mut left = self.parse_additive()?;
		let mut height = left.height();
		loop {
			let op = match self.peek() {
				TokenKind::EqEq => BinaryOp::Eq,
				TokenKind::NotEq => BinaryOp::Ne,
				TokenKind::Lt => BinaryOp::Lt,
				TokenKind::Le => BinaryOp::Le,
				TokenKind::Gt => BinaryOp::Gt,
				TokenKind::Ge => BinaryOp::Ge,
				_ => return Ok(left),
			};
			self.advance();
			let right = self.parse_additive()?;
			left = self.fold(op, left, &mut height, right)?;
		}
	}

	fn parse_additive(&mut self) -> ParseResult<Expr> {
		let mut left = self.parse_multiplicative()?;
		let mut height = left.height();
		loop {
			let op = match self.peek() {
				TokenKind::Plus => BinaryOp::Add,
				TokenKind::Minus => BinaryOp::Sub,
				_ => return Ok(left),
			};
			self.advance();
			let right = self.parse_multiplicative()?;
			left = self.fold(op, left, &mut height, right)?;
		}
	}

	fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
		let mut left = self.parse_unary()?;
		let mut height = left.height();
		loop {
			let op = match self.peek() {
				TokenKind::Star => BinaryOp::Mul,
				TokenKind::Slash => BinaryOp::Div,
				TokenKind::Percent => BinaryOp::Rem,
				_ => return Ok(left),
			};
			self.advance();
			let right = self.parse_unary()?;
			left = self.fold(op, left, &mut height, right)?;
		}
	}

	fn parse_unary(&mut self) -> ParseResult<Expr> {
		let op = match self.peek() {
			TokenKind::Bang => UnaryOp::Not,
			TokenKind::Minus => UnaryOp::Neg,
			_ => return self.parse_postfix(),
		};
		self.advance();
		self.enter()?;
		let operand = self.parse_unary();
		self.leave();
		Ok(Expr::Unary {
			op,
			operand: Box::new(operand?),
		})
	}

	fn parse_postfix(&mut self) -> ParseResult<Expr> {
		let mut expr = self.parse_primary()?;
		let mut height = expr.height();
		loop {
			match self.peek() {
				TokenKind::Dot => {
					self.advance();
					let field = match self.peek().clone() {
						TokenKind::Ident(name) => name,
						TokenKind::Int(i) => i.to_string(),
						_ => return Err(self.unexpected("a field name after '.'")),
					};
					self.advance();
					if !matches!(expr, Expr::Path(_)) {
						height += 1;
						self.check_height(height)?;
					}
					expr = append_segment(expr, Segment::Field(field));
				}
				TokenKind::LBracket => {
					let open = self.advance();
					if self.is_at_end() {
						return Err(self.unmatched(&open, '['));
					}
					let index = self.parse_expr()?;
					if !self.eat(&TokenKind::RBracket) {
						if self.is_at_end() {
							return Err(self.unmatched(&open, '['));
						}
						return Err(self.unexpected("']'"));
					}
					height = match expr {
						Expr::Path(_) => height.max(index.height() + 1),
						_ => height.max(index.height()) + 1,
					};
					self.check_height(height)?;
					expr = append_segment(expr, Segment::Index(Box::new(index)));
				}
				TokenKind::LParen => {
					let open = self.advance();
					let args = self.parse_call_args(&open)?;
					height = args.iter().map(Expr::height).fold(height, usize::max) + 1;
					self.check_height(height)?;
					expr = Expr::Call {
						target: Box::new(expr),
						args,
					};
				}
				_ => return Ok(expr),
			}
		}
	}

	fn parse_call_args(&mut self, open: &Token) -> ParseResult<Vec<Expr>> {
		let mut args = Vec::new();
		if self.eat(&TokenKind::RParen) {
			return Ok(args);
		}
		loop {
			if self.is_at_end() {
				return Err(self.unmatched(open, '('));
			}
			args.push(self.parse_expr()?);
			if self.eat(&TokenKind::Comma) {
				continue;
			}
			if self.eat(&TokenKind::RParen) {
				return Ok(args);
			}
			if self.is_at_end() {
				return Err(self.unmatched(open, '('));
			}
			return Err(self.unexpected("',' or ')'"));
		}
	}

	fn parse_primary(&mut self) -> ParseResult<Expr> {
		let token = self.current().clone();
		match token.kind {
			TokenKind::Int(i) => {
				self.advance();
				Ok(Expr::Literal(Literal::Int(i)))
			}
			TokenKind::Float(x) => {
				self.advance();
				Ok(Expr::Literal(Literal::Float(x)))
			}
			TokenKind::Str(s) => {
				self.advance();
				Ok(Expr::Literal(Literal::Str(s)))
			}
			TokenKind::True => {
				self.advance();
				Ok(Expr::Literal(Literal::Bool(true)))
			}
			TokenKind::False => {
				self.advance();
				Ok(Expr::Literal(Literal::Bool(false)))
			}
			TokenKind::Null => {
				self.advance();
				Ok(Expr::Literal(Literal::Null))
			}
			TokenKind::Ident(name) => {
				self.advance();
				Ok(Expr::Path(VariablePath::new(name)))
			}
			TokenKind::LParen => {
				self.advance();
				if self.is_at_end() {
					return Err(self.unmatched(&token, '('));
				}
				let inner = self.parse_expr()?;
				if !self.eat(&TokenKind::RParen) {
					if self.is_at_end() {
						return Err(self.unmatched(&token, '('));
					}
					return Err(self.unexpected("')'"));
				}
				Ok(inner)
			}
			TokenKind::RParen => Err(ParseError::at(
				ParseErrorKind::Unmatched(')'),
				self.source,
				token.start,
				token.end,
			)),
			TokenKind::RBracket => Err(ParseError::at(
				ParseErrorKind::Unmatched(']'),
				self.source,
				token.start,
				token.end,
			)),
			_ => Err(self.unexpected("an expression")),
		}
	}
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
	Expr::Binary {
		op,
		left: Box::new(left),
		right: Box::new(right),
	}
}

fn append_segment(expr: Expr, segment: Segment) -> Expr {
	match expr {
		Expr::Path(mut path) => {
			path.segments.push(segment);
			Expr::Path(path)
		}
		other => Expr::Member {
			object: Box::new(other),
			segment,
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn parse(source: &str) -> Expr {
		Parser::new(source).unwrap().parse_complete().unwrap()
	}

	#[rstest]
	fn test_precedence_multiplicative_over_additive() {
		assert_eq!(parse("1 + 2 * 3").to_string(), "(1 + (2 * 3))");
		assert_eq!(parse("(1 + 2) * 3").to_string(), "((1 + 2) * 3)");
	}

	#[rstest]
	fn test_left_associativity() {
		assert_eq!(parse("a - b - c").to_string(), "((a - b) - c)");
		assert_eq!(parse("a || b || c").to_string(), "((a || b) || c)");
	}

	#[rstest]
	fn test_ternary_is_right_associative() {
		assert_eq!(
			parse("a ? b : c ? d : e").to_string(),
			"(a ? b : (c ? d : e))"
		);
	}

	#[rstest]
	fn test_logical_precedence() {
		assert_eq!(
			parse("!a && b == c || d").to_string(),
			"((!a && (b == c)) || d)"
		);
	}

	#[rstest]
	fn test_method_call_on_path() {
		let expr = parse("user.name.upper()");
		let Expr::Call { target, args } = expr else {
			panic!("expected call");
		};
		assert!(args.is_empty());
		assert_eq!(target.to_string(), "user.name.upper");
	}

	#[rstest]
	fn test_member_on_call_result() {
		let expr = parse("first(items).title");
		assert!(matches!(expr, Expr::Member { .. }));
	}

	#[rstest]
	#[case::additive(" + ")]
	#[case::multiplicative(" * ")]
	#[case::comparison(" == ")]
	#[case::logical(" && ")]
	fn test_long_operator_chain_is_rejected(#[case] operator: &str) {
		let source = vec!["1"; 10_000].join(operator);
		let err = Parser::new(&source).unwrap().parse_complete().unwrap_err();
		assert_eq!(err.kind, ParseErrorKind::TooDeep(MAX_NESTING_DEPTH));
	}

	#[rstest]
	fn test_long_call_chain_is_rejected() {
		let source = format!("f{}", "()".repeat(10_000));
		let err = Parser::new(&source).unwrap().parse_complete().unwrap_err();
		assert_eq!(err.kind, ParseErrorKind::TooDeep(MAX_NESTING_DEPTH));
	}

	#[rstest]
	fn test_operator_chain_within_limit() {
		let source = vec!["1"; 32].join(" + ");
		let expr = parse(&source);
		assert_eq!(expr.height(), 32);
	}

	#[rstest]
	fn test_nesting_limit() {
		let source = format!("{}1{}", "(".repeat(100), ")".repeat(100));
		let err = Parser::new(&source).unwrap().parse_complete().unwrap_err();
		assert_eq!(err.kind, ParseErrorKind::TooDeep(MAX_NESTING_DEPTH));
	}
}
