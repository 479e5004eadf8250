//! # Stencil Expressions
//!
//! The small expression language used inside `{…}` interpolations and
//! directive attribute values of Stencil templates.
//!
//! ## Grammar
//!
//! - Literals: `'single'`, `"double"`, `42`, `3.14`, `true`, `false`, `null`
//! - Paths: `user.name`, `items[0]`, `row['key']`, `matrix.0.1`
//! - Calls: `length(items)`, `user.display_name('short')`
//! - Operators: `+ - * / %`, `== != < <= > >=`, `&& || !`, `c ? a : b`
//!
//! Parsing is side-effect free; evaluation lives in `stencil-templates`.
//!
//! ## Example
//!
//! ```
//! use stencil_expr::{parse, Expr, BinaryOp};
//!
//! let expr = parse("user.age >= 18 && user.active").unwrap();
//! assert!(matches!(expr, Expr::Binary { op: BinaryOp::And, .. }));
//! ```

pub mod ast;
pub mod error;
mod lexer;
mod parser;

pub use ast::{
	Argument, BinaryOp, Binding, CallSignature, Expr, Iteration, Literal, Segment, UnaryOp,
	VariablePath,
};
pub use error::{ParseError, ParseErrorKind, ParseResult};

use parser::Parser;

/// Parses a complete expression.
///
/// # Examples
///
/// ```
/// use stencil_expr::parse;
///
/// let expr = parse("items[0].title").unwrap();
/// assert_eq!(expr.to_string(), "items[0].title");
///
/// assert!(parse("(a + b").is_err());
/// ```
pub fn parse(source: &str) -> ParseResult<Expr> {
	Parser::new(source)?.parse_complete()
}

/// Parses a comma separated list of `name = expression` bindings.
///
/// Names may contain `-` and `:` so that attribute names such as
/// `data-user-id` or `xlink:href` can be bound.
///
/// # Examples
///
/// ```
/// use stencil_expr::parse_bindings;
///
/// let bindings = parse_bindings("title = post.title, data-id = post.id").unwrap();
/// assert_eq!(bindings.len(), 2);
/// assert_eq!(bindings[1].name, "data-id");
/// ```
pub fn parse_bindings(source: &str) -> ParseResult<Vec<Binding>> {
	Parser::new(source)?.parse_bindings()
}

/// Parses a loop header: `item in items` or `key, item in items`.
///
/// # Examples
///
/// ```
/// use stencil_expr::parse_iteration;
///
/// let it = parse_iteration("name, score in scores").unwrap();
/// assert_eq!(it.key.as_deref(), Some("name"));
/// assert_eq!(it.item, "score");
/// ```
pub fn parse_iteration(source: &str) -> ParseResult<Iteration> {
	Parser::new(source)?.parse_iteration()
}

/// Parses a fragment or component reference such as `ns::card(title, size = 2)`.
///
/// # Examples
///
/// ```
/// use stencil_expr::parse_call_signature;
///
/// let sig = parse_call_signature("shared::card(post.title, compact = true)").unwrap();
/// assert_eq!(sig.namespace.as_deref(), Some("shared"));
/// assert_eq!(sig.name, "card");
/// assert_eq!(sig.arguments.len(), 2);
/// assert_eq!(sig.arguments[1].name.as_deref(), Some("compact"));
/// ```
pub fn parse_call_signature(source: &str) -> ParseResult<CallSignature> {
	Parser::new(source)?.parse_call_signature()
}
