//! Expression parser integration tests
//!
//! Test Categories:
//! 1. Literals and paths
//! 2. Operators and precedence
//! 3. Directive sub-grammars (bindings, iteration, call signatures)
//! 4. Error reporting (offsets and fragments)
//! 5. Properties

use proptest::prelude::*;
use rstest::rstest;
use stencil_expr::{
	BinaryOp, Expr, Literal, ParseErrorKind, Segment, UnaryOp, parse, parse_bindings,
	parse_call_signature, parse_iteration,
};

// ============================================================================
// Category 1: Literals and paths
// ============================================================================

#[rstest]
#[case("42", Literal::Int(42))]
#[case("2.5", Literal::Float(2.5))]
#[case("'hi'", Literal::Str("hi".into()))]
#[case("\"hi\"", Literal::Str("hi".into()))]
#[case("true", Literal::Bool(true))]
#[case("false", Literal::Bool(false))]
#[case("null", Literal::Null)]
fn test_literals(#[case] source: &str, #[case] expected: Literal) {
	assert_eq!(parse(source).unwrap(), Expr::Literal(expected));
}

#[rstest]
fn test_dot_path() {
	let expr = parse("user.profile.name").unwrap();
	let path = expr.as_path().unwrap();
	assert_eq!(path.root, "user");
	assert_eq!(
		path.segments,
		vec![
			Segment::Field("profile".into()),
			Segment::Field("name".into())
		]
	);
	assert!(path.is_static());
}

#[rstest]
fn test_bracket_index() {
	let expr = parse("rows[0]['key']").unwrap();
	let path = expr.as_path().unwrap();
	assert_eq!(path.segments.len(), 2);
	assert!(!path.is_static());
	assert_eq!(expr.to_string(), "rows[0]['key']");
}

#[rstest]
fn test_function_and_method_calls() {
	let Expr::Call { target, args } = parse("length(items)").unwrap() else {
		panic!("expected a call");
	};
	assert_eq!(target.as_identifier(), Some("length"));
	assert_eq!(args.len(), 1);

	let Expr::Call { target, args } = parse("user.greet('Hi', 2)").unwrap() else {
		panic!("expected a call");
	};
	assert_eq!(target.to_string(), "user.greet");
	assert_eq!(args.len(), 2);
}

// ============================================================================
// Category 2: Operators and precedence
// ============================================================================

#[rstest]
#[case("a + b * c", "(a + (b * c))")]
#[case("a * b + c", "((a * b) + c)")]
#[case("a % b / c", "((a % b) / c)")]
#[case("a + b > c", "((a + b) > c)")]
#[case("a > b == c", "((a > b) == c)")]
#[case("a == b && c != d", "((a == b) && (c != d))")]
#[case("a && b || c && d", "((a && b) || (c && d))")]
#[case("a || b ? c : d", "((a || b) ? c : d)")]
#[case("!a == b", "(!a == b)")]
#[case("-a * b", "(-a * b)")]
fn test_precedence(#[case] source: &str, #[case] expected: &str) {
	assert_eq!(parse(source).unwrap().to_string(), expected);
}

#[rstest]
fn test_unary_not_binds_tighter_than_multiplicative() {
	let expr = parse("!a * b").unwrap();
	let Expr::Binary { op, left, .. } = expr else {
		panic!("expected binary");
	};
	assert_eq!(op, BinaryOp::Mul);
	assert!(matches!(
		*left,
		Expr::Unary {
			op: UnaryOp::Not,
			..
		}
	));
}

// ============================================================================
// Category 3: Directive sub-grammars
// ============================================================================

#[rstest]
fn test_bindings_with_attribute_names() {
	let bindings = parse_bindings("aria-label = 'Close', xlink:href = link.url, n = 1 + 2").unwrap();
	let names: Vec<&str> = bindings.iter().map(|b| b.name.as_str()).collect();
	assert_eq!(names, vec!["aria-label", "xlink:href", "n"]);
	assert_eq!(bindings[2].value.to_string(), "(1 + 2)");
}

#[rstest]
fn test_bindings_require_assignment() {
	let err = parse_bindings("a b").unwrap_err();
	assert!(matches!(err.kind, ParseErrorKind::Unexpected { .. }));
}

#[rstest]
fn test_iteration_forms() {
	let it = parse_iteration("post in user.posts").unwrap();
	assert_eq!(it.key, None);
	assert_eq!(it.item, "post");
	assert_eq!(it.collection.to_string(), "user.posts");

	let it = parse_iteration("k, v in settings").unwrap();
	assert_eq!(it.key.as_deref(), Some("k"));
	assert_eq!(it.item, "v");
}

#[rstest]
fn test_iteration_requires_in() {
	let err = parse_iteration("post of posts").unwrap_err();
	assert!(matches!(err.kind, ParseErrorKind::Unexpected { .. }));
	assert_eq!(err.fragment, "of");
}

#[rstest]
#[case("card", None, "card", 0)]
#[case("card()", None, "card", 0)]
#[case("card(title, 'x')", None, "card", 2)]
#[case("ui::button(label = 'Go')", Some("ui"), "button", 1)]
#[case("layouts/base::footer", Some("layouts/base"), "footer", 0)]
#[case("user-card", None, "user-card", 0)]
fn test_call_signatures(
	#[case] source: &str,
	#[case] namespace: Option<&str>,
	#[case] name: &str,
	#[case] arity: usize,
) {
	let sig = parse_call_signature(source).unwrap();
	assert_eq!(sig.namespace.as_deref(), namespace);
	assert_eq!(sig.name, name);
	assert_eq!(sig.arguments.len(), arity);
}

// ============================================================================
// Category 4: Error reporting
// ============================================================================

#[rstest]
#[case("(a + b", ParseErrorKind::Unmatched('('), 0)]
#[case("a + b)", ParseErrorKind::Unmatched(')'), 5)]
#[case("items[0", ParseErrorKind::Unmatched('['), 5)]
#[case("f(a, b", ParseErrorKind::Unmatched('('), 1)]
#[case("'abc", ParseErrorKind::UnterminatedString, 0)]
#[case("a === b", ParseErrorKind::UnknownOperator("===".into()), 2)]
#[case("a & b", ParseErrorKind::UnknownOperator("&".into()), 2)]
#[case("", ParseErrorKind::Empty, 0)]
#[case("a b", ParseErrorKind::TrailingInput, 2)]
fn test_error_kinds_and_offsets(
	#[case] source: &str,
	#[case] kind: ParseErrorKind,
	#[case] offset: usize,
) {
	let err = parse(source).unwrap_err();
	assert_eq!(err.kind, kind);
	assert_eq!(err.offset, offset);
}

#[rstest]
fn test_offsets_count_characters_not_bytes() {
	let err = parse("'日本' + 'x").unwrap_err();
	assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
	assert_eq!(err.offset, 7);
	assert_eq!(err.fragment, "'x");
}

#[rstest]
fn test_error_display_mentions_fragment() {
	let err = parse("a <> b").unwrap_err();
	let message = err.to_string();
	assert!(message.contains("unknown operator"));
	assert!(message.contains("<>"));
}

// ============================================================================
// Category 5: Properties
// ============================================================================

proptest! {
	#[test]
	fn prop_display_reparses_to_same_tree(a in 0i64..1000, b in 0i64..1000, name in "[a-z][a-z0-9_]{0,6}") {
		let source = format!("{name}.x + {a} * ({b} - {name}[{a}]) > 3 ? 'y' : null");
		if let Ok(expr) = parse(&source) {
			let reparsed = parse(&expr.to_string()).unwrap();
			prop_assert_eq!(expr, reparsed);
		}
	}

	#[test]
	fn prop_parser_never_panics(source in "\\PC{0,40}") {
		let _ = parse(&source);
	}
}
