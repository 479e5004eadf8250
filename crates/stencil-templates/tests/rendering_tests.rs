//! Rendering integration tests
//!
//! Test Categories:
//! 1. Interpolation and escaping
//! 2. Conditionals and selection
//! 3. Iteration and locals
//! 4. Attributes
//! 5. Forms
//! 6. Verbatim regions
//! 7. Compile errors
//! 8. Properties

use proptest::prelude::*;
use rstest::{fixture, rstest};
use serde_json::json;
use stencil_expr::ParseErrorKind;
use stencil_templates::scanner::{self, ScanOptions};
use stencil_templates::{
	CompileError, Engine, EngineConfig, HostError, HostObject, MemoryLoader, RenderContext,
	RuntimeError, TemplateError, Value,
};

#[fixture]
fn engine() -> Engine {
	Engine::with_loader(EngineConfig::default(), MemoryLoader::new())
}

fn render(engine: &Engine, source: &str, ctx: serde_json::Value) -> String {
	engine
		.render_source("inline", source, &RenderContext::from_json(ctx))
		.unwrap()
}

fn compile_error(engine: &Engine, source: &str) -> CompileError {
	match engine.compile_source("inline", source).unwrap_err() {
		TemplateError::Compile(error) => error,
		other => panic!("expected a compile error, got {other:?}"),
	}
}

// ============================================================================
// Category 1: Interpolation and escaping
// ============================================================================

#[rstest]
#[case::active(true, "<p>Hi &lt;b&gt;Al&lt;/b&gt;</p>")]
#[case::inactive(false, "")]
fn test_conditional_greeting(engine: Engine, #[case] active: bool, #[case] expected: &str) {
	let html = render(
		&engine,
		"<p th:if=\"user.active\">Hi {user.name}</p>",
		json!({"user": {"active": active, "name": "<b>Al</b>"}}),
	);
	assert_eq!(html, expected);
}

#[rstest]
fn test_text_escapes_and_raw_does_not(engine: Engine) {
	let html = render(
		&engine,
		"<p th:text=\"snippet\">x</p><div th:raw=\"snippet\">y</div>",
		json!({"snippet": "<i>a & b</i>"}),
	);
	assert_eq!(
		html,
		"<p>&lt;i&gt;a &amp; b&lt;/i&gt;</p><div><i>a & b</i></div>"
	);
}

#[rstest]
fn test_missing_values_render_empty(engine: Engine) {
	assert_eq!(render(&engine, "<p>[{nope.deeper}]</p>", json!({})), "<p>[]</p>");
}

#[rstest]
fn test_builtins_and_arithmetic(engine: Engine) {
	let html = render(
		&engine,
		"{upper(name)} {items.length()} {total / 4} {7 / 2} {nick.default('anon')}",
		json!({"name": "al", "items": [1, 2, 3], "total": 8, "nick": ""}),
	);
	assert_eq!(html, "AL 3 2 3.5 anon");
}

#[rstest]
fn test_context_function_and_host_object(engine: Engine) {
	struct Account;

	impl HostObject for Account {
		fn get_property(&self, name: &str) -> Result<Value, HostError> {
			Ok(match name {
				"owner" => Value::from("Ada"),
				_ => Value::Null,
			})
		}
	}

	let mut ctx = RenderContext::new();
	ctx.insert("account", Value::object(Account));
	ctx.register_function("shout", |args| {
		Ok(Value::from(format!("{}!", args[0].to_output_string())))
	});

	let html = engine
		.render_source("inline", "<b>{shout(account.owner)}</b>", &ctx)
		.unwrap();
	assert_eq!(html, "<b>Ada!</b>");
}

#[rstest]
fn test_failing_host_function_is_a_runtime_error(engine: Engine) {
	let mut ctx = RenderContext::new();
	ctx.register_function("boom", |_| Err(HostError::new("exploded")));

	let error = engine
		.render_source("inline", "<p>{boom()}</p>", &ctx)
		.unwrap_err();
	assert!(matches!(
		error,
		TemplateError::Runtime(RuntimeError::Host { .. })
	));
}

// ============================================================================
// Category 2: Conditionals and selection
// ============================================================================

const SWITCH: &str = "<div th:switch=\"role\"><p th:case=\"'admin'\">A</p><p th:case=\"'user'\">U</p><p th:default=\"\">D</p></div>";

#[rstest]
#[case("admin", "<div><p>A</p></div>")]
#[case("user", "<div><p>U</p></div>")]
#[case("guest", "<div><p>D</p></div>")]
fn test_switch_renders_exactly_one_branch(
	engine: Engine,
	#[case] role: &str,
	#[case] expected: &str,
) {
	assert_eq!(render(&engine, SWITCH, json!({"role": role})), expected);
}

#[rstest]
fn test_switch_without_match_or_default_renders_no_branch(engine: Engine) {
	let html = render(
		&engine,
		"<ul th:switch=\"n\"><li th:case=\"1\">one</li><li th:case=\"2\">two</li></ul>",
		json!({"n": 3}),
	);
	assert_eq!(html, "<ul></ul>");
}

#[rstest]
fn test_unless_and_remove(engine: Engine) {
	let html = render(
		&engine,
		"<p th:unless=\"hidden\">shown</p><div th:remove=\"tag\"><b>kept</b></div><i th:remove=\"all\">gone</i>",
		json!({"hidden": false}),
	);
	assert_eq!(html, "<p>shown</p><b>kept</b>");
}

#[rstest]
fn test_guard_directive_consults_context_function() {
	let engine = Engine::with_loader(EngineConfig::default(), MemoryLoader::new());
	engine.registry().register_guard("can");

	let mut ctx = RenderContext::new();
	ctx.register_function("can", |args| Ok(Value::Bool(args[0] == Value::from("edit"))));

	let html = engine
		.render_source(
			"inline",
			"<a th:can=\"'edit'\">edit</a><a th:can=\"'delete'\">delete</a>",
			&ctx,
		)
		.unwrap();
	assert_eq!(html, "<a>edit</a>");
}

// ============================================================================
// Category 3: Iteration and locals
// ============================================================================

#[rstest]
fn test_repeat_with_loop_status(engine: Engine) {
	let html = render(
		&engine,
		"<ul><li th:repeat=\"x in xs\" th:class=\"loop.first ? 'first' : ''\">{loop.count}:{x}</li></ul>",
		json!({"xs": ["a", "b"]}),
	);
	assert_eq!(
		html,
		"<ul><li class=\"first\">1:a</li><li>2:b</li></ul>"
	);
}

#[rstest]
fn test_repeat_over_map_binds_key(engine: Engine) {
	let html = render(
		&engine,
		"<dl><th:block th:repeat=\"k, v in pairs\"><dt>{k}</dt><dd>{v}</dd></th:block></dl>",
		json!({"pairs": {"a": 1, "b": 2}}),
	);
	assert_eq!(html, "<dl><dt>a</dt><dd>1</dd><dt>b</dt><dd>2</dd></dl>");
}

#[rstest]
fn test_with_binds_sequentially_and_does_not_leak(engine: Engine) {
	let html = render(
		&engine,
		"<p th:with=\"a = 2, b = a * 3\">{a}-{b}</p><p>[{b}]</p>",
		json!({}),
	);
	assert_eq!(html, "<p>2-6</p><p>[]</p>");
}

#[rstest]
fn test_repeat_over_empty_collection(engine: Engine) {
	let html = render(
		&engine,
		"<ul><li th:repeat=\"x in xs\">{x}</li></ul>",
		json!({"xs": []}),
	);
	assert_eq!(html, "<ul></ul>");
}

// ============================================================================
// Category 4: Attributes
// ============================================================================

#[rstest]
fn test_dynamic_attribute_replaces_static_in_place(engine: Engine) {
	let html = render(
		&engine,
		"<a href=\"#\" th:href=\"url\" title=\"t\">x</a>",
		json!({"url": "/a?b=1&c=2"}),
	);
	assert_eq!(html, "<a href=\"/a?b=1&amp;c=2\" title=\"t\">x</a>");
}

#[rstest]
#[case::bare_site("<a href={url}>x</a>", "<a href=\"x onmouseover=alert(1)\">x</a>")]
#[case::site_in_text("<a href=/u/{url}/edit>x</a>", "<a href=\"/u/x onmouseover=alert(1)/edit\">x</a>")]
fn test_unquoted_attribute_site_cannot_add_attributes(
	engine: Engine,
	#[case] source: &str,
	#[case] expected: &str,
) {
	let html = render(&engine, source, json!({"url": "x onmouseover=alert(1)"}));
	assert_eq!(html, expected);
}

#[rstest]
fn test_unquoted_attribute_site_escapes_quotes(engine: Engine) {
	let html = render(
		&engine,
		"<img alt={label}>",
		json!({"label": "a\" onerror=\"x"}),
	);
	assert_eq!(html, "<img alt=\"a&quot; onerror=&quot;x\">");
}

#[rstest]
#[case::truthy(true, "<input type=\"checkbox\" disabled>")]
#[case::falsy(false, "<input type=\"checkbox\">")]
fn test_boolean_attributes(engine: Engine, #[case] locked: bool, #[case] expected: &str) {
	let html = render(
		&engine,
		"<input type=\"checkbox\" th:disabled=\"locked\">",
		json!({"locked": locked}),
	);
	assert_eq!(html, expected);
}

#[rstest]
fn test_attr_list_and_null_omission(engine: Engine) {
	let html = render(
		&engine,
		"<img th:attr=\"src = pic.url, alt = pic.alt, title = pic.title\">",
		json!({"pic": {"url": "/p.png", "alt": "\"quoted\""}}),
	);
	assert_eq!(html, "<img src=\"/p.png\" alt=\"&quot;quoted&quot;\">");
}

#[rstest]
fn test_class_and_style_merge_with_static_values(engine: Engine) {
	let html = render(
		&engine,
		"<div class=\"card\" th:class=\"flags\" style=\"margin: 0;\" th:style=\"rules\"></div>",
		json!({
			"flags": {"active": true, "muted": false},
			"rules": {"color": "red"}
		}),
	);
	assert_eq!(
		html,
		"<div class=\"card active\" style=\"margin: 0; color: red\"></div>"
	);
}

// ============================================================================
// Category 5: Forms
// ============================================================================

#[rstest]
fn test_form_method_override_and_csrf(engine: Engine) {
	let html = render(
		&engine,
		"<form th:method=\"delete\" th:csrf=\"\"><input th:field=\"user.email\"></form>",
		json!({"csrf_token": "T\"K", "user": {"email": "a@b.c"}}),
	);
	assert_eq!(
		html,
		"<form method=\"post\"><input type=\"hidden\" name=\"_method\" value=\"DELETE\"><input type=\"hidden\" name=\"_csrf_token\" value=\"T&quot;K\"><input name=\"user.email\" id=\"user_email\" value=\"a@b.c\"></form>"
	);
}

#[rstest]
#[case::subscribed(true, "<input type=\"checkbox\" name=\"user.subscribed\" id=\"user_subscribed\" checked>")]
#[case::unsubscribed(false, "<input type=\"checkbox\" name=\"user.subscribed\" id=\"user_subscribed\">")]
fn test_checkbox_field(engine: Engine, #[case] subscribed: bool, #[case] expected: &str) {
	let html = render(
		&engine,
		"<input type=\"checkbox\" th:field=\"user.subscribed\">",
		json!({"user": {"subscribed": subscribed}}),
	);
	assert_eq!(html, expected);
}

#[rstest]
fn test_select_field_marks_matching_option(engine: Engine) {
	let html = render(
		&engine,
		"<select th:field=\"user.country\"><option value=\"fr\">France</option><option value=\"de\">Germany</option></select>",
		json!({"user": {"country": "de"}}),
	);
	assert_eq!(
		html,
		"<select name=\"user.country\" id=\"user_country\"><option value=\"fr\">France</option><option value=\"de\" selected>Germany</option></select>"
	);
}

#[rstest]
fn test_textarea_field_renders_escaped_body(engine: Engine) {
	let html = render(
		&engine,
		"<textarea th:field=\"post.body\">old</textarea>",
		json!({"post": {"body": "1 < 2"}}),
	);
	assert_eq!(
		html,
		"<textarea name=\"post.body\" id=\"post_body\">1 &lt; 2</textarea>"
	);
}

#[rstest]
#[case::with_errors(
	json!({"errors": {"email": ["Required", "<Too short>"]}}),
	"<span class=\"err\">Required<br>&lt;Too short&gt;</span>"
)]
#[case::without_errors(json!({"errors": {}}), "")]
fn test_field_errors(engine: Engine, #[case] ctx: serde_json::Value, #[case] expected: &str) {
	let html = render(
		&engine,
		"<span th:errors=\"email\" class=\"err\"></span>",
		ctx,
	);
	assert_eq!(html, expected);
}

// ============================================================================
// Category 6: Verbatim regions
// ============================================================================

#[rstest]
fn test_verbatim_entities_survive_byte_for_byte(engine: Engine) {
	let source = "<pre>&lt;div class=&quot;x&quot;&gt; &amp; {not.an.expr}</pre>";
	assert_eq!(render(&engine, source, json!({})), source);
}

#[rstest]
fn test_verbatim_decodes_typographic_entities(engine: Engine) {
	assert_eq!(
		render(&engine, "<code>a &mdash; b &lt;c&gt;</code>", json!({})),
		"<code>a \u{2014} b &lt;c&gt;</code>"
	);
}

#[rstest]
fn test_rescanning_reproduces_the_source() {
	let source = "<div th:if=\"a\" class='x'>\n  <p>{b}</p>\n  <pre>{c} &amp;</pre>\n</div>";
	let options = ScanOptions::default();
	let spans = scanner::scan(source, &options).unwrap();
	let rendered = scanner::to_source(&spans);
	assert_eq!(rendered, source);
	assert_eq!(scanner::scan(&rendered, &options).unwrap(), spans);
}

// ============================================================================
// Category 7: Compile errors
// ============================================================================

#[rstest]
#[case::two_control("<li th:if=\"a\" th:repeat=\"x in xs\"></li>")]
#[case::two_bodies("<p th:text=\"a\" th:html=\"b\"></p>")]
#[case::fragment_and_replace("<p th:fragment=\"f()\" th:replace=\"g()\"></p>")]
fn test_incompatible_directives(engine: Engine, #[case] source: &str) {
	assert!(matches!(
		compile_error(&engine, source),
		CompileError::IncompatibleDirectives { .. }
	));
}

#[rstest]
fn test_case_outside_switch(engine: Engine) {
	assert!(matches!(
		compile_error(&engine, "<p th:case=\"1\">x</p>"),
		CompileError::CaseOutsideSwitch { .. }
	));
}

#[rstest]
fn test_expression_error_points_into_template(engine: Engine) {
	let error = compile_error(&engine, "<p>ok</p><p th:if=\"a ==\">x</p>");
	let (template, offset) = error.location().unwrap();
	assert_eq!(template, "inline");
	assert!(offset >= "<p>ok</p><p th:if=\"".len());
}

#[rstest]
fn test_long_operator_chain_is_a_compile_error(engine: Engine) {
	let source = format!("<p>{{{}}}</p>", vec!["1"; 10_000].join("+"));
	match compile_error(&engine, &source) {
		CompileError::Expression { source, .. } => {
			assert!(matches!(source.kind, ParseErrorKind::TooDeep(_)));
		}
		other => panic!("unexpected error: {other:?}"),
	}
	assert_eq!(render(&engine, "<p>{1+1+1+1}</p>", json!({})), "<p>4</p>");
}

#[rstest]
fn test_unclosed_directive_element_is_a_scan_error(engine: Engine) {
	assert!(matches!(
		compile_error(&engine, "<div th:if=\"a\"><p>x</p>"),
		CompileError::Scan { .. }
	));
}

#[rstest]
fn test_unterminated_brace_stays_literal(engine: Engine) {
	assert_eq!(render(&engine, "<p>{name</p>", json!({"name": "x"})), "<p>{name</p>");
}

// ============================================================================
// Category 8: Properties
// ============================================================================

proptest! {
	#[test]
	fn prop_escaped_output_never_contains_markup(text in "\\PC{0,40}") {
		let engine = Engine::with_loader(EngineConfig::default(), MemoryLoader::new());
		let mut ctx = RenderContext::new();
		ctx.insert("text", text.as_str());

		let html = engine
			.render_source("inline", "<p th:text=\"text\"></p><b>{text}</b>", &ctx)
			.unwrap();
		let inner = html
			.strip_prefix("<p>")
			.and_then(|rest| rest.strip_suffix("</b>"))
			.unwrap()
			.replace("</p><b>", "");
		prop_assert!(!inner.contains('<'));
		prop_assert!(!inner.contains('>'));
		prop_assert!(!inner.contains('"'));
	}

	#[test]
	fn prop_plain_text_renders_unchanged(text in "[a-zA-Z0-9 .,;:!?]{0,60}") {
		let engine = Engine::with_loader(EngineConfig::default(), MemoryLoader::new());
		let html = engine
			.render_source("inline", &text, &RenderContext::new())
			.unwrap();
		prop_assert_eq!(html, text);
	}
}
