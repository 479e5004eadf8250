//! Artifact execution
//!
//! Walks the instruction tree of a [`CompiledArtifact`] against a
//! [`RenderContext`], producing markup. Per-render state (locals, switch
//! selections) lives in an [`Executor`] that is dropped after the render, so
//! a single artifact can be executed concurrently from many threads.
//!
//! Missing data is never an error: unresolved paths, unknown functions and
//! unknown methods evaluate to null. Only failures signaled by host objects
//! or host functions abort the render.

use crate::artifact::{CompiledArtifact, EmitMode, Instr};
use crate::context::RenderContext;
use crate::error::{HostError, RuntimeError};
use crate::escape::{escape_html, escape_html_attr};
use crate::value::{Value, ValueMap};
use std::cmp::Ordering;
use stencil_expr::{BinaryOp, Binding, Expr, Iteration, Literal, Segment, UnaryOp, VariablePath};

/// Executes `artifact` against `ctx` and returns the rendered markup.
///
/// # Examples
///
/// ```
/// use stencil_templates::{Engine, EngineConfig, MemoryLoader, RenderContext, execute};
///
/// let loader = MemoryLoader::new().with("hello", "<p>Hello {name}!</p>");
/// let engine = Engine::with_loader(EngineConfig::default(), loader);
/// let artifact = engine.compile("hello").unwrap();
///
/// let mut ctx = RenderContext::new();
/// ctx.insert("name", "<World>");
/// assert_eq!(execute(&artifact, &ctx).unwrap(), "<p>Hello &lt;World&gt;!</p>");
/// ```
pub fn execute(artifact: &CompiledArtifact, ctx: &RenderContext) -> Result<String, RuntimeError> {
	tracing::trace!(template = %artifact.name, "executing artifact");
	let mut executor = Executor::new(ctx);
	let mut out = String::new();
	executor.run(&artifact.instructions, &mut out)?;
	Ok(out)
}

/// Per-render interpreter state.
struct Executor<'c> {
	ctx: &'c RenderContext,
	/// Local bindings, innermost last
	locals: Vec<(String, Value)>,
	/// Case selected by each enclosing switch (`None`: no case matched)
	switches: Vec<Option<usize>>,
}

impl<'c> Executor<'c> {
	fn new(ctx: &'c RenderContext) -> Self {
		Self {
			ctx,
			locals: Vec::new(),
			switches: Vec::new(),
		}
	}

	fn run(&mut self, instrs: &[Instr], out: &mut String) -> Result<(), RuntimeError> {
		for instr in instrs {
			self.step(instr, out)?;
		}
		Ok(())
	}

	fn step(&mut self, instr: &Instr, out: &mut String) -> Result<(), RuntimeError> {
		match instr {
			Instr::Text(text) => out.push_str(text),
			Instr::Emit { expr, mode } => {
				let text = self.eval(expr)?.to_output_string();
				match mode {
					EmitMode::Html => out.push_str(&escape_html(&text)),
					EmitMode::Attribute => out.push_str(&escape_html_attr(&text)),
					EmitMode::Raw => out.push_str(&text),
				}
			}
			Instr::EmitJoined { expr, separator } => {
				let items: Vec<String> = self
					.eval(expr)?
					.iteration_items()
					.into_iter()
					.map(|(_, item)| escape_html(&item.to_output_string()).into_owned())
					.collect();
				out.push_str(&items.join(separator));
			}
			Instr::If {
				condition,
				negate,
				body,
			} => {
				if self.eval(condition)?.is_truthy() != *negate {
					self.run(body, out)?;
				}
			}
			Instr::Guard {
				function,
				argument,
				body,
			} => {
				if let Some(guard) = self.ctx.function(function) {
					let argument = self.eval(argument)?;
					let allowed = guard(&[argument]).map_err(host_error("guard", function))?;
					if allowed.is_truthy() {
						self.run(body, out)?;
					}
				}
			}
			Instr::Switch {
				subject,
				cases,
				body,
			} => {
				let subject = self.eval(subject)?;
				let mut selected = None;
				for (index, case) in cases.iter().enumerate() {
					if self.eval(case)?.loose_eq(&subject) {
						selected = Some(index);
						break;
					}
				}
				self.switches.push(selected);
				let result = self.run(body, out);
				self.switches.pop();
				result?;
			}
			Instr::Case { index, body } => {
				if self.switches.last() == Some(&Some(*index)) {
					self.run(body, out)?;
				}
			}
			Instr::Default { body } => {
				if self.switches.last() == Some(&None) {
					self.run(body, out)?;
				}
			}
			Instr::With { bindings, body } => {
				let mark = self.locals.len();
				for binding in bindings {
					let value = self.eval(&binding.value)?;
					self.locals.push((binding.name.clone(), value));
				}
				let result = self.run(body, out);
				self.locals.truncate(mark);
				result?;
			}
			Instr::Scope { bindings, body } => {
				let values = self.eval_bindings(bindings)?;
				let mark = self.locals.len();
				self.locals.extend(values);
				let result = self.run(body, out);
				self.locals.truncate(mark);
				result?;
			}
			Instr::Repeat { iteration, body } => self.repeat(iteration, body, out)?,
			Instr::Attribute {
				name,
				value,
				boolean,
			} => {
				let value = self.eval(value)?;
				if value.is_null() || matches!(value, Value::Bool(false)) {
					return Ok(());
				}
				if *boolean {
					if value.is_truthy() {
						out.push(' ');
						out.push_str(name);
					}
				} else {
					out.push_str(&format!(
						" {}=\"{}\"",
						name,
						escape_html_attr(&value.to_output_string())
					));
				}
			}
			Instr::ClassAttribute { base, value } => {
				let mut classes = Vec::new();
				let base = self.render_to_string(base)?;
				if !base.trim().is_empty() {
					classes.push(base.trim().to_string());
				}
				classes.extend(
					class_names(&self.eval(value)?)
						.into_iter()
						.map(|name| escape_html_attr(&name).into_owned()),
				);
				if !classes.is_empty() {
					out.push_str(&format!(" class=\"{}\"", classes.join(" ")));
				}
			}
			Instr::StyleAttribute { base, value } => {
				let mut rules = Vec::new();
				let base = self.render_to_string(base)?;
				let base = base.trim().trim_end_matches(';').trim_end();
				if !base.is_empty() {
					rules.push(base.to_string());
				}
				rules.extend(
					style_rules(&self.eval(value)?)
						.into_iter()
						.map(|rule| escape_html_attr(&rule).into_owned()),
				);
				if !rules.is_empty() {
					out.push_str(&format!(" style=\"{}\"", rules.join("; ")));
				}
			}
		}
		Ok(())
	}

	fn repeat(
		&mut self,
		iteration: &Iteration,
		body: &[Instr],
		out: &mut String,
	) -> Result<(), RuntimeError> {
		let items = self.eval(&iteration.collection)?.iteration_items();
		let size = items.len();
		let mark = self.locals.len();
		for (index, (key, item)) in items.into_iter().enumerate() {
			let mut status = ValueMap::new();
			status.insert("index".into(), Value::from(index));
			status.insert("count".into(), Value::from(index + 1));
			status.insert("size".into(), Value::from(size));
			status.insert("first".into(), Value::Bool(index == 0));
			status.insert("last".into(), Value::Bool(index + 1 == size));

			self.locals.push(("loop".to_string(), Value::Map(status)));
			if let Some(name) = &iteration.key {
				self.locals.push((name.clone(), key));
			}
			self.locals.push((iteration.item.clone(), item));
			let result = self.run(body, out);
			self.locals.truncate(mark);
			result?;
		}
		Ok(())
	}

	fn render_to_string(&mut self, instrs: &[Instr]) -> Result<String, RuntimeError> {
		let mut buffer = String::new();
		self.run(instrs, &mut buffer)?;
		Ok(buffer)
	}

	/// Evaluates all bindings in the current scope before any is visible.
	fn eval_bindings(&self, bindings: &[Binding]) -> Result<Vec<(String, Value)>, RuntimeError> {
		bindings
			.iter()
			.map(|binding| Ok((binding.name.clone(), self.eval(&binding.value)?)))
			.collect()
	}

	fn lookup(&self, name: &str) -> Value {
		self.locals
			.iter()
			.rev()
			.find(|(local, _)| local == name)
			.map(|(_, value)| value.clone())
			.or_else(|| self.ctx.get(name).cloned())
			.unwrap_or_default()
	}

	fn eval(&self, expr: &Expr) -> Result<Value, RuntimeError> {
		match expr {
			Expr::Literal(literal) => Ok(literal_value(literal)),
			Expr::Path(path) => self.resolve_path(&path.root, &path.segments),
			Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
			Expr::Unary { op, operand } => {
				let value = self.eval(operand)?;
				Ok(match op {
					UnaryOp::Not => Value::Bool(!value.is_truthy()),
					UnaryOp::Neg => match value {
						Value::Int(i) => i.checked_neg().map_or(Value::Float(-(i as f64)), Value::Int),
						Value::Float(f) => Value::Float(-f),
						_ => Value::Null,
					},
				})
			}
			Expr::Ternary {
				condition,
				then_branch,
				else_branch,
			} => {
				if self.eval(condition)?.is_truthy() {
					self.eval(then_branch)
				} else {
					self.eval(else_branch)
				}
			}
			Expr::Call { target, args } => {
				let args = args
					.iter()
					.map(|arg| self.eval(arg))
					.collect::<Result<Vec<_>, _>>()?;
				self.eval_call(target, args)
			}
			Expr::Member { object, segment } => {
				let object = self.eval(object)?;
				self.access(&object, segment)
			}
		}
	}

	fn resolve_path(&self, root: &str, segments: &[Segment]) -> Result<Value, RuntimeError> {
		let mut value = self.lookup(root);
		for segment in segments {
			value = self.access(&value, segment)?;
		}
		Ok(value)
	}

	fn access(&self, value: &Value, segment: &Segment) -> Result<Value, RuntimeError> {
		match segment {
			Segment::Field(name) => value
				.field(name)
				.map_err(host_error(value.type_name(), name)),
			Segment::Index(key) => {
				let key = self.eval(key)?;
				value
					.index(&key)
					.map_err(host_error(value.type_name(), &key.to_output_string()))
			}
		}
	}

	fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, RuntimeError> {
		let left = self.eval(left)?;
		match op {
			BinaryOp::And => {
				return Ok(Value::Bool(left.is_truthy() && self.eval(right)?.is_truthy()));
			}
			BinaryOp::Or => {
				return Ok(Value::Bool(left.is_truthy() || self.eval(right)?.is_truthy()));
			}
			_ => {}
		}
		let right = self.eval(right)?;
		Ok(match op {
			BinaryOp::Eq => Value::Bool(left.loose_eq(&right)),
			BinaryOp::Ne => Value::Bool(!left.loose_eq(&right)),
			BinaryOp::Lt => Value::Bool(left.compare(&right) == Some(Ordering::Less)),
			BinaryOp::Le => Value::Bool(matches!(
				left.compare(&right),
				Some(Ordering::Less | Ordering::Equal)
			)),
			BinaryOp::Gt => Value::Bool(left.compare(&right) == Some(Ordering::Greater)),
			BinaryOp::Ge => Value::Bool(matches!(
				left.compare(&right),
				Some(Ordering::Greater | Ordering::Equal)
			)),
			_ => arithmetic(op, &left, &right),
		})
	}

	fn eval_call(&self, target: &Expr, args: Vec<Value>) -> Result<Value, RuntimeError> {
		match target {
			Expr::Path(VariablePath { root, segments }) => match segments.split_last() {
				None => self.call_function(root, args),
				Some((Segment::Field(method), receiver)) => {
					let receiver = self.resolve_path(root, receiver)?;
					self.call_method(receiver, method, args)
				}
				Some((Segment::Index(_), _)) => Ok(Value::Null),
			},
			Expr::Member {
				object,
				segment: Segment::Field(method),
			} => {
				let receiver = self.eval(object)?;
				self.call_method(receiver, method, args)
			}
			_ => Ok(Value::Null),
		}
	}

	fn call_function(&self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
		if let Some(function) = self.ctx.function(name) {
			return function(&args).map_err(host_error("function", name));
		}
		Ok(builtin(name, &args).unwrap_or_default())
	}

	fn call_method(
		&self,
		receiver: Value,
		method: &str,
		args: Vec<Value>,
	) -> Result<Value, RuntimeError> {
		if let Value::Object(object) = &receiver
			&& let Some(value) = object
				.call_method(method, &args)
				.map_err(host_error(object.type_name(), method))?
		{
			return Ok(value);
		}
		let mut full = Vec::with_capacity(args.len() + 1);
		full.push(receiver);
		full.extend(args);
		Ok(builtin(method, &full).unwrap_or_default())
	}
}

fn host_error<'a>(target: &'a str, member: &'a str) -> impl FnOnce(HostError) -> RuntimeError + 'a {
	move |source| RuntimeError::Host {
		target: target.to_string(),
		member: member.to_string(),
		source,
	}
}

fn literal_value(literal: &Literal) -> Value {
	match literal {
		Literal::Null => Value::Null,
		Literal::Bool(b) => Value::Bool(*b),
		Literal::Int(i) => Value::Int(*i),
		Literal::Float(f) => Value::Float(*f),
		Literal::Str(s) => Value::String(s.clone()),
	}
}

/// `+ - * / %`. `+` concatenates when either side is not a number; the
/// other operators yield null for non-numbers and division by zero.
fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Value {
	if !(left.is_numeric() && right.is_numeric()) {
		return match op {
			BinaryOp::Add => Value::String(left.to_output_string() + &right.to_output_string()),
			_ => Value::Null,
		};
	}
	if let (Value::Int(a), Value::Int(b)) = (left, right) {
		let exact = match op {
			BinaryOp::Add => a.checked_add(*b),
			BinaryOp::Sub => a.checked_sub(*b),
			BinaryOp::Mul => a.checked_mul(*b),
			BinaryOp::Div if *b == 0 => return Value::Null,
			BinaryOp::Div => (a.checked_rem(*b) == Some(0)).then(|| a / b),
			BinaryOp::Rem if *b == 0 => return Value::Null,
			BinaryOp::Rem => a.checked_rem(*b),
			_ => None,
		};
		if let Some(result) = exact {
			return Value::Int(result);
		}
	}
	let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
		return Value::Null;
	};
	match op {
		BinaryOp::Add => Value::Float(a + b),
		BinaryOp::Sub => Value::Float(a - b),
		BinaryOp::Mul => Value::Float(a * b),
		BinaryOp::Div if b == 0.0 => Value::Null,
		BinaryOp::Div => Value::Float(a / b),
		BinaryOp::Rem if b == 0.0 => Value::Null,
		BinaryOp::Rem => Value::Float(a % b),
		_ => Value::Null,
	}
}

/// Built-in functions, also callable as methods with the receiver first.
///
/// Returns `None` for unknown names.
fn builtin(name: &str, args: &[Value]) -> Option<Value> {
	let first = args.first().cloned().unwrap_or_default();
	let text = || first.to_output_string();
	Some(match name {
		"length" => Value::from(first.length()),
		"upper" => Value::String(text().to_uppercase()),
		"lower" => Value::String(text().to_lowercase()),
		"trim" => Value::String(text().trim().to_string()),
		"string" => Value::String(text()),
		"join" => {
			let separator = args
				.get(1)
				.map_or_else(|| ", ".to_string(), Value::to_output_string);
			let items: Vec<String> = first
				.iteration_items()
				.into_iter()
				.map(|(_, item)| item.to_output_string())
				.collect();
			Value::String(items.join(&separator))
		}
		"default" => {
			if first.is_empty() {
				args.get(1).cloned().unwrap_or_default()
			} else {
				first
			}
		}
		"empty" => Value::Bool(first.is_empty()),
		"contains" => {
			let needle = args.get(1).cloned().unwrap_or_default();
			Value::Bool(match &first {
				Value::String(s) => s.contains(&needle.to_output_string()),
				Value::Map(map) => map.contains_key(&needle.to_output_string()),
				Value::Null => false,
				other => other
					.iteration_items()
					.iter()
					.any(|(_, item)| item.loose_eq(&needle)),
			})
		}
		"keys" => Value::Seq(
			first
				.iteration_items()
				.into_iter()
				.map(|(key, _)| key)
				.collect(),
		),
		"values" => Value::Seq(
			first
				.iteration_items()
				.into_iter()
				.map(|(_, item)| item)
				.collect(),
		),
		_ => return None,
	})
}

fn class_names(value: &Value) -> Vec<String> {
	match value {
		Value::Null | Value::Bool(false) => Vec::new(),
		Value::Seq(items) => items
			.iter()
			.map(Value::to_output_string)
			.filter(|name| !name.trim().is_empty())
			.collect(),
		Value::Map(map) => map
			.iter()
			.filter(|(_, enabled)| enabled.is_truthy())
			.map(|(name, _)| name.clone())
			.collect(),
		other => {
			let text = other.to_output_string();
			if text.trim().is_empty() {
				Vec::new()
			} else {
				vec![text.trim().to_string()]
			}
		}
	}
}

fn style_rules(value: &Value) -> Vec<String> {
	match value {
		Value::Null | Value::Bool(false) => Vec::new(),
		Value::Map(map) => map
			.iter()
			.filter(|(_, rule)| !rule.is_empty())
			.map(|(property, rule)| format!("{}: {}", property, rule.to_output_string()))
			.collect(),
		other => {
			let text = other.to_output_string();
			let text = text.trim().trim_end_matches(';').trim_end();
			if text.is_empty() {
				Vec::new()
			} else {
				vec![text.to_string()]
			}
		}
	}
}
