//! Render context: the data tree a compiled artifact is executed against.

use crate::error::HostError;
use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A host function callable from template expressions as `name(args)`.
pub type Function = Arc<dyn Fn(&[Value]) -> Result<Value, HostError> + Send + Sync>;

/// Named values and functions visible to a render.
///
/// Built per render call and only read by the runtime.
///
/// # Examples
///
/// ```
/// use stencil_templates::{RenderContext, Value};
///
/// let mut ctx = RenderContext::new();
/// ctx.insert("title", "Home");
/// ctx.register_function("double", |args| {
/// 	Ok(Value::from(args.first().and_then(Value::as_f64).unwrap_or(0.0) * 2.0))
/// });
///
/// assert_eq!(ctx.get("title"), Some(&Value::from("Home")));
/// assert!(ctx.function("double").is_some());
/// ```
#[derive(Clone, Default)]
pub struct RenderContext {
	values: IndexMap<String, Value>,
	functions: HashMap<String, Function>,
}

impl RenderContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a context from the top-level keys of a JSON object.
	///
	/// Non-object JSON values produce an empty context.
	pub fn from_json(json: serde_json::Value) -> Self {
		let mut ctx = Self::new();
		if let serde_json::Value::Object(map) = json {
			for (key, value) in map {
				ctx.values.insert(key, Value::from(value));
			}
		}
		ctx
	}

	/// Inserts or replaces a top-level value.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
		self.values.insert(name.into(), value.into());
		self
	}

	/// Inserts any serializable host value, converted through `serde_json`.
	pub fn insert_serialize<T: Serialize + ?Sized>(
		&mut self,
		name: impl Into<String>,
		value: &T,
	) -> Result<&mut Self, serde_json::Error> {
		let json = serde_json::to_value(value)?;
		self.values.insert(name.into(), Value::from(json));
		Ok(self)
	}

	/// Registers a function. Host functions take precedence over built-ins.
	pub fn register_function<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
	where
		F: Fn(&[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
	{
		self.functions.insert(name.into(), Arc::new(function));
		self
	}

	pub fn get(&self, name: &str) -> Option<&Value> {
		self.values.get(name)
	}

	pub fn function(&self, name: &str) -> Option<&Function> {
		self.functions.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.values.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

impl fmt::Debug for RenderContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut functions: Vec<&String> = self.functions.keys().collect();
		functions.sort();
		f.debug_struct("RenderContext")
			.field("values", &self.values)
			.field("functions", &functions)
			.finish()
	}
}
