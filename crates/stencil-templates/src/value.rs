//! Runtime values and the host object capability.
//!
//! [`Value`] is the closed set of data a render context can hold. Host
//! applications expose their own types through [`HostObject`], which is
//! resolved by name to a property or an invocable method.

use crate::error::HostError;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Ordered string-keyed map used for [`Value::Map`].
pub type ValueMap = IndexMap<String, Value>;

/// Capability interface for host-provided objects.
///
/// Lookups that find nothing return `Ok(Value::Null)` / `Ok(None)`; an `Err`
/// is surfaced to the caller of the render as a [`RuntimeError`](crate::RuntimeError).
///
/// # Examples
///
/// ```
/// use stencil_templates::{HostError, HostObject, Value};
///
/// struct User {
/// 	name: String,
/// }
///
/// impl HostObject for User {
/// 	fn type_name(&self) -> &str {
/// 		"User"
/// 	}
///
/// 	fn get_property(&self, name: &str) -> Result<Value, HostError> {
/// 		Ok(match name {
/// 			"name" => Value::from(self.name.as_str()),
/// 			_ => Value::Null,
/// 		})
/// 	}
/// }
///
/// let user = Value::object(User { name: "Ada".into() });
/// assert_eq!(user.to_output_string(), "[User]");
/// ```
pub trait HostObject: Send + Sync {
	/// Name used in diagnostics and the default display.
	fn type_name(&self) -> &str {
		"object"
	}

	/// Resolves a named property.
	fn get_property(&self, name: &str) -> Result<Value, HostError>;

	/// Invokes a named method. `Ok(None)` means the object has no such method.
	fn call_method(&self, _name: &str, _args: &[Value]) -> Result<Option<Value>, HostError> {
		Ok(None)
	}

	/// Items to iterate when the object is used as a repeat collection.
	fn to_sequence(&self) -> Option<Vec<Value>> {
		None
	}

	/// String form used when the object is output.
	fn display(&self) -> String {
		format!("[{}]", self.type_name())
	}
}

/// A value in the render context.
#[derive(Clone, Default)]
pub enum Value {
	#[default]
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Seq(Vec<Value>),
	Map(ValueMap),
	Object(Arc<dyn HostObject>),
}

impl Value {
	/// Wraps a host object.
	pub fn object(object: impl HostObject + 'static) -> Self {
		Value::Object(Arc::new(object))
	}

	/// Short name of the variant, used in diagnostics.
	pub fn type_name(&self) -> &str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Float(_) => "float",
			Value::String(_) => "string",
			Value::Seq(_) => "sequence",
			Value::Map(_) => "map",
			Value::Object(object) => object.type_name(),
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Falsy values: null, false, 0, 0.0, "", empty sequence, empty map.
	///
	/// # Examples
	///
	/// ```
	/// use stencil_templates::Value;
	///
	/// assert!(!Value::Null.is_truthy());
	/// assert!(!Value::from(0).is_truthy());
	/// assert!(!Value::from("").is_truthy());
	/// assert!(!Value::Seq(vec![]).is_truthy());
	/// assert!(Value::from("0").is_truthy());
	/// assert!(Value::from(vec![Value::Null]).is_truthy());
	/// ```
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Null => false,
			Value::Bool(b) => *b,
			Value::Int(i) => *i != 0,
			Value::Float(f) => *f != 0.0,
			Value::String(s) => !s.is_empty(),
			Value::Seq(items) => !items.is_empty(),
			Value::Map(map) => !map.is_empty(),
			Value::Object(_) => true,
		}
	}

	/// `true` for null, the empty string and empty collections.
	pub fn is_empty(&self) -> bool {
		match self {
			Value::Null => true,
			Value::String(s) => s.is_empty(),
			Value::Seq(items) => items.is_empty(),
			Value::Map(map) => map.is_empty(),
			Value::Object(object) => object.to_sequence().is_some_and(|items| items.is_empty()),
			_ => false,
		}
	}

	/// Numeric view of ints and floats.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Int(i) => Some(*i as f64),
			Value::Float(f) => Some(*f),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn is_numeric(&self) -> bool {
		matches!(self, Value::Int(_) | Value::Float(_))
	}

	/// Total conversion to the string written into the output.
	///
	/// # Examples
	///
	/// ```
	/// use stencil_templates::Value;
	///
	/// assert_eq!(Value::Null.to_output_string(), "");
	/// assert_eq!(Value::from(3.0).to_output_string(), "3");
	/// assert_eq!(Value::from(2.5).to_output_string(), "2.5");
	/// assert_eq!(Value::from(vec!["a", "b"]).to_output_string(), "a, b");
	/// ```
	pub fn to_output_string(&self) -> String {
		match self {
			Value::Null => String::new(),
			Value::Bool(b) => b.to_string(),
			Value::Int(i) => i.to_string(),
			Value::Float(f) => format_float(*f),
			Value::String(s) => s.clone(),
			Value::Seq(items) => items
				.iter()
				.map(Value::to_output_string)
				.collect::<Vec<_>>()
				.join(", "),
			Value::Map(map) => {
				let entries: Vec<String> = map
					.iter()
					.map(|(k, v)| format!("{}: {}", k, v.to_output_string()))
					.collect();
				format!("{{{}}}", entries.join(", "))
			}
			Value::Object(object) => object.display(),
		}
	}

	/// Value equality used by `==`, switch/case and form bindings.
	///
	/// Ints and floats compare numerically; host objects compare by identity.
	pub fn loose_eq(&self, other: &Value) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			(a, b) if a.is_numeric() && b.is_numeric() => a.as_f64() == b.as_f64(),
			(Value::String(a), Value::String(b)) => a == b,
			(Value::Seq(a), Value::Seq(b)) => {
				a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
			}
			(Value::Map(a), Value::Map(b)) => {
				a.len() == b.len()
					&& a
						.iter()
						.all(|(k, v)| b.get(k).is_some_and(|other| v.loose_eq(other)))
			}
			(Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}

	/// Ordering used by `<`, `<=`, `>`, `>=`: numbers numerically, strings
	/// lexicographically, anything else is unordered.
	pub fn compare(&self, other: &Value) -> Option<Ordering> {
		match (self, other) {
			(Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
			(a, b) if a.is_numeric() && b.is_numeric() => a.as_f64()?.partial_cmp(&b.as_f64()?),
			(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
			(Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
			_ => None,
		}
	}

	/// Items visited by a repeat over this value, as (key, item) pairs.
	///
	/// Sequences yield their index as key, maps their keys in insertion order,
	/// null yields nothing and any other scalar yields itself once.
	pub fn iteration_items(&self) -> Vec<(Value, Value)> {
		match self {
			Value::Null => Vec::new(),
			Value::Seq(items) => indexed(items.iter().cloned()),
			Value::Map(map) => map
				.iter()
				.map(|(k, v)| (Value::String(k.clone()), v.clone()))
				.collect(),
			Value::Object(object) => match object.to_sequence() {
				Some(items) => indexed(items.into_iter()),
				None => vec![(Value::Int(0), self.clone())],
			},
			other => vec![(Value::Int(0), other.clone())],
		}
	}

	/// Number of elements for collections, characters for strings.
	pub fn length(&self) -> usize {
		match self {
			Value::Null => 0,
			Value::String(s) => s.chars().count(),
			Value::Seq(items) => items.len(),
			Value::Map(map) => map.len(),
			Value::Object(object) => object.to_sequence().map_or(0, |items| items.len()),
			other => other.to_output_string().chars().count(),
		}
	}

	/// Resolves `.name` on this value. Missing members resolve to null.
	pub fn field(&self, name: &str) -> Result<Value, HostError> {
		Ok(match self {
			Value::Map(map) => match map.get(name) {
				Some(value) => value.clone(),
				None if name == "length" || name == "size" => Value::Int(map.len() as i64),
				None => Value::Null,
			},
			Value::Seq(items) => match name.parse::<i64>() {
				Ok(index) => sequence_at(items, index),
				Err(_) if name == "length" || name == "size" => Value::Int(items.len() as i64),
				Err(_) => Value::Null,
			},
			Value::String(s) if name == "length" || name == "size" => {
				Value::Int(s.chars().count() as i64)
			}
			Value::Object(object) => return object.get_property(name),
			_ => Value::Null,
		})
	}

	/// Resolves `[key]` on this value. Missing members resolve to null.
	pub fn index(&self, key: &Value) -> Result<Value, HostError> {
		match (self, key) {
			(Value::Seq(items), Value::Int(index)) => Ok(sequence_at(items, *index)),
			(Value::Map(map), Value::Int(index)) => Ok(map
				.get(&index.to_string())
				.cloned()
				.unwrap_or_default()),
			(Value::String(s), Value::Int(index)) => {
				let chars: Vec<char> = s.chars().collect();
				Ok(resolve_index(chars.len(), *index)
					.map(|i| Value::String(chars[i].to_string()))
					.unwrap_or_default())
			}
			(Value::Object(object), Value::Int(index)) => Ok(object
				.to_sequence()
				.map(|items| sequence_at(&items, *index))
				.unwrap_or_default()),
			(_, Value::String(name)) => self.field(name),
			_ => Ok(Value::Null),
		}
	}
}

fn indexed(items: impl Iterator<Item = Value>) -> Vec<(Value, Value)> {
	items
		.enumerate()
		.map(|(i, item)| (Value::Int(i as i64), item))
		.collect()
}

fn resolve_index(len: usize, index: i64) -> Option<usize> {
	let resolved = if index < 0 {
		len as i64 + index
	} else {
		index
	};
	(0..len as i64).contains(&resolved).then_some(resolved as usize)
}

fn sequence_at(items: &[Value], index: i64) -> Value {
	resolve_index(items.len(), index)
		.map(|i| items[i].clone())
		.unwrap_or_default()
}

/// Formats floats without a trailing `.0` for integral values.
fn format_float(f: f64) -> String {
	if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
		format!("{}", f as i64)
	} else {
		format!("{}", f)
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => write!(f, "Null"),
			Value::Bool(b) => write!(f, "Bool({})", b),
			Value::Int(i) => write!(f, "Int({})", i),
			Value::Float(x) => write!(f, "Float({})", x),
			Value::String(s) => write!(f, "String({:?})", s),
			Value::Seq(items) => f.debug_list().entries(items).finish(),
			Value::Map(map) => f.debug_map().entries(map.iter()).finish(),
			Value::Object(object) => write!(f, "Object({})", object.type_name()),
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		self.loose_eq(other)
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_output_string())
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Value::Int(i)
	}
}

impl From<i32> for Value {
	fn from(i: i32) -> Self {
		Value::Int(i64::from(i))
	}
}

impl From<u32> for Value {
	fn from(i: u32) -> Self {
		Value::Int(i64::from(i))
	}
}

impl From<usize> for Value {
	fn from(i: usize) -> Self {
		i64::try_from(i).map_or(Value::Float(i as f64), Value::Int)
	}
}

impl From<f64> for Value {
	fn from(f: f64) -> Self {
		Value::Float(f)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.to_string())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::String(s)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(items: Vec<T>) -> Self {
		Value::Seq(items.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Value::Null, Into::into)
	}
}

impl From<ValueMap> for Value {
	fn from(map: ValueMap) -> Self {
		Value::Map(map)
	}
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
	fn from(map: BTreeMap<String, T>) -> Self {
		Value::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
	}
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
	fn from(map: HashMap<String, T>) -> Self {
		let mut entries: Vec<(String, Value)> =
			map.into_iter().map(|(k, v)| (k, v.into())).collect();
		entries.sort_by(|a, b| a.0.cmp(&b.0));
		Value::Map(entries.into_iter().collect())
	}
}

impl From<serde_json::Value> for Value {
	fn from(json: serde_json::Value) -> Self {
		match json {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(b),
			serde_json::Value::Number(n) => match n.as_i64() {
				Some(i) => Value::Int(i),
				None => n.as_f64().map_or(Value::Null, Value::Float),
			},
			serde_json::Value::String(s) => Value::String(s),
			serde_json::Value::Array(items) => {
				Value::Seq(items.into_iter().map(Value::from).collect())
			}
			serde_json::Value::Object(map) => {
				Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
			}
		}
	}
}
