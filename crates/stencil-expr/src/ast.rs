//! Abstract syntax tree for template expressions.
//!
//! Every node derives `Serialize`/`Deserialize` so that compiled artifacts
//! embedding expressions can be persisted by artifact stores.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value written directly in an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
}

/// One step of a variable path after its root identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
	/// `.name` (also `.0` for numeric keys)
	Field(String),
	/// `[expr]`
	Index(Box<Expr>),
}

impl Segment {
	fn height(&self) -> usize {
		match self {
			Segment::Field(_) => 0,
			Segment::Index(expr) => expr.height(),
		}
	}
}

/// A dot/bracket path rooted at a context variable, e.g. `user.posts[0].title`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariablePath {
	/// The root variable name
	pub root: String,
	/// Accessors applied left to right
	pub segments: Vec<Segment>,
}

impl VariablePath {
	/// Creates a path with no segments.
	pub fn new(root: impl Into<String>) -> Self {
		Self {
			root: root.into(),
			segments: Vec::new(),
		}
	}

	/// Returns `true` when the path only uses `.field` accessors.
	pub fn is_static(&self) -> bool {
		self.segments
			.iter()
			.all(|segment| matches!(segment, Segment::Field(_)))
	}
}

/// Binary operators, grouped by precedence level in the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
	Add,
	Sub,
	Mul,
	Div,
	Rem,
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	And,
	Or,
}

impl BinaryOp {
	/// Source spelling of the operator.
	pub fn symbol(self) -> &'static str {
		match self {
			Self::Add => "+",
			Self::Sub => "-",
			Self::Mul => "*",
			Self::Div => "/",
			Self::Rem => "%",
			Self::Eq => "==",
			Self::Ne => "!=",
			Self::Lt => "<",
			Self::Le => "<=",
			Self::Gt => ">",
			Self::Ge => ">=",
			Self::And => "&&",
			Self::Or => "||",
		}
	}
}

/// Unary prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
	Not,
	Neg,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
	Literal(Literal),
	Path(VariablePath),
	Binary {
		op: BinaryOp,
		left: Box<Expr>,
		right: Box<Expr>,
	},
	Unary {
		op: UnaryOp,
		operand: Box<Expr>,
	},
	Ternary {
		condition: Box<Expr>,
		then_branch: Box<Expr>,
		else_branch: Box<Expr>,
	},
	/// `name(args)` when `target` is a bare path, `x.method(args)` otherwise.
	Call {
		target: Box<Expr>,
		args: Vec<Expr>,
	},
	/// Accessor applied to something that is not a variable, e.g. `f(x).name`.
	Member {
		object: Box<Expr>,
		segment: Segment,
	},
}

impl Expr {
	/// Shorthand for a string literal.
	pub fn string(value: impl Into<String>) -> Self {
		Expr::Literal(Literal::Str(value.into()))
	}

	/// Returns the variable path if this expression is a plain path.
	pub fn as_path(&self) -> Option<&VariablePath> {
		match self {
			Expr::Path(path) => Some(path),
			_ => None,
		}
	}

	/// Number of nodes on the longest path from this node to a leaf.
	pub fn height(&self) -> usize {
		match self {
			Expr::Literal(_) => 1,
			Expr::Path(path) => {
				1 + path
					.segments
					.iter()
					.map(Segment::height)
					.max()
					.unwrap_or(0)
			}
			Expr::Binary { left, right, .. } => 1 + left.height().max(right.height()),
			Expr::Unary { operand, .. } => 1 + operand.height(),
			Expr::Ternary {
				condition,
				then_branch,
				else_branch,
			} => {
				1 + condition
					.height()
					.max(then_branch.height())
					.max(else_branch.height())
			}
			Expr::Call { target, args } => {
				1 + args
					.iter()
					.map(Expr::height)
					.fold(target.height(), usize::max)
			}
			Expr::Member { object, segment } => 1 + object.height().max(segment.height()),
		}
	}

	/// Returns the identifier if this expression is a bare variable (`name`).
	pub fn as_identifier(&self) -> Option<&str> {
		match self {
			Expr::Path(path) if path.segments.is_empty() => Some(&path.root),
			_ => None,
		}
	}
}

/// A `name = expr` pair as used by `with` and `attr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
	pub name: String,
	pub value: Expr,
}

/// `item in collection` or `key, item in collection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
	pub key: Option<String>,
	pub item: String,
	pub collection: Expr,
}

/// An argument of a fragment or component reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
	/// `Some` for `name = value` arguments
	pub name: Option<String>,
	pub value: Expr,
}

/// A reference such as `card`, `card(title)` or `shared::card(title = 'x')`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSignature {
	pub namespace: Option<String>,
	pub name: String,
	pub arguments: Vec<Argument>,
}

impl CallSignature {
	/// The `ns::name` or `name` form of the reference.
	pub fn qualified_name(&self) -> String {
		match &self.namespace {
			Some(ns) => format!("{}::{}", ns, self.name),
			None => self.name.clone(),
		}
	}
}

impl fmt::Display for Literal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Literal::Null => write!(f, "null"),
			Literal::Bool(b) => write!(f, "{}", b),
			Literal::Int(i) => write!(f, "{}", i),
			Literal::Float(x) => write!(f, "{:?}", x),
			Literal::Str(s) => {
				write!(f, "'")?;
				for c in s.chars() {
					match c {
						'\'' => write!(f, "\\'")?,
						'\\' => write!(f, "\\\\")?,
						'\n' => write!(f, "\\n")?,
						'\t' => write!(f, "\\t")?,
						'\r' => write!(f, "\\r")?,
						_ => write!(f, "{}", c)?,
					}
				}
				write!(f, "'")
			}
		}
	}
}

impl fmt::Display for Segment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Segment::Field(name) => write!(f, ".{}", name),
			Segment::Index(expr) => write!(f, "[{}]", expr),
		}
	}
}

impl fmt::Display for VariablePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.root)?;
		for segment in &self.segments {
			write!(f, "{}", segment)?;
		}
		Ok(())
	}
}

impl fmt::Display for Expr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Expr::Literal(lit) => write!(f, "{}", lit),
			Expr::Path(path) => write!(f, "{}", path),
			Expr::Binary { op, left, right } => {
				write!(f, "({} {} {})", left, op.symbol(), right)
			}
			Expr::Unary { op, operand } => match op {
				UnaryOp::Not => write!(f, "!{}", operand),
				UnaryOp::Neg => write!(f, "-{}", operand),
			},
			Expr::Ternary {
				condition,
				then_branch,
				else_branch,
			} => write!(f, "({} ? {} : {})", condition, then_branch, else_branch),
			Expr::Call { target, args } => {
				write!(f, "{}(", target)?;
				for (i, arg) in args.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{}", arg)?;
				}
				write!(f, ")")
			}
			Expr::Member { object, segment } => write!(f, "({}){}", object, segment),
		}
	}
}
