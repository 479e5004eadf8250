//! Compiled artifacts: the executable form of a template.
//!
//! An artifact is a block-structured instruction tree plus metadata. It is a
//! pure function of the template source and of the sources it inlined, which
//! are listed with their signatures in [`CompiledArtifact::dependencies`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stencil_expr::{Binding, Expr, Iteration};

/// Version of the serialized artifact layout. Persisted artifacts with a
/// different version are discarded.
pub const FORMAT_VERSION: u32 = 1;

/// Computes the signature of template contents: lowercase hex SHA-256.
///
/// # Examples
///
/// ```
/// use stencil_templates::signature;
///
/// let sig = signature("<p>hi</p>");
/// assert_eq!(sig.len(), 64);
/// assert_eq!(sig, signature("<p>hi</p>"));
/// assert_ne!(sig, signature("<p>hi!</p>"));
/// ```
pub fn signature(contents: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(contents.as_bytes());
	hex::encode(hasher.finalize())
}

/// Escaping applied when an expression is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmitMode {
	/// HTML text escaping
	Html,
	/// Attribute value escaping
	Attribute,
	/// No escaping (`html` / `raw` directives)
	Raw,
}

/// One step of a compiled template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
	/// Literal markup
	Text(String),
	/// Evaluates an expression and writes its string form
	Emit { expr: Expr, mode: EmitMode },
	/// Writes the items of a sequence, each HTML-escaped, joined by a raw separator
	EmitJoined { expr: Expr, separator: String },
	/// Runs `body` when the condition is truthy (falsy with `negate`)
	If {
		condition: Expr,
		negate: bool,
		body: Vec<Instr>,
	},
	/// Runs `body` when the host function `function(argument)` returns truthy
	Guard {
		function: String,
		argument: Expr,
		body: Vec<Instr>,
	},
	/// Selects the first case whose value equals `subject`
	Switch {
		subject: Expr,
		cases: Vec<Expr>,
		body: Vec<Instr>,
	},
	/// Runs `body` when the enclosing switch selected case `index`
	Case { index: usize, body: Vec<Instr> },
	/// Runs `body` when the enclosing switch selected no case
	Default { body: Vec<Instr> },
	/// Binds locals one after another, each seeing the previous ones
	With {
		bindings: Vec<Binding>,
		body: Vec<Instr>,
	},
	/// Binds locals evaluated together in the enclosing scope (fragment and
	/// component arguments)
	Scope {
		bindings: Vec<Binding>,
		body: Vec<Instr>,
	},
	/// Iterates a collection
	Repeat {
		iteration: Iteration,
		body: Vec<Instr>,
	},
	/// Writes ` name="value"`, ` name` for truthy boolean attributes, or
	/// nothing when the value is null/false
	Attribute {
		name: String,
		value: Expr,
		boolean: bool,
	},
	/// Writes ` class="..."` merging static class text with a dynamic value
	ClassAttribute { base: Vec<Instr>, value: Expr },
	/// Writes ` style="..."` merging static style text with a dynamic value
	StyleAttribute { base: Vec<Instr>, value: Expr },
}

/// A template inlined while compiling another one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
	pub name: String,
	pub signature: String,
}

/// A fragment declared by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentSignature {
	/// `name` or `ns::name`
	pub name: String,
	pub params: Vec<String>,
}

/// The executable form of one template at one signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
	pub format_version: u32,
	/// Logical template name
	pub name: String,
	/// Signature of the template contents
	pub signature: String,
	/// Direct parent layout, if the template extends one
	pub layout: Option<String>,
	/// Section names declared by the template, in declaration order
	pub sections: Vec<String>,
	/// Fragments declared by the template
	pub fragments: Vec<FragmentSignature>,
	/// Templates inlined into this artifact
	pub dependencies: Vec<Dependency>,
	pub instructions: Vec<Instr>,
}

impl CompiledArtifact {
	/// Serializes the artifact for an artifact store.
	pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
		serde_json::to_vec(self)
	}

	/// Decodes an artifact written by [`CompiledArtifact::to_bytes`].
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
		serde_json::from_slice(bytes)
	}

	/// Number of instructions, counting nested blocks.
	pub fn instruction_count(&self) -> usize {
		fn count(instrs: &[Instr]) -> usize {
			instrs
				.iter()
				.map(|instr| {
					1 + match instr {
						Instr::If { body, .. }
						| Instr::Guard { body, .. }
						| Instr::Switch { body, .. }
						| Instr::Case { body, .. }
						| Instr::Default { body }
						| Instr::With { body, .. }
						| Instr::Scope { body, .. }
						| Instr::Repeat { body, .. } => count(body),
						Instr::ClassAttribute { base, .. } | Instr::StyleAttribute { base, .. } => {
							count(base)
						}
						_ => 0,
					}
				})
				.sum()
		}
		count(&self.instructions)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn sample() -> CompiledArtifact {
		CompiledArtifact {
			format_version: FORMAT_VERSION,
			name: "page.html".into(),
			signature: signature("x"),
			layout: Some("base".into()),
			sections: vec!["content".into()],
			fragments: vec![],
			dependencies: vec![Dependency {
				name: "base".into(),
				signature: signature("y"),
			}],
			instructions: vec![
				Instr::Text("<p>".into()),
				Instr::If {
					condition: stencil_expr::parse("ok").unwrap(),
					negate: false,
					body: vec![Instr::Emit {
						expr: stencil_expr::parse("name").unwrap(),
						mode: EmitMode::Html,
					}],
				},
			],
		}
	}

	#[rstest]
	fn test_signature_is_lowercase_hex_sha256() {
		assert_eq!(
			signature(""),
			"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
		);
	}

	#[rstest]
	fn test_bytes_round_trip() {
		let artifact = sample();
		let decoded = CompiledArtifact::from_bytes(&artifact.to_bytes().unwrap()).unwrap();
		assert_eq!(decoded, artifact);
	}

	#[rstest]
	fn test_garbage_bytes_fail_to_decode() {
		assert!(CompiledArtifact::from_bytes(b"not json").is_err());
	}

	#[rstest]
	fn test_instruction_count_includes_nested() {
		assert_eq!(sample().instruction_count(), 3);
	}
}
