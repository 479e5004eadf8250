//! Shared name tables consulted by the compiler
//!
//! The registry maps namespaced fragments and components to the templates
//! that declare them, and holds the set of guard directive names. It is
//! owned by the engine and passed to every compile session.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Fragment, component and guard tables.
///
/// # Examples
///
/// ```
/// use stencil_templates::Registry;
///
/// let registry = Registry::new();
/// registry.register_component("alert", "widgets/alert");
/// registry.register_guard("auth");
///
/// assert_eq!(registry.component_template("alert").as_deref(), Some("widgets/alert"));
/// assert!(registry.is_guard("auth"));
/// assert!(!registry.is_guard("admin"));
/// ```
#[derive(Debug, Default)]
pub struct Registry {
	/// `ns::name` -> declaring template
	fragments: RwLock<HashMap<String, String>>,
	/// component name -> template
	components: RwLock<HashMap<String, String>>,
	guards: RwLock<HashSet<String>>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records the namespaced fragments declared by `template`.
	///
	/// Entries previously registered for `template` are replaced, so a
	/// recompiled template that dropped a declaration no longer resolves it.
	pub fn register_fragments(&self, template: &str, qualified_names: &[String]) {
		let mut fragments = self.fragments.write();
		fragments.retain(|_, declaring| declaring != template);
		for name in qualified_names {
			fragments.insert(name.clone(), template.to_string());
		}
	}

	/// Template declaring the namespaced fragment `qualified_name`.
	pub fn fragment_template(&self, qualified_name: &str) -> Option<String> {
		self.fragments.read().get(qualified_name).cloned()
	}

	/// Registered qualified fragment names, sorted.
	pub fn fragment_names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.fragments.read().keys().cloned().collect();
		names.sort();
		names
	}

	/// Maps a component name to the template implementing it.
	pub fn register_component(&self, name: impl Into<String>, template: impl Into<String>) {
		self.components.write().insert(name.into(), template.into());
	}

	pub fn component_template(&self, name: &str) -> Option<String> {
		self.components.read().get(name).cloned()
	}

	/// Registers a guard directive name.
	///
	/// A guard `th:<name>="expr"` renders its element only when the context
	/// function `<name>` returns a truthy value for `expr`. Names of built-in
	/// directives always keep their built-in meaning.
	pub fn register_guard(&self, name: impl Into<String>) {
		self.guards.write().insert(name.into().to_ascii_lowercase());
	}

	pub fn is_guard(&self, name: &str) -> bool {
		self.guards.read().contains(name)
	}

	/// Forgets namespaced fragments; components and guards are kept.
	pub fn clear_fragments(&self) {
		self.fragments.write().clear();
	}
}
