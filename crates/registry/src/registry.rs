//! Ordered mutable registry, the default production implementation.

use std::any::type_name;
use std::fmt;
use std::ops::Index;

use indexmap::IndexMap;

use crate::base::{MutableRegistry, Registry};
use crate::error::RegistryError;
use crate::key::{KeyFn, LookupFn, RegistryKey};

/// Ordered mutable registry mapping keys to templates.
///
/// Iteration follows readable-key insertion order. Storage is indexed by
/// lookup keys, derived from readable keys through an optional lookup
/// function, so several readable keys can alias one registration.
///
/// By default a second registration under an occupied lookup key replaces
/// the first; [`unique`](TemplateRegistry::unique) switches the registry to
/// rejecting the conflict instead.
pub struct TemplateRegistry<K: RegistryKey, V> {
	key_fn: Option<KeyFn<K, V>>,
	lookup_fn: Option<LookupFn<K>>,
	unique: bool,
	/// Lookup key to template.
	templates: IndexMap<K, V>,
	/// Readable key to lookup key, in registration order.
	lookup_keys: IndexMap<K, K>,
}

impl<K: RegistryKey, V> TemplateRegistry<K, V> {
	/// Creates an empty registry with replace-on-conflict semantics.
	pub fn new() -> Self {
		Self {
			key_fn: None,
			lookup_fn: None,
			unique: false,
			templates: IndexMap::new(),
			lookup_keys: IndexMap::new(),
		}
	}

	/// Rejects registration under an occupied key instead of replacing.
	pub fn unique(mut self) -> Self {
		self.unique = true;
		self
	}

	/// Derives registration keys from template values, enabling
	/// [`register_keyed`](MutableRegistry::register_keyed) and
	/// [`register_auto`](TemplateRegistry::register_auto).
	pub fn with_key_fn(mut self, key_fn: KeyFn<K, V>) -> Self {
		self.key_fn = Some(key_fn);
		self
	}

	/// Maps readable keys onto lookup keys, e.g. to fold legacy aliases
	/// onto their canonical key.
	pub fn with_lookup_fn(mut self, lookup_fn: LookupFn<K>) -> Self {
		self.lookup_fn = Some(lookup_fn);
		self
	}

	/// Whether duplicate registration is rejected.
	pub fn is_unique(&self) -> bool {
		self.unique
	}

	pub(crate) fn has_key_fn(&self) -> bool {
		self.key_fn.is_some()
	}

	fn insert(&mut self, readable: K, template: V) -> Result<(), RegistryError> {
		let lookup = self.gen_lookup_key(&readable);
		if lookup.is_empty_key() {
			return Err(RegistryError::invalid_key::<V>(&lookup));
		}
		if self.templates.contains_key(&lookup) {
			if self.unique {
				return Err(RegistryError::duplicate_key::<V>(&lookup));
			}
			tracing::debug!(key = ?lookup, template = type_name::<V>(), "replacing registration");
			// The replaced registration may have been made under a different
			// readable key; its mapping must not outlive the registration.
			self.lookup_keys
				.retain(|existing, mapped| *mapped != lookup || *existing == readable);
		}
		self.templates.insert(lookup.clone(), template);
		self.lookup_keys.insert(readable, lookup);
		Ok(())
	}
}

impl<K: RegistryKey, V> Default for TemplateRegistry<K, V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<K: RegistryKey, V> Registry for TemplateRegistry<K, V> {
	type Key = K;
	type Value = V;

	fn get_template(&self, key: &K) -> Result<&V, RegistryError> {
		let lookup = self.gen_lookup_key(key);
		self.templates
			.get(&lookup)
			.ok_or_else(|| RegistryError::not_found(&lookup))
	}

	fn keys(&self) -> Vec<&K> {
		self.lookup_keys.keys().collect()
	}

	fn gen_lookup_key(&self, key: &K) -> K {
		match self.lookup_fn {
			Some(lookup_fn) => lookup_fn(key),
			None => key.clone(),
		}
	}

	fn len(&self) -> usize {
		self.templates.len()
	}

	fn templates(&self) -> Vec<&V> {
		self.lookup_keys
			.values()
			.filter_map(|lookup| self.templates.get(lookup))
			.collect()
	}
}

impl<K: RegistryKey, V> MutableRegistry for TemplateRegistry<K, V> {
	fn register(&mut self, key: K, template: V) -> Result<(), RegistryError> {
		tracing::trace!(key = ?key, template = type_name::<V>(), "register");
		self.insert(key, template)
	}

	fn unregister(&mut self, key: &K) -> Result<V, RegistryError> {
		let lookup = self.gen_lookup_key(key);
		let Some(template) = self.templates.shift_remove(&lookup) else {
			return Err(RegistryError::not_found(&lookup));
		};
		tracing::trace!(key = ?lookup, "unregister");
		self.lookup_keys.retain(|_, mapped| *mapped != lookup);
		Ok(template)
	}

	fn derive_key(&self, template: &V) -> Result<K, RegistryError> {
		match self.key_fn {
			Some(key_fn) => Ok(key_fn(template)),
			None => Err(RegistryError::missing_key_fn(type_name::<Self>())),
		}
	}
}

impl<K: RegistryKey, V> fmt::Debug for TemplateRegistry<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TemplateRegistry")
			.field("key_fn", &self.key_fn.is_some())
			.field("unique", &self.unique)
			.field("len", &self.templates.len())
			.finish()
	}
}

impl<K: RegistryKey, V> Index<&K> for TemplateRegistry<K, V> {
	type Output = V;

	/// Panics when `key` is not registered. Use
	/// [`get_template`](Registry::get_template) for a fallible lookup.
	fn index(&self, key: &K) -> &V {
		match self.get_template(key) {
			Ok(template) => template,
			Err(err) => panic!("{err}"),
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[derive(Debug, Clone, PartialEq, Eq)]
	struct Widget {
		kind: &'static str,
	}

	fn spawn(kind: &'static str) -> fn(()) -> Widget {
		match kind {
			"sparrow" => |()| Widget { kind: "sparrow" },
			"finch" => |()| Widget { kind: "finch" },
			_ => |()| Widget { kind: "owl" },
		}
	}

	fn fixture() -> TemplateRegistry<&'static str, fn(()) -> Widget> {
		let mut registry = TemplateRegistry::new();
		registry.register("sparrow", spawn("sparrow")).unwrap();
		registry.register("finch", spawn("finch")).unwrap();
		registry
	}

	#[test]
	fn keys_and_templates_follow_insertion_order() {
		let registry = fixture();
		assert_eq!(registry.keys(), vec![&"sparrow", &"finch"]);
		assert_eq!(registry.templates().len(), 2);
		let kinds: Vec<&'static str> = registry
			.templates()
			.into_iter()
			.map(|template| template(()).kind)
			.collect();
		assert_eq!(kinds, vec!["sparrow", "finch"]);
	}

	#[test]
	fn get_constructs_a_fresh_instance_per_call() {
		let registry = fixture();
		let first = registry.get(&"sparrow", ()).unwrap();
		let second = registry.get(&"sparrow", ()).unwrap();
		assert_eq!(first, second);
		assert_eq!(first.kind, "sparrow");
	}

	#[test]
	fn get_template_is_idempotent() {
		let registry = fixture();
		let first = registry.get_template(&"finch").unwrap();
		let second = registry.get_template(&"finch").unwrap();
		assert!(std::ptr::eq(first, second));
	}

	#[test]
	fn missing_key_is_the_distinguished_error() {
		let registry = fixture();
		let err = registry.get_template(&"owl").unwrap_err();
		assert!(err.is_not_found());
		assert!(registry.get(&"owl", ()).unwrap_err().is_not_found());
	}

	#[test]
	fn contains_never_constructs() {
		let mut registry: TemplateRegistry<&str, fn(()) -> Widget> = TemplateRegistry::new();
		registry
			.register("volatile", |()| panic!("constructed during containment check"))
			.unwrap();
		assert!(registry.contains(&"volatile"));
		assert!(!registry.contains(&"missing"));
	}

	#[test]
	fn unregister_round_trips() {
		let mut registry = fixture();
		let before = registry.len();
		registry.register("owl", spawn("owl")).unwrap();
		let removed = registry.unregister(&"owl").unwrap();
		assert_eq!(removed(()).kind, "owl");
		assert_eq!(registry.len(), before);
		assert_eq!(registry.keys(), vec![&"sparrow", &"finch"]);
	}

	#[test]
	fn unregister_unknown_key_fails() {
		let mut registry = fixture();
		assert!(registry.unregister(&"owl").unwrap_err().is_not_found());
	}

	#[test]
	fn replacement_is_silent_by_default() {
		let mut registry = fixture();
		registry.register("sparrow", spawn("owl")).unwrap();
		assert_eq!(registry.len(), 2);
		assert_eq!(registry.get(&"sparrow", ()).unwrap().kind, "owl");
	}

	#[test]
	fn unique_rejects_and_keeps_the_original() {
		let mut registry = TemplateRegistry::new().unique();
		registry.register("sparrow", spawn("sparrow")).unwrap();
		let err = registry.register("sparrow", spawn("owl")).unwrap_err();
		assert!(matches!(err, RegistryError::DuplicateKey { .. }));
		assert_eq!(registry.get(&"sparrow", ()).unwrap().kind, "sparrow");
	}

	#[test]
	fn empty_key_is_rejected_eagerly() {
		let mut registry: TemplateRegistry<&str, fn(()) -> Widget> = TemplateRegistry::new();
		let err = registry.register("", spawn("owl")).unwrap_err();
		assert!(matches!(err, RegistryError::InvalidKey { .. }));
		assert!(registry.is_empty());
	}

	#[test]
	fn register_keyed_requires_a_key_fn() {
		let mut bare: TemplateRegistry<&str, fn(()) -> Widget> = TemplateRegistry::new();
		let err = bare.register_keyed(spawn("owl")).unwrap_err();
		assert!(matches!(err, RegistryError::MissingKeyFn { .. }));

		let mut keyed: TemplateRegistry<&str, fn(()) -> Widget> =
			TemplateRegistry::new().with_key_fn(|template| template(()).kind);
		let key = keyed.register_keyed(spawn("finch")).unwrap();
		assert_eq!(key, "finch");
		assert!(keyed.contains(&"finch"));
	}

	#[test]
	fn aliases_resolve_to_one_registration() {
		// "flying" is a legacy alias for "bird".
		let mut registry: TemplateRegistry<&str, fn(()) -> Widget> =
			TemplateRegistry::new().with_lookup_fn(|key| if *key == "flying" { "bird" } else { *key });
		registry.register("bird", spawn("sparrow")).unwrap();

		assert!(registry.contains(&"bird"));
		assert!(registry.contains(&"flying"));
		assert!(std::ptr::eq(
			registry.get_template(&"bird").unwrap(),
			registry.get_template(&"flying").unwrap(),
		));
		// Only the key used at registration time is listed.
		assert_eq!(registry.keys(), vec![&"bird"]);
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn alias_unregistration_clears_the_mapping() {
		let mut registry: TemplateRegistry<&str, fn(()) -> Widget> =
			TemplateRegistry::new().with_lookup_fn(|key| if *key == "flying" { "bird" } else { *key });
		registry.register("bird", spawn("sparrow")).unwrap();
		registry.unregister(&"flying").unwrap();
		assert!(registry.is_empty());
		assert!(registry.keys().is_empty());
	}

	#[test]
	fn replacement_discards_the_stale_readable_key() {
		// Both readable keys resolve to the lookup key "bird"; the second
		// registration owns it afterward.
		let mut registry: TemplateRegistry<&str, fn(()) -> Widget> =
			TemplateRegistry::new().with_lookup_fn(|key| if *key == "flying" { "bird" } else { *key });
		registry.register("flying", spawn("sparrow")).unwrap();
		registry.register("bird", spawn("owl")).unwrap();
		assert_eq!(registry.keys(), vec![&"bird"]);
		assert_eq!(registry.len(), 1);
		assert_eq!(registry.get(&"flying", ()).unwrap().kind, "owl");
	}

	#[test]
	fn index_panics_on_missing_key() {
		let registry = fixture();
		let template = &registry[&"sparrow"];
		assert_eq!(template(()).kind, "sparrow");
		let result = std::panic::catch_unwind(|| {
			let _ = &registry[&"owl"];
		});
		assert!(result.is_err());
	}

	#[test]
	fn debug_exposes_configuration() {
		let registry: TemplateRegistry<&str, fn(()) -> Widget> =
			TemplateRegistry::new().unique().with_key_fn(|template| template(()).kind);
		let rendered = format!("{registry:?}");
		assert!(rendered.contains("unique: true"));
		assert!(rendered.contains("key_fn: true"));
	}

	/// A wrapper that swaps the missing-key policy for a fallback template.
	struct WithFallback {
		inner: TemplateRegistry<&'static str, fn(()) -> Widget>,
		fallback: fn(()) -> Widget,
	}

	impl Registry for WithFallback {
		type Key = &'static str;
		type Value = fn(()) -> Widget;

		fn get_template(&self, key: &&'static str) -> Result<&Self::Value, RegistryError> {
			match self.inner.get_template(key) {
				Ok(template) => Ok(template),
				Err(err) if err.is_not_found() => Ok(&self.fallback),
				Err(err) => Err(err),
			}
		}

		fn keys(&self) -> Vec<&&'static str> {
			self.inner.keys()
		}
	}

	#[test]
	fn missing_key_policy_is_overridable() {
		let registry = WithFallback {
			inner: fixture(),
			fallback: spawn("owl"),
		};
		assert_eq!(registry.get(&"sparrow", ()).unwrap().kind, "sparrow");
		assert_eq!(registry.get(&"anything", ()).unwrap().kind, "owl");
		assert!(registry.contains(&"anything"));
	}
}
