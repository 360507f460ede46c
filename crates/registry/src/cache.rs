//! Per-key instance memoization over a read registry.

use rustc_hash::FxHashMap;

use crate::base::{Registry, Template};
use crate::error::RegistryError;
use crate::key::LookupFn;

type InstanceOf<R, A> = <<R as Registry>::Value as Template<A>>::Instance;

/// Wraps a registry, caching one constructed instance per cache key.
///
/// Instance lifetime is decoupled from the template registry: several
/// caches can wrap the same registry and be dropped independently, and
/// templates registered after the cache was created remain reachable
/// through it. The template arguments given at construction are cloned
/// into every instantiation the cache performs.
///
/// Cache-key granularity is independently tunable: by default the cache
/// key is the wrapped registry's lookup key, but
/// [`with_instance_key_fn`](InstanceCache::with_instance_key_fn) can split
/// or merge cache entries without affecting template resolution.
pub struct InstanceCache<'a, R, A>
where
	R: Registry,
	R::Value: Template<A>,
	A: Clone,
{
	registry: &'a R,
	args: A,
	instances: FxHashMap<R::Key, InstanceOf<R, A>>,
	/// Class key to the cache keys filed under it, for iteration ordering.
	key_map: FxHashMap<R::Key, Vec<R::Key>>,
	instance_key_fn: Option<LookupFn<R::Key>>,
	class_key_fn: Option<LookupFn<R::Key>>,
}

impl<'a, R, A> InstanceCache<'a, R, A>
where
	R: Registry,
	R::Value: Template<A>,
	A: Clone,
{
	/// Wraps `registry`, applying `args` to every instantiation.
	pub fn new(registry: &'a R, args: A) -> Self {
		Self {
			registry,
			args,
			instances: FxHashMap::default(),
			key_map: FxHashMap::default(),
			instance_key_fn: None,
			class_key_fn: None,
		}
	}

	/// Overrides the cache-key computation. Defaults to the class key.
	pub fn with_instance_key_fn(mut self, instance_key_fn: LookupFn<R::Key>) -> Self {
		self.instance_key_fn = Some(instance_key_fn);
		self
	}

	/// Overrides the key used to resolve templates in the wrapped registry.
	/// Defaults to the registry's own lookup key.
	pub fn with_class_key_fn(mut self, class_key_fn: LookupFn<R::Key>) -> Self {
		self.class_key_fn = Some(class_key_fn);
		self
	}

	fn instance_key(&self, key: &R::Key) -> R::Key {
		match self.instance_key_fn {
			Some(instance_key_fn) => instance_key_fn(key),
			None => self.class_key(key),
		}
	}

	fn class_key(&self, key: &R::Key) -> R::Key {
		match self.class_key_fn {
			Some(class_key_fn) => class_key_fn(key),
			None => self.registry.gen_lookup_key(key),
		}
	}

	/// Returns the instance cached for `key`, constructing it on first
	/// access.
	pub fn get(&mut self, key: &R::Key) -> Result<&InstanceOf<R, A>, RegistryError> {
		let instance_key = self.instance_key(key);
		if !self.instances.contains_key(&instance_key) {
			let class_key = self.class_key(key);
			let instance = self.registry.get(&class_key, self.args.clone())?;
			self.key_map
				.entry(class_key)
				.or_default()
				.push(instance_key.clone());
			self.instances.insert(instance_key.clone(), instance);
			tracing::trace!(key = ?instance_key, "instance cached");
		}
		Ok(&self.instances[&instance_key])
	}

	/// Constructs an instance for every key currently registered.
	///
	/// Has no effect for templates registered afterward.
	pub fn warm_cache(&mut self) -> Result<(), RegistryError> {
		let keys: Vec<R::Key> = self.registry.keys().into_iter().cloned().collect();
		for key in keys {
			self.get(&key)?;
		}
		Ok(())
	}

	/// Number of cached instances.
	///
	/// Registered keys that have not been accessed are not counted.
	pub fn len(&self) -> usize {
		self.instances.len()
	}

	/// Whether no instance has been cached yet.
	pub fn is_empty(&self) -> bool {
		self.instances.is_empty()
	}

	/// Iterates cached instances in the wrapped registry's current key
	/// order, regardless of access order. Keys that have not been accessed
	/// are skipped.
	pub fn iter(&self) -> impl Iterator<Item = &InstanceOf<R, A>> {
		self.registry.keys().into_iter().flat_map(move |key| {
			let class_key = self.class_key(key);
			self.key_map
				.get(&class_key)
				.into_iter()
				.flatten()
				.filter_map(move |cache_key| self.instances.get(cache_key))
		})
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;
	use crate::base::MutableRegistry;
	use crate::registry::TemplateRegistry;

	static SERIAL: AtomicUsize = AtomicUsize::new(0);

	#[derive(Debug)]
	struct Handle {
		kind: &'static str,
		serial: usize,
		greeting: String,
	}

	fn make(kind: &'static str) -> fn(String) -> Handle {
		match kind {
			"sparrow" => |greeting| Handle {
				kind: "sparrow",
				serial: SERIAL.fetch_add(1, Ordering::Relaxed),
				greeting,
			},
			_ => |greeting| Handle {
				kind: "finch",
				serial: SERIAL.fetch_add(1, Ordering::Relaxed),
				greeting,
			},
		}
	}

	fn fixture() -> TemplateRegistry<&'static str, fn(String) -> Handle> {
		let mut registry = TemplateRegistry::new();
		registry.register("sparrow", make("sparrow")).unwrap();
		registry.register("finch", make("finch")).unwrap();
		registry
	}

	#[test]
	fn repeated_access_returns_the_cached_instance() {
		let registry = fixture();
		let mut cache = InstanceCache::new(&registry, String::from("hello"));
		let first_serial = cache.get(&"sparrow").unwrap().serial;
		let second_serial = cache.get(&"sparrow").unwrap().serial;
		assert_eq!(first_serial, second_serial);
		// The registry itself still constructs fresh instances.
		let fresh = registry.get(&"sparrow", String::from("hello")).unwrap();
		assert_ne!(fresh.serial, first_serial);
	}

	#[test]
	fn template_args_reach_every_instantiation() {
		let registry = fixture();
		let mut cache = InstanceCache::new(&registry, String::from("bonjour"));
		assert_eq!(cache.get(&"finch").unwrap().greeting, "bonjour");
	}

	#[test]
	fn len_counts_accessed_entries_only() {
		let registry = fixture();
		let mut cache = InstanceCache::new(&registry, String::new());
		assert!(cache.is_empty());
		cache.get(&"finch").unwrap();
		assert_eq!(cache.len(), 1);
		assert_eq!(registry.len(), 2);
	}

	#[test]
	fn missing_keys_surface_the_registry_error() {
		let registry = fixture();
		let mut cache = InstanceCache::new(&registry, String::new());
		assert!(cache.get(&"owl").unwrap_err().is_not_found());
	}

	#[test]
	fn iteration_follows_registry_order_not_access_order() {
		let registry = fixture();
		let mut cache = InstanceCache::new(&registry, String::new());
		cache.get(&"finch").unwrap();
		cache.get(&"sparrow").unwrap();
		let kinds: Vec<&'static str> = cache.iter().map(|handle| handle.kind).collect();
		assert_eq!(kinds, vec!["sparrow", "finch"]);
	}

	#[test]
	fn unaccessed_keys_are_skipped_in_iteration() {
		let registry = fixture();
		let mut cache = InstanceCache::new(&registry, String::new());
		cache.get(&"finch").unwrap();
		let kinds: Vec<&'static str> = cache.iter().map(|handle| handle.kind).collect();
		assert_eq!(kinds, vec!["finch"]);
	}

	#[test]
	fn warm_cache_covers_current_registrations_only() {
		let mut registry = fixture();
		{
			let mut cache = InstanceCache::new(&registry, String::new());
			cache.warm_cache().unwrap();
			assert_eq!(cache.len(), 2);
		}
		registry.register("owl", make("owl")).unwrap();
		let mut cache = InstanceCache::new(&registry, String::new());
		cache.warm_cache().unwrap();
		assert_eq!(cache.len(), 3);
	}

	#[test]
	fn instance_key_granularity_is_independent() {
		// All keys share one cache slot while template resolution still
		// sees the original key.
		let registry = fixture();
		let mut cache = InstanceCache::new(&registry, String::new()).with_instance_key_fn(|_| "shared");
		let first_serial = cache.get(&"sparrow").unwrap().serial;
		let cached = cache.get(&"finch").unwrap();
		assert_eq!(cached.serial, first_serial);
		assert_eq!(cached.kind, "sparrow");
		assert_eq!(cache.len(), 1);
	}
}
