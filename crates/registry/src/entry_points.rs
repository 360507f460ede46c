//! Read-only registries populated from plugin entry points.
//!
//! Downstream crates declare loadable templates as [`EntryPointDef`]
//! statics collected through the link-time inventory; an
//! [`EntryPointRegistry`] lazily gathers the declarations of one group
//! into an ordered cache. A custom [`EntryPointSource`] stands in for the
//! inventory where declarations come from somewhere else (tests, dynamic
//! plugin hosts).

use std::cell::OnceCell;
use std::fmt;
use std::marker::PhantomData;

use indexmap::IndexMap;

use crate::base::{Branded, Registry, Template};
use crate::error::RegistryError;

/// A plugin declaration collected through the process-wide inventory.
///
/// ```ignore
/// inventory::collect!(EntryPointDef<WidgetTemplate>);
///
/// inventory::submit! {
/// 	EntryPointDef::new("widgets", "round", load_round)
/// }
/// ```
pub struct EntryPointDef<V: 'static> {
	/// Group the declaration belongs to.
	pub group: &'static str,
	/// Declared name, used as the registry key.
	pub name: &'static str,
	/// Zero-argument loader returning the template.
	pub load: fn() -> V,
}

impl<V> EntryPointDef<V> {
	/// Creates an entry-point declaration.
	pub const fn new(group: &'static str, name: &'static str, load: fn() -> V) -> Self {
		Self { group, name, load }
	}
}

/// A named entry yielded by an [`EntryPointSource`].
pub struct EntryPoint<V: 'static> {
	/// Declared name.
	pub name: String,
	/// Loads the declared template.
	pub load: Box<dyn Fn() -> V>,
}

/// Source of plugin declarations for an [`EntryPointRegistry`].
pub trait EntryPointSource<V: 'static> {
	/// Yields the entries declared under `group`, in declaration order.
	fn entries(&self, group: &str) -> Vec<EntryPoint<V>>;
}

/// [`EntryPointSource`] backed by the link-time inventory.
pub struct InventorySource<V: 'static> {
	_marker: PhantomData<fn() -> V>,
}

impl<V> InventorySource<V> {
	/// Creates the inventory-backed source.
	pub const fn new() -> Self {
		Self {
			_marker: PhantomData,
		}
	}
}

impl<V> Default for InventorySource<V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<V> EntryPointSource<V> for InventorySource<V>
where
	EntryPointDef<V>: inventory::Collect,
{
	fn entries(&self, group: &str) -> Vec<EntryPoint<V>> {
		inventory::iter::<EntryPointDef<V>>
			.into_iter()
			.filter(|def| def.group == group)
			.map(|def| EntryPoint {
				name: def.name.to_owned(),
				load: Box::new(def.load),
			})
			.collect()
	}
}

/// Read-only registry lazily populated from an entry-point source.
///
/// The backing cache is built on first access and kept until
/// [`refresh`](EntryPointRegistry::refresh). Lookup keys are the declared
/// entry names.
///
/// Not `Sync`; share across threads behind an external lock if needed.
pub struct EntryPointRegistry<V: 'static, S = InventorySource<V>> {
	group: String,
	source: S,
	brander: Option<fn(&mut V, &str)>,
	cache: OnceCell<IndexMap<String, V>>,
}

impl<V> EntryPointRegistry<V>
where
	EntryPointDef<V>: inventory::Collect,
{
	/// Creates a registry over the inventory-declared entries in `group`.
	pub fn new(group: impl Into<String>) -> Self {
		Self::with_source(group, InventorySource::new())
	}

	/// Creates a branding registry over the inventory-declared entries in
	/// `group`: every loaded template is stamped with its declared name.
	///
	/// The cache is warmed immediately so stamping is not deferred.
	pub fn branded(group: impl Into<String>) -> Self
	where
		V: Branded,
	{
		let registry = Self::with_source(group, InventorySource::new()).with_brander(brand_template::<V>);
		registry.ensure_cache();
		registry
	}
}

fn brand_template<V: Branded>(template: &mut V, name: &str) {
	template.set_brand(name);
}

impl<V, S: EntryPointSource<V>> EntryPointRegistry<V, S> {
	/// Creates a registry over `group` backed by a custom source.
	pub fn with_source(group: impl Into<String>, source: S) -> Self {
		Self {
			group: group.into(),
			source,
			brander: None,
			cache: OnceCell::new(),
		}
	}

	/// Stamps every loaded template with its declared name via `brander`.
	///
	/// For template types that implement [`Branded`], prefer
	/// [`branded`](EntryPointRegistry::branded); this hook covers types
	/// that cannot (function pointers, foreign types).
	pub fn with_brander(mut self, brander: fn(&mut V, &str)) -> Self {
		self.brander = Some(brander);
		self
	}

	/// Entry-point group this registry loads from.
	pub fn group(&self) -> &str {
		&self.group
	}

	/// Discards the cache; the next access reloads from the source.
	///
	/// Useful where the set of declared plugins changes after process
	/// start.
	pub fn refresh(&mut self) {
		tracing::debug!(group = %self.group, "entry-point cache invalidated");
		self.cache = OnceCell::new();
	}

	/// Creates an instance for `key` and stamps it with that key.
	///
	/// Unlike load-time template branding, this always succeeds in marking
	/// the result: even when the backing template could not be stamped,
	/// the instance carries the key it was requested under.
	pub fn get_branded<A>(
		&self,
		key: &str,
		args: A,
	) -> Result<<V as Template<A>>::Instance, RegistryError>
	where
		V: Template<A>,
		<V as Template<A>>::Instance: Branded,
	{
		let template = self
			.ensure_cache()
			.get(key)
			.ok_or_else(|| RegistryError::not_found(&key))?;
		let mut instance = template.construct(args);
		instance.set_brand(key);
		Ok(instance)
	}

	fn ensure_cache(&self) -> &IndexMap<String, V> {
		self.cache.get_or_init(|| {
			let mut loaded = IndexMap::new();
			for entry in self.source.entries(&self.group) {
				let mut template = (entry.load)();
				if let Some(brander) = self.brander {
					brander(&mut template, &entry.name);
				}
				loaded.insert(entry.name, template);
			}
			tracing::debug!(group = %self.group, count = loaded.len(), "entry points loaded");
			loaded
		})
	}
}

impl<V, S: EntryPointSource<V>> Registry for EntryPointRegistry<V, S> {
	type Key = String;
	type Value = V;

	fn get_template(&self, key: &String) -> Result<&V, RegistryError> {
		self.ensure_cache()
			.get(key)
			.ok_or_else(|| RegistryError::not_found(key))
	}

	fn keys(&self) -> Vec<&String> {
		self.ensure_cache().keys().collect()
	}

	fn len(&self) -> usize {
		self.ensure_cache().len()
	}
}

impl<V, S: EntryPointSource<V>> fmt::Debug for EntryPointRegistry<V, S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EntryPointRegistry")
			.field("group", &self.group)
			.field("loaded", &self.cache.get().map(IndexMap::len))
			.finish()
	}
}
