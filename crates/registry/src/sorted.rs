//! Registry with caller-defined iteration order.

use std::cmp::Ordering;
use std::fmt;

use crate::base::{MutableRegistry, Registry};
use crate::error::RegistryError;
use crate::key::RegistryKey;
use crate::registry::TemplateRegistry;

/// Comparator input for a [`SortedRegistry`].
pub struct SortRow<'a, K, V> {
	/// Readable key the template was registered under.
	pub key: &'a K,
	/// The registered template.
	pub template: &'a V,
	/// Lookup key the readable key resolves to.
	pub lookup_key: K,
}

type SortCmp<K, V> = Box<dyn for<'a> Fn(&SortRow<'a, K, V>, &SortRow<'a, K, V>) -> Ordering>;

/// A [`TemplateRegistry`] whose iteration order comes from a comparator
/// instead of insertion order.
///
/// Storage and mutation semantics are untouched; only the iteration path
/// differs. `keys` and `templates` re-sort live storage on every call, so
/// mutation between iterations is immediately visible.
pub struct SortedRegistry<K: RegistryKey + 'static, V: 'static> {
	inner: TemplateRegistry<K, V>,
	cmp: SortCmp<K, V>,
	reverse: bool,
}

impl<K: RegistryKey + 'static, V: 'static> SortedRegistry<K, V> {
	/// Sorts by a value extracted from each template.
	pub fn by_sort_key<S: Ord + 'static>(sort_key: fn(&V) -> S) -> Self {
		Self::by_comparator(move |a, b| sort_key(a.template).cmp(&sort_key(b.template)))
	}

	/// Sorts with a caller-supplied comparator over
	/// ([`SortRow`]) entries.
	///
	/// Ties keep registration order; supply a comparator that fully orders
	/// the key set if tie order matters.
	pub fn by_comparator<F>(cmp: F) -> Self
	where
		F: for<'a> Fn(&SortRow<'a, K, V>, &SortRow<'a, K, V>) -> Ordering + 'static,
	{
		Self {
			inner: TemplateRegistry::new(),
			cmp: Box::new(cmp),
			reverse: false,
		}
	}

	/// Reverses the sort order.
	pub fn reverse(mut self) -> Self {
		self.reverse = true;
		self
	}

	/// See [`TemplateRegistry::unique`].
	pub fn unique(mut self) -> Self {
		self.inner = self.inner.unique();
		self
	}

	/// See [`TemplateRegistry::with_key_fn`].
	pub fn with_key_fn(mut self, key_fn: crate::key::KeyFn<K, V>) -> Self {
		self.inner = self.inner.with_key_fn(key_fn);
		self
	}

	/// See [`TemplateRegistry::with_lookup_fn`].
	pub fn with_lookup_fn(mut self, lookup_fn: crate::key::LookupFn<K>) -> Self {
		self.inner = self.inner.with_lookup_fn(lookup_fn);
		self
	}

	fn sorted_rows(&self) -> Vec<SortRow<'_, K, V>> {
		let mut rows: Vec<SortRow<'_, K, V>> = self
			.inner
			.keys()
			.into_iter()
			.filter_map(|key| {
				let template = self.inner.get_template(key).ok()?;
				Some(SortRow {
					key,
					template,
					lookup_key: self.inner.gen_lookup_key(key),
				})
			})
			.collect();
		if self.reverse {
			rows.sort_by(|a, b| (self.cmp)(b, a));
		} else {
			rows.sort_by(|a, b| (self.cmp)(a, b));
		}
		rows
	}
}

impl<K: RegistryKey + 'static, V: 'static> Registry for SortedRegistry<K, V> {
	type Key = K;
	type Value = V;

	fn get_template(&self, key: &K) -> Result<&V, RegistryError> {
		self.inner.get_template(key)
	}

	fn keys(&self) -> Vec<&K> {
		self.sorted_rows().into_iter().map(|row| row.key).collect()
	}

	fn gen_lookup_key(&self, key: &K) -> K {
		self.inner.gen_lookup_key(key)
	}

	fn len(&self) -> usize {
		self.inner.len()
	}

	fn templates(&self) -> Vec<&V> {
		self.sorted_rows().into_iter().map(|row| row.template).collect()
	}
}

impl<K: RegistryKey + 'static, V: 'static> MutableRegistry for SortedRegistry<K, V> {
	fn register(&mut self, key: K, template: V) -> Result<(), RegistryError> {
		self.inner.register(key, template)
	}

	fn unregister(&mut self, key: &K) -> Result<V, RegistryError> {
		self.inner.unregister(key)
	}

	fn derive_key(&self, template: &V) -> Result<K, RegistryError> {
		self.inner.derive_key(template)
	}
}

impl<K: RegistryKey + 'static, V: 'static> fmt::Debug for SortedRegistry<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SortedRegistry")
			.field("inner", &self.inner)
			.field("reverse", &self.reverse)
			.finish()
	}
}
