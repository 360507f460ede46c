//! Scoped, reversible registry overrides.

use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;

use crate::base::{MutableRegistry, Registry};
use crate::error::RegistryError;
use crate::key::RegistryKey;

/// A reversible batch of registry overrides.
///
/// Entries are applied with [`apply`](RegistryPatcher::apply), which
/// snapshots whatever each patched key held before and returns a
/// [`PatchGuard`] undoing the batch when dropped, on every exit path
/// including unwinding. The guard dereferences to the patched registry,
/// and nested patchers borrow through the outer guard, so patch scopes can
/// only unwind innermost-first.
///
/// Typical use is test isolation: swap a template for a double, run the
/// scope, drop the guard.
pub struct RegistryPatcher<K: RegistryKey, V> {
	/// `None` marks ensure-absent intent.
	entries: IndexMap<K, Option<V>>,
}

impl<K: RegistryKey, V> RegistryPatcher<K, V> {
	/// Creates an empty patch batch.
	pub fn new() -> Self {
		Self {
			entries: IndexMap::new(),
		}
	}

	/// Derives a batch from bare templates, keyed through `registry`'s key
	/// function.
	pub fn with_values<R>(
		registry: &R,
		values: impl IntoIterator<Item = V>,
	) -> Result<Self, RegistryError>
	where
		R: MutableRegistry<Key = K, Value = V>,
	{
		Self::new().and_values(registry, values)
	}

	/// Adds bare templates, keyed through `registry`'s key function.
	///
	/// Later entries override earlier ones sharing a key.
	pub fn and_values<R>(
		mut self,
		registry: &R,
		values: impl IntoIterator<Item = V>,
	) -> Result<Self, RegistryError>
	where
		R: MutableRegistry<Key = K, Value = V>,
	{
		for value in values {
			let key = registry.derive_key(&value)?;
			self.entries.insert(key, Some(value));
		}
		Ok(self)
	}

	/// Registers `value` under `key` for the duration of the patch.
	pub fn set(mut self, key: K, value: V) -> Self {
		self.entries.insert(key, Some(value));
		self
	}

	/// Ensures `key` is absent for the duration of the patch.
	pub fn remove(mut self, key: K) -> Self {
		self.entries.insert(key, None);
		self
	}

	/// Applies the batch to `registry`.
	///
	/// Every patched key is cleared first and then re-registered, so the
	/// batch also applies cleanly to unique registries. Keys resolving to
	/// empty lookup keys are rejected before anything is mutated.
	pub fn apply<'r, R>(&self, registry: &'r mut R) -> Result<PatchGuard<'r, R>, RegistryError>
	where
		R: MutableRegistry<Key = K, Value = V>,
		V: Clone,
	{
		for key in self.entries.keys() {
			let lookup = registry.gen_lookup_key(key);
			if lookup.is_empty_key() {
				return Err(RegistryError::invalid_key::<V>(&lookup));
			}
		}

		let mut saved = IndexMap::with_capacity(self.entries.len());
		for key in self.entries.keys() {
			saved.insert(key.clone(), registry.get_template(key).ok().cloned());
		}

		tracing::debug!(keys = self.entries.len(), "applying registry patch");
		for (key, patch) in &self.entries {
			ensure_absent(registry, key);
			if let Some(value) = patch {
				registry.register(key.clone(), value.clone())?;
			}
		}

		Ok(PatchGuard { registry, saved })
	}
}

impl<K: RegistryKey, V> Default for RegistryPatcher<K, V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<K: RegistryKey, V> fmt::Debug for RegistryPatcher<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RegistryPatcher")
			.field("entries", &self.entries.len())
			.finish()
	}
}

/// Removes `key` if present; absence is the goal, not an error.
fn ensure_absent<R: MutableRegistry>(registry: &mut R, key: &R::Key) {
	match registry.unregister(key) {
		Ok(_) => {}
		Err(err) if err.is_not_found() => {}
		Err(err) => tracing::error!(%err, "failed to clear patched key"),
	}
}

/// Guard restoring a patched registry when dropped.
pub struct PatchGuard<'r, R>
where
	R: MutableRegistry,
	R::Value: Clone,
{
	registry: &'r mut R,
	saved: IndexMap<R::Key, Option<R::Value>>,
}

impl<R> PatchGuard<'_, R>
where
	R: MutableRegistry,
	R::Value: Clone,
{
	/// Restores the registry now rather than at end of scope.
	pub fn restore(self) {}
}

impl<R> fmt::Debug for PatchGuard<'_, R>
where
	R: MutableRegistry,
	R::Value: Clone,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PatchGuard")
			.field("saved", &self.saved.len())
			.finish()
	}
}

impl<R> Deref for PatchGuard<'_, R>
where
	R: MutableRegistry,
	R::Value: Clone,
{
	type Target = R;

	fn deref(&self) -> &R {
		self.registry
	}
}

impl<R> DerefMut for PatchGuard<'_, R>
where
	R: MutableRegistry,
	R::Value: Clone,
{
	fn deref_mut(&mut self) -> &mut R {
		self.registry
	}
}

impl<R> Drop for PatchGuard<'_, R>
where
	R: MutableRegistry,
	R::Value: Clone,
{
	fn drop(&mut self) {
		let saved = mem::take(&mut self.saved);
		tracing::debug!(keys = saved.len(), "restoring registry patch");
		for (key, previous) in saved {
			ensure_absent(self.registry, &key);
			if let Some(value) = previous {
				// Clear-then-set cannot conflict; a failure here means the
				// registry itself changed shape mid-restore.
				if let Err(err) = self.registry.register(key, value) {
					tracing::error!(%err, "failed to restore patched key");
				}
			}
		}
	}
}
