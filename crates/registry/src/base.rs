//! Read and mutate contracts shared by all registry types.

use crate::error::RegistryError;
use crate::key::RegistryKey;

/// A registered value that can be invoked to produce instances.
///
/// Blanket-implemented for closures and function pointers taking a single
/// argument; multi-argument construction passes a tuple. Definition structs
/// implement the trait directly when construction needs more than a call.
pub trait Template<A> {
	/// The constructed instance type.
	type Instance;

	/// Invokes the template with the given arguments.
	fn construct(&self, args: A) -> Self::Instance;
}

impl<A, T, F> Template<A> for F
where
	F: Fn(A) -> T,
{
	type Instance = T;

	fn construct(&self, args: A) -> T {
		self(args)
	}
}

/// Values and instances that can be stamped with the key they were
/// registered or requested under.
///
/// The entry-point registry uses this to brand loaded templates with their
/// declared names, and instances with the key they were requested under.
pub trait Branded {
	/// Records `key` on the value.
	fn set_brand(&mut self, key: &str);
}

/// Read contract shared by all registries.
///
/// `get_template` and `keys` are the primitives; everything else has a
/// default in terms of them. Implementations override the defaults where
/// direct storage access is cheaper, or to change policy: a wrapper that
/// overrides [`get_template`](Registry::get_template) to substitute a
/// fallback value replaces the missing-key policy for every derived
/// operation.
pub trait Registry {
	/// Readable key type.
	type Key: RegistryKey;
	/// Registered template type.
	type Value;

	/// Returns the template registered under `key`.
	///
	/// Resolves `key` through [`gen_lookup_key`](Registry::gen_lookup_key)
	/// and fails with [`RegistryError::NotFound`] when nothing is
	/// registered there.
	fn get_template(&self, key: &Self::Key) -> Result<&Self::Value, RegistryError>;

	/// Returns the registered readable keys in registry-defined order.
	///
	/// The sequence is freshly computed from current storage on every call.
	fn keys(&self) -> Vec<&Self::Key>;

	/// Derives the lookup key that indexes internal storage.
	///
	/// The default is identity. A registry configured with a lookup
	/// function may map several readable keys onto one lookup key to
	/// support aliases.
	fn gen_lookup_key(&self, key: &Self::Key) -> Self::Key {
		key.clone()
	}

	/// Whether `key` resolves to a registered template.
	///
	/// Goes through [`get_template`](Registry::get_template), so no
	/// instance is ever constructed.
	fn contains(&self, key: &Self::Key) -> bool {
		self.get_template(key).is_ok()
	}

	/// Number of registered templates.
	fn len(&self) -> usize {
		self.keys().len()
	}

	/// Whether the registry holds no templates.
	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns the registered templates, paired with
	/// [`keys`](Registry::keys): same order, same length.
	fn templates(&self) -> Vec<&Self::Value> {
		self.keys()
			.into_iter()
			.filter_map(|key| self.get_template(key).ok())
			.collect()
	}

	/// Creates a fresh instance of the template registered under `key`.
	///
	/// Every call constructs anew; wrap the registry in an
	/// [`InstanceCache`](crate::cache::InstanceCache) to memoize.
	fn get<A>(
		&self,
		key: &Self::Key,
		args: A,
	) -> Result<<Self::Value as Template<A>>::Instance, RegistryError>
	where
		Self::Value: Template<A>,
		Self: Sized,
	{
		let template = self.get_template(key)?;
		Ok(self.create_instance(template, args))
	}

	/// Instantiation hook used by [`get`](Registry::get).
	///
	/// Override to customize construction, e.g. to post-process every
	/// instance a registry hands out.
	fn create_instance<A>(
		&self,
		template: &Self::Value,
		args: A,
	) -> <Self::Value as Template<A>>::Instance
	where
		Self::Value: Template<A>,
		Self: Sized,
	{
		template.construct(args)
	}
}

/// Write contract for registries that support registration.
pub trait MutableRegistry: Registry {
	/// Registers `template` under an explicit readable key.
	///
	/// Fails with [`RegistryError::InvalidKey`] when the key resolves to an
	/// empty lookup key, and with [`RegistryError::DuplicateKey`] when the
	/// registry enforces unique keys and the lookup key is occupied.
	/// Otherwise an occupied key is silently replaced.
	fn register(&mut self, key: Self::Key, template: Self::Value) -> Result<(), RegistryError>;

	/// Removes the registration for `key`, returning the template.
	///
	/// Fails with [`RegistryError::NotFound`] when the resolved lookup key
	/// was never registered.
	fn unregister(&mut self, key: &Self::Key) -> Result<Self::Value, RegistryError>;

	/// Derives the registration key embedded in `template`.
	///
	/// Fails with [`RegistryError::MissingKeyFn`] when the registry was
	/// built without a key function.
	fn derive_key(&self, template: &Self::Value) -> Result<Self::Key, RegistryError>;

	/// Registers `template` under the key derived from the value itself.
	///
	/// Returns the derived key.
	fn register_keyed(&mut self, template: Self::Value) -> Result<Self::Key, RegistryError> {
		let key = self.derive_key(&template)?;
		self.register(key.clone(), template)?;
		Ok(key)
	}
}
