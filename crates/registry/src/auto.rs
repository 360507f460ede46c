//! Link-time bulk registration for mutable registries.

use std::any::type_name;

use crate::base::MutableRegistry;
use crate::error::RegistryError;
use crate::key::RegistryKey;
use crate::registry::TemplateRegistry;

/// A template declaration registered automatically when its group is
/// drained.
///
/// The explicit-registration counterpart to entry points: definitions are
/// submitted to the inventory where they are declared, and an init-time
/// call to [`TemplateRegistry::register_auto`] folds them into a registry.
/// Keys come from the registry's key function, not from the declaration.
///
/// ```ignore
/// inventory::collect!(AutoDef<CommandDef>);
///
/// inventory::submit! {
/// 	AutoDef::new("commands", make_print_command)
/// }
/// ```
pub struct AutoDef<V: 'static> {
	/// Group drained by [`TemplateRegistry::register_auto`].
	pub group: &'static str,
	/// Builds the template to register.
	pub construct: fn() -> V,
}

impl<V> AutoDef<V> {
	/// Creates an auto-registration declaration.
	pub const fn new(group: &'static str, construct: fn() -> V) -> Self {
		Self { group, construct }
	}
}

impl<K: RegistryKey, V> TemplateRegistry<K, V> {
	/// Registers every inventory-declared [`AutoDef`] in `group`, in
	/// declaration order, returning how many were registered.
	///
	/// Fails with [`RegistryError::MissingKeyFn`] when the registry was
	/// built without a key function, before touching any declaration.
	pub fn register_auto(&mut self, group: &str) -> Result<usize, RegistryError>
	where
		AutoDef<V>: inventory::Collect,
	{
		if !self.has_key_fn() {
			return Err(RegistryError::missing_key_fn(type_name::<Self>()));
		}
		let mut count = 0;
		for def in inventory::iter::<AutoDef<V>> {
			if def.group != group {
				continue;
			}
			self.register_keyed((def.construct)())?;
			count += 1;
		}
		tracing::debug!(group, count, "auto-registered templates");
		Ok(count)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::base::Registry;

	#[derive(Debug, Clone, PartialEq, Eq)]
	struct CommandDef {
		name: &'static str,
	}

	inventory::collect!(AutoDef<CommandDef>);

	inventory::submit! {
		AutoDef::new("commands", || CommandDef { name: "print" })
	}

	inventory::submit! {
		AutoDef::new("commands", || CommandDef { name: "quit" })
	}

	inventory::submit! {
		AutoDef::new("other-group", || CommandDef { name: "ignored" })
	}

	#[test]
	fn drains_only_the_requested_group() {
		let mut registry: TemplateRegistry<&str, CommandDef> =
			TemplateRegistry::new().with_key_fn(|def| def.name);
		let count = registry.register_auto("commands").unwrap();
		assert_eq!(count, 2);
		assert!(registry.contains(&"print"));
		assert!(registry.contains(&"quit"));
		assert!(!registry.contains(&"ignored"));
	}

	#[test]
	fn requires_a_key_fn_up_front() {
		let mut registry: TemplateRegistry<&str, CommandDef> = TemplateRegistry::new();
		let err = registry.register_auto("commands").unwrap_err();
		assert!(matches!(err, RegistryError::MissingKeyFn { .. }));
		assert!(registry.is_empty());
	}
}
