use std::any::type_name;
use std::fmt;

use thiserror::Error;

/// Errors produced by registry operations.
///
/// [`NotFound`](RegistryError::NotFound) is the distinguished lookup error:
/// callers that treat absence as a normal condition match on it (or use
/// [`is_not_found`](RegistryError::is_not_found)) and let every other
/// variant propagate as a programmer error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
	/// No template is registered under the requested lookup key.
	#[error("no template registered for key {key}")]
	NotFound {
		/// The unresolved lookup key, rendered with `Debug`.
		key: String,
	},
	/// The registry enforces unique keys and the key is already occupied.
	#[error("{template} with key {key} is already registered")]
	DuplicateKey {
		/// Type name of the rejected template.
		template: &'static str,
		/// The occupied lookup key, rendered with `Debug`.
		key: String,
	},
	/// The registration key resolved to an empty lookup key.
	#[error("cannot register {template} with empty key {key}")]
	InvalidKey {
		/// Type name of the offending template.
		template: &'static str,
		/// The empty lookup key, rendered with `Debug`.
		key: String,
	},
	/// The operation derives keys from template values, but the registry
	/// was built without a key function.
	#[error("{registry} has no key function; register with an explicit key")]
	MissingKeyFn {
		/// Type name of the registry.
		registry: &'static str,
	},
}

impl RegistryError {
	/// Missing-key error for `key`.
	pub fn not_found(key: &impl fmt::Debug) -> Self {
		Self::NotFound { key: format!("{key:?}") }
	}

	/// Returns true for the missing-key variant.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}

	pub(crate) fn duplicate_key<V>(key: &impl fmt::Debug) -> Self {
		Self::DuplicateKey {
			template: type_name::<V>(),
			key: format!("{key:?}"),
		}
	}

	pub(crate) fn invalid_key<V>(key: &impl fmt::Debug) -> Self {
		Self::InvalidKey {
			template: type_name::<V>(),
			key: format!("{key:?}"),
		}
	}

	pub(crate) fn missing_key_fn(registry: &'static str) -> Self {
		Self::MissingKeyFn { registry }
	}
}
