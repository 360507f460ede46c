//! Keyed template registries with a generic factory protocol.
//!
//! A registry maps application-defined keys to *templates*: closures,
//! function pointers, or definition structs that produce instances on
//! demand. Call sites ask for "an instance for key K" without knowing
//! which concrete template handles K.
//!
//! The building blocks:
//! - [`Registry`] / [`MutableRegistry`]: the read and mutate contracts
//! - [`TemplateRegistry`]: ordered mutable registry, the default
//!   implementation
//! - [`SortedRegistry`]: iteration order from a caller-supplied comparator
//! - [`InstanceCache`]: per-key instance memoization over any registry
//! - [`EntryPointRegistry`]: read-only registry loaded lazily from
//!   link-time entry points (or any [`EntryPointSource`])
//! - [`RegistryPatcher`]: scoped, reversible overrides with guaranteed
//!   rollback
//! - [`AutoDef`]: link-time bulk registration into a mutable registry
//!
//! Registries are single-threaded by design: no internal locking is
//! performed, and sharing one across threads requires external
//! synchronization.
//!
//! ```
//! use template_registry::{MutableRegistry, Registry, TemplateRegistry};
//!
//! #[derive(Debug)]
//! struct Greeting(String);
//!
//! let mut registry: TemplateRegistry<&str, fn(&str) -> Greeting> = TemplateRegistry::new();
//! registry.register("en", |name| Greeting(format!("hello, {name}"))).unwrap();
//! registry.register("fr", |name| Greeting(format!("bonjour, {name}"))).unwrap();
//!
//! let greeting = registry.get(&"fr", "ada").unwrap();
//! assert_eq!(greeting.0, "bonjour, ada");
//! ```

pub mod auto;
pub mod base;
pub mod cache;
pub mod entry_points;
pub mod error;
pub mod key;
pub mod patcher;
pub mod registry;
pub mod sorted;

pub use auto::AutoDef;
pub use base::{Branded, MutableRegistry, Registry, Template};
pub use cache::InstanceCache;
pub use entry_points::{
	EntryPoint, EntryPointDef, EntryPointRegistry, EntryPointSource, InventorySource,
};
pub use error::RegistryError;
pub use key::{KeyFn, LookupFn, RegistryKey};
pub use patcher::{PatchGuard, RegistryPatcher};
pub use registry::TemplateRegistry;
pub use sorted::{SortRow, SortedRegistry};
