//! Constructor dependencies for handler types.
//!
//! Handler types declare the names of the dependencies their constructor
//! needs. When the dispatch table is built, each name is resolved through
//! a [`DependencyProvider`] and handed to the factory as [`Dependencies`].

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, WireError};
use crate::handler::ClassKey;

/// A shared, type-erased dependency.
pub type Dependency = Arc<dyn Any + Send + Sync>;

/// Resolves constructor dependencies by name.
pub trait DependencyProvider: Send + Sync {
    /// Dependency registered under `name`.
    fn get(&self, name: &str) -> Option<Dependency>;
}

/// In-memory [`DependencyProvider`].
#[derive(Clone, Default)]
pub struct Container {
    entries: HashMap<String, Dependency>,
}

impl Container {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under `name`, replacing any previous entry.
    pub fn provide<T: Any + Send + Sync>(&mut self, name: &str, value: T) -> &mut Self {
        self.provide_arc(name, Arc::new(value))
    }

    /// Register an already shared value.
    pub fn provide_arc<T: Any + Send + Sync>(&mut self, name: &str, value: Arc<T>) -> &mut Self {
        self.entries.insert(name.to_string(), value as Dependency);
        self
    }

    /// Builder-style [`provide`](Self::provide).
    pub fn with<T: Any + Send + Sync>(mut self, name: &str, value: T) -> Self {
        self.provide(name, value);
        self
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered dependencies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DependencyProvider for Container {
    fn get(&self, name: &str) -> Option<Dependency> {
        self.entries.get(name).cloned()
    }
}

/// Resolved dependencies passed to a handler factory.
pub struct Dependencies {
    class: &'static str,
    resolved: Vec<(String, Dependency)>,
}

impl Dependencies {
    /// Resolve `names` for `class` through `provider`.
    ///
    /// Fails on the first name the provider does not know.
    pub(crate) fn resolve(
        class: ClassKey,
        names: &[String],
        provider: &dyn DependencyProvider,
    ) -> Result<Self> {
        let resolved = names
            .iter()
            .map(|name| {
                provider
                    .get(name)
                    .map(|dep| (name.clone(), dep))
                    .ok_or_else(|| WireError::MissingDependency {
                        class: class.name().to_string(),
                        dependency: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            class: class.name(),
            resolved,
        })
    }

    /// Dependency `name`, downcast to `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let (_, dep) = self
            .resolved
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| WireError::MissingDependency {
                class: self.class.to_string(),
                dependency: name.to_string(),
            })?;
        self.downcast(name, dep.clone())
    }

    /// Dependency at constructor position `index`, downcast to `T`.
    pub fn at<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        let (name, dep) = self.resolved.get(index).ok_or_else(|| {
            WireError::InvalidRegistration(format!(
                "{} has no constructor dependency at position {index}",
                self.class
            ))
        })?;
        self.downcast(name, dep.clone())
    }

    fn downcast<T: Any + Send + Sync>(&self, name: &str, dep: Dependency) -> Result<Arc<T>> {
        dep.downcast::<T>().map_err(|_| {
            WireError::InvalidRegistration(format!(
                "dependency `{name}` of {} is not a {}",
                self.class,
                std::any::type_name::<T>()
            ))
        })
    }

    /// Number of resolved dependencies.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Whether the constructor takes no dependencies.
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Orders;

    struct OrderStore {
        name: &'static str,
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_resolve_by_name_and_position() {
        let container = Container::new()
            .with("OrderStore", OrderStore { name: "memory" })
            .with("Limit", 25u32);

        let deps = Dependencies::resolve(
            ClassKey::of::<Orders>(),
            &names(&["OrderStore", "Limit"]),
            &container,
        )
        .unwrap();

        assert_eq!(deps.len(), 2);
        assert_eq!(deps.get::<OrderStore>("OrderStore").unwrap().name, "memory");
        assert_eq!(*deps.at::<u32>(1).unwrap(), 25);
    }

    #[test]
    fn test_missing_dependency() {
        let container = Container::new();

        let err = Dependencies::resolve(ClassKey::of::<Orders>(), &names(&["OrderStore"]), &container)
            .err()
            .unwrap();

        match err {
            WireError::MissingDependency { class, dependency } => {
                assert!(class.ends_with("Orders"));
                assert_eq!(dependency, "OrderStore");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wrong_type() {
        let container = Container::new().with("Limit", 25u32);
        let deps = Dependencies::resolve(ClassKey::of::<Orders>(), &names(&["Limit"]), &container).unwrap();

        assert!(matches!(deps.get::<String>("Limit"), Err(WireError::InvalidRegistration(_))));
        assert!(matches!(deps.get::<u32>("Other"), Err(WireError::MissingDependency { .. })));
        assert!(deps.at::<u32>(4).is_err());
    }

    #[test]
    fn test_shared_instance() {
        let store = Arc::new(OrderStore { name: "shared" });
        let mut container = Container::new();
        container.provide_arc("OrderStore", store.clone());

        let deps = Dependencies::resolve(ClassKey::of::<Orders>(), &names(&["OrderStore"]), &container).unwrap();
        assert!(Arc::ptr_eq(&deps.get::<OrderStore>("OrderStore").unwrap(), &store));
    }
}
