//! Per-entity repository factories with deferred instantiation.

use super::entity::Entity;
use super::repository::Repository;
use super::{RepoError, RepoResult};
use crate::model::audit::AuditEntry;
use crate::model::todo::ToDo;
use crate::model::user::User;
use log::debug;
use once_cell::sync::OnceCell;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Box<dyn Fn() -> Instance + Send + Sync>;

struct Registration {
    table: &'static str,
    factory: Factory,
    instance: OnceCell<Instance>,
}

/// Registry of repository factories, one per entity type.
///
/// A repository is built on first request and shared afterwards.
#[derive(Default)]
pub struct RepositoryRegistry {
    registrations: HashMap<TypeId, Registration>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every persisted entity type registered.
    pub fn with_default_entities() -> Self {
        let mut registry = Self::new();
        // Fresh registry; these registrations cannot collide.
        let _ = registry.register::<User>();
        let _ = registry.register::<ToDo>();
        let _ = registry.register::<AuditEntry>();
        registry
    }

    pub fn register<E: Entity>(&mut self) -> RepoResult<()> {
        self.register_with::<E, _>(Repository::<E>::new)
    }

    /// Registers a custom factory for `E`.
    ///
    /// # Errors
    /// - `RepoError::DuplicateRegistration` when `E` is already registered.
    pub fn register_with<E, F>(&mut self, factory: F) -> RepoResult<()>
    where
        E: Entity,
        F: Fn() -> Repository<E> + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();
        if self.registrations.contains_key(&type_id) {
            return Err(RepoError::DuplicateRegistration(E::TABLE));
        }
        self.registrations.insert(
            type_id,
            Registration {
                table: E::TABLE,
                factory: Box::new(move || Arc::new(factory()) as Instance),
                instance: OnceCell::new(),
            },
        );
        Ok(())
    }

    /// Returns the shared repository for `E`, building it on first use.
    pub fn repository<E: Entity>(&self) -> RepoResult<Arc<Repository<E>>> {
        let registration = self
            .registrations
            .get(&TypeId::of::<E>())
            .ok_or(RepoError::Unregistered(E::TABLE))?;
        let instance = registration.instance.get_or_init(|| {
            debug!(
                "event=repo_instantiate module=repo status=ok table={}",
                registration.table
            );
            (registration.factory)()
        });
        Arc::clone(instance)
            .downcast::<Repository<E>>()
            .map_err(|_| RepoError::Unregistered(E::TABLE))
    }

    /// Registered table names, sorted.
    pub fn registered_tables(&self) -> Vec<&'static str> {
        let mut tables = self
            .registrations
            .values()
            .map(|registration| registration.table)
            .collect::<Vec<_>>();
        tables.sort_unstable();
        tables
    }

    /// Number of repositories built so far.
    pub fn instantiated_count(&self) -> usize {
        self.registrations
            .values()
            .filter(|registration| registration.instance.get().is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::RepositoryRegistry;
    use crate::model::todo::ToDo;
    use crate::model::user::User;
    use crate::repo::RepoError;
    use std::sync::Arc;

    #[test]
    fn repositories_are_built_lazily_and_shared() {
        let registry = RepositoryRegistry::with_default_entities();
        assert_eq!(registry.instantiated_count(), 0);

        let first = registry.repository::<User>().unwrap();
        let second = registry.repository::<User>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.instantiated_count(), 1);
        assert_eq!(
            registry.registered_tables(),
            vec!["audit_entries", "todos", "users"]
        );
    }

    #[test]
    fn duplicate_and_missing_registrations_fail() {
        let mut registry = RepositoryRegistry::new();
        registry.register::<User>().unwrap();
        assert!(matches!(
            registry.register::<User>(),
            Err(RepoError::DuplicateRegistration("users"))
        ));
        assert!(matches!(
            registry.repository::<ToDo>(),
            Err(RepoError::Unregistered("todos"))
        ));
    }
}
