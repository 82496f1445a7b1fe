//! Column set plus archetype groups.
//!
//! A [`Storage`] is the unit the tracker keeps two of: main storage, which
//! queries see, and the nursery, which holds entities built during the
//! current tick. Both have a column for every registered component type.

use std::collections::HashMap;

use engine_component::{
    ArchetypeGroups, Component, ComponentStore, ComponentTypeId, EcsError, Entity, Signature,
    downcast_mut, downcast_ref, violation,
};

/// Columns, archetype groups, and the signature of every stored entity.
#[derive(Default)]
pub struct Storage {
    columns: HashMap<ComponentTypeId, Box<dyn ComponentStore>>,
    groups: ArchetypeGroups,
    signatures: HashMap<Entity, Signature>,
}

impl Storage {
    /// Create an empty storage with no columns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column unless one for the same type is already present.
    ///
    /// Returns `false` if a column was already registered.
    pub fn register(&mut self, column: Box<dyn ComponentStore>) -> bool {
        let ty = column.component_type();
        if self.columns.contains_key(&ty) {
            return false;
        }
        self.columns.insert(ty, column);
        true
    }

    /// Whether a column is registered for `ty`.
    #[must_use]
    pub fn has_column(&self, ty: ComponentTypeId) -> bool {
        self.columns.contains_key(&ty)
    }

    /// The column for `ty`. Fatal if none is registered.
    #[track_caller]
    #[must_use]
    pub fn column(&self, ty: ComponentTypeId) -> &dyn ComponentStore {
        match self.columns.get(&ty) {
            Some(column) => &**column,
            None => violation(EcsError::MissingColumn(ty)),
        }
    }

    /// Mutable access to the column for `ty`. Fatal if none is registered.
    #[track_caller]
    pub fn column_mut(&mut self, ty: ComponentTypeId) -> &mut dyn ComponentStore {
        match self.columns.get_mut(&ty) {
            Some(column) => &mut **column,
            None => violation(EcsError::MissingColumn(ty)),
        }
    }

    /// The concrete column holding `T`.
    #[track_caller]
    #[must_use]
    pub fn typed<T: Component>(&self) -> &T::Store {
        downcast_ref::<T::Store>(self.column(T::component_type_id()))
    }

    /// The concrete column holding `T`, mutably.
    #[track_caller]
    pub fn typed_mut<T: Component>(&mut self) -> &mut T::Store {
        downcast_mut::<T::Store>(self.column_mut(T::component_type_id()))
    }

    /// Iterate every registered column.
    pub fn columns(&self) -> impl Iterator<Item = &dyn ComponentStore> {
        self.columns.values().map(|column| &**column)
    }

    /// Verify `signature` is buildable here: every type has a column and
    /// only multi types repeat.
    #[track_caller]
    pub fn validate(&self, signature: &Signature) {
        for ty in signature.distinct() {
            let column = self.column(ty);
            if !column.is_multi() && signature.count(ty) > 1 {
                violation(EcsError::DuplicateComponent {
                    name: column.type_name(),
                });
            }
        }
    }

    /// Whether `entity` is stored here.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.signatures.contains_key(&entity)
    }

    /// The current signature of `entity`.
    #[must_use]
    pub fn signature_of(&self, entity: Entity) -> Option<&Signature> {
        self.signatures.get(&entity)
    }

    /// The archetype groups.
    #[must_use]
    pub fn groups(&self) -> &ArchetypeGroups {
        &self.groups
    }

    /// Ids in every group whose signature is a superset of `query`, group by
    /// group in canonical order.
    #[must_use]
    pub fn matching(&self, query: &Signature) -> Vec<Entity> {
        self.groups
            .matching(query)
            .flat_map(|(_, members)| members.iter().copied())
            .collect()
    }

    /// Number of stored entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.signatures.len()
    }

    /// Returns `true` if no entity is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Record `entity` under `signature`. Column data is the caller's job.
    pub fn place(&mut self, entity: Entity, signature: Signature) {
        self.groups.insert(signature.clone(), entity);
        self.signatures.insert(entity, signature);
    }

    /// Record a run of entities sharing one signature.
    pub fn place_all(&mut self, entities: &[Entity], signature: &Signature) {
        self.groups.extend(signature.clone(), entities.iter().copied());
        for &entity in entities {
            self.signatures.insert(entity, signature.clone());
        }
    }

    /// Move `entity` to the group for `signature`.
    #[track_caller]
    pub fn relocate(&mut self, entity: Entity, signature: Signature) {
        let Some(current) = self.signatures.get_mut(&entity) else {
            violation(EcsError::UnknownEntity(entity));
        };
        let previous = std::mem::replace(current, signature.clone());
        self.groups.remove(&previous, entity);
        self.groups.insert(signature, entity);
    }

    /// Drop `entity` from its group and return its signature.
    pub fn forget(&mut self, entity: Entity) -> Option<Signature> {
        let signature = self.signatures.remove(&entity)?;
        self.groups.remove(&signature, entity);
        Some(signature)
    }

    /// Absorb everything `nursery` holds, leaving it empty but with its
    /// columns still registered.
    #[track_caller]
    pub fn graduate_from(&mut self, nursery: &mut Storage) {
        for (ty, column) in &mut nursery.columns {
            if !column.is_empty() {
                self.column_mut(*ty).graduate_from(&mut **column);
            }
        }
        self.groups.append_from(&mut nursery.groups);
        for (entity, signature) in nursery.signatures.drain() {
            if self.signatures.insert(entity, signature).is_some() {
                violation(EcsError::IndexCorruption {
                    name: "storage",
                    detail: format!("{entity} graduated while already in main storage"),
                });
            }
        }
    }

    /// A storage with an empty copy of each column, sharing hooks.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|(ty, column)| (*ty, column.empty_like()))
                .collect(),
            groups: ArchetypeGroups::new(),
            signatures: HashMap::new(),
        }
    }

    /// Check that groups, signatures and columns agree.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn check_consistency(&self) -> Result<(), EcsError> {
        let corrupt = |detail: String| EcsError::IndexCorruption {
            name: "storage",
            detail,
        };

        if self.groups.entity_count() != self.signatures.len() {
            return Err(corrupt(format!(
                "{} grouped entities but {} signatures",
                self.groups.entity_count(),
                self.signatures.len()
            )));
        }
        for (signature, members) in self.groups.iter() {
            for &entity in members {
                if self.signatures.get(&entity) != Some(signature) {
                    return Err(corrupt(format!(
                        "{entity} grouped under {signature} but its signature differs"
                    )));
                }
            }
        }

        let mut expected: HashMap<ComponentTypeId, usize> = HashMap::new();
        for (&entity, signature) in &self.signatures {
            for ty in signature.distinct() {
                let held = self.column(ty).has(entity);
                if held != signature.count(ty) {
                    return Err(corrupt(format!(
                        "{entity} holds {held} `{}` but its signature says {}",
                        self.column(ty).type_name(),
                        signature.count(ty)
                    )));
                }
                *expected.entry(ty).or_default() += held;
            }
        }
        for column in self.columns.values() {
            column.check_consistency()?;
            let want = expected.get(&column.component_type()).copied().unwrap_or(0);
            if column.len() != want {
                return Err(corrupt(format!(
                    "`{}` holds {} instances, signatures account for {want}",
                    column.type_name(),
                    column.len()
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("columns", &self.columns.len())
            .field("groups", &self.groups.len())
            .field("entities", &self.signatures.len())
            .finish()
    }
}
