//! Signatures and archetype groups.
//!
//! A [`Signature`] is the exact multiset of component types an entity holds.
//! Entities sharing a signature are kept together in one entry of
//! [`ArchetypeGroups`], which is what queries scan to find their matches.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::component::ComponentTypeId;
use crate::entity::Entity;

/// Mixing constant for the order-independent signature hash.
const MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// The set of component types an entity holds.
///
/// Types are kept sorted by [`ComponentTypeId`], so two signatures built from
/// the same types in any order compare equal. Multi component types appear
/// once per instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Signature {
    types: Vec<ComponentTypeId>,
}

impl Signature {
    /// The empty signature.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a signature from component type ids in any order.
    pub fn from_types(types: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        let mut types: Vec<ComponentTypeId> = types.into_iter().collect();
        types.sort_unstable();
        Self { types }
    }

    /// A copy of this signature with one more occurrence of `ty`.
    #[must_use]
    pub fn with(&self, ty: ComponentTypeId) -> Self {
        let mut types = self.types.clone();
        let at = types.partition_point(|t| *t <= ty);
        types.insert(at, ty);
        Self { types }
    }

    /// A copy of this signature with every occurrence of `ty` removed.
    #[must_use]
    pub fn without(&self, ty: ComponentTypeId) -> Self {
        Self {
            types: self.types.iter().copied().filter(|t| *t != ty).collect(),
        }
    }

    /// Number of occurrences of `ty`.
    #[must_use]
    pub fn count(&self, ty: ComponentTypeId) -> usize {
        let start = self.types.partition_point(|t| *t < ty);
        let end = self.types.partition_point(|t| *t <= ty);
        end - start
    }

    /// Whether `ty` occurs at least once.
    #[must_use]
    pub fn contains(&self, ty: ComponentTypeId) -> bool {
        self.types.binary_search(&ty).is_ok()
    }

    /// Every type in `query` is present here at least as many times.
    ///
    /// This is the sole matching rule for queries.
    #[must_use]
    pub fn is_superset_of(&self, query: &Signature) -> bool {
        query
            .distinct()
            .all(|ty| self.count(ty) >= query.count(ty))
    }

    /// All type occurrences in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.types.iter().copied()
    }

    /// Each type once, in canonical order.
    pub fn distinct(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.types
            .iter()
            .enumerate()
            .filter(|(i, ty)| *i == 0 || self.types[i - 1] != **ty)
            .map(|(_, ty)| *ty)
    }

    /// Types occurring more than once.
    pub fn repeated(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.distinct().filter(|ty| self.count(*ty) > 1)
    }

    /// Number of type occurrences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` for the empty signature.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Order-independent hash: XOR-fold of each id times a mixing constant.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.types
            .iter()
            .fold(0, |acc, ty| acc ^ ty.0.wrapping_mul(MIX))
    }

    /// Render with type names, falling back to the raw id for unknown types.
    #[must_use]
    pub fn display<'a>(
        &'a self,
        names: &'a HashMap<ComponentTypeId, &'static str>,
    ) -> SignatureDisplay<'a> {
        SignatureDisplay {
            signature: self,
            names: Some(names),
        }
    }
}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint());
    }
}

impl FromIterator<ComponentTypeId> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        Self::from_types(iter)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plain = SignatureDisplay {
            signature: self,
            names: None,
        };
        fmt::Display::fmt(&plain, f)
    }
}

/// Helper returned by [`Signature::display`].
pub struct SignatureDisplay<'a> {
    signature: &'a Signature,
    names: Option<&'a HashMap<ComponentTypeId, &'static str>>,
}

impl fmt::Display for SignatureDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, ty) in self.signature.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match self.names.and_then(|names| names.get(&ty)) {
                Some(name) => f.write_str(name)?,
                None => write!(f, "{ty}")?,
            }
        }
        f.write_str("}")
    }
}

/// Build a [`Signature`] from component types.
///
/// ```rust
/// use engine_component::{Column, Component, signature};
///
/// #[derive(Debug, Clone, Default)]
/// struct Tag;
///
/// impl Component for Tag {
///     type Store = Column<Self>;
///     fn type_name() -> &'static str { "Tag" }
/// }
///
/// let sig = signature![Tag];
/// assert_eq!(sig.len(), 1);
/// ```
#[macro_export]
macro_rules! signature {
    ($($ty:ty),* $(,)?) => {
        $crate::Signature::from_types([
            $(<$ty as $crate::Component>::component_type_id()),*
        ])
    };
}

/// Entities grouped by their exact signature.
///
/// Within a group, entities keep the order they joined in. Groups that become
/// empty are dropped, so every group present holds at least one entity.
#[derive(Debug, Clone, Default)]
pub struct ArchetypeGroups {
    groups: BTreeMap<Signature, Vec<Entity>>,
}

impl ArchetypeGroups {
    /// No groups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entity` to the group for `signature`, creating it if needed.
    pub fn insert(&mut self, signature: Signature, entity: Entity) {
        self.groups.entry(signature).or_default().push(entity);
    }

    /// Append several entities to the group for `signature`.
    ///
    /// No group is created when `entities` is empty.
    pub fn extend(&mut self, signature: Signature, entities: impl IntoIterator<Item = Entity>) {
        let mut entities = entities.into_iter().peekable();
        if entities.peek().is_none() {
            return;
        }
        self.groups.entry(signature).or_default().extend(entities);
    }

    /// Take `entity` out of the group for `signature`.
    ///
    /// Returns `false` if it was not there.
    pub fn remove(&mut self, signature: &Signature, entity: Entity) -> bool {
        let Some(members) = self.groups.get_mut(signature) else {
            return false;
        };
        let Some(row) = members.iter().position(|&e| e == entity) else {
            return false;
        };
        members.remove(row);
        if members.is_empty() {
            self.groups.remove(signature);
        }
        true
    }

    /// Members of the group for `signature`.
    #[must_use]
    pub fn get(&self, signature: &Signature) -> Option<&[Entity]> {
        self.groups.get(signature).map(Vec::as_slice)
    }

    /// All groups in canonical signature order.
    pub fn iter(&self) -> impl Iterator<Item = (&Signature, &[Entity])> {
        self.groups
            .iter()
            .map(|(signature, members)| (signature, members.as_slice()))
    }

    /// Groups whose signature is a superset of `query`.
    pub fn matching<'a>(
        &'a self,
        query: &'a Signature,
    ) -> impl Iterator<Item = (&'a Signature, &'a [Entity])> + 'a {
        self.iter()
            .filter(move |(signature, _)| signature.is_superset_of(query))
    }

    /// Move every group of `other` onto the end of the matching group here.
    pub fn append_from(&mut self, other: &mut ArchetypeGroups) {
        for (signature, members) in std::mem::take(&mut other.groups) {
            self.extend(signature, members);
        }
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns `true` if there are no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of entities across all groups.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::*;

    const A: ComponentTypeId = ComponentTypeId(1);
    const B: ComponentTypeId = ComponentTypeId(2);
    const C: ComponentTypeId = ComponentTypeId(3);

    fn hash_of(sig: &Signature) -> u64 {
        let mut hasher = DefaultHasher::new();
        sig.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_signature_order_independent() {
        let s1 = Signature::from_types([A, B, C]);
        let s2 = Signature::from_types([C, A, B]);
        assert_eq!(s1, s2);
        assert_eq!(s1.fingerprint(), s2.fingerprint());
        assert_eq!(hash_of(&s1), hash_of(&s2));
    }

    #[test]
    fn test_superset_matching() {
        let entity = Signature::from_types([A, B]);
        assert!(entity.is_superset_of(&Signature::from_types([A])));
        assert!(entity.is_superset_of(&Signature::from_types([B, A])));
        assert!(entity.is_superset_of(&Signature::new()));
        assert!(!entity.is_superset_of(&Signature::from_types([A, C])));
    }

    #[test]
    fn test_superset_counts_multiplicity() {
        let entity = Signature::from_types([A, A, B]);
        assert!(entity.is_superset_of(&Signature::from_types([A, A])));
        assert!(!entity.is_superset_of(&Signature::from_types([A, A, A])));
        assert_eq!(entity.count(A), 2);
        assert_eq!(entity.repeated().collect::<Vec<_>>(), vec![A]);
        assert_eq!(entity.distinct().collect::<Vec<_>>(), vec![A, B]);
    }

    #[test]
    fn test_with_and_without() {
        let sig = Signature::from_types([C, A]);
        let grown = sig.with(B);
        assert_eq!(grown.iter().collect::<Vec<_>>(), vec![A, B, C]);
        assert_eq!(grown.with(A).count(A), 2);
        assert_eq!(grown.with(A).without(A), Signature::from_types([B, C]));
    }

    #[test]
    fn test_display_uses_names() {
        let names = HashMap::from([(A, "Position"), (B, "Velocity")]);
        let sig = Signature::from_types([B, A]);
        assert_eq!(sig.display(&names).to_string(), "{Position, Velocity}");
        assert!(Signature::from_types([C]).to_string().starts_with("{0x"));
    }

    #[test]
    fn test_groups_keep_join_order_and_drop_empty() {
        let ab = Signature::from_types([A, B]);
        let mut groups = ArchetypeGroups::new();
        groups.insert(ab.clone(), Entity(3));
        groups.insert(ab.clone(), Entity(1));
        groups.insert(ab.clone(), Entity(2));

        assert!(groups.remove(&ab, Entity(1)));
        assert_eq!(groups.get(&ab), Some(&[Entity(3), Entity(2)][..]));
        assert!(!groups.remove(&ab, Entity(1)));

        groups.remove(&ab, Entity(3));
        groups.remove(&ab, Entity(2));
        assert!(groups.is_empty());
    }

    #[test]
    fn test_extend_with_nothing_adds_no_group() {
        let mut groups = ArchetypeGroups::new();
        groups.extend(Signature::from_types([A]), []);
        assert!(groups.is_empty());

        let mut nursery = ArchetypeGroups::new();
        nursery.extend(Signature::from_types([B]), Vec::new());
        groups.append_from(&mut nursery);
        assert_eq!(groups.len(), 0);
    }

    #[test]
    fn test_groups_matching_and_append() {
        let a = Signature::from_types([A]);
        let ab = Signature::from_types([A, B]);
        let mut main = ArchetypeGroups::new();
        main.insert(a.clone(), Entity(1));
        main.insert(ab.clone(), Entity(2));

        let mut nursery = ArchetypeGroups::new();
        nursery.insert(ab.clone(), Entity(5));
        nursery.insert(Signature::from_types([C]), Entity(6));

        main.append_from(&mut nursery);
        assert!(nursery.is_empty());
        assert_eq!(main.len(), 3);
        assert_eq!(main.entity_count(), 4);
        assert_eq!(main.get(&ab), Some(&[Entity(2), Entity(5)][..]));

        let query = Signature::from_types([A]);
        let matched: Vec<Entity> = main
            .matching(&query)
            .flat_map(|(_, members)| members.iter().copied())
            .collect();
        assert_eq!(matched.len(), 3);
        assert!(!matched.contains(&Entity(6)));
    }
}
