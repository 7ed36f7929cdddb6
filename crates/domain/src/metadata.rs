use std::collections::{BTreeMap, HashMap, HashSet};

/// Key/value tags attached to one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityTags(BTreeMap<String, String>);

impl EntityTags {
    /// Creates an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one tag.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the tag value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no tags are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EntityTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Tags for every entity known at listing time.
#[derive(Debug, Clone, Default)]
pub struct EntityMetadata {
    entries: HashMap<String, EntityTags>,
}

impl EntityMetadata {
    /// Creates an empty metadata listing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one tag to an entity, creating its entry on first use.
    pub fn insert_tag(
        &mut self,
        entity_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.entries
            .entry(entity_id.into())
            .or_default()
            .insert(key, value);
    }

    /// Returns the tags of one entity, if listed.
    #[must_use]
    pub fn tags_for(&self, entity_id: &str) -> Option<&EntityTags> {
        self.entries.get(entity_id)
    }

    /// Returns the number of listed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no entity is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Known scheduling association identifiers.
#[derive(Debug, Clone, Default)]
pub struct AssociationIndex(HashSet<String>);

impl AssociationIndex {
    /// Returns true when the association id is known.
    #[must_use]
    pub fn contains(&self, association_id: &str) -> bool {
        self.0.contains(association_id)
    }

    /// Returns the number of known associations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no association is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for AssociationIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Result of looking up one entity's tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagLookup<'a> {
    /// The source does not track entity metadata at all.
    Untracked,
    /// Metadata is tracked but this entity has no entry.
    Unknown,
    /// Tags listed for this entity.
    Known(&'a EntityTags),
}

/// Metadata listing captured once per run.
#[derive(Debug, Clone, Default)]
pub struct MetadataSnapshot {
    entities: Option<EntityMetadata>,
    associations: AssociationIndex,
}

impl MetadataSnapshot {
    /// Snapshot for sources without entity tags or associations.
    #[must_use]
    pub fn untracked() -> Self {
        Self::default()
    }

    /// Snapshot with tracked entity tags and associations.
    #[must_use]
    pub fn tracked(entities: EntityMetadata, associations: AssociationIndex) -> Self {
        Self {
            entities: Some(entities),
            associations,
        }
    }

    /// Looks up the tags of one entity.
    #[must_use]
    pub fn lookup(&self, entity_id: Option<&str>) -> TagLookup<'_> {
        let Some(entities) = &self.entities else {
            return TagLookup::Untracked;
        };

        entity_id
            .and_then(|entity_id| entities.tags_for(entity_id))
            .map_or(TagLookup::Unknown, TagLookup::Known)
    }

    /// Returns the association index.
    #[must_use]
    pub fn associations(&self) -> &AssociationIndex {
        &self.associations
    }

    /// Returns true when entity metadata is tracked.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.entities.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{AssociationIndex, EntityMetadata, MetadataSnapshot, TagLookup};

    #[test]
    fn untracked_snapshot_never_reports_unknown() {
        let snapshot = MetadataSnapshot::untracked();
        assert_eq!(snapshot.lookup(Some("i-0abc")), TagLookup::Untracked);
        assert_eq!(snapshot.lookup(None), TagLookup::Untracked);
    }

    #[test]
    fn tracked_snapshot_distinguishes_known_and_unknown_entities() {
        let mut metadata = EntityMetadata::new();
        metadata.insert_tag("i-0abc", "os-type", "Linux");
        metadata.insert_tag("i-0abc", "server-type", "Foo");
        let snapshot = MetadataSnapshot::tracked(metadata, AssociationIndex::default());

        match snapshot.lookup(Some("i-0abc")) {
            TagLookup::Known(tags) => {
                assert_eq!(tags.get("os-type"), Some("Linux"));
                assert_eq!(tags.len(), 2);
            }
            other => panic!("expected known tags, got {other:?}"),
        }
        assert_eq!(snapshot.lookup(Some("i-0def")), TagLookup::Unknown);
        assert_eq!(snapshot.lookup(None), TagLookup::Unknown);
    }

    #[test]
    fn association_index_collects_ids() {
        let index: AssociationIndex = ["assoc-1", "assoc-2"].into_iter().collect();
        assert!(index.contains("assoc-1"));
        assert!(!index.contains("assoc-3"));
        assert_eq!(index.len(), 2);
    }
}
