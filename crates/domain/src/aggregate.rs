use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::hash::Hash;

use crate::classifier::Outcome;

/// Top-level aggregation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    /// Totals across every entity.
    All,
    /// One entity.
    Entity(String),
}

/// Second-level aggregation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubEntityKey {
    /// Totals across every sub-entity.
    All,
    /// One document or workflow.
    Named(String),
}

impl Display for EntityKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => formatter.write_str("all"),
            Self::Entity(entity_id) => formatter.write_str(entity_id),
        }
    }
}

impl Display for SubEntityKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => formatter.write_str("all"),
            Self::Named(name) => formatter.write_str(name),
        }
    }
}

/// Success/failed/ignored counters for one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterBucket {
    /// Successful runs.
    pub success: u64,
    /// Failed runs.
    pub failed: u64,
    /// Ignored runs.
    pub ignored: u64,
}

impl CounterBucket {
    fn increment(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.success = self.success.saturating_add(1),
            Outcome::Failed => self.failed = self.failed.saturating_add(1),
            Outcome::Ignored => self.ignored = self.ignored.saturating_add(1),
            Outcome::OutOfWindow | Outcome::NotTerminal => {}
        }
    }
}

/// Map that remembers first-insertion order.
#[derive(Debug, Clone)]
struct InsertionOrdered<K, V> {
    entries: Vec<(K, V)>,
    positions: HashMap<K, usize>,
}

impl<K, V> Default for InsertionOrdered<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash, V: Default> InsertionOrdered<K, V> {
    fn get_or_insert_default(&mut self, key: K) -> &mut V {
        let position = match self.positions.get(&key).copied() {
            Some(position) => position,
            None => {
                let position = self.entries.len();
                self.positions.insert(key.clone(), position);
                self.entries.push((key, V::default()));
                position
            }
        };

        &mut self.entries[position].1
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.positions
            .get(key)
            .map(|position| &self.entries[*position].1)
    }

    fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// One report row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateRow<'a> {
    /// Top-level key.
    pub entity: &'a EntityKey,
    /// Second-level key.
    pub sub_entity: &'a SubEntityKey,
    /// Counters for the cell.
    pub counters: CounterBucket,
}

/// Two-level entity x sub-entity counter store with zeroed baselines.
///
/// Touching a sub-entity creates the `(all, all)` and `(all, sub-entity)`
/// cells and, for a known entity, `(entity, all)` and `(entity, sub-entity)`.
/// Rows iterate in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct AggregateStore {
    cells: InsertionOrdered<EntityKey, InsertionOrdered<SubEntityKey, CounterBucket>>,
}

impl AggregateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sub-entity with zero counts.
    pub fn register(&mut self, entity_id: Option<&str>, sub_entity: &str) {
        for (entity, sub_entity) in Self::mirrored_keys(entity_id, sub_entity) {
            self.cell_mut(entity, sub_entity);
        }
    }

    /// Records one outcome, mirroring it into every aggregate cell.
    pub fn record(&mut self, entity_id: Option<&str>, sub_entity: &str, outcome: Outcome) {
        for (entity, sub_entity) in Self::mirrored_keys(entity_id, sub_entity) {
            self.cell_mut(entity, sub_entity).increment(outcome);
        }
    }

    /// Returns counters for one cell.
    #[must_use]
    pub fn cell(&self, entity: &EntityKey, sub_entity: &SubEntityKey) -> Option<CounterBucket> {
        self.cells
            .get(entity)
            .and_then(|sub_entities| sub_entities.get(sub_entity))
            .copied()
    }

    /// Iterates every cell in first-seen order.
    pub fn rows(&self) -> impl Iterator<Item = AggregateRow<'_>> {
        self.cells.iter().flat_map(|(entity, sub_entities)| {
            sub_entities
                .iter()
                .map(move |(sub_entity, counters)| AggregateRow {
                    entity,
                    sub_entity,
                    counters: *counters,
                })
        })
    }

    /// Returns the number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.iter().map(|(_, sub_entities)| sub_entities.len()).sum()
    }

    /// Returns true when nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.len() == 0
    }

    fn cell_mut(&mut self, entity: EntityKey, sub_entity: SubEntityKey) -> &mut CounterBucket {
        self.cells
            .get_or_insert_default(entity)
            .get_or_insert_default(sub_entity)
    }

    fn mirrored_keys(
        entity_id: Option<&str>,
        sub_entity: &str,
    ) -> Vec<(EntityKey, SubEntityKey)> {
        let named = SubEntityKey::Named(sub_entity.to_owned());
        let mut keys = vec![
            (EntityKey::All, SubEntityKey::All),
            (EntityKey::All, named.clone()),
        ];
        if let Some(entity_id) = entity_id {
            let entity = EntityKey::Entity(entity_id.to_owned());
            keys.push((entity.clone(), SubEntityKey::All));
            keys.push((entity, named));
        }

        keys
    }
}
