//! Authoritative in-memory mirror of a remote entity collection.
//!
//! Snapshots (initial load, poll refresh) and push discoveries are merged into
//! one ordered map. Absence from a snapshot never deletes an entity: snapshots
//! may be partial or filtered server-side, so only an explicit delete removes.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use shared::scalar_key;

pub const PROPERTIES_FIELD: &str = "properties";

/// Where previously unseen keys land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionPolicy {
    Append,
    /// Newest first; the oldest entries beyond the cap are discarded.
    PrependCapped(usize),
}

/// How raw records map onto entities for one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionShape {
    /// Candidate key fields, first present wins.
    pub key_fields: Vec<&'static str>,
    /// Sub-maps merged per field instead of replaced wholesale.
    pub merged_maps: Vec<&'static str>,
    pub insertion: InsertionPolicy,
}

impl CollectionShape {
    pub fn key_of(&self, fields: &Map<String, Value>) -> Option<String> {
        self.key_fields
            .iter()
            .find_map(|name| fields.get(*name).and_then(scalar_key))
    }
}

/// An opaque record with a stable key.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Entity {
    key: String,
    fields: Map<String, Value>,
}

impl Entity {
    pub fn new(key: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(Value::as_bool)
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.fields
            .get(PROPERTIES_FIELD)
            .and_then(Value::as_object)
            .and_then(|properties| properties.get(name))
    }

    /// Incoming top-level values win per field. Fields listed in
    /// `merged_maps` are merged key by key when both sides are objects; a null
    /// incoming value for such a field leaves the existing map untouched.
    fn merge_fields(&mut self, incoming: Map<String, Value>, merged_maps: &[&str]) {
        for (name, value) in incoming {
            let deep = merged_maps.contains(&name.as_str());
            match value {
                Value::Object(incoming_map) if deep => match self.fields.get_mut(&name) {
                    Some(Value::Object(existing)) => existing.extend(incoming_map),
                    _ => {
                        self.fields.insert(name, Value::Object(incoming_map));
                    }
                },
                Value::Null if deep => {}
                value => {
                    self.fields.insert(name, value);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: usize,
    pub updated: usize,
    /// Records without a usable key, or not objects at all.
    pub skipped: usize,
    /// Entities discarded by the prepend cap.
    pub evicted: usize,
}

#[derive(Debug, Clone)]
pub struct LiveCollection {
    shape: CollectionShape,
    entities: IndexMap<String, Entity>,
}

impl LiveCollection {
    pub fn new(shape: CollectionShape) -> Self {
        Self {
            shape,
            entities: IndexMap::new(),
        }
    }

    pub fn shape(&self) -> &CollectionShape {
        &self.shape
    }

    /// Clear and re-populate in input order. Duplicate keys collapse into the
    /// first occurrence using the merge rule.
    pub fn replace_all(&mut self, records: Vec<Value>) -> MergeReport {
        self.entities.clear();
        let mut report = MergeReport::default();

        for record in records {
            let Some((key, fields)) = self.split_record(record) else {
                report.skipped += 1;
                continue;
            };
            match self.entities.get_mut(&key) {
                Some(existing) => {
                    existing.merge_fields(fields, &self.shape.merged_maps);
                    report.updated += 1;
                }
                None => {
                    self.entities.insert(key.clone(), Entity::new(key, fields));
                    report.inserted += 1;
                }
            }
        }

        report.evicted = self.enforce_cap();
        report
    }

    /// Merge a snapshot or a batch of push discoveries. Known keys are
    /// field-merged in place; new keys follow the insertion policy. New keys
    /// prepended in one call keep their relative order.
    pub fn merge(&mut self, records: Vec<Value>) -> MergeReport {
        let mut report = MergeReport::default();
        let mut front = 0;

        for record in records {
            let Some((key, fields)) = self.split_record(record) else {
                report.skipped += 1;
                continue;
            };

            if let Some(existing) = self.entities.get_mut(&key) {
                existing.merge_fields(fields, &self.shape.merged_maps);
                report.updated += 1;
                continue;
            }

            let entity = Entity::new(key.clone(), fields);
            match self.shape.insertion {
                InsertionPolicy::Append => {
                    self.entities.insert(key, entity);
                }
                InsertionPolicy::PrependCapped(_) => {
                    self.entities.shift_insert(front, key, entity);
                    front += 1;
                }
            }
            report.inserted += 1;
        }

        report.evicted = self.enforce_cap();
        report
    }

    /// Field-merge into a known entity. Returns false (and does nothing) when
    /// the key is unknown.
    pub fn apply_patch(&mut self, key: &str, patch: Map<String, Value>) -> bool {
        match self.entities.get_mut(key) {
            Some(entity) => {
                entity.merge_fields(patch, &self.shape.merged_maps);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Entity> {
        self.entities.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entities.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    fn split_record(&self, record: Value) -> Option<(String, Map<String, Value>)> {
        let Value::Object(fields) = record else {
            return None;
        };
        let key = self.shape.key_of(&fields)?;
        Some((key, fields))
    }

    fn enforce_cap(&mut self) -> usize {
        let InsertionPolicy::PrependCapped(cap) = self.shape.insertion else {
            return 0;
        };
        let mut evicted = 0;
        while self.entities.len() > cap {
            self.entities.pop();
            evicted += 1;
        }
        evicted
    }
}
