//! The merged object model handed to output rendering.
//!
//! Every map keeps three parallel collections (values, lists and maps), each an
//! ordered [`MergeMap`]. Entry orders only decide serialization order; they never
//! take part in value resolution.

use crate::ast::{DEFAULT_ORDER, Value};
use ahash::AHashMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

mod merge;

pub use merge::{Merge, sort_model_by_order};

/// One keyed entry of a [`MergeMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    pub key: String,
    pub order: i64,
    pub value: T,
}

/// An insertion-ordered map whose entries carry a serialization order.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeMap<T> {
    entries: Vec<Entry<T>>,
    index: AHashMap<String, usize>,
}

impl<T> Default for MergeMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: AHashMap::new(),
        }
    }
}

impl<T> MergeMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&i| &self.entries[i].value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.index.get(key).map(|&i| &mut self.entries[i].value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn order_of(&self, key: &str) -> Option<i64> {
        self.index.get(key).map(|&i| self.entries[i].order)
    }

    /// Inserts or overwrites an entry. An overwritten entry keeps its position.
    pub fn insert(&mut self, key: &str, order: i64, value: T) {
        match self.index.get(key) {
            Some(&i) => {
                let entry = &mut self.entries[i];
                entry.order = order;
                entry.value = value;
            }
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push(Entry {
                    key: key.to_string(),
                    order,
                    value,
                });
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        let i = self.index.remove(key)?;
        let entry = self.entries.remove(i);
        self.reindex();
        Some(entry.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry<T>> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entry<T>> {
        self.entries.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Stable sort by order; entries of equal order keep their insertion order.
    pub fn sort(&mut self) {
        self.entries.sort_by_key(|e| e.order);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.key.clone(), i))
            .collect();
    }
}

/// An element of a [`ModelList`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModelNode {
    Value(Value),
    List(ModelList),
    Map(ModelMap),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub order: i64,
    pub node: ModelNode,
}

/// A model list. Merging two lists concatenates them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelList {
    items: Vec<ListItem>,
}

impl ModelList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, order: i64, node: ModelNode) {
        self.items.push(ListItem { order, node });
    }

    pub fn push_value(&mut self, value: impl Into<Value>) {
        self.push(DEFAULT_ORDER, ModelNode::Value(value.into()));
    }

    pub fn items(&self) -> &[ListItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<ListItem> {
        &mut self.items
    }
}

/// A model map with its three parallel collections.
///
/// A key lives in at most one of the collections: inserting a value under a key
/// held by a list or map replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelMap {
    pub values: MergeMap<Value>,
    pub lists: MergeMap<ModelList>,
    pub maps: MergeMap<ModelMap>,
}

/// The root of the merged model of a run.
pub type MergedModel = ModelMap;

impl ModelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.lists.is_empty() && self.maps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len() + self.lists.len() + self.maps.len()
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn list(&self, key: &str) -> Option<&ModelList> {
        self.lists.get(key)
    }

    pub fn map(&self, key: &str) -> Option<&ModelMap> {
        self.maps.get(key)
    }

    pub fn insert_value(&mut self, key: &str, order: i64, value: Value) {
        self.lists.remove(key);
        self.maps.remove(key);
        self.values.insert(key, order, value);
    }

    /// Merges `list` into the list at `key`, creating it if needed.
    pub fn merge_list(&mut self, key: &str, order: i64, list: ModelList) {
        self.values.remove(key);
        self.maps.remove(key);
        match self.lists.get_mut(key) {
            Some(existing) => existing.merge(list),
            None => self.lists.insert(key, order, list),
        }
    }

    /// Merges `map` into the map at `key`, creating it if needed.
    pub fn merge_map(&mut self, key: &str, order: i64, map: ModelMap) {
        self.values.remove(key);
        self.lists.remove(key);
        match self.maps.get_mut(key) {
            Some(existing) => existing.merge(map),
            None => self.maps.insert(key, order, map),
        }
    }

    /// Looks up a value by key, then by dotted path through nested maps.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.values.get(path) {
            return Some(value);
        }
        let (head, rest) = match path.rsplit_once('.') {
            Some((head, rest)) => (Some(head), rest),
            None => (None, path),
        };
        let mut map = self;
        if let Some(head) = head {
            for segment in head.split('.') {
                map = map.maps.get(segment)?;
            }
        }
        map.values.get(rest)
    }

    /// Keys of all three collections in serialization order.
    pub fn keys(&self) -> Vec<&str> {
        self.values
            .keys()
            .chain(self.lists.keys())
            .chain(self.maps.keys())
            .collect()
    }

    /// Renders the model as a JSON object, keeping serialization order.
    pub fn to_json_string(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

/// Serializes a [`Value`] as its plain JSON counterpart.
struct PlainValue<'a>(&'a Value);

impl Serialize for PlainValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_unit(),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl Serialize for ModelNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ModelNode::Value(value) => PlainValue(value).serialize(serializer),
            ModelNode::List(list) => list.serialize(serializer),
            ModelNode::Map(map) => map.serialize(serializer),
        }
    }
}

impl Serialize for ModelList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for item in &self.items {
            seq.serialize_element(&item.node)?;
        }
        seq.end()
    }
}

impl Serialize for ModelMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for entry in self.values.iter() {
            map.serialize_entry(&entry.key, &PlainValue(&entry.value))?;
        }
        for entry in self.lists.iter() {
            map.serialize_entry(&entry.key, &entry.value)?;
        }
        for entry in self.maps.iter() {
            map.serialize_entry(&entry.key, &entry.value)?;
        }
        map.end()
    }
}
