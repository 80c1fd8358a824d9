//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Generic structured export of data trees.
//!
//! YANG lists are indexed by their keys rather than by position. A
//! [`KeyedList`] stores list entries (or leaf-list values) by key, rejects
//! duplicates and compares equal to another one holding the same keys and
//! elements, whatever the insertion order.

use std::collections::BTreeMap;

use crate::data::{DataNodeRef, DataTree};
use crate::error::{Error, ErrorCode, Result};
use crate::schema::{DataValue, SchemaNodeKind};

/// Key of a [`KeyedList`] element.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ListKey {
    /// Leaf-list value.
    Value(String),
    /// List with a single key.
    Single(String),
    /// List with several keys, in schema order.
    Tuple(Vec<String>),
}

/// Exported data node.
#[derive(Clone, Debug, PartialEq)]
pub enum DictValue {
    /// Container, list entry, rpc or notification: children by name.
    Map(BTreeMap<String, DictValue>),
    /// All instances of a list.
    List(KeyedList),
    /// All instances of a leaf-list.
    LeafList(KeyedList),
    /// Ordered elements, searched by position rather than by key.
    Array(Vec<DictValue>),
    /// Leaf value.
    Value(DataValue),
}

/// List whose elements are indexed by key. There is no positional access.
#[derive(Clone, Debug)]
pub struct KeyedList {
    /// Key leaf names, `None` for leaf-lists.
    key_names: Option<Vec<String>>,
    map: BTreeMap<ListKey, DictValue>,
}

// ===== impl ListKey =====

impl ListKey {
    /// Key of a single-key list entry. Booleans are converted the way they
    /// are stored in data trees.
    pub fn single(value: &DataValue) -> ListKey {
        ListKey::Single(value_key(value))
    }
}

impl From<&str> for ListKey {
    fn from(value: &str) -> ListKey {
        ListKey::Single(value.to_owned())
    }
}

// ===== impl KeyedList =====

impl KeyedList {
    /// Create an empty leaf-list.
    pub fn new_leaf_list() -> KeyedList {
        KeyedList {
            key_names: None,
            map: BTreeMap::new(),
        }
    }

    /// Create an empty list keyed by the given leaves.
    pub fn new_list<S: Into<String>>(key_names: impl IntoIterator<Item = S>) -> KeyedList {
        KeyedList {
            key_names: Some(key_names.into_iter().map(Into::into).collect()),
            map: BTreeMap::new(),
        }
    }

    /// Names of the key leaves (`None` for leaf-lists).
    pub fn key_names(&self) -> Option<&[String]> {
        self.key_names.as_deref()
    }

    /// Compute the key of an element.
    pub fn element_key(&self, element: &DictValue) -> Result<ListKey> {
        let Some(key_names) = &self.key_names else {
            return match element {
                DictValue::Value(value) => Ok(ListKey::Value(value_key(value))),
                _ => Err(Error::new(
                    ErrorCode::InvalidValue,
                    "Leaf-list elements must be values",
                )),
            };
        };
        let DictValue::Map(members) = element else {
            return Err(Error::new(
                ErrorCode::InvalidValue,
                "List elements must be maps",
            ));
        };
        let mut values = Vec::with_capacity(key_names.len());
        for name in key_names {
            match members.get(name) {
                Some(DictValue::Value(value)) => values.push(value_key(value)),
                _ => {
                    return Err(Error::new(
                        ErrorCode::InvalidValue,
                        format!("List element is missing key \"{}\"", name),
                    ))
                }
            }
        }
        if values.len() == 1 {
            Ok(ListKey::Single(values.remove(0)))
        } else {
            Ok(ListKey::Tuple(values))
        }
    }

    /// Add an element. Fails if an element with the same key exists.
    pub fn append(&mut self, element: DictValue) -> Result<()> {
        let key = self.element_key(&element)?;
        if self.map.contains_key(&key) {
            return Err(Error::new(
                ErrorCode::KeyConflict,
                format!("Element with key {:?} already in list", key),
            ));
        }
        self.map.insert(key, element);
        Ok(())
    }

    /// Add all elements of an iterator.
    pub fn extend(&mut self, elements: impl IntoIterator<Item = DictValue>) -> Result<()> {
        for element in elements {
            self.append(element)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &ListKey) -> Option<&DictValue> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &ListKey) -> Option<&mut DictValue> {
        self.map.get_mut(key)
    }

    /// Remove and return the element with the given key.
    pub fn pop(&mut self, key: &ListKey) -> Option<DictValue> {
        self.map.remove(key)
    }

    /// Remove an element. Fails if no element has its key.
    pub fn remove(&mut self, element: &DictValue) -> Result<()> {
        let key = self.element_key(element)?;
        match self.map.remove(&key) {
            Some(_) => Ok(()),
            None => Err(Error::new(
                ErrorCode::NotFound,
                format!("No element with key {:?}", key),
            )),
        }
    }

    pub fn contains_key(&self, key: &ListKey) -> bool {
        self.map.contains_key(key)
    }

    /// Whether an element with the same key is present.
    pub fn contains(&self, element: &DictValue) -> bool {
        self.element_key(element)
            .map(|key| self.map.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterator over the elements. The order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = &DictValue> {
        self.map.values()
    }

    /// Iterator over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &ListKey> {
        self.map.keys()
    }

    /// Whether this list holds exactly the given elements, in any order.
    pub fn eq_elements(&self, elements: &[DictValue]) -> bool {
        let mut other = BTreeMap::new();
        for element in elements {
            match self.element_key(element) {
                Ok(key) => {
                    other.insert(key, element);
                }
                Err(_) => return false,
            }
        }
        other.len() == self.map.len()
            && other
                .iter()
                .all(|(key, element)| self.map.get(key) == Some(*element))
    }
}

impl PartialEq for KeyedList {
    fn eq(&self, other: &KeyedList) -> bool {
        self.map == other.map
    }
}

impl<'a> IntoIterator for &'a KeyedList {
    type Item = &'a DictValue;
    type IntoIter = std::collections::btree_map::Values<'a, ListKey, DictValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.values()
    }
}

/// String form of a value, as used for list keys.
pub(crate) fn value_key(value: &DataValue) -> String {
    match value {
        DataValue::Uint8(v) => v.to_string(),
        DataValue::Uint16(v) => v.to_string(),
        DataValue::Uint32(v) => v.to_string(),
        DataValue::Uint64(v) => v.to_string(),
        DataValue::Int8(v) => v.to_string(),
        DataValue::Int16(v) => v.to_string(),
        DataValue::Int32(v) => v.to_string(),
        DataValue::Int64(v) => v.to_string(),
        DataValue::Bool(true) => "true".to_owned(),
        DataValue::Bool(false) => "false".to_owned(),
        DataValue::Empty => String::new(),
        DataValue::Other(v) => v.clone(),
    }
}

// ===== impl DataTree =====

impl DataTree<'_> {
    /// Export the whole tree. Top-level nodes are indexed by name.
    pub fn to_dict(&self) -> Result<DictValue> {
        let mut map = BTreeMap::new();
        if let Some(first) = self.reference() {
            insert_nodes(&mut map, first.inclusive_siblings())?;
        }
        Ok(DictValue::Map(map))
    }
}

// ===== impl DataNodeRef =====

impl DataNodeRef<'_, '_> {
    /// Export this node and its subtree, as a map with a single member
    /// named after the node.
    pub fn to_dict(&self) -> Result<DictValue> {
        let mut map = BTreeMap::new();
        insert_nodes(&mut map, std::iter::once(*self))?;
        Ok(DictValue::Map(map))
    }
}

fn insert_nodes<'a, 'b: 'a>(
    map: &mut BTreeMap<String, DictValue>,
    nodes: impl Iterator<Item = DataNodeRef<'a, 'b>>,
) -> Result<()> {
    for node in nodes {
        let name = node.name().to_owned();
        match node.schema().map(|s| s.kind()) {
            Some(SchemaNodeKind::List) => {
                let entry = node_map(&node)?;
                let list = map.entry(name).or_insert_with(|| {
                    let keys: Vec<String> = node
                        .list_keys()
                        .map(|key| key.name().to_owned())
                        .collect();
                    DictValue::List(KeyedList::new_list(keys))
                });
                if let DictValue::List(list) = list {
                    list.append(entry)?;
                }
            }
            Some(SchemaNodeKind::LeafList) => {
                let value = DictValue::Value(node_value(&node));
                let list = map
                    .entry(name)
                    .or_insert_with(|| DictValue::LeafList(KeyedList::new_leaf_list()));
                if let DictValue::LeafList(list) = list {
                    // Duplicates are allowed in state leaf-lists.
                    if !list.contains(&value) {
                        list.append(value)?;
                    }
                }
            }
            Some(SchemaNodeKind::Leaf) => {
                map.insert(name, DictValue::Value(node_value(&node)));
            }
            _ if node.value_canonical().is_some() && node.children().next().is_none() => {
                map.insert(name, DictValue::Value(node_value(&node)));
            }
            _ => {
                map.insert(name, node_map(&node)?);
            }
        }
    }
    Ok(())
}

fn node_map(node: &DataNodeRef<'_, '_>) -> Result<DictValue> {
    let mut map = BTreeMap::new();
    insert_nodes(&mut map, node.children())?;
    Ok(DictValue::Map(map))
}

fn node_value(node: &DataNodeRef<'_, '_>) -> DataValue {
    node.value()
        .or_else(|| node.value_canonical().map(DataValue::Other))
        .unwrap_or(DataValue::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, mtu: u16) -> DictValue {
        let mut map = BTreeMap::new();
        map.insert("name".to_owned(), DictValue::Value(DataValue::Other(name.to_owned())));
        map.insert("mtu".to_owned(), DictValue::Value(DataValue::Uint16(mtu)));
        DictValue::Map(map)
    }

    #[test]
    fn keyed_list_basic() {
        let mut list = KeyedList::new_list(["name"]);
        list.append(entry("eth0", 1500)).unwrap();
        list.append(entry("eth1", 9000)).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&entry("eth0", 1)));
        assert_eq!(list.get(&ListKey::from("eth1")), Some(&entry("eth1", 9000)));

        let err = list.append(entry("eth0", 1400)).unwrap_err();
        assert_eq!(err.errcode, ErrorCode::KeyConflict);

        assert_eq!(list.pop(&"eth0".into()), Some(entry("eth0", 1500)));
        assert_eq!(list.len(), 1);
        assert!(list.remove(&entry("eth0", 1500)).is_err());
    }

    #[test]
    fn keyed_list_equality() {
        let mut a = KeyedList::new_list(["name"]);
        a.extend([entry("x", 1), entry("y", 2)]).unwrap();
        let mut b = KeyedList::new_list(["name"]);
        b.extend([entry("y", 2), entry("x", 1)]).unwrap();
        assert_eq!(a, b);
        assert!(a.eq_elements(&[entry("y", 2), entry("x", 1)]));
        assert!(!a.eq_elements(&[entry("y", 2)]));

        b.pop(&"x".into());
        b.append(entry("x", 3)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn leaf_list_keys() {
        let mut list = KeyedList::new_leaf_list();
        list.append(DictValue::Value(DataValue::Bool(true))).unwrap();
        list.append(DictValue::Value(DataValue::Uint8(3))).unwrap();
        assert!(list.contains_key(&ListKey::Value("true".to_owned())));
        assert!(list.contains_key(&ListKey::Value("3".to_owned())));
        assert!(list
            .append(DictValue::Value(DataValue::Other("3".to_owned())))
            .is_err());
    }

    #[test]
    fn composite_keys() {
        let mut list = KeyedList::new_list(["name", "mtu"]);
        list.append(entry("eth0", 1500)).unwrap();
        list.append(entry("eth0", 9000)).unwrap();
        assert!(list.contains_key(&ListKey::Tuple(vec![
            "eth0".to_owned(),
            "1500".to_owned()
        ])));
        assert!(list.append(DictValue::Value(DataValue::Empty)).is_err());
    }
}
