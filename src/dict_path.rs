//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Path-based access to exported data.
//!
//! These helpers address a [`DictValue`] tree with simple data paths such as
//! `/conf/net[name='mgmt']/routing` or `/lst[.='v']`. Module prefixes are
//! accepted and ignored, maps being indexed by plain node names. Lists may be
//! [`KeyedList`]s, looked up by key, or [`DictValue::Array`]s, searched in
//! order and the only ones supporting positional insertion.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use regex::Regex;

use crate::error::{Error, ErrorCode, Result};
use crate::keyed_list::{value_key, DictValue, KeyedList, ListKey};
use crate::schema::DataValue;

/// One step of a data path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathSegment {
    pub prefix: Option<String>,
    pub name: String,
    /// Key predicates as `(name, value)`, `.` naming leaf-list values.
    pub keys: Vec<(String, String)>,
}

// ===== global functions =====

/// Split a data path into its segments. Relative paths are accepted.
///
/// Key values may be quoted with either quote character; a backslash escapes
/// the next character.
pub fn xpath_split(xpath: &str) -> Result<Vec<PathSegment>> {
    let trimmed = xpath.trim();
    if trimmed.is_empty() {
        return Err(invalid_path(xpath, "empty path"));
    }
    let xpath = match trimmed.starts_with('/') {
        true => trimmed.to_owned(),
        false => format!("/{}", trimmed),
    };
    let element = Regex::new(r"^/(?:(?P<prefix>[-\w]+):)?(?P<name>[-\w*]+)")
        .map_err(|err| Error::new(ErrorCode::Native, err.to_string()))?;

    let mut segments = Vec::new();
    let mut rest = xpath.as_str();
    while !rest.is_empty() {
        let Some(captures) = element.captures(rest) else {
            return Err(invalid_path(
                &xpath,
                &format!("expected a node name at index {}", xpath.len() - rest.len()),
            ));
        };
        let prefix = captures.name("prefix").map(|m| m.as_str().to_owned());
        let name = captures["name"].to_owned();
        rest = &rest[captures[0].len()..];

        let mut keys = Vec::new();
        while let Some(predicate) = rest.strip_prefix('[') {
            let (key, remaining) = split_predicate(predicate)
                .ok_or_else(|| invalid_path(&xpath, "malformed key predicate"))?;
            keys.push(key);
            rest = remaining;
        }
        segments.push(PathSegment { prefix, name, keys });
    }
    Ok(segments)
}

/// Get the element at the given path, `None` when it does not exist.
///
/// Fails when the data does not have the structure the path implies.
pub fn xpath_get<'d>(data: &'d DictValue, xpath: &str) -> Result<Option<&'d DictValue>> {
    let segments = xpath_split(xpath)?;
    let mut data = data;
    for segment in &segments {
        let DictValue::Map(map) = data else {
            return Err(unexpected("a map"));
        };
        let Some(child) = map.get(&segment.name) else {
            return Ok(None);
        };
        data = match segment.keys.is_empty() {
            true => child,
            false => match find_entry(child, &segment.keys)? {
                Some(entry) => entry,
                None => return Ok(None),
            },
        };
    }
    Ok(Some(data))
}

/// Get all the elements matching the given path. A segment name may contain
/// `*` wildcards and lists addressed without keys yield all their elements.
///
/// The order of the results is not specified.
pub fn xpath_get_all<'d>(data: &'d DictValue, xpath: &str) -> Result<Vec<&'d DictValue>> {
    let segments = xpath_split(xpath)?;
    let mut found = Vec::new();
    collect(data, &segments, &mut found);
    Ok(found)
}

/// Set the element at the given path, creating the missing parents.
///
/// An existing element is replaced only when `force` is set, otherwise it is
/// returned unchanged. For a new list element, `after` selects its position:
/// `None` appends, `Some("")` prepends, `Some("v")` inserts after the
/// leaf-list value `v` and `Some("[k='v']")` after the matching list entry.
/// Positions are only supported in [`DictValue::Array`] lists.
pub fn xpath_set<'d>(
    data: &'d mut DictValue,
    xpath: &str,
    value: DictValue,
    force: bool,
    after: Option<&str>,
) -> Result<&'d mut DictValue> {
    let segments = xpath_split(xpath)?;
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| invalid_path(xpath, "empty path"))?;
    let parent = descend_mut(data, parents, true)?
        .ok_or_else(|| Error::not_found(format!("Parent of \"{}\" not found.", xpath)))?;
    let DictValue::Map(map) = parent else {
        return Err(unexpected("a map"));
    };

    if last.keys.is_empty() {
        return Ok(match map.entry(last.name.clone()) {
            Entry::Occupied(mut entry) => {
                if force {
                    entry.insert(value);
                }
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(value),
        });
    }

    let list = map.entry(last.name.clone()).or_insert_with(|| match after {
        Some(_) => DictValue::Array(Vec::new()),
        None => new_list(&last.keys),
    });
    match list {
        DictValue::List(keyed) | DictValue::LeafList(keyed) => {
            if after.is_some() {
                return Err(Error::new(
                    ErrorCode::InvalidValue,
                    "Keyed lists have no positions to insert after.",
                ));
            }
            let key = lookup_key(keyed, &last.keys)?;
            if !keyed.contains_key(&key) {
                keyed.append(value)?;
            } else if force {
                keyed.pop(&key);
                keyed.append(value)?;
            }
            keyed.get_mut(&key).ok_or_else(|| {
                Error::not_found(format!("Element \"{}\" not found after insertion.", xpath))
            })
        }
        DictValue::Array(items) => {
            let index = match find_index(&last.keys, items)? {
                Some(index) => {
                    if force {
                        items[index] = value;
                    }
                    index
                }
                None => {
                    let index = match after {
                        None => items.len(),
                        Some("") => 0,
                        Some(after) => after_index(after, items)? + 1,
                    };
                    items.insert(index, value);
                    index
                }
            };
            Ok(&mut items[index])
        }
        _ => Err(unexpected("a list")),
    }
}

/// Set the element at the given path unless it already exists. Returns the
/// element found in the data.
pub fn xpath_set_default<'d>(
    data: &'d mut DictValue,
    xpath: &str,
    value: DictValue,
) -> Result<&'d mut DictValue> {
    xpath_set(data, xpath, value, false, None)
}

/// Remove the element at the given path. Returns whether it existed. A list
/// left empty is removed as well.
pub fn xpath_del(data: &mut DictValue, xpath: &str) -> Result<bool> {
    let segments = xpath_split(xpath)?;
    let Some((last, parents)) = segments.split_last() else {
        return Ok(false);
    };
    let Some(DictValue::Map(map)) = descend_mut(data, parents, false)? else {
        return Ok(false);
    };
    if last.keys.is_empty() {
        return Ok(map.remove(&last.name).is_some());
    }
    let Some(list) = map.get_mut(&last.name) else {
        return Ok(false);
    };
    let removed = match list {
        DictValue::List(keyed) | DictValue::LeafList(keyed) => {
            match lookup_key(keyed, &last.keys) {
                Ok(key) => keyed.pop(&key).is_some(),
                Err(_) => false,
            }
        }
        DictValue::Array(items) => match find_index(&last.keys, items) {
            Ok(Some(index)) => {
                items.remove(index);
                true
            }
            _ => false,
        },
        _ => false,
    };
    let empty = match list {
        DictValue::List(keyed) | DictValue::LeafList(keyed) => keyed.is_empty(),
        DictValue::Array(items) => items.is_empty(),
        _ => false,
    };
    if removed && empty {
        map.remove(&last.name);
    }
    Ok(removed)
}

/// Move a list element within its [`DictValue::Array`] list. `after` has the
/// meaning it has for [`xpath_set`].
pub fn xpath_move(data: &mut DictValue, xpath: &str, after: Option<&str>) -> Result<()> {
    let segments = xpath_split(xpath)?;
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| invalid_path(xpath, "empty path"))?;
    let not_found = || Error::not_found(format!("Element \"{}\" not found.", xpath));
    let Some(DictValue::Map(map)) = descend_mut(data, parents, false)? else {
        return Err(not_found());
    };
    let list = map.get_mut(&last.name).ok_or_else(not_found)?;
    if last.keys.is_empty() {
        return Err(Error::new(
            ErrorCode::InvalidValue,
            format!("Path \"{}\" does not designate a list element.", xpath),
        ));
    }
    let items = match list {
        DictValue::Array(items) => items,
        DictValue::List(_) | DictValue::LeafList(_) => {
            return Err(Error::new(
                ErrorCode::InvalidValue,
                "Elements of keyed lists cannot be moved.",
            ))
        }
        _ => return Err(unexpected("a list")),
    };

    let index = find_index(&last.keys, items)?.ok_or_else(not_found)?;
    let target = match after {
        None => items.len() - 1,
        Some("") => 0,
        Some(after) => {
            let position = after_index(after, items)?;
            if index > position {
                position + 1
            } else {
                position
            }
        }
    };
    let moved = items.remove(index);
    items.insert(target, moved);
    Ok(())
}

// ===== helper functions =====

fn invalid_path(xpath: &str, detail: &str) -> Error {
    Error::syntax(format!("Invalid path \"{}\" - {}.", xpath, detail))
}

fn unexpected(what: &str) -> Error {
    Error::invalid_value(format!("Unexpected data structure, expected {}.", what))
}

// Parse `name='value']` (the opening bracket already consumed).
fn split_predicate(predicate: &str) -> Option<((String, String), &str)> {
    let (name, rest) = predicate.split_once('=')?;
    let mut chars = rest.char_indices();
    let (_, quote) = chars.next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let mut value = String::new();
    let mut escaped = false;
    for (index, c) in chars {
        if escaped {
            value.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            let rest = rest[index + c.len_utf8()..].strip_prefix(']')?;
            return Some(((name.trim().to_owned(), value), rest));
        } else {
            value.push(c);
        }
    }
    None
}

fn is_leaf_list_keys(keys: &[(String, String)]) -> bool {
    keys.first().is_some_and(|(name, _)| name == ".")
}

fn new_list(keys: &[(String, String)]) -> DictValue {
    match is_leaf_list_keys(keys) {
        true => DictValue::LeafList(KeyedList::new_leaf_list()),
        false => DictValue::List(KeyedList::new_list(keys.iter().map(|(name, _)| name.clone()))),
    }
}

// List entry holding only its keys.
fn key_entry(keys: &[(String, String)]) -> DictValue {
    DictValue::Map(
        keys.iter()
            .map(|(name, value)| (name.clone(), DictValue::Value(DataValue::Other(value.clone()))))
            .collect(),
    )
}

// Key of a keyed list element, from path predicates given in any order.
fn lookup_key(list: &KeyedList, keys: &[(String, String)]) -> Result<ListKey> {
    let Some(names) = list.key_names() else {
        return match keys {
            [(name, value)] if name == "." => Ok(ListKey::Value(value.clone())),
            _ => Err(Error::new(
                ErrorCode::InvalidValue,
                "Leaf-list elements are selected with a single [.='value'] predicate.",
            )),
        };
    };
    let mut values = Vec::with_capacity(names.len());
    for name in names {
        let value = keys
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::InvalidValue,
                    format!("Missing key \"{}\" in path predicates.", name),
                )
            })?;
        values.push(value);
    }
    Ok(match values.len() {
        1 => ListKey::Single(values.remove(0)),
        _ => ListKey::Tuple(values),
    })
}

// Position of the element matching the predicates in an ordered list.
fn find_index(keys: &[(String, String)], items: &[DictValue]) -> Result<Option<usize>> {
    if is_leaf_list_keys(keys) {
        let wanted = &keys[0].1;
        return Ok(items.iter().position(|item| match item {
            DictValue::Value(value) => value_key(value) == *wanted,
            _ => false,
        }));
    }
    for (index, item) in items.iter().enumerate() {
        let DictValue::Map(members) = item else {
            return Err(unexpected("a map"));
        };
        let matches = keys.iter().all(|(name, wanted)| match members.get(name) {
            Some(DictValue::Value(value)) => value_key(value) == *wanted,
            _ => false,
        });
        if matches {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

// Position of the element designated by an `after` argument.
fn after_index(after: &str, items: &[DictValue]) -> Result<usize> {
    let keys = match after.starts_with('[') {
        true => xpath_split(&format!("/*{}", after))?
            .into_iter()
            .next()
            .map(|segment| segment.keys)
            .unwrap_or_default(),
        false => vec![(".".to_owned(), after.to_owned())],
    };
    if keys.is_empty() {
        return Err(invalid_path(after, "missing key predicate"));
    }
    find_index(&keys, items)?
        .ok_or_else(|| Error::not_found(format!("Element \"{}\" not found in list.", after)))
}

fn find_entry<'d>(list: &'d DictValue, keys: &[(String, String)]) -> Result<Option<&'d DictValue>> {
    match list {
        DictValue::List(keyed) | DictValue::LeafList(keyed) => {
            Ok(keyed.get(&lookup_key(keyed, keys)?))
        }
        DictValue::Array(items) => Ok(find_index(keys, items)?.map(|index| &items[index])),
        _ => Err(unexpected("a list")),
    }
}

fn descend_mut<'d>(
    mut data: &'d mut DictValue,
    segments: &[PathSegment],
    create: bool,
) -> Result<Option<&'d mut DictValue>> {
    for segment in segments {
        let DictValue::Map(map) = data else {
            return Err(unexpected("a map"));
        };
        let child = match map.entry(segment.name.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) if create => entry.insert(match segment.keys.is_empty() {
                true => DictValue::Map(BTreeMap::new()),
                false => new_list(&segment.keys),
            }),
            Entry::Vacant(_) => return Ok(None),
        };
        if segment.keys.is_empty() {
            data = child;
            continue;
        }
        data = match child {
            DictValue::List(keyed) | DictValue::LeafList(keyed) => {
                let key = lookup_key(keyed, &segment.keys)?;
                if !keyed.contains_key(&key) {
                    if !create {
                        return Ok(None);
                    }
                    keyed.append(key_entry(&segment.keys))?;
                }
                match keyed.get_mut(&key) {
                    Some(entry) => entry,
                    None => return Ok(None),
                }
            }
            DictValue::Array(items) => {
                let index = match find_index(&segment.keys, items)? {
                    Some(index) => index,
                    None if create => {
                        items.push(key_entry(&segment.keys));
                        items.len() - 1
                    }
                    None => return Ok(None),
                };
                &mut items[index]
            }
            _ => return Err(unexpected("a list")),
        };
    }
    Ok(Some(data))
}

fn collect<'d>(data: &'d DictValue, segments: &[PathSegment], found: &mut Vec<&'d DictValue>) {
    let Some((segment, rest)) = segments.split_first() else {
        found.push(data);
        return;
    };
    let DictValue::Map(map) = data else {
        return;
    };
    for (name, child) in map {
        if !matches_name(&segment.name, name) {
            continue;
        }
        if !segment.keys.is_empty() {
            if let Ok(Some(entry)) = find_entry(child, &segment.keys) {
                collect(entry, rest, found);
            }
            continue;
        }
        match child {
            DictValue::List(keyed) | DictValue::LeafList(keyed) => {
                for item in keyed {
                    collect(item, rest, found);
                }
            }
            DictValue::Array(items) => {
                for item in items {
                    collect(item, rest, found);
                }
            }
            _ => collect(child, rest, found),
        }
    }
}

// Glob match supporting `*` only.
fn matches_name(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == name,
        Some((head, tail)) => name.strip_prefix(head).is_some_and(|rest| {
            (0..=rest.len())
                .filter(|index| rest.is_char_boundary(*index))
                .any(|index| matches_name(tail, &rest[index..]))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(prefix: Option<&str>, name: &str, keys: &[(&str, &str)]) -> PathSegment {
        PathSegment {
            prefix: prefix.map(str::to_owned),
            name: name.to_owned(),
            keys: keys
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn split_paths() {
        assert_eq!(
            xpath_split("/p:nam").unwrap(),
            vec![segment(Some("p"), "nam", &[])]
        );
        assert_eq!(
            xpath_split("/nam1/p:nam2").unwrap(),
            vec![segment(None, "nam1", &[]), segment(Some("p"), "nam2", &[])]
        );
        assert_eq!(
            xpath_split("/p:nam/lst[.=\"foo\"]").unwrap(),
            vec![segment(Some("p"), "nam", &[]), segment(None, "lst", &[(".", "foo")])]
        );
        assert_eq!(
            xpath_split("/nam/p:lst[k1='foo'][k2='bar']/x").unwrap(),
            vec![
                segment(None, "nam", &[]),
                segment(Some("p"), "lst", &[("k1", "foo"), ("k2", "bar")]),
                segment(None, "x", &[]),
            ]
        );
        assert_eq!(
            xpath_split(r#"/nam/p:lst[k1='=:[/]\'']/l2[k2="dead::beef/64"]"#).unwrap(),
            vec![
                segment(None, "nam", &[]),
                segment(Some("p"), "lst", &[("k1", "=:[/]'")]),
                segment(None, "l2", &[("k2", "dead::beef/64")]),
            ]
        );
        assert_eq!(
            xpath_split("foo/bar").unwrap(),
            vec![segment(None, "foo", &[]), segment(None, "bar", &[])]
        );

        for invalid in ["", "  ", "//invalid/xpath", "/xxx[abc='2']invalid:xx/xpath", "/a[k='v"] {
            assert_eq!(
                xpath_split(invalid).unwrap_err().errcode,
                ErrorCode::Syntax,
                "{}",
                invalid
            );
        }
    }

    #[test]
    fn glob_names() {
        assert!(matches_name("a*", "a1"));
        assert!(matches_name("*", "routing"));
        assert!(matches_name("r*g", "routing"));
        assert!(!matches_name("a*", "ba"));
        assert!(!matches_name("vrf", "vrf1"));
    }
}
