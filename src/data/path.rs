//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Data paths.
//!
//! A data path is a sequence of `/`-separated node names, the first one (and
//! any one changing module) prefixed with its module name. List instances
//! are selected with key predicates (`list[key='value']`), leaf-list
//! instances with a value predicate (`leaf-list[.='value']`) and instances of
//! key-less lists or state leaf-lists with a position (`list[2]`).

use crate::compiled::{CNodeKind, NodeFlags};
use crate::data::{Content, DataNewPathFlags, DataTree};
use crate::error::{Error, ErrorCode, Result};
use crate::ids::{DataId, ModuleId, SchemaId};
use crate::value::PrefixFormat;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Segment {
    pub module: Option<String>,
    pub name: String,
    pub predicates: Vec<Predicate>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Predicate {
    /// `[key='value']`
    Key(String, String),
    /// `[.='value']`
    Value(String),
    /// `[n]`, 1-based.
    Position(usize),
}

/// Parsed data path.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DataPath {
    pub absolute: bool,
    pub segments: Vec<Segment>,
}

// ===== parsing =====

struct PathParser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> PathParser<'s> {
    fn error(&self, msg: &str) -> Error {
        Error::syntax(format!(
            "Invalid data path \"{}\" at position {}: {}.",
            self.src, self.pos, msg
        ))
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn identifier(&mut self) -> Result<&'s str> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("expected identifier"));
        }
        Ok(&self.src[start..self.pos])
    }

    // Optionally prefixed name.
    fn qname(&mut self) -> Result<(Option<&'s str>, &'s str)> {
        let first = self.identifier()?;
        if self.eat(':') {
            let name = self.identifier()?;
            Ok((Some(first), name))
        } else {
            Ok((None, first))
        }
    }

    fn quoted(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(c @ ('\'' | '"')) => c,
            _ => return Err(self.error("expected quoted value")),
        };
        self.pos += 1;
        let start = self.pos;
        let end = self.src[start..]
            .find(quote)
            .ok_or_else(|| self.error("unterminated quoted value"))?;
        self.pos = start + end + 1;
        Ok(self.src[start..start + end].to_owned())
    }

    fn predicate(&mut self) -> Result<Predicate> {
        self.skip_ws();
        let predicate = match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let position = self.src[start..self.pos]
                    .parse::<usize>()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| self.error("invalid position"))?;
                Predicate::Position(position)
            }
            Some('.') => {
                self.pos += 1;
                self.skip_ws();
                if !self.eat('=') {
                    return Err(self.error("expected '='"));
                }
                self.skip_ws();
                Predicate::Value(self.quoted()?)
            }
            _ => {
                // Key names may be prefixed, the prefix is implied.
                let (_, name) = self.qname()?;
                self.skip_ws();
                if !self.eat('=') {
                    return Err(self.error("expected '='"));
                }
                self.skip_ws();
                Predicate::Key(name.to_owned(), self.quoted()?)
            }
        };
        self.skip_ws();
        if !self.eat(']') {
            return Err(self.error("expected ']'"));
        }
        Ok(predicate)
    }

    fn predicates(&mut self) -> Result<Vec<Predicate>> {
        let mut predicates = Vec::new();
        while self.eat('[') {
            predicates.push(self.predicate()?);
        }
        Ok(predicates)
    }
}

/// Parse a data path.
pub(crate) fn parse(src: &str) -> Result<DataPath> {
    let mut parser = PathParser { src, pos: 0 };
    let absolute = parser.eat('/');
    let mut segments = Vec::new();
    loop {
        let (module, name) = parser.qname()?;
        let predicates = parser.predicates()?;
        segments.push(Segment {
            module: module.map(str::to_owned),
            name: name.to_owned(),
            predicates,
        });
        if parser.pos == src.len() {
            break;
        }
        if !parser.eat('/') {
            return Err(parser.error("expected '/'"));
        }
    }
    Ok(DataPath { absolute, segments })
}

/// Parse a standalone sequence of predicates (`[k1='v1'][k2='v2']`).
pub(crate) fn parse_predicates(src: &str) -> Result<Vec<Predicate>> {
    let mut parser = PathParser { src, pos: 0 };
    parser.skip_ws();
    let predicates = parser.predicates()?;
    parser.skip_ws();
    if parser.pos != src.len() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(predicates)
}

// ===== resolution =====

// Resolve the schema node of a segment. `Ok(None)` means the parent is an
// opaque node.
fn segment_schema(
    tree: &DataTree<'_>,
    parent: Option<DataId>,
    segment: &Segment,
    output: bool,
) -> Result<Option<SchemaId>> {
    let schema = tree.schema();
    let parent_schema = match parent {
        Some(parent) => match tree.node(parent).schema {
            Some(s) => Some(s),
            None => return Ok(None),
        },
        None => None,
    };
    let module = segment_module(tree, parent_schema, segment)?;
    schema
        .find_data_child(parent_schema, Some(module), &segment.name, output)
        .map(Some)
        .ok_or_else(|| {
            Error::not_found(format!(
                "Schema node \"{}:{}\" not found.",
                schema.module(module).name,
                segment.name
            ))
        })
}

fn segment_module(
    tree: &DataTree<'_>,
    parent_schema: Option<SchemaId>,
    segment: &Segment,
) -> Result<ModuleId> {
    let schema = tree.schema();
    match (&segment.module, parent_schema) {
        (Some(name), _) => schema.module_by_name(name).ok_or_else(|| {
            Error::new(
                ErrorCode::ModuleNotFound,
                format!("Module \"{}\" not found.", name),
            )
        }),
        (None, Some(parent)) => Ok(schema.node(parent).module),
        (None, None) => Err(Error::syntax(format!(
            "Top-level node \"{}\" is missing its module name.",
            segment.name
        ))),
    }
}

fn opaque_matches(tree: &DataTree<'_>, id: DataId, segment: &Segment) -> bool {
    match &tree.node(id).content {
        Content::Opaque { name, module, .. } => {
            *name == segment.name
                && (segment.module.is_none() || *module == segment.module)
        }
        _ => false,
    }
}

// Whether an instance satisfies the key and value predicates of a segment.
fn predicates_match(
    tree: &DataTree<'_>,
    id: DataId,
    schema: SchemaId,
    predicates: &[Predicate],
) -> bool {
    predicates.iter().all(|predicate| match predicate {
        Predicate::Key(name, text) => {
            let compiled = tree.schema();
            let key = compiled
                .node(schema)
                .list_keys()
                .iter()
                .copied()
                .find(|k| *compiled.node(*k).name == **name);
            let Some(key) = key else {
                return false;
            };
            let expected = tree
                .parse_term_value(key, text, PrefixFormat::Json)
                .map(|v| v.canonical)
                .unwrap_or_else(|_| text.clone());
            tree.find_child(Some(id), key)
                .and_then(|k| tree.node(k).value())
                .is_some_and(|v| v.canonical == expected)
        }
        Predicate::Value(text) => {
            let expected = tree
                .parse_term_value(schema, text, PrefixFormat::Json)
                .map(|v| v.canonical)
                .unwrap_or_else(|_| text.clone());
            tree.node(id)
                .value()
                .is_some_and(|v| v.canonical == expected)
        }
        Predicate::Position(_) => true,
    })
}

// Find the instance selected by a segment among the children of `parent`.
fn find_segment(
    tree: &DataTree<'_>,
    parent: Option<DataId>,
    segment: &Segment,
    schema: Option<SchemaId>,
) -> Option<DataId> {
    let candidates: Vec<DataId> = match schema {
        Some(schema) => tree
            .instances(parent, schema)
            .into_iter()
            .filter(|id| predicates_match(tree, *id, schema, &segment.predicates))
            .collect(),
        None => tree
            .children(parent)
            .into_iter()
            .filter(|id| opaque_matches(tree, *id, segment))
            .collect(),
    };
    let position = segment.predicates.iter().find_map(|p| match p {
        Predicate::Position(n) => Some(*n),
        _ => None,
    });
    match position {
        Some(n) => candidates.get(n - 1).copied(),
        None => candidates.first().copied(),
    }
}

/// Find the node selected by a data path. Relative paths start at `start`,
/// absolute ones at the top level.
pub(crate) fn find(
    tree: &DataTree<'_>,
    start: Option<DataId>,
    path: &str,
    output: bool,
) -> Result<Option<DataId>> {
    let parsed = parse(path)?;
    let mut current = if parsed.absolute { None } else { start };
    for segment in &parsed.segments {
        let schema = match segment_schema(tree, current, segment, output) {
            Ok(schema) => schema,
            // Opaque nodes may still match an unknown name.
            Err(err) => {
                let opaque = find_segment(tree, current, segment, None);
                match opaque {
                    Some(id) => {
                        current = Some(id);
                        continue;
                    }
                    None => return Err(err),
                }
            }
        };
        if let Some(schema) = schema {
            let snode = tree.schema().node(schema);
            if !snode.list_keys().is_empty() && segment.predicates.is_empty() {
                return Err(Error::new(
                    ErrorCode::Validation,
                    format!("Predicate missing for list \"{}\".", snode.name),
                ));
            }
        }
        match find_segment(tree, current, segment, schema) {
            Some(id) => current = Some(id),
            None => return Ok(None),
        }
    }
    Ok(current)
}

// ===== creation =====

/// Parse key predicates of a list into key values in schema order. All keys
/// are required.
pub(crate) fn list_keys_from_predicates(
    tree: &DataTree<'_>,
    list: SchemaId,
    predicates: &str,
) -> Result<Vec<String>> {
    let predicates = parse_predicates(predicates)?;
    key_values(tree, list, &predicates)
}

fn key_values(
    tree: &DataTree<'_>,
    list: SchemaId,
    predicates: &[Predicate],
) -> Result<Vec<String>> {
    let schema = tree.schema();
    let node = schema.node(list);
    let mut values = Vec::new();
    for key in node.list_keys() {
        let name = &schema.node(*key).name;
        let value = predicates.iter().find_map(|p| match p {
            Predicate::Key(k, v) if **k == **name => Some(v.clone()),
            _ => None,
        });
        match value {
            Some(value) => values.push(value),
            None => {
                return Err(Error::new(
                    ErrorCode::Validation,
                    format!(
                        "List instance of \"{}\" is missing key \"{}\".",
                        node.name, name
                    ),
                ))
            }
        }
    }
    Ok(values)
}

/// Create a list instance with its keys under `parent`.
pub(crate) fn new_list_instance(
    tree: &mut DataTree<'_>,
    parent: Option<DataId>,
    list: SchemaId,
    keys: &[&str],
    format: PrefixFormat<'_>,
) -> Result<DataId> {
    let schema = tree.schema();
    let node = schema.node(list);
    let key_ids = match &node.kind {
        CNodeKind::List { keys, .. } => keys.clone(),
        _ => {
            return Err(Error::new(
                ErrorCode::Validation,
                format!("Node \"{}\" is not a list.", node.name),
            ))
        }
    };
    if key_ids.len() != keys.len() {
        return Err(Error::new(
            ErrorCode::Validation,
            format!(
                "List \"{}\" expects {} key value(s), {} given.",
                node.name,
                key_ids.len(),
                keys.len()
            ),
        ));
    }

    // Validate the keys before creating anything.
    let mut values = Vec::new();
    for (key, text) in key_ids.iter().zip(keys) {
        values.push(tree.parse_term_value(*key, text, format)?);
    }
    if !key_ids.is_empty() {
        let exists = tree.instances(parent, list).into_iter().any(|id| {
            tree.key_values(id)
                .iter()
                .zip(&values)
                .all(|(a, b)| *a == b.canonical)
        });
        if exists {
            return Err(Error::new(
                ErrorCode::KeyConflict,
                format!("Duplicate instance of list \"{}\".", node.name),
            ));
        }
    }

    let id = tree.new_inner_node(parent, list);
    for (key, value) in key_ids.iter().zip(values) {
        let kid = tree.alloc(Some(*key), Content::Term(value));
        tree.link(Some(id), kid);
    }
    Ok(id)
}

/// Create the nodes of a data path. Returns the last created or modified
/// node. On failure all the nodes created by the call are removed.
pub(crate) fn create(
    tree: &mut DataTree<'_>,
    start: Option<DataId>,
    path: &str,
    value: Option<&str>,
    options: DataNewPathFlags,
) -> Result<Option<DataId>> {
    let parsed = parse(path)?;
    let mut first_created = None;
    let result = create_segments(tree, start, &parsed, value, options, &mut first_created);
    if result.is_err() {
        if let Some(first) = first_created {
            tree.free_subtree(first);
        }
    }
    result
}

fn create_segments(
    tree: &mut DataTree<'_>,
    start: Option<DataId>,
    path: &DataPath,
    value: Option<&str>,
    options: DataNewPathFlags,
    first_created: &mut Option<DataId>,
) -> Result<Option<DataId>> {
    let output = options.contains(DataNewPathFlags::OUTPUT);
    let mut current = if path.absolute { None } else { start };
    let last_index = path.segments.len() - 1;
    let mut result = None;

    for (index, segment) in path.segments.iter().enumerate() {
        let last = index == last_index;
        let schema = match segment_schema(tree, current, segment, output) {
            Ok(schema) => schema,
            Err(err) if options.contains(DataNewPathFlags::OPAQ) => {
                if err.errcode == ErrorCode::Syntax {
                    return Err(err);
                }
                None
            }
            Err(err) => return Err(err),
        };

        if let Some(existing) = find_segment(tree, current, segment, schema) {
            current = Some(existing);
            if last {
                result = update_existing(tree, existing, value, options, first_created.is_some())?;
            }
            continue;
        }

        let created = match schema {
            Some(schema) => create_node(tree, current, schema, segment, value, last)?,
            None => {
                if current.is_some_and(|c| matches!(tree.node(c).content, Content::Term(_))) {
                    return Err(Error::new(
                        ErrorCode::Validation,
                        "Term nodes cannot have children.",
                    ));
                }
                let id = tree.alloc(
                    None,
                    Content::Opaque {
                        name: segment.name.clone(),
                        module: segment.module.clone(),
                        value: if last { value.map(str::to_owned) } else { None },
                    },
                );
                tree.link(current, id);
                id
            }
        };
        if first_created.is_none() {
            *first_created = Some(created);
        }
        tree.clear_default(created);
        current = Some(created);
        result = Some(created);
    }
    Ok(result)
}

fn create_node(
    tree: &mut DataTree<'_>,
    parent: Option<DataId>,
    schema: SchemaId,
    segment: &Segment,
    value: Option<&str>,
    last: bool,
) -> Result<DataId> {
    if let Some(parent) = parent {
        if matches!(tree.node(parent).content, Content::Term(_)) {
            return Err(Error::new(
                ErrorCode::Validation,
                "Term nodes cannot have children.",
            ));
        }
    }
    let compiled = tree.schema();
    let snode = compiled.node(schema);
    match &snode.kind {
        CNodeKind::Container { .. }
        | CNodeKind::Rpc
        | CNodeKind::Action
        | CNodeKind::Notification => Ok(tree.new_inner_node(parent, schema)),
        CNodeKind::List { keys, .. } if keys.is_empty() => {
            Ok(tree.new_inner_node(parent, schema))
        }
        CNodeKind::List { .. } => {
            let values = key_values(tree, schema, &segment.predicates)?;
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            new_list_instance(tree, parent, schema, &values, PrefixFormat::Json)
        }
        CNodeKind::Leaf { .. } => {
            if !last {
                return Err(Error::new(
                    ErrorCode::Validation,
                    format!("Leaf \"{}\" cannot have children.", snode.name),
                ));
            }
            tree.new_term_node(parent, schema, value.unwrap_or(""), PrefixFormat::Json)
        }
        CNodeKind::LeafList { .. } => {
            let predicate = segment.predicates.iter().find_map(|p| match p {
                Predicate::Value(v) => Some(v.as_str()),
                _ => None,
            });
            let text = predicate.or(value).unwrap_or("");
            tree.new_term_node(parent, schema, text, PrefixFormat::Json)
        }
        CNodeKind::AnyData | CNodeKind::AnyXml => {
            let value = value.map(|v| {
                serde_json::from_str(v).unwrap_or_else(|_| serde_json::Value::String(v.to_owned()))
            });
            let id = tree.alloc(Some(schema), Content::Any(value));
            tree.link(parent, id);
            Ok(id)
        }
        _ => Err(Error::new(
            ErrorCode::Validation,
            format!("Node \"{}\" cannot be instantiated.", snode.name),
        )),
    }
}

// Handle the last path segment when its node already exists.
fn update_existing(
    tree: &mut DataTree<'_>,
    id: DataId,
    value: Option<&str>,
    options: DataNewPathFlags,
    created_parent: bool,
) -> Result<Option<DataId>> {
    let node = tree.node(id);
    let implicit = node.is_default();
    let Some(schema) = node.schema else {
        if let Content::Opaque { value: old, .. } = &mut tree.node_mut(id).content {
            if value.is_some() {
                *old = value.map(str::to_owned);
            }
        }
        return Ok(Some(id));
    };
    let snode = tree.schema().node(schema);

    // Keys created from the list predicate.
    if snode.flags.contains(NodeFlags::KEY) && created_parent {
        return Ok(Some(id));
    }

    match &snode.kind {
        CNodeKind::Leaf { .. } => {
            let new = tree.parse_term_value(schema, value.unwrap_or(""), PrefixFormat::Json)?;
            let unchanged = tree.node(id).value() == Some(&new);
            if unchanged {
                tree.clear_default(id);
                return Ok(Some(id));
            }
            if snode.flags.contains(NodeFlags::KEY) {
                return Err(Error::new(
                    ErrorCode::Validation,
                    format!("Cannot change the value of list key \"{}\".", snode.name),
                ));
            }
            if !options.contains(DataNewPathFlags::UPDATE) && !implicit {
                return Err(Error::new(
                    ErrorCode::Validation,
                    format!("Path \"{}\" already exists.", tree.path_of(id)),
                ));
            }
            tree.node_mut(id).content = Content::Term(new);
            tree.clear_default(id);
            Ok(Some(id))
        }
        CNodeKind::AnyData | CNodeKind::AnyXml => {
            if !options.contains(DataNewPathFlags::UPDATE) {
                return Err(Error::new(
                    ErrorCode::Validation,
                    format!("Path \"{}\" already exists.", tree.path_of(id)),
                ));
            }
            let value = value.map(|v| {
                serde_json::from_str(v).unwrap_or_else(|_| serde_json::Value::String(v.to_owned()))
            });
            tree.node_mut(id).content = Content::Any(value);
            tree.clear_default(id);
            Ok(Some(id))
        }
        _ => {
            if implicit
                || snode.is_np_container()
                || options.contains(DataNewPathFlags::UPDATE)
            {
                tree.clear_default(id);
                Ok(Some(id))
            } else {
                Err(Error::new(
                    ErrorCode::Validation,
                    format!("Path \"{}\" already exists.", tree.path_of(id)),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_segments() {
        let path = parse("/mod:a/list[k1='x'][k2=\"y'z\"]/ll[.='v']/other:b[2]").unwrap();
        assert!(path.absolute);
        assert_eq!(path.segments.len(), 4);
        assert_eq!(path.segments[0].module.as_deref(), Some("mod"));
        assert_eq!(
            path.segments[1].predicates,
            vec![
                Predicate::Key("k1".to_owned(), "x".to_owned()),
                Predicate::Key("k2".to_owned(), "y'z".to_owned()),
            ]
        );
        assert_eq!(path.segments[2].predicates, vec![Predicate::Value("v".to_owned())]);
        assert_eq!(path.segments[3].module.as_deref(), Some("other"));
        assert_eq!(path.segments[3].predicates, vec![Predicate::Position(2)]);
    }

    #[test]
    fn relative_path() {
        let path = parse("leaf").unwrap();
        assert!(!path.absolute);
        assert_eq!(path.segments[0].name, "leaf");
    }

    #[test]
    fn invalid_paths() {
        assert!(parse("/mod:a[k='x'").is_err());
        assert!(parse("/mod:a[0]").is_err());
        assert!(parse("/mod:a//b").is_err());
        assert!(parse_predicates("[name='eth0'] x").is_err());
    }
}
