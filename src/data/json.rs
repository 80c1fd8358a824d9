//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! JSON encoding of YANG data (RFC 7951).

use serde_json::{Map, Value as JsonValue};

use crate::compiled::CNodeKind;
use crate::data::{
    Content, DataOperation, DataParserFlags, DataPrinterFlags, DataTree, Meta,
};
use crate::error::{Error, ErrorCode, Result};
use crate::ids::{DataId, ModuleId, SchemaId};
use crate::utils::split_prefix;
use crate::value::PrefixFormat;

// ===== parser =====

struct JsonParser<'t, 'a> {
    tree: &'t mut DataTree<'a>,
    options: DataParserFlags,
    op: DataOperation,
}

/// Parse a JSON document into the (empty) tree.
pub(crate) fn parse(
    tree: &mut DataTree<'_>,
    data: &[u8],
    options: DataParserFlags,
    op: DataOperation,
) -> Result<()> {
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(());
    }
    let document: JsonValue = serde_json::from_slice(data)
        .map_err(|err| Error::syntax(format!("Invalid JSON data: {}", err)))?;
    let JsonValue::Object(members) = document else {
        return Err(Error::syntax("JSON data must be an object."));
    };
    let mut parser = JsonParser { tree, options, op };
    parser.parse_members(None, &members)
}

/// Text of a JSON scalar as used by the YANG value codecs.
pub(crate) fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        // Value of the "empty" type.
        JsonValue::Array(items) if items.len() == 1 && items[0].is_null() => {
            Some(String::new())
        }
        _ => None,
    }
}

impl JsonParser<'_, '_> {
    fn output(&self) -> bool {
        self.op == DataOperation::ReplyYang
    }

    fn parse_members(
        &mut self,
        parent: Option<DataId>,
        members: &Map<String, JsonValue>,
    ) -> Result<()> {
        let schema = self.tree.schema();
        let parent_schema = parent.and_then(|p| self.tree.node(p).schema);
        let parent_module = parent_schema.map(|p| schema.node(p).module);

        let mut created: Vec<(String, Vec<DataId>)> = Vec::new();
        for (key, value) in members {
            if key.starts_with('@') {
                continue;
            }
            let ids = self.parse_member(parent, parent_schema, parent_module, key, value)?;
            created.push((key.clone(), ids));
        }

        // Metadata of the parent object and of the siblings.
        for (key, value) in members {
            let Some(target) = key.strip_prefix('@') else {
                continue;
            };
            if target.is_empty() {
                if let Some(parent) = parent {
                    let meta = parse_meta(value)?;
                    self.tree.node_mut(parent).meta.extend(meta);
                }
                continue;
            }
            let Some((_, ids)) = created.iter().find(|(k, _)| k == target) else {
                return Err(Error::syntax(format!(
                    "Metadata \"{}\" for a missing node.",
                    key
                )));
            };
            match value {
                // Leaf-list instances.
                JsonValue::Array(items) => {
                    for (id, item) in ids.iter().zip(items) {
                        if !item.is_null() {
                            let meta = parse_meta(item)?;
                            self.tree.node_mut(*id).meta.extend(meta);
                        }
                    }
                }
                _ => {
                    let meta = parse_meta(value)?;
                    for id in ids {
                        self.tree.node_mut(*id).meta.extend(meta.iter().cloned());
                    }
                }
            }
        }
        Ok(())
    }

    fn parse_member(
        &mut self,
        parent: Option<DataId>,
        parent_schema: Option<SchemaId>,
        parent_module: Option<ModuleId>,
        key: &str,
        value: &JsonValue,
    ) -> Result<Vec<DataId>> {
        let schema = self.tree.schema();
        let (module_name, name) = split_prefix(key);
        let module = match module_name {
            Some(module_name) => schema.module_by_name(module_name),
            None => parent_module,
        };
        if module_name.is_none() && parent.is_none() {
            return Err(Error::syntax(format!(
                "Top-level JSON member \"{}\" is missing its module name.",
                key
            )));
        }
        // Children of opaque nodes are opaque.
        let opaque_parent = parent.is_some() && parent_schema.is_none();
        let snode = match (module, opaque_parent) {
            (Some(module), false) => {
                schema.find_data_child(parent_schema, Some(module), name, self.output())
            }
            _ => None,
        };
        let Some(snode) = snode else {
            return self.unknown(parent, module_name, name, key, value);
        };

        let node = schema.node(snode);
        match &node.kind {
            CNodeKind::Rpc | CNodeKind::Action | CNodeKind::Notification
                if self.op == DataOperation::Data =>
            {
                Err(Error::new(
                    ErrorCode::Validation,
                    format!("Unexpected operation node \"{}\" in data.", node.name),
                ))
            }
            CNodeKind::Container { .. }
            | CNodeKind::Rpc
            | CNodeKind::Action
            | CNodeKind::Notification => {
                let JsonValue::Object(members) = value else {
                    return Err(self.type_error(key, "an object"));
                };
                let id = self.tree.new_inner_node(parent, snode);
                self.parse_members(Some(id), members)?;
                Ok(vec![id])
            }
            CNodeKind::List { keys, .. } => {
                let JsonValue::Array(items) = value else {
                    return Err(self.type_error(key, "an array"));
                };
                let mut ids = Vec::new();
                for item in items {
                    let JsonValue::Object(members) = item else {
                        return Err(self.type_error(key, "an array of objects"));
                    };
                    let id = self.tree.new_inner_node(parent, snode);
                    self.parse_members(Some(id), members)?;
                    for k in keys {
                        if self.tree.find_child(Some(id), *k).is_none() {
                            return Err(Error::new(
                                ErrorCode::Validation,
                                format!(
                                    "List instance is missing its key \"{}\".",
                                    schema.node(*k).name
                                ),
                            )
                            .with_path(self.tree.path_of(id)));
                        }
                    }
                    ids.push(id);
                }
                Ok(ids)
            }
            CNodeKind::Leaf { .. } => {
                let text = scalar_text(value).ok_or_else(|| self.type_error(key, "a scalar"))?;
                let id = self.term(parent, snode, &text)?;
                Ok(vec![id])
            }
            CNodeKind::LeafList { .. } => {
                let JsonValue::Array(items) = value else {
                    return Err(self.type_error(key, "an array"));
                };
                let mut ids = Vec::new();
                for item in items {
                    let text =
                        scalar_text(item).ok_or_else(|| self.type_error(key, "an array of scalars"))?;
                    ids.push(self.term(parent, snode, &text)?);
                }
                Ok(ids)
            }
            CNodeKind::AnyData | CNodeKind::AnyXml => {
                let id = self.tree.alloc(Some(snode), Content::Any(Some(value.clone())));
                self.tree.link(parent, id);
                Ok(vec![id])
            }
            _ => Err(Error::new(
                ErrorCode::Validation,
                format!("Node \"{}\" cannot be instantiated.", node.name),
            )),
        }
    }

    fn term(&mut self, parent: Option<DataId>, snode: SchemaId, text: &str) -> Result<DataId> {
        self.tree
            .new_term_node(parent, snode, text, PrefixFormat::Json)
            .map_err(|err| match parent {
                Some(parent) => {
                    let path = format!(
                        "{}/{}",
                        self.tree.path_of(parent),
                        self.tree.schema().node(snode).name
                    );
                    Error {
                        path: Some(path),
                        ..err
                    }
                }
                None => err,
            })
    }

    fn type_error(&self, key: &str, expected: &str) -> Error {
        Error::syntax(format!("JSON member \"{}\" must be {}.", key, expected))
    }

    // Member without a schema definition.
    fn unknown(
        &mut self,
        parent: Option<DataId>,
        module_name: Option<&str>,
        name: &str,
        key: &str,
        value: &JsonValue,
    ) -> Result<Vec<DataId>> {
        let opaque_parent = parent.is_some_and(|p| self.tree.node(p).schema.is_none());
        if self.options.contains(DataParserFlags::OPAQ) || opaque_parent {
            let module = match module_name {
                Some(module) => Some(module.to_owned()),
                None => parent.and_then(|p| self.opaque_module(p)),
            };
            return self.opaque(parent, module, name, value);
        }
        if self.options.contains(DataParserFlags::STRICT) {
            return Err(Error::new(
                ErrorCode::Validation,
                format!("Node \"{}\" not found in the schema.", key),
            ));
        }
        self.tree
            .context_ref()
            .sink()
            .warn(format!("Skipping unknown JSON member \"{}\".", key), None);
        Ok(Vec::new())
    }

    fn opaque_module(&self, id: DataId) -> Option<String> {
        let node = self.tree.node(id);
        match (&node.content, node.schema) {
            (Content::Opaque { module, .. }, _) => module.clone(),
            (_, Some(schema)) => {
                let compiled = self.tree.schema();
                Some(compiled.module(compiled.node(schema).module).name.to_string())
            }
            _ => None,
        }
    }

    fn opaque(
        &mut self,
        parent: Option<DataId>,
        module: Option<String>,
        name: &str,
        value: &JsonValue,
    ) -> Result<Vec<DataId>> {
        let items: Vec<&JsonValue> = match value {
            JsonValue::Array(items) if scalar_text(value).is_none() => items.iter().collect(),
            _ => vec![value],
        };
        let mut ids = Vec::new();
        for item in items {
            let content = Content::Opaque {
                name: name.to_owned(),
                module: module.clone(),
                value: scalar_text(item),
            };
            let id = self.tree.alloc(None, content);
            self.tree.link(parent, id);
            if let JsonValue::Object(members) = item {
                self.parse_members(Some(id), members)?;
            }
            ids.push(id);
        }
        Ok(ids)
    }
}

fn parse_meta(value: &JsonValue) -> Result<Vec<Meta>> {
    let JsonValue::Object(members) = value else {
        return Err(Error::syntax("JSON metadata must be an object."));
    };
    let mut meta = Vec::new();
    for (key, value) in members {
        let (Some(module), name) = split_prefix(key) else {
            return Err(Error::syntax(format!(
                "Metadata \"{}\" is missing its module name.",
                key
            )));
        };
        let value = scalar_text(value)
            .ok_or_else(|| Error::syntax(format!("Metadata \"{}\" must be a scalar.", key)))?;
        meta.push(Meta {
            module: module.to_owned(),
            name: name.to_owned(),
            value,
        });
    }
    Ok(meta)
}

// ===== printer =====

struct JsonPrinter<'t, 'a> {
    tree: &'t DataTree<'a>,
    options: DataPrinterFlags,
    out: String,
    level: usize,
}

/// Print the given sibling nodes (and their subtrees) as a JSON document.
pub(crate) fn print(tree: &DataTree<'_>, roots: &[DataId], options: DataPrinterFlags) -> String {
    let mut printer = JsonPrinter {
        tree,
        options,
        out: String::new(),
        level: 0,
    };
    printer.object(|p| p.siblings(roots, None));
    if !printer.shrink() {
        printer.out.push('\n');
    }
    printer.out
}

/// Whether a node is printed with the given with-defaults mode.
pub(crate) fn printable(tree: &DataTree<'_>, id: DataId, options: DataPrinterFlags) -> bool {
    let node = tree.node(id);
    if options.contains(DataPrinterFlags::WD_ALL) {
        return !is_empty_default_container(tree, id, options);
    }
    if options.contains(DataPrinterFlags::WD_TRIM) {
        if let (Some(schema), Some(value)) = (node.schema, node.value()) {
            let snode = tree.schema().node(schema);
            let equals_default = match &snode.kind {
                CNodeKind::Leaf {
                    default: Some(default),
                    ..
                } => default.canonical == value.canonical,
                CNodeKind::LeafList { defaults, .. } => {
                    node.is_default() || defaults.iter().any(|d| d.canonical == value.canonical)
                }
                _ => false,
            };
            if equals_default {
                return false;
            }
        }
    } else if node.is_default() && !matches!(node.content, Content::Inner) {
        return false;
    }
    !is_empty_default_container(tree, id, options)
}

// Implicit containers are printed only when they contain something to print.
fn is_empty_default_container(tree: &DataTree<'_>, id: DataId, options: DataPrinterFlags) -> bool {
    let node = tree.node(id);
    if !node.is_default()
        || !matches!(node.content, Content::Inner)
        || options.contains(DataPrinterFlags::KEEP_EMPTY_CONT)
    {
        return false;
    }
    !tree
        .children(Some(id))
        .into_iter()
        .any(|child| printable(tree, child, options))
}

impl JsonPrinter<'_, '_> {
    fn shrink(&self) -> bool {
        self.options.contains(DataPrinterFlags::SHRINK)
    }

    fn newline(&mut self) {
        if !self.shrink() {
            self.out.push('\n');
            for _ in 0..self.level {
                self.out.push_str("  ");
            }
        }
    }

    fn key(&mut self, key: &str) {
        self.out.push_str(&quote(key));
        self.out.push(':');
        if !self.shrink() {
            self.out.push(' ');
        }
    }

    // Write an object whose members are written by `members`, which returns
    // whether it wrote anything.
    fn object(&mut self, members: impl FnOnce(&mut Self) -> bool) {
        self.out.push('{');
        self.level += 1;
        let any = members(self);
        self.level -= 1;
        if any {
            self.newline();
        }
        self.out.push('}');
    }

    fn separator(&mut self, first: &mut bool) {
        if !*first {
            self.out.push(',');
        }
        *first = false;
        self.newline();
    }

    fn name_of(&self, id: DataId, parent_module: Option<&str>) -> (String, String) {
        let node = self.tree.node(id);
        let schema = self.tree.schema();
        let (module, name) = match (&node.content, node.schema) {
            (Content::Opaque { name, module, .. }, _) => (module.clone(), name.clone()),
            (_, Some(s)) => {
                let snode = schema.node(s);
                (
                    Some(schema.module(snode.module).name.to_string()),
                    snode.name.to_string(),
                )
            }
            _ => (None, String::new()),
        };
        let module = module.unwrap_or_default();
        let qualified = if module.is_empty() || Some(module.as_str()) == parent_module {
            name
        } else {
            format!("{}:{}", module, name)
        };
        (qualified, module)
    }

    // Print sibling members, instances of lists and leaf-lists grouped into
    // arrays. Returns whether anything was printed.
    fn siblings(&mut self, ids: &[DataId], parent_module: Option<&str>) -> bool {
        let ids: Vec<DataId> = ids
            .iter()
            .copied()
            .filter(|id| printable(self.tree, *id, self.options))
            .collect();
        let mut first = true;
        let mut index = 0;
        while index < ids.len() {
            let id = ids[index];
            let node = self.tree.node(id);
            let group_end = ids[index..]
                .iter()
                .position(|other| !self.same_group(id, *other))
                .map_or(ids.len(), |p| index + p);
            let group = &ids[index..group_end];
            index = group_end;

            let (key, module) = self.name_of(id, parent_module);
            let multi = match node.schema {
                Some(s) => self.tree.schema().node(s).is_multi_instance(),
                None => group.len() > 1,
            };
            self.separator(&mut first);
            self.key(&key);
            if multi {
                self.out.push('[');
                self.level += 1;
                for (i, item) in group.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.newline();
                    self.value(*item, &module);
                }
                self.level -= 1;
                self.newline();
                self.out.push(']');
            } else {
                self.value(id, &module);
            }

            // Metadata of terms are sibling members.
            let term = matches!(
                node.content,
                Content::Term(_) | Content::Any(_) | Content::Opaque { .. }
            ) && self.tree.node(id).first_child.is_none();
            if term && group.iter().any(|i| !self.tree.node(*i).meta.is_empty()) {
                self.separator(&mut first);
                self.key(&format!("@{}", key));
                if multi {
                    self.out.push('[');
                    for (i, item) in group.iter().enumerate() {
                        if i > 0 {
                            self.out.push(',');
                        }
                        if self.tree.node(*item).meta.is_empty() {
                            self.out.push_str("null");
                        } else {
                            self.meta(*item);
                        }
                    }
                    self.out.push(']');
                } else {
                    self.meta(id);
                }
            }
        }
        !first
    }

    fn same_group(&self, a: DataId, b: DataId) -> bool {
        let (na, nb) = (self.tree.node(a), self.tree.node(b));
        match (na.schema, nb.schema) {
            (Some(sa), Some(sb)) => sa == sb,
            (None, None) => match (&na.content, &nb.content) {
                (
                    Content::Opaque { name: x, module: mx, .. },
                    Content::Opaque { name: y, module: my, .. },
                ) => x == y && mx == my,
                _ => false,
            },
            _ => false,
        }
    }

    fn meta(&mut self, id: DataId) {
        let meta = self.tree.node(id).meta.clone();
        self.object(|p| {
            let mut first = true;
            for m in &meta {
                p.separator(&mut first);
                p.key(&format!("{}:{}", m.module, m.name));
                p.out.push_str(&quote(&m.value));
            }
            !first
        });
    }

    fn value(&mut self, id: DataId, module: &str) {
        let node = self.tree.node(id);
        match &node.content {
            Content::Term(value) => {
                if value.base == crate::schema::DataValueType::Empty {
                    self.out.push_str("[null]");
                } else if value.json_unquoted() {
                    self.out.push_str(&value.canonical);
                } else {
                    self.out.push_str(&quote(&value.canonical));
                }
            }
            Content::Any(Some(json)) => {
                let text = if self.shrink() {
                    serde_json::to_string(json)
                } else {
                    serde_json::to_string_pretty(json)
                };
                let text = text.unwrap_or_else(|_| "null".to_owned());
                // Re-indent nested lines.
                let indent = "  ".repeat(self.level);
                let text = text.replace('\n', &format!("\n{}", indent));
                self.out.push_str(&text);
            }
            Content::Any(None) => self.out.push_str("{}"),
            Content::Opaque { value, .. } if node.first_child.is_none() => match value {
                Some(value) => self.out.push_str(&quote(value)),
                None => self.out.push_str("null"),
            },
            Content::Inner | Content::Opaque { .. } => {
                let children = self.tree.children(Some(id));
                let meta_present = !node.meta.is_empty();
                let module = module.to_owned();
                self.object(|p| {
                    let mut any = false;
                    if meta_present {
                        let mut first = true;
                        p.separator(&mut first);
                        p.key("@");
                        p.meta(id);
                        any = true;
                        if !children.is_empty() {
                            p.out.push(',');
                        }
                    }
                    let printed = p.siblings(&children, Some(&module));
                    if any && !printed && p.out.ends_with(',') {
                        p.out.pop();
                    }
                    any || printed
                });
            }
        }
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_texts() {
        assert_eq!(scalar_text(&serde_json::json!("x")).as_deref(), Some("x"));
        assert_eq!(scalar_text(&serde_json::json!(10)).as_deref(), Some("10"));
        assert_eq!(scalar_text(&serde_json::json!(true)).as_deref(), Some("true"));
        assert_eq!(scalar_text(&serde_json::json!([null])).as_deref(), Some(""));
        assert_eq!(scalar_text(&serde_json::json!({})), None);
    }

    #[test]
    fn quoting() {
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn metadata_members() {
        let meta = parse_meta(&serde_json::json!({"yang:operation": "create"})).unwrap();
        assert_eq!(meta[0].module, "yang");
        assert_eq!(meta[0].name, "operation");
        assert_eq!(meta[0].value, "create");
        assert!(parse_meta(&serde_json::json!({"operation": "create"})).is_err());
    }
}
