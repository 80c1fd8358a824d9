//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! XML encoding of YANG data (RFC 7950 section 7, RFC 7952 metadata as
//! attributes).

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::compiled::CNodeKind;
use crate::data::json::printable;
use crate::data::{
    Content, DataOperation, DataParserFlags, DataPrinterFlags, DataTree, Meta,
};
use crate::error::{Error, ErrorCode, Result};
use crate::ids::{DataId, SchemaId};
use crate::parser::yin::xml_error;
use crate::value::{self, PrefixFormat};

/// Namespace of the "yang" metadata module (operation, orig-value, ...).
pub(crate) const YANG_NS: &str = "urn:ietf:params:xml:ns:yang:1";
const YANG_MODULE: &str = "yang";

#[derive(Debug, Default)]
struct Element {
    name: String,
    namespace: Option<String>,
    attrs: Vec<Attr>,
    children: Vec<Element>,
    text: String,
    /// Namespace bindings in scope, innermost last.
    bindings: Vec<(String, String)>,
    raw: String,
}

#[derive(Debug)]
struct Attr {
    name: String,
    namespace: Option<String>,
    value: String,
}

// ===== reader =====

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, qname),
    }
}

fn resolve_ns(bindings: &[(String, String)], prefix: Option<&str>) -> Option<String> {
    let prefix = prefix.unwrap_or("");
    bindings
        .iter()
        .rev()
        .find(|(p, _)| p == prefix)
        .map(|(_, ns)| ns.clone())
        .filter(|ns| !ns.is_empty())
}

fn start_element(e: &BytesStart<'_>, scope: &[(String, String)]) -> Result<Element> {
    let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut bindings = scope.to_vec();
    let mut raw_attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        if key == "xmlns" {
            bindings.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            bindings.push((prefix.to_owned(), value));
        } else {
            raw_attrs.push((key, value));
        }
    }

    let (prefix, name) = split_qname(&qname);
    let namespace = resolve_ns(&bindings, prefix);
    if prefix.is_some() && namespace.is_none() {
        return Err(Error::syntax(format!(
            "Unknown XML prefix of element \"{}\".",
            qname
        )));
    }
    let attrs = raw_attrs
        .into_iter()
        .map(|(key, value)| {
            let (prefix, name) = split_qname(&key);
            // Unprefixed attributes have no namespace.
            let namespace = prefix.and_then(|p| resolve_ns(&bindings, Some(p)));
            Attr {
                name: name.to_owned(),
                namespace,
                value,
            }
        })
        .collect();
    Ok(Element {
        name: name.to_owned(),
        namespace,
        attrs,
        bindings,
        ..Default::default()
    })
}

// Read all top-level elements of an XML document (or fragment).
fn read_elements(src: &str) -> Result<Vec<Element>> {
    let mut reader = Reader::from_str(src);
    let mut stack: Vec<(Element, usize)> = Vec::new();
    let mut top = Vec::new();

    loop {
        let position = reader.buffer_position() as usize;
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let scope = stack.last().map(|(p, _)| p.bindings.clone()).unwrap_or_default();
                let element = start_element(&e, &scope)?;
                let content_start = reader.buffer_position() as usize;
                stack.push((element, content_start));
            }
            Event::Empty(e) => {
                let scope = stack.last().map(|(p, _)| p.bindings.clone()).unwrap_or_default();
                let element = start_element(&e, &scope)?;
                match stack.last_mut() {
                    Some((parent, _)) => parent.children.push(element),
                    None => top.push(element),
                }
            }
            Event::End(_) => {
                let Some((mut element, content_start)) = stack.pop() else {
                    return Err(Error::syntax("Unbalanced XML element."));
                };
                // Raw content is kept for anydata/anyxml.
                element.raw = src
                    .get(content_start..position)
                    .unwrap_or_default()
                    .to_owned();
                match stack.last_mut() {
                    Some((parent, _)) => parent.children.push(element),
                    None => top.push(element),
                }
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(xml_error)?;
                if let Some((element, _)) = stack.last_mut() {
                    element.text.push_str(&text);
                } else if !text.trim().is_empty() {
                    return Err(Error::syntax("Text outside of XML elements."));
                }
            }
            Event::CData(e) => {
                let bytes = e.into_inner();
                if let Some((element, _)) = stack.last_mut() {
                    element.text.push_str(&String::from_utf8_lossy(&bytes));
                }
            }
            Event::Eof => break,
            _ => (),
        }
    }
    if !stack.is_empty() {
        return Err(Error::syntax("Unexpected end of XML input."));
    }
    Ok(top)
}

// ===== parser =====

struct XmlParser<'t, 'a> {
    tree: &'t mut DataTree<'a>,
    options: DataParserFlags,
    op: DataOperation,
}

/// Parse an XML document (or fragment) into the (empty) tree.
pub(crate) fn parse(
    tree: &mut DataTree<'_>,
    data: &[u8],
    options: DataParserFlags,
    op: DataOperation,
) -> Result<()> {
    let src = std::str::from_utf8(data)
        .map_err(|err| Error::syntax(format!("Invalid UTF-8 in XML data: {}", err)))?;
    let elements = read_elements(src)?;
    let mut parser = XmlParser { tree, options, op };
    for element in &elements {
        parser.element(None, element)?;
    }
    Ok(())
}

impl XmlParser<'_, '_> {
    fn element(&mut self, parent: Option<DataId>, element: &Element) -> Result<()> {
        let schema = self.tree.schema();
        let parent_schema = parent.and_then(|p| self.tree.node(p).schema);
        let opaque_parent = parent.is_some() && parent_schema.is_none();
        let module = element
            .namespace
            .as_deref()
            .and_then(|ns| schema.module_by_ns(ns));
        let snode = match (module, opaque_parent) {
            (Some(module), false) => schema.find_data_child(
                parent_schema,
                Some(module),
                &element.name,
                self.op == DataOperation::ReplyYang,
            ),
            _ => None,
        };
        let Some(snode) = snode else {
            return self.unknown(parent, element, opaque_parent);
        };

        let node = schema.node(snode);
        let id = match &node.kind {
            CNodeKind::Rpc | CNodeKind::Action | CNodeKind::Notification
                if self.op == DataOperation::Data =>
            {
                return Err(Error::new(
                    ErrorCode::Validation,
                    format!("Unexpected operation node \"{}\" in data.", node.name),
                ));
            }
            CNodeKind::Container { .. }
            | CNodeKind::List { .. }
            | CNodeKind::Rpc
            | CNodeKind::Action
            | CNodeKind::Notification => {
                let id = self.tree.new_inner_node(parent, snode);
                for child in &element.children {
                    self.element(Some(id), child)?;
                }
                for key in node.list_keys() {
                    if self.tree.find_child(Some(id), *key).is_none() {
                        return Err(Error::new(
                            ErrorCode::Validation,
                            format!(
                                "List instance is missing its key \"{}\".",
                                schema.node(*key).name
                            ),
                        )
                        .with_path(self.tree.path_of(id)));
                    }
                }
                id
            }
            CNodeKind::Leaf { .. } | CNodeKind::LeafList { .. } => {
                if !element.children.is_empty() {
                    return Err(Error::syntax(format!(
                        "Term node \"{}\" with child elements.",
                        node.name
                    )));
                }
                self.term(parent, snode, element)?
            }
            CNodeKind::AnyData | CNodeKind::AnyXml => {
                let value = if element.children.is_empty() {
                    element.text.clone()
                } else {
                    element.raw.trim().to_owned()
                };
                let value = (!value.is_empty()).then(|| serde_json::Value::String(value));
                let id = self.tree.alloc(Some(snode), Content::Any(value));
                self.tree.link(parent, id);
                id
            }
            _ => {
                return Err(Error::new(
                    ErrorCode::Validation,
                    format!("Node \"{}\" cannot be instantiated.", node.name),
                ))
            }
        };
        self.attributes(id, element);
        Ok(())
    }

    fn term(&mut self, parent: Option<DataId>, snode: SchemaId, element: &Element) -> Result<DataId> {
        self.tree
            .new_term_node(
                parent,
                snode,
                &element.text,
                PrefixFormat::Xml(&element.bindings),
            )
            .map_err(|err| match parent {
                Some(parent) => {
                    err.with_path(format!("{}/{}", self.tree.path_of(parent), element.name))
                }
                None => err,
            })
    }

    // Namespaced attributes are metadata.
    fn attributes(&mut self, id: DataId, element: &Element) {
        let schema = self.tree.schema();
        for attr in &element.attrs {
            let Some(namespace) = &attr.namespace else {
                continue;
            };
            let module = if namespace == YANG_NS {
                Some(YANG_MODULE.to_owned())
            } else {
                schema
                    .module_by_ns(namespace)
                    .map(|m| schema.module(m).name.to_string())
            };
            match module {
                Some(module) => self.tree.node_mut(id).meta.push(Meta {
                    module,
                    name: attr.name.clone(),
                    value: attr.value.clone(),
                }),
                None => self.tree.context_ref().sink().warn(
                    format!(
                        "Skipping attribute \"{}\" of an unknown namespace \"{}\".",
                        attr.name, namespace
                    ),
                    None,
                ),
            }
        }
    }

    fn unknown(&mut self, parent: Option<DataId>, element: &Element, opaque_parent: bool) -> Result<()> {
        if self.options.contains(DataParserFlags::OPAQ) || opaque_parent {
            let schema = self.tree.schema();
            let module = element.namespace.as_ref().map(|ns| {
                match schema.module_by_ns(ns) {
                    Some(module) => schema.module(module).name.to_string(),
                    None => ns.clone(),
                }
            });
            let value = element.children.is_empty().then(|| element.text.clone());
            let id = self.tree.alloc(
                None,
                Content::Opaque {
                    name: element.name.clone(),
                    module,
                    value,
                },
            );
            self.tree.link(parent, id);
            for child in &element.children {
                self.element(Some(id), child)?;
            }
            self.attributes(id, element);
            return Ok(());
        }
        if self.options.contains(DataParserFlags::STRICT) {
            return Err(Error::new(
                ErrorCode::Validation,
                format!("Node \"{}\" not found in the schema.", element.name),
            ));
        }
        self.tree.context_ref().sink().warn(
            format!("Skipping unknown XML element \"{}\".", element.name),
            None,
        );
        Ok(())
    }
}

// ===== printer =====

struct XmlPrinter<'t, 'a> {
    tree: &'t DataTree<'a>,
    options: DataPrinterFlags,
    out: String,
    level: usize,
}

/// Print the given sibling nodes (and their subtrees) as XML.
pub(crate) fn print(tree: &DataTree<'_>, roots: &[DataId], options: DataPrinterFlags) -> String {
    let mut printer = XmlPrinter {
        tree,
        options,
        out: String::new(),
        level: 0,
    };
    for id in roots {
        if printable(tree, *id, options) {
            printer.node(*id, None);
        }
    }
    printer.out
}

impl XmlPrinter<'_, '_> {
    fn shrink(&self) -> bool {
        self.options.contains(DataPrinterFlags::SHRINK)
    }

    fn indent(&mut self) {
        if !self.shrink() {
            for _ in 0..self.level {
                self.out.push_str("  ");
            }
        }
    }

    fn end_line(&mut self) {
        if !self.shrink() {
            self.out.push('\n');
        }
    }

    fn module_ns(&self, module: &str) -> Option<String> {
        if module == YANG_MODULE {
            return Some(YANG_NS.to_owned());
        }
        let schema = self.tree.schema();
        match schema.module_by_name(module) {
            Some(m) => Some(schema.module(m).namespace.to_string()),
            // Opaque nodes of unknown modules keep their namespace.
            None => module.contains(':').then(|| module.to_owned()),
        }
    }

    fn module_prefix(&self, module: &str) -> String {
        if module == YANG_MODULE {
            return YANG_MODULE.to_owned();
        }
        let schema = self.tree.schema();
        match schema.module_by_name(module) {
            Some(m) => schema.module(m).prefix.to_string(),
            None => module.to_owned(),
        }
    }

    // Print one node; `parent_ns` is the default namespace in scope.
    fn node(&mut self, id: DataId, parent_ns: Option<&str>) {
        let tree = self.tree;
        let schema = tree.schema();
        let node = tree.node(id);
        let (name, module) = match (&node.content, node.schema) {
            (Content::Opaque { name, module, .. }, _) => (name.clone(), module.clone()),
            (_, Some(s)) => {
                let snode = schema.node(s);
                (
                    snode.name.to_string(),
                    Some(schema.module(snode.module).name.to_string()),
                )
            }
            _ => return,
        };
        let namespace = module.as_deref().and_then(|m| self.module_ns(m));

        self.indent();
        self.out.push('<');
        self.out.push_str(&name);
        if namespace.is_some() && namespace.as_deref() != parent_ns {
            self.out.push_str(" xmlns=\"");
            self.out.push_str(&escape(namespace.as_deref().unwrap_or_default()));
            self.out.push('"');
        }

        // Metadata attributes with their namespace declarations.
        let mut declared: Vec<String> = Vec::new();
        let mut attrs = String::new();
        for meta in &node.meta {
            let prefix = self.module_prefix(&meta.module);
            if !declared.contains(&prefix) {
                if let Some(ns) = self.module_ns(&meta.module) {
                    self.out
                        .push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape(ns.as_str())));
                }
                declared.push(prefix.clone());
            }
            attrs.push_str(&format!(
                " {}:{}=\"{}\"",
                prefix,
                meta.name,
                escape(meta.value.as_str())
            ));
        }

        let text = match &node.content {
            Content::Term(value) => {
                let (text, decls) = value::xml_value(schema, value);
                for (prefix, ns) in decls {
                    if !declared.iter().any(|d| **d == *prefix) {
                        self.out
                            .push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape(&*ns)));
                        declared.push(prefix.to_string());
                    }
                }
                Some(escape(text.as_str()).into_owned())
            }
            Content::Any(Some(serde_json::Value::String(raw))) => Some(raw.clone()),
            Content::Any(Some(json)) => Some(escape(json.to_string().as_str()).into_owned()),
            Content::Any(None) => None,
            Content::Opaque { value, .. } if node.first_child.is_none() => {
                value.as_ref().map(|v| escape(v.as_str()).into_owned())
            }
            _ => None,
        };
        self.out.push_str(&attrs);

        let children: Vec<DataId> = tree
            .children(Some(id))
            .into_iter()
            .filter(|c| printable(tree, *c, self.options))
            .collect();
        match text {
            Some(text) if !text.is_empty() => {
                self.out.push('>');
                self.out.push_str(&text);
                self.out.push_str(&format!("</{}>", name));
                self.end_line();
            }
            _ if children.is_empty() => {
                self.out.push_str("/>");
                self.end_line();
            }
            _ => {
                self.out.push('>');
                self.end_line();
                self.level += 1;
                let ns = namespace.clone().or_else(|| parent_ns.map(str::to_owned));
                for child in children {
                    self.node(child, ns.as_deref());
                }
                self.level -= 1;
                self.indent();
                self.out.push_str(&format!("</{}>", name));
                self.end_line();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_namespaces() {
        let src = r#"<a xmlns="urn:a" xmlns:b="urn:b"><b:x yang:operation="create" xmlns:yang="urn:ietf:params:xml:ns:yang:1">1</b:x><y/></a>"#;
        let elements = read_elements(src).unwrap();
        assert_eq!(elements.len(), 1);
        let a = &elements[0];
        assert_eq!(a.namespace.as_deref(), Some("urn:a"));
        assert_eq!(a.children.len(), 2);
        let x = &a.children[0];
        assert_eq!(x.name, "x");
        assert_eq!(x.namespace.as_deref(), Some("urn:b"));
        assert_eq!(x.text, "1");
        assert_eq!(x.attrs[0].namespace.as_deref(), Some(YANG_NS));
        assert_eq!(a.children[1].namespace.as_deref(), Some("urn:a"));
    }

    #[test]
    fn fragments() {
        let elements = read_elements("<a xmlns=\"urn:a\"/><b xmlns=\"urn:b\"/>").unwrap();
        assert_eq!(elements.len(), 2);
    }

    #[test]
    fn unknown_prefix() {
        assert!(read_elements("<p:a/>").is_err());
        assert!(read_elements("<a>").is_err());
    }
}
