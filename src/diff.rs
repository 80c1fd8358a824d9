//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Schema diff.
//!
//! Compares the compiled schemas of two contexts (typically two versions of
//! the same module set) node by node. Nodes are matched by their schema path
//! (choice, case, input and output included).
//!
//! Patterns of union member types are compared per member: a pattern moving
//! from one member to another is reported as removed and added.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::context::Context;
use crate::schema::{SchemaLeafType, SchemaNode, SchemaNodeKind, SchemaPathFormat};

/// Difference between two schemas.
#[derive(Clone, Debug)]
pub enum SchemaDiff<'a> {
    /// Node only present in the new schema.
    NodeAdded(SchemaNode<'a>),
    /// Node only present in the old schema.
    NodeRemoved(SchemaNode<'a>),
    /// Attribute value only present in the new node.
    AttributeAdded(SchemaAttributeChange<'a>),
    /// Attribute value only present in the old node.
    AttributeRemoved(SchemaAttributeChange<'a>),
}

/// Attribute value added to or removed from a schema node.
#[derive(Clone, Debug)]
pub struct SchemaAttributeChange<'a> {
    pub old: SchemaNode<'a>,
    pub new: SchemaNode<'a>,
    pub attribute: SchemaAttribute,
    pub value: String,
}

/// Compared schema node attributes.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SchemaAttribute {
    NodeType,
    Description,
    Mandatory,
    Status,
    Config,
    Must,
    Extension,
    BaseType,
    Units,
    Length,
    Pattern,
    Range,
    Enum,
    EnumStatus,
    Bit,
    BitStatus,
    Default,
    OrderedBy,
    Presence,
    Key,
}

/// Compare the schemas of two contexts and return all differences, sorted by
/// schema path.
///
/// Nodes for which `exclude` returns true are skipped, together with their
/// descendants.
pub fn schema_diff<'a, F>(
    old: &'a Context,
    new: &'a Context,
    exclude: F,
) -> Vec<SchemaDiff<'a>>
where
    F: Fn(&SchemaNode<'a>) -> bool,
{
    let old_nodes = flatten(old, &exclude);
    let new_nodes = flatten(new, &exclude);

    let paths: BTreeSet<&String> =
        old_nodes.keys().chain(new_nodes.keys()).collect();
    let mut diffs = Vec::new();
    for path in paths {
        match (old_nodes.get(path), new_nodes.get(path)) {
            (Some(old), None) => diffs.push(SchemaDiff::NodeRemoved(old.clone())),
            (None, Some(new)) => diffs.push(SchemaDiff::NodeAdded(new.clone())),
            (Some(old), Some(new)) => node_changes(old, new, &mut diffs),
            (None, None) => (),
        }
    }
    diffs
}

fn flatten<'a, F>(context: &'a Context, exclude: &F) -> BTreeMap<String, SchemaNode<'a>>
where
    F: Fn(&SchemaNode<'a>) -> bool,
{
    fn walk<'a, F>(
        node: SchemaNode<'a>,
        exclude: &F,
        nodes: &mut BTreeMap<String, SchemaNode<'a>>,
    ) where
        F: Fn(&SchemaNode<'a>) -> bool,
    {
        if exclude(&node) {
            return;
        }
        for child in node.all_children() {
            walk(child, exclude, nodes);
        }
        nodes.insert(node.path(SchemaPathFormat::LOG), node);
    }

    let mut nodes = BTreeMap::new();
    for module in context.modules(false).filter(|m| m.is_implemented()) {
        for node in module
            .data()
            .chain(module.rpcs())
            .chain(module.notifications())
        {
            walk(node, exclude, &mut nodes);
        }
    }
    nodes
}

fn node_changes<'a>(
    old: &SchemaNode<'a>,
    new: &SchemaNode<'a>,
    diffs: &mut Vec<SchemaDiff<'a>>,
) {
    let old_attrs = attributes(old);
    let new_attrs = attributes(new);

    for (attribute, old_values) in &old_attrs {
        let new_values = new_attrs.get(attribute);
        for value in old_values {
            if !new_values.is_some_and(|v| v.contains(value)) {
                diffs.push(SchemaDiff::AttributeRemoved(SchemaAttributeChange {
                    old: old.clone(),
                    new: new.clone(),
                    attribute: *attribute,
                    value: value.clone(),
                }));
            }
        }
    }
    for (attribute, new_values) in &new_attrs {
        let old_values = old_attrs.get(attribute);
        for value in new_values {
            if !old_values.is_some_and(|v| v.contains(value)) {
                diffs.push(SchemaDiff::AttributeAdded(SchemaAttributeChange {
                    old: old.clone(),
                    new: new.clone(),
                    attribute: *attribute,
                    value: value.clone(),
                }));
            }
        }
    }

    // Status changes of enums and bits present on both sides.
    status_changes(old, new, SchemaAttribute::Enum, SchemaAttribute::EnumStatus, diffs);
    status_changes(old, new, SchemaAttribute::Bit, SchemaAttribute::BitStatus, diffs);
}

/// Values of every compared attribute. Single-valued attributes are sets of
/// at most one element.
fn attributes(node: &SchemaNode<'_>) -> BTreeMap<SchemaAttribute, BTreeSet<String>> {
    let mut attrs: BTreeMap<SchemaAttribute, BTreeSet<String>> = BTreeMap::new();
    let mut add = |attribute: SchemaAttribute, value: String| {
        attrs.entry(attribute).or_default().insert(value);
    };

    add(SchemaAttribute::NodeType, node.kind().to_string());
    if let Some(description) = node.description() {
        add(SchemaAttribute::Description, description.to_owned());
    }
    if node.is_mandatory() {
        add(SchemaAttribute::Mandatory, "true".to_owned());
    }
    add(SchemaAttribute::Status, node.status().to_string());
    if node.is_state() && !node.is_schema_only() {
        add(SchemaAttribute::Config, "false".to_owned());
    }
    for must in node.musts() {
        add(SchemaAttribute::Must, must.condition().to_owned());
    }
    for ext in node.extensions() {
        let value = match ext.argument() {
            Some(arg) => format!("{}:{} {}", ext.module(), ext.name(), arg),
            None => format!("{}:{}", ext.module(), ext.name()),
        };
        add(SchemaAttribute::Extension, value);
    }

    if let Some(ty) = node.leaf_type() {
        for base in base_types(&ty) {
            add(SchemaAttribute::BaseType, base);
        }
        if let Some(units) = node.units() {
            add(SchemaAttribute::Units, units.to_owned());
        }
        for_each_type(&ty, &mut |ty| {
            for length in ty.length() {
                add(SchemaAttribute::Length, length.to_owned());
            }
            for range in ty.range() {
                add(SchemaAttribute::Range, range.to_owned());
            }
            for e in ty.enums() {
                add(SchemaAttribute::Enum, e.name().to_owned());
            }
            for b in ty.bits() {
                add(SchemaAttribute::Bit, b.name().to_owned());
            }
        });
        for pattern in patterns(&ty, None) {
            add(SchemaAttribute::Pattern, pattern);
        }
    }

    match node.kind() {
        SchemaNodeKind::Leaf => {
            if let Some(default) = node.default_value_canonical() {
                add(SchemaAttribute::Default, default.to_owned());
            }
        }
        SchemaNodeKind::LeafList => {
            for default in node.default_values_canonical() {
                add(SchemaAttribute::Default, default.to_owned());
            }
            add(SchemaAttribute::OrderedBy, ordered_by(node).to_owned());
        }
        SchemaNodeKind::List => {
            let keys: Vec<&str> = node.list_keys().map(|k| k.name()).collect();
            if !keys.is_empty() {
                add(SchemaAttribute::Key, keys.join(" "));
            }
            add(SchemaAttribute::OrderedBy, ordered_by(node).to_owned());
        }
        SchemaNodeKind::Container => {
            if let Some(presence) = node.presence() {
                add(SchemaAttribute::Presence, presence.to_owned());
            }
        }
        _ => (),
    }

    attrs
}

fn ordered_by(node: &SchemaNode<'_>) -> &'static str {
    if node.is_user_ordered() {
        "user"
    } else {
        "system"
    }
}

/// Base types of a type, union members flattened.
fn base_types(ty: &SchemaLeafType<'_>) -> Vec<String> {
    let mut bases = Vec::new();
    for_each_type(ty, &mut |ty| {
        if ty.union_types().next().is_none() {
            bases.push(ty.base_type().to_string());
        }
    });
    bases
}

/// Visit a type and, recursively, the members of a union.
fn for_each_type<'a>(ty: &SchemaLeafType<'a>, f: &mut dyn FnMut(&SchemaLeafType<'a>)) {
    f(ty);
    for member in ty.union_types() {
        for_each_type(&member, f);
    }
}

/// Patterns of a type. Patterns of union members are tagged with the index
/// of the member they belong to.
fn patterns(ty: &SchemaLeafType<'_>, member: Option<&str>) -> Vec<String> {
    let mut out = Vec::new();
    for (text, invert) in ty.patterns() {
        let mut value = match member {
            Some(member) => format!("{}: {}", member, text),
            None => text.to_owned(),
        };
        if invert {
            value.push_str(" invert-match");
        }
        out.push(value);
    }
    for (index, union_member) in ty.union_types().enumerate() {
        let tag = match member {
            Some(member) => format!("{}.{}", member, index + 1),
            None => format!("member {}", index + 1),
        };
        out.extend(patterns(&union_member, Some(&tag)));
    }
    out
}

fn status_changes<'a>(
    old: &SchemaNode<'a>,
    new: &SchemaNode<'a>,
    member: SchemaAttribute,
    attribute: SchemaAttribute,
    diffs: &mut Vec<SchemaDiff<'a>>,
) {
    let old_statuses = member_statuses(old, member);
    let new_statuses = member_statuses(new, member);

    for (name, old_status) in &old_statuses {
        let Some(new_status) = new_statuses.get(name) else {
            continue;
        };
        if old_status == new_status {
            continue;
        }
        diffs.push(SchemaDiff::AttributeRemoved(SchemaAttributeChange {
            old: old.clone(),
            new: new.clone(),
            attribute,
            value: format!("{} {}", name, old_status),
        }));
        diffs.push(SchemaDiff::AttributeAdded(SchemaAttributeChange {
            old: old.clone(),
            new: new.clone(),
            attribute,
            value: format!("{} {}", name, new_status),
        }));
    }
}

/// Status of every enum (or bit) of a node's type, by name.
fn member_statuses(
    node: &SchemaNode<'_>,
    member: SchemaAttribute,
) -> BTreeMap<String, String> {
    let mut statuses = BTreeMap::new();
    if let Some(ty) = node.leaf_type() {
        for_each_type(&ty, &mut |ty| {
            let items: Vec<_> = match member {
                SchemaAttribute::Enum => ty.enums().collect(),
                _ => ty.bits().collect(),
            };
            for item in items {
                statuses.insert(item.name().to_owned(), item.status().to_string());
            }
        });
    }
    statuses
}

// ===== impl SchemaDiff =====

impl SchemaDiff<'_> {
    /// Schema path of the node the difference relates to.
    pub fn path(&self) -> String {
        match self {
            SchemaDiff::NodeAdded(node) | SchemaDiff::NodeRemoved(node) => {
                node.path(SchemaPathFormat::LOG)
            }
            SchemaDiff::AttributeAdded(change)
            | SchemaDiff::AttributeRemoved(change) => {
                change.new.path(SchemaPathFormat::LOG)
            }
        }
    }

    /// Changed attribute, `None` for added and removed nodes.
    pub fn attribute(&self) -> Option<SchemaAttribute> {
        match self {
            SchemaDiff::NodeAdded(_) | SchemaDiff::NodeRemoved(_) => None,
            SchemaDiff::AttributeAdded(change)
            | SchemaDiff::AttributeRemoved(change) => Some(change.attribute),
        }
    }
}

impl fmt::Display for SchemaDiff<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaDiff::NodeAdded(node) => {
                write!(f, "+{}: added node", node.path(SchemaPathFormat::LOG))
            }
            SchemaDiff::NodeRemoved(node) => write!(
                f,
                "-{}: removed status={} node",
                node.path(SchemaPathFormat::LOG),
                node.status()
            ),
            SchemaDiff::AttributeAdded(change) => {
                write!(f, "+{}: {} \"{}\"", self.path(), change.attribute, change.value)
            }
            SchemaDiff::AttributeRemoved(change) => {
                write!(f, "-{}: {} \"{}\"", self.path(), change.attribute, change.value)
            }
        }
    }
}

// ===== impl SchemaAttribute =====

impl SchemaAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaAttribute::NodeType => "node-type",
            SchemaAttribute::Description => "description",
            SchemaAttribute::Mandatory => "mandatory",
            SchemaAttribute::Status => "status",
            SchemaAttribute::Config => "config",
            SchemaAttribute::Must => "must",
            SchemaAttribute::Extension => "extension",
            SchemaAttribute::BaseType => "base-type",
            SchemaAttribute::Units => "units",
            SchemaAttribute::Length => "length",
            SchemaAttribute::Pattern => "pattern",
            SchemaAttribute::Range => "range",
            SchemaAttribute::Enum => "enum",
            SchemaAttribute::EnumStatus => "enum-status",
            SchemaAttribute::Bit => "bit",
            SchemaAttribute::BitStatus => "bit-status",
            SchemaAttribute::Default => "default",
            SchemaAttribute::OrderedBy => "ordered-by",
            SchemaAttribute::Presence => "presence",
            SchemaAttribute::Key => "key",
        }
    }
}

impl fmt::Display for SchemaAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
