//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Data tree diff.
//!
//! A diff is a data tree whose nodes carry `yang:operation` metadata
//! (`create`, `delete`, `replace` or `none`). Nodes without the metadata
//! inherit the operation of their parent. Replaced values keep the previous
//! value in `yang:orig-value`.

use crate::data::{Content, DataDiffFlags, DataFlags, DataTree, Meta};
use crate::error::{Error, ErrorCode, Result};
use crate::ids::DataId;
use crate::value::PrefixFormat;

const YANG_MODULE: &str = "yang";
const OPERATION: &str = "operation";
const ORIG_VALUE: &str = "orig-value";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Op {
    Create,
    Delete,
    Replace,
    None,
}

impl Op {
    fn as_str(self) -> &'static str {
        match self {
            Op::Create => "create",
            Op::Delete => "delete",
            Op::Replace => "replace",
            Op::None => "none",
        }
    }

    fn parse(value: &str) -> Result<Op> {
        match value {
            "create" => Ok(Op::Create),
            "delete" => Ok(Op::Delete),
            "replace" => Ok(Op::Replace),
            "none" => Ok(Op::None),
            _ => Err(Error::invalid_value(format!(
                "Invalid diff operation \"{}\".",
                value
            ))),
        }
    }
}

fn yang_meta(name: &str, value: impl Into<String>) -> Meta {
    Meta {
        module: YANG_MODULE.to_owned(),
        name: name.to_owned(),
        value: value.into(),
    }
}

fn node_op(tree: &DataTree<'_>, id: DataId) -> Result<Option<Op>> {
    tree.node(id)
        .meta
        .iter()
        .find(|m| m.module == YANG_MODULE && m.name == OPERATION)
        .map(|m| Op::parse(&m.value))
        .transpose()
}

fn set_meta(tree: &mut DataTree<'_>, id: DataId, name: &str, value: impl Into<String>) {
    let value = value.into();
    let node = tree.node_mut(id);
    match node
        .meta
        .iter()
        .position(|m| m.module == YANG_MODULE && m.name == name)
    {
        Some(pos) => node.meta[pos].value = value,
        None => node.meta.push(yang_meta(name, value)),
    }
}

fn content_text(content: &Content) -> Option<String> {
    match content {
        Content::Term(value) => Some(value.canonical.clone()),
        Content::Any(value) => Some(value.as_ref().map(|v| v.to_string()).unwrap_or_default()),
        Content::Opaque { value, .. } => value.clone(),
        Content::Inner => None,
    }
}

// ===== diff =====

struct Differ<'t, 'a> {
    out: DataTree<'a>,
    first: &'t DataTree<'a>,
    second: &'t DataTree<'a>,
    options: DataDiffFlags,
}

/// Compute the diff tree turning `first` into `second`.
pub(crate) fn diff<'a>(
    first: &DataTree<'a>,
    second: &DataTree<'a>,
    options: DataDiffFlags,
) -> Result<DataTree<'a>> {
    if !std::ptr::eq(first.context_ref(), second.context_ref()) {
        return Err(Error::new(
            ErrorCode::Validation,
            "Data trees of different contexts cannot be compared.",
        ));
    }
    let mut differ = Differ {
        out: DataTree::new(first.context_ref()),
        first,
        second,
        options,
    };
    differ.children(None, None, None);
    Ok(differ.out)
}

impl Differ<'_, '_> {
    fn considered(&self, tree: &DataTree<'_>, id: DataId) -> bool {
        self.options.contains(DataDiffFlags::DEFAULTS) || !tree.node(id).is_default()
    }

    // Compare the children of two matching nodes; returns whether anything
    // was added to the diff.
    fn children(
        &mut self,
        out_parent: Option<DataId>,
        first_parent: Option<DataId>,
        second_parent: Option<DataId>,
    ) -> bool {
        let (first, second) = (self.first, self.second);
        let mut changed = false;

        for a in first.children(first_parent) {
            if !self.considered(first, a) {
                continue;
            }
            let matching = second
                .find_instance(second_parent, first, a)
                .filter(|b| self.considered(second, *b));
            match matching {
                None => {
                    self.subtree(out_parent, first, a, Op::Delete);
                    changed = true;
                }
                Some(b) => changed |= self.pair(out_parent, a, b),
            }
        }

        for b in second.children(second_parent) {
            if !self.considered(second, b) {
                continue;
            }
            let matching = first
                .find_instance(first_parent, second, b)
                .filter(|a| self.considered(first, *a));
            if matching.is_none() {
                self.subtree(out_parent, second, b, Op::Create);
                changed = true;
            }
        }
        changed
    }

    fn pair(&mut self, out_parent: Option<DataId>, a: DataId, b: DataId) -> bool {
        let (first, second) = (self.first, self.second);
        let (na, nb) = (first.node(a), second.node(b));
        match (&na.content, &nb.content) {
            (Content::Inner, Content::Inner) => {
                let id = self.out.copy_node(first, a);
                self.reset(id);
                self.out.link(out_parent, id);
                set_meta(&mut self.out, id, OPERATION, Op::None.as_str());
                // List instances keep their keys to stay addressable.
                if let Some(schema) = na.schema {
                    let keys = first.schema().node(schema).list_keys();
                    for key in first.children(Some(a)) {
                        if first.node(key).schema.is_some_and(|s| keys.contains(&s)) {
                            let copy = self.out.copy_node(first, key);
                            self.reset(copy);
                            self.out.link(Some(id), copy);
                        }
                    }
                }
                if self.children(Some(id), Some(a), Some(b)) {
                    true
                } else {
                    self.out.free_subtree(id);
                    false
                }
            }
            (ca, cb) if ca == cb && first.children(Some(a)).is_empty() => false,
            (ca, _) => {
                let id = self.out.copy_node(second, b);
                self.reset(id);
                self.out.link(out_parent, id);
                set_meta(&mut self.out, id, OPERATION, Op::Replace.as_str());
                if let Some(orig) = content_text(ca) {
                    set_meta(&mut self.out, id, ORIG_VALUE, orig);
                }
                true
            }
        }
    }

    // Copy a whole subtree marked with an operation.
    fn subtree(&mut self, out_parent: Option<DataId>, src: &DataTree<'_>, id: DataId, op: Op) {
        let copy = self.out.copy_subtree(src, id, out_parent);
        self.clean(copy);
        set_meta(&mut self.out, copy, OPERATION, op.as_str());
    }

    fn clean(&mut self, id: DataId) {
        self.reset(id);
        for child in self.out.children(Some(id)) {
            if !self.options.contains(DataDiffFlags::DEFAULTS)
                && self.out.node(child).flags.contains(DataFlags::DEFAULT)
            {
                self.out.free_subtree(child);
            } else {
                self.clean(child);
            }
        }
    }

    // Diff nodes are explicit and carry only diff metadata.
    fn reset(&mut self, id: DataId) {
        let node = self.out.node_mut(id);
        node.flags = DataFlags::empty();
        node.meta.retain(|m| m.module != YANG_MODULE);
    }
}

// ===== apply =====

/// Apply a diff tree on a data tree.
pub(crate) fn apply(tree: &mut DataTree<'_>, diff: &DataTree<'_>) -> Result<()> {
    for id in diff.children(None) {
        let op = node_op(diff, id)?.ok_or_else(|| {
            Error::new(
                ErrorCode::Validation,
                "Top-level diff node without an operation.",
            )
            .with_path(diff.path_of(id))
        })?;
        apply_node(tree, None, diff, id, op)?;
    }
    Ok(())
}

fn apply_node(
    tree: &mut DataTree<'_>,
    parent: Option<DataId>,
    diff: &DataTree<'_>,
    diff_id: DataId,
    inherited: Op,
) -> Result<()> {
    let op = node_op(diff, diff_id)?.unwrap_or(inherited);
    let existing = tree.find_instance(parent, diff, diff_id);
    let missing = || {
        Error::not_found("Diff node not found in the data tree.").with_path(diff.path_of(diff_id))
    };

    match op {
        Op::Create => {
            if let Some(existing) = existing {
                if !tree.node(existing).is_default() {
                    return Err(Error::new(
                        ErrorCode::Validation,
                        "Created diff node already exists in the data tree.",
                    )
                    .with_path(diff.path_of(diff_id)));
                }
                tree.free_subtree(existing);
            }
            let id = tree.copy_subtree(diff, diff_id, parent);
            strip_diff_meta(tree, id);
            tree.clear_default(id);
        }
        Op::Delete => {
            let existing = existing.ok_or_else(missing)?;
            tree.free_subtree(existing);
        }
        Op::Replace => {
            // Leaves match regardless of their value.
            let existing = existing.ok_or_else(missing)?;
            tree.node_mut(existing).content = diff.node(diff_id).content.clone();
            tree.clear_default(existing);
        }
        Op::None => {
            let existing = existing.ok_or_else(missing)?;
            for child in diff.children(Some(diff_id)) {
                apply_node(tree, Some(existing), diff, child, Op::None)?;
            }
        }
    }
    Ok(())
}

fn strip_diff_meta(tree: &mut DataTree<'_>, id: DataId) {
    tree.node_mut(id).meta.retain(|m| m.module != YANG_MODULE);
    for child in tree.children(Some(id)) {
        strip_diff_meta(tree, child);
    }
}

// ===== reverse =====

/// Build the diff undoing the given one.
pub(crate) fn reverse<'a>(diff: &DataTree<'a>) -> Result<DataTree<'a>> {
    let mut reversed = diff.clone();
    for id in reversed.children(None) {
        reverse_node(&mut reversed, id)?;
    }
    Ok(reversed)
}

fn reverse_node(tree: &mut DataTree<'_>, id: DataId) -> Result<()> {
    match node_op(tree, id)? {
        Some(Op::Create) => set_meta(tree, id, OPERATION, Op::Delete.as_str()),
        Some(Op::Delete) => set_meta(tree, id, OPERATION, Op::Create.as_str()),
        Some(Op::Replace) => {
            let orig = tree
                .node(id)
                .meta
                .iter()
                .find(|m| m.module == YANG_MODULE && m.name == ORIG_VALUE)
                .map(|m| m.value.clone())
                .ok_or_else(|| {
                    Error::new(ErrorCode::Validation, "Replaced diff node without its original value.")
                        .with_path(tree.path_of(id))
                })?;
            let node = tree.node(id);
            let current = content_text(&node.content).unwrap_or_default();
            let content = match (&node.content, node.schema) {
                (Content::Term(_), Some(schema)) => {
                    Content::Term(tree.parse_term_value(schema, &orig, PrefixFormat::Json)?)
                }
                (Content::Any(_), _) => Content::Any(if orig.is_empty() {
                    None
                } else {
                    Some(serde_json::from_str(&orig).map_err(|err| {
                        Error::invalid_value(format!("Invalid anydata value: {}", err))
                    })?)
                }),
                (Content::Opaque { name, module, .. }, _) => Content::Opaque {
                    name: name.clone(),
                    module: module.clone(),
                    value: Some(orig),
                },
                (content, _) => content.clone(),
            };
            tree.node_mut(id).content = content;
            set_meta(tree, id, ORIG_VALUE, current);
        }
        Some(Op::None) | None => {
            for child in tree.children(Some(id)) {
                reverse_node(tree, child)?;
            }
        }
    }
    Ok(())
}
