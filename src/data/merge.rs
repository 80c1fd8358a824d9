//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Data tree merge.
//!
//! Leaf values of the source replace the target ones, list instances are
//! united by their keys and leaf-list values are appended unless already
//! present.

use crate::data::{Content, DataFlags, DataMergeFlags, DataTree};
use crate::error::{Error, ErrorCode, Result};
use crate::ids::DataId;

/// Merge all top-level subtrees of `source` into `target`.
pub(crate) fn merge(
    target: &mut DataTree<'_>,
    source: &DataTree<'_>,
    options: DataMergeFlags,
) -> Result<()> {
    if !std::ptr::eq(target.context_ref(), source.context_ref()) {
        return Err(Error::new(
            ErrorCode::MergeConflict,
            "Data trees of different contexts cannot be merged.",
        ));
    }
    for id in source.children(None) {
        merge_node(target, None, source, id, options)?;
    }
    Ok(())
}

fn merge_node(
    target: &mut DataTree<'_>,
    parent: Option<DataId>,
    source: &DataTree<'_>,
    src_id: DataId,
    options: DataMergeFlags,
) -> Result<()> {
    let src = source.node(src_id);
    let merge_defaults = options.contains(DataMergeFlags::DEFAULTS);
    if src.is_default() && !merge_defaults {
        return Ok(());
    }

    let Some(existing) = target.find_instance(parent, source, src_id) else {
        check_conflict(target, parent, source, src_id)?;
        let id = target.copy_subtree(source, src_id, parent);
        if !merge_defaults {
            prune_defaults(target, id);
        }
        if !src.is_default() {
            target.clear_default(id);
        }
        return Ok(());
    };

    let existing_default = target.node(existing).is_default();
    match &src.content {
        Content::Inner => {
            for child in source.children(Some(src_id)) {
                merge_node(target, Some(existing), source, child, options)?;
            }
        }
        // A default value never replaces an explicit one.
        _ if src.is_default() && !existing_default => (),
        content => {
            if target.node(existing).content != *content || existing_default {
                target.node_mut(existing).content = content.clone();
                target.node_mut(existing).flags = src.flags;
                if !src.is_default() {
                    target.clear_default(existing);
                }
            }
            if matches!(content, Content::Opaque { .. }) {
                for child in source.children(Some(src_id)) {
                    merge_node(target, Some(existing), source, child, options)?;
                }
            }
        }
    }

    for meta in &src.meta {
        let node = target.node_mut(existing);
        match node
            .meta
            .iter()
            .position(|m| m.module == meta.module && m.name == meta.name)
        {
            Some(pos) => node.meta[pos].value = meta.value.clone(),
            None => node.meta.push(meta.clone()),
        }
    }
    Ok(())
}

// A schema-less node can't be merged with a schema node of the same name.
fn check_conflict(
    target: &DataTree<'_>,
    parent: Option<DataId>,
    source: &DataTree<'_>,
    src_id: DataId,
) -> Result<()> {
    let src_path = source.path_of(src_id);
    let conflict = target.children(parent).into_iter().find(|id| {
        let node = target.node(*id);
        let src = source.node(src_id);
        node.schema.is_none() != src.schema.is_none() && target.path_of(*id) == src_path
    });
    match conflict {
        Some(id) => Err(Error::new(
            ErrorCode::MergeConflict,
            "Cannot merge an opaque node with a schema node.",
        )
        .with_path(target.path_of(id))),
        None => Ok(()),
    }
}

// Remove default descendants copied from the source.
fn prune_defaults(tree: &mut DataTree<'_>, id: DataId) {
    for child in tree.children(Some(id)) {
        if tree.node(child).flags.contains(DataFlags::DEFAULT) {
            tree.free_subtree(child);
        } else {
            prune_defaults(tree, child);
        }
    }
}
