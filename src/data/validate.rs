//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Data validation and implicit nodes.

use std::collections::HashSet;
use std::sync::Arc;

use crate::compiled::{CNodeKind, CWhen, CompiledSchema, NodeFlags};
use crate::data::{
    path, Content, DataFlags, DataImplicitFlags, DataOperation, DataTree,
    DataValidationFlags,
};
use crate::error::{Error, ErrorCode, Result};
use crate::ids::{DataId, ModuleId, SchemaId};
use crate::parsed::Status;
use crate::schema::DataValueType;
use crate::xpath::eval::{self, XNode, XValue};

/// Upper bound of add-defaults/remove-false-when rounds.
const MAX_WHEN_ROUNDS: usize = 16;

struct Scope {
    output: bool,
    no_state: bool,
}

/// Validate a data tree: add implicit nodes, resolve "when" conditions and
/// check all the data constraints.
pub(crate) fn validate(tree: &mut DataTree<'_>, options: DataValidationFlags) -> Result<()> {
    let modules = modules_in_scope(tree, options.contains(DataValidationFlags::PRESENT));
    let mut implicit = DataImplicitFlags::empty();
    if options.contains(DataValidationFlags::NO_STATE) {
        implicit |= DataImplicitFlags::NO_STATE;
        drop_implicit_state(tree);
    }

    let mut settled = false;
    for _ in 0..MAX_WHEN_ROUNDS {
        add_module_implicit(tree, &modules, implicit)?;
        if !resolve_whens(tree, None, false)? {
            settled = true;
            break;
        }
    }
    if !settled {
        return Err(Error::new(
            ErrorCode::Validation,
            "Data tree did not settle after resolving \"when\" conditions.",
        ));
    }

    let scope = Scope {
        output: false,
        no_state: options.contains(DataValidationFlags::NO_STATE),
    };
    for id in preorder(tree, None) {
        check_node(tree, id, &scope)?;
    }

    // Sibling constraints, starting with the top level.
    let schema = tree.schema();
    for module in &modules {
        let top = schema.module(*module).data.clone();
        check_children(tree, None, &top, &scope)?;
    }
    for id in preorder(tree, None) {
        check_inner(tree, id, &scope)?;
    }
    Ok(())
}

/// Validate an RPC/action input or output, or a notification.
pub(crate) fn validate_op(tree: &mut DataTree<'_>, op: DataOperation) -> Result<()> {
    let schema = tree.schema();
    let op_node = preorder(tree, None).into_iter().find(|id| {
        tree.node(*id).schema.is_some_and(|s| {
            matches!(
                schema.node(s).kind,
                CNodeKind::Rpc | CNodeKind::Action | CNodeKind::Notification
            )
        })
    });
    let op_node = op_node.ok_or_else(|| {
        Error::new(ErrorCode::Validation, "Missing the operation node.")
    })?;
    let kind_ok = tree.node(op_node).schema.is_some_and(|s| {
        let kind = &schema.node(s).kind;
        match op {
            DataOperation::NotificationYang => matches!(kind, CNodeKind::Notification),
            _ => matches!(kind, CNodeKind::Rpc | CNodeKind::Action),
        }
    });
    if !kind_ok {
        return Err(Error::new(
            ErrorCode::Validation,
            format!("Unexpected operation node \"{}\".", tree.path_of(op_node)),
        ));
    }

    let output = op == DataOperation::ReplyYang;
    let mut implicit = DataImplicitFlags::empty();
    if output {
        implicit |= DataImplicitFlags::OUTPUT;
    }
    add_implicit(tree, Some(op_node), implicit, true)?;
    resolve_whens(tree, Some(op_node), false)?;

    let scope = Scope {
        output,
        no_state: false,
    };
    let mut nodes = vec![op_node];
    nodes.extend(preorder(tree, Some(op_node)));
    for id in &nodes {
        check_node(tree, *id, &scope)?;
    }
    for id in nodes {
        check_inner(tree, id, &scope)?;
    }
    Ok(())
}

// Implemented modules to validate. Internal modules are only validated when
// they have data.
fn modules_in_scope(tree: &DataTree<'_>, present_only: bool) -> Vec<ModuleId> {
    let schema = tree.schema();
    let context = tree.context_ref();
    let present: HashSet<ModuleId> = tree
        .children(None)
        .into_iter()
        .filter_map(|id| tree.node(id).schema)
        .map(|s| schema.node(s).module)
        .collect();
    (0..schema.modules.len())
        .map(ModuleId::from_index)
        .filter(|id| schema.module(*id).implemented)
        .filter(|id| {
            present.contains(id) || (!present_only && !context.is_internal_module(*id))
        })
        .collect()
}

/// Descendants of `parent` (top-level nodes for `None`) in document order.
pub(crate) fn preorder(tree: &DataTree<'_>, parent: Option<DataId>) -> Vec<DataId> {
    let mut out = Vec::new();
    let mut stack: Vec<DataId> = tree.children(parent).into_iter().rev().collect();
    while let Some(id) = stack.pop() {
        out.push(id);
        stack.extend(tree.children(Some(id)).into_iter().rev());
    }
    out
}

// ===== implicit nodes =====

// Implicit state subtrees left over from an earlier validation. Explicit
// state data is still rejected later on.
fn drop_implicit_state(tree: &mut DataTree<'_>) {
    let schema = tree.schema();
    let stale: Vec<DataId> = preorder(tree, None)
        .into_iter()
        .filter(|id| {
            tree.node(*id)
                .schema
                .is_some_and(|s| schema.node(s).is_state())
                && tree
                    .node(*id)
                    .parent
                    .and_then(|p| tree.node(p).schema)
                    .map_or(true, |s| !schema.node(s).is_state())
                && std::iter::once(*id)
                    .chain(preorder(tree, Some(*id)))
                    .all(|n| tree.node(n).is_default())
        })
        .collect();
    for id in stale {
        tree.free_subtree(id);
    }
}

fn add_module_implicit(
    tree: &mut DataTree<'_>,
    modules: &[ModuleId],
    options: DataImplicitFlags,
) -> Result<()> {
    let schema = tree.schema();
    for module in modules {
        let top = schema.module(*module).data.clone();
        add_level(tree, None, &top, options)?;
    }
    for id in tree.children(None) {
        if matches!(tree.node(id).content, Content::Inner) && tree.node(id).schema.is_some() {
            add_implicit(tree, Some(id), options, false)?;
        }
    }
    Ok(())
}

/// Add missing implicit nodes under `parent` (the whole tree for `None`),
/// recursively. With `prune` set, implicit nodes with a false "when" are
/// removed again.
pub(crate) fn add_implicit(
    tree: &mut DataTree<'_>,
    parent: Option<DataId>,
    options: DataImplicitFlags,
    prune: bool,
) -> Result<()> {
    match parent {
        None => {
            let modules = modules_in_scope(tree, false);
            add_module_implicit(tree, &modules, options)?;
        }
        Some(parent) => {
            let Some(schema_id) = tree.node(parent).schema else {
                return Ok(());
            };
            let schema = tree.schema();
            let node = schema.node(schema_id);
            let children: Vec<SchemaId> = match node.kind {
                CNodeKind::Rpc | CNodeKind::Action => {
                    let output = options.contains(DataImplicitFlags::OUTPUT);
                    node.children
                        .iter()
                        .copied()
                        .filter(|c| matches!(schema.node(*c).kind, CNodeKind::Output) == output)
                        .flat_map(|c| schema.node(c).children.iter().copied())
                        .collect()
                }
                _ => node.children.clone(),
            };
            add_level(tree, Some(parent), &children, options)?;
            for child in tree.children(Some(parent)) {
                if matches!(tree.node(child).content, Content::Inner)
                    && tree.node(child).schema.is_some()
                {
                    add_implicit(tree, Some(child), options, false)?;
                }
            }
        }
    }
    if prune {
        for _ in 0..MAX_WHEN_ROUNDS {
            if !resolve_whens(tree, parent, true)? {
                break;
            }
        }
    }
    Ok(())
}

fn implicit_allowed(schema: &CompiledSchema, id: SchemaId, options: DataImplicitFlags) -> bool {
    let node = schema.node(id);
    !node.detached
        && !(options.contains(DataImplicitFlags::NO_STATE) && node.is_state())
        && !(options.contains(DataImplicitFlags::NO_CONFIG) && node.is_config())
}

// Create the missing implicit nodes among the given schema children.
fn add_level(
    tree: &mut DataTree<'_>,
    parent: Option<DataId>,
    children: &[SchemaId],
    options: DataImplicitFlags,
) -> Result<()> {
    let schema = tree.schema();
    for child in children {
        if !implicit_allowed(schema, *child, options) {
            continue;
        }
        let node = schema.node(*child);
        match &node.kind {
            CNodeKind::Choice { default_case, .. } => {
                let case = active_cases(tree, parent, *child)
                    .first()
                    .copied()
                    .or(*default_case);
                if let Some(case) = case {
                    let case_children = schema.node(case).children.clone();
                    add_level(tree, parent, &case_children, options)?;
                }
            }
            CNodeKind::Container { presence: None } => {
                if tree.find_child(parent, *child).is_none() {
                    let id = tree.new_inner_node(parent, *child);
                    tree.node_mut(id).flags |= DataFlags::DEFAULT;
                    discard_if_false_when(tree, &[id])?;
                }
            }
            CNodeKind::Leaf {
                default: Some(default),
                ..
            } if !options.contains(DataImplicitFlags::NO_DEFAULTS) => {
                if tree.find_child(parent, *child).is_none() {
                    let id = tree.alloc(Some(*child), Content::Term(default.clone()));
                    tree.node_mut(id).flags |= DataFlags::DEFAULT;
                    tree.link(parent, id);
                    discard_if_false_when(tree, &[id])?;
                }
            }
            CNodeKind::LeafList { defaults, .. }
                if !defaults.is_empty() && !options.contains(DataImplicitFlags::NO_DEFAULTS) =>
            {
                if tree.find_child(parent, *child).is_none() {
                    let mut created = Vec::new();
                    for default in defaults {
                        let id = tree.alloc(Some(*child), Content::Term(default.clone()));
                        tree.node_mut(id).flags |= DataFlags::DEFAULT;
                        tree.link(parent, id);
                        created.push(id);
                    }
                    discard_if_false_when(tree, &created)?;
                }
            }
            _ => (),
        }
    }
    Ok(())
}

// Remove freshly created implicit instances whose "when" is false.
fn discard_if_false_when(tree: &mut DataTree<'_>, created: &[DataId]) -> Result<()> {
    let Some(first) = created.first() else {
        return Ok(());
    };
    if false_when(tree, *first)?.is_some() {
        for id in created {
            tree.free_subtree(*id);
        }
    }
    Ok(())
}

// Cases of a choice having data among the children of `parent`.
fn active_cases(tree: &DataTree<'_>, parent: Option<DataId>, choice: SchemaId) -> Vec<SchemaId> {
    let schema = tree.schema();
    let mut cases = Vec::new();
    for child in tree.children(parent) {
        let Some(s) = tree.node(child).schema else {
            continue;
        };
        // Case of the choice on the way up from the data node.
        let mut current = s;
        while let Some(p) = schema.node(current).parent {
            if p == choice {
                if !cases.contains(&current) {
                    cases.push(current);
                }
                break;
            }
            if !schema.node(p).is_schema_only() {
                break;
            }
            current = p;
        }
    }
    cases
}

// ===== when =====

// "when" conditions of a data node: its own and those of the choices and
// cases between it and its data parent.
fn node_whens(schema: &CompiledSchema, id: SchemaId) -> Vec<(SchemaId, Arc<CWhen>, bool)> {
    let node = schema.node(id);
    let mut whens: Vec<_> = node
        .whens
        .iter()
        .map(|w| (id, w.clone(), w.context_parent))
        .collect();
    let mut parent = node.parent;
    while let Some(p) = parent {
        let pnode = schema.node(p);
        if !pnode.is_schema_only() {
            break;
        }
        whens.extend(pnode.whens.iter().map(|w| (p, w.clone(), true)));
        parent = pnode.parent;
    }
    whens
}

/// First false "when" condition of a node, if any.
fn false_when(tree: &DataTree<'_>, id: DataId) -> Result<Option<Arc<CWhen>>> {
    let Some(schema_id) = tree.node(id).schema else {
        return Ok(None);
    };
    for (owner, when, use_parent) in node_whens(tree.schema(), schema_id) {
        let context = if use_parent {
            match tree.node(id).parent {
                Some(parent) => XNode::Node(parent),
                None => XNode::Root,
            }
        } else {
            XNode::Node(id)
        };
        let value = eval::evaluate(tree, &when.expr, context, Some(owner))?;
        if !eval::to_bool(&value) {
            return Ok(Some(when));
        }
    }
    Ok(None)
}

// Evaluate "when" conditions below `parent`. Implicit nodes with a false
// condition are removed, explicit ones are an error unless `implicit_only`.
// Returns whether anything was removed.
fn resolve_whens(
    tree: &mut DataTree<'_>,
    parent: Option<DataId>,
    implicit_only: bool,
) -> Result<bool> {
    let mut removed = false;
    for child in tree.children(parent) {
        match false_when(tree, child)? {
            Some(when) => {
                if tree.node(child).is_default() {
                    tree.free_subtree(child);
                    removed = true;
                    continue;
                }
                if !implicit_only {
                    return Err(Error::new(
                        ErrorCode::WhenViolation,
                        format!("When condition \"{}\" not satisfied.", when.text),
                    )
                    .with_path(tree.path_of(child)));
                }
            }
            None => (),
        }
        if resolve_whens(tree, Some(child), implicit_only)? {
            removed = true;
        }
    }
    Ok(removed)
}

// Whether a node that does not exist would have a false "when": a
// temporary instance is evaluated in its place.
fn absent_when_false(
    tree: &mut DataTree<'_>,
    parent: Option<DataId>,
    schema: SchemaId,
) -> Result<bool> {
    if node_whens(tree.schema(), schema).is_empty() {
        return Ok(false);
    }
    let probe = tree.new_inner_node(parent, schema);
    let result = false_when(tree, probe);
    tree.free_subtree(probe);
    Ok(result?.is_some())
}

// ===== node checks =====

fn check_node(tree: &DataTree<'_>, id: DataId, scope: &Scope) -> Result<()> {
    let node = tree.node(id);
    let Some(schema_id) = node.schema else {
        let name = match &node.content {
            Content::Opaque { name, .. } => name.as_str(),
            _ => "",
        };
        return Err(Error::new(
            ErrorCode::Validation,
            format!("Opaque node \"{}\" found.", name),
        )
        .with_path(tree.path_of(id)));
    };
    let schema = tree.schema();
    let snode = schema.node(schema_id);

    if scope.no_state && snode.is_state() {
        return Err(Error::new(
            ErrorCode::Validation,
            format!("Unexpected state data node \"{}\" found.", snode.name),
        )
        .with_path(tree.path_of(id)));
    }
    if snode.status == Status::Obsolete {
        tree.context_ref().sink().warn(
            format!("Obsolete schema node \"{}\" instantiated in data.", snode.name),
            Some(&tree.path_of(id)),
        );
    }

    if let CNodeKind::List { keys, .. } = &snode.kind {
        for key in keys {
            if tree.find_child(Some(id), *key).is_none() {
                return Err(Error::new(
                    ErrorCode::Validation,
                    format!("List instance is missing its key \"{}\".", schema.node(*key).name),
                )
                .with_path(tree.path_of(id)));
            }
        }
    }

    if let (Some(ty), Some(value)) = (snode.leaf_type(), node.value()) {
        if let Some(leafref) = &ty.leafref {
            if ty.require_instance && !leafref_target_exists(tree, id, schema_id, &leafref.expr)? {
                return Err(Error::new(
                    ErrorCode::InstanceRequired,
                    format!(
                        "Invalid leafref value \"{}\" - no target instance \"{}\" with the same value.",
                        value.canonical, leafref.path
                    ),
                )
                .with_path(tree.path_of(id)));
            }
        } else if value.base == DataValueType::InstanceId && instance_required(ty) {
            let target = path::find(tree, None, &value.canonical, false).unwrap_or(None);
            if target.is_none() {
                return Err(Error::new(
                    ErrorCode::InstanceRequired,
                    format!(
                        "Invalid instance-identifier \"{}\" value - required instance not found.",
                        value.canonical
                    ),
                )
                .with_path(tree.path_of(id)));
            }
        }
    }

    if !node.is_default() {
        for must in &snode.musts {
            let value = eval::evaluate(tree, &must.expr, XNode::Node(id), Some(schema_id))?;
            if eval::to_bool(&value) {
                continue;
            }
            let path = tree.path_of(id);
            let msg = match &must.error_message {
                Some(msg) => msg.to_string(),
                None => format!("Must condition \"{}\" not satisfied.", must.text),
            };
            if snode.is_state() {
                tree.context_ref().sink().warn(msg, Some(&path));
                continue;
            }
            return Err(Error::new(ErrorCode::MustViolation, msg)
                .with_path(path)
                .with_apptag(must.error_app_tag.as_ref().map(|t| t.to_string())));
        }
    }
    Ok(())
}

fn instance_required(ty: &crate::compiled::CType) -> bool {
    if ty.base == DataValueType::InstanceId {
        return ty.require_instance;
    }
    ty.union
        .iter()
        .any(|t| t.base == DataValueType::InstanceId && t.require_instance)
}

fn leafref_target_exists(
    tree: &DataTree<'_>,
    id: DataId,
    schema: SchemaId,
    expr: &crate::xpath::Expr,
) -> Result<bool> {
    let Some(value) = tree.node(id).value() else {
        return Ok(false);
    };
    let targets = eval::evaluate(tree, expr, XNode::Node(id), Some(schema))?;
    let XValue::Nodes(targets) = targets else {
        return Ok(false);
    };
    Ok(targets.iter().any(|target| match target {
        XNode::Node(t) => tree
            .node(*t)
            .value()
            .is_some_and(|v| v.canonical == value.canonical),
        XNode::Root => false,
    }))
}

// ===== sibling checks =====

// Constraints among the children of an inner node.
fn check_inner(tree: &mut DataTree<'_>, id: DataId, scope: &Scope) -> Result<()> {
    if !matches!(tree.node(id).content, Content::Inner) {
        return Ok(());
    }
    let Some(schema_id) = tree.node(id).schema else {
        return Ok(());
    };
    let schema = tree.schema();
    let node = schema.node(schema_id);
    let children: Vec<SchemaId> = match node.kind {
        CNodeKind::Rpc | CNodeKind::Action => node
            .children
            .iter()
            .copied()
            .filter(|c| matches!(schema.node(*c).kind, CNodeKind::Output) == scope.output)
            .flat_map(|c| schema.node(c).children.iter().copied())
            .collect(),
        _ => node.children.clone(),
    };
    check_children(tree, Some(id), &children, scope)
}

fn check_children(
    tree: &mut DataTree<'_>,
    parent: Option<DataId>,
    children: &[SchemaId],
    scope: &Scope,
) -> Result<()> {
    let schema = tree.schema();
    for child in children {
        let node = schema.node(*child);
        if node.detached || (scope.no_state && node.is_state()) {
            continue;
        }
        match &node.kind {
            CNodeKind::Choice { .. } => check_choice(tree, parent, *child, scope)?,
            CNodeKind::List { keys, min, max, .. } => {
                let instances = tree.instances(parent, *child);
                check_cardinality(tree, parent, *child, instances.len(), *min, *max)?;
                if !keys.is_empty() {
                    check_keys(tree, &instances)?;
                }
                check_uniques(tree, *child, &instances)?;
            }
            CNodeKind::LeafList { min, max, .. } => {
                let instances = tree.instances(parent, *child);
                check_cardinality(tree, parent, *child, instances.len(), *min, *max)?;
                if node.is_config() {
                    check_duplicate_values(tree, &instances)?;
                }
            }
            _ => {
                let instances = tree.instances(parent, *child);
                if instances.len() > 1 {
                    return Err(Error::new(
                        ErrorCode::Validation,
                        format!("Duplicate instance of \"{}\".", node.name),
                    )
                    .with_path(tree.path_of(instances[1])));
                }
                let mandatory = node.flags.contains(NodeFlags::MANDATORY)
                    && matches!(
                        node.kind,
                        CNodeKind::Leaf { .. } | CNodeKind::AnyData | CNodeKind::AnyXml
                    );
                if mandatory && instances.is_empty() && !absent_when_false(tree, parent, *child)? {
                    return Err(missing(tree, parent, *child));
                }
            }
        }
    }
    Ok(())
}

fn missing(tree: &DataTree<'_>, parent: Option<DataId>, schema: SchemaId) -> Error {
    let compiled = tree.schema();
    let node = compiled.node(schema);
    let path = match parent {
        Some(parent) => format!("{}/{}", tree.path_of(parent), node.name),
        None => compiled.path(schema, crate::schema::SchemaPathFormat::DATA),
    };
    Error::new(
        ErrorCode::Mandatory,
        format!("Mandatory node \"{}\" instance does not exist.", node.name),
    )
    .with_path(path)
}

fn check_choice(
    tree: &mut DataTree<'_>,
    parent: Option<DataId>,
    choice: SchemaId,
    scope: &Scope,
) -> Result<()> {
    let schema = tree.schema();
    let mut cases = active_cases(tree, parent, choice);

    if cases.len() > 1 {
        // Implicit data of other cases give way to explicit ones.
        let explicit: Vec<SchemaId> = cases
            .iter()
            .copied()
            .filter(|case| {
                case_nodes(tree, parent, *case)
                    .iter()
                    .any(|id| !tree.node(*id).is_default())
            })
            .collect();
        if explicit.len() > 1 {
            let node = tree.children(parent).into_iter().find(|id| {
                tree.node(*id)
                    .schema
                    .is_some_and(|s| schema.is_within(s, explicit[1]))
            });
            let err = Error::new(
                ErrorCode::Validation,
                format!(
                    "Data for both cases \"{}\" and \"{}\" exist.",
                    schema.node(explicit[0]).name,
                    schema.node(explicit[1]).name
                ),
            );
            return Err(match node {
                Some(node) => err.with_path(tree.path_of(node)),
                None => err,
            });
        }
        for case in cases.iter().filter(|c| !explicit.contains(c)) {
            for id in case_nodes(tree, parent, *case) {
                tree.free_subtree(id);
            }
        }
        cases = explicit;
    }

    match cases.first() {
        Some(case) => {
            let children = schema.node(*case).children.clone();
            check_children(tree, parent, &children, scope)
        }
        None => {
            let node = schema.node(choice);
            if node.flags.contains(NodeFlags::MANDATORY) && !absent_choice_when_false(tree, parent, choice)? {
                let err = missing(tree, parent, choice);
                return Err(Error {
                    msg: Some(format!(
                        "Mandatory choice \"{}\" data do not exist.",
                        node.name
                    )),
                    ..err
                });
            }
            Ok(())
        }
    }
}

// A mandatory choice does not apply when its (or its ancestor choice's)
// "when" is false. Evaluated with the data parent as context.
fn absent_choice_when_false(
    tree: &DataTree<'_>,
    parent: Option<DataId>,
    choice: SchemaId,
) -> Result<bool> {
    let schema = tree.schema();
    let mut current = Some(choice);
    while let Some(id) = current {
        let node = schema.node(id);
        if !node.is_schema_only() {
            break;
        }
        for when in &node.whens {
            let context = match parent {
                Some(parent) => XNode::Node(parent),
                None => XNode::Root,
            };
            let value = eval::evaluate(tree, &when.expr, context, Some(id))?;
            if !eval::to_bool(&value) {
                return Ok(true);
            }
        }
        current = node.parent;
    }
    Ok(false)
}

fn case_nodes(tree: &DataTree<'_>, parent: Option<DataId>, case: SchemaId) -> Vec<DataId> {
    let schema = tree.schema();
    tree.children(parent)
        .into_iter()
        .filter(|id| {
            tree.node(*id)
                .schema
                .is_some_and(|s| schema.is_within(s, case))
        })
        .collect()
}

fn check_cardinality(
    tree: &mut DataTree<'_>,
    parent: Option<DataId>,
    schema_id: SchemaId,
    count: usize,
    min: u32,
    max: Option<u32>,
) -> Result<()> {
    let schema = tree.schema();
    let name = &schema.node(schema_id).name;
    if let Some(max) = max {
        if count > max as usize {
            let instances = tree.instances(parent, schema_id);
            return Err(Error::new(
                ErrorCode::Cardinality,
                format!("Too many \"{}\" instances.", name),
            )
            .with_path(tree.path_of(instances[max as usize])));
        }
    }
    if count < min as usize && !absent_when_false(tree, parent, schema_id)? {
        let err = missing(tree, parent, schema_id);
        return Err(Error {
            errcode: ErrorCode::Cardinality,
            msg: Some(format!("Too few \"{}\" instances.", name)),
            ..err
        });
    }
    Ok(())
}

fn check_keys(tree: &DataTree<'_>, instances: &[DataId]) -> Result<()> {
    let mut seen: HashSet<Vec<&str>> = HashSet::new();
    for id in instances {
        if !seen.insert(tree.key_values(*id)) {
            return Err(Error::new(
                ErrorCode::KeyConflict,
                "Duplicate instance of list with the same keys.",
            )
            .with_path(tree.path_of(*id)));
        }
    }
    Ok(())
}

fn check_duplicate_values(tree: &DataTree<'_>, instances: &[DataId]) -> Result<()> {
    let mut seen = HashSet::new();
    for id in instances {
        if let Some(value) = tree.node(*id).value() {
            if !seen.insert(value.canonical.as_str()) {
                return Err(Error::new(
                    ErrorCode::Validation,
                    format!("Duplicate instance of leaf-list value \"{}\".", value.canonical),
                )
                .with_path(tree.path_of(*id)));
            }
        }
    }
    Ok(())
}

// Value of a descendant leaf of a list instance.
fn descendant_value<'t>(
    tree: &'t DataTree<'_>,
    list: DataId,
    list_schema: SchemaId,
    leaf: SchemaId,
) -> Option<&'t str> {
    let schema = tree.schema();
    let mut chain = Vec::new();
    let mut current = Some(leaf);
    while let Some(id) = current {
        if id == list_schema {
            break;
        }
        chain.push(id);
        current = schema.data_parent(id);
    }
    let mut node = list;
    for id in chain.iter().rev() {
        node = tree.find_child(Some(node), *id)?;
    }
    tree.node(node).value().map(|v| v.canonical.as_str())
}

fn check_uniques(tree: &DataTree<'_>, list: SchemaId, instances: &[DataId]) -> Result<()> {
    let schema = tree.schema();
    let (uniques, texts) = match &schema.node(list).kind {
        CNodeKind::List {
            uniques,
            unique_texts,
            ..
        } => (uniques, unique_texts),
        _ => return Ok(()),
    };
    for (index, unique) in uniques.iter().enumerate() {
        let mut seen: HashSet<Vec<&str>> = HashSet::new();
        for id in instances {
            let values: Option<Vec<&str>> = unique
                .iter()
                .map(|leaf| descendant_value(tree, *id, list, *leaf))
                .collect();
            // Instances missing any of the leaves do not take part.
            let Some(values) = values else {
                continue;
            };
            if !seen.insert(values) {
                let text = texts.get(index).map(|(t, _)| t.to_string()).unwrap_or_default();
                return Err(Error::new(
                    ErrorCode::Unique,
                    format!("Unique data leaf(s) \"{}\" not satisfied.", text),
                )
                .with_path(tree.path_of(*id)));
            }
        }
    }
    Ok(())
}
