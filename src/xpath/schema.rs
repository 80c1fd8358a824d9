//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Evaluation of paths against the schema tree (leafref targets and schema
//! lookups).

use crate::compiled::{CNodeKind, CompiledSchema};
use crate::error::{Error, ErrorCode, Result};
use crate::ids::{ModuleId, SchemaId};
use crate::xpath::{Axis, Expr, NodeTest, Path, PathStart, Step};

const MAX_DEREF_DEPTH: usize = 32;

/// Resolve the schema node targeted by a leafref path of the node
/// `context`.
pub(crate) fn leafref_target(
    schema: &CompiledSchema,
    context: SchemaId,
    expr: &Expr,
) -> Result<SchemaId> {
    leafref_target_depth(schema, context, expr, 0)
}

fn leafref_target_depth(
    schema: &CompiledSchema,
    context: SchemaId,
    expr: &Expr,
    depth: usize,
) -> Result<SchemaId> {
    if depth > MAX_DEREF_DEPTH {
        return Err(Error::new(
            ErrorCode::CyclicDefinition,
            "Invalid leafref path - circular chain of deref() calls.",
        ));
    }
    let path = match expr {
        Expr::Path(path) => path,
        _ => return Err(Error::compile("Invalid leafref path - not a location path.")),
    };
    let output = schema
        .enclosing(context, |k| matches!(k, CNodeKind::Output))
        .is_some();
    let default_module = schema.node(context).module;

    let mut current: Option<SchemaId> = match &path.start {
        PathStart::Root => None,
        PathStart::Context => Some(context),
        PathStart::Filter(function, _) => {
            let arg = match function.as_ref() {
                Expr::Function(name, args) if name == "deref" && args.len() == 1 => &args[0],
                _ => {
                    return Err(Error::compile(
                        "Invalid leafref path - only deref() may start a path.",
                    ))
                }
            };
            let referring = leafref_target_depth(schema, context, arg, depth + 1)?;
            let leafref = schema
                .node(referring)
                .leaf_type()
                .and_then(|ty| ty.leafref.as_ref())
                .ok_or_else(|| {
                    Error::compile("Invalid leafref path - deref() argument is not a leafref.")
                })?;
            Some(leafref_target_depth(schema, referring, &leafref.expr, depth + 1)?)
        }
    };

    for step in &path.steps {
        current = match (&step.axis, &step.test) {
            (Axis::Parent, NodeTest::Node) => {
                let node = current.ok_or_else(|| {
                    Error::compile("Invalid leafref path - too many \"..\" in the path.")
                })?;
                Some(schema.data_parent(node).ok_or_else(|| {
                    Error::compile("Invalid leafref path - too many \"..\" in the path.")
                })?)
            }
            (Axis::SelfAxis, NodeTest::Node) => current,
            (Axis::Child, NodeTest::Name { module, name }) => {
                let module = module.unwrap_or(default_module);
                let child = schema
                    .find_data_child(current, Some(module), name, output)
                    .ok_or_else(|| {
                        Error::compile(format!(
                            "Invalid leafref path - node \"{}:{}\" not found.",
                            schema.module(module).name,
                            name
                        ))
                    })?;
                Some(child)
            }
            _ => {
                return Err(Error::compile(
                    "Invalid leafref path - unsupported step.",
                ))
            }
        };
    }

    let target = current.ok_or_else(|| Error::compile("Invalid leafref path - empty path."))?;
    if !schema.node(target).is_term() {
        return Err(Error::compile(format!(
            "Invalid leafref path - target node \"{}\" is not a leaf or leaf-list.",
            schema.node(target).name
        )));
    }
    Ok(target)
}

/// Schema nodes selected by a location path. Predicates are ignored and
/// unprefixed names match in any module.
pub(crate) fn find_nodes(
    schema: &CompiledSchema,
    expr: &Expr,
    output: bool,
) -> Result<Vec<SchemaId>> {
    let path = match expr {
        Expr::Path(
            path @ Path {
                start: PathStart::Root,
                ..
            },
        ) => path,
        Expr::Union(a, b) => {
            let mut out = find_nodes(schema, a, output)?;
            for id in find_nodes(schema, b, output)? {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
            return Ok(out);
        }
        _ => {
            return Err(Error::not_found(
                "Schema lookups require an absolute path.",
            ))
        }
    };

    let mut set: Vec<Option<SchemaId>> = vec![None];
    for step in &path.steps {
        let mut next: Vec<Option<SchemaId>> = Vec::new();
        for node in &set {
            for id in step_nodes(schema, *node, step, output) {
                if !next.contains(&id) {
                    next.push(id);
                }
            }
        }
        set = next;
    }
    Ok(set.into_iter().flatten().collect())
}

fn children(schema: &CompiledSchema, node: Option<SchemaId>, output: bool) -> Vec<SchemaId> {
    match node {
        Some(node) => schema.data_children(node, output),
        None => schema.top_level().collect(),
    }
}

fn name_matches(
    schema: &CompiledSchema,
    id: SchemaId,
    test: &NodeTest,
) -> bool {
    let node = schema.node(id);
    let module_ok = |module: &Option<ModuleId>| module.map_or(true, |m| m == node.module);
    match test {
        NodeTest::Name { module, name } => module_ok(module) && *node.name == **name,
        NodeTest::Any { module } => module_ok(module),
        NodeTest::Node => true,
        NodeTest::Text => false,
    }
}

fn step_nodes(
    schema: &CompiledSchema,
    node: Option<SchemaId>,
    step: &Step,
    output: bool,
) -> Vec<Option<SchemaId>> {
    let mut out = Vec::new();
    match step.axis {
        Axis::Child => {
            for child in children(schema, node, output) {
                if name_matches(schema, child, &step.test) {
                    out.push(Some(child));
                }
            }
        }
        Axis::Descendant | Axis::DescendantOrSelf => {
            if step.axis == Axis::DescendantOrSelf {
                match node {
                    Some(id) if name_matches(schema, id, &step.test) => out.push(node),
                    None if step.test == NodeTest::Node => out.push(None),
                    _ => (),
                }
            }
            let mut stack = children(schema, node, output);
            stack.reverse();
            while let Some(id) = stack.pop() {
                if name_matches(schema, id, &step.test) {
                    out.push(Some(id));
                }
                let mut kids = schema.data_children(id, output);
                kids.reverse();
                stack.extend(kids);
            }
        }
        Axis::Parent => {
            if let Some(id) = node {
                let parent = schema.data_parent(id);
                match parent {
                    Some(p) if name_matches(schema, p, &step.test) => out.push(Some(p)),
                    None if step.test == NodeTest::Node => out.push(None),
                    _ => (),
                }
            }
        }
        Axis::SelfAxis => out.push(node),
        _ => (),
    }
    out
}
