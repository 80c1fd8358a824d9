//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! XPath evaluation over data trees.
//!
//! Expressions are evaluated either on behalf of a schema node ("when" and
//! "must" statements, where unprefixed names belong to the namespace of that
//! node and literal prefixes are resolved in the module that defined it) or
//! on behalf of the API user (unprefixed names match nodes of any module and
//! literal prefixes are module names).

use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::compiled::{CType, CompiledSchema};
use crate::data::{Content, DataTree};
use crate::dict::xsd_to_regex;
use crate::error::{Error, ErrorCode, Result};
use crate::ids::{DataId, ModuleId, SchemaId};
use crate::schema::DataValueType;
use crate::utils::split_prefix;
use crate::xpath::{ArithOp, Axis, CmpOp, Expr, NodeTest, Path, PathStart, Step};

/// Node of the XPath data model. The root is the parent of all top-level
/// nodes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum XNode {
    Root,
    Node(DataId),
}

/// XPath value.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum XValue {
    Nodes(Vec<XNode>),
    Bool(bool),
    Num(f64),
    Str(String),
}

#[derive(Clone, Copy)]
struct Ctx {
    node: XNode,
    position: usize,
    size: usize,
}

struct Evaluator<'t, 'a> {
    tree: &'t DataTree<'a>,
    schema: &'a CompiledSchema,
    current: XNode,
    /// Namespace of unprefixed names.
    default_module: Option<ModuleId>,
    /// Module whose prefixes apply to literals.
    prefix_module: Option<ModuleId>,
    order: OnceCell<HashMap<XNode, usize>>,
}

/// Evaluate an expression with `start` as the context (and current) node.
/// `owner` is the schema node whose statement holds the expression, if any.
pub(crate) fn evaluate(
    tree: &DataTree<'_>,
    expr: &Expr,
    start: XNode,
    owner: Option<SchemaId>,
) -> Result<XValue> {
    let schema = tree.schema();
    let (default_module, prefix_module) = match owner {
        Some(owner) => {
            let node = schema.node(owner);
            (Some(node.module), Some(node.defined_in))
        }
        None => (None, None),
    };
    let evaluator = Evaluator {
        tree,
        schema,
        current: start,
        default_module,
        prefix_module,
        order: OnceCell::new(),
    };
    let ctx = Ctx {
        node: start,
        position: 1,
        size: 1,
    };
    evaluator.eval(expr, ctx)
}

/// Boolean value of an XPath value.
pub(crate) fn to_bool(value: &XValue) -> bool {
    match value {
        XValue::Nodes(nodes) => !nodes.is_empty(),
        XValue::Bool(b) => *b,
        XValue::Num(n) => *n != 0.0 && !n.is_nan(),
        XValue::Str(s) => !s.is_empty(),
    }
}

fn str_to_num(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn num_to_str(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_owned()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// XPath round(): halves go towards positive infinity.
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}

impl<'a> Evaluator<'_, 'a> {
    fn error(&self, msg: impl Into<String>) -> Error {
        Error::new(ErrorCode::Validation, msg)
    }

    // ----- data model -----

    fn parent(&self, node: XNode) -> Option<XNode> {
        match node {
            XNode::Root => None,
            XNode::Node(id) => Some(match self.tree.node(id).parent {
                Some(parent) => XNode::Node(parent),
                None => XNode::Root,
            }),
        }
    }

    fn children(&self, node: XNode) -> Vec<XNode> {
        let parent = match node {
            XNode::Root => None,
            XNode::Node(id) => Some(id),
        };
        self.tree
            .children(parent)
            .into_iter()
            .map(XNode::Node)
            .collect()
    }

    fn descendants(&self, node: XNode, out: &mut Vec<XNode>) {
        for child in self.children(node) {
            out.push(child);
            self.descendants(child, out);
        }
    }

    fn document_order(&self) -> &HashMap<XNode, usize> {
        self.order.get_or_init(|| {
            let mut nodes = vec![XNode::Root];
            self.descendants(XNode::Root, &mut nodes);
            nodes.into_iter().enumerate().map(|(i, n)| (n, i)).collect()
        })
    }

    fn sort_nodes(&self, nodes: &mut Vec<XNode>) {
        let order = self.document_order();
        nodes.sort_by_key(|n| order.get(n).copied().unwrap_or(usize::MAX));
        nodes.dedup();
    }

    fn node_module_name(&self, id: DataId) -> Option<&str> {
        let node = self.tree.node(id);
        match (&node.content, node.schema) {
            (Content::Opaque { module, .. }, _) => module.as_deref(),
            (_, Some(schema)) => {
                Some(&*self.schema.module(self.schema.node(schema).module).name)
            }
            _ => None,
        }
    }

    fn node_name(&self, id: DataId) -> &str {
        let node = self.tree.node(id);
        match (&node.content, node.schema) {
            (Content::Opaque { name, .. }, _) => name.as_str(),
            (_, Some(schema)) => &*self.schema.node(schema).name,
            _ => "",
        }
    }

    fn module_matches(&self, id: DataId, module: Option<ModuleId>) -> bool {
        let module = match module.or(self.default_module) {
            Some(module) => module,
            None => return true,
        };
        let node = self.tree.node(id);
        match node.schema {
            Some(schema) => self.schema.node(schema).module == module,
            None => self.node_module_name(id) == Some(&*self.schema.module(module).name),
        }
    }

    fn test_matches(&self, node: XNode, test: &NodeTest) -> bool {
        match (node, test) {
            (_, NodeTest::Node) => true,
            (XNode::Root, _) => false,
            (XNode::Node(_), NodeTest::Text) => false,
            (XNode::Node(id), NodeTest::Any { module }) => self.module_matches(id, *module),
            (XNode::Node(id), NodeTest::Name { module, name }) => {
                self.node_name(id) == name.as_str() && self.module_matches(id, *module)
            }
        }
    }

    fn string_value(&self, node: XNode) -> String {
        match node {
            XNode::Root => {
                let mut out = String::new();
                for child in self.children(node) {
                    out.push_str(&self.string_value(child));
                }
                out
            }
            XNode::Node(id) => match &self.tree.node(id).content {
                Content::Term(value) => value.canonical.clone(),
                Content::Opaque { value, .. } => value.clone().unwrap_or_default(),
                Content::Any(Some(serde_json::Value::String(s))) => s.clone(),
                Content::Any(Some(value)) => value.to_string(),
                Content::Any(None) => String::new(),
                Content::Inner => {
                    let mut out = String::new();
                    for child in self.children(node) {
                        out.push_str(&self.string_value(child));
                    }
                    out
                }
            },
        }
    }

    fn to_string(&self, value: &XValue) -> String {
        match value {
            XValue::Nodes(nodes) => nodes
                .first()
                .map(|n| self.string_value(*n))
                .unwrap_or_default(),
            XValue::Bool(b) => b.to_string(),
            XValue::Num(n) => num_to_str(*n),
            XValue::Str(s) => s.clone(),
        }
    }

    fn to_num(&self, value: &XValue) -> f64 {
        match value {
            XValue::Nodes(_) => str_to_num(&self.to_string(value)),
            XValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XValue::Num(n) => *n,
            XValue::Str(s) => str_to_num(s),
        }
    }

    fn term_type(&self, node: XNode) -> Option<&'a CType> {
        match node {
            XNode::Node(id) => {
                let schema = self.tree.node(id).schema?;
                self.schema.node(schema).leaf_type().map(|ty| ty.resolved())
            }
            XNode::Root => None,
        }
    }

    fn stored_base(&self, node: XNode) -> Option<DataValueType> {
        match node {
            XNode::Node(id) => self.tree.node(id).value().map(|v| v.base),
            XNode::Root => None,
        }
    }

    // Resolve a prefixed identifier written in an expression into the
    // module-qualified form data values are stored in.
    fn qualify(&self, text: &str) -> Option<String> {
        let (prefix, name) = split_prefix(text);
        let module = match prefix {
            Some(prefix) => match self.prefix_module {
                Some(scope) => self
                    .schema
                    .resolve_prefix(scope, prefix)
                    .or_else(|| self.schema.module_by_name(prefix))?,
                None => self.schema.module_by_name(prefix)?,
            },
            None => self.default_module?,
        };
        Some(format!("{}:{}", self.schema.module(module).name, name))
    }

    // ----- evaluation -----

    fn eval(&self, expr: &Expr, ctx: Ctx) -> Result<XValue> {
        match expr {
            Expr::Or(a, b) => {
                let a = self.eval(a, ctx)?;
                if to_bool(&a) {
                    return Ok(XValue::Bool(true));
                }
                Ok(XValue::Bool(to_bool(&self.eval(b, ctx)?)))
            }
            Expr::And(a, b) => {
                let a = self.eval(a, ctx)?;
                if !to_bool(&a) {
                    return Ok(XValue::Bool(false));
                }
                Ok(XValue::Bool(to_bool(&self.eval(b, ctx)?)))
            }
            Expr::Cmp(op, a, b) => {
                let a = self.eval(a, ctx)?;
                let b = self.eval(b, ctx)?;
                Ok(XValue::Bool(self.compare(*op, &a, &b)))
            }
            Expr::Arith(op, a, b) => {
                let a = self.to_num(&self.eval(a, ctx)?);
                let b = self.to_num(&self.eval(b, ctx)?);
                let n = match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                    ArithOp::Mod => a % b,
                };
                Ok(XValue::Num(n))
            }
            Expr::Neg(a) => Ok(XValue::Num(-self.to_num(&self.eval(a, ctx)?))),
            Expr::Union(a, b) => {
                let mut nodes = self.node_set(self.eval(a, ctx)?)?;
                nodes.extend(self.node_set(self.eval(b, ctx)?)?);
                self.sort_nodes(&mut nodes);
                Ok(XValue::Nodes(nodes))
            }
            Expr::Literal(s) => Ok(XValue::Str(s.clone())),
            Expr::Number(n) => Ok(XValue::Num(*n)),
            Expr::Function(name, args) => self.call(name, args, ctx),
            Expr::Path(path) => self.eval_path(path, ctx),
        }
    }

    fn node_set(&self, value: XValue) -> Result<Vec<XNode>> {
        match value {
            XValue::Nodes(nodes) => Ok(nodes),
            _ => Err(self.error("XPath expression is not a node set.")),
        }
    }

    fn eval_path(&self, path: &Path, ctx: Ctx) -> Result<XValue> {
        let mut nodes = match &path.start {
            PathStart::Root => vec![XNode::Root],
            PathStart::Context => vec![ctx.node],
            PathStart::Filter(primary, predicates) => {
                let mut nodes = self.node_set(self.eval(primary, ctx)?)?;
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                nodes
            }
        };
        for step in &path.steps {
            let mut next = Vec::new();
            for node in &nodes {
                next.extend(self.eval_step(*node, step)?);
            }
            self.sort_nodes(&mut next);
            nodes = next;
        }
        Ok(XValue::Nodes(nodes))
    }

    // Nodes selected by one step from one context node, in document order.
    fn eval_step(&self, node: XNode, step: &Step) -> Result<Vec<XNode>> {
        // Proximity order: reverse axes list the nearest node first.
        let mut candidates = Vec::new();
        match step.axis {
            Axis::Child => candidates = self.children(node),
            Axis::Descendant => self.descendants(node, &mut candidates),
            Axis::DescendantOrSelf => {
                candidates.push(node);
                self.descendants(node, &mut candidates);
            }
            Axis::Parent => candidates.extend(self.parent(node)),
            Axis::Ancestor | Axis::AncestorOrSelf => {
                if step.axis == Axis::AncestorOrSelf {
                    candidates.push(node);
                }
                let mut current = self.parent(node);
                while let Some(n) = current {
                    candidates.push(n);
                    current = self.parent(n);
                }
            }
            Axis::SelfAxis => candidates.push(node),
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                if let Some(parent) = self.parent(node) {
                    let siblings = self.children(parent);
                    let index = siblings.iter().position(|s| *s == node).unwrap_or(0);
                    if step.axis == Axis::FollowingSibling {
                        candidates.extend(siblings[index + 1..].iter().copied());
                    } else {
                        candidates.extend(siblings[..index].iter().rev().copied());
                    }
                }
            }
            Axis::Following | Axis::Preceding => {
                let order = self.document_order();
                let position = order.get(&node).copied().unwrap_or(0);
                let mut ancestors = Vec::new();
                let mut current = self.parent(node);
                while let Some(n) = current {
                    ancestors.push(n);
                    current = self.parent(n);
                }
                let mut descendants = Vec::new();
                self.descendants(node, &mut descendants);
                let mut all: Vec<(usize, XNode)> =
                    order.iter().map(|(n, i)| (*i, *n)).collect();
                all.sort_by_key(|(i, _)| *i);
                if step.axis == Axis::Following {
                    candidates.extend(
                        all.iter()
                            .filter(|(i, n)| *i > position && !descendants.contains(n))
                            .map(|(_, n)| *n),
                    );
                } else {
                    candidates.extend(
                        all.iter()
                            .rev()
                            .filter(|(i, n)| *i < position && !ancestors.contains(n))
                            .map(|(_, n)| *n),
                    );
                }
            }
            // Metadata is not part of the node model.
            Axis::Attribute => (),
        }

        let mut nodes: Vec<XNode> = candidates
            .into_iter()
            .filter(|n| self.test_matches(*n, &step.test))
            .collect();
        for predicate in &step.predicates {
            nodes = self.filter(nodes, predicate)?;
        }
        Ok(nodes)
    }

    fn filter(&self, nodes: Vec<XNode>, predicate: &Expr) -> Result<Vec<XNode>> {
        let size = nodes.len();
        let mut out = Vec::new();
        for (index, node) in nodes.into_iter().enumerate() {
            let ctx = Ctx {
                node,
                position: index + 1,
                size,
            };
            let keep = match self.eval(predicate, ctx)? {
                XValue::Num(n) => n == (index + 1) as f64,
                value => to_bool(&value),
            };
            if keep {
                out.push(node);
            }
        }
        Ok(out)
    }

    // ----- comparisons -----

    fn compare(&self, op: CmpOp, a: &XValue, b: &XValue) -> bool {
        match (a, b) {
            (XValue::Nodes(x), XValue::Nodes(y)) => x.iter().any(|n| {
                let s = self.string_value(*n);
                y.iter()
                    .any(|m| self.compare_atoms(op, &XValue::Str(s.clone()), &XValue::Str(self.string_value(*m))))
            }),
            (XValue::Nodes(x), other) => self.compare_set(op, x, other, false),
            (other, XValue::Nodes(y)) => self.compare_set(op, y, other, true),
            _ => self.compare_atoms(op, a, b),
        }
    }

    fn compare_set(&self, op: CmpOp, nodes: &[XNode], other: &XValue, swapped: bool) -> bool {
        if let XValue::Bool(b) = other {
            let set = XValue::Bool(!nodes.is_empty());
            let other = XValue::Bool(*b);
            return if swapped {
                self.compare_atoms(op, &other, &set)
            } else {
                self.compare_atoms(op, &set, &other)
            };
        }
        nodes.iter().any(|node| {
            let value = match other {
                XValue::Num(_) => XValue::Num(str_to_num(&self.string_value(*node))),
                _ => XValue::Str(self.string_value(*node)),
            };
            let other = match (other, self.stored_base(*node)) {
                // Identities written in the expression use its prefixes.
                (XValue::Str(s), Some(DataValueType::IdentityRef))
                    if matches!(op, CmpOp::Eq | CmpOp::Ne) =>
                {
                    XValue::Str(self.qualify(s).unwrap_or_else(|| s.clone()))
                }
                _ => other.clone(),
            };
            if swapped {
                self.compare_atoms(op, &other, &value)
            } else {
                self.compare_atoms(op, &value, &other)
            }
        })
    }

    fn compare_atoms(&self, op: CmpOp, a: &XValue, b: &XValue) -> bool {
        match op {
            CmpOp::Eq | CmpOp::Ne => {
                let equal = match (a, b) {
                    (XValue::Bool(_), _) | (_, XValue::Bool(_)) => to_bool(a) == to_bool(b),
                    (XValue::Num(_), _) | (_, XValue::Num(_)) => self.to_num(a) == self.to_num(b),
                    _ => self.to_string(a) == self.to_string(b),
                };
                equal == (op == CmpOp::Eq)
            }
            _ => {
                let (x, y) = (self.to_num(a), self.to_num(b));
                match x.partial_cmp(&y) {
                    Some(Ordering::Less) => matches!(op, CmpOp::Lt | CmpOp::Le),
                    Some(Ordering::Equal) => matches!(op, CmpOp::Le | CmpOp::Ge),
                    Some(Ordering::Greater) => matches!(op, CmpOp::Gt | CmpOp::Ge),
                    None => false,
                }
            }
        }
    }

    // ----- functions -----

    fn arg_string(&self, args: &[Expr], index: usize, ctx: Ctx) -> Result<String> {
        match args.get(index) {
            Some(arg) => Ok(self.to_string(&self.eval(arg, ctx)?)),
            None => Ok(self.string_value(ctx.node)),
        }
    }

    fn arg_num(&self, args: &[Expr], index: usize, ctx: Ctx) -> Result<f64> {
        match args.get(index) {
            Some(arg) => Ok(self.to_num(&self.eval(arg, ctx)?)),
            None => Ok(str_to_num(&self.string_value(ctx.node))),
        }
    }

    fn arg_nodes(&self, args: &[Expr], index: usize, ctx: Ctx) -> Result<Vec<XNode>> {
        match args.get(index) {
            Some(arg) => self.node_set(self.eval(arg, ctx)?),
            None => Ok(vec![ctx.node]),
        }
    }

    fn call(&self, name: &str, args: &[Expr], ctx: Ctx) -> Result<XValue> {
        let value = match name {
            "last" => XValue::Num(ctx.size as f64),
            "position" => XValue::Num(ctx.position as f64),
            "current" => XValue::Nodes(vec![self.current]),
            "true" => XValue::Bool(true),
            "false" => XValue::Bool(false),
            "not" => XValue::Bool(!to_bool(&self.eval(&args[0], ctx)?)),
            "boolean" => XValue::Bool(to_bool(&self.eval(&args[0], ctx)?)),
            "count" => XValue::Num(self.arg_nodes(args, 0, ctx)?.len() as f64),
            "number" => XValue::Num(self.arg_num(args, 0, ctx)?),
            "string" => XValue::Str(self.arg_string(args, 0, ctx)?),
            "concat" => {
                let mut out = String::new();
                for index in 0..args.len() {
                    out.push_str(&self.arg_string(args, index, ctx)?);
                }
                XValue::Str(out)
            }
            "contains" => {
                let s = self.arg_string(args, 0, ctx)?;
                XValue::Bool(s.contains(&self.arg_string(args, 1, ctx)?))
            }
            "starts-with" => {
                let s = self.arg_string(args, 0, ctx)?;
                XValue::Bool(s.starts_with(&self.arg_string(args, 1, ctx)?))
            }
            "substring-before" => {
                let s = self.arg_string(args, 0, ctx)?;
                let pat = self.arg_string(args, 1, ctx)?;
                XValue::Str(s.find(&pat).map(|i| s[..i].to_owned()).unwrap_or_default())
            }
            "substring-after" => {
                let s = self.arg_string(args, 0, ctx)?;
                let pat = self.arg_string(args, 1, ctx)?;
                XValue::Str(
                    s.find(&pat)
                        .map(|i| s[i + pat.len()..].to_owned())
                        .unwrap_or_default(),
                )
            }
            "substring" => {
                let s = self.arg_string(args, 0, ctx)?;
                let start = xpath_round(self.arg_num(args, 1, ctx)?);
                let end = match args.get(2) {
                    Some(_) => start + xpath_round(self.arg_num(args, 2, ctx)?),
                    None => f64::INFINITY,
                };
                let out: String = s
                    .chars()
                    .enumerate()
                    .filter(|(i, _)| {
                        let p = (*i + 1) as f64;
                        p >= start && p < end
                    })
                    .map(|(_, c)| c)
                    .collect();
                XValue::Str(out)
            }
            "string-length" => XValue::Num(self.arg_string(args, 0, ctx)?.chars().count() as f64),
            "normalize-space" => XValue::Str(
                self.arg_string(args, 0, ctx)?
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            "translate" => {
                let s = self.arg_string(args, 0, ctx)?;
                let from: Vec<char> = self.arg_string(args, 1, ctx)?.chars().collect();
                let to: Vec<char> = self.arg_string(args, 2, ctx)?.chars().collect();
                let out = s
                    .chars()
                    .filter_map(|c| match from.iter().position(|f| *f == c) {
                        Some(i) => to.get(i).copied(),
                        None => Some(c),
                    })
                    .collect();
                XValue::Str(out)
            }
            "floor" => XValue::Num(self.arg_num(args, 0, ctx)?.floor()),
            "ceiling" => XValue::Num(self.arg_num(args, 0, ctx)?.ceil()),
            "round" => XValue::Num(xpath_round(self.arg_num(args, 0, ctx)?)),
            "sum" => {
                let nodes = self.arg_nodes(args, 0, ctx)?;
                XValue::Num(
                    nodes
                        .iter()
                        .map(|n| str_to_num(&self.string_value(*n)))
                        .sum(),
                )
            }
            "local-name" | "name" => {
                let nodes = self.arg_nodes(args, 0, ctx)?;
                let out = match nodes.first() {
                    Some(XNode::Node(id)) => {
                        let local = self.node_name(*id).to_owned();
                        match (name, self.node_module_name(*id)) {
                            ("name", Some(module)) => format!("{}:{}", module, local),
                            _ => local,
                        }
                    }
                    _ => String::new(),
                };
                XValue::Str(out)
            }
            "re-match" => {
                let s = self.arg_string(args, 0, ctx)?;
                let pattern = self.arg_string(args, 1, ctx)?;
                let regex = regex::Regex::new(&xsd_to_regex(&pattern)).map_err(|err| {
                    self.error(format!("Invalid regular expression \"{}\": {}", pattern, err))
                })?;
                XValue::Bool(regex.is_match(&s))
            }
            "deref" => {
                let nodes = self.arg_nodes(args, 0, ctx)?;
                XValue::Nodes(match nodes.first() {
                    Some(node) => self.deref(*node),
                    None => Vec::new(),
                })
            }
            "derived-from" | "derived-from-or-self" => {
                let nodes = self.arg_nodes(args, 0, ctx)?;
                let identity = self.arg_string(args, 1, ctx)?;
                let or_self = name == "derived-from-or-self";
                XValue::Bool(self.derived_from(&nodes, &identity, or_self))
            }
            "enum-value" => {
                let nodes = self.arg_nodes(args, 0, ctx)?;
                let value = nodes.first().and_then(|node| {
                    let ty = self.term_type(*node)?;
                    let name = self.string_value(*node);
                    ty.enums
                        .iter()
                        .chain(ty.union.iter().flat_map(|t| t.enums.iter()))
                        .find(|e| *e.name == *name)
                        .map(|e| e.value as f64)
                });
                XValue::Num(value.unwrap_or(f64::NAN))
            }
            "bit-is-set" => {
                let nodes = self.arg_nodes(args, 0, ctx)?;
                let bit = self.arg_string(args, 1, ctx)?;
                let set = nodes.first().is_some_and(|node| {
                    self.stored_base(*node) == Some(DataValueType::Bits)
                        && self.string_value(*node).split_whitespace().any(|b| b == bit)
                });
                XValue::Bool(set)
            }
            _ => {
                return Err(self.error(format!("Unknown XPath function \"{}\".", name)));
            }
        };
        Ok(value)
    }

    // Target instances of a leafref or instance-identifier node.
    fn deref(&self, node: XNode) -> Vec<XNode> {
        let XNode::Node(id) = node else {
            return Vec::new();
        };
        let Some(schema) = self.tree.node(id).schema else {
            return Vec::new();
        };
        let Some(ty) = self.schema.node(schema).leaf_type() else {
            return Vec::new();
        };
        let value = self.string_value(node);
        if let Some(target) = ty.leafref.as_ref().and_then(|l| l.target) {
            let mut all = Vec::new();
            self.descendants(XNode::Root, &mut all);
            return all
                .into_iter()
                .filter(|n| match n {
                    XNode::Node(i) => {
                        let dnode = self.tree.node(*i);
                        dnode.schema == Some(target)
                            && dnode.value().is_some_and(|v| v.canonical == value)
                    }
                    XNode::Root => false,
                })
                .collect();
        }
        if ty.resolved().base == DataValueType::InstanceId {
            if let Ok(Some(target)) = crate::data::path::find(self.tree, None, &value, false) {
                return vec![XNode::Node(target)];
            }
        }
        Vec::new()
    }

    fn derived_from(&self, nodes: &[XNode], identity: &str, or_self: bool) -> bool {
        let Some(base) = self.qualify(identity) else {
            return false;
        };
        let find = |qualified: &str| {
            let (module, name) = split_prefix(qualified);
            let module = self.schema.module_by_name(module?)?;
            self.schema.find_identity(module, name)
        };
        let Some(base_id) = find(&base) else {
            return false;
        };
        nodes.iter().any(|node| {
            if self.stored_base(*node) != Some(DataValueType::IdentityRef) {
                return false;
            }
            let value = self.string_value(*node);
            match find(&value) {
                Some(id) => {
                    (or_self && id == base_id) || self.schema.identity_derived_from(id, base_id)
                }
                None => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_formatting() {
        assert_eq!(num_to_str(3.0), "3");
        assert_eq!(num_to_str(-0.5), "-0.5");
        assert_eq!(num_to_str(f64::NAN), "NaN");
        assert_eq!(num_to_str(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn rounding() {
        assert_eq!(xpath_round(2.5), 3.0);
        assert_eq!(xpath_round(-2.5), -2.0);
        assert!(xpath_round(f64::NAN).is_nan());
    }

    #[test]
    fn boolean_values() {
        assert!(!to_bool(&XValue::Nodes(Vec::new())));
        assert!(to_bool(&XValue::Str("false".to_owned())));
        assert!(!to_bool(&XValue::Num(f64::NAN)));
        assert!(to_bool(&XValue::Bool(true)));
    }

    #[test]
    fn string_numbers() {
        assert_eq!(str_to_num(" 42 "), 42.0);
        assert!(str_to_num("abc").is_nan());
    }
}
