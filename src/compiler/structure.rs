//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Structural expansion: data definition statements, groupings and refines.

use std::rc::Rc;
use std::sync::Arc;

use crate::compiled::{CExt, CMust, CNode, CNodeKind, CWhen, NodeFlags};
use crate::compiler::features::IfFeature;
use crate::compiler::types::grouping_scope;
use crate::compiler::{addr, Compiler, Scope};
use crate::error::{Error, ErrorCode, Result};
use crate::ids::{ModuleId, SchemaId};
use crate::parsed::{
    PAugment, PExtInstance, PGrouping, PMust, PNode, PNodeKind, PRefine, PWhen,
};
use crate::schema::SchemaPathFormat;
use crate::utils::split_prefix;

/// Placement of the nodes being compiled.
#[derive(Clone)]
pub(crate) struct NodeCtx {
    pub parent: Option<SchemaId>,
    /// Namespace of the new nodes.
    pub module: ModuleId,
    /// if-features inherited from uses and augment statements.
    pub if_features: Vec<Arc<IfFeature>>,
    /// when conditions inherited from uses and augment statements.
    pub whens: Vec<Arc<CWhen>>,
}

impl NodeCtx {
    pub(crate) fn new(parent: Option<SchemaId>, module: ModuleId) -> NodeCtx {
        NodeCtx {
            parent,
            module,
            if_features: Vec::new(),
            whens: Vec::new(),
        }
    }
}

/// Starting point of a schema node identifier.
#[derive(Clone, Copy)]
pub(crate) enum NodeidStart<'a> {
    /// Absolute identifier, resolved from the top-level nodes of the modules.
    Absolute,
    /// Descendant identifier, resolved from a set of candidate nodes.
    Descendant(&'a [SchemaId]),
}

impl<'c> Compiler<'c> {
    pub(super) fn compile_structure(&mut self) -> Result<()> {
        let entries = self.entries;
        for (index, entry) in entries.iter().enumerate() {
            if !self.implemented[index] {
                continue;
            }
            let module = ModuleId::from_index(index);
            let scope = self.root_scope(module);
            let ctx = NodeCtx::new(None, module);
            for pnode in &entry.parsed.body {
                self.compile_node(pnode, &scope, &ctx)?;
            }
            let exts = self.compile_exts(module, &entry.parsed.exts)?;
            self.out.modules[index].exts = exts;
        }
        Ok(())
    }

    /// Compile a data definition statement and attach it to `ctx.parent`.
    /// Returns the created nodes (several for `uses`).
    pub(crate) fn compile_node(
        &mut self,
        pnode: &'c PNode,
        scope: &Rc<Scope<'c>>,
        ctx: &NodeCtx,
    ) -> Result<Vec<SchemaId>> {
        if let PNodeKind::Uses { refines, augments } = &pnode.kind {
            return self.compile_uses(pnode, refines, augments, scope, ctx);
        }

        let module = scope.module;
        let kind = match &pnode.kind {
            PNodeKind::Container { presence } => CNodeKind::Container {
                presence: self.intern_opt(presence.as_deref()),
            },
            PNodeKind::Leaf { ty, units, default } => {
                let ty = self
                    .compile_type(ty, scope)
                    .map_err(|err| err.with_path_opt(self.pending_path(ctx, &pnode.name)))?;
                let units = match units {
                    Some(units) => Some(self.intern(units)),
                    None => ty.units.clone(),
                };
                let default_text = match default {
                    Some(default) => Some((self.intern(default), module)),
                    None => None,
                };
                CNodeKind::Leaf {
                    ty,
                    units,
                    default: None,
                    default_text,
                }
            }
            PNodeKind::LeafList {
                ty,
                units,
                defaults,
                min_elements,
                max_elements,
                ..
            } => {
                let ty = self
                    .compile_type(ty, scope)
                    .map_err(|err| err.with_path_opt(self.pending_path(ctx, &pnode.name)))?;
                let units = match units {
                    Some(units) => Some(self.intern(units)),
                    None => ty.units.clone(),
                };
                let defaults_text =
                    defaults.iter().map(|d| (self.dict.intern(d), module)).collect();
                CNodeKind::LeafList {
                    ty,
                    units,
                    defaults: Vec::new(),
                    defaults_text,
                    min: min_elements.unwrap_or(0),
                    max: *max_elements,
                }
            }
            PNodeKind::List {
                key,
                uniques,
                min_elements,
                max_elements,
                ..
            } => CNodeKind::List {
                keys: Vec::new(),
                key_names: key
                    .as_deref()
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(|k| self.dict.intern(k))
                    .collect(),
                uniques: Vec::new(),
                unique_texts: uniques
                    .iter()
                    .map(|u| (self.dict.intern(u), module))
                    .collect(),
                min: min_elements.unwrap_or(0),
                max: *max_elements,
            },
            PNodeKind::Choice { default } => CNodeKind::Choice {
                default_case: None,
                default_name: self.intern_opt(default.as_deref()),
            },
            PNodeKind::Case => CNodeKind::Case,
            PNodeKind::AnyData => CNodeKind::AnyData,
            PNodeKind::AnyXml => CNodeKind::AnyXml,
            PNodeKind::Rpc => CNodeKind::Rpc,
            PNodeKind::Action => CNodeKind::Action,
            PNodeKind::Input => CNodeKind::Input,
            PNodeKind::Output => CNodeKind::Output,
            PNodeKind::Notification => CNodeKind::Notification,
            PNodeKind::Uses { .. } => unreachable!(),
        };

        let name = self.intern(&pnode.name);
        let mut node = CNode::new(kind, name, ctx.module, module);
        node.line = pnode.line;
        node.config_stmt = pnode.config;
        node.mandatory_stmt = pnode.mandatory;
        node.status_stmt = pnode.status;
        node.description = self.intern_opt(pnode.description.as_deref());
        node.reference = self.intern_opt(pnode.reference.as_deref());
        if let PNodeKind::LeafList {
            ordered_by_user: true,
            ..
        }
        | PNodeKind::List {
            ordered_by_user: true,
            ..
        } = &pnode.kind
        {
            node.flags |= NodeFlags::USER_ORDERED;
        }

        let path = self.pending_path(ctx, &pnode.name);
        node.if_features = ctx.if_features.clone();
        for text in &pnode.if_features {
            let iff = self
                .compile_if_feature(module, text)
                .map_err(|err| err.with_path_opt(path.clone()))?;
            node.if_features.push(iff);
        }
        node.whens = ctx.whens.clone();
        if let Some(when) = &pnode.when {
            let when = self
                .compile_when(module, when, false)
                .map_err(|err| err.with_path_opt(path.clone()))?;
            node.whens.push(when);
        }
        node.musts = self
            .compile_musts(module, &pnode.musts)
            .map_err(|err| err.with_path_opt(path.clone()))?;
        node.exts = self
            .compile_exts(module, &pnode.exts)
            .map_err(|err| err.with_path_opt(path.clone()))?;

        let is_choice = matches!(node.kind, CNodeKind::Choice { .. });
        let is_operation = matches!(node.kind, CNodeKind::Rpc | CNodeKind::Action);
        let id = self.out.add_node(node);
        self.attach(ctx.parent, id)?;

        // Children.
        let inner = node_scope(scope, pnode);
        let child_ctx = NodeCtx::new(Some(id), ctx.module);
        for child in &pnode.children {
            if is_choice && !matches!(child.kind, PNodeKind::Case) {
                self.compile_shorthand_case(child, &inner, &child_ctx)?;
            } else {
                self.compile_node(child, &inner, &child_ctx)?;
            }
        }
        if is_operation {
            self.add_implicit_io(id, ctx.module, module)?;
        }
        Ok(vec![id])
    }

    /// Wrap a choice child that is not a case into an implicit case.
    pub(crate) fn compile_shorthand_case(
        &mut self,
        pnode: &'c PNode,
        scope: &Rc<Scope<'c>>,
        ctx: &NodeCtx,
    ) -> Result<Vec<SchemaId>> {
        let name = self.intern(&pnode.name);
        let mut case = CNode::new(CNodeKind::Case, name, ctx.module, scope.module);
        case.line = pnode.line;
        case.flags |= NodeFlags::IMPLICIT_CASE;
        let case = self.out.add_node(case);
        self.attach(ctx.parent, case)?;
        let case_ctx = NodeCtx {
            parent: Some(case),
            ..ctx.clone()
        };
        self.compile_node(pnode, scope, &case_ctx)?;
        Ok(vec![case])
    }

    // Every rpc and action has an input and an output.
    fn add_implicit_io(
        &mut self,
        operation: SchemaId,
        module: ModuleId,
        defined_in: ModuleId,
    ) -> Result<()> {
        let has = |schema: &crate::compiled::CompiledSchema, output: bool| {
            schema.node(operation).children.iter().any(|c| {
                matches!(
                    (&schema.node(*c).kind, output),
                    (CNodeKind::Input, false) | (CNodeKind::Output, true)
                )
            })
        };
        for (output, kind, name) in [
            (false, CNodeKind::Input, "input"),
            (true, CNodeKind::Output, "output"),
        ] {
            if !has(&self.out, output) {
                let name = self.intern(name);
                let node = CNode::new(kind, name, module, defined_in);
                let id = self.out.add_node(node);
                self.attach(Some(operation), id)?;
            }
        }
        // Input first.
        let schema = &mut self.out;
        let mut children = std::mem::take(&mut schema.node_mut(operation).children);
        children.sort_by_key(|c| matches!(schema.node(*c).kind, CNodeKind::Output));
        schema.node_mut(operation).children = children;
        Ok(())
    }

    /// Link a new node to its parent, or to its module when top-level.
    pub(crate) fn attach(&mut self, parent: Option<SchemaId>, id: SchemaId) -> Result<()> {
        let node = self.out.node(id);
        let (name, module) = (node.name.clone(), node.module);
        let is_action = matches!(node.kind, CNodeKind::Action | CNodeKind::Rpc);
        let is_notif = matches!(node.kind, CNodeKind::Notification);

        let siblings: Vec<SchemaId> = match parent {
            Some(parent) => {
                let p = self.out.node(parent);
                p.children
                    .iter()
                    .chain(p.actions.iter())
                    .chain(p.notifications.iter())
                    .copied()
                    .collect()
            }
            None => {
                let m = self.out.module(module);
                m.data
                    .iter()
                    .chain(m.rpcs.iter())
                    .chain(m.notifications.iter())
                    .copied()
                    .collect()
            }
        };
        let duplicate = siblings.iter().any(|s| {
            let sibling = self.out.node(*s);
            sibling.name == name && sibling.module == module
        });
        if duplicate {
            let what = if is_action {
                "RPC/action"
            } else if is_notif {
                "notification"
            } else {
                "data definition"
            };
            return Err(Error::compile(format!(
                "Duplicate identifier \"{}\" of {} statement.",
                name, what
            ))
            .with_path_opt(parent.map(|p| self.out.path(p, SchemaPathFormat::LOG))));
        }

        self.out.node_mut(id).parent = parent;
        match parent {
            Some(parent) => {
                let p = self.out.node_mut(parent);
                if is_action {
                    p.actions.push(id);
                } else if is_notif {
                    p.notifications.push(id);
                } else {
                    p.children.push(id);
                }
            }
            None => {
                let m = &mut self.out.modules[module.to_index()];
                if is_action {
                    m.rpcs.push(id);
                } else if is_notif {
                    m.notifications.push(id);
                } else {
                    m.data.push(id);
                }
            }
        }
        Ok(())
    }

    fn compile_uses(
        &mut self,
        pnode: &'c PNode,
        refines: &'c [PRefine],
        augments: &'c [PAugment],
        scope: &Rc<Scope<'c>>,
        ctx: &NodeCtx,
    ) -> Result<Vec<SchemaId>> {
        let module = scope.module;
        let path = self.pending_path(ctx, &format!("{{uses='{}'}}", pnode.name));
        let (grouping, gscope) = self
            .find_grouping(&pnode.name, scope)
            .map_err(|err| err.with_path_opt(path.clone()))?;

        let key = addr(grouping);
        if self.grouping_stack.contains(&key) {
            return Err(Error::new(
                ErrorCode::CyclicDefinition,
                format!(
                    "Grouping \"{}\" references itself through a uses statement.",
                    grouping.name
                ),
            )
            .with_path_opt(path));
        }

        let mut uses_ctx = ctx.clone();
        for text in &pnode.if_features {
            let iff = self
                .compile_if_feature(module, text)
                .map_err(|err| err.with_path_opt(path.clone()))?;
            uses_ctx.if_features.push(iff);
        }
        if let Some(when) = &pnode.when {
            let when = self
                .compile_when(module, when, true)
                .map_err(|err| err.with_path_opt(path.clone()))?;
            uses_ctx.whens.push(when);
        }

        self.grouping_stack.push(key);
        let inner = grouping_scope(&gscope, grouping);
        let mut created = Vec::new();
        let result = (|| -> Result<()> {
            for child in &grouping.children {
                let ids = self.compile_node(child, &inner, &uses_ctx)?;
                created.extend(ids);
            }
            Ok(())
        })();
        self.grouping_stack.pop();
        result?;

        for refine in refines {
            self.apply_refine(module, refine, &created)
                .map_err(|err| err.with_path_opt(path.clone()))?;
        }
        for augment in augments {
            let target = self
                .resolve_nodeid(module, &augment.target, NodeidStart::Descendant(&created))
                .map_err(|err| {
                    Error::new(ErrorCode::AugmentTarget, err.msg.unwrap_or_default())
                        .with_path_opt(path.clone())
                })?;
            self.compile_augment_children(module, augment, scope, ctx.module, target)?;
        }
        Ok(created)
    }

    fn find_grouping(
        &self,
        name: &str,
        scope: &Rc<Scope<'c>>,
    ) -> Result<(&'c PGrouping, Rc<Scope<'c>>)> {
        let (prefix, local) = split_prefix(name);
        let module = match prefix {
            Some(prefix) => self.prefix_module(scope.module, prefix).ok_or_else(|| {
                Error::compile(format!(
                    "Invalid prefix \"{}\" of grouping \"{}\".",
                    prefix, name
                ))
            })?,
            None => scope.module,
        };
        if module == scope.module {
            let mut current = Some(scope.clone());
            while let Some(s) = current {
                if let Some(grouping) = s.groupings.iter().find(|g| g.name == local) {
                    return Ok((grouping, s));
                }
                current = s.parent.clone();
            }
        } else {
            let root = self.root_scope(module);
            if let Some(grouping) = root.groupings.iter().find(|g| g.name == local) {
                return Ok((grouping, root));
            }
        }
        Err(Error::compile(format!(
            "Grouping \"{}\" referenced by a uses statement not found.",
            name
        )))
    }

    fn apply_refine(
        &mut self,
        module: ModuleId,
        refine: &'c PRefine,
        created: &[SchemaId],
    ) -> Result<()> {
        let target = self.resolve_nodeid(
            module,
            &refine.target,
            NodeidStart::Descendant(created),
        )?;
        let invalid = |what: &str| {
            Error::compile(format!(
                "Invalid refine of \"{}\" node - it is not possible to replace \"{}\" property.",
                refine.target, what
            ))
        };

        let mut if_features = Vec::new();
        for text in &refine.if_features {
            if_features.push(self.compile_if_feature(module, text)?);
        }
        let musts = self.compile_musts(module, &refine.musts)?;
        let description = self.intern_opt(refine.description.as_deref());
        let reference = self.intern_opt(refine.reference.as_deref());
        let presence = self.intern_opt(refine.presence.as_deref());
        let defaults: Vec<(Arc<str>, ModuleId)> = refine
            .defaults
            .iter()
            .map(|d| (self.dict.intern(d), module))
            .collect();

        let node = self.out.node_mut(target);
        if description.is_some() {
            node.description = description;
        }
        if reference.is_some() {
            node.reference = reference;
        }
        if refine.config.is_some() {
            node.config_stmt = refine.config;
        }
        if let Some(mandatory) = refine.mandatory {
            match node.kind {
                CNodeKind::Leaf { .. }
                | CNodeKind::Choice { .. }
                | CNodeKind::AnyData
                | CNodeKind::AnyXml => node.mandatory_stmt = Some(mandatory),
                _ => return Err(invalid("mandatory")),
            }
        }
        node.if_features.extend(if_features);
        node.musts.extend(musts);
        if presence.is_some() {
            match &mut node.kind {
                CNodeKind::Container { presence: p } => *p = presence,
                _ => return Err(invalid("presence")),
            }
        }
        if !defaults.is_empty() {
            match &mut node.kind {
                CNodeKind::Leaf { default_text, .. } if defaults.len() == 1 => {
                    *default_text = defaults.into_iter().next();
                }
                CNodeKind::LeafList { defaults_text, .. } => *defaults_text = defaults,
                CNodeKind::Choice { default_name, .. } if defaults.len() == 1 => {
                    *default_name = Some(defaults[0].0.clone());
                }
                _ => return Err(invalid("default")),
            }
        }
        if refine.min_elements.is_some() || refine.max_elements.is_some() {
            match &mut node.kind {
                CNodeKind::List { min, max, .. } | CNodeKind::LeafList { min, max, .. } => {
                    if let Some(value) = refine.min_elements {
                        *min = value;
                    }
                    if refine.max_elements.is_some() {
                        *max = refine.max_elements;
                    }
                }
                _ => return Err(invalid("min-elements/max-elements")),
            }
        }
        Ok(())
    }

    /// Compile the children of an augment under its resolved target.
    pub(crate) fn compile_augment_children(
        &mut self,
        module: ModuleId,
        augment: &'c PAugment,
        scope: &Rc<Scope<'c>>,
        namespace: ModuleId,
        target: SchemaId,
    ) -> Result<Vec<SchemaId>> {
        let target_path = self.out.path(target, SchemaPathFormat::LOG);
        let target_node = self.out.node(target);
        let target_is_choice = matches!(target_node.kind, CNodeKind::Choice { .. });
        let allowed = matches!(
            target_node.kind,
            CNodeKind::Container { .. }
                | CNodeKind::List { .. }
                | CNodeKind::Choice { .. }
                | CNodeKind::Case
                | CNodeKind::Input
                | CNodeKind::Output
                | CNodeKind::Notification
        );
        if !allowed {
            return Err(Error::new(
                ErrorCode::AugmentTarget,
                format!(
                    "Augment's target node \"{}\" is a {} and cannot be augmented.",
                    augment.target,
                    target_node.keyword()
                ),
            )
            .with_path(target_path));
        }

        let mut ctx = NodeCtx::new(Some(target), namespace);
        for text in &augment.if_features {
            ctx.if_features.push(self.compile_if_feature(module, text)?);
        }
        if let Some(when) = &augment.when {
            let when = self
                .compile_when(module, when, true)
                .map_err(|err| err.with_path(target_path.clone()))?;
            ctx.whens.push(when);
        }

        let mut created = Vec::new();
        for child in &augment.children {
            let ids = if target_is_choice
                && !matches!(child.kind, PNodeKind::Case | PNodeKind::Uses { .. })
            {
                self.compile_shorthand_case(child, scope, &ctx)?
            } else {
                self.compile_node(child, scope, &ctx)?
            };
            created.extend(ids);
        }
        if let Some(status) = augment.status {
            for id in &created {
                let node = self.out.node_mut(*id);
                if node.status_stmt.is_none() {
                    node.status_stmt = Some(status);
                }
            }
        }
        Ok(created)
    }

    pub(crate) fn compile_when(
        &mut self,
        module: ModuleId,
        when: &PWhen,
        context_parent: bool,
    ) -> Result<Arc<CWhen>> {
        let expr = self.parse_xpath(module, &when.condition).map_err(|err| {
            Error::compile(format!(
                "Invalid when condition \"{}\" - {}",
                when.condition, err
            ))
        })?;
        Ok(Arc::new(CWhen {
            expr,
            text: when.condition.clone(),
            context_parent,
            description: self.intern_opt(when.description.as_deref()),
            reference: self.intern_opt(when.reference.as_deref()),
        }))
    }

    pub(crate) fn compile_musts(
        &mut self,
        module: ModuleId,
        musts: &[PMust],
    ) -> Result<Vec<CMust>> {
        let mut out = Vec::new();
        for must in musts {
            let expr = self.parse_xpath(module, &must.condition).map_err(|err| {
                Error::compile(format!(
                    "Invalid must restriction \"{}\" - {}",
                    must.condition, err
                ))
            })?;
            out.push(CMust {
                expr,
                text: must.condition.clone(),
                error_message: self.intern_opt(must.error_message.as_deref()),
                error_app_tag: self.intern_opt(must.error_app_tag.as_deref()),
                description: self.intern_opt(must.description.as_deref()),
                reference: self.intern_opt(must.reference.as_deref()),
            });
        }
        Ok(out)
    }

    /// Resolve the prefixes of extension instances.
    pub(crate) fn compile_exts(
        &mut self,
        module: ModuleId,
        exts: &[PExtInstance],
    ) -> Result<Vec<CExt>> {
        let mut out = Vec::new();
        for ext in exts {
            let (prefix, local) = split_prefix(&ext.name);
            let target = prefix
                .and_then(|prefix| self.prefix_module(module, prefix))
                .ok_or_else(|| {
                    Error::compile(format!(
                        "Invalid prefix of extension instance \"{}\".",
                        ext.name
                    ))
                })?;
            let defined = self.entries[target.to_index()]
                .parsed
                .extensions
                .iter()
                .any(|e| e.name == local);
            if !defined {
                return Err(Error::compile(format!(
                    "Extension definition of extension instance \"{}\" not found.",
                    ext.name
                )));
            }
            out.push(CExt {
                module: target,
                name: self.intern(local),
                arg: ext.arg.clone(),
                substmts: ext.substmts.clone(),
                data: None,
            });
        }
        Ok(out)
    }

    /// Resolve a schema node identifier written in `module`.
    pub(crate) fn resolve_nodeid(
        &self,
        module: ModuleId,
        nodeid: &str,
        start: NodeidStart<'_>,
    ) -> Result<SchemaId> {
        let not_found = || {
            Error::compile(format!(
                "Target node \"{}\" from module \"{}\" was not found.",
                nodeid,
                self.module_name(module)
            ))
        };
        let absolute = nodeid.starts_with('/');
        if absolute != matches!(start, NodeidStart::Absolute) {
            return Err(Error::compile(format!(
                "Invalid schema node identifier \"{}\".",
                nodeid
            )));
        }

        let mut current: Option<SchemaId> = None;
        for segment in nodeid.split('/').filter(|s| !s.is_empty()) {
            let (prefix, local) = split_prefix(segment.trim());
            let segment_module = match prefix {
                Some(prefix) => {
                    Some(self.prefix_module(module, prefix).ok_or_else(not_found)?)
                }
                None if absolute => Some(module),
                None => None,
            };
            let matches = |id: &SchemaId| {
                let node = self.out.node(*id);
                if node.detached || &*node.name != local {
                    return false;
                }
                match segment_module {
                    // input and output share the namespace of their operation
                    Some(m) => {
                        node.module == m
                            || matches!(node.kind, CNodeKind::Input | CNodeKind::Output)
                    }
                    None => true,
                }
            };
            let candidates: Vec<SchemaId> = match (current, start) {
                (Some(parent), _) => {
                    let p = self.out.node(parent);
                    p.children
                        .iter()
                        .chain(p.actions.iter())
                        .chain(p.notifications.iter())
                        .copied()
                        .collect()
                }
                (None, NodeidStart::Descendant(ids)) => ids.to_vec(),
                (None, NodeidStart::Absolute) => {
                    let m = segment_module.ok_or_else(not_found)?;
                    let m = self.out.module(m);
                    m.data
                        .iter()
                        .chain(m.rpcs.iter())
                        .chain(m.notifications.iter())
                        .copied()
                        .collect()
                }
            };
            current = Some(candidates.into_iter().find(matches).ok_or_else(not_found)?);
        }
        current.ok_or_else(not_found)
    }

    /// Log path of a node about to be created under `ctx.parent`.
    pub(crate) fn pending_path(&self, ctx: &NodeCtx, name: &str) -> Option<String> {
        let prefix = match ctx.parent {
            Some(parent) => self.out.path(parent, SchemaPathFormat::LOG),
            None => String::new(),
        };
        let module = match ctx.parent {
            Some(parent) if self.out.node(parent).module == ctx.module => String::new(),
            _ => format!("{}:", self.module_name(ctx.module)),
        };
        Some(format!("{}/{}{}", prefix, module, name))
    }
}

/// Scope of the typedefs and groupings defined inside a node.
fn node_scope<'c>(scope: &Rc<Scope<'c>>, pnode: &'c PNode) -> Rc<Scope<'c>> {
    if pnode.typedefs.is_empty() && pnode.groupings.is_empty() {
        return scope.clone();
    }
    Rc::new(Scope {
        module: scope.module,
        typedefs: &pnode.typedefs,
        groupings: &pnode.groupings,
        parent: Some(scope.clone()),
    })
}
