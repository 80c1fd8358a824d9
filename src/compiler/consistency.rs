//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Effective flags and cross-node consistency checks.

use crate::compiled::{CNodeKind, NodeFlags};
use crate::compiler::structure::NodeidStart;
use crate::compiler::types::base_name;
use crate::compiler::Compiler;
use crate::error::{Error, Result};
use crate::extension::{find_plugin, hook_result, ExtensionInstance};
use crate::ids::{ModuleId, SchemaId};
use crate::parsed::Status;
use crate::schema::{DataValueType, SchemaPathFormat};
use crate::value::{parse_value, PrefixFormat, ValueCtx};

/// Inherited state while walking the compiled tree.
#[derive(Clone, Copy)]
struct Inherited {
    status: Status,
    /// `None` inside rpcs, actions and notifications.
    config: Option<bool>,
}

impl Compiler<'_> {
    pub(super) fn check_consistency(&mut self) -> Result<()> {
        let roots = self.roots();
        for id in &roots {
            let top = Inherited {
                status: Status::Current,
                config: Some(true),
            };
            self.inherit_flags(*id, top)?;
        }

        let nodes = self.live_nodes(&roots);
        for id in &nodes {
            self.check_list(*id).map_err(|err| {
                err.with_path_opt(Some(self.out.path(*id, SchemaPathFormat::LOG)))
            })?;
        }
        for id in &nodes {
            self.check_node(*id).map_err(|err| {
                err.with_path_opt(Some(self.out.path(*id, SchemaPathFormat::LOG)))
            })?;
        }

        self.compile_extension_instances(&nodes)?;
        self.number_nodes(&roots);
        Ok(())
    }

    // Top-level nodes of all implemented modules.
    fn roots(&self) -> Vec<SchemaId> {
        self.out
            .modules
            .iter()
            .filter(|m| m.implemented)
            .flat_map(|m| {
                m.data
                    .iter()
                    .chain(m.rpcs.iter())
                    .chain(m.notifications.iter())
                    .copied()
            })
            .collect()
    }

    // All attached nodes, in pre-order.
    fn live_nodes(&self, roots: &[SchemaId]) -> Vec<SchemaId> {
        let mut out = Vec::new();
        let mut stack: Vec<SchemaId> = roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            let node = self.out.node(id);
            let children: Vec<SchemaId> = node
                .children
                .iter()
                .chain(node.actions.iter())
                .chain(node.notifications.iter())
                .copied()
                .collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    fn inherit_flags(&mut self, id: SchemaId, parent: Inherited) -> Result<()> {
        let path = || self.out.path(id, SchemaPathFormat::LOG);
        let node = self.out.node(id);

        // status
        let status = match node.status_stmt {
            Some(status) if status < parent.status => {
                return Err(Error::compile(format!(
                    "Status \"{}\" of \"{}\" conflicts with \"{}\" status of its parent.",
                    status_name(status),
                    node.name,
                    status_name(parent.status)
                ))
                .with_path(path()))
            }
            Some(status) => status,
            None => parent.status,
        };

        // config
        let config = match node.kind {
            CNodeKind::Rpc
            | CNodeKind::Action
            | CNodeKind::Notification
            | CNodeKind::Input
            | CNodeKind::Output => {
                if node.config_stmt.is_some() {
                    return Err(Error::compile(
                        "Invalid config statement in an operation or notification.",
                    )
                    .with_path(path()));
                }
                None
            }
            _ => match (parent.config, node.config_stmt) {
                (None, _) => None,
                (Some(false), Some(true)) => {
                    return Err(Error::compile(
                        "Configuration node cannot be child of any state data node.",
                    )
                    .with_path(path()))
                }
                (Some(_), Some(value)) => Some(value),
                (Some(inherited), None) => Some(inherited),
            },
        };

        // mandatory
        let mandatory = match &node.kind {
            CNodeKind::Leaf { .. }
            | CNodeKind::Choice { .. }
            | CNodeKind::AnyData
            | CNodeKind::AnyXml => node.mandatory_stmt == Some(true),
            CNodeKind::List { min, .. } | CNodeKind::LeafList { min, .. } => *min > 0,
            _ => {
                if node.mandatory_stmt.is_some() {
                    return Err(Error::compile(format!(
                        "Invalid keyword \"mandatory\" as a child of \"{}\".",
                        node.keyword()
                    ))
                    .with_path(path()));
                }
                false
            }
        };

        let children: Vec<SchemaId> = node
            .children
            .iter()
            .chain(node.actions.iter())
            .chain(node.notifications.iter())
            .copied()
            .collect();
        let node = self.out.node_mut(id);
        node.status = status;
        match config {
            Some(true) => node.flags |= NodeFlags::CONFIG,
            Some(false) => node.flags |= NodeFlags::STATE,
            None => (),
        }
        if mandatory {
            node.flags |= NodeFlags::MANDATORY;
        }

        let inherited = Inherited { status, config };
        for child in children {
            self.inherit_flags(child, inherited)?;
        }
        Ok(())
    }

    fn check_list(&mut self, id: SchemaId) -> Result<()> {
        let node = self.out.node(id);
        let (key_names, unique_texts) = match &node.kind {
            CNodeKind::List {
                key_names,
                unique_texts,
                ..
            } => (key_names.clone(), unique_texts.clone()),
            _ => return Ok(()),
        };
        let is_config = node.is_config();

        // keys
        let mut keys = Vec::new();
        for name in &key_names {
            let key = node
                .children
                .iter()
                .copied()
                .find(|c| &*self.out.node(*c).name == &**name)
                .ok_or_else(|| {
                    Error::compile(format!("The list's key \"{}\" not found.", name))
                })?;
            let key_node = self.out.node(key);
            let ty = match &key_node.kind {
                CNodeKind::Leaf { ty, .. } => ty,
                _ => {
                    return Err(Error::compile(format!(
                        "Key \"{}\" of the list is not a leaf.",
                        name
                    )))
                }
            };
            if keys.contains(&key) {
                return Err(Error::compile(format!(
                    "Duplicated key identifier \"{}\".",
                    name
                )));
            }
            if key_node.is_config() != is_config {
                return Err(Error::compile(format!(
                    "Key \"{}\" of the list has a different config value than the list.",
                    name
                )));
            }
            if !key_node.whens.is_empty() || !key_node.if_features.is_empty() {
                return Err(Error::compile(format!(
                    "List's key \"{}\" must not have any \"when\" or \"if-feature\" statement.",
                    name
                )));
            }
            if ty.resolved().base == DataValueType::Empty
                && self.entries[key_node.defined_in.to_index()].parsed.yang_version != "1.1"
            {
                return Err(Error::compile(format!(
                    "List's key \"{}\" cannot be of \"empty\" type in YANG 1.0 schema.",
                    name
                )));
            }
            keys.push(key);
        }
        if keys.is_empty() && is_config {
            return Err(Error::compile(
                "Missing key in list representing configuration data.",
            ));
        }

        // uniques
        let mut uniques = Vec::new();
        for (text, module) in &unique_texts {
            let mut leaves = Vec::new();
            for nodeid in text.split_whitespace() {
                let children = self.out.node(id).children.clone();
                let leaf = self
                    .resolve_nodeid(*module, nodeid, NodeidStart::Descendant(&children))
                    .map_err(|_| {
                        Error::compile(format!(
                            "Invalid descendant-schema-nodeid value \"{}\" - target node not found.",
                            nodeid
                        ))
                    })?;
                if !matches!(self.out.node(leaf).kind, CNodeKind::Leaf { .. }) {
                    return Err(Error::compile(format!(
                        "Unique's descendant-schema-nodeid \"{}\" refers to a {} node instead of a leaf.",
                        nodeid,
                        self.out.node(leaf).keyword()
                    )));
                }
                leaves.push(leaf);
            }
            uniques.push(leaves);
        }

        for key in &keys {
            let key = self.out.node_mut(*key);
            key.flags |= NodeFlags::KEY;
            key.flags.remove(NodeFlags::MANDATORY);
        }
        let node = self.out.node_mut(id);
        if keys.is_empty() {
            node.flags |= NodeFlags::KEYLESS;
        }
        // Keys go first, in key order.
        let others: Vec<SchemaId> = node
            .children
            .iter()
            .copied()
            .filter(|c| !keys.contains(c))
            .collect();
        node.children = keys.iter().copied().chain(others).collect();
        if let CNodeKind::List {
            keys: list_keys,
            uniques: list_uniques,
            ..
        } = &mut node.kind
        {
            *list_keys = keys;
            *list_uniques = uniques;
        }
        Ok(())
    }

    fn check_node(&mut self, id: SchemaId) -> Result<()> {
        self.check_cardinality(id)?;
        self.compile_defaults(id)?;
        self.check_choice_default(id)?;
        self.check_leafref_config(id)
    }

    fn check_cardinality(&self, id: SchemaId) -> Result<()> {
        match &self.out.node(id).kind {
            CNodeKind::List { min, max: Some(max), .. }
            | CNodeKind::LeafList { min, max: Some(max), .. }
                if min > max =>
            {
                Err(Error::compile(format!(
                    "Invalid combination of min-elements and max-elements: min value {} is bigger than the max value {}.",
                    min, max
                )))
            }
            _ => Ok(()),
        }
    }

    fn compile_defaults(&mut self, id: SchemaId) -> Result<()> {
        let node = self.out.node(id);
        let module = node.module;
        let flags = node.flags;
        match &node.kind {
            CNodeKind::Leaf {
                ty, default_text, ..
            } => {
                let text = default_text.clone().or_else(|| ty.default.clone());
                let Some((text, text_module)) = text else {
                    return Ok(());
                };
                if flags.contains(NodeFlags::KEY) {
                    if default_text.is_some() {
                        return Err(Error::compile(
                            "Invalid key leaf with a default value.",
                        ));
                    }
                    return Ok(());
                }
                if flags.contains(NodeFlags::MANDATORY) {
                    if default_text.is_some() {
                        return Err(Error::compile(
                            "Invalid mandatory leaf with a default value.",
                        ));
                    }
                    return Ok(());
                }
                let value = self.default_value(ty, &text, text_module, module)?;
                let node = self.out.node_mut(id);
                if let CNodeKind::Leaf { default, .. } = &mut node.kind {
                    *default = Some(value);
                }
                node.flags |= NodeFlags::HAS_DEFAULT;
            }
            CNodeKind::LeafList {
                ty,
                defaults_text,
                min,
                ..
            } => {
                let mut texts = defaults_text.clone();
                if texts.is_empty() {
                    texts.extend(ty.default.clone());
                }
                if texts.is_empty() {
                    return Ok(());
                }
                if *min > 0 {
                    if !defaults_text.is_empty() {
                        return Err(Error::compile(
                            "Invalid leaf-list with both default values and min-elements.",
                        ));
                    }
                    return Ok(());
                }
                let ty = ty.clone();
                let mut values = Vec::new();
                for (text, text_module) in texts {
                    let value = self.default_value(&ty, &text, text_module, module)?;
                    if flags.contains(NodeFlags::CONFIG) && values.contains(&value) {
                        return Err(Error::compile(format!(
                            "Configuration leaf-list has multiple defaults of the same value \"{}\".",
                            text
                        )));
                    }
                    values.push(value);
                }
                let node = self.out.node_mut(id);
                if let CNodeKind::LeafList { defaults, .. } = &mut node.kind {
                    *defaults = values;
                }
                node.flags |= NodeFlags::HAS_DEFAULT;
            }
            _ => (),
        }
        Ok(())
    }

    fn default_value(
        &self,
        ty: &crate::compiled::CType,
        text: &str,
        text_module: ModuleId,
        module: ModuleId,
    ) -> Result<crate::value::Value> {
        if ty.resolved().base == DataValueType::Empty {
            return Err(Error::compile(format!(
                "Invalid type \"{}\" with a default value.",
                base_name(DataValueType::Empty)
            )));
        }
        let vctx = ValueCtx {
            schema: &self.out,
            format: PrefixFormat::Schema(text_module),
            module,
        };
        parse_value(&vctx, ty, text).map_err(|err| {
            Error::compile(format!(
                "Invalid default - value does not fit the type ({}).",
                err
            ))
        })
    }

    fn check_choice_default(&mut self, id: SchemaId) -> Result<()> {
        let node = self.out.node(id);
        let name = match &node.kind {
            CNodeKind::Choice {
                default_name: Some(name),
                ..
            } => name.clone(),
            _ => return Ok(()),
        };
        if node.flags.contains(NodeFlags::MANDATORY) {
            return Err(Error::compile(
                "Invalid mandatory choice with a default case.",
            ));
        }
        let (_, local) = crate::utils::split_prefix(&name);
        let case = node
            .children
            .iter()
            .copied()
            .find(|c| &*self.out.node(*c).name == local)
            .ok_or_else(|| {
                Error::compile(format!("Default case \"{}\" not found.", name))
            })?;
        if self.has_mandatory_child(case) {
            return Err(Error::compile(format!(
                "Mandatory node under the default case \"{}\".",
                name
            )));
        }
        if let CNodeKind::Choice { default_case, .. } = &mut self.out.node_mut(id).kind {
            *default_case = Some(case);
        }
        self.out.node_mut(case).flags |= NodeFlags::HAS_DEFAULT;
        Ok(())
    }

    fn has_mandatory_child(&self, id: SchemaId) -> bool {
        self.out.node(id).children.iter().any(|c| {
            let child = self.out.node(*c);
            child.flags.contains(NodeFlags::MANDATORY)
                || (child.is_np_container() && self.has_mandatory_child(*c))
        })
    }

    // A configuration leafref requiring an instance cannot point to state
    // data.
    fn check_leafref_config(&self, id: SchemaId) -> Result<()> {
        let node = self.out.node(id);
        if !node.is_config() {
            return Ok(());
        }
        let Some(ty) = node.leaf_type() else {
            return Ok(());
        };
        let mut stack = vec![ty.as_ref()];
        while let Some(ty) = stack.pop() {
            if let Some(leafref) = &ty.leafref {
                if let Some(target) = leafref.target {
                    if ty.require_instance && self.out.node(target).is_state() {
                        return Err(Error::compile(format!(
                            "Invalid leafref path \"{}\" - target is supposed to represent configuration data.",
                            leafref.path
                        )));
                    }
                }
            }
            stack.extend(ty.union.iter().map(|t| t.as_ref()));
        }
        Ok(())
    }

    // Run the compile hooks of the registered plugins.
    fn compile_extension_instances(&mut self, nodes: &[SchemaId]) -> Result<()> {
        let plugins = self.plugins;
        if plugins.is_empty() {
            return Ok(());
        }
        for index in 0..self.out.modules.len() {
            let mut exts = std::mem::take(&mut self.out.modules[index].exts);
            let result = self.run_compile_hooks(&mut exts, None);
            self.out.modules[index].exts = exts;
            result?;
        }
        for id in nodes {
            let path = self.out.path(*id, SchemaPathFormat::LOG);
            let mut exts = std::mem::take(&mut self.out.node_mut(*id).exts);
            let result = self.run_compile_hooks(&mut exts, Some(path.clone()));
            self.out.node_mut(*id).exts = exts;
            result.map_err(|err| err.with_path(path))?;
        }
        Ok(())
    }

    fn run_compile_hooks(
        &self,
        exts: &mut [crate::compiled::CExt],
        path: Option<String>,
    ) -> Result<()> {
        for ext in exts {
            let module_name = self.module_name(ext.module);
            let Some(plugin) = find_plugin(self.plugins, module_name, &ext.name) else {
                continue;
            };
            let mut instance = ExtensionInstance::new(
                module_name,
                &ext.name,
                ext.arg.as_deref(),
                &ext.substmts,
                path.clone(),
            );
            hook_result(plugin, plugin.compile(&mut instance))?;
            ext.data = instance.take_data();
        }
        Ok(())
    }

    // Pre-order numbering, used to keep data siblings in schema order, and
    // sibling links.
    fn number_nodes(&mut self, roots: &[SchemaId]) {
        let nodes = self.live_nodes(roots);
        for (order, id) in nodes.iter().enumerate() {
            self.out.node_mut(*id).order = order as u32;
        }
        for id in nodes {
            let children = self.out.node(id).children.clone();
            for pair in children.windows(2) {
                self.out.node_mut(pair[0]).next = Some(pair[1]);
            }
            if let Some(last) = children.last() {
                self.out.node_mut(*last).next = None;
            }
        }
        for module in 0..self.out.modules.len() {
            let data = self.out.modules[module].data.clone();
            for pair in data.windows(2) {
                self.out.node_mut(pair[0]).next = Some(pair[1]);
            }
        }
    }
}

fn status_name(status: Status) -> &'static str {
    match status {
        Status::Current => "current",
        Status::Deprecated => "deprecated",
        Status::Obsolete => "obsolete",
    }
}
