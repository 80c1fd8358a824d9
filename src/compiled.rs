//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Compiled (resolved) schema tree.
//!
//! All compiled nodes of a context live in one arena. A new arena is built on
//! every change of the module set and swapped in only when compilation of
//! the whole set succeeded.

use bitflags::bitflags;
use regex::Regex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::compiler::features::IfFeature;
use crate::ids::{IdentityId, ModuleId, SchemaId};
use crate::parsed::Status;
use crate::parser::Stmt;
use crate::schema::{DataValueType, SchemaPathFormat};
use crate::value::Value;
use crate::xpath::Expr;

#[derive(Debug, Default)]
pub(crate) struct CompiledSchema {
    pub nodes: Vec<CNode>,
    pub identities: Vec<CIdentity>,
    pub modules: Vec<CModule>,
}

#[derive(Debug, Default)]
pub(crate) struct CModule {
    pub name: Arc<str>,
    pub namespace: Arc<str>,
    pub prefix: Arc<str>,
    pub revision: Option<Arc<str>>,
    pub implemented: bool,
    /// Import prefixes, including the module's own prefix.
    pub prefixes: HashMap<String, ModuleId>,
    pub data: Vec<SchemaId>,
    pub rpcs: Vec<SchemaId>,
    pub notifications: Vec<SchemaId>,
    pub identities: Vec<IdentityId>,
    /// Effective feature values, in definition order.
    pub features: Vec<(Arc<str>, bool)>,
    pub exts: Vec<CExt>,
    pub augmented_by: Vec<ModuleId>,
    pub deviated_by: Vec<ModuleId>,
}

#[derive(Debug)]
pub(crate) struct CIdentity {
    pub name: Arc<str>,
    pub module: ModuleId,
    pub bases: Vec<IdentityId>,
    pub derived: Vec<IdentityId>,
    pub enabled: bool,
    pub status: Status,
    pub description: Option<Arc<str>>,
    pub reference: Option<Arc<str>>,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub(crate) struct NodeFlags: u16 {
        const CONFIG = 0x01;
        const STATE = 0x02;
        const MANDATORY = 0x04;
        const KEY = 0x08;
        const USER_ORDERED = 0x10;
        const KEYLESS = 0x20;
        const HAS_DEFAULT = 0x40;
        const IMPLICIT_CASE = 0x80;
    }
}

#[derive(Clone, Debug)]
pub(crate) struct CWhen {
    pub expr: Expr,
    pub text: String,
    /// Evaluated with the parent as context node (uses, augment).
    pub context_parent: bool,
    pub description: Option<Arc<str>>,
    pub reference: Option<Arc<str>>,
}

#[derive(Clone, Debug)]
pub(crate) struct CMust {
    pub expr: Expr,
    pub text: String,
    pub error_message: Option<Arc<str>>,
    pub error_app_tag: Option<Arc<str>>,
    pub description: Option<Arc<str>>,
    pub reference: Option<Arc<str>>,
}

/// Compiled extension instance.
#[derive(Clone)]
pub(crate) struct CExt {
    pub module: ModuleId,
    pub name: Arc<str>,
    pub arg: Option<String>,
    pub substmts: Vec<Stmt>,
    pub data: Option<Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for CExt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CExt")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("arg", &self.arg)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Interval {
    pub min: i128,
    pub max: i128,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RestrictionError {
    pub message: Option<Arc<str>>,
    pub app_tag: Option<Arc<str>>,
}

#[derive(Clone, Debug)]
pub(crate) struct CPattern {
    pub text: Arc<str>,
    pub regex: Arc<Regex>,
    pub invert: bool,
    pub error: RestrictionError,
}

#[derive(Clone, Debug)]
pub(crate) struct CEnum {
    pub name: Arc<str>,
    /// Value of an enum, position of a bit.
    pub value: i64,
    pub status: Status,
    pub description: Option<Arc<str>>,
}

#[derive(Clone, Debug)]
pub(crate) struct CLeafref {
    pub path: Arc<str>,
    pub expr: Expr,
    pub target: Option<SchemaId>,
    pub realtype: Option<Arc<CType>>,
}

#[derive(Clone, Debug)]
pub(crate) struct CType {
    pub base: DataValueType,
    pub typedef_name: Option<Arc<str>>,
    /// Module the type was written in.
    pub module: ModuleId,
    pub range: Option<Vec<Interval>>,
    pub range_text: Vec<Arc<str>>,
    pub range_error: RestrictionError,
    pub length: Option<Vec<Interval>>,
    pub length_text: Vec<Arc<str>>,
    pub length_error: RestrictionError,
    pub patterns: Vec<CPattern>,
    pub enums: Vec<CEnum>,
    pub bits: Vec<CEnum>,
    pub fraction_digits: u8,
    pub require_instance: bool,
    pub leafref: Option<Box<CLeafref>>,
    pub bases: Vec<IdentityId>,
    pub union: Vec<Arc<CType>>,
    /// Default inherited from the typedef chain.
    pub default: Option<(Arc<str>, ModuleId)>,
    pub units: Option<Arc<str>>,
}

#[derive(Clone, Debug)]
pub(crate) enum CNodeKind {
    Container {
        presence: Option<Arc<str>>,
    },
    Leaf {
        ty: Arc<CType>,
        units: Option<Arc<str>>,
        default: Option<Value>,
        default_text: Option<(Arc<str>, ModuleId)>,
    },
    LeafList {
        ty: Arc<CType>,
        units: Option<Arc<str>>,
        defaults: Vec<Value>,
        defaults_text: Vec<(Arc<str>, ModuleId)>,
        min: u32,
        max: Option<u32>,
    },
    List {
        keys: Vec<SchemaId>,
        key_names: Vec<Arc<str>>,
        uniques: Vec<Vec<SchemaId>>,
        unique_texts: Vec<(Arc<str>, ModuleId)>,
        min: u32,
        max: Option<u32>,
    },
    Choice {
        default_case: Option<SchemaId>,
        default_name: Option<Arc<str>>,
    },
    Case,
    AnyData,
    AnyXml,
    Rpc,
    Action,
    Input,
    Output,
    Notification,
}

#[derive(Clone, Debug)]
pub(crate) struct CNode {
    pub kind: CNodeKind,
    pub name: Arc<str>,
    /// Namespace of the node.
    pub module: ModuleId,
    /// Module whose text defined the node (prefix context).
    pub defined_in: ModuleId,
    pub line: u32,
    pub parent: Option<SchemaId>,
    pub children: Vec<SchemaId>,
    pub actions: Vec<SchemaId>,
    pub notifications: Vec<SchemaId>,
    pub next: Option<SchemaId>,
    pub flags: NodeFlags,
    pub config_stmt: Option<bool>,
    pub mandatory_stmt: Option<bool>,
    pub status: Status,
    pub status_stmt: Option<Status>,
    pub description: Option<Arc<str>>,
    pub reference: Option<Arc<str>>,
    pub whens: Vec<Arc<CWhen>>,
    pub musts: Vec<CMust>,
    pub if_features: Vec<Arc<IfFeature>>,
    pub exts: Vec<CExt>,
    /// Pre-order position among all compiled nodes.
    pub order: u32,
    pub detached: bool,
}

// ===== impl CNode =====

impl CNode {
    pub(crate) fn new(
        kind: CNodeKind,
        name: Arc<str>,
        module: ModuleId,
        defined_in: ModuleId,
    ) -> CNode {
        CNode {
            kind,
            name,
            module,
            defined_in,
            line: 0,
            parent: None,
            children: Vec::new(),
            actions: Vec::new(),
            notifications: Vec::new(),
            next: None,
            flags: NodeFlags::empty(),
            config_stmt: None,
            mandatory_stmt: None,
            status: Status::Current,
            status_stmt: None,
            description: None,
            reference: None,
            whens: Vec::new(),
            musts: Vec::new(),
            if_features: Vec::new(),
            exts: Vec::new(),
            order: 0,
            detached: false,
        }
    }

    pub(crate) fn keyword(&self) -> &'static str {
        match self.kind {
            CNodeKind::Container { .. } => "container",
            CNodeKind::Leaf { .. } => "leaf",
            CNodeKind::LeafList { .. } => "leaf-list",
            CNodeKind::List { .. } => "list",
            CNodeKind::Choice { .. } => "choice",
            CNodeKind::Case => "case",
            CNodeKind::AnyData => "anydata",
            CNodeKind::AnyXml => "anyxml",
            CNodeKind::Rpc => "rpc",
            CNodeKind::Action => "action",
            CNodeKind::Input => "input",
            CNodeKind::Output => "output",
            CNodeKind::Notification => "notification",
        }
    }

    /// Nodes that never appear in data trees.
    pub(crate) fn is_schema_only(&self) -> bool {
        matches!(
            self.kind,
            CNodeKind::Choice { .. }
                | CNodeKind::Case
                | CNodeKind::Input
                | CNodeKind::Output
        )
    }

    pub(crate) fn is_term(&self) -> bool {
        matches!(self.kind, CNodeKind::Leaf { .. } | CNodeKind::LeafList { .. })
    }

    /// Whether several instances may exist among siblings.
    pub(crate) fn is_multi_instance(&self) -> bool {
        matches!(
            self.kind,
            CNodeKind::List { .. } | CNodeKind::LeafList { .. }
        )
    }

    pub(crate) fn is_np_container(&self) -> bool {
        matches!(self.kind, CNodeKind::Container { presence: None })
    }

    pub(crate) fn is_config(&self) -> bool {
        self.flags.contains(NodeFlags::CONFIG)
    }

    pub(crate) fn is_state(&self) -> bool {
        self.flags.contains(NodeFlags::STATE)
    }

    pub(crate) fn leaf_type(&self) -> Option<&Arc<CType>> {
        match &self.kind {
            CNodeKind::Leaf { ty, .. } | CNodeKind::LeafList { ty, .. } => {
                Some(ty)
            }
            _ => None,
        }
    }

    pub(crate) fn list_keys(&self) -> &[SchemaId] {
        match &self.kind {
            CNodeKind::List { keys, .. } => keys,
            _ => &[],
        }
    }
}

// ===== impl CType =====

impl CType {
    pub(crate) fn builtin(base: DataValueType, module: ModuleId) -> CType {
        let range = integer_bounds(base).map(|(min, max)| vec![Interval { min, max }]);
        let length = match base {
            DataValueType::String | DataValueType::Binary => Some(vec![Interval {
                min: 0,
                max: u64::MAX as i128,
            }]),
            _ => None,
        };
        CType {
            base,
            typedef_name: None,
            module,
            range,
            range_text: Vec::new(),
            range_error: RestrictionError::default(),
            length,
            length_text: Vec::new(),
            length_error: RestrictionError::default(),
            patterns: Vec::new(),
            enums: Vec::new(),
            bits: Vec::new(),
            fraction_digits: 0,
            require_instance: true,
            leafref: None,
            bases: Vec::new(),
            union: Vec::new(),
            default: None,
            units: None,
        }
    }

    /// Type values are actually stored as (leafref resolved).
    pub(crate) fn resolved(&self) -> &CType {
        match &self.leafref {
            Some(leafref) => match &leafref.realtype {
                Some(realtype) => realtype.resolved(),
                None => self,
            },
            None => self,
        }
    }

    /// Whether the type or any union member contains a leafref.
    pub(crate) fn has_leafref(&self) -> bool {
        self.leafref.is_some() || self.union.iter().any(|t| t.has_leafref())
    }

}

/// Value bounds of the integer types (decimal64 in scaled form).
pub(crate) fn integer_bounds(base: DataValueType) -> Option<(i128, i128)> {
    let bounds = match base {
        DataValueType::Int8 => (i8::MIN as i128, i8::MAX as i128),
        DataValueType::Int16 => (i16::MIN as i128, i16::MAX as i128),
        DataValueType::Int32 => (i32::MIN as i128, i32::MAX as i128),
        DataValueType::Int64 | DataValueType::Dec64 => {
            (i64::MIN as i128, i64::MAX as i128)
        }
        DataValueType::Uint8 => (0, u8::MAX as i128),
        DataValueType::Uint16 => (0, u16::MAX as i128),
        DataValueType::Uint32 => (0, u32::MAX as i128),
        DataValueType::Uint64 => (0, u64::MAX as i128),
        _ => return None,
    };
    Some(bounds)
}

// ===== impl CompiledSchema =====

impl CompiledSchema {
    pub(crate) fn node(&self, id: SchemaId) -> &CNode {
        &self.nodes[id.to_index()]
    }

    pub(crate) fn node_mut(&mut self, id: SchemaId) -> &mut CNode {
        &mut self.nodes[id.to_index()]
    }

    pub(crate) fn module(&self, id: ModuleId) -> &CModule {
        &self.modules[id.to_index()]
    }

    pub(crate) fn identity(&self, id: IdentityId) -> &CIdentity {
        &self.identities[id.to_index()]
    }

    pub(crate) fn add_node(&mut self, node: CNode) -> SchemaId {
        self.nodes.push(node);
        SchemaId::from_index(self.nodes.len() - 1)
    }

    /// Module with the given name; the implemented revision is preferred,
    /// then the latest one.
    pub(crate) fn module_by_name(&self, name: &str) -> Option<ModuleId> {
        let mut best: Option<ModuleId> = None;
        for (index, module) in self.modules.iter().enumerate() {
            if &*module.name != name {
                continue;
            }
            let id = ModuleId::from_index(index);
            if module.implemented {
                return Some(id);
            }
            match best {
                Some(b) if self.module(b).revision >= module.revision => (),
                _ => best = Some(id),
            }
        }
        best
    }

    pub(crate) fn module_by_ns(&self, namespace: &str) -> Option<ModuleId> {
        let mut best: Option<ModuleId> = None;
        for (index, module) in self.modules.iter().enumerate() {
            if &*module.namespace != namespace {
                continue;
            }
            let id = ModuleId::from_index(index);
            if module.implemented {
                return Some(id);
            }
            if best.is_none() {
                best = Some(id);
            }
        }
        best
    }

    /// Resolve a prefix in the scope of a module.
    pub(crate) fn resolve_prefix(
        &self,
        module: ModuleId,
        prefix: &str,
    ) -> Option<ModuleId> {
        self.module(module).prefixes.get(prefix).copied()
    }

    pub(crate) fn find_identity(
        &self,
        module: ModuleId,
        name: &str,
    ) -> Option<IdentityId> {
        self.module(module)
            .identities
            .iter()
            .copied()
            .find(|id| &*self.identity(*id).name == name)
    }

    /// Whether `identity` is derived (directly or not) from `base`.
    pub(crate) fn identity_derived_from(
        &self,
        identity: IdentityId,
        base: IdentityId,
    ) -> bool {
        let mut stack = self.identity(identity).bases.clone();
        let mut seen = Vec::new();
        while let Some(id) = stack.pop() {
            if id == base {
                return true;
            }
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            stack.extend(self.identity(id).bases.iter().copied());
        }
        false
    }

    /// Parent as seen from data trees (choice, case, input and output are
    /// skipped).
    pub(crate) fn data_parent(&self, id: SchemaId) -> Option<SchemaId> {
        let mut parent = self.node(id).parent;
        while let Some(p) = parent {
            if !self.node(p).is_schema_only() {
                return Some(p);
            }
            parent = self.node(p).parent;
        }
        None
    }

    /// Top-level data nodes, rpcs and notifications of all implemented
    /// modules, in module order.
    pub(crate) fn top_level(&self) -> impl Iterator<Item = SchemaId> + '_ {
        self.modules
            .iter()
            .filter(|m| m.implemented)
            .flat_map(|m| {
                m.data
                    .iter()
                    .chain(m.rpcs.iter())
                    .chain(m.notifications.iter())
                    .copied()
            })
    }

    /// Children of a node as seen from data trees. Children of rpcs and
    /// actions are taken from their input or output.
    pub(crate) fn data_children(
        &self,
        parent: SchemaId,
        output: bool,
    ) -> Vec<SchemaId> {
        let mut out = Vec::new();
        let node = self.node(parent);
        match node.kind {
            CNodeKind::Rpc | CNodeKind::Action => {
                for child in &node.children {
                    let is_output =
                        matches!(self.node(*child).kind, CNodeKind::Output);
                    if is_output == output {
                        self.collect_data_children(*child, &mut out);
                    }
                }
            }
            _ => {
                self.collect_data_children(parent, &mut out);
                out.extend(node.actions.iter().copied());
                out.extend(node.notifications.iter().copied());
            }
        }
        out
    }

    fn collect_data_children(&self, parent: SchemaId, out: &mut Vec<SchemaId>) {
        for child in &self.node(parent).children {
            if self.node(*child).is_schema_only() {
                self.collect_data_children(*child, out);
            } else {
                out.push(*child);
            }
        }
    }

    /// Find a data child by module and name. With `module` set to `None` the
    /// first child with a matching name is returned.
    pub(crate) fn find_data_child(
        &self,
        parent: Option<SchemaId>,
        module: Option<ModuleId>,
        name: &str,
        output: bool,
    ) -> Option<SchemaId> {
        let matches = |id: &SchemaId| {
            let node = self.node(*id);
            &*node.name == name && module.map_or(true, |m| m == node.module)
        };
        match parent {
            Some(parent) => self
                .data_children(parent, output)
                .into_iter()
                .find(|id| matches(id)),
            None => self.top_level().find(|id| matches(id)),
        }
    }

    /// Generate the path of a schema node.
    pub(crate) fn path(&self, id: SchemaId, format: SchemaPathFormat) -> String {
        let mut ids = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.node(id);
            if format == SchemaPathFormat::LOG || !node.is_schema_only() {
                ids.push(id);
            }
            current = node.parent;
        }
        let mut path = String::new();
        let mut prev_module = None;
        for id in ids.iter().rev() {
            let node = self.node(*id);
            path.push('/');
            if prev_module != Some(node.module) {
                path.push_str(&self.module(node.module).name);
                path.push(':');
                prev_module = Some(node.module);
            }
            path.push_str(&node.name);
        }
        path
    }

    /// Whether `id` is `ancestor` or one of its descendants.
    pub(crate) fn is_within(&self, id: SchemaId, ancestor: SchemaId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.node(c).parent;
        }
        false
    }

    /// Closest ancestor (inclusive) of the given kind.
    pub(crate) fn enclosing(
        &self,
        id: SchemaId,
        pred: impl Fn(&CNodeKind) -> bool,
    ) -> Option<SchemaId> {
        let mut current = Some(id);
        while let Some(c) = current {
            if pred(&self.node(c).kind) {
                return Some(c);
            }
            current = self.node(c).parent;
        }
        None
    }
}
