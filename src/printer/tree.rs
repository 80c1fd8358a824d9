//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Tree diagram printer (RFC 8340).
//!
//! Only the nodes belonging to the namespace of the printed module are
//! shown. Nodes it adds to other modules are listed in `augment` sections.

use crate::compiled::{CNode, CNodeKind, CompiledSchema, NodeFlags};
use crate::ids::{ModuleId, SchemaId};
use crate::parsed::Status;
use crate::schema::{DataValueType, SchemaPrinterFlags};

struct TreePrinter<'a> {
    schema: &'a CompiledSchema,
    module: ModuleId,
    out: String,
}

/// Print the tree diagram of a compiled module.
pub(crate) fn print(
    schema: &CompiledSchema,
    module: ModuleId,
    options: SchemaPrinterFlags,
) -> String {
    let cmodule = schema.module(module);
    let mut printer = TreePrinter {
        schema,
        module,
        out: format!("module: {}\n", cmodule.name),
    };

    printer.group(&cmodule.data, "  ");

    // Augments, grouped by target node.
    let mut targets: Vec<(SchemaId, Vec<SchemaId>)> = Vec::new();
    for (index, node) in schema.nodes.iter().enumerate() {
        let Some(parent) = node.parent else {
            continue;
        };
        if node.detached
            || node.module != module
            || schema.node(parent).module == module
        {
            continue;
        }
        let id = SchemaId::from_index(index);
        match targets.iter_mut().find(|(target, _)| *target == parent) {
            Some((_, nodes)) => nodes.push(id),
            None => targets.push((parent, vec![id])),
        }
    }
    for (target, nodes) in &targets {
        printer.out.push('\n');
        printer.out.push_str(&format!("  augment {}:\n", printer.target_path(*target)));
        printer.group(nodes, "    ");
    }

    if !cmodule.rpcs.is_empty() {
        printer.out.push_str("\n  rpcs:\n");
        printer.group(&cmodule.rpcs, "    ");
    }
    if !cmodule.notifications.is_empty() {
        printer.out.push_str("\n  notifications:\n");
        printer.group(&cmodule.notifications, "    ");
    }

    let mut out = printer.out;
    if options.contains(SchemaPrinterFlags::SHRINK) {
        out = out.replace("\n\n", "\n");
    }
    out
}

// ===== impl TreePrinter =====

impl<'a> TreePrinter<'a> {
    /// Print sibling nodes, all at the same indentation.
    fn group(&mut self, ids: &[SchemaId], prefix: &str) {
        let ids: Vec<SchemaId> = ids
            .iter()
            .copied()
            .filter(|id| self.is_shown(*id))
            .collect();
        let width = ids
            .iter()
            .map(|id| self.label(self.schema.node(*id)).len())
            .max()
            .unwrap_or(0);

        for (i, id) in ids.iter().enumerate() {
            let last = i + 1 == ids.len();
            self.node(*id, prefix, width);
            let children = self.children(*id);
            if !children.is_empty() {
                let nested = format!("{}{}", prefix, if last { "   " } else { "|  " });
                self.group(&children, &nested);
            }
        }
    }

    fn is_shown(&self, id: SchemaId) -> bool {
        let node = self.schema.node(id);
        if node.module != self.module || node.detached {
            return false;
        }
        // Empty input and output are not printed.
        !matches!(node.kind, CNodeKind::Input | CNodeKind::Output)
            || !node.children.is_empty()
    }

    fn children(&self, id: SchemaId) -> Vec<SchemaId> {
        let node = self.schema.node(id);
        node.children
            .iter()
            .chain(node.actions.iter())
            .chain(node.notifications.iter())
            .copied()
            .collect()
    }

    fn node(&mut self, id: SchemaId, prefix: &str, width: usize) {
        let schema = self.schema;
        let node = schema.node(id);
        let status = match node.status {
            Status::Current => '+',
            Status::Deprecated => 'x',
            Status::Obsolete => 'o',
        };
        let mut line = format!("{}{}--", prefix, status);

        if let CNodeKind::Case = node.kind {
            line.push_str(&format!(":({})", node.name));
        } else {
            line.push_str(self.flags(id, node));
            line.push(' ');
            let label = self.label(node);
            match self.type_name(node) {
                Some(ty) => {
                    line.push_str(&format!("{:<width$}   {}", label, ty, width = width));
                }
                None => line.push_str(&label),
            }
        }

        if let CNodeKind::List { key_names, .. } = &node.kind {
            if !key_names.is_empty() {
                let keys: Vec<&str> = key_names.iter().map(|k| &**k).collect();
                line.push_str(&format!(" [{}]", keys.join(" ")));
            }
        }
        if !node.if_features.is_empty() {
            let features: Vec<&str> =
                node.if_features.iter().map(|f| &*f.text).collect();
            line.push_str(&format!(" {{{}}}?", features.join(",")));
        }

        self.out.push_str(line.trim_end());
        self.out.push('\n');
    }

    fn flags(&self, id: SchemaId, node: &CNode) -> &'static str {
        match node.kind {
            CNodeKind::Rpc | CNodeKind::Action => return "-x",
            CNodeKind::Notification => return "-n",
            CNodeKind::Input => return "-w",
            CNodeKind::Output => return "ro",
            _ => (),
        }
        let within = self.schema.enclosing(id, |kind| {
            matches!(
                kind,
                CNodeKind::Input | CNodeKind::Output | CNodeKind::Notification
            )
        });
        match within.map(|w| &self.schema.node(w).kind) {
            Some(CNodeKind::Input) => "-w",
            Some(_) => "ro",
            None if node.is_config() => "rw",
            None => "ro",
        }
    }

    /// Node name with its cardinality marker.
    fn label(&self, node: &CNode) -> String {
        let mandatory = node.flags.contains(NodeFlags::MANDATORY);
        match &node.kind {
            CNodeKind::Choice { .. } if mandatory => format!("({})", node.name),
            CNodeKind::Choice { .. } => format!("({})?", node.name),
            CNodeKind::Container { presence: Some(_) } => format!("{}!", node.name),
            CNodeKind::List { .. } | CNodeKind::LeafList { .. } => {
                format!("{}*", node.name)
            }
            CNodeKind::Leaf { .. } | CNodeKind::AnyData | CNodeKind::AnyXml
                if !mandatory
                    && !node.flags.contains(NodeFlags::KEY) =>
            {
                format!("{}?", node.name)
            }
            _ => node.name.to_string(),
        }
    }

    fn type_name(&self, node: &CNode) -> Option<String> {
        match &node.kind {
            CNodeKind::AnyData => return Some("<anydata>".to_owned()),
            CNodeKind::AnyXml => return Some("<anyxml>".to_owned()),
            _ => (),
        }
        let ty = node.leaf_type()?;
        if let Some(leafref) = &ty.leafref {
            return Some(format!("-> {}", leafref.path));
        }
        let name = match &ty.typedef_name {
            Some(typedef) if ty.module != node.defined_in => {
                format!("{}:{}", self.schema.module(ty.module).prefix, typedef)
            }
            Some(typedef) => typedef.to_string(),
            None if ty.base == DataValueType::Unknown => return None,
            None => ty.base.as_str().to_owned(),
        };
        Some(name)
    }

    /// Prefixed schema path of an augment target.
    fn target_path(&self, target: SchemaId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(target);
        while let Some(id) = current {
            let node = self.schema.node(id);
            segments.push(format!(
                "{}:{}",
                self.schema.module(node.module).prefix,
                node.name
            ));
            current = node.parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }
}
