//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Identifier registration: module table, features, identities and
//! extension definitions.

use std::collections::{HashMap, HashSet};

use crate::compiled::{CIdentity, CModule};
use crate::compiler::Compiler;
use crate::context::ContextFlags;
use crate::error::{Error, ErrorCode, Result};
use crate::ids::{IdentityId, ModuleId};
use crate::parsed::{PGrouping, PNode, PNodeKind, PType, ParsedModule};
use crate::utils::split_prefix;

const BUILTIN_TYPES: &[&str] = &[
    "binary",
    "bits",
    "boolean",
    "decimal64",
    "empty",
    "enumeration",
    "identityref",
    "instance-identifier",
    "int8",
    "int16",
    "int32",
    "int64",
    "leafref",
    "string",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "union",
];

pub(crate) fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

impl Compiler<'_> {
    pub(super) fn compile_identifiers(&mut self) -> Result<()> {
        self.resolve_implemented();

        let entries = self.entries;
        for (index, entry) in entries.iter().enumerate() {
            let parsed = &entry.parsed;
            check_duplicates(parsed)?;
            let module = CModule {
                name: self.intern(&parsed.name),
                namespace: self.intern(&parsed.namespace),
                prefix: self.intern(&parsed.prefix),
                revision: self.intern_opt(parsed.revision()),
                implemented: self.implemented[index],
                prefixes: entry.prefixes.iter().cloned().collect::<HashMap<_, _>>(),
                ..Default::default()
            };
            self.out.modules.push(module);
        }

        self.compile_features()?;
        self.compile_identities()
    }

    /// Modules targeted by augments or deviations of implemented modules are
    /// implemented too, and so are modules of leafref targets with
    /// `REF_IMPLEMENTED`.
    fn resolve_implemented(&mut self) {
        let entries = self.entries;
        loop {
            let mut changed = false;
            for (index, entry) in entries.iter().enumerate() {
                if !self.implemented[index] {
                    continue;
                }
                let module = ModuleId::from_index(index);
                let parsed = &entry.parsed;
                let mut targets: Vec<&str> = parsed
                    .augments
                    .iter()
                    .map(|a| a.target.as_str())
                    .chain(parsed.deviations.iter().map(|d| d.target.as_str()))
                    .collect();
                let mut paths = Vec::new();
                if self.options.contains(ContextFlags::REF_IMPLEMENTED) {
                    collect_leafref_paths(parsed, &mut paths);
                    targets.extend(paths.iter().map(String::as_str));
                }
                for target in targets {
                    for prefix in path_prefixes(target) {
                        let Some(target) = self.prefix_module(module, prefix) else {
                            continue;
                        };
                        if !self.implemented[target.to_index()] {
                            self.implemented[target.to_index()] = true;
                            changed = true;
                            self.sink.verbose(format!(
                                "Implementing module \"{}\" referenced by \"{}\".",
                                self.module_name(target),
                                parsed.name
                            ));
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn compile_identities(&mut self) -> Result<()> {
        let entries = self.entries;

        // Register.
        for (index, entry) in entries.iter().enumerate() {
            let module = ModuleId::from_index(index);
            for pident in &entry.parsed.identities {
                let mut if_features = Vec::new();
                for text in &pident.if_features {
                    if_features.push(self.compile_if_feature(module, text)?);
                }
                let enabled = self.if_features_enabled(&if_features);
                let identity = CIdentity {
                    name: self.intern(&pident.name),
                    module,
                    bases: Vec::new(),
                    derived: Vec::new(),
                    enabled,
                    status: pident.status.unwrap_or_default(),
                    description: self.intern_opt(pident.description.as_deref()),
                    reference: self.intern_opt(pident.reference.as_deref()),
                };
                self.out.identities.push(identity);
                let id = IdentityId::from_index(self.out.identities.len() - 1);
                self.out.modules[index].identities.push(id);
            }
        }

        // Resolve bases.
        for (index, entry) in entries.iter().enumerate() {
            let module = ModuleId::from_index(index);
            for (pident, id) in entry
                .parsed
                .identities
                .iter()
                .zip(self.out.modules[index].identities.clone())
            {
                for base in &pident.bases {
                    let base_id = self.resolve_identity(module, base)?;
                    self.out.identities[id.to_index()].bases.push(base_id);
                    self.out.identities[base_id.to_index()].derived.push(id);
                }
            }
        }

        // Cycle detection.
        for index in 0..self.out.identities.len() {
            let id = IdentityId::from_index(index);
            let mut stack = self.out.identities[index].bases.clone();
            let mut seen = HashSet::new();
            while let Some(base) = stack.pop() {
                if base == id {
                    let identity = self.out.identity(id);
                    return Err(Error::new(
                        ErrorCode::CyclicDefinition,
                        format!(
                            "Identity \"{}\" is indirectly derived from itself.",
                            identity.name
                        ),
                    ));
                }
                if seen.insert(base) {
                    stack.extend(self.out.identity(base).bases.iter().copied());
                }
            }
        }
        Ok(())
    }

    /// Resolve a (possibly prefixed) identity name written in `module`.
    pub(crate) fn resolve_identity(
        &self,
        module: ModuleId,
        name: &str,
    ) -> Result<IdentityId> {
        let (prefix, local) = split_prefix(name);
        let target = match prefix {
            Some(prefix) => self.prefix_module(module, prefix).ok_or_else(|| {
                Error::compile(format!(
                    "Invalid prefix used for base (\"{}\") of identity.",
                    name
                ))
            })?,
            None => module,
        };
        self.out.find_identity(target, local).ok_or_else(|| {
            Error::compile(format!(
                "Unable to find base (\"{}\") of identityref.",
                name
            ))
        })
    }
}

fn check_duplicates(parsed: &ParsedModule) -> Result<()> {
    fn unique<'a>(
        names: impl Iterator<Item = &'a str>,
        what: &str,
    ) -> Result<()> {
        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(name) {
                return Err(Error::compile(format!(
                    "Duplicate identifier \"{}\" of {} statement.",
                    name, what
                )));
            }
        }
        Ok(())
    }
    unique(parsed.typedefs.iter().map(|t| t.name.as_str()), "typedef")?;
    unique(parsed.groupings.iter().map(|g| g.name.as_str()), "grouping")?;
    unique(parsed.identities.iter().map(|i| i.name.as_str()), "identity")?;
    unique(parsed.features.iter().map(|f| f.name.as_str()), "feature")?;
    unique(parsed.extensions.iter().map(|e| e.name.as_str()), "extension")?;
    for typedef in &parsed.typedefs {
        if is_builtin_type(&typedef.name) {
            return Err(Error::compile(format!(
                "Invalid name \"{}\" of typedef - name collision with a built-in type.",
                typedef.name
            )));
        }
    }
    Ok(())
}

/// Prefixes used in a schema node identifier or path.
pub(crate) fn path_prefixes(path: &str) -> Vec<&str> {
    let mut prefixes: Vec<&str> = Vec::new();
    for segment in path.split(['/', '[', '(', ' ', '=']) {
        if let (Some(prefix), _) = split_prefix(segment) {
            let prefix = prefix.trim_start_matches('.');
            if !prefix.is_empty() && !prefixes.contains(&prefix) {
                prefixes.push(prefix);
            }
        }
    }
    prefixes
}

fn collect_leafref_paths(parsed: &ParsedModule, out: &mut Vec<String>) {
    fn from_type(ty: &PType, out: &mut Vec<String>) {
        if let Some(path) = &ty.path {
            out.push(path.clone());
        }
        for member in &ty.types {
            from_type(member, out);
        }
    }
    fn from_nodes(nodes: &[PNode], out: &mut Vec<String>) {
        for node in nodes {
            match &node.kind {
                PNodeKind::Leaf { ty, .. } | PNodeKind::LeafList { ty, .. } => {
                    from_type(ty, out)
                }
                PNodeKind::Uses { augments, .. } => {
                    for augment in augments {
                        from_nodes(&augment.children, out);
                    }
                }
                _ => (),
            }
            for typedef in &node.typedefs {
                from_type(&typedef.ty, out);
            }
            from_groupings(&node.groupings, out);
            from_nodes(&node.children, out);
        }
    }
    fn from_groupings(groupings: &[PGrouping], out: &mut Vec<String>) {
        for grouping in groupings {
            for typedef in &grouping.typedefs {
                from_type(&typedef.ty, out);
            }
            from_groupings(&grouping.groupings, out);
            from_nodes(&grouping.children, out);
        }
    }
    for typedef in &parsed.typedefs {
        from_type(&typedef.ty, out);
    }
    from_groupings(&parsed.groupings, out);
    from_nodes(&parsed.body, out);
    for augment in &parsed.augments {
        from_nodes(&augment.children, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_of_paths() {
        assert_eq!(
            path_prefixes("/if:interfaces/if:interface[if:name=current()/../x]/ip:ipv4"),
            vec!["if", "ip"]
        );
        assert!(path_prefixes("../name").is_empty());
    }
}
