//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Top-level augments and deviations.

use std::sync::Arc;

use crate::compiled::CNodeKind;
use crate::compiler::structure::NodeidStart;
use crate::compiler::Compiler;
use crate::error::{Error, ErrorCode, Result};
use crate::ids::{ModuleId, SchemaId};
use crate::parsed::{DeviateKind, PAugment, PDeviate, PDeviation};
use crate::schema::SchemaPathFormat;

impl<'c> Compiler<'c> {
    /// Apply the top-level augments of all implemented modules. An augment
    /// may target nodes added by another augment, so pending augments are
    /// retried until no more progress is made.
    pub(super) fn apply_augments(&mut self) -> Result<()> {
        let entries = self.entries;
        let mut pending: Vec<(ModuleId, &'c PAugment)> = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            if !self.implemented[index] {
                continue;
            }
            let module = ModuleId::from_index(index);
            pending.extend(entry.parsed.augments.iter().map(|a| (module, a)));
        }

        while !pending.is_empty() {
            let mut remaining = Vec::new();
            let count = pending.len();
            for (module, augment) in pending {
                match self.resolve_nodeid(module, &augment.target, NodeidStart::Absolute) {
                    Ok(target) => self.apply_augment(module, augment, target)?,
                    Err(_) => remaining.push((module, augment)),
                }
            }
            if remaining.len() == count {
                let (module, augment) = remaining[0];
                return Err(Error::new(
                    ErrorCode::AugmentTarget,
                    format!(
                        "Augment target node \"{}\" from module \"{}\" was not found.",
                        augment.target,
                        self.module_name(module)
                    ),
                )
                .with_path(augment.target.clone()));
            }
            pending = remaining;
        }
        Ok(())
    }

    fn apply_augment(
        &mut self,
        module: ModuleId,
        augment: &'c PAugment,
        target: SchemaId,
    ) -> Result<()> {
        let scope = self.root_scope(module);
        let created =
            self.compile_augment_children(module, augment, &scope, module, target)?;

        let target_module = self.out.node(target).module;
        if target_module == module {
            return Ok(());
        }
        if augment.when.is_none() {
            for id in &created {
                if self.adds_mandatory(*id) {
                    let node = self.out.node(*id);
                    return Err(Error::compile(format!(
                        "Invalid augment adding mandatory node \"{}\" without making it conditional via when statement.",
                        node.name
                    ))
                    .with_path(self.out.path(*id, SchemaPathFormat::LOG)));
                }
            }
        }
        let augmented_by = &mut self.out.modules[target_module.to_index()].augmented_by;
        if !augmented_by.contains(&module) {
            augmented_by.push(module);
        }
        Ok(())
    }

    // Mandatory node, or an implicit case wrapping one.
    fn adds_mandatory(&self, id: SchemaId) -> bool {
        let node = self.out.node(id);
        if !node.if_features.is_empty() {
            return false;
        }
        match &node.kind {
            CNodeKind::Case => node.children.iter().any(|c| self.adds_mandatory(*c)),
            CNodeKind::List { min, .. } | CNodeKind::LeafList { min, .. } => *min > 0,
            CNodeKind::Container { presence: None } => {
                node.children.iter().any(|c| self.adds_mandatory(*c))
            }
            _ => node.mandatory_stmt == Some(true),
        }
    }

    /// Apply the deviations of all implemented modules in declaration
    /// order.
    pub(super) fn apply_deviations(&mut self) -> Result<()> {
        let entries = self.entries;
        for (index, entry) in entries.iter().enumerate() {
            if !self.implemented[index] {
                continue;
            }
            let module = ModuleId::from_index(index);
            for deviation in &entry.parsed.deviations {
                self.apply_deviation(module, deviation)?;
            }
        }
        Ok(())
    }

    fn apply_deviation(&mut self, module: ModuleId, deviation: &'c PDeviation) -> Result<()> {
        let target = self
            .resolve_nodeid(module, &deviation.target, NodeidStart::Absolute)
            .map_err(|_| {
                Error::compile(format!(
                    "Deviation target node \"{}\" from module \"{}\" was not found.",
                    deviation.target,
                    self.module_name(module)
                ))
                .with_path(deviation.target.clone())
            })?;
        let path = self.out.path(target, SchemaPathFormat::LOG);
        let target_module = self.out.node(target).module;

        for deviate in &deviation.deviates {
            self.apply_deviate(module, target, deviate)
                .map_err(|err| err.with_path(path.clone()))?;
            if deviate.kind == DeviateKind::NotSupported {
                break;
            }
        }

        let deviated_by = &mut self.out.modules[target_module.to_index()].deviated_by;
        if !deviated_by.contains(&module) {
            deviated_by.push(module);
        }
        Ok(())
    }

    fn apply_deviate(
        &mut self,
        module: ModuleId,
        target: SchemaId,
        deviate: &'c PDeviate,
    ) -> Result<()> {
        let kind = deviate.kind;
        let keyword = match kind {
            DeviateKind::NotSupported => {
                self.detach(target);
                return Ok(());
            }
            DeviateKind::Add => "add",
            DeviateKind::Replace => "replace",
            DeviateKind::Delete => "delete",
        };
        let invalid = |property: &str, detail: &str| {
            Error::compile(format!(
                "Invalid deviation ({}) of \"{}\" property - {}.",
                keyword, property, detail
            ))
        };

        let units = self.intern_opt(deviate.units.as_deref());
        let musts = self.compile_musts(module, &deviate.musts)?;
        let defaults: Vec<(Arc<str>, ModuleId)> = deviate
            .defaults
            .iter()
            .map(|d| (self.dict.intern(d), module))
            .collect();
        let uniques: Vec<(Arc<str>, ModuleId)> = deviate
            .uniques
            .iter()
            .map(|u| (self.dict.intern(u), module))
            .collect();
        let ty = match &deviate.ty {
            Some(ty) => {
                if kind != DeviateKind::Replace {
                    return Err(invalid("type", "only replace is allowed"));
                }
                let scope = self.root_scope(module);
                Some(self.compile_type(ty, &scope)?)
            }
            None => None,
        };

        let node = self.out.node_mut(target);

        // units
        if let Some(units) = units {
            let current = match &mut node.kind {
                CNodeKind::Leaf { units, .. } | CNodeKind::LeafList { units, .. } => units,
                _ => return Err(invalid("units", "target does not support it")),
            };
            match kind {
                DeviateKind::Add if current.is_some() => {
                    return Err(invalid("units", "property already exists"))
                }
                DeviateKind::Replace if current.is_none() => {
                    return Err(invalid("units", "property does not exist"))
                }
                DeviateKind::Delete => {
                    if current.as_deref() != Some(&*units) {
                        return Err(invalid("units", "value does not match"));
                    }
                    *current = None;
                }
                _ => *current = Some(units),
            }
        }

        // must
        if !musts.is_empty() {
            match kind {
                DeviateKind::Add => node.musts.extend(musts),
                DeviateKind::Delete => {
                    for must in musts {
                        let position = node
                            .musts
                            .iter()
                            .position(|m| m.text == must.text)
                            .ok_or_else(|| invalid("must", "value does not match"))?;
                        node.musts.remove(position);
                    }
                }
                _ => return Err(invalid("must", "only add and delete are allowed")),
            }
        }

        // unique
        if !uniques.is_empty() {
            let current = match &mut node.kind {
                CNodeKind::List { unique_texts, .. } => unique_texts,
                _ => return Err(invalid("unique", "target is not a list")),
            };
            match kind {
                DeviateKind::Add => current.extend(uniques),
                DeviateKind::Delete => {
                    for (unique, _) in uniques {
                        let position = current
                            .iter()
                            .position(|(u, _)| *u == unique)
                            .ok_or_else(|| invalid("unique", "value does not match"))?;
                        current.remove(position);
                    }
                }
                _ => return Err(invalid("unique", "only add and delete are allowed")),
            }
        }

        // default
        if !defaults.is_empty() {
            match (&mut node.kind, kind) {
                (CNodeKind::Leaf { default_text, .. }, _) => {
                    if defaults.len() > 1 {
                        return Err(invalid("default", "leaf can have only one default"));
                    }
                    match kind {
                        DeviateKind::Add if default_text.is_some() => {
                            return Err(invalid("default", "property already exists"))
                        }
                        DeviateKind::Replace if default_text.is_none() => {
                            return Err(invalid("default", "property does not exist"))
                        }
                        DeviateKind::Delete => {
                            let matches = default_text
                                .as_ref()
                                .is_some_and(|(d, _)| *d == defaults[0].0);
                            if !matches {
                                return Err(invalid("default", "value does not match"));
                            }
                            *default_text = None;
                        }
                        _ => *default_text = defaults.into_iter().next(),
                    }
                }
                (CNodeKind::LeafList { defaults_text, .. }, DeviateKind::Add) => {
                    defaults_text.extend(defaults)
                }
                (CNodeKind::LeafList { defaults_text, .. }, DeviateKind::Delete) => {
                    for (default, _) in defaults {
                        let position = defaults_text
                            .iter()
                            .position(|(d, _)| *d == default)
                            .ok_or_else(|| invalid("default", "value does not match"))?;
                        defaults_text.remove(position);
                    }
                }
                (CNodeKind::Choice { default_name, .. }, _) => match kind {
                    DeviateKind::Delete => *default_name = None,
                    _ => *default_name = Some(defaults[0].0.clone()),
                },
                _ => return Err(invalid("default", "target does not support it")),
            }
        }

        // config and mandatory
        for (property, value, current) in [
            ("config", deviate.config, &mut node.config_stmt),
            ("mandatory", deviate.mandatory, &mut node.mandatory_stmt),
        ] {
            let Some(value) = value else {
                continue;
            };
            match kind {
                DeviateKind::Add if current.is_some() => {
                    return Err(invalid(property, "property already exists"))
                }
                DeviateKind::Delete => {
                    return Err(invalid(property, "delete is not allowed"))
                }
                _ => *current = Some(value),
            }
        }

        // min-elements and max-elements
        if deviate.min_elements.is_some() || deviate.max_elements.is_some() {
            let (min, max) = match &mut node.kind {
                CNodeKind::List { min, max, .. } | CNodeKind::LeafList { min, max, .. } => {
                    (min, max)
                }
                _ => {
                    return Err(invalid(
                        "min-elements/max-elements",
                        "target does not support it",
                    ))
                }
            };
            if kind == DeviateKind::Delete {
                return Err(invalid("min-elements/max-elements", "delete is not allowed"));
            }
            if let Some(value) = deviate.min_elements {
                *min = value;
            }
            if let Some(value) = deviate.max_elements {
                *max = value;
            }
        }

        // type
        if let Some(ty) = ty {
            match &mut node.kind {
                CNodeKind::Leaf { ty: current, .. } | CNodeKind::LeafList { ty: current, .. } => {
                    *current = ty
                }
                _ => return Err(invalid("type", "target does not support it")),
            }
        }
        Ok(())
    }
}
