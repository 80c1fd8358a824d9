//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Leafref target resolution.

use std::collections::HashSet;
use std::sync::Arc;

use crate::compiled::{CNodeKind, CType};
use crate::compiler::Compiler;
use crate::error::{Error, ErrorCode, Result};
use crate::ids::SchemaId;
use crate::schema::SchemaPathFormat;
use crate::xpath::schema::leafref_target;

impl Compiler<'_> {
    /// Resolve the target and real type of every leafref, including those
    /// in union members. Targets may be leafrefs themselves; such chains are
    /// resolved first and must not be circular.
    pub(super) fn resolve_leafrefs(&mut self) -> Result<()> {
        let mut done = HashSet::new();
        for index in 0..self.out.nodes.len() {
            let id = SchemaId::from_index(index);
            let mut visiting = Vec::new();
            self.resolve_node_leafrefs(id, &mut visiting, &mut done)?;
        }
        Ok(())
    }

    fn resolve_node_leafrefs(
        &mut self,
        id: SchemaId,
        visiting: &mut Vec<SchemaId>,
        done: &mut HashSet<SchemaId>,
    ) -> Result<()> {
        if done.contains(&id) {
            return Ok(());
        }
        let node = self.out.node(id);
        let ty = match node.leaf_type() {
            Some(ty) if !node.detached && ty.has_leafref() => ty.clone(),
            _ => {
                done.insert(id);
                return Ok(());
            }
        };
        if visiting.contains(&id) {
            return Err(Error::new(
                ErrorCode::CyclicDefinition,
                "Invalid leafref path - circular chain of leafrefs detected.",
            )
            .with_path(self.out.path(id, SchemaPathFormat::LOG)));
        }

        visiting.push(id);
        let resolved = self
            .resolve_type_leafrefs(id, &ty, visiting, done)
            .map_err(|err| err.with_path_opt(Some(self.out.path(id, SchemaPathFormat::LOG))));
        visiting.pop();
        let resolved = resolved?;

        match &mut self.out.node_mut(id).kind {
            CNodeKind::Leaf { ty, .. } | CNodeKind::LeafList { ty, .. } => *ty = resolved,
            _ => (),
        }
        done.insert(id);
        Ok(())
    }

    fn resolve_type_leafrefs(
        &mut self,
        id: SchemaId,
        ty: &Arc<CType>,
        visiting: &mut Vec<SchemaId>,
        done: &mut HashSet<SchemaId>,
    ) -> Result<Arc<CType>> {
        if !ty.has_leafref() {
            return Ok(ty.clone());
        }
        let mut new = (**ty).clone();
        if let Some(leafref) = &mut new.leafref {
            let target = leafref_target(&self.out, id, &leafref.expr).map_err(|err| {
                Error {
                    msg: Some(format!(
                        "{} (path \"{}\")",
                        err.msg.clone().unwrap_or_default(),
                        leafref.path
                    )),
                    ..err
                }
            })?;
            if self.out.node(target).detached {
                return Err(Error::compile(format!(
                    "Invalid leafref path \"{}\" - target is disabled by a feature.",
                    leafref.path
                )));
            }
            self.resolve_node_leafrefs(target, visiting, done)?;
            let realtype = self
                .out
                .node(target)
                .leaf_type()
                .cloned()
                .ok_or_else(|| Error::compile("Invalid leafref target."))?;
            leafref.target = Some(target);
            leafref.realtype = Some(realtype);
        }
        let mut members = Vec::new();
        for member in &new.union {
            members.push(self.resolve_type_leafrefs(id, member, visiting, done)?);
        }
        new.union = members;
        Ok(Arc::new(new))
    }
}
