//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! LYB, a compact binary encoding of data trees.
//!
//! The encoding starts with a header listing the modules (name and revision)
//! the data is instance of. Then follow sibling records, each prefixed by its
//! length and terminated by a zero length. A record carries the module index,
//! the node name, the node kind, its flags, metadata, value and the nested
//! records of its children. Term values are stored as their base type
//! followed by their canonical JSON form.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_traits::FromPrimitive;

use crate::compiled::CNodeKind;
use crate::data::{Content, DataFlags, DataParserFlags, DataTree, Meta};
use crate::error::{Error, Result};
use crate::ids::{DataId, ModuleId};
use crate::schema::DataValueType;
use crate::value::PrefixFormat;

const MAGIC: &[u8; 3] = b"LYB";
const VERSION: u8 = 1;
const NO_MODULE: u16 = u16::MAX;

const KIND_INNER: u8 = 0;
const KIND_TERM: u8 = 1;
const KIND_ANY: u8 = 2;
const KIND_OPAQUE: u8 = 3;

// ===== printer =====

struct LybPrinter<'t, 'a> {
    tree: &'t DataTree<'a>,
    modules: Vec<ModuleId>,
}

/// Print the given sibling nodes (and their subtrees) in LYB.
pub(crate) fn print(tree: &DataTree<'_>, roots: &[DataId]) -> Vec<u8> {
    let mut printer = LybPrinter {
        tree,
        modules: Vec::new(),
    };
    for root in roots {
        printer.collect_modules(*root);
    }

    let schema = tree.schema();
    let mut out = BytesMut::new();
    out.put_slice(MAGIC);
    out.put_u8(VERSION);
    out.put_u16(printer.modules.len() as u16);
    for module in &printer.modules {
        let module = schema.module(*module);
        put_str(&mut out, &module.name);
        put_str(&mut out, module.revision.as_deref().unwrap_or_default());
    }
    printer.siblings(&mut out, roots);
    out.to_vec()
}

fn put_str(out: &mut BytesMut, s: &str) {
    out.put_u16(s.len() as u16);
    out.put_slice(s.as_bytes());
}

impl LybPrinter<'_, '_> {
    fn collect_modules(&mut self, id: DataId) {
        let node = self.tree.node(id);
        if let Some(schema) = node.schema {
            let module = self.tree.schema().node(schema).module;
            if !self.modules.contains(&module) {
                self.modules.push(module);
            }
        }
        for child in self.tree.children(Some(id)) {
            self.collect_modules(child);
        }
    }

    fn siblings(&self, out: &mut BytesMut, ids: &[DataId]) {
        for id in ids {
            let record = self.record(*id);
            out.put_u32(record.len() as u32);
            out.put_slice(&record);
        }
        out.put_u32(0);
    }

    fn record(&self, id: DataId) -> BytesMut {
        let schema = self.tree.schema();
        let node = self.tree.node(id);
        let mut out = BytesMut::new();

        match node.schema {
            Some(s) => {
                let snode = schema.node(s);
                let index = self
                    .modules
                    .iter()
                    .position(|m| *m == snode.module)
                    .unwrap_or(NO_MODULE as usize);
                out.put_u16(index as u16);
                put_str(&mut out, &snode.name);
            }
            None => {
                out.put_u16(NO_MODULE);
                let name = match &node.content {
                    Content::Opaque { name, .. } => name.as_str(),
                    _ => "",
                };
                put_str(&mut out, name);
            }
        }

        let kind = match node.content {
            Content::Inner => KIND_INNER,
            Content::Term(_) => KIND_TERM,
            Content::Any(_) => KIND_ANY,
            Content::Opaque { .. } => KIND_OPAQUE,
        };
        out.put_u8(kind);
        out.put_u8(node.flags.bits());

        out.put_u16(node.meta.len() as u16);
        for meta in &node.meta {
            put_str(&mut out, &meta.module);
            put_str(&mut out, &meta.name);
            put_str(&mut out, &meta.value);
        }

        match &node.content {
            Content::Term(value) => {
                out.put_u8(value.base as u8);
                put_str(&mut out, &value.canonical);
            }
            Content::Any(value) => {
                let text = value.as_ref().map(|v| v.to_string()).unwrap_or_default();
                out.put_u32(text.len() as u32);
                out.put_slice(text.as_bytes());
            }
            Content::Opaque { module, value, .. } => {
                put_str(&mut out, module.as_deref().unwrap_or_default());
                out.put_u8(value.is_some() as u8);
                put_str(&mut out, value.as_deref().unwrap_or_default());
            }
            Content::Inner => (),
        }

        let children = self.tree.children(Some(id));
        self.siblings(&mut out, &children);
        out
    }
}

// ===== parser =====

struct LybReader {
    buf: Bytes,
}

impl LybReader {
    fn ensure(&self, len: usize) -> Result<()> {
        if self.buf.remaining() < len {
            return Err(Error::syntax("Unexpected end of LYB data."));
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    fn bytes(&mut self, len: usize) -> Result<Bytes> {
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        self.utf8(len)
    }

    fn long_string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        self.utf8(len)
    }

    fn utf8(&mut self, len: usize) -> Result<String> {
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::syntax("Invalid UTF-8 string in LYB data."))
    }
}

struct LybParser<'t, 'a> {
    tree: &'t mut DataTree<'a>,
    /// Context module of every module of the header.
    modules: Vec<ModuleId>,
    options: DataParserFlags,
}

/// Parse LYB data into the (empty) tree.
pub(crate) fn parse(tree: &mut DataTree<'_>, data: &[u8], options: DataParserFlags) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let mut reader = LybReader {
        buf: Bytes::copy_from_slice(data),
    };
    if reader.bytes(MAGIC.len())?.as_ref() != MAGIC {
        return Err(Error::syntax("Invalid LYB magic number."));
    }
    let version = reader.u8()?;
    if version != VERSION {
        return Err(Error::syntax(format!(
            "Unsupported LYB format version {}.",
            version
        )));
    }

    let schema = tree.schema();
    let count = reader.u16()?;
    let mut modules = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = reader.string()?;
        let revision = reader.string()?;
        let module = schema.module_by_name(&name).ok_or_else(|| {
            Error::syntax(format!(
                "Module \"{}\" of the LYB data not found in the context.",
                name
            ))
        })?;
        let current = schema.module(module).revision.as_deref().unwrap_or_default();
        if current != revision {
            let newer = current > revision.as_str();
            if !(newer && options.contains(DataParserFlags::LYB_MOD_UPDATE)) {
                return Err(Error::syntax(format!(
                    "Module \"{}\" of the LYB data has revision \"{}\" but \"{}\" is in the context.",
                    name, revision, current
                )));
            }
        }
        modules.push(module);
    }

    let mut parser = LybParser {
        tree,
        modules,
        options,
    };
    parser.siblings(&mut reader, None)?;
    if reader.buf.has_remaining() {
        return Err(Error::syntax("Trailing data after the LYB tree."));
    }
    Ok(())
}

impl LybParser<'_, '_> {
    fn siblings(&mut self, reader: &mut LybReader, parent: Option<DataId>) -> Result<()> {
        loop {
            let len = reader.u32()? as usize;
            if len == 0 {
                return Ok(());
            }
            let mut record = LybReader {
                buf: reader.bytes(len)?,
            };
            self.record(&mut record, parent)?;
            if record.buf.has_remaining() {
                return Err(Error::syntax("Malformed LYB record."));
            }
        }
    }

    fn record(&mut self, reader: &mut LybReader, parent: Option<DataId>) -> Result<()> {
        let schema = self.tree.schema();
        let module_index = reader.u16()?;
        let name = reader.string()?;
        let kind = reader.u8()?;
        let flags = DataFlags::from_bits_truncate(reader.u8()?);

        let meta_count = reader.u16()?;
        let mut meta = Vec::with_capacity(meta_count as usize);
        for _ in 0..meta_count {
            meta.push(Meta {
                module: reader.string()?,
                name: reader.string()?,
                value: reader.string()?,
            });
        }

        let snode = if module_index == NO_MODULE {
            None
        } else {
            let module = self
                .modules
                .get(module_index as usize)
                .copied()
                .ok_or_else(|| Error::syntax("Invalid module index in LYB data."))?;
            let parent_schema = parent.and_then(|p| self.tree.node(p).schema);
            let found = schema
                .find_data_child(parent_schema, Some(module), &name, false)
                .or_else(|| schema.find_data_child(parent_schema, Some(module), &name, true))
                .ok_or_else(|| {
                    Error::syntax(format!("Node \"{}\" of the LYB data not found in the schema.", name))
                })?;
            Some(found)
        };

        if let Some(snode) = snode {
            if kind == KIND_INNER
                && !matches!(
                    schema.node(snode).kind,
                    CNodeKind::Container { .. }
                        | CNodeKind::List { .. }
                        | CNodeKind::Rpc
                        | CNodeKind::Action
                        | CNodeKind::Notification
                )
            {
                return Err(Error::syntax(format!(
                    "Node \"{}\" of the LYB data is not an inner node.",
                    name
                )));
            }
        }

        let id = match (kind, snode) {
            (KIND_INNER, Some(snode)) => self.tree.new_inner_node(parent, snode),
            (KIND_TERM, Some(snode)) => {
                let base = DataValueType::from_u8(reader.u8()?)
                    .ok_or_else(|| Error::syntax("Invalid value type in LYB data."))?;
                let canonical = reader.string()?;
                let id = self
                    .tree
                    .new_term_node(parent, snode, &canonical, PrefixFormat::Json)?;
                // The type may only change along with a module update.
                let stored = self.tree.node(id).value().map(|v| v.base);
                if stored != Some(base)
                    && !self.options.contains(DataParserFlags::LYB_MOD_UPDATE)
                {
                    return Err(Error::syntax(format!(
                        "Value of node \"{}\" in the LYB data is of type {} but the schema expects {}.",
                        name,
                        base,
                        stored.unwrap_or(DataValueType::Unknown)
                    )));
                }
                id
            }
            (KIND_ANY, Some(snode)) => {
                let text = reader.long_string()?;
                let value = if text.is_empty() {
                    None
                } else {
                    Some(serde_json::from_str(&text).map_err(|err| {
                        Error::syntax(format!("Invalid anydata value in LYB data: {}", err))
                    })?)
                };
                let id = self.tree.alloc(Some(snode), Content::Any(value));
                self.tree.link(parent, id);
                id
            }
            (KIND_OPAQUE, None) => {
                let module = reader.string()?;
                let has_value = reader.u8()? != 0;
                let value = reader.string()?;
                let id = self.tree.alloc(
                    None,
                    Content::Opaque {
                        name,
                        module: (!module.is_empty()).then_some(module),
                        value: has_value.then_some(value),
                    },
                );
                self.tree.link(parent, id);
                id
            }
            _ => return Err(Error::syntax("Invalid node kind in LYB data.")),
        };
        let node = self.tree.node_mut(id);
        node.flags = flags;
        node.meta = meta;

        self.siblings(reader, Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_bounds() {
        let mut reader = LybReader {
            buf: Bytes::from_static(&[0, 3, b'a', b'b']),
        };
        assert!(reader.string().is_err());
        let mut reader = LybReader {
            buf: Bytes::from_static(&[0, 2, b'a', b'b', 0]),
        };
        assert_eq!(reader.string().unwrap(), "ab");
        assert!(reader.u16().is_err());
    }
}
