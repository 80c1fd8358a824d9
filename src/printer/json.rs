//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! JSON summary of a compiled module.

use serde_json::{json, Map, Value};

use crate::compiled::{CNode, CNodeKind, CType, CompiledSchema, NodeFlags};
use crate::ids::{ModuleId, SchemaId};
use crate::schema::SchemaPrinterFlags;

pub(crate) fn print(
    schema: &CompiledSchema,
    module: ModuleId,
    options: SchemaPrinterFlags,
) -> String {
    let cmodule = schema.module(module);
    let features: Map<String, Value> = cmodule
        .features
        .iter()
        .map(|(name, enabled)| (name.to_string(), Value::Bool(*enabled)))
        .collect();
    let identities: Vec<Value> = cmodule
        .identities
        .iter()
        .map(|id| Value::String(schema.identity(*id).name.to_string()))
        .collect();
    let nodes = |ids: &[SchemaId]| -> Vec<Value> {
        ids.iter()
            .filter(|id| !schema.node(**id).detached)
            .map(|id| node(schema, *id))
            .collect()
    };

    let value = json!({
        "name": &*cmodule.name,
        "revision": cmodule.revision.as_deref(),
        "namespace": &*cmodule.namespace,
        "prefix": &*cmodule.prefix,
        "implemented": cmodule.implemented,
        "features": features,
        "identities": identities,
        "data": nodes(&cmodule.data),
        "rpcs": nodes(&cmodule.rpcs),
        "notifications": nodes(&cmodule.notifications),
    });

    // Serializing a `Value` can't fail.
    if options.contains(SchemaPrinterFlags::SHRINK) {
        value.to_string()
    } else {
        serde_json::to_string_pretty(&value).unwrap_or_default()
    }
}

fn node(schema: &CompiledSchema, id: SchemaId) -> Value {
    let cnode = schema.node(id);
    let mut obj = Map::new();
    obj.insert("name".to_owned(), json!(&*cnode.name));
    obj.insert("kind".to_owned(), json!(cnode.keyword()));
    obj.insert(
        "module".to_owned(),
        json!(&*schema.module(cnode.module).name),
    );
    if !cnode.is_schema_only()
        && !matches!(
            cnode.kind,
            CNodeKind::Rpc | CNodeKind::Action | CNodeKind::Notification
        )
    {
        obj.insert("config".to_owned(), json!(cnode.is_config()));
    }
    obj.insert("status".to_owned(), json!(cnode.status.to_string()));
    if cnode.flags.contains(NodeFlags::MANDATORY) {
        obj.insert("mandatory".to_owned(), json!(true));
    }
    if let Some(description) = &cnode.description {
        obj.insert("description".to_owned(), json!(&**description));
    }

    match &cnode.kind {
        CNodeKind::Container { presence: Some(presence) } => {
            obj.insert("presence".to_owned(), json!(&**presence));
        }
        CNodeKind::Leaf {
            ty,
            units,
            default_text,
            ..
        } => {
            obj.insert("type".to_owned(), leaf_type(schema, ty));
            if let Some(units) = units {
                obj.insert("units".to_owned(), json!(&**units));
            }
            if let Some((default, _)) = default_text {
                obj.insert("default".to_owned(), json!(&**default));
            }
        }
        CNodeKind::LeafList {
            ty,
            units,
            defaults_text,
            min,
            max,
            ..
        } => {
            obj.insert("type".to_owned(), leaf_type(schema, ty));
            if let Some(units) = units {
                obj.insert("units".to_owned(), json!(&**units));
            }
            if !defaults_text.is_empty() {
                let defaults: Vec<&str> =
                    defaults_text.iter().map(|(d, _)| &**d).collect();
                obj.insert("default".to_owned(), json!(defaults));
            }
            obj.insert("min-elements".to_owned(), json!(min));
            if let Some(max) = max {
                obj.insert("max-elements".to_owned(), json!(max));
            }
        }
        CNodeKind::List {
            key_names,
            min,
            max,
            ..
        } => {
            let keys: Vec<&str> = key_names.iter().map(|k| &**k).collect();
            obj.insert("keys".to_owned(), json!(keys));
            obj.insert("min-elements".to_owned(), json!(min));
            if let Some(max) = max {
                obj.insert("max-elements".to_owned(), json!(max));
            }
            if cnode.flags.contains(NodeFlags::USER_ORDERED) {
                obj.insert("ordered-by".to_owned(), json!("user"));
            }
        }
        CNodeKind::Choice {
            default_name: Some(default),
            ..
        } => {
            obj.insert("default".to_owned(), json!(&**default));
        }
        _ => (),
    }

    let children = children(schema, cnode);
    if !children.is_empty() {
        obj.insert("children".to_owned(), Value::Array(children));
    }
    Value::Object(obj)
}

fn children(schema: &CompiledSchema, cnode: &CNode) -> Vec<Value> {
    cnode
        .children
        .iter()
        .chain(cnode.actions.iter())
        .chain(cnode.notifications.iter())
        .filter(|id| !schema.node(**id).detached)
        .map(|id| node(schema, *id))
        .collect()
}

fn leaf_type(schema: &CompiledSchema, ty: &CType) -> Value {
    let mut obj = Map::new();
    obj.insert("base".to_owned(), json!(ty.base.as_str()));
    if let Some(name) = &ty.typedef_name {
        obj.insert(
            "typedef".to_owned(),
            json!(format!("{}:{}", schema.module(ty.module).name, name)),
        );
    }
    if let Some(leafref) = &ty.leafref {
        obj.insert("path".to_owned(), json!(&*leafref.path));
    }
    if !ty.enums.is_empty() {
        let names: Vec<&str> = ty.enums.iter().map(|e| &*e.name).collect();
        obj.insert("enums".to_owned(), json!(names));
    }
    if !ty.bits.is_empty() {
        let names: Vec<&str> = ty.bits.iter().map(|b| &*b.name).collect();
        obj.insert("bits".to_owned(), json!(names));
    }
    if !ty.bases.is_empty() {
        let bases: Vec<String> = ty
            .bases
            .iter()
            .map(|id| {
                let identity = schema.identity(*id);
                format!("{}:{}", schema.module(identity.module).name, identity.name)
            })
            .collect();
        obj.insert("bases".to_owned(), json!(bases));
    }
    if !ty.union.is_empty() {
        let types: Vec<Value> =
            ty.union.iter().map(|t| leaf_type(schema, t)).collect();
        obj.insert("types".to_owned(), Value::Array(types));
    }
    Value::Object(obj)
}
