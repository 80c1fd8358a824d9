//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG schema data.

use bitflags::bitflags;
use num_derive::FromPrimitive;
use std::io::Write;

use crate::compiled::{
    CEnum, CExt, CIdentity, CMust, CNode, CNodeKind, CType, CWhen, NodeFlags,
};
use crate::context::Context;
use crate::error::{Error, ErrorCode, Result};
use crate::ids::{IdentityId, ModuleId, SchemaId};
use crate::iter::{Ancestors, NodeIterable, Set, Siblings, Traverse};
pub use crate::parsed::Status;
use crate::printer;
use crate::utils::Binding;
use crate::xpath;

/// Available YANG schema tree structures representing YANG module.
#[derive(Clone, Debug)]
pub struct SchemaModule<'a> {
    context: &'a Context,
    id: ModuleId,
}

/// Schema input formats.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SchemaInputFormat {
    YANG,
    YIN,
}

/// Schema output formats.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SchemaOutputFormat {
    YANG,
    YIN,
    /// RFC 8340 tree diagram.
    TREE,
    /// JSON summary of the compiled module.
    JSON,
}

/// Schema path format.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SchemaPathFormat {
    /// Descriptive path format used in log messages.
    LOG,
    /// Similar to LOG except that schema-only nodes (choice, case) are
    /// skipped.
    DATA,
}

bitflags! {
    /// Schema printer flags.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct SchemaPrinterFlags: u32 {
        /// Flag for output without indentation and formatting new lines.
        const SHRINK = 0x02;
        /// Print only top-level/reference node information, do not print
        /// information from the substatements.
        const NO_SUBSTMT = 0x10;
    }
}

/// Generic YANG schema node.
#[derive(Clone, Debug)]
pub struct SchemaNode<'a> {
    context: &'a Context,
    id: SchemaId,
    kind: SchemaNodeKind,
}

/// YANG schema node kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SchemaNodeKind {
    Container,
    Case,
    Choice,
    Leaf,
    LeafList,
    List,
    AnyData,
    AnyXml,
    Rpc,
    Input,
    Output,
    Action,
    Notification,
}

/// YANG must substatement.
#[derive(Clone, Debug)]
pub struct SchemaStmtMust<'a> {
    inner: &'a CMust,
}

/// YANG when substatement.
#[derive(Clone, Debug)]
pub struct SchemaStmtWhen<'a> {
    inner: &'a CWhen,
}

/// YANG leaf(-list) type.
#[derive(Clone, Debug)]
pub struct SchemaLeafType<'a> {
    context: &'a Context,
    ty: &'a CType,
}

/// Enum or bit of an enumeration or bits type.
#[derive(Clone, Debug)]
pub struct SchemaEnum<'a> {
    inner: &'a CEnum,
}

/// YANG identity.
#[derive(Clone, Debug)]
pub struct SchemaIdentity<'a> {
    context: &'a Context,
    id: IdentityId,
}

/// Compiled extension instance.
#[derive(Clone, Debug)]
pub struct SchemaExtInstance<'a> {
    context: &'a Context,
    inner: &'a CExt,
}

/// YANG data value type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum DataValueType {
    Unknown = 0,
    Binary = 1,
    Uint8 = 2,
    Uint16 = 3,
    Uint32 = 4,
    Uint64 = 5,
    String = 6,
    Bits = 7,
    Bool = 8,
    Dec64 = 9,
    Empty = 10,
    Enum = 11,
    IdentityRef = 12,
    InstanceId = 13,
    LeafRef = 14,
    Union = 15,
    Int8 = 16,
    Int16 = 17,
    Int32 = 18,
    Int64 = 19,
}

/// YANG data value.
#[derive(Clone, Debug, PartialEq)]
pub enum DataValue {
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    Empty,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Other(String),
}

// ===== impl SchemaModule =====

impl<'a> SchemaModule<'a> {
    pub(crate) fn id(&self) -> ModuleId {
        self.id
    }

    fn compiled(&self) -> &'a crate::compiled::CModule {
        self.context.compiled().module(self.id)
    }

    fn parsed(&self) -> &'a crate::parsed::ParsedModule {
        &self.context.entry(self.id).parsed
    }

    /// Name of the module.
    pub fn name(&self) -> &'a str {
        &self.compiled().name
    }

    /// Revision of the module.
    pub fn revision(&self) -> Option<&'a str> {
        self.compiled().revision.as_deref()
    }

    /// Namespace of the module.
    pub fn namespace(&self) -> &'a str {
        &self.compiled().namespace
    }

    /// Prefix of the module.
    pub fn prefix(&self) -> &'a str {
        &self.compiled().prefix
    }

    /// Source file of the module (embedded and in-memory modules have none).
    pub fn filepath(&self) -> Option<&'a str> {
        self.context
            .entry(self.id)
            .filepath
            .as_deref()
            .and_then(|p| p.to_str())
    }

    /// Party/company responsible for the module.
    pub fn organization(&self) -> Option<&'a str> {
        self.parsed().organization.as_deref()
    }

    /// Contact information for the module.
    pub fn contact(&self) -> Option<&'a str> {
        self.parsed().contact.as_deref()
    }

    /// Description of the module.
    pub fn description(&self) -> Option<&'a str> {
        self.parsed().description.as_deref()
    }

    /// Cross-reference for the module.
    pub fn reference(&self) -> Option<&'a str> {
        self.parsed().reference.as_deref()
    }

    /// Returns whether the module is implemented (not just imported).
    pub fn is_implemented(&self) -> bool {
        self.compiled().implemented
    }

    /// Whether the module was loaded at context creation.
    pub fn is_internal(&self) -> bool {
        self.context.is_internal_module(self.id)
    }

    /// Get the current real status of the specified feature in the module.
    pub fn feature_value(&self, feature: &str) -> Result<bool> {
        self.compiled()
            .features
            .iter()
            .find(|(name, _)| &**name == feature)
            .map(|(_, value)| *value)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "Feature \"{}\" not found in module \"{}\".",
                    feature,
                    self.name()
                ))
            })
    }

    /// Features of the module with their effective values.
    pub fn features(&self) -> impl Iterator<Item = (&'a str, bool)> + 'a {
        self.compiled()
            .features
            .iter()
            .map(|(name, value)| (&**name, *value))
    }

    /// Names of the identities defined by the module.
    pub fn identities(&self) -> impl Iterator<Item = SchemaIdentity<'a>> + 'a {
        let context = self.context;
        self.compiled()
            .identities
            .iter()
            .map(move |id| SchemaIdentity { context, id: *id })
    }

    /// Extension instances of the module statement.
    pub fn extensions(&self) -> impl Iterator<Item = SchemaExtInstance<'a>> + 'a {
        let context = self.context;
        self.compiled()
            .exts
            .iter()
            .map(move |inner| SchemaExtInstance { context, inner })
    }

    /// Print schema tree in the specified format into a writer.
    pub fn print_file<W: Write>(
        &self,
        mut writer: W,
        format: SchemaOutputFormat,
        options: SchemaPrinterFlags,
    ) -> Result<()> {
        let out = self.print_string(format, options)?;
        writer.write_all(out.as_bytes()).map_err(|err| {
            self.context.sink().error(Error::new(
                ErrorCode::Native,
                format!("Failed to write schema: {}", err),
            ))
        })
    }

    /// Print schema tree in the specified format into a string.
    pub fn print_string(
        &self,
        format: SchemaOutputFormat,
        options: SchemaPrinterFlags,
    ) -> Result<String> {
        let schema = self.context.compiled();
        let out = match format {
            SchemaOutputFormat::YANG => printer::yang::print(&self.parsed().stmt, options),
            SchemaOutputFormat::YIN => {
                let mut namespaces: Vec<(String, String)> = self
                    .compiled()
                    .prefixes
                    .iter()
                    .map(|(prefix, id)| {
                        (prefix.clone(), schema.module(*id).namespace.to_string())
                    })
                    .collect();
                namespaces.sort();
                printer::yin::print(&self.parsed().stmt, &namespaces, options)
            }
            SchemaOutputFormat::TREE => printer::tree::print(schema, self.id, options),
            SchemaOutputFormat::JSON => printer::json::print(schema, self.id, options),
        };
        Ok(out)
    }

    /// Returns an iterator over the top-level data nodes.
    pub fn data(&self) -> Siblings<'a, SchemaNode<'a>> {
        let first = self.compiled().data.first().copied();
        Siblings::new(SchemaNode::from_id_opt(self.context, first))
    }

    /// Returns an iterator over the list of RPCs.
    pub fn rpcs(&self) -> impl Iterator<Item = SchemaNode<'a>> + 'a {
        let context = self.context;
        self.compiled()
            .rpcs
            .iter()
            .map(move |id| SchemaNode::from_id(context, *id))
    }

    /// Returns an iterator over the list of notifications.
    pub fn notifications(&self) -> impl Iterator<Item = SchemaNode<'a>> + 'a {
        let context = self.context;
        self.compiled()
            .notifications
            .iter()
            .map(move |id| SchemaNode::from_id(context, *id))
    }

    /// Returns an iterator over all data nodes in the schema module
    /// (depth-first search algorithm).
    ///
    /// NOTE: augmentations (from other modules or from the module itself) are
    /// also iterated over.
    pub fn traverse(&self) -> impl Iterator<Item = SchemaNode<'a>> + 'a {
        let data = self.data().flat_map(|snode| snode.traverse());
        let rpcs = self.rpcs().flat_map(|snode| snode.traverse());
        let notifications =
            self.notifications().flat_map(|snode| snode.traverse());
        data.chain(rpcs).chain(notifications)
    }
}

impl<'a> Binding<'a> for SchemaModule<'a> {
    type Id = ModuleId;
    type Container = Context;

    fn from_id(context: &'a Context, id: ModuleId) -> SchemaModule<'a> {
        SchemaModule { context, id }
    }
}

impl PartialEq for SchemaModule<'_> {
    fn eq(&self, other: &SchemaModule<'_>) -> bool {
        std::ptr::eq(self.context, other.context) && self.id == other.id
    }
}

// ===== impl SchemaNode =====

impl<'a> SchemaNode<'a> {
    fn node(&self) -> &'a CNode {
        self.context.compiled().node(self.id)
    }

    /// Schema module (namespace) of the node.
    pub fn module(&self) -> SchemaModule<'a> {
        SchemaModule::from_id(self.context, self.node().module)
    }

    /// Module whose source defined the node (differs from the namespace
    /// module for augments and groupings of other modules).
    pub fn defined_in(&self) -> SchemaModule<'a> {
        SchemaModule::from_id(self.context, self.node().defined_in)
    }

    /// Returns the type of the schema node.
    pub fn kind(&self) -> SchemaNodeKind {
        self.kind
    }

    /// Schema node name.
    pub fn name(&self) -> &'a str {
        &self.node().name
    }

    /// Description statement.
    pub fn description(&self) -> Option<&'a str> {
        self.node().description.as_deref()
    }

    /// Reference statement.
    pub fn reference(&self) -> Option<&'a str> {
        self.node().reference.as_deref()
    }

    /// Line of the statement in its source.
    pub fn line(&self) -> u32 {
        self.node().line
    }

    /// Generate path of the node.
    pub fn path(&self, format: SchemaPathFormat) -> String {
        self.context.compiled().path(self.id, format)
    }

    /// Returns an iterator over the schema nodes that match the given XPath
    /// expression. Relative expressions are evaluated from this node.
    pub fn find_xpath(&self, xpath: &str) -> Result<Set<'a, SchemaNode<'a>>> {
        let xpath = if xpath.starts_with('/') {
            xpath.to_owned()
        } else {
            format!("{}/{}", self.path(SchemaPathFormat::DATA), xpath)
        };
        let ids = find_schema_nodes(self.context, &xpath, self.is_within_output())?;
        Ok(Set::new(
            ids.into_iter()
                .map(|id| SchemaNode::from_id(self.context, id))
                .collect(),
        ))
    }

    /// Get a schema node based on the given data path (JSON format).
    pub fn find_path(&self, path: &str) -> Result<SchemaNode<'a>> {
        self.find_xpath(path)?.next().ok_or_else(|| {
            self.context.sink().error(Error::not_found(format!(
                "Schema node \"{}\" not found.",
                path
            )))
        })
    }

    /// Returns whether the node is a configuration node.
    pub fn is_config(&self) -> bool {
        match self.kind {
            SchemaNodeKind::Container
            | SchemaNodeKind::Case
            | SchemaNodeKind::Choice
            | SchemaNodeKind::Leaf
            | SchemaNodeKind::LeafList
            | SchemaNodeKind::List
            | SchemaNodeKind::AnyData
            | SchemaNodeKind::AnyXml => self.node().is_config(),
            _ => false,
        }
    }

    /// Returns whether the node is a state node.
    pub fn is_state(&self) -> bool {
        match self.kind {
            SchemaNodeKind::Container
            | SchemaNodeKind::Case
            | SchemaNodeKind::Choice
            | SchemaNodeKind::Leaf
            | SchemaNodeKind::LeafList
            | SchemaNodeKind::List
            | SchemaNodeKind::AnyData
            | SchemaNodeKind::AnyXml => self.node().is_state(),
            _ => false,
        }
    }

    /// Effective status of the node.
    pub fn status(&self) -> Status {
        self.node().status
    }

    /// Returns whether the node status is set to "current".
    pub fn is_status_current(&self) -> bool {
        self.node().status == Status::Current
    }

    /// Returns whether the node status is set to "deprecated".
    pub fn is_status_deprecated(&self) -> bool {
        self.node().status == Status::Deprecated
    }

    /// Returns whether the node status is set to "obsolete".
    pub fn is_status_obsolete(&self) -> bool {
        self.node().status == Status::Obsolete
    }

    /// Returns whether the node is mandatory.
    pub fn is_mandatory(&self) -> bool {
        match self.kind {
            SchemaNodeKind::Container
            | SchemaNodeKind::Choice
            | SchemaNodeKind::Leaf
            | SchemaNodeKind::LeafList
            | SchemaNodeKind::List
            | SchemaNodeKind::AnyData
            | SchemaNodeKind::AnyXml => {
                self.node().flags.contains(NodeFlags::MANDATORY)
            }
            _ => false,
        }
    }

    /// Returns whether the node is a non-presence container.
    pub fn is_np_container(&self) -> bool {
        self.node().is_np_container()
    }

    /// Presence statement of a container.
    pub fn presence(&self) -> Option<&'a str> {
        match &self.node().kind {
            CNodeKind::Container { presence } => presence.as_deref(),
            _ => None,
        }
    }

    /// Returns whether the node is a key node.
    pub fn is_list_key(&self) -> bool {
        self.kind == SchemaNodeKind::Leaf
            && self.node().flags.contains(NodeFlags::KEY)
    }

    /// Returns whether the node is a keyless list.
    pub fn is_keyless_list(&self) -> bool {
        self.kind == SchemaNodeKind::List
            && self.node().flags.contains(NodeFlags::KEYLESS)
    }

    /// Returns whether the node is an user-ordered list or leaf-list.
    pub fn is_user_ordered(&self) -> bool {
        match self.kind {
            SchemaNodeKind::LeafList | SchemaNodeKind::List => {
                self.node().flags.contains(NodeFlags::USER_ORDERED)
            }
            _ => false,
        }
    }

    /// Returns whether the node is a schema-only node.
    pub fn is_schema_only(&self) -> bool {
        self.node().is_schema_only()
    }

    /// Returns whether the node is within an RPC/action input.
    pub fn is_within_input(&self) -> bool {
        self.within(|k| matches!(k, CNodeKind::Input))
    }

    /// Returns whether the node is within an RPC/action output.
    pub fn is_within_output(&self) -> bool {
        self.within(|k| matches!(k, CNodeKind::Output))
    }

    /// Returns whether the node is within a notification.
    pub fn is_within_notification(&self) -> bool {
        self.within(|k| matches!(k, CNodeKind::Notification))
    }

    fn within(&self, pred: impl Fn(&CNodeKind) -> bool) -> bool {
        match self.node().parent {
            Some(parent) => self.context.compiled().enclosing(parent, pred).is_some(),
            None => false,
        }
    }

    /// Returns whether a default value is set.
    pub fn has_default(&self) -> bool {
        match &self.node().kind {
            CNodeKind::Leaf { default, .. } => default.is_some(),
            CNodeKind::LeafList { defaults, .. } => !defaults.is_empty(),
            CNodeKind::Choice { default_case, .. } => default_case.is_some(),
            _ => false,
        }
    }

    /// The default value of the leaf, in canonical form.
    pub fn default_value_canonical(&self) -> Option<&'a str> {
        match &self.node().kind {
            CNodeKind::Leaf { default, .. } => {
                default.as_ref().map(|v| v.canonical.as_str())
            }
            _ => None,
        }
    }

    /// The default value of the leaf.
    pub fn default_value(&self) -> Option<DataValue> {
        match &self.node().kind {
            CNodeKind::Leaf { default, .. } => {
                default.as_ref().map(|v| v.data_value())
            }
            _ => None,
        }
    }

    /// The default values of the leaf-list, in canonical form.
    pub fn default_values_canonical(&self) -> impl Iterator<Item = &'a str> + 'a {
        let defaults: &'a [crate::value::Value] = match &self.node().kind {
            CNodeKind::LeafList { defaults, .. } => defaults,
            _ => &[],
        };
        defaults.iter().map(|v| v.canonical.as_str())
    }

    /// The default case of the choice.
    pub fn default_case(&self) -> Option<SchemaNode<'a>> {
        match &self.node().kind {
            CNodeKind::Choice { default_case, .. } => {
                SchemaNode::from_id_opt(self.context, *default_case)
            }
            _ => None,
        }
    }

    /// Resolved type of the leaf or leaf-list.
    pub fn leaf_type(&self) -> Option<SchemaLeafType<'a>> {
        self.node().leaf_type().map(|ty| SchemaLeafType {
            context: self.context,
            ty,
        })
    }

    /// Units of the leaf(-list)'s type.
    pub fn units(&self) -> Option<&'a str> {
        match &self.node().kind {
            CNodeKind::Leaf { units, .. } | CNodeKind::LeafList { units, .. } => {
                units.as_deref()
            }
            _ => None,
        }
    }

    /// The min-elements of the list or leaf-list (`None` when zero).
    pub fn min_elements(&self) -> Option<u32> {
        match &self.node().kind {
            CNodeKind::List { min, .. } | CNodeKind::LeafList { min, .. } => {
                (*min != 0).then_some(*min)
            }
            _ => None,
        }
    }

    /// The max-elements of the list or leaf-list (`None` when unbounded).
    pub fn max_elements(&self) -> Option<u32> {
        match &self.node().kind {
            CNodeKind::List { max, .. } | CNodeKind::LeafList { max, .. } => *max,
            _ => None,
        }
    }

    /// Array of must restrictions.
    pub fn musts(&self) -> impl Iterator<Item = SchemaStmtMust<'a>> + 'a {
        self.node().musts.iter().map(|inner| SchemaStmtMust { inner })
    }

    /// Array of when statements.
    pub fn whens(&self) -> impl Iterator<Item = SchemaStmtWhen<'a>> + 'a {
        self.node()
            .whens
            .iter()
            .map(|inner| SchemaStmtWhen { inner: inner.as_ref() })
    }

    /// Unique statements of a list, each as a list of descendant paths.
    pub fn uniques(&self) -> impl Iterator<Item = Vec<SchemaNode<'a>>> + 'a {
        let context = self.context;
        let uniques: &'a [Vec<SchemaId>] = match &self.node().kind {
            CNodeKind::List { uniques, .. } => uniques,
            _ => &[],
        };
        uniques.iter().map(move |unique| {
            unique
                .iter()
                .map(|id| SchemaNode::from_id(context, *id))
                .collect()
        })
    }

    /// Extension instances of the node.
    pub fn extensions(&self) -> impl Iterator<Item = SchemaExtInstance<'a>> + 'a {
        let context = self.context;
        self.node()
            .exts
            .iter()
            .map(move |inner| SchemaExtInstance { context, inner })
    }

    /// Returns an iterator over all actions of the node.
    pub fn actions(&self) -> impl Iterator<Item = SchemaNode<'a>> + 'a {
        let context = self.context;
        self.node()
            .actions
            .iter()
            .map(move |id| SchemaNode::from_id(context, *id))
    }

    /// Returns an iterator over all notifications of the node.
    pub fn notifications(&self) -> impl Iterator<Item = SchemaNode<'a>> + 'a {
        let context = self.context;
        self.node()
            .notifications
            .iter()
            .map(move |id| SchemaNode::from_id(context, *id))
    }

    /// Input of an RPC or action.
    pub fn input(&self) -> Option<SchemaNode<'a>> {
        self.children().find(|c| c.kind == SchemaNodeKind::Input)
    }

    /// Output of an RPC or action.
    pub fn output(&self) -> Option<SchemaNode<'a>> {
        self.children().find(|c| c.kind == SchemaNodeKind::Output)
    }

    /// Returns an iterator over the ancestor schema nodes.
    pub fn ancestors(&self) -> Ancestors<'a, SchemaNode<'a>> {
        let parent = self.parent();
        Ancestors::new(parent)
    }

    /// Returns an iterator over this schema node and its ancestors.
    pub fn inclusive_ancestors(&self) -> Ancestors<'a, SchemaNode<'a>> {
        Ancestors::new(Some(self.clone()))
    }

    /// Returns an iterator over the sibling schema nodes.
    pub fn siblings(&self) -> Siblings<'a, SchemaNode<'a>> {
        let sibling = self.next_sibling();
        Siblings::new(sibling)
    }

    /// Returns an iterator over this schema node and its siblings.
    pub fn inclusive_siblings(&self) -> Siblings<'a, SchemaNode<'a>> {
        Siblings::new(Some(self.clone()))
    }

    /// Returns an iterator over the child schema nodes.
    pub fn children(&self) -> Siblings<'a, SchemaNode<'a>> {
        let child = self.first_child();
        Siblings::new(child)
    }

    /// Returns an iterator over all child nodes, actions and notifications.
    pub fn all_children(&self) -> impl Iterator<Item = SchemaNode<'a>> + 'a {
        self.children()
            .chain(self.actions())
            .chain(self.notifications())
    }

    /// Returns an iterator over all elements in the schema tree (depth-first
    /// search algorithm).
    pub fn traverse(&self) -> Traverse<'a, SchemaNode<'a>> {
        Traverse::new(self.clone())
    }

    /// Returns an iterator over the keys of the list.
    pub fn list_keys(&self) -> impl Iterator<Item = SchemaNode<'a>> + 'a {
        let context = self.context;
        self.node()
            .list_keys()
            .iter()
            .map(move |id| SchemaNode::from_id(context, *id))
    }
}

impl<'a> Binding<'a> for SchemaNode<'a> {
    type Id = SchemaId;
    type Container = Context;

    fn from_id(context: &'a Context, id: SchemaId) -> SchemaNode<'a> {
        let kind = match context.compiled().node(id).kind {
            CNodeKind::Container { .. } => SchemaNodeKind::Container,
            CNodeKind::Case => SchemaNodeKind::Case,
            CNodeKind::Choice { .. } => SchemaNodeKind::Choice,
            CNodeKind::Leaf { .. } => SchemaNodeKind::Leaf,
            CNodeKind::LeafList { .. } => SchemaNodeKind::LeafList,
            CNodeKind::List { .. } => SchemaNodeKind::List,
            CNodeKind::AnyData => SchemaNodeKind::AnyData,
            CNodeKind::AnyXml => SchemaNodeKind::AnyXml,
            CNodeKind::Rpc => SchemaNodeKind::Rpc,
            CNodeKind::Input => SchemaNodeKind::Input,
            CNodeKind::Output => SchemaNodeKind::Output,
            CNodeKind::Action => SchemaNodeKind::Action,
            CNodeKind::Notification => SchemaNodeKind::Notification,
        };
        SchemaNode { context, id, kind }
    }
}

impl<'a> NodeIterable<'a> for SchemaNode<'a> {
    fn parent(&self) -> Option<SchemaNode<'a>> {
        SchemaNode::from_id_opt(self.context, self.node().parent)
    }

    fn next_sibling(&self) -> Option<SchemaNode<'a>> {
        SchemaNode::from_id_opt(self.context, self.node().next)
    }

    fn first_child(&self) -> Option<SchemaNode<'a>> {
        SchemaNode::from_id_opt(self.context, self.node().children.first().copied())
    }
}

impl PartialEq for SchemaNode<'_> {
    fn eq(&self, other: &SchemaNode<'_>) -> bool {
        std::ptr::eq(self.context, other.context) && self.id == other.id
    }
}

/// Schema nodes selected by an absolute path (module names as prefixes).
pub(crate) fn find_schema_nodes(
    context: &Context,
    path: &str,
    output: bool,
) -> Result<Vec<SchemaId>> {
    let schema = context.compiled();
    let resolver = |prefix: &str| schema.module_by_name(prefix);
    let expr = xpath::parse(path, &resolver).map_err(|err| context.sink().error(err))?;
    xpath::schema::find_nodes(schema, &expr, output).map_err(|err| context.sink().error(err))
}

// ===== impl SchemaNodeKind =====

impl SchemaNodeKind {
    /// YANG keyword of the node kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaNodeKind::Container => "container",
            SchemaNodeKind::Case => "case",
            SchemaNodeKind::Choice => "choice",
            SchemaNodeKind::Leaf => "leaf",
            SchemaNodeKind::LeafList => "leaf-list",
            SchemaNodeKind::List => "list",
            SchemaNodeKind::AnyData => "anydata",
            SchemaNodeKind::AnyXml => "anyxml",
            SchemaNodeKind::Rpc => "rpc",
            SchemaNodeKind::Input => "input",
            SchemaNodeKind::Output => "output",
            SchemaNodeKind::Action => "action",
            SchemaNodeKind::Notification => "notification",
        }
    }
}

impl std::fmt::Display for SchemaNodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== impl SchemaStmtMust =====

impl<'a> SchemaStmtMust<'a> {
    /// The XPath condition.
    pub fn condition(&self) -> &'a str {
        &self.inner.text
    }

    /// description substatement.
    pub fn description(&self) -> Option<&'a str> {
        self.inner.description.as_deref()
    }

    /// reference substatement.
    pub fn reference(&self) -> Option<&'a str> {
        self.inner.reference.as_deref()
    }

    /// error-message substatement.
    pub fn error_msg(&self) -> Option<&'a str> {
        self.inner.error_message.as_deref()
    }

    /// error-app-tag substatement.
    pub fn error_apptag(&self) -> Option<&'a str> {
        self.inner.error_app_tag.as_deref()
    }
}

// ===== impl SchemaStmtWhen =====

impl<'a> SchemaStmtWhen<'a> {
    /// The XPath condition.
    pub fn condition(&self) -> &'a str {
        &self.inner.text
    }

    /// description substatement.
    pub fn description(&self) -> Option<&'a str> {
        self.inner.description.as_deref()
    }

    /// reference substatement.
    pub fn reference(&self) -> Option<&'a str> {
        self.inner.reference.as_deref()
    }
}

// ===== impl SchemaLeafType =====

impl<'a> SchemaLeafType<'a> {
    /// Returns the resolved base type.
    pub fn base_type(&self) -> DataValueType {
        self.ty.base
    }

    /// Returns the typedef name if it's defined.
    pub fn typedef_name(&self) -> Option<&'a str> {
        self.ty.typedef_name.as_deref()
    }

    /// Returns the real type of the leafref, corresponding to the first
    /// non-leafref in a possible chain of leafrefs.
    pub fn leafref_real_type(&self) -> Option<SchemaLeafType<'a>> {
        let leafref = self.ty.leafref.as_ref()?;
        let realtype = leafref.realtype.as_ref()?;
        Some(SchemaLeafType {
            context: self.context,
            ty: realtype.resolved(),
        })
    }

    /// Path of a leafref type.
    pub fn leafref_path(&self) -> Option<&'a str> {
        self.ty.leafref.as_ref().map(|l| &*l.path)
    }

    /// Target of a leafref type.
    pub fn leafref_target(&self) -> Option<SchemaNode<'a>> {
        let target = self.ty.leafref.as_ref()?.target;
        SchemaNode::from_id_opt(self.context, target)
    }

    /// require-instance of leafref and instance-identifier types.
    pub fn require_instance(&self) -> bool {
        self.ty.require_instance
    }

    /// Fraction digits of a decimal64 type.
    pub fn fraction_digits(&self) -> Option<u8> {
        (self.ty.base == DataValueType::Dec64).then_some(self.ty.fraction_digits)
    }

    /// Range statements along the typedef chain, as written.
    pub fn range(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.ty.range_text.iter().map(|r| &**r)
    }

    /// Length statements along the typedef chain, as written.
    pub fn length(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.ty.length_text.iter().map(|r| &**r)
    }

    /// Patterns with their invert-match flag.
    pub fn patterns(&self) -> impl Iterator<Item = (&'a str, bool)> + 'a {
        self.ty.patterns.iter().map(|p| (&*p.text, p.invert))
    }

    /// Enums of an enumeration type.
    pub fn enums(&self) -> impl Iterator<Item = SchemaEnum<'a>> + 'a {
        self.ty.enums.iter().map(|inner| SchemaEnum { inner })
    }

    /// Bits of a bits type.
    pub fn bits(&self) -> impl Iterator<Item = SchemaEnum<'a>> + 'a {
        self.ty.bits.iter().map(|inner| SchemaEnum { inner })
    }

    /// Base identities of an identityref type, as `module:name`.
    pub fn bases(&self) -> impl Iterator<Item = String> + 'a {
        let schema = self.context.compiled();
        self.ty.bases.iter().map(move |id| {
            let identity = schema.identity(*id);
            format!("{}:{}", schema.module(identity.module).name, identity.name)
        })
    }

    /// Member types of a union.
    pub fn union_types(&self) -> impl Iterator<Item = SchemaLeafType<'a>> + 'a {
        let context = self.context;
        self.ty
            .union
            .iter()
            .map(move |ty| SchemaLeafType { context, ty: ty.as_ref() })
    }
}

// ===== impl SchemaEnum =====

impl<'a> SchemaEnum<'a> {
    pub fn name(&self) -> &'a str {
        &self.inner.name
    }

    /// Value of an enum, position of a bit.
    pub fn value(&self) -> i64 {
        self.inner.value
    }

    pub fn status(&self) -> Status {
        self.inner.status
    }

    pub fn description(&self) -> Option<&'a str> {
        self.inner.description.as_deref()
    }
}

// ===== impl SchemaIdentity =====

impl<'a> SchemaIdentity<'a> {
    fn inner(&self) -> &'a CIdentity {
        self.context.compiled().identity(self.id)
    }

    pub fn name(&self) -> &'a str {
        &self.inner().name
    }

    /// Module defining the identity.
    pub fn module(&self) -> SchemaModule<'a> {
        SchemaModule::from_id(self.context, self.inner().module)
    }

    pub fn status(&self) -> Status {
        self.inner().status
    }

    pub fn description(&self) -> Option<&'a str> {
        self.inner().description.as_deref()
    }

    pub fn reference(&self) -> Option<&'a str> {
        self.inner().reference.as_deref()
    }

    /// Whether the identity's if-features are enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner().enabled
    }

    /// Direct base identities.
    pub fn bases(&self) -> impl Iterator<Item = SchemaIdentity<'a>> + 'a {
        let context = self.context;
        self.inner()
            .bases
            .iter()
            .map(move |id| SchemaIdentity { context, id: *id })
    }

    /// Identities directly derived from this one.
    pub fn derived(&self) -> impl Iterator<Item = SchemaIdentity<'a>> + 'a {
        let context = self.context;
        self.inner()
            .derived
            .iter()
            .map(move |id| SchemaIdentity { context, id: *id })
    }
}

impl PartialEq for SchemaIdentity<'_> {
    fn eq(&self, other: &SchemaIdentity<'_>) -> bool {
        std::ptr::eq(self.context, other.context) && self.id == other.id
    }
}

// ===== impl SchemaExtInstance =====

impl<'a> SchemaExtInstance<'a> {
    /// Name of the module defining the extension.
    pub fn module(&self) -> &'a str {
        &self.context.compiled().module(self.inner.module).name
    }

    pub fn name(&self) -> &'a str {
        &self.inner.name
    }

    pub fn argument(&self) -> Option<&'a str> {
        self.inner.arg.as_deref()
    }

    /// Data stored by an extension plugin at compile time.
    pub fn data(&self) -> Option<&'a crate::extension::ExtensionData> {
        self.inner.data.as_ref()
    }
}

// ===== impl DataValueType =====

impl DataValueType {
    /// YANG name of the built-in type.
    pub fn as_str(&self) -> &'static str {
        crate::compiler::types::base_name(*self)
    }
}

impl std::fmt::Display for DataValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Status::Current => "current",
            Status::Deprecated => "deprecated",
            Status::Obsolete => "obsolete",
        })
    }
}
