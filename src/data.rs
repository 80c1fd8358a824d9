//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG instance data.
//!
//! A data tree owns its nodes in an arena. Nodes are linked into an ordered
//! tree (parent, first child, previous and next sibling) and siblings are
//! kept in schema order, instances of the same schema node being contiguous.

mod diff;
mod json;
mod lyb;
mod merge;
pub(crate) mod path;
mod validate;
mod xml;

use bitflags::bitflags;
use std::io::{Read, Write};

use crate::compiled::{CNodeKind, CompiledSchema, NodeFlags};
use crate::context::Context;
use crate::error::{Error, ErrorCode, Result};
use crate::ids::{DataId, SchemaId};
use crate::iter::{Ancestors, MetadataList, NodeIterable, Set, Siblings, Traverse};
use crate::schema::{DataValue, SchemaModule, SchemaNode};
use crate::utils::Binding;
use crate::value::{self, PrefixFormat, Value, ValueCtx};
use crate::xpath::eval::{self, XNode, XValue};

/// YANG data tree.
#[derive(Clone)]
pub struct DataTree<'a> {
    context: &'a Context,
    pub(crate) nodes: Vec<DNode>,
    free: Vec<DataId>,
    pub(crate) first: Option<DataId>,
}

/// YANG data node reference.
#[derive(Clone, Copy)]
pub struct DataNodeRef<'a, 'b> {
    tree: &'a DataTree<'b>,
    id: DataId,
}

/// Mutable handle to a position of a data tree: either a data node or the
/// top level of the tree.
pub struct DataNodeMut<'a, 'b> {
    tree: &'a mut DataTree<'b>,
    id: Option<DataId>,
}

/// The structure provides information about metadata of a data element. Such
/// attributes must map to annotations as specified in RFC 7952. The only
/// exception is the filter type (in NETCONF get operations) and edit-config's
/// operation attributes. In XML, they are represented as standard XML
/// attributes. In JSON, they are represented as JSON elements starting with the
/// '@' character (for more information, see the YANG metadata RFC).
#[derive(Clone, Debug, PartialEq)]
pub struct Metadata<'a> {
    module: &'a str,
    name: &'a str,
    value: &'a str,
}

/// YANG data tree diff.
#[derive(Clone, Debug)]
pub struct DataDiff<'a> {
    tree: DataTree<'a>,
}

/// YANG data diff operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DataDiffOp {
    Create,
    Delete,
    Replace,
}

/// Data input/output formats.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DataFormat {
    /// XML instance data format.
    XML,
    /// JSON instance data format.
    JSON,
    /// LYB instance data format.
    LYB,
}

/// Data operation type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DataOperation {
    /// Generic YANG instance data.
    Data,
    /// Instance of a YANG RPC/action request with only "input" data children.
    /// Including all parents in case of an action
    RpcYang,
    /// Instance of a YANG notification, including all parents in case of a
    /// nested one.
    NotificationYang,
    /// Instance of a YANG RPC/action reply with only "output" data children.
    /// Including all parents in case of an action
    ReplyYang,
}

bitflags! {
    /// Data parser options.
    ///
    /// Various options to change the data tree parsers behavior.
    ///
    /// Default parser behavior:
    /// - complete input file is always parsed. In case of XML, even not
    ///   well-formed XML document (multiple top-level elements) is parsed in
    ///   its entirety.
    /// - parser silently ignores data without matching schema node definition.
    /// - list instances are checked whether they have all the keys, error is
    ///   raised if not.
    ///
    /// Default parser validation behavior:
    /// - the provided data are expected to provide complete datastore content
    ///   (both the configuration and state data) and performs data validation
    ///   according to all YANG rules, specifics follow.
    /// - instantiated (status) obsolete data print a warning.
    /// - all types are fully resolved (leafref/instance-identifier targets,
    ///   unions) and must be valid (lists have all the keys, leaf(-lists)
    ///   correct values).
    /// - when statements on existing nodes are evaluated, if not satisfied, a
    ///   validation error is raised.
    /// - invalid multiple data instances/data from several cases cause a
    ///   validation error.
    /// - implicit nodes (NP containers and default values) are added.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataParserFlags: u32 {
        /// Data will be only parsed and no validation will be performed. When
        /// statements are kept unevaluated, leafref targets are not checked
        /// and default values are not added (only the ones parsed are
        /// present).
        const NO_VALIDATION = 0x01;
        /// Instead of silently ignoring data without schema definition raise an
        /// error.
        const STRICT = 0x02;
        /// Instead of silently ignoring data without definition, parse them
        /// into opaque nodes.
        const OPAQ = 0x04;
        /// Forbid state data in the parsed data.
        const NO_STATE = 0x08;
        /// Only for LYB format, allow parsing data printed using a specific
        /// module revision to be loaded even with a module with the same name
        /// but newer revision.
        const LYB_MOD_UPDATE = 0x10;
    }
}

bitflags! {
    /// Data validation options.
    ///
    /// Various options to change data validation behaviour, both for the parser
    /// and separate validation.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataValidationFlags: u32 {
        /// Consider state data not allowed and raise an error if they are found.
        const NO_STATE = 0x01;
        /// Validate only modules whose data actually exist.
        const PRESENT = 0x02;
    }
}

bitflags! {
    /// Data printer flags.
    ///
    /// Various options to change the output of the data printers.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataPrinterFlags: u32 {
        /// Flag for printing also the (following) sibling nodes of the data
        /// node.
        const WITH_SIBLINGS = 0x01;
        /// Flag for output without indentation and formatting new lines.
        const SHRINK = 0x02;
        /// Preserve empty non-presence containers.
        const KEEP_EMPTY_CONT = 0x04;
        /// Explicit with-defaults mode. Only the data explicitly being present
        /// in the data tree are printed, so the implicitly added default nodes
        /// are not printed. Note that this is the default value when no WD
        /// option is specified.
        const WD_EXPLICIT = 0x00;
        /// Trim mode avoids printing the nodes with the value equal to their
        /// default value.
        const WD_TRIM = 0x10;
        /// Include implicit default nodes, adding the missing ones.
        const WD_ALL = 0x20;
    }
}

bitflags! {
    /// Implicit node creation options.
    ///
    /// Default behavior:
    /// - both configuration and state missing implicit nodes are added.
    /// - for existing RPC/action nodes, input implicit nodes are added.
    /// - all implicit node types are added (non-presence containers,
    ///   default leaves, and default leaf-lists).
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataImplicitFlags: u32 {
        /// Do not add any implicit state nodes.
        const NO_STATE = 0x01;
        /// Do not add any implicit config nodes.
        const NO_CONFIG = 0x02;
        /// For RPC/action nodes, add output implicit nodes instead of input.
        const OUTPUT = 0x04;
        /// Do not add any default nodes (leaves/leaf-lists), only non-presence
        /// containers.
        const NO_DEFAULTS = 0x08;
    }
}

bitflags! {
    /// Path-based node creation options.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataNewPathFlags: u32 {
        /// If the target node exists and is a leaf, it is updated with the new
        /// value instead of failing.
        const UPDATE = 0x01;
        /// Interpret RPC/action children as output instead of input.
        const OUTPUT = 0x02;
        /// Create opaque nodes for path segments (and values) without a
        /// matching schema definition.
        const OPAQ = 0x04;
    }
}

bitflags! {
    /// Data merge options.
    ///
    /// Default behavior:
    /// - source data tree is not modified in any way,
    /// - any default nodes in source are ignored if there are explicit nodes
    ///   in target.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataMergeFlags: u16 {
        /// Default nodes in the source tree replace even explicit nodes in
        /// the target.
        const DEFAULTS = 0x01;
    }
}

bitflags! {
    /// Data diff options.
    ///
    /// Default behavior:
    /// - Any default nodes are treated as non-existent and ignored.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataDiffFlags: u16 {
        /// Default nodes in the trees are not ignored but treated similarly to
        /// explicit nodes. Also, leaves and leaf-lists are added into diff even
        /// in case only their default flag (state) was changed.
        const DEFAULTS = 0x01;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub(crate) struct DataFlags: u8 {
        /// Implicit node (default value or non-presence container).
        const DEFAULT = 0x01;
    }
}

#[derive(Clone, Debug)]
pub(crate) struct DNode {
    /// `None` for opaque nodes.
    pub schema: Option<SchemaId>,
    pub parent: Option<DataId>,
    pub first_child: Option<DataId>,
    pub prev: Option<DataId>,
    pub next: Option<DataId>,
    pub content: Content,
    pub meta: Vec<Meta>,
    pub flags: DataFlags,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Content {
    /// Container, list entry, RPC, action or notification.
    Inner,
    Term(Value),
    Any(Option<serde_json::Value>),
    /// Node without a schema definition.
    Opaque {
        name: String,
        module: Option<String>,
        value: Option<String>,
    },
}

/// Metadata instance (RFC 7952 annotation).
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Meta {
    pub module: String,
    pub name: String,
    pub value: String,
}

/// Methods common to data trees, data node references and data diffs.
pub trait Data<'a> {
    #[doc(hidden)]
    fn context(&self) -> &'a Context {
        self.tree().context
    }

    #[doc(hidden)]
    fn tree(&self) -> &DataTree<'a>;

    #[doc(hidden)]
    fn id(&self) -> Option<DataId>;

    /// Search in the given data for instances of nodes matching the provided
    /// XPath.
    ///
    /// The expected format of the expression is JSON, meaning the first node in
    /// every path must have its module name as prefix or be the special `*`
    /// value for all the nodes. Unprefixed names match nodes of any module.
    fn find_xpath(&self, xpath: &str) -> Result<Set<'_, DataNodeRef<'_, 'a>>> {
        let tree = self.tree();
        let context = self.context();
        let schema = context.compiled();
        let expr = crate::xpath::parse(xpath, &|prefix| schema.module_by_name(prefix))
            .map_err(|err| context.sink().error(err))?;
        let start = match self.id() {
            Some(id) => XNode::Node(id),
            None => XNode::Root,
        };
        let value = eval::evaluate(tree, &expr, start, None)
            .map_err(|err| context.sink().error(err))?;
        let nodes = match value {
            XValue::Nodes(nodes) => nodes
                .into_iter()
                .filter_map(|node| match node {
                    XNode::Node(id) => Some(DataNodeRef::from_id(tree, id)),
                    XNode::Root => None,
                })
                .collect(),
            _ => {
                return Err(context.sink().error(Error::new(
                    ErrorCode::Validation,
                    format!("XPath \"{}\" does not evaluate to a node set.", xpath),
                )))
            }
        };
        Ok(Set::new(nodes))
    }

    /// Search in the given data for a single node matching the provided path.
    ///
    /// The expected format of the expression is JSON, meaning the first node in
    /// every path must have its module name as prefix. Lists are selected by
    /// all their keys (`list[key1='val1'][key2='val2']`), leaf-list
    /// instances by value (`leaf-list[.='val']`).
    fn find_path(&self, path: &str) -> Result<DataNodeRef<'_, 'a>> {
        let tree = self.tree();
        let context = self.context();
        let id = path::find(tree, self.id(), path, false)
            .map_err(|err| context.sink().error(err))?;
        match id {
            Some(id) => Ok(DataNodeRef::from_id(tree, id)),
            None => Err(context.sink().error(Error::not_found(format!(
                "Data node \"{}\" not found.",
                path
            )))),
        }
    }

    /// Print data tree in the specified format.
    fn print_file<W: Write>(
        &self,
        mut writer: W,
        format: DataFormat,
        options: DataPrinterFlags,
    ) -> Result<()> {
        let bytes = self.print_bytes(format, options)?;
        writer.write_all(&bytes).map_err(|err| {
            self.context()
                .sink()
                .error(Error::new(ErrorCode::Native, format!("Failed to write data: {}", err)))
        })
    }

    /// Print data tree in the specified format to a `String`.
    ///
    /// # Warning
    /// For printing a data tree in the `DataFormat::LYB` format, use the
    /// [`Data::print_bytes`] method instead. Using this function with
    /// `DataFormat::LYB` may result in mangled data because the `LYB` format
    /// can contain invalid UTF-8 sequences, which cannot be represented in a
    /// `String`.
    fn print_string(
        &self,
        format: DataFormat,
        options: DataPrinterFlags,
    ) -> Result<String> {
        let bytes = self.print_bytes(format, options)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Print data tree in the specified format to a bytes vector.
    fn print_bytes(
        &self,
        format: DataFormat,
        options: DataPrinterFlags,
    ) -> Result<Vec<u8>> {
        let tree = self.tree();

        // The "report-all" mode prints a copy completed with all the
        // implicit nodes. Arena copies keep node identifiers.
        let completed;
        let tree = if options.contains(DataPrinterFlags::WD_ALL) {
            let mut copy = tree.clone();
            validate::add_implicit(&mut copy, None, DataImplicitFlags::empty(), true)
                .map_err(|err| self.context().sink().error(err))?;
            completed = copy;
            &completed
        } else {
            tree
        };
        let start = match self.id() {
            Some(id) => vec![id],
            None => tree.children(None).into_iter().take(1).collect(),
        };
        let siblings = options.contains(DataPrinterFlags::WITH_SIBLINGS);
        let roots = match (siblings, start.first()) {
            (true, Some(first)) => {
                let parent = tree.node(*first).parent;
                tree.children(parent)
                    .into_iter()
                    .skip_while(|id| id != first)
                    .collect()
            }
            _ => start,
        };

        let printed = match format {
            DataFormat::JSON => json::print(tree, &roots, options).into_bytes(),
            DataFormat::XML => xml::print(tree, &roots, options).into_bytes(),
            DataFormat::LYB => lyb::print(tree, &roots),
        };
        Ok(printed)
    }
}

// ===== impl DNode =====

impl DNode {
    pub(crate) fn new(schema: Option<SchemaId>, content: Content) -> DNode {
        DNode {
            schema,
            parent: None,
            first_child: None,
            prev: None,
            next: None,
            content,
            meta: Vec::new(),
            flags: DataFlags::empty(),
        }
    }

    pub(crate) fn value(&self) -> Option<&Value> {
        match &self.content {
            Content::Term(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn is_default(&self) -> bool {
        self.flags.contains(DataFlags::DEFAULT)
    }
}

// ===== impl DataTree =====

impl<'a> DataTree<'a> {
    /// Create new empty data tree.
    pub fn new(context: &'a Context) -> DataTree<'a> {
        DataTree {
            context,
            nodes: Vec::new(),
            free: Vec::new(),
            first: None,
        }
    }

    /// Parse (and validate) input data as a YANG data tree.
    pub fn parse_file<R: Read>(
        context: &'a Context,
        mut reader: R,
        format: DataFormat,
        parser_options: DataParserFlags,
        validation_options: DataValidationFlags,
    ) -> Result<DataTree<'a>> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).map_err(|err| {
            context
                .sink()
                .error(Error::new(ErrorCode::Native, format!("Failed to read data: {}", err)))
        })?;
        DataTree::parse_string(
            context,
            data,
            format,
            parser_options,
            validation_options,
        )
    }

    /// Parse (and validate) input data as a YANG data tree.
    pub fn parse_string(
        context: &'a Context,
        data: impl AsRef<[u8]>,
        format: DataFormat,
        parser_options: DataParserFlags,
        validation_options: DataValidationFlags,
    ) -> Result<DataTree<'a>> {
        let mut tree = DataTree::new(context);
        tree.parse_into(data.as_ref(), format, parser_options, DataOperation::Data)
            .map_err(|err| context.sink().error(err))?;
        if !parser_options.contains(DataParserFlags::NO_VALIDATION) {
            let mut options = validation_options;
            if parser_options.contains(DataParserFlags::NO_STATE) {
                options |= DataValidationFlags::NO_STATE;
            }
            validate::validate(&mut tree, options)
                .map_err(|err| context.sink().error(err))?;
        }
        Ok(tree)
    }

    /// Parse YANG data into an operation data tree.
    pub fn parse_op_string(
        context: &'a Context,
        data: impl AsRef<[u8]>,
        format: DataFormat,
        op: DataOperation,
    ) -> Result<DataTree<'a>> {
        let mut tree = DataTree::new(context);
        tree.parse_into(data.as_ref(), format, DataParserFlags::empty(), op)
            .map_err(|err| context.sink().error(err))?;
        if op != DataOperation::Data {
            validate::validate_op(&mut tree, op)
                .map_err(|err| context.sink().error(err))?;
        }
        Ok(tree)
    }

    fn parse_into(
        &mut self,
        data: &[u8],
        format: DataFormat,
        options: DataParserFlags,
        op: DataOperation,
    ) -> Result<()> {
        match format {
            DataFormat::JSON => json::parse(self, data, options, op),
            DataFormat::XML => xml::parse(self, data, options, op),
            DataFormat::LYB => lyb::parse(self, data, options),
        }
    }

    /// Returns a reference to the fist top-level data node, unless the data
    /// tree is empty.
    pub fn reference<'b>(&'b self) -> Option<DataNodeRef<'b, 'a>> {
        DataNodeRef::from_id_opt(self, self.first)
    }

    /// Mutable handle to the top level of the data tree.
    pub fn root_mut<'b>(&'b mut self) -> DataNodeMut<'b, 'a> {
        DataNodeMut {
            tree: self,
            id: None,
        }
    }

    /// Mutable handle to the node at the given data path.
    pub fn find_path_mut<'b>(&'b mut self, path: &str) -> Result<DataNodeMut<'b, 'a>> {
        let context = self.context;
        let id = path::find(self, None, path, false)
            .map_err(|err| context.sink().error(err))?
            .ok_or_else(|| {
                context.sink().error(Error::not_found(format!(
                    "Data node \"{}\" not found.",
                    path
                )))
            })?;
        Ok(DataNodeMut {
            tree: self,
            id: Some(id),
        })
    }

    /// Create a new node or modify existing one in the data tree based on a
    /// path.
    ///
    /// If path points to a list key and the list instance does not exist,
    /// the key value from the predicate is used and value is ignored. Also,
    /// if a leaf-list is being created and both a predicate is defined in
    /// path and value is set, the predicate is preferred.
    ///
    /// For key-less lists and state leaf-lists, positional predicates can be
    /// used. If no preciate is used for these nodes, they are always created.
    ///
    /// The output parameter can be used to change the behavior to ignore
    /// RPC/action input schema nodes and use only output ones.
    ///
    /// Returns the last created or modified node (if any). Writing the value
    /// a leaf already has is a no-op that returns the existing leaf.
    pub fn new_path(
        &mut self,
        path: &str,
        value: Option<&str>,
        output: bool,
    ) -> Result<Option<DataNodeRef<'_, 'a>>> {
        let mut options = DataNewPathFlags::UPDATE;
        if output {
            options |= DataNewPathFlags::OUTPUT;
        }
        self.new_path2(path, value, options)
    }

    /// Same as [`DataTree::new_path`] with explicit creation options. All
    /// nodes created by a failing call are removed again.
    pub fn new_path2(
        &mut self,
        path: &str,
        value: Option<&str>,
        options: DataNewPathFlags,
    ) -> Result<Option<DataNodeRef<'_, 'a>>> {
        let context = self.context;
        let id = path::create(self, None, path, value, options)
            .map_err(|err| context.sink().error(err))?;
        Ok(DataNodeRef::from_id_opt(self, id))
    }

    /// Remove a data node.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let context = self.context;
        let id = path::find(self, None, path, false)
            .map_err(|err| context.sink().error(err))?
            .ok_or_else(|| {
                context.sink().error(Error::not_found(format!(
                    "Data node \"{}\" not found.",
                    path
                )))
            })?;
        self.free_subtree(id);
        Ok(())
    }

    /// Fully validate the data tree.
    pub fn validate(&mut self, options: DataValidationFlags) -> Result<()> {
        let context = self.context;
        validate::validate(self, options).map_err(|err| context.sink().error(err))
    }

    /// Create a copy of the data tree.
    pub fn duplicate(&self) -> Result<DataTree<'a>> {
        let mut dup = DataTree::new(self.context);
        let mut sibling = self.first;
        while let Some(id) = sibling {
            dup.copy_subtree(self, id, None);
            sibling = self.node(id).next;
        }
        Ok(dup)
    }

    /// Merge the source data tree into the target data tree. Merge may not be
    /// complete until validation is called on the resulting data tree (data
    /// from more cases may be present, default and non-default values).
    pub fn merge(&mut self, source: &DataTree<'a>) -> Result<()> {
        self.merge_with_flags(source, DataMergeFlags::empty())
    }

    /// Merge with explicit options.
    pub fn merge_with_flags(
        &mut self,
        source: &DataTree<'a>,
        options: DataMergeFlags,
    ) -> Result<()> {
        let context = self.context;
        merge::merge(self, source, options).map_err(|err| context.sink().error(err))
    }

    /// Merge the source data tree into the target data tree, consuming the
    /// source.
    pub fn merge_destruct(&mut self, source: DataTree<'a>) -> Result<()> {
        self.merge_with_flags(&source, DataMergeFlags::empty())
    }

    /// Add any missing implicit nodes. Default nodes with a false "when" are
    /// not added.
    pub fn add_implicit(&mut self, options: DataImplicitFlags) -> Result<()> {
        let context = self.context;
        validate::add_implicit(self, None, options, true)
            .map_err(|err| context.sink().error(err))
    }

    /// Learn the differences between 2 data trees.
    ///
    /// The resulting diff is represented as a data tree with specific metadata
    /// from the internal 'yang' module. Most importantly, every node has an
    /// effective 'operation' metadata. If there is none defined on the
    /// node, it inherits the operation from the nearest parent. Top-level nodes
    /// must always have the 'operation' metadata defined. Replaced values
    /// keep the value of the first tree in the 'orig-value' metadata.
    pub fn diff(
        &self,
        dtree: &DataTree<'a>,
        options: DataDiffFlags,
    ) -> Result<DataDiff<'a>> {
        let context = self.context;
        let tree = diff::diff(self, dtree, options).map_err(|err| context.sink().error(err))?;
        Ok(DataDiff { tree })
    }

    /// Apply the whole diff tree on the data tree.
    pub fn diff_apply(&mut self, diff: &DataDiff<'a>) -> Result<()> {
        let context = self.context;
        diff::apply(self, &diff.tree).map_err(|err| context.sink().error(err))
    }

    /// Returns an iterator over all elements in the data tree and its sibling
    /// trees (depth-first search algorithm).
    pub fn traverse<'b>(&'b self) -> impl Iterator<Item = DataNodeRef<'b, 'a>> {
        let top = Siblings::new(self.reference());
        top.flat_map(|dnode| dnode.traverse())
    }

    // ----- arena -----

    pub(crate) fn context_ref(&self) -> &'a Context {
        self.context
    }

    pub(crate) fn schema(&self) -> &'a CompiledSchema {
        self.context.compiled()
    }

    pub(crate) fn node(&self, id: DataId) -> &DNode {
        &self.nodes[id.to_index()]
    }

    pub(crate) fn node_mut(&mut self, id: DataId) -> &mut DNode {
        &mut self.nodes[id.to_index()]
    }

    pub(crate) fn alloc(&mut self, schema: Option<SchemaId>, content: Content) -> DataId {
        let node = DNode::new(schema, content);
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.to_index()] = node;
                id
            }
            None => {
                self.nodes.push(node);
                DataId::from_index(self.nodes.len() - 1)
            }
        }
    }

    pub(crate) fn first_child(&self, parent: Option<DataId>) -> Option<DataId> {
        match parent {
            Some(parent) => self.node(parent).first_child,
            None => self.first,
        }
    }

    fn set_first_child(&mut self, parent: Option<DataId>, child: Option<DataId>) {
        match parent {
            Some(parent) => self.node_mut(parent).first_child = child,
            None => self.first = child,
        }
    }

    /// Children of a node (top-level nodes for `None`).
    pub(crate) fn children(&self, parent: Option<DataId>) -> Vec<DataId> {
        let mut out = Vec::new();
        let mut child = self.first_child(parent);
        while let Some(id) = child {
            out.push(id);
            child = self.node(id).next;
        }
        out
    }

    /// Instances of a schema node among the children of `parent`.
    pub(crate) fn instances(&self, parent: Option<DataId>, schema: SchemaId) -> Vec<DataId> {
        self.children(parent)
            .into_iter()
            .filter(|id| self.node(*id).schema == Some(schema))
            .collect()
    }

    pub(crate) fn find_child(&self, parent: Option<DataId>, schema: SchemaId) -> Option<DataId> {
        let mut child = self.first_child(parent);
        while let Some(id) = child {
            if self.node(id).schema == Some(schema) {
                return Some(id);
            }
            child = self.node(id).next;
        }
        None
    }

    fn sort_key(&self, id: DataId) -> u32 {
        match self.node(id).schema {
            Some(schema) => self.schema().node(schema).order,
            None => u32::MAX,
        }
    }

    /// Link a detached node among the children of `parent`, after the last
    /// sibling that precedes it in schema order.
    pub(crate) fn link(&mut self, parent: Option<DataId>, id: DataId) {
        let key = self.sort_key(id);
        let mut after = None;
        let mut sibling = self.first_child(parent);
        while let Some(s) = sibling {
            if self.sort_key(s) > key {
                break;
            }
            after = Some(s);
            sibling = self.node(s).next;
        }
        self.link_after(parent, after, id);
    }

    /// Link a detached node right after `after` (first when `None`).
    pub(crate) fn link_after(
        &mut self,
        parent: Option<DataId>,
        after: Option<DataId>,
        id: DataId,
    ) {
        let next = match after {
            Some(after) => self.node(after).next,
            None => self.first_child(parent),
        };
        {
            let node = self.node_mut(id);
            node.parent = parent;
            node.prev = after;
            node.next = next;
        }
        if let Some(next) = next {
            self.node_mut(next).prev = Some(id);
        }
        match after {
            Some(after) => self.node_mut(after).next = Some(id),
            None => self.set_first_child(parent, Some(id)),
        }
    }

    pub(crate) fn unlink(&mut self, id: DataId) {
        let (parent, prev, next) = {
            let node = self.node(id);
            (node.parent, node.prev, node.next)
        };
        match prev {
            Some(prev) => self.node_mut(prev).next = next,
            None => self.set_first_child(parent, next),
        }
        if let Some(next) = next {
            self.node_mut(next).prev = prev;
        }
        let node = self.node_mut(id);
        node.parent = None;
        node.prev = None;
        node.next = None;
    }

    /// Whether `node` can be moved under `parent`: it must be a live node of
    /// this tree, must not contain `parent` and its schema node must be a
    /// data child of the parent's one.
    pub(crate) fn check_relink(&self, parent: Option<DataId>, node: DataId) -> Result<()> {
        if node.to_index() >= self.nodes.len() || self.free.contains(&node) {
            return Err(Error::not_found("Data node does not belong to the tree."));
        }
        let mut current = parent;
        while let Some(id) = current {
            if id == node {
                return Err(Error::new(
                    ErrorCode::Validation,
                    "A node cannot be inserted into its own subtree.",
                ));
            }
            current = self.node(id).parent;
        }
        let Some(schema) = self.node(node).schema else {
            return Ok(());
        };
        let expected = match parent {
            Some(parent) => match self.node(parent).schema {
                Some(parent_schema) => Some(parent_schema),
                None => return Ok(()),
            },
            None => None,
        };
        let compiled = self.schema();
        if compiled.data_parent(schema) != expected {
            return Err(Error::new(
                ErrorCode::Validation,
                format!(
                    "Node \"{}\" cannot be inserted there.",
                    compiled.node(schema).name
                ),
            ));
        }
        Ok(())
    }

    /// Unlink and release a subtree.
    pub(crate) fn free_subtree(&mut self, id: DataId) {
        self.unlink(id);
        self.release(id);
    }

    fn release(&mut self, id: DataId) {
        let mut child = self.node(id).first_child;
        while let Some(c) = child {
            child = self.node(c).next;
            self.release(c);
        }
        self.nodes[id.to_index()] = DNode::new(None, Content::Inner);
        self.free.push(id);
    }

    /// Deep copy of a node of another (or the same) tree, linked under
    /// `parent`.
    pub(crate) fn copy_subtree(
        &mut self,
        src: &DataTree<'_>,
        src_id: DataId,
        parent: Option<DataId>,
    ) -> DataId {
        let id = self.copy_node(src, src_id);
        self.link(parent, id);
        let mut child = src.node(src_id).first_child;
        while let Some(c) = child {
            self.copy_subtree(src, c, Some(id));
            child = src.node(c).next;
        }
        id
    }

    /// Copy of a single node, detached.
    pub(crate) fn copy_node(&mut self, src: &DataTree<'_>, src_id: DataId) -> DataId {
        let node = src.node(src_id);
        let (schema, content, meta, flags) = (
            node.schema,
            node.content.clone(),
            node.meta.clone(),
            node.flags,
        );
        let id = self.alloc(schema, content);
        let new = self.node_mut(id);
        new.meta = meta;
        new.flags = flags;
        id
    }

    /// Create a term node from its textual value.
    pub(crate) fn new_term_node(
        &mut self,
        parent: Option<DataId>,
        schema: SchemaId,
        text: &str,
        format: PrefixFormat<'_>,
    ) -> Result<DataId> {
        let value = self.parse_term_value(schema, text, format)?;
        let id = self.alloc(Some(schema), Content::Term(value));
        self.link(parent, id);
        Ok(id)
    }

    /// Validate a value of a term node.
    pub(crate) fn parse_term_value(
        &self,
        schema: SchemaId,
        text: &str,
        format: PrefixFormat<'_>,
    ) -> Result<Value> {
        let compiled = self.schema();
        let snode = compiled.node(schema);
        let ty = snode.leaf_type().ok_or_else(|| {
            Error::new(
                ErrorCode::Validation,
                format!("Node \"{}\" is not a leaf or leaf-list.", snode.name),
            )
        })?;
        let vctx = ValueCtx {
            schema: compiled,
            format,
            module: snode.module,
        };
        value::parse_value(&vctx, ty, text)
            .map_err(|err| err.with_path(compiled.path(schema, crate::schema::SchemaPathFormat::DATA)))
    }

    pub(crate) fn new_inner_node(&mut self, parent: Option<DataId>, schema: SchemaId) -> DataId {
        let id = self.alloc(Some(schema), Content::Inner);
        self.link(parent, id);
        id
    }

    /// Key values of a list instance, in key order.
    pub(crate) fn key_values(&self, id: DataId) -> Vec<&str> {
        let Some(schema) = self.node(id).schema else {
            return Vec::new();
        };
        let keys = self.schema().node(schema).list_keys();
        keys.iter()
            .map(|key| {
                self.find_child(Some(id), *key)
                    .and_then(|k| self.node(k).value())
                    .map(|v| v.canonical.as_str())
                    .unwrap_or("")
            })
            .collect()
    }

    /// Whether two nodes (possibly of different trees) are instances of the
    /// same schema node with the same identity: same keys for lists and same
    /// value for leaf-lists.
    pub(crate) fn same_instance(&self, id: DataId, other: &DataTree<'_>, other_id: DataId) -> bool {
        let a = self.node(id);
        let b = other.node(other_id);
        match (a.schema, b.schema) {
            (Some(sa), Some(sb)) if sa == sb => {
                let snode = self.schema().node(sa);
                match &snode.kind {
                    CNodeKind::List { keys, .. } if !keys.is_empty() => {
                        self.key_values(id) == other.key_values(other_id)
                    }
                    CNodeKind::List { .. } => false,
                    CNodeKind::LeafList { .. } => {
                        !snode.is_state()
                            && a.value().map(|v| &v.canonical) == b.value().map(|v| &v.canonical)
                    }
                    _ => true,
                }
            }
            (None, None) => match (&a.content, &b.content) {
                (
                    Content::Opaque { name: na, module: ma, .. },
                    Content::Opaque { name: nb, module: mb, .. },
                ) => na == nb && ma == mb,
                _ => false,
            },
            _ => false,
        }
    }

    /// Find the instance of `other_id` (a node of another tree) among the
    /// children of `parent`.
    pub(crate) fn find_instance(
        &self,
        parent: Option<DataId>,
        other: &DataTree<'_>,
        other_id: DataId,
    ) -> Option<DataId> {
        let mut child = self.first_child(parent);
        while let Some(id) = child {
            if self.same_instance(id, other, other_id) {
                return Some(id);
            }
            child = self.node(id).next;
        }
        None
    }

    /// Clear the default flag of a node and all its ancestors.
    pub(crate) fn clear_default(&mut self, id: DataId) {
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.node_mut(id);
            node.flags.remove(DataFlags::DEFAULT);
            current = node.parent;
        }
    }

    /// Data path of a node.
    pub(crate) fn path_of(&self, id: DataId) -> String {
        let mut ids = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            ids.push(id);
            current = self.node(id).parent;
        }
        let schema = self.schema();
        let mut path = String::new();
        let mut prev_module: Option<String> = None;
        for id in ids.iter().rev() {
            let node = self.node(*id);
            path.push('/');
            let (module, name) = match (&node.content, node.schema) {
                (Content::Opaque { name, module, .. }, _) => (module.clone(), name.clone()),
                (_, Some(s)) => {
                    let snode = schema.node(s);
                    (
                        Some(schema.module(snode.module).name.to_string()),
                        snode.name.to_string(),
                    )
                }
                _ => (None, String::new()),
            };
            if module.is_some() && module != prev_module {
                path.push_str(module.as_deref().unwrap_or_default());
                path.push(':');
                prev_module = module;
            }
            path.push_str(&name);

            if let Some(s) = node.schema {
                let snode = schema.node(s);
                match &snode.kind {
                    CNodeKind::List { keys, .. } if !keys.is_empty() => {
                        for (key, value) in keys.iter().zip(self.key_values(*id)) {
                            path.push('[');
                            path.push_str(&schema.node(*key).name);
                            path.push('=');
                            path.push_str(&value::quote(value));
                            path.push(']');
                        }
                    }
                    CNodeKind::List { .. } => {
                        let position = self
                            .instances(node.parent, s)
                            .iter()
                            .position(|i| i == id)
                            .unwrap_or(0);
                        path.push_str(&format!("[{}]", position + 1));
                    }
                    CNodeKind::LeafList { .. } => {
                        if let Some(value) = node.value() {
                            path.push_str("[.=");
                            path.push_str(&value::quote(&value.canonical));
                            path.push(']');
                        }
                    }
                    _ => (),
                }
            }
        }
        path
    }
}

impl<'a> Data<'a> for DataTree<'a> {
    fn tree(&self) -> &DataTree<'a> {
        self
    }

    fn id(&self) -> Option<DataId> {
        None
    }
}

impl std::fmt::Debug for DataTree<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTree")
            .field("nodes", &(self.nodes.len() - self.free.len()))
            .field("first", &self.first)
            .finish()
    }
}

// ===== impl DataNodeRef =====

impl<'a, 'b> DataNodeRef<'a, 'b> {
    fn dnode(&self) -> &'a DNode {
        self.tree.node(self.id)
    }

    /// Schema definition of this node. Opaque nodes have none.
    pub fn schema(&self) -> Option<SchemaNode<'b>> {
        let context = self.tree.context;
        SchemaNode::from_id_opt(context, self.dnode().schema)
    }

    /// Name of the node (also for opaque nodes).
    pub fn name(&self) -> &'a str {
        let dnode = self.dnode();
        match (&dnode.content, dnode.schema) {
            (Content::Opaque { name, .. }, _) => name.as_str(),
            (_, Some(schema)) => &*self.tree.schema().node(schema).name,
            _ => "",
        }
    }

    /// Whether the node has no schema definition.
    pub fn is_opaque(&self) -> bool {
        self.dnode().schema.is_none()
    }

    /// Get the owner module of the data node. It is the module of the top-level
    /// schema node. Generally, in case of augments it is the target module,
    /// recursively, otherwise it is the module where the data node is defined.
    pub fn owner_module(&self) -> Option<SchemaModule<'b>> {
        let top = self.inclusive_ancestors().last()?;
        let schema = top.dnode().schema?;
        let module = self.tree.schema().node(schema).module;
        Some(SchemaModule::from_id(self.tree.context, module))
    }

    /// Returns an iterator over the ancestor data nodes.
    pub fn ancestors(&self) -> Ancestors<'a, DataNodeRef<'a, 'b>> {
        let parent = self.parent();
        Ancestors::new(parent)
    }

    /// Returns an iterator over this data node and its ancestors.
    pub fn inclusive_ancestors(&self) -> Ancestors<'a, DataNodeRef<'a, 'b>> {
        Ancestors::new(Some(*self))
    }

    /// Returns an iterator over the sibling data nodes.
    pub fn siblings(&self) -> Siblings<'a, DataNodeRef<'a, 'b>> {
        let sibling = self.next_sibling();
        Siblings::new(sibling)
    }

    /// Returns an iterator over this data node and its siblings.
    pub fn inclusive_siblings(&self) -> Siblings<'a, DataNodeRef<'a, 'b>> {
        Siblings::new(Some(*self))
    }

    /// Returns an iterator over the child data nodes.
    pub fn children(&self) -> Siblings<'a, DataNodeRef<'a, 'b>> {
        let child = self.first_child();
        Siblings::new(child)
    }

    /// Returns an iterator over all elements in the data tree (depth-first
    /// search algorithm).
    pub fn traverse(&self) -> Traverse<'a, DataNodeRef<'a, 'b>> {
        Traverse::new(*self)
    }

    /// Returns an iterator over the keys of the list.
    pub fn list_keys(&self) -> impl Iterator<Item = DataNodeRef<'a, 'b>> {
        let schema = self.tree.schema();
        self.children().filter(move |dnode| {
            dnode
                .dnode()
                .schema
                .is_some_and(|s| schema.node(s).flags.contains(NodeFlags::KEY))
        })
    }

    /// Returns an iterator over all metadata associated to this node.
    pub fn meta(&self) -> MetadataList<'a> {
        let meta = self
            .dnode()
            .meta
            .iter()
            .map(|meta| Metadata {
                module: &meta.module,
                name: &meta.name,
                value: &meta.value,
            })
            .collect();
        MetadataList::new(meta)
    }

    /// Generate path of the given node.
    pub fn path(&self) -> String {
        self.tree.path_of(self.id)
    }

    /// Node's value (canonical string representation).
    pub fn value_canonical(&self) -> Option<String> {
        match &self.dnode().content {
            Content::Term(value) => Some(value.canonical.clone()),
            Content::Opaque { value, .. } => value.clone(),
            _ => None,
        }
    }

    /// Node's value (typed representation).
    pub fn value(&self) -> Option<DataValue> {
        self.dnode().value().map(|value| value.data_value())
    }

    /// Check whether a node value equals to its default one.
    pub fn is_default(&self) -> bool {
        let dnode = self.dnode();
        if dnode.is_default() {
            return true;
        }
        let (Some(schema), Some(value)) = (dnode.schema, dnode.value()) else {
            return false;
        };
        match &self.tree.schema().node(schema).kind {
            CNodeKind::Leaf {
                default: Some(default),
                ..
            } => default.canonical == value.canonical,
            _ => false,
        }
    }

    /// Whether the node is an implicit node added because of a default.
    pub fn is_implicit(&self) -> bool {
        self.dnode().is_default()
    }

    /// Create a copy of the data subtree.
    ///
    /// When the `with_parents` parameter is set, duplicate also all the node
    /// parents. Keys are also duplicated for lists.
    pub fn duplicate(&self, with_parents: bool) -> Result<DataTree<'b>> {
        let mut dup = DataTree::new(self.tree.context);
        let mut parent = None;
        if with_parents {
            let ancestors: Vec<_> = self.ancestors().collect();
            for ancestor in ancestors.iter().rev() {
                let id = dup.copy_node(self.tree, ancestor.id);
                dup.link(parent, id);
                // Keys identify the list instance.
                for key in ancestor.list_keys() {
                    dup.copy_subtree(self.tree, key.id, Some(id));
                }
                parent = Some(id);
            }
        }
        dup.copy_subtree(self.tree, self.id, parent);
        Ok(dup)
    }

    /// Evaluate an XPath expression with this node as the context node and
    /// return its boolean value.
    pub fn eval_xpath_bool(&self, xpath: &str) -> Result<bool> {
        let context = self.tree.context;
        let schema = context.compiled();
        let expr = crate::xpath::parse(xpath, &|prefix| schema.module_by_name(prefix))
            .map_err(|err| context.sink().error(err))?;
        let value = eval::evaluate(self.tree, &expr, XNode::Node(self.id), None)
            .map_err(|err| context.sink().error(err))?;
        Ok(eval::to_bool(&value))
    }
}

impl<'a> Data<'a> for DataNodeRef<'_, 'a> {
    fn tree(&self) -> &DataTree<'a> {
        self.tree
    }

    fn id(&self) -> Option<DataId> {
        Some(self.id)
    }
}

impl<'a, 'b> Binding<'a> for DataNodeRef<'a, 'b> {
    type Id = DataId;
    type Container = DataTree<'b>;

    fn from_id(tree: &'a DataTree<'b>, id: DataId) -> DataNodeRef<'a, 'b> {
        DataNodeRef { tree, id }
    }
}

impl<'a, 'b> NodeIterable<'a> for DataNodeRef<'a, 'b> {
    fn parent(&self) -> Option<DataNodeRef<'a, 'b>> {
        DataNodeRef::from_id_opt(self.tree, self.dnode().parent)
    }

    fn next_sibling(&self) -> Option<DataNodeRef<'a, 'b>> {
        DataNodeRef::from_id_opt(self.tree, self.dnode().next)
    }

    fn first_child(&self) -> Option<DataNodeRef<'a, 'b>> {
        DataNodeRef::from_id_opt(self.tree, self.dnode().first_child)
    }
}

impl PartialEq for DataNodeRef<'_, '_> {
    fn eq(&self, other: &DataNodeRef<'_, '_>) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl std::fmt::Debug for DataNodeRef<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataNodeRef")
            .field("path", &self.path())
            .finish()
    }
}

// ===== impl DataNodeMut =====

impl<'a, 'b> DataNodeMut<'a, 'b> {
    /// Read-only view of the node (`None` at the top level).
    pub fn as_ref(&self) -> Option<DataNodeRef<'_, 'b>> {
        DataNodeRef::from_id_opt(self.tree, self.id)
    }

    fn context(&self) -> &'b Context {
        self.tree.context
    }

    // Resolve a child schema node by module and name.
    fn child_schema(
        &self,
        module: Option<&SchemaModule<'_>>,
        name: &str,
        output: bool,
    ) -> Result<SchemaId> {
        let schema = self.tree.schema();
        let parent_schema = match self.id {
            Some(id) => Some(self.tree.node(id).schema.ok_or_else(|| {
                Error::new(ErrorCode::Validation, "Opaque nodes cannot have schema children.")
            })?),
            None => None,
        };
        let module = match module {
            Some(module) => Some(module.id()),
            None => parent_schema.map(|p| schema.node(p).module),
        };
        schema
            .find_data_child(parent_schema, module, name, output)
            .ok_or_else(|| {
                Error::not_found(format!("Schema node \"{}\" not found.", name))
            })
    }

    fn check_parent(&self) -> Result<()> {
        if let Some(id) = self.id {
            if matches!(self.tree.node(id).content, Content::Term(_)) {
                return Err(Error::new(
                    ErrorCode::Validation,
                    "Term nodes cannot have children.",
                ));
            }
        }
        Ok(())
    }

    /// Create a new inner node (container, notification, RPC or action) in the
    /// data tree.
    ///
    /// Returns the created node.
    pub fn new_inner(
        &mut self,
        module: Option<&SchemaModule<'_>>,
        name: &str,
    ) -> Result<DataNodeMut<'_, 'b>> {
        let context = self.context();
        let result = self.check_parent().and_then(|_| {
            let schema = self.child_schema(module, name, false)?;
            let snode = self.tree.schema().node(schema);
            if !matches!(
                snode.kind,
                CNodeKind::Container { .. }
                    | CNodeKind::Notification
                    | CNodeKind::Rpc
                    | CNodeKind::Action
            ) {
                return Err(Error::new(
                    ErrorCode::Validation,
                    format!("Node \"{}\" is not an inner node.", name),
                ));
            }
            if let Some(existing) = self.tree.find_child(self.id, schema) {
                if snode.is_np_container() {
                    return Ok(existing);
                }
                return Err(Error::new(
                    ErrorCode::Validation,
                    format!("Duplicate instance of \"{}\".", name),
                ));
            }
            Ok(self.tree.new_inner_node(self.id, schema))
        });
        let id = result.map_err(|err| context.sink().error(err))?;
        self.tree.clear_default(id);
        Ok(DataNodeMut {
            tree: self.tree,
            id: Some(id),
        })
    }

    /// Create a new list node in the data tree.
    ///
    /// The `keys` parameter should be a string containing key-value pairs in
    /// the format:"[key1='val1'][key2='val2']...". The order of the key-value
    /// pairs does not matter.
    ///
    /// Returns the created node.
    pub fn new_list(
        &mut self,
        module: Option<&SchemaModule<'_>>,
        name: &str,
        keys: &str,
    ) -> Result<DataNodeMut<'_, 'b>> {
        let context = self.context();
        let values = self
            .check_parent()
            .and_then(|_| {
                let schema = self.child_schema(module, name, false)?;
                path::list_keys_from_predicates(self.tree, schema, keys)
            })
            .map_err(|err| context.sink().error(err))?;
        self.new_list2(module, name, &values)
    }

    /// Create a new list node in the data tree.
    ///
    /// The `keys` parameter should be a slice of strings representing the key
    /// values for the new list instance. All keys must be provided in the
    /// correct order.
    ///
    /// Returns the created node.
    pub fn new_list2(
        &mut self,
        module: Option<&SchemaModule<'_>>,
        name: &str,
        keys: &[impl AsRef<str>],
    ) -> Result<DataNodeMut<'_, 'b>> {
        let context = self.context();
        let keys: Vec<&str> = keys.iter().map(|key| key.as_ref()).collect();
        let result = self.check_parent().and_then(|_| {
            let schema = self.child_schema(module, name, false)?;
            path::new_list_instance(self.tree, self.id, schema, &keys, PrefixFormat::Json)
        });
        let id = result.map_err(|err| context.sink().error(err))?;
        self.tree.clear_default(id);
        Ok(DataNodeMut {
            tree: self.tree,
            id: Some(id),
        })
    }

    /// Create a new term node in the data tree.
    pub fn new_term(
        &mut self,
        module: Option<&SchemaModule<'_>>,
        name: &str,
        value: Option<&str>,
    ) -> Result<()> {
        let context = self.context();
        let result = self.check_parent().and_then(|_| {
            let schema = self.child_schema(module, name, false)?;
            let snode = self.tree.schema().node(schema);
            let text = value.unwrap_or("");
            match &snode.kind {
                CNodeKind::Leaf { .. } => {
                    let value = self.tree.parse_term_value(schema, text, PrefixFormat::Json)?;
                    match self.tree.find_child(self.id, schema) {
                        Some(existing) if self.tree.node(existing).is_default() => {
                            self.tree.node_mut(existing).content = Content::Term(value);
                            Ok(existing)
                        }
                        Some(_) => Err(Error::new(
                            ErrorCode::Validation,
                            format!("Duplicate instance of \"{}\".", name),
                        )),
                        None => {
                            let id = self.tree.alloc(Some(schema), Content::Term(value));
                            self.tree.link(self.id, id);
                            Ok(id)
                        }
                    }
                }
                CNodeKind::LeafList { .. } => {
                    self.tree.new_term_node(self.id, schema, text, PrefixFormat::Json)
                }
                CNodeKind::AnyData | CNodeKind::AnyXml => {
                    let value = value.map(|v| {
                        serde_json::from_str(v)
                            .unwrap_or_else(|_| serde_json::Value::String(v.to_owned()))
                    });
                    let id = self.tree.alloc(Some(schema), Content::Any(value));
                    self.tree.link(self.id, id);
                    Ok(id)
                }
                _ => Err(Error::new(
                    ErrorCode::Validation,
                    format!("Node \"{}\" is not a leaf or leaf-list.", name),
                )),
            }
        });
        let id = result.map_err(|err| context.sink().error(err))?;
        self.tree.clear_default(id);
        Ok(())
    }

    /// Change the value of a term node.
    pub fn set_value(&mut self, value: &str) -> Result<()> {
        let context = self.context();
        let result = match self.id {
            Some(id) => match self.tree.node(id).schema {
                Some(schema) if self.tree.schema().node(schema).is_term() => self
                    .tree
                    .parse_term_value(schema, value, PrefixFormat::Json)
                    .map(|value| (id, value)),
                _ => Err(Error::new(ErrorCode::Validation, "Node is not a leaf or leaf-list.")),
            },
            None => Err(Error::new(ErrorCode::Validation, "Node is not a leaf or leaf-list.")),
        };
        let (id, value) = result.map_err(|err| context.sink().error(err))?;
        self.tree.node_mut(id).content = Content::Term(value);
        self.tree.clear_default(id);
        Ok(())
    }

    /// Attach a metadata instance (`module:name`) to the node.
    pub fn add_meta(&mut self, name: &str, value: &str) -> Result<()> {
        let context = self.context();
        let Some(id) = self.id else {
            return Err(context.sink().error(Error::new(
                ErrorCode::Validation,
                "Metadata cannot be attached to the top level.",
            )));
        };
        let (module, name) = match crate::utils::split_prefix(name) {
            (Some(module), name) => (module, name),
            (None, _) => {
                return Err(context.sink().error(Error::new(
                    ErrorCode::Validation,
                    format!("Metadata \"{}\" is missing its module name.", name),
                )))
            }
        };
        self.tree.node_mut(id).meta.push(Meta {
            module: module.to_owned(),
            name: name.to_owned(),
            value: value.to_owned(),
        });
        Ok(())
    }

    /// Identifier of the node (`None` at the top level), to be passed to the
    /// relinking methods.
    pub fn id(&self) -> Option<DataId> {
        self.id
    }

    /// Detach the node and its subtree from the tree. The node is no longer
    /// reachable from the top level until it is inserted again.
    pub fn unlink(&mut self) -> Result<()> {
        let context = self.context();
        let Some(id) = self.id else {
            return Err(context.sink().error(Error::new(
                ErrorCode::Validation,
                "The top level cannot be unlinked.",
            )));
        };
        self.tree.unlink(id);
        Ok(())
    }

    /// Move `node` among the children of this node (the top-level nodes for
    /// the top level), in schema order.
    pub fn insert_child(&mut self, node: DataId) -> Result<()> {
        let context = self.context();
        let parent = self.id;
        self.check_parent()
            .and_then(|_| self.tree.check_relink(parent, node))
            .map_err(|err| context.sink().error(err))?;
        self.tree.unlink(node);
        self.tree.link(parent, node);
        self.tree.clear_default(node);
        Ok(())
    }

    /// Move `node` among the siblings of this node, in schema order.
    pub fn insert_sibling(&mut self, node: DataId) -> Result<()> {
        let context = self.context();
        let parent = self
            .sibling_parent()
            .and_then(|parent| {
                self.tree.check_relink(parent, node)?;
                Ok(parent)
            })
            .map_err(|err| context.sink().error(err))?;
        self.tree.unlink(node);
        self.tree.link(parent, node);
        self.tree.clear_default(node);
        Ok(())
    }

    /// Move `node` right before this node. Both must be instances of the
    /// same user-ordered list or leaf-list.
    pub fn insert_before(&mut self, node: DataId) -> Result<()> {
        let context = self.context();
        let (parent, sibling) = self
            .check_ordered(node)
            .map_err(|err| context.sink().error(err))?;
        self.tree.unlink(node);
        let after = self.tree.node(sibling).prev;
        self.tree.link_after(parent, after, node);
        self.tree.clear_default(node);
        Ok(())
    }

    /// Move `node` right after this node. Both must be instances of the same
    /// user-ordered list or leaf-list.
    pub fn insert_after(&mut self, node: DataId) -> Result<()> {
        let context = self.context();
        let (parent, sibling) = self
            .check_ordered(node)
            .map_err(|err| context.sink().error(err))?;
        self.tree.unlink(node);
        self.tree.link_after(parent, Some(sibling), node);
        self.tree.clear_default(node);
        Ok(())
    }

    fn sibling_parent(&self) -> Result<Option<DataId>> {
        match self.id {
            Some(id) => Ok(self.tree.node(id).parent),
            None => Err(Error::new(
                ErrorCode::Validation,
                "The top level has no siblings.",
            )),
        }
    }

    // Parent and id of this node, for a positional insertion of `node`.
    fn check_ordered(&self, node: DataId) -> Result<(Option<DataId>, DataId)> {
        let parent = self.sibling_parent()?;
        let Some(sibling) = self.id else {
            return Err(Error::new(ErrorCode::Validation, "The top level has no siblings."));
        };
        self.tree.check_relink(parent, node)?;
        if node == sibling {
            return Err(Error::new(
                ErrorCode::Validation,
                "A node cannot be inserted next to itself.",
            ));
        }
        let schema = self.tree.node(sibling).schema;
        let ordered = schema.is_some_and(|schema| {
            self.tree
                .schema()
                .node(schema)
                .flags
                .contains(NodeFlags::USER_ORDERED)
        });
        if !ordered || self.tree.node(node).schema != schema {
            return Err(Error::new(
                ErrorCode::Validation,
                "Positional insertion requires instances of the same user-ordered list or leaf-list.",
            ));
        }
        Ok((parent, sibling))
    }

    /// Remove the data node (all top-level nodes for the top level).
    pub fn remove(self) {
        match self.id {
            Some(id) => self.tree.free_subtree(id),
            None => {
                while let Some(first) = self.tree.first {
                    self.tree.free_subtree(first);
                }
            }
        }
    }
}

// ===== impl Metadata =====

impl<'a> Metadata<'a> {
    /// Name of the module defining the annotation.
    pub fn module(&self) -> &'a str {
        self.module
    }

    /// Metadata name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Metadata value representation.
    pub fn value(&self) -> &'a str {
        self.value
    }
}

// ===== impl DataDiff =====

impl<'a> DataDiff<'a> {
    /// Parse (and validate) input data as a YANG data diff.
    pub fn parse_string(
        context: &'a Context,
        data: impl AsRef<[u8]>,
        format: DataFormat,
        parser_options: DataParserFlags,
        validation_options: DataValidationFlags,
    ) -> Result<DataDiff<'a>> {
        let dtree = DataTree::parse_string(
            context,
            data,
            format,
            parser_options,
            validation_options,
        )?;

        Ok(DataDiff { tree: dtree })
    }

    /// Returns an iterator over the data changes.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (DataDiffOp, DataNodeRef<'_, 'a>)> {
        self.tree.traverse().filter_map(|dnode| {
            match dnode.meta().find(|meta| meta.name() == "operation") {
                Some(meta) => match meta.value() {
                    "create" => Some((DataDiffOp::Create, dnode)),
                    "delete" => Some((DataDiffOp::Delete, dnode)),
                    "replace" => Some((DataDiffOp::Replace, dnode)),
                    _ => None,
                },
                None => None,
            }
        })
    }

    /// Reverse a diff and make the opposite changes. Meaning change create to
    /// delete, delete to create, or replace the new value with the original
    /// one.
    pub fn reverse(&self) -> Result<DataDiff<'a>> {
        let context = self.tree.context;
        let tree = diff::reverse(&self.tree).map_err(|err| context.sink().error(err))?;
        Ok(DataDiff { tree })
    }
}

impl<'a> Data<'a> for DataDiff<'a> {
    fn tree(&self) -> &DataTree<'a> {
        &self.tree
    }

    fn id(&self) -> Option<DataId> {
        None
    }
}
