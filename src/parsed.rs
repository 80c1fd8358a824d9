//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Parsed (syntactic) schema tree.
//!
//! One [`ParsedModule`] per module or submodule, holding the statements as
//! written: groupings are not expanded, typedefs are not resolved and
//! extension instances are kept raw.

use crate::error::{Error, Result};
use crate::parser::stmt::{yin_arg, Stmt};
use crate::utils::{is_identifier, is_revision_date};

/// YANG status statement.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Status {
    #[default]
    Current,
    Deprecated,
    Obsolete,
}

#[derive(Clone, Debug)]
pub struct ParsedModule {
    pub name: String,
    pub is_submodule: bool,
    pub belongs_to: Option<String>,
    pub yang_version: String,
    pub namespace: String,
    pub prefix: String,
    pub imports: Vec<PImport>,
    pub includes: Vec<PInclude>,
    pub organization: Option<String>,
    pub contact: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
    /// Most recent first.
    pub revisions: Vec<PRevision>,
    pub extensions: Vec<PExtension>,
    pub features: Vec<PFeature>,
    pub identities: Vec<PIdentity>,
    pub typedefs: Vec<PTypedef>,
    pub groupings: Vec<PGrouping>,
    /// Data definitions, rpcs and notifications in source order.
    pub body: Vec<PNode>,
    pub augments: Vec<PAugment>,
    pub deviations: Vec<PDeviation>,
    pub exts: Vec<PExtInstance>,
    /// Source statement tree, used by the YANG and YIN printers.
    pub stmt: Stmt,
}

#[derive(Clone, Debug)]
pub struct PImport {
    pub module: String,
    pub prefix: String,
    pub revision: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PInclude {
    pub submodule: String,
    pub revision: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PRevision {
    pub date: String,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PExtension {
    pub name: String,
    pub argument: Option<String>,
    pub yin_element: bool,
    pub status: Option<Status>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PFeature {
    pub name: String,
    pub if_features: Vec<String>,
    pub status: Option<Status>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PIdentity {
    pub name: String,
    pub bases: Vec<String>,
    pub if_features: Vec<String>,
    pub status: Option<Status>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PTypedef {
    pub name: String,
    pub line: u32,
    pub ty: PType,
    pub units: Option<String>,
    pub default: Option<String>,
    pub status: Option<Status>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PGrouping {
    pub name: String,
    pub line: u32,
    pub typedefs: Vec<PTypedef>,
    pub groupings: Vec<PGrouping>,
    pub children: Vec<PNode>,
    pub status: Option<Status>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

/// Restriction with error information (range, length).
#[derive(Clone, Debug, Default)]
pub struct PRestriction {
    pub arg: String,
    pub error_message: Option<String>,
    pub error_app_tag: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct PPattern {
    pub arg: String,
    pub invert_match: bool,
    pub error_message: Option<String>,
    pub error_app_tag: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

/// Enumeration or bit.
#[derive(Clone, Debug, Default)]
pub struct PEnumItem {
    pub name: String,
    /// `value` for enums, `position` for bits.
    pub value: Option<i64>,
    pub if_features: Vec<String>,
    pub status: Option<Status>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct PType {
    pub name: String,
    pub line: u32,
    pub range: Option<PRestriction>,
    pub length: Option<PRestriction>,
    pub patterns: Vec<PPattern>,
    pub enums: Vec<PEnumItem>,
    pub bits: Vec<PEnumItem>,
    pub fraction_digits: Option<u8>,
    pub path: Option<String>,
    pub require_instance: Option<bool>,
    pub bases: Vec<String>,
    pub types: Vec<PType>,
}

#[derive(Clone, Debug)]
pub struct PMust {
    pub condition: String,
    pub error_message: Option<String>,
    pub error_app_tag: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PWhen {
    pub condition: String,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PExtInstance {
    /// `prefix:name` of the extension.
    pub name: String,
    pub arg: Option<String>,
    pub line: u32,
    pub substmts: Vec<Stmt>,
}

#[derive(Clone, Debug)]
pub enum PNodeKind {
    Container {
        presence: Option<String>,
    },
    Leaf {
        ty: PType,
        units: Option<String>,
        default: Option<String>,
    },
    LeafList {
        ty: PType,
        units: Option<String>,
        defaults: Vec<String>,
        min_elements: Option<u32>,
        max_elements: Option<u32>,
        ordered_by_user: bool,
    },
    List {
        key: Option<String>,
        uniques: Vec<String>,
        min_elements: Option<u32>,
        max_elements: Option<u32>,
        ordered_by_user: bool,
    },
    Choice {
        default: Option<String>,
    },
    Case,
    AnyData,
    AnyXml,
    Uses {
        refines: Vec<PRefine>,
        augments: Vec<PAugment>,
    },
    Rpc,
    Action,
    Input,
    Output,
    Notification,
}

#[derive(Clone, Debug)]
pub struct PNode {
    pub kind: PNodeKind,
    pub name: String,
    pub line: u32,
    pub config: Option<bool>,
    pub mandatory: Option<bool>,
    pub status: Option<Status>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub if_features: Vec<String>,
    pub when: Option<PWhen>,
    pub musts: Vec<PMust>,
    pub typedefs: Vec<PTypedef>,
    pub groupings: Vec<PGrouping>,
    pub children: Vec<PNode>,
    pub exts: Vec<PExtInstance>,
}

#[derive(Clone, Debug)]
pub struct PAugment {
    pub target: String,
    pub line: u32,
    pub when: Option<PWhen>,
    pub if_features: Vec<String>,
    pub status: Option<Status>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub children: Vec<PNode>,
}

#[derive(Clone, Debug, Default)]
pub struct PRefine {
    pub target: String,
    pub line: u32,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub config: Option<bool>,
    pub mandatory: Option<bool>,
    pub presence: Option<String>,
    pub defaults: Vec<String>,
    pub min_elements: Option<u32>,
    pub max_elements: Option<u32>,
    pub musts: Vec<PMust>,
    pub if_features: Vec<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviateKind {
    NotSupported,
    Add,
    Replace,
    Delete,
}

#[derive(Clone, Debug)]
pub struct PDeviate {
    pub kind: DeviateKind,
    pub units: Option<String>,
    pub musts: Vec<PMust>,
    pub uniques: Vec<String>,
    pub defaults: Vec<String>,
    pub config: Option<bool>,
    pub mandatory: Option<bool>,
    pub min_elements: Option<u32>,
    /// `Some(None)` for "unbounded".
    pub max_elements: Option<Option<u32>>,
    pub ty: Option<PType>,
}

#[derive(Clone, Debug)]
pub struct PDeviation {
    pub target: String,
    pub line: u32,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub deviates: Vec<PDeviate>,
}

// ===== impl ParsedModule =====

impl ParsedModule {
    /// Lower a module or submodule statement.
    pub fn from_stmt(stmt: Stmt) -> Result<ParsedModule> {
        let is_submodule = match stmt.keyword.as_str() {
            "module" => false,
            "submodule" => true,
            other => {
                return Err(Error::syntax(format!(
                    "Invalid keyword \"{}\", expected \"module\" or \"submodule\".",
                    other
                )))
            }
        };
        check_keywords(&stmt)?;

        let name = arg(&stmt)?;
        if !is_identifier(&name) {
            return Err(Error::syntax(format!(
                "Invalid identifier \"{}\" of {}.",
                name, stmt.keyword
            )));
        }
        let mut module = ParsedModule {
            name,
            is_submodule,
            belongs_to: None,
            yang_version: "1".to_owned(),
            namespace: String::new(),
            prefix: String::new(),
            imports: Vec::new(),
            includes: Vec::new(),
            organization: None,
            contact: None,
            description: None,
            reference: None,
            revisions: Vec::new(),
            extensions: Vec::new(),
            features: Vec::new(),
            identities: Vec::new(),
            typedefs: Vec::new(),
            groupings: Vec::new(),
            body: Vec::new(),
            augments: Vec::new(),
            deviations: Vec::new(),
            exts: Vec::new(),
            stmt: Stmt::new("", None),
        };

        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "yang-version" => {
                    let version = arg(sub)?;
                    if version != "1" && version != "1.1" {
                        return Err(invalid_arg(sub));
                    }
                    module.yang_version = version;
                }
                "namespace" => module.namespace = arg(sub)?,
                "prefix" => module.prefix = arg(sub)?,
                "belongs-to" => {
                    module.belongs_to = Some(arg(sub)?);
                    module.prefix = sub
                        .find_arg("prefix")
                        .ok_or_else(|| missing(sub, "prefix"))?
                        .to_owned();
                }
                "import" => module.imports.push(PImport {
                    module: arg(sub)?,
                    prefix: sub
                        .find_arg("prefix")
                        .ok_or_else(|| missing(sub, "prefix"))?
                        .to_owned(),
                    revision: revision_date(sub)?,
                }),
                "include" => module.includes.push(PInclude {
                    submodule: arg(sub)?,
                    revision: revision_date(sub)?,
                }),
                "organization" => module.organization = Some(arg(sub)?),
                "contact" => module.contact = Some(arg(sub)?),
                "description" => module.description = Some(arg(sub)?),
                "reference" => module.reference = Some(arg(sub)?),
                "revision" => {
                    let date = arg(sub)?;
                    if !is_revision_date(&date) {
                        return Err(invalid_arg(sub));
                    }
                    module.revisions.push(PRevision {
                        date,
                        description: text(sub, "description"),
                        reference: text(sub, "reference"),
                    });
                }
                "extension" => module.extensions.push(PExtension {
                    name: arg(sub)?,
                    argument: sub.find_arg("argument").map(str::to_owned),
                    yin_element: match sub
                        .find("argument")
                        .and_then(|a| a.find("yin-element"))
                    {
                        Some(s) => parse_bool(s)?,
                        None => false,
                    },
                    status: status(sub)?,
                    description: text(sub, "description"),
                    reference: text(sub, "reference"),
                }),
                "feature" => module.features.push(PFeature {
                    name: arg(sub)?,
                    if_features: if_features(sub)?,
                    status: status(sub)?,
                    description: text(sub, "description"),
                    reference: text(sub, "reference"),
                }),
                "identity" => module.identities.push(PIdentity {
                    name: arg(sub)?,
                    bases: sub
                        .find_all("base")
                        .map(arg)
                        .collect::<Result<_>>()?,
                    if_features: if_features(sub)?,
                    status: status(sub)?,
                    description: text(sub, "description"),
                    reference: text(sub, "reference"),
                }),
                "typedef" => module.typedefs.push(typedef(sub)?),
                "grouping" => module.groupings.push(grouping(sub)?),
                "augment" => module.augments.push(augment(sub)?),
                "deviation" => module.deviations.push(deviation(sub)?),
                "container" | "leaf" | "leaf-list" | "list" | "choice"
                | "anydata" | "anyxml" | "uses" | "rpc" | "notification" => {
                    module.body.push(node(sub)?)
                }
                _ if sub.is_extension() => {
                    module.exts.push(ext_instance(sub)?)
                }
                _ => (),
            }
        }

        if !is_submodule {
            if module.namespace.is_empty() {
                return Err(missing(&stmt, "namespace"));
            }
            if module.prefix.is_empty() {
                return Err(missing(&stmt, "prefix"));
            }
        } else if module.belongs_to.is_none() {
            return Err(missing(&stmt, "belongs-to"));
        }

        // Most recent revision first.
        module.revisions.sort_by(|a, b| b.date.cmp(&a.date));
        module.stmt = stmt;
        Ok(module)
    }

    /// Latest revision date, if any.
    pub fn revision(&self) -> Option<&str> {
        self.revisions.first().map(|r| r.date.as_str())
    }

    /// Import prefix bound to a module name.
    pub fn import_prefix(&self, module: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|i| i.module == module)
            .map(|i| i.prefix.as_str())
    }
}

// ===== impl PNode =====

impl PNode {
    pub fn keyword(&self) -> &'static str {
        match self.kind {
            PNodeKind::Container { .. } => "container",
            PNodeKind::Leaf { .. } => "leaf",
            PNodeKind::LeafList { .. } => "leaf-list",
            PNodeKind::List { .. } => "list",
            PNodeKind::Choice { .. } => "choice",
            PNodeKind::Case => "case",
            PNodeKind::AnyData => "anydata",
            PNodeKind::AnyXml => "anyxml",
            PNodeKind::Uses { .. } => "uses",
            PNodeKind::Rpc => "rpc",
            PNodeKind::Action => "action",
            PNodeKind::Input => "input",
            PNodeKind::Output => "output",
            PNodeKind::Notification => "notification",
        }
    }
}

// ===== lowering helpers =====

/// Reject unknown core keywords anywhere outside extension instances.
fn check_keywords(stmt: &Stmt) -> Result<()> {
    for sub in &stmt.substmts {
        if sub.is_extension() {
            continue;
        }
        if yin_arg(&sub.keyword).is_err() {
            return Err(Error::syntax(format!(
                "Invalid keyword \"{}\" (line {}).",
                sub.keyword, sub.line
            )));
        }
        check_keywords(sub)?;
    }
    Ok(())
}

fn arg(stmt: &Stmt) -> Result<String> {
    stmt.arg.clone().ok_or_else(|| {
        Error::syntax(format!(
            "Missing argument of \"{}\" (line {}).",
            stmt.keyword, stmt.line
        ))
    })
}

fn missing(stmt: &Stmt, keyword: &str) -> Error {
    Error::syntax(format!(
        "Missing mandatory keyword \"{}\" as a child of \"{}\" (line {}).",
        keyword, stmt.keyword, stmt.line
    ))
}

fn invalid_arg(stmt: &Stmt) -> Error {
    Error::syntax(format!(
        "Invalid value \"{}\" of \"{}\" (line {}).",
        stmt.arg_str(),
        stmt.keyword,
        stmt.line
    ))
}

fn text(stmt: &Stmt, keyword: &str) -> Option<String> {
    stmt.find_arg(keyword).map(str::to_owned)
}

fn parse_bool(stmt: &Stmt) -> Result<bool> {
    match stmt.arg_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid_arg(stmt)),
    }
}

fn opt_bool(stmt: &Stmt, keyword: &str) -> Result<Option<bool>> {
    stmt.find(keyword).map(parse_bool).transpose()
}

fn opt_u32(stmt: &Stmt, keyword: &str) -> Result<Option<u32>> {
    stmt.find(keyword)
        .map(|s| s.arg_str().parse::<u32>().map_err(|_| invalid_arg(s)))
        .transpose()
}

fn max_elements(stmt: &Stmt) -> Result<Option<Option<u32>>> {
    match stmt.find("max-elements") {
        Some(s) if s.arg_str() == "unbounded" => Ok(Some(None)),
        Some(s) => match s.arg_str().parse::<u32>() {
            Ok(0) | Err(_) => Err(invalid_arg(s)),
            Ok(n) => Ok(Some(Some(n))),
        },
        None => Ok(None),
    }
}

fn ordered_by_user(stmt: &Stmt) -> Result<bool> {
    match stmt.find("ordered-by") {
        Some(s) => match s.arg_str() {
            "user" => Ok(true),
            "system" => Ok(false),
            _ => Err(invalid_arg(s)),
        },
        None => Ok(false),
    }
}

fn status(stmt: &Stmt) -> Result<Option<Status>> {
    match stmt.find("status") {
        Some(s) => match s.arg_str() {
            "current" => Ok(Some(Status::Current)),
            "deprecated" => Ok(Some(Status::Deprecated)),
            "obsolete" => Ok(Some(Status::Obsolete)),
            _ => Err(invalid_arg(s)),
        },
        None => Ok(None),
    }
}

fn revision_date(stmt: &Stmt) -> Result<Option<String>> {
    match stmt.find("revision-date") {
        Some(s) if is_revision_date(s.arg_str()) => Ok(Some(arg(s)?)),
        Some(s) => Err(invalid_arg(s)),
        None => Ok(None),
    }
}

fn if_features(stmt: &Stmt) -> Result<Vec<String>> {
    stmt.find_all("if-feature").map(arg).collect()
}

fn when(stmt: &Stmt) -> Result<Option<PWhen>> {
    stmt.find("when")
        .map(|s| {
            Ok(PWhen {
                condition: arg(s)?,
                description: text(s, "description"),
                reference: text(s, "reference"),
            })
        })
        .transpose()
}

fn musts(stmt: &Stmt) -> Result<Vec<PMust>> {
    stmt.find_all("must")
        .map(|s| {
            Ok(PMust {
                condition: arg(s)?,
                error_message: text(s, "error-message"),
                error_app_tag: text(s, "error-app-tag"),
                description: text(s, "description"),
                reference: text(s, "reference"),
            })
        })
        .collect()
}

fn ext_instance(stmt: &Stmt) -> Result<PExtInstance> {
    Ok(PExtInstance {
        name: stmt.keyword.clone(),
        arg: stmt.arg.clone(),
        line: stmt.line,
        substmts: stmt.substmts.clone(),
    })
}

fn exts(stmt: &Stmt) -> Result<Vec<PExtInstance>> {
    stmt.substmts
        .iter()
        .filter(|s| s.is_extension())
        .map(ext_instance)
        .collect()
}

fn restriction(stmt: &Stmt) -> Result<PRestriction> {
    Ok(PRestriction {
        arg: arg(stmt)?,
        error_message: text(stmt, "error-message"),
        error_app_tag: text(stmt, "error-app-tag"),
        description: text(stmt, "description"),
        reference: text(stmt, "reference"),
    })
}

fn enum_item(stmt: &Stmt, value_keyword: &str) -> Result<PEnumItem> {
    let value = stmt
        .find(value_keyword)
        .map(|s| s.arg_str().trim().parse::<i64>().map_err(|_| invalid_arg(s)))
        .transpose()?;
    Ok(PEnumItem {
        name: arg(stmt)?,
        value,
        if_features: if_features(stmt)?,
        status: status(stmt)?,
        description: text(stmt, "description"),
        reference: text(stmt, "reference"),
    })
}

pub(crate) fn ptype(stmt: &Stmt) -> Result<PType> {
    let fraction_digits = stmt
        .find("fraction-digits")
        .map(|s| match s.arg_str().parse::<u8>() {
            Ok(fd) if (1..=18).contains(&fd) => Ok(fd),
            _ => Err(invalid_arg(s)),
        })
        .transpose()?;
    let mut patterns = Vec::new();
    for s in stmt.find_all("pattern") {
        let invert_match = match s.find_arg("modifier") {
            Some("invert-match") => true,
            Some(_) => return Err(invalid_arg(s)),
            None => false,
        };
        patterns.push(PPattern {
            arg: arg(s)?,
            invert_match,
            error_message: text(s, "error-message"),
            error_app_tag: text(s, "error-app-tag"),
            description: text(s, "description"),
            reference: text(s, "reference"),
        });
    }
    Ok(PType {
        name: arg(stmt)?,
        line: stmt.line,
        range: stmt.find("range").map(restriction).transpose()?,
        length: stmt.find("length").map(restriction).transpose()?,
        patterns,
        enums: stmt
            .find_all("enum")
            .map(|s| enum_item(s, "value"))
            .collect::<Result<_>>()?,
        bits: stmt
            .find_all("bit")
            .map(|s| enum_item(s, "position"))
            .collect::<Result<_>>()?,
        fraction_digits,
        path: text(stmt, "path"),
        require_instance: opt_bool(stmt, "require-instance")?,
        bases: stmt.find_all("base").map(arg).collect::<Result<_>>()?,
        types: stmt.find_all("type").map(ptype).collect::<Result<_>>()?,
    })
}

fn typedef(stmt: &Stmt) -> Result<PTypedef> {
    Ok(PTypedef {
        name: arg(stmt)?,
        line: stmt.line,
        ty: ptype(stmt.find("type").ok_or_else(|| missing(stmt, "type"))?)?,
        units: text(stmt, "units"),
        default: text(stmt, "default"),
        status: status(stmt)?,
        description: text(stmt, "description"),
        reference: text(stmt, "reference"),
    })
}

fn grouping(stmt: &Stmt) -> Result<PGrouping> {
    let (typedefs, groupings) = scoped_definitions(stmt)?;
    Ok(PGrouping {
        name: arg(stmt)?,
        line: stmt.line,
        typedefs,
        groupings,
        children: children(stmt)?,
        status: status(stmt)?,
        description: text(stmt, "description"),
        reference: text(stmt, "reference"),
    })
}

fn scoped_definitions(stmt: &Stmt) -> Result<(Vec<PTypedef>, Vec<PGrouping>)> {
    Ok((
        stmt.find_all("typedef").map(typedef).collect::<Result<_>>()?,
        stmt.find_all("grouping").map(grouping).collect::<Result<_>>()?,
    ))
}

fn children(stmt: &Stmt) -> Result<Vec<PNode>> {
    stmt.substmts
        .iter()
        .filter(|s| {
            matches!(
                s.keyword.as_str(),
                "container"
                    | "leaf"
                    | "leaf-list"
                    | "list"
                    | "choice"
                    | "case"
                    | "anydata"
                    | "anyxml"
                    | "uses"
                    | "action"
                    | "notification"
                    | "input"
                    | "output"
            )
        })
        .map(node)
        .collect()
}

fn augment(stmt: &Stmt) -> Result<PAugment> {
    Ok(PAugment {
        target: arg(stmt)?,
        line: stmt.line,
        when: when(stmt)?,
        if_features: if_features(stmt)?,
        status: status(stmt)?,
        description: text(stmt, "description"),
        reference: text(stmt, "reference"),
        children: children(stmt)?,
    })
}

fn refine(stmt: &Stmt) -> Result<PRefine> {
    Ok(PRefine {
        target: arg(stmt)?,
        line: stmt.line,
        description: text(stmt, "description"),
        reference: text(stmt, "reference"),
        config: opt_bool(stmt, "config")?,
        mandatory: opt_bool(stmt, "mandatory")?,
        presence: text(stmt, "presence"),
        defaults: stmt.find_all("default").map(arg).collect::<Result<_>>()?,
        min_elements: opt_u32(stmt, "min-elements")?,
        max_elements: max_elements(stmt)?.flatten(),
        musts: musts(stmt)?,
        if_features: if_features(stmt)?,
    })
}

fn deviation(stmt: &Stmt) -> Result<PDeviation> {
    let mut deviates = Vec::new();
    for s in stmt.find_all("deviate") {
        let kind = match s.arg_str() {
            "not-supported" => DeviateKind::NotSupported,
            "add" => DeviateKind::Add,
            "replace" => DeviateKind::Replace,
            "delete" => DeviateKind::Delete,
            _ => return Err(invalid_arg(s)),
        };
        deviates.push(PDeviate {
            kind,
            units: text(s, "units"),
            musts: musts(s)?,
            uniques: s.find_all("unique").map(arg).collect::<Result<_>>()?,
            defaults: s.find_all("default").map(arg).collect::<Result<_>>()?,
            config: opt_bool(s, "config")?,
            mandatory: opt_bool(s, "mandatory")?,
            min_elements: opt_u32(s, "min-elements")?,
            max_elements: max_elements(s)?,
            ty: s.find("type").map(ptype).transpose()?,
        });
    }
    if deviates.is_empty() {
        return Err(missing(stmt, "deviate"));
    }
    Ok(PDeviation {
        target: arg(stmt)?,
        line: stmt.line,
        description: text(stmt, "description"),
        reference: text(stmt, "reference"),
        deviates,
    })
}

fn node(stmt: &Stmt) -> Result<PNode> {
    let kind = match stmt.keyword.as_str() {
        "container" => PNodeKind::Container {
            presence: text(stmt, "presence"),
        },
        "leaf" => PNodeKind::Leaf {
            ty: ptype(stmt.find("type").ok_or_else(|| missing(stmt, "type"))?)?,
            units: text(stmt, "units"),
            default: text(stmt, "default"),
        },
        "leaf-list" => PNodeKind::LeafList {
            ty: ptype(stmt.find("type").ok_or_else(|| missing(stmt, "type"))?)?,
            units: text(stmt, "units"),
            defaults: stmt.find_all("default").map(arg).collect::<Result<_>>()?,
            min_elements: opt_u32(stmt, "min-elements")?,
            max_elements: max_elements(stmt)?.flatten(),
            ordered_by_user: ordered_by_user(stmt)?,
        },
        "list" => PNodeKind::List {
            key: text(stmt, "key"),
            uniques: stmt.find_all("unique").map(arg).collect::<Result<_>>()?,
            min_elements: opt_u32(stmt, "min-elements")?,
            max_elements: max_elements(stmt)?.flatten(),
            ordered_by_user: ordered_by_user(stmt)?,
        },
        "choice" => PNodeKind::Choice {
            default: text(stmt, "default"),
        },
        "case" => PNodeKind::Case,
        "anydata" => PNodeKind::AnyData,
        "anyxml" => PNodeKind::AnyXml,
        "uses" => PNodeKind::Uses {
            refines: stmt.find_all("refine").map(refine).collect::<Result<_>>()?,
            augments: stmt
                .find_all("augment")
                .map(augment)
                .collect::<Result<_>>()?,
        },
        "rpc" => PNodeKind::Rpc,
        "action" => PNodeKind::Action,
        "input" => PNodeKind::Input,
        "output" => PNodeKind::Output,
        "notification" => PNodeKind::Notification,
        _ => {
            return Err(Error::syntax(format!(
                "Unexpected keyword \"{}\" (line {}).",
                stmt.keyword, stmt.line
            )))
        }
    };
    let name = match kind {
        PNodeKind::Input => "input".to_owned(),
        PNodeKind::Output => "output".to_owned(),
        _ => arg(stmt)?,
    };
    let (typedefs, groupings) = scoped_definitions(stmt)?;
    let children = children(stmt)?;
    Ok(PNode {
        kind,
        name,
        line: stmt.line,
        config: opt_bool(stmt, "config")?,
        mandatory: opt_bool(stmt, "mandatory")?,
        status: status(stmt)?,
        description: text(stmt, "description"),
        reference: text(stmt, "reference"),
        if_features: if_features(stmt)?,
        when: when(stmt)?,
        musts: musts(stmt)?,
        typedefs,
        groupings,
        children,
        exts: exts(stmt)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::parse_yang;

    fn lower(src: &str) -> Result<ParsedModule> {
        ParsedModule::from_stmt(parse_yang(src)?)
    }

    #[test]
    fn module_header() {
        let module = lower(
            r#"module m {
                yang-version 1.1;
                namespace "urn:m";
                prefix m;
                import ietf-yang-types { prefix yang; }
                revision 2020-01-01;
                revision 2021-06-01 { description "second"; }
                container c { leaf l { type yang:counter32; } }
            }"#,
        )
        .unwrap();
        assert_eq!(module.revision(), Some("2021-06-01"));
        assert_eq!(module.import_prefix("ietf-yang-types"), Some("yang"));
        assert_eq!(module.body.len(), 1);
        assert_eq!(module.body[0].children[0].name, "l");
    }

    #[test]
    fn missing_namespace() {
        let err = lower("module m { prefix m; }").unwrap_err();
        assert!(err.to_string().contains("namespace"));
    }

    #[test]
    fn invalid_keyword() {
        let err = lower(
            "module m { namespace urn:m; prefix m; container c { foo bar; } }",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid keyword \"foo\""));
    }

    #[test]
    fn type_restrictions() {
        let module = lower(
            r#"module m { namespace urn:m; prefix m;
                typedef t {
                    type int32 { range "0..100" { error-app-tag "bad"; } }
                }
                leaf e { type enumeration { enum a; enum b { value 5; } } }
            }"#,
        )
        .unwrap();
        let range = module.typedefs[0].ty.range.as_ref().unwrap();
        assert_eq!(range.arg, "0..100");
        assert_eq!(range.error_app_tag.as_deref(), Some("bad"));
        match &module.body[0].kind {
            PNodeKind::Leaf { ty, .. } => {
                assert_eq!(ty.enums.len(), 2);
                assert_eq!(ty.enums[1].value, Some(5));
            }
            _ => panic!("not a leaf"),
        }
    }
}
