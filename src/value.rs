//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Term value codecs.
//!
//! Values are validated against their compiled type and stored in canonical
//! form. Identityref and instance-identifier values are stored in their JSON
//! (module-qualified) form and translated on output.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;

use crate::compiled::{CType, CompiledSchema, Interval, RestrictionError};
use crate::error::{Error, ErrorCode, Result};
use crate::ids::ModuleId;
use crate::schema::{DataValue, DataValueType};
use crate::utils::split_prefix;
use crate::xpath::{self, Axis, Expr, NodeTest, PathStart};

/// Validated term value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Value {
    pub canonical: String,
    /// Base type of the stored value (union and leafref resolved).
    pub base: DataValueType,
}

/// How prefixes in identityref and instance-identifier values are written.
#[derive(Clone, Copy, Debug)]
pub(crate) enum PrefixFormat<'p> {
    /// Module names (JSON, canonical form).
    Json,
    /// XML namespace bindings in scope, innermost last.
    Xml(&'p [(String, String)]),
    /// Prefixes of a schema module (defaults, must expressions).
    Schema(ModuleId),
}

/// Value of a term node being parsed.
pub(crate) struct ValueCtx<'s, 'p> {
    pub schema: &'s CompiledSchema,
    pub format: PrefixFormat<'p>,
    /// Module of the node, used for unprefixed identities.
    pub module: ModuleId,
}

// ===== impl Value =====

impl Value {
    pub(crate) fn new(canonical: impl Into<String>, base: DataValueType) -> Value {
        Value {
            canonical: canonical.into(),
            base,
        }
    }

    /// Typed representation of the value.
    pub(crate) fn data_value(&self) -> DataValue {
        let c = self.canonical.as_str();
        let parsed = match self.base {
            DataValueType::Uint8 => c.parse().ok().map(DataValue::Uint8),
            DataValueType::Uint16 => c.parse().ok().map(DataValue::Uint16),
            DataValueType::Uint32 => c.parse().ok().map(DataValue::Uint32),
            DataValueType::Uint64 => c.parse().ok().map(DataValue::Uint64),
            DataValueType::Int8 => c.parse().ok().map(DataValue::Int8),
            DataValueType::Int16 => c.parse().ok().map(DataValue::Int16),
            DataValueType::Int32 => c.parse().ok().map(DataValue::Int32),
            DataValueType::Int64 => c.parse().ok().map(DataValue::Int64),
            DataValueType::Bool => Some(DataValue::Bool(c == "true")),
            DataValueType::Empty => Some(DataValue::Empty),
            _ => None,
        };
        parsed.unwrap_or_else(|| DataValue::Other(self.canonical.clone()))
    }

    /// Whether the value is printed as a JSON number or literal.
    pub(crate) fn json_unquoted(&self) -> bool {
        matches!(
            self.base,
            DataValueType::Uint8
                | DataValueType::Uint16
                | DataValueType::Uint32
                | DataValueType::Int8
                | DataValueType::Int16
                | DataValueType::Int32
                | DataValueType::Bool
        )
    }
}

// ===== parsing =====

/// Validate `text` against `ty` and return its canonical value.
pub(crate) fn parse_value(
    vctx: &ValueCtx<'_, '_>,
    ty: &CType,
    text: &str,
) -> Result<Value> {
    if let Some(leafref) = &ty.leafref {
        return match &leafref.realtype {
            Some(realtype) => parse_value(vctx, realtype, text),
            None => Err(Error::invalid_value(format!(
                "Invalid leafref value \"{}\" - unresolved target.",
                text
            ))),
        };
    }

    let canonical = match ty.base {
        DataValueType::Int8
        | DataValueType::Int16
        | DataValueType::Int32
        | DataValueType::Int64
        | DataValueType::Uint8
        | DataValueType::Uint16
        | DataValueType::Uint32
        | DataValueType::Uint64 => parse_integer(ty, text)?,
        DataValueType::Dec64 => parse_decimal64(ty, text)?,
        DataValueType::String => parse_string(ty, text)?,
        DataValueType::Bool => match text {
            "true" | "false" => text.to_owned(),
            _ => {
                return Err(Error::invalid_value(format!(
                    "Invalid boolean value \"{}\".",
                    text
                )))
            }
        },
        DataValueType::Empty => {
            if !text.is_empty() {
                return Err(Error::invalid_value(format!(
                    "Invalid empty value length {}.",
                    text.len()
                )));
            }
            String::new()
        }
        DataValueType::Enum => parse_enum(ty, text)?,
        DataValueType::Bits => parse_bits(ty, text)?,
        DataValueType::Binary => parse_binary(ty, text)?,
        DataValueType::IdentityRef => parse_identityref(vctx, ty, text)?,
        DataValueType::InstanceId => parse_instance_id(vctx, text)?,
        DataValueType::Union => return parse_union(vctx, ty, text),
        DataValueType::LeafRef | DataValueType::Unknown => {
            return Err(Error::invalid_value(format!(
                "Invalid value \"{}\" of an unresolved type.",
                text
            )))
        }
    };
    Ok(Value::new(canonical, ty.base))
}

fn parse_union(vctx: &ValueCtx<'_, '_>, ty: &CType, text: &str) -> Result<Value> {
    for member in &ty.union {
        if let Ok(value) = parse_value(vctx, member, text) {
            return Ok(value);
        }
    }
    Err(Error::invalid_value(format!(
        "Invalid union value \"{}\" - no matching subtype found.",
        text
    )))
}

fn restriction_error(
    code: ErrorCode,
    default_msg: String,
    error: &RestrictionError,
) -> Error {
    let msg = match &error.message {
        Some(msg) => msg.to_string(),
        None => default_msg,
    };
    Error::new(code, msg).with_apptag(error.app_tag.as_ref().map(|t| t.to_string()))
}

fn in_intervals(intervals: &[Interval], value: i128) -> bool {
    intervals.iter().any(|i| i.min <= value && value <= i.max)
}

fn type_name(base: DataValueType) -> &'static str {
    match base {
        DataValueType::Int8 => "int8",
        DataValueType::Int16 => "int16",
        DataValueType::Int32 => "int32",
        DataValueType::Int64 => "int64",
        DataValueType::Uint8 => "uint8",
        DataValueType::Uint16 => "uint16",
        DataValueType::Uint32 => "uint32",
        DataValueType::Uint64 => "uint64",
        DataValueType::Dec64 => "decimal64",
        _ => "",
    }
}

/// Parse a decimal integer with an optional sign.
pub(crate) fn parse_i128(text: &str) -> Option<i128> {
    let digits = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = digits.parse::<i128>().ok()?;
    Some(if text.starts_with('-') { -value } else { value })
}

fn parse_integer(ty: &CType, text: &str) -> Result<String> {
    let value = parse_i128(text).ok_or_else(|| {
        Error::invalid_value(format!(
            "Invalid {} value \"{}\".",
            type_name(ty.base),
            text
        ))
    })?;
    if let Some((min, max)) = crate::compiled::integer_bounds(ty.base) {
        if value < min || value > max {
            return Err(Error::invalid_value(format!(
                "Value \"{}\" is out of type {} min/max bounds.",
                text,
                type_name(ty.base)
            )));
        }
    }
    if let Some(range) = &ty.range {
        if !in_intervals(range, value) {
            return Err(restriction_error(
                ErrorCode::InvalidValue,
                format!(
                    "Unsatisfied range - value \"{}\" is out of the allowed range.",
                    text
                ),
                &ty.range_error,
            ));
        }
    }
    Ok(value.to_string())
}

/// Parse a decimal64 value into its scaled integer form.
pub(crate) fn parse_decimal(text: &str, fraction_digits: u8) -> Option<i128> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => {
            if f.is_empty() {
                return None;
            }
            (i, f)
        }
        None => (unsigned, ""),
    };
    if int_part.is_empty()
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let frac_trimmed = frac_part.trim_end_matches('0');
    if frac_trimmed.len() > fraction_digits as usize {
        return None;
    }
    let mut digits = String::with_capacity(int_part.len() + fraction_digits as usize);
    digits.push_str(int_part);
    digits.push_str(frac_trimmed);
    for _ in frac_trimmed.len()..fraction_digits as usize {
        digits.push('0');
    }
    let value = digits.parse::<i128>().ok()?;
    Some(if negative { -value } else { value })
}

/// Print a scaled decimal64 value with exactly `fraction_digits` digits.
pub(crate) fn format_decimal(value: i128, fraction_digits: u8) -> String {
    let scale = 10i128.pow(fraction_digits as u32);
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / scale,
        abs % scale,
        width = fraction_digits as usize
    )
}

fn parse_decimal64(ty: &CType, text: &str) -> Result<String> {
    let value = parse_decimal(text, ty.fraction_digits).ok_or_else(|| {
        Error::invalid_value(format!("Invalid decimal64 value \"{}\".", text))
    })?;
    if value < i64::MIN as i128 || value > i64::MAX as i128 {
        return Err(Error::invalid_value(format!(
            "Value \"{}\" is out of type decimal64 min/max bounds.",
            text
        )));
    }
    if let Some(range) = &ty.range {
        if !in_intervals(range, value) {
            return Err(restriction_error(
                ErrorCode::InvalidValue,
                format!(
                    "Unsatisfied range - value \"{}\" is out of the allowed range.",
                    text
                ),
                &ty.range_error,
            ));
        }
    }
    Ok(format_decimal(value, ty.fraction_digits))
}

fn check_length(ty: &CType, len: usize, what: &str, text: &str) -> Result<()> {
    if let Some(length) = &ty.length {
        if !in_intervals(length, len as i128) {
            return Err(restriction_error(
                ErrorCode::InvalidValue,
                format!(
                    "Unsatisfied length - {} \"{}\" length is not allowed.",
                    what, text
                ),
                &ty.length_error,
            ));
        }
    }
    Ok(())
}

fn parse_string(ty: &CType, text: &str) -> Result<String> {
    check_length(ty, text.chars().count(), "string", text)?;
    for pattern in &ty.patterns {
        if pattern.regex.is_match(text) == pattern.invert {
            let msg = if pattern.invert {
                format!(
                    "Unsatisfied pattern - \"{}\" matches the inverted pattern \"{}\".",
                    text, pattern.text
                )
            } else {
                format!(
                    "Unsatisfied pattern - \"{}\" does not conform to \"{}\".",
                    text, pattern.text
                )
            };
            return Err(restriction_error(
                ErrorCode::PatternMismatch,
                msg,
                &pattern.error,
            ));
        }
    }
    Ok(text.to_owned())
}

fn parse_enum(ty: &CType, text: &str) -> Result<String> {
    match ty.enums.iter().find(|e| &*e.name == text) {
        Some(item) => Ok(item.name.to_string()),
        None => Err(Error::invalid_value(format!(
            "Invalid enumeration value \"{}\".",
            text
        ))),
    }
}

fn parse_bits(ty: &CType, text: &str) -> Result<String> {
    let mut set = Vec::new();
    for name in text.split_whitespace() {
        let bit = ty.bits.iter().find(|b| &*b.name == name).ok_or_else(|| {
            Error::invalid_value(format!("Invalid bit \"{}\".", name))
        })?;
        if set.iter().any(|(_, n)| *n == name) {
            return Err(Error::invalid_value(format!(
                "Bit \"{}\" used more than once.",
                name
            )));
        }
        set.push((bit.value, name));
    }
    set.sort_by_key(|(position, _)| *position);
    Ok(set.iter().map(|(_, n)| *n).collect::<Vec<_>>().join(" "))
}

fn parse_binary(ty: &CType, text: &str) -> Result<String> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64.decode(compact.as_bytes()).map_err(|_| {
        Error::invalid_value(format!("Invalid Base64 character in \"{}\".", text))
    })?;
    check_length(ty, bytes.len(), "binary", text)?;
    Ok(BASE64.encode(bytes))
}

/// Resolve a prefix in the given format.
pub(crate) fn resolve_prefix(
    schema: &CompiledSchema,
    format: PrefixFormat<'_>,
    prefix: &str,
) -> Option<ModuleId> {
    match format {
        PrefixFormat::Json => schema.module_by_name(prefix),
        PrefixFormat::Xml(bindings) => bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .and_then(|(_, ns)| schema.module_by_ns(ns)),
        PrefixFormat::Schema(module) => schema.resolve_prefix(module, prefix),
    }
}

fn parse_identityref(
    vctx: &ValueCtx<'_, '_>,
    ty: &CType,
    text: &str,
) -> Result<String> {
    let schema = vctx.schema;
    let (prefix, name) = split_prefix(text.trim());
    let module = match prefix {
        Some(prefix) => resolve_prefix(schema, vctx.format, prefix),
        None => match vctx.format {
            PrefixFormat::Schema(module) => Some(module),
            _ => Some(vctx.module),
        },
    }
    .ok_or_else(|| {
        Error::invalid_value(format!(
            "Invalid identityref \"{}\" value - unable to map prefix to YANG schema.",
            text
        ))
    })?;
    let identity = schema.find_identity(module, name).ok_or_else(|| {
        Error::invalid_value(format!(
            "Invalid identityref \"{}\" value - identity not found in module \"{}\".",
            text,
            schema.module(module).name
        ))
    })?;
    if !schema.identity(identity).enabled {
        return Err(Error::invalid_value(format!(
            "Invalid identityref \"{}\" value - identity is disabled by if-feature.",
            text
        )));
    }
    let derived = ty
        .bases
        .iter()
        .any(|base| schema.identity_derived_from(identity, *base));
    if !derived {
        let base = ty
            .bases
            .first()
            .map(|b| {
                let b = schema.identity(*b);
                format!("{}:{}", schema.module(b.module).name, b.name)
            })
            .unwrap_or_default();
        return Err(Error::invalid_value(format!(
            "Invalid identityref \"{}\" value - identity not derived from the base \"{}\".",
            text, base
        )));
    }
    Ok(format!("{}:{}", schema.module(module).name, name))
}

fn parse_instance_id(vctx: &ValueCtx<'_, '_>, text: &str) -> Result<String> {
    let schema = vctx.schema;
    let format = vctx.format;
    let resolver = |prefix: &str| resolve_prefix(schema, format, prefix);
    let invalid = || {
        Error::invalid_value(format!(
            "Invalid instance-identifier \"{}\" value.",
            text
        ))
    };
    let expr = xpath::parse(text, &resolver).map_err(|_| invalid())?;
    let path = match &expr {
        Expr::Path(path) if path.start == PathStart::Root => path,
        _ => return Err(invalid()),
    };
    let mut out = String::new();
    let mut current: Option<ModuleId> = None;
    for (index, step) in path.steps.iter().enumerate() {
        let (module, name) = match (&step.axis, &step.test) {
            (Axis::Child, NodeTest::Name { module, name }) => (*module, name),
            _ => return Err(invalid()),
        };
        let module = match (module, current) {
            (Some(m), _) => m,
            (None, Some(m)) if index > 0 => m,
            _ => return Err(invalid()),
        };
        out.push('/');
        if current != Some(module) {
            out.push_str(&schema.module(module).name);
            out.push(':');
        }
        out.push_str(name);
        current = Some(module);
        for predicate in &step.predicates {
            out.push('[');
            out.push_str(&instance_predicate(schema, predicate, module).ok_or_else(invalid)?);
            out.push(']');
        }
    }
    if out.is_empty() {
        return Err(invalid());
    }
    Ok(out)
}

fn instance_predicate(
    schema: &CompiledSchema,
    predicate: &Expr,
    module: ModuleId,
) -> Option<String> {
    match predicate {
        Expr::Number(n) if *n >= 1.0 && n.fract() == 0.0 => Some(format!("{}", *n as u64)),
        Expr::Cmp(xpath::CmpOp::Eq, lhs, rhs) => {
            let value = match rhs.as_ref() {
                Expr::Literal(value) => value,
                _ => return None,
            };
            let path = lhs.as_path()?;
            if path.start != PathStart::Context || path.steps.len() != 1 {
                return None;
            }
            let step = &path.steps[0];
            let name = match (&step.axis, &step.test) {
                (Axis::SelfAxis, NodeTest::Node) => ".".to_owned(),
                (Axis::Child, NodeTest::Name { module: m, name }) => match m {
                    Some(m) if *m != module => {
                        format!("{}:{}", schema.module(*m).name, name)
                    }
                    _ => name.clone(),
                },
                _ => return None,
            };
            Some(format!("{}={}", name, quote(value)))
        }
        _ => None,
    }
}

/// Quote a predicate value, preferring single quotes.
pub(crate) fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

// ===== output =====

/// Rewrite module-qualified names of a canonical identityref or
/// instance-identifier value with XML prefixes. Returns the value and the
/// namespace declarations it needs.
pub(crate) fn xml_value(
    schema: &CompiledSchema,
    value: &Value,
) -> (String, Vec<(Arc<str>, Arc<str>)>) {
    let mut decls: Vec<(Arc<str>, Arc<str>)> = Vec::new();
    let mut declare = |module_name: &str| -> Option<Arc<str>> {
        let module = schema.module(schema.module_by_name(module_name)?);
        if !decls.iter().any(|(p, _)| *p == module.prefix) {
            decls.push((module.prefix.clone(), module.namespace.clone()));
        }
        Some(module.prefix.clone())
    };
    match value.base {
        DataValueType::IdentityRef => {
            let (module, name) = split_prefix(&value.canonical);
            let text = match module.and_then(&mut declare) {
                Some(prefix) => format!("{}:{}", prefix, name),
                None => value.canonical.clone(),
            };
            (text, decls)
        }
        DataValueType::InstanceId => {
            let text = qualify_instance_id(&value.canonical, |module| declare(module));
            (text, decls)
        }
        _ => (value.canonical.clone(), decls),
    }
}

// Prefix every node name of a JSON instance-identifier with an XML prefix.
fn qualify_instance_id(
    canonical: &str,
    mut prefix_of: impl FnMut(&str) -> Option<Arc<str>>,
) -> String {
    let mut out = String::new();
    let mut current_prefix: Option<Arc<str>> = None;
    let mut chars = canonical.char_indices().peekable();
    let mut in_quote: Option<char> = None;
    let mut at_name = false;
    let mut name_start = 0;
    while let Some((i, c)) = chars.next() {
        if let Some(q) = in_quote {
            out.push(c);
            if c == q {
                in_quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                in_quote = Some(c);
                out.push(c);
            }
            '/' | '[' => {
                out.push(c);
                at_name = true;
                name_start = i + 1;
            }
            _ if at_name => {
                // Collect the name up to '=', '[', '/' or ']'.
                let mut end = i + c.len_utf8();
                while let Some((j, n)) = chars.peek().copied() {
                    if matches!(n, '=' | '[' | '/' | ']') {
                        break;
                    }
                    end = j + n.len_utf8();
                    chars.next();
                }
                let name = &canonical[name_start..end];
                at_name = false;
                if name == "." || name.bytes().all(|b| b.is_ascii_digit()) {
                    out.push_str(name);
                    continue;
                }
                let (module, local) = split_prefix(name);
                if let Some(module) = module {
                    current_prefix = prefix_of(module);
                }
                match &current_prefix {
                    Some(prefix) => {
                        out.push_str(prefix);
                        out.push(':');
                        out.push_str(local);
                    }
                    None => out.push_str(name),
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled::CPattern;
    use crate::dict::Dictionary;

    fn module() -> ModuleId {
        ModuleId::from_index(0)
    }

    fn check(ty: &CType, text: &str) -> Result<String> {
        let schema = CompiledSchema::default();
        let vctx = ValueCtx {
            schema: &schema,
            format: PrefixFormat::Json,
            module: module(),
        };
        parse_value(&vctx, ty, text).map(|v| v.canonical)
    }

    #[test]
    fn integers() {
        let ty = CType::builtin(DataValueType::Uint8, module());
        assert_eq!(check(&ty, "+007").unwrap(), "7");
        assert!(check(&ty, "256").is_err());
        assert!(check(&ty, "-1").is_err());
        assert!(check(&ty, "0x10").is_err());
    }

    #[test]
    fn decimal64() {
        let mut ty = CType::builtin(DataValueType::Dec64, module());
        ty.fraction_digits = 2;
        assert_eq!(check(&ty, "1").unwrap(), "1.00");
        assert_eq!(check(&ty, "-0.5").unwrap(), "-0.50");
        assert_eq!(check(&ty, "3.140").unwrap(), "3.14");
        assert!(check(&ty, "3.141").is_err());
        assert!(check(&ty, "3.").is_err());
    }

    #[test]
    fn pattern() {
        let dict = Dictionary::new();
        let mut ty = CType::builtin(DataValueType::String, module());
        ty.patterns.push(CPattern {
            text: Arc::from("a.*"),
            regex: dict.regex("a.*").unwrap(),
            invert: false,
            error: RestrictionError::default(),
        });
        assert_eq!(check(&ty, "apple").unwrap(), "apple");
        let err = check(&ty, "banana").unwrap_err();
        assert_eq!(err.errcode, ErrorCode::PatternMismatch);
        assert_eq!(
            err.to_string(),
            "Unsatisfied pattern - \"banana\" does not conform to \"a.*\"."
        );
    }

    #[test]
    fn binary() {
        let ty = CType::builtin(DataValueType::Binary, module());
        assert_eq!(check(&ty, "aGVs\nbG8=").unwrap(), "aGVsbG8=");
        assert!(check(&ty, "***").is_err());
    }

    #[test]
    fn instance_id_xml_prefixes() {
        let mut seen = Vec::new();
        let out = qualify_instance_id("/a:x/y[k='1/2']/b:z", |m| {
            seen.push(m.to_owned());
            Some(Arc::from(format!("p{}", m)))
        });
        assert_eq!(out, "/pa:x/pa:y[pa:k='1/2']/pb:z");
        assert_eq!(seen, vec!["a", "b"]);
    }
}
