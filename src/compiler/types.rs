//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Type resolution: typedef chains, restrictions and their narrowing.

use std::rc::Rc;
use std::sync::Arc;

use crate::compiled::{
    integer_bounds, CEnum, CLeafref, CPattern, CType, Interval,
    RestrictionError,
};
use crate::compiler::identifiers::is_builtin_type;
use crate::compiler::{addr, Compiler, Scope};
use crate::ids::ModuleId;
use crate::error::{Error, ErrorCode, Result};
use crate::parsed::{PEnumItem, PGrouping, PRestriction, PType, PTypedef};
use crate::schema::DataValueType;
use crate::utils::split_prefix;
use crate::value::{parse_decimal, parse_i128};

fn builtin_base(name: &str) -> DataValueType {
    match name {
        "binary" => DataValueType::Binary,
        "bits" => DataValueType::Bits,
        "boolean" => DataValueType::Bool,
        "decimal64" => DataValueType::Dec64,
        "empty" => DataValueType::Empty,
        "enumeration" => DataValueType::Enum,
        "identityref" => DataValueType::IdentityRef,
        "instance-identifier" => DataValueType::InstanceId,
        "int8" => DataValueType::Int8,
        "int16" => DataValueType::Int16,
        "int32" => DataValueType::Int32,
        "int64" => DataValueType::Int64,
        "leafref" => DataValueType::LeafRef,
        "string" => DataValueType::String,
        "uint8" => DataValueType::Uint8,
        "uint16" => DataValueType::Uint16,
        "uint32" => DataValueType::Uint32,
        "uint64" => DataValueType::Uint64,
        "union" => DataValueType::Union,
        _ => DataValueType::Unknown,
    }
}

/// Name of a built-in type.
pub(crate) fn base_name(base: DataValueType) -> &'static str {
    match base {
        DataValueType::Binary => "binary",
        DataValueType::Bits => "bits",
        DataValueType::Bool => "boolean",
        DataValueType::Dec64 => "decimal64",
        DataValueType::Empty => "empty",
        DataValueType::Enum => "enumeration",
        DataValueType::IdentityRef => "identityref",
        DataValueType::InstanceId => "instance-identifier",
        DataValueType::Int8 => "int8",
        DataValueType::Int16 => "int16",
        DataValueType::Int32 => "int32",
        DataValueType::Int64 => "int64",
        DataValueType::LeafRef => "leafref",
        DataValueType::String => "string",
        DataValueType::Uint8 => "uint8",
        DataValueType::Uint16 => "uint16",
        DataValueType::Uint32 => "uint32",
        DataValueType::Uint64 => "uint64",
        DataValueType::Union => "union",
        DataValueType::Unknown => "unknown",
    }
}

fn is_numeric(base: DataValueType) -> bool {
    integer_bounds(base).is_some()
}

/// Parse a range or length argument, narrowing `parent`.
pub(crate) fn parse_intervals(
    text: &str,
    base: DataValueType,
    fraction_digits: u8,
    parent: &[Interval],
    what: &str,
) -> Result<Vec<Interval>> {
    let invalid = |detail: String| {
        Error::compile(format!(
            "Invalid {} restriction - {} ({}).",
            what, detail, text
        ))
    };
    let (parent_min, parent_max) = match (parent.first(), parent.last()) {
        (Some(first), Some(last)) => (first.min, last.max),
        _ => return Err(invalid("no base restriction".to_owned())),
    };
    let bound = |s: &str| -> Result<i128> {
        match s {
            "min" => Ok(parent_min),
            "max" => Ok(parent_max),
            _ => {
                let value = if base == DataValueType::Dec64 {
                    parse_decimal(s, fraction_digits)
                } else {
                    parse_i128(s)
                };
                value.ok_or_else(|| invalid(format!("invalid value \"{}\"", s)))
            }
        }
    };

    let mut intervals: Vec<Interval> = Vec::new();
    for part in text.split('|') {
        let part = part.trim();
        let (lo, hi) = match part.split_once("..") {
            Some((lo, hi)) => (bound(lo.trim())?, bound(hi.trim())?),
            None => {
                let value = bound(part)?;
                (value, value)
            }
        };
        if lo > hi {
            return Err(invalid("min value is bigger than max".to_owned()));
        }
        if let Some(prev) = intervals.last() {
            if lo <= prev.max {
                return Err(invalid(
                    "values are not in ascending order".to_owned(),
                ));
            }
        }
        intervals.push(Interval { min: lo, max: hi });
    }

    for interval in &intervals {
        let contained = parent
            .iter()
            .any(|p| p.min <= interval.min && interval.max <= p.max);
        if !contained {
            return Err(invalid(
                "the derived restriction is not equally or more limiting"
                    .to_owned(),
            ));
        }
    }
    Ok(intervals)
}

impl<'c> Compiler<'c> {
    /// Compile all module-level and grouping-level typedefs, so that errors
    /// in them are reported even when they are not used.
    pub(super) fn compile_typedefs(&mut self) -> Result<()> {
        let entries = self.entries;
        for index in 0..entries.len() {
            let scope = self.root_scope(ModuleId::from_index(index));
            self.compile_scope_typedefs(&scope)?;
        }
        Ok(())
    }

    fn compile_scope_typedefs(&mut self, scope: &Rc<Scope<'c>>) -> Result<()> {
        for typedef in scope.typedefs {
            self.compile_typedef(typedef, scope)?;
        }
        for grouping in scope.groupings {
            let inner = grouping_scope(scope, grouping);
            self.compile_scope_typedefs(&inner)?;
        }
        Ok(())
    }

    fn compile_typedef(
        &mut self,
        typedef: &'c PTypedef,
        scope: &Rc<Scope<'c>>,
    ) -> Result<Arc<CType>> {
        let key = addr(typedef);
        if let Some(ty) = self.typedef_cache.get(&key) {
            return Ok(ty.clone());
        }
        if self.typedef_stack.contains(&key) {
            return Err(Error::new(
                ErrorCode::CyclicDefinition,
                format!(
                    "Invalid typedef \"{}\" - circular chain of typedefs.",
                    typedef.name
                ),
            ));
        }
        self.typedef_stack.push(key);
        let result = self.compile_type(&typedef.ty, scope);
        self.typedef_stack.pop();

        let mut ty = (*result.map_err(|err| {
            let msg = err.msg.clone().unwrap_or_default();
            match err.errcode {
                ErrorCode::CyclicDefinition => err,
                _ => Error {
                    msg: Some(format!("{} (typedef \"{}\")", msg, typedef.name)),
                    ..err
                },
            }
        })?)
        .clone();
        ty.typedef_name = Some(self.intern(&typedef.name));
        if let Some(default) = &typedef.default {
            ty.default = Some((self.intern(default), scope.module));
        }
        if let Some(units) = &typedef.units {
            ty.units = Some(self.intern(units));
        }
        let ty = Arc::new(ty);
        self.typedef_cache.insert(key, ty.clone());
        Ok(ty)
    }

    fn find_typedef(
        &self,
        name: &str,
        scope: &Rc<Scope<'c>>,
    ) -> Result<(&'c PTypedef, Rc<Scope<'c>>)> {
        let (prefix, local) = split_prefix(name);
        let module = match prefix {
            Some(prefix) => self.prefix_module(scope.module, prefix).ok_or_else(|| {
                Error::compile(format!("Invalid prefix \"{}\" of type \"{}\".", prefix, name))
            })?,
            None => scope.module,
        };
        if module == scope.module {
            let mut current = Some(scope.clone());
            while let Some(s) = current {
                if let Some(typedef) = s.typedefs.iter().find(|t| t.name == local) {
                    return Ok((typedef, s));
                }
                current = s.parent.clone();
            }
        } else {
            let root = self.root_scope(module);
            if let Some(typedef) = root.typedefs.iter().find(|t| t.name == local) {
                return Ok((typedef, root));
            }
        }
        Err(Error::compile(format!("Referenced type \"{}\" not found.", name)))
    }

    /// Compile a type statement in the given lexical scope.
    pub(crate) fn compile_type(
        &mut self,
        ptype: &'c PType,
        scope: &Rc<Scope<'c>>,
    ) -> Result<Arc<CType>> {
        let (prefix, local) = split_prefix(&ptype.name);
        let builtin = prefix.is_none() && is_builtin_type(local);
        let base = if builtin {
            Arc::new(CType::builtin(builtin_base(local), scope.module))
        } else {
            let (typedef, tscope) = self.find_typedef(&ptype.name, scope)?;
            self.compile_typedef(typedef, &tscope)?
        };

        let has_restrictions = ptype.range.is_some()
            || ptype.length.is_some()
            || !ptype.patterns.is_empty()
            || !ptype.enums.is_empty()
            || !ptype.bits.is_empty()
            || ptype.fraction_digits.is_some()
            || ptype.path.is_some()
            || ptype.require_instance.is_some()
            || !ptype.bases.is_empty()
            || !ptype.types.is_empty();
        if !builtin && !has_restrictions {
            return Ok(base);
        }

        let mut ty = (*base).clone();
        ty.module = scope.module;
        let base_type = ty.base;
        let restriction_error = || {
            Error::compile(format!(
                "Invalid type restrictions for {} type.",
                base_name(base_type)
            ))
        };

        // Built-in types that require substatements.
        if builtin {
            match base_type {
                DataValueType::Dec64 => {
                    let fd = ptype.fraction_digits.ok_or_else(|| {
                        Error::compile(
                            "Missing fraction-digits substatement for decimal64 type.",
                        )
                    })?;
                    ty.fraction_digits = fd;
                }
                DataValueType::Enum if ptype.enums.is_empty() => {
                    return Err(Error::compile(
                        "Missing enum substatement for enumeration type.",
                    ))
                }
                DataValueType::Bits if ptype.bits.is_empty() => {
                    return Err(Error::compile(
                        "Missing bit substatement for bits type.",
                    ))
                }
                DataValueType::LeafRef if ptype.path.is_none() => {
                    return Err(Error::compile(
                        "Missing path substatement for leafref type.",
                    ))
                }
                DataValueType::IdentityRef if ptype.bases.is_empty() => {
                    return Err(Error::compile(
                        "Missing base substatement for identityref type.",
                    ))
                }
                DataValueType::Union if ptype.types.is_empty() => {
                    return Err(Error::compile(
                        "Missing type substatement for union type.",
                    ))
                }
                _ => (),
            }
        } else if ptype.fraction_digits.is_some()
            || ptype.path.is_some()
            || !ptype.bases.is_empty()
            || !ptype.types.is_empty()
        {
            return Err(restriction_error());
        }

        if let Some(range) = &ptype.range {
            if !is_numeric(base_type) {
                return Err(restriction_error());
            }
            let parent = ty.range.clone().unwrap_or_default();
            let intervals = parse_intervals(
                &range.arg,
                base_type,
                ty.fraction_digits,
                &parent,
                "range",
            )?;
            ty.range = Some(intervals);
            ty.range_text.push(self.intern(&range.arg));
            ty.range_error = self.restriction_error(range);
        }

        if let Some(length) = &ptype.length {
            if !matches!(base_type, DataValueType::String | DataValueType::Binary) {
                return Err(restriction_error());
            }
            let parent = ty.length.clone().unwrap_or_default();
            let intervals =
                parse_intervals(&length.arg, DataValueType::Uint64, 0, &parent, "length")?;
            ty.length = Some(intervals);
            ty.length_text.push(self.intern(&length.arg));
            ty.length_error = self.restriction_error(length);
        }

        if !ptype.patterns.is_empty() {
            if base_type != DataValueType::String {
                return Err(restriction_error());
            }
            for pattern in &ptype.patterns {
                let regex = self.dict.regex(&pattern.arg).map_err(|err| {
                    Error::compile(format!(
                        "Regular expression \"{}\" is not valid ({}).",
                        pattern.arg, err
                    ))
                })?;
                ty.patterns.push(CPattern {
                    text: self.intern(&pattern.arg),
                    regex,
                    invert: pattern.invert_match,
                    error: RestrictionError {
                        message: self.intern_opt(pattern.error_message.as_deref()),
                        app_tag: self.intern_opt(pattern.error_app_tag.as_deref()),
                    },
                });
            }
        }

        if !ptype.enums.is_empty() {
            if base_type != DataValueType::Enum {
                return Err(restriction_error());
            }
            ty.enums = self.compile_enum_items(
                scope,
                &ptype.enums,
                &ty.enums,
                builtin,
                "enumeration",
            )?;
        }

        if !ptype.bits.is_empty() {
            if base_type != DataValueType::Bits {
                return Err(restriction_error());
            }
            ty.bits =
                self.compile_enum_items(scope, &ptype.bits, &ty.bits, builtin, "bits")?;
        }

        if let Some(require_instance) = ptype.require_instance {
            if !matches!(
                base_type,
                DataValueType::LeafRef | DataValueType::InstanceId
            ) {
                return Err(restriction_error());
            }
            ty.require_instance = require_instance;
        }

        if let Some(path) = &ptype.path {
            let expr = self.parse_xpath(scope.module, path).map_err(|err| {
                Error::compile(format!(
                    "Invalid leafref path \"{}\" - {}",
                    path, err
                ))
            })?;
            ty.leafref = Some(Box::new(CLeafref {
                path: self.intern(path),
                expr,
                target: None,
                realtype: None,
            }));
        }

        if !ptype.bases.is_empty() {
            for base in &ptype.bases {
                let id = self.resolve_identity(scope.module, base)?;
                ty.bases.push(id);
            }
        }

        if !ptype.types.is_empty() {
            for member in &ptype.types {
                let member = self.compile_type(member, scope)?;
                ty.union.push(member);
            }
        }

        if !builtin {
            ty.typedef_name = Some(self.intern(local));
        }
        Ok(Arc::new(ty))
    }

    fn restriction_error(&mut self, restriction: &PRestriction) -> RestrictionError {
        RestrictionError {
            message: self.intern_opt(restriction.error_message.as_deref()),
            app_tag: self.intern_opt(restriction.error_app_tag.as_deref()),
        }
    }

    fn compile_enum_items(
        &mut self,
        scope: &Rc<Scope<'c>>,
        items: &'c [PEnumItem],
        base_items: &[CEnum],
        builtin: bool,
        what: &str,
    ) -> Result<Vec<CEnum>> {
        let is_bits = what == "bits";
        let mut out: Vec<CEnum> = Vec::new();
        let mut next: i64 = 0;
        for item in items {
            if out.iter().any(|e| *e.name == item.name) {
                return Err(Error::compile(format!(
                    "Duplicate identifier \"{}\" of {} item.",
                    item.name, what
                )));
            }
            let value = if builtin {
                let value = item.value.unwrap_or(next);
                let valid = if is_bits {
                    (0..=u32::MAX as i64).contains(&value)
                } else {
                    (i32::MIN as i64..=i32::MAX as i64).contains(&value)
                };
                if !valid {
                    return Err(Error::compile(format!(
                        "Invalid {} - value {} of \"{}\" is out of range.",
                        what, value, item.name
                    )));
                }
                value
            } else {
                let base = base_items.iter().find(|e| *e.name == item.name).ok_or_else(
                    || {
                        Error::compile(format!(
                            "Invalid {} - derived type adds new item \"{}\".",
                            what, item.name
                        ))
                    },
                )?;
                if let Some(value) = item.value {
                    if value != base.value {
                        return Err(Error::compile(format!(
                            "Invalid {} - value of the item \"{}\" has changed from {} to {} in the derived type.",
                            what, item.name, base.value, value
                        )));
                    }
                }
                base.value
            };
            if let Some(other) = out.iter().find(|e| e.value == value) {
                return Err(Error::compile(format!(
                    "Invalid {} - value {} collide with \"{}\".",
                    what, value, other.name
                )));
            }
            next = value.saturating_add(1).max(next);

            let mut if_features = Vec::new();
            for text in &item.if_features {
                if_features.push(self.compile_if_feature(scope.module, text)?);
            }
            if !self.if_features_enabled(&if_features) {
                continue;
            }
            out.push(CEnum {
                name: self.intern(&item.name),
                value,
                status: item.status.unwrap_or_default(),
                description: self.intern_opt(item.description.as_deref()),
            });
        }
        Ok(out)
    }
}

/// Scope of the contents of a grouping.
pub(crate) fn grouping_scope<'c>(
    scope: &Rc<Scope<'c>>,
    grouping: &'c PGrouping,
) -> Rc<Scope<'c>> {
    Rc::new(Scope {
        module: scope.module,
        typedefs: &grouping.typedefs,
        groupings: &grouping.groupings,
        parent: Some(scope.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int32() -> Vec<Interval> {
        vec![Interval {
            min: i32::MIN as i128,
            max: i32::MAX as i128,
        }]
    }

    #[test]
    fn narrowing() {
        let base = parse_intervals("0..100", DataValueType::Int32, 0, &int32(), "range")
            .unwrap();
        assert_eq!(base, vec![Interval { min: 0, max: 100 }]);
        let err = parse_intervals("50..200", DataValueType::Int32, 0, &base, "range")
            .unwrap_err();
        assert!(err.to_string().contains("not equally or more limiting"));
        assert!(parse_intervals("50..max", DataValueType::Int32, 0, &base, "range").is_ok());
    }

    #[test]
    fn multiple_parts() {
        let parts =
            parse_intervals("1 | 5..10 | 20..max", DataValueType::Int32, 0, &int32(), "range")
                .unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parse_intervals("5..10 | 1", DataValueType::Int32, 0, &int32(), "range")
            .is_err());
    }

    #[test]
    fn decimal_bounds() {
        let parent = vec![Interval {
            min: i64::MIN as i128,
            max: i64::MAX as i128,
        }];
        let parts =
            parse_intervals("-1.5..2.25", DataValueType::Dec64, 2, &parent, "range").unwrap();
        assert_eq!(parts, vec![Interval { min: -150, max: 225 }]);
    }
}
