//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Features, if-feature expressions and feature pruning.

use std::sync::Arc;

use crate::compiled::CompiledSchema;
use crate::compiler::Compiler;
use crate::error::{Error, ErrorCode, Result};
use crate::ids::{ModuleId, SchemaId};
use crate::utils::split_prefix;

/// Compiled if-feature expression.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct IfFeature {
    pub expr: FeatureExpr,
    pub text: Arc<str>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum FeatureExpr {
    /// Feature of a module, by index in its definition order.
    Feature(ModuleId, usize),
    Not(Box<FeatureExpr>),
    And(Box<FeatureExpr>, Box<FeatureExpr>),
    Or(Box<FeatureExpr>, Box<FeatureExpr>),
}

// ===== impl IfFeature =====

impl IfFeature {
    pub(crate) fn eval(&self, schema: &CompiledSchema) -> bool {
        self.expr.eval(&|module, index| {
            schema
                .module(module)
                .features
                .get(index)
                .map(|(_, value)| *value)
                .unwrap_or(false)
        })
    }
}

impl FeatureExpr {
    pub(crate) fn eval(&self, value: &dyn Fn(ModuleId, usize) -> bool) -> bool {
        match self {
            FeatureExpr::Feature(module, index) => value(*module, *index),
            FeatureExpr::Not(expr) => !expr.eval(value),
            FeatureExpr::And(a, b) => a.eval(value) && b.eval(value),
            FeatureExpr::Or(a, b) => a.eval(value) || b.eval(value),
        }
    }

    fn features(&self, out: &mut Vec<(ModuleId, usize)>) {
        match self {
            FeatureExpr::Feature(module, index) => out.push((*module, *index)),
            FeatureExpr::Not(expr) => expr.features(out),
            FeatureExpr::And(a, b) | FeatureExpr::Or(a, b) => {
                a.features(out);
                b.features(out);
            }
        }
    }
}

// ===== if-feature parser =====

#[derive(Debug, PartialEq)]
enum Tok<'s> {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Name(&'s str),
}

fn tokenize(text: &str) -> Vec<Tok<'_>> {
    let mut toks = Vec::new();
    let mut rest = text;
    loop {
        rest = rest.trim_start();
        let Some(c) = rest.chars().next() else {
            break;
        };
        match c {
            '(' => {
                toks.push(Tok::LParen);
                rest = &rest[1..];
            }
            ')' => {
                toks.push(Tok::RParen);
                rest = &rest[1..];
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
                    .unwrap_or(rest.len());
                let word = &rest[..end];
                toks.push(match word {
                    "not" => Tok::Not,
                    "and" => Tok::And,
                    "or" => Tok::Or,
                    _ => Tok::Name(word),
                });
                rest = &rest[end..];
            }
        }
    }
    toks
}

struct Parser<'s, 'r> {
    toks: Vec<Tok<'s>>,
    pos: usize,
    resolve: &'r dyn Fn(&str) -> Result<(ModuleId, usize)>,
}

impl Parser<'_, '_> {
    fn or_expr(&mut self) -> Result<FeatureExpr> {
        let mut lhs = self.and_expr()?;
        while self.toks.get(self.pos) == Some(&Tok::Or) {
            self.pos += 1;
            lhs = FeatureExpr::Or(Box::new(lhs), Box::new(self.and_expr()?));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<FeatureExpr> {
        let mut lhs = self.factor()?;
        while self.toks.get(self.pos) == Some(&Tok::And) {
            self.pos += 1;
            lhs = FeatureExpr::And(Box::new(lhs), Box::new(self.factor()?));
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<FeatureExpr> {
        let tok = self.toks.get(self.pos);
        self.pos += 1;
        match tok {
            Some(Tok::Not) => Ok(FeatureExpr::Not(Box::new(self.factor()?))),
            Some(Tok::LParen) => {
                let expr = self.or_expr()?;
                if self.toks.get(self.pos) != Some(&Tok::RParen) {
                    return Err(Error::syntax("Missing closing parenthesis"));
                }
                self.pos += 1;
                Ok(expr)
            }
            Some(Tok::Name(name)) => {
                let (module, index) = (self.resolve)(name)?;
                Ok(FeatureExpr::Feature(module, index))
            }
            _ => Err(Error::syntax("Unexpected token")),
        }
    }
}

// ===== impl Compiler =====

impl Compiler<'_> {
    /// Compile an if-feature statement written in `module`.
    pub(crate) fn compile_if_feature(
        &mut self,
        module: ModuleId,
        text: &str,
    ) -> Result<Arc<IfFeature>> {
        let resolve = |name: &str| -> Result<(ModuleId, usize)> {
            let (prefix, local) = split_prefix(name);
            let target = match prefix {
                Some(prefix) => self.prefix_module(module, prefix).ok_or_else(|| {
                    Error::compile(format!("Invalid prefix \"{}\".", prefix))
                })?,
                None => module,
            };
            self.entries[target.to_index()]
                .parsed
                .features
                .iter()
                .position(|f| f.name == local)
                .map(|index| (target, index))
                .ok_or_else(|| {
                    Error::new(
                        ErrorCode::NotFound,
                        format!("Feature \"{}\" not found.", name),
                    )
                })
        };
        let mut parser = Parser {
            toks: tokenize(text),
            pos: 0,
            resolve: &resolve,
        };
        let expr = parser
            .or_expr()
            .and_then(|expr| {
                if parser.pos != parser.toks.len() {
                    return Err(Error::syntax("Unexpected trailing tokens"));
                }
                Ok(expr)
            })
            .map_err(|err| {
                Error::compile(format!(
                    "Invalid value \"{}\" of if-feature - {}",
                    text, err
                ))
            })?;
        let text = self.intern(text);
        Ok(Arc::new(IfFeature { expr, text }))
    }

    /// Compute the effective value of every feature. A feature is enabled
    /// when requested and all of its if-features are true.
    pub(super) fn compile_features(&mut self) -> Result<()> {
        // Parse all if-features first.
        let entries = self.entries;
        let mut exprs: Vec<Vec<Vec<Arc<IfFeature>>>> = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            let module = ModuleId::from_index(index);
            let mut per_module = Vec::new();
            for feature in &entry.parsed.features {
                let mut list = Vec::new();
                for text in &feature.if_features {
                    list.push(self.compile_if_feature(module, text)?);
                }
                per_module.push(list);
            }
            exprs.push(per_module);
        }

        // 0 = unknown, 1 = in progress, 2 = done.
        let mut state: Vec<Vec<u8>> =
            exprs.iter().map(|m| vec![0; m.len()]).collect();
        let mut values: Vec<Vec<bool>> =
            exprs.iter().map(|m| vec![false; m.len()]).collect();

        fn visit(
            c: &Compiler<'_>,
            exprs: &[Vec<Vec<Arc<IfFeature>>>],
            state: &mut [Vec<u8>],
            values: &mut [Vec<bool>],
            module: usize,
            index: usize,
        ) -> Result<()> {
            match state[module][index] {
                2 => return Ok(()),
                1 => {
                    let name = &c.entries[module].parsed.features[index].name;
                    return Err(Error::new(
                        ErrorCode::CyclicDefinition,
                        format!(
                            "Feature \"{}\" is indirectly referenced from itself.",
                            name
                        ),
                    ));
                }
                _ => (),
            }
            state[module][index] = 1;
            let mut deps = Vec::new();
            for iff in &exprs[module][index] {
                iff.expr.features(&mut deps);
            }
            for (m, i) in deps {
                visit(c, exprs, state, values, m.to_index(), i)?;
            }
            let entry = &c.entries[module];
            let name = &entry.parsed.features[index].name;
            let requested = entry.features.iter().any(|f| f == "*" || f == name);
            let value = requested
                && exprs[module][index].iter().all(|iff| {
                    iff.expr
                        .eval(&|m, i| values[m.to_index()].get(i).copied().unwrap_or(false))
                });
            values[module][index] = value;
            state[module][index] = 2;
            Ok(())
        }

        for module in 0..exprs.len() {
            for index in 0..exprs[module].len() {
                visit(self, &exprs, &mut state, &mut values, module, index)?;
            }
        }

        for (index, entry) in entries.iter().enumerate() {
            let features = entry
                .parsed
                .features
                .iter()
                .zip(values[index].iter())
                .map(|(f, v)| (self.dict.intern(&f.name), *v))
                .collect();
            self.out.modules[index].features = features;
        }
        Ok(())
    }

    /// Evaluate a list of if-features (all must be true).
    pub(crate) fn if_features_enabled(&self, list: &[Arc<IfFeature>]) -> bool {
        list.iter().all(|iff| iff.eval(&self.out))
    }

    /// Remove all nodes whose if-features evaluate to false.
    pub(super) fn prune_features(&mut self) -> Result<()> {
        let disabled: Vec<SchemaId> = (0..self.out.nodes.len())
            .map(SchemaId::from_index)
            .filter(|id| {
                let node = self.out.node(*id);
                !node.detached && !self.if_features_enabled(&node.if_features)
            })
            .collect();
        for id in disabled {
            if !self.out.node(id).detached {
                self.detach(id);
            }
        }
        Ok(())
    }

    /// Unlink a node from its parent (or module) and mark its subtree.
    pub(crate) fn detach(&mut self, id: SchemaId) {
        let node = self.out.node(id);
        let module = node.module;
        match node.parent {
            Some(parent) => {
                let parent = self.out.node_mut(parent);
                parent.children.retain(|c| *c != id);
                parent.actions.retain(|c| *c != id);
                parent.notifications.retain(|c| *c != id);
            }
            None => {
                let module = &mut self.out.modules[module.to_index()];
                module.data.retain(|c| *c != id);
                module.rpcs.retain(|c| *c != id);
                module.notifications.retain(|c| *c != id);
            }
        }
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = self.out.node_mut(id);
            node.detached = true;
            stack.extend(node.children.iter().copied());
            stack.extend(node.actions.iter().copied());
            stack.extend(node.notifications.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence() {
        let toks = tokenize("not a and (b or c)");
        assert_eq!(toks[0], Tok::Not);
        assert_eq!(toks[3], Tok::LParen);
        let resolve = |name: &str| -> Result<(ModuleId, usize)> {
            let index = match name {
                "a" => 0,
                "b" => 1,
                _ => 2,
            };
            Ok((ModuleId::from_index(0), index))
        };
        let mut parser = Parser {
            toks,
            pos: 0,
            resolve: &resolve,
        };
        let expr = parser.or_expr().unwrap();
        assert!(matches!(expr, FeatureExpr::And(_, _)));
        // a=false, b=false, c=true
        let value = |_: ModuleId, i: usize| i == 2;
        assert!(expr.eval(&value));
    }
}
