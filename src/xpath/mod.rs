//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! XPath 1.0 expressions as used by YANG (when, must, leafref paths,
//! instance-identifiers and data lookups).
//!
//! Prefixes are resolved to modules while parsing, so that an expression can
//! be evaluated independently of the prefix bindings it was written with.

pub(crate) mod eval;
pub(crate) mod schema;

use crate::error::{Error, Result};
use crate::ids::ModuleId;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Literal(String),
    Number(f64),
    Function(String, Vec<Expr>),
    Path(Path),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PathStart {
    Root,
    Context,
    /// Filter expression with its predicates.
    Filter(Box<Expr>, Vec<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Path {
    pub start: PathStart,
    pub steps: Vec<Step>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    SelfAxis,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum NodeTest {
    /// `module` is `None` for unprefixed names.
    Name {
        module: Option<ModuleId>,
        name: String,
    },
    Any {
        module: Option<ModuleId>,
    },
    Node,
    Text,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDot,
    At,
    Comma,
    ColonColon,
    Slash,
    DoubleSlash,
    Pipe,
    Plus,
    Minus,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Mul,
    And,
    Or,
    Mod,
    Div,
    Name(Option<String>, String),
    Function(String),
    NodeType(String),
    Axis(String),
    Literal(String),
    Number(f64),
    Var(String),
}

// ===== tokenizer =====

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn tokenize(src: &str) -> Result<Vec<Tok>> {
    let chars: Vec<char> = src.chars().collect();
    let mut toks: Vec<Tok> = Vec::new();
    let mut i = 0;

    // Whether the previous token allows an operator to follow.
    let operator_context = |toks: &Vec<Tok>| match toks.last() {
        None => false,
        Some(t) => !matches!(
            t,
            Tok::At
                | Tok::ColonColon
                | Tok::LParen
                | Tok::LBracket
                | Tok::Comma
                | Tok::Slash
                | Tok::DoubleSlash
                | Tok::Pipe
                | Tok::Plus
                | Tok::Minus
                | Tok::Eq
                | Tok::Ne
                | Tok::Lt
                | Tok::Le
                | Tok::Gt
                | Tok::Ge
                | Tok::Mul
                | Tok::And
                | Tok::Or
                | Tok::Mod
                | Tok::Div
        ),
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '[' => {
                toks.push(Tok::LBracket);
                i += 1;
            }
            ']' => {
                toks.push(Tok::RBracket);
                i += 1;
            }
            '@' => {
                toks.push(Tok::At);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '|' => {
                toks.push(Tok::Pipe);
                i += 1;
            }
            '+' => {
                toks.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '=' => {
                toks.push(Tok::Eq);
                i += 1;
            }
            '!' if next == Some('=') => {
                toks.push(Tok::Ne);
                i += 2;
            }
            '<' if next == Some('=') => {
                toks.push(Tok::Le);
                i += 2;
            }
            '<' => {
                toks.push(Tok::Lt);
                i += 1;
            }
            '>' if next == Some('=') => {
                toks.push(Tok::Ge);
                i += 2;
            }
            '>' => {
                toks.push(Tok::Gt);
                i += 1;
            }
            ':' if next == Some(':') => {
                toks.push(Tok::ColonColon);
                i += 2;
            }
            '/' if next == Some('/') => {
                toks.push(Tok::DoubleSlash);
                i += 2;
            }
            '/' => {
                toks.push(Tok::Slash);
                i += 1;
            }
            '.' if next == Some('.') => {
                toks.push(Tok::DotDot);
                i += 2;
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => {
                toks.push(Tok::Dot);
                i += 1;
            }
            '*' => {
                if operator_context(&toks) {
                    toks.push(Tok::Mul);
                } else {
                    toks.push(Tok::Name(None, "*".to_owned()));
                }
                i += 1;
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or_else(|| Error::syntax("Unterminated XPath literal"))?;
                toks.push(Tok::Literal(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            '$' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && (is_name_char(chars[i]) || chars[i] == ':')
                {
                    i += 1;
                }
                toks.push(Tok::Var(chars[start..i].iter().collect()));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.')
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text.parse::<f64>().map_err(|_| {
                    Error::syntax(format!("Invalid XPath number \"{}\"", text))
                })?;
                toks.push(Tok::Number(n));
            }
            c if is_name_start(c) => {
                let start = i;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                let first: String = chars[start..i].iter().collect();

                if operator_context(&toks) {
                    let op = match first.as_str() {
                        "and" => Tok::And,
                        "or" => Tok::Or,
                        "mod" => Tok::Mod,
                        "div" => Tok::Div,
                        _ => {
                            return Err(Error::syntax(format!(
                                "Unexpected XPath token \"{}\"",
                                first
                            )))
                        }
                    };
                    toks.push(op);
                    continue;
                }

                // Prefixed name or prefix wildcard.
                let mut prefix = None;
                let mut local = first;
                if chars.get(i) == Some(&':') && chars.get(i + 1) != Some(&':') {
                    match chars.get(i + 1) {
                        Some('*') => {
                            prefix = Some(local);
                            local = "*".to_owned();
                            i += 2;
                        }
                        Some(&n) if is_name_start(n) => {
                            let lstart = i + 1;
                            i = lstart;
                            while i < chars.len() && is_name_char(chars[i]) {
                                i += 1;
                            }
                            prefix = Some(local);
                            local = chars[lstart..i].iter().collect();
                        }
                        _ => {
                            return Err(Error::syntax(format!(
                                "Invalid XPath name \"{}:\"",
                                local
                            )))
                        }
                    }
                }

                // Look ahead past whitespace.
                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                let following = chars.get(j).copied();
                let following2 = chars.get(j + 1).copied();
                if prefix.is_none() && following == Some(':') && following2 == Some(':')
                {
                    toks.push(Tok::Axis(local));
                    toks.push(Tok::ColonColon);
                    i = j + 2;
                    continue;
                }
                if following == Some('(') && prefix.is_none() {
                    if matches!(
                        local.as_str(),
                        "node" | "text" | "comment" | "processing-instruction"
                    ) {
                        toks.push(Tok::NodeType(local));
                    } else {
                        toks.push(Tok::Function(local));
                    }
                    continue;
                }
                toks.push(Tok::Name(prefix, local));
            }
            _ => {
                return Err(Error::syntax(format!(
                    "Invalid character '{}' in XPath expression",
                    c
                )))
            }
        }
    }
    Ok(toks)
}

// ===== parser =====

/// Prefix resolution callback: maps a prefix to a module.
pub(crate) type PrefixResolver<'r> = &'r dyn Fn(&str) -> Option<ModuleId>;

struct Parser<'r> {
    toks: Vec<Tok>,
    pos: usize,
    resolver: PrefixResolver<'r>,
}

/// Parse an XPath expression.
pub(crate) fn parse(src: &str, resolver: PrefixResolver<'_>) -> Result<Expr> {
    let toks = tokenize(src)?;
    let mut parser = Parser {
        toks,
        pos: 0,
        resolver,
    };
    let expr = parser.or_expr()?;
    if parser.pos != parser.toks.len() {
        return Err(Error::syntax(format!(
            "Unexpected trailing tokens in XPath expression \"{}\"",
            src
        )));
    }
    Ok(expr)
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok) -> Result<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(Error::syntax(format!(
                "Expected {:?} in XPath expression, found {:?}",
                tok,
                self.peek()
            )))
        }
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Tok::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.equality_expr()?;
        while self.eat(&Tok::And) {
            let rhs = self.equality_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.relational_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Eq) => CmpOp::Eq,
                Some(Tok::Ne) => CmpOp::Ne,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.relational_expr()?;
            lhs = Expr::Cmp(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn relational_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.additive_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Lt) => CmpOp::Lt,
                Some(Tok::Le) => CmpOp::Le,
                Some(Tok::Gt) => CmpOp::Gt,
                Some(Tok::Ge) => CmpOp::Ge,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.additive_expr()?;
            lhs = Expr::Cmp(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn additive_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => ArithOp::Add,
                Some(Tok::Minus) => ArithOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative_expr()?;
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Mul) => ArithOp::Mul,
                Some(Tok::Div) => ArithOp::Div,
                Some(Tok::Mod) => ArithOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary_expr()?;
            lhs = Expr::Arith(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        if self.eat(&Tok::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary_expr()?)));
        }
        self.union_expr()
    }

    fn union_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.path_expr()?;
        while self.eat(&Tok::Pipe) {
            let rhs = self.path_expr()?;
            lhs = Expr::Union(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn path_expr(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Tok::Literal(_))
            | Some(Tok::Number(_))
            | Some(Tok::Function(_))
            | Some(Tok::LParen)
            | Some(Tok::Var(_)) => {
                let primary = self.primary_expr()?;
                let mut predicates = Vec::new();
                while self.peek() == Some(&Tok::LBracket) {
                    predicates.push(self.predicate()?);
                }
                let mut steps = Vec::new();
                self.trailing_steps(&mut steps)?;
                if predicates.is_empty() && steps.is_empty() {
                    return Ok(primary);
                }
                Ok(Expr::Path(Path {
                    start: PathStart::Filter(Box::new(primary), predicates),
                    steps,
                }))
            }
            _ => Ok(Expr::Path(self.location_path()?)),
        }
    }

    fn trailing_steps(&mut self, steps: &mut Vec<Step>) -> Result<()> {
        loop {
            if self.eat(&Tok::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Tok::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.step()?);
            } else {
                return Ok(());
            }
        }
    }

    fn primary_expr(&mut self) -> Result<Expr> {
        match self.toks.get(self.pos).cloned() {
            Some(Tok::Literal(s)) => {
                self.pos += 1;
                Ok(Expr::Literal(s))
            }
            Some(Tok::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let expr = self.or_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(expr)
            }
            Some(Tok::Function(name)) => {
                self.pos += 1;
                self.expect(&Tok::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Tok::RParen) {
                    loop {
                        args.push(self.or_expr()?);
                        if self.eat(&Tok::RParen) {
                            break;
                        }
                        self.expect(&Tok::Comma)?;
                    }
                }
                check_function(&name, args.len())?;
                Ok(Expr::Function(name, args))
            }
            Some(Tok::Var(name)) => Err(Error::syntax(format!(
                "XPath variable \"${}\" is not supported",
                name
            ))),
            other => Err(Error::syntax(format!(
                "Unexpected XPath token {:?}",
                other
            ))),
        }
    }

    fn location_path(&mut self) -> Result<Path> {
        let mut steps = Vec::new();
        let start = if self.eat(&Tok::Slash) {
            // A lone "/" selects the root.
            if self.starts_step() {
                steps.push(self.step()?);
            }
            PathStart::Root
        } else if self.eat(&Tok::DoubleSlash) {
            steps.push(descendant_or_self());
            steps.push(self.step()?);
            PathStart::Root
        } else {
            steps.push(self.step()?);
            PathStart::Context
        };
        self.trailing_steps(&mut steps)?;
        Ok(Path { start, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Tok::Name(..))
                | Some(Tok::Dot)
                | Some(Tok::DotDot)
                | Some(Tok::At)
                | Some(Tok::Axis(_))
                | Some(Tok::NodeType(_))
        )
    }

    fn step(&mut self) -> Result<Step> {
        if self.eat(&Tok::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Tok::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = match self.toks.get(self.pos).cloned() {
            Some(Tok::At) => {
                self.pos += 1;
                Axis::Attribute
            }
            Some(Tok::Axis(name)) => {
                self.pos += 1;
                self.expect(&Tok::ColonColon)?;
                match name.as_str() {
                    "child" => Axis::Child,
                    "descendant" => Axis::Descendant,
                    "descendant-or-self" => Axis::DescendantOrSelf,
                    "parent" => Axis::Parent,
                    "ancestor" => Axis::Ancestor,
                    "ancestor-or-self" => Axis::AncestorOrSelf,
                    "self" => Axis::SelfAxis,
                    "following-sibling" => Axis::FollowingSibling,
                    "preceding-sibling" => Axis::PrecedingSibling,
                    "following" => Axis::Following,
                    "preceding" => Axis::Preceding,
                    "attribute" => Axis::Attribute,
                    _ => {
                        return Err(Error::syntax(format!(
                            "Unknown XPath axis \"{}\"",
                            name
                        )))
                    }
                }
            }
            _ => Axis::Child,
        };

        let test = match self.toks.get(self.pos).cloned() {
            Some(Tok::Name(prefix, local)) => {
                self.pos += 1;
                let module = match &prefix {
                    Some(prefix) => Some((self.resolver)(prefix).ok_or_else(
                        || {
                            Error::syntax(format!(
                                "Unknown prefix \"{}\" in XPath expression",
                                prefix
                            ))
                        },
                    )?),
                    None => None,
                };
                if local == "*" {
                    NodeTest::Any { module }
                } else {
                    NodeTest::Name {
                        module,
                        name: local,
                    }
                }
            }
            Some(Tok::NodeType(kind)) => {
                self.pos += 1;
                self.expect(&Tok::LParen)?;
                self.expect(&Tok::RParen)?;
                match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    _ => {
                        return Err(Error::syntax(format!(
                            "Unsupported XPath node type \"{}()\"",
                            kind
                        )))
                    }
                }
            }
            other => {
                return Err(Error::syntax(format!(
                    "Expected XPath node test, found {:?}",
                    other
                )))
            }
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(&Tok::LBracket) {
            predicates.push(self.predicate()?);
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn predicate(&mut self) -> Result<Expr> {
        self.expect(&Tok::LBracket)?;
        let expr = self.or_expr()?;
        self.expect(&Tok::RBracket)?;
        Ok(expr)
    }
}

fn descendant_or_self() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::Node,
        predicates: Vec::new(),
    }
}

/// Supported functions and their arities.
fn check_function(name: &str, argc: usize) -> Result<()> {
    let ok = match name {
        "last" | "position" | "true" | "false" | "current" => argc == 0,
        "count" | "not" | "boolean" | "floor" | "ceiling" | "round"
        | "sum" | "deref" | "enum-value" => argc == 1,
        "string" | "number" | "string-length" | "normalize-space"
        | "local-name" | "name" => argc <= 1,
        "contains" | "starts-with" | "substring-before"
        | "substring-after" | "derived-from" | "derived-from-or-self"
        | "re-match" | "bit-is-set" => argc == 2,
        "substring" => argc == 2 || argc == 3,
        "translate" => argc == 3,
        "concat" => argc >= 2,
        _ => {
            return Err(Error::syntax(format!(
                "Unknown XPath function \"{}\"",
                name
            )))
        }
    };
    if !ok {
        return Err(Error::syntax(format!(
            "Invalid number of arguments ({}) for XPath function \"{}\"",
            argc, name
        )));
    }
    Ok(())
}

// ===== impl Expr =====

impl Expr {
    /// Whether the expression is a plain location path.
    pub(crate) fn as_path(&self) -> Option<&Path> {
        match self {
            Expr::Path(path) => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(prefix: &str) -> Option<ModuleId> {
        match prefix {
            "m" => Some(ModuleId::from_index(0)),
            "if" => Some(ModuleId::from_index(1)),
            _ => None,
        }
    }

    fn p(src: &str) -> Expr {
        parse(src, &resolver).unwrap()
    }

    #[test]
    fn location_paths() {
        let expr = p("/m:a/m:b[name='x']/c");
        let path = expr.as_path().unwrap();
        assert_eq!(path.start, PathStart::Root);
        assert_eq!(path.steps.len(), 3);
        assert_eq!(path.steps[1].predicates.len(), 1);
        assert_eq!(
            path.steps[2].test,
            NodeTest::Name {
                module: None,
                name: "c".to_owned()
            }
        );
    }

    #[test]
    fn relative_parent() {
        let expr = p("../../if:interface/if:name");
        let path = expr.as_path().unwrap();
        assert_eq!(path.start, PathStart::Context);
        assert_eq!(path.steps[0].axis, Axis::Parent);
        assert_eq!(path.steps[1].axis, Axis::Parent);
    }

    #[test]
    fn operators_and_names() {
        // "mod" and "div" are names unless in operator position.
        let expr = p("mod div 2 * count(m:*)");
        assert!(matches!(expr, Expr::Arith(ArithOp::Mul, _, _)));
    }

    #[test]
    fn functions() {
        assert!(parse("derived-from(., 'if:ethernet')", &resolver).is_ok());
        assert!(parse("current()/../x = 1 and not(y)", &resolver).is_ok());
        assert!(parse("foo(1)", &resolver).is_err());
        assert!(parse("count()", &resolver).is_err());
    }

    #[test]
    fn unknown_prefix() {
        assert!(parse("/x:a", &resolver).is_err());
    }

    #[test]
    fn axes() {
        let expr = p("following-sibling::m:b | ancestor::*");
        assert!(matches!(expr, Expr::Union(_, _)));
    }
}
