//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG text reader (RFC 7950 section 6).
//!
//! Produces the generic statement tree; keyword semantics are checked when
//! the tree is lowered.

use crate::error::{Error, Result};
use crate::parser::stmt::Stmt;

const TAB_WIDTH: usize = 8;

pub(crate) struct Lexer<'src> {
    src: &'src str,
    pos: usize,
    line: u32,
}

impl<'src> Lexer<'src> {
    pub(crate) fn new(src: &'src str) -> Self {
        // Skip a UTF-8 byte order mark.
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Lexer { src, pos: 0, line: 1 }
    }

    /// Read the single top-level statement of the input.
    pub(crate) fn parse(mut self) -> Result<Stmt> {
        self.skip_separators()?;
        if self.at_end() {
            return Err(self.error("Empty input"));
        }
        let stmt = self.statement()?;
        self.skip_separators()?;
        if !self.at_end() {
            return Err(self.error("Trailing garbage after module"));
        }
        Ok(stmt)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(offset)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&self, msg: &str) -> Error {
        Error::syntax(format!("{} (line {}).", msg, self.line))
    }

    /// Column of the current position, tabs expanded.
    fn column(&self) -> usize {
        let start = self.src[..self.pos].rfind('\n').map_or(0, |i| i + 1);
        self.src[start..self.pos].chars().fold(0, |col, c| {
            if c == '\t' {
                col + TAB_WIDTH - col % TAB_WIDTH
            } else {
                col + 1
            }
        })
    }

    fn skip_separators(&mut self) -> Result<()> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => (),
                            None => {
                                return Err(self.error("Unterminated comment"))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn keyword(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ';' | '{' | '}' | '"' | '\'')
            {
                break;
            }
            self.bump();
        }
        let keyword = &self.src[start..self.pos];
        if keyword.is_empty() {
            return Err(self.error("Missing keyword"));
        }
        Ok(keyword.to_owned())
    }

    fn statement(&mut self) -> Result<Stmt> {
        let line = self.line;
        let keyword = self.keyword()?;
        self.skip_separators()?;
        let arg = match self.peek() {
            Some(';') | Some('{') => None,
            Some(_) => Some(self.argument()?),
            None => return Err(self.error("Unexpected end of input")),
        };
        self.skip_separators()?;
        let mut substmts = Vec::new();
        match self.bump() {
            Some(';') => (),
            Some('{') => loop {
                self.skip_separators()?;
                match self.peek() {
                    Some('}') => {
                        self.bump();
                        break;
                    }
                    Some(_) => substmts.push(self.statement()?),
                    None => {
                        return Err(self.error(&format!(
                            "Missing closing brace of \"{}\"",
                            keyword
                        )))
                    }
                }
            },
            _ => {
                return Err(self.error(&format!(
                    "Invalid character after argument of \"{}\"",
                    keyword
                )))
            }
        }
        Ok(Stmt {
            keyword,
            arg,
            line,
            substmts,
        })
    }

    fn argument(&mut self) -> Result<String> {
        match self.peek() {
            Some('"') | Some('\'') => {
                let mut arg = self.quoted()?;
                loop {
                    self.skip_separators()?;
                    if self.peek() != Some('+') {
                        break;
                    }
                    self.bump();
                    self.skip_separators()?;
                    match self.peek() {
                        Some('"') | Some('\'') => arg.push_str(&self.quoted()?),
                        _ => {
                            return Err(
                                self.error("Expected quoted string after \"+\"")
                            )
                        }
                    }
                }
                Ok(arg)
            }
            _ => self.unquoted(),
        }
    }

    fn unquoted(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ';' | '{' | '}') {
                break;
            }
            if matches!(c, '"' | '\'') {
                return Err(self.error("Invalid quote in unquoted string"));
            }
            self.bump();
        }
        Ok(self.src[start..self.pos].to_owned())
    }

    fn quoted(&mut self) -> Result<String> {
        let quote = self.bump();
        let indent = self.column();
        let mut out = String::new();
        if quote == Some('\'') {
            loop {
                match self.bump() {
                    Some('\'') => return Ok(out),
                    Some(c) => out.push(c),
                    None => return Err(self.error("Unterminated string")),
                }
            }
        }

        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some(c) => {
                        return Err(self.error(&format!(
                            "Invalid escape sequence \"\\{}\"",
                            c
                        )))
                    }
                    None => return Err(self.error("Unterminated string")),
                },
                Some('\n') => {
                    // Trailing whitespace before a line break is dropped.
                    let trimmed = out.trim_end_matches([' ', '\t']).len();
                    out.truncate(trimmed);
                    out.push('\n');
                    // Leading whitespace up to the column of the opening
                    // quote is dropped.
                    let mut col = 0;
                    while col < indent {
                        match self.peek() {
                            Some(' ') => col += 1,
                            Some('\t') => {
                                let width = TAB_WIDTH - col % TAB_WIDTH;
                                if col + width > indent {
                                    // Partially consumed tab is expanded.
                                    self.bump();
                                    out.push_str(
                                        &" ".repeat(col + width - indent),
                                    );
                                    break;
                                }
                                col += width;
                            }
                            _ => break,
                        }
                        self.bump();
                    }
                }
                Some(c) => out.push(c),
                None => return Err(self.error("Unterminated string")),
            }
        }
    }
}

/// Parse YANG text into its top-level statement.
pub(crate) fn parse_yang(src: &str) -> Result<Stmt> {
    Lexer::new(src).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_module() {
        let stmt = parse_yang(
            "module m { // comment\n  namespace \"urn:m\";\n  prefix m;\n  /* block */ leaf x { type string; }\n}\n",
        )
        .unwrap();
        assert_eq!(stmt.keyword, "module");
        assert_eq!(stmt.arg.as_deref(), Some("m"));
        assert_eq!(stmt.substmts.len(), 3);
        assert_eq!(stmt.substmts[0].arg.as_deref(), Some("urn:m"));
        assert_eq!(stmt.substmts[2].line, 4);
        assert_eq!(stmt.substmts[2].substmts[0].keyword, "type");
    }

    #[test]
    fn concatenation_and_escapes() {
        let stmt =
            parse_yang("module m { description \"a\\tb\" + 'c\\n' + \"\\\"\"; }")
                .unwrap();
        assert_eq!(stmt.substmts[0].arg.as_deref(), Some("a\tbc\\n\""));
    }

    #[test]
    fn indentation_stripping() {
        let src = "module m {\n  description\n    \"first   \n     second\n       third\";\n}";
        let stmt = parse_yang(src).unwrap();
        assert_eq!(
            stmt.substmts[0].arg.as_deref(),
            Some("first\nsecond\n  third")
        );
    }

    #[test]
    fn invalid_escape() {
        assert!(parse_yang("module m { description \"\\q\"; }").is_err());
    }

    #[test]
    fn unterminated() {
        let err = parse_yang("module m { leaf x { type string; }").unwrap_err();
        assert_eq!(err.errcode, crate::error::ErrorCode::Syntax);
    }

    #[test]
    fn slash_in_unquoted_argument() {
        let stmt =
            parse_yang("module m { augment /m:a/m:b { leaf c { type string; } } }")
                .unwrap();
        assert_eq!(stmt.substmts[0].arg.as_deref(), Some("/m:a/m:b"));
    }
}
