//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG printer.

use crate::parser::Stmt;
use crate::schema::SchemaPrinterFlags;

const INDENT: usize = 2;

/// Print a module (or submodule) statement tree as YANG text.
pub(crate) fn print(stmt: &Stmt, options: SchemaPrinterFlags) -> String {
    let mut out = String::new();
    let shrink = options.contains(SchemaPrinterFlags::SHRINK);
    let depth = if options.contains(SchemaPrinterFlags::NO_SUBSTMT) {
        Some(1)
    } else {
        None
    };
    print_stmt(&mut out, stmt, 0, depth, shrink);
    if !shrink {
        out.push('\n');
    }
    out
}

fn print_stmt(
    out: &mut String,
    stmt: &Stmt,
    level: usize,
    depth: Option<usize>,
    shrink: bool,
) {
    let indent = if shrink { 0 } else { level * INDENT };
    out.push_str(&" ".repeat(indent));
    out.push_str(&stmt.keyword);

    if let Some(arg) = &stmt.arg {
        if shrink || !arg.contains('\n') {
            out.push(' ');
            out.push_str(&quote(arg, shrink));
        } else {
            // Multi-line text starts on its own line, continuation lines are
            // aligned one column after the opening quote.
            let column = indent + INDENT;
            out.push('\n');
            out.push_str(&" ".repeat(column));
            let quoted = quote(arg, false);
            let mut lines = quoted.split('\n');
            if let Some(first) = lines.next() {
                out.push_str(first);
            }
            for line in lines {
                out.push('\n');
                if !line.is_empty() {
                    out.push_str(&" ".repeat(column + 1));
                    out.push_str(line);
                }
            }
        }
    }

    let substmts = match depth {
        Some(0) => &[][..],
        _ => &stmt.substmts[..],
    };
    if substmts.is_empty() {
        out.push(';');
        return;
    }

    out.push_str(" {");
    let depth = depth.map(|d| d - 1);
    for (i, sub) in substmts.iter().enumerate() {
        if !shrink {
            out.push('\n');
            // Blank line between top-level definitions.
            if level == 0 && i > 0 && is_block(sub) {
                out.push('\n');
            }
        }
        print_stmt(out, sub, level + 1, depth, shrink);
    }
    if !shrink {
        out.push('\n');
        out.push_str(&" ".repeat(indent));
    }
    out.push('}');
}

fn is_block(stmt: &Stmt) -> bool {
    !stmt.substmts.is_empty()
}

/// Quote an argument when YANG requires it.
pub(crate) fn quote(arg: &str, shrink: bool) -> String {
    let simple = !arg.is_empty()
        && !arg.starts_with("//")
        && !arg.starts_with("/*")
        && !arg.chars().any(|c| {
            c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | ';' | '{' | '}')
        });
    if simple {
        return arg.to_owned();
    }
    if arg.contains('\\') && !arg.contains('\'') && !arg.contains('\n') {
        return format!("'{}'", arg);
    }

    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' if shrink => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::parse_yang;

    const MODULE: &str = r#"module m {
  namespace "urn:m";
  prefix m;
  description
    "First line.
     Second line.";
  leaf a {
    type string {
      pattern '[a-z]+\d*';
    }
  }
}"#;

    #[test]
    fn quoting() {
        assert_eq!(quote("simple", false), "simple");
        assert_eq!(quote("two words", false), "\"two words\"");
        assert_eq!(quote("", false), "\"\"");
        assert_eq!(quote("a\\d", false), "'a\\d'");
        assert_eq!(quote("it's \\d", false), "\"it's \\\\d\"");
        assert_eq!(quote("a\nb", true), "\"a\\nb\"");
    }

    #[test]
    fn print_parse_again() {
        let stmt = parse_yang(MODULE).unwrap();
        let printed = print(&stmt, SchemaPrinterFlags::empty());
        assert_eq!(
            without_lines(parse_yang(&printed).unwrap()),
            without_lines(stmt.clone())
        );

        let shrunk = print(&stmt, SchemaPrinterFlags::SHRINK);
        assert!(!shrunk.contains('\n'));
        assert_eq!(
            without_lines(parse_yang(&shrunk).unwrap()),
            without_lines(stmt)
        );
    }

    #[test]
    fn no_substatements() {
        let stmt = parse_yang(MODULE).unwrap();
        let printed = print(&stmt, SchemaPrinterFlags::NO_SUBSTMT);
        assert!(printed.contains("  leaf a;"));
        assert!(!printed.contains("pattern"));
    }

    fn without_lines(mut stmt: Stmt) -> Stmt {
        stmt.line = 0;
        stmt.substmts = stmt.substmts.into_iter().map(without_lines).collect();
        stmt
    }
}
