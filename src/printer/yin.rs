//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YIN printer (RFC 7950 section 13).

use quick_xml::escape::escape;

use crate::parser::stmt::yin_arg;
use crate::parser::yin::YIN_NAMESPACE;
use crate::parser::Stmt;
use crate::schema::SchemaPrinterFlags;

/// Print a module statement tree as YIN. `namespaces` maps the prefixes
/// used by the module (its own and the imported ones) to their namespaces.
pub(crate) fn print(
    stmt: &Stmt,
    namespaces: &[(String, String)],
    options: SchemaPrinterFlags,
) -> String {
    let shrink = options.contains(SchemaPrinterFlags::SHRINK);
    let depth = if options.contains(SchemaPrinterFlags::NO_SUBSTMT) {
        Some(1)
    } else {
        None
    };

    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    if !shrink {
        out.push('\n');
    }
    let mut printer = YinPrinter { out, shrink };
    printer.stmt(stmt, 0, depth, Some(namespaces));
    let mut out = printer.out;
    if !shrink {
        out.push('\n');
    }
    out
}

struct YinPrinter {
    out: String,
    shrink: bool,
}

// ===== impl YinPrinter =====

impl YinPrinter {
    fn newline(&mut self, level: usize) {
        if !self.shrink {
            self.out.push('\n');
            self.out.push_str(&"  ".repeat(level));
        }
    }

    fn stmt(
        &mut self,
        stmt: &Stmt,
        level: usize,
        depth: Option<usize>,
        namespaces: Option<&[(String, String)]>,
    ) {
        self.out.push('<');
        self.out.push_str(&stmt.keyword);

        // Argument as attribute, child element or extension text.
        let mut arg_element = None;
        match (stmt.is_extension(), yin_arg(&stmt.keyword)) {
            (false, Ok(Some(spec))) => {
                if let Some(arg) = &stmt.arg {
                    if spec.element {
                        arg_element = Some((spec.name, arg.as_str()));
                    } else {
                        self.attribute(spec.name, arg);
                    }
                }
            }
            (true, _) => {
                if let Some(arg) = &stmt.arg {
                    self.attribute("value", arg);
                }
            }
            _ => (),
        }

        if let Some(namespaces) = namespaces {
            self.attribute("xmlns", YIN_NAMESPACE);
            for (prefix, ns) in namespaces {
                self.attribute(&format!("xmlns:{}", prefix), ns);
            }
        }

        let substmts = match depth {
            Some(0) => &[][..],
            _ => &stmt.substmts[..],
        };
        if substmts.is_empty() && arg_element.is_none() {
            self.out.push_str("/>");
            return;
        }
        self.out.push('>');

        if let Some((name, text)) = arg_element {
            self.newline(level + 1);
            self.out.push('<');
            self.out.push_str(name);
            self.out.push('>');
            self.out.push_str(&escape(text));
            self.out.push_str("</");
            self.out.push_str(name);
            self.out.push('>');
        }

        let depth = depth.map(|d| d - 1);
        for sub in substmts {
            self.newline(level + 1);
            self.stmt(sub, level + 1, depth, None);
        }

        self.newline(level);
        self.out.push_str("</");
        self.out.push_str(&stmt.keyword);
        self.out.push('>');
    }

    fn attribute(&mut self, name: &str, value: &str) {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(&escape(value));
        self.out.push('"');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::parse_yang;
    use crate::parser::yin::parse_yin;

    #[test]
    fn yang_to_yin() {
        let stmt = parse_yang(
            r#"module m {
  namespace "urn:m";
  prefix m;
  extension label { argument name; }
  description "Uses <tags> & \"quotes\".";
  container c {
    m:label "top";
    leaf a { type string; }
  }
}"#,
        )
        .unwrap();
        let namespaces = vec![("m".to_owned(), "urn:m".to_owned())];
        let yin = print(&stmt, &namespaces, SchemaPrinterFlags::empty());
        assert!(yin.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(yin.contains(
            "<module name=\"m\" xmlns=\"urn:ietf:params:xml:ns:yang:yin:1\" xmlns:m=\"urn:m\">"
        ));
        assert!(yin.contains("<text>Uses &lt;tags&gt; &amp; &quot;quotes&quot;.</text>"));
        assert!(yin.contains("<m:label value=\"top\"/>"));

        let back = parse_yin(&yin).unwrap();
        assert_eq!(back.find_arg("description"), stmt.find_arg("description"));
        let container = back.find("container").unwrap();
        assert_eq!(container.find_arg("m:label"), Some("top"));
        assert_eq!(container.find("leaf").unwrap().find_arg("type"), Some("string"));
    }
}
