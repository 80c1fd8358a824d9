//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

/// Generic YANG statement, as produced by both the YANG and the YIN readers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stmt {
    /// Keyword, `prefix:name` for extension instances.
    pub keyword: String,
    pub arg: Option<String>,
    pub line: u32,
    pub substmts: Vec<Stmt>,
}

/// How a statement argument is encoded in YIN.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct YinArg {
    pub name: &'static str,
    /// Argument is the text of a child element instead of an attribute.
    pub element: bool,
}

// ===== impl Stmt =====

impl Stmt {
    pub fn new(keyword: impl Into<String>, arg: Option<String>) -> Stmt {
        Stmt {
            keyword: keyword.into(),
            arg,
            line: 0,
            substmts: Vec::new(),
        }
    }

    /// Whether this is an extension instance.
    pub fn is_extension(&self) -> bool {
        self.keyword.contains(':')
    }

    pub fn arg_str(&self) -> &str {
        self.arg.as_deref().unwrap_or("")
    }

    pub(crate) fn find(&self, keyword: &str) -> Option<&Stmt> {
        self.substmts.iter().find(|s| s.keyword == keyword)
    }

    pub(crate) fn find_arg(&self, keyword: &str) -> Option<&str> {
        self.find(keyword).and_then(|s| s.arg.as_deref())
    }

    pub(crate) fn find_all<'a>(
        &'a self,
        keyword: &'a str,
    ) -> impl Iterator<Item = &'a Stmt> + 'a {
        self.substmts.iter().filter(move |s| s.keyword == keyword)
    }
}

/// Argument name and encoding of every YANG keyword, `None` for keywords
/// without argument. Unknown keywords yield `Err(())`.
pub(crate) fn yin_arg(keyword: &str) -> Result<Option<YinArg>, ()> {
    let (name, element) = match keyword {
        "action" | "anydata" | "anyxml" | "argument" | "base" | "bit"
        | "case" | "choice" | "container" | "enum" | "extension"
        | "feature" | "grouping" | "identity" | "if-feature" | "leaf"
        | "leaf-list" | "list" | "module" | "notification" | "rpc"
        | "submodule" | "type" | "typedef" | "units" | "uses" => {
            ("name", false)
        }
        "augment" | "deviation" | "refine" => ("target-node", false),
        "belongs-to" | "import" | "include" => ("module", false),
        "config" | "default" | "deviate" | "error-app-tag"
        | "fraction-digits" | "key" | "length" | "mandatory"
        | "max-elements" | "min-elements" | "modifier" | "ordered-by"
        | "path" | "pattern" | "position" | "prefix" | "presence"
        | "range" | "require-instance" | "status" | "value"
        | "yang-version" | "yin-element" => ("value", false),
        "contact" | "description" | "organization" | "reference" => {
            ("text", true)
        }
        "error-message" => ("value", true),
        "must" | "when" => ("condition", false),
        "namespace" => ("uri", false),
        "revision" | "revision-date" => ("date", false),
        "unique" => ("tag", false),
        "input" | "output" => return Ok(None),
        _ => return Err(()),
    };
    Ok(Some(YinArg { name, element }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yin_table() {
        assert_eq!(
            yin_arg("description"),
            Ok(Some(YinArg {
                name: "text",
                element: true
            }))
        );
        assert_eq!(yin_arg("input"), Ok(None));
        assert!(yin_arg("foo").is_err());
    }
}
