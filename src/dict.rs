//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! String and regular expression registry shared by all schema nodes of a
//! context.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Strings longer than this are stored without deduplication (descriptions
/// and other free text are almost always unique).
const DEDUP_THRESHOLD: usize = 64;

#[derive(Debug, Default)]
pub(crate) struct Dictionary {
    strings: HashSet<Arc<str>>,
    regexes: Mutex<HashMap<String, Arc<Regex>>>,
}

impl Dictionary {
    pub(crate) fn new() -> Dictionary {
        Default::default()
    }

    /// Intern a string.
    pub(crate) fn intern(&mut self, s: &str) -> Arc<str> {
        if s.len() >= DEDUP_THRESHOLD {
            return Arc::from(s);
        }
        if let Some(interned) = self.strings.get(s) {
            return interned.clone();
        }
        let interned: Arc<str> = Arc::from(s);
        self.strings.insert(interned.clone());
        interned
    }

    pub(crate) fn intern_opt(&mut self, s: Option<&str>) -> Option<Arc<str>> {
        s.map(|s| self.intern(s))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.strings.len()
    }

    /// Compile (or fetch from the cache) a YANG pattern written in the XML
    /// Schema regular expression dialect.
    pub(crate) fn regex(
        &self,
        pattern: &str,
    ) -> std::result::Result<Arc<Regex>, regex::Error> {
        let mut cache = match self.regexes.lock() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(regex) = cache.get(pattern) {
            return Ok(regex.clone());
        }
        let regex = Arc::new(Regex::new(&xsd_to_regex(pattern))?);
        cache.insert(pattern.to_owned(), regex.clone());
        Ok(regex)
    }
}

/// Translate an XSD regular expression into the syntax of the `regex` crate.
///
/// XSD patterns are implicitly anchored, have no `^`/`$` metacharacters and
/// use `-[...]` for character class subtraction.
pub(crate) fn xsd_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("^(?:");
    let mut chars = pattern.chars().peekable();
    let mut class_depth = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('i') => out.push_str("[_:A-Za-z]"),
                Some('I') => out.push_str("[^_:A-Za-z]"),
                Some('c') => out.push_str("[-._:A-Za-z0-9]"),
                Some('C') => out.push_str("[^-._:A-Za-z0-9]"),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push_str("\\\\"),
            },
            '[' => {
                class_depth += 1;
                out.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('^');
                }
            }
            ']' if class_depth > 0 => {
                class_depth -= 1;
                out.push(']');
            }
            '-' if class_depth > 0 && chars.peek() == Some(&'[') => {
                out.push_str("--");
            }
            '^' | '$' if class_depth == 0 => {
                out.push('\\');
                out.push(c);
            }
            '&' | '~' if class_depth > 0 => {
                // Set operators of the regex crate.
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push_str(")$");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_dedup() {
        let mut dict = Dictionary::new();
        let a = dict.intern("interface");
        let b = dict.intern("interface");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn xsd_anchoring() {
        let dict = Dictionary::new();
        let re = dict.regex("a.*").unwrap();
        assert!(re.is_match("apple"));
        assert!(!re.is_match("banana"));
    }

    #[test]
    fn xsd_literal_caret() {
        let dict = Dictionary::new();
        let re = dict.regex("a^b$").unwrap();
        assert!(re.is_match("a^b$"));
    }

    #[test]
    fn xsd_class_subtraction() {
        let dict = Dictionary::new();
        let re = dict.regex("[a-z-[aeiou]]+").unwrap();
        assert!(re.is_match("xyz"));
        assert!(!re.is_match("xaz"));
    }
}
